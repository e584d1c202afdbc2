//! Duel Sim - deterministic, tick-driven simulation core for a two-fighter
//! melee duel: one human-driven fighter against a seeded AI boss.
//!
//! [`game::Match`] is the pure stepped simulation; [`game::GameMatch`]
//! drives it on a fixed 60 Hz interval and talks to the host through
//! channels.

pub mod config;
pub mod game;
pub mod host;
pub mod util;
