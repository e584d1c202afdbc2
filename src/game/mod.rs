//! Game simulation modules

pub mod actor;
pub mod ai;
pub mod camera;
pub mod clock;
pub mod combat;
pub mod input;
pub mod r#match;
pub mod physics;
pub mod snapshot;
pub mod state_machine;

pub use r#match::{GameMatch, Match, MatchHandle, MatchPhase, MatchState};
