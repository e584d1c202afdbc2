//! Boss decision policy
//!
//! Decides on its own randomized cadence and only ever looks at actor
//! snapshots; everything it wants goes back through the state machine as
//! an [`Intent`].

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::config::{AiSpec, ConfigError};
use crate::util::time::ms_to_ticks;

use super::actor::{ActorSnapshot, StateTag};
use super::input::Intent;
use super::physics::PhysicsSystem;

/// Weighted outcome order: attack, special, block
const ATTACK: usize = 0;
const SPECIAL: usize = 1;

/// Seeded, reproducible policy for the non-human fighter
#[derive(Debug, Clone)]
pub struct AiPolicy {
    rng: ChaCha8Rng,
    outcomes: WeightedIndex<u32>,
    attacks: Vec<StateTag>,
    min_interval: u64,
    max_interval: u64,
    proximity: f32,
    settle_ticks: u64,
    special_cost: f32,
    next_decision_at: u64,
    settle_at: Option<u64>,
}

impl AiPolicy {
    pub fn new(spec: &AiSpec, special_cost: f32, seed: u64) -> Result<Self, ConfigError> {
        let weights = [spec.weights.attack, spec.weights.special, spec.weights.block];
        let outcomes = WeightedIndex::new(weights)
            .map_err(|e| ConfigError::Invalid(format!("ai weights: {e}")))?;
        let min_interval = ms_to_ticks(spec.decision_min_ms).max(1);
        let max_interval = ms_to_ticks(spec.decision_max_ms).max(min_interval);

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            outcomes,
            attacks: spec.attacks.clone(),
            min_interval,
            max_interval,
            proximity: spec.proximity,
            settle_ticks: ms_to_ticks(spec.settle_ms).max(1),
            special_cost,
            next_decision_at: 0,
            settle_at: None,
        })
    }

    /// Start a fresh round. The random stream carries on, so replays of
    /// a round do not repeat themselves.
    pub fn reset(&mut self, now: u64) {
        self.settle_at = None;
        self.next_decision_at = now + self.draw_interval();
    }

    /// At most one intent for this tick
    pub fn decide(&mut self, now: u64, me: &ActorSnapshot, opponent: &ActorSnapshot) -> Option<Intent> {
        if me.state.is_terminal() || me.health <= 0.0 {
            return None;
        }

        if now >= self.next_decision_at {
            self.next_decision_at = now + self.draw_interval();
            let intent = self.choose(me, opponent);
            self.settle_at = Some(now + self.settle_ticks);
            trace!(tick = now, ?intent, "Boss decision");
            return Some(intent);
        }

        match self.settle_at {
            Some(at) if now >= at => {
                self.settle_at = None;
                Some(Intent::Release)
            }
            _ => None,
        }
    }

    fn choose(&mut self, me: &ActorSnapshot, opponent: &ActorSnapshot) -> Intent {
        let toward = PhysicsSystem::direction_to(me.x, opponent.x);
        let distance = PhysicsSystem::distance(me.x, opponent.x);

        if let Some(dir) = toward {
            // Close in, or turn around when the opponent slipped behind
            if distance > self.proximity || me.facing != dir {
                return Intent::Move { dir };
            }
        }

        match self.outcomes.sample(&mut self.rng) {
            ATTACK => self
                .attacks
                .choose(&mut self.rng)
                .copied()
                .and_then(attack_intent)
                .unwrap_or(Intent::Block),
            SPECIAL if me.energy >= self.special_cost => Intent::Special,
            _ => Intent::Block,
        }
    }

    fn draw_interval(&mut self) -> u64 {
        self.rng.gen_range(self.min_interval..=self.max_interval)
    }
}

fn attack_intent(state: StateTag) -> Option<Intent> {
    match state {
        StateTag::LightAttack => Some(Intent::LightAttack),
        StateTag::HeavyAttack => Some(Intent::HeavyAttack),
        StateTag::CrouchLightAttack => Some(Intent::CrouchLightAttack),
        StateTag::CrouchHeavyAttack => Some(Intent::CrouchHeavyAttack),
        StateTag::JumpLightAttack => Some(Intent::JumpLightAttack),
        StateTag::JumpHeavyAttack => Some(Intent::JumpHeavyAttack),
        _ => None,
    }
}
