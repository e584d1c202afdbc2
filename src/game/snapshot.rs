//! Snapshot building for the render collaborator

use crate::host::protocol::SimEvent;

use super::r#match::Match;

/// Builds per-tick render snapshots at a fixed cadence
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for phase changes)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    pub fn build(&self, sim: &Match) -> SimEvent {
        let state = sim.state();
        let now = sim.now();
        SimEvent::Snapshot {
            tick: now,
            phase: state.phase,
            level: state.level,
            round: state.round,
            time_remaining: state.time_remaining,
            paused: state.paused,
            camera_x: state.camera.x,
            actors: sim.roster().snapshots(),
            effects: state.effects.iter().map(|e| e.snapshot(now)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::config::Tuning;
    use crate::game::actor::ActorId;

    #[test]
    fn test_cadence() {
        let mut builder = SnapshotBuilder::new(3);
        let sent: Vec<bool> = (0..6).map(|_| builder.should_send()).collect();
        assert_eq!(sent, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_force_next() {
        let mut builder = SnapshotBuilder::new(10);
        assert!(!builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
        assert!(!builder.should_send());
    }

    #[test]
    fn test_build_carries_both_actors() {
        let tuning = Arc::new(Tuning::builtin().expect("builtin tuning"));
        let sim = Match::new(Uuid::new_v4(), 4, tuning).expect("match");
        let SimEvent::Snapshot { actors, tick, .. } = SnapshotBuilder::new(1).build(&sim) else {
            panic!("not a snapshot");
        };
        assert_eq!(tick, 0);
        assert_eq!(actors.len(), 2);
        assert_eq!(actors[0].id, ActorId::Player);
        assert_eq!(actors[1].id, ActorId::Boss);
    }
}
