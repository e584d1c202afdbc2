//! Match clock and the generation-token transition scheduler

use tracing::trace;

use super::actor::{ActorId, Phase, StateTag};

/// Monotonic tick source, advanced once per fixed simulation step
#[derive(Debug, Clone, Default)]
pub struct MatchClock {
    tick: u64,
}

impl MatchClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.tick
    }

    /// Advance by one tick and return the new tick
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Where a scheduled transition leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub state: StateTag,
    pub phase: Phase,
}

impl Target {
    pub fn new(state: StateTag, phase: Phase) -> Self {
        Self { state, phase }
    }

    /// Settle into a state with no sub-phase
    pub fn settle(state: StateTag) -> Self {
        Self {
            state,
            phase: Phase::None,
        }
    }
}

/// Identifies one scheduled transition of one actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionHandle {
    pub actor: ActorId,
    pub generation: u64,
}

/// A transition registered for a future tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTransition {
    pub actor: ActorId,
    pub target: Target,
    pub fire_at: u64,
    pub generation: u64,
    seq: u64,
}

impl ScheduledTransition {
    pub fn handle(&self) -> TransitionHandle {
        TransitionHandle {
            actor: self.actor,
            generation: self.generation,
        }
    }
}

/// Single-pending-transition-per-actor scheduler.
///
/// Every `schedule` bumps the actor's generation, so anything registered
/// under an older generation can never be applied.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    pending: Vec<ScheduledTransition>,
    generations: [u64; 2],
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `target` for `actor` at `now + delay` (at least one tick
    /// out), superseding whatever that actor had pending.
    pub fn schedule(
        &mut self,
        now: u64,
        actor: ActorId,
        delay: u64,
        target: Target,
    ) -> TransitionHandle {
        let generation = self.bump(actor);
        self.pending.retain(|t| t.actor != actor);

        let seq = self.next_seq;
        self.next_seq += 1;

        let transition = ScheduledTransition {
            actor,
            target,
            fire_at: now + delay.max(1),
            generation,
            seq,
        };
        self.pending.push(transition);
        transition.handle()
    }

    /// Cancel a transition. Cancelling something already fired, cancelled
    /// or superseded is a no-op.
    pub fn cancel(&mut self, handle: TransitionHandle) {
        if self.is_live(handle) {
            self.invalidate(handle.actor);
        }
    }

    /// Drop whatever `actor` has pending, live or not
    pub fn invalidate(&mut self, actor: ActorId) {
        self.bump(actor);
        self.pending.retain(|t| t.actor != actor);
    }

    /// True while the handle's generation is current and it has not fired
    pub fn is_live(&self, handle: TransitionHandle) -> bool {
        self.generations[handle.actor.index()] == handle.generation
            && self
                .pending
                .iter()
                .any(|t| t.actor == handle.actor && t.generation == handle.generation)
    }

    /// True if `transition` still carries its actor's current generation
    pub fn is_current(&self, transition: &ScheduledTransition) -> bool {
        self.generations[transition.actor.index()] == transition.generation
    }

    /// The transition `actor` has pending, if any
    pub fn pending_for(&self, actor: ActorId) -> Option<&ScheduledTransition> {
        self.pending.iter().find(|t| t.actor == actor)
    }

    /// Remove and return every transition due at or before `now`, ordered by
    /// fire tick then registration order. Stale entries are dropped.
    pub fn due(&mut self, now: u64) -> Vec<ScheduledTransition> {
        let generations = self.generations;
        let mut due = Vec::new();
        self.pending.retain(|t| {
            if t.fire_at > now {
                return true;
            }
            if generations[t.actor.index()] == t.generation {
                due.push(*t);
            } else {
                trace!(actor = ?t.actor, generation = t.generation, "Dropping stale transition");
            }
            false
        });
        due.sort_by_key(|t| (t.fire_at, t.seq));
        due
    }

    /// Forget everything pending (round reset). Generations keep counting so
    /// pre-reset handles stay inert.
    pub fn clear(&mut self) {
        for actor in ActorId::ALL {
            self.bump(actor);
        }
        self.pending.clear();
    }

    fn bump(&mut self, actor: ActorId) -> u64 {
        let generation = &mut self.generations[actor.index()];
        *generation += 1;
        *generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> Target {
        Target::settle(StateTag::Idle)
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut clock = MatchClock::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        assert_eq!(clock.now(), 2);
    }

    #[test]
    fn test_fires_at_delay() {
        let mut sched = Scheduler::new();
        sched.schedule(10, ActorId::Player, 5, idle());
        assert!(sched.due(14).is_empty());
        let fired = sched.due(15);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].fire_at, 15);
        assert!(sched.due(16).is_empty());
    }

    #[test]
    fn test_zero_delay_fires_next_tick() {
        let mut sched = Scheduler::new();
        sched.schedule(3, ActorId::Boss, 0, idle());
        assert!(sched.due(3).is_empty());
        assert_eq!(sched.due(4).len(), 1);
    }

    #[test]
    fn test_new_schedule_supersedes_old() {
        let mut sched = Scheduler::new();
        let old = sched.schedule(0, ActorId::Player, 3, idle());
        let new = sched.schedule(1, ActorId::Player, 10, Target::settle(StateTag::Jump));

        assert!(!sched.is_live(old));
        assert!(sched.is_live(new));
        assert!(sched.due(5).is_empty());

        let fired = sched.due(11);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].target.state, StateTag::Jump);
    }

    #[test]
    fn test_stale_transition_is_never_current_again() {
        let mut sched = Scheduler::new();
        sched.schedule(0, ActorId::Player, 3, idle());
        let stale = *sched.pending_for(ActorId::Player).expect("pending");
        sched.schedule(0, ActorId::Player, 3, idle());
        assert!(!sched.is_current(&stale));
        sched.due(100);
        sched.schedule(100, ActorId::Player, 3, idle());
        assert!(!sched.is_current(&stale));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut sched = Scheduler::new();
        let handle = sched.schedule(0, ActorId::Boss, 2, idle());
        sched.cancel(handle);
        sched.cancel(handle);
        assert!(sched.due(10).is_empty());

        // Cancelling a fired handle leaves later schedules alone
        let fired = sched.schedule(10, ActorId::Boss, 1, idle());
        assert_eq!(sched.due(11).len(), 1);
        let next = sched.schedule(11, ActorId::Boss, 4, idle());
        sched.cancel(fired);
        assert!(sched.is_live(next));
    }

    #[test]
    fn test_actors_do_not_interfere() {
        let mut sched = Scheduler::new();
        let p = sched.schedule(0, ActorId::Player, 5, idle());
        let b = sched.schedule(0, ActorId::Boss, 5, idle());
        assert!(sched.is_live(p));
        assert!(sched.is_live(b));
        assert_eq!(sched.due(5).len(), 2);
    }

    #[test]
    fn test_due_ordering_by_tick_then_registration() {
        let mut sched = Scheduler::new();
        sched.schedule(0, ActorId::Boss, 4, idle());
        sched.schedule(0, ActorId::Player, 4, Target::settle(StateTag::Jump));
        let fired = sched.due(4);
        assert_eq!(fired[0].actor, ActorId::Boss);
        assert_eq!(fired[1].actor, ActorId::Player);

        sched.schedule(4, ActorId::Boss, 3, idle());
        sched.schedule(4, ActorId::Player, 1, idle());
        let fired = sched.due(10);
        assert_eq!(fired[0].actor, ActorId::Player);
        assert_eq!(fired[1].actor, ActorId::Boss);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut sched = Scheduler::new();
        let handle = sched.schedule(0, ActorId::Player, 2, idle());
        sched.clear();
        assert!(!sched.is_live(handle));
        assert!(sched.due(10).is_empty());
    }
}
