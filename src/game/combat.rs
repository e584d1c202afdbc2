//! Combat system - hit/hurt geometry, hit detection, damage and energy

use tracing::debug;

use crate::config::ActionDefinition;
use crate::host::protocol::{AudioCue, SimEvent};

use super::actor::{Actor, ActorId, Facing, Phase, Roster, StateTag};
use super::physics::Rect;
use super::state_machine::{StateMachine, TickContext};

/// Hit result from combat resolution
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub attacker: ActorId,
    pub defender: ActorId,
    pub action: StateTag,
    pub damage: f32,
    /// Center of the defender's hurt-box, where effects spawn
    pub x: f32,
    pub y: f32,
    pub defender_killed: bool,
}

/// Combat system for hit detection and damage
pub struct CombatSystem;

impl CombatSystem {
    /// World-space hit-box, present only during the active phase. The
    /// box extends forward from the body: past the right edge when facing
    /// right, behind the left edge when facing left.
    pub fn hit_box(actor: &Actor, def: &ActionDefinition) -> Option<Rect> {
        if actor.phase != Phase::Active {
            return None;
        }
        let offset = def.hit_box?;
        let x = match actor.facing {
            Facing::Right => actor.x + actor.width + offset.x,
            Facing::Left => actor.x - offset.x - offset.w,
        };
        Some(Rect::new(x, actor.y + offset.y, offset.w, offset.h))
    }

    /// World-space hurt-box: the state's own box if it defines one,
    /// otherwise a centered fraction of the body
    pub fn hurt_box(actor: &Actor, def: &ActionDefinition, fraction_w: f32, fraction_h: f32) -> Rect {
        match def.hurt_box {
            Some(local) => local.relative_to(actor.x, actor.y),
            None => Rect::new(actor.x, actor.y, actor.width, actor.height)
                .centered_fraction(fraction_w, fraction_h),
        }
    }

    /// Strict facing test; level positions never qualify
    pub fn is_facing(attacker: &Actor, defender: &Actor) -> bool {
        match attacker.facing {
            Facing::Right => attacker.x < defender.x,
            Facing::Left => attacker.x > defender.x,
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }

    /// Detect every qualifying hit this tick, then apply them.
    ///
    /// Detection runs against the pre-hit state of both actors, so two
    /// attackers whose active windows overlap both land (a trade).
    pub fn resolve(
        roster: &mut Roster,
        machine: &StateMachine,
        fraction_w: f32,
        fraction_h: f32,
        ctx: &mut TickContext<'_>,
    ) -> Vec<HitResult> {
        let mut hits = Vec::new();
        for attacker in ActorId::ALL {
            let a = roster.get(attacker);
            let d = roster.get(attacker.opponent());
            if !a.state.is_attack() || a.state.is_terminal() || d.state.is_terminal() {
                continue;
            }
            if a.struck.contains(&d.id) {
                continue;
            }
            let def = machine.definition(a.state);
            let Some(hit_box) = Self::hit_box(a, def) else {
                continue;
            };
            if !Self::is_facing(a, d) {
                continue;
            }
            let hurt = Self::hurt_box(d, machine.definition(d.state), fraction_w, fraction_h);
            if !hit_box.overlaps(&hurt) {
                continue;
            }
            hits.push(HitResult {
                attacker,
                defender: d.id,
                action: a.state,
                damage: def.damage,
                x: hurt.x + hurt.w / 2.0,
                y: hurt.y + hurt.h / 2.0,
                defender_killed: false,
            });
        }

        for hit in &mut hits {
            let (a, d) = roster.pair_mut(hit.attacker);
            a.struck.push(d.id);

            let (new_health, killed) = Self::apply_damage(d.health, hit.damage);
            d.set_health(new_health);
            hit.defender_killed = killed;

            if !hit.action.is_special() {
                let gain = machine.definition(hit.action).energy_gain;
                a.set_energy(a.energy + gain);
            }

            debug!(
                attacker = ?hit.attacker,
                defender = ?hit.defender,
                action = %hit.action,
                damage = hit.damage,
                health = d.health,
                "Hit landed"
            );
            ctx.events.push(SimEvent::Hit {
                attacker: hit.attacker,
                defender: hit.defender,
                action: hit.action,
                damage: hit.damage,
                defender_health: d.health,
            });
            ctx.audio(hit.attacker, AudioCue::HitLanded);

            if killed {
                machine.force_death(d, ctx);
            } else if machine.definition(d.state).interruptible {
                machine.force_hit_stun(d, ctx);
            }
        }

        hits
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Tuning;
    use crate::game::clock::{Scheduler, Target};

    struct Arena {
        machine: StateMachine,
        roster: Roster,
        scheduler: Scheduler,
        events: Vec<SimEvent>,
    }

    impl Arena {
        fn new(attacker_x: f32, defender_x: f32) -> Self {
            let tuning = Arc::new(Tuning::builtin().expect("builtin tuning"));
            let machine = StateMachine::new(tuning);
            let mut player = machine.spawn(ActorId::Player);
            let mut boss = machine.spawn(ActorId::Boss);
            player.x = attacker_x;
            player.facing = Facing::Right;
            boss.x = defender_x;
            boss.facing = Facing::Left;
            Self {
                machine,
                roster: Roster::new(player, boss),
                scheduler: Scheduler::new(),
                events: Vec::new(),
            }
        }

        fn activate(&mut self, id: ActorId, state: StateTag) {
            let actor = self.roster.get_mut(id);
            actor.state = state;
            actor.phase = Phase::Active;
            actor.struck.clear();
            actor.pending = Some(
                self.scheduler
                    .schedule(0, id, 4, Target::new(state, Phase::Recovery)),
            );
        }

        fn resolve(&mut self) -> Vec<HitResult> {
            let mut ctx = TickContext {
                now: 0,
                level: 0,
                scheduler: &mut self.scheduler,
                events: &mut self.events,
            };
            CombatSystem::resolve(&mut self.roster, &self.machine, 0.4, 0.4, &mut ctx)
        }
    }

    #[test]
    fn test_light_attack_hit() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);

        let hits = arena.resolve();
        assert_eq!(hits.len(), 1);
        let boss = arena.roster.get(ActorId::Boss);
        assert_eq!(boss.health, 95.0);
        assert_eq!(boss.state, StateTag::HitStun);
        assert_eq!(arena.roster.get(ActorId::Player).energy, 10.0);
    }

    #[test]
    fn test_energy_gain_caps_at_max() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.roster.get_mut(ActorId::Player).set_energy(95.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);
        arena.resolve();
        assert_eq!(arena.roster.get(ActorId::Player).energy, 100.0);
    }

    #[test]
    fn test_one_hit_per_active_window() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);
        arena.resolve();
        // Defender back to idle but still in range
        arena.roster.get_mut(ActorId::Boss).state = StateTag::Idle;
        assert!(arena.resolve().is_empty());
        assert_eq!(arena.roster.get(ActorId::Boss).health, 95.0);

        // A new active window may hit again
        arena.activate(ActorId::Player, StateTag::LightAttack);
        assert_eq!(arena.resolve().len(), 1);
        assert_eq!(arena.roster.get(ActorId::Boss).health, 90.0);
    }

    #[test]
    fn test_wrong_facing_never_hits() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);
        arena.roster.get_mut(ActorId::Player).facing = Facing::Left;
        assert!(arena.resolve().is_empty());
        assert_eq!(arena.roster.get(ActorId::Boss).health, 100.0);
        assert!(arena.events.is_empty());
    }

    #[test]
    fn test_equal_x_never_hits() {
        let mut arena = Arena::new(140.0, 140.0);
        arena.activate(ActorId::Player, StateTag::HeavyAttack);
        assert!(arena.resolve().is_empty());
    }

    #[test]
    fn test_out_of_range_no_change() {
        let mut arena = Arena::new(100.0, 600.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);
        assert!(arena.resolve().is_empty());
        assert_eq!(arena.roster.get(ActorId::Player).energy, 0.0);
    }

    #[test]
    fn test_startup_phase_has_no_hit_box() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);
        arena.roster.get_mut(ActorId::Player).phase = Phase::Startup;
        assert!(arena.resolve().is_empty());
    }

    #[test]
    fn test_left_facing_box_extends_behind_left_edge() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.activate(ActorId::Boss, StateTag::LightAttack);
        let boss = arena.roster.get(ActorId::Boss);
        let def = arena.machine.definition(StateTag::LightAttack);
        let hit_box = CombatSystem::hit_box(boss, def).expect("active");
        assert_eq!(hit_box.right(), boss.x);
        assert_eq!(arena.resolve().len(), 1);
        assert_eq!(arena.roster.get(ActorId::Player).health, 95.0);
    }

    #[test]
    fn test_lethal_hit_kills_instead_of_stunning() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.roster.get_mut(ActorId::Boss).set_health(3.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);
        let hits = arena.resolve();
        assert!(hits[0].defender_killed);
        let boss = arena.roster.get(ActorId::Boss);
        assert_eq!(boss.health, 0.0);
        assert_eq!(boss.state, StateTag::Death);
    }

    #[test]
    fn test_knockout_during_hit_stun() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);
        arena.resolve();
        assert_eq!(arena.roster.get(ActorId::Boss).state, StateTag::HitStun);

        arena.roster.get_mut(ActorId::Boss).set_health(4.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);
        arena.resolve();
        let boss = arena.roster.get(ActorId::Boss);
        assert_eq!(boss.state, StateTag::Death);
        assert!(boss.pending.is_none());
        assert!(arena.scheduler.pending_for(ActorId::Boss).is_none());
    }

    #[test]
    fn test_special_hit_grants_no_energy() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.activate(ActorId::Player, StateTag::Special);
        arena.resolve();
        assert_eq!(arena.roster.get(ActorId::Boss).health, 75.0);
        assert_eq!(arena.roster.get(ActorId::Player).energy, 0.0);
    }

    #[test]
    fn test_simultaneous_trade_lands_both() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);
        arena.activate(ActorId::Boss, StateTag::LightAttack);
        let hits = arena.resolve();
        assert_eq!(hits.len(), 2);
        assert_eq!(arena.roster.get(ActorId::Player).health, 95.0);
        assert_eq!(arena.roster.get(ActorId::Boss).health, 95.0);
    }

    #[test]
    fn test_crouch_hurt_box_ducks_high_attack() {
        let mut arena = Arena::new(100.0, 140.0);
        arena.activate(ActorId::Player, StateTag::LightAttack);
        arena.roster.get_mut(ActorId::Boss).state = StateTag::Crouch;
        assert!(arena.resolve().is_empty());
    }
}
