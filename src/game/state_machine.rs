//! Character state machine: intents and scheduled transitions in, actor
//! state out.
//!
//! Every timed state (attack phases, dash, jump arc, hit-stun) is driven by
//! the [`Scheduler`]; an actor only ever has one live transition, so a
//! late "return to idle" from a superseded action cannot land.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::{ActionDefinition, Timing, Tuning};
use crate::host::protocol::{AudioCategory, AudioCue, SimEvent};

use super::actor::{Actor, ActorId, Facing, JumpArc, Phase, StateTag};
use super::clock::{ScheduledTransition, Scheduler, Target};
use super::input::Intent;
use super::physics::{ArcTiming, PhysicsSystem};

/// Mutable per-tick context shared by the writers of actor state
pub struct TickContext<'a> {
    pub now: u64,
    /// Current level index, used to pick the boss audio set
    pub level: usize,
    pub scheduler: &'a mut Scheduler,
    pub events: &'a mut Vec<SimEvent>,
}

impl TickContext<'_> {
    pub fn audio(&mut self, actor: ActorId, cue: AudioCue) {
        let category = match actor {
            ActorId::Player => AudioCategory::Player,
            ActorId::Boss => AudioCategory::Boss { level: self.level },
        };
        self.events.push(SimEvent::Audio { category, cue });
    }
}

/// Transition rules for both fighters
#[derive(Debug, Clone)]
pub struct StateMachine {
    tuning: Arc<Tuning>,
    arc: ArcTiming,
}

impl StateMachine {
    pub fn new(tuning: Arc<Tuning>) -> Self {
        let arc = tuning.jump.timing();
        Self { tuning, arc }
    }

    pub fn definition(&self, state: StateTag) -> &ActionDefinition {
        self.tuning.actions.get(state)
    }

    /// A fresh actor at its spawn point. The player starts with an empty
    /// energy bar, the boss with a full one.
    pub fn spawn(&self, id: ActorId) -> Actor {
        let stage = &self.tuning.stage;
        let fighters = &self.tuning.fighters;
        let (spawn_x, other_x, energy) = match id {
            ActorId::Player => (stage.player_spawn_x, stage.boss_spawn_x, 0.0),
            ActorId::Boss => (stage.boss_spawn_x, stage.player_spawn_x, fighters.max_energy),
        };
        let facing = PhysicsSystem::direction_to(spawn_x, other_x).unwrap_or(match id {
            ActorId::Player => Facing::Right,
            ActorId::Boss => Facing::Left,
        });
        Actor::new(
            id,
            PhysicsSystem::clamp_to_stage(spawn_x, stage.body_width, stage.width),
            stage.ground_y,
            stage.body_width,
            stage.body_height,
            facing,
            fighters.max_health,
            fighters.max_energy,
            energy,
        )
    }

    /// Re-initialize an actor in place for a new round
    pub fn respawn(&self, actor: &mut Actor, ctx: &mut TickContext<'_>) {
        ctx.scheduler.invalidate(actor.id);
        *actor = self.spawn(actor.id);
    }

    /// Offer an intent. Returns whether the actor accepted it.
    pub fn apply_intent(&self, actor: &mut Actor, intent: Intent, ctx: &mut TickContext<'_>) -> bool {
        if actor.state.is_terminal() || !actor.is_alive() {
            return false;
        }

        let accepted = match actor.state {
            s if s.is_free() => self.apply_free_intent(actor, intent, ctx),
            StateTag::Jump => match intent {
                Intent::JumpLightAttack => self.start_attack(actor, StateTag::JumpLightAttack, ctx),
                Intent::JumpHeavyAttack => self.start_attack(actor, StateTag::JumpHeavyAttack, ctx),
                _ => false,
            },
            // Attacks, dash and hit-stun run to completion
            _ => false,
        };

        if !accepted {
            debug!(actor = ?actor.id, state = %actor.state, intent = ?intent, "Intent rejected");
        }
        accepted
    }

    fn apply_free_intent(&self, actor: &mut Actor, intent: Intent, ctx: &mut TickContext<'_>) -> bool {
        match intent {
            Intent::Release => {
                if actor.state == StateTag::Idle {
                    return false;
                }
                self.enter_looping(actor, StateTag::Idle, ctx);
                true
            }
            Intent::Move { dir } => {
                actor.facing = dir;
                if actor.state != StateTag::Walk {
                    self.enter_looping(actor, StateTag::Walk, ctx);
                }
                true
            }
            Intent::Dash { dir } => {
                actor.facing = dir;
                self.enter_timed(actor, StateTag::Dash, ctx);
                ctx.audio(
                    actor.id,
                    AudioCue::ActionStart {
                        state: StateTag::Dash,
                    },
                );
                true
            }
            Intent::Crouch => {
                if actor.state != StateTag::Crouch {
                    self.enter_looping(actor, StateTag::Crouch, ctx);
                }
                true
            }
            Intent::Block => {
                if actor.state != StateTag::Block {
                    self.enter_looping(actor, StateTag::Block, ctx);
                }
                true
            }
            Intent::Jump { dir } => {
                self.launch_jump(actor, dir, ctx);
                true
            }
            Intent::LightAttack => self.start_attack(actor, StateTag::LightAttack, ctx),
            Intent::HeavyAttack => self.start_attack(actor, StateTag::HeavyAttack, ctx),
            Intent::Special => self.start_attack(actor, StateTag::Special, ctx),
            Intent::CrouchLightAttack => self.start_attack(actor, StateTag::CrouchLightAttack, ctx),
            Intent::CrouchHeavyAttack => self.start_attack(actor, StateTag::CrouchHeavyAttack, ctx),
            Intent::JumpLightAttack | Intent::JumpHeavyAttack | Intent::JumpSpecial => {
                let state = match intent {
                    Intent::JumpLightAttack => StateTag::JumpLightAttack,
                    Intent::JumpHeavyAttack => StateTag::JumpHeavyAttack,
                    _ => StateTag::JumpSpecial,
                };
                if !self.can_afford(actor, state) {
                    return false;
                }
                self.launch_jump(actor, None, ctx);
                self.start_attack(actor, state, ctx)
            }
        }
    }

    /// Apply a transition the scheduler reported as due. Transitions whose
    /// generation is no longer current are inert.
    pub fn apply_transition(
        &self,
        actor: &mut Actor,
        transition: &ScheduledTransition,
        ctx: &mut TickContext<'_>,
    ) -> bool {
        if transition.actor != actor.id || !ctx.scheduler.is_current(transition) {
            trace!(actor = ?actor.id, target = ?transition.target, "Ignoring superseded transition");
            return false;
        }
        if actor.state.is_terminal() {
            return false;
        }
        actor.pending = None;

        let Target { state, phase } = transition.target;
        match phase {
            Phase::Active => {
                let Timing::Phased { active, .. } = self.definition(state).timing else {
                    return false;
                };
                actor.phase = Phase::Active;
                actor.phase_elapsed = 0;
                actor.struck.clear();
                self.schedule(actor, active, Target::new(state, Phase::Recovery), ctx);
            }
            Phase::Recovery => {
                let Timing::Phased { recovery, .. } = self.definition(state).timing else {
                    return false;
                };
                actor.phase = Phase::Recovery;
                actor.phase_elapsed = 0;
                let follow = if state.is_airborne_attack() {
                    StateTag::Jump
                } else {
                    StateTag::Idle
                };
                self.schedule(actor, recovery, Target::settle(follow), ctx);
            }
            Phase::None => match state {
                StateTag::Idle => {
                    self.complete(actor, ctx);
                    self.land(actor);
                    self.enter_looping(actor, StateTag::Idle, ctx);
                }
                StateTag::Jump => {
                    self.complete(actor, ctx);
                    self.resume_jump(actor, ctx);
                }
                other => {
                    debug!(actor = ?actor.id, target = %other, "Unexpected settle target");
                    return false;
                }
            },
            Phase::Startup => return false,
        }
        true
    }

    /// Per-tick motion and phase bookkeeping
    pub fn advance(&self, actor: &mut Actor, ctx: &mut TickContext<'_>) {
        actor.phase_elapsed += 1;

        if actor.state.is_terminal() {
            if let Timing::Once { duration } = self.definition(actor.state).timing {
                if actor.phase_elapsed == duration {
                    self.complete(actor, ctx);
                }
            }
            return;
        }

        let stage = &self.tuning.stage;
        let fighters = &self.tuning.fighters;
        match actor.state {
            StateTag::Walk => {
                actor.x = PhysicsSystem::step(
                    actor.x,
                    actor.facing,
                    fighters.walk_speed,
                    actor.width,
                    stage.width,
                );
            }
            StateTag::Dash => {
                actor.x = PhysicsSystem::step(
                    actor.x,
                    actor.facing,
                    fighters.dash_speed,
                    actor.width,
                    stage.width,
                );
            }
            _ => {}
        }

        if let Some(arc) = actor.airborne {
            let elapsed = arc.elapsed(ctx.now);
            let lift = PhysicsSystem::jump_lift(elapsed, &self.arc);
            actor.y = actor.standing_y() - lift * self.tuning.jump.height;
            if elapsed < arc.total_ticks {
                actor.x = PhysicsSystem::clamp_to_stage(
                    actor.x + arc.dx_per_tick,
                    actor.width,
                    stage.width,
                );
            }
        }
    }

    /// A landed hit truncates whatever the actor was doing
    pub fn force_hit_stun(&self, actor: &mut Actor, ctx: &mut TickContext<'_>) {
        if actor.state.is_terminal() {
            return;
        }
        ctx.scheduler.invalidate(actor.id);
        self.land(actor);
        actor.state = StateTag::HitStun;
        actor.phase = Phase::None;
        actor.phase_elapsed = 0;
        let duration = self.definition(StateTag::HitStun).total_ticks();
        self.schedule(actor, duration, Target::settle(StateTag::Idle), ctx);
    }

    /// Unconditional knockout; terminal until reset
    pub fn force_death(&self, actor: &mut Actor, ctx: &mut TickContext<'_>) {
        if actor.state == StateTag::Death {
            return;
        }
        self.enter_terminal(actor, StateTag::Death, ctx);
        ctx.audio(actor.id, AudioCue::Knockdown);
    }

    /// Round won; terminal until reset
    pub fn force_victory(&self, actor: &mut Actor, ctx: &mut TickContext<'_>) {
        if actor.state.is_terminal() {
            return;
        }
        self.enter_terminal(actor, StateTag::Victory, ctx);
        ctx.audio(actor.id, AudioCue::Victory);
    }

    fn enter_terminal(&self, actor: &mut Actor, state: StateTag, ctx: &mut TickContext<'_>) {
        ctx.scheduler.invalidate(actor.id);
        self.land(actor);
        actor.pending = None;
        actor.state = state;
        actor.phase = Phase::None;
        actor.phase_elapsed = 0;
    }

    fn enter_looping(&self, actor: &mut Actor, state: StateTag, ctx: &mut TickContext<'_>) {
        ctx.scheduler.invalidate(actor.id);
        actor.pending = None;
        actor.state = state;
        actor.phase = Phase::None;
        actor.phase_elapsed = 0;
    }

    fn enter_timed(&self, actor: &mut Actor, state: StateTag, ctx: &mut TickContext<'_>) {
        actor.state = state;
        actor.phase = Phase::None;
        actor.phase_elapsed = 0;
        let duration = self.definition(state).total_ticks();
        self.schedule(actor, duration, Target::settle(StateTag::Idle), ctx);
    }

    fn can_afford(&self, actor: &Actor, state: StateTag) -> bool {
        !state.is_special() || actor.energy >= self.definition(state).energy_cost
    }

    fn start_attack(&self, actor: &mut Actor, state: StateTag, ctx: &mut TickContext<'_>) -> bool {
        let def = self.definition(state);
        let Timing::Phased { startup, .. } = def.timing else {
            return false;
        };
        if !self.can_afford(actor, state) {
            return false;
        }
        if state.is_special() {
            actor.set_energy(0.0);
        }

        actor.state = state;
        actor.phase = Phase::Startup;
        actor.phase_elapsed = 0;
        self.schedule(actor, startup, Target::new(state, Phase::Active), ctx);
        ctx.audio(actor.id, AudioCue::ActionStart { state });
        true
    }

    fn launch_jump(&self, actor: &mut Actor, dir: Option<Facing>, ctx: &mut TickContext<'_>) {
        let total = self.arc.total();
        let dx_per_tick = match dir {
            Some(d) if total > 0 => d.sign() * self.tuning.jump.distance / total as f32,
            _ => 0.0,
        };
        actor.airborne = Some(JumpArc {
            started_at: ctx.now,
            total_ticks: total,
            dx_per_tick,
        });
        actor.state = StateTag::Jump;
        actor.phase = Phase::None;
        actor.phase_elapsed = 0;
        self.schedule(actor, total, Target::settle(StateTag::Idle), ctx);
        ctx.audio(
            actor.id,
            AudioCue::ActionStart {
                state: StateTag::Jump,
            },
        );
    }

    /// Back to the jump state after an airborne attack, landing at once if
    /// the arc has already run out
    fn resume_jump(&self, actor: &mut Actor, ctx: &mut TickContext<'_>) {
        match actor.airborne {
            Some(arc) if arc.remaining(ctx.now) > 0 => {
                actor.state = StateTag::Jump;
                actor.phase = Phase::None;
                actor.phase_elapsed = arc.elapsed(ctx.now);
                self.schedule(
                    actor,
                    arc.remaining(ctx.now),
                    Target::settle(StateTag::Idle),
                    ctx,
                );
            }
            _ => {
                actor.state = StateTag::Jump;
                self.complete(actor, ctx);
                self.land(actor);
                self.enter_looping(actor, StateTag::Idle, ctx);
            }
        }
    }

    fn land(&self, actor: &mut Actor) {
        actor.airborne = None;
        actor.y = actor.standing_y();
    }

    /// Completion signal for the renderer
    fn complete(&self, actor: &Actor, ctx: &mut TickContext<'_>) {
        if !self.definition(actor.state).loops() {
            ctx.events.push(SimEvent::ActionComplete {
                actor: actor.id,
                state: actor.state,
            });
        }
    }

    fn schedule(&self, actor: &mut Actor, delay: u64, target: Target, ctx: &mut TickContext<'_>) {
        actor.pending = Some(ctx.scheduler.schedule(ctx.now, actor.id, delay, target));
    }
}
