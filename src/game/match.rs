//! Match state and the authoritative tick loop

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, Tuning};
use crate::host::protocol::{Command, EffectKind, EffectSnapshot, HostMsg, SimEvent};
use crate::util::time::{
    ms_to_ticks, ms_to_ticks_min1, ticks_to_ms, Timer, SIMULATION_TPS, TICK_DURATION_MICROS,
};

use super::actor::{ActorId, Roster, StateTag};
use super::ai::AiPolicy;
use super::camera::CameraController;
use super::clock::{MatchClock, Scheduler};
use super::combat::CombatSystem;
use super::input::{Edge, InputInterpreter};
use super::snapshot::SnapshotBuilder;
use super::state_machine::{StateMachine, TickContext};

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Title screen, waiting for a start command
    Cover,
    /// Timed intro scenes
    Opening,
    /// Pre-round countdown
    Setup,
    /// Round in progress
    Battle,
    /// Round decided, showing the outcome
    Result,
    /// Final level cleared
    Ending,
    Complete,
}

/// Round result from the human player's side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Win,
    Lose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    KnockOut,
    TimeUp,
}

/// A visual effect owned by the match; expires on its own
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveEffect {
    pub id: u64,
    pub kind: EffectKind,
    pub x: f32,
    pub y: f32,
    pub expires_at: u64,
}

impl ActiveEffect {
    pub fn snapshot(&self, now: u64) -> EffectSnapshot {
        EffectSnapshot {
            id: self.id,
            kind: self.kind,
            x: self.x,
            y: self.y,
            remaining_ticks: self.expires_at.saturating_sub(now),
        }
    }
}

/// Match state (owned by the match task)
#[derive(Debug, Clone)]
pub struct MatchState {
    pub id: Uuid,
    pub seed: u64,
    pub phase: MatchPhase,
    pub paused: bool,
    /// Index into the level table
    pub level: usize,
    /// 1-based round within the level
    pub round: u32,
    pub rounds_won: u32,
    /// Whole seconds left on the round clock
    pub time_remaining: u32,
    pub camera: CameraController,
    pub effects: Vec<ActiveEffect>,
    pub last_outcome: Option<RoundOutcome>,
    /// Ticks into the current round-clock second
    second_ticks: u32,
    /// Ticks left in a timed phase (opening scene, setup, result, ending)
    phase_ticks: u64,
    opening_scene: usize,
    next_effect_id: u64,
}

impl MatchState {
    pub fn new(id: Uuid, seed: u64, tuning: &Tuning) -> Self {
        Self {
            id,
            seed,
            phase: MatchPhase::Cover,
            paused: false,
            level: 0,
            round: 1,
            rounds_won: 0,
            time_remaining: tuning.round.seconds,
            camera: CameraController::new(&tuning.camera, &tuning.stage),
            effects: Vec::new(),
            last_outcome: None,
            second_ticks: 0,
            phase_ticks: 0,
            opening_scene: 0,
            next_effect_id: 1,
        }
    }
}

/// The pure stepped simulation: one call to [`Match::step`] is one tick
pub struct Match {
    state: MatchState,
    tuning: Arc<Tuning>,
    clock: MatchClock,
    scheduler: Scheduler,
    roster: Roster,
    machine: StateMachine,
    input: InputInterpreter,
    ai: AiPolicy,
}

impl Match {
    pub fn new(id: Uuid, seed: u64, tuning: Arc<Tuning>) -> Result<Self, ConfigError> {
        let machine = StateMachine::new(tuning.clone());
        let roster = Roster::new(machine.spawn(ActorId::Player), machine.spawn(ActorId::Boss));
        let special_cost = machine.definition(StateTag::Special).energy_cost;
        let ai = AiPolicy::new(&tuning.ai, special_cost, seed)?;
        let input = InputInterpreter::new(tuning.bindings.clone(), &tuning.input);

        let mut state = MatchState::new(id, seed, &tuning);
        let (p, b) = (roster.get(ActorId::Player).x, roster.get(ActorId::Boss).x);
        state.camera.snap(p, b);

        Ok(Self {
            state,
            tuning,
            clock: MatchClock::new(),
            scheduler: Scheduler::new(),
            roster,
            machine,
            input,
            ai,
        })
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    /// Feed a raw key edge from the host
    pub fn handle_key(&mut self, code: &str, edge: Edge) -> bool {
        self.input.handle_code(code, edge, self.clock.now())
    }

    /// Apply a host command. Returns any events it caused.
    pub fn command(&mut self, command: Command) -> Vec<SimEvent> {
        let mut events = Vec::new();
        match command {
            Command::Start => match self.state.phase {
                MatchPhase::Cover => self.begin_opening(&mut events),
                // Skip the rest of the intro
                MatchPhase::Opening => self.start_round(&mut events),
                _ => debug!(phase = ?self.state.phase, "Start ignored"),
            },
            Command::Pause => {
                if !matches!(self.state.phase, MatchPhase::Cover | MatchPhase::Complete) {
                    self.state.paused = true;
                }
            }
            Command::Resume => self.state.paused = false,
            Command::Reset => match self.state.phase {
                MatchPhase::Cover | MatchPhase::Opening => {}
                MatchPhase::Ending | MatchPhase::Complete => {
                    self.state.level = 0;
                    self.state.round = 1;
                    self.state.rounds_won = 0;
                    self.state.last_outcome = None;
                    self.state.paused = false;
                    self.start_round(&mut events);
                }
                _ => {
                    self.state.paused = false;
                    self.start_round(&mut events);
                }
            },
        }
        events
    }

    /// Advance the simulation by one tick. A paused match does not tick.
    pub fn step(&mut self) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if self.state.paused {
            return events;
        }
        let now = self.clock.advance();

        if self.state.phase != MatchPhase::Battle {
            // Edges outside battle are dropped, not queued
            let _ = self.input.poll(now, false);
        }

        match self.state.phase {
            MatchPhase::Cover | MatchPhase::Complete => {}
            MatchPhase::Opening => {
                if self.countdown() {
                    self.state.opening_scene += 1;
                    match self.tuning.round.opening_scenes_ms.get(self.state.opening_scene) {
                        Some(&ms) => self.state.phase_ticks = ms_to_ticks_min1(ms),
                        None => self.start_round(&mut events),
                    }
                }
            }
            MatchPhase::Setup => {
                self.animate(now, &mut events);
                if self.countdown() {
                    self.enter(MatchPhase::Battle, 0, &mut events);
                }
            }
            MatchPhase::Battle => self.battle_tick(now, &mut events),
            MatchPhase::Result => {
                self.animate(now, &mut events);
                if self.countdown() {
                    self.after_result(&mut events);
                }
            }
            MatchPhase::Ending => {
                if self.countdown() {
                    self.enter(MatchPhase::Complete, 0, &mut events);
                    let levels_cleared = self.tuning.levels.len();
                    info!(match_id = %self.state.id, levels_cleared, "Match complete");
                    events.push(SimEvent::MatchComplete { levels_cleared });
                }
            }
        }

        self.state.effects.retain(|e| e.expires_at > now);
        events
    }

    fn battle_tick(&mut self, now: u64, events: &mut Vec<SimEvent>) {
        let boss_snapshot = self.roster.get(ActorId::Boss).snapshot();
        let player_snapshot = self.roster.get(ActorId::Player).snapshot();
        let boss_intent = self.ai.decide(now, &boss_snapshot, &player_snapshot);

        let hits = {
            let mut ctx = TickContext {
                now,
                level: self.state.level,
                scheduler: &mut self.scheduler,
                events: &mut *events,
            };

            // Due transitions, then new intents, then motion
            for transition in ctx.scheduler.due(now) {
                let actor = self.roster.get_mut(transition.actor);
                self.machine.apply_transition(actor, &transition, &mut ctx);
            }
            // Decode keys against the post-transition state: a press on the
            // landing tick is a ground move, not an airborne one
            let player_airborne = self.roster.get(ActorId::Player).airborne.is_some();
            if let Some(intent) = self.input.poll(now, player_airborne) {
                let actor = self.roster.get_mut(ActorId::Player);
                self.machine.apply_intent(actor, intent, &mut ctx);
            }
            if let Some(intent) = boss_intent {
                let actor = self.roster.get_mut(ActorId::Boss);
                self.machine.apply_intent(actor, intent, &mut ctx);
            }
            for id in ActorId::ALL {
                self.machine.advance(self.roster.get_mut(id), &mut ctx);
            }

            let fighters = &self.tuning.fighters;
            CombatSystem::resolve(
                &mut self.roster,
                &self.machine,
                fighters.hurt_fraction_w,
                fighters.hurt_fraction_h,
                &mut ctx,
            )
        };
        for hit in hits {
            let kind = if hit.action.is_special() {
                EffectKind::SpecialBurst
            } else {
                EffectKind::HitSpark
            };
            self.spawn_effect(now, kind, hit.x, hit.y, events);
        }

        let (p, b) = self.positions();
        self.state.camera.update(p, b);

        self.state.second_ticks += 1;
        if self.state.second_ticks >= SIMULATION_TPS {
            self.state.second_ticks = 0;
            self.state.time_remaining = self.state.time_remaining.saturating_sub(1);
        }

        self.check_round_end(now, events);
    }

    /// Fire due transitions and advance animations outside of battle
    fn animate(&mut self, now: u64, events: &mut Vec<SimEvent>) {
        let mut ctx = TickContext {
            now,
            level: self.state.level,
            scheduler: &mut self.scheduler,
            events: &mut *events,
        };
        for transition in ctx.scheduler.due(now) {
            let actor = self.roster.get_mut(transition.actor);
            self.machine.apply_transition(actor, &transition, &mut ctx);
        }
        for id in ActorId::ALL {
            self.machine.advance(self.roster.get_mut(id), &mut ctx);
        }
    }

    fn check_round_end(&mut self, now: u64, events: &mut Vec<SimEvent>) {
        let player = self.roster.get(ActorId::Player);
        let boss = self.roster.get(ActorId::Boss);

        let reason = if !player.is_alive() || !boss.is_alive() {
            RoundEndReason::KnockOut
        } else if self.state.time_remaining == 0 {
            RoundEndReason::TimeUp
        } else {
            return;
        };

        // Ties and double knockouts go to the boss
        let outcome = if player.health > boss.health {
            RoundOutcome::Win
        } else {
            RoundOutcome::Lose
        };
        let (player_health, boss_health) = (player.health, boss.health);
        let winner = match outcome {
            RoundOutcome::Win => ActorId::Player,
            RoundOutcome::Lose => ActorId::Boss,
        };

        let mut ctx = TickContext {
            now,
            level: self.state.level,
            scheduler: &mut self.scheduler,
            events: &mut *events,
        };
        let (w, l) = self.roster.pair_mut(winner);
        if w.is_alive() {
            self.machine.force_victory(w, &mut ctx);
        } else {
            self.machine.force_death(w, &mut ctx);
        }
        self.machine.force_death(l, &mut ctx);

        info!(
            match_id = %self.state.id,
            level = self.state.level,
            round = self.state.round,
            ?outcome,
            ?reason,
            player_health,
            boss_health,
            match_time_ms = ticks_to_ms(now),
            "Round ended"
        );
        events.push(SimEvent::RoundEnded {
            outcome,
            reason,
            player_health,
            boss_health,
        });
        self.state.last_outcome = Some(outcome);
        self.enter(
            MatchPhase::Result,
            ms_to_ticks_min1(self.tuning.round.result_ms),
            events,
        );
    }

    fn after_result(&mut self, events: &mut Vec<SimEvent>) {
        match self.state.last_outcome {
            Some(RoundOutcome::Win) => {
                self.state.rounds_won += 1;
                let needed = self
                    .tuning
                    .levels
                    .get(self.state.level)
                    .map(|l| l.rounds)
                    .unwrap_or(1);
                if self.state.rounds_won < needed {
                    self.state.round += 1;
                    self.start_round(events);
                    return;
                }

                self.state.level += 1;
                self.state.round = 1;
                self.state.rounds_won = 0;
                if self.state.level >= self.tuning.levels.len() {
                    self.state.level = self.tuning.levels.len().saturating_sub(1);
                    self.enter(
                        MatchPhase::Ending,
                        ms_to_ticks_min1(self.tuning.round.ending_ms),
                        events,
                    );
                } else {
                    info!(
                        match_id = %self.state.id,
                        level = self.state.level,
                        boss = %self.tuning.levels[self.state.level].boss,
                        "Next level"
                    );
                    self.start_round(events);
                }
            }
            // A lost round is fought again
            _ => self.start_round(events),
        }
    }

    fn begin_opening(&mut self, events: &mut Vec<SimEvent>) {
        self.state.opening_scene = 0;
        match self.tuning.round.opening_scenes_ms.first() {
            Some(&ms) => self.enter(MatchPhase::Opening, ms_to_ticks_min1(ms), events),
            None => self.start_round(events),
        }
    }

    /// Re-seed both fighters and count into a fresh round
    fn start_round(&mut self, events: &mut Vec<SimEvent>) {
        let now = self.clock.now();
        self.scheduler.clear();
        {
            let mut ctx = TickContext {
                now,
                level: self.state.level,
                scheduler: &mut self.scheduler,
                events: &mut *events,
            };
            for id in ActorId::ALL {
                self.machine.respawn(self.roster.get_mut(id), &mut ctx);
            }
        }
        self.ai.reset(now);
        self.input.reset();
        self.state.effects.clear();
        self.state.time_remaining = self.tuning.round.seconds;
        self.state.second_ticks = 0;
        let (p, b) = self.positions();
        self.state.camera.snap(p, b);
        self.enter(
            MatchPhase::Setup,
            ms_to_ticks_min1(self.tuning.round.setup_ms),
            events,
        );
    }

    fn enter(&mut self, phase: MatchPhase, ticks: u64, events: &mut Vec<SimEvent>) {
        debug!(from = ?self.state.phase, to = ?phase, "Phase change");
        self.state.phase = phase;
        self.state.phase_ticks = ticks;
        events.push(SimEvent::PhaseChanged {
            phase,
            level: self.state.level,
            round: self.state.round,
        });
    }

    /// Count down the timed phase; true when it runs out this tick
    fn countdown(&mut self) -> bool {
        self.state.phase_ticks = self.state.phase_ticks.saturating_sub(1);
        self.state.phase_ticks == 0
    }

    fn spawn_effect(&mut self, now: u64, kind: EffectKind, x: f32, y: f32, events: &mut Vec<SimEvent>) {
        let id = self.state.next_effect_id;
        self.state.next_effect_id += 1;
        let lifetime_ticks = ms_to_ticks(self.tuning.round.effect_lifetime_ms).max(1);
        self.state.effects.push(ActiveEffect {
            id,
            kind,
            x,
            y,
            expires_at: now + lifetime_ticks,
        });
        events.push(SimEvent::Effect {
            id,
            kind,
            x,
            y,
            lifetime_ticks,
        });
    }

    fn positions(&self) -> (f32, f32) {
        (
            self.roster.get(ActorId::Player).x,
            self.roster.get(ActorId::Boss).x,
        )
    }
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<HostMsg>,
    pub event_tx: broadcast::Sender<SimEvent>,
}

impl MatchHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.event_tx.subscribe()
    }
}

/// The match task: owns the simulation and drives it on a fixed interval
pub struct GameMatch {
    sim: Match,
    input_rx: mpsc::Receiver<HostMsg>,
    event_tx: broadcast::Sender<SimEvent>,
    snapshot_builder: SnapshotBuilder,
}

impl GameMatch {
    /// Create a new match
    pub fn new(
        id: Uuid,
        seed: u64,
        tuning: Arc<Tuning>,
        snapshot_interval: u32,
    ) -> Result<(Self, MatchHandle), ConfigError> {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(256);

        let handle = MatchHandle {
            id,
            input_tx,
            event_tx: event_tx.clone(),
        };

        let game_match = Self {
            sim: Match::new(id, seed, tuning)?,
            input_rx,
            event_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
        };

        Ok((game_match, handle))
    }

    /// Run the authoritative tick loop until shutdown or match completion
    pub async fn run(mut self) {
        info!(match_id = %self.sim.state.id, seed = self.sim.state.seed, "Match started");

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            let timer = Timer::new();

            // Drain host messages
            if !self.process_inputs() {
                info!(match_id = %self.sim.state.id, "Shutdown requested");
                break;
            }

            // Run simulation tick
            let events = self.sim.step();
            self.publish(events);

            if self.snapshot_builder.should_send() {
                let snapshot = self.snapshot_builder.build(&self.sim);
                let _ = self.event_tx.send(snapshot);
            }

            if self.sim.phase() == MatchPhase::Complete {
                info!(match_id = %self.sim.state.id, "Match ended");
                break;
            }

            let elapsed = timer.elapsed_micros();
            if elapsed > TICK_DURATION_MICROS {
                warn!(tick = self.sim.now(), elapsed_micros = elapsed, "Tick overran its budget");
            }
        }
    }

    /// Apply everything queued by the host. False once the host asked to
    /// stop or went away.
    fn process_inputs(&mut self) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(HostMsg::Key { code, edge }) => {
                    self.sim.handle_key(&code, edge);
                }
                Ok(HostMsg::Command { command }) => {
                    let events = self.sim.command(command);
                    self.publish(events);
                }
                Ok(HostMsg::Shutdown) => return false,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Broadcast events; nobody listening is not an error
    fn publish(&mut self, events: Vec<SimEvent>) {
        for event in events {
            if matches!(event, SimEvent::PhaseChanged { .. } | SimEvent::RoundEnded { .. }) {
                self.snapshot_builder.force_next();
            }
            let _ = self.event_tx.send(event);
        }
    }
}
