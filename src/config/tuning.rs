//! Load-time tuning table: action timing and geometry, bindings, levels,
//! stage, camera and AI parameters.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::game::actor::StateTag;
use crate::game::input::Key;
use crate::game::physics::{ArcTiming, Rect};
use crate::util::time::{ms_to_ticks, ms_to_ticks_min1};

use super::ConfigError;

/// Table shipped with the binary
const BUILTIN_TUNING: &str = include_str!("../../data/tuning.json");

/// How an action's time is structured (all values in ticks)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    /// Held for as long as the intent persists
    Looping,
    /// Single shot with no sub-phases
    Once { duration: u64 },
    /// Startup, active and recovery windows
    Phased {
        startup: u64,
        active: u64,
        recovery: u64,
    },
}

/// Validated per-state definition
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDefinition {
    pub state: StateTag,
    pub timing: Timing,
    /// Forward-extending hit-box, body-relative as if facing right
    pub hit_box: Option<Rect>,
    /// Body-relative hurt-box overriding the default centered fraction
    pub hurt_box: Option<Rect>,
    pub damage: f32,
    pub energy_gain: f32,
    pub energy_cost: f32,
    /// Whether a landed hit truncates this action into hit-stun
    pub interruptible: bool,
}

impl ActionDefinition {
    pub fn loops(&self) -> bool {
        matches!(self.timing, Timing::Looping)
    }

    /// Total length in ticks, zero for looping states
    pub fn total_ticks(&self) -> u64 {
        match self.timing {
            Timing::Looping => 0,
            Timing::Once { duration } => duration,
            Timing::Phased {
                startup,
                active,
                recovery,
            } => startup + active + recovery,
        }
    }
}

/// Definitions for every [`StateTag`], indexed by tag
#[derive(Debug, Clone)]
pub struct ActionTable {
    defs: Vec<ActionDefinition>,
}

impl ActionTable {
    pub fn get(&self, state: StateTag) -> &ActionDefinition {
        &self.defs[state.index()]
    }
}

/// Raw per-state entry as written in the table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAction {
    startup_ms: Option<u64>,
    active_ms: Option<u64>,
    recovery_ms: Option<u64>,
    duration_ms: Option<u64>,
    hit_box: Option<Rect>,
    hurt_box: Option<Rect>,
    #[serde(default)]
    damage: f32,
    #[serde(default)]
    energy_gain: f32,
    #[serde(default)]
    energy_cost: f32,
    #[serde(default = "default_true")]
    interruptible: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RawAction {
    fn default() -> Self {
        Self {
            startup_ms: None,
            active_ms: None,
            recovery_ms: None,
            duration_ms: None,
            hit_box: None,
            hurt_box: None,
            damage: 0.0,
            energy_gain: 0.0,
            energy_cost: 0.0,
            interruptible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LevelSpec {
    /// Boss identity for this level
    pub boss: String,
    /// Rounds the player must win to clear the level
    pub rounds: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StageSpec {
    pub width: f32,
    pub viewport_width: f32,
    /// Y of the floor; bodies stand with their bottom edge here
    pub ground_y: f32,
    pub body_width: f32,
    pub body_height: f32,
    pub player_spawn_x: f32,
    pub boss_spawn_x: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FighterSpec {
    pub max_health: f32,
    pub max_energy: f32,
    /// Pixels per tick
    pub walk_speed: f32,
    /// Pixels per tick
    pub dash_speed: f32,
    /// Default hurt-box as a centered fraction of the body
    pub hurt_fraction_w: f32,
    pub hurt_fraction_h: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JumpSpec {
    pub ascend_ms: u64,
    pub apex_ms: u64,
    pub descend_ms: u64,
    pub height: f32,
    /// Horizontal distance covered by a directional jump
    pub distance: f32,
}

impl JumpSpec {
    pub fn timing(&self) -> ArcTiming {
        ArcTiming {
            ascend: ms_to_ticks_min1(self.ascend_ms),
            apex: ms_to_ticks(self.apex_ms),
            descend: ms_to_ticks_min1(self.descend_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CameraSpec {
    /// Exponential smoothing factor in (0, 1]
    pub smoothing: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AiWeights {
    pub attack: u32,
    pub special: u32,
    pub block: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AiSpec {
    pub decision_min_ms: u64,
    pub decision_max_ms: u64,
    /// Beyond this horizontal distance the AI closes in instead of swinging
    pub proximity: f32,
    /// Delay after a decision before the AI settles back to idle
    pub settle_ms: u64,
    pub weights: AiWeights,
    /// Attack states the "attack" outcome picks from
    pub attacks: Vec<StateTag>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RoundSpec {
    pub seconds: u32,
    /// Durations of the opening scene sequence
    pub opening_scenes_ms: Vec<u64>,
    pub setup_ms: u64,
    pub result_ms: u64,
    pub ending_ms: u64,
    pub effect_lifetime_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputSpec {
    pub dash_window_ms: u64,
    pub buffer_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTuning {
    actions: HashMap<StateTag, RawAction>,
    bindings: HashMap<String, Key>,
    levels: Vec<LevelSpec>,
    stage: StageSpec,
    fighters: FighterSpec,
    jump: JumpSpec,
    camera: CameraSpec,
    ai: AiSpec,
    round: RoundSpec,
    input: InputSpec,
}

/// The complete validated tuning table
#[derive(Debug, Clone)]
pub struct Tuning {
    pub actions: ActionTable,
    pub bindings: HashMap<String, Key>,
    pub levels: Vec<LevelSpec>,
    pub stage: StageSpec,
    pub fighters: FighterSpec,
    pub jump: JumpSpec,
    pub camera: CameraSpec,
    pub ai: AiSpec,
    pub round: RoundSpec,
    pub input: InputSpec,
}

impl Tuning {
    /// The table embedded in the binary
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(BUILTIN_TUNING)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON table
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawTuning = serde_json::from_str(text)?;
        Self::validate(raw)
    }

    fn validate(raw: RawTuning) -> Result<Self, ConfigError> {
        let arc_ticks = raw.jump.timing().total();
        let defs = StateTag::ALL
            .iter()
            .map(|&state| build_action(state, raw.actions.get(&state), arc_ticks))
            .collect::<Result<Vec<_>, _>>()?;

        if raw.levels.is_empty() {
            return Err(ConfigError::Invalid("level table is empty".into()));
        }
        if let Some(level) = raw.levels.iter().find(|l| l.rounds == 0) {
            return Err(ConfigError::Invalid(format!(
                "level with boss {} has zero rounds",
                level.boss
            )));
        }

        let stage = &raw.stage;
        if stage.viewport_width > stage.width {
            return Err(ConfigError::Invalid(
                "viewport is wider than the stage".into(),
            ));
        }
        if stage.body_width <= 0.0 || stage.body_height <= 0.0 {
            return Err(ConfigError::Invalid("body size must be positive".into()));
        }

        let fighters = &raw.fighters;
        if fighters.max_health <= 0.0 || fighters.max_energy <= 0.0 {
            return Err(ConfigError::Invalid(
                "max health and max energy must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&fighters.hurt_fraction_w)
            || !(0.0..=1.0).contains(&fighters.hurt_fraction_h)
        {
            return Err(ConfigError::Invalid(
                "hurt-box fractions must be within [0, 1]".into(),
            ));
        }

        if !(raw.camera.smoothing > 0.0 && raw.camera.smoothing <= 1.0) {
            return Err(ConfigError::Invalid(
                "camera smoothing must be within (0, 1]".into(),
            ));
        }

        let ai = &raw.ai;
        if ai.decision_min_ms > ai.decision_max_ms {
            return Err(ConfigError::Invalid(
                "AI decision interval min exceeds max".into(),
            ));
        }
        if ai.weights.attack + ai.weights.special + ai.weights.block == 0 {
            return Err(ConfigError::Invalid("AI weights are all zero".into()));
        }
        if ai.attacks.is_empty() && ai.weights.attack > 0 {
            return Err(ConfigError::Invalid("AI attack pool is empty".into()));
        }
        if let Some(bad) = ai.attacks.iter().find(|s| !s.is_attack() || s.is_special()) {
            return Err(ConfigError::Invalid(format!(
                "AI attack pool contains non-attack state {bad}"
            )));
        }

        if raw.input.buffer_capacity < 2 {
            return Err(ConfigError::Invalid(
                "input buffer must hold at least two edges".into(),
            ));
        }

        Ok(Self {
            actions: ActionTable { defs },
            bindings: raw.bindings,
            levels: raw.levels,
            stage: raw.stage,
            fighters: raw.fighters,
            jump: raw.jump,
            camera: raw.camera,
            ai: raw.ai,
            round: raw.round,
            input: raw.input,
        })
    }
}

fn require(state: StateTag, value: Option<u64>, field: &'static str) -> Result<u64, ConfigError> {
    value.ok_or(ConfigError::MissingPhase { state, field })
}

fn build_action(
    state: StateTag,
    raw: Option<&RawAction>,
    arc_ticks: u64,
) -> Result<ActionDefinition, ConfigError> {
    let raw = raw.cloned().unwrap_or_default();

    let timing = if state.is_attack() {
        Timing::Phased {
            startup: ms_to_ticks_min1(require(state, raw.startup_ms, "startup_ms")?),
            active: ms_to_ticks_min1(require(state, raw.active_ms, "active_ms")?),
            recovery: ms_to_ticks_min1(require(state, raw.recovery_ms, "recovery_ms")?),
        }
    } else {
        match state {
            StateTag::HitStun | StateTag::Dash | StateTag::Death | StateTag::Victory => {
                Timing::Once {
                    duration: ms_to_ticks_min1(require(state, raw.duration_ms, "duration_ms")?),
                }
            }
            StateTag::Jump => Timing::Once {
                duration: arc_ticks,
            },
            _ => Timing::Looping,
        }
    };

    if state.is_attack() && raw.hit_box.is_none() {
        return Err(ConfigError::MissingGeometry { state });
    }

    Ok(ActionDefinition {
        state,
        timing,
        hit_box: raw.hit_box,
        hurt_box: raw.hurt_box,
        damage: raw.damage.max(0.0),
        energy_gain: raw.energy_gain.max(0.0),
        energy_cost: raw.energy_cost.max(0.0),
        interruptible: raw.interruptible,
    })
}
