//! Message definitions exchanged with the host collaborators
//! (renderer, audio, UI). These are plain serde types; there is no wire
//! format beyond the JSON-lines console bridge.

use serde::{Deserialize, Serialize};

use crate::game::actor::{ActorId, ActorSnapshot, StateTag};
use crate::game::input::Edge;
use crate::game::r#match::{MatchPhase, RoundEndReason, RoundOutcome};

/// Match-level commands from the host UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Leave the cover screen, or skip the opening sequence
    Start,
    Pause,
    Resume,
    /// Restart the current round
    Reset,
}

/// Messages sent from the host into the simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMsg {
    /// Raw key edge, resolved through the binding table
    Key { code: String, edge: Edge },

    /// Match control
    Command { command: Command },

    /// Stop the tick loop
    Shutdown,
}

/// Who an audio cue belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioCategory {
    Player,
    /// Boss voice set, keyed by level index
    Boss { level: usize },
}

/// Discrete sound triggers, fired once per qualifying transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum AudioCue {
    ActionStart { state: StateTag },
    HitLanded,
    Knockdown,
    Victory,
}

/// Transient visual effect kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    HitSpark,
    SpecialBurst,
}

/// A live effect as carried in snapshots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSnapshot {
    pub id: u64,
    pub kind: EffectKind,
    pub x: f32,
    pub y: f32,
    /// Ticks until the effect expires
    pub remaining_ticks: u64,
}

/// Events emitted by the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    /// Per-tick render state
    Snapshot {
        tick: u64,
        phase: MatchPhase,
        level: usize,
        round: u32,
        time_remaining: u32,
        paused: bool,
        camera_x: f32,
        actors: Vec<ActorSnapshot>,
        effects: Vec<EffectSnapshot>,
    },

    /// A non-looping action reached its final tick
    ActionComplete { actor: ActorId, state: StateTag },

    /// Sound trigger
    Audio {
        category: AudioCategory,
        cue: AudioCue,
    },

    /// A visual effect spawned at the defender
    Effect {
        id: u64,
        kind: EffectKind,
        x: f32,
        y: f32,
        lifetime_ticks: u64,
    },

    /// Hit registered
    Hit {
        attacker: ActorId,
        defender: ActorId,
        action: StateTag,
        damage: f32,
        defender_health: f32,
    },

    /// Match phase change
    PhaseChanged {
        phase: MatchPhase,
        level: usize,
        round: u32,
    },

    /// Round resolved
    RoundEnded {
        outcome: RoundOutcome,
        reason: RoundEndReason,
        player_health: f32,
        boss_health: f32,
    },

    /// Final level cleared and the ending played out
    MatchComplete { levels_cleared: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_msg_json_shape() {
        let msg: HostMsg =
            serde_json::from_str(r#"{"type":"key","code":"KeyJ","edge":"down"}"#).expect("parse");
        assert_eq!(
            msg,
            HostMsg::Key {
                code: "KeyJ".into(),
                edge: Edge::Down
            }
        );

        let msg: HostMsg =
            serde_json::from_str(r#"{"type":"command","command":"pause"}"#).expect("parse");
        assert_eq!(
            msg,
            HostMsg::Command {
                command: Command::Pause
            }
        );
    }

    #[test]
    fn test_audio_event_json_shape() {
        let event = SimEvent::Audio {
            category: AudioCategory::Boss { level: 2 },
            cue: AudioCue::ActionStart {
                state: StateTag::HeavyAttack,
            },
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], "audio");
        assert_eq!(value["category"]["kind"], "boss");
        assert_eq!(value["category"]["level"], 2);
        assert_eq!(value["cue"]["cue"], "action_start");
        assert_eq!(value["cue"]["state"], "heavy_attack");
    }
}
