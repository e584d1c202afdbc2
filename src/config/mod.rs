//! Configuration module - environment variables and the tuning table

pub mod tuning;

pub use tuning::{
    ActionDefinition, ActionTable, AiSpec, AiWeights, CameraSpec, FighterSpec, InputSpec,
    JumpSpec, LevelSpec, RoundSpec, StageSpec, Timing, Tuning,
};

use std::env;
use std::path::PathBuf;

use crate::game::actor::StateTag;

/// Process configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Seed for the AI's random source; derived from the match id when unset
    pub seed: Option<u64>,
    /// Optional tuning table on disk; the embedded table is used otherwise
    pub tuning_path: Option<PathBuf>,
    /// Ticks between render snapshots
    pub snapshot_interval: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let seed = match env::var("MATCH_SEED") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidEnv("MATCH_SEED", raw))?,
            ),
            Err(_) => None,
        };

        let snapshot_interval = match env::var("SNAPSHOT_INTERVAL") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidEnv("SNAPSHOT_INTERVAL", raw)),
            },
            Err(_) => 1,
        };

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            seed,
            tuning_path: env::var("TUNING_PATH").ok().map(PathBuf::from),
            snapshot_interval,
        })
    }

    /// Load and validate the tuning table this config points at
    pub fn load_tuning(&self) -> Result<Tuning, ConfigError> {
        match &self.tuning_path {
            Some(path) => Tuning::from_file(path),
            None => Tuning::builtin(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    InvalidEnv(&'static str, String),

    #[error("Failed to read tuning file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed tuning table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Action {state} is missing required field {field}")]
    MissingPhase {
        state: StateTag,
        field: &'static str,
    },

    #[error("Action {state} has no hit_box")]
    MissingGeometry { state: StateTag },

    #[error("Invalid tuning: {0}")]
    Invalid(String),
}
