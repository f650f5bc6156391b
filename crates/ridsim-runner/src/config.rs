//! Runner configuration.
//!
//! The YAML file has three optional blocks:
//!
//! ```yaml
//! engine:
//!   scheduler_interval_ms: 75
//!   rng_seed: 42
//! settings:
//!   uas_id: SN-0001
//!   id_type: 1
//!   lat: 47.6
//!   lng: -122.3
//! auth:
//!   auth_type: 1
//!   data: "00112233"
//! ```

use std::fs;
use std::path::Path;

use ridsim_engine::{Engine, EngineConfig, RuntimeSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while configuring or running the simulator.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Failed to read a file or write a response.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed YAML configuration.
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Authentication data is not valid hex.
    #[error("invalid auth data: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Realtime speed multiplier must be positive.
    #[error("invalid realtime speed {0}, must be positive")]
    InvalidSpeed(f64),

    /// Control channel closed unexpectedly.
    #[error("control channel closed")]
    ChannelClosed,

    /// Could not install the Ctrl-C handler.
    #[error("signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// Could not start the metrics exporter.
    #[error("metrics exporter: {0}")]
    Metrics(String),
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

// ============================================================================
// Config
// ============================================================================

/// Authentication blob broadcast through Auth messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub auth_type: u8,
    /// Blob as a hex string.
    pub data: String,
}

impl AuthConfig {
    /// Decode the hex blob.
    pub fn blob(&self) -> RunnerResult<Vec<u8>> {
        Ok(hex::decode(self.data.trim())?)
    }
}

/// Complete runner configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub engine: EngineConfig,
    pub settings: RuntimeSettings,
    pub auth: Option<AuthConfig>,
}

impl RunnerConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> RunnerResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> RunnerResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Build an engine from `settings`, loading the configured auth blob.
    ///
    /// The settings are passed separately so a restart can carry the ones
    /// written over the control channel.
    pub fn build_engine(&self, settings: RuntimeSettings) -> RunnerResult<Engine> {
        let mut engine = Engine::new(self.engine.clone(), settings);
        if let Some(auth) = &self.auth {
            engine.set_auth(&auth.blob()?, auth.auth_type);
        }
        Ok(engine)
    }
}
