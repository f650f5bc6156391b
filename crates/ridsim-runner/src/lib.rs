//! Runner for the Remote ID broadcast simulator.
//!
//! Loads a YAML configuration, builds an [`Engine`](ridsim_engine::Engine)
//! and ticks it against the wall clock while answering control lines.

pub mod config;
pub mod control;
pub mod radio;
pub mod realtime;
pub mod runner;

pub use config::{AuthConfig, RunnerConfig, RunnerError, RunnerResult};
pub use control::{read_lines, spawn_reader};
pub use radio::LogRadio;
pub use realtime::{RealTimeConfig, RealTimePacer, RealTimePacerStats};
pub use runner::{RunSummary, Runner, TICK_STEP_MS};
