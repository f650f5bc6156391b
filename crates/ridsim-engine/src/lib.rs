//! Remote ID broadcast engine.
//!
//! This crate simulates an aircraft broadcasting ASTM F3411 Remote ID
//! messages. It provides:
//! - A parameter and kinematic store for the aircraft identity and state
//! - A path model (idle, random walk, scripted path)
//! - A 40-phase broadcast scheduler multiplexing the six message kinds
//! - A fixed-capacity outbound queue paced independently of production
//! - Handlers for the line-based control protocol
//!
//! Everything runs on one thread, driven by [`Engine::tick`]. Radio
//! transmission and message encoding sit behind the [`RadioTransmitter`]
//! and [`MessageEncoder`] traits.
//!
//! # Example
//!
//! ```rust
//! use ridsim_engine::{Engine, EngineConfig, RecordingRadio, RuntimeSettings};
//!
//! let settings = RuntimeSettings {
//!     uas_id: "SN-0001".to_string(),
//!     id_type: 1,
//!     ..Default::default()
//! };
//! let mut engine = Engine::new(EngineConfig::default(), settings);
//! let mut radio = RecordingRadio::new();
//!
//! for now_ms in (0..1_000).step_by(5) {
//!     engine.tick(now_ms, &mut radio);
//! }
//! assert!(!radio.sent.is_empty());
//!
//! let outcome = engine.handle_line("$V");
//! assert_eq!(outcome.response.unwrap().to_line(), "$V|1008");
//! ```

pub mod clock;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod geo;
pub mod identity;
pub mod odid;
pub mod path;
pub mod queue;
pub mod radio;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod telemetry;

pub use clock::{FixedWallClock, SystemWallClock, WallClock, WallTime};
pub use encoder::{MessageEncoder, OdidEncoder, Record};
pub use engine::{CommandAction, CommandOutcome, Engine};
pub use error::{EncodeError, EncodeResult};
pub use geo::LatLon;
pub use odid::MessageKind;
pub use path::{PathEntry, PathModel, PathProgram};
pub use queue::{OutboundMessage, OutboundQueue, QUEUE_CAPACITY};
pub use radio::{RadioTransmitter, RecordingRadio, TransmitStatus};
pub use scheduler::{slot_for_phase, PhaseSlot, Scheduler};
pub use settings::{
    AppMode, EngineConfig, ExternalSettings, FlyMode, Geofence, PathMode, RuntimeSettings,
    ShiftMode, FIRMWARE_VERSION,
};
pub use store::Store;
pub use telemetry::{TelemetrySnapshot, TelemetryStage};
