//! Remote ID Control Protocol
//!
//! This crate provides types and utilities for talking to the broadcast engine
//! over its control channel. The channel is a simple line-based text protocol:
//! every line starts with a short literal tag and carries a `|`-delimited
//! attribute list.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → engine): ASCII lines terminated with `\n`, trimmed
//! - **Responses** (engine → host): ASCII lines terminated with `\r\n`
//! - **Unknown tags**: answered with the negative acknowledgement `$-`
//!
//! # Command Tags
//!
//! Tags are matched by exact, case-sensitive prefix in a fixed order
//! (see [`COMMAND_TABLE`]); the first match wins.
//!
//! - `$R` - restart request, no response
//! - `$V` - firmware version
//! - `$C` - live telemetry line
//! - `$D` - full parameter/state/path dump
//! - `$SD` - store identity, position and operational parameters
//! - `$SM` - store modes and rewrite the path program
//!
//! # Example
//!
//! ```rust
//! use ridsim_cli_protocol::{Command, Response};
//!
//! let cmd = Command::parse("$V").unwrap();
//! assert_eq!(cmd, Command::Version);
//!
//! let line = Response::Version { version: 1008 }.to_line();
//! assert_eq!(line, "$V|1008");
//! ```

mod codec;
mod commands;
mod error;
mod fields;
mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use fields::*;
pub use responses::*;
