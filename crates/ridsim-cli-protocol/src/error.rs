//! Error types for the control protocol.

use thiserror::Error;

/// Errors that can occur when working with the control protocol.
#[derive(Debug, Error)]
pub enum CliError {
    /// Buffer overflow (line too long).
    #[error("buffer overflow: max {max} bytes, got {actual}")]
    BufferOverflow { max: usize, actual: usize },
}

/// Result type alias for control protocol operations.
pub type CliResult<T> = Result<T, CliError>;
