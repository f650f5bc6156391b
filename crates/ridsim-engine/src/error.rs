//! Error types for the engine crate.

use thiserror::Error;

/// Errors raised while encoding a broadcast record.
///
/// These never abort a tick: the scheduler logs them and skips the slot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    /// Latitude outside [-90, 90].
    #[error("Latitude {0} is out of range")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180].
    #[error("Longitude {0} is out of range")]
    InvalidLongitude(f64),

    /// Direction outside [0, 360] that is not the invalid marker.
    #[error("Direction {0} is out of range")]
    InvalidDirection(f32),

    /// Authentication page number beyond the protocol maximum.
    #[error("Auth page {page} exceeds the last page index {max}")]
    InvalidAuthPage {
        /// Requested page.
        page: u8,
        /// Largest allowed page number.
        max: u8,
    },
}

/// Result type for encoder operations.
pub type EncodeResult<T> = Result<T, EncodeError>;
