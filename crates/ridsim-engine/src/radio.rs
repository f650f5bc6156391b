//! Radio transmitter interface.

use crate::queue::OutboundMessage;

/// Result of handing a message to the radio. Advisory only; messages are
/// never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitStatus {
    Sent,
    Busy,
    Failed,
}

impl TransmitStatus {
    pub fn as_label(self) -> &'static str {
        match self {
            TransmitStatus::Sent => "sent",
            TransmitStatus::Busy => "busy",
            TransmitStatus::Failed => "failed",
        }
    }
}

/// Sends framed advertising payloads.
pub trait RadioTransmitter {
    fn transmit_advertising(&mut self, message: &OutboundMessage) -> TransmitStatus;
}

/// Keeps every transmitted message. Used in tests and offline runs.
#[derive(Debug, Clone)]
pub struct RecordingRadio {
    pub sent: Vec<OutboundMessage>,
    status: TransmitStatus,
}

impl Default for RecordingRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRadio {
    pub fn new() -> Self {
        RecordingRadio {
            sent: Vec::new(),
            status: TransmitStatus::Sent,
        }
    }

    /// Report `status` for every following transmission.
    pub fn with_status(status: TransmitStatus) -> Self {
        RecordingRadio {
            sent: Vec::new(),
            status,
        }
    }

    /// Get the type nibbles of the recorded records, in order.
    pub fn kinds(&self) -> Vec<u8> {
        self.sent.iter().map(|m| m.record()[0] >> 4).collect()
    }
}

impl RadioTransmitter for RecordingRadio {
    fn transmit_advertising(&mut self, message: &OutboundMessage) -> TransmitStatus {
        self.sent.push(message.clone());
        self.status
    }
}
