//! Radio that writes advertising frames to the log.

use ridsim_cli_protocol::format_mac;
use ridsim_engine::{OutboundMessage, RadioTransmitter, TransmitStatus};
use tracing::debug;

/// Logs each frame as hex at debug level and reports it sent.
#[derive(Debug, Default)]
pub struct LogRadio {
    transmitted: u64,
    bytes: u64,
}

impl LogRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames transmitted so far.
    pub fn transmitted(&self) -> u64 {
        self.transmitted
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl RadioTransmitter for LogRadio {
    fn transmit_advertising(&mut self, message: &OutboundMessage) -> TransmitStatus {
        self.transmitted += 1;
        self.bytes += message.len() as u64;
        debug!(
            "Radio: adv #{} mac={} ssid='{}' counter={} data={}",
            self.transmitted,
            format_mac(&message.mac),
            message.ssid,
            message.counter(),
            hex::encode(message.payload())
        );
        TransmitStatus::Sent
    }
}
