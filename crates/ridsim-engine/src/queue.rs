//! Outbound message queue.
//!
//! A fixed-capacity FIFO between the scheduler, which produces a record
//! every few phases, and the radio, which is drained on its own cadence.
//! When the queue is full the oldest unread message is dropped to make room;
//! the overwrite is counted, never reported as an error.

use heapless::Deque;
use ridsim_metrics::metric_defs;
use tracing::trace;

use crate::encoder::Record;
use crate::store::SsidText;

/// Default queue capacity.
pub const QUEUE_CAPACITY: usize = 100;

/// Size of the advertising payload buffer.
pub const PAYLOAD_CAPACITY: usize = 36;

/// Service-data header in front of every record: AD length, AD type
/// (service data), the ASTM UUID `0xfffa` and the app code.
pub const SERVICE_DATA_PREFIX: [u8; 5] = [0x1e, 0x16, 0xfa, 0xff, 0x0d];

/// A framed record waiting for the radio.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub mac: [u8; 6],
    pub ssid: SsidText,
    payload: [u8; PAYLOAD_CAPACITY],
    len: usize,
}

impl OutboundMessage {
    /// Frame `record` behind the service-data prefix and message counter.
    pub fn frame(mac: [u8; 6], ssid: &SsidText, counter: u8, record: &Record) -> Self {
        let mut payload = [0u8; PAYLOAD_CAPACITY];
        let prefix = SERVICE_DATA_PREFIX.len();
        payload[..prefix].copy_from_slice(&SERVICE_DATA_PREFIX);
        payload[prefix] = counter;
        let len = (prefix + 1 + record.len()).min(PAYLOAD_CAPACITY);
        payload[prefix + 1..len].copy_from_slice(&record[..len - prefix - 1]);

        OutboundMessage {
            mac,
            ssid: ssid.clone(),
            payload,
            len,
        }
    }

    /// Get the framed payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the per-kind message counter.
    pub fn counter(&self) -> u8 {
        self.payload[SERVICE_DATA_PREFIX.len()]
    }

    /// Get the 25-byte record behind the prefix.
    pub fn record(&self) -> &[u8] {
        &self.payload[SERVICE_DATA_PREFIX.len() + 1..self.len]
    }
}

/// Fixed-capacity FIFO of outbound messages.
#[derive(Debug)]
pub struct OutboundQueue<const N: usize = QUEUE_CAPACITY> {
    entries: Deque<OutboundMessage, N>,
    overwrites: u64,
}

impl<const N: usize> Default for OutboundQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> OutboundQueue<N> {
    pub fn new() -> Self {
        OutboundQueue {
            entries: Deque::new(),
            overwrites: 0,
        }
    }

    /// Append a message, dropping the oldest one if full. Returns true when
    /// a message was overwritten.
    pub fn enqueue(&mut self, message: OutboundMessage) -> bool {
        let overwrote = if self.entries.is_full() {
            if let Some(dropped) = self.entries.pop_front() {
                trace!(
                    "OutboundQueue: full, dropping counter {} for {}",
                    dropped.counter(),
                    dropped.ssid
                );
            }
            self.overwrites += 1;
            metrics::counter!(metric_defs::QUEUE_OVERWRITES.name).increment(1);
            true
        } else {
            false
        };

        // Space was made above.
        let _ = self.entries.push_back(message);
        metrics::counter!(metric_defs::QUEUE_ENQUEUED.name).increment(1);
        metrics::gauge!(metric_defs::QUEUE_DEPTH.name).set(self.entries.len() as f64);
        overwrote
    }

    /// Take the oldest message.
    pub fn dequeue(&mut self) -> Option<OutboundMessage> {
        let message = self.entries.pop_front();
        if message.is_some() {
            metrics::gauge!(metric_defs::QUEUE_DEPTH.name).set(self.entries.len() as f64);
        }
        message
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Get the number of messages dropped to make room.
    pub fn overwrites(&self) -> u64 {
        self.overwrites
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
