//! Broadcast scheduler.
//!
//! A 40-phase state machine advanced once per scheduler interval. Each phase
//! maps to at most one message kind; see [`slot_for_phase`]. Location goes
//! out every fourth phase and System every eighth, while the identity
//! messages and authentication pages each get one phase per cycle.
//!
//! Every produced record is framed with a per-kind message counter before
//! it is queued.

use rand::Rng;
use tracing::debug;

use crate::clock::WallTime;
use crate::encoder::{MessageEncoder, Record};
use crate::error::EncodeResult;
use crate::odid::{
    AuthPage, IdType, MessageKind, AUTH_MAX_PAGES, AUTH_PAGE_NONZERO_DATA_SIZE,
    AUTH_PAGE_ZERO_DATA_SIZE, MAX_AUTH_LENGTH,
};
use crate::queue::OutboundMessage;
use crate::store::{SsidText, Store};

/// Number of scheduler phases per cycle.
pub const PHASE_COUNT: u8 = 40;

/// Largest authentication blob; the page 0 length field is one byte.
pub const AUTH_BLOB_LIMIT: usize = if MAX_AUTH_LENGTH < u8::MAX as usize {
    MAX_AUTH_LENGTH
} else {
    u8::MAX as usize
};

/// What a phase produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSlot {
    Location,
    System,
    /// Basic ID from slot 0 (primary id type) or 1 (secondary).
    BasicId(usize),
    SelfId,
    OperatorId,
    /// Next authentication page, round-robin.
    Auth,
    Idle,
}

impl PhaseSlot {
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            PhaseSlot::Location => Some(MessageKind::Location),
            PhaseSlot::System => Some(MessageKind::System),
            PhaseSlot::BasicId(_) => Some(MessageKind::BasicId),
            PhaseSlot::SelfId => Some(MessageKind::SelfId),
            PhaseSlot::OperatorId => Some(MessageKind::OperatorId),
            PhaseSlot::Auth => Some(MessageKind::Auth),
            PhaseSlot::Idle => None,
        }
    }
}

/// Map a phase in `[0, 40)` to its slot.
pub fn slot_for_phase(phase: u8) -> PhaseSlot {
    match phase {
        p if p % 4 == 0 => PhaseSlot::Location,
        6 | 14 | 22 | 30 | 38 => PhaseSlot::System,
        2 => PhaseSlot::BasicId(0),
        10 => PhaseSlot::BasicId(1),
        18 => PhaseSlot::SelfId,
        26 => PhaseSlot::OperatorId,
        34 => PhaseSlot::Auth,
        _ => PhaseSlot::Idle,
    }
}

/// Relative jitter in `[-0.1, 0.1]` in steps of 0.0001.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(0..=2000u32) as f64 / 10_000.0 - 0.1
}

// ============================================================================
// Authentication Pages
// ============================================================================

/// An authentication blob split into pages, served round-robin.
#[derive(Debug, Clone, Default)]
pub struct AuthPages {
    pages: heapless::Vec<AuthPage, AUTH_MAX_PAGES>,
    next: usize,
}

impl AuthPages {
    /// Split `blob` into pages. Page 0 carries the first 17 bytes plus the
    /// total length, last page index and `timestamp`; later pages carry 23
    /// bytes each. Bytes past [`AUTH_BLOB_LIMIT`] are dropped.
    pub fn from_blob(blob: &[u8], auth_type: u8, timestamp: u32) -> Self {
        let blob = &blob[..blob.len().min(AUTH_BLOB_LIMIT)];
        let mut pages = heapless::Vec::new();
        if blob.is_empty() {
            return AuthPages { pages, next: 0 };
        }

        let (first, rest) = blob.split_at(blob.len().min(AUTH_PAGE_ZERO_DATA_SIZE));
        let chunks = std::iter::once(first).chain(rest.chunks(AUTH_PAGE_NONZERO_DATA_SIZE));
        for (number, chunk) in chunks.take(AUTH_MAX_PAGES).enumerate() {
            let page = AuthPage {
                auth_type,
                page_number: number as u8,
                data: heapless::Vec::from_slice(chunk).unwrap_or_default(),
                ..Default::default()
            };
            if pages.push(page).is_err() {
                break;
            }
        }

        let count = pages.len() as u8;
        if let Some(page0) = pages.first_mut() {
            page0.last_page_index = count - 1;
            page0.length = blob.len() as u8;
            page0.timestamp = timestamp;
        }

        debug!("AuthPages: {} bytes in {} pages", blob.len(), count);
        AuthPages { pages, next: 0 }
    }

    pub fn pages(&self) -> &[AuthPage] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Get the next page to broadcast and advance.
    pub fn next_page(&mut self) -> Option<&AuthPage> {
        if self.pages.is_empty() {
            return None;
        }
        let index = self.next % self.pages.len();
        self.next = (index + 1) % self.pages.len();
        self.pages.get(index)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// The message-phase scheduler.
#[derive(Debug, Clone)]
pub struct Scheduler {
    phase: u8,
    last_ms: u64,
    interval_ms: u64,
    counters: [u8; 16],
    auth: AuthPages,
}

impl Scheduler {
    pub fn new(interval_ms: u64) -> Self {
        Scheduler {
            phase: 0,
            last_ms: 0,
            interval_ms,
            counters: [0; 16],
            auth: AuthPages::default(),
        }
    }

    /// Get the phase the next advance will run.
    pub fn phase(&self) -> u8 {
        self.phase
    }

    pub fn set_auth(&mut self, pages: AuthPages) {
        self.auth = pages;
    }

    pub fn auth(&self) -> &AuthPages {
        &self.auth
    }

    /// Advance one phase if an interval has elapsed since the last advance.
    /// Missed intervals are not caught up.
    pub fn poll(&mut self, now_ms: u64) -> Option<PhaseSlot> {
        if now_ms.saturating_sub(self.last_ms) < self.interval_ms {
            return None;
        }
        self.last_ms = now_ms;

        let slot = slot_for_phase(self.phase);
        self.phase = (self.phase + 1) % PHASE_COUNT;
        Some(slot)
    }

    /// Build the record for `slot`. Returns `None` when the slot produces
    /// nothing: idle phases, Basic ID slots with no id type, and Auth with no
    /// pages.
    pub fn build<E: MessageEncoder + ?Sized, R: Rng + ?Sized>(
        &mut self,
        slot: PhaseSlot,
        encoder: &E,
        store: &mut Store,
        rng: &mut R,
        now: &WallTime,
    ) -> Option<(MessageKind, EncodeResult<Record>)> {
        let kind = slot.kind()?;
        let result = match slot {
            PhaseSlot::Idle => return None,
            PhaseSlot::Location => {
                let speed_jitter = jitter(rng);
                let height_jitter = jitter(rng);
                encoder.encode_location(&store.location_data(speed_jitter, height_jitter, now))
            }
            PhaseSlot::System => {
                store.latch_operator(now);
                encoder.encode_system(store.system_data(now))
            }
            PhaseSlot::BasicId(index) => {
                let data = store.derived().basic_id.get(index)?;
                if data.id_type == IdType::None {
                    return None;
                }
                encoder.encode_basic_id(data)
            }
            PhaseSlot::SelfId => encoder.encode_self_id(&store.derived().self_id),
            PhaseSlot::OperatorId => encoder.encode_operator_id(&store.derived().operator_id),
            PhaseSlot::Auth => encoder.encode_auth(self.auth.next_page()?),
        };
        Some((kind, result))
    }

    /// Frame a record with the next counter of its kind.
    pub fn frame(&mut self, record: &Record, mac: [u8; 6], ssid: &SsidText) -> OutboundMessage {
        let counter = &mut self.counters[(record[0] >> 4) as usize];
        *counter = counter.wrapping_add(1);
        OutboundMessage::frame(mac, ssid, *counter, record)
    }

    /// Get the last counter used for `kind`.
    pub fn counter(&self, kind: MessageKind) -> u8 {
        self.counters[kind.type_nibble() as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::OdidEncoder;
    use crate::geo::LatLon;
    use crate::odid::AUTH_DATUM;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn now() -> WallTime {
        WallTime::from_unix(AUTH_DATUM + 1000, 0)
    }

    #[test]
    fn test_slot_table() {
        for phase in 0..PHASE_COUNT {
            let expected = if phase % 4 == 0 {
                PhaseSlot::Location
            } else if phase % 8 == 6 {
                PhaseSlot::System
            } else {
                match phase {
                    2 => PhaseSlot::BasicId(0),
                    10 => PhaseSlot::BasicId(1),
                    18 => PhaseSlot::SelfId,
                    26 => PhaseSlot::OperatorId,
                    34 => PhaseSlot::Auth,
                    _ => PhaseSlot::Idle,
                }
            };
            assert_eq!(slot_for_phase(phase), expected, "phase {}", phase);
        }
    }

    #[test]
    fn test_poll_advances_once_per_interval() {
        let mut scheduler = Scheduler::new(75);
        assert_eq!(scheduler.poll(0), None);
        assert_eq!(scheduler.poll(74), None);
        assert_eq!(scheduler.poll(75), Some(PhaseSlot::Location));
        assert_eq!(scheduler.phase(), 1);
        assert_eq!(scheduler.poll(100), None);
        // A long stall advances only once.
        assert_eq!(scheduler.poll(10_000), Some(PhaseSlot::Idle));
        assert_eq!(scheduler.phase(), 2);
    }

    #[test]
    fn test_forty_advances_wrap() {
        let mut scheduler = Scheduler::new(75);
        for i in 1..=PHASE_COUNT as u64 {
            assert!(scheduler.poll(i * 75).is_some());
        }
        assert_eq!(scheduler.phase(), 0);
    }

    #[test]
    fn test_jitter_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..1000 {
            let j = jitter(&mut rng);
            assert!((-0.1..=0.1 + 1e-12).contains(&j), "jitter {}", j);
        }
    }

    #[test]
    fn test_auth_pages_chunking() {
        let blob: Vec<u8> = (0..60u8).collect();
        let pages = AuthPages::from_blob(&blob, 3, 1234);
        // 17 + 23 + 20
        assert_eq!(pages.len(), 3);
        let p = pages.pages();
        assert_eq!(p[0].data.len(), 17);
        assert_eq!(p[0].length, 60);
        assert_eq!(p[0].last_page_index, 2);
        assert_eq!(p[0].timestamp, 1234);
        assert_eq!(p[1].data.len(), 23);
        assert_eq!(p[1].data[0], 17);
        assert_eq!(p[2].data.len(), 20);
        assert_eq!(p[2].page_number, 2);
        assert!(p.iter().all(|page| page.auth_type == 3));
    }

    #[test]
    fn test_auth_pages_short_and_empty() {
        let pages = AuthPages::from_blob(b"abc", 1, 0);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages.pages()[0].length, 3);
        assert_eq!(pages.pages()[0].last_page_index, 0);

        assert!(AuthPages::from_blob(&[], 1, 0).is_empty());
    }

    #[test]
    fn test_auth_pages_limit() {
        let blob = vec![0xAAu8; 1000];
        let pages = AuthPages::from_blob(&blob, 1, 0);
        assert_eq!(pages.pages()[0].length as usize, AUTH_BLOB_LIMIT);
        let total: usize = pages.pages().iter().map(|p| p.data.len()).sum();
        assert_eq!(total, AUTH_BLOB_LIMIT);
        assert!(pages.len() <= AUTH_MAX_PAGES);
    }

    #[test]
    fn test_auth_round_robin() {
        let blob: Vec<u8> = (0..50u8).collect();
        let mut pages = AuthPages::from_blob(&blob, 1, 0);
        let order: Vec<u8> = (0..5).filter_map(|_| pages.next_page().map(|p| p.page_number)).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_build_skips_empty_slots() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut scheduler = Scheduler::new(75);
        let mut store = Store::new();

        assert!(scheduler
            .build(PhaseSlot::BasicId(0), &OdidEncoder, &mut store, &mut rng, &now())
            .is_none());
        assert!(scheduler
            .build(PhaseSlot::Auth, &OdidEncoder, &mut store, &mut rng, &now())
            .is_none());
        assert!(scheduler
            .build(PhaseSlot::Idle, &OdidEncoder, &mut store, &mut rng, &now())
            .is_none());

        store.set_remote_id("SN-1", IdType::SerialNumber);
        let (kind, record) = scheduler
            .build(PhaseSlot::BasicId(0), &OdidEncoder, &mut store, &mut rng, &now())
            .unwrap();
        assert_eq!(kind, MessageKind::BasicId);
        assert_eq!(record.unwrap()[0], 0x02);
    }

    #[test]
    fn test_build_reports_encode_failure() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut scheduler = Scheduler::new(75);
        let mut store = Store::new();
        store.kinematics_mut().position = LatLon::new(95.0, 0.0);

        let (kind, record) = scheduler
            .build(PhaseSlot::Location, &OdidEncoder, &mut store, &mut rng, &now())
            .unwrap();
        assert_eq!(kind, MessageKind::Location);
        assert!(record.is_err());
    }

    #[test]
    fn test_system_latches_operator() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut scheduler = Scheduler::new(75);
        let mut store = Store::new();
        store.set_operator_position(LatLon::new(-33.5, 151.25));

        let (_, record) = scheduler
            .build(PhaseSlot::System, &OdidEncoder, &mut store, &mut rng, &now())
            .unwrap();
        assert!(record.is_ok());
        assert!(store.derived().operator_latched);
        assert_eq!(store.derived().system.timestamp, 1000);
    }

    #[test]
    fn test_frame_counters_per_kind() {
        let mut scheduler = Scheduler::new(75);
        let ssid = SsidText::new();
        let mut location = [0u8; 25];
        location[0] = 0x12;
        let mut system = [0u8; 25];
        system[0] = 0x42;

        assert_eq!(scheduler.frame(&location, [0; 6], &ssid).counter(), 1);
        assert_eq!(scheduler.frame(&location, [0; 6], &ssid).counter(), 2);
        assert_eq!(scheduler.frame(&system, [0; 6], &ssid).counter(), 1);
        assert_eq!(scheduler.counter(MessageKind::Location), 2);

        for _ in 0..254 {
            scheduler.frame(&location, [0; 6], &ssid);
        }
        // Wrapped past 255.
        assert_eq!(scheduler.counter(MessageKind::Location), 0);
    }
}
