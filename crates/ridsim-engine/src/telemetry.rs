//! External telemetry hand-off.
//!
//! A GPS or telemetry-link parser running elsewhere publishes decoded fixes
//! into a [`TelemetryStage`]; the engine takes at most one snapshot per path
//! tick. The stage holds a single slot, so a newer fix replaces an unread one.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::{forward_haversine, random_point_in_disk, LatLon};
use crate::settings::{ExternalSettings, ShiftMode};

/// A decoded position fix from the external source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub lat: f64,
    pub lng: f64,
    /// Altitude MSL in meters.
    pub alt: f64,
    /// Ground speed in mph.
    pub speed: i32,
    /// Course over ground in degrees.
    pub heading: i32,
    pub satellites: i32,
    pub fix_quality: u8,
}

impl TelemetrySnapshot {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lng)
    }
}

/// Single-slot, thread-safe telemetry hand-off.
#[derive(Debug, Clone, Default)]
pub struct TelemetryStage {
    slot: Arc<Mutex<Option<TelemetrySnapshot>>>,
}

impl TelemetryStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a snapshot, replacing any unread one.
    pub fn publish(&self, snapshot: TelemetrySnapshot) {
        *self.slot.lock() = Some(snapshot);
    }

    /// Take the pending snapshot, if any.
    pub fn take(&self) -> Option<TelemetrySnapshot> {
        self.slot.lock().take()
    }

    pub fn has_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Applies the configured position shift to pass-through fixes.
#[derive(Debug, Clone, Default)]
pub struct Shifter {
    /// Bearing and distance picked for `ShiftMode::Location`.
    fixed: Option<(f64, f64)>,
}

impl Shifter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the fixed offset so the next shift picks a new one.
    pub fn reset(&mut self) {
        self.fixed = None;
    }

    /// Displace `position` according to `settings`.
    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        position: LatLon,
        settings: &ExternalSettings,
    ) -> LatLon {
        match settings.shift_mode {
            ShiftMode::None => position,
            ShiftMode::Location => {
                let (bearing, distance) = *self.fixed.get_or_insert_with(|| {
                    let lo = settings.shift_min.min(settings.shift_max) as f64;
                    let hi = settings.shift_min.max(settings.shift_max) as f64;
                    let bearing = rng.gen_range(0.0..360.0);
                    let distance = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
                    debug!(
                        "Shifter: fixed offset {:.0} m at {:.0} deg",
                        distance, bearing
                    );
                    (bearing, distance)
                });
                forward_haversine(position, bearing, distance)
            }
            ShiftMode::Radius => random_point_in_disk(rng, position, settings.shift_radius as f64),
        }
    }
}
