//! Path simulation model.
//!
//! Advances the aircraft position once per path tick in one of three modes:
//! - **Idle**: position is left alone
//! - **Random**: a random walk around the origin with bounded turn rate
//! - **Follow**: a scripted program of moves, looped forever
//!
//! The model never touches identity; it only writes position and heading
//! into the store's [`Kinematics`].

use rand::Rng;
use ridsim_metrics::metric_defs;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::geo::{advance_toward, scale_factors, LatLon, ScaleFactors};
use crate::settings::{PathMode, DEFAULT_MAX_TURN_DEG};
use crate::store::Kinematics;

/// Capacity of a path program.
pub const MAX_PATH_ENTRIES: usize = 32;

/// One entry of a path program.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathEntry {
    /// Marks the effective end of the program.
    #[default]
    None,
    /// Fly `distance_m` along `heading_deg` from the segment origin.
    Goto { heading_deg: f64, distance_m: f64 },
    /// Move directly to a position.
    Travel { lat: f64, lon: f64 },
    /// Snap to a position.
    SetPosition { lat: f64, lon: f64 },
}

impl PathEntry {
    /// The entry's two parameters: heading and distance, or latitude and
    /// longitude.
    pub fn params(&self) -> (f64, f64) {
        match *self {
            PathEntry::None => (0.0, 0.0),
            PathEntry::Goto { heading_deg, distance_m } => (heading_deg, distance_m),
            PathEntry::Travel { lat, lon } | PathEntry::SetPosition { lat, lon } => (lat, lon),
        }
    }
}

/// An ordered path program.
pub type PathProgram = heapless::Vec<PathEntry, MAX_PATH_ENTRIES>;

/// Number of entries before the first `None`.
pub fn effective_len(program: &[PathEntry]) -> usize {
    program
        .iter()
        .position(|entry| matches!(entry, PathEntry::None))
        .unwrap_or(program.len())
}

/// An active `Goto` segment.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    heading: i32,
    start_ms: u64,
}

/// The path simulation model.
#[derive(Debug, Clone)]
pub struct PathModel {
    mode: PathMode,
    program: PathProgram,
    cursor: usize,
    segment: Option<Segment>,
    segment_origin: LatLon,
    scale: ScaleFactors,
    /// Random-walk offset from the origin in meters.
    offset_east_m: f64,
    offset_north_m: f64,
    max_turn_deg: f64,
}

impl Default for PathModel {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURN_DEG)
    }
}

impl PathModel {
    pub fn new(max_turn_deg: f64) -> Self {
        PathModel {
            mode: PathMode::Idle,
            program: PathProgram::new(),
            cursor: 0,
            segment: None,
            segment_origin: LatLon::default(),
            scale: ScaleFactors::default(),
            offset_east_m: 0.0,
            offset_north_m: 0.0,
            max_turn_deg,
        }
    }

    pub fn mode(&self) -> PathMode {
        self.mode
    }

    /// Switch mode. The new mode applies from the next tick.
    pub fn set_mode(&mut self, mode: PathMode) {
        if mode != self.mode {
            debug!("PathModel: mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
    }

    pub fn program(&self) -> &PathProgram {
        &self.program
    }

    /// Get the index of the entry being flown.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn scale(&self) -> ScaleFactors {
        self.scale
    }

    /// Replace the program and start it from `base`.
    pub fn set_program(&mut self, program: PathProgram, base: LatLon) {
        self.program = program;
        self.cursor = 0;
        self.segment = None;
        self.segment_origin = base;
    }

    /// Move the origin: recompute scale factors, rewind the program and clear
    /// the random-walk offset.
    pub fn set_origin(&mut self, origin: LatLon) {
        self.scale = scale_factors(origin.lat);
        self.cursor = 0;
        self.segment = None;
        self.segment_origin = origin;
        self.offset_east_m = 0.0;
        self.offset_north_m = 0.0;
    }

    /// Advance one tick. `step_secs` is the tick length used by the random
    /// walk; follow mode works from `now_ms`.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now_ms: u64,
        step_secs: f64,
        kin: &mut Kinematics,
    ) {
        match self.mode {
            PathMode::Idle => {}
            PathMode::Random => self.continue_random(rng, step_secs, kin),
            PathMode::Follow => self.continue_follow(now_ms, kin),
        }
    }

    fn continue_random<R: Rng + ?Sized>(&mut self, rng: &mut R, step_secs: f64, kin: &mut Kinematics) {
        let u: f64 = rng.gen_range(-0.5..0.5);
        let change = (self.max_turn_deg * u).trunc() as i32;
        kin.heading = (kin.heading + change).rem_euclid(360);

        let step = kin.speed_mps * step_secs;
        let heading = (kin.heading as f64).to_radians();
        self.offset_east_m += step * heading.sin();
        self.offset_north_m += step * heading.cos();

        kin.position = kin
            .base
            .offset_by(self.offset_east_m, self.offset_north_m, self.scale);
    }

    fn continue_follow(&mut self, now_ms: u64, kin: &mut Kinematics) {
        let len = effective_len(&self.program);
        if len == 0 {
            return;
        }
        if self.cursor >= len {
            self.cursor = 0;
        }

        let reached = match self.program[self.cursor] {
            PathEntry::None => true,
            PathEntry::SetPosition { lat, lon } | PathEntry::Travel { lat, lon } => {
                kin.position = LatLon::new(lat, lon);
                self.segment_origin = kin.position;
                true
            }
            PathEntry::Goto { heading_deg, distance_m } => {
                let segment = *self.segment.get_or_insert(Segment {
                    heading: (heading_deg as i32).rem_euclid(360),
                    start_ms: now_ms,
                });
                kin.heading = segment.heading;

                let (position, reached) = advance_toward(
                    self.segment_origin,
                    segment.heading as f64,
                    kin.speed_mps,
                    distance_m,
                    now_ms.saturating_sub(segment.start_ms),
                );
                kin.position = position;
                if reached {
                    self.segment_origin = position;
                    self.segment = None;
                }
                reached
            }
        };

        if reached {
            trace!("PathModel: entry {} complete", self.cursor);
            metrics::counter!(metric_defs::PATH_SEGMENTS.name).increment(1);
            self.cursor = (self.cursor + 1) % len;
        }
    }
}
