//! Wall-clock source for message timestamps.
//!
//! The engine is driven by a monotonic millisecond tick supplied by the
//! caller; wall time is only read to fill the coarse timestamp fields of the
//! location, system and authentication records.

use chrono::{DateTime, TimeZone, Timelike, Utc};

/// A broken-down UTC wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WallTime {
    /// Seconds since the Unix epoch.
    pub unix_secs: i64,
    pub minute: u32,
    pub second: u32,
    pub centisecond: u32,
}

impl WallTime {
    /// Build from Unix seconds plus a millisecond fraction.
    pub fn from_unix(unix_secs: i64, millis: u32) -> Self {
        let secs_of_hour = unix_secs.rem_euclid(3600) as u32;
        WallTime {
            unix_secs,
            minute: secs_of_hour / 60,
            second: secs_of_hour % 60,
            centisecond: (millis % 1000) / 10,
        }
    }

    /// Build from a chrono timestamp.
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        WallTime {
            unix_secs: dt.timestamp(),
            minute: dt.minute(),
            second: dt.second(),
            centisecond: (dt.timestamp_subsec_millis() % 1000) / 10,
        }
    }

    /// Seconds since the start of the hour, with centisecond resolution.
    pub fn seconds_since_hour(&self) -> f64 {
        (self.minute * 60 + self.second) as f64 + 0.01 * self.centisecond as f64
    }

    /// Whole seconds elapsed since `datum`, saturating at 0.
    pub fn since_datum(&self, datum: i64) -> u32 {
        (self.unix_secs - datum).clamp(0, u32::MAX as i64) as u32
    }

    /// Convert back to a chrono timestamp.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.unix_secs, self.centisecond * 10_000_000).single()
    }
}

/// Source of wall time.
pub trait WallClock: Send {
    fn now(&self) -> WallTime;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> WallTime {
        WallTime::from_datetime(&Utc::now())
    }
}

/// Always reports the same time. Used by tests and deterministic replays.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedWallClock(pub WallTime);

impl WallClock for FixedWallClock {
    fn now(&self) -> WallTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odid::AUTH_DATUM;

    #[test]
    fn test_from_unix_breakdown() {
        let t = WallTime::from_unix(AUTH_DATUM + 7 * 3600 + 59 * 60 + 7, 999);
        assert_eq!(t.minute, 59);
        assert_eq!(t.second, 7);
        assert_eq!(t.centisecond, 99);
        assert!((t.seconds_since_hour() - 3547.99).abs() < 1e-9);
    }

    #[test]
    fn test_since_datum() {
        let t = WallTime::from_unix(AUTH_DATUM + 42, 0);
        assert_eq!(t.since_datum(AUTH_DATUM), 42);
        let early = WallTime::from_unix(AUTH_DATUM - 10, 0);
        assert_eq!(early.since_datum(AUTH_DATUM), 0);
    }

    #[test]
    fn test_datetime_agrees() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 17, 13, 21, 45).unwrap();
        let t = WallTime::from_datetime(&dt);
        assert_eq!(t, WallTime::from_unix(dt.timestamp(), 0));
        assert_eq!(t.to_datetime(), Some(dt));
    }

    #[test]
    fn test_fixed_clock() {
        let t = WallTime::from_unix(AUTH_DATUM, 250);
        assert_eq!(FixedWallClock(t).now(), t);
    }
}
