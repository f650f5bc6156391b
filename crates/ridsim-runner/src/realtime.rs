//! Real-time pacing of the engine clock.
//!
//! The engine is driven by a millisecond counter that starts at zero. This
//! module keeps that counter in step with the wall clock.
//!
//! ## Features
//!
//! - **Speed multiplier**: Run faster or slower than real-time
//! - **Lag detection**: Warn (rate-limited) when ticks fall behind
//! - **Drift tracking**: Monitor engine vs wall clock drift

use std::time::{Duration, Instant};

use crate::config::{RunnerError, RunnerResult};

/// Configuration for real-time pacing.
#[derive(Debug, Clone)]
pub struct RealTimeConfig {
    /// Speed multiplier (1.0 = real-time, 2.0 = 2x speed, 0.5 = half speed).
    pub speed_multiplier: f64,

    /// Lag in milliseconds beyond which a warning is issued.
    pub max_catchup_ms: u64,

    /// When disabled, ticks run as fast as possible.
    pub enabled: bool,

    /// Warn about lag only once per interval (milliseconds).
    pub lag_warn_interval_ms: u64,
}

impl Default for RealTimeConfig {
    fn default() -> Self {
        RealTimeConfig {
            speed_multiplier: 1.0,
            max_catchup_ms: 100,
            enabled: true,
            lag_warn_interval_ms: 5000,
        }
    }
}

impl RealTimeConfig {
    /// Create a real-time config with the given speed multiplier.
    pub fn with_speed(speed: f64) -> RunnerResult<Self> {
        if speed <= 0.0 || !speed.is_finite() {
            return Err(RunnerError::InvalidSpeed(speed));
        }
        Ok(RealTimeConfig {
            speed_multiplier: speed,
            ..Default::default()
        })
    }

    /// Create a disabled config (run as fast as possible).
    pub fn disabled() -> Self {
        RealTimeConfig {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_max_catchup_ms(mut self, max_catchup_ms: u64) -> Self {
        self.max_catchup_ms = max_catchup_ms;
        self
    }
}

/// Tracks engine time against the wall clock.
#[derive(Debug)]
pub struct RealTimePacer {
    config: RealTimeConfig,
    start_wall: Instant,
    start_ms: u64,
    last_lag_warn: Option<Instant>,
    total_lag_warnings: u64,
    max_drift_seen_ms: i64,
}

impl RealTimePacer {
    /// Create a pacer whose engine clock reads `start_ms` now.
    pub fn new(config: RealTimeConfig, start_ms: u64) -> Self {
        RealTimePacer {
            config,
            start_wall: Instant::now(),
            start_ms,
            last_lag_warn: None,
            total_lag_warnings: 0,
            max_drift_seen_ms: 0,
        }
    }

    /// Engine time that should have been reached by now.
    pub fn target_ms(&self) -> u64 {
        if !self.config.enabled {
            return u64::MAX;
        }
        let elapsed = self.start_wall.elapsed().as_secs_f64() * 1000.0;
        self.start_ms + (elapsed * self.config.speed_multiplier) as u64
    }

    /// Drift between the target and `current_ms`. Positive means lagging.
    pub fn calculate_drift_ms(&self, current_ms: u64) -> i64 {
        if !self.config.enabled {
            return 0;
        }
        self.target_ms() as i64 - current_ms as i64
    }

    /// Returns the drift if the engine lags enough to warn about it.
    pub fn check_lag_warning(&mut self, current_ms: u64) -> Option<i64> {
        if !self.config.enabled {
            return None;
        }

        let drift_ms = self.calculate_drift_ms(current_ms);
        self.max_drift_seen_ms = self.max_drift_seen_ms.max(drift_ms);

        if drift_ms <= self.config.max_catchup_ms as i64 {
            return None;
        }

        let now = Instant::now();
        let due = self.last_lag_warn.map_or(true, |last| {
            now.duration_since(last).as_millis() >= self.config.lag_warn_interval_ms as u128
        });
        if due {
            self.last_lag_warn = Some(now);
            self.total_lag_warnings += 1;
            return Some(drift_ms);
        }
        None
    }

    /// How long to sleep before engine time `next_ms` is due.
    ///
    /// Returns `None` when it is already due or pacing is disabled.
    pub fn sleep_until(&self, next_ms: u64) -> Option<Duration> {
        if !self.config.enabled || next_ms <= self.target_ms() {
            return None;
        }

        let offset_ms = (next_ms - self.start_ms) as f64 / self.config.speed_multiplier;
        let due = self.start_wall + Duration::from_secs_f64(offset_ms / 1000.0);
        let now = Instant::now();
        (due > now).then(|| due - now)
    }

    pub fn stats(&self) -> RealTimePacerStats {
        RealTimePacerStats {
            elapsed_wall: self.start_wall.elapsed(),
            total_lag_warnings: self.total_lag_warnings,
            max_drift_seen_ms: self.max_drift_seen_ms,
            speed_multiplier: self.config.speed_multiplier,
        }
    }

    pub fn config(&self) -> &RealTimeConfig {
        &self.config
    }
}

/// Statistics from a pacing session.
#[derive(Debug, Clone)]
pub struct RealTimePacerStats {
    pub elapsed_wall: Duration,
    pub total_lag_warnings: u64,
    /// Maximum drift seen (positive = behind) in milliseconds.
    pub max_drift_seen_ms: i64,
    pub speed_multiplier: f64,
}
