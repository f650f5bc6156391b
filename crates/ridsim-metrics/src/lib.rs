//! Metrics infrastructure for the Remote ID broadcast simulator.
//!
//! Every metric the engine and runner emit is declared here as a structured
//! [`Metric`] constant, so call sites never spell metric names by hand and the
//! exporter can be given descriptions and units up front.
//!
//! # Example
//!
//! ```rust
//! use ridsim_metrics::{metric_defs, EngineLabels};
//!
//! let labels = EngineLabels::new("SN-0001", "sim");
//! metrics::counter!(
//!     metric_defs::MESSAGES_BUILT.name,
//!     &labels.with(&[("kind", "location".to_string())])
//! )
//! .increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use ridsim_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const BEACONS: Metric = Metric::counter("ridsim.example.beacons")
///     .with_description("Beacons sent")
///     .with_unit(Unit::Count)
///     .with_labels(&["kind"]);
///
/// assert_eq!(BEACONS.name, "ridsim.example.beacons");
/// assert_eq!(BEACONS.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "ridsim.queue.overwrites").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// The unit of measurement, if any.
    pub unit: Option<Unit>,
    /// Expected label keys beyond the engine labels.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Declare a counter.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Declare a gauge.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Declare a histogram.
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the simulator.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Label Keys
    // ========================================================================

    /// Labels present on every engine-scoped metric.
    pub const ENGINE_LABELS: &[&str] = &["uas_id", "app_mode"];

    // ========================================================================
    // Scheduler
    // ========================================================================

    /// Records built by the broadcast scheduler.
    ///
    /// Labels: uas_id, app_mode, kind
    pub const MESSAGES_BUILT: Metric = Metric::counter("ridsim.scheduler.messages_built")
        .with_description("Broadcast records built by the scheduler")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    /// Records the encoder refused to build.
    ///
    /// Labels: uas_id, app_mode, kind
    pub const ENCODE_FAILURES: Metric = Metric::counter("ridsim.scheduler.encode_failures")
        .with_description("Broadcast records dropped because encoding failed")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    // ========================================================================
    // Outbound Queue
    // ========================================================================

    /// Messages placed on the outbound queue.
    pub const QUEUE_ENQUEUED: Metric = Metric::counter("ridsim.queue.enqueued")
        .with_description("Messages placed on the outbound queue")
        .with_unit(Unit::Count);

    /// Undrained messages lost because the queue was full.
    pub const QUEUE_OVERWRITES: Metric = Metric::counter("ridsim.queue.overwrites")
        .with_description("Oldest undrained messages overwritten by a full queue")
        .with_unit(Unit::Count);

    /// Messages waiting on the outbound queue.
    pub const QUEUE_DEPTH: Metric = Metric::gauge("ridsim.queue.depth")
        .with_description("Messages waiting to be transmitted")
        .with_unit(Unit::Count);

    // ========================================================================
    // Radio
    // ========================================================================

    /// Advertising transmissions handed to the radio.
    ///
    /// Labels: uas_id, app_mode, status
    pub const RADIO_TRANSMISSIONS: Metric = Metric::counter("ridsim.radio.transmissions")
        .with_description("Advertising transmissions handed to the radio")
        .with_unit(Unit::Count)
        .with_labels(&["status"]);

    /// Size of each transmitted service-data frame.
    pub const RADIO_PAYLOAD_SIZE: Metric = Metric::histogram("ridsim.radio.payload_size_bytes")
        .with_description("Service-data frame size in bytes")
        .with_unit(Unit::Bytes);

    // ========================================================================
    // Control Channel
    // ========================================================================

    /// Control lines dispatched to a handler.
    ///
    /// Labels: uas_id, app_mode, tag
    pub const COMMANDS: Metric = Metric::counter("ridsim.commands.handled")
        .with_description("Control lines dispatched to a handler")
        .with_unit(Unit::Count)
        .with_labels(&["tag"]);

    /// Control lines that changed nothing.
    ///
    /// Labels: uas_id, app_mode, reason
    pub const COMMANDS_REJECTED: Metric = Metric::counter("ridsim.commands.rejected")
        .with_description("Control lines answered with a nack or ignored as incomplete")
        .with_unit(Unit::Count)
        .with_labels(&["reason"]);

    // ========================================================================
    // Identity Store
    // ========================================================================

    /// Text parameters cut to fit their field.
    ///
    /// Labels: field
    pub const STORE_TRUNCATIONS: Metric = Metric::counter("ridsim.store.truncations")
        .with_description("Text parameters truncated to fit their field")
        .with_unit(Unit::Count)
        .with_labels(&["field"]);

    // ========================================================================
    // Path Model
    // ========================================================================

    /// Path program entries flown to completion.
    pub const PATH_SEGMENTS: Metric = Metric::counter("ridsim.path.segments_completed")
        .with_description("Path program entries flown to completion")
        .with_unit(Unit::Count);

    /// Identities re-spawned inside the geofence.
    pub const PEST_SPAWNS: Metric = Metric::counter("ridsim.pest.spawns")
        .with_description("Identities spawned at a random point inside the geofence")
        .with_unit(Unit::Count);

    /// External telemetry snapshots applied to the position.
    pub const TELEMETRY_SNAPSHOTS: Metric = Metric::counter("ridsim.telemetry.snapshots")
        .with_description("External telemetry snapshots applied to the position")
        .with_unit(Unit::Count);

    // ========================================================================
    // Runner
    // ========================================================================

    /// Wall-clock time spent in one engine tick.
    pub const TICK_TIME: Metric = Metric::histogram("ridsim.runner.tick_time_us")
        .with_description("Wall-clock time to execute one engine tick in microseconds")
        .with_unit(Unit::Microseconds);

    /// Engine restarts requested over the control channel.
    pub const RESTARTS: Metric = Metric::counter("ridsim.runner.restarts")
        .with_description("Engine restarts requested over the control channel")
        .with_unit(Unit::Count);

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &MESSAGES_BUILT,
        &ENCODE_FAILURES,
        &QUEUE_ENQUEUED,
        &QUEUE_OVERWRITES,
        &QUEUE_DEPTH,
        &RADIO_TRANSMISSIONS,
        &RADIO_PAYLOAD_SIZE,
        &COMMANDS,
        &COMMANDS_REJECTED,
        &STORE_TRUNCATIONS,
        &PATH_SEGMENTS,
        &PEST_SPAWNS,
        &TELEMETRY_SNAPSHOTS,
        &TICK_TIME,
        &RESTARTS,
    ];
}

/// Labels identifying which engine instance emitted a metric.
///
/// ```rust
/// use ridsim_metrics::EngineLabels;
///
/// let labels = EngineLabels::new("SN-0001", "pest");
/// let extended = labels.with(&[("kind", "basic_id".to_string())]);
/// assert_eq!(extended.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineLabels {
    /// UAS id currently broadcast.
    pub uas_id: String,
    /// Application mode name (sim, pest, external).
    pub app_mode: String,
}

impl EngineLabels {
    /// Creates labels for an engine broadcasting `uas_id` in `app_mode`.
    pub fn new(uas_id: impl Into<String>, app_mode: impl Into<String>) -> Self {
        Self {
            uas_id: uas_id.into(),
            app_mode: app_mode.into(),
        }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("uas_id", self.uas_id.clone()),
            ("app_mode", self.app_mode.clone()),
        ]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describes all metrics used in the simulator.
///
/// Call once at startup, after a recorder has been installed.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus recorder serving scrapes on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}
