//! The broadcast engine.
//!
//! [`Engine`] owns every component and all mutation. The caller drives it
//! with [`Engine::tick`] and feeds control lines to [`Engine::handle_line`].
//! Three cadences are gated by elapsed time inside `tick`:
//! - path model (200 ms): moves the aircraft, spawns pest identities, or
//!   consumes external telemetry
//! - scheduler (75 ms): builds at most one record and queues it
//! - drain (60 ms): hands at most one queued message to the radio
//!
//! Missed intervals are never caught up.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ridsim_cli_protocol::{Command, CurrentLine, DumpLine, Response, TelemetryLine};
use ridsim_metrics::{metric_defs, EngineLabels};
use tracing::{debug, info, trace, warn};

use crate::clock::{SystemWallClock, WallClock};
use crate::encoder::{MessageEncoder, OdidEncoder};
use crate::geo::{random_point_in_disk, LatLon};
use crate::identity::{random_description, random_mac, random_profile};
use crate::odid::{IdType, UaType, AUTH_DATUM};
use crate::path::PathModel;
use crate::queue::OutboundQueue;
use crate::radio::RadioTransmitter;
use crate::scheduler::{AuthPages, PhaseSlot, Scheduler};
use crate::settings::{AppMode, EngineConfig, FlyMode, PathMode, RuntimeSettings, FIRMWARE_VERSION};
use crate::store::Store;
use crate::telemetry::{Shifter, TelemetryStage};

/// What the caller should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Nothing; also used for rejected commands.
    None,
    /// Settings were changed and should be persisted.
    Store,
    /// A query was answered.
    Info,
    /// The engine should be rebuilt from its configuration.
    Restart,
}

/// Result of handling one control line.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub action: CommandAction,
    /// Line to write back to the control channel, if any.
    pub response: Option<Response>,
}

impl CommandOutcome {
    fn new(action: CommandAction, response: Option<Response>) -> Self {
        CommandOutcome { action, response }
    }
}

/// The Remote ID broadcast engine.
pub struct Engine<E: MessageEncoder = OdidEncoder> {
    config: EngineConfig,
    settings: RuntimeSettings,
    store: Store,
    path: PathModel,
    scheduler: Scheduler,
    queue: OutboundQueue,
    encoder: E,
    clock: Box<dyn WallClock>,
    rng: ChaCha8Rng,
    telemetry: TelemetryStage,
    shifter: Shifter,
    labels: EngineLabels,

    last_path_ms: u64,
    last_drain_ms: u64,
    /// Time of the last pest spawn; `None` spawns on the next path tick.
    last_spawn_ms: Option<u64>,
}

impl Engine<OdidEncoder> {
    /// Create an engine with the reference encoder and the system clock.
    pub fn new(config: EngineConfig, settings: RuntimeSettings) -> Self {
        Engine::with_parts(config, settings, OdidEncoder, Box::new(SystemWallClock))
    }
}

impl<E: MessageEncoder> Engine<E> {
    /// Create an engine from explicit parts.
    pub fn with_parts(
        config: EngineConfig,
        settings: RuntimeSettings,
        encoder: E,
        clock: Box<dyn WallClock>,
    ) -> Self {
        let mut engine = Engine {
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            path: PathModel::new(config.max_turn_deg),
            scheduler: Scheduler::new(config.scheduler_interval_ms),
            config,
            settings,
            store: Store::new(),
            queue: OutboundQueue::new(),
            encoder,
            clock,
            telemetry: TelemetryStage::new(),
            shifter: Shifter::new(),
            labels: EngineLabels::default(),
            last_path_ms: 0,
            last_drain_ms: 0,
            last_spawn_ms: None,
        };
        engine.apply_settings();
        engine
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn path(&self) -> &PathModel {
        &self.path
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Get a handle for publishing external telemetry.
    pub fn telemetry_stage(&self) -> TelemetryStage {
        self.telemetry.clone()
    }

    fn uas_id(&self) -> &str {
        &self.store.identity().uas_id
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Replace the runtime settings and apply them.
    pub fn set_settings(&mut self, settings: RuntimeSettings) {
        self.settings = settings;
        self.apply_settings();
    }

    /// Push the runtime settings into the store and path model.
    ///
    /// The origin moves to the configured position, which rewinds the path
    /// program and clears the random walk. An all-zero MAC is replaced by a
    /// random one.
    pub fn apply_settings(&mut self) {
        let s = &self.settings;

        self.store.set_remote_id(&s.uas_id, IdType::from_code(s.id_type));
        self.store.set_secondary_id_type(IdType::from_code(s.id_type2));
        self.store.set_operator(&s.uas_operator);
        self.store.set_description(&s.uas_description);
        self.store.set_type(UaType::from_code(s.uas_type));
        self.store.set_classification(s.region, s.eu_category, s.eu_class);

        self.store.set_speed(s.speed as i32);
        self.store.set_altitude(s.alt as f64);
        self.store.set_satellites(s.sats as i32);

        let origin = LatLon::new(s.lat, s.lng);
        self.store.set_origin(origin);
        self.path.set_origin(origin);
        self.store.set_operator_position(LatLon::new(s.op_lat, s.op_lng));
        self.store.set_operator_altitude(s.op_alt as f64);
        self.store.set_base_valid(s.app_mode != AppMode::External);

        if s.mac == [0; 6] {
            self.settings.mac = random_mac(&mut self.rng);
        }
        self.store.set_mac(self.settings.mac);

        // Keep the settings in step with what the store accepted.
        let identity = self.store.identity();
        self.settings.uas_id = identity.uas_id.as_str().to_string();
        self.settings.uas_operator = identity.uas_operator.as_str().to_string();
        self.settings.uas_description = identity.uas_description.as_str().to_string();

        let path_mode = match self.settings.app_mode {
            AppMode::Sim => self.settings.path_mode,
            AppMode::Pest => PathMode::Random,
            AppMode::External => PathMode::Idle,
        };
        self.path.set_program(self.settings.path.clone(), origin);
        self.path.set_mode(path_mode);

        self.shifter.reset();
        self.last_spawn_ms = None;
        self.refresh_labels();

        debug!(
            "Engine[{}]: applied settings, mode {:?}, path {:?}, ssid '{}'",
            self.uas_id(),
            self.settings.app_mode,
            path_mode,
            self.store.ssid()
        );
    }

    fn refresh_labels(&mut self) {
        self.labels = EngineLabels::new(self.uas_id(), self.settings.app_mode.as_label());
    }

    /// Load an authentication blob; it is broadcast one page per cycle.
    pub fn set_auth(&mut self, blob: &[u8], auth_type: u8) {
        let timestamp = self.clock.now().since_datum(AUTH_DATUM);
        let pages = AuthPages::from_blob(blob, auth_type, timestamp);
        info!(
            "Engine[{}]: authentication set, {} bytes in {} pages",
            self.uas_id(),
            blob.len(),
            pages.len()
        );
        self.scheduler.set_auth(pages);
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Run every cadence that is due at `now_ms`.
    pub fn tick(&mut self, now_ms: u64, radio: &mut dyn RadioTransmitter) {
        if now_ms.saturating_sub(self.last_path_ms) >= self.config.path_interval_ms {
            self.last_path_ms = now_ms;
            self.path_tick(now_ms);
        }

        if let Some(slot) = self.scheduler.poll(now_ms) {
            self.broadcast(slot);
        }

        if now_ms.saturating_sub(self.last_drain_ms) >= self.config.drain_interval_ms {
            self.last_drain_ms = now_ms;
            self.drain(radio);
        }
    }

    fn path_tick(&mut self, now_ms: u64) {
        match self.settings.app_mode {
            AppMode::Sim => self.advance_path(now_ms),
            AppMode::Pest => {
                let period_ms = self.settings.geofence.spawn_secs.max(1) as u64 * 1000;
                let due = self
                    .last_spawn_ms
                    .map_or(true, |last| now_ms.saturating_sub(last) >= period_ms);
                if due {
                    self.last_spawn_ms = Some(now_ms);
                    self.spawn();
                }
                self.advance_path(now_ms);
            }
            AppMode::External => self.consume_telemetry(),
        }
    }

    fn advance_path(&mut self, now_ms: u64) {
        if self.settings.fly_mode != FlyMode::Fly {
            return;
        }
        let step_secs = self.config.path_interval_ms as f64 / 1000.0;
        self.path
            .tick(&mut self.rng, now_ms, step_secs, self.store.kinematics_mut());
    }

    /// Re-spawn the identity at a random point inside the geofence.
    fn spawn(&mut self) {
        let fence = self.settings.geofence;
        let center = LatLon::new(fence.lat, fence.lng);
        let position = random_point_in_disk(&mut self.rng, center, fence.radius_m as f64);

        let profile = random_profile(&mut self.rng);
        let serial = profile.random_serial(&mut self.rng);
        let description = random_description(&mut self.rng);
        let mac = random_mac(&mut self.rng);

        self.store.set_remote_id(&serial, IdType::SerialNumber);
        self.store.set_description(description);
        self.store.set_type(UaType::HelicopterOrMultirotor);
        self.store.set_mac(mac);
        self.store.set_origin(position);
        self.path.set_origin(position);
        self.store.kinematics_mut().heading = self.rng.gen_range(0..360);
        self.refresh_labels();

        metrics::counter!(metric_defs::PEST_SPAWNS.name, &self.labels.to_labels()).increment(1);
        debug!(
            "Engine[{}]: spawned {} at {:.6},{:.6}",
            serial, profile.name, position.lat, position.lon
        );
    }

    /// Take the staged external fix, if any, and apply it.
    fn consume_telemetry(&mut self) {
        let Some(snapshot) = self.telemetry.take() else {
            return;
        };
        metrics::counter!(metric_defs::TELEMETRY_SNAPSHOTS.name, &self.labels.to_labels())
            .increment(1);

        let position = self
            .shifter
            .apply(&mut self.rng, snapshot.position(), &self.settings.external);

        if snapshot.fix_quality > 0 && !self.store.kinematics().base_valid {
            // First good fix is the takeoff point.
            self.store.set_origin(position);
            self.path.set_origin(position);
            self.store.set_operator_altitude(snapshot.alt);
            self.store.kinematics_mut().base_alt_m = snapshot.alt;
            self.store.set_base_valid(true);
            debug!(
                "Engine[{}]: takeoff fix at {:.6},{:.6}",
                self.uas_id(),
                position.lat,
                position.lon
            );
        }

        self.store.set_speed(snapshot.speed);
        self.store.set_satellites(snapshot.satellites);
        let k = self.store.kinematics_mut();
        k.position = position;
        k.heading = snapshot.heading.rem_euclid(360);
        k.alt_msl_m = snapshot.alt;
        k.alt_agl_m = (snapshot.alt - k.base_alt_m).max(0.0);
    }

    fn broadcast(&mut self, slot: PhaseSlot) {
        let now = self.clock.now();
        let built = self
            .scheduler
            .build(slot, &self.encoder, &mut self.store, &mut self.rng, &now);

        match built {
            None => {}
            Some((kind, Ok(record))) => {
                let labels = self.labels.with(&[("kind", kind.as_label().to_string())]);
                metrics::counter!(metric_defs::MESSAGES_BUILT.name, &labels).increment(1);

                let message = self
                    .scheduler
                    .frame(&record, self.store.mac(), &self.store.derived().ssid);
                self.queue.enqueue(message);
            }
            Some((kind, Err(e))) => {
                warn!("Engine[{}]: failed to encode {}: {}", self.uas_id(), kind, e);
                let labels = self.labels.with(&[("kind", kind.as_label().to_string())]);
                metrics::counter!(metric_defs::ENCODE_FAILURES.name, &labels).increment(1);
            }
        }
    }

    fn drain(&mut self, radio: &mut dyn RadioTransmitter) {
        let Some(message) = self.queue.dequeue() else {
            return;
        };

        let status = radio.transmit_advertising(&message);
        trace!(
            "Engine[{}]: transmit kind {} counter {} ({} bytes): {:?}",
            self.uas_id(),
            message.record()[0] >> 4,
            message.counter(),
            message.len(),
            status
        );

        let labels = self.labels.with(&[("status", status.as_label().to_string())]);
        metrics::counter!(metric_defs::RADIO_TRANSMISSIONS.name, &labels).increment(1);
        metrics::histogram!(metric_defs::RADIO_PAYLOAD_SIZE.name, &self.labels.to_labels())
            .record(message.len() as f64);
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Handle one control line.
    pub fn handle_line(&mut self, line: &str) -> CommandOutcome {
        let Some(command) = Command::parse(line) else {
            debug!("Engine[{}]: unknown command '{}'", self.uas_id(), line.trim());
            let labels = self.labels.with(&[("reason", "unknown".to_string())]);
            metrics::counter!(metric_defs::COMMANDS_REJECTED.name, &labels).increment(1);
            return CommandOutcome::new(CommandAction::None, Some(Response::Nack));
        };
        self.handle_command(command)
    }

    /// Handle a parsed command.
    pub fn handle_command(&mut self, command: Command) -> CommandOutcome {
        let tag = command.tag();
        let labels = self.labels.with(&[("tag", tag.as_str().to_string())]);
        metrics::counter!(metric_defs::COMMANDS.name, &labels).increment(1);

        match command {
            Command::Restart => {
                info!("Engine[{}]: restart requested", self.uas_id());
                CommandOutcome::new(CommandAction::Restart, None)
            }
            Command::Version => CommandOutcome::new(
                CommandAction::Info,
                Some(Response::Version { version: FIRMWARE_VERSION }),
            ),
            Command::Current => CommandOutcome::new(CommandAction::Info, Some(self.current())),
            Command::Dump => CommandOutcome::new(CommandAction::Info, Some(Response::Dump(self.dump()))),
            Command::StoreData(data) => {
                self.settings.apply_store_data(&data);
                self.apply_settings();
                CommandOutcome::new(CommandAction::Store, None)
            }
            Command::StoreMode(mode) => {
                self.settings.apply_store_mode(&mode);
                self.apply_settings();
                CommandOutcome::new(CommandAction::Store, None)
            }
            Command::Incomplete { tag, fields } => {
                debug!(
                    "Engine[{}]: {} ignored, only {} fields",
                    self.uas_id(),
                    tag.as_str(),
                    fields
                );
                let labels = self.labels.with(&[("reason", "incomplete".to_string())]);
                metrics::counter!(metric_defs::COMMANDS_REJECTED.name, &labels).increment(1);
                CommandOutcome::new(CommandAction::None, None)
            }
        }
    }

    /// Build the live telemetry line: `$C` while simulating, `$T` while
    /// passing through a spawned or external identity.
    pub fn current(&self) -> Response {
        let k = self.store.kinematics();
        match self.settings.app_mode {
            AppMode::Sim => Response::Current(CurrentLine {
                lat: k.position.lat,
                lng: k.position.lon,
                op_lat: k.operator.lat,
                op_lng: k.operator.lon,
                base_alt: k.base_alt_m,
                op_alt: k.operator_alt_m,
                speed: k.speed_mph,
                heading: k.heading,
                sats: k.satellites,
                fly_mode: self.settings.fly_mode.code(),
                path_mode: self.path.mode().code(),
            }),
            AppMode::Pest | AppMode::External => {
                let id = self.store.identity();
                Response::Telemetry(TelemetryLine {
                    lat: k.position.lat,
                    lng: k.position.lon,
                    base_alt: k.base_alt_m,
                    speed: k.speed_mph,
                    heading: k.heading,
                    mac: self.store.mac(),
                    uas_id: id.uas_id.to_string(),
                    uas_operator: id.uas_operator.to_string(),
                    uas_description: id.uas_description.to_string(),
                    uas_type: id.uas_type.code(),
                    id_type: id.id_type.code(),
                    fly_mode: self.settings.fly_mode.code(),
                })
            }
        }
    }

    /// Build the full dump of the runtime settings.
    pub fn dump(&self) -> DumpLine {
        let s = &self.settings;
        DumpLine {
            version: FIRMWARE_VERSION,
            uas_id: s.uas_id.clone(),
            uas_operator: s.uas_operator.clone(),
            uas_description: s.uas_description.clone(),
            uas_type: s.uas_type,
            id_type: s.id_type,
            lat: s.lat,
            lng: s.lng,
            alt: s.alt,
            op_lat: s.op_lat,
            op_lng: s.op_lng,
            op_alt: s.op_alt,
            speed: s.speed,
            sats: s.sats,
            mac: s.mac,
            mode: s.app_mode.code(),
            geofence_lat: s.geofence.lat,
            geofence_lng: s.geofence.lng,
            geofence_radius: s.geofence.radius_m,
            geofence_spawn: s.geofence.spawn_secs,
            external: s.external.to_block(),
            path: s.path_pairs(),
        }
    }
}
