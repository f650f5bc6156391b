//! Engine configuration and runtime settings.
//!
//! [`EngineConfig`] holds the fixed tuning of an engine instance (cadences,
//! turn rate, RNG seed). [`RuntimeSettings`] holds everything the control
//! protocol writes with `$SD`/`$SM`; it is also the `settings:` block of the
//! runner's YAML configuration.

use ridsim_cli_protocol::{ExternalBlock, StoreData, StoreMode};
use serde::{Deserialize, Serialize};

use crate::path::{PathEntry, PathProgram, MAX_PATH_ENTRIES};

/// Firmware version reported by `$V` and `$D`.
pub const FIRMWARE_VERSION: u32 = 1008;

/// Path model cadence.
pub const DEFAULT_PATH_INTERVAL_MS: u64 = 200;

/// Scheduler phase cadence.
pub const DEFAULT_SCHEDULER_INTERVAL_MS: u64 = 75;

/// Outbound queue drain cadence.
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 60;

/// Largest random-walk heading change per path tick.
pub const DEFAULT_MAX_TURN_DEG: f64 = 75.0;

// ============================================================================
// Modes
// ============================================================================

/// Where the broadcast position comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    /// Simulated flight from the path model.
    #[default]
    Sim,
    /// Identity rotation inside a geofence.
    Pest,
    /// Pass-through of external telemetry.
    External,
}

impl AppMode {
    /// Map a wire code. Unknown codes map to `Sim`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => AppMode::Pest,
            2 => AppMode::External,
            _ => AppMode::Sim,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            AppMode::Sim => 0,
            AppMode::Pest => 1,
            AppMode::External => 2,
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            AppMode::Sim => "sim",
            AppMode::Pest => "pest",
            AppMode::External => "external",
        }
    }
}

/// Whether the aircraft is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlyMode {
    #[default]
    Idle,
    Fly,
}

impl FlyMode {
    /// Map a wire code. Unknown codes map to `Idle`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => FlyMode::Fly,
            _ => FlyMode::Idle,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            FlyMode::Idle => 0,
            FlyMode::Fly => 1,
        }
    }
}

/// How the path model moves the aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMode {
    #[default]
    Idle,
    Random,
    Follow,
}

impl PathMode {
    /// Map a wire code. Unknown codes map to `Idle`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => PathMode::Random,
            2 => PathMode::Follow,
            _ => PathMode::Idle,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PathMode::Idle => 0,
            PathMode::Random => 1,
            PathMode::Follow => 2,
        }
    }
}

/// Byte-stream protocol of the external telemetry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalProtocol {
    #[default]
    None,
    Gps,
    Ltm,
}

impl ExternalProtocol {
    /// Map a wire code. Unknown codes map to `None`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ExternalProtocol::Gps,
            2 => ExternalProtocol::Ltm,
            _ => ExternalProtocol::None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ExternalProtocol::None => 0,
            ExternalProtocol::Gps => 1,
            ExternalProtocol::Ltm => 2,
        }
    }
}

/// Displacement applied to pass-through positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftMode {
    #[default]
    None,
    /// A fixed offset picked once.
    Location,
    /// A fresh random point around every snapshot.
    Radius,
}

impl ShiftMode {
    /// Map a wire code. Unknown codes map to `None`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ShiftMode::Location,
            2 => ShiftMode::Radius,
            _ => ShiftMode::None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ShiftMode::None => 0,
            ShiftMode::Location => 1,
            ShiftMode::Radius => 2,
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Tuning of one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub path_interval_ms: u64,
    pub scheduler_interval_ms: u64,
    pub drain_interval_ms: u64,
    pub max_turn_deg: f64,
    /// Seed of the engine RNG (jitter, random walk, pest spawns).
    pub rng_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            path_interval_ms: DEFAULT_PATH_INTERVAL_MS,
            scheduler_interval_ms: DEFAULT_SCHEDULER_INTERVAL_MS,
            drain_interval_ms: DEFAULT_DRAIN_INTERVAL_MS,
            max_turn_deg: DEFAULT_MAX_TURN_DEG,
            rng_seed: 0,
        }
    }
}

/// Geofence used by pest mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geofence {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: u16,
    /// Seconds between identity spawns.
    pub spawn_secs: u8,
}

impl Default for Geofence {
    fn default() -> Self {
        Geofence {
            lat: 0.0,
            lng: 0.0,
            radius_m: 1500,
            spawn_secs: 5,
        }
    }
}

/// External telemetry source and shift parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalSettings {
    pub protocol: ExternalProtocol,
    pub baud: u32,
    pub rx_pin: u8,
    pub tx_pin: u8,
    pub shift_mode: ShiftMode,
    pub shift_radius: u16,
    pub shift_min: u16,
    pub shift_max: u16,
}

impl ExternalSettings {
    pub fn from_block(block: &ExternalBlock) -> Self {
        ExternalSettings {
            protocol: ExternalProtocol::from_code(block.protocol),
            baud: block.baud,
            rx_pin: block.rx_pin,
            tx_pin: block.tx_pin,
            shift_mode: ShiftMode::from_code(block.shift_mode),
            shift_radius: block.shift_radius,
            shift_min: block.shift_min,
            shift_max: block.shift_max,
        }
    }

    pub fn to_block(&self) -> ExternalBlock {
        ExternalBlock {
            protocol: self.protocol.code(),
            baud: self.baud,
            rx_pin: self.rx_pin,
            tx_pin: self.tx_pin,
            shift_mode: self.shift_mode.code(),
            shift_radius: self.shift_radius,
            shift_min: self.shift_min,
            shift_max: self.shift_max,
        }
    }
}

/// Everything the control protocol can write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub app_mode: AppMode,
    pub fly_mode: FlyMode,
    pub path_mode: PathMode,

    pub uas_id: String,
    pub uas_operator: String,
    pub uas_description: String,
    pub uas_type: u8,
    pub id_type: u8,
    pub id_type2: u8,
    pub region: u8,
    pub eu_category: u8,
    pub eu_class: u8,

    pub lat: f64,
    pub lng: f64,
    /// Base altitude in meters.
    pub alt: i16,
    pub op_lat: f64,
    pub op_lng: f64,
    pub op_alt: i16,
    /// Ground speed in mph.
    pub speed: u16,
    pub sats: u8,
    #[serde(with = "mac_format")]
    pub mac: [u8; 6],

    pub geofence: Geofence,
    pub external: ExternalSettings,
    pub path: PathProgram,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        RuntimeSettings {
            app_mode: AppMode::Sim,
            fly_mode: FlyMode::Idle,
            path_mode: PathMode::Idle,
            uas_id: String::new(),
            uas_operator: String::new(),
            uas_description: String::new(),
            uas_type: 0,
            id_type: 0,
            id_type2: 0,
            region: 0,
            eu_category: 0,
            eu_class: 0,
            lat: 0.0,
            lng: 0.0,
            alt: 0,
            op_lat: 0.0,
            op_lng: 0.0,
            op_alt: 100,
            speed: 100,
            sats: 8,
            mac: [0; 6],
            geofence: Geofence::default(),
            external: ExternalSettings::default(),
            path: PathProgram::new(),
        }
    }
}

impl RuntimeSettings {
    /// Apply a `$SD` command. The external block is only replaced when the
    /// command carried it.
    pub fn apply_store_data(&mut self, data: &StoreData) {
        self.uas_id = data.uas_id.clone();
        self.uas_operator = data.uas_operator.clone();
        self.uas_description = data.uas_description.clone();
        self.uas_type = data.uas_type;
        self.id_type = data.id_type;
        self.lat = data.lat;
        self.lng = data.lng;
        self.alt = data.alt;
        self.op_lat = data.op_lat;
        self.op_lng = data.op_lng;
        self.op_alt = data.op_alt;
        self.speed = data.speed;
        self.sats = data.sats;
        self.mac = data.mac;
        self.app_mode = AppMode::from_code(data.mode);
        self.geofence = Geofence {
            lat: data.geofence_lat,
            lng: data.geofence_lng,
            radius_m: data.geofence_radius,
            spawn_secs: data.geofence_spawn,
        };
        if let Some(block) = &data.external {
            self.external = ExternalSettings::from_block(block);
        }
    }

    /// Apply a `$SM` command. The path program is replaced by the command's
    /// `(heading, distance)` pairs.
    pub fn apply_store_mode(&mut self, mode: &StoreMode) {
        self.app_mode = AppMode::from_code(mode.mode);
        self.fly_mode = FlyMode::from_code(mode.fly_mode);
        self.path_mode = PathMode::from_code(mode.path_mode);
        self.speed = mode.speed;
        self.alt = mode.alt;

        self.path.clear();
        for &(heading_deg, distance_m) in mode.path.iter().take(MAX_PATH_ENTRIES) {
            // Capacity is checked by `take`.
            let _ = self.path.push(PathEntry::Goto { heading_deg, distance_m });
        }
    }

    /// Path program as `(heading, distance)` pairs for the dump, up to the
    /// first `None` entry. Non-`Goto` entries report their coordinates.
    pub fn path_pairs(&self) -> Vec<(f64, f64)> {
        self.path
            .iter()
            .take_while(|entry| !matches!(entry, PathEntry::None))
            .map(PathEntry::params)
            .collect()
    }
}

mod mac_format {
    use ridsim_cli_protocol::{format_mac, parse_mac};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mac: &[u8; 6], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_mac(mac))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 6], D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(parse_mac(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridsim_cli_protocol::{Command, COMMAND_TABLE};

    #[test]
    fn test_defaults_match_firmware() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.op_alt, 100);
        assert_eq!(settings.speed, 100);
        assert_eq!(settings.sats, 8);
        assert_eq!(settings.geofence.radius_m, 1500);
        assert_eq!(settings.geofence.spawn_secs, 5);

        let config = EngineConfig::default();
        assert_eq!(config.path_interval_ms, 200);
        assert_eq!(config.scheduler_interval_ms, 75);
        assert_eq!(config.drain_interval_ms, 60);
    }

    #[test]
    fn test_mode_codes() {
        for code in 0..3 {
            assert_eq!(AppMode::from_code(code).code(), code);
            assert_eq!(PathMode::from_code(code).code(), code);
            assert_eq!(ShiftMode::from_code(code).code(), code);
            assert_eq!(ExternalProtocol::from_code(code).code(), code);
        }
        assert_eq!(AppMode::from_code(9), AppMode::Sim);
        assert_eq!(FlyMode::from_code(7), FlyMode::Idle);
    }

    #[test]
    fn test_apply_store_data() {
        let line = "$SD|SN-1|OP-1|Recreational|2|1|37.5|-122.25|120|37.4|-122.2|15|40|9|02:11:22:33:44:55|1|37.6|-122.3|900|7";
        let Some(Command::StoreData(data)) = Command::parse(line) else {
            panic!("expected store data");
        };

        let mut settings = RuntimeSettings::default();
        settings.external.baud = 4800;
        settings.apply_store_data(&data);

        assert_eq!(settings.uas_id, "SN-1");
        assert_eq!(settings.uas_operator, "OP-1");
        assert_eq!(settings.uas_type, 2);
        assert_eq!(settings.lat, 37.5);
        assert_eq!(settings.op_alt, 15);
        assert_eq!(settings.speed, 40);
        assert_eq!(settings.sats, 9);
        assert_eq!(settings.mac, [0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(settings.app_mode, AppMode::Pest);
        assert_eq!(settings.geofence.radius_m, 900);
        assert_eq!(settings.geofence.spawn_secs, 7);
        // No external block in a 19-field command.
        assert_eq!(settings.external.baud, 4800);
    }

    #[test]
    fn test_apply_store_mode_rewrites_path() {
        let Some(Command::StoreMode(mode)) = Command::parse("$SM|0|1|2|60|100|90|1000|180|2000") else {
            panic!("expected store mode");
        };

        let mut settings = RuntimeSettings::default();
        settings.path.push(PathEntry::SetPosition { lat: 1.0, lon: 2.0 }).unwrap();
        settings.apply_store_mode(&mode);

        assert_eq!(settings.fly_mode, FlyMode::Fly);
        assert_eq!(settings.path_mode, PathMode::Follow);
        assert_eq!(settings.speed, 60);
        assert_eq!(settings.alt, 100);
        assert_eq!(
            settings.path.as_slice(),
            &[
                PathEntry::Goto { heading_deg: 90.0, distance_m: 1000.0 },
                PathEntry::Goto { heading_deg: 180.0, distance_m: 2000.0 },
            ]
        );
        assert_eq!(settings.path_pairs(), vec![(90.0, 1000.0), (180.0, 2000.0)]);
        assert_eq!(COMMAND_TABLE.len(), 6);
    }

    #[test]
    fn test_yaml_settings() {
        let yaml = r#"
app_mode: pest
uas_operator: FIN87astrdge12k8
mac: "02:AA:BB:CC:DD:EE"
geofence:
  lat: 60.17
  lng: 24.94
path:
  - type: goto
    heading_deg: 90.0
    distance_m: 500.0
  - type: set_position
    lat: 60.0
    lon: 25.0
"#;
        let settings: RuntimeSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.app_mode, AppMode::Pest);
        assert_eq!(settings.mac, [0x02, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
        assert_eq!(settings.geofence.radius_m, 1500);
        assert_eq!(settings.speed, 100);
        assert_eq!(settings.path.len(), 2);
        assert_eq!(settings.path[1], PathEntry::SetPosition { lat: 60.0, lon: 25.0 });

        let round = serde_yaml::to_string(&settings).unwrap();
        assert!(round.contains("02:AA:BB:CC:DD:EE"));
    }
}
