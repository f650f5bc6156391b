//! Commands accepted on the control channel.
//!
//! Dispatch is first-match-wins over [`COMMAND_TABLE`], an ordered list of
//! exact, case-sensitive tag prefixes. Store commands carry typed payloads
//! parsed from their attribute lists; a store command with too few attributes
//! parses to [`Command::Incomplete`] so the engine can report a no-op.

use crate::fields::{parse_attrs, Attr, ATTR_DELIMITER};

/// Minimum attribute count of a `$SD` command.
pub const STORE_DATA_MIN_FIELDS: usize = 19;

/// Attribute count of a `$SD` command carrying the external telemetry block.
pub const STORE_DATA_FULL_FIELDS: usize = 27;

/// Minimum attribute count of a `$SM` command.
pub const STORE_MODE_MIN_FIELDS: usize = 6;

/// Number of fixed attributes in a `$SM` command before the path pairs.
pub const STORE_MODE_FIXED_FIELDS: usize = 5;

/// Maximum number of path entries carried by a `$SM` command.
pub const MAX_PATH_PAIRS: usize = 32;

/// Command tags understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    /// Restart request (`$R`)
    Restart,
    /// Version query (`$V`)
    Version,
    /// Live telemetry query (`$C`)
    Current,
    /// Full dump (`$D`)
    Dump,
    /// Store identity/position/operational data (`$SD`)
    StoreData,
    /// Store modes and path program (`$SM`)
    StoreMode,
}

impl CommandTag {
    /// Get the literal tag used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandTag::Restart => "$R",
            CommandTag::Version => "$V",
            CommandTag::Current => "$C",
            CommandTag::Dump => "$D",
            CommandTag::StoreData => "$SD",
            CommandTag::StoreMode => "$SM",
        }
    }
}

/// Ordered dispatch table. The first entry whose tag prefixes the line wins.
pub const COMMAND_TABLE: &[CommandTag] = &[
    CommandTag::Restart,
    CommandTag::Version,
    CommandTag::Current,
    CommandTag::Dump,
    CommandTag::StoreData,
    CommandTag::StoreMode,
];

/// Find the table entry matching a line, returning the tag and the value that
/// follows it.
pub fn match_tag(line: &str) -> Option<(CommandTag, &str)> {
    COMMAND_TABLE
        .iter()
        .find(|tag| line.starts_with(tag.as_str()))
        .map(|tag| (*tag, line[tag.as_str().len()..].trim()))
}

/// External telemetry and position shift block of a `$SD` command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExternalBlock {
    /// External telemetry protocol (0 none, 1 GPS, 2 LTM).
    pub protocol: u8,
    /// External link baud rate.
    pub baud: u32,
    /// External link receive pin.
    pub rx_pin: u8,
    /// External link transmit pin.
    pub tx_pin: u8,
    /// Position shift mode (0 none, 1 location, 2 radius).
    pub shift_mode: u8,
    /// Shift radius in meters.
    pub shift_radius: u16,
    /// Minimum shift distance in meters.
    pub shift_min: u16,
    /// Maximum shift distance in meters.
    pub shift_max: u16,
}

/// Payload of a `$SD` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreData {
    /// UAS id (serial number or registration).
    pub uas_id: String,
    /// Operator id.
    pub uas_operator: String,
    /// Self-id description.
    pub uas_description: String,
    /// UA type code.
    pub uas_type: u8,
    /// Primary id type code.
    pub id_type: u8,
    /// Origin latitude in degrees.
    pub lat: f64,
    /// Origin longitude in degrees.
    pub lng: f64,
    /// Base altitude in meters.
    pub alt: i16,
    /// Operator latitude in degrees.
    pub op_lat: f64,
    /// Operator longitude in degrees.
    pub op_lng: f64,
    /// Operator altitude in meters.
    pub op_alt: i16,
    /// Ground speed in mph.
    pub speed: u16,
    /// Simulated satellite count.
    pub sats: u8,
    /// Broadcast MAC address.
    pub mac: [u8; 6],
    /// Application mode code.
    pub mode: u8,
    /// Geofence center latitude.
    pub geofence_lat: f64,
    /// Geofence center longitude.
    pub geofence_lng: f64,
    /// Geofence radius in meters.
    pub geofence_radius: u16,
    /// Geofence spawn interval.
    pub geofence_spawn: u8,
    /// External block, present only when exactly 27 attributes are given.
    pub external: Option<ExternalBlock>,
}

impl StoreData {
    /// Build from an attribute list. Returns `None` with fewer than
    /// [`STORE_DATA_MIN_FIELDS`] attributes.
    pub fn from_attrs(attrs: &[Attr<'_>]) -> Option<StoreData> {
        if attrs.len() < STORE_DATA_MIN_FIELDS {
            return None;
        }

        let external = if attrs.len() == STORE_DATA_FULL_FIELDS {
            Some(ExternalBlock {
                protocol: attrs[19].as_u8(),
                baud: attrs[20].as_u32(),
                rx_pin: attrs[21].as_u8(),
                tx_pin: attrs[22].as_u8(),
                shift_mode: attrs[23].as_u8(),
                shift_radius: attrs[24].as_u16(),
                shift_min: attrs[25].as_u16(),
                shift_max: attrs[26].as_u16(),
            })
        } else {
            None
        };

        Some(StoreData {
            uas_id: attrs[0].as_str().to_string(),
            uas_operator: attrs[1].as_str().to_string(),
            uas_description: attrs[2].as_str().to_string(),
            uas_type: attrs[3].as_u8(),
            id_type: attrs[4].as_u8(),
            lat: attrs[5].as_f64(),
            lng: attrs[6].as_f64(),
            alt: attrs[7].as_i16(),
            op_lat: attrs[8].as_f64(),
            op_lng: attrs[9].as_f64(),
            op_alt: attrs[10].as_i16(),
            speed: attrs[11].as_u16(),
            sats: attrs[12].as_u8(),
            mac: parse_mac(attrs[13].as_str()),
            mode: attrs[14].as_u8(),
            geofence_lat: attrs[15].as_f64(),
            geofence_lng: attrs[16].as_f64(),
            geofence_radius: attrs[17].as_u16(),
            geofence_spawn: attrs[18].as_u8(),
            external,
        })
    }

    fn to_value_string(&self) -> String {
        let mut parts = vec![
            self.uas_id.clone(),
            self.uas_operator.clone(),
            self.uas_description.clone(),
            self.uas_type.to_string(),
            self.id_type.to_string(),
            self.lat.to_string(),
            self.lng.to_string(),
            self.alt.to_string(),
            self.op_lat.to_string(),
            self.op_lng.to_string(),
            self.op_alt.to_string(),
            self.speed.to_string(),
            self.sats.to_string(),
            format_mac(&self.mac),
            self.mode.to_string(),
            self.geofence_lat.to_string(),
            self.geofence_lng.to_string(),
            self.geofence_radius.to_string(),
            self.geofence_spawn.to_string(),
        ];
        if let Some(ext) = &self.external {
            parts.extend([
                ext.protocol.to_string(),
                ext.baud.to_string(),
                ext.rx_pin.to_string(),
                ext.tx_pin.to_string(),
                ext.shift_mode.to_string(),
                ext.shift_radius.to_string(),
                ext.shift_min.to_string(),
                ext.shift_max.to_string(),
            ]);
        }
        parts.join("|")
    }
}

/// Payload of a `$SM` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreMode {
    /// Application mode code.
    pub mode: u8,
    /// Fly mode code.
    pub fly_mode: u8,
    /// Path mode code.
    pub path_mode: u8,
    /// Ground speed in mph.
    pub speed: u16,
    /// Base altitude in meters.
    pub alt: i16,
    /// Path program as `(heading_deg, distance_m)` pairs, at most
    /// [`MAX_PATH_PAIRS`].
    pub path: Vec<(f64, f64)>,
}

impl StoreMode {
    /// Build from an attribute list. Returns `None` with fewer than
    /// [`STORE_MODE_MIN_FIELDS`] attributes.
    ///
    /// The attributes after the five fixed ones are `heading,distance` pairs.
    /// Some hosts prefix the pairs with their count; an odd number of trailing
    /// attributes means the first one is that count and it is skipped.
    pub fn from_attrs(attrs: &[Attr<'_>]) -> Option<StoreMode> {
        if attrs.len() < STORE_MODE_MIN_FIELDS {
            return None;
        }

        let mut trailing = &attrs[STORE_MODE_FIXED_FIELDS..];
        if trailing.len() % 2 == 1 {
            trailing = &trailing[1..];
        }

        let path = trailing
            .chunks_exact(2)
            .take(MAX_PATH_PAIRS)
            .map(|pair| (pair[0].as_f64(), pair[1].as_f64()))
            .collect();

        Some(StoreMode {
            mode: attrs[0].as_u8(),
            fly_mode: attrs[1].as_u8(),
            path_mode: attrs[2].as_u8(),
            speed: attrs[3].as_u16(),
            alt: attrs[4].as_i16(),
            path,
        })
    }

    fn to_value_string(&self) -> String {
        let mut parts = vec![
            self.mode.to_string(),
            self.fly_mode.to_string(),
            self.path_mode.to_string(),
            self.speed.to_string(),
            self.alt.to_string(),
        ];
        for (heading, distance) in &self.path {
            parts.push(heading.to_string());
            parts.push(distance.to_string());
        }
        parts.join("|")
    }
}

/// Commands that can be sent to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Restart the engine. No response is sent.
    Restart,

    /// Query the firmware version.
    Version,

    /// Query the live telemetry line.
    Current,

    /// Query the full parameter/state/path dump.
    Dump,

    /// Store identity, position and operational parameters.
    StoreData(StoreData),

    /// Store modes and rewrite the path program.
    StoreMode(StoreMode),

    /// A store command with too few attributes.
    Incomplete {
        /// The matched tag.
        tag: CommandTag,
        /// Number of attributes received.
        fields: usize,
    },
}

impl Command {
    /// Parse a trimmed command line.
    ///
    /// Returns `None` when no tag in [`COMMAND_TABLE`] matches; the engine
    /// answers those with a negative acknowledgement.
    pub fn parse(line: &str) -> Option<Command> {
        let (tag, value) = match_tag(line.trim())?;

        let command = match tag {
            CommandTag::Restart => Command::Restart,
            CommandTag::Version => Command::Version,
            CommandTag::Current => Command::Current,
            CommandTag::Dump => Command::Dump,
            CommandTag::StoreData => {
                let attrs = parse_attrs(value);
                match StoreData::from_attrs(&attrs) {
                    Some(data) => Command::StoreData(data),
                    None => Command::Incomplete { tag, fields: attrs.len() },
                }
            }
            CommandTag::StoreMode => {
                let attrs = parse_attrs(value);
                match StoreMode::from_attrs(&attrs) {
                    Some(mode) => Command::StoreMode(mode),
                    None => Command::Incomplete { tag, fields: attrs.len() },
                }
            }
        };

        Some(command)
    }

    /// Get the tag this command was matched by.
    pub fn tag(&self) -> CommandTag {
        match self {
            Command::Restart => CommandTag::Restart,
            Command::Version => CommandTag::Version,
            Command::Current => CommandTag::Current,
            Command::Dump => CommandTag::Dump,
            Command::StoreData(_) => CommandTag::StoreData,
            Command::StoreMode(_) => CommandTag::StoreMode,
            Command::Incomplete { tag, .. } => *tag,
        }
    }

    /// Encode the command as a line to send to the engine (including the
    /// terminator).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = self.to_command_string().into_bytes();
        buf.push(b'\n');
        buf
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        let tag = self.tag().as_str();
        match self {
            Command::Restart | Command::Version | Command::Current | Command::Dump => {
                tag.to_string()
            }
            Command::StoreData(data) => format!("{}{}{}", tag, ATTR_DELIMITER, data.to_value_string()),
            Command::StoreMode(mode) => format!("{}{}{}", tag, ATTR_DELIMITER, mode.to_value_string()),
            Command::Incomplete { .. } => tag.to_string(),
        }
    }
}

/// Parse a `xx:xx:xx:xx:xx:xx` MAC address. Malformed octets read as 0.
pub fn parse_mac(text: &str) -> [u8; 6] {
    let mut mac = [0u8; 6];
    for (octet, part) in mac.iter_mut().zip(text.trim().split(':')) {
        *octet = u8::from_str_radix(part.trim(), 16).unwrap_or(0);
    }
    mac
}

/// Format a MAC address as upper-case `XX:XX:XX:XX:XX:XX`.
pub fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_data_line(fields: usize) -> String {
        let values = [
            "SN-1", "OP-1", "Recreational", "2", "1", "37.5", "-122.25", "120", "37.4", "-122.2",
            "15", "40", "9", "02:11:22:33:44:55", "0", "37.6", "-122.3", "1500", "5", "1", "9600",
            "16", "17", "2", "300", "50", "200",
        ];
        format!("$SD|{}", values[..fields].join("|"))
    }

    #[test]
    fn test_simple_tags() {
        assert_eq!(Command::parse("$R"), Some(Command::Restart));
        assert_eq!(Command::parse("$V"), Some(Command::Version));
        assert_eq!(Command::parse("$C"), Some(Command::Current));
        assert_eq!(Command::parse("$D"), Some(Command::Dump));
    }

    #[test]
    fn test_unknown_and_case_sensitive() {
        assert_eq!(Command::parse("$X"), None);
        assert_eq!(Command::parse("$v"), None);
        assert_eq!(Command::parse("V"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_first_match_wins() {
        // "$D" is listed before "$SD" but does not prefix it.
        assert_eq!(match_tag("$SD|x").map(|(t, _)| t), Some(CommandTag::StoreData));
        // Trailing text after a simple tag is still that tag.
        assert_eq!(Command::parse("$Vxyz"), Some(Command::Version));
    }

    #[test]
    fn test_store_data_19_fields() {
        let cmd = Command::parse(&store_data_line(19)).unwrap();
        let Command::StoreData(data) = cmd else { panic!("expected StoreData") };
        assert_eq!(data.uas_id, "SN-1");
        assert_eq!(data.uas_operator, "OP-1");
        assert_eq!(data.lat, 37.5);
        assert_eq!(data.alt, 120);
        assert_eq!(data.mac, [0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(data.geofence_spawn, 5);
        assert!(data.external.is_none());
    }

    #[test]
    fn test_store_data_27_fields() {
        let cmd = Command::parse(&store_data_line(27)).unwrap();
        let Command::StoreData(data) = cmd else { panic!("expected StoreData") };
        let ext = data.external.unwrap();
        assert_eq!(ext.protocol, 1);
        assert_eq!(ext.baud, 9600);
        assert_eq!(ext.shift_mode, 2);
        assert_eq!(ext.shift_max, 200);
    }

    #[test]
    fn test_store_data_28_fields_has_no_external_block() {
        let line = format!("{}|extra", store_data_line(27));
        let Some(Command::StoreData(data)) = Command::parse(&line) else { panic!() };
        assert_eq!(data.uas_id, "SN-1");
        assert!(data.external.is_none());
    }

    #[test]
    fn test_store_data_negative_altitudes() {
        let line = "$SD|SN-1|OP-1|Coastal|2|1|31.5|35.4|-35|31.5|35.4|-40|40|9|02:11:22:33:44:55|0|0|0|0|0";
        let Some(Command::StoreData(data)) = Command::parse(line) else { panic!() };
        assert_eq!(data.alt, -35);
        assert_eq!(data.op_alt, -40);
    }

    #[test]
    fn test_store_data_18_fields_incomplete() {
        let cmd = Command::parse(&store_data_line(18)).unwrap();
        assert_eq!(cmd, Command::Incomplete { tag: CommandTag::StoreData, fields: 18 });
    }

    #[test]
    fn test_store_mode_pairs() {
        let cmd = Command::parse("$SM|0|0|2|60|100|90|1000|180|2000").unwrap();
        let Command::StoreMode(mode) = cmd else { panic!("expected StoreMode") };
        assert_eq!(mode.path_mode, 2);
        assert_eq!(mode.speed, 60);
        assert_eq!(mode.path, vec![(90.0, 1000.0), (180.0, 2000.0)]);
    }

    #[test]
    fn test_store_mode_negative_altitude() {
        let Some(Command::StoreMode(mode)) = Command::parse("$SM|0|1|0|45|-30|0") else { panic!() };
        assert_eq!(mode.alt, -30);
    }

    #[test]
    fn test_store_mode_with_count_prefix() {
        let cmd = Command::parse("$SM|0|1|2|60|100|2|90|1000|180|2000").unwrap();
        let Command::StoreMode(mode) = cmd else { panic!("expected StoreMode") };
        assert_eq!(mode.path, vec![(90.0, 1000.0), (180.0, 2000.0)]);
    }

    #[test]
    fn test_store_mode_caps_path() {
        let pairs: Vec<String> = (0..40).map(|i| format!("{}|{}", i, 100 + i)).collect();
        let line = format!("$SM|0|1|2|60|100|{}", pairs.join("|"));
        let Some(Command::StoreMode(mode)) = Command::parse(&line) else { panic!() };
        assert_eq!(mode.path.len(), MAX_PATH_PAIRS);
        assert_eq!(mode.path[31], (31.0, 131.0));
    }

    #[test]
    fn test_store_mode_too_few_fields() {
        let cmd = Command::parse("$SM|0|0|2|60").unwrap();
        assert_eq!(cmd, Command::Incomplete { tag: CommandTag::StoreMode, fields: 4 });
    }

    #[test]
    fn test_encode_round_trip_store_mode() {
        let cmd = Command::StoreMode(StoreMode {
            mode: 0,
            fly_mode: 1,
            path_mode: 2,
            speed: 60,
            alt: 100,
            path: vec![(90.0, 1000.0)],
        });
        assert_eq!(cmd.encode(), b"$SM|0|1|2|60|100|90|1000\n");
        assert_eq!(Command::parse(&cmd.to_command_string()), Some(cmd));
    }

    #[test]
    fn test_mac_parse_and_format() {
        let mac = parse_mac("de:ad:BE:ef:00:0a");
        assert_eq!(mac, [0xde, 0xad, 0xbe, 0xef, 0x00, 0x0a]);
        assert_eq!(format_mac(&mac), "DE:AD:BE:EF:00:0A");
        assert_eq!(parse_mac("zz:01"), [0, 1, 0, 0, 0, 0]);
    }
}
