//! Response formatting for the control protocol.
//!
//! Responses are single `|`-delimited lines led by a literal tag:
//! - `$V|<version>` for version queries
//! - `$C|...` or `$T|...` for live telemetry, depending on the source mode
//! - `$D|...` for the full dump
//! - `$-` for unknown commands

use crate::commands::{format_mac, ExternalBlock};

/// Negative acknowledgement sent for unrecognized lines.
pub const NACK: &str = "$-";

/// Live telemetry while flying a simulated position (`$C|...`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurrentLine {
    pub lat: f64,
    pub lng: f64,
    pub op_lat: f64,
    pub op_lng: f64,
    pub base_alt: f64,
    pub op_alt: f64,
    pub speed: i32,
    pub heading: i32,
    pub sats: i32,
    pub fly_mode: u8,
    pub path_mode: u8,
}

/// Live telemetry while passing through an external or spawned identity
/// (`$T|...`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryLine {
    pub lat: f64,
    pub lng: f64,
    pub base_alt: f64,
    pub speed: i32,
    pub heading: i32,
    pub mac: [u8; 6],
    pub uas_id: String,
    pub uas_operator: String,
    pub uas_description: String,
    pub uas_type: u8,
    pub id_type: u8,
    pub fly_mode: u8,
}

/// Full parameter, state and path dump (`$D|...`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DumpLine {
    pub version: u32,
    pub uas_id: String,
    pub uas_operator: String,
    pub uas_description: String,
    pub uas_type: u8,
    pub id_type: u8,
    pub lat: f64,
    pub lng: f64,
    pub alt: i16,
    pub op_lat: f64,
    pub op_lng: f64,
    pub op_alt: i16,
    pub speed: u16,
    pub sats: u8,
    pub mac: [u8; 6],
    pub mode: u8,
    pub geofence_lat: f64,
    pub geofence_lng: f64,
    pub geofence_radius: u16,
    pub geofence_spawn: u8,
    pub external: ExternalBlock,
    /// Path program as `(heading_deg, distance_m)` pairs.
    pub path: Vec<(f64, f64)>,
}

/// A response written to the control channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Firmware version.
    Version {
        /// Version number (e.g. 1008).
        version: u32,
    },

    /// Live telemetry in simulated-position mode.
    Current(CurrentLine),

    /// Live telemetry in pass-through mode.
    Telemetry(TelemetryLine),

    /// Full dump.
    Dump(DumpLine),

    /// Unknown command.
    Nack,
}

impl Response {
    /// Format the response line without the terminator.
    pub fn to_line(&self) -> String {
        match self {
            Response::Version { version } => format!("$V|{}", version),
            Response::Current(c) => format!(
                "$C|{:.6}|{:.6}|{:.6}|{:.6}|{:.6}|{:.6}|{}|{}|{}|{}|{}",
                c.lat,
                c.lng,
                c.op_lat,
                c.op_lng,
                c.base_alt,
                c.op_alt,
                c.speed,
                c.heading,
                c.sats,
                c.fly_mode,
                c.path_mode
            ),
            Response::Telemetry(t) => format!(
                "$T|{:.6}|{:.6}|{:.6}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
                t.lat,
                t.lng,
                t.base_alt,
                t.speed,
                t.heading,
                format_mac(&t.mac),
                t.uas_id,
                t.uas_operator,
                t.uas_description,
                t.uas_type,
                t.id_type,
                t.fly_mode
            ),
            Response::Dump(d) => Self::dump_line(d),
            Response::Nack => NACK.to_string(),
        }
    }

    fn dump_line(d: &DumpLine) -> String {
        let ext = &d.external;
        let mut line = format!(
            "$D|{}|{}|{}|{}|{}|{}|{:.6}|{:.6}|{}|{:.6}|{:.6}|{}|{}|{}|{}|{}|{:.6}|{:.6}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            d.version,
            d.uas_id,
            d.uas_operator,
            d.uas_description,
            d.uas_type,
            d.id_type,
            d.lat,
            d.lng,
            d.alt,
            d.op_lat,
            d.op_lng,
            d.op_alt,
            d.speed,
            d.sats,
            format_mac(&d.mac),
            d.mode,
            d.geofence_lat,
            d.geofence_lng,
            d.geofence_radius,
            d.geofence_spawn,
            ext.protocol,
            ext.baud,
            ext.rx_pin,
            ext.tx_pin,
            ext.shift_mode,
            ext.shift_radius,
            ext.shift_min,
            ext.shift_max,
            d.path.len()
        );
        for (heading, distance) in &d.path {
            line.push_str(&format!("|{}|{}", heading, distance));
        }
        line
    }

    /// Check if this is a negative acknowledgement.
    pub fn is_nack(&self) -> bool {
        matches!(self, Response::Nack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_line() {
        assert_eq!(Response::Version { version: 1008 }.to_line(), "$V|1008");
    }

    #[test]
    fn test_nack_line() {
        assert_eq!(Response::Nack.to_line(), "$-");
        assert!(Response::Nack.is_nack());
    }

    #[test]
    fn test_current_line() {
        let line = Response::Current(CurrentLine {
            lat: 37.5,
            lng: -122.25,
            op_lat: 37.4,
            op_lng: -122.2,
            base_alt: 120.0,
            op_alt: 15.0,
            speed: 40,
            heading: 270,
            sats: 9,
            fly_mode: 1,
            path_mode: 2,
        })
        .to_line();
        assert_eq!(
            line,
            "$C|37.500000|-122.250000|37.400000|-122.200000|120.000000|15.000000|40|270|9|1|2"
        );
    }

    #[test]
    fn test_telemetry_line() {
        let line = Response::Telemetry(TelemetryLine {
            lat: 1.0,
            lng: 2.0,
            base_alt: 3.0,
            speed: 4,
            heading: 5,
            mac: [0x02, 0, 0, 0, 0, 0xff],
            uas_id: "SN".to_string(),
            uas_operator: "OP".to_string(),
            uas_description: "Desc".to_string(),
            uas_type: 2,
            id_type: 1,
            fly_mode: 1,
        })
        .to_line();
        assert_eq!(line, "$T|1.000000|2.000000|3.000000|4|5|02:00:00:00:00:FF|SN|OP|Desc|2|1|1");
    }

    #[test]
    fn test_dump_line_field_order() {
        let dump = DumpLine {
            version: 1008,
            uas_id: "SN".to_string(),
            uas_operator: "OP".to_string(),
            uas_description: "D".to_string(),
            uas_type: 2,
            id_type: 1,
            lat: 1.0,
            lng: 2.0,
            alt: 100,
            op_lat: 3.0,
            op_lng: 4.0,
            op_alt: 10,
            speed: 60,
            sats: 8,
            mac: [1, 2, 3, 4, 5, 6],
            mode: 0,
            geofence_lat: 5.0,
            geofence_lng: 6.0,
            geofence_radius: 1500,
            geofence_spawn: 5,
            external: ExternalBlock::default(),
            path: vec![(90.0, 1000.0), (180.5, 2000.0)],
        };
        let line = Response::Dump(dump).to_line();
        let fields: Vec<&str> = line.split('|').collect();
        assert_eq!(fields[0], "$D");
        assert_eq!(fields[1], "1008");
        assert_eq!(fields[15], "01:02:03:04:05:06");
        assert_eq!(fields[29], "2");
        assert_eq!(&fields[30..], &["90", "1000", "180.5", "2000"]);
    }

    #[test]
    fn test_dump_line_empty_path() {
        let line = Response::Dump(DumpLine::default()).to_line();
        assert!(line.ends_with("|0"));
        assert_eq!(line.split('|').count(), 30);
    }
}
