//! Structured Remote ID message data.
//!
//! These are the encoder-ready field sets for the six ASTM F3411 message
//! kinds. The store derives them from raw parameters and the scheduler hands
//! them to a [`MessageEncoder`](crate::encoder::MessageEncoder).

use heapless::{String, Vec};

/// Size of an encoded broadcast record.
pub const MESSAGE_SIZE: usize = 25;

/// Length of the UAS id and operator id fields.
pub const ID_SIZE: usize = 20;

/// Length of the self-id description field.
pub const STR_SIZE: usize = 23;

/// Protocol version carried in every record header.
pub const PROTOCOL_VERSION: u8 = 2;

/// Maximum number of authentication pages.
pub const AUTH_MAX_PAGES: usize = 16;

/// Authentication bytes carried by page 0.
pub const AUTH_PAGE_ZERO_DATA_SIZE: usize = 17;

/// Authentication bytes carried by pages after the first.
pub const AUTH_PAGE_NONZERO_DATA_SIZE: usize = 23;

/// Largest authentication blob that fits in [`AUTH_MAX_PAGES`].
pub const MAX_AUTH_LENGTH: usize =
    AUTH_PAGE_ZERO_DATA_SIZE + AUTH_PAGE_NONZERO_DATA_SIZE * (AUTH_MAX_PAGES - 1);

/// Unix time of 2019-01-01T00:00:00Z, the epoch of auth and system timestamps.
pub const AUTH_DATUM: i64 = 1_546_300_800;

/// Satellite count required to report a valid location.
pub const MIN_SATELLITES: i32 = 7;

/// Invalid direction marker.
pub const INV_DIR: f32 = 361.0;
/// Invalid horizontal speed marker.
pub const INV_SPEED_H: f32 = 255.0;
/// Invalid vertical speed marker.
pub const INV_SPEED_V: f32 = 63.0;
/// Invalid altitude marker.
pub const INV_ALT: f32 = -1000.0;
/// Invalid timestamp marker.
pub const INV_TIMESTAMP: f32 = 0xFFFF as f32;

/// The six broadcast message kinds. The discriminant is the header type nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    BasicId = 0,
    Location = 1,
    Auth = 2,
    SelfId = 3,
    System = 4,
    OperatorId = 5,
}

impl MessageKind {
    /// Type nibble written into the record header.
    pub fn type_nibble(self) -> u8 {
        self as u8
    }

    /// Lowercase label for logs and metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            MessageKind::BasicId => "basic_id",
            MessageKind::Location => "location",
            MessageKind::Auth => "auth",
            MessageKind::SelfId => "self_id",
            MessageKind::System => "system",
            MessageKind::OperatorId => "operator_id",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// UAS identification type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum IdType {
    #[default]
    None = 0,
    SerialNumber = 1,
    CaaRegistration = 2,
    UtmAssigned = 3,
    SpecificSession = 4,
}

impl IdType {
    /// Map a wire code to an id type. Unknown codes map to `None`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => IdType::SerialNumber,
            2 => IdType::CaaRegistration,
            3 => IdType::UtmAssigned,
            4 => IdType::SpecificSession,
            _ => IdType::None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Unmanned aircraft type, wire codes 0-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum UaType {
    #[default]
    None = 0,
    Aeroplane = 1,
    HelicopterOrMultirotor = 2,
    Gyroplane = 3,
    HybridLift = 4,
    Ornithopter = 5,
    Glider = 6,
    Kite = 7,
    FreeBalloon = 8,
    CaptiveBalloon = 9,
    Airship = 10,
    FreeFallParachute = 11,
    Rocket = 12,
    TetheredPoweredAircraft = 13,
    GroundObstacle = 14,
    Other = 15,
}

impl UaType {
    /// Map a wire code to a UA type. Codes above 15 map to `Other`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => UaType::None,
            1 => UaType::Aeroplane,
            2 => UaType::HelicopterOrMultirotor,
            3 => UaType::Gyroplane,
            4 => UaType::HybridLift,
            5 => UaType::Ornithopter,
            6 => UaType::Glider,
            7 => UaType::Kite,
            8 => UaType::FreeBalloon,
            9 => UaType::CaptiveBalloon,
            10 => UaType::Airship,
            11 => UaType::FreeFallParachute,
            12 => UaType::Rocket,
            13 => UaType::TetheredPoweredAircraft,
            14 => UaType::GroundObstacle,
            _ => UaType::Other,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Operational status reported in the location record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OperationalStatus {
    #[default]
    Undeclared = 0,
    Ground = 1,
    Airborne = 2,
    Emergency = 3,
    RemoteIdSystemFailure = 4,
}

/// Reference of the location record's height field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum HeightReference {
    #[default]
    OverTakeoff = 0,
    OverGround = 1,
}

/// Classification scheme of the system record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ClassificationType {
    #[default]
    Undeclared = 0,
    EuropeanUnion = 1,
}

/// Source of the operator position in the system record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OperatorLocationType {
    #[default]
    Takeoff = 0,
    LiveGnss = 1,
    Fixed = 2,
}

/// Basic ID message fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicIdData {
    pub ua_type: UaType,
    pub id_type: IdType,
    pub uas_id: String<ID_SIZE>,
}

/// Location/vector message fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationData {
    pub status: OperationalStatus,
    /// Track direction in degrees, [0, 360) or [`INV_DIR`].
    pub direction: f32,
    /// Ground speed in m/s.
    pub speed_horizontal: f32,
    /// Vertical speed in m/s, up positive.
    pub speed_vertical: f32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_baro: f32,
    pub altitude_geo: f32,
    pub height_type: HeightReference,
    pub height: f32,
    pub horiz_accuracy: u8,
    pub vert_accuracy: u8,
    pub baro_accuracy: u8,
    pub speed_accuracy: u8,
    /// Seconds since the start of the current hour.
    pub timestamp: f32,
    pub timestamp_accuracy: u8,
}

impl Default for LocationData {
    fn default() -> Self {
        LocationData {
            status: OperationalStatus::Undeclared,
            direction: INV_DIR,
            speed_horizontal: INV_SPEED_H,
            speed_vertical: INV_SPEED_V,
            latitude: 0.0,
            longitude: 0.0,
            altitude_baro: INV_ALT,
            altitude_geo: INV_ALT,
            height_type: HeightReference::OverTakeoff,
            height: INV_ALT,
            horiz_accuracy: 0,
            vert_accuracy: 0,
            baro_accuracy: 0,
            speed_accuracy: 0,
            timestamp: INV_TIMESTAMP,
            timestamp_accuracy: 0,
        }
    }
}

/// One authentication page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthPage {
    pub auth_type: u8,
    pub page_number: u8,
    /// Page 0 only: index of the last page.
    pub last_page_index: u8,
    /// Page 0 only: total authentication length in bytes.
    pub length: u8,
    /// Page 0 only: seconds since [`AUTH_DATUM`].
    pub timestamp: u32,
    pub data: Vec<u8, AUTH_PAGE_NONZERO_DATA_SIZE>,
}

/// Self ID message fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelfIdData {
    pub desc_type: u8,
    pub description: String<STR_SIZE>,
}

/// System message fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemData {
    pub operator_location_type: OperatorLocationType,
    pub classification_type: ClassificationType,
    pub operator_latitude: f64,
    pub operator_longitude: f64,
    pub area_count: u16,
    pub area_radius: u16,
    pub area_ceiling: f32,
    pub area_floor: f32,
    pub category_eu: u8,
    pub class_eu: u8,
    pub operator_altitude_geo: f32,
    /// Seconds since [`AUTH_DATUM`].
    pub timestamp: u32,
}

impl Default for SystemData {
    fn default() -> Self {
        SystemData {
            operator_location_type: OperatorLocationType::Takeoff,
            classification_type: ClassificationType::Undeclared,
            operator_latitude: 0.0,
            operator_longitude: 0.0,
            area_count: 1,
            area_radius: 0,
            area_ceiling: INV_ALT,
            area_floor: INV_ALT,
            category_eu: 0,
            class_eu: 0,
            operator_altitude_geo: INV_ALT,
            timestamp: 0,
        }
    }
}

/// Operator ID message fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperatorIdData {
    pub operator_id_type: u8,
    pub operator_id: String<ID_SIZE>,
}
