//! Parameter and kinematic store.
//!
//! The store owns the aircraft identity, its live kinematic state and the
//! encoder-ready message fields derived from both. Every identity setter
//! re-derives the message fields, so readers always see a consistent view.
//!
//! Text parameters live in fixed-capacity strings. Setters copy as much as
//! fits, report whether anything was cut, and log and count the truncation.

use heapless::String;
use ridsim_metrics::metric_defs;
use tracing::warn;

use crate::clock::WallTime;
use crate::geo::{LatLon, MPH_TO_MPS};
use crate::odid::{
    BasicIdData, ClassificationType, IdType, LocationData, OperationalStatus, OperatorIdData,
    SelfIdData, SystemData, UaType, AUTH_DATUM, MIN_SATELLITES, STR_SIZE,
};

/// Capacity of the identity text parameters.
pub const PARAM_CAPACITY: usize = 23;

/// Capacity of the advertised SSID label.
pub const SSID_CAPACITY: usize = 31;

/// Fixed height above the base altitude reported as AGL.
pub const DEFAULT_AGL_M: f64 = 100.0;

/// Label advertised when no operator id is set.
pub const OPEN_SSID: &str = "UAS_ID_OPEN";

/// An identity text parameter.
pub type ParamText = String<PARAM_CAPACITY>;

/// The advertised SSID label.
pub type SsidText = String<SSID_CAPACITY>;

/// Copy `text` into a bounded string, returning whether it was truncated.
///
/// Truncation happens on a character boundary, is logged, and is counted
/// under `field`.
pub fn bounded_copy<const N: usize>(field: &'static str, text: &str) -> (String<N>, bool) {
    let mut out = String::new();
    let mut truncated = false;
    for c in text.chars() {
        if out.push(c).is_err() {
            truncated = true;
            break;
        }
    }

    if truncated {
        warn!(
            "Store: {} truncated to {} bytes ({} given): '{}'",
            field,
            out.len(),
            text.len(),
            out
        );
        metrics::counter!(metric_defs::STORE_TRUNCATIONS.name, "field" => field).increment(1);
    }

    (out, truncated)
}

/// Aircraft identity parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Identity {
    pub uas_id: ParamText,
    pub uas_operator: ParamText,
    pub uas_description: ParamText,
    pub uas_type: UaType,
    pub id_type: IdType,
    /// Id type of the second Basic ID slot.
    pub id_type2: IdType,
    /// Classification region (0 undeclared, 1 EU).
    pub region: u8,
    pub eu_category: u8,
    pub eu_class: u8,
}

/// Live kinematic state.
#[derive(Debug, Clone, PartialEq)]
pub struct Kinematics {
    pub position: LatLon,
    /// Origin of the flight; random-walk offsets are relative to it.
    pub base: LatLon,
    pub operator: LatLon,
    pub base_alt_m: f64,
    pub operator_alt_m: f64,
    pub alt_msl_m: f64,
    pub alt_agl_m: f64,
    /// Ground speed in mph, as configured.
    pub speed_mph: i32,
    /// Ground speed in m/s, derived from `speed_mph`.
    pub speed_mps: f64,
    /// Heading in integer degrees, [0, 360).
    pub heading: i32,
    pub satellites: i32,
    pub base_valid: bool,
}

impl Default for Kinematics {
    fn default() -> Self {
        Kinematics {
            position: LatLon::default(),
            base: LatLon::default(),
            operator: LatLon::default(),
            base_alt_m: 0.0,
            operator_alt_m: 0.0,
            alt_msl_m: DEFAULT_AGL_M,
            alt_agl_m: DEFAULT_AGL_M,
            speed_mph: 0,
            speed_mps: 0.0,
            heading: 0,
            satellites: 8,
            base_valid: true,
        }
    }
}

/// Encoder-ready message fields derived from the identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Derived {
    pub basic_id: [BasicIdData; 2],
    pub self_id: SelfIdData,
    pub operator_id: OperatorIdData,
    pub system: SystemData,
    pub ssid: SsidText,
    /// Whether the operator position has been written into `system`.
    pub operator_latched: bool,
}

/// The parameter and kinematic store.
#[derive(Debug, Clone)]
pub struct Store {
    identity: Identity,
    kinematics: Kinematics,
    derived: Derived,
    mac: [u8; 6],
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        let mut store = Store {
            identity: Identity::default(),
            kinematics: Kinematics::default(),
            derived: Derived::default(),
            mac: [0; 6],
        };
        store.commit();
        store
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    /// Mutable kinematics for the path model and telemetry hand-off.
    pub fn kinematics_mut(&mut self) -> &mut Kinematics {
        &mut self.kinematics
    }

    pub fn derived(&self) -> &Derived {
        &self.derived
    }

    pub fn mac(&self) -> [u8; 6] {
        self.mac
    }

    pub fn ssid(&self) -> &str {
        &self.derived.ssid
    }

    // ========================================================================
    // Identity Setters
    // ========================================================================

    /// Set the operator id. Returns true if it was truncated.
    pub fn set_operator(&mut self, operator: &str) -> bool {
        let (text, truncated) = bounded_copy("uas_operator", operator);
        self.identity.uas_operator = text;
        self.commit();
        truncated
    }

    /// Set the self-id description. Returns true if it was truncated.
    pub fn set_description(&mut self, description: &str) -> bool {
        let (text, truncated) = bounded_copy("uas_description", description);
        self.identity.uas_description = text;
        self.commit();
        truncated
    }

    /// Set the UAS id and its type. Returns true if the id was truncated.
    pub fn set_remote_id(&mut self, uas_id: &str, id_type: IdType) -> bool {
        let (text, truncated) = bounded_copy("uas_id", uas_id);
        self.identity.uas_id = text;
        self.identity.id_type = id_type;
        self.commit();
        truncated
    }

    /// Clear the UAS id; the primary Basic ID slot stops broadcasting.
    pub fn clear_remote_id(&mut self) {
        self.set_remote_id("", IdType::None);
    }

    pub fn set_type(&mut self, ua_type: UaType) {
        self.identity.uas_type = ua_type;
        self.commit();
    }

    /// Set the id type of the second Basic ID slot.
    pub fn set_secondary_id_type(&mut self, id_type: IdType) {
        self.identity.id_type2 = id_type;
        self.commit();
    }

    /// Set region, EU category and EU class codes.
    pub fn set_classification(&mut self, region: u8, eu_category: u8, eu_class: u8) {
        self.identity.region = region;
        self.identity.eu_category = eu_category;
        self.identity.eu_class = eu_class;
        self.commit();
    }

    pub fn set_mac(&mut self, mac: [u8; 6]) {
        self.mac = mac;
    }

    // ========================================================================
    // Kinematic Setters
    // ========================================================================

    /// Set ground speed in mph; also derives m/s.
    pub fn set_speed(&mut self, speed_mph: i32) {
        self.kinematics.speed_mph = speed_mph;
        self.kinematics.speed_mps = speed_mph as f64 * MPH_TO_MPS;
    }

    /// Set the base altitude; MSL is base plus the fixed AGL height.
    pub fn set_altitude(&mut self, base_alt_m: f64) {
        self.kinematics.base_alt_m = base_alt_m;
        self.kinematics.alt_agl_m = DEFAULT_AGL_M;
        self.kinematics.alt_msl_m = base_alt_m + DEFAULT_AGL_M;
    }

    /// Move the origin. The current, base and operator positions all snap to
    /// it; callers also re-base the path model.
    pub fn set_origin(&mut self, origin: LatLon) {
        self.kinematics.position = origin;
        self.kinematics.base = origin;
        self.kinematics.operator = origin;
    }

    pub fn set_operator_position(&mut self, position: LatLon) {
        self.kinematics.operator = position;
    }

    pub fn set_operator_altitude(&mut self, alt_m: f64) {
        self.kinematics.operator_alt_m = alt_m;
    }

    pub fn set_satellites(&mut self, satellites: i32) {
        self.kinematics.satellites = satellites;
    }

    pub fn set_base_valid(&mut self, valid: bool) {
        self.kinematics.base_valid = valid;
    }

    // ========================================================================
    // Derivation
    // ========================================================================

    /// Re-derive all encoder-ready fields from the identity.
    pub fn commit(&mut self) {
        let id = &self.identity;
        let d = &mut self.derived;

        d.operator_id.operator_id = prefix(&id.uas_operator);
        d.self_id.description = prefix::<STR_SIZE>(&id.uas_description);

        for (slot, id_type) in d.basic_id.iter_mut().zip([id.id_type, id.id_type2]) {
            slot.ua_type = id.uas_type;
            slot.id_type = id_type;
            slot.uas_id = match id_type {
                IdType::SerialNumber | IdType::UtmAssigned => prefix(&id.uas_id),
                IdType::CaaRegistration => prefix(&id.uas_operator),
                IdType::None | IdType::SpecificSession => String::new(),
            };
        }

        if id.region < 2 {
            d.system.classification_type = if id.region == 1 {
                ClassificationType::EuropeanUnion
            } else {
                ClassificationType::Undeclared
            };
        }
        if id.eu_category < 4 {
            d.system.category_eu = id.eu_category;
        }
        if id.eu_class < 8 {
            d.system.class_eu = id.eu_class;
        }

        d.ssid = if id.uas_operator.is_empty() {
            prefix(OPEN_SSID)
        } else {
            prefix(&id.uas_operator)
        };
    }

    /// Latch the operator position into the system fields the first time the
    /// base position is valid. Returns true when it latched.
    pub fn latch_operator(&mut self, now: &WallTime) -> bool {
        if self.derived.operator_latched || !self.kinematics.base_valid {
            return false;
        }
        let k = &self.kinematics;
        let system = &mut self.derived.system;
        system.operator_latitude = k.operator.lat;
        system.operator_longitude = k.operator.lon;
        system.operator_altitude_geo = k.operator_alt_m as f32;
        system.timestamp = now.since_datum(AUTH_DATUM);
        self.derived.operator_latched = true;
        true
    }

    /// System fields with a refreshed timestamp.
    pub fn system_data(&mut self, now: &WallTime) -> &SystemData {
        if now.unix_secs > AUTH_DATUM {
            self.derived.system.timestamp = now.since_datum(AUTH_DATUM);
        }
        &self.derived.system
    }

    /// Build location fields. `speed_jitter` and `height_jitter` are relative
    /// factors applied to speed and AGL height.
    pub fn location_data(&self, speed_jitter: f64, height_jitter: f64, now: &WallTime) -> LocationData {
        let k = &self.kinematics;
        if k.satellites < MIN_SATELLITES {
            return LocationData {
                status: OperationalStatus::RemoteIdSystemFailure,
                ..Default::default()
            };
        }

        let speed = k.speed_mph as f64;
        LocationData {
            status: OperationalStatus::Undeclared,
            direction: k.heading as f32,
            speed_horizontal: (MPH_TO_MPS * (speed + speed_jitter * speed)) as f32,
            latitude: k.position.lat,
            longitude: k.position.lon,
            height: (k.alt_agl_m + height_jitter * k.alt_agl_m) as f32,
            altitude_geo: k.alt_msl_m as f32,
            timestamp: now.seconds_since_hour() as f32,
            ..Default::default()
        }
    }
}

fn prefix<const N: usize>(text: &str) -> String<N> {
    let mut out = String::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odid::{INV_DIR, INV_SPEED_V};
    use approx::assert_abs_diff_eq;

    fn wall_time() -> WallTime {
        WallTime::from_unix(AUTH_DATUM + 3600 * 5 + 12 * 60 + 34, 560)
    }

    #[test]
    fn test_bounded_copy_truncates() {
        let (text, truncated) = bounded_copy::<PARAM_CAPACITY>("test", "ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert!(truncated);
        assert_eq!(text.as_str(), "ABCDEFGHIJKLMNOPQRSTUVW");

        let (text, truncated) = bounded_copy::<PARAM_CAPACITY>("test", "short");
        assert!(!truncated);
        assert_eq!(text.as_str(), "short");
    }

    #[test]
    fn test_bounded_copy_char_boundary() {
        // 11 two-byte characters = 22 bytes, the 12th does not fit.
        let (text, truncated) = bounded_copy::<PARAM_CAPACITY>("test", "éééééééééééé");
        assert!(truncated);
        assert_eq!(text.len(), 22);
    }

    #[test]
    fn test_setters_report_truncation() {
        let mut store = Store::new();
        assert!(store.set_operator("OPERATOR-ID-THAT-IS-WAY-TOO-LONG"));
        assert_eq!(store.identity().uas_operator.len(), PARAM_CAPACITY);
        assert!(!store.set_description("Recreational"));
    }

    #[test]
    fn test_commit_derives_operator_and_self_id() {
        let mut store = Store::new();
        store.set_operator("FIN87astrdge12k8xyzABC");
        store.set_description("Recreational");

        let d = store.derived();
        assert_eq!(d.operator_id.operator_id.as_str(), "FIN87astrdge12k8xyzA");
        assert_eq!(d.self_id.description.as_str(), "Recreational");
        assert_eq!(store.ssid(), "FIN87astrdge12k8xyzABC");
    }

    #[test]
    fn test_ssid_defaults_open() {
        let store = Store::new();
        assert_eq!(store.ssid(), OPEN_SSID);
    }

    #[test]
    fn test_basic_id_slots() {
        let mut store = Store::new();
        store.set_operator("OPERATOR");
        store.set_remote_id("SERIAL-123", IdType::SerialNumber);
        store.set_secondary_id_type(IdType::CaaRegistration);
        store.set_type(UaType::HelicopterOrMultirotor);

        let slots = &store.derived().basic_id;
        assert_eq!(slots[0].uas_id.as_str(), "SERIAL-123");
        assert_eq!(slots[0].id_type, IdType::SerialNumber);
        assert_eq!(slots[0].ua_type, UaType::HelicopterOrMultirotor);
        assert_eq!(slots[1].uas_id.as_str(), "OPERATOR");
        assert_eq!(slots[1].id_type, IdType::CaaRegistration);

        store.clear_remote_id();
        assert_eq!(store.derived().basic_id[0].id_type, IdType::None);
        assert!(store.derived().basic_id[0].uas_id.is_empty());
    }

    #[test]
    fn test_classification_codes_bounded() {
        let mut store = Store::new();
        store.set_classification(1, 2, 3);
        let system = &store.derived().system;
        assert_eq!(system.classification_type, ClassificationType::EuropeanUnion);
        assert_eq!(system.category_eu, 2);
        assert_eq!(system.class_eu, 3);

        // Out-of-range codes leave the previous values in place.
        store.set_classification(5, 9, 12);
        let system = &store.derived().system;
        assert_eq!(system.classification_type, ClassificationType::EuropeanUnion);
        assert_eq!(system.category_eu, 2);
        assert_eq!(system.class_eu, 3);
    }

    #[test]
    fn test_speed_and_altitude_derivation() {
        let mut store = Store::new();
        store.set_speed(60);
        assert_abs_diff_eq!(store.kinematics().speed_mps, 26.8224, epsilon = 1e-9);

        store.set_altitude(137.0);
        assert_eq!(store.kinematics().alt_agl_m, 100.0);
        assert_eq!(store.kinematics().alt_msl_m, 237.0);
    }

    #[test]
    fn test_set_origin_moves_everything() {
        let mut store = Store::new();
        let origin = LatLon::new(37.5, -122.25);
        store.set_origin(origin);
        assert_eq!(store.kinematics().position, origin);
        assert_eq!(store.kinematics().base, origin);
        assert_eq!(store.kinematics().operator, origin);
    }

    #[test]
    fn test_location_with_fix() {
        let mut store = Store::new();
        store.set_origin(LatLon::new(10.0, 20.0));
        store.set_speed(10);
        store.set_altitude(50.0);
        store.kinematics_mut().heading = 45;

        let loc = store.location_data(0.1, -0.1, &wall_time());
        assert_eq!(loc.status, OperationalStatus::Undeclared);
        assert_eq!(loc.direction, 45.0);
        assert_abs_diff_eq!(loc.speed_horizontal as f64, 10.0 * 1.1 * MPH_TO_MPS, epsilon = 1e-4);
        assert_abs_diff_eq!(loc.height as f64, 90.0, epsilon = 1e-4);
        assert_eq!(loc.altitude_geo, 150.0);
        assert_eq!(loc.speed_vertical, INV_SPEED_V);
        assert_abs_diff_eq!(loc.timestamp as f64, 12.0 * 60.0 + 34.56, epsilon = 1e-3);
    }

    #[test]
    fn test_location_without_fix() {
        let mut store = Store::new();
        store.set_satellites(6);
        let loc = store.location_data(0.0, 0.0, &wall_time());
        assert_eq!(loc.status, OperationalStatus::RemoteIdSystemFailure);
        assert_eq!(loc.direction, INV_DIR);
    }

    #[test]
    fn test_operator_latched_once() {
        let mut store = Store::new();
        store.set_operator_position(LatLon::new(1.0, 2.0));
        store.set_operator_altitude(15.0);
        assert!(store.latch_operator(&wall_time()));

        store.set_operator_position(LatLon::new(3.0, 4.0));
        assert!(!store.latch_operator(&wall_time()));
        assert_eq!(store.derived().system.operator_latitude, 1.0);
        assert_eq!(store.derived().system.operator_altitude_geo, 15.0);
    }

    #[test]
    fn test_operator_not_latched_without_base() {
        let mut store = Store::new();
        store.set_base_valid(false);
        assert!(!store.latch_operator(&wall_time()));
        store.set_base_valid(true);
        assert!(store.latch_operator(&wall_time()));
    }
}
