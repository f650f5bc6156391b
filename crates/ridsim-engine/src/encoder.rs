//! Binary record encoding.
//!
//! [`MessageEncoder`] is the seam between the scheduler and the wire format.
//! [`OdidEncoder`] packs the ASTM F3411 25-byte layouts.

use crate::error::{EncodeError, EncodeResult};
use crate::odid::{
    AuthPage, BasicIdData, LocationData, MessageKind, OperatorIdData, SelfIdData, SystemData,
    AUTH_MAX_PAGES, AUTH_PAGE_NONZERO_DATA_SIZE, AUTH_PAGE_ZERO_DATA_SIZE, ID_SIZE, INV_DIR,
    INV_SPEED_H, INV_TIMESTAMP, MESSAGE_SIZE, PROTOCOL_VERSION, STR_SIZE,
};

/// One encoded broadcast record.
pub type Record = [u8; MESSAGE_SIZE];

/// Turns structured message fields into fixed-size records.
///
/// Implementations must be pure and deterministic.
pub trait MessageEncoder {
    fn encode_basic_id(&self, data: &BasicIdData) -> EncodeResult<Record>;
    fn encode_location(&self, data: &LocationData) -> EncodeResult<Record>;
    fn encode_auth(&self, page: &AuthPage) -> EncodeResult<Record>;
    fn encode_self_id(&self, data: &SelfIdData) -> EncodeResult<Record>;
    fn encode_system(&self, data: &SystemData) -> EncodeResult<Record>;
    fn encode_operator_id(&self, data: &OperatorIdData) -> EncodeResult<Record>;
}

/// ASTM F3411 record encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct OdidEncoder;

// ============================================================================
// Field Encoding Helpers
// ============================================================================

/// Largest horizontal speed representable with the 0.75 m/s multiplier.
const MAX_SPEED_H: f32 = 254.25;
const SPEED_DIV: [f32; 2] = [0.25, 0.75];
const VSPEED_DIV: f32 = 0.5;
const ALT_DIV: f32 = 0.5;
const MAX_TIMESTAMP_TENTHS: f32 = 36_000.0;

fn header(kind: MessageKind) -> u8 {
    (kind.type_nibble() << 4) | PROTOCOL_VERSION
}

fn new_record(kind: MessageKind) -> Record {
    let mut record = [0u8; MESSAGE_SIZE];
    record[0] = header(kind);
    record
}

fn encode_latlon(value: f64) -> i32 {
    (value * 1e7).round() as i32
}

fn encode_altitude(alt: f32) -> u16 {
    ((alt + 1000.0) / ALT_DIV).round().clamp(0.0, u16::MAX as f32) as u16
}

/// Returns `(direction byte, east/west flag)`.
fn encode_direction(direction: f32) -> (u8, u8) {
    if direction < 180.0 {
        (direction as u8, 0)
    } else {
        ((direction - 180.0) as u8, 1)
    }
}

/// Returns `(speed byte, multiplier flag)`.
///
/// The unknown marker, negative and non-finite speeds encode as unknown;
/// speeds past the range cap at the largest encodable value.
fn encode_speed_horizontal(speed: f32) -> (u8, u8) {
    let low_max = u8::MAX as f32 * SPEED_DIV[0];
    if speed == INV_SPEED_H || !speed.is_finite() || speed < 0.0 {
        (u8::MAX, 1)
    } else if speed <= low_max {
        ((speed / SPEED_DIV[0]) as u8, 0)
    } else {
        let capped = speed.min(MAX_SPEED_H);
        (((capped - low_max) / SPEED_DIV[1]) as u8, 1)
    }
}

fn encode_speed_vertical(speed: f32) -> i8 {
    (speed / VSPEED_DIV).round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
}

fn encode_timestamp(seconds_since_hour: f32) -> u16 {
    if seconds_since_hour == INV_TIMESTAMP {
        return u16::MAX;
    }
    (seconds_since_hour * 10.0).round().clamp(0.0, MAX_TIMESTAMP_TENTHS) as u16
}

fn copy_text(dst: &mut [u8], text: &str) {
    for (d, s) in dst.iter_mut().zip(text.bytes()) {
        *d = s;
    }
}

fn check_position(lat: f64, lon: f64) -> EncodeResult<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(EncodeError::InvalidLatitude(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(EncodeError::InvalidLongitude(lon));
    }
    Ok(())
}

// ============================================================================
// Record Layouts
// ============================================================================

impl MessageEncoder for OdidEncoder {
    fn encode_basic_id(&self, data: &BasicIdData) -> EncodeResult<Record> {
        let mut r = new_record(MessageKind::BasicId);
        r[1] = (data.id_type.code() << 4) | (data.ua_type.code() & 0x0f);
        copy_text(&mut r[2..2 + ID_SIZE], &data.uas_id);
        Ok(r)
    }

    fn encode_location(&self, data: &LocationData) -> EncodeResult<Record> {
        check_position(data.latitude, data.longitude)?;
        if !(0.0..=360.0).contains(&data.direction) && data.direction != INV_DIR {
            return Err(EncodeError::InvalidDirection(data.direction));
        }

        let (direction, east_west) = encode_direction(data.direction);
        let (speed, multiplier) = encode_speed_horizontal(data.speed_horizontal);

        let mut r = new_record(MessageKind::Location);
        r[1] = ((data.status as u8) << 4)
            | ((data.height_type as u8) << 2)
            | (east_west << 1)
            | multiplier;
        r[2] = direction;
        r[3] = speed;
        r[4] = encode_speed_vertical(data.speed_vertical) as u8;
        r[5..9].copy_from_slice(&encode_latlon(data.latitude).to_le_bytes());
        r[9..13].copy_from_slice(&encode_latlon(data.longitude).to_le_bytes());
        r[13..15].copy_from_slice(&encode_altitude(data.altitude_baro).to_le_bytes());
        r[15..17].copy_from_slice(&encode_altitude(data.altitude_geo).to_le_bytes());
        r[17..19].copy_from_slice(&encode_altitude(data.height).to_le_bytes());
        r[19] = (data.vert_accuracy << 4) | (data.horiz_accuracy & 0x0f);
        r[20] = (data.baro_accuracy << 4) | (data.speed_accuracy & 0x0f);
        r[21..23].copy_from_slice(&encode_timestamp(data.timestamp).to_le_bytes());
        r[23] = data.timestamp_accuracy & 0x0f;
        Ok(r)
    }

    fn encode_auth(&self, page: &AuthPage) -> EncodeResult<Record> {
        let max = (AUTH_MAX_PAGES - 1) as u8;
        if page.page_number > max {
            return Err(EncodeError::InvalidAuthPage {
                page: page.page_number,
                max,
            });
        }

        let mut r = new_record(MessageKind::Auth);
        r[1] = (page.auth_type << 4) | (page.page_number & 0x0f);
        if page.page_number == 0 {
            r[2] = page.last_page_index;
            r[3] = page.length;
            r[4..8].copy_from_slice(&page.timestamp.to_le_bytes());
            let n = page.data.len().min(AUTH_PAGE_ZERO_DATA_SIZE);
            r[8..8 + n].copy_from_slice(&page.data[..n]);
        } else {
            let n = page.data.len().min(AUTH_PAGE_NONZERO_DATA_SIZE);
            r[2..2 + n].copy_from_slice(&page.data[..n]);
        }
        Ok(r)
    }

    fn encode_self_id(&self, data: &SelfIdData) -> EncodeResult<Record> {
        let mut r = new_record(MessageKind::SelfId);
        r[1] = data.desc_type;
        copy_text(&mut r[2..2 + STR_SIZE], &data.description);
        Ok(r)
    }

    fn encode_system(&self, data: &SystemData) -> EncodeResult<Record> {
        check_position(data.operator_latitude, data.operator_longitude)?;

        let mut r = new_record(MessageKind::System);
        r[1] = ((data.classification_type as u8) << 2) | (data.operator_location_type as u8);
        r[2..6].copy_from_slice(&encode_latlon(data.operator_latitude).to_le_bytes());
        r[6..10].copy_from_slice(&encode_latlon(data.operator_longitude).to_le_bytes());
        r[10..12].copy_from_slice(&data.area_count.to_le_bytes());
        r[12] = (data.area_radius / 10).min(u8::MAX as u16) as u8;
        r[13..15].copy_from_slice(&encode_altitude(data.area_ceiling).to_le_bytes());
        r[15..17].copy_from_slice(&encode_altitude(data.area_floor).to_le_bytes());
        r[17] = (data.category_eu << 4) | (data.class_eu & 0x0f);
        r[18..20].copy_from_slice(&encode_altitude(data.operator_altitude_geo).to_le_bytes());
        r[20..24].copy_from_slice(&data.timestamp.to_le_bytes());
        Ok(r)
    }

    fn encode_operator_id(&self, data: &OperatorIdData) -> EncodeResult<Record> {
        let mut r = new_record(MessageKind::OperatorId);
        r[1] = data.operator_id_type;
        copy_text(&mut r[2..2 + ID_SIZE], &data.operator_id);
        Ok(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odid::{IdType, OperationalStatus, UaType, INV_ALT};

    #[test]
    fn test_headers() {
        let enc = OdidEncoder;
        assert_eq!(enc.encode_basic_id(&BasicIdData::default()).unwrap()[0], 0x02);
        assert_eq!(enc.encode_location(&LocationData::default()).unwrap()[0], 0x12);
        assert_eq!(enc.encode_auth(&AuthPage::default()).unwrap()[0], 0x22);
        assert_eq!(enc.encode_self_id(&SelfIdData::default()).unwrap()[0], 0x32);
        assert_eq!(enc.encode_system(&SystemData::default()).unwrap()[0], 0x42);
        assert_eq!(enc.encode_operator_id(&OperatorIdData::default()).unwrap()[0], 0x52);
    }

    #[test]
    fn test_basic_id_layout() {
        let mut data = BasicIdData {
            ua_type: UaType::HelicopterOrMultirotor,
            id_type: IdType::SerialNumber,
            ..Default::default()
        };
        data.uas_id.push_str("1581F4XF00000001").unwrap();

        let r = OdidEncoder.encode_basic_id(&data).unwrap();
        assert_eq!(r[1], 0x12);
        assert_eq!(&r[2..18], b"1581F4XF00000001");
        assert!(r[18..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_location_layout() {
        let data = LocationData {
            status: OperationalStatus::Airborne,
            direction: 270.0,
            speed_horizontal: 10.0,
            speed_vertical: 1.5,
            latitude: 37.5,
            longitude: -122.25,
            altitude_geo: 237.0,
            height: 100.0,
            timestamp: 1234.5,
            ..Default::default()
        };
        let r = OdidEncoder.encode_location(&data).unwrap();

        // status 2, east/west set, multiplier clear
        assert_eq!(r[1], 0x22);
        assert_eq!(r[2], 90);
        assert_eq!(r[3], 40);
        assert_eq!(r[4] as i8, 3);
        assert_eq!(i32::from_le_bytes(r[5..9].try_into().unwrap()), 375_000_000);
        assert_eq!(i32::from_le_bytes(r[9..13].try_into().unwrap()), -1_222_500_000);
        assert_eq!(u16::from_le_bytes([r[13], r[14]]), 0);
        assert_eq!(u16::from_le_bytes([r[15], r[16]]), 2474);
        assert_eq!(u16::from_le_bytes([r[17], r[18]]), 2200);
        assert_eq!(u16::from_le_bytes([r[21], r[22]]), 12345);
    }

    #[test]
    fn test_location_invalid_defaults() {
        let r = OdidEncoder.encode_location(&LocationData::default()).unwrap();
        // invalid direction 361 -> east/west bit and 181
        assert_eq!(r[1] & 0x02, 0x02);
        assert_eq!(r[2], 181);
        assert_eq!(r[3], 255);
        assert_eq!(r[4] as i8, 126);
        assert_eq!(u16::from_le_bytes([r[21], r[22]]), u16::MAX);
    }

    #[test]
    fn test_speed_multiplier() {
        assert_eq!(encode_speed_horizontal(63.75), (255, 0));
        assert_eq!(encode_speed_horizontal(64.5), (1, 1));
        assert_eq!(encode_speed_horizontal(254.25), (254, 1));
        assert_eq!(encode_speed_horizontal(300.0), (254, 1));
        assert_eq!(encode_speed_horizontal(0.0), (0, 0));
    }

    #[test]
    fn test_speed_unknown_values() {
        assert_eq!(encode_speed_horizontal(INV_SPEED_H), (255, 1));
        assert_eq!(encode_speed_horizontal(-1.0), (255, 1));
        assert_eq!(encode_speed_horizontal(f32::NAN), (255, 1));
        assert_eq!(encode_speed_horizontal(f32::INFINITY), (255, 1));
    }

    #[test]
    fn test_location_rejects_bad_position() {
        let data = LocationData {
            latitude: 91.0,
            ..Default::default()
        };
        assert_eq!(
            OdidEncoder.encode_location(&data),
            Err(EncodeError::InvalidLatitude(91.0))
        );

        let data = LocationData {
            longitude: -180.5,
            ..Default::default()
        };
        assert!(matches!(
            OdidEncoder.encode_location(&data),
            Err(EncodeError::InvalidLongitude(_))
        ));
    }

    #[test]
    fn test_location_rejects_bad_direction() {
        let data = LocationData {
            direction: 400.0,
            ..Default::default()
        };
        assert!(matches!(
            OdidEncoder.encode_location(&data),
            Err(EncodeError::InvalidDirection(_))
        ));
    }

    #[test]
    fn test_auth_page_layouts() {
        let mut first = AuthPage {
            auth_type: 0x0a,
            page_number: 0,
            last_page_index: 1,
            length: 30,
            timestamp: 0x0102_0304,
            ..Default::default()
        };
        first.data.extend_from_slice(&[0xAA; 17]).unwrap();
        let r = OdidEncoder.encode_auth(&first).unwrap();
        assert_eq!(r[1], 0xa0);
        assert_eq!(r[2], 1);
        assert_eq!(r[3], 30);
        assert_eq!(&r[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&r[8..25], &[0xAA; 17]);

        let mut second = AuthPage {
            auth_type: 0x0a,
            page_number: 1,
            ..Default::default()
        };
        second.data.extend_from_slice(&[0xBB; 13]).unwrap();
        let r = OdidEncoder.encode_auth(&second).unwrap();
        assert_eq!(r[1], 0xa1);
        assert_eq!(&r[2..15], &[0xBB; 13]);
        assert!(r[15..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_auth_page_out_of_range() {
        let page = AuthPage {
            page_number: 16,
            ..Default::default()
        };
        assert!(matches!(
            OdidEncoder.encode_auth(&page),
            Err(EncodeError::InvalidAuthPage { page: 16, max: 15 })
        ));
    }

    #[test]
    fn test_system_layout() {
        let data = SystemData {
            operator_latitude: -33.5,
            operator_longitude: 151.25,
            category_eu: 2,
            class_eu: 3,
            operator_altitude_geo: 15.0,
            timestamp: 100,
            ..Default::default()
        };
        let r = OdidEncoder.encode_system(&data).unwrap();
        assert_eq!(i32::from_le_bytes(r[2..6].try_into().unwrap()), -335_000_000);
        assert_eq!(i32::from_le_bytes(r[6..10].try_into().unwrap()), 1_512_500_000);
        assert_eq!(u16::from_le_bytes([r[10], r[11]]), 1);
        assert_eq!(u16::from_le_bytes([r[13], r[14]]), encode_altitude(INV_ALT));
        assert_eq!(r[17], 0x23);
        assert_eq!(u16::from_le_bytes([r[18], r[19]]), 2030);
        assert_eq!(u32::from_le_bytes(r[20..24].try_into().unwrap()), 100);
    }

    #[test]
    fn test_self_id_and_operator_id_text() {
        let mut self_id = SelfIdData::default();
        self_id.description.push_str("Recreational").unwrap();
        let r = OdidEncoder.encode_self_id(&self_id).unwrap();
        assert_eq!(&r[2..14], b"Recreational");

        let mut op = OperatorIdData::default();
        op.operator_id.push_str("FIN87astrdge12k8").unwrap();
        let r = OdidEncoder.encode_operator_id(&op).unwrap();
        assert_eq!(&r[2..18], b"FIN87astrdge12k8");
    }

    #[test]
    fn test_encoder_is_deterministic() {
        let data = LocationData {
            latitude: 1.0,
            longitude: 2.0,
            direction: 10.0,
            ..Default::default()
        };
        assert_eq!(
            OdidEncoder.encode_location(&data).unwrap(),
            OdidEncoder.encode_location(&data).unwrap()
        );
    }
}
