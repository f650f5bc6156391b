//! Identity helpers: operator id checksums, MAC randomization and the
//! manufacturer serial profiles used when spawning pest identities.

use rand::Rng;

use crate::store::ParamText;

/// Base of the Luhn mod-N checksum used by EU operator ids.
const LUHN_BASE: u32 = 36;

/// Length of an EU operator id including its check character.
pub const OPERATOR_ID_LEN: usize = 16;

/// Length of the private operator id secret.
pub const OPERATOR_SECRET_LEN: usize = 3;

fn luhn36_value(c: u8) -> u32 {
    match c {
        b'0'..=b'9' => (c - b'0') as u32,
        b'a'..=b'z' => 10 + (c - b'a') as u32,
        b'A'..=b'Z' => 10 + (c - b'A') as u32,
        _ => 0,
    }
}

fn luhn36_char(v: u32) -> char {
    match v {
        0..=9 => (b'0' + v as u8) as char,
        10..=35 => (b'a' + (v - 10) as u8) as char,
        _ => '0',
    }
}

/// Compute the base-36 Luhn check character of `text`.
///
/// Weights alternate 2, 1, 2, ... starting from the rightmost character; each
/// weighted value contributes `v / 36 + v % 36`. Letters are case-insensitive
/// and any other character counts as 0.
pub fn luhn36_check(text: &str) -> char {
    let mut sum = 0;
    let mut factor = 2;
    for &c in text.as_bytes().iter().rev() {
        let add = luhn36_value(c) * factor;
        sum += add / LUHN_BASE + add % LUHN_BASE;
        factor = if factor == 2 { 1 } else { 2 };
    }
    luhn36_char((LUHN_BASE - sum % LUHN_BASE) % LUHN_BASE)
}

/// Validate an EU operator id against its private secret.
///
/// The id must be 16 characters and the secret 3. The checksum covers the 12
/// characters after the country code followed by the secret, and must match
/// the final character of the id.
pub fn check_operator_id(id: &str, secret: &str) -> bool {
    if id.len() != OPERATOR_ID_LEN || secret.len() != OPERATOR_SECRET_LEN {
        return false;
    }
    if !id.is_ascii() || !secret.is_ascii() {
        return false;
    }

    let mut check = String::with_capacity(15);
    check.push_str(&id[3..15]);
    check.push_str(secret);

    id.as_bytes()[15] as char == luhn36_check(&check)
}

/// Generate a random unicast MAC address.
pub fn random_mac<R: Rng + ?Sized>(rng: &mut R) -> [u8; 6] {
    let mut mac: [u8; 6] = rng.gen();
    mac[0] &= 0xfe;
    mac
}

// ============================================================================
// Pest Profiles
// ============================================================================

/// A manufacturer serial number range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialProfile {
    pub name: &'static str,
    pub min: &'static str,
    pub max: &'static str,
}

/// Published serial ranges of common Remote ID equipment.
pub const SERIAL_PROFILES: &[SerialProfile] = &[
    SerialProfile { name: "uAvionix pingRID", min: "1792C000000000000", max: "1792C000000FFFFFF" },
    SerialProfile { name: "Drone Tag", min: "1596F350000000000000", max: "1596F35FFFFFFFFFFFFF" },
    SerialProfile { name: "Camflite Aurora", min: "1871C000000007000", max: "1871C000000008999" },
    SerialProfile { name: "DJI Mini 3 Pro", min: "1581F4XF000000000000", max: "1581F4XFFFFFFFFFFFFF" },
    SerialProfile { name: "DJI Mavic 3", min: "1581F45T000000000000", max: "1581F45TFFFFFFFFFFFF" },
    SerialProfile { name: "DJI Mavic 3 Cine", min: "1581F4QZ000000000000", max: "1581F4QZFFFFFFFFFFFF" },
    SerialProfile { name: "UAS RC", min: "1774FREM101000000001", max: "1774FREM101000075000" },
    SerialProfile { name: "WISPR Ranger Elite", min: "1889ERE000008012300", max: "1889ERE000012313099" },
];

/// Self-id descriptions picked for spawned identities.
pub const DESCRIPTIONS: &[&str] = &[
    "Recreational",
    "Commercial",
    "Industrial",
    "Military",
    "Remote Sensing",
    "n/a",
];

impl SerialProfile {
    /// Generate a serial inside this profile's range.
    ///
    /// The prefix shared by `min` and `max` is kept and the remaining
    /// characters are random digits; the result is clamped into `[min, max]`.
    pub fn random_serial<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamText {
        let shared = self
            .min
            .bytes()
            .zip(self.max.bytes())
            .take_while(|(a, b)| a == b)
            .count();

        let mut serial = ParamText::new();
        for (i, c) in self.min.chars().enumerate() {
            let c = if i < shared { c } else { char::from(b'0' + rng.gen_range(0..10u8)) };
            if serial.push(c).is_err() {
                break;
            }
        }

        if serial.as_str() < self.min {
            clamp_to(&mut serial, self.min);
        } else if serial.as_str() > self.max {
            clamp_to(&mut serial, self.max);
        }
        serial
    }
}

fn clamp_to(serial: &mut ParamText, bound: &str) {
    serial.clear();
    for c in bound.chars() {
        if serial.push(c).is_err() {
            break;
        }
    }
}

/// Pick a random serial profile.
pub fn random_profile<R: Rng + ?Sized>(rng: &mut R) -> &'static SerialProfile {
    &SERIAL_PROFILES[rng.gen_range(0..SERIAL_PROFILES.len())]
}

/// Pick a random self-id description.
pub fn random_description<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    DESCRIPTIONS[rng.gen_range(0..DESCRIPTIONS.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    // (id, secret) pairs with valid check characters.
    const VALID: &[(&str, &str)] = &[
        ("FIN87astrdge12k8", "xyz"),
        ("SWEfy8nu40ugzecx", "uyz"),
        ("DEUup9e9xo04a2jl", "1hu"),
        ("NLDorps8n628vdg8", "rjq"),
    ];

    #[test]
    fn test_luhn36_known_value() {
        assert_eq!(luhn36_check("87astrdge12kxyz"), '8');
    }

    #[test]
    fn test_luhn36_case_insensitive() {
        assert_eq!(luhn36_check("87ASTRDGE12KXYZ"), luhn36_check("87astrdge12kxyz"));
    }

    #[test]
    fn test_check_operator_id_valid_vectors() {
        for (id, secret) in VALID {
            assert!(check_operator_id(id, secret), "{} / {}", id, secret);
        }
    }

    #[test]
    fn test_check_operator_id_single_flip_fails() {
        for (id, secret) in VALID {
            for pos in 3..15 {
                let mut bytes = id.as_bytes().to_vec();
                bytes[pos] = if bytes[pos] == b'0' { b'1' } else { b'0' };
                let flipped = String::from_utf8(bytes).unwrap();
                assert!(!check_operator_id(&flipped, secret), "{} pos {}", flipped, pos);
            }
        }
    }

    #[test]
    fn test_check_operator_id_wrong_secret() {
        assert!(!check_operator_id("FIN87astrdge12k8", "xya"));
    }

    #[test]
    fn test_check_operator_id_lengths() {
        assert!(!check_operator_id("FIN87astrdge12k", "xyz"));
        assert!(!check_operator_id("FIN87astrdge12k8", "xy"));
        assert!(!check_operator_id("", ""));
    }

    #[test]
    fn test_random_mac_is_unicast() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..256 {
            assert_eq!(random_mac(&mut rng)[0] & 0x01, 0);
        }
    }

    #[test]
    fn test_random_serial_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for profile in SERIAL_PROFILES {
            for _ in 0..20 {
                let serial = profile.random_serial(&mut rng);
                assert!(serial.as_str() >= profile.min, "{} < {}", serial, profile.min);
                assert!(serial.as_str() <= profile.max, "{} > {}", serial, profile.max);
                assert_eq!(serial.len(), profile.min.len());
            }
        }
    }

    #[test]
    fn test_random_description_from_list() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            assert!(DESCRIPTIONS.contains(&random_description(&mut rng)));
        }
    }
}
