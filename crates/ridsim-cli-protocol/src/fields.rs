//! Attribute list parsing.
//!
//! Command values are `|`-delimited attribute lists. Every token can be read
//! as a string, a float or an integer. Numeric reads are permissive: an empty
//! token reads as 0, and malformed text yields its longest numeric prefix
//! (`"12abc"` reads as 12) or 0 when there is none. Parsing never fails.

/// Attribute delimiter.
pub const ATTR_DELIMITER: char = '|';

/// A single attribute token borrowed from a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr<'a>(&'a str);

impl<'a> Attr<'a> {
    /// Wrap a raw token.
    pub fn new(token: &'a str) -> Self {
        Attr(token)
    }

    /// The token text.
    pub fn as_str(&self) -> &'a str {
        self.0
    }

    /// Read the token as a float.
    pub fn as_f64(&self) -> f64 {
        let text = self.0.trim();
        let candidate_len = text
            .char_indices()
            .find(|&(_, c)| !matches!(c, '0'..='9' | '+' | '-' | '.' | 'e' | 'E'))
            .map_or(text.len(), |(i, _)| i);

        // Shrink until the prefix parses, so "1.5e" reads as 1.5.
        (1..=candidate_len)
            .rev()
            .find_map(|len| text[..len].parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    /// Read the token as an integer. A fractional part is ignored.
    pub fn as_i64(&self) -> i64 {
        let text = self.0.trim();
        let bytes = text.as_bytes();
        let mut end = 0;
        if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
            end = 1;
        }
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        text[..end].parse::<i64>().unwrap_or(0)
    }

    /// Read the token as an integer clamped into `u8`.
    pub fn as_u8(&self) -> u8 {
        self.as_i64().clamp(0, u8::MAX as i64) as u8
    }

    /// Read the token as an integer clamped into `i16`.
    pub fn as_i16(&self) -> i16 {
        self.as_i64().clamp(i16::MIN as i64, i16::MAX as i64) as i16
    }

    /// Read the token as an integer clamped into `u16`.
    pub fn as_u16(&self) -> u16 {
        self.as_i64().clamp(0, u16::MAX as i64) as u16
    }

    /// Read the token as an integer clamped into `u32`.
    pub fn as_u32(&self) -> u32 {
        self.as_i64().clamp(0, u32::MAX as i64) as u32
    }
}

/// Split a command value into its attribute tokens.
///
/// The value is the remainder of the line after the tag. A single leading
/// delimiter is skipped, empty tokens are preserved, and an empty value has no
/// attributes at all.
pub fn parse_attrs(value: &str) -> Vec<Attr<'_>> {
    let value = value.trim();
    let value = value.strip_prefix(ATTR_DELIMITER).unwrap_or(value);
    if value.is_empty() {
        return Vec::new();
    }
    value.split(ATTR_DELIMITER).map(Attr::new).collect()
}
