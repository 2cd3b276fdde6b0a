//! Shared error enum, bit/byte utilities and character sets for asterix-core.

use serde::Serializer;
use thiserror::Error;

use crate::message::Message;

/// All errors produced by asterix-core.
#[derive(Debug, Error)]
pub enum AsterixError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("unsupported category {category}")]
    UnsupportedCategory { category: u8, raw: Vec<u8> },
    #[error("malformed FSPEC at offset {offset}: FX chain runs past end of buffer")]
    MalformedFspec { offset: usize, raw: Vec<u8> },
    #[error("field {field} out of range: {value}")]
    FieldRange { field: &'static str, value: f64 },
    #[error("length mismatch: declared {declared} bytes, consumed {consumed}")]
    LengthMismatch {
        declared: usize,
        consumed: usize,
        message: Box<Message>,
    },
    #[error("truncated buffer at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        available: usize,
        raw: Vec<u8>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

impl AsterixError {
    /// Raw bytes preserved with the error, if any.
    pub fn raw(&self) -> &[u8] {
        match self {
            AsterixError::UnsupportedCategory { raw, .. }
            | AsterixError::MalformedFspec { raw, .. }
            | AsterixError::TruncatedBuffer { raw, .. } => raw,
            AsterixError::LengthMismatch { message, .. } => &message.raw,
            _ => &[],
        }
    }

    /// Short stable name of the error kind, used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            AsterixError::InvalidHex(_) => "InvalidHex",
            AsterixError::UnsupportedCategory { .. } => "UnsupportedCategory",
            AsterixError::MalformedFspec { .. } => "MalformedFspec",
            AsterixError::FieldRange { .. } => "FieldRangeError",
            AsterixError::LengthMismatch { .. } => "LengthMismatch",
            AsterixError::TruncatedBuffer { .. } => "TruncatedBuffer",
            AsterixError::Io(_) => "Io",
            AsterixError::Config(_) => "Config",
        }
    }
}

pub type Result<T> = std::result::Result<T, AsterixError>;

/// Check that `len` bytes are available at `pos`.
pub(crate) fn need(buf: &[u8], pos: usize, len: usize) -> Result<()> {
    if pos.saturating_add(len) > buf.len() {
        return Err(AsterixError::TruncatedBuffer {
            offset: pos,
            needed: len,
            available: buf.len().saturating_sub(pos),
            raw: Vec::new(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Bit utilities
// ---------------------------------------------------------------------------

/// Interpret the low `width` bits of `value` as a two's-complement integer.
pub fn twos_complement(value: u64, width: u32) -> i64 {
    if width == 0 {
        return 0;
    }
    if width >= 64 {
        return value as i64;
    }
    let value = value & ((1u64 << width) - 1);
    if value & (1u64 << (width - 1)) != 0 {
        value as i64 - (1i64 << width)
    } else {
        value as i64
    }
}

/// Render the low `width` bits of `value` as a zero-padded binary string.
pub fn format_bits(value: u64, width: usize) -> String {
    let mut s = String::with_capacity(width);
    for i in (0..width).rev() {
        s.push(if i < 64 && (value >> i) & 1 == 1 { '1' } else { '0' });
    }
    s
}

/// Expand a hex string into a bit string, 4 bits per hex digit.
pub fn hex_to_bits(hex: &str) -> Result<String> {
    let hex = hex.trim();
    let mut bits = String::with_capacity(hex.len() * 4);
    for c in hex.bytes() {
        let digit = hex_digit(c).ok_or_else(|| AsterixError::InvalidHex(hex.to_string()))?;
        bits.push_str(&format_bits(digit as u64, 4));
    }
    Ok(bits)
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, must be even length.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for chunk in hex.as_bytes().chunks(2) {
        let high = hex_digit(chunk[0])?;
        let low = hex_digit(chunk[1])?;
        bytes.push((high << 4) | low);
    }
    Some(bytes)
}

/// Encode bytes as uppercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Serialize a byte buffer as an uppercase hex string.
pub fn serialize_hex<S: Serializer>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex_encode(data))
}

/// Format a 12-bit code as four octal digits (Mode 1/2/3A, extended Mode 1).
pub fn octal_code(code: u64) -> String {
    format!("{:04o}", code & 0x0FFF)
}

// ---------------------------------------------------------------------------
// Mode S character set
// ---------------------------------------------------------------------------

/// ICAO 6-bit character set used for aircraft identification.
pub const CALLSIGN_CHARSET: &[u8; 64] =
    b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ##### ###############0123456789######";

/// Decode `count` packed 6-bit characters from the start of `bytes`.
pub fn decode_callsign(bytes: &[u8], count: usize) -> String {
    let mut reader = crate::bits::BitReader::new(bytes);
    let mut callsign = String::with_capacity(count);
    for _ in 0..count {
        let idx = reader.read_u(6) as usize;
        callsign.push(CALLSIGN_CHARSET[idx] as char);
    }
    callsign
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twos_complement_roundtrip() {
        for width in [3u32, 8, 10, 11, 14, 16, 24] {
            let min = -(1i64 << (width - 1));
            let max = (1i64 << (width - 1)) - 1;
            for v in [min, min + 1, -1, 0, 1, max - 1, max] {
                let encoded = (v as u64) & ((1u64 << width) - 1);
                assert_eq!(twos_complement(encoded, width), v, "width {width} value {v}");
            }
        }
    }

    #[test]
    fn test_twos_complement_ignores_high_bits() {
        // Bits above the field width must not leak into the result
        assert_eq!(twos_complement(0xFF00 | 0x01, 8), 1);
        assert_eq!(twos_complement(0x3FF, 10), -1);
    }

    #[test]
    fn test_format_bits() {
        assert_eq!(format_bits(0b101, 3), "101");
        assert_eq!(format_bits(0x15, 8), "00010101");
        assert_eq!(format_bits(1, 1), "1");
    }

    #[test]
    fn test_hex_to_bits() {
        assert_eq!(hex_to_bits("15").unwrap(), "00010101");
        assert_eq!(hex_to_bits("a0").unwrap(), "10100000");
        assert!(matches!(hex_to_bits("1G"), Err(AsterixError::InvalidHex(_))));
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(hex_decode("150063"), Some(vec![0x15, 0x00, 0x63]));
        assert_eq!(hex_decode("odd"), None); // odd length
        assert_eq!(hex_decode("ZZZZ"), None); // invalid chars
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x30, 0x00, 0x30]), "300030");
    }

    #[test]
    fn test_octal_code() {
        assert_eq!(octal_code(0o7700), "7700");
        assert_eq!(octal_code(0o0012), "0012");
    }

    #[test]
    fn test_decode_callsign() {
        // "KLM1023 " packed as 6-bit chars
        let bytes = [0x2C, 0xC3, 0x71, 0xC3, 0x2C, 0xE0];
        assert_eq!(decode_callsign(&bytes, 8), "KLM1023 ");
    }

    #[test]
    fn test_need() {
        assert!(need(&[1, 2, 3], 1, 2).is_ok());
        match need(&[1, 2, 3], 2, 4) {
            Err(AsterixError::TruncatedBuffer {
                offset,
                needed,
                available,
                ..
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(needed, 4);
                assert_eq!(available, 1);
            }
            other => panic!("expected TruncatedBuffer, got {other:?}"),
        }
    }
}
