//! Order-preserving scalar codecs for key construction.
//!
//! Every encoder here guarantees that byte-lexicographic order of the output
//! equals the natural order of the input values, so encoded values can be
//! range-scanned without decoding.

use crate::error::{Result, TesseraError};

const SIGN_BIT: u64 = 1 << 63;

/// Maximum raw UTF-8 length of a string value admitted into a key.
pub const STRING_MAX_LENGTH: usize = 255;

/// Escape byte inserted after an embedded NUL in an encoded string.
const STRING_ESCAPE: u8 = 0xFF;
/// Two-byte terminator closing an encoded string.
const STRING_TERMINATOR: [u8; 2] = [0x00, 0x00];

/// Encodes a boolean as a single byte.
pub fn encode_boolean(v: bool) -> [u8; 1] {
    [u8::from(v)]
}

/// Decodes a boolean byte, rejecting anything but 0 or 1.
pub fn decode_boolean(src: u8) -> Result<bool> {
    match src {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(TesseraError::Encoding(format!(
            "invalid boolean byte {other:#04x}"
        ))),
    }
}

/// Big-endian i64 with the sign bit flipped so negatives sort first.
pub fn encode_long(v: i64) -> [u8; 8] {
    ((v as u64) ^ SIGN_BIT).to_be_bytes()
}

/// Inverse of [`encode_long`].
pub fn decode_long(src: [u8; 8]) -> i64 {
    (u64::from_be_bytes(src) ^ SIGN_BIT) as i64
}

/// IEEE-754 bit reordering: negatives are fully complemented, positives get
/// the sign bit flipped, so byte order matches numeric order across zero.
/// NaN has no place in a totally ordered key space and is rejected.
pub fn encode_double(v: f64) -> Result<[u8; 8]> {
    if v.is_nan() {
        return Err(TesseraError::Encoding("NaN is not encodable".to_string()));
    }
    let bits = v.to_bits();
    let reordered = if bits & SIGN_BIT != 0 { !bits } else { bits ^ SIGN_BIT };
    Ok(reordered.to_be_bytes())
}

/// Inverse of [`encode_double`].
pub fn decode_double(src: [u8; 8]) -> f64 {
    let bits = u64::from_be_bytes(src);
    let restored = if bits & SIGN_BIT != 0 { bits ^ SIGN_BIT } else { !bits };
    f64::from_bits(restored)
}

/// Datetimes are epoch-millisecond i64s and share the long encoding.
pub fn encode_datetime(millis: i64) -> [u8; 8] {
    encode_long(millis)
}

/// Inverse of [`encode_datetime`].
pub fn decode_datetime(src: [u8; 8]) -> i64 {
    decode_long(src)
}

/// Null-safe, order-preserving string encoding.
///
/// Embedded `0x00` bytes are escaped as `0x00 0xFF` and the value is closed
/// with a `0x00 0x00` terminator, so no encoded string sorts as a prefix of
/// another against the terminator. Input longer than [`STRING_MAX_LENGTH`]
/// raw bytes fails at construction time.
pub fn encode_string(s: &str) -> Result<Vec<u8>> {
    if s.len() > STRING_MAX_LENGTH {
        return Err(TesseraError::Encoding(format!(
            "string of {} bytes exceeds the {STRING_MAX_LENGTH}-byte key limit",
            s.len()
        )));
    }
    let mut out = Vec::with_capacity(s.len() + 2);
    for &b in s.as_bytes() {
        out.push(b);
        if b == 0x00 {
            out.push(STRING_ESCAPE);
        }
    }
    out.extend_from_slice(&STRING_TERMINATOR);
    Ok(out)
}

/// Decodes an escaped string, returning it with the number of bytes consumed.
pub fn decode_string(src: &[u8]) -> Result<(String, usize)> {
    let mut raw = Vec::new();
    let mut i = 0;
    loop {
        let Some(&b) = src.get(i) else {
            return Err(TesseraError::Encoding(
                "unterminated string encoding".to_string(),
            ));
        };
        if b != 0x00 {
            raw.push(b);
            i += 1;
            continue;
        }
        match src.get(i + 1) {
            Some(&STRING_ESCAPE) => {
                raw.push(0x00);
                i += 2;
            }
            Some(0x00) => {
                let s = String::from_utf8(raw).map_err(|e| {
                    TesseraError::Encoding(format!("string key not UTF-8: {e}"))
                })?;
                return Ok((s, i + 2));
            }
            _ => {
                return Err(TesseraError::Encoding(
                    "dangling escape in string encoding".to_string(),
                ))
            }
        }
    }
}
