//! Transcoding between UTF-8 and UTF-16 / UTF-32.
//!
//! The byte-level entry points fail for exactly the inputs the validator
//! rejects: both run the same strict decoder. UTF-32 is a straight copy of
//! scalar values; UTF-16 emits a surrogate pair for anything at or above
//! U+10000.

use super::{decode_scalar, encode_raw};

/// Transcode well-formed UTF-8 bytes to UTF-16 code units. `None` on any
/// malformed input.
pub fn utf8_to_utf16(bytes: &[u8]) -> Option<Vec<u16>> {
    // Worst case one unit per byte (pure ASCII).
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let (cp, n) = decode_scalar(&bytes[i..])?;
        i += n;
        if cp < 0x10000 {
            out.push(cp as u16);
        } else {
            let v = cp - 0x10000;
            out.push(0xD800 | (v >> 10) as u16);
            out.push(0xDC00 | (v & 0x3FF) as u16);
        }
    }
    Some(out)
}

/// Transcode well-formed UTF-8 bytes to scalar values. `None` on any
/// malformed input.
pub fn utf8_to_utf32(bytes: &[u8]) -> Option<Vec<u32>> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let (cp, n) = decode_scalar(&bytes[i..])?;
        i += n;
        out.push(cp);
    }
    Some(out)
}

/// Transcode UTF-16 code units back to UTF-8. `None` on an unpaired
/// surrogate.
pub fn utf16_to_utf8(units: &[u16]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(units.len() * 3);
    let mut i = 0;
    while i < units.len() {
        let u = units[i];
        i += 1;
        let cp = match u {
            0xD800..=0xDBFF => {
                let low = *units.get(i)?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return None;
                }
                i += 1;
                0x10000 + (((u as u32 & 0x3FF) << 10) | (low as u32 & 0x3FF))
            }
            0xDC00..=0xDFFF => return None,
            _ => u as u32,
        };
        let mut buf = [0u8; 4];
        let n = encode_raw(cp, &mut buf);
        out.extend_from_slice(&buf[..n]);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::validate;

    #[test]
    fn test_utf16_round_trip() {
        for s in ["", "ascii", "héllo 🌍", "\u{FFFF}\u{10000}\u{10FFFF}"] {
            let units = utf8_to_utf16(s.as_bytes()).unwrap();
            let expected: Vec<u16> = s.encode_utf16().collect();
            assert_eq!(units, expected, "{s:?}");
            assert_eq!(utf16_to_utf8(&units).unwrap(), s.as_bytes());
        }
    }

    #[test]
    fn test_utf32_is_scalar_copy() {
        let s = "héllo 🌍";
        let scalars = utf8_to_utf32(s.as_bytes()).unwrap();
        let expected: Vec<u32> = s.chars().map(|c| c as u32).collect();
        assert_eq!(scalars, expected);
    }

    #[test]
    fn test_failure_parity_with_validator() {
        let bad: &[&[u8]] = &[
            &[0xC0, 0xAF],
            &[0xED, 0xA0, 0x80],
            &[0xF4, 0x90, 0x80, 0x80],
            &[0xE2, 0x82],
            &[0x80],
        ];
        for input in bad {
            assert!(!validate(input));
            assert!(utf8_to_utf16(input).is_none());
            assert!(utf8_to_utf32(input).is_none());
        }
    }

    #[test]
    fn test_unpaired_surrogates_rejected() {
        assert!(utf16_to_utf8(&[0xD800]).is_none());
        assert!(utf16_to_utf8(&[0xDC00, 0x0041]).is_none());
        assert!(utf16_to_utf8(&[0xD800, 0x0041]).is_none());
    }
}
