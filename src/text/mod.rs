//! UTF-8 text core: validation, scalar indexing, codepoint coding, and
//! transcoding to UTF-16 / UTF-32.
//!
//! Validation is strict: overlong encodings, surrogate code points, and
//! scalars beyond U+10FFFF are rejected exactly where the Unicode tables
//! say. The byte-level scan short-circuits through a SIMD "all ASCII"
//! check and only decodes when a chunk carries a high bit.
//!
//! Scalar counting never validates; callers validate first (the counter is
//! well-defined on any byte string).

mod simd;
mod transcode;

pub use transcode::{utf8_to_utf16, utf8_to_utf32, utf16_to_utf8};

use simd::{chunk_is_ascii, CHUNK};

/// Number of bytes in the sequence introduced by `lead`, or `None` when
/// `lead` can never start a sequence (continuation bytes, 0xC0/0xC1,
/// 0xF5..).
#[inline]
pub fn sequence_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

/// Decode one scalar at the start of `bytes`, enforcing the exact
/// continuation windows (overlongs and surrogates rejected).
///
/// Returns the scalar value and the number of bytes consumed.
pub fn decode_scalar(bytes: &[u8]) -> Option<(u32, usize)> {
    let lead = *bytes.first()?;
    match lead {
        0x00..=0x7F => Some((lead as u32, 1)),
        0xC2..=0xDF => {
            let b1 = cont(bytes, 1, 0x80, 0xBF)?;
            Some((((lead as u32 & 0x1F) << 6) | b1, 2))
        }
        0xE0 => {
            // 0xE0 with a low continuation would be an overlong 2-byte form.
            let b1 = cont(bytes, 1, 0xA0, 0xBF)?;
            let b2 = cont(bytes, 2, 0x80, 0xBF)?;
            Some((((lead as u32 & 0x0F) << 12) | (b1 << 6) | b2, 3))
        }
        0xE1..=0xEC | 0xEE..=0xEF => {
            let b1 = cont(bytes, 1, 0x80, 0xBF)?;
            let b2 = cont(bytes, 2, 0x80, 0xBF)?;
            Some((((lead as u32 & 0x0F) << 12) | (b1 << 6) | b2, 3))
        }
        0xED => {
            // 0xED A0..BF would encode a surrogate.
            let b1 = cont(bytes, 1, 0x80, 0x9F)?;
            let b2 = cont(bytes, 2, 0x80, 0xBF)?;
            Some((((lead as u32 & 0x0F) << 12) | (b1 << 6) | b2, 3))
        }
        0xF0 => {
            // 0xF0 80..8F would be an overlong 3-byte form.
            let b1 = cont(bytes, 1, 0x90, 0xBF)?;
            let b2 = cont(bytes, 2, 0x80, 0xBF)?;
            let b3 = cont(bytes, 3, 0x80, 0xBF)?;
            Some((((lead as u32 & 0x07) << 18) | (b1 << 12) | (b2 << 6) | b3, 4))
        }
        0xF1..=0xF3 => {
            let b1 = cont(bytes, 1, 0x80, 0xBF)?;
            let b2 = cont(bytes, 2, 0x80, 0xBF)?;
            let b3 = cont(bytes, 3, 0x80, 0xBF)?;
            Some((((lead as u32 & 0x07) << 18) | (b1 << 12) | (b2 << 6) | b3, 4))
        }
        0xF4 => {
            // Anything past 0xF4 8F BF BF exceeds U+10FFFF.
            let b1 = cont(bytes, 1, 0x80, 0x8F)?;
            let b2 = cont(bytes, 2, 0x80, 0xBF)?;
            let b3 = cont(bytes, 3, 0x80, 0xBF)?;
            Some((((lead as u32 & 0x07) << 18) | (b1 << 12) | (b2 << 6) | b3, 4))
        }
        _ => None,
    }
}

#[inline]
fn cont(bytes: &[u8], idx: usize, lo: u8, hi: u8) -> Option<u32> {
    let b = *bytes.get(idx)?;
    if b < lo || b > hi {
        return None;
    }
    Some((b & 0x3F) as u32)
}

/// Whether `bytes` is well-formed UTF-8.
pub fn validate(bytes: &[u8]) -> bool {
    let mut i = 0;
    let len = bytes.len();
    while i < len {
        if i + CHUNK <= len {
            let chunk: &[u8; CHUNK] = bytes[i..i + CHUNK].try_into().unwrap();
            if chunk_is_ascii(chunk) {
                i += CHUNK;
                continue;
            }
        }
        if bytes[i] < 0x80 {
            i += 1;
            continue;
        }
        match decode_scalar(&bytes[i..]) {
            Some((_, n)) => i += n,
            None => return false,
        }
    }
    true
}

/// Decode the first scalar of `bytes` as a `char`.
#[inline]
pub fn decode(bytes: &[u8]) -> Option<(char, usize)> {
    let (cp, n) = decode_scalar(bytes)?;
    // The decoder already excludes surrogates and values past U+10FFFF.
    Some((char::from_u32(cp)?, n))
}

/// Encode a scalar value. Rejects surrogates and values past U+10FFFF.
/// Returns the encoded length.
pub fn encode_scalar(cp: u32, out: &mut [u8; 4]) -> Option<usize> {
    if (0xD800..=0xDFFF).contains(&cp) || cp > 0x10_FFFF {
        return None;
    }
    Some(encode_raw(cp, out))
}

/// Encode a `char` (total: `char` cannot hold a rejected scalar).
#[inline]
pub fn encode(c: char, out: &mut [u8; 4]) -> usize {
    encode_raw(c as u32, out)
}

fn encode_raw(cp: u32, out: &mut [u8; 4]) -> usize {
    if cp < 0x80 {
        out[0] = cp as u8;
        1
    } else if cp < 0x800 {
        out[0] = 0xC0 | (cp >> 6) as u8;
        out[1] = 0x80 | (cp & 0x3F) as u8;
        2
    } else if cp < 0x10000 {
        out[0] = 0xE0 | (cp >> 12) as u8;
        out[1] = 0x80 | ((cp >> 6) & 0x3F) as u8;
        out[2] = 0x80 | (cp & 0x3F) as u8;
        3
    } else {
        out[0] = 0xF0 | (cp >> 18) as u8;
        out[1] = 0x80 | ((cp >> 12) & 0x3F) as u8;
        out[2] = 0x80 | ((cp >> 6) & 0x3F) as u8;
        out[3] = 0x80 | (cp & 0x3F) as u8;
        4
    }
}

/// Number of Unicode scalars in `bytes`: counts every byte that is not a
/// continuation byte. Does not validate; run [`validate`] first when the
/// input is untrusted.
#[inline]
pub fn char_count(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| (b & 0xC0) != 0x80).count()
}

/// Whether `idx` falls on a scalar boundary (the first byte of a sequence,
/// or one past the end).
#[inline]
pub fn is_boundary(bytes: &[u8], idx: usize) -> bool {
    if idx == bytes.len() {
        return true;
    }
    match bytes.get(idx) {
        Some(&b) => (b & 0xC0) != 0x80,
        None => false,
    }
}

/// Byte offset of the `n`-th scalar (0-based), or `None` past the end.
/// O(n) walk from the start.
pub fn byte_index_of_char(bytes: &[u8], n: usize) -> Option<usize> {
    let mut remaining = n;
    let mut i = 0;
    while i < bytes.len() {
        if remaining == 0 {
            return Some(i);
        }
        i += sequence_len(bytes[i])?;
        remaining -= 1;
    }
    None
}

/// Slice `s` on byte indices. Out-of-range or non-boundary indices are
/// fatal: a sliced string must never stop being well-formed.
pub fn substr(s: &str, lo: usize, hi: usize) -> &str {
    let bytes = s.as_bytes();
    crate::rt_assert!(
        lo <= hi && hi <= bytes.len(),
        "substring bounds {lo}..{hi} out of range for length {}",
        bytes.len()
    );
    crate::rt_assert!(
        is_boundary(bytes, lo) && is_boundary(bytes, hi),
        "substring bounds {lo}..{hi} split a UTF-8 sequence"
    );
    // Both bounds are verified scalar boundaries.
    unsafe { core::str::from_utf8_unchecked(&bytes[lo..hi]) }
}
