//! Numeric parsing: integers in any base 2..=36 and shortest-path float
//! parsing.
//!
//! Integer overflow is a distinguished error, not a wrapped value. The
//! float parser takes a hot path — an up-to-19-digit significand scaled by
//! an exact power-of-ten from a 23-entry table — and defers anything
//! outside that envelope to the platform `strtod` (feature
//! `strtod-fallback`).

use thiserror::Error;

/// Parse failure. `Range` and `Underflow` only come out of float parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum NumError {
    #[error("empty input")]
    Empty,
    #[error("invalid digit")]
    Invalid,
    #[error("value does not fit the target type")]
    Overflow,
    #[error("magnitude too large for f64")]
    Range,
    #[error("magnitude rounds to zero")]
    Underflow,
    #[error("parse requires the strtod fallback")]
    Unsupported,
}

/// Split an optional sign off the front. `true` means negative.
fn split_sign(s: &str) -> (bool, &str) {
    match s.as_bytes().first() {
        Some(&b'-') => (true, &s[1..]),
        Some(&b'+') => (false, &s[1..]),
        _ => (false, s),
    }
}

/// Detect a base from `0x` / `0b` / leading-zero-octal prefixes.
/// Returns the base and the digits after the prefix.
fn detect_base(s: &str) -> (u32, &str) {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'0' {
        match bytes[1] {
            b'x' | b'X' => return (16, &s[2..]),
            b'b' | b'B' => return (2, &s[2..]),
            _ => {
                if bytes[1].is_ascii_digit() {
                    return (8, &s[1..]);
                }
            }
        }
    }
    (10, s)
}

/// Parse an unsigned 64-bit integer.
///
/// `base` is 2..=36, or 0 to autodetect `0x` / `0b` / leading-`0` octal.
pub fn parse_u64(s: &str, base: u32) -> Result<u64, NumError> {
    let (negative, s) = split_sign(s);
    if negative {
        return Err(NumError::Invalid);
    }
    parse_magnitude(s, base)
}

/// Parse a signed 64-bit integer. Same base handling as [`parse_u64`].
pub fn parse_i64(s: &str, base: u32) -> Result<i64, NumError> {
    let (negative, s) = split_sign(s);
    let magnitude = parse_magnitude(s, base)?;
    if negative {
        if magnitude > i64::MAX as u64 + 1 {
            return Err(NumError::Overflow);
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        if magnitude > i64::MAX as u64 {
            return Err(NumError::Overflow);
        }
        Ok(magnitude as i64)
    }
}

/// Parse an unsigned 32-bit integer.
pub fn parse_u32(s: &str, base: u32) -> Result<u32, NumError> {
    let v = parse_u64(s, base)?;
    v.try_into().map_err(|_| NumError::Overflow)
}

/// Parse a signed 32-bit integer.
pub fn parse_i32(s: &str, base: u32) -> Result<i32, NumError> {
    let v = parse_i64(s, base)?;
    v.try_into().map_err(|_| NumError::Overflow)
}

fn parse_magnitude(s: &str, base: u32) -> Result<u64, NumError> {
    crate::rt_assert!(
        base == 0 || (2..=36).contains(&base),
        "integer parse base {base} out of range"
    );
    let (base, digits) = if base == 0 {
        detect_base(s)
    } else {
        (base, s)
    };
    if digits.is_empty() {
        return Err(NumError::Empty);
    }
    let mut value: u64 = 0;
    for c in digits.chars() {
        let d = c.to_digit(base).ok_or(NumError::Invalid)?;
        value = value
            .checked_mul(base as u64)
            .and_then(|v| v.checked_add(d as u64))
            .ok_or(NumError::Overflow)?;
    }
    Ok(value)
}

/// Exact f64 powers of ten; `10^22` is the largest exactly representable.
const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Largest significand with every 64-bit product exactly representable.
const MAX_EXACT_MANTISSA: u64 = (1u64 << 53) - 1;

/// Parse an `f64`.
///
/// Hot path: decimal forms whose significand fits 19 digits (and 53 bits)
/// and whose scale is within `10^±22` — both factors are exact, so one
/// multiply or divide rounds correctly. Everything else goes to the
/// platform `strtod`, which also supplies the `Range` / `Underflow`
/// classification via `ERANGE`.
pub fn parse_f64(s: &str) -> Result<f64, NumError> {
    if s.is_empty() {
        return Err(NumError::Empty);
    }
    match parse_f64_fast(s) {
        Some(v) => Ok(v),
        None => parse_f64_strtod(s),
    }
}

/// The exact-arithmetic fast path. `None` means "out of envelope".
fn parse_f64_fast(s: &str) -> Option<f64> {
    let (negative, rest) = split_sign(s);
    let bytes = rest.as_bytes();
    if bytes.is_empty() {
        return None;
    }

    let mut mantissa: u64 = 0;
    let mut digits = 0usize;
    let mut frac_digits = 0i32;
    let mut seen_point = false;
    let mut seen_digit = false;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => {
                if digits >= 19 {
                    return None;
                }
                mantissa = mantissa * 10 + (bytes[i] - b'0') as u64;
                digits += 1;
                seen_digit = true;
                if seen_point {
                    frac_digits += 1;
                }
            }
            b'.' if !seen_point => seen_point = true,
            _ => break,
        }
        i += 1;
    }
    if !seen_digit {
        return None;
    }

    let mut exp: i32 = 0;
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let tail = &rest[i + 1..];
        let (exp_neg, exp_digits) = split_sign(tail);
        if exp_digits.is_empty() || !exp_digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let magnitude: i32 = exp_digits.parse().ok()?;
        exp = if exp_neg { -magnitude } else { magnitude };
    } else if i != bytes.len() {
        // Trailing garbage: let the strict path classify it.
        return None;
    }

    let scale = exp - frac_digits;
    if mantissa > MAX_EXACT_MANTISSA || !(-22..=22).contains(&scale) {
        return None;
    }

    let value = if scale >= 0 {
        mantissa as f64 * POW10[scale as usize]
    } else {
        mantissa as f64 / POW10[(-scale) as usize]
    };
    Some(if negative { -value } else { value })
}

cfg_if::cfg_if! {
    if #[cfg(feature = "strtod-fallback")] {
        fn parse_f64_strtod(s: &str) -> Result<f64, NumError> {
            use core::ffi::c_char;

            let c = match std::ffi::CString::new(s) {
                Ok(c) => c,
                Err(_) => return Err(NumError::Invalid),
            };
            let mut end: *mut c_char = core::ptr::null_mut();

            set_errno(0);
            let value = unsafe { libc::strtod(c.as_ptr(), &mut end) };
            let consumed = (end as usize).wrapping_sub(c.as_ptr() as usize);

            if consumed != s.len() || consumed == 0 {
                return Err(NumError::Invalid);
            }
            if errno() == libc::ERANGE {
                return if value == 0.0 {
                    Err(NumError::Underflow)
                } else {
                    Err(NumError::Range)
                };
            }
            Ok(value)
        }

        fn errno() -> i32 {
            std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
        }

        fn set_errno(value: i32) {
            #[cfg(target_os = "linux")]
            unsafe {
                *libc::__errno_location() = value;
            }
            #[cfg(any(target_os = "macos", target_os = "freebsd"))]
            unsafe {
                *libc::__error() = value;
            }
            #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "freebsd")))]
            {
                let _ = value;
            }
        }
    } else {
        fn parse_f64_strtod(_s: &str) -> Result<f64, NumError> {
            Err(NumError::Unsupported)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_bases() {
        assert_eq!(parse_u64("1101", 2), Ok(13));
        assert_eq!(parse_u64("777", 8), Ok(511));
        assert_eq!(parse_u64("deadBEEF", 16), Ok(0xDEAD_BEEF));
        assert_eq!(parse_u64("zz", 36), Ok(35 * 36 + 35));
    }

    #[test]
    fn test_int_base_autodetect() {
        assert_eq!(parse_u64("0x10", 0), Ok(16));
        assert_eq!(parse_u64("0b101", 0), Ok(5));
        assert_eq!(parse_u64("017", 0), Ok(15));
        assert_eq!(parse_u64("42", 0), Ok(42));
        assert_eq!(parse_u64("0", 0), Ok(0));
    }

    #[test]
    fn test_int_signs_and_limits() {
        assert_eq!(parse_i64("-128", 10), Ok(-128));
        assert_eq!(parse_i64("+128", 10), Ok(128));
        assert_eq!(parse_i64("9223372036854775807", 10), Ok(i64::MAX));
        assert_eq!(parse_i64("-9223372036854775808", 10), Ok(i64::MIN));
        assert_eq!(parse_i64("9223372036854775808", 10), Err(NumError::Overflow));
        assert_eq!(parse_u64("18446744073709551615", 10), Ok(u64::MAX));
        assert_eq!(parse_u64("18446744073709551616", 10), Err(NumError::Overflow));
        assert_eq!(parse_u64("-1", 10), Err(NumError::Invalid));
    }

    #[test]
    fn test_int_errors() {
        assert_eq!(parse_u64("", 10), Err(NumError::Empty));
        assert_eq!(parse_u64("12a", 10), Err(NumError::Invalid));
        assert_eq!(parse_u64("0x", 0), Err(NumError::Empty));
        assert_eq!(parse_i32("2147483648", 10), Err(NumError::Overflow));
        assert_eq!(parse_i32("-2147483648", 10), Ok(i32::MIN));
        assert_eq!(parse_u32("4294967296", 10), Err(NumError::Overflow));
    }

    #[test]
    fn test_float_fast_path() {
        assert_eq!(parse_f64("0"), Ok(0.0));
        assert_eq!(parse_f64("1.5"), Ok(1.5));
        assert_eq!(parse_f64("-3.25"), Ok(-3.25));
        assert_eq!(parse_f64("1e10"), Ok(1e10));
        assert_eq!(parse_f64("2.5e-3"), Ok(2.5e-3));
        assert_eq!(parse_f64("123456789.123456"), Ok(123456789.123456));
    }

    #[test]
    fn test_float_round_trips_against_std() {
        for s in ["0.1", "3.141592653589793", "1e22", "9007199254740991", "1e-22"] {
            let expected: f64 = s.parse().unwrap();
            assert_eq!(parse_f64(s), Ok(expected), "{s}");
        }
    }

    #[cfg(feature = "strtod-fallback")]
    #[test]
    fn test_float_fallback_envelope() {
        // 20+ significant digits and scales past 10^22 leave the fast path.
        let expected: f64 = "123456789012345678901".parse().unwrap();
        assert_eq!(parse_f64("123456789012345678901"), Ok(expected));
        let expected: f64 = "1e100".parse().unwrap();
        assert_eq!(parse_f64("1e100"), Ok(expected));
        assert_eq!(parse_f64("2.2250738585072011e-308").is_ok(), true);
    }

    #[cfg(feature = "strtod-fallback")]
    #[test]
    fn test_float_range_and_underflow() {
        assert_eq!(parse_f64("1e999"), Err(NumError::Range));
        assert_eq!(parse_f64("-1e999"), Err(NumError::Range));
        assert_eq!(parse_f64("1e-999"), Err(NumError::Underflow));
    }

    #[test]
    fn test_float_invalid() {
        assert_eq!(parse_f64(""), Err(NumError::Empty));
        assert!(parse_f64("abc").is_err());
        assert!(parse_f64("1.2.3").is_err());
    }
}
