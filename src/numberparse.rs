//! Stage-2 number decoding.
//!
//! Integers that fit 64 bits stay integers: signed when the magnitude fits
//! 63 bits (or is negative), unsigned for the `[2^63, 2^64)` band. Anything
//! with a fraction or exponent, and any integer literal past 64 bits,
//! becomes a correctly rounded `f64`: an exact-arithmetic fast path covers
//! small significands and exponents, everything else goes through the
//! standard library's correctly rounded decimal conversion.

use crate::charutils::is_not_structural_or_whitespace;
use crate::error::{Error, ErrorType, Result};
use crate::safer_unchecked::GetSaferUnchecked;

/// Exact binary64 values of 10^0 ..= 10^22.
static POWER_OF_TEN: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    I64(i64),
    U64(u64),
    F64(f64),
}

#[cfg_attr(not(feature = "no-inline"), inline)]
fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

/// Parse the number whose first byte (`-` or a digit) sits at `idx` of the
/// padded buffer. The space padding terminates a number at the document
/// tail, so no copy is ever needed.
#[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
pub(crate) fn parse_number(input: &[u8], idx: usize, negative: bool) -> Result<Number> {
    let start = idx;
    let mut p = idx + usize::from(negative);

    let byte = |at: usize| unsafe { *input.get_kinda_unchecked(at) };

    // integer part
    let mut i: u64;
    let mut overflowed = false;
    if byte(p) == b'0' {
        p += 1;
        if is_digit(byte(p)) {
            // 0 cannot be followed by another digit
            return Err(Error::new_c(p, byte(p) as char, ErrorType::NumberError));
        }
        i = 0;
    } else {
        if !is_digit(byte(p)) {
            // a bare minus, or something stage 1 mistook for a scalar
            return Err(Error::new_c(p, byte(p) as char, ErrorType::NumberError));
        }
        i = u64::from(byte(p) - b'0');
        p += 1;
        while is_digit(byte(p)) {
            let digit = u64::from(byte(p) - b'0');
            match i.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                Some(v) => i = v,
                None => overflowed = true,
            }
            p += 1;
        }
    }

    // fraction
    let mut exponent: i64 = 0;
    let mut is_float = false;
    if byte(p) == b'.' {
        is_float = true;
        p += 1;
        if !is_digit(byte(p)) {
            return Err(Error::new_c(p, byte(p) as char, ErrorType::NumberError));
        }
        while is_digit(byte(p)) {
            let digit = u64::from(byte(p) - b'0');
            match i.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                Some(v) => i = v,
                None => overflowed = true,
            }
            exponent -= 1;
            p += 1;
        }
    }

    // exponent
    if byte(p) == b'e' || byte(p) == b'E' {
        is_float = true;
        p += 1;
        let exp_negative = match byte(p) {
            b'-' => {
                p += 1;
                true
            }
            b'+' => {
                p += 1;
                false
            }
            _ => false,
        };
        if !is_digit(byte(p)) {
            return Err(Error::new_c(p, byte(p) as char, ErrorType::NumberError));
        }
        let mut exp_number: i64 = 0;
        while is_digit(byte(p)) {
            let digit = i64::from(byte(p) - b'0');
            exp_number = exp_number.saturating_mul(10).saturating_add(digit);
            p += 1;
        }
        exponent += if exp_negative { -exp_number } else { exp_number };
    }

    // a number ends at a structural character or whitespace, nothing else
    if is_not_structural_or_whitespace(byte(p)) == 1 {
        return Err(Error::new_c(p, byte(p) as char, ErrorType::NumberError));
    }

    if !is_float && !overflowed {
        if negative {
            if i > (1u64 << 63) {
                // too negative for i64, fall through to the double path
                return slow_float(input, start, p);
            }
            return Ok(Number::I64((i as i64).wrapping_neg()));
        }
        if i < (1u64 << 63) {
            return Ok(Number::I64(i as i64));
        }
        return Ok(Number::U64(i));
    }

    // fast path: the significand and the power of ten are both exactly
    // representable, so one multiply or divide rounds correctly
    if !overflowed && i < (1u64 << 53) && (-22..=22).contains(&exponent) {
        let mut f = i as f64;
        if exponent < 0 {
            f /= POWER_OF_TEN[(-exponent) as usize];
        } else {
            f *= POWER_OF_TEN[exponent as usize];
        }
        return Ok(Number::F64(if negative { -f } else { f }));
    }

    slow_float(input, start, p)
}

/// Correctly rounded slow path over the validated literal text.
#[cold]
fn slow_float(input: &[u8], start: usize, end: usize) -> Result<Number> {
    let literal = unsafe { input.get_kinda_unchecked(start..end) };
    // the grammar walk above only admits ASCII digits, sign, dot and
    // exponent markers
    let text = unsafe { std::str::from_utf8_unchecked(literal) };
    let value: f64 = text
        .parse()
        .map_err(|_| Error::new_c(start, text.chars().next().unwrap_or('\u{0}'), ErrorType::NumberError))?;
    if !value.is_finite() {
        // magnitude beyond binary64 range
        return Err(Error::new_c(
            start,
            '\u{0}',
            ErrorType::NumberError,
        ));
    }
    Ok(Number::F64(value))
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(s: &str) -> Result<Number> {
        // pad the way the parser's input buffer is padded
        let mut buf = s.as_bytes().to_vec();
        buf.resize(s.len() + 64, b' ');
        parse_number(&buf, 0, s.starts_with('-'))
    }

    #[test]
    fn integers() {
        assert_eq!(parse("0").unwrap(), Number::I64(0));
        assert_eq!(parse("1").unwrap(), Number::I64(1));
        assert_eq!(parse("-1").unwrap(), Number::I64(-1));
        assert_eq!(
            parse("9223372036854775807").unwrap(),
            Number::I64(i64::MAX)
        );
        assert_eq!(
            parse("-9223372036854775808").unwrap(),
            Number::I64(i64::MIN)
        );
        assert_eq!(
            parse("9223372036854775808").unwrap(),
            Number::U64(1 << 63)
        );
        assert_eq!(
            parse("18446744073709551615").unwrap(),
            Number::U64(u64::MAX)
        );
    }

    #[test]
    fn integers_past_64_bits_become_doubles() {
        assert_eq!(
            parse("18446744073709551616").unwrap(),
            Number::F64(18_446_744_073_709_551_616.0)
        );
        assert_eq!(
            parse("-9223372036854775809").unwrap(),
            Number::F64(-9_223_372_036_854_775_809.0)
        );
    }

    #[test]
    fn doubles() {
        assert_eq!(parse("1.1").unwrap(), Number::F64(1.1));
        assert_eq!(parse("-0.5").unwrap(), Number::F64(-0.5));
        assert_eq!(parse("1e10").unwrap(), Number::F64(1e10));
        assert_eq!(parse("1E+2").unwrap(), Number::F64(100.0));
        assert_eq!(parse("1e-2").unwrap(), Number::F64(0.01));
        assert_eq!(parse("0.0").unwrap(), Number::F64(0.0));
        assert_eq!(parse("1e308").unwrap(), Number::F64(1e308));
        // shortest-decimal torture value, must round to nearest even
        assert_eq!(
            parse("2.2250738585072011e-308").unwrap(),
            Number::F64(2.2250738585072011e-308)
        );
    }

    #[test]
    fn rejects() {
        assert!(parse("01").is_err());
        assert!(parse("-").is_err());
        assert!(parse("1.").is_err());
        assert!(parse("1e").is_err());
        assert!(parse("1e+").is_err());
        assert!(parse("1.e1").is_err());
        assert!(parse("1e309").is_err());
        assert!(parse("-1e309").is_err());
        assert!(parse("1a").is_err());
    }

    #[test]
    fn underflow_is_zero() {
        assert_eq!(parse("1e-400").unwrap(), Number::F64(0.0));
    }
}
