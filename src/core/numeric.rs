//! Numeric string scanning and float formatting
//!
//! ## PHP Semantics
//!
//! PHP accepts decimal integers and floats inside strings with optional
//! leading whitespace and an optional sign. Whether a string is numeric
//! decides how `==`, `<` and the arithmetic operators treat it:
//! - `"42"` is an integer string, `"4.2"` and `"1e3"` are float strings
//! - `" 42abc"` is leading-numeric: the prefix `" 42"` parses, the rest is ignored
//! - `"abc"` is non-numeric
//! - Integer text outside the i64 range becomes a float and remembers the
//!   overflow direction so string comparison can stay exact
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_operators.c` - _is_numeric_string_ex
//! - Zend: `$PHP_SRC_PATH/main/snprintf.c` - php_gcvt

use crate::core::value::Val;

/// A parsed number, either integer or float
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn to_val(self) -> Val {
        match self {
            Number::Int(i) => Val::Int(i),
            Number::Float(f) => Val::Float(f),
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Number::Float(_))
    }
}

/// Result of scanning a numeric prefix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericPrefix {
    pub number: Number,
    /// Bytes consumed, including leading whitespace
    pub len: usize,
    /// +1 / -1 when integer text overflowed i64, 0 otherwise
    pub overflow: i8,
}

#[inline]
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Scan the longest numeric prefix of `s`.
///
/// Returns `None` when no digits were found.
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - _is_numeric_string_ex (allow_errors = true)
pub fn scan_number_prefix(s: &[u8]) -> Option<NumericPrefix> {
    let mut pos = 0;
    while pos < s.len() && is_space(s[pos]) {
        pos += 1;
    }
    let start = pos;

    if pos < s.len() && (s[pos] == b'+' || s[pos] == b'-') {
        pos += 1;
    }

    let int_start = pos;
    while pos < s.len() && s[pos].is_ascii_digit() {
        pos += 1;
    }
    let int_digits = pos - int_start;

    let mut is_float = false;
    let mut frac_digits = 0;
    if pos < s.len() && s[pos] == b'.' {
        let mut p = pos + 1;
        while p < s.len() && s[p].is_ascii_digit() {
            p += 1;
        }
        frac_digits = p - pos - 1;
        if int_digits > 0 || frac_digits > 0 {
            is_float = true;
            pos = p;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows it
    if pos < s.len() && (s[pos] == b'e' || s[pos] == b'E') {
        let mut p = pos + 1;
        if p < s.len() && (s[p] == b'+' || s[p] == b'-') {
            p += 1;
        }
        let exp_start = p;
        while p < s.len() && s[p].is_ascii_digit() {
            p += 1;
        }
        if p > exp_start {
            is_float = true;
            pos = p;
        }
    }

    let text = std::str::from_utf8(&s[start..pos]).ok()?;

    if !is_float {
        if let Ok(i) = text.parse::<i64>() {
            return Some(NumericPrefix {
                number: Number::Int(i),
                len: pos,
                overflow: 0,
            });
        }
        let f = text.parse::<f64>().ok()?;
        return Some(NumericPrefix {
            number: Number::Float(f),
            len: pos,
            overflow: if f < 0.0 { -1 } else { 1 },
        });
    }

    let f = text.parse::<f64>().ok()?;
    Some(NumericPrefix {
        number: Number::Float(f),
        len: pos,
        overflow: 0,
    })
}

/// Parse `s` as a whole numeric string; trailing whitespace is allowed.
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - is_numeric_string_ex
pub fn parse_numeric_str(s: &[u8]) -> Option<NumericPrefix> {
    let prefix = scan_number_prefix(s)?;
    if s[prefix.len..].iter().all(|&b| is_space(b)) {
        Some(prefix)
    } else {
        None
    }
}

pub fn is_numeric_str(s: &[u8]) -> bool {
    parse_numeric_str(s).is_some()
}

/// Truncate a float to i64, wrapping out-of-range values modulo 2^64.
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.h - zend_dval_to_lval
pub fn double_to_long(d: f64) -> i64 {
    if !d.is_finite() {
        return 0;
    }
    if d >= -9.223_372_036_854_775_808e18 && d < 9.223_372_036_854_775_808e18 {
        return d as i64;
    }
    let two_pow_64 = 18_446_744_073_709_551_616.0_f64;
    let mut dmod = d.trunc() % two_pow_64;
    if dmod < 0.0 {
        dmod += two_pow_64;
    }
    dmod as u64 as i64
}

/// Saturating float to i64, used for leading-numeric strings.
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.h - zend_dval_to_lval_cap
pub fn double_to_long_cap(d: f64) -> i64 {
    if d.is_nan() {
        return 0;
    }
    // `as` saturates at the i64 bounds
    d as i64
}

/// Format a float the way `echo` does: `precision` significant digits, %G style.
/// Reference: $PHP_SRC_PATH/main/snprintf.c - php_gcvt
pub fn format_float(f: f64, precision: usize) -> String {
    if f.is_nan() {
        return "NAN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.clamp(1, 40);
    let sci = format!("{:.*e}", precision - 1, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    let mut out = String::new();
    if negative {
        out.push('-');
    }

    if exp < -4 || exp >= precision as i32 {
        out.push_str(&digits[..1]);
        out.push('.');
        if digits.len() > 1 {
            out.push_str(&digits[1..]);
        } else {
            out.push('0');
        }
        out.push('E');
        out.push(if exp < 0 { '-' } else { '+' });
        out.push_str(&exp.abs().to_string());
    } else if exp < 0 {
        out.push_str("0.");
        for _ in 0..(-exp - 1) {
            out.push('0');
        }
        out.push_str(digits);
    } else {
        let int_len = exp as usize + 1;
        if digits.len() <= int_len {
            out.push_str(digits);
            for _ in digits.len()..int_len {
                out.push('0');
            }
        } else {
            out.push_str(&digits[..int_len]);
            out.push('.');
            out.push_str(&digits[int_len..]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_with_leading_space() {
        let p = scan_number_prefix(b" 42abc").unwrap();
        assert_eq!(p.number, Number::Int(42));
        assert_eq!(p.len, 3);
        assert_eq!(p.overflow, 0);
    }

    #[test]
    fn test_exponent_makes_float() {
        let p = parse_numeric_str(b"1e3").unwrap();
        assert_eq!(p.number, Number::Float(1000.0));
        assert_eq!(p.len, 3);
    }

    #[test]
    fn test_no_digits() {
        assert!(scan_number_prefix(b"abc").is_none());
        assert!(scan_number_prefix(b"").is_none());
        assert!(scan_number_prefix(b"   ").is_none());
        assert!(scan_number_prefix(b".").is_none());
        assert!(scan_number_prefix(b"-").is_none());
    }

    #[test]
    fn test_dangling_exponent_is_not_consumed() {
        let p = scan_number_prefix(b"1e").unwrap();
        assert_eq!(p.number, Number::Int(1));
        assert_eq!(p.len, 1);
    }

    #[test]
    fn test_fraction_forms() {
        assert_eq!(scan_number_prefix(b".5").unwrap().number, Number::Float(0.5));
        assert_eq!(scan_number_prefix(b"5.").unwrap().number, Number::Float(5.0));
        assert_eq!(scan_number_prefix(b"-1.5e-1").unwrap().number, Number::Float(-0.15));
    }

    #[test]
    fn test_integer_overflow_direction() {
        let p = scan_number_prefix(b"9223372036854775808").unwrap();
        assert!(p.number.is_float());
        assert_eq!(p.overflow, 1);

        let n = scan_number_prefix(b"-9223372036854775809").unwrap();
        assert_eq!(n.overflow, -1);
    }

    #[test]
    fn test_trailing_whitespace_is_numeric() {
        assert!(is_numeric_str(b" 12 "));
        assert!(!is_numeric_str(b"12abc"));
        assert!(!is_numeric_str(b""));
    }

    #[test]
    fn test_double_to_long() {
        assert_eq!(double_to_long(3.9), 3);
        assert_eq!(double_to_long(-3.9), -3);
        assert_eq!(double_to_long(f64::NAN), 0);
        assert_eq!(double_to_long(f64::INFINITY), 0);
        assert_eq!(double_to_long(18_446_744_073_709_551_616.0 + 4096.0), 4096);
        assert_eq!(double_to_long_cap(1e30), i64::MAX);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.1, 14), "0.1");
        assert_eq!(format_float(1.0, 14), "1");
        assert_eq!(format_float(3.5, 14), "3.5");
        assert_eq!(format_float(-2.25, 14), "-2.25");
        assert_eq!(format_float(1e25, 14), "1.0E+25");
        assert_eq!(format_float(1.5e-7, 14), "1.5E-7");
        assert_eq!(format_float(0.0001, 14), "0.0001");
        assert_eq!(format_float(100000.0, 14), "100000");
        assert_eq!(format_float(1.0 / 3.0, 14), "0.33333333333333");
        assert_eq!(format_float(9.223372036854775807e18, 14), "9.2233720368548E+18");
        assert_eq!(format_float(f64::INFINITY, 14), "INF");
        assert_eq!(format_float(f64::NEG_INFINITY, 14), "-INF");
        assert_eq!(format_float(f64::NAN, 14), "NAN");
    }
}
