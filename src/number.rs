//! Integer and fixed-point to text conversion for the print helpers.

/// Enough room for `i64::MIN` in base 2: a sign and 64 digits.
const NUMBER_BUF_LEN: usize = 65;

const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Stack scratch space for one formatted number. Digits are written back to front.
pub struct NumberBuf {
    bytes: [u8; NUMBER_BUF_LEN],
}

impl NumberBuf {
    /// Creates an empty scratch buffer.
    pub const fn new() -> Self {
        Self {
            bytes: [0; NUMBER_BUF_LEN],
        }
    }

    fn push_digits(&mut self, mut end: usize, mut value: u64, base: u64) -> usize {
        loop {
            end -= 1;
            self.bytes[end] = DIGITS[(value % base) as usize];
            value /= base;
            if value == 0 {
                return end;
            }
        }
    }

    fn push_sign(&mut self, start: usize, negative: bool) -> usize {
        if negative {
            self.bytes[start - 1] = b'-';
            start - 1
        } else {
            start
        }
    }

    fn as_str(&self, start: usize) -> &str {
        // Only ASCII digits, '-' and '.' are ever written.
        core::str::from_utf8(&self.bytes[start..]).unwrap_or_default()
    }
}

impl Default for NumberBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats `n` in `base` using the digits `0-9A-Z`, with a leading `-` for negative values.
///
/// Bases outside `2..=36` fall back to base 10.
pub fn format_int(n: i64, base: u8, buf: &mut NumberBuf) -> &str {
    let base = if (2..=36).contains(&base) { base } else { 10 };
    let start = buf.push_digits(NUMBER_BUF_LEN, n.unsigned_abs(), u64::from(base));
    let start = buf.push_sign(start, n < 0);
    buf.as_str(start)
}

/// Formats `n` as a value scaled by 100, with exactly two decimal digits.
///
/// `12345` renders as `123.45`, `-5` as `-0.05`. The caller does the scaling; this keeps
/// floating point formatting out of the firmware image.
pub fn format_fixed(n: i64, buf: &mut NumberBuf) -> &str {
    let magnitude = n.unsigned_abs();
    let hundredths = (magnitude % 100) as u8;
    buf.bytes[NUMBER_BUF_LEN - 1] = b'0' + hundredths % 10;
    buf.bytes[NUMBER_BUF_LEN - 2] = b'0' + hundredths / 10;
    buf.bytes[NUMBER_BUF_LEN - 3] = b'.';
    let start = buf.push_digits(NUMBER_BUF_LEN - 3, magnitude / 100, 10);
    let start = buf.push_sign(start, n < 0);
    buf.as_str(start)
}

/// Base 10 integer or fixed-point, selected by `is_float`.
pub fn format_num(n: i64, is_float: bool, buf: &mut NumberBuf) -> &str {
    if is_float {
        format_fixed(n, buf)
    } else {
        format_int(n, 10, buf)
    }
}

/// Scales `value` by 100 for [`format_fixed`], truncating toward zero.
///
/// Values outside the `i64` range saturate and NaN maps to zero.
#[inline]
pub fn scale_float(value: f64) -> i64 {
    (value * 100.0) as i64
}

#[cfg(test)]
mod test {
    use super::*;

    fn int(n: i64, base: u8) -> std::string::String {
        format_int(n, base, &mut NumberBuf::new()).into()
    }

    fn fixed(n: i64) -> std::string::String {
        format_fixed(n, &mut NumberBuf::new()).into()
    }

    #[test]
    fn decimal() {
        assert_eq!(int(0, 10), "0");
        assert_eq!(int(7, 10), "7");
        assert_eq!(int(-42, 10), "-42");
        assert_eq!(int(1_000_000, 10), "1000000");
        assert_eq!(int(i64::MAX, 10), "9223372036854775807");
        assert_eq!(int(i64::MIN, 10), "-9223372036854775808");
    }

    #[test]
    fn other_bases() {
        assert_eq!(int(255, 16), "FF");
        assert_eq!(int(-255, 16), "-FF");
        assert_eq!(int(5, 2), "101");
        assert_eq!(int(8, 8), "10");
        assert_eq!(int(35, 36), "Z");
        assert_eq!(int(i64::MAX, 36), "1Y2P0IJ32E8E7");
    }

    #[test]
    fn widest_output_fits() {
        let s = int(i64::MIN, 2);
        assert_eq!(s.len(), NUMBER_BUF_LEN);
        assert!(s.starts_with("-1"));
        assert!(s[2..].bytes().all(|b| b == b'0'));
    }

    #[test]
    fn invalid_base_falls_back_to_decimal() {
        assert_eq!(int(255, 0), "255");
        assert_eq!(int(255, 1), "255");
        assert_eq!(int(255, 37), "255");
    }

    #[test]
    fn fixed_point() {
        assert_eq!(fixed(12345), "123.45");
        assert_eq!(fixed(100), "1.00");
        assert_eq!(fixed(5), "0.05");
        assert_eq!(fixed(0), "0.00");
        assert_eq!(fixed(-5), "-0.05");
        assert_eq!(fixed(-12345), "-123.45");
        assert_eq!(fixed(i64::MIN), "-92233720368547758.08");
    }

    #[test]
    fn num_dispatch() {
        let mut buf = NumberBuf::new();
        assert_eq!(format_num(12345, true, &mut buf), "123.45");
        assert_eq!(format_num(12345, false, &mut buf), "12345");
    }

    #[test]
    fn large_floats_keep_hundredths() {
        assert_eq!(scale_float(10_000_000.25), 1_000_000_025);
        assert_eq!(scale_float(-10_000_000.25), -1_000_000_025);
        let mut buf = NumberBuf::new();
        assert_eq!(format_fixed(scale_float(10_000_000.25), &mut buf), "10000000.25");
    }

    #[test]
    fn float_scaling_truncates() {
        assert_eq!(scale_float(1.5), 150);
        assert_eq!(scale_float(-2.257), -225);
        assert_eq!(scale_float(f64::NAN), 0);
        assert_eq!(scale_float(f64::INFINITY), i64::MAX);
        assert_eq!(scale_float(f64::NEG_INFINITY), i64::MIN);
    }
}
