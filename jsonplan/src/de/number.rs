//! Single-pass number scanning.
//!
//! [`scan`] walks the number once, accumulating the decimal mantissa into a
//! `u64` and counting the decimal exponent (fraction digits included). The
//! integer conversions work from that directly; floats use an exact fast
//! path when mantissa and exponent are small enough and only fall back to a
//! full parser otherwise.

use crate::error::Malformed;

/// Powers of ten exactly representable as `f64`.
const POW10_F64: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Powers of ten exactly representable as `f32`.
const POW10_F32: [f32; 11] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10,
];

/// A scanned number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Number {
    pub negative: bool,
    /// Leading significant digits.
    pub mantissa: u64,
    /// Decimal exponent to apply to `mantissa`.
    pub exponent: i32,
    /// Neither a fraction nor an exponent was present.
    pub integral: bool,
    /// Digits were dropped from `mantissa`.
    pub truncated: bool,
    /// Byte range of the number in the input.
    pub start: usize,
    pub end: usize,
}

/// Scans the number starting at `start`. On error, returns the reason and
/// the offset it applies to.
pub(crate) fn scan(input: &[u8], start: usize) -> Result<Number, (Malformed, usize)> {
    let mut i = start;
    let mut n = Number {
        negative: false,
        mantissa: 0,
        exponent: 0,
        integral: true,
        truncated: false,
        start,
        end: start,
    };

    if input.get(i) == Some(&b'-') {
        n.negative = true;
        i += 1;
    }

    match input.get(i) {
        Some(b'0') => {
            i += 1;
        }
        Some(b'1'..=b'9') => {
            while let Some(&d @ b'0'..=b'9') = input.get(i) {
                n.push_digit(d, false);
                i += 1;
            }
        }
        _ => return Err((Malformed::InvalidNumber, i)),
    }

    if input.get(i) == Some(&b'.') {
        n.integral = false;
        i += 1;
        let digits = i;
        while let Some(&d @ b'0'..=b'9') = input.get(i) {
            n.push_digit(d, true);
            i += 1;
        }
        if i == digits {
            return Err((Malformed::InvalidNumber, i));
        }
    }

    if let Some(b'e' | b'E') = input.get(i) {
        n.integral = false;
        i += 1;
        let mut negative_exp = false;
        match input.get(i) {
            Some(b'-') => {
                negative_exp = true;
                i += 1;
            }
            Some(b'+') => i += 1,
            _ => {}
        }
        let digits = i;
        let mut exp: i32 = 0;
        while let Some(&d @ b'0'..=b'9') = input.get(i) {
            exp = exp.saturating_mul(10).saturating_add((d - b'0') as i32);
            i += 1;
        }
        if i == digits {
            return Err((Malformed::InvalidNumber, i));
        }
        n.exponent = n
            .exponent
            .saturating_add(if negative_exp { -exp } else { exp });
    }

    n.end = i;
    Ok(n)
}

impl Number {
    #[inline]
    fn push_digit(&mut self, d: u8, fraction: bool) {
        let digit = (d - b'0') as u64;
        match self
            .mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(digit))
        {
            Some(m) => {
                self.mantissa = m;
                if fraction {
                    self.exponent -= 1;
                }
            }
            None => {
                self.truncated = true;
                if !fraction {
                    self.exponent += 1;
                }
            }
        }
    }

    /// Value as `i64`, for integer destinations.
    pub fn to_i64(self, target: &'static str) -> Result<i64, Malformed> {
        if !self.integral {
            return Err(Malformed::InvalidNumber);
        }
        let limit = i64::MAX as u64 + u64::from(self.negative);
        if self.truncated || self.mantissa > limit {
            return Err(Malformed::NumberOutOfRange { target });
        }
        Ok(if self.negative {
            (self.mantissa as i64).wrapping_neg()
        } else {
            self.mantissa as i64
        })
    }

    /// Value as `u64`, for unsigned destinations. `-0` is accepted.
    pub fn to_u64(self, target: &'static str) -> Result<u64, Malformed> {
        if !self.integral {
            return Err(Malformed::InvalidNumber);
        }
        if self.truncated || (self.negative && self.mantissa != 0) {
            return Err(Malformed::NumberOutOfRange { target });
        }
        Ok(self.mantissa)
    }

    /// Value as `f64`; `text` is the number's source bytes.
    pub fn to_f64(self, text: &[u8]) -> Result<f64, Malformed> {
        if !self.truncated && self.mantissa <= 1 << 53 && self.exponent.unsigned_abs() <= 22 {
            let m = self.mantissa as f64;
            let v = if self.exponent < 0 {
                m / POW10_F64[(-self.exponent) as usize]
            } else {
                m * POW10_F64[self.exponent as usize]
            };
            return Ok(if self.negative { -v } else { v });
        }
        finite(parse_f64(text)?, f64::is_finite, "f64")
    }

    /// Value as `f32`; `text` is the number's source bytes.
    pub fn to_f32(self, text: &[u8]) -> Result<f32, Malformed> {
        if !self.truncated && self.mantissa <= 1 << 24 && self.exponent.unsigned_abs() <= 10 {
            let m = self.mantissa as f32;
            let v = if self.exponent < 0 {
                m / POW10_F32[(-self.exponent) as usize]
            } else {
                m * POW10_F32[self.exponent as usize]
            };
            return Ok(if self.negative { -v } else { v });
        }
        finite(parse_f32(text)?, f32::is_finite, "f32")
    }
}

/// JSON has no literal for infinity, so an infinite result means overflow.
fn finite<F: Copy>(v: F, is_finite: fn(F) -> bool, target: &'static str) -> Result<F, Malformed> {
    if is_finite(v) {
        Ok(v)
    } else {
        Err(Malformed::NumberOutOfRange { target })
    }
}

#[cfg(feature = "lexical-parse")]
fn parse_f64(text: &[u8]) -> Result<f64, Malformed> {
    use lexical_parse_float::FromLexical as _;
    f64::from_lexical(text).map_err(|_| Malformed::InvalidNumber)
}

#[cfg(feature = "lexical-parse")]
fn parse_f32(text: &[u8]) -> Result<f32, Malformed> {
    use lexical_parse_float::FromLexical as _;
    f32::from_lexical(text).map_err(|_| Malformed::InvalidNumber)
}

#[cfg(not(feature = "lexical-parse"))]
fn parse_f64(text: &[u8]) -> Result<f64, Malformed> {
    core::str::from_utf8(text)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or(Malformed::InvalidNumber)
}

#[cfg(not(feature = "lexical-parse"))]
fn parse_f32(text: &[u8]) -> Result<f32, Malformed> {
    core::str::from_utf8(text)
        .ok()
        .and_then(|s| s.parse::<f32>().ok())
        .ok_or(Malformed::InvalidNumber)
}
