//! Fixed-point decimal values
//!
//! A decimal is an `i128` mantissa with a base-10 scale, the same layout a
//! `DECIMAL(p, s)` column uses. Equality is numeric: `1.50` equals `1.5`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Largest scale a decimal may carry.
pub const MAX_SCALE: u32 = 28;

/// Decimal construction and conversion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalError {
    #[error("invalid decimal literal: '{0}'")]
    Invalid(String),

    #[error("decimal overflow")]
    Overflow,

    #[error("decimal scale {0} exceeds maximum of {max}", max = MAX_SCALE)]
    ScaleTooLarge(u32),

    #[error("non-finite float cannot be represented as a decimal")]
    NonFinite,
}

/// A fixed-point decimal number.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl Decimal {
    /// Create a decimal from a raw mantissa and scale.
    pub fn new(mantissa: i128, scale: u32) -> Result<Self, DecimalError> {
        if scale > MAX_SCALE {
            return Err(DecimalError::ScaleTooLarge(scale));
        }
        Ok(Self { mantissa, scale })
    }

    /// Create a scale-0 decimal from an integer.
    pub fn from_i64(value: i64) -> Self {
        Self {
            mantissa: i128::from(value),
            scale: 0,
        }
    }

    /// Convert a float into a decimal of the given scale.
    ///
    /// The float's shortest round-trip representation is used, so `0.1`
    /// becomes exactly `0.1` rather than its binary expansion.
    pub fn from_f64(value: f64, scale: u32) -> Result<Self, DecimalError> {
        if !value.is_finite() {
            return Err(DecimalError::NonFinite);
        }
        parse_literal(&value.to_string(), Some(scale))
    }

    /// Parse a literal and round it to the given scale.
    pub fn parse_with_scale(literal: &str, scale: u32) -> Result<Self, DecimalError> {
        parse_literal(literal, Some(scale))
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Re-express this decimal at another scale.
    ///
    /// Widening is exact; narrowing rounds half away from zero.
    pub fn rescale(&self, scale: u32) -> Result<Self, DecimalError> {
        if scale > MAX_SCALE {
            return Err(DecimalError::ScaleTooLarge(scale));
        }
        if scale == self.scale {
            return Ok(*self);
        }
        if scale > self.scale {
            let factor = pow10(scale - self.scale)?;
            let mantissa = self
                .mantissa
                .checked_mul(factor)
                .ok_or(DecimalError::Overflow)?;
            return Ok(Self { mantissa, scale });
        }

        let factor = pow10(self.scale - scale)?;
        let mut quotient = self.mantissa / factor;
        let remainder = self.mantissa % factor;
        if remainder.unsigned_abs() * 2 >= factor.unsigned_abs() {
            quotient += self.mantissa.signum();
        }
        Ok(Self {
            mantissa: quotient,
            scale,
        })
    }

    /// Lossy conversion to a float.
    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let scale = self.scale.max(other.scale);
        match (self.rescale(scale), other.rescale(scale)) {
            (Ok(a), Ok(b)) => a.mantissa == b.mantissa,
            _ => false,
        }
    }
}

impl Eq for Decimal {}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_literal(s, None)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let magnitude = self.mantissa.unsigned_abs();
        if self.scale == 0 {
            return write!(f, "{}{}", sign, magnitude);
        }
        let divisor = 10u128.pow(self.scale);
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            magnitude / divisor,
            magnitude % divisor,
            width = self.scale as usize
        )
    }
}

fn pow10(exponent: u32) -> Result<i128, DecimalError> {
    10i128.checked_pow(exponent).ok_or(DecimalError::Overflow)
}

/// Parse `[+-]digits[.digits]`, optionally rounding to a target scale.
fn parse_literal(literal: &str, target_scale: Option<u32>) -> Result<Decimal, DecimalError> {
    let trimmed = literal.trim();
    let invalid = || DecimalError::Invalid(literal.to_string());

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (integer_part, fraction_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    if integer_part.is_empty() && fraction_part.is_empty() {
        return Err(invalid());
    }
    if !integer_part.bytes().all(|b| b.is_ascii_digit())
        || !fraction_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let scale = target_scale.unwrap_or_else(|| (fraction_part.len() as u32).min(MAX_SCALE));
    if scale > MAX_SCALE {
        return Err(DecimalError::ScaleTooLarge(scale));
    }

    let (kept, dropped) = if fraction_part.len() > scale as usize {
        fraction_part.split_at(scale as usize)
    } else {
        (fraction_part, "")
    };

    let mut mantissa: i128 = 0;
    for digit in integer_part.bytes().chain(kept.bytes()) {
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(i128::from(digit - b'0')))
            .ok_or(DecimalError::Overflow)?;
    }
    for _ in kept.len()..scale as usize {
        mantissa = mantissa.checked_mul(10).ok_or(DecimalError::Overflow)?;
    }
    if dropped.as_bytes().first().is_some_and(|d| *d >= b'5') {
        mantissa = mantissa.checked_add(1).ok_or(DecimalError::Overflow)?;
    }
    if negative {
        mantissa = -mantissa;
    }

    Ok(Decimal { mantissa, scale })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_natural_scale() {
        let d: Decimal = "200.75".parse().unwrap();
        assert_eq!(d.mantissa(), 20075);
        assert_eq!(d.scale(), 2);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Decimal>().is_err());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("1e5".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_numeric_equality_ignores_scale() {
        let a: Decimal = "1.50".parse().unwrap();
        let b: Decimal = "1.5".parse().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, "1.51".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_rescale_rounds_half_away_from_zero() {
        let d: Decimal = "2.345".parse().unwrap();
        assert_eq!(d.rescale(2).unwrap().mantissa(), 235);

        let n: Decimal = "-2.345".parse().unwrap();
        assert_eq!(n.rescale(2).unwrap().mantissa(), -235);

        let down: Decimal = "2.344".parse().unwrap();
        assert_eq!(down.rescale(2).unwrap().mantissa(), 234);
    }

    #[test]
    fn test_from_f64_uses_shortest_representation() {
        let d = Decimal::from_f64(0.1, 2).unwrap();
        assert_eq!(d.mantissa(), 10);
        assert_eq!(d.scale(), 2);

        let noisy = Decimal::from_f64(0.1 + 0.2, 2).unwrap();
        assert_eq!(noisy, "0.3".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_from_f64_rejects_nan() {
        assert_eq!(Decimal::from_f64(f64::NAN, 2), Err(DecimalError::NonFinite));
    }

    #[test]
    fn test_display_negative_fraction() {
        let d: Decimal = "-0.05".parse().unwrap();
        assert_eq!(d.to_string(), "-0.05");
        assert_eq!(Decimal::from_i64(-12).to_string(), "-12");
    }

    #[test]
    fn test_scale_limit() {
        assert_eq!(
            Decimal::new(1, MAX_SCALE + 1),
            Err(DecimalError::ScaleTooLarge(MAX_SCALE + 1))
        );
    }
}
