//! Typed value equality
//!
//! Both sides of a comparison are normalized to the field's declared type
//! before they are compared. Nothing is inferred from the runtime shape of
//! a value: a stored `Text` is a decimal for a decimal field and a
//! timestamp for a timestamp field.
//!
//! Null equals null and nothing else. A value that cannot be read as the
//! declared type is a `FieldTypeMismatch`, never "not equal".

use chrono::{DateTime, Utc};

use super::errors::{CompareError, CompareResult};
use crate::fields::{FieldDescriptor, SemanticType};
use crate::value::{truncate_to_micros, Decimal, Row, Value};

/// A float together with the spacing of floats at its own width
#[derive(Debug, Clone, Copy)]
struct Float {
    value: f64,
    ulp: f64,
}

/// A value read as a declared type
#[derive(Debug)]
enum Normalized<'a> {
    Integer(i64),
    Decimal(Decimal),
    Float(Float),
    Boolean(bool),
    Text(&'a str),
    Timestamp(DateTime<Utc>),
}

/// Compares field values by declared type
pub struct ValueComparator;

impl ValueComparator {
    /// Compare one classified field between two rows.
    ///
    /// A field missing from either row is null.
    pub fn field_equal(
        descriptor: &FieldDescriptor,
        incoming: &Row,
        stored: &Row,
    ) -> CompareResult<bool> {
        Self::equals(
            &descriptor.name,
            descriptor.field_type,
            incoming.value(&descriptor.name),
            stored.value(&descriptor.name),
        )
    }

    /// Compare two values as `field_type`.
    pub fn equals(
        field: &str,
        field_type: SemanticType,
        left: &Value,
        right: &Value,
    ) -> CompareResult<bool> {
        let left = normalize(field, field_type, left)?;
        let right = normalize(field, field_type, right)?;
        Ok(match (left, right) {
            (None, None) => true,
            (Some(a), Some(b)) => normalized_equal(&a, &b),
            _ => false,
        })
    }
}

fn normalized_equal(left: &Normalized<'_>, right: &Normalized<'_>) -> bool {
    match (left, right) {
        (Normalized::Integer(a), Normalized::Integer(b)) => a == b,
        (Normalized::Decimal(a), Normalized::Decimal(b)) => a == b,
        (Normalized::Float(a), Normalized::Float(b)) => floats_equal(*a, *b),
        (Normalized::Boolean(a), Normalized::Boolean(b)) => a == b,
        (Normalized::Text(a), Normalized::Text(b)) => a == b,
        (Normalized::Timestamp(a), Normalized::Timestamp(b)) => a == b,
        _ => false,
    }
}

fn normalize<'a>(
    field: &str,
    field_type: SemanticType,
    value: &'a Value,
) -> CompareResult<Option<Normalized<'a>>> {
    if value.is_null() {
        return Ok(None);
    }
    let mismatch = || CompareError::FieldTypeMismatch {
        field: field.to_string(),
        expected: field_type.type_name(),
        found: value.type_name(),
    };

    let normalized = match field_type {
        SemanticType::Integer => Normalized::Integer(as_integer(value).ok_or_else(mismatch)?),
        SemanticType::Decimal { scale } => {
            Normalized::Decimal(as_decimal(value, scale).ok_or_else(mismatch)?)
        }
        SemanticType::Float => Normalized::Float(as_float(value).ok_or_else(mismatch)?),
        SemanticType::Boolean => Normalized::Boolean(as_boolean(value).ok_or_else(mismatch)?),
        SemanticType::String => Normalized::Text(value.as_str().ok_or_else(mismatch)?),
        SemanticType::Timestamp => {
            let ts = value.as_timestamp().ok_or_else(mismatch)?;
            Normalized::Timestamp(truncate_to_micros(ts))
        }
    };
    Ok(Some(normalized))
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int32(_) | Value::Int64(_) => value.as_i64(),
        Value::Decimal(d) => {
            let whole = d.rescale(0).ok()?;
            if whole == *d {
                i64::try_from(whole.mantissa()).ok()
            } else {
                None
            }
        }
        Value::Float64(f) if f.is_finite() && f.fract() == 0.0 => {
            if *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                Some(*f as i64)
            } else {
                None
            }
        }
        Value::Text(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn as_decimal(value: &Value, scale: u32) -> Option<Decimal> {
    match value {
        Value::Decimal(d) => Some(*d),
        Value::Int32(_) | Value::Int64(_) => value.as_i64().map(Decimal::from_i64),
        Value::Float32(f) => Decimal::from_f64(f64::from(*f), scale).ok(),
        Value::Float64(f) => Decimal::from_f64(*f, scale).ok(),
        Value::Text(text) => text.parse().ok(),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<Float> {
    let (value, ulp) = match value {
        Value::Float32(f) => (f64::from(*f), ulp_f32(*f)),
        Value::Float64(f) => (*f, ulp_f64(*f)),
        Value::Int32(v) => {
            let f = f64::from(*v);
            (f, ulp_f64(f))
        }
        Value::Int64(v) => {
            let f = *v as f64;
            (f, ulp_f64(f))
        }
        Value::Decimal(d) => {
            let f = d.to_f64();
            (f, ulp_f64(f))
        }
        Value::Text(text) => {
            let f: f64 = text.trim().parse().ok()?;
            (f, ulp_f64(f))
        }
        _ => return None,
    };
    Some(Float { value, ulp })
}

fn as_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int32(_) | Value::Int64(_) => match value.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}

fn floats_equal(a: Float, b: Float) -> bool {
    if a.value.is_nan() || b.value.is_nan() {
        return a.value.is_nan() && b.value.is_nan();
    }
    if a.value.is_infinite() || b.value.is_infinite() {
        return a.value == b.value;
    }
    (a.value - b.value).abs() <= a.ulp.max(b.ulp)
}

/// Distance from `x` to the next float of larger magnitude.
fn ulp_f64(x: f64) -> f64 {
    let x = x.abs();
    if !x.is_finite() {
        return f64::NAN;
    }
    if x == f64::MAX {
        return x - f64::from_bits(x.to_bits() - 1);
    }
    f64::from_bits(x.to_bits() + 1) - x
}

fn ulp_f32(x: f32) -> f64 {
    let x = x.abs();
    if !x.is_finite() {
        return f64::NAN;
    }
    if x == f32::MAX {
        return f64::from(x - f32::from_bits(x.to_bits() - 1));
    }
    f64::from(f32::from_bits(x.to_bits() + 1) - x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn eq(ty: SemanticType, a: impl Into<Value>, b: impl Into<Value>) -> bool {
        ValueComparator::equals("f", ty, &a.into(), &b.into()).unwrap()
    }

    #[test]
    fn test_null_semantics() {
        assert!(eq(SemanticType::String, Value::Null, Value::Null));
        assert!(!eq(SemanticType::String, "a", Value::Null));
        assert!(!eq(SemanticType::Integer, Value::Null, 0i64));
    }

    #[test]
    fn test_integer_widths() {
        assert!(eq(SemanticType::Integer, 7i32, 7i64));
        assert!(!eq(SemanticType::Integer, 7i32, 8i64));
        assert!(eq(SemanticType::Integer, 7i64, 7.0f64));
    }

    #[test]
    fn test_float32_within_one_ulp() {
        assert!(eq(SemanticType::Float, 1.0000001f32, 1.0000002f32));
        assert!(!eq(SemanticType::Float, 1.0f32, 2.0f32));
        assert!(!eq(SemanticType::Float, 1.0f64, 2.0f64));
    }

    #[test]
    fn test_float32_against_stored_double() {
        let stored = f64::from(0.1f32);
        assert!(eq(SemanticType::Float, 0.1f32, stored));
        assert!(eq(SemanticType::Float, 3i32, 3.0f64));
    }

    #[test]
    fn test_float_special_values() {
        assert!(eq(SemanticType::Float, f64::NAN, f64::NAN));
        assert!(!eq(SemanticType::Float, f64::NAN, 1.0f64));
        assert!(eq(SemanticType::Float, f64::INFINITY, f64::INFINITY));
        assert!(!eq(SemanticType::Float, f64::INFINITY, f64::MAX));
        assert!(eq(SemanticType::Float, 0.0f64, -0.0f64));
    }

    #[test]
    fn test_decimal_scales() {
        let ty = SemanticType::Decimal { scale: 2 };
        let a: Decimal = "12.50".parse().unwrap();
        let b: Decimal = "12.5".parse().unwrap();
        assert!(eq(ty, a, b));
        assert!(eq(ty, a, "12.500"));
        assert!(eq(ty, a, 12.5f64));
        assert!(eq(ty, 12i64, "12.00"));
        assert!(!eq(ty, a, "12.51"));
    }

    #[test]
    fn test_decimal_float_rounds_at_declared_scale() {
        let ty = SemanticType::Decimal { scale: 2 };
        let stored: Decimal = "0.10".parse().unwrap();
        assert!(eq(ty, 0.1f32, stored));
        assert!(eq(ty, 0.104f64, stored));
        assert!(!eq(ty, 0.105f64, stored));
    }

    #[test]
    fn test_boolean_from_stored_integer() {
        assert!(eq(SemanticType::Boolean, true, 1i64));
        assert!(eq(SemanticType::Boolean, false, 0i64));
        assert!(ValueComparator::equals("b", SemanticType::Boolean, &Value::Bool(true), &Value::Int64(2))
            .is_err());
    }

    #[test]
    fn test_timestamp_microsecond_precision() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let with_nanos = base + chrono::Duration::nanoseconds(1_000_400);
        let stored = "2024-05-01 12:00:00.001000";
        assert!(eq(SemanticType::Timestamp, with_nanos, stored));
        assert!(eq(SemanticType::Timestamp, base, "2024-05-01T12:00:00Z"));
        assert!(!eq(SemanticType::Timestamp, base, stored));
    }

    #[test]
    fn test_string_is_exact() {
        assert!(eq(SemanticType::String, "abc", "abc"));
        assert!(!eq(SemanticType::String, "abc", "ABC"));
    }

    #[test]
    fn test_mismatch_is_an_error() {
        let err = ValueComparator::equals(
            "name",
            SemanticType::String,
            &Value::Int64(1),
            &Value::Text("1".into()),
        )
        .unwrap_err();
        match err {
            CompareError::FieldTypeMismatch { field, expected, found } => {
                assert_eq!(field, "name");
                assert_eq!(expected, "string");
                assert_eq!(found, "int64");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_field_equal_treats_missing_as_null() {
        let descriptor = FieldDescriptor::new(
            "note",
            crate::fields::FieldKind::Update,
            SemanticType::String,
        );
        let incoming = Row::new();
        let stored = Row::new().with("note", Value::Null);
        assert!(ValueComparator::field_equal(&descriptor, &incoming, &stored).unwrap());
    }

    #[test]
    fn test_ulp_helpers() {
        assert_eq!(ulp_f64(1.0), f64::EPSILON);
        assert_eq!(ulp_f32(1.0), f64::from(f32::EPSILON));
        assert!(ulp_f64(0.0) > 0.0);
    }
}
