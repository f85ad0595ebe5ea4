//! Declared semantic types
//!
//! Supported types:
//! - integer: any integer width, compared as 64-bit
//! - decimal: fixed point with a declared scale
//! - float: binary floating point, compared with ULP tolerance
//! - boolean
//! - string: UTF-8 text, exact comparison
//! - timestamp: UTC instant, compared at microsecond precision

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::errors::{FieldError, FieldResult};
use crate::value::{parse_timestamp, Decimal, Value};

/// Declared type of a classified field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SemanticType {
    Integer,
    Decimal {
        /// Digits after the decimal point
        scale: u32,
    },
    Float,
    Boolean,
    String,
    Timestamp,
}

impl SemanticType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            SemanticType::Integer => "integer",
            SemanticType::Decimal { .. } => "decimal",
            SemanticType::Float => "float",
            SemanticType::Boolean => "boolean",
            SemanticType::String => "string",
            SemanticType::Timestamp => "timestamp",
        }
    }

    /// Convert a JSON value into a row value of this type.
    pub fn value_from_json(&self, field: &str, json: &JsonValue) -> FieldResult<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }

        let mismatch = || FieldError::InvalidJsonValue {
            field: field.to_string(),
            expected: self.type_name(),
            found: json_kind(json),
        };

        match (self, json) {
            (SemanticType::Integer, JsonValue::Number(n)) => {
                n.as_i64().map(Value::Int64).ok_or_else(mismatch)
            }
            (SemanticType::Decimal { scale }, JsonValue::Number(n)) => {
                let decimal = match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => Decimal::from_i64(i).rescale(*scale),
                    (None, Some(f)) => Decimal::from_f64(f, *scale),
                    (None, None) => return Err(mismatch()),
                };
                decimal.map(Value::Decimal).map_err(|_| mismatch())
            }
            (SemanticType::Decimal { scale }, JsonValue::String(s)) => {
                Decimal::parse_with_scale(s, *scale)
                    .map(Value::Decimal)
                    .map_err(|_| mismatch())
            }
            (SemanticType::Float, JsonValue::Number(n)) => {
                n.as_f64().map(Value::Float64).ok_or_else(mismatch)
            }
            (SemanticType::Boolean, JsonValue::Bool(b)) => Ok(Value::Bool(*b)),
            (SemanticType::String, JsonValue::String(s)) => Ok(Value::Text(s.clone())),
            (SemanticType::Timestamp, JsonValue::String(s)) => parse_timestamp(s)
                .map(Value::Timestamp)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        }
    }
}

/// Convert a JSON value for a field with no declared type.
pub(crate) fn untyped_value_from_json(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => n.as_f64().map_or(Value::Null, Value::Float64),
        },
        JsonValue::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
