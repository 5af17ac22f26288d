//! Scalar data types exposed by the catalog.

use quarry_proto::Value;
use serde::{Deserialize, Serialize};

/// Semantic type of a data property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID.
    Uuid,
}

impl DataType {
    /// Check whether a runtime value is acceptable for this type.
    ///
    /// `Null` is acceptable for any type; nullability is enforced at the
    /// property level.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (DataType::Bool, Value::Bool(_)) => true,
            (DataType::Int32, Value::Int32(_)) => true,
            (DataType::Int64, Value::Int64(_) | Value::Int32(_)) => true,
            (DataType::Float32, Value::Float32(_)) => true,
            (DataType::Float64, Value::Float64(_) | Value::Float32(_)) => true,
            (DataType::String, Value::String(_)) => true,
            (DataType::Timestamp, Value::Timestamp(_)) => true,
            (DataType::Uuid, Value::Uuid(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_with_widening() {
        assert!(DataType::Int64.accepts(&Value::Int32(1)));
        assert!(DataType::Float64.accepts(&Value::Float32(1.0)));
        assert!(DataType::String.accepts(&Value::Null));
        assert!(!DataType::Bool.accepts(&Value::Int32(1)));
    }
}
