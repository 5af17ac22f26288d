//! Entity keys.

use crate::error::Error;
use crate::metadata::EntityType;
use quarry_proto::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A value-based entity identity: type name plus ordered key values.
///
/// Key values are normalized before storage (`Int32` widens to `Int64`,
/// `Float32` to `Float64`) so that equal logical keys hash equally
/// regardless of the width the backend happened to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKey {
    entity_type: String,
    values: Vec<KeyValue>,
}

/// A single normalized key component. Floats are compared and hashed by
/// bit pattern; NaN keys are rejected before construction.
#[derive(Debug, Clone, PartialEq)]
enum KeyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(i64),
    Uuid([u8; 16]),
}

impl Eq for KeyValue {}

impl Hash for KeyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            KeyValue::Bool(b) => b.hash(state),
            KeyValue::Int(i) => i.hash(state),
            KeyValue::Float(f) => f.to_bits().hash(state),
            KeyValue::String(s) => s.hash(state),
            KeyValue::Timestamp(t) => t.hash(state),
            KeyValue::Uuid(u) => u.hash(state),
        }
    }
}

impl Hash for EntityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_type.hash(state);
        self.values.hash(state);
    }
}

impl EntityKey {
    /// Build a key from explicit values, in key-property order.
    pub fn new(entity_type: impl Into<String>, values: Vec<Value>) -> Result<Self, Error> {
        let entity_type = entity_type.into();
        let mut normalized = Vec::with_capacity(values.len());
        for value in values {
            normalized.push(Self::normalize(&entity_type, value)?);
        }
        if normalized.is_empty() {
            return Err(Error::MissingKey(entity_type));
        }
        Ok(Self {
            entity_type,
            values: normalized,
        })
    }

    /// Compute the key of an entity type from a property map.
    ///
    /// Fails with [`Error::MissingKey`] when any key property is absent or
    /// null.
    pub fn from_values(
        entity_type: &EntityType,
        values: &BTreeMap<String, Value>,
    ) -> Result<Self, Error> {
        let key_props = entity_type.key_properties();
        if key_props.is_empty() {
            return Err(Error::MissingKey(entity_type.name.clone()));
        }
        let mut key_values = Vec::with_capacity(key_props.len());
        for prop in key_props {
            match values.get(&prop.name) {
                Some(v) if !v.is_null() => key_values.push(v.clone()),
                _ => return Err(Error::MissingKey(entity_type.name.clone())),
            }
        }
        Self::new(entity_type.name.clone(), key_values)
    }

    fn normalize(entity_type: &str, value: Value) -> Result<KeyValue, Error> {
        match value {
            Value::Bool(b) => Ok(KeyValue::Bool(b)),
            Value::Int32(i) => Ok(KeyValue::Int(i64::from(i))),
            Value::Int64(i) => Ok(KeyValue::Int(i)),
            Value::Float32(f) if !f.is_nan() => Ok(KeyValue::Float(f64::from(f))),
            Value::Float64(f) if !f.is_nan() => Ok(KeyValue::Float(f)),
            Value::String(s) => Ok(KeyValue::String(s)),
            Value::Timestamp(t) => Ok(KeyValue::Timestamp(t)),
            Value::Uuid(u) => Ok(KeyValue::Uuid(u)),
            _ => Err(Error::MissingKey(entity_type.to_string())),
        }
    }

    /// The entity type name this key belongs to.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// The key components, restored to protocol values.
    pub fn values(&self) -> Vec<Value> {
        self.values
            .iter()
            .map(|v| match v {
                KeyValue::Bool(b) => Value::Bool(*b),
                KeyValue::Int(i) => Value::Int64(*i),
                KeyValue::Float(f) => Value::Float64(*f),
                KeyValue::String(s) => Value::String(s.clone()),
                KeyValue::Timestamp(t) => Value::Timestamp(*t),
                KeyValue::Uuid(u) => Value::Uuid(*u),
            })
            .collect()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:(", self.entity_type)?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match v {
                KeyValue::Bool(b) => write!(f, "{b}")?,
                KeyValue::Int(i) => write!(f, "{i}")?,
                KeyValue::Float(x) => write!(f, "{x}")?,
                KeyValue::String(s) => write!(f, "'{s}'")?,
                KeyValue::Timestamp(t) => write!(f, "@{t}")?,
                KeyValue::Uuid(u) => {
                    for byte in u {
                        write!(f, "{byte:02x}")?;
                    }
                }
            }
        }
        write!(f, ")")
    }
}
