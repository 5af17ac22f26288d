//! Raw result payload returned by a remote executor.
//!
//! The executor hands back row-oriented entity data plus any expansions the
//! query requested; the merge engine (in `quarry-core`) turns these into
//! cached entities. Values are passed through exactly as the backend
//! produced them — in particular, a projected date column may arrive as
//! `Value::Timestamp` on one backend and `Value::String` on another.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entity row from a remote result, with any eagerly-included relations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawEntity {
    /// Entity type name, when the backend reports it; otherwise the merge
    /// engine uses the query's target type.
    pub entity_type: Option<String>,
    /// Property name → value.
    pub values: BTreeMap<String, Value>,
    /// Navigation property name → expanded related rows.
    pub expansions: BTreeMap<String, RawExpansion>,
}

/// Expanded related rows under a navigation property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawExpansion {
    /// A to-one navigation; `None` when the related row is absent.
    One(Option<Box<RawEntity>>),
    /// A to-many navigation.
    Many(Vec<RawEntity>),
}

impl RawEntity {
    /// Create a row with the given property values.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self {
            entity_type: None,
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            expansions: BTreeMap::new(),
        }
    }

    /// Set the entity type name.
    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Attach a to-many expansion.
    pub fn with_many(mut self, property: impl Into<String>, rows: Vec<RawEntity>) -> Self {
        self.expansions.insert(property.into(), RawExpansion::Many(rows));
        self
    }

    /// Attach a to-one expansion.
    pub fn with_one(mut self, property: impl Into<String>, row: Option<RawEntity>) -> Self {
        self.expansions
            .insert(property.into(), RawExpansion::One(row.map(Box::new)));
        self
    }

    /// Get a property value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// Complete payload of a remote query execution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteQueryResult {
    /// Top-level result rows, in server order.
    pub rows: Vec<RawEntity>,
    /// Total match count ignoring paging, present only when the query
    /// requested an inline count.
    pub inline_count: Option<u64>,
}

impl RemoteQueryResult {
    /// Create a result with rows and no inline count.
    pub fn new(rows: Vec<RawEntity>) -> Self {
        Self {
            rows,
            inline_count: None,
        }
    }

    /// Attach an inline count.
    pub fn with_inline_count(mut self, count: u64) -> Self {
        self.inline_count = Some(count);
        self
    }
}
