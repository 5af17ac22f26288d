//! Query result shapes.

use crate::entity::Entity;
use quarry_proto::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One result row: a cached entity, or a detached projection row when the
/// query carried a selection.
#[derive(Debug, Clone)]
pub enum QueryRecord {
    /// A full, cache-registered entity.
    Entity(Arc<Entity>),
    /// A projected row keyed by the selected paths. Never registered in
    /// the cache.
    Projection(BTreeMap<String, Value>),
}

impl QueryRecord {
    /// The entity, when this record is one.
    pub fn entity(&self) -> Option<&Arc<Entity>> {
        match self {
            QueryRecord::Entity(e) => Some(e),
            QueryRecord::Projection(_) => None,
        }
    }

    /// The projection row, when this record is one.
    pub fn projection(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            QueryRecord::Projection(row) => Some(row),
            QueryRecord::Entity(_) => None,
        }
    }
}

/// The outcome of executing a query.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    /// Result rows, in result order.
    pub records: Vec<QueryRecord>,
    /// Every entity a remote round trip touched, expansion children
    /// included; a superset of the entities in `records`. Empty for
    /// cache-only and projection results.
    pub retrieved: Vec<Arc<Entity>>,
    /// Total match count ignoring paging, when the query asked for it.
    pub inline_count: Option<u64>,
    /// Whether the result was produced from the local cache without a
    /// remote round trip.
    pub from_cache: bool,
}

impl QueryOutcome {
    /// The entity records, skipping projections.
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.records
            .iter()
            .filter_map(|r| r.entity().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The outcome of a fetch-by-key.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The entity, or `None` when nothing matches the key. A cached
    /// deletion reports `None` with `from_cache` set: the pending delete
    /// shadows whatever the remote store still holds.
    pub entity: Option<Arc<Entity>>,
    /// Whether the answer came from the cache without a remote round trip.
    pub from_cache: bool,
}
