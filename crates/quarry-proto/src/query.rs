//! The immutable query descriptor.
//!
//! An `EntityQuery` describes a fetch against a named resource: an optional
//! predicate, ordering, paging, projection, expansion paths, and an
//! inline-count flag. Builder methods consume the descriptor and return a
//! new one, so chained calls never share mutable state. The descriptor shape
//! is the contract any remote executor translates into its own protocol.

use crate::predicate::Predicate;
use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// A single ordering key: a dotted property path plus a direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Property path to order by (may traverse to-one navigations).
    pub path: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order spec.
    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: OrderDirection::Desc,
        }
    }

    /// Parse a fragment like `"companyName"` or `"city desc"`.
    pub fn parse(fragment: &str) -> Option<Self> {
        let mut parts = fragment.split_whitespace();
        let path = parts.next()?;
        let direction = match parts.next() {
            Some(d) if d.eq_ignore_ascii_case("desc") => OrderDirection::Desc,
            _ => OrderDirection::Asc,
        };
        Some(Self {
            path: path.to_string(),
            direction,
        })
    }
}

/// An immutable query descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityQuery {
    /// Resource name the query targets (e.g. `"Customers"`).
    pub resource: String,
    /// Optional filter predicate.
    pub predicate: Option<Predicate>,
    /// Ordering keys, applied in sequence.
    pub order_by: Vec<OrderSpec>,
    /// Number of leading results to skip.
    pub skip: Option<u64>,
    /// Maximum number of results to return. `Some(0)` is valid and returns
    /// zero rows while `inline_count` still reports the full match count.
    pub take: Option<u64>,
    /// Projected property paths; empty means full entities.
    pub select: Vec<String>,
    /// Navigation property paths to eagerly include (dot-notation nesting).
    pub expand: Vec<String>,
    /// Whether the total match count (ignoring paging) is requested.
    pub inline_count: bool,
}

impl EntityQuery {
    /// Create a query against a resource.
    pub fn from(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            predicate: None,
            order_by: Vec::new(),
            skip: None,
            take: None,
            select: Vec::new(),
            expand: Vec::new(),
            inline_count: false,
        }
    }

    /// Replace the filter predicate. `None` clears it.
    pub fn where_clause(mut self, predicate: impl Into<Option<Predicate>>) -> Self {
        self.predicate = predicate.into();
        self
    }

    /// Replace the ordering with a comma-separated list of
    /// `path [desc]` fragments (e.g. `"category.categoryName desc, productName"`).
    /// `None` clears the ordering.
    pub fn order_by<'a>(mut self, paths: impl Into<Option<&'a str>>) -> Self {
        self.order_by = match paths.into() {
            Some(list) => list.split(',').filter_map(OrderSpec::parse).collect(),
            None => Vec::new(),
        };
        self
    }

    /// Replace the ordering with explicit specs.
    pub fn order_by_specs(mut self, specs: Vec<OrderSpec>) -> Self {
        self.order_by = specs;
        self
    }

    /// Replace the projection with a comma-separated property list.
    /// `None` clears it (full entities are returned).
    pub fn select<'a>(mut self, paths: impl Into<Option<&'a str>>) -> Self {
        self.select = match paths.into() {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => Vec::new(),
        };
        self
    }

    /// Replace the expansion paths with a comma-separated list.
    /// `None` clears it.
    pub fn expand<'a>(mut self, paths: impl Into<Option<&'a str>>) -> Self {
        self.expand = match paths.into() {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => Vec::new(),
        };
        self
    }

    /// Replace the expansion paths with an explicit list.
    pub fn expand_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set or clear the skip count.
    pub fn skip(mut self, n: impl Into<Option<u64>>) -> Self {
        self.skip = n.into();
        self
    }

    /// Set or clear the take count.
    pub fn take(mut self, n: impl Into<Option<u64>>) -> Self {
        self.take = n.into();
        self
    }

    /// Request (or drop) the inline total match count.
    pub fn inline_count(mut self, enabled: bool) -> Self {
        self.inline_count = enabled;
        self
    }
}
