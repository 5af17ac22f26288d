//! Value comparison semantics for local predicate evaluation and sorting.

use quarry_proto::Value;
use std::cmp::Ordering;

/// Knobs for how local evaluation compares values. Remote stores are
/// typically case-insensitive for strings, so the local default matches
/// that; a case-sensitive backend can flip it per manager.
#[derive(Debug, Clone, Copy)]
pub struct LocalComparisonOptions {
    /// Whether string equality and ordering distinguish case.
    pub case_sensitive: bool,
}

impl Default for LocalComparisonOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
        }
    }
}

impl LocalComparisonOptions {
    fn fold<'a>(&self, s: &'a str) -> std::borrow::Cow<'a, str> {
        if self.case_sensitive {
            std::borrow::Cow::Borrowed(s)
        } else {
            std::borrow::Cow::Owned(s.to_lowercase())
        }
    }
}

/// Any numeric value as `f64`, integers included. Used only when the two
/// sides are not both integers, so exact `i64` comparison stays exact.
fn as_numeric(v: &Value) -> Option<f64> {
    v.as_i64().map(|i| i as f64).or_else(|| v.as_f64())
}

/// Equality with numeric widening: integers compare as `i64`, floats as
/// `f64`, and an integer equals a float when the float is its exact value.
/// Null equals only null.
pub fn values_equal(a: &Value, b: &Value, opts: &LocalComparisonOptions) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => opts.fold(x) == opts.fold(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x == y,
        (Value::Uuid(x), Value::Uuid(y)) => x == y,
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (as_numeric(a), as_numeric(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        },
    }
}

/// Ordering with the same widening rules. Returns `None` when the values
/// are not mutually comparable or either side is null; range operators
/// treat that as no-match.
pub fn compare_values(a: &Value, b: &Value, opts: &LocalComparisonOptions) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(opts.fold(x).cmp(&opts.fold(y))),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        (Value::Uuid(x), Value::Uuid(y)) => Some(x.cmp(y)),
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => match (as_numeric(a), as_numeric(b)) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        },
    }
}

fn string_pair<'a>(a: &'a Value, b: &'a Value) -> Option<(&'a str, &'a str)> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some((x, y)),
        _ => None,
    }
}

/// `startsWith` for string operands; non-strings never match.
pub fn starts_with(a: &Value, b: &Value, opts: &LocalComparisonOptions) -> bool {
    string_pair(a, b)
        .map(|(x, y)| opts.fold(x).starts_with(opts.fold(y).as_ref()))
        .unwrap_or(false)
}

/// `endsWith` for string operands; non-strings never match.
pub fn ends_with(a: &Value, b: &Value, opts: &LocalComparisonOptions) -> bool {
    string_pair(a, b)
        .map(|(x, y)| opts.fold(x).ends_with(opts.fold(y).as_ref()))
        .unwrap_or(false)
}

/// `contains` for string operands; non-strings never match.
pub fn contains(a: &Value, b: &Value, opts: &LocalComparisonOptions) -> bool {
    string_pair(a, b)
        .map(|(x, y)| opts.fold(x).contains(opts.fold(y).as_ref()))
        .unwrap_or(false)
}
