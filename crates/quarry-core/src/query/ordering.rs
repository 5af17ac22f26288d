//! Multi-key sorting of local query results.

use super::compare::{compare_values, LocalComparisonOptions};
use super::paths::resolve_path;
use crate::entity::Entity;
use crate::identity::IdentityMap;
use quarry_proto::{OrderDirection, OrderSpec, PathExpr};
use std::cmp::Ordering;
use std::sync::Arc;

/// Stable sort by the given ordering keys.
///
/// Nulls and unresolvable paths sort first under ascending direction (and
/// therefore last under descending), which matches what typical remote
/// stores do.
pub(crate) fn sort_entities(
    cache: &IdentityMap,
    entities: &mut [Arc<Entity>],
    specs: &[OrderSpec],
    opts: &LocalComparisonOptions,
) {
    if specs.is_empty() {
        return;
    }
    let paths: Vec<Option<PathExpr>> = specs
        .iter()
        .map(|s| PathExpr::parse(&s.path).ok())
        .collect();
    entities.sort_by(|a, b| compare_by_specs(cache, a, b, specs, &paths, opts));
}

fn compare_by_specs(
    cache: &IdentityMap,
    a: &Arc<Entity>,
    b: &Arc<Entity>,
    specs: &[OrderSpec],
    paths: &[Option<PathExpr>],
    opts: &LocalComparisonOptions,
) -> Ordering {
    for (spec, path) in specs.iter().zip(paths) {
        let Some(path) = path else { continue };
        let va = resolve_path(cache, a, path).filter(|v| !v.is_null());
        let vb = resolve_path(cache, b, path).filter(|v| !v.is_null());
        let ord = match (va, vb) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare_values(&x, &y, opts).unwrap_or(Ordering::Equal),
        };
        let ord = match spec.direction {
            OrderDirection::Asc => ord,
            OrderDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DataProperty, DataType, EntityType};
    use quarry_proto::Value;
    use std::collections::BTreeMap;

    fn customer(id: i64, city: Value, name: &str) -> Arc<Entity> {
        let t = Arc::new(
            EntityType::new("Customer", "Customers")
                .with_property(DataProperty::key("customerId", DataType::Int64))
                .with_property(DataProperty::optional("city", DataType::String))
                .with_property(DataProperty::new("companyName", DataType::String)),
        );
        let mut values = BTreeMap::new();
        values.insert("customerId".to_string(), Value::Int64(id));
        values.insert("city".to_string(), city);
        values.insert("companyName".to_string(), Value::String(name.into()));
        Entity::from_values(t, values)
    }

    fn names(entities: &[Arc<Entity>]) -> Vec<String> {
        entities
            .iter()
            .map(|e| match e.get("companyName") {
                Some(Value::String(s)) => s,
                _ => String::new(),
            })
            .collect()
    }

    #[test]
    fn test_multi_key_sort_with_nulls_first() {
        let cache = IdentityMap::new();
        let mut entities = vec![
            customer(1, Value::String("Berlin".into()), "beta"),
            customer(2, Value::Null, "nully"),
            customer(3, Value::String("berlin".into()), "alpha"),
            customer(4, Value::String("Aachen".into()), "gamma"),
        ];
        let specs = vec![OrderSpec::asc("city"), OrderSpec::asc("companyName")];
        sort_entities(
            &cache,
            &mut entities,
            &specs,
            &LocalComparisonOptions::default(),
        );
        // Null city first; "Berlin"/"berlin" tie case-insensitively and
        // fall through to the second key.
        assert_eq!(names(&entities), vec!["nully", "gamma", "alpha", "beta"]);
    }

    #[test]
    fn test_descending_puts_nulls_last() {
        let cache = IdentityMap::new();
        let mut entities = vec![
            customer(1, Value::Null, "nully"),
            customer(2, Value::String("Berlin".into()), "b"),
            customer(3, Value::String("Aachen".into()), "a"),
        ];
        let specs = vec![OrderSpec::desc("city")];
        sort_entities(
            &cache,
            &mut entities,
            &specs,
            &LocalComparisonOptions::default(),
        );
        assert_eq!(names(&entities), vec!["b", "a", "nully"]);
    }
}
