//! Dotted-path resolution against cached entities.

use crate::entity::Entity;
use crate::identity::IdentityMap;
use crate::key::EntityKey;
use chrono::{DateTime, Datelike};
use quarry_proto::{DatePart, PathExpr, Value};
use std::sync::Arc;

/// Resolve a path expression against one entity, hopping to-one
/// navigations through the identity map.
///
/// Returns `None` when the path cannot be resolved on this instance (an
/// uncached or deleted navigation target, a missing property, a date part
/// applied to a non-timestamp). Predicate evaluation treats `None` as
/// no-match; paths are validated against metadata before execution ever
/// reaches this point.
pub(crate) fn resolve_path(
    cache: &IdentityMap,
    entity: &Arc<Entity>,
    path: &PathExpr,
) -> Option<Value> {
    match path {
        PathExpr::Raw(dotted) => resolve_raw(cache, entity, dotted),
        PathExpr::DatePart { part, path } => {
            let value = resolve_raw(cache, entity, path)?;
            let micros = value.as_timestamp()?;
            let dt = DateTime::from_timestamp_micros(micros)?;
            Some(match part {
                DatePart::Year => Value::Int64(i64::from(dt.year())),
                DatePart::Month => Value::Int64(i64::from(dt.month())),
            })
        }
    }
}

fn resolve_raw(cache: &IdentityMap, entity: &Arc<Entity>, dotted: &str) -> Option<Value> {
    let mut current = Arc::clone(entity);
    let segments: Vec<&str> = dotted.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if i + 1 == segments.len() {
            return current.get(segment);
        }
        let nav = current.entity_type().navigation_property(segment)?.clone();
        if nav.is_many() {
            return None;
        }
        let fk = current.get(&nav.foreign_key)?;
        if fk.is_null() {
            return None;
        }
        let key = EntityKey::new(nav.target, vec![fk]).ok()?;
        let next = cache.resolve(&key)?;
        if next.state().is_deleted() {
            return None;
        }
        current = next;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DataProperty, DataType, EntityType, NavigationProperty};
    use std::collections::BTreeMap;

    fn order_entity(ts: i64) -> Arc<Entity> {
        let t = Arc::new(
            EntityType::new("Order", "Orders")
                .with_property(DataProperty::key("orderId", DataType::Int64))
                .with_property(DataProperty::new("orderDate", DataType::Timestamp))
                .with_property(DataProperty::new("customerId", DataType::Int64))
                .with_navigation(NavigationProperty::to_one("customer", "Customer", "customerId")),
        );
        let mut values = BTreeMap::new();
        values.insert("orderId".to_string(), Value::Int64(1));
        values.insert("orderDate".to_string(), Value::Timestamp(ts));
        values.insert("customerId".to_string(), Value::Int64(9));
        Entity::from_values(t, values)
    }

    #[test]
    fn test_date_parts() {
        // 1996-07-04T00:00:00Z
        let entity = order_entity(836_438_400_000_000);
        let cache = IdentityMap::new();

        let year = PathExpr::parse("year(orderDate)").unwrap();
        assert_eq!(
            resolve_path(&cache, &entity, &year),
            Some(Value::Int64(1996))
        );
        let month = PathExpr::parse("month(orderDate)").unwrap();
        assert_eq!(resolve_path(&cache, &entity, &month), Some(Value::Int64(7)));

        // Date part over a non-timestamp does not resolve.
        let bad = PathExpr::parse("year(orderId)").unwrap();
        assert_eq!(resolve_path(&cache, &entity, &bad), None);
    }

    #[test]
    fn test_navigation_hop_misses_without_target() {
        let entity = order_entity(0);
        let cache = IdentityMap::new();
        let path = PathExpr::parse("customer.companyName").unwrap();
        assert_eq!(resolve_path(&cache, &entity, &path), None);
    }

    #[test]
    fn test_navigation_hop_resolves_cached_target() {
        let entity = order_entity(0);
        let customer_type = Arc::new(
            EntityType::new("Customer", "Customers")
                .with_property(DataProperty::key("customerId", DataType::Int64))
                .with_property(DataProperty::new("companyName", DataType::String)),
        );
        let mut values = BTreeMap::new();
        values.insert("customerId".to_string(), Value::Int64(9));
        values.insert("companyName".to_string(), Value::String("Alfreds".into()));
        let customer = Entity::from_values(customer_type, values);

        let mut cache = IdentityMap::new();
        let key = customer.key().unwrap();
        cache.register(key, Arc::clone(&customer)).unwrap();

        let path = PathExpr::parse("customer.companyName").unwrap();
        assert_eq!(
            resolve_path(&cache, &entity, &path),
            Some(Value::String("Alfreds".into()))
        );
    }
}
