//! Local predicate evaluation.

use super::compare::{
    compare_values, contains, ends_with, starts_with, values_equal, LocalComparisonOptions,
};
use super::paths::resolve_path;
use crate::entity::Entity;
use crate::identity::IdentityMap;
use quarry_proto::{CompareOp, Operand, PathExpr, Predicate, Value};
use std::cmp::Ordering;
use std::sync::Arc;

/// Evaluate a predicate against one cached entity.
///
/// An unresolvable left-hand path makes the comparison leaf false, never
/// an error, and that holds for every operator, `Ne` included. A
/// resolvable null participates normally: `Eq null` matches null, range
/// operators fail on it.
pub(crate) fn matches(
    cache: &IdentityMap,
    entity: &Arc<Entity>,
    predicate: &Predicate,
    opts: &LocalComparisonOptions,
) -> bool {
    match predicate {
        Predicate::Compare { left, op, right } => compare_leaf(cache, entity, left, *op, right, opts),
        Predicate::And(list) => list.iter().all(|p| matches(cache, entity, p, opts)),
        Predicate::Or(list) => list.iter().any(|p| matches(cache, entity, p, opts)),
        Predicate::Not(inner) => !matches(cache, entity, inner, opts),
    }
}

fn compare_leaf(
    cache: &IdentityMap,
    entity: &Arc<Entity>,
    left: &PathExpr,
    op: CompareOp,
    right: &Operand,
    opts: &LocalComparisonOptions,
) -> bool {
    let Some(lhs) = resolve_path(cache, entity, left) else {
        return false;
    };

    if op == CompareOp::In {
        let candidates: &[Value] = match right {
            Operand::Values(vs) => vs,
            Operand::Literal(v) => std::slice::from_ref(v),
            Operand::Path(_) => return false,
        };
        return candidates.iter().any(|v| values_equal(&lhs, v, opts));
    }

    let rhs = match right {
        Operand::Literal(v) => v.clone(),
        Operand::Path(p) => {
            match resolve_path(cache, entity, &PathExpr::Raw(p.clone())) {
                Some(v) => v,
                None => return false,
            }
        }
        Operand::Values(_) => return false,
    };

    match op {
        CompareOp::Eq => values_equal(&lhs, &rhs, opts),
        CompareOp::Ne => !values_equal(&lhs, &rhs, opts),
        CompareOp::Lt => compare_values(&lhs, &rhs, opts) == Some(Ordering::Less),
        CompareOp::Le => matches!(
            compare_values(&lhs, &rhs, opts),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => compare_values(&lhs, &rhs, opts) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            compare_values(&lhs, &rhs, opts),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::StartsWith => starts_with(&lhs, &rhs, opts),
        CompareOp::EndsWith => ends_with(&lhs, &rhs, opts),
        CompareOp::Contains => contains(&lhs, &rhs, opts),
        CompareOp::In => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DataProperty, DataType, EntityType};
    use std::collections::BTreeMap;

    fn customer(city: &str, population: i64) -> Arc<Entity> {
        let t = Arc::new(
            EntityType::new("Customer", "Customers")
                .with_property(DataProperty::key("customerId", DataType::Int64))
                .with_property(DataProperty::new("city", DataType::String))
                .with_property(DataProperty::new("population", DataType::Int64))
                .with_property(DataProperty::optional("region", DataType::String)),
        );
        let mut values = BTreeMap::new();
        values.insert("customerId".to_string(), Value::Int64(1));
        values.insert("city".to_string(), Value::String(city.into()));
        values.insert("population".to_string(), Value::Int64(population));
        values.insert("region".to_string(), Value::Null);
        Entity::from_values(t, values)
    }

    fn check(entity: &Arc<Entity>, predicate: &Predicate) -> bool {
        matches(
            &IdentityMap::new(),
            entity,
            predicate,
            &LocalComparisonOptions::default(),
        )
    }

    #[test]
    fn test_leaf_operators() {
        let e = customer("Berlin", 3_700_000);

        assert!(check(&e, &Predicate::new("city", CompareOp::Eq, "berlin").unwrap()));
        assert!(check(&e, &Predicate::new("population", CompareOp::Gt, 1_000_000i64).unwrap()));
        assert!(check(&e, &Predicate::new("city", CompareOp::StartsWith, "BER").unwrap()));
        assert!(!check(&e, &Predicate::new("city", CompareOp::Contains, "xyz").unwrap()));
        assert!(check(
            &e,
            &Predicate::in_values(
                "city",
                vec![Value::String("Paris".into()), Value::String("Berlin".into())]
            )
            .unwrap()
        ));
    }

    #[test]
    fn test_null_fails_range_comparisons() {
        let e = customer("Berlin", 1);
        assert!(!check(&e, &Predicate::new("region", CompareOp::Lt, "Z").unwrap()));
        assert!(!check(&e, &Predicate::new("region", CompareOp::Eq, "Z").unwrap()));
        assert!(check(&e, &Predicate::new("region", CompareOp::Ne, "Z").unwrap()));
        assert!(check(&e, &Predicate::new("region", CompareOp::Eq, Value::Null).unwrap()));
    }

    #[test]
    fn test_unresolvable_path_never_matches() {
        let e = customer("Berlin", 1);
        // "manager.city" hops a navigation the type does not declare.
        let p = Predicate::new("manager.city", CompareOp::Eq, "Berlin").unwrap();
        assert!(!check(&e, &p));
        // Not even through Ne negation semantics.
        let p = Predicate::new("manager.city", CompareOp::Ne, "Berlin").unwrap();
        assert!(!check(&e, &p));
    }

    #[test]
    fn test_composites() {
        let e = customer("Berlin", 3_700_000);
        let p = Predicate::new("city", CompareOp::Eq, "Berlin")
            .unwrap()
            .and(Predicate::new("population", CompareOp::Ge, 1_000_000i64).unwrap());
        assert!(check(&e, &p));
        assert!(!check(&e, &p.clone().negate()));

        // Empty And matches everything; empty Or matches nothing.
        assert!(check(&e, &Predicate::And(vec![])));
        assert!(!check(&e, &Predicate::Or(vec![])));
    }
}
