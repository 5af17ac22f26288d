//! Cache-only query execution.

mod common;

use common::{micros, sales_metadata, ScriptedExecutor};
use quarry_core::{Entity, EntityManager, Error, FetchStrategy, QueryOptions};
use quarry_proto::{parse_shorthand, CompareOp, EntityQuery, Predicate, Value};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn manager() -> (EntityManager, Arc<ScriptedExecutor>) {
    let exec = ScriptedExecutor::new();
    let executor = Arc::clone(&exec);
    (EntityManager::new(sales_metadata(), executor), exec)
}

fn attach_customer(mgr: &EntityManager, id: i64, name: &str, city: Option<&str>) -> Arc<Entity> {
    let t = mgr.metadata().entity_type("Customer").unwrap();
    let mut values = BTreeMap::new();
    values.insert("customerId".to_string(), Value::Int64(id));
    values.insert("companyName".to_string(), Value::String(name.into()));
    values.insert(
        "city".to_string(),
        city.map(|c| Value::String(c.into())).unwrap_or(Value::Null),
    );
    values.insert("region".to_string(), Value::Null);
    let entity = Entity::from_values(t, values);
    mgr.attach_entity(&entity).unwrap();
    entity
}

fn attach_order(mgr: &EntityManager, id: i64, customer_id: i64, date: i64, freight: f64) -> Arc<Entity> {
    let t = mgr.metadata().entity_type("Order").unwrap();
    let mut values = BTreeMap::new();
    values.insert("orderId".to_string(), Value::Int64(id));
    values.insert("customerId".to_string(), Value::Int64(customer_id));
    values.insert("orderDate".to_string(), Value::Timestamp(date));
    values.insert("freight".to_string(), Value::Float64(freight));
    let entity = Entity::from_values(t, values);
    mgr.attach_entity(&entity).unwrap();
    entity
}

fn seed(mgr: &EntityManager) {
    attach_customer(mgr, 1, "Alfreds Futterkiste", Some("Berlin"));
    attach_customer(mgr, 2, "Around the Horn", Some("London"));
    attach_customer(mgr, 3, "B's Beverages", Some("London"));
    attach_customer(mgr, 4, "Vins et alcools", None);
    attach_order(mgr, 10, 1, micros(1996, 7, 4), 32.38);
    attach_order(mgr, 11, 1, micros(1997, 3, 12), 11.61);
    attach_order(mgr, 12, 2, micros(1996, 12, 24), 148.33);
}

#[test]
fn string_operators_fold_case() {
    let (mgr, _) = manager();
    seed(&mgr);

    let q = EntityQuery::from("Customers")
        .where_clause(Predicate::new("companyName", CompareOp::Contains, "HORN").unwrap());
    let outcome = mgr.execute_query_locally(&q).unwrap();
    assert_eq!(outcome.len(), 1);
    assert_eq!(
        outcome.entities()[0].get("customerId"),
        Some(Value::Int64(2))
    );
}

#[test]
fn integer_literals_compare_against_float_properties() {
    let (mgr, _) = manager();
    seed(&mgr);

    // freight is Float64; the literal is an integer.
    let q = EntityQuery::from("Orders")
        .where_clause(Predicate::new("freight", CompareOp::Gt, 100i64).unwrap());
    let outcome = mgr.execute_query_locally(&q).unwrap();
    assert_eq!(outcome.len(), 1);
    assert_eq!(
        outcome.entities()[0].get("orderId"),
        Some(Value::Int64(12))
    );

    let q = EntityQuery::from("Orders")
        .where_clause(Predicate::new("freight", CompareOp::Le, 32i32).unwrap());
    assert_eq!(mgr.execute_query_locally(&q).unwrap().len(), 1);
}

#[test]
fn date_part_filters() {
    let (mgr, _) = manager();
    seed(&mgr);

    let q = EntityQuery::from("Orders")
        .where_clause(Predicate::new("year(orderDate)", CompareOp::Eq, 1996i64).unwrap())
        .order_by("orderId");
    let outcome = mgr.execute_query_locally(&q).unwrap();
    let ids: Vec<Value> = outcome
        .entities()
        .iter()
        .map(|e| e.get("orderId").unwrap())
        .collect();
    assert_eq!(ids, vec![Value::Int64(10), Value::Int64(12)]);

    let q = EntityQuery::from("Orders")
        .where_clause(Predicate::new("month(orderDate)", CompareOp::Eq, 12i64).unwrap());
    assert_eq!(mgr.execute_query_locally(&q).unwrap().len(), 1);
}

#[test]
fn ordering_paging_and_inline_count() {
    let (mgr, _) = manager();
    seed(&mgr);

    let q = EntityQuery::from("Customers")
        .order_by("city desc, companyName")
        .skip(1)
        .take(2)
        .inline_count(true);
    let outcome = mgr.execute_query_locally(&q).unwrap();
    assert_eq!(outcome.inline_count, Some(4));
    let names: Vec<Value> = outcome
        .entities()
        .iter()
        .map(|e| e.get("companyName").unwrap())
        .collect();
    // Descending city puts London first, the null city last; skipping one
    // London row leaves the second London row and Berlin.
    assert_eq!(
        names,
        vec![
            Value::String("B's Beverages".into()),
            Value::String("Alfreds Futterkiste".into()),
        ]
    );
}

#[test]
fn local_projection_resolves_dotted_paths() {
    let (mgr, _) = manager();
    seed(&mgr);

    let q = EntityQuery::from("Orders")
        .where_clause(Predicate::new("orderId", CompareOp::Eq, 10i64).unwrap())
        .select("freight, customer.companyName");
    let outcome = mgr.execute_query_locally(&q).unwrap();
    let row = outcome.records[0].projection().unwrap();
    assert_eq!(row.get("freight"), Some(&Value::Float64(32.38)));
    assert_eq!(
        row.get("customer.companyName"),
        Some(&Value::String("Alfreds Futterkiste".into()))
    );
}

#[test]
fn deleted_entities_are_invisible_locally_but_still_cached() {
    let (mgr, _) = manager();
    seed(&mgr);

    let doomed = mgr
        .execute_query_locally(
            &EntityQuery::from("Customers")
                .where_clause(Predicate::new("customerId", CompareOp::Eq, 1i64).unwrap()),
        )
        .unwrap()
        .entities()[0]
        .clone();
    doomed.mark_deleted().unwrap();

    let all = mgr.execute_query_locally(&EntityQuery::from("Customers")).unwrap();
    assert_eq!(all.len(), 3);
    // The cache itself still holds the pending deletion.
    assert_eq!(mgr.get_entities_of_type("Customer").len(), 4);
    assert_eq!(mgr.get_changes().len(), 1);
}

#[test]
fn filters_traverse_cached_to_one_navigations() {
    let (mgr, _) = manager();
    seed(&mgr);

    let q = EntityQuery::from("Orders")
        .where_clause(Predicate::new("customer.city", CompareOp::Eq, "Berlin").unwrap())
        .order_by("orderId");
    let outcome = mgr.execute_query_locally(&q).unwrap();
    assert_eq!(outcome.len(), 2);

    // Property-to-property comparison on the same entity. A concrete city
    // is "not equal" to the null region; the all-null row fails the
    // inequality because null equals null.
    let q = EntityQuery::from("Customers")
        .where_clause(Predicate::compare_paths("city", CompareOp::Ne, "region").unwrap());
    assert_eq!(mgr.execute_query_locally(&q).unwrap().len(), 3);
}

#[test]
fn shorthand_json_predicates_run_locally() {
    let (mgr, _) = manager();
    seed(&mgr);

    let predicate = parse_shorthand(&json!({
        "city": { "in": ["London", "Berlin"] },
        "companyName": { "startswith": "A" },
    }))
    .unwrap();
    let outcome = mgr
        .execute_query_locally(&EntityQuery::from("Customers").where_clause(predicate))
        .unwrap();
    let names: Vec<Value> = outcome
        .entities()
        .iter()
        .map(|e| e.get("companyName").unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            Value::String("Alfreds Futterkiste".into()),
            Value::String("Around the Horn".into()),
        ]
    );
}

#[test]
fn unknown_paths_fail_before_evaluation() {
    let (mgr, _) = manager();
    seed(&mgr);

    let q = EntityQuery::from("Customers")
        .where_clause(Predicate::new("companyNam", CompareOp::Eq, "x").unwrap());
    assert!(matches!(
        mgr.execute_query_locally(&q),
        Err(Error::UnknownProperty { .. })
    ));

    assert!(matches!(
        mgr.execute_query_locally(&EntityQuery::from("Custommers")),
        Err(Error::UnknownResource(_))
    ));
}

#[tokio::test]
async fn from_local_cache_strategy_never_goes_remote() {
    let (mgr, exec) = manager();
    seed(&mgr);

    let options = QueryOptions::default().using_fetch(FetchStrategy::FromLocalCache);
    let outcome = mgr
        .execute_query_with(&EntityQuery::from("Customers"), options)
        .await
        .unwrap();
    assert!(outcome.from_cache);
    assert_eq!(outcome.len(), 4);
    assert_eq!(exec.call_count(), 0);
}
