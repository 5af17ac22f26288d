//! Shared fixtures: a small sales schema and a scripted remote executor.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use quarry_core::metadata::{
    DataProperty, DataType, EntityType, MetadataStore, NavigationProperty,
};
use quarry_core::QueryExecutor;
use quarry_proto::{EntityQuery, RawEntity, RemoteQueryResult, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Customers and orders, linked both ways.
pub fn sales_metadata() -> Arc<MetadataStore> {
    let customer = EntityType::new("Customer", "Customers")
        .with_property(DataProperty::key("customerId", DataType::Int64))
        .with_property(DataProperty::new("companyName", DataType::String))
        .with_property(DataProperty::optional("city", DataType::String))
        .with_property(DataProperty::optional("region", DataType::String))
        .with_navigation(
            NavigationProperty::to_many("orders", "Order", "customerId").with_inverse("customer"),
        );
    let order = EntityType::new("Order", "Orders")
        .with_property(DataProperty::key("orderId", DataType::Int64))
        .with_property(DataProperty::new("customerId", DataType::Int64))
        .with_property(DataProperty::new("orderDate", DataType::Timestamp))
        .with_property(DataProperty::new("freight", DataType::Float64))
        .with_navigation(
            NavigationProperty::to_one("customer", "Customer", "customerId").with_inverse("orders"),
        );
    Arc::new(
        MetadataStore::new()
            .with_entity_type(customer)
            .with_entity_type(order),
    )
}

/// An executor that replays canned responses per resource and records
/// every descriptor it receives.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<HashMap<String, VecDeque<Result<RemoteQueryResult, String>>>>,
    calls: Mutex<Vec<EntityQuery>>,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_rows(&self, resource: &str, rows: Vec<RawEntity>) {
        self.push(resource, Ok(RemoteQueryResult::new(rows)));
    }

    pub fn push_result(&self, resource: &str, result: RemoteQueryResult) {
        self.push(resource, Ok(result));
    }

    pub fn push_error(&self, resource: &str, message: &str) {
        self.push(resource, Err(message.to_string()));
    }

    fn push(&self, resource: &str, response: Result<RemoteQueryResult, String>) {
        self.responses
            .lock()
            .entry(resource.to_string())
            .or_default()
            .push_back(response);
    }

    /// Every descriptor executed so far, in order.
    pub fn calls(&self) -> Vec<EntityQuery> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl QueryExecutor for ScriptedExecutor {
    fn execute<'a>(
        &'a self,
        query: &'a EntityQuery,
    ) -> BoxFuture<'a, Result<RemoteQueryResult, String>> {
        self.calls.lock().push(query.clone());
        let response = self
            .responses
            .lock()
            .get_mut(&query.resource)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(RemoteQueryResult::default()));
        Box::pin(futures::future::ready(response))
    }
}

pub fn customer_row(id: i64, name: &str, city: &str) -> RawEntity {
    RawEntity::new([
        ("customerId", Value::Int64(id)),
        ("companyName", Value::String(name.into())),
        ("city", Value::String(city.into())),
        ("region", Value::Null),
    ])
}

pub fn order_row(id: i64, customer_id: i64, order_date: i64, freight: f64) -> RawEntity {
    RawEntity::new([
        ("orderId", Value::Int64(id)),
        ("customerId", Value::Int64(customer_id)),
        ("orderDate", Value::Timestamp(order_date)),
        ("freight", Value::Float64(freight)),
    ])
}

/// Microseconds since the epoch for midnight UTC on the given date.
pub fn micros(year: i64, month: i64, day: i64) -> i64 {
    use chrono::{TimeZone, Utc};
    Utc.with_ymd_and_hms(year as i32, month as u32, day as u32, 0, 0, 0)
        .single()
        .map(|dt| dt.timestamp_micros())
        .unwrap_or(0)
}
