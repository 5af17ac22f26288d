//! The metadata store: a read-only type catalog.
//!
//! Built once at startup by the caller and shared as `Arc<MetadataStore>`;
//! everything else in the crate consumes it read-only.

use super::entity_type::EntityType;
use super::property::{Cardinality, DataProperty, NavigationProperty};
use crate::error::Error;
use std::collections::HashMap;
use std::sync::Arc;

/// An in-memory catalog of entity types and resource-name mappings.
#[derive(Debug, Default)]
pub struct MetadataStore {
    types: HashMap<String, Arc<EntityType>>,
    resources: HashMap<String, String>,
}

impl MetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity type; its default resource name is registered as well.
    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.resources
            .insert(entity_type.default_resource_name.clone(), entity_type.name.clone());
        self.types
            .insert(entity_type.name.clone(), Arc::new(entity_type));
        self
    }

    /// Register an additional resource name for a type.
    pub fn with_resource_name(
        mut self,
        resource: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.resources.insert(resource.into(), type_name.into());
        self
    }

    /// Look up an entity type by type name.
    pub fn entity_type(&self, name: &str) -> Result<Arc<EntityType>, Error> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownResource(name.to_string()))
    }

    /// Look up the entity type a resource name maps to.
    pub fn entity_type_for_resource(&self, resource: &str) -> Result<Arc<EntityType>, Error> {
        let type_name = self
            .resources
            .get(resource)
            .ok_or_else(|| Error::UnknownResource(resource.to_string()))?;
        self.entity_type(type_name)
    }

    /// All registered type names.
    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// Resolve a dotted data path against a type, walking to-one
    /// navigations, and return the terminal data property.
    ///
    /// Collection-valued hops and unknown segments fail with
    /// [`Error::UnknownProperty`].
    pub fn resolve_data_path(
        &self,
        entity_type: &EntityType,
        path: &str,
    ) -> Result<DataProperty, Error> {
        let unknown = || Error::UnknownProperty {
            entity_type: entity_type.name.clone(),
            path: path.to_string(),
        };

        let mut current: Arc<EntityType> = self.entity_type(&entity_type.name)?;
        let segments: Vec<&str> = path.split('.').collect();
        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            if is_last {
                return current.data_property(segment).cloned().ok_or_else(unknown);
            }
            let nav = current.navigation_property(segment).ok_or_else(unknown)?;
            if nav.cardinality == Cardinality::Many {
                // A comparison cannot traverse a collection.
                return Err(unknown());
            }
            current = self.entity_type(&nav.target)?;
        }
        Err(unknown())
    }

    /// Resolve a dotted expansion path: every segment must be a navigation
    /// property. Returns the navigation chain.
    pub fn resolve_expand_path(
        &self,
        entity_type: &EntityType,
        path: &str,
    ) -> Result<Vec<NavigationProperty>, Error> {
        let unknown = || Error::UnknownProperty {
            entity_type: entity_type.name.clone(),
            path: path.to_string(),
        };

        let mut current: Arc<EntityType> = self.entity_type(&entity_type.name)?;
        let mut chain = Vec::new();
        for segment in path.split('.') {
            let nav = current.navigation_property(segment).cloned().ok_or_else(unknown)?;
            current = self.entity_type(&nav.target)?;
            chain.push(nav);
        }
        if chain.is_empty() {
            return Err(unknown());
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DataType, NavigationProperty};

    fn store() -> MetadataStore {
        let customer = EntityType::new("Customer", "Customers")
            .with_property(DataProperty::key("customerId", DataType::Int64))
            .with_property(DataProperty::new("companyName", DataType::String))
            .with_navigation(NavigationProperty::to_many("orders", "Order", "customerId"));
        let order = EntityType::new("Order", "Orders")
            .with_property(DataProperty::key("orderId", DataType::Int64))
            .with_property(DataProperty::new("customerId", DataType::Int64))
            .with_navigation(NavigationProperty::to_one("customer", "Customer", "customerId"));
        MetadataStore::new()
            .with_entity_type(customer)
            .with_entity_type(order)
    }

    #[test]
    fn test_resource_lookup() {
        let store = store();
        assert_eq!(store.entity_type_for_resource("Customers").unwrap().name, "Customer");
        assert!(matches!(
            store.entity_type_for_resource("Custommers"),
            Err(Error::UnknownResource(_))
        ));
    }

    #[test]
    fn test_resolve_data_path_through_navigation() {
        let store = store();
        let order = store.entity_type("Order").unwrap();

        let p = store.resolve_data_path(&order, "customer.companyName").unwrap();
        assert_eq!(p.name, "companyName");

        // A to-many hop is not a scalar path.
        let customer = store.entity_type("Customer").unwrap();
        assert!(store.resolve_data_path(&customer, "orders.orderId").is_err());
        assert!(store.resolve_data_path(&order, "customer.nope").is_err());
    }

    #[test]
    fn test_resolve_expand_path() {
        let store = store();
        let customer = store.entity_type("Customer").unwrap();

        let chain = store.resolve_expand_path(&customer, "orders").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name, "orders");

        let order = store.entity_type("Order").unwrap();
        let chain = store.resolve_expand_path(&order, "customer.orders").unwrap();
        assert_eq!(chain.len(), 2);

        assert!(store.resolve_expand_path(&customer, "companyName").is_err());
    }
}
