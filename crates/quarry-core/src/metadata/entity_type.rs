//! Entity type definitions.

use super::property::{DataProperty, NavigationProperty};
use serde::{Deserialize, Serialize};

/// The schema of one entity type: ordered data properties, ordered
/// navigation properties, and the key structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    /// Type name (unique within a metadata store).
    pub name: String,
    /// Default resource name queries target (e.g. `"Customers"`).
    pub default_resource_name: String,
    /// Ordered data properties.
    pub data_properties: Vec<DataProperty>,
    /// Ordered navigation properties.
    pub navigation_properties: Vec<NavigationProperty>,
}

impl EntityType {
    /// Create a new entity type.
    pub fn new(name: impl Into<String>, default_resource_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_resource_name: default_resource_name.into(),
            data_properties: Vec::new(),
            navigation_properties: Vec::new(),
        }
    }

    /// Add a data property.
    pub fn with_property(mut self, property: DataProperty) -> Self {
        self.data_properties.push(property);
        self
    }

    /// Add multiple data properties.
    pub fn with_properties(mut self, properties: impl IntoIterator<Item = DataProperty>) -> Self {
        self.data_properties.extend(properties);
        self
    }

    /// Add a navigation property.
    pub fn with_navigation(mut self, navigation: NavigationProperty) -> Self {
        self.navigation_properties.push(navigation);
        self
    }

    /// Get a data property by name.
    pub fn data_property(&self, name: &str) -> Option<&DataProperty> {
        self.data_properties.iter().find(|p| p.name == name)
    }

    /// Get a navigation property by name.
    pub fn navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties.iter().find(|p| p.name == name)
    }

    /// The ordered key properties.
    pub fn key_properties(&self) -> Vec<&DataProperty> {
        self.data_properties.iter().filter(|p| p.is_key).collect()
    }
}
