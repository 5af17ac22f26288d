//! Data and navigation property definitions.

use super::types::DataType;
use quarry_proto::Value;
use serde::{Deserialize, Serialize};

/// A data property on an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProperty {
    /// Property name.
    pub name: String,
    /// Semantic type.
    pub data_type: DataType,
    /// Whether null is a legal value.
    pub nullable: bool,
    /// Default value applied when a new entity is constructed.
    pub default: Option<Value>,
    /// Whether this property participates in the entity key.
    pub is_key: bool,
}

impl DataProperty {
    /// Create a required (non-nullable) property.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            default: None,
            is_key: false,
        }
    }

    /// Create a nullable property.
    pub fn optional(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, data_type)
        }
    }

    /// Create a key property.
    pub fn key(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            is_key: true,
            ..Self::new(name, data_type)
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Multiplicity of a navigation property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// Navigates to at most one related entity.
    One,
    /// Navigates to a collection of related entities.
    Many,
}

/// A navigation property connecting two entity types.
///
/// For [`Cardinality::Many`] the foreign key names the property on the
/// *target* type that points back at this entity's key; for
/// [`Cardinality::One`] it names the property on the owning type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationProperty {
    /// Property name.
    pub name: String,
    /// Target entity type name.
    pub target: String,
    /// Multiplicity.
    pub cardinality: Cardinality,
    /// Foreign key property name (see type-level docs for which side).
    pub foreign_key: String,
    /// Inverse navigation property name on the target type, if declared.
    pub inverse: Option<String>,
}

impl NavigationProperty {
    /// Create a to-one navigation (foreign key on the owning type).
    pub fn to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::One,
            foreign_key: foreign_key.into(),
            inverse: None,
        }
    }

    /// Create a to-many navigation (foreign key on the target type).
    pub fn to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::Many,
            foreign_key: foreign_key.into(),
            inverse: None,
        }
    }

    /// Declare the inverse navigation property on the target type.
    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    /// Check if this is a collection navigation.
    pub fn is_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }
}
