//! Type catalog: entity types, properties, and resource mappings.

mod entity_type;
mod property;
mod store;
mod types;

pub use entity_type::EntityType;
pub use property::{Cardinality, DataProperty, NavigationProperty};
pub use store::MetadataStore;
pub use types::DataType;
