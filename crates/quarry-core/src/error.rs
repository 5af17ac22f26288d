//! Core error types.

use crate::key::EntityKey;
use thiserror::Error;

/// Errors raised by the entity cache.
///
/// Local errors (bad resource, bad path, bad config) fail synchronously at
/// the call that introduced them. Remote-execution failures surface as
/// [`Error::Remote`] carrying the backend's message untouched, so a failed
/// query is always distinguishable from a query that succeeded with zero
/// rows.
#[derive(Debug, Error)]
pub enum Error {
    /// The query names a resource the metadata store does not know.
    #[error("unknown resource or entity type '{0}'")]
    UnknownResource(String),

    /// A predicate, ordering, selection, or expansion references a property
    /// path that does not exist on the entity type.
    #[error("unknown property path '{path}' on entity type '{entity_type}'")]
    UnknownProperty {
        /// Entity type the path was resolved against.
        entity_type: String,
        /// The offending dotted path.
        path: String,
    },

    /// An entity with an equal key is already registered as a different
    /// instance.
    #[error("an entity with key {0} is already attached")]
    DuplicateKey(EntityKey),

    /// Changing a key property would collide with a different registered
    /// entity.
    #[error("cannot change key: an entity with key {0} is already attached")]
    InvalidKeyChange(EntityKey),

    /// A value was written whose runtime type does not match the property's
    /// declared type.
    #[error("value not assignable to property '{property}' on entity type '{entity_type}'")]
    InvalidValue {
        /// Entity type owning the property.
        entity_type: String,
        /// The property that rejected the value.
        property: String,
    },

    /// A navigation property was used through the wrong accessor for its
    /// cardinality.
    #[error("navigation '{navigation}' on '{entity_type}' has the wrong cardinality for this call")]
    WrongCardinality {
        /// Entity type owning the navigation.
        entity_type: String,
        /// The navigation property name.
        navigation: String,
    },

    /// A key could not be computed: a key property is null or missing.
    #[error("entity of type '{0}' has no resolvable key")]
    MissingKey(String),

    /// Malformed options config object: unknown option name or invalid enum
    /// value.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The operation requires an attached entity.
    #[error("operation requires an attached entity")]
    Detached,

    /// The entity is already attached to a different manager.
    #[error("entity is already attached to another manager")]
    AlreadyAttached,

    /// No entity was found for the given key.
    #[error("no entity found for key {0}")]
    KeyNotFound(EntityKey),

    /// Remote execution failed; the backend-specific message is passed
    /// through without normalization.
    #[error("remote query failed: {0}")]
    Remote(String),

    /// Descriptor or shorthand error from the protocol layer.
    #[error(transparent)]
    Proto(#[from] quarry_proto::Error),
}
