//! Client-side entity cache mirroring a remote store.
//!
//! A [`MetadataStore`](metadata::MetadataStore) describes entity types and
//! their relations; an [`EntityManager`] keeps one live instance per entity
//! key, tracks lifecycle state and original values on every instance,
//! merges query results against pending local changes, and evaluates query
//! descriptors either remotely (through a pluggable [`QueryExecutor`]) or
//! against the cache alone with identical semantics.

mod entity;
mod error;
mod events;
mod executor;
mod identity;
mod key;
mod manager;
pub mod metadata;
mod query;
mod relation;
mod state;

pub use entity::Entity;
pub use error::Error;
pub use events::{
    ArrayChanged, ArraySuppressGuard, EntityAction, EntityChanged, EventHub, PropertyChanged,
    SubscriptionId, SuppressGuard,
};
pub use executor::QueryExecutor;
pub use key::EntityKey;
pub use manager::{EntityManager, FetchStrategy, ManagerBuilder, MergeStrategy, QueryOptions};
pub use query::{FetchResult, LocalComparisonOptions, QueryOutcome, QueryRecord};
pub use relation::RelationArray;
pub use state::EntityState;
