//! Quarry protocol types - query descriptors, predicates, and raw results.
//!
//! This crate defines the contract between application code, the entity
//! cache in `quarry-core`, and any remote query executor: the runtime
//! [`Value`] model, the [`Predicate`] expression tree, the immutable
//! [`EntityQuery`] descriptor, and the raw row payload an executor returns.

pub mod error;
pub mod predicate;
pub mod query;
pub mod row;
pub mod shorthand;
pub mod value;

pub use error::Error;
pub use predicate::{CompareOp, DatePart, Operand, PathExpr, Predicate};
pub use query::{EntityQuery, OrderDirection, OrderSpec};
pub use row::{RawEntity, RawExpansion, RemoteQueryResult};
pub use shorthand::parse_shorthand;
pub use value::Value;
