//! Local query machinery: validation, predicate evaluation, ordering, and
//! cache-only execution.

pub(crate) mod compare;
pub(crate) mod evaluate;
pub(crate) mod local;
mod outcome;
pub(crate) mod ordering;
pub(crate) mod paths;
pub(crate) mod validate;

pub use compare::LocalComparisonOptions;
pub use outcome::{FetchResult, QueryOutcome, QueryRecord};
