//! The remote execution seam.

use futures::future::BoxFuture;
use quarry_proto::{EntityQuery, RemoteQueryResult};

/// Executes query descriptors against a remote store.
///
/// The cache is transport-agnostic: an executor translates the descriptor
/// into whatever protocol its backend speaks and returns raw rows. Failures
/// come back as a backend-specific message, which the manager surfaces
/// untouched so a failed query is never mistaken for an empty one.
pub trait QueryExecutor: Send + Sync {
    /// Execute one query.
    fn execute<'a>(
        &'a self,
        query: &'a EntityQuery,
    ) -> BoxFuture<'a, Result<RemoteQueryResult, String>>;
}
