//! Protocol-level error types.

use thiserror::Error;

/// Errors raised while constructing descriptors or parsing shorthand syntax.
///
/// These always fail synchronously at the call that introduced them.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed predicate shape, operator, or operand.
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),
}
