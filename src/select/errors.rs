//! # Select Errors
//!
//! Error types for the query builder: cardinality violations, shape
//! mismatches, and configuration mistakes. All are scoped to the
//! offending call.

use thiserror::Error;

use crate::arena::ArenaError;
use crate::index::IndexError;

/// Result type for select operations
pub type SelectResult<T> = Result<T, SelectError>;

/// Errors raised while building or executing a selection
#[derive(Debug, Error)]
pub enum SelectError {
    /// Zero results where at least one was required
    #[error("No instances matched the selection")]
    NoInstances,

    /// More results than the terminal operation permits
    #[error("Selection matched {0} elements where at most one was expected")]
    MoreThanOne(usize),

    /// A span-relative operation was applied to an index without span/order
    /// semantics
    #[error("Operation requires a sorted annotation index: {0}")]
    WrongIndexKind(String),

    /// Flags or positions that cannot be combined
    #[error("Invalid selection: {0}")]
    IllegalConfiguration(String),

    /// The named view does not exist
    #[error("No view named: {0}")]
    UnknownView(String),

    /// Underlying index failure
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Underlying CAS failure (view or label resolution)
    #[error(transparent)]
    Cas(#[from] crate::cas::CasError),

    /// Underlying arena failure (span read on a malformed anchor)
    #[error(transparent)]
    Arena(#[from] ArenaError),
}
