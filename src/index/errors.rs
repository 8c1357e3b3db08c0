//! # Index Errors
//!
//! Error types for index mutation, lookup, and cursor navigation. All of
//! these are local, synchronous usage errors; none is fatal beyond the
//! offending call.

use thiserror::Error;

use crate::comparator::ComparatorError;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised by indexes, cursors, and the index repository
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// `get()` on a cursor that is not positioned on an element
    #[error("No such element: cursor is not positioned")]
    NoSuchElement,

    /// A live cursor observed a structural change made after its creation.
    /// Best-effort diagnostic; recover by obtaining a fresh cursor.
    #[error("Concurrent structural modification (index generation {expected} -> {actual})")]
    ConcurrentModification {
        /// Generation the cursor was created against
        expected: u64,
        /// Generation the index is at now
        actual: u64,
    },

    /// A template or operand type cannot supply the index's key features
    #[error(transparent)]
    TypeMismatch(#[from] ComparatorError),

    /// Invalid argument (unknown handle, keys on a bag index, ...)
    #[error("Illegal index argument: {0}")]
    IllegalArgument(String),

    /// A label is already registered with a differing definition
    #[error("Index label already registered with a different definition: {0}")]
    LabelConflict(String),

    /// No index registered under the label
    #[error("No index registered under label: {0}")]
    UnknownLabel(String),
}
