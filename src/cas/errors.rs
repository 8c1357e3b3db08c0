//! # CAS Errors

use thiserror::Error;

use crate::arena::ArenaError;
use crate::index::IndexError;
use crate::types::TypeSystemError;

/// Result type for CAS operations
pub type CasResult<T> = Result<T, CasError>;

/// Errors raised at the CAS/view boundary
#[derive(Debug, Clone, Error)]
pub enum CasError {
    /// A view with this name already exists
    #[error("View already exists: {0}")]
    DuplicateView(String),

    /// No view with this name or id
    #[error("No view named: {0}")]
    UnknownView(String),

    /// Underlying index failure
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Underlying arena failure
    #[error(transparent)]
    Arena(#[from] ArenaError),

    /// Underlying type-system failure
    #[error(transparent)]
    TypeSystem(#[from] TypeSystemError),
}
