//! # Type System Errors
//!
//! Error types for type-tree construction and commit.

use thiserror::Error;

/// Result type for type-system operations
pub type TypeSystemResult<T> = Result<T, TypeSystemError>;

/// Errors raised while building or committing a type system
#[derive(Debug, Clone, Error)]
pub enum TypeSystemError {
    /// A type with this name is already declared
    #[error("Type already declared: {0}")]
    DuplicateType(String),

    /// A feature with this name already exists on the type or an ancestor
    #[error("Feature '{feature}' already declared on type '{type_name}' or an ancestor")]
    DuplicateFeature {
        /// Owning type name
        type_name: String,
        /// Feature name
        feature: String,
    },

    /// Lookup by name failed
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// Feature lookup failed for a type
    #[error("Type '{type_name}' has no feature '{feature}'")]
    UnknownFeature {
        /// Type searched
        type_name: String,
        /// Feature name requested
        feature: String,
    },

    /// A precedence order must mention every declared type exactly once
    #[error("Precedence order must list every type exactly once ({listed} listed, {declared} declared)")]
    IncompletePrecedence {
        /// Number of types in the supplied order
        listed: usize,
        /// Number of declared types
        declared: usize,
    },
}
