//! # Arena Errors
//!
//! Error types for feature-structure storage and slot access.

use thiserror::Error;

use crate::types::{FeatureId, TypeId};

/// Result type for arena operations
pub type ArenaResult<T> = Result<T, ArenaError>;

/// Errors raised by feature-structure creation and slot access
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArenaError {
    /// The handle does not name a structure in this arena
    #[error("No feature structure with id {0}")]
    NoSuchStructure(u32),

    /// The structure's type does not carry the requested feature
    #[error("Feature {feature:?} is not defined on type {type_id:?}")]
    FeatureNotOnType {
        /// Type of the structure
        type_id: TypeId,
        /// Feature requested
        feature: FeatureId,
    },

    /// A slot access used the wrong value kind
    #[error("Feature {feature:?} holds {actual}, not {requested}")]
    WrongValueKind {
        /// Feature accessed
        feature: FeatureId,
        /// Kind stored in the slot
        actual: &'static str,
        /// Kind the caller asked for
        requested: &'static str,
    },

    /// Span accessors require a type subsumed by `Annotation`
    #[error("Type {0:?} is not an annotation type")]
    NotAnAnnotation(TypeId),
}
