//! # Comparator Errors

use thiserror::Error;

use crate::types::{FeatureId, TypeId};

/// Result type for comparator operations
pub type ComparatorResult<T> = Result<T, ComparatorError>;

/// Errors raised while comparing feature structures
#[derive(Debug, Clone, Error)]
pub enum ComparatorError {
    /// An operand's type cannot supply a key feature ("inappropriate type")
    #[error("Type {type_id:?} cannot supply key feature {feature:?}")]
    MissingKeyFeature {
        /// Operand type
        type_id: TypeId,
        /// Key feature it lacks
        feature: FeatureId,
    },

    /// An operand handle names no structure
    #[error("No feature structure with id {0}")]
    NoSuchStructure(u32),
}
