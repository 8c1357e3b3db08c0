//! # Config Errors

use thiserror::Error;

/// Result type for definition loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading index definitions
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for the definition schema
    #[error("Malformed index definitions: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A definition names an unknown type
    #[error("Index '{label}' names unknown type '{type_name}'")]
    UnknownType {
        /// Offending definition
        label: String,
        /// Name that failed to resolve
        type_name: String,
    },

    /// A definition names an unknown key feature
    #[error("Index '{label}' names unknown key feature '{feature}' on type '{type_name}'")]
    UnknownFeature {
        /// Offending definition
        label: String,
        /// Type searched
        type_name: String,
        /// Feature name that failed to resolve
        feature: String,
    },

    /// Registration of a resolved definition failed
    #[error(transparent)]
    Register(#[from] crate::index::IndexError),
}
