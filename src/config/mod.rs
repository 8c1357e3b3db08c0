//! Index-definition documents.
//!
//! Index configurations can be declared as a JSON document and installed
//! in one call, keeping index layout out of code. A document lists named
//! definitions; names are resolved against the committed type system at
//! installation, and malformed input is fatal only to that call.
//!
//! ```json
//! {
//!   "indexes": [
//!     { "label": "tokens", "type": "Token", "strategy": "sorted",
//!       "keys": [ { "feature": "begin", "direction": "ascending" },
//!                 { "feature": "end", "direction": "descending" } ],
//!       "type_priority": true }
//!   ]
//! }
//! ```

mod errors;

pub use errors::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};

use crate::comparator::{SortDirection, SortKey};
use crate::index::{IndexSpec, IndexStrategy};
use crate::types::TypeSystem;

/// One key entry of a definition document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyDefinition {
    /// Feature name, resolved on the index type
    pub feature: String,
    /// Sort direction
    #[serde(default)]
    pub direction: DirectionName,
}

/// Serialized sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DirectionName {
    /// Smaller values first
    #[default]
    Ascending,
    /// Larger values first
    Descending,
}

/// Serialized indexing strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyName {
    /// Ordered, retains all inserts
    Sorted,
    /// Ordered, one member per key class
    Set,
    /// Unordered, identity equality
    Bag,
}

/// One index definition of a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Registration label
    pub label: String,
    /// Top type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Indexing strategy
    pub strategy: StrategyName,
    /// Ordered key list (omitted for bags)
    #[serde(default)]
    pub keys: Vec<KeyDefinition>,
    /// Whether type precedence participates in the order
    #[serde(default)]
    pub type_priority: bool,
}

/// A full definition document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IndexDefinitions {
    /// The definitions, in declaration order
    pub indexes: Vec<IndexDefinition>,
}

impl IndexDefinitions {
    /// Parses a JSON definition document.
    pub fn from_json(text: &str) -> ConfigResult<IndexDefinitions> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes back to JSON.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Resolves every definition against a committed type system.
    pub fn resolve(&self, ts: &TypeSystem) -> ConfigResult<Vec<IndexSpec>> {
        self.indexes.iter().map(|def| def.resolve(ts)).collect()
    }

    /// Resolves and registers every definition into a repository.
    pub fn install(
        &self,
        ts: &TypeSystem,
        repo: &mut crate::index::IndexRepository,
    ) -> ConfigResult<()> {
        for spec in self.resolve(ts)? {
            repo.register(ts, spec)?;
        }
        Ok(())
    }
}

impl IndexDefinition {
    /// Resolves names into a registrable spec.
    pub fn resolve(&self, ts: &TypeSystem) -> ConfigResult<IndexSpec> {
        let top_type = ts
            .type_by_name(&self.type_name)
            .map_err(|_| ConfigError::UnknownType {
                label: self.label.clone(),
                type_name: self.type_name.clone(),
            })?;
        let mut keys = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let feature = ts.feature_by_name(top_type, &key.feature).map_err(|_| {
                ConfigError::UnknownFeature {
                    label: self.label.clone(),
                    type_name: self.type_name.clone(),
                    feature: key.feature.clone(),
                }
            })?;
            keys.push(SortKey {
                feature,
                direction: match key.direction {
                    DirectionName::Ascending => SortDirection::Ascending,
                    DirectionName::Descending => SortDirection::Descending,
                },
            });
        }
        Ok(IndexSpec {
            label: self.label.clone(),
            top_type,
            strategy: match self.strategy {
                StrategyName::Sorted => IndexStrategy::Sorted,
                StrategyName::Set => IndexStrategy::Set,
                StrategyName::Bag => IndexStrategy::Bag,
            },
            keys,
            use_type_order: self.type_priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeSystemBuilder;

    const DOC: &str = r#"{
        "indexes": [
            { "label": "annotations", "type": "Annotation", "strategy": "sorted",
              "keys": [ { "feature": "begin" },
                        { "feature": "end", "direction": "descending" } ],
              "type_priority": true },
            { "label": "all", "type": "Top", "strategy": "bag" }
        ]
    }"#;

    #[test]
    fn test_parse_and_resolve() {
        let ts = TypeSystemBuilder::new().commit();
        let defs = IndexDefinitions::from_json(DOC).unwrap();
        assert_eq!(defs.indexes.len(), 2);
        let specs = defs.resolve(&ts).unwrap();
        assert_eq!(specs[0].label, "annotations");
        assert_eq!(specs[0].strategy, IndexStrategy::Sorted);
        assert_eq!(specs[0].keys.len(), 2);
        assert_eq!(specs[0].keys[0].feature, TypeSystem::BEGIN);
        assert_eq!(specs[0].keys[0].direction, SortDirection::Ascending);
        assert_eq!(specs[0].keys[1].direction, SortDirection::Descending);
        assert!(specs[0].use_type_order);
        assert_eq!(specs[1].strategy, IndexStrategy::Bag);
        assert!(specs[1].keys.is_empty());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let ts = TypeSystemBuilder::new().commit();
        let defs = IndexDefinitions::from_json(
            r#"{ "indexes": [ { "label": "x", "type": "Missing", "strategy": "bag" } ] }"#,
        )
        .unwrap();
        let err = defs.resolve(&ts).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType { .. }));
    }

    #[test]
    fn test_unknown_feature_rejected() {
        let ts = TypeSystemBuilder::new().commit();
        let defs = IndexDefinitions::from_json(
            r#"{ "indexes": [ { "label": "x", "type": "Annotation", "strategy": "sorted",
                 "keys": [ { "feature": "nope" } ] } ] }"#,
        )
        .unwrap();
        let err = defs.resolve(&ts).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFeature { .. }));
    }

    #[test]
    fn test_malformed_document_rejected() {
        let err = IndexDefinitions::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn test_round_trip() {
        let defs = IndexDefinitions::from_json(DOC).unwrap();
        let text = defs.to_json().unwrap();
        let again = IndexDefinitions::from_json(&text).unwrap();
        assert_eq!(defs, again);
    }
}
