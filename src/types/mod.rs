//! Type system subsystem for annodex
//!
//! A committed, immutable single-rooted type tree with typed features.
//! The index engine consumes exactly three things from it: a subsumption
//! test, an optional total type-precedence order, and per-type feature
//! slot layout.
//!
//! # Design Principles
//!
//! - Two-phase: mutable `TypeSystemBuilder`, then `commit()` into an
//!   immutable `TypeSystem`
//! - Subsumption via precomputed DFS intervals, never runtime reflection
//! - Deterministic: slot layout and default precedence derive from
//!   declaration order only
//!
//! # Invariants
//!
//! - `Top` is the root; `Annotation` (with int features `begin`, `end`)
//!   is built in
//! - Features are inherited by subtypes; slot offsets are stable after
//!   commit
//! - `subsumes(a, b)` holds iff `b`'s DFS entry lies inside `a`'s interval

mod errors;

pub use errors::{TypeSystemError, TypeSystemResult};

use std::collections::HashMap;

/// Dense handle for a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// Raw index into the type table.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Dense handle for a declared feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureId(pub(crate) u32);

impl FeatureId {
    /// Raw index into the feature table.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Value kind a feature slot can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point (total-ordered via bit trick when compared)
    Float,
    /// Boolean
    Bool,
    /// UTF-8 string
    Str,
    /// Reference to another feature structure (nullable)
    Ref,
}

impl ValueKind {
    /// Kind name for error messages
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Str => "str",
            ValueKind::Ref => "ref",
        }
    }
}

#[derive(Debug, Clone)]
struct TypeDecl {
    name: String,
    parent: Option<TypeId>,
}

#[derive(Debug, Clone)]
struct FeatureDecl {
    name: String,
    owner: TypeId,
    kind: ValueKind,
}

/// Mutable type-system under construction.
///
/// Seeds `Top` and `Annotation` (`begin`/`end` int features). Declaration
/// order is semantic: it fixes slot layout and the default precedence.
#[derive(Debug, Clone)]
pub struct TypeSystemBuilder {
    types: Vec<TypeDecl>,
    features: Vec<FeatureDecl>,
    by_name: HashMap<String, TypeId>,
    precedence: Option<Vec<TypeId>>,
}

impl Default for TypeSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSystemBuilder {
    /// Creates a builder seeded with the built-in `Top` and `Annotation` types.
    pub fn new() -> Self {
        let top = TypeId(0);
        let ann = TypeId(1);
        let mut by_name = HashMap::new();
        by_name.insert("Top".to_string(), top);
        by_name.insert("Annotation".to_string(), ann);
        Self {
            types: vec![
                TypeDecl {
                    name: "Top".to_string(),
                    parent: None,
                },
                TypeDecl {
                    name: "Annotation".to_string(),
                    parent: Some(top),
                },
            ],
            features: vec![
                FeatureDecl {
                    name: "begin".to_string(),
                    owner: ann,
                    kind: ValueKind::Int,
                },
                FeatureDecl {
                    name: "end".to_string(),
                    owner: ann,
                    kind: ValueKind::Int,
                },
            ],
            by_name,
            precedence: None,
        }
    }

    /// Declares a type under the given parent.
    pub fn add_type(&mut self, name: &str, parent: TypeId) -> TypeSystemResult<TypeId> {
        if self.by_name.contains_key(name) {
            return Err(TypeSystemError::DuplicateType(name.to_string()));
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDecl {
            name: name.to_string(),
            parent: Some(parent),
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Declares a feature on the owning type. Subtypes inherit it.
    pub fn add_feature(
        &mut self,
        owner: TypeId,
        name: &str,
        kind: ValueKind,
    ) -> TypeSystemResult<FeatureId> {
        // Reject shadowing along the ancestor chain.
        let mut cur = Some(owner);
        while let Some(t) = cur {
            if self
                .features
                .iter()
                .any(|f| f.owner == t && f.name == name)
            {
                return Err(TypeSystemError::DuplicateFeature {
                    type_name: self.types[owner.0 as usize].name.clone(),
                    feature: name.to_string(),
                });
            }
            cur = self.types[t.0 as usize].parent;
        }
        let id = FeatureId(self.features.len() as u32);
        self.features.push(FeatureDecl {
            name: name.to_string(),
            owner,
            kind,
        });
        Ok(id)
    }

    /// Sets the total type-precedence order. Must list every declared type
    /// exactly once. Without it, DFS pre-order of the committed tree serves
    /// as the precedence.
    pub fn set_precedence(&mut self, order: &[TypeId]) -> TypeSystemResult<()> {
        let mut seen = vec![false; self.types.len()];
        for t in order {
            let i = t.0 as usize;
            if i >= seen.len() || seen[i] {
                return Err(TypeSystemError::IncompletePrecedence {
                    listed: order.len(),
                    declared: self.types.len(),
                });
            }
            seen[i] = true;
        }
        if order.len() != self.types.len() {
            return Err(TypeSystemError::IncompletePrecedence {
                listed: order.len(),
                declared: self.types.len(),
            });
        }
        self.precedence = Some(order.to_vec());
        Ok(())
    }

    /// Freezes the builder into an immutable, queryable type system.
    pub fn commit(self) -> TypeSystem {
        let n = self.types.len();

        // Child lists in declaration order, then DFS from the root.
        let mut children: Vec<Vec<TypeId>> = vec![Vec::new(); n];
        for (i, decl) in self.types.iter().enumerate() {
            if let Some(p) = decl.parent {
                children[p.0 as usize].push(TypeId(i as u32));
            }
        }

        let mut enter = vec![0u32; n];
        let mut exit = vec![0u32; n];
        let mut dfs_order: Vec<TypeId> = Vec::with_capacity(n);
        let mut clock = 0u32;
        // Iterative DFS with an explicit post-visit marker.
        let mut stack: Vec<(TypeId, bool)> = vec![(TypeId(0), false)];
        while let Some((t, done)) = stack.pop() {
            let i = t.0 as usize;
            if done {
                exit[i] = clock;
                continue;
            }
            enter[i] = clock;
            clock += 1;
            dfs_order.push(t);
            stack.push((t, true));
            for &c in children[i].iter().rev() {
                stack.push((c, false));
            }
        }

        // Precedence rank: explicit order, else DFS pre-order.
        let mut rank = vec![0u32; n];
        match &self.precedence {
            Some(order) => {
                for (r, t) in order.iter().enumerate() {
                    rank[t.0 as usize] = r as u32;
                }
            }
            None => {
                for (r, t) in dfs_order.iter().enumerate() {
                    rank[t.0 as usize] = r as u32;
                }
            }
        }

        // Slot layout: inherited features first (ancestor declaration order),
        // then own features, fixed per type at commit.
        let mut slots_per_type: Vec<Vec<FeatureId>> = vec![Vec::new(); n];
        for &t in &dfs_order {
            let i = t.0 as usize;
            let mut slots = match self.types[i].parent {
                Some(p) => slots_per_type[p.0 as usize].clone(),
                None => Vec::new(),
            };
            for (fi, f) in self.features.iter().enumerate() {
                if f.owner == t {
                    slots.push(FeatureId(fi as u32));
                }
            }
            slots_per_type[i] = slots;
        }

        let mut slot_of: Vec<HashMap<FeatureId, usize>> = Vec::with_capacity(n);
        for slots in &slots_per_type {
            slot_of.push(
                slots
                    .iter()
                    .enumerate()
                    .map(|(s, &f)| (f, s))
                    .collect(),
            );
        }

        let types = self
            .types
            .iter()
            .enumerate()
            .map(|(i, decl)| TypeInfo {
                name: decl.name.clone(),
                parent: decl.parent,
                enter: enter[i],
                exit: exit[i],
                rank: rank[i],
                slots: slots_per_type[i].clone(),
                slot_of: slot_of[i].clone(),
            })
            .collect();

        let features = self
            .features
            .iter()
            .map(|f| FeatureInfo {
                name: f.name.clone(),
                owner: f.owner,
                kind: f.kind,
            })
            .collect();

        TypeSystem {
            types,
            features,
            by_name: self.by_name,
            dfs_order,
            has_explicit_precedence: self.precedence.is_some(),
        }
    }
}

#[derive(Debug)]
struct TypeInfo {
    name: String,
    parent: Option<TypeId>,
    enter: u32,
    exit: u32,
    rank: u32,
    slots: Vec<FeatureId>,
    slot_of: HashMap<FeatureId, usize>,
}

#[derive(Debug)]
struct FeatureInfo {
    name: String,
    owner: TypeId,
    kind: ValueKind,
}

/// Committed, immutable type system.
#[derive(Debug)]
pub struct TypeSystem {
    types: Vec<TypeInfo>,
    features: Vec<FeatureInfo>,
    by_name: HashMap<String, TypeId>,
    dfs_order: Vec<TypeId>,
    has_explicit_precedence: bool,
}

impl TypeSystem {
    /// The built-in root type.
    pub const TOP: TypeId = TypeId(0);
    /// The built-in span-bearing type.
    pub const ANNOTATION: TypeId = TypeId(1);
    /// The built-in `begin` feature of `Annotation`.
    pub const BEGIN: FeatureId = FeatureId(0);
    /// The built-in `end` feature of `Annotation`.
    pub const END: FeatureId = FeatureId(1);

    /// Number of declared types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Type name.
    pub fn type_name(&self, t: TypeId) -> &str {
        &self.types[t.0 as usize].name
    }

    /// Direct supertype, `None` for the root.
    pub fn parent(&self, t: TypeId) -> Option<TypeId> {
        self.types[t.0 as usize].parent
    }

    /// Lookup a type by name.
    pub fn type_by_name(&self, name: &str) -> TypeSystemResult<TypeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| TypeSystemError::UnknownType(name.to_string()))
    }

    /// True iff `ancestor` subsumes `t` (including `ancestor == t`).
    pub fn subsumes(&self, ancestor: TypeId, t: TypeId) -> bool {
        let a = &self.types[ancestor.0 as usize];
        let e = self.types[t.0 as usize].enter;
        a.enter <= e && e < a.exit
    }

    /// Precedence rank of a type; lower ranks sort first. DFS pre-order when
    /// no explicit precedence was set.
    pub fn precedence_rank(&self, t: TypeId) -> u32 {
        self.types[t.0 as usize].rank
    }

    /// Whether an explicit precedence order was committed.
    pub fn has_explicit_precedence(&self) -> bool {
        self.has_explicit_precedence
    }

    /// Types of the subtree rooted at `t`, in DFS pre-order.
    pub fn subtypes_including(&self, t: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        let info = &self.types[t.0 as usize];
        let (enter, exit) = (info.enter as usize, info.exit as usize);
        self.dfs_order[enter..exit].iter().copied()
    }

    /// Feature slots of a type, inherited first.
    pub fn slots(&self, t: TypeId) -> &[FeatureId] {
        &self.types[t.0 as usize].slots
    }

    /// Slot offset of a feature on a type, if the type carries it.
    pub fn slot_of(&self, t: TypeId, f: FeatureId) -> Option<usize> {
        self.types[t.0 as usize].slot_of.get(&f).copied()
    }

    /// Feature name.
    pub fn feature_name(&self, f: FeatureId) -> &str {
        &self.features[f.0 as usize].name
    }

    /// Declaring type of a feature.
    pub fn feature_owner(&self, f: FeatureId) -> TypeId {
        self.features[f.0 as usize].owner
    }

    /// Value kind of a feature.
    pub fn feature_kind(&self, f: FeatureId) -> ValueKind {
        self.features[f.0 as usize].kind
    }

    /// Lookup a feature by name on a type, searching the ancestor chain.
    pub fn feature_by_name(&self, t: TypeId, name: &str) -> TypeSystemResult<FeatureId> {
        for &f in self.slots(t) {
            if self.feature_name(f) == name {
                return Ok(f);
            }
        }
        Err(TypeSystemError::UnknownFeature {
            type_name: self.type_name(t).to_string(),
            feature: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed() -> (TypeSystem, TypeId, TypeId, TypeId) {
        let mut b = TypeSystemBuilder::new();
        let token = b.add_type("Token", TypeSystem::ANNOTATION).unwrap();
        let word = b.add_type("Word", token).unwrap();
        let sep = b.add_type("Separator", token).unwrap();
        (b.commit(), token, word, sep)
    }

    #[test]
    fn test_builtins_present() {
        let ts = TypeSystemBuilder::new().commit();
        assert_eq!(ts.type_name(TypeSystem::TOP), "Top");
        assert_eq!(ts.type_name(TypeSystem::ANNOTATION), "Annotation");
        assert_eq!(ts.feature_name(TypeSystem::BEGIN), "begin");
        assert_eq!(ts.feature_name(TypeSystem::END), "end");
        assert_eq!(ts.feature_kind(TypeSystem::BEGIN), ValueKind::Int);
    }

    #[test]
    fn test_subsumption() {
        let (ts, token, word, sep) = committed();
        assert!(ts.subsumes(TypeSystem::TOP, word));
        assert!(ts.subsumes(TypeSystem::ANNOTATION, token));
        assert!(ts.subsumes(token, word));
        assert!(ts.subsumes(token, sep));
        assert!(ts.subsumes(word, word));
        assert!(!ts.subsumes(word, sep));
        assert!(!ts.subsumes(word, token));
        assert!(!ts.subsumes(token, TypeSystem::ANNOTATION));
    }

    #[test]
    fn test_subtree_iteration_order() {
        let (ts, token, word, sep) = committed();
        let subtree: Vec<_> = ts.subtypes_including(token).collect();
        assert_eq!(subtree, vec![token, word, sep]);
    }

    #[test]
    fn test_inherited_slots() {
        let (ts, token, word, _) = committed();
        // begin/end inherited from Annotation
        assert_eq!(ts.slot_of(token, TypeSystem::BEGIN), Some(0));
        assert_eq!(ts.slot_of(word, TypeSystem::END), Some(1));
        assert_eq!(ts.slot_of(TypeSystem::TOP, TypeSystem::BEGIN), None);
    }

    #[test]
    fn test_feature_shadowing_rejected() {
        let mut b = TypeSystemBuilder::new();
        let token = b.add_type("Token", TypeSystem::ANNOTATION).unwrap();
        let err = b.add_feature(token, "begin", ValueKind::Int).unwrap_err();
        assert!(matches!(err, TypeSystemError::DuplicateFeature { .. }));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut b = TypeSystemBuilder::new();
        b.add_type("Token", TypeSystem::ANNOTATION).unwrap();
        let err = b.add_type("Token", TypeSystem::TOP).unwrap_err();
        assert!(matches!(err, TypeSystemError::DuplicateType(_)));
    }

    #[test]
    fn test_default_precedence_is_dfs_order() {
        let (ts, token, word, sep) = committed();
        assert!(!ts.has_explicit_precedence());
        assert!(ts.precedence_rank(TypeSystem::TOP) < ts.precedence_rank(token));
        assert!(ts.precedence_rank(token) < ts.precedence_rank(word));
        assert!(ts.precedence_rank(word) < ts.precedence_rank(sep));
    }

    #[test]
    fn test_explicit_precedence() {
        let mut b = TypeSystemBuilder::new();
        let token = b.add_type("Token", TypeSystem::ANNOTATION).unwrap();
        let word = b.add_type("Word", token).unwrap();
        // Reverse of declaration order
        let order = vec![word, token, TypeSystem::ANNOTATION, TypeSystem::TOP];
        b.set_precedence(&order).unwrap();
        let ts = b.commit();
        assert!(ts.has_explicit_precedence());
        assert!(ts.precedence_rank(word) < ts.precedence_rank(token));
        assert!(ts.precedence_rank(token) < ts.precedence_rank(TypeSystem::TOP));
    }

    #[test]
    fn test_incomplete_precedence_rejected() {
        let mut b = TypeSystemBuilder::new();
        let token = b.add_type("Token", TypeSystem::ANNOTATION).unwrap();
        let err = b.set_precedence(&[token]).unwrap_err();
        assert!(matches!(err, TypeSystemError::IncompletePrecedence { .. }));
    }

    #[test]
    fn test_feature_by_name_searches_ancestors() {
        let (ts, _, word, _) = committed();
        let f = ts.feature_by_name(word, "begin").unwrap();
        assert_eq!(f, TypeSystem::BEGIN);
        assert!(ts.feature_by_name(TypeSystem::TOP, "begin").is_err());
    }
}
