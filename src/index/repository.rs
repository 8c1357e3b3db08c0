//! Per-view index repository.
//!
//! One repository aggregates every index configured for a view. Adding a
//! structure fans out to every index whose top type subsumes the
//! structure's type; a default bag is created lazily for types no
//! configured index covers, so "all indexed structures of type T" queries
//! always have a source.
//!
//! # Invariants
//!
//! - Labels are unique; re-registering an identical definition is a no-op
//! - Default bags hold exactly one type each and are never registered
//!   explicitly
//! - Removal is identity-based and fans out everywhere; absence is not an
//!   error

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::arena::{FsArena, FsId};
use crate::types::{TypeId, TypeSystem};

use super::errors::{IndexError, IndexResult};
use super::fs_index::{FsIndex, FsIndexView, IndexSpec, IndexStrategy};

/// All indexes of one view.
#[derive(Debug, Default)]
pub struct IndexRepository {
    indexes: Vec<FsIndex>,
    by_label: HashMap<String, usize>,
    default_bag_of: HashMap<TypeId, usize>,
}

impl IndexRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an index definition.
    ///
    /// Re-registering an identical definition is accepted and ignored; the
    /// same label with a differing definition is a conflict. The top type
    /// must be able to supply every key feature.
    pub fn register(&mut self, ts: &TypeSystem, spec: IndexSpec) -> IndexResult<()> {
        if spec.strategy == IndexStrategy::DefaultBag {
            return Err(IndexError::IllegalArgument(
                "default-bag indexes are created internally, not registered".to_string(),
            ));
        }
        if let Some(&slot) = self.by_label.get(&spec.label) {
            if self.indexes[slot].spec() == spec {
                return Ok(());
            }
            return Err(IndexError::LabelConflict(spec.label));
        }
        let label = spec.label.clone();
        let strategy = spec.strategy;
        let index = FsIndex::from_spec(ts, spec)?;
        let slot = self.indexes.len();
        self.indexes.push(index);
        self.by_label.insert(label.clone(), slot);
        debug!(label = %label, strategy = strategy.name(), "registered index");
        Ok(())
    }

    /// Registered labels, in registration order (default bags excluded).
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.indexes
            .iter()
            .filter(|i| i.strategy() != IndexStrategy::DefaultBag)
            .map(|i| i.label())
    }

    /// Borrow an index by label.
    pub fn index(&self, label: &str) -> IndexResult<&FsIndex> {
        self.by_label
            .get(label)
            .map(|&slot| &self.indexes[slot])
            .ok_or_else(|| IndexError::UnknownLabel(label.to_string()))
    }

    /// Query view of an index by label.
    pub fn view_of<'a>(
        &'a self,
        ts: &'a TypeSystem,
        arena: &'a FsArena,
        label: &str,
    ) -> IndexResult<FsIndexView<'a>> {
        Ok(FsIndexView::new(self.index(label)?, ts, arena))
    }

    fn check_handle(arena: &FsArena, id: FsId) -> IndexResult<TypeId> {
        if !arena.contains(id) {
            return Err(IndexError::IllegalArgument(format!(
                "unknown feature structure id {}",
                id.raw()
            )));
        }
        arena
            .type_of(id)
            .map_err(|e| IndexError::IllegalArgument(e.to_string()))
    }

    /// Adds a structure to every index configured for its type or a
    /// supertype, creating the default bag when nothing covers it.
    pub fn add_fs(&mut self, ts: &TypeSystem, arena: &FsArena, id: FsId) -> IndexResult<()> {
        let t = Self::check_handle(arena, id)?;
        let mut applied = false;
        for index in &mut self.indexes {
            let applies = match index.strategy() {
                // An existing default bag keeps collecting its exact type
                // even after configured indexes appear for it.
                IndexStrategy::DefaultBag => index.top_type() == t,
                _ => ts.subsumes(index.top_type(), t),
            };
            if applies {
                index.insert(ts, arena, id)?;
                applied = true;
            }
        }
        if !applied {
            let slot = self.ensure_default_bag(ts, t)?;
            self.indexes[slot].insert(ts, arena, id)?;
        }
        trace!(id = id.raw(), "indexed structure");
        Ok(())
    }

    fn ensure_default_bag(&mut self, ts: &TypeSystem, t: TypeId) -> IndexResult<usize> {
        if let Some(&slot) = self.default_bag_of.get(&t) {
            return Ok(slot);
        }
        let label = format!("_defaultBag:{}", ts.type_name(t));
        let index = FsIndex::from_spec(
            ts,
            IndexSpec {
                label: label.clone(),
                top_type: t,
                strategy: IndexStrategy::DefaultBag,
                keys: Vec::new(),
                use_type_order: false,
            },
        )?;
        let slot = self.indexes.len();
        self.indexes.push(index);
        self.by_label.insert(label.clone(), slot);
        self.default_bag_of.insert(t, slot);
        debug!(label = %label, "created default bag index");
        Ok(slot)
    }

    /// Removes a structure from every index holding it. Absence anywhere is
    /// not an error.
    pub fn remove_fs(&mut self, ts: &TypeSystem, arena: &FsArena, id: FsId) -> IndexResult<()> {
        let t = Self::check_handle(arena, id)?;
        for index in &mut self.indexes {
            let applies = match index.strategy() {
                IndexStrategy::DefaultBag => index.top_type() == t,
                _ => ts.subsumes(index.top_type(), t),
            };
            if applies {
                index.remove(ts, arena, id)?;
            }
        }
        Ok(())
    }

    /// Removes every indexed structure whose type is `t` or a subtype.
    pub fn remove_all_including_subtypes(
        &mut self,
        ts: &TypeSystem,
        arena: &FsArena,
        t: TypeId,
    ) -> IndexResult<()> {
        let mut removed = 0usize;
        for index in &mut self.indexes {
            removed += index.retain_not(|id| match arena.type_of(id) {
                Ok(elem_t) => ts.subsumes(t, elem_t),
                Err(_) => false,
            });
        }
        debug!(
            type_name = ts.type_name(t),
            removed, "bulk removal including subtypes"
        );
        Ok(())
    }

    /// Removes every indexed structure whose type is exactly `t`.
    pub fn remove_all_excluding_subtypes(
        &mut self,
        ts: &TypeSystem,
        arena: &FsArena,
        t: TypeId,
    ) -> IndexResult<()> {
        let mut removed = 0usize;
        for index in &mut self.indexes {
            removed += index.retain_not(|id| arena.type_of(id) == Ok(t));
        }
        debug!(
            type_name = ts.type_name(t),
            removed, "bulk removal excluding subtypes"
        );
        Ok(())
    }

    /// Clears every index. Definitions stay registered; default bags are
    /// dropped and will be recreated on demand.
    pub fn reset(&mut self) {
        self.indexes
            .retain(|i| i.strategy() != IndexStrategy::DefaultBag);
        // Dropping default bags shifts slots; rebuild the label map.
        self.by_label = self
            .indexes
            .iter()
            .enumerate()
            .map(|(slot, i)| (i.label().to_string(), slot))
            .collect();
        self.default_bag_of.clear();
        for index in &mut self.indexes {
            index.clear();
        }
        debug!("index repository reset");
    }

    /// Per exact type, the index that serves as the canonical member source:
    /// the default bag if present, else a configured bag, else sorted, else
    /// set. `None` when the type has no covering index at all.
    fn source_for(&self, ts: &TypeSystem, t: TypeId) -> Option<&FsIndex> {
        if let Some(&slot) = self.default_bag_of.get(&t) {
            return Some(&self.indexes[slot]);
        }
        let mut best: Option<&FsIndex> = None;
        for index in &self.indexes {
            if index.strategy() == IndexStrategy::DefaultBag
                || !ts.subsumes(index.top_type(), t)
            {
                continue;
            }
            let rank = |s: IndexStrategy| match s {
                IndexStrategy::Bag => 0,
                IndexStrategy::Sorted => 1,
                IndexStrategy::Set => 2,
                IndexStrategy::DefaultBag => 3,
            };
            match best {
                None => best = Some(index),
                Some(b) if rank(index.strategy()) < rank(b.strategy()) => best = Some(index),
                _ => {}
            }
        }
        best
    }

    /// Lazy, duplicate-free sequence over every indexed structure of `t`
    /// and its subtypes.
    pub fn all_indexed_fs<'a>(
        &'a self,
        ts: &'a TypeSystem,
        arena: &'a FsArena,
        t: TypeId,
    ) -> AllIndexedFs<'a> {
        let types: Vec<TypeId> = ts.subtypes_including(t).collect();
        AllIndexedFs {
            repo: self,
            ts,
            arena,
            types,
            type_idx: 0,
            elem_idx: 0,
        }
    }
}

/// Iterator behind [`IndexRepository::all_indexed_fs`].
///
/// Walks the subtree's exact types in DFS order; per type, yields the
/// members of that type's canonical source index that are of exactly that
/// type. Exact-type partitioning keeps the union duplicate-free.
#[derive(Debug)]
pub struct AllIndexedFs<'a> {
    repo: &'a IndexRepository,
    ts: &'a TypeSystem,
    arena: &'a FsArena,
    types: Vec<TypeId>,
    type_idx: usize,
    elem_idx: usize,
}

impl Iterator for AllIndexedFs<'_> {
    type Item = FsId;

    fn next(&mut self) -> Option<FsId> {
        loop {
            let t = *self.types.get(self.type_idx)?;
            if let Some(source) = self.repo.source_for(self.ts, t) {
                while let Some(&id) = source.elems().get(self.elem_idx) {
                    self.elem_idx += 1;
                    if self.arena.type_of(id) == Ok(t) {
                        return Some(id);
                    }
                }
            }
            self.type_idx += 1;
            self.elem_idx = 0;
        }
    }
}
