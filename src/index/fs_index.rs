//! One named index over feature structures.
//!
//! A single backing `Vec<FsId>` holds the members: in full total order
//! (keys, optional type precedence, creation id) for Sorted and Set
//! indexes, in insertion order for Bag indexes. A generation counter is
//! bumped on every structural change and read by live cursors.
//!
//! # Invariants
//!
//! - Every member's type is subsumed by the index top type
//! - Sorted: all inserts retained, key-duplicates ordered by creation id
//! - Set: at most one member per (key, exact type) class, first wins
//! - Bag: append-only order, identity equality, never rejects

use std::cmp::Ordering;

use crate::arena::{FsArena, FsId};
use crate::comparator::{FsComparator, SortKey, TieBreak};
use crate::types::{TypeId, TypeSystem};

use super::cursor::FsCursor;
use super::errors::{IndexError, IndexResult};

/// Indexing strategy of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStrategy {
    /// Ordered, retains all inserts
    Sorted,
    /// Ordered, one member per (key, exact type) class
    Set,
    /// Unordered, identity equality
    Bag,
    /// Auto-created bag for otherwise unindexed types
    DefaultBag,
}

impl IndexStrategy {
    /// Strategy name for logs and errors
    pub fn name(self) -> &'static str {
        match self {
            IndexStrategy::Sorted => "sorted",
            IndexStrategy::Set => "set",
            IndexStrategy::Bag => "bag",
            IndexStrategy::DefaultBag => "default-bag",
        }
    }

    /// Whether members are kept in comparator order
    pub fn is_ordered(self) -> bool {
        matches!(self, IndexStrategy::Sorted | IndexStrategy::Set)
    }
}

/// Definition of one index: what the repository registers.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    /// Registration label, unique per repository
    pub label: String,
    /// Top type; the index covers it and all subtypes
    pub top_type: TypeId,
    /// Indexing strategy
    pub strategy: IndexStrategy,
    /// Ordered key list (empty for bags)
    pub keys: Vec<SortKey>,
    /// Whether type precedence participates in the order
    pub use_type_order: bool,
}

/// One named, typed index.
#[derive(Debug)]
pub struct FsIndex {
    label: String,
    top_type: TypeId,
    strategy: IndexStrategy,
    /// Full order: keys, optional type precedence, creation id.
    order_cmp: FsComparator,
    /// Key equality: same keys, no id tie-break.
    key_cmp: FsComparator,
    elems: Vec<FsId>,
    generation: u64,
}

impl FsIndex {
    pub(crate) fn from_spec(ts: &TypeSystem, spec: IndexSpec) -> IndexResult<FsIndex> {
        if !spec.strategy.is_ordered() && !spec.keys.is_empty() {
            return Err(IndexError::IllegalArgument(format!(
                "{} index '{}' cannot carry keys",
                spec.strategy.name(),
                spec.label
            )));
        }
        let key_cmp = FsComparator::new(
            spec.keys.clone(),
            TieBreak {
                use_id: false,
                use_type_order: spec.use_type_order,
            },
        );
        // The top type must be able to supply every key feature; members are
        // subsumed by it, so per-member checks reduce to this one.
        key_cmp.validate_type(ts, spec.top_type)?;
        let order_cmp = key_cmp.with_tie_break(TieBreak {
            use_id: true,
            use_type_order: spec.use_type_order,
        });
        Ok(FsIndex {
            label: spec.label,
            top_type: spec.top_type,
            strategy: spec.strategy,
            order_cmp,
            key_cmp,
            elems: Vec::new(),
            generation: 0,
        })
    }

    /// Registration label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Top type covered by this index.
    pub fn top_type(&self) -> TypeId {
        self.top_type
    }

    /// Indexing strategy.
    pub fn strategy(&self) -> IndexStrategy {
        self.strategy
    }

    /// Number of members (unfiltered).
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// True when the index holds nothing.
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Structural-change generation. Live cursors stamp this at creation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The definition this index was registered from.
    pub fn spec(&self) -> IndexSpec {
        IndexSpec {
            label: self.label.clone(),
            top_type: self.top_type,
            strategy: self.strategy,
            keys: self.key_cmp.keys().to_vec(),
            use_type_order: self.key_cmp.tie_break().use_type_order,
        }
    }

    /// The full-order comparator (keys, optional precedence, id).
    pub fn order_comparator(&self) -> &FsComparator {
        &self.order_cmp
    }

    /// The key-equality comparator (no id tie-break).
    pub fn key_comparator(&self) -> &FsComparator {
        &self.key_cmp
    }

    /// Backing member slice, in index order.
    pub(crate) fn elems(&self) -> &[FsId] {
        &self.elems
    }

    /// First position whose member is `>=` the probe under `cmp`.
    pub(crate) fn lower_bound(
        &self,
        ts: &TypeSystem,
        arena: &FsArena,
        probe: FsId,
        cmp: &FsComparator,
    ) -> IndexResult<usize> {
        let mut lo = 0usize;
        let mut hi = self.elems.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match cmp.compare(ts, arena, self.elems[mid], probe)? {
                Ordering::Less => lo = mid + 1,
                _ => hi = mid,
            }
        }
        Ok(lo)
    }

    /// Classic binary search: returns the position of SOME member comparing
    /// equal to the probe under `cmp` (the midpoint hit, not the leftmost).
    fn probe_any(
        &self,
        ts: &TypeSystem,
        arena: &FsArena,
        probe: FsId,
        cmp: &FsComparator,
    ) -> IndexResult<Option<usize>> {
        let mut lo = 0usize;
        let mut hi = self.elems.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match cmp.compare(ts, arena, self.elems[mid], probe)? {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Some(mid)),
            }
        }
        Ok(None)
    }

    /// Inserts a member. Returns whether the index changed.
    pub(crate) fn insert(
        &mut self,
        ts: &TypeSystem,
        arena: &FsArena,
        id: FsId,
    ) -> IndexResult<bool> {
        let changed = match self.strategy {
            IndexStrategy::Bag | IndexStrategy::DefaultBag => {
                self.elems.push(id);
                true
            }
            IndexStrategy::Sorted => {
                let pos = self.lower_bound(ts, arena, id, &self.order_cmp)?;
                if self.elems.get(pos) == Some(&id) {
                    false // already indexed; identity re-add is a no-op
                } else {
                    self.elems.insert(pos, id);
                    true
                }
            }
            IndexStrategy::Set => {
                let lo = self.lower_bound(ts, arena, id, &self.key_cmp)?;
                let t = arena
                    .type_of(id)
                    .map_err(|e| IndexError::IllegalArgument(e.to_string()))?;
                let mut i = lo;
                while i < self.elems.len()
                    && self.key_cmp.compare(ts, arena, self.elems[i], id)? == Ordering::Equal
                {
                    let member_t = arena
                        .type_of(self.elems[i])
                        .map_err(|e| IndexError::IllegalArgument(e.to_string()))?;
                    if member_t == t {
                        return Ok(false); // first inserted wins
                    }
                    i += 1;
                }
                let pos = self.lower_bound(ts, arena, id, &self.order_cmp)?;
                self.elems.insert(pos, id);
                true
            }
        };
        if changed {
            self.generation += 1;
        }
        Ok(changed)
    }

    /// Removes a member by identity. Absence is not an error.
    pub(crate) fn remove(
        &mut self,
        ts: &TypeSystem,
        arena: &FsArena,
        id: FsId,
    ) -> IndexResult<bool> {
        let pos = if self.strategy.is_ordered() {
            // Fast path: the member is where its current keys say it is.
            // A structure whose keys were mutated while indexed is off
            // position; fall back to an identity scan so removal still
            // honors the remove/re-add contract.
            let probe = self.lower_bound(ts, arena, id, &self.order_cmp)?;
            if self.elems.get(probe) == Some(&id) {
                Some(probe)
            } else {
                self.elems.iter().position(|&e| e == id)
            }
        } else {
            self.elems.iter().position(|&e| e == id)
        };
        match pos {
            Some(p) => {
                self.elems.remove(p);
                self.generation += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn clear(&mut self) {
        if !self.elems.is_empty() {
            self.elems.clear();
            self.generation += 1;
        }
    }

    /// Retains only members failing `drop`; bumps the generation when
    /// anything was removed. Used for bulk subtree removals.
    pub(crate) fn retain_not(&mut self, mut drop: impl FnMut(FsId) -> bool) -> usize {
        let before = self.elems.len();
        self.elems.retain(|&e| !drop(e));
        let removed = before - self.elems.len();
        if removed > 0 {
            self.generation += 1;
        }
        removed
    }
}

/// A borrowed, possibly narrowed view of one index: the query surface.
///
/// Carries the type filter for `sub_index` narrowing and the
/// snapshot-cursor toggle. Copyable; creating one is free.
#[derive(Debug, Clone, Copy)]
pub struct FsIndexView<'a> {
    pub(crate) index: &'a FsIndex,
    pub(crate) ts: &'a TypeSystem,
    pub(crate) arena: &'a FsArena,
    pub(crate) top_type: TypeId,
    pub(crate) snapshot_cursors: bool,
}

impl<'a> FsIndexView<'a> {
    pub(crate) fn new(index: &'a FsIndex, ts: &'a TypeSystem, arena: &'a FsArena) -> Self {
        Self {
            index,
            ts,
            arena,
            top_type: index.top_type(),
            snapshot_cursors: false,
        }
    }

    /// The underlying index.
    pub fn index(&self) -> &'a FsIndex {
        self.index
    }

    /// The type system this view resolves against.
    pub(crate) fn ts_ref(&self) -> &'a TypeSystem {
        self.ts
    }

    /// The arena this view resolves against.
    pub(crate) fn arena_ref(&self) -> &'a FsArena {
        self.arena
    }

    /// Effective top type (the index's own, or the narrowed one).
    pub fn top_type(&self) -> TypeId {
        self.top_type
    }

    /// Indexing strategy.
    pub fn strategy(&self) -> IndexStrategy {
        self.index.strategy()
    }

    /// True when this view filters to a proper subtype of the index top.
    pub fn is_narrowed(&self) -> bool {
        self.top_type != self.index.top_type()
    }

    pub(crate) fn admits(&self, id: FsId) -> bool {
        match self.arena.type_of(id) {
            Ok(t) => self.ts.subsumes(self.top_type, t),
            Err(_) => false,
        }
    }

    /// Same backing store, narrowed to a subtype of the current top.
    pub fn sub_index(&self, t: TypeId) -> IndexResult<FsIndexView<'a>> {
        if !self.ts.subsumes(self.top_type, t) {
            return Err(IndexError::IllegalArgument(format!(
                "type {:?} is not subsumed by the index top {:?}",
                t, self.top_type
            )));
        }
        Ok(FsIndexView {
            top_type: t,
            ..*self
        })
    }

    /// Same view, but cursors freeze the index state at creation.
    pub fn with_snapshot_cursors(&self) -> FsIndexView<'a> {
        FsIndexView {
            snapshot_cursors: true,
            ..*self
        }
    }

    /// Number of members visible through this view.
    pub fn len(&self) -> usize {
        if self.is_narrowed() {
            self.index
                .elems()
                .iter()
                .filter(|&&e| self.admits(e))
                .count()
        } else {
            self.index.len()
        }
    }

    /// True when no member is visible.
    pub fn is_empty(&self) -> bool {
        if self.is_narrowed() {
            !self.index.elems().iter().any(|&e| self.admits(e))
        } else {
            self.index.is_empty()
        }
    }

    /// Comparator equality for Sorted/Set, identity for Bag.
    pub fn contains(&self, template: FsId) -> IndexResult<bool> {
        Ok(self.find(template)?.is_some())
    }

    /// An arbitrary member equal to the template (the binary-search hit),
    /// or `None`. Cursor positioning, by contrast, lands on the leftmost
    /// equal member; the asymmetry is intentional.
    pub fn find(&self, template: FsId) -> IndexResult<Option<FsId>> {
        if !self.arena.contains(template) {
            return Err(IndexError::IllegalArgument(format!(
                "unknown feature structure id {}",
                template.raw()
            )));
        }
        if !self.index.strategy().is_ordered() {
            // Identity-only equality for bags.
            let found = self
                .index
                .elems()
                .iter()
                .any(|&e| e == template && self.admits(e));
            return Ok(found.then_some(template));
        }
        match self
            .index
            .probe_any(self.ts, self.arena, template, self.index.key_comparator())?
        {
            None => Ok(None),
            Some(hit) => {
                if self.admits(self.index.elems()[hit]) {
                    return Ok(Some(self.index.elems()[hit]));
                }
                // The hit is filtered out; scan the equal run for a visible
                // member.
                let key_cmp = self.index.key_comparator();
                let elems = self.index.elems();
                let mut i = hit;
                while i > 0 {
                    let e = elems[i - 1];
                    if key_cmp.compare(self.ts, self.arena, e, template)? != Ordering::Equal {
                        break;
                    }
                    if self.admits(e) {
                        return Ok(Some(e));
                    }
                    i -= 1;
                }
                let mut j = hit + 1;
                while j < elems.len() {
                    let e = elems[j];
                    if key_cmp.compare(self.ts, self.arena, e, template)? != Ordering::Equal {
                        break;
                    }
                    if self.admits(e) {
                        return Ok(Some(e));
                    }
                    j += 1;
                }
                Ok(None)
            }
        }
    }

    /// Compares two structures under the index's key comparator.
    pub fn compare(&self, a: FsId, b: FsId) -> IndexResult<Ordering> {
        Ok(self
            .index
            .key_comparator()
            .compare(self.ts, self.arena, a, b)?)
    }

    /// A cursor positioned at the first visible element (snapshot-backed
    /// when this view was obtained via `with_snapshot_cursors`).
    pub fn cursor(&self) -> FsCursor {
        FsCursor::at_first(self)
    }

    /// A cursor positioned per template insertion-point semantics.
    pub fn cursor_at(&self, template: FsId) -> IndexResult<FsCursor> {
        let mut c = FsCursor::at_first(self);
        c.move_to(self, template)?;
        Ok(c)
    }

    /// Forward-only iterator over visible members, for simple consumers.
    pub fn iter(&self) -> super::cursor::CursorIter<'a> {
        super::cursor::CursorIter::new(*self)
    }

    /// Visible members as a vector, in index order.
    pub fn to_vec(&self) -> Vec<FsId> {
        self.index
            .elems()
            .iter()
            .copied()
            .filter(|&e| !self.is_narrowed() || self.admits(e))
            .collect()
    }
}
