//! CAS view boundary for annodex
//!
//! A `Cas` owns the feature-structure arena and one index repository per
//! view. Structures are created once and shared; each view decides
//! independently which of them it indexes. Index definitions are CAS-wide:
//! registering one installs it into every existing view, and new views
//! inherit all definitions.
//!
//! # Invariants
//!
//! - All views share one arena and one committed type system
//! - Resetting a view clears its indexes; the structures themselves stay
//!   in the arena
//! - View names are unique; the base view exists from construction

mod errors;

pub use errors::{CasError, CasResult};

use std::sync::Arc;

use tracing::debug;

use crate::arena::{FsArena, FsId};
use crate::index::{FsIndexView, IndexRepository, IndexSpec};
use crate::select::Select;
use crate::types::{TypeId, TypeSystem};

/// Dense handle for one view of a CAS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub(crate) usize);

/// One view: a name and its index repository.
#[derive(Debug)]
struct CasView {
    name: String,
    repo: IndexRepository,
}

/// The analysis store: type system, arena, views.
#[derive(Debug)]
pub struct Cas {
    ts: Arc<TypeSystem>,
    arena: FsArena,
    views: Vec<CasView>,
    index_defs: Vec<IndexSpec>,
}

impl Cas {
    /// Name of the view every CAS starts with.
    pub const BASE_VIEW: &'static str = "_InitialView";

    /// Creates a CAS with the base view.
    pub fn new(ts: Arc<TypeSystem>) -> Cas {
        Cas {
            arena: FsArena::new(ts.clone()),
            ts,
            views: vec![CasView {
                name: Self::BASE_VIEW.to_string(),
                repo: IndexRepository::new(),
            }],
            index_defs: Vec::new(),
        }
    }

    /// The committed type system.
    pub fn type_system(&self) -> &TypeSystem {
        &self.ts
    }

    /// The shared arena.
    pub fn arena(&self) -> &FsArena {
        &self.arena
    }

    /// Mutable access to the shared arena, for structure creation and slot
    /// mutation. Mutating key features of an indexed structure corrupts its
    /// position; remove it first, re-add after.
    pub fn arena_mut(&mut self) -> &mut FsArena {
        &mut self.arena
    }

    /// The base view's id.
    pub fn base_view(&self) -> ViewId {
        ViewId(0)
    }

    /// Number of views.
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Ids of every view, in creation order.
    pub fn view_ids(&self) -> impl Iterator<Item = ViewId> {
        (0..self.views.len()).map(ViewId)
    }

    /// Name of a view.
    pub fn view_name(&self, v: ViewId) -> &str {
        &self.views[v.0].name
    }

    /// Lookup a view by name.
    pub fn view_by_name(&self, name: &str) -> CasResult<ViewId> {
        self.views
            .iter()
            .position(|v| v.name == name)
            .map(ViewId)
            .ok_or_else(|| CasError::UnknownView(name.to_string()))
    }

    /// Creates a view and installs every CAS-wide index definition into it.
    pub fn create_view(&mut self, name: &str) -> CasResult<ViewId> {
        if self.views.iter().any(|v| v.name == name) {
            return Err(CasError::DuplicateView(name.to_string()));
        }
        let mut repo = IndexRepository::new();
        for spec in &self.index_defs {
            repo.register(&self.ts, spec.clone())?;
        }
        let id = ViewId(self.views.len());
        self.views.push(CasView {
            name: name.to_string(),
            repo,
        });
        debug!(view = name, "created view");
        Ok(id)
    }

    /// Registers an index definition CAS-wide: into every existing view,
    /// and remembered for views created later.
    pub fn register_index(&mut self, spec: IndexSpec) -> CasResult<()> {
        for view in &mut self.views {
            view.repo.register(&self.ts, spec.clone())?;
        }
        self.index_defs.push(spec);
        Ok(())
    }

    /// Borrow a view's repository.
    pub fn repository(&self, v: ViewId) -> &IndexRepository {
        &self.views[v.0].repo
    }

    /// Creates a structure of the given type (not yet indexed anywhere).
    pub fn create(&mut self, t: TypeId) -> FsId {
        self.arena.create(t)
    }

    /// Creates an annotation-typed structure with the given span.
    pub fn create_annotation(&mut self, t: TypeId, begin: i64, end: i64) -> CasResult<FsId> {
        Ok(self.arena.create_annotation(t, begin, end)?)
    }

    /// Adds a structure to a view's indexes.
    pub fn add_fs(&mut self, v: ViewId, id: FsId) -> CasResult<()> {
        let Cas {
            ts, arena, views, ..
        } = self;
        views[v.0].repo.add_fs(ts, arena, id)?;
        Ok(())
    }

    /// Removes a structure from a view's indexes.
    pub fn remove_fs(&mut self, v: ViewId, id: FsId) -> CasResult<()> {
        let Cas {
            ts, arena, views, ..
        } = self;
        views[v.0].repo.remove_fs(ts, arena, id)?;
        Ok(())
    }

    /// Removes all indexed structures of `t` and its subtypes from a view.
    pub fn remove_all_including_subtypes(&mut self, v: ViewId, t: TypeId) -> CasResult<()> {
        let Cas {
            ts, arena, views, ..
        } = self;
        views[v.0].repo.remove_all_including_subtypes(ts, arena, t)?;
        Ok(())
    }

    /// Removes all indexed structures of exactly `t` from a view.
    pub fn remove_all_excluding_subtypes(&mut self, v: ViewId, t: TypeId) -> CasResult<()> {
        let Cas {
            ts, arena, views, ..
        } = self;
        views[v.0].repo.remove_all_excluding_subtypes(ts, arena, t)?;
        Ok(())
    }

    /// Lazy, duplicate-free sequence over every structure of `t` and its
    /// subtypes indexed in the view.
    pub fn all_indexed_fs(&self, v: ViewId, t: TypeId) -> crate::index::AllIndexedFs<'_> {
        self.views[v.0]
            .repo
            .all_indexed_fs(&self.ts, &self.arena, t)
    }

    /// Query view of a named index in a view.
    pub fn index(&self, v: ViewId, label: &str) -> CasResult<FsIndexView<'_>> {
        Ok(self.views[v.0]
            .repo
            .view_of(&self.ts, &self.arena, label)?)
    }

    /// Starts a selection over a named index. Resolution happens at the
    /// terminal operation, so the builder itself never fails.
    pub fn select(&self, v: ViewId, label: &str) -> Select<'_> {
        Select::labeled(self, v, label.to_string())
    }

    /// Clears a view's indexes. Definitions stay; structures stay in the
    /// arena.
    pub fn reset_view(&mut self, v: ViewId) {
        self.views[v.0].repo.reset();
    }

    /// Clears every view's indexes.
    pub fn reset(&mut self) {
        for view in &mut self.views {
            view.repo.reset();
        }
        debug!("cas reset");
    }
}
