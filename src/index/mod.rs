//! Index subsystem for annodex
//!
//! Named, typed views over feature structures with deterministic iteration.
//!
//! # Design Principles
//!
//! - One backing store per index; strategy (sorted/set/bag) decides the
//!   insert discipline, never the storage shape
//! - Total order everywhere an order exists: the creation-id tie-break
//!   makes repeated and mirrored walks reproducible
//! - Cursors are explicit state machines; live ones carry a generation
//!   stamp, snapshot ones a private frozen copy
//!
//! # Invariants
//!
//! - Every member's type is subsumed by its index's top type
//! - Structural changes bump the index generation exactly when membership
//!   or order changed
//! - Forward iteration reversed equals backward iteration for any fixed
//!   ordered-index state

mod cursor;
mod errors;
mod fs_index;
mod repository;

pub use cursor::{CursorIter, FsCursor};
pub use errors::{IndexError, IndexResult};
pub use fs_index::{FsIndex, FsIndexView, IndexSpec, IndexStrategy};
pub use repository::{AllIndexedFs, IndexRepository};
