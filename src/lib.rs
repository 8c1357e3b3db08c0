//! annodex - deterministic in-memory indexing and iteration engine for
//! typed annotation records
//!
//! Named sorted/set/bag views over feature structures, positioned cursors
//! with snapshot isolation, and a positional query algebra for span data.

pub mod arena;
pub mod cas;
pub mod comparator;
pub mod config;
pub mod index;
pub mod select;
pub mod types;

pub use arena::{FsArena, FsId};
pub use cas::{Cas, ViewId};
pub use comparator::{FsComparator, SortDirection, SortKey, TieBreak};
pub use index::{FsCursor, FsIndexView, IndexRepository, IndexSpec, IndexStrategy};
pub use select::{Select, SelectConfig, Span};
pub use types::{FeatureId, TypeId, TypeSystem, TypeSystemBuilder, ValueKind};
