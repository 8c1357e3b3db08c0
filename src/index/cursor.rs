//! Positioned cursor over one index.
//!
//! The cursor is an explicit struct: a source (a generation stamp against
//! the live index, or a frozen snapshot of its members), a position, a
//! validity flag, and the cached current element. It borrows nothing;
//! every navigation call takes the index view as a parameter, so a cursor
//! can outlive mutations of the index and the generation diagnostic has
//! something to detect.
//!
//! # State machine
//!
//! INVALID (no current element) or VALID-AT(pos). `move_to_first/last/to`
//! always re-validate; `move_to_next/previous` step once and go INVALID
//! past either end; stepping from INVALID keeps the cursor INVALID.
//!
//! # Invariants
//!
//! - Mirror symmetry: the forward walk from first equals the reversed
//!   backward walk from last, for any fixed index state
//! - A live cursor raises `ConcurrentModification` on the first navigation
//!   after a structural change; a snapshot cursor never does

use std::cmp::Ordering;
use std::sync::Arc;

use crate::arena::FsId;
use crate::index::FsIndexView;

use super::errors::{IndexError, IndexResult};

/// What the cursor walks: the live member slice, or a private frozen copy.
#[derive(Debug, Clone)]
enum CursorSource {
    /// Walks the live index; stamped with its creation-time generation.
    Live {
        /// Generation the cursor expects the index to still be at
        expected_gen: u64,
    },
    /// Walks a frozen copy captured at creation. Filtering is applied at
    /// capture time, so the snapshot holds exactly the visible members.
    Snapshot {
        /// Frozen member list, in index order
        elems: Arc<[FsId]>,
    },
}

/// A positioned, bidirectional cursor.
#[derive(Debug, Clone)]
pub struct FsCursor {
    source: CursorSource,
    pos: usize,
    valid: bool,
    current: Option<FsId>,
}

impl FsCursor {
    /// Creates a cursor positioned at the first visible element.
    pub(crate) fn at_first(view: &FsIndexView<'_>) -> FsCursor {
        let source = if view.snapshot_cursors {
            CursorSource::Snapshot {
                elems: view.to_vec().into(),
            }
        } else {
            CursorSource::Live {
                expected_gen: view.index.generation(),
            }
        };
        let mut cursor = FsCursor {
            source,
            pos: 0,
            valid: false,
            current: None,
        };
        // A fresh cursor cannot race its own creation; positioning at first
        // can only fail on an empty view, which leaves it INVALID.
        let _ = cursor.move_to_first(view);
        cursor
    }

    /// True when positioned on an element.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether this cursor walks a frozen snapshot.
    pub fn is_snapshot(&self) -> bool {
        matches!(self.source, CursorSource::Snapshot { .. })
    }

    /// Independent cursor at the same logical position.
    pub fn copy(&self) -> FsCursor {
        self.clone()
    }

    /// Current element. `NoSuchElement` when INVALID.
    pub fn get(&self) -> IndexResult<FsId> {
        match (self.valid, self.current) {
            (true, Some(id)) => Ok(id),
            _ => Err(IndexError::NoSuchElement),
        }
    }

    /// Current element without the error path: `None` when INVALID.
    pub fn get_nvc(&self) -> Option<FsId> {
        if self.valid {
            self.current
        } else {
            None
        }
    }

    fn check_generation(&self, view: &FsIndexView<'_>) -> IndexResult<()> {
        if let CursorSource::Live { expected_gen } = self.source {
            let actual = view.index.generation();
            if actual != expected_gen {
                return Err(IndexError::ConcurrentModification {
                    expected: expected_gen,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// The element list this cursor navigates, filtered for live sources.
    fn elem_at(&self, view: &FsIndexView<'_>, pos: usize) -> Option<FsId> {
        match &self.source {
            CursorSource::Snapshot { elems } => elems.get(pos).copied(),
            CursorSource::Live { .. } => view.index.elems().get(pos).copied(),
        }
    }

    fn len(&self, view: &FsIndexView<'_>) -> usize {
        match &self.source {
            CursorSource::Snapshot { elems } => elems.len(),
            CursorSource::Live { .. } => view.index.len(),
        }
    }

    /// Whether the element at `pos` passes the view's type filter. Snapshot
    /// sources were filtered at capture.
    fn visible(&self, view: &FsIndexView<'_>, pos: usize) -> bool {
        match &self.source {
            CursorSource::Snapshot { .. } => true,
            CursorSource::Live { .. } => match self.elem_at(view, pos) {
                Some(id) => !view.is_narrowed() || view.admits(id),
                None => false,
            },
        }
    }

    fn settle(&mut self, view: &FsIndexView<'_>, pos: Option<usize>) {
        match pos {
            Some(p) => {
                self.pos = p;
                self.valid = true;
                self.current = self.elem_at(view, p);
            }
            None => {
                self.valid = false;
                self.current = None;
            }
        }
    }

    /// First visible position at or after `from`.
    fn seek_forward(&self, view: &FsIndexView<'_>, from: usize) -> Option<usize> {
        let n = self.len(view);
        (from..n).find(|&p| self.visible(view, p))
    }

    /// Last visible position at or before `from`.
    fn seek_backward(&self, view: &FsIndexView<'_>, from: usize) -> Option<usize> {
        (0..=from).rev().find(|&p| self.visible(view, p))
    }

    /// Position at the smallest element, or INVALID when empty.
    pub fn move_to_first(&mut self, view: &FsIndexView<'_>) -> IndexResult<()> {
        self.check_generation(view)?;
        let pos = self.seek_forward(view, 0);
        self.settle(view, pos);
        Ok(())
    }

    /// Position at the largest element, or INVALID when empty.
    pub fn move_to_last(&mut self, view: &FsIndexView<'_>) -> IndexResult<()> {
        self.check_generation(view)?;
        let n = self.len(view);
        let pos = if n == 0 {
            None
        } else {
            self.seek_backward(view, n - 1)
        };
        self.settle(view, pos);
        Ok(())
    }

    /// Step forward once; INVALID past the end. Stepping from INVALID
    /// leaves the cursor INVALID.
    pub fn move_to_next(&mut self, view: &FsIndexView<'_>) -> IndexResult<()> {
        self.check_generation(view)?;
        if !self.valid {
            return Ok(());
        }
        let pos = self.seek_forward(view, self.pos + 1);
        self.settle(view, pos);
        Ok(())
    }

    /// Step backward once; INVALID past the front. Stepping from INVALID
    /// leaves the cursor INVALID.
    pub fn move_to_previous(&mut self, view: &FsIndexView<'_>) -> IndexResult<()> {
        self.check_generation(view)?;
        if !self.valid {
            return Ok(());
        }
        let pos = if self.pos == 0 {
            None
        } else {
            self.seek_backward(view, self.pos - 1)
        };
        self.settle(view, pos);
        Ok(())
    }

    /// Positions per template semantics.
    ///
    /// Ordered indexes: the leftmost element key-equal to the template, or
    /// failing that the insertion point (the first element greater than the
    /// template); INVALID when the template exceeds every member. Bags:
    /// exact identity, else INVALID.
    pub fn move_to(&mut self, view: &FsIndexView<'_>, template: FsId) -> IndexResult<()> {
        self.check_generation(view)?;
        if !view.arena.contains(template) {
            return Err(IndexError::IllegalArgument(format!(
                "unknown feature structure id {}",
                template.raw()
            )));
        }

        if !view.strategy().is_ordered() {
            let n = self.len(view);
            let pos = (0..n).find(|&p| {
                self.elem_at(view, p) == Some(template) && self.visible(view, p)
            });
            self.settle(view, pos);
            return Ok(());
        }

        let key_cmp = view.index.key_comparator();
        let pos = match &self.source {
            CursorSource::Live { .. } => {
                let lo = view
                    .index
                    .lower_bound(view.ts, view.arena, template, key_cmp)?;
                self.seek_forward(view, lo)
            }
            CursorSource::Snapshot { elems } => {
                // Snapshot copies keep index order; binary search locally.
                let mut lo = 0usize;
                let mut hi = elems.len();
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    match key_cmp.compare(view.ts, view.arena, elems[mid], template)? {
                        Ordering::Less => lo = mid + 1,
                        _ => hi = mid,
                    }
                }
                if lo < elems.len() {
                    Some(lo)
                } else {
                    None
                }
            }
        };
        self.settle(view, pos);
        Ok(())
    }
}

/// Thin forward-only adaptor over a cursor, for simple consumers.
///
/// The view is held by copy, so mutation of the repository is statically
/// excluded while the iterator lives; navigation errors cannot occur and
/// the stream simply ends at the index end.
#[derive(Debug, Clone)]
pub struct CursorIter<'a> {
    view: FsIndexView<'a>,
    cursor: FsCursor,
}

impl<'a> CursorIter<'a> {
    pub(crate) fn new(view: FsIndexView<'a>) -> Self {
        let cursor = FsCursor::at_first(&view);
        Self { view, cursor }
    }
}

impl Iterator for CursorIter<'_> {
    type Item = FsId;

    fn next(&mut self) -> Option<FsId> {
        let item = self.cursor.get_nvc()?;
        if self.cursor.move_to_next(&self.view).is_err() {
            // Unreachable while the view borrow is held; terminate cleanly.
            self.cursor.valid = false;
            self.cursor.current = None;
        }
        Some(item)
    }
}
