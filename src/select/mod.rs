//! Declarative query builder over one index.
//!
//! A `Select` collects boolean configuration, an optional start position,
//! an optional positional relation, and a terminal operation, then compiles
//! them into a single walk over the index's member slice. The builder is a
//! value; configuration is copied into an immutable parameter record at
//! execution, so concurrent independent queries cannot interfere.
//!
//! # Design Principles
//!
//! - Validate shape first, walk second: span-relative operations demand a
//!   sorted annotation index and fail fast otherwise
//! - One forward walk covers every forward-order query; `preceding` and
//!   `backwards` materialize and post-process, mirroring how the backward
//!   cases are defined in terms of the forward order

mod errors;
mod span;

pub use errors::{SelectError, SelectResult};
pub use span::Span;

use std::cmp::Ordering;

use crate::arena::{FsArena, FsId};
use crate::cas::{Cas, ViewId};
use crate::comparator::{FsComparator, SortDirection, TieBreak};
use crate::index::{FsIndexView, IndexStrategy};
use crate::types::{TypeId, TypeSystem};

/// Boolean configuration of a selection, with its defaults.
#[derive(Debug, Clone, Copy)]
pub struct SelectConfig {
    /// Type precedence participates in start-position decisions
    pub type_priority: bool,
    /// Type identity participates in "same position" tests for `at`
    pub position_uses_type: bool,
    /// Skip elements overlapping a previously yielded one
    pub non_overlapping: bool,
    /// Bounded queries require the element end to stay within the bound
    pub end_within_bounds: bool,
    /// Also exclude elements sharing the anchor's (begin, end, type)
    pub skip_equals: bool,
    /// Span every view of the CAS, not just the selected one
    pub all_views: bool,
    /// Zero-result `get` returns `None` instead of erroring
    pub null_ok: bool,
    /// Natural order not needed (accepted and ignored for ordered walks)
    pub unordered: bool,
    /// Reverse the result order (ignored for non-ordered indexes)
    pub backwards: bool,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            type_priority: false,
            position_uses_type: false,
            non_overlapping: false,
            end_within_bounds: true,
            skip_equals: false,
            all_views: false,
            null_ok: false,
            unordered: false,
            backwards: false,
        }
    }
}

/// A bound or anchor: an indexed structure, or a raw span.
#[derive(Debug, Clone, Copy)]
enum Anchor {
    Fs(FsId),
    Span(Span),
}

/// Positional relation of a selection.
#[derive(Debug, Clone, Copy)]
enum Relation {
    At(Anchor),
    CoveredBy(Anchor),
    Covering(Anchor),
    Between(Anchor, Anchor),
    Following { anchor: Anchor, offset: usize },
    Preceding { anchor: Anchor, offset: usize },
}

#[derive(Debug, Clone, Copy)]
enum StartPos {
    AtFs(FsId),
    AtSpan(Span),
}

/// What the select is built over.
#[derive(Clone, Copy)]
enum Source<'a> {
    View(FsIndexView<'a>),
    Labeled { cas: &'a Cas, view: ViewId },
}

/// The query builder. Construct via [`Cas::select`] or
/// [`FsIndexView::select`], configure fluently, finish with a terminal.
pub struct Select<'a> {
    source: Source<'a>,
    label: Option<String>,
    narrow: Option<TypeId>,
    cfg: SelectConfig,
    start: Option<StartPos>,
    relation: Option<Relation>,
    shift: i64,
    limit: Option<usize>,
}

impl<'a> FsIndexView<'a> {
    /// Starts a selection over this single index view.
    pub fn select(&self) -> Select<'a> {
        Select {
            source: Source::View(*self),
            label: None,
            narrow: None,
            cfg: SelectConfig::default(),
            start: None,
            relation: None,
            shift: 0,
            limit: None,
        }
    }
}

impl<'a> Select<'a> {
    pub(crate) fn labeled(cas: &'a Cas, view: ViewId, label: String) -> Select<'a> {
        Select {
            source: Source::Labeled { cas, view },
            label: Some(label),
            narrow: None,
            cfg: SelectConfig::default(),
            start: None,
            relation: None,
            shift: 0,
            limit: None,
        }
    }

    // ----- configuration ---------------------------------------------------

    /// Replaces the whole flag record. The per-flag methods below are sugar
    /// over this.
    pub fn with_config(mut self, cfg: SelectConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// The current flag record.
    pub fn config(&self) -> SelectConfig {
        self.cfg
    }

    /// Narrows the selection to a subtype of the index top type.
    pub fn of_type(mut self, t: TypeId) -> Self {
        self.narrow = Some(t);
        self
    }

    /// Type precedence participates in start-position decisions.
    pub fn type_priority(mut self, on: bool) -> Self {
        self.cfg.type_priority = on;
        self
    }

    /// Type identity participates in "same position" tests for `at`.
    pub fn position_uses_type(mut self, on: bool) -> Self {
        self.cfg.position_uses_type = on;
        self
    }

    /// Keep a left-to-right non-overlapping chain.
    pub fn non_overlapping(mut self, on: bool) -> Self {
        self.cfg.non_overlapping = on;
        self
    }

    /// Include bounded elements whose end reaches past the bound.
    pub fn include_end_beyond_bounds(mut self, on: bool) -> Self {
        self.cfg.end_within_bounds = !on;
        self
    }

    /// Also exclude elements sharing the anchor's (begin, end, type).
    pub fn skip_equals(mut self, on: bool) -> Self {
        self.cfg.skip_equals = on;
        self
    }

    /// Span all CAS views. Only available on CAS-scoped selections.
    pub fn all_views(mut self, on: bool) -> Self {
        self.cfg.all_views = on;
        self
    }

    /// Zero-result `get` returns `None` instead of erroring.
    pub fn null_ok(mut self, on: bool) -> Self {
        self.cfg.null_ok = on;
        self
    }

    /// Declare that natural order is not needed. Accepted and ignored.
    pub fn unordered(mut self, on: bool) -> Self {
        self.cfg.unordered = on;
        self
    }

    /// Reverse the result order. Ignored for non-ordered indexes.
    pub fn backwards(mut self, on: bool) -> Self {
        self.cfg.backwards = on;
        self
    }

    /// Cap the number of results.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Shift the start position by a signed offset after positioning.
    pub fn shifted(mut self, n: i64) -> Self {
        self.shift = n;
        self
    }

    // ----- positioning -----------------------------------------------------

    /// Start at the insertion point of an existing structure.
    pub fn start_at(mut self, fs: FsId) -> Self {
        self.start = Some(StartPos::AtFs(fs));
        self
    }

    /// Start at the insertion point of a raw span.
    pub fn start_at_span(mut self, begin: i64, end: i64) -> Self {
        self.start = Some(StartPos::AtSpan(Span::new(begin, end)));
        self
    }

    /// Elements at exactly the anchor's position.
    pub fn at(mut self, fs: FsId) -> Self {
        self.relation = Some(Relation::At(Anchor::Fs(fs)));
        self
    }

    /// Elements at exactly the given span.
    pub fn at_span(mut self, begin: i64, end: i64) -> Self {
        self.relation = Some(Relation::At(Anchor::Span(Span::new(begin, end))));
        self
    }

    /// Elements inside the anchor's span.
    pub fn covered_by(mut self, fs: FsId) -> Self {
        self.relation = Some(Relation::CoveredBy(Anchor::Fs(fs)));
        self
    }

    /// Elements inside the given span.
    pub fn covered_by_span(mut self, begin: i64, end: i64) -> Self {
        self.relation = Some(Relation::CoveredBy(Anchor::Span(Span::new(begin, end))));
        self
    }

    /// Elements containing the anchor's span.
    pub fn covering(mut self, fs: FsId) -> Self {
        self.relation = Some(Relation::Covering(Anchor::Fs(fs)));
        self
    }

    /// Elements containing the given span.
    pub fn covering_span(mut self, begin: i64, end: i64) -> Self {
        self.relation = Some(Relation::Covering(Anchor::Span(Span::new(begin, end))));
        self
    }

    /// Elements between the two anchors, in reading order.
    pub fn between(mut self, first: FsId, second: FsId) -> Self {
        self.relation = Some(Relation::Between(Anchor::Fs(first), Anchor::Fs(second)));
        self
    }

    /// Elements following the anchor.
    pub fn following(self, fs: FsId) -> Self {
        self.following_offset(fs, 0)
    }

    /// Elements following the anchor, skipping the nearest `offset` first.
    pub fn following_offset(mut self, fs: FsId, offset: usize) -> Self {
        self.relation = Some(Relation::Following {
            anchor: Anchor::Fs(fs),
            offset,
        });
        self
    }

    /// Elements beginning at or after a raw position.
    pub fn following_at(mut self, position: i64) -> Self {
        self.relation = Some(Relation::Following {
            anchor: Anchor::Span(Span::new(position, position)),
            offset: 0,
        });
        self
    }

    /// Elements preceding the anchor, ascending order by default.
    pub fn preceding(self, fs: FsId) -> Self {
        self.preceding_offset(fs, 0)
    }

    /// Elements preceding the anchor, skipping the nearest `offset` first.
    pub fn preceding_offset(mut self, fs: FsId, offset: usize) -> Self {
        self.relation = Some(Relation::Preceding {
            anchor: Anchor::Fs(fs),
            offset,
        });
        self
    }

    /// Elements ending at or before a raw position.
    pub fn preceding_at(mut self, position: i64) -> Self {
        self.relation = Some(Relation::Preceding {
            anchor: Anchor::Span(Span::new(position, position)),
            offset: 0,
        });
        self
    }

    // ----- execution -------------------------------------------------------

    fn resolve_views(&self) -> SelectResult<Vec<FsIndexView<'a>>> {
        let mut views: Vec<FsIndexView<'a>> = match self.source {
            Source::View(v) => {
                if self.cfg.all_views {
                    return Err(SelectError::IllegalConfiguration(
                        "all_views requires a CAS-scoped selection".to_string(),
                    ));
                }
                vec![v]
            }
            Source::Labeled { cas, view } => {
                let label = self.label.as_deref().unwrap_or_default();
                if self.cfg.all_views {
                    cas.view_ids()
                        .filter_map(|v| cas.index(v, label).ok())
                        .collect()
                } else {
                    vec![cas.index(view, label)?]
                }
            }
        };
        if let Some(t) = self.narrow {
            let mut narrowed = Vec::with_capacity(views.len());
            for v in views {
                narrowed.push(v.sub_index(t)?);
            }
            views = narrowed;
        }
        Ok(views)
    }

    fn require_span_index(&self, view: &FsIndexView<'a>) -> SelectResult<()> {
        let ts = view_ts(view);
        let ordered_annotation = view.strategy() == IndexStrategy::Sorted
            && ts.subsumes(TypeSystem::ANNOTATION, view.top_type())
            && view
                .index()
                .key_comparator()
                .keys()
                .first()
                .is_some_and(|k| {
                    k.feature == TypeSystem::BEGIN && k.direction == SortDirection::Ascending
                });
        if ordered_annotation {
            Ok(())
        } else {
            Err(SelectError::WrongIndexKind(format!(
                "index '{}' ({})",
                view.index().label(),
                view.strategy().name()
            )))
        }
    }

    fn resolve_anchor(
        &self,
        view: &FsIndexView<'a>,
        anchor: Anchor,
    ) -> SelectResult<(Span, Option<FsId>, Option<TypeId>)> {
        match anchor {
            Anchor::Span(s) => Ok((s, None, None)),
            Anchor::Fs(id) => {
                let arena = view_arena(view);
                let s = Span::new(arena.begin(id)?, arena.end(id)?);
                Ok((s, Some(id), Some(arena.type_of(id)?)))
            }
        }
    }

    fn prepare(&self) -> SelectResult<Prepared<'a>> {
        let views = self.resolve_views()?;

        let needs_span = self.relation.is_some()
            || self.cfg.non_overlapping
            || matches!(self.start, Some(StartPos::AtSpan(_)));
        if needs_span {
            for v in &views {
                self.require_span_index(v)?;
            }
        }
        if self.start.is_some() {
            for v in &views {
                if !v.strategy().is_ordered() {
                    return Err(SelectError::WrongIndexKind(format!(
                        "start_at requires an ordered index, got '{}' ({})",
                        v.index().label(),
                        v.strategy().name()
                    )));
                }
            }
        }
        if self.shift < 0 && (self.relation.is_some() || self.start.is_none()) {
            return Err(SelectError::IllegalConfiguration(
                "negative shift requires an unbounded start_at selection".to_string(),
            ));
        }
        if self.shift != 0 && self.start.is_none() && self.relation.is_none() {
            return Err(SelectError::IllegalConfiguration(
                "shift requires a positioned selection".to_string(),
            ));
        }

        // Resolve anchors against the first view's arena; all views of one
        // CAS share it.
        let (relation, anchor_fs, anchor_span, anchor_type, neighbor_offset) =
            match (self.relation, views.first()) {
                (Some(rel), Some(v)) => {
                    let (resolved, fs, sp, ty, off) = self.resolve_relation(v, rel)?;
                    (Some(resolved), fs, sp, ty, off)
                }
                _ => (None, None, None, None, 0),
            };

        let params = WalkParams {
            relation,
            anchor_fs,
            anchor_span,
            anchor_type,
            strict: self.cfg.end_within_bounds,
            skip_equals: self.cfg.skip_equals,
            position_uses_type: self.cfg.position_uses_type,
            non_overlapping: self.cfg.non_overlapping,
        };

        // Start positions per view.
        let mut walks = Vec::with_capacity(views.len());
        for v in views {
            let start = self.start_position(&v, &params)?;
            walks.push(Walk { view: v, start });
        }

        // Positive shift is consumed as a skip after positioning; neighbor
        // offsets for forward walks fold into the same counter.
        let mut skip = self.shift.max(0) as usize;
        if matches!(params.relation, Some(ResolvedRelation::Following(_))) {
            skip += neighbor_offset;
        }

        Ok(Prepared {
            walks,
            params,
            skip,
            preceding_offset: match params.relation {
                Some(ResolvedRelation::Preceding(_)) => {
                    neighbor_offset + self.shift.max(0) as usize
                }
                _ => 0,
            },
            limit: self.limit,
            backwards: self.cfg.backwards,
        })
    }

    #[allow(clippy::type_complexity)]
    fn resolve_relation(
        &self,
        view: &FsIndexView<'a>,
        rel: Relation,
    ) -> SelectResult<(ResolvedRelation, Option<FsId>, Option<Span>, Option<TypeId>, usize)> {
        Ok(match rel {
            Relation::At(a) => {
                let (s, fs, ty) = self.resolve_anchor(view, a)?;
                (ResolvedRelation::At(s), fs, Some(s), ty, 0)
            }
            Relation::CoveredBy(a) => {
                let (s, fs, ty) = self.resolve_anchor(view, a)?;
                (ResolvedRelation::CoveredBy(s), fs, Some(s), ty, 0)
            }
            Relation::Covering(a) => {
                let (s, fs, ty) = self.resolve_anchor(view, a)?;
                (ResolvedRelation::Covering(s), fs, Some(s), ty, 0)
            }
            Relation::Between(a, b) => {
                let (sa, _, _) = self.resolve_anchor(view, a)?;
                let (sb, _, _) = self.resolve_anchor(view, b)?;
                let region = span::between_region(sa, sb).unwrap_or(Span::new(0, -1));
                (ResolvedRelation::Between(region), None, None, None, 0)
            }
            Relation::Following { anchor, offset } => {
                let (s, fs, ty) = self.resolve_anchor(view, anchor)?;
                (ResolvedRelation::Following(s), fs, Some(s), ty, offset)
            }
            Relation::Preceding { anchor, offset } => {
                let (s, fs, ty) = self.resolve_anchor(view, anchor)?;
                (ResolvedRelation::Preceding(s), fs, Some(s), ty, offset)
            }
        })
    }

    /// Computes the walk start position for one view.
    fn start_position(
        &self,
        view: &FsIndexView<'a>,
        params: &WalkParams,
    ) -> SelectResult<usize> {
        // Positional relations dominate an explicit start.
        if let Some(rel) = params.relation {
            return Ok(match rel {
                ResolvedRelation::At(s) | ResolvedRelation::CoveredBy(s) => {
                    span_lower_bound(view, s.begin, None)
                }
                ResolvedRelation::Between(region) => span_lower_bound(view, region.begin, None),
                ResolvedRelation::Following(s) => span_lower_bound(view, s.end, None),
                ResolvedRelation::Covering(_) | ResolvedRelation::Preceding(_) => 0,
            });
        }

        let Some(start) = self.start else {
            return Ok(0);
        };
        let pos = match start {
            StartPos::AtSpan(s) => {
                let end_dir = view
                    .index()
                    .key_comparator()
                    .keys()
                    .get(1)
                    .filter(|k| k.feature == TypeSystem::END)
                    .map(|k| k.direction);
                span_lower_bound(view, s.begin, end_dir.map(|d| (s.end, d)))
            }
            StartPos::AtFs(template) => {
                let probe_cmp = FsComparator::new(
                    view.index().key_comparator().keys().to_vec(),
                    TieBreak {
                        use_id: false,
                        use_type_order: self.cfg.type_priority,
                    },
                );
                view.index().lower_bound(
                    view_ts(view),
                    view_arena(view),
                    template,
                    &probe_cmp,
                )?
            }
        };
        // Negative shift steps back before the walk begins; stepping past
        // the front empties the selection.
        if self.shift < 0 {
            let back = (-self.shift) as usize;
            let mut remaining = back;
            let mut p = pos;
            while remaining > 0 {
                if p == 0 {
                    return Ok(usize::MAX); // before-first: nothing to walk
                }
                p -= 1;
                remaining -= 1;
            }
            return Ok(p);
        }
        Ok(pos)
    }

    /// Materializes the selection in result order.
    pub fn as_vec(&self) -> SelectResult<Vec<FsId>> {
        let prepared = self.prepare()?;
        Ok(prepared.collect())
    }

    /// Lazy iterator over the selection. Backward-order selections
    /// (`preceding`, `backwards`) materialize internally.
    pub fn fs_iterator(&self) -> SelectResult<SelectIter<'a>> {
        let prepared = self.prepare()?;
        let is_forward = !prepared.backwards
            && !matches!(
                prepared.params.relation,
                Some(ResolvedRelation::Preceding(_))
            );
        if is_forward {
            Ok(SelectIter {
                inner: IterInner::Forward(prepared.into_forward()),
            })
        } else {
            Ok(SelectIter {
                inner: IterInner::Materialized(prepared.collect().into_iter()),
            })
        }
    }

    /// Alias for [`Select::fs_iterator`].
    pub fn iter(&self) -> SelectResult<SelectIter<'a>> {
        self.fs_iterator()
    }

    /// Number of matching elements.
    pub fn count(&self) -> SelectResult<usize> {
        Ok(self.fs_iterator()?.count())
    }

    /// True when nothing matches.
    pub fn is_empty(&self) -> SelectResult<bool> {
        Ok(self.fs_iterator()?.next().is_none())
    }

    /// First element, or `None` under `null_ok`, or `NoInstances`.
    pub fn get(&self) -> SelectResult<Option<FsId>> {
        match self.fs_iterator()?.next() {
            Some(id) => Ok(Some(id)),
            None if self.cfg.null_ok => Ok(None),
            None => Err(SelectError::NoInstances),
        }
    }

    /// Exactly one element; errors on zero and on more than one.
    pub fn single(&self) -> SelectResult<FsId> {
        let mut it = self.fs_iterator()?;
        let first = it.next().ok_or(SelectError::NoInstances)?;
        if it.next().is_some() {
            return Err(SelectError::MoreThanOne(2 + it.count()));
        }
        Ok(first)
    }

    /// At most one element; errors only when more than one matches.
    pub fn single_or_null(&self) -> SelectResult<Option<FsId>> {
        let mut it = self.fs_iterator()?;
        let first = it.next();
        if first.is_some() && it.next().is_some() {
            return Err(SelectError::MoreThanOne(2 + it.count()));
        }
        Ok(first)
    }

    /// Sugar: position at a structure, then `get`.
    pub fn get_at(self, fs: FsId) -> SelectResult<Option<FsId>> {
        self.start_at(fs).get()
    }

    /// Sugar: position at a span, then `get`.
    pub fn get_at_span(self, begin: i64, end: i64) -> SelectResult<Option<FsId>> {
        self.start_at_span(begin, end).get()
    }

    /// Sugar: position at a structure, then `single`.
    pub fn single_at(self, fs: FsId) -> SelectResult<FsId> {
        self.start_at(fs).single()
    }

    /// Sugar: position at a span, then `single_or_null`.
    pub fn single_or_null_at_span(self, begin: i64, end: i64) -> SelectResult<Option<FsId>> {
        self.start_at_span(begin, end).single_or_null()
    }
}

fn view_ts<'a>(view: &FsIndexView<'a>) -> &'a TypeSystem {
    view.ts_ref()
}

fn view_arena<'a>(view: &FsIndexView<'a>) -> &'a FsArena {
    view.arena_ref()
}

/// Relation with anchors resolved to spans.
#[derive(Debug, Clone, Copy)]
enum ResolvedRelation {
    At(Span),
    CoveredBy(Span),
    Covering(Span),
    Between(Span),
    Following(Span),
    Preceding(Span),
}

impl ResolvedRelation {
    /// Begin value past which the walk can stop, if any.
    fn stop_begin(&self) -> Option<i64> {
        match *self {
            ResolvedRelation::At(s) => Some(s.begin),
            ResolvedRelation::CoveredBy(s) => Some(s.end),
            ResolvedRelation::Covering(s) => Some(s.begin),
            ResolvedRelation::Between(r) => Some(r.end),
            ResolvedRelation::Preceding(s) => Some(s.begin),
            ResolvedRelation::Following(_) => None,
        }
    }
}

/// Immutable walk parameters shared by every view of one execution.
#[derive(Debug, Clone, Copy)]
struct WalkParams {
    relation: Option<ResolvedRelation>,
    anchor_fs: Option<FsId>,
    anchor_span: Option<Span>,
    anchor_type: Option<TypeId>,
    strict: bool,
    skip_equals: bool,
    position_uses_type: bool,
    non_overlapping: bool,
}

struct Walk<'a> {
    view: FsIndexView<'a>,
    start: usize,
}

struct Prepared<'a> {
    walks: Vec<Walk<'a>>,
    params: WalkParams,
    skip: usize,
    preceding_offset: usize,
    limit: Option<usize>,
    backwards: bool,
}

impl<'a> Prepared<'a> {
    fn into_forward(self) -> ForwardWalk<'a> {
        ForwardWalk {
            walks: self.walks,
            params: self.params,
            widx: 0,
            pos: 0,
            started: false,
            skip: self.skip,
            remaining: self.limit,
            prev_end: None,
            done: false,
        }
    }

    /// Drives the walk to completion and applies backward-order
    /// post-processing.
    fn collect(self) -> Vec<FsId> {
        let is_preceding = matches!(
            self.params.relation,
            Some(ResolvedRelation::Preceding(_))
        );
        let backwards = self.backwards;
        let limit = self.limit;
        let preceding_offset = self.preceding_offset;
        let skip = self.skip;

        if is_preceding {
            // Collect ascending without offset or limit, then trim from the
            // anchor side: the walk order for preceding is backward even
            // though results default to ascending.
            let mut walk = self.into_forward();
            walk.skip = 0;
            walk.remaining = None;
            let collected: Vec<FsId> = walk.collect();
            let keep_end = collected.len().saturating_sub(preceding_offset);
            let keep_start = match limit {
                Some(n) => keep_end.saturating_sub(n),
                None => 0,
            };
            let mut out = collected[keep_start..keep_end].to_vec();
            if backwards {
                out.reverse();
            }
            return out;
        }

        if backwards {
            let is_following = matches!(
                self.params.relation,
                Some(ResolvedRelation::Following(_))
            );
            if is_following {
                // Forward semantics (offset and limit) first, then reverse.
                let mut out: Vec<FsId> = self.into_forward().collect();
                out.reverse();
                return out;
            }
            // Plain backwards: reverse the full walk, then apply skip and
            // limit against the reversed order.
            let mut walk = self.into_forward();
            walk.skip = 0;
            walk.remaining = None;
            let mut out: Vec<FsId> = walk.collect();
            out.reverse();
            let mut out: Vec<FsId> = out.into_iter().skip(skip).collect();
            if let Some(n) = limit {
                out.truncate(n);
            }
            return out;
        }

        self.into_forward().collect()
    }
}

/// Iterator over selection results.
pub struct SelectIter<'a> {
    inner: IterInner<'a>,
}

enum IterInner<'a> {
    Forward(ForwardWalk<'a>),
    Materialized(std::vec::IntoIter<FsId>),
}

impl Iterator for SelectIter<'_> {
    type Item = FsId;

    fn next(&mut self) -> Option<FsId> {
        match &mut self.inner {
            IterInner::Forward(w) => w.next(),
            IterInner::Materialized(it) => it.next(),
        }
    }
}

/// The single forward walk all forward-order queries compile to.
struct ForwardWalk<'a> {
    walks: Vec<Walk<'a>>,
    params: WalkParams,
    widx: usize,
    pos: usize,
    started: bool,
    skip: usize,
    remaining: Option<usize>,
    prev_end: Option<i64>,
    done: bool,
}

impl ForwardWalk<'_> {
    fn span_of(view: &FsIndexView<'_>, id: FsId) -> Option<Span> {
        let arena = view.arena_ref();
        Some(Span::new(arena.begin(id).ok()?, arena.end(id).ok()?))
    }

    /// Relation and anchor filters for one element. `None` span means the
    /// element is skipped whenever spans matter.
    fn passes(&self, view: &FsIndexView<'_>, id: FsId) -> ElementCheck {
        let p = &self.params;
        let needs_span = p.relation.is_some() || p.non_overlapping;
        let s = if needs_span {
            match Self::span_of(view, id) {
                Some(s) => Some(s),
                None => return ElementCheck::Skip,
            }
        } else {
            None
        };

        if let (Some(rel), Some(s)) = (p.relation, s) {
            if let Some(stop) = rel.stop_begin() {
                if s.begin > stop {
                    return ElementCheck::StopView;
                }
            }
            let matched = match rel {
                ResolvedRelation::At(bound) => {
                    span::at(s, bound)
                        && (!p.position_uses_type
                            || p.anchor_type.is_none()
                            || view.arena_ref().type_of(id).ok() == p.anchor_type)
                }
                ResolvedRelation::CoveredBy(bound) => span::covered_by(s, bound, p.strict),
                ResolvedRelation::Covering(bound) => span::covering(s, bound),
                ResolvedRelation::Between(region) => span::covered_by(s, region, p.strict),
                ResolvedRelation::Following(anchor) => span::following(s, anchor),
                ResolvedRelation::Preceding(anchor) => span::preceding(s, anchor),
            };
            if !matched {
                return ElementCheck::Skip;
            }
        }

        // The anchor itself is never part of its own neighborhood.
        if p.anchor_fs == Some(id) {
            return ElementCheck::Skip;
        }
        if p.skip_equals {
            if let (Some(anchor_span), Some(s)) = (p.anchor_span, s) {
                let same_span = s == anchor_span;
                let same_type = match p.anchor_type {
                    Some(t) => view.arena_ref().type_of(id).ok() == Some(t),
                    None => true,
                };
                if same_span && same_type {
                    return ElementCheck::Skip;
                }
            }
        }

        if p.non_overlapping {
            if let (Some(prev), Some(s)) = (self.prev_end, s) {
                if s.begin < prev {
                    return ElementCheck::Skip;
                }
            }
        }

        ElementCheck::Yield(s)
    }
}

enum ElementCheck {
    Yield(Option<Span>),
    Skip,
    StopView,
}

impl Iterator for ForwardWalk<'_> {
    type Item = FsId;

    fn next(&mut self) -> Option<FsId> {
        if self.done {
            return None;
        }
        if self.remaining == Some(0) {
            self.done = true;
            return None;
        }
        loop {
            if self.widx >= self.walks.len() {
                self.done = true;
                return None;
            }
            let view = self.walks[self.widx].view;
            if !self.started {
                self.pos = self.walks[self.widx].start;
                self.started = true;
                self.prev_end = None;
            }
            let elems = view.index().elems();
            while self.pos < elems.len() {
                let id = elems[self.pos];
                self.pos += 1;
                if view.is_narrowed() && !view.admits(id) {
                    continue;
                }
                match self.passes(&view, id) {
                    ElementCheck::StopView => break,
                    ElementCheck::Skip => continue,
                    ElementCheck::Yield(s) => {
                        if self.skip > 0 {
                            self.skip -= 1;
                            continue;
                        }
                        if let Some(r) = &mut self.remaining {
                            *r -= 1;
                        }
                        if self.params.non_overlapping {
                            if let Some(s) = s {
                                self.prev_end = Some(s.end);
                            }
                        }
                        return Some(id);
                    }
                }
            }
            self.widx += 1;
            self.started = false;
        }
    }
}

/// First position whose element's span is not before the probe: begin
/// primary, optional end secondary with the index's declared direction.
fn span_lower_bound(
    view: &FsIndexView<'_>,
    begin: i64,
    end_key: Option<(i64, SortDirection)>,
) -> usize {
    let elems = view.index().elems();
    let arena = view.arena_ref();
    let mut lo = 0usize;
    let mut hi = elems.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let eb = arena.begin(elems[mid]).unwrap_or(i64::MIN);
        let mut ord = eb.cmp(&begin);
        if ord == Ordering::Equal {
            if let Some((end, dir)) = end_key {
                let ee = arena.end(elems[mid]).unwrap_or(i64::MIN);
                ord = ee.cmp(&end);
                if dir == SortDirection::Descending {
                    ord = ord.reverse();
                }
            }
        }
        match ord {
            Ordering::Less => lo = mid + 1,
            _ => hi = mid,
        }
    }
    lo
}
