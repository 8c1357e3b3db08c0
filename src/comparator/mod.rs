//! Comparator framework for annodex
//!
//! Builds a total-order comparator from an ordered key-feature list plus two
//! independent tie-break toggles. Key specs are evaluated in declared order;
//! the first non-zero result wins. On a full key tie, the type-precedence
//! rank is consulted first (when enabled), then the creation id (when
//! enabled); with both toggles off the comparator reports equality, which is
//! what set de-duplication wants.
//!
//! # Invariants
//!
//! - With the id tie-break on, the comparator is a strict total order over
//!   distinct structures (ids are unique)
//! - Tie-break order is fixed: type precedence before creation id

mod errors;

pub use errors::{ComparatorError, ComparatorResult};

use std::cmp::Ordering;

use crate::arena::{FsArena, FsId};
use crate::types::{FeatureId, TypeSystem};

/// Sort direction for one key feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smaller values first
    Ascending,
    /// Larger values first
    Descending,
}

/// One (feature, direction) pair of an index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    /// Key feature
    pub feature: FeatureId,
    /// Direction applied to the raw value order
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending key on a feature.
    pub fn asc(feature: FeatureId) -> Self {
        Self {
            feature,
            direction: SortDirection::Ascending,
        }
    }

    /// Descending key on a feature.
    pub fn desc(feature: FeatureId) -> Self {
        Self {
            feature,
            direction: SortDirection::Descending,
        }
    }
}

/// Tie-break configuration. An explicit value record, not a builder: the
/// four combinations are named once and passed around by copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieBreak {
    /// Append the creation id as the final discriminator
    pub use_id: bool,
    /// Consult the global type-precedence rank before the id
    pub use_type_order: bool,
}

impl TieBreak {
    /// Pure key equality; used for set de-duplication.
    pub const NONE: TieBreak = TieBreak {
        use_id: false,
        use_type_order: false,
    };
    /// Keys then creation id; the usual total order for sorted indexes.
    pub const WITH_ID: TieBreak = TieBreak {
        use_id: true,
        use_type_order: false,
    };
    /// Keys then type precedence; cross-type position equality.
    pub const WITH_TYPE_ORDER: TieBreak = TieBreak {
        use_id: false,
        use_type_order: true,
    };
    /// Keys, then type precedence, then creation id.
    pub const FULL: TieBreak = TieBreak {
        use_id: true,
        use_type_order: true,
    };
}

/// A comparator over feature structures: ordered keys plus tie-breaks.
#[derive(Debug, Clone)]
pub struct FsComparator {
    keys: Vec<SortKey>,
    tie_break: TieBreak,
}

impl FsComparator {
    /// Creates a comparator from keys and a tie-break record.
    pub fn new(keys: Vec<SortKey>, tie_break: TieBreak) -> Self {
        Self { keys, tie_break }
    }

    /// The key list, in evaluation order.
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// The tie-break record.
    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Same keys, different tie-break. Sorted indexes derive their
    /// key-equality comparator from the ordering comparator this way.
    pub fn with_tie_break(&self, tie_break: TieBreak) -> FsComparator {
        FsComparator {
            keys: self.keys.clone(),
            tie_break,
        }
    }

    /// Compares two structures. Errors when either operand's type cannot
    /// supply a key feature.
    pub fn compare(
        &self,
        ts: &TypeSystem,
        arena: &FsArena,
        a: FsId,
        b: FsId,
    ) -> ComparatorResult<Ordering> {
        for key in &self.keys {
            let va = arena
                .value_opt(a, key.feature)
                .ok_or_else(|| self.missing_key(ts, arena, a, key.feature))?;
            let vb = arena
                .value_opt(b, key.feature)
                .ok_or_else(|| self.missing_key(ts, arena, b, key.feature))?;
            let mut ord = va.total_cmp(vb);
            if key.direction == SortDirection::Descending {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }

        if self.tie_break.use_type_order {
            let ta = arena
                .type_of(a)
                .map_err(|_| ComparatorError::NoSuchStructure(a.raw()))?;
            let tb = arena
                .type_of(b)
                .map_err(|_| ComparatorError::NoSuchStructure(b.raw()))?;
            let ord = ts.precedence_rank(ta).cmp(&ts.precedence_rank(tb));
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }

        if self.tie_break.use_id {
            return Ok(a.raw().cmp(&b.raw()));
        }

        Ok(Ordering::Equal)
    }

    fn missing_key(
        &self,
        _ts: &TypeSystem,
        arena: &FsArena,
        operand: FsId,
        feature: FeatureId,
    ) -> ComparatorError {
        match arena.type_of(operand) {
            Ok(t) => ComparatorError::MissingKeyFeature {
                type_id: t,
                feature,
            },
            Err(_) => ComparatorError::NoSuchStructure(operand.raw()),
        }
    }

    /// Validates that a type can supply every key feature.
    pub fn validate_type(&self, ts: &TypeSystem, t: crate::types::TypeId) -> ComparatorResult<()> {
        for key in &self.keys {
            if ts.slot_of(t, key.feature).is_none() {
                return Err(ComparatorError::MissingKeyFeature {
                    type_id: t,
                    feature: key.feature,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeSystemBuilder, TypeSystem, ValueKind};
    use std::sync::Arc;

    struct Fixture {
        ts: Arc<TypeSystem>,
        arena: FsArena,
        v: FeatureId,
        token: crate::types::TypeId,
        word: crate::types::TypeId,
    }

    fn fixture() -> Fixture {
        let mut b = TypeSystemBuilder::new();
        let token = b.add_type("Token", TypeSystem::ANNOTATION).unwrap();
        let word = b.add_type("Word", token).unwrap();
        let v = b.add_feature(token, "v", ValueKind::Int).unwrap();
        // Word before Token in precedence, reversing the declaration order.
        b.set_precedence(&[word, token, TypeSystem::ANNOTATION, TypeSystem::TOP])
            .unwrap();
        let ts = Arc::new(b.commit());
        let arena = FsArena::new(ts.clone());
        Fixture {
            ts,
            arena,
            v,
            token,
            word,
        }
    }

    fn mk(t: crate::types::TypeId, f: &mut Fixture, v: i64) -> FsId {
        let id = f.arena.create(t);
        f.arena.set_int(id, f.v, v).unwrap();
        id
    }

    #[test]
    fn test_first_nonzero_key_wins() {
        let mut f = fixture();
        let a = mk(f.token, &mut f, 1);
        let b = mk(f.token, &mut f, 2);
        let cmp = FsComparator::new(vec![SortKey::asc(f.v)], TieBreak::NONE);
        assert_eq!(cmp.compare(&f.ts, &f.arena, a, b).unwrap(), Ordering::Less);
        assert_eq!(
            cmp.compare(&f.ts, &f.arena, b, a).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_descending_reverses() {
        let mut f = fixture();
        let a = mk(f.token, &mut f, 1);
        let b = mk(f.token, &mut f, 2);
        let cmp = FsComparator::new(vec![SortKey::desc(f.v)], TieBreak::NONE);
        assert_eq!(
            cmp.compare(&f.ts, &f.arena, a, b).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_key_tie_without_tiebreaks_is_equal() {
        let mut f = fixture();
        let a = mk(f.token, &mut f, 5);
        let b = mk(f.token, &mut f, 5);
        let cmp = FsComparator::new(vec![SortKey::asc(f.v)], TieBreak::NONE);
        assert_eq!(cmp.compare(&f.ts, &f.arena, a, b).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_id_tiebreak_orders_by_creation() {
        let mut f = fixture();
        let first = mk(f.token, &mut f, 5);
        let second = mk(f.token, &mut f, 5);
        let cmp = FsComparator::new(vec![SortKey::asc(f.v)], TieBreak::WITH_ID);
        assert_eq!(
            cmp.compare(&f.ts, &f.arena, first, second).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_type_order_consulted_before_id() {
        let mut f = fixture();
        // Token created first (smaller id), but Word precedes Token in the
        // committed precedence, so with both toggles on the Word sorts first.
        let token_fs = mk(f.token, &mut f, 5);
        let word_fs = mk(f.word, &mut f, 5);
        let cmp = FsComparator::new(vec![SortKey::asc(f.v)], TieBreak::FULL);
        assert_eq!(
            cmp.compare(&f.ts, &f.arena, word_fs, token_fs).unwrap(),
            Ordering::Less
        );
        // Id alone would have said the opposite.
        let id_only = FsComparator::new(vec![SortKey::asc(f.v)], TieBreak::WITH_ID);
        assert_eq!(
            id_only
                .compare(&f.ts, &f.arena, word_fs, token_fs)
                .unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_missing_key_feature_is_an_error() {
        let mut f = fixture();
        let plain = f.arena.create(TypeSystem::TOP);
        let tok = mk(f.token, &mut f, 1);
        let cmp = FsComparator::new(vec![SortKey::asc(f.v)], TieBreak::WITH_ID);
        let err = cmp.compare(&f.ts, &f.arena, plain, tok).unwrap_err();
        assert!(matches!(err, ComparatorError::MissingKeyFeature { .. }));
    }

    #[test]
    fn test_validate_type() {
        let f = fixture();
        let cmp = FsComparator::new(vec![SortKey::asc(f.v)], TieBreak::WITH_ID);
        assert!(cmp.validate_type(&f.ts, f.token).is_ok());
        assert!(cmp.validate_type(&f.ts, f.word).is_ok());
        assert!(cmp.validate_type(&f.ts, TypeSystem::TOP).is_err());
    }
}
