//! Index Invariant Tests
//!
//! Tests for index-level invariants:
//! - Sorted indexes define a strict total order; iteration is repeatable
//! - Set indexes keep one member per (key, exact type) class
//! - Bag indexes never reject and use identity equality
//! - Remove/mutate/re-add leaves all invariants intact

use std::sync::Arc;

use annodex::{
    Cas, FsId, IndexSpec, IndexStrategy, SortKey, TypeId, TypeSystem, TypeSystemBuilder,
    ValueKind,
};

// =============================================================================
// Helper Functions
// =============================================================================

struct World {
    cas: Cas,
    v: annodex::FeatureId,
    token: TypeId,
    word: TypeId,
}

fn world() -> World {
    let mut b = TypeSystemBuilder::new();
    let token = b.add_type("Token", TypeSystem::ANNOTATION).unwrap();
    let word = b.add_type("Word", token).unwrap();
    let v = b.add_feature(token, "v", ValueKind::Int).unwrap();
    let ts = Arc::new(b.commit());
    let mut cas = Cas::new(ts);
    cas.register_index(IndexSpec {
        label: "by_v".to_string(),
        top_type: token,
        strategy: IndexStrategy::Sorted,
        keys: vec![SortKey::asc(v)],
        use_type_order: false,
    })
    .unwrap();
    cas.register_index(IndexSpec {
        label: "set_v".to_string(),
        top_type: token,
        strategy: IndexStrategy::Set,
        keys: vec![SortKey::asc(v)],
        use_type_order: false,
    })
    .unwrap();
    cas.register_index(IndexSpec {
        label: "bag".to_string(),
        top_type: token,
        strategy: IndexStrategy::Bag,
        keys: Vec::new(),
        use_type_order: false,
    })
    .unwrap();
    World {
        cas,
        v,
        token,
        word,
    }
}

fn mk(t: TypeId, w: &mut World, v: i64) -> FsId {
    let id = w.cas.create(t);
    w.cas.arena_mut().set_int(id, w.v, v).unwrap();
    id
}

fn indexed(t: TypeId, w: &mut World, v: i64) -> FsId {
    let id = mk(t, w, v);
    let base = w.cas.base_view();
    w.cas.add_fs(base, id).unwrap();
    id
}

// =============================================================================
// Total Order Tests
// =============================================================================

/// Repeated full iterations yield an identical sequence.
#[test]
fn test_iteration_is_repeatable() {
    let mut w = world();
    for v in [9i64, 2, 7, 2, 2, 5, 7] {
        indexed(w.token, &mut w, v);
    }
    let base = w.cas.base_view();
    let first: Vec<FsId> = w.cas.index(base, "by_v").unwrap().iter().collect();
    for _ in 0..50 {
        let again: Vec<FsId> = w.cas.index(base, "by_v").unwrap().iter().collect();
        assert_eq!(again, first);
    }
}

/// Key duplicates hold their creation order; keys dominate ids.
#[test]
fn test_sorted_order_keys_then_creation() {
    let mut w = world();
    // Creation order: 5, 3, 3, 1
    let a5 = indexed(w.token, &mut w, 5);
    let a3 = indexed(w.token, &mut w, 3);
    let b3 = indexed(w.token, &mut w, 3);
    let a1 = indexed(w.token, &mut w, 1);
    let base = w.cas.base_view();
    let order: Vec<FsId> = w.cas.index(base, "by_v").unwrap().iter().collect();
    assert_eq!(order, vec![a1, a3, b3, a5]);
}

/// The end-to-end walkthrough: insert v = 5, 3, 3, 1; probe with a v = 3
/// template.
#[test]
fn test_end_to_end_probe() {
    let mut w = world();
    let _a5 = indexed(w.token, &mut w, 5);
    let a3 = indexed(w.token, &mut w, 3);
    let _b3 = indexed(w.token, &mut w, 3);
    let a1 = indexed(w.token, &mut w, 1);
    let probe = mk(w.token, &mut w, 3);

    let base = w.cas.base_view();
    let view = w.cas.index(base, "by_v").unwrap();
    let mut cur = view.cursor();
    cur.move_to(&view, probe).unwrap();
    assert_eq!(cur.get().unwrap(), a3);
    cur.move_to_previous(&view).unwrap();
    assert_eq!(cur.get().unwrap(), a1);
}

// =============================================================================
// Set Uniqueness Tests
// =============================================================================

/// Two same-type structures tying under the key comparator keep the first.
#[test]
fn test_set_keeps_first_of_equal_pair() {
    let mut w = world();
    let first = indexed(w.token, &mut w, 7);
    let _second = indexed(w.token, &mut w, 7);
    let base = w.cas.base_view();
    let set: Vec<FsId> = w.cas.index(base, "set_v").unwrap().iter().collect();
    assert_eq!(set, vec![first]);
    // The sorted index kept both.
    assert_eq!(w.cas.index(base, "by_v").unwrap().len(), 2);
}

/// Same key, different exact type: both retained.
#[test]
fn test_set_distinguishes_exact_types() {
    let mut w = world();
    indexed(w.token, &mut w, 7);
    indexed(w.word, &mut w, 7);
    let base = w.cas.base_view();
    assert_eq!(w.cas.index(base, "set_v").unwrap().len(), 2);
}

// =============================================================================
// Bag Permissiveness Tests
// =============================================================================

/// Bags accept everything; contains is identity-based.
#[test]
fn test_bag_identity_semantics() {
    let mut w = world();
    let a = indexed(w.token, &mut w, 1);
    let b = indexed(w.token, &mut w, 1);
    let loose = mk(w.token, &mut w, 1);
    let base = w.cas.base_view();
    let bag = w.cas.index(base, "bag").unwrap();
    assert_eq!(bag.len(), 2);
    assert!(bag.contains(a).unwrap());
    assert!(bag.contains(b).unwrap());
    // Key-equal but never added: absent by identity.
    assert!(!bag.contains(loose).unwrap());
}

// =============================================================================
// Find / Contains Tests
// =============================================================================

/// `find` returns some equal member; `contains` agrees.
#[test]
fn test_find_returns_an_equal_member() {
    let mut w = world();
    let member = indexed(w.token, &mut w, 4);
    let probe = mk(w.token, &mut w, 4);
    let miss = mk(w.token, &mut w, 6);
    let base = w.cas.base_view();
    let view = w.cas.index(base, "by_v").unwrap();
    assert_eq!(view.find(probe).unwrap(), Some(member));
    assert!(view.contains(probe).unwrap());
    assert_eq!(view.find(miss).unwrap(), None);
}

// =============================================================================
// Protect-Indexes Contract
// =============================================================================

/// Remove, mutate key features, re-add: sort order and set uniqueness hold.
#[test]
fn test_remove_mutate_readd_preserves_invariants() {
    let mut w = world();
    let a = indexed(w.token, &mut w, 1);
    let b = indexed(w.token, &mut w, 5);
    let base = w.cas.base_view();

    w.cas.remove_fs(base, a).unwrap();
    w.cas.arena_mut().set_int(a, w.v, 9).unwrap();
    w.cas.add_fs(base, a).unwrap();

    let order: Vec<FsId> = w.cas.index(base, "by_v").unwrap().iter().collect();
    assert_eq!(order, vec![b, a]);
    let set: Vec<FsId> = w.cas.index(base, "set_v").unwrap().iter().collect();
    assert_eq!(set, vec![b, a]);
}

// =============================================================================
// Repository Aggregate Tests
// =============================================================================

/// All-indexed union covers subtypes without duplicates.
#[test]
fn test_all_indexed_fs_union() {
    let mut w = world();
    let t = indexed(w.token, &mut w, 1);
    let d = indexed(w.word, &mut w, 2);
    let base = w.cas.base_view();
    let mut all: Vec<FsId> = w.cas.all_indexed_fs(base, w.token).collect();
    all.sort();
    assert_eq!(all, vec![t, d]);
}

/// Bulk removal excluding subtypes leaves the subtypes indexed.
#[test]
fn test_bulk_removal_scopes() {
    let mut w = world();
    let _t = indexed(w.token, &mut w, 1);
    let d = indexed(w.word, &mut w, 2);
    let base = w.cas.base_view();

    w.cas.remove_all_excluding_subtypes(base, w.token).unwrap();
    let left: Vec<FsId> = w.cas.index(base, "by_v").unwrap().iter().collect();
    assert_eq!(left, vec![d]);

    w.cas.remove_all_including_subtypes(base, w.token).unwrap();
    assert!(w.cas.index(base, "by_v").unwrap().is_empty());
}
