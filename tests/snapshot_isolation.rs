//! Snapshot Isolation Tests
//!
//! Tests for cursor behavior under mutation:
//! - Snapshot cursors keep the creation-time membership and order
//! - Live cursors raise a concurrent-modification diagnostic
//! - Mirror symmetry holds on snapshots and live walks alike

use std::sync::Arc;

use annodex::index::IndexError;
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
}

fn world() -> World {
    let mut b = TypeSystemBuilder::new();
    let token = b.add_type("Token", TypeSystem::ANNOTATION).unwrap();
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
    World { cas, v, token }
}

fn indexed(w: &mut World, v: i64) -> FsId {
    let id = w.cas.create(w.token);
    w.cas.arena_mut().set_int(id, w.v, v).unwrap();
    let base = w.cas.base_view();
    w.cas.add_fs(base, id).unwrap();
    id
}

// =============================================================================
// Snapshot Isolation Tests
// =============================================================================

/// A snapshot over N elements stays N elements in the original order after
/// arbitrary live add/remove.
#[test]
fn test_snapshot_survives_mutation() {
    let mut w = world();
    let members: Vec<FsId> = [4i64, 1, 3, 2].iter().map(|&v| indexed(&mut w, v)).collect();
    let base = w.cas.base_view();

    let mut cur = {
        let view = w.cas.index(base, "by_v").unwrap().with_snapshot_cursors();
        view.cursor()
    };

    // Mutate the live index heavily.
    w.cas.remove_fs(base, members[0]).unwrap();
    w.cas.remove_fs(base, members[2]).unwrap();
    for v in [10i64, 11, 12] {
        indexed(&mut w, v);
    }

    let view = w.cas.index(base, "by_v").unwrap().with_snapshot_cursors();
    let mut seen = Vec::new();
    while cur.is_valid() {
        seen.push(cur.get().unwrap());
        cur.move_to_next(&view).unwrap();
    }
    // Sorted by v at capture time: 1, 2, 3, 4
    assert_eq!(seen, vec![members[1], members[3], members[2], members[0]]);
}

/// Snapshot cursors navigate backward and probe without touching the live
/// index.
#[test]
fn test_snapshot_mirror_and_probe() {
    let mut w = world();
    for v in [2i64, 4, 6, 8] {
        indexed(&mut w, v);
    }
    let base = w.cas.base_view();
    let mut cur = {
        let view = w.cas.index(base, "by_v").unwrap().with_snapshot_cursors();
        view.cursor()
    };
    let probe = {
        let id = w.cas.create(w.token);
        w.cas.arena_mut().set_int(id, w.v, 5).unwrap();
        id
    };
    indexed(&mut w, 99);

    let view = w.cas.index(base, "by_v").unwrap().with_snapshot_cursors();
    let mut forward = Vec::new();
    cur.move_to_first(&view).unwrap();
    while cur.is_valid() {
        forward.push(cur.get().unwrap());
        cur.move_to_next(&view).unwrap();
    }
    assert_eq!(forward.len(), 4); // the later insert is invisible

    let mut backward = Vec::new();
    cur.move_to_last(&view).unwrap();
    while cur.is_valid() {
        backward.push(cur.get().unwrap());
        cur.move_to_previous(&view).unwrap();
    }
    backward.reverse();
    assert_eq!(backward, forward);

    // Insertion-point probe works against the frozen copy.
    cur.move_to(&view, probe).unwrap();
    assert_eq!(
        w.cas.arena().get_int(cur.get().unwrap(), w.v).unwrap(),
        6
    );
}

// =============================================================================
// Concurrent Modification Diagnostics
// =============================================================================

/// A live cursor fails on the first navigation after a structural change.
#[test]
fn test_live_cursor_diagnostic() {
    let mut w = world();
    for v in [1i64, 2, 3] {
        indexed(&mut w, v);
    }
    let base = w.cas.base_view();
    let mut cur = {
        let view = w.cas.index(base, "by_v").unwrap();
        view.cursor()
    };

    indexed(&mut w, 4);

    let view = w.cas.index(base, "by_v").unwrap();
    let err = cur.move_to_next(&view).unwrap_err();
    assert!(matches!(err, IndexError::ConcurrentModification { .. }));

    // Recovery: a fresh cursor sees the new state.
    let fresh: Vec<FsId> = view.iter().collect();
    assert_eq!(fresh.len(), 4);
}

/// Removal is a structural change too.
#[test]
fn test_live_cursor_detects_removal() {
    let mut w = world();
    let a = indexed(&mut w, 1);
    indexed(&mut w, 2);
    let base = w.cas.base_view();
    let mut cur = {
        let view = w.cas.index(base, "by_v").unwrap();
        view.cursor()
    };
    w.cas.remove_fs(base, a).unwrap();
    let view = w.cas.index(base, "by_v").unwrap();
    assert!(cur.move_to_last(&view).is_err());
}

/// The cached element survives for get() even after a change; only
/// navigation raises.
#[test]
fn test_get_returns_cached_after_change() {
    let mut w = world();
    let first = indexed(&mut w, 1);
    let base = w.cas.base_view();
    let cur = {
        let view = w.cas.index(base, "by_v").unwrap();
        view.cursor()
    };
    indexed(&mut w, 0);
    assert_eq!(cur.get().unwrap(), first);
}
