//! Semantic tests for the lock-free map: single-threaded scenarios,
//! algebraic laws, and capacity/migration boundaries.

use drc_map::HashMap;

// ============================================================================
// Basic scenarios
// ============================================================================

#[test]
fn set_get_remove_roundtrip() {
    let map = HashMap::new();
    map.insert(1, 10);
    map.insert(2, 20);
    assert_eq!(map.get(&1), Some(10));
    map.remove(&1);
    assert_eq!(map.get(&1), None);
    assert_eq!(map.get(&2), Some(20));
}

#[test]
fn forced_migration_from_single_cell() {
    let map = HashMap::with_segment_size(1);
    map.insert(0u64, 0u64); // fills and seals the one-cell segment
    map.insert(1, 1); // must install a successor of size 2
    assert_eq!(map.get(&0), Some(0));
    assert_eq!(map.get(&1), Some(1));
    assert_eq!(map.segments(), 2);
}

#[test]
fn override_across_segments() {
    let map = HashMap::with_segment_size(1);
    map.insert(0u64, 0u64);
    map.insert(1, 1);
    // Key 0 lives in the head; the rewrite must win over that occurrence.
    map.insert(0, 99);
    assert_eq!(map.get(&0), Some(99));
    assert_eq!(map.get(&1), Some(1));
}

#[test]
fn tombstone_across_segments_then_resurrect() {
    let map = HashMap::with_segment_size(1);
    map.insert(0u64, 0u64);
    map.insert(1, 1);
    map.remove(&0);
    assert_eq!(map.get(&0), None);
    map.insert(0, 7);
    assert_eq!(map.get(&0), Some(7));
}

// ============================================================================
// Laws
// ============================================================================

#[test]
fn law_set_then_get() {
    let map = HashMap::with_segment_size(8);
    map.insert("k", 1);
    assert_eq!(map.get("k"), Some(1));
}

#[test]
fn law_set_is_idempotent() {
    let map = HashMap::with_segment_size(8);
    map.insert("k", 1);
    map.insert("k", 1);
    assert_eq!(map.get("k"), Some(1));
}

#[test]
fn law_remove_dominates_earlier_set() {
    let map = HashMap::with_segment_size(8);
    map.insert("k", 1);
    map.remove("k");
    assert_eq!(map.get("k"), None);
    assert!(!map.contains_key("k"));
}

#[test]
fn law_set_after_remove_resurrects() {
    let map = HashMap::with_segment_size(8);
    map.insert("k", 1);
    map.remove("k");
    map.insert("k", 2);
    assert_eq!(map.get("k"), Some(2));
}

#[test]
fn law_last_write_wins() {
    let map = HashMap::with_segment_size(4);
    for i in 0..50u64 {
        map.insert(7u64, i);
    }
    assert_eq!(map.get(&7), Some(49));
}

// ============================================================================
// Boundaries
// ============================================================================

#[test]
fn zero_segment_size_is_coerced_to_one() {
    let map = HashMap::with_segment_size(0);
    map.insert(0u64, 0u64);
    assert_eq!(map.segments(), 1);
    // A one-cell segment has capacity one: the second distinct key must
    // open a successor.
    map.insert(1, 1);
    assert_eq!(map.segments(), 2);
}

#[test]
fn chain_is_empty_until_first_insert() {
    let map: HashMap<u64, u64> = HashMap::with_segment_size(4);
    assert_eq!(map.segments(), 0);
    assert_eq!(map.get(&1), None);
    map.remove(&1); // no-op on an uninstalled chain
    assert_eq!(map.segments(), 0);
}

#[test]
fn capacity_fill_seals_and_doubles() {
    // size 4 -> capacity ceil(2.8) = 3; successor size 8 -> capacity 6.
    let map = HashMap::with_segment_size(4);

    for key in 0..3u64 {
        map.insert(key, key);
    }
    assert_eq!(map.segments(), 1);

    // Fourth distinct key: head refuses, a x2 successor appears.
    map.insert(3, 3);
    assert_eq!(map.segments(), 2);

    // The successor absorbs six distinct keys before sealing in turn.
    for key in 4..9u64 {
        map.insert(key, key);
    }
    assert_eq!(map.segments(), 2);
    map.insert(9, 9);
    assert_eq!(map.segments(), 3);

    for key in 0..10u64 {
        assert_eq!(map.get(&key), Some(key));
    }
}

#[test]
fn updates_do_not_consume_fresh_capacity_in_one_segment() {
    // Re-setting the same key within an unsealed segment is an update,
    // not an insert: the segment must not seal from rewrites alone.
    let map = HashMap::with_segment_size(4);
    map.insert(1u64, 0u64);
    for round in 0..20u64 {
        map.insert(1, round);
    }
    assert_eq!(map.segments(), 1);
    assert_eq!(map.get(&1), Some(19));
}

#[test]
fn remove_of_absent_key_is_a_noop() {
    let map = HashMap::with_segment_size(2);
    map.insert(1u64, 1u64);
    map.remove(&2);
    map.remove(&2);
    assert_eq!(map.get(&1), Some(1));
    assert_eq!(map.get(&2), None);
    // Tombstones never claim fresh cells, so no growth can result.
    assert_eq!(map.segments(), 1);
}

#[test]
fn removed_keys_do_not_free_capacity() {
    // size 4 -> capacity 3. Removals tombstone in place, so three inserts
    // fill the segment for good even if all of them are removed.
    let map = HashMap::with_segment_size(4);
    for key in 0..3u64 {
        map.insert(key, key);
        map.remove(&key);
    }
    assert_eq!(map.segments(), 1);
    map.insert(100, 100);
    assert_eq!(map.segments(), 2);
    assert_eq!(map.get(&100), Some(100));
}

// ============================================================================
// Handles and key types
// ============================================================================

#[test]
fn clone_shares_the_chain() {
    let a = HashMap::with_segment_size(4);
    let b = a.clone();

    a.insert(1u64, 10u64);
    assert_eq!(b.get(&1), Some(10));

    b.remove(&1);
    assert_eq!(a.get(&1), None);
}

#[test]
fn string_keys_with_borrowed_lookup() {
    let map: HashMap<String, u64> = HashMap::with_segment_size(8);
    map.insert(String::from("alpha"), 1);
    map.insert(String::from("beta"), 2);

    assert_eq!(map.get("alpha"), Some(1));
    assert_eq!(map.get("beta"), Some(2));
    assert_eq!(map.get("gamma"), None);

    map.remove("alpha");
    assert_eq!(map.get("alpha"), None);
}

#[test]
fn many_keys_across_many_migrations() {
    let map = HashMap::with_segment_size(1);
    for key in 0..500u64 {
        map.insert(key, key * 3);
    }
    for key in 0..500u64 {
        assert_eq!(map.get(&key), Some(key * 3), "key {key}");
    }
    // Chain lengths stay logarithmic in the key count.
    assert!(map.segments() <= 12, "chain too long: {}", map.segments());
}
