//! Reader/writer-lock hash map with the same semantics as the lock-free
//! one. Not a performance contender: a single table behind a single lock,
//! useful as a baseline and as an oracle in differential tests.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use foldhash::fast::FixedState;
use std::sync::RwLock;

const CAPACITY_NUMERATOR: usize = 7;
const CAPACITY_DENOMINATOR: usize = 10;
const RESIZE_FACTOR: usize = 2;

struct Slot<K, V> {
    key: K,
    value: V,
    tombstone: bool,
}

struct Table<K, V> {
    size: usize,
    capacity: usize,
    /// Occupied cells, tombstones included. Only a resize, which discards
    /// tombstones, brings it back down.
    used: usize,
    cells: Box<[Option<Slot<K, V>>]>,
}

impl<K, V> Table<K, V> {
    fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            capacity: (size * CAPACITY_NUMERATOR).div_ceil(CAPACITY_DENOMINATOR),
            used: 0,
            cells: empty_cells(size),
        }
    }
}

fn empty_cells<K, V>(size: usize) -> Box<[Option<Slot<K, V>>]> {
    let mut cells = Vec::with_capacity(size);
    cells.resize_with(size, || None);
    cells.into_boxed_slice()
}

/// A hash map sharing the lock-free map's semantics (linear probing, 0.7
/// load factor, x2 growth, tombstoned removal) with a `RwLock` supplying
/// all of the synchronization.
pub struct LockedMap<K, V, S = FixedState> {
    table: RwLock<Table<K, V>>,
    hasher: S,
}

impl<K, V> LockedMap<K, V, FixedState>
where
    K: Hash + Eq,
{
    /// Creates an empty map with a single-cell table.
    pub fn new() -> Self {
        Self::with_size(1)
    }

    /// Creates an empty map with a chosen table size. Sizes below one are
    /// coerced to one.
    pub fn with_size(size: usize) -> Self {
        Self::with_size_and_hasher(size, FixedState::default())
    }
}

impl<K, V, S> LockedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates an empty map with a chosen table size and hasher.
    pub fn with_size_and_hasher(size: usize, hasher: S) -> Self {
        Self {
            table: RwLock::new(Table::new(size)),
            hasher,
        }
    }

    /// Looks up `key` under a shared lock.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let hash = self.hasher.hash_one(key);
        let table = self.table.read().unwrap();

        let start = (hash as usize) % table.size;
        for i in 0..table.size {
            match &table.cells[(start + i) % table.size] {
                Some(slot) => {
                    if !slot.tombstone && slot.key.borrow() == key {
                        return Some(slot.value.clone());
                    }
                }
                None => return None,
            }
        }
        None
    }

    /// Returns `true` if `key` currently maps to a live value.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get(key).is_some()
    }

    /// Maps `key` to `value` under an exclusive lock, resizing in place
    /// when the table is at capacity.
    pub fn insert(&self, key: K, value: V) {
        let mut table = self.table.write().unwrap();

        if table.used >= table.capacity {
            self.resize(&mut table);
        }

        let hash = self.hasher.hash_one(&key);
        let start = (hash as usize) % table.size;
        for i in 0..table.size {
            let index = (start + i) % table.size;
            match &mut table.cells[index] {
                Some(slot) => {
                    if slot.key == key {
                        slot.value = value;
                        // A tombstoned slot comes back to life on update;
                        // leaving the flag set would lose the write.
                        slot.tombstone = false;
                        return;
                    }
                }
                cell @ None => {
                    *cell = Some(Slot {
                        key,
                        value,
                        tombstone: false,
                    });
                    table.used += 1;
                    return;
                }
            }
        }
    }

    /// Tombstones `key` under an exclusive lock. Absent keys are left
    /// untouched.
    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        let mut table = self.table.write().unwrap();

        let start = (hash as usize) % table.size;
        for i in 0..table.size {
            let index = (start + i) % table.size;
            match &mut table.cells[index] {
                Some(slot) => {
                    if slot.key.borrow() == key {
                        slot.tombstone = true;
                        return;
                    }
                }
                None => return,
            }
        }
    }

    /// Doubles the table, rehashing live entries and discarding
    /// tombstones. Caller holds the exclusive lock.
    fn resize(&self, table: &mut Table<K, V>) {
        let new_size = table.size * RESIZE_FACTOR;
        let mut cells = empty_cells(new_size);
        let mut used = 0;

        for slot in Vec::from(core::mem::replace(&mut table.cells, empty_cells(0)))
            .into_iter()
            .flatten()
        {
            if slot.tombstone {
                continue;
            }
            let start = (self.hasher.hash_one(&slot.key) as usize) % new_size;
            for i in 0..new_size {
                let cell = &mut cells[(start + i) % new_size];
                if cell.is_none() {
                    *cell = Some(slot);
                    used += 1;
                    break;
                }
            }
        }

        table.size = new_size;
        table.capacity = (new_size * CAPACITY_NUMERATOR).div_ceil(CAPACITY_DENOMINATOR);
        table.used = used;
        table.cells = cells;
    }
}

impl<K, V> Default for LockedMap<K, V, FixedState>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let map = LockedMap::new();
        map.insert(1, 10);
        map.insert(2, 20);
        assert_eq!(map.get(&1), Some(10));
        map.remove(&1);
        assert_eq!(map.get(&1), None);
        assert_eq!(map.get(&2), Some(20));
    }

    #[test]
    fn test_update_resurrects_tombstone() {
        let map = LockedMap::new();
        map.insert(1, 10);
        map.remove(&1);
        map.insert(1, 30);
        assert_eq!(map.get(&1), Some(30));
    }

    #[test]
    fn test_grows_past_initial_size() {
        let map = LockedMap::with_size(1);
        for i in 0..64u64 {
            map.insert(i, i * 2);
        }
        for i in 0..64u64 {
            assert_eq!(map.get(&i), Some(i * 2));
        }
    }

    #[test]
    fn test_resize_discards_tombstones() {
        let map = LockedMap::with_size(4);
        for i in 0..3u64 {
            map.insert(i, i);
            map.remove(&i);
        }
        // All capacity is tombstones; the next insert must still land.
        map.insert(99, 99);
        assert_eq!(map.get(&99), Some(99));
        for i in 0..3u64 {
            assert_eq!(map.get(&i), None);
        }
    }
}
