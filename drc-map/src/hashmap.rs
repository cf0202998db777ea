//! Lock-Free Chain-of-Segments Hash Map.
//!
//! # Architecture
//!
//! - **Segments**: fixed-size open-addressed arrays of `Drc`-held records,
//!   linked through a `next` cell into a forward-growing chain.
//! - **Records**: immutable `(key, value, tombstone)` triples. A write
//!   never mutates a record in place; it swaps a fresh record into the
//!   cell and lets the old one retire through its guards. A cell's key
//!   identity never changes once installed, and tombstones never free
//!   their cell.
//! - **Admission**: each segment packs `(elements, inserters, sealed)`
//!   into one atomic word so committed plus in-flight inserts can never
//!   exceed capacity. A sealed segment refuses new inserts; the first
//!   writer that needs room installs a successor of twice the size.
//! - **Reads**: walk the whole chain; the last segment with an entry for
//!   the key is authoritative. Readers never block and never write.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::sync::atomic::{AtomicU64, Ordering};
use drc::Drc;
use foldhash::fast::FixedState;

/// Fraction of a segment's cells that may hold records: 0.7, applied as
/// `ceil(size * 7 / 10)` so it is exact in integer arithmetic.
const CAPACITY_NUMERATOR: usize = 7;
const CAPACITY_DENOMINATOR: usize = 10;

/// Successor segments double in size.
const RESIZE_FACTOR: usize = 2;

/// A simple exponential backoff for reducing contention.
struct Backoff {
    step: u32,
}

impl Backoff {
    #[inline(always)]
    fn new() -> Self {
        Self { step: 0 }
    }

    #[inline(always)]
    fn spin(&mut self) {
        for _ in 0..(1 << self.step.min(6)) {
            core::hint::spin_loop();
        }
        if self.step <= 6 {
            self.step += 1;
        }
    }
}

/// Immutable entry. Replaced wholesale, never mutated.
struct Record<K, V> {
    key: K,
    value: V,
    tombstone: bool,
}

/// What a segment-level write achieved.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// The segment refused the write (sealed, or the key is absent and
    /// only a tombstone was asked for).
    Refused,
    /// An existing entry for the key was replaced.
    Updated,
    /// A fresh cell was claimed and filled.
    Inserted,
}

// ---------------------------------------------------------------------------
// Admission word: (elements: 31 bits, inserters: 31 bits, sealed: 1 bit)
// ---------------------------------------------------------------------------

const ELEMENT_ONE: u64 = 1;
const INSERTER_ONE: u64 = 1 << 31;
const COUNT_MASK: u64 = (1 << 31) - 1;
const SEALED: u64 = 1 << 63;

#[inline(always)]
fn elements(word: u64) -> u64 {
    word & COUNT_MASK
}

#[inline(always)]
fn inserters(word: u64) -> u64 {
    (word >> 31) & COUNT_MASK
}

#[inline(always)]
fn is_sealed(word: u64) -> bool {
    word & SEALED != 0
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

struct Segment<K, V> {
    size: usize,
    capacity: usize,
    admission: AtomicU64,
    next: Drc<Segment<K, V>>,
    cells: Box<[Drc<Record<K, V>>]>,
}

impl<K, V> Segment<K, V> {
    fn new(size: usize) -> Self {
        let size = size.max(1);
        let capacity = (size * CAPACITY_NUMERATOR).div_ceil(CAPACITY_DENOMINATOR);
        let mut cells = Vec::with_capacity(size);
        for _ in 0..size {
            cells.push(Drc::empty());
        }

        Self {
            size,
            capacity,
            admission: AtomicU64::new(0),
            next: Drc::empty(),
            cells: cells.into_boxed_slice(),
        }
    }

    /// Claims the right to fill one empty cell. Refuses once sealed; the
    /// claim that brings committed-plus-in-flight up to capacity seals the
    /// segment in the same CAS.
    fn attempt_insert(&self) -> bool {
        let mut word = self.admission.load(Ordering::Acquire);
        loop {
            if is_sealed(word) {
                return false;
            }
            let mut new = word + INSERTER_ONE;
            if elements(new) + inserters(new) == self.capacity as u64 {
                new |= SEALED;
            }
            match self.admission.compare_exchange_weak(
                word,
                new,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => word = observed,
            }
        }
    }

    /// Returns a claim, committing it as an element iff the cell was
    /// actually filled. The seal bit, once set, stays.
    fn finish_insert(&self, inserted: bool) {
        let mut word = self.admission.load(Ordering::Acquire);
        loop {
            let mut new = word - INSERTER_ONE;
            if inserted {
                new += ELEMENT_ONE;
            }
            match self.admission.compare_exchange_weak(
                word,
                new,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => word = observed,
            }
        }
    }
}

impl<K, V> Segment<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Linear probe for `key`. The first empty cell terminates the probe:
    /// inserts for this key can never have landed beyond it.
    fn probe<Q>(&self, hash: u64, key: &Q) -> Option<(V, bool)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let start = (hash as usize) % self.size;
        for i in 0..self.size {
            let cell = &self.cells[(start + i) % self.size];
            let guard = cell.obtain();
            match guard.get() {
                None => return None,
                Some(record) if record.key.borrow() == key => {
                    return Some((record.value.clone(), record.tombstone));
                }
                Some(_) => {}
            }
        }
        None
    }

    /// Replaces the entry for `key` if this segment has one, otherwise
    /// claims an empty cell for it. Contention on a cell re-probes that
    /// same cell: its key identity cannot have changed, only its record.
    fn update_or_insert(&self, hash: u64, key: &K, value: &V) -> Outcome {
        let start = (hash as usize) % self.size;
        let mut backoff = Backoff::new();
        for i in 0..self.size {
            let cell = &self.cells[(start + i) % self.size];
            loop {
                let guard = cell.obtain();
                match guard.get() {
                    Some(record) if record.key == *key => {
                        let fresh = Record {
                            key: key.clone(),
                            value: value.clone(),
                            tombstone: false,
                        };
                        if cell.try_replace(&guard, fresh) {
                            return Outcome::Updated;
                        }
                        backoff.spin();
                    }
                    Some(_) => break,
                    None => {
                        if !self.attempt_insert() {
                            return Outcome::Refused;
                        }
                        let fresh = Record {
                            key: key.clone(),
                            value: value.clone(),
                            tombstone: false,
                        };
                        if cell.try_replace(&guard, fresh) {
                            self.finish_insert(true);
                            return Outcome::Inserted;
                        }
                        // Lost the cell to a racing writer; the claim goes
                        // back and the now-occupied cell is re-examined.
                        self.finish_insert(false);
                        backoff.spin();
                    }
                }
            }
        }
        Outcome::Refused
    }

    /// Replaces a live entry for `key` with a tombstone carrying the old
    /// key and value. Never writes into a fresh cell.
    fn bury<Q>(&self, hash: u64, key: &Q) -> Outcome
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let start = (hash as usize) % self.size;
        let mut backoff = Backoff::new();
        for i in 0..self.size {
            let cell = &self.cells[(start + i) % self.size];
            loop {
                let guard = cell.obtain();
                match guard.get() {
                    None => return Outcome::Refused,
                    Some(record) if record.key.borrow() == key => {
                        if record.tombstone {
                            return Outcome::Updated;
                        }
                        let dead = Record {
                            key: record.key.clone(),
                            value: record.value.clone(),
                            tombstone: true,
                        };
                        if cell.try_replace(&guard, dead) {
                            return Outcome::Updated;
                        }
                        backoff.spin();
                    }
                    Some(_) => break,
                }
            }
        }
        Outcome::Refused
    }
}

// ---------------------------------------------------------------------------
// HashMap
// ---------------------------------------------------------------------------

/// A lock-free concurrent hash map.
///
/// Readers and writers proceed without locks: every synchronization point
/// is a single CAS on a `Drc` cell or a segment's admission word. Capacity
/// grows by chaining larger segments rather than rehashing; removed keys
/// leave tombstones behind.
///
/// Cloning the map is shallow: both handles operate on the same chain.
///
/// # Examples
///
/// ```rust
/// use drc_map::HashMap;
///
/// let map = HashMap::new();
/// map.insert(1, 10);
/// map.insert(2, 20);
/// assert_eq!(map.get(&1), Some(10));
/// map.remove(&1);
/// assert_eq!(map.get(&1), None);
/// assert_eq!(map.get(&2), Some(20));
/// ```
pub struct HashMap<K, V, S = FixedState> {
    head: Drc<Segment<K, V>>,
    initial_size: usize,
    hasher: S,
}

impl<K, V> HashMap<K, V, FixedState>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates an empty map whose first segment will have one cell.
    pub fn new() -> Self {
        Self::with_segment_size(1)
    }

    /// Creates an empty map with a chosen first-segment size. Sizes below
    /// one are coerced to one.
    pub fn with_segment_size(size: usize) -> Self {
        Self::with_segment_size_and_hasher(size, FixedState::default())
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// Creates an empty map with a custom hasher.
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_segment_size_and_hasher(1, hasher)
    }

    /// Creates an empty map with a chosen first-segment size and hasher.
    pub fn with_segment_size_and_hasher(size: usize, hasher: S) -> Self {
        Self {
            head: Drc::empty(),
            initial_size: size.max(1),
            hasher,
        }
    }

    /// Looks up `key`, walking the whole segment chain. The most recent
    /// segment holding the key decides: a live entry yields its value, a
    /// tombstone yields `None`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        let mut latest = None;

        let mut segment = self.head.obtain();
        while segment.has_data() {
            let seg = &*segment;
            if let Some(hit) = seg.probe(hash, key) {
                latest = Some(hit);
            }
            let next = seg.next.obtain();
            segment = next;
        }

        match latest {
            Some((value, false)) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` if `key` currently maps to a live value.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Maps `key` to `value`.
    ///
    /// Walks the chain rewriting every segment's entry for the key, so no
    /// stale occurrence can shadow the write, and stops once a segment
    /// accepts a fresh insert or the tail reports an update. A sealed tail
    /// gets a successor of twice its size, installed by whichever racing
    /// writer wins the `try_replace` on its `next` cell.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hasher.hash_one(&key);

        let mut segment = self.head.obtain();
        if !segment.has_data() {
            // First writer ever: install the initial segment. Losing the
            // race is fine, the winner's segment is picked up below.
            self.head
                .try_replace(&segment, Segment::new(self.initial_size));
            segment = self.head.obtain();
        }

        loop {
            let seg = &*segment;
            match seg.update_or_insert(hash, &key, &value) {
                Outcome::Inserted => return,
                outcome => {
                    let next = seg.next.obtain();
                    if next.has_data() {
                        segment = next;
                        continue;
                    }
                    if outcome == Outcome::Updated {
                        // Updated the tail segment: this is the chain's
                        // last occurrence of the key.
                        return;
                    }
                    seg.next
                        .try_replace(&next, Segment::new(seg.size * RESIZE_FACTOR));
                    let successor = seg.next.obtain();
                    segment = successor;
                }
            }
        }
    }

    /// Unmaps `key` by tombstoning every segment's entry for it. A key the
    /// map never held is left untouched; no cell is consumed.
    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);

        let mut segment = self.head.obtain();
        while segment.has_data() {
            let seg = &*segment;
            let _ = seg.bury(hash, key);
            let next = seg.next.obtain();
            segment = next;
        }
    }

    /// Number of segments in the chain. Zero until the first insert.
    pub fn segments(&self) -> usize {
        let mut count = 0;
        let mut segment = self.head.obtain();
        while segment.has_data() {
            count += 1;
            let seg = &*segment;
            let next = seg.next.obtain();
            segment = next;
        }
        count
    }

    /// Get the underlying hasher itself.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }
}

impl<K, V> Default for HashMap<K, V, FixedState>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S: Clone> Clone for HashMap<K, V, S> {
    /// Shallow: the clone shares the segment chain with the original.
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            initial_size: self.initial_size,
            hasher: self.hasher.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    #[test]
    fn test_insert_and_get() {
        let map = HashMap::new();
        map.insert(1, 100);
        assert_eq!(map.get(&1), Some(100));
        assert_eq!(map.get(&2), None);
    }

    #[test]
    fn test_insert_replace() {
        let map = HashMap::new();
        map.insert(1, 100);
        map.insert(1, 200);
        assert_eq!(map.get(&1), Some(200));
    }

    #[test]
    fn test_remove_then_reinsert() {
        let map = HashMap::new();
        map.insert(1, 100);
        map.remove(&1);
        assert_eq!(map.get(&1), None);
        map.insert(1, 300);
        assert_eq!(map.get(&1), Some(300));
    }

    #[test]
    fn test_chain_grows_on_demand() {
        let map = HashMap::with_segment_size(1);
        assert_eq!(map.segments(), 0);
        map.insert(0u64, 0u64);
        assert_eq!(map.segments(), 1);
        map.insert(1, 1);
        assert_eq!(map.segments(), 2);
        assert_eq!(map.get(&0), Some(0));
        assert_eq!(map.get(&1), Some(1));
    }

    #[test]
    fn test_borrowed_lookup() {
        let map: HashMap<String, u32> = HashMap::with_segment_size(8);
        map.insert(String::from("alpha"), 1);
        assert_eq!(map.get("alpha"), Some(1));
        assert!(map.contains_key("alpha"));
        map.remove("alpha");
        assert_eq!(map.get("alpha"), None);
    }

    #[test]
    fn test_admission_word_packing() {
        let word = ELEMENT_ONE * 5 + INSERTER_ONE * 3 + SEALED;
        assert_eq!(elements(word), 5);
        assert_eq!(inserters(word), 3);
        assert!(is_sealed(word));
        assert!(!is_sealed(word & !SEALED));
    }
}
