//! `Drc<T>` — the double-counted reference cell.

use crate::guard::Guard;
use crate::internals::Internals;
use crate::word::PtrCount;
use core::fmt;
use core::ptr;
use core::sync::atomic::Ordering;

/// A lock-free cell holding zero or one heap-allocated `T`, readable and
/// replaceable concurrently without locks, epochs, or hazard pointers.
///
/// Reclamation is driven by two counters. The cell's front word packs the
/// record pointer with a count of guards handed out since that pointer was
/// installed, so [`obtain`](Drc::obtain) publishes its existence in the
/// same CAS that reads the pointer. The record itself balances the cells
/// naming it (`referrers`) against guard credits already paid in (`inner`);
/// whichever CAS settles both at zero frees the value.
///
/// # Examples
///
/// ```rust
/// use drc::Drc;
///
/// let cell = Drc::new(42u64);
/// let guard = cell.obtain();
/// assert_eq!(*guard, 42);
///
/// // Writers never wait for readers: the old value survives
/// // until the last guard over it is dropped.
/// cell.replace(99);
/// assert_eq!(*guard, 42);
/// assert_eq!(*cell.obtain(), 99);
/// ```
pub struct Drc<T> {
    front: PtrCount<Internals<T>>,
}

impl<T> Drc<T> {
    /// Creates an empty cell.
    #[inline]
    pub fn empty() -> Self {
        Self {
            front: PtrCount::new(ptr::null_mut(), 0),
        }
    }

    /// Creates a cell holding `value`.
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            front: PtrCount::new(Internals::alloc(value), 0),
        }
    }

    /// Returns `true` if the cell currently holds no value.
    ///
    /// Purely advisory under concurrency: another thread may install or
    /// erase a value immediately after the load.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.front.load(Ordering::Acquire).0.is_null()
    }

    /// Takes a guard over the current contents (possibly empty).
    ///
    /// The guard count is incremented in the same CAS that snapshots the
    /// pointer, so a concurrent [`replace`](Drc::replace) either happens
    /// before this obtain (the guard sees the new value) or inherits the
    /// incremented count when it detaches the old record.
    pub fn obtain(&self) -> Guard<T> {
        let (mut internals, mut count) = self.front.load(Ordering::Acquire);
        loop {
            match self.front.compare_exchange_weak(
                (internals, count),
                (internals, count + 1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(()) => return Guard::new(internals),
                Err(observed) => {
                    internals = observed.0;
                    count = observed.1;
                }
            }
        }
    }

    /// Installs a fresh record holding `value`, unconditionally.
    ///
    /// The previous record (if any) is detached: outstanding guards keep
    /// it alive, and the last of them frees it.
    pub fn replace(&self, value: T) {
        let new = Internals::alloc(value);
        let (old, observers) = self.front.swap(new, 0, Ordering::AcqRel);
        if !old.is_null() {
            // SAFETY: the swap transferred this cell's referrers credit and
            // its observed guard count to us.
            unsafe {
                Internals::detach(old, observers);
            }
        }
    }

    /// Installs a fresh record holding `value` only while the cell still
    /// points at what `expected` observed. Returns `false` (freeing the
    /// speculative allocation) as soon as a different pointer is seen.
    ///
    /// An empty `expected` guard is valid: it installs into a still-empty
    /// cell, which is how racing initializers elect a winner.
    pub fn try_replace(&self, expected: &Guard<T>, value: T) -> bool {
        let (mut internals, mut count) = self.front.load(Ordering::Acquire);
        if internals != expected.internals_ptr() {
            return false;
        }
        let new = Internals::alloc(value);
        loop {
            match self.front.compare_exchange_weak(
                (internals, count),
                (new, 0),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(()) => {
                    if !internals.is_null() {
                        // SAFETY: same credit transfer as in `replace`.
                        unsafe {
                            Internals::detach(internals, count);
                        }
                    }
                    return true;
                }
                Err(observed) => {
                    internals = observed.0;
                    count = observed.1;
                    if internals != expected.internals_ptr() {
                        // SAFETY: `new` was never published.
                        unsafe {
                            Internals::dealloc(new);
                        }
                        return false;
                    }
                }
            }
        }
    }

    /// Empties the cell, detaching the current record if any.
    pub fn erase(&self) {
        let (old, observers) = self.front.swap(ptr::null_mut(), 0, Ordering::AcqRel);
        if !old.is_null() {
            // SAFETY: same credit transfer as in `replace`.
            unsafe {
                Internals::detach(old, observers);
            }
        }
    }

    /// Makes this cell name the same record as `source` (sharing, not
    /// cloning: no `T` is copied).
    ///
    /// The guard taken on `source` pins its record across the attach, so
    /// the new referrers credit is added while the record is provably
    /// alive.
    pub fn copy_from(&self, source: &Drc<T>) {
        let pin = source.obtain();
        let internals = pin.internals_ptr();
        if !internals.is_null() {
            // SAFETY: `pin` keeps the record alive.
            unsafe {
                Internals::attach(internals);
            }
        }
        let (old, observers) = self.front.swap(internals, 0, Ordering::AcqRel);
        if !old.is_null() {
            // SAFETY: same credit transfer as in `replace`.
            unsafe {
                Internals::detach(old, observers);
            }
        }
    }

    /// Steals `source`'s contents: `source` becomes empty and this cell
    /// takes over its record, guard count and all. No counter traffic on
    /// the moved record.
    pub fn take_from(&self, source: &Drc<T>) {
        let (internals, count) = source.front.swap(ptr::null_mut(), 0, Ordering::AcqRel);
        let (old, observers) = self.front.swap(internals, count, Ordering::AcqRel);
        if !old.is_null() {
            // SAFETY: same credit transfer as in `replace`.
            unsafe {
                Internals::detach(old, observers);
            }
        }
    }
}

impl<T> Default for Drc<T> {
    /// Creates an empty cell.
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Clone for Drc<T> {
    /// Shares the record: both cells name the same value afterwards.
    fn clone(&self) -> Self {
        let cell = Self::empty();
        cell.copy_from(self);
        cell
    }
}

impl<T> Drop for Drc<T> {
    fn drop(&mut self) {
        self.erase();
    }
}

impl<T: fmt::Debug> fmt::Debug for Drc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.obtain().get() {
            Some(value) => f.debug_tuple("Drc").field(value).finish(),
            None => f.write_str("Drc(<empty>)"),
        }
    }
}

// SAFETY: the cell hands out &T to any thread holding a guard and frees T
// on whichever thread settles the counters, so both Send and Sync for the
// cell require T: Send + Sync. All cell state transitions go through
// atomic CAS/swap on the front word.
unsafe impl<T: Send + Sync> Send for Drc<T> {}
unsafe impl<T: Send + Sync> Sync for Drc<T> {}
