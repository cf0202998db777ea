//! The counted heap record behind a cell.
//!
//! An `Internals<T>` is created with `(referrers = 1, inner = 0)` on behalf
//! of the cell that allocates it. Every cell naming it holds one
//! `referrers` credit; every outstanding guard owes one `inner` credit,
//! deposited on guard drop. A cell that stops naming the record transfers
//! the guard count it observed in its front word into `inner` (negatively)
//! while giving up its `referrers` credit. The record is freed by whichever
//! CAS settles the pair at exactly `(0, 0)`.

use crate::word::PairCount;
use alloc::boxed::Box;
use core::sync::atomic::Ordering;

pub(crate) struct Internals<T> {
    data: T,
    counts: PairCount,
}

impl<T> Internals<T> {
    /// Allocates a record owned by one cell: `(referrers = 1, inner = 0)`.
    pub(crate) fn alloc(data: T) -> *mut Self {
        Box::into_raw(Box::new(Self {
            data,
            counts: PairCount::new(1, 0),
        }))
    }

    #[inline]
    pub(crate) fn data(&self) -> &T {
        &self.data
    }

    /// Frees a record that was never published (e.g. a lost `try_replace`
    /// race). The counters are still at their initial values.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`Internals::alloc`] and must not have been
    /// installed into any cell.
    pub(crate) unsafe fn dealloc(ptr: *mut Self) {
        // SAFETY: caller guarantees sole ownership of an unpublished record.
        unsafe {
            drop(Box::from_raw(ptr));
        }
    }

    /// Adds one `referrers` credit on behalf of a cell about to name this
    /// record.
    ///
    /// # Safety
    ///
    /// The caller must hold a guard over this record with its credit still
    /// unpaid; that keeps the pair away from `(0, 0)`, so the record
    /// cannot settle during the call even if every cell naming it has
    /// detached in the meantime.
    pub(crate) unsafe fn attach(ptr: *mut Self) {
        // SAFETY: caller keeps the record alive for the duration.
        let counts = unsafe { &(*ptr).counts };
        let (mut referrers, mut inner) = counts.load(Ordering::Acquire);
        while let Err(observed) = counts.compare_exchange_weak(
            (referrers, inner),
            (referrers + 1, inner),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            referrers = observed.0;
            inner = observed.1;
        }
    }

    /// Gives up one `referrers` credit and deposits the guard count the
    /// detaching cell observed in its front word. Frees the record if the
    /// pair settles.
    ///
    /// # Safety
    ///
    /// `ptr` must name a live record and the caller must own exactly one
    /// `referrers` credit it is hereby surrendering. `ptr` must not be used
    /// after this call.
    pub(crate) unsafe fn detach(ptr: *mut Self, observers: u32) {
        // SAFETY: the surrendered credit keeps the record alive until the
        // CAS below commits.
        let counts = unsafe { &(*ptr).counts };
        let (mut referrers, mut inner) = counts.load(Ordering::Acquire);
        loop {
            let new = (referrers - 1, inner - observers as i32);
            match counts.compare_exchange_weak(
                (referrers, inner),
                new,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(()) => {
                    if new == (0, 0) {
                        // SAFETY: the settling CAS is unique; no cell names
                        // the record and no guard is outstanding.
                        unsafe {
                            drop(Box::from_raw(ptr));
                        }
                    }
                    return;
                }
                Err(observed) => {
                    referrers = observed.0;
                    inner = observed.1;
                }
            }
        }
    }

    /// Pays one guard's `inner` credit. Frees the record if the pair
    /// settles.
    ///
    /// # Safety
    ///
    /// `ptr` must name a live record and the caller must owe exactly one
    /// pending guard credit. `ptr` must not be used after this call.
    pub(crate) unsafe fn release(ptr: *mut Self) {
        // SAFETY: the owed credit keeps the record alive until the CAS
        // below commits.
        let counts = unsafe { &(*ptr).counts };
        let (mut referrers, mut inner) = counts.load(Ordering::Acquire);
        loop {
            let new = (referrers, inner + 1);
            match counts.compare_exchange_weak(
                (referrers, inner),
                new,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(()) => {
                    if new == (0, 0) {
                        // SAFETY: settling CAS, see `detach`.
                        unsafe {
                            drop(Box::from_raw(ptr));
                        }
                    }
                    return;
                }
                Err(observed) => {
                    referrers = observed.0;
                    inner = observed.1;
                }
            }
        }
    }
}
