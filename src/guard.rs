//! Read guards over a cell's current contents.

use crate::internals::Internals;
use core::fmt;
use core::ops::Deref;

/// RAII handle returned by [`Drc::obtain`](crate::Drc::obtain).
///
/// A guard pins the cell contents it observed: the value cannot be freed
/// while the guard lives, even if every cell that named it has since been
/// replaced, erased, or dropped. A guard over an *empty* cell is itself
/// empty; check with [`has_data`](Guard::has_data) or [`get`](Guard::get)
/// before dereferencing.
///
/// Dropping the guard deposits its credit with the record's counters and
/// may be the action that frees the value.
pub struct Guard<T> {
    // Null when the cell was empty at obtain time. The raw pointer also
    // makes Guard !Send + !Sync: the drop path assumes the guard never
    // changes threads between obtain and release.
    internals: *mut Internals<T>,
}

impl<T> Guard<T> {
    #[inline]
    pub(crate) fn new(internals: *mut Internals<T>) -> Self {
        Self { internals }
    }

    #[inline]
    pub(crate) fn internals_ptr(&self) -> *mut Internals<T> {
        self.internals
    }

    /// Returns `true` if the guard observed a value.
    #[inline]
    pub fn has_data(&self) -> bool {
        !self.internals.is_null()
    }

    /// Returns the pinned value, or `None` if the cell was empty.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.internals.is_null() {
            None
        } else {
            // SAFETY: non-null means this guard holds a pending inner
            // credit, which keeps the record alive until drop.
            Some(unsafe { (*self.internals).data() })
        }
    }
}

impl<T> Deref for Guard<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the guard is empty. Use [`get`](Guard::get) when the cell
    /// may legitimately hold nothing.
    #[inline]
    fn deref(&self) -> &T {
        self.get().expect("dereferenced an empty guard")
    }
}

impl<T> Drop for Guard<T> {
    fn drop(&mut self) {
        if !self.internals.is_null() {
            // SAFETY: a non-empty guard owes exactly one inner credit.
            unsafe {
                Internals::release(self.internals);
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Guard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("Guard").field(value).finish(),
            None => f.write_str("Guard(<empty>)"),
        }
    }
}
