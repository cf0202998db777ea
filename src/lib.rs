//! drc: a double-counted atomic reference cell.
//!
//! `Drc<T>` is a mutable slot owning zero or one heap-allocated value,
//! supporting concurrent read and replacement without locks, garbage
//! collection, or hazard pointers. Readers take a [`Guard`] pinning the
//! value they observed; writers swap in fresh records and retire old ones
//! through a two-counter protocol that frees each record exactly once,
//! after the last referring cell has detached and the last guard has been
//! dropped.
//!
//! # Key Properties
//!
//! - **Lock-free**: every operation is a bounded sequence of single-word
//!   (128-bit) CAS retries; some competing operation wins each round
//! - **Guard-pinned reads**: a replaced value stays alive for exactly as
//!   long as some guard still references it
//! - **Shareable cells**: cells can be copied (both name one record) or
//!   have their contents stolen atomically, concurrently with readers
//! - **`no_std`**: only `alloc` and atomics
//!
//! # Example
//!
//! ```rust
//! use drc::Drc;
//!
//! let cell = Drc::new(String::from("alpha"));
//!
//! let reader = cell.obtain();
//! cell.replace(String::from("beta"));
//!
//! // The reader still sees the snapshot it pinned.
//! assert_eq!(&*reader, "alpha");
//! assert_eq!(&*cell.obtain(), "beta");
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

mod cell;
mod guard;
mod internals;
mod word;

pub use cell::Drc;
pub use guard::Guard;
