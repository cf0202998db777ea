//! Concurrent hash maps built on double-counted reference cells.
//!
//! The primary type is [`HashMap`]: a lock-free open-addressed map that
//! grows by chaining ever-larger segments instead of rehashing, with all
//! memory reclamation delegated to [`drc::Drc`] cells. Readers never block
//! writers and vice versa.
//!
//! [`LockedMap`] (behind the default `std` feature) is a single-table
//! reader/writer-lock map with the same semantics, kept as a comparison
//! point and as an oracle for cross-checking the lock-free path.
//!
//! # Example
//!
//! ```rust
//! use drc_map::HashMap;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let map = Arc::new(HashMap::new());
//!
//! let writer = {
//!     let map = map.clone();
//!     thread::spawn(move || {
//!         for i in 0..100u64 {
//!             map.insert(i, i * 2);
//!         }
//!     })
//! };
//! writer.join().unwrap();
//!
//! assert_eq!(map.get(&42), Some(84));
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod hashmap;
#[cfg(feature = "std")]
mod locking;

pub use hashmap::HashMap;
#[cfg(feature = "std")]
pub use locking::LockedMap;
