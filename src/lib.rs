#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Bigset provides hash sets and hash maps built on one open addressing probe
//! engine.
//!
//! The engine stores, next to every value, the index of the bucket the value
//! would occupy if there were no collisions (its _target index_). Probe runs
//! are kept sorted by target index, so a lookup can stop as soon as it sees a
//! value whose home lies after its own, and removal shifts the rest of the run
//! back by one slot instead of leaving a tombstone behind.
//!
//! # Containers
//!
//! - [`BigSet`] and [`BigMap`] are thread-safe. They split the hash space
//!   between 4096 independent shards, each guarded by its own reader/writer
//!   lock. Lookups return an _accessor_, a guard that keeps the shard locked
//!   for as long as it is alive and gives access to the stored value.
//! - [`unsync::Set`] and [`unsync::Map`] are the single-threaded counterparts.
//!   They are the only containers that can be iterated.
//!
//! # Example
//!
//! ```rust
//! use bigset::BigSet;
//! use std::{sync::Arc, thread};
//!
//! let set = Arc::new(BigSet::<u64>::new());
//!
//! let threads: Vec<_> = (0..4u64)
//!     .map(|i| {
//!         let set = Arc::clone(&set);
//!         thread::spawn(move || {
//!             for j in 0..1000 {
//!                 assert!(set.insert(i * 1000 + j));
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for t in threads {
//!     t.join().unwrap();
//! }
//!
//! assert_eq!(set.len(), 4000);
//! assert!(set.contains(&1234));
//!
//! // An accessor holds the shard's read lock until it is dropped.
//! let accessor = set.find(&42).unwrap();
//! assert_eq!(*accessor, 42);
//! drop(accessor);
//!
//! assert!(set.erase(&42));
//! assert!(!set.contains(&42));
//! ```
//!
//! # Hashing
//!
//! All containers take a [`Hasher`], which supplies both the hash function and
//! the equality relation. [`StdHasher`], the default, adapts any
//! [`std::hash::BuildHasher`] for types that implement [`Hash`] and [`Eq`].
//!
//! # Logging
//!
//! With the `logging` feature enabled, the containers emit `trace` level logs
//! through the [log](https://docs.rs/log) crate when a shard grows and when an
//! optimistic lock upgrade falls back to a fresh write lock.
//!
//! [`Hash`]: std::hash::Hash

pub(crate) mod big;
pub(crate) mod common;
pub(crate) mod hasher;
pub(crate) mod table;
pub mod unsync;

pub use crate::{
    big::{BigMap, BigSet, MapReadAccessor, MapWriteAccessor, ReadAccessor, WriteAccessor},
    common::{backoff::Backoff, error::InvariantError},
    hasher::{Hasher, KeyHasher, StdHasher},
};
