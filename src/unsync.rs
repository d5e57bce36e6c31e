//! Provides single-threaded hash containers.
//!
//! [`Set`] and [`Map`] use the same probe engine as [`BigSet`][big-set] and
//! [`BigMap`][big-map], without shards or locks. They probe with the full
//! 64-bit hash, and unlike the thread-safe containers they can be iterated
//! and hand out plain references.
//!
//! [big-set]: ../struct.BigSet.html
//! [big-map]: ../struct.BigMap.html

mod map;
mod set;

pub use map::{Keys, Map, MapIter, Values, ValuesMut};
pub use set::{Iter, Set};
