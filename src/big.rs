//! The thread-safe containers.

mod accessor;
mod lock;
mod map;
mod set;
mod shard;

pub use accessor::{ReadAccessor, WriteAccessor};
pub use map::{BigMap, MapReadAccessor, MapWriteAccessor};
pub use set::BigSet;
