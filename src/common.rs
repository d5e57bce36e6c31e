pub(crate) mod backoff;
pub(crate) mod constants;
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test_utils;

use self::constants::{SHARD_BITS, SHARD_MASK};

/// Splits a full hash into the index of the shard that owns it and the
/// residual hash used for probing inside that shard.
#[inline]
pub(crate) fn split_hash(hash: u64) -> (usize, u64) {
    ((hash & SHARD_MASK) as usize, hash >> SHARD_BITS)
}
