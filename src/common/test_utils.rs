use crate::hasher::Hasher;

use std::{
    hash::Hash,
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc,
    },
};

/// Uses the value itself as its hash, so a value `v` lives in shard
/// `v % 4096`.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct TrivialHasher;

impl Hasher<u64> for TrivialHasher {
    fn hash(&self, value: &u64) -> u64 {
        *value
    }

    fn equals(&self, a: &u64, b: &u64) -> bool {
        a == b
    }
}

/// Sends every value to shard 0, with the value itself as the residual hash.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SingleShardHasher;

impl Hasher<u64> for SingleShardHasher {
    fn hash(&self, value: &u64) -> u64 {
        *value << 12
    }

    fn equals(&self, a: &u64, b: &u64) -> bool {
        a == b
    }
}

/// Hashes like [`SingleShardHasher`], but panics on its `fail_at`-th call.
#[derive(Debug)]
pub(crate) struct FailingHasher {
    calls: AtomicUsize,
    fail_at: usize,
}

impl FailingHasher {
    pub(crate) fn new(fail_at: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_at,
        }
    }
}

impl Hasher<u64> for FailingHasher {
    fn hash(&self, value: &u64) -> u64 {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        assert_ne!(call, self.fail_at, "Hasher failed on call {call}");
        *value << 12
    }

    fn equals(&self, a: &u64, b: &u64) -> bool {
        a == b
    }
}

/// Counts the drops of the values it creates.
#[derive(Clone, Debug, Default)]
pub(crate) struct DropCounter {
    dropped: Arc<AtomicU32>,
}

impl DropCounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn track<K>(&self, key: K) -> Tracked<K> {
        Tracked {
            key,
            dropped: Arc::clone(&self.dropped),
        }
    }

    pub(crate) fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Acquire)
    }
}

/// A value that bumps its [`DropCounter`] when dropped. Hashes and compares by
/// its key only.
#[derive(Debug)]
pub(crate) struct Tracked<K> {
    pub(crate) key: K,
    dropped: Arc<AtomicU32>,
}

impl<K> Drop for Tracked<K> {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::AcqRel);
    }
}

impl<K: PartialEq> PartialEq for Tracked<K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Eq> Eq for Tracked<K> {}

impl<K: Hash> Hash for Tracked<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
