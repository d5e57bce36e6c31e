use super::{
    accessor::{ReadAccessor, WriteAccessor},
    shard::{ReadGuard, Shard, WriteGuard},
};
use crate::{
    common::{
        constants::{NUM_SHARDS, SHARD_BITS},
        error::InvariantError,
        split_hash,
    },
    hasher::{Hasher, StdHasher},
};

use crossbeam_utils::CachePadded;
use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

/// A thread-safe hash set, split into 4096 independently locked shards.
///
/// The 12 least significant bits of a value's hash select its shard; the
/// remaining bits place it inside the shard's open addressing table. Each
/// shard has its own reader/writer lock, so operations on different shards
/// never wait for each other, and lookups in the same shard run concurrently.
///
/// Lookups return accessors instead of references. A [`ReadAccessor`] keeps
/// its shard read-locked and a [`WriteAccessor`] keeps it write-locked until
/// the accessor is dropped.
///
/// By default, `BigSet` uses [`StdHasher`], which hashes with the algorithm of
/// `std::collections::HashMap`. Any other [`Hasher`] can be supplied with
/// [`with_hasher`][with-hasher].
///
/// # Deadlocks
///
/// Like a `RwLock`, the shard locks are not reentrant, and a waiting writer
/// blocks new readers. Calling any method of the set on a shard while the
/// same thread holds an accessor on that shard may deadlock: a writing
/// method (`insert`, `erase`, `find_mut`, ...) always does, and a reading
/// one (`find`, `contains`, `validate`, ...) does as soon as another thread
/// is waiting to write to that shard. Values with different hashes may share
/// a shard, so do not call anything on the set while an accessor is alive.
///
/// # Examples
///
/// ```rust
/// use bigset::BigSet;
///
/// let set = BigSet::new();
///
/// assert!(set.insert("apple".to_string()));
/// assert!(!set.insert("apple".to_string()));
/// assert_eq!(set.len(), 1);
///
/// let (accessor, inserted) = set.insert_and_get("pear".to_string());
/// assert!(inserted);
/// assert_eq!(accessor.as_str(), "pear");
/// drop(accessor);
///
/// assert!(set.erase(&"apple".to_string()));
/// assert!(!set.contains(&"apple".to_string()));
/// ```
///
/// [with-hasher]: #method.with_hasher
pub struct BigSet<T, H = StdHasher> {
    shards: Box<[CachePadded<Shard<T>>]>,
    hasher: H,
    len: AtomicUsize,
}

impl<T> BigSet<T, StdHasher> {
    /// Creates an empty `BigSet`.
    ///
    /// All 4096 shards are allocated up front. A shard does not allocate its
    /// slot array until a value is inserted into it.
    pub fn new() -> Self {
        Self::with_hasher(StdHasher::default())
    }
}

impl<T, H: Default> Default for BigSet<T, H> {
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<T, H> BigSet<T, H> {
    /// Creates an empty `BigSet` that uses `hasher` to hash and compare
    /// values.
    pub fn with_hasher(hasher: H) -> Self {
        let shards = std::iter::repeat_with(|| CachePadded::new(Shard::new()))
            .take(NUM_SHARDS)
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            hasher,
            len: AtomicUsize::new(0),
        }
    }

    /// Returns the number of values in the set.
    ///
    /// Other threads can insert or erase values at any time, so the result
    /// may be out of date as soon as it is returned.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns `true` if the set contains no values.
    ///
    /// Subject to the same caveat as [`len`][len].
    ///
    /// [len]: #method.len
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a reference to the set's [`Hasher`].
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Returns the number of shards, which is always 4096.
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Returns the number of slots allocated by the `index`-th shard.
    ///
    /// Waits for the shard's read lock.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`num_shards`][num-shards].
    ///
    /// [num-shards]: #method.num_shards
    pub fn shard_capacity(&self, index: usize) -> usize {
        self.shards[index].read().capacity()
    }

    /// Returns the number of values held by the `index`-th shard.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`num_shards`][num-shards].
    ///
    /// [num-shards]: #method.num_shards
    pub fn shard_len(&self, index: usize) -> usize {
        self.shards[index].len()
    }
}

impl<T, H: Hasher<T>> BigSet<T, H> {
    /// Returns a [`ReadAccessor`] to the value equal to `value`, or `None` if
    /// there is none.
    ///
    /// The accessor keeps the value's shard read-locked until it is dropped.
    pub fn find(&self, value: &T) -> Option<ReadAccessor<'_, T>> {
        let hash = self.hasher.hash(value);
        self.find_with(hash, |v| self.hasher.equals(v, value))
    }

    /// Returns a [`WriteAccessor`] to the value equal to `value`, or `None` if
    /// there is none.
    ///
    /// The accessor keeps the value's shard write-locked until it is dropped.
    pub fn find_mut(&self, value: &T) -> Option<WriteAccessor<'_, T>> {
        let hash = self.hasher.hash(value);
        self.find_mut_with(hash, |v| self.hasher.equals(v, value))
    }

    /// Returns `true` if the set contains a value equal to `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.find(value).is_some()
    }

    /// Inserts a value into the set.
    ///
    /// Returns `true` if the value was inserted, or `false` if an equal value
    /// was already present. In the latter case the set is left unchanged and
    /// `value` is dropped.
    pub fn insert(&self, value: T) -> bool {
        matches!(self.insert_locked(value), Insertion::Inserted(..))
    }

    /// Inserts a value into the set, and returns a [`ReadAccessor`] to the
    /// value in the set along with `true` if it was inserted.
    ///
    /// If an equal value was already present, the accessor refers to that
    /// value, `value` is dropped, and `false` is returned.
    pub fn insert_and_get(&self, value: T) -> (ReadAccessor<'_, T>, bool) {
        match self.insert_locked(value) {
            Insertion::Present(guard, index) => (ReadAccessor::new(guard, index), false),
            Insertion::Inserted(guard, index) => {
                (ReadAccessor::new(guard.downgrade(), index), true)
            }
        }
    }

    /// Removes the value equal to `value` from the set. Returns `true` if
    /// there was one.
    pub fn erase(&self, value: &T) -> bool {
        self.take(value).is_some()
    }

    /// Removes the value equal to `value` from the set and returns it.
    pub fn take(&self, value: &T) -> Option<T> {
        let hash = self.hasher.hash(value);
        self.erase_with(hash, |v| self.hasher.equals(v, value))
    }

    /// Removes the value an accessor refers to and returns it. The accessor's
    /// lock is released.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the accessor was obtained from another
    /// container.
    pub fn erase_entry(&self, accessor: WriteAccessor<'_, T>) -> T {
        debug_assert!(
            accessor.belongs_to(&self.len),
            "Erasing through an accessor of another container"
        );
        accessor.erase()
    }

    /// Checks the internal invariants of every shard.
    ///
    /// Each shard is read-locked while it is checked, so this can run while
    /// other threads use the set; values inserted or erased concurrently may
    /// or may not be seen.
    pub fn validate(&self) -> Result<(), InvariantError> {
        for (index, shard) in self.shards.iter().enumerate() {
            let guard = shard.read();
            guard
                .validate(|v| self.residual_hash(v))
                .map_err(|source| InvariantError::InShard {
                    shard: index,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    #[inline]
    fn residual_hash(&self, value: &T) -> u64 {
        self.hasher.hash(value) >> SHARD_BITS
    }

    pub(crate) fn find_with(
        &self,
        hash: u64,
        eq: impl FnMut(&T) -> bool,
    ) -> Option<ReadAccessor<'_, T>> {
        let (index, hash) = split_hash(hash);
        let shard = &self.shards[index];

        // A shard only leaves the empty state under its write lock, so seeing
        // it empty is as good as finding nothing under the read lock.
        if shard.looks_empty() {
            return None;
        }

        let guard = shard.read();
        let probe = guard.find(hash, eq);
        if !probe.found {
            return None;
        }
        Some(ReadAccessor::new(guard, probe.index))
    }

    pub(crate) fn find_mut_with(
        &self,
        hash: u64,
        eq: impl FnMut(&T) -> bool,
    ) -> Option<WriteAccessor<'_, T>> {
        let (index, hash) = split_hash(hash);
        let shard = &self.shards[index];

        if shard.looks_empty() {
            return None;
        }

        let guard = shard.write();
        let probe = guard.find(hash, eq);
        if !probe.found {
            return None;
        }
        Some(WriteAccessor::new(guard, probe.index, &self.len))
    }

    pub(crate) fn erase_with(&self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<T> {
        let (index, hash) = split_hash(hash);
        let shard = &self.shards[index];

        if shard.looks_empty() {
            return None;
        }

        // Erasing is rarer than looking up, so there is no optimistic read
        // phase.
        let mut guard = shard.write();
        let probe = guard.find(hash, eq);
        if !probe.found {
            return None;
        }

        let value = guard.erase(probe.index);
        if value.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        value
    }

    /// Locks the shard of `value` and inserts `value` unless an equal value is
    /// present. The shard stays locked by the returned guard.
    fn insert_locked(&self, value: T) -> Insertion<'_, T> {
        let (shard_index, hash) = split_hash(self.hasher.hash(&value));
        let shard = &self.shards[shard_index];
        let eq = |v: &T| self.hasher.equals(v, &value);

        let (mut guard, probe) = if shard.looks_empty() {
            let guard = shard.write();
            let probe = guard.find(hash, eq);
            (guard, probe)
        } else {
            // Most inserts of an already present value can be answered
            // under the read lock, in parallel with other readers.
            let guard = shard.read();
            let probe = guard.find(hash, eq);
            if probe.found {
                return Insertion::Present(guard, probe.index);
            }

            match guard.try_upgrade() {
                // No other writer ran in between, so the probe is still valid.
                Ok(guard) => (guard, probe),
                Err(guard) => {
                    drop(guard);

                    #[cfg(feature = "logging")]
                    log::trace!("Shard {shard_index}: lock upgrade aborted, waiting for a writer");

                    let guard = shard.write();
                    let probe = guard.find(hash, eq);
                    (guard, probe)
                }
            }
        };

        if probe.found {
            // Another thread inserted an equal value while the lock was
            // released, or before the shard was seen non-empty.
            return Insertion::Present(guard.downgrade(), probe.index);
        }

        #[cfg(feature = "logging")]
        let old_capacity = guard.capacity();
        let index = guard.insert_new(probe, hash, value, |v| self.residual_hash(v));
        self.len.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "logging")]
        if guard.capacity() != old_capacity {
            log::trace!(
                "Shard {shard_index}: grew from {old_capacity} to {} slots ({} values)",
                guard.capacity(),
                guard.len()
            );
        }

        Insertion::Inserted(guard, index)
    }
}

enum Insertion<'a, T> {
    Present(ReadGuard<'a, T>, usize),
    Inserted(WriteGuard<'a, T>, usize),
}

impl<T, H> fmt::Debug for BigSet<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigSet")
            .field("len", &self.len())
            .field("num_shards", &self.num_shards())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::BigSet;
    use crate::big::lock::{LockState, Transition};
    use crate::common::{
        constants::NUM_SHARDS,
        test_utils::{DropCounter, FailingHasher, SingleShardHasher, TrivialHasher},
    };

    use std::{
        mem::size_of,
        panic::{catch_unwind, AssertUnwindSafe},
        sync::{Arc, Barrier},
        thread,
    };

    #[test]
    fn shards_do_not_share_cache_lines() {
        let set = BigSet::<u64, TrivialHasher>::default();
        assert_eq!(set.num_shards(), NUM_SHARDS);
        assert!(size_of::<crossbeam_utils::CachePadded<super::Shard<u64>>>() >= 64);
    }

    #[test]
    fn insert_then_erase() {
        let set = BigSet::<u64, _>::with_hasher(TrivialHasher);

        assert!(set.insert(0));
        assert!(!set.insert(0));
        assert_eq!(set.len(), 1);

        assert!(set.erase(&0));
        assert!(set.is_empty());
        assert!(!set.erase(&0));

        assert_eq!(set.validate(), Ok(()));
    }

    #[test]
    fn accessors_hold_their_shard() {
        let set = BigSet::<u64, _>::with_hasher(TrivialHasher);
        set.insert(5u64);

        {
            let first = set.find(&5).unwrap();
            let second = set.find(&5).unwrap();
            assert_eq!(*first, *second);
            assert_eq!(set.shards[5].lock_state(), LockState::Reading(2));
        }
        assert_eq!(set.shards[5].lock_state(), LockState::Idle);

        {
            let mut accessor = set.find_mut(&5).unwrap();
            assert_eq!(*accessor.get_mut(), 5);
            let accessor = accessor.downgrade();
            assert_eq!(set.shards[5].lock_state(), LockState::Reading(1));
            assert_eq!(*accessor, 5);
        }

        let accessor = set.find_mut(&5).unwrap();
        assert_eq!(set.erase_entry(accessor), 5);
        assert_eq!(set.shards[5].lock_state(), LockState::Idle);
        assert!(set.find(&5).is_none());
        assert!(set.find_mut(&5).is_none());
    }

    #[test]
    fn pending_writer_blocks_readers_of_an_accessor_holder() {
        let set = Arc::new(BigSet::<u64, _>::with_hasher(SingleShardHasher));
        set.insert(1u64);

        let accessor = set.find(&1).unwrap();
        let writer = {
            let set = Arc::clone(&set);
            thread::spawn(move || set.insert(2))
        };

        // The writer upgrades and then waits for the accessor to go away.
        while set.shards[0].lock_state() != LockState::WritePending(1) {
            thread::yield_now();
        }
        // From here on, a read by this thread would wait for the writer, which
        // waits for this thread: `set.contains(&1)` would never return.
        assert_eq!(set.shards[0].lock_state().on_start_reading(), Transition::Wait);

        drop(accessor);
        assert!(writer.join().unwrap());
        assert!(set.contains(&1) && set.contains(&2));
        assert_eq!(set.shards[0].lock_state(), LockState::Idle);
    }

    #[test]
    fn insert_and_get_downgrades() {
        let set = BigSet::<u64, _>::with_hasher(TrivialHasher);

        let (accessor, inserted) = set.insert_and_get(42u64);
        assert!(inserted);
        assert_eq!(*accessor, 42);
        assert_eq!(set.shards[42].lock_state(), LockState::Reading(1));
        drop(accessor);

        let (accessor, inserted) = set.insert_and_get(42u64);
        assert!(!inserted);
        assert_eq!(*accessor, 42);
        drop(accessor);

        assert_eq!(set.len(), 1);
    }

    #[test]
    fn growth_follows_the_prime_table() {
        let set = BigSet::<u64, _>::with_hasher(SingleShardHasher);
        assert_eq!(set.shard_capacity(0), 0);

        set.insert(0u64);
        assert_eq!(set.shard_capacity(0), 5);

        // No collisions with consecutive residual hashes, so the shard fills up
        // before it grows.
        for value in 1..5 {
            set.insert(value);
        }
        assert_eq!(set.shard_capacity(0), 5);
        set.insert(5);
        assert_eq!(set.shard_capacity(0), 11);

        for value in 6..1000 {
            set.insert(value);
        }
        assert_eq!(set.shard_len(0), 1000);
        assert_eq!(set.shard_capacity(0), 1237);
        for value in 0..1000 {
            assert!(set.contains(&value));
        }
        assert_eq!(set.validate(), Ok(()));

        // Every other shard is still unallocated.
        assert!((1..set.num_shards()).all(|i| set.shard_capacity(i) == 0));
    }

    #[test]
    fn values_are_dropped_once() {
        let counter = DropCounter::new();

        {
            let set = BigSet::new();
            for key in 0..100 {
                assert!(set.insert(counter.track(key)));
            }
            // The rejected duplicate is dropped right away.
            assert!(!set.insert(counter.track(7)));
            assert_eq!(counter.dropped(), 1);

            let taken = set.take(&counter.track(3)).unwrap();
            assert_eq!(counter.dropped(), 2);
            drop(taken);
            assert_eq!(counter.dropped(), 3);

            let accessor = set.find_mut(&counter.track(4)).unwrap();
            assert_eq!(counter.dropped(), 4);
            drop(set.erase_entry(accessor));
            assert_eq!(counter.dropped(), 5);
        }

        assert_eq!(counter.dropped(), 5 + 98);
    }

    #[test]
    fn concurrent_inserts_of_the_same_values() {
        const NUM_THREADS: usize = 8;
        const MAX_VALUE: u64 = 2000;

        let set = Arc::new(BigSet::<u64, _>::with_hasher(SingleShardHasher));
        let barrier = Arc::new(Barrier::new(NUM_THREADS));

        let threads: Vec<_> = (0..NUM_THREADS)
            .map(|_| {
                let set = Arc::clone(&set);
                let barrier = Arc::clone(&barrier);

                thread::spawn(move || {
                    barrier.wait();
                    (0..MAX_VALUE).filter(|v| set.insert(*v)).count()
                })
            })
            .collect();

        let inserted: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();

        assert_eq!(inserted, MAX_VALUE as usize);
        assert_eq!(set.len(), MAX_VALUE as usize);
        assert_eq!(set.validate(), Ok(()));
        assert_eq!(set.shards[0].lock_state(), LockState::Idle);
    }

    #[test]
    fn hasher_panic_during_growth() {
        // The sixth insert overflows shard 0 and fails while rehashing.
        let set = BigSet::<u64, _>::with_hasher(FailingHasher::new(9));
        for value in 0..5 {
            assert!(set.insert(value));
        }
        assert_eq!(set.shard_capacity(0), 5);

        assert!(catch_unwind(AssertUnwindSafe(|| set.insert(5))).is_err());

        assert_eq!(set.shards[0].lock_state(), LockState::Idle);
        assert_eq!(set.len(), 5);
        assert_eq!(set.shard_len(0), 5);
        assert_eq!(set.shard_capacity(0), 5);
        assert_eq!(set.validate(), Ok(()));
        assert!((0..5).all(|value| set.contains(&value)));

        assert!(set.insert(5));
        assert_eq!(set.shard_len(0), 6);
        assert_eq!(set.validate(), Ok(()));
    }
}
