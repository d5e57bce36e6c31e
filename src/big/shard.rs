use super::lock::{LockState, ShardLock};
use crate::{
    common::error::InvariantError,
    table::{probe::Probe, Table},
};

use std::{
    cell::UnsafeCell,
    fmt,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicUsize, Ordering},
};

/// One independent partition of a `BigSet`: a table guarded by its own lock.
pub(crate) struct Shard<T> {
    lock: ShardLock,
    // A copy of the table's length, stored under the write lock and readable
    // without any lock.
    len: AtomicUsize,
    table: UnsafeCell<Table<T>>,
}

// The table is only reached through the guards below, which hold the lock.
// Readers share `&T` between threads and writers move values in and out.
unsafe impl<T: Send + Sync> Sync for Shard<T> {}

impl<T> Default for Shard<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Shard<T> {
    pub(crate) fn new() -> Self {
        Self {
            lock: ShardLock::new(),
            len: AtomicUsize::new(0),
            table: UnsafeCell::new(Table::new()),
        }
    }

    /// Returns `true` if the shard held no value when last released by a
    /// writer. Takes no lock, so the answer may already be stale.
    #[inline]
    pub(crate) fn looks_empty(&self) -> bool {
        self.len.load(Ordering::Acquire) == 0
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub(crate) fn read(&self) -> ReadGuard<'_, T> {
        self.lock.start_reading();
        ReadGuard { shard: self }
    }

    pub(crate) fn write(&self) -> WriteGuard<'_, T> {
        self.lock.start_writing();
        WriteGuard { shard: self }
    }

    #[cfg(test)]
    pub(crate) fn lock_state(&self) -> LockState {
        self.lock.state()
    }
}

impl<T> Drop for Shard<T> {
    fn drop(&mut self) {
        // Only reachable with a leaked accessor.
        debug_assert_eq!(self.lock.state(), LockState::Idle, "Dropping a locked shard");
    }
}

impl<T> fmt::Debug for Shard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("lock", &self.lock)
            .field("len", &self.len())
            .finish()
    }
}

/// A held read lock on a shard.
pub(crate) struct ReadGuard<'a, T> {
    shard: &'a Shard<T>,
}

impl<'a, T> ReadGuard<'a, T> {
    /// Upgrades to the write lock in place. Gives the read guard back if
    /// another writer is already waiting for the shard.
    pub(crate) fn try_upgrade(self) -> Result<WriteGuard<'a, T>, Self> {
        if self.shard.lock.try_change_from_read_to_write() {
            let shard = self.shard;
            std::mem::forget(self);
            Ok(WriteGuard { shard })
        } else {
            Err(self)
        }
    }

    /// Checks the table, and that the unlocked copy of its length is current.
    pub(crate) fn validate(&self, rehash: impl Fn(&T) -> u64) -> Result<(), InvariantError> {
        self.deref().validate(rehash)?;

        let recorded = self.shard.len();
        if recorded != self.len() {
            return Err(InvariantError::SizeMismatch {
                recorded,
                counted: self.len(),
            });
        }
        Ok(())
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = Table<T>;

    fn deref(&self) -> &Table<T> {
        // SAFETY: The read lock is held, so no writer can mutate the table.
        unsafe { &*self.shard.table.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.shard.lock.stop_reading();
    }
}

/// A held write lock on a shard.
pub(crate) struct WriteGuard<'a, T> {
    shard: &'a Shard<T>,
}

impl<'a, T> WriteGuard<'a, T> {
    /// Turns the write lock into a read lock without releasing the shard.
    pub(crate) fn downgrade(self) -> ReadGuard<'a, T> {
        self.publish_len();
        self.shard.lock.change_from_write_to_read();

        let shard = self.shard;
        std::mem::forget(self);
        ReadGuard { shard }
    }

    /// Inserts a value `probe` did not find, growing the table if needed.
    /// Returns the index of the value.
    pub(crate) fn insert_new(
        &mut self,
        probe: Probe,
        hash: u64,
        value: T,
        rehash: impl Fn(&T) -> u64,
    ) -> usize {
        let index = self.deref_mut().insert_new(probe, hash, value, rehash);
        self.publish_len();
        index
    }

    pub(crate) fn erase(&mut self, index: usize) -> Option<T> {
        let value = self.deref_mut().erase(index);
        self.publish_len();
        value
    }

    fn publish_len(&self) {
        self.shard.len.store(self.len(), Ordering::Release);
    }
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = Table<T>;

    fn deref(&self) -> &Table<T> {
        // SAFETY: The write lock is held, so nobody else touches the table.
        unsafe { &*self.shard.table.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Table<T> {
        // SAFETY: The write lock is held, and `&mut self` makes this the only
        // reference handed out by this guard.
        unsafe { &mut *self.shard.table.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.publish_len();
        self.shard.lock.stop_writing();
    }
}
