use super::shard::{ReadGuard, WriteGuard};

use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicUsize, Ordering},
};

/// Shared access to a value stored in a [`BigSet`][bigset].
///
/// A `ReadAccessor` holds the read lock of the shard the value lives in.
/// Other readers of the shard can proceed, but writers to the shard wait until
/// every `ReadAccessor` on it is dropped. References obtained from an accessor
/// cannot outlive it.
///
/// Returned by [`BigSet::find`][find] and [`BigSet::insert_and_get`][insert].
///
/// [bigset]: ./struct.BigSet.html
/// [find]: ./struct.BigSet.html#method.find
/// [insert]: ./struct.BigSet.html#method.insert_and_get
pub struct ReadAccessor<'a, T> {
    guard: ReadGuard<'a, T>,
    index: usize,
}

impl<'a, T> ReadAccessor<'a, T> {
    pub(crate) fn new(guard: ReadGuard<'a, T>, index: usize) -> Self {
        debug_assert!(guard.get(index).is_some());
        Self { guard, index }
    }

    /// Returns a reference to the value.
    pub fn get(&self) -> &T {
        match self.guard.get(self.index) {
            Some(value) => value,
            None => unreachable!("Accessor bound to an empty slot"),
        }
    }
}

impl<T> Deref for ReadAccessor<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadAccessor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadAccessor").field(self.get()).finish()
    }
}

/// Exclusive access to a value stored in a [`BigSet`][bigset].
///
/// A `WriteAccessor` holds the write lock of the shard the value lives in.
/// Every other operation on the shard waits until it is dropped, so keep it
/// short-lived. It can be turned into a [`ReadAccessor`] with
/// [`downgrade`][downgrade], or used to remove the value with
/// [`BigSet::erase_entry`][erase-entry].
///
/// Mutating the value in a way that changes its hash or its equality is a
/// logic error. See [`Hasher`][hasher].
///
/// Returned by [`BigSet::find_mut`][find-mut].
///
/// [bigset]: ./struct.BigSet.html
/// [downgrade]: #method.downgrade
/// [erase-entry]: ./struct.BigSet.html#method.erase_entry
/// [find-mut]: ./struct.BigSet.html#method.find_mut
/// [hasher]: ./trait.Hasher.html
pub struct WriteAccessor<'a, T> {
    guard: WriteGuard<'a, T>,
    index: usize,
    // The length counter of the container the value belongs to.
    container_len: &'a AtomicUsize,
}

impl<'a, T> WriteAccessor<'a, T> {
    pub(crate) fn new(
        guard: WriteGuard<'a, T>,
        index: usize,
        container_len: &'a AtomicUsize,
    ) -> Self {
        debug_assert!(guard.get(index).is_some());
        Self {
            guard,
            index,
            container_len,
        }
    }

    /// Returns a reference to the value.
    pub fn get(&self) -> &T {
        match self.guard.get(self.index) {
            Some(value) => value,
            None => unreachable!("Accessor bound to an empty slot"),
        }
    }

    /// Returns a mutable reference to the value.
    pub fn get_mut(&mut self) -> &mut T {
        match self.guard.get_mut(self.index) {
            Some(value) => value,
            None => unreachable!("Accessor bound to an empty slot"),
        }
    }

    /// Releases exclusive access but keeps the shard read-locked, so that the
    /// value stays where it is.
    pub fn downgrade(self) -> ReadAccessor<'a, T> {
        ReadAccessor::new(self.guard.downgrade(), self.index)
    }

    pub(crate) fn belongs_to(&self, container_len: &AtomicUsize) -> bool {
        std::ptr::eq(self.container_len, container_len)
    }

    /// Removes the value from its shard, then releases the lock.
    pub(crate) fn erase(self) -> T {
        let Self {
            mut guard,
            index,
            container_len,
        } = self;

        match guard.erase(index) {
            Some(value) => {
                container_len.fetch_sub(1, Ordering::Relaxed);
                value
            }
            None => unreachable!("Accessor bound to an empty slot"),
        }
    }
}

impl<T> Deref for WriteAccessor<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T> DerefMut for WriteAccessor<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut()
    }
}

impl<T: fmt::Debug> fmt::Debug for WriteAccessor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WriteAccessor").field(self.get()).finish()
    }
}
