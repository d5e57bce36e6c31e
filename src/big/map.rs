use super::{
    accessor::{ReadAccessor, WriteAccessor},
    set::BigSet,
};
use crate::{
    common::error::InvariantError,
    hasher::{Hasher, KeyHasher, StdHasher},
};

use std::{
    fmt,
    ops::{Deref, DerefMut},
};

/// A thread-safe hash map, split into 4096 independently locked shards.
///
/// `BigMap<K, V, H>` is a [`BigSet`] of `(K, V)` pairs that hashes and compares
/// the keys only, so everything said about `BigSet` holds here too: accessors
/// keep their shard locked while they are alive, and calling any method of the
/// map while holding an accessor may deadlock (see the `Deadlocks` section of
/// [`BigSet`]). Do not call anything on the map while an accessor is alive.
///
/// Unlike `std::collections::HashMap`, [`insert`][insert] never replaces the
/// value of an existing key. Use [`find_mut`][find-mut] to update a value in
/// place.
///
/// # Examples
///
/// ```rust
/// use bigset::BigMap;
///
/// let map = BigMap::new();
///
/// assert!(map.insert("a", 1));
/// assert!(!map.insert("a", 2));
/// assert_eq!(map.get(&"a"), Some(1));
///
/// if let Some(mut accessor) = map.find_mut(&"a") {
///     *accessor.value_mut() += 10;
/// }
/// assert_eq!(map.get(&"a"), Some(11));
///
/// assert_eq!(map.remove(&"a"), Some(11));
/// assert!(map.is_empty());
/// ```
///
/// [insert]: #method.insert
/// [find-mut]: #method.find_mut
pub struct BigMap<K, V, H = StdHasher> {
    set: BigSet<(K, V), KeyHasher<H>>,
}

impl<K, V> BigMap<K, V, StdHasher> {
    /// Creates an empty `BigMap`.
    pub fn new() -> Self {
        Self::with_hasher(StdHasher::default())
    }
}

impl<K, V, H: Default> Default for BigMap<K, V, H> {
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<K, V, H> BigMap<K, V, H> {
    /// Creates an empty `BigMap` that uses `hasher` to hash and compare keys.
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            set: BigSet::with_hasher(KeyHasher::new(hasher)),
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Returns a reference to the map's key [`Hasher`].
    pub fn hasher(&self) -> &H {
        self.set.hasher().inner()
    }
}

impl<K, V, H: Hasher<K>> BigMap<K, V, H> {
    /// Returns a [`MapReadAccessor`] to the entry of `key`, or `None` if there
    /// is none.
    pub fn find(&self, key: &K) -> Option<MapReadAccessor<'_, K, V>> {
        let hasher = self.hasher();
        self.set
            .find_with(hasher.hash(key), |(k, _)| hasher.equals(k, key))
            .map(|inner| MapReadAccessor { inner })
    }

    /// Returns a [`MapWriteAccessor`] to the entry of `key`, or `None` if
    /// there is none.
    pub fn find_mut(&self, key: &K) -> Option<MapWriteAccessor<'_, K, V>> {
        let hasher = self.hasher();
        self.set
            .find_mut_with(hasher.hash(key), |(k, _)| hasher.equals(k, key))
            .map(|inner| MapWriteAccessor { inner })
    }

    /// Returns a clone of the value of `key`.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.find(key).map(|accessor| accessor.value().clone())
    }

    /// Returns `true` if the map contains an entry for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Inserts an entry unless the map already has one for `key`.
    ///
    /// Returns `true` if the entry was inserted. Otherwise, the map is left
    /// unchanged and `key` and `value` are dropped.
    pub fn insert(&self, key: K, value: V) -> bool {
        self.set.insert((key, value))
    }

    /// Inserts an entry unless the map already has one for `key`, and returns
    /// a [`MapReadAccessor`] to the entry in the map along with `true` if it
    /// was inserted.
    pub fn insert_and_get(&self, key: K, value: V) -> (MapReadAccessor<'_, K, V>, bool) {
        let (inner, inserted) = self.set.insert_and_get((key, value));
        (MapReadAccessor { inner }, inserted)
    }

    /// Removes the entry of `key`. Returns `true` if there was one.
    pub fn erase(&self, key: &K) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Removes the entry of `key` and returns its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes the entry of `key` and returns it.
    pub fn remove_entry(&self, key: &K) -> Option<(K, V)> {
        let hasher = self.hasher();
        self.set
            .erase_with(hasher.hash(key), |(k, _)| hasher.equals(k, key))
    }

    /// Removes the entry an accessor refers to and returns it. The accessor's
    /// lock is released.
    pub fn erase_entry(&self, accessor: MapWriteAccessor<'_, K, V>) -> (K, V) {
        self.set.erase_entry(accessor.inner)
    }

    /// Checks the internal invariants of every shard. See
    /// [`BigSet::validate`].
    pub fn validate(&self) -> Result<(), InvariantError> {
        self.set.validate()
    }
}

impl<K, V, H> fmt::Debug for BigMap<K, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigMap").field("len", &self.len()).finish()
    }
}

/// Shared access to an entry of a [`BigMap`]. Dereferences to the value.
///
/// Holds the read lock of the entry's shard until dropped, like
/// [`ReadAccessor`].
pub struct MapReadAccessor<'a, K, V> {
    inner: ReadAccessor<'a, (K, V)>,
}

impl<K, V> MapReadAccessor<'_, K, V> {
    /// Returns the key of the entry.
    pub fn key(&self) -> &K {
        &self.inner.get().0
    }

    /// Returns the value of the entry.
    pub fn value(&self) -> &V {
        &self.inner.get().1
    }
}

impl<K, V> Deref for MapReadAccessor<'_, K, V> {
    type Target = V;

    fn deref(&self) -> &V {
        self.value()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for MapReadAccessor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapReadAccessor")
            .field("key", self.key())
            .field("value", self.value())
            .finish()
    }
}

/// Exclusive access to an entry of a [`BigMap`]. Dereferences to the value.
///
/// Holds the write lock of the entry's shard until dropped, like
/// [`WriteAccessor`]. The key cannot be modified.
pub struct MapWriteAccessor<'a, K, V> {
    inner: WriteAccessor<'a, (K, V)>,
}

impl<'a, K, V> MapWriteAccessor<'a, K, V> {
    /// Returns the key of the entry.
    pub fn key(&self) -> &K {
        &self.inner.get().0
    }

    /// Returns the value of the entry.
    pub fn value(&self) -> &V {
        &self.inner.get().1
    }

    /// Returns a mutable reference to the value of the entry.
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.inner.get_mut().1
    }

    /// Releases exclusive access but keeps the shard read-locked.
    pub fn downgrade(self) -> MapReadAccessor<'a, K, V> {
        MapReadAccessor {
            inner: self.inner.downgrade(),
        }
    }
}

impl<K, V> Deref for MapWriteAccessor<'_, K, V> {
    type Target = V;

    fn deref(&self) -> &V {
        self.value()
    }
}

impl<K, V> DerefMut for MapWriteAccessor<'_, K, V> {
    fn deref_mut(&mut self) -> &mut V {
        self.value_mut()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for MapWriteAccessor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapWriteAccessor")
            .field("key", self.key())
            .field("value", self.value())
            .finish()
    }
}
