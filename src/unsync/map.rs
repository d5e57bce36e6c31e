use crate::{
    common::error::InvariantError,
    hasher::{Hasher, StdHasher},
    table::{self, Table},
};

use std::{fmt, iter::FusedIterator, mem};

/// A single-threaded hash map.
///
/// Unlike [`BigMap`][big-map], `Map::insert` replaces the value of an existing
/// key and returns the old one, like `std::collections::HashMap` does.
///
/// # Examples
///
/// ```rust
/// use bigset::unsync::Map;
///
/// let mut map = Map::new();
/// assert_eq!(map.insert("a", 1), None);
/// assert_eq!(map.insert("a", 2), Some(1));
///
/// if let Some(v) = map.get_mut(&"a") {
///     *v += 1;
/// }
/// assert_eq!(map.get(&"a"), Some(&3));
///
/// assert_eq!(map.remove(&"a"), Some(3));
/// assert!(map.is_empty());
/// ```
///
/// [big-map]: ../struct.BigMap.html
pub struct Map<K, V, H = StdHasher> {
    table: Table<(K, V)>,
    hasher: H,
}

impl<K, V> Map<K, V, StdHasher> {
    /// Creates an empty `Map`. It does not allocate until the first
    /// insertion.
    pub fn new() -> Self {
        Self::with_hasher(StdHasher::default())
    }
}

impl<K, V, H: Default> Default for Map<K, V, H> {
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<K, V, H> Map<K, V, H> {
    /// Creates an empty `Map` that uses `hasher` to hash and compare keys.
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            table: Table::new(),
            hasher,
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots allocated by the map.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns a reference to the map's [`Hasher`].
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Iterates over the entries of the map in an unspecified order.
    pub fn iter(&self) -> MapIter<'_, K, V> {
        MapIter {
            inner: self.table.iter(),
        }
    }

    /// Iterates over the keys of the map in an unspecified order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Iterates over the values of the map in an unspecified order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Iterates over mutable references to the values of the map, in an
    /// unspecified order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Removes every entry and releases the slot array.
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

impl<K, V, H: Hasher<K>> Map<K, V, H> {
    /// Returns the slot index of `key`'s entry.
    fn index_of(&self, key: &K) -> Option<usize> {
        let probe = self
            .table
            .find(self.hasher.hash(key), |(k, _)| self.hasher.equals(k, key));
        probe.found.then_some(probe.index)
    }

    /// Returns `true` if the map contains an entry for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.index_of(key).is_some()
    }

    /// Returns a reference to the value of `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let index = self.index_of(key)?;
        self.table.get(index).map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value of `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = self.index_of(key)?;
        self.table.get_mut(index).map(|(_, v)| v)
    }

    /// Inserts an entry. If the map already had one for `key`, its value is
    /// replaced and the old value returned; the key is not updated.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hasher.hash(&key);
        let hasher = &self.hasher;

        let probe = self.table.find(hash, |(k, _)| hasher.equals(k, &key));
        if probe.found {
            let (_, old) = self.table.get_mut(probe.index)?;
            return Some(mem::replace(old, value));
        }

        self.table.insert_new(probe, hash, (key, value), |(k, _)| hasher.hash(k));
        None
    }

    /// Removes the entry of `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes the entry of `key` and returns it.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let index = self.index_of(key)?;
        self.table.erase(index)
    }

    /// Checks the internal invariants of the map.
    pub fn validate(&self) -> Result<(), InvariantError> {
        self.table.validate(|(k, _)| self.hasher.hash(k))
    }
}

impl<K, V, H: Hasher<K>> Extend<(K, V)> for Map<K, V, H> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, H: Hasher<K> + Default> FromIterator<(K, V)> for Map<K, V, H> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K: fmt::Debug, V: fmt::Debug, H> fmt::Debug for Map<K, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, H> IntoIterator for &'a Map<K, V, H> {
    type Item = (&'a K, &'a V);
    type IntoIter = MapIter<'a, K, V>;

    fn into_iter(self) -> MapIter<'a, K, V> {
        self.iter()
    }
}

/// An iterator over the entries of a [`Map`].
///
/// Created by [`Map::iter`].
pub struct MapIter<'a, K, V> {
    inner: table::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for MapIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<(&'a K, &'a V)> {
        self.inner.next().map(|entry| (&entry.0, &entry.1))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for MapIter<'_, K, V> {}

impl<K, V> FusedIterator for MapIter<'_, K, V> {}

impl<K, V> Clone for MapIter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// An iterator over the keys of a [`Map`].
///
/// Created by [`Map::keys`].
pub struct Keys<'a, K, V> {
    inner: MapIter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// An iterator over the values of a [`Map`].
///
/// Created by [`Map::values`].
pub struct Values<'a, K, V> {
    inner: MapIter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

impl<K, V> FusedIterator for Values<'_, K, V> {}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// A mutable iterator over the values of a [`Map`].
///
/// Created by [`Map::values_mut`].
pub struct ValuesMut<'a, K, V> {
    inner: table::IterMut<'a, (K, V)>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}
