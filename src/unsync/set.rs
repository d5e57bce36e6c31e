use crate::{
    common::error::InvariantError,
    hasher::{Hasher, StdHasher},
    table::{self, Table},
};

use std::{fmt, iter::FusedIterator};

/// A single-threaded hash set.
///
/// `Set` cannot be shared between threads. It is the container to reach for
/// when a [`BigSet`][big-set] is not needed, and it can be iterated.
///
/// # Examples
///
/// ```rust
/// use bigset::unsync::Set;
///
/// let mut set = Set::new();
/// assert!(set.insert(3));
/// assert!(set.insert(1));
/// assert!(!set.insert(3));
///
/// assert!(set.contains(&1));
/// assert_eq!(set.remove(&1), Some(1));
///
/// let values: Vec<_> = set.iter().copied().collect();
/// assert_eq!(values, vec![3]);
/// ```
///
/// [big-set]: ../struct.BigSet.html
pub struct Set<T, H = StdHasher> {
    table: Table<T>,
    hasher: H,
}

impl<T> Set<T, StdHasher> {
    /// Creates an empty `Set`. It does not allocate until the first
    /// insertion.
    pub fn new() -> Self {
        Self::with_hasher(StdHasher::default())
    }
}

impl<T, H: Default> Default for Set<T, H> {
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<T, H> Set<T, H> {
    /// Creates an empty `Set` that uses `hasher` to hash and compare values.
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            table: Table::new(),
            hasher,
        }
    }

    /// Returns the number of values in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no values.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots allocated by the set.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns a reference to the set's [`Hasher`].
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Iterates over the values of the set in an unspecified order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Removes every value and releases the slot array.
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

impl<T, H: Hasher<T>> Set<T, H> {
    /// Returns `true` if the set contains a value equal to `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.get(value).is_some()
    }

    /// Returns a reference to the stored value equal to `value`.
    pub fn get(&self, value: &T) -> Option<&T> {
        let probe = self
            .table
            .find(self.hasher.hash(value), |v| self.hasher.equals(v, value));
        if probe.found {
            self.table.get(probe.index)
        } else {
            None
        }
    }

    /// Inserts a value. Returns `true` if it was not present yet; otherwise
    /// the set is left unchanged and `value` is dropped.
    pub fn insert(&mut self, value: T) -> bool {
        let hash = self.hasher.hash(&value);
        let hasher = &self.hasher;

        let probe = self.table.find(hash, |v| hasher.equals(v, &value));
        if probe.found {
            return false;
        }
        self.table.insert_new(probe, hash, value, |v| hasher.hash(v));
        true
    }

    /// Removes the value equal to `value` and returns it.
    pub fn remove(&mut self, value: &T) -> Option<T> {
        let probe = self
            .table
            .find(self.hasher.hash(value), |v| self.hasher.equals(v, value));
        if probe.found {
            self.table.erase(probe.index)
        } else {
            None
        }
    }

    /// Removes the value equal to `value`. Returns `true` if there was one.
    pub fn erase(&mut self, value: &T) -> bool {
        self.remove(value).is_some()
    }

    /// Checks the internal invariants of the set.
    pub fn validate(&self) -> Result<(), InvariantError> {
        self.table.validate(|v| self.hasher.hash(v))
    }
}

impl<T, H: Hasher<T>> Extend<T> for Set<T, H> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T, H: Hasher<T> + Default> FromIterator<T> for Set<T, H> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<'a, T, H> IntoIterator for &'a Set<T, H> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T: fmt::Debug, H> fmt::Debug for Set<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// An iterator over the values of a [`Set`].
///
/// Created by [`Set::iter`].
pub struct Iter<'a, T> {
    inner: table::Iter<'a, T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}
