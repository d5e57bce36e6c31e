use std::{
    collections::hash_map::RandomState,
    hash::{BuildHasher, Hash, Hasher as _},
};

/// Supplies the hash function and the equality relation of a container.
///
/// It is required that the following property holds:
///
/// ```text
/// equals(a, b) -> hash(a) == hash(b)
/// ```
///
/// In other words, if two values are equal, their hashes must be equal.
///
/// `BigSet` and `BigMap` select a shard from the 12 least significant bits of
/// the hash and probe with the remaining bits, so a hasher should spread its
/// output over the whole 64-bit range.
///
/// It is a logic error for a value to be modified in such a way that its hash
/// or its equality changes while it is in a container. The behavior resulting
/// from such a logic error is not specified, but will not be undefined
/// behavior; lookups may miss the value and `validate` will report it.
pub trait Hasher<T: ?Sized> {
    /// Hashes `value`.
    fn hash(&self, value: &T) -> u64;

    /// Returns `true` if `a` and `b` are the same value for the purposes of
    /// the container.
    fn equals(&self, a: &T, b: &T) -> bool;
}

/// A [`Hasher`] for types that implement [`Hash`] and [`Eq`], backed by a
/// [`BuildHasher`].
///
/// By default, `StdHasher` uses the hashing algorithm of
/// `std::collections::HashMap`, which is currently SipHash 1-3 and resistant
/// to HashDoS attacks. Other algorithms, such as the one from the [`aHash`]
/// crate, can be plugged in with [`StdHasher::with_build_hasher`].
///
/// [`aHash`]: https://crates.io/crates/ahash
#[derive(Clone, Debug, Default)]
pub struct StdHasher<S = RandomState> {
    build_hasher: S,
}

impl<S> StdHasher<S> {
    /// Creates a `StdHasher` that hashes with `build_hasher`.
    pub fn with_build_hasher(build_hasher: S) -> Self {
        Self { build_hasher }
    }

    /// Returns a reference to the underlying [`BuildHasher`].
    pub fn build_hasher(&self) -> &S {
        &self.build_hasher
    }
}

impl<T, S> Hasher<T> for StdHasher<S>
where
    T: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, value: &T) -> u64 {
        let mut hasher = self.build_hasher.build_hasher();
        value.hash(&mut hasher);

        hasher.finish()
    }

    #[inline]
    fn equals(&self, a: &T, b: &T) -> bool {
        a == b
    }
}

/// Lifts a [`Hasher`] of keys to key-value pairs by looking at the key only.
///
/// This is how `BigMap<K, V, H>` is laid out on top of
/// `BigSet<(K, V), KeyHasher<H>>`: two pairs with equal keys are the same
/// entry, whatever their values are.
#[derive(Clone, Debug, Default)]
pub struct KeyHasher<H> {
    inner: H,
}

impl<H> KeyHasher<H> {
    /// Wraps a hasher of keys.
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    /// Returns a reference to the hasher of keys.
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<K, V, H> Hasher<(K, V)> for KeyHasher<H>
where
    H: Hasher<K>,
{
    #[inline]
    fn hash(&self, (key, _): &(K, V)) -> u64 {
        self.inner.hash(key)
    }

    #[inline]
    fn equals(&self, (a, _): &(K, V), (b, _): &(K, V)) -> bool {
        self.inner.equals(a, b)
    }
}
