pub(crate) mod probe;

use self::probe::{
    displacement, erase_from_table, find_in_table, insert_into_table, target_index, Probe, Slot,
};
use crate::common::{constants::PRIME_CAPACITIES, error::InvariantError};

use std::mem;

/// A slot array together with the number of values it holds.
///
/// `Table` is the unit of storage shared by the single-threaded containers
/// and by every shard of the concurrent ones. It applies the growth policy,
/// but hashing is left to the owner: operations take the already computed
/// hash, and growth takes a function that recomputes the hash of a stored
/// value.
pub(crate) struct Table<T> {
    slots: Box<[Slot<T>]>,
    len: usize,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Table<T> {
    /// Creates an empty table. It does not allocate until the first insertion.
    pub(crate) fn new() -> Self {
        Self {
            slots: empty_slots(0),
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn find(&self, hash: u64, eq: impl FnMut(&T) -> bool) -> Probe {
        find_in_table(&self.slots, hash, eq)
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Slot::value)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Slot::value_mut)
    }

    /// Inserts a value that `probe` reported as not found.
    ///
    /// Grows the table first if the growth policy asks for it, in which case
    /// `rehash` is called on every stored value and the insertion point is
    /// searched again. Returns the index the value was written to.
    ///
    /// If `rehash` panics, the table is left as it was and `value` is dropped.
    pub(crate) fn insert_new(
        &mut self,
        probe: Probe,
        hash: u64,
        value: T,
        rehash: impl Fn(&T) -> u64,
    ) -> usize {
        debug_assert!(!probe.found);

        let mut probe = probe;
        if needs_growth(self.len + 1, self.capacity(), probe.collided()) {
            self.grow(rehash);
            probe = self.find(hash, |_| false);
        }

        insert_into_table(&mut self.slots, value, probe.index, probe.target);
        self.len += 1;
        probe.index
    }

    /// Removes the value at `index`, if any.
    pub(crate) fn erase(&mut self, index: usize) -> Option<T> {
        let value = erase_from_table(&mut self.slots, index)?;
        self.len -= 1;
        Some(value)
    }

    /// Moves every value into a slot array of the next capacity of the prime
    /// table.
    ///
    /// All hashes are computed before any value is moved, so a panicking
    /// `rehash` leaves the table untouched.
    pub(crate) fn grow(&mut self, rehash: impl Fn(&T) -> u64) {
        let new_capacity = next_capacity(self.capacity());
        let hashes: Vec<u64> = self.iter().map(&rehash).collect();
        let old_slots = mem::replace(&mut self.slots, empty_slots(new_capacity));

        let values = old_slots.into_vec().into_iter().filter_map(Slot::into_value);
        for (value, hash) in values.zip(hashes) {
            // Values are distinct, so there is nothing to compare against.
            let probe = self.find(hash, |_| false);
            insert_into_table(&mut self.slots, value, probe.index, probe.target);
        }
    }

    /// Drops every value. The slot array is released too.
    pub(crate) fn clear(&mut self) {
        self.slots = empty_slots(0);
        self.len = 0;
    }

    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len,
        }
    }

    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            slots: self.slots.iter_mut(),
            remaining: self.len,
        }
    }

    /// Checks that every stored target index matches its value's hash, that
    /// every value can be reached from its target index, and that the
    /// recorded length is right.
    pub(crate) fn validate(&self, rehash: impl Fn(&T) -> u64) -> Result<(), InvariantError> {
        let capacity = self.capacity();
        let mut counted = 0;

        for (index, slot) in self.slots.iter().enumerate() {
            let Slot::Occupied { target, value } = slot else {
                continue;
            };
            counted += 1;

            let expected = target_index(rehash(value), capacity);
            if *target != expected {
                return Err(InvariantError::TargetMismatch {
                    index,
                    stored: *target,
                    expected,
                });
            }

            // A displaced value must directly follow a value whose target
            // index is not after its own.
            let here = displacement(index, *target, capacity);
            if here > 0 {
                let prev = if index == 0 { capacity - 1 } else { index - 1 };
                let reachable = match &self.slots[prev] {
                    Slot::Occupied {
                        target: prev_target,
                        ..
                    } => here <= displacement(prev, *prev_target, capacity) + 1,
                    Slot::Empty => false,
                };
                if !reachable {
                    return Err(InvariantError::BrokenProbeRun { index });
                }
            }
        }

        if counted != self.len {
            return Err(InvariantError::SizeMismatch {
                recorded: self.len,
                counted,
            });
        }

        Ok(())
    }
}

/// Returns `true` if a table of `capacity` slots must grow before it can take
/// its `len`-th value.
///
/// A table grows when it would overflow, or when the new value collided and
/// the load factor would exceed 0.5.
#[inline]
pub(crate) fn needs_growth(len: usize, capacity: usize, collided: bool) -> bool {
    len > capacity || (collided && len > capacity / 2)
}

/// Returns the first capacity of the prime table that is larger than
/// `capacity`.
///
/// # Panics
///
/// Panics if the prime table is exhausted or the capacity does not fit in a
/// `usize`.
pub(crate) fn next_capacity(capacity: usize) -> usize {
    let wanted = capacity as u64 + 1;
    PRIME_CAPACITIES
        .iter()
        .find(|&&prime| prime >= wanted)
        .and_then(|&prime| usize::try_from(prime).ok())
        .unwrap_or_else(|| panic!("Cannot grow a table beyond {capacity} slots"))
}

/// Iterates over the values of a [`Table`] in slot order.
pub(crate) struct Iter<'a, T> {
    slots: std::slice::Iter<'a, Slot<T>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let value = self.slots.by_ref().find_map(Slot::value)?;
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            remaining: self.remaining,
        }
    }
}

/// Iterates over the values of a [`Table`] in slot order, mutably.
pub(crate) struct IterMut<'a, T> {
    slots: std::slice::IterMut<'a, Slot<T>>,
    remaining: usize,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<&'a mut T> {
        let value = self.slots.by_ref().find_map(Slot::value_mut)?;
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}

fn empty_slots<T>(capacity: usize) -> Box<[Slot<T>]> {
    std::iter::repeat_with(Slot::default)
        .take(capacity)
        .collect::<Vec<_>>()
        .into_boxed_slice()
}
