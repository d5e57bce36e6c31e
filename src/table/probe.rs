//! The open addressing probe engine.
//!
//! A slot array is a circular array of [`Slot`]s. Every occupied slot stores
//! its value together with its _target index_, the index the value's hash maps
//! to when there are no collisions. Values are placed by linear probing, and
//! every contiguous run of occupied slots is kept sorted by target index in
//! circular order. Two properties follow:
//!
//! - A lookup can stop as soon as it meets a value whose target index comes
//!   after its own, because the value it searches for would have been placed
//!   before that one.
//! - Removal never needs tombstones. The entries following the removed one
//!   are shifted back by one slot until an empty slot or an entry sitting at
//!   its own target index is met.
//!
//! The functions here know nothing about hashing or locking. Callers pass in
//! the hash of the value they look for, reduced to the table by
//! `hash % capacity`, and a closure deciding equality.

use std::mem;

/// One entry of a slot array.
pub(crate) enum Slot<T> {
    Empty,
    Occupied { target: usize, value: T },
}

impl<T> Slot<T> {
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[inline]
    pub(crate) fn value(&self) -> Option<&T> {
        match self {
            Self::Occupied { value, .. } => Some(value),
            Self::Empty => None,
        }
    }

    #[inline]
    pub(crate) fn value_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Occupied { value, .. } => Some(value),
            Self::Empty => None,
        }
    }

    #[inline]
    pub(crate) fn into_value(self) -> Option<T> {
        match self {
            Self::Occupied { value, .. } => Some(value),
            Self::Empty => None,
        }
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::Empty
    }
}

/// The outcome of [`find_in_table`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Probe {
    /// If `found`, the slot holding the value. Otherwise, the slot a new value
    /// with this hash should be inserted at.
    pub(crate) index: usize,
    /// The target index of the hash.
    pub(crate) target: usize,
    pub(crate) found: bool,
}

impl Probe {
    #[inline]
    fn vacant(index: usize, target: usize) -> Self {
        Self {
            index,
            target,
            found: false,
        }
    }

    /// Returns `true` if a value inserted at this probe's index would not sit
    /// at its target index.
    #[inline]
    pub(crate) fn collided(&self) -> bool {
        self.index != self.target
    }
}

/// Reduces a hash to a target index of a slot array of `capacity` slots.
#[inline]
pub(crate) fn target_index(hash: u64, capacity: usize) -> usize {
    debug_assert!(capacity > 0);
    (hash % capacity as u64) as usize
}

/// Returns how many slots past `target` the slot `index` lies, walking
/// forward and wrapping around the end of the array.
#[inline]
pub(crate) fn displacement(index: usize, target: usize, capacity: usize) -> usize {
    if index >= target {
        index - target
    } else {
        index + capacity - target
    }
}

#[inline]
fn next_index(index: usize, capacity: usize) -> usize {
    let next = index + 1;
    if next == capacity {
        0
    } else {
        next
    }
}

/// Searches `slots` for a value with the given hash for which `eq` returns
/// `true`.
///
/// The walk starts at the hash's target index and stops at the first empty
/// slot, at the first value whose target index lies after the hash's own, or
/// after visiting every slot once. An empty slot array reports not found with
/// index and target index 0.
pub(crate) fn find_in_table<T>(
    slots: &[Slot<T>],
    hash: u64,
    mut eq: impl FnMut(&T) -> bool,
) -> Probe {
    let capacity = slots.len();
    if capacity == 0 {
        return Probe::vacant(0, 0);
    }

    let target = target_index(hash, capacity);
    let mut index = target;

    for distance in 0..capacity {
        let Slot::Occupied {
            target: stored,
            value,
        } = &slots[index]
        else {
            // Not found. A new value goes into this empty slot.
            return Probe::vacant(index, target);
        };

        let stored_distance = displacement(index, *stored, capacity);
        if stored_distance < distance {
            // This value's home comes after ours. Ours would have been placed
            // before it.
            return Probe::vacant(index, target);
        }

        if stored_distance == distance && eq(value) {
            return Probe {
                index,
                target,
                found: true,
            };
        }

        index = next_index(index, capacity);
    }

    // Went all the way around a full table.
    Probe::vacant(target, target)
}

/// Writes `value` with the given target index into slot `index`.
///
/// If the slot is occupied, its entry and the rest of the run are carried
/// forward by one slot each, up to the next empty slot.
///
/// # Panics
///
/// Panics if there is no empty slot left.
pub(crate) fn insert_into_table<T>(slots: &mut [Slot<T>], value: T, index: usize, target: usize) {
    let capacity = slots.len();
    debug_assert!(index < capacity);

    let mut carried = Slot::Occupied { target, value };
    let mut index = index;

    for _ in 0..capacity {
        carried = mem::replace(&mut slots[index], carried);
        if carried.is_empty() {
            return;
        }
        index = next_index(index, capacity);
    }

    panic!("No vacant slot in a table of {capacity} slots");
}

/// Removes the value in slot `index` and returns it.
///
/// The displaced entries following the slot are shifted back by one slot each,
/// stopping at the first empty slot or the first entry that sits at its own
/// target index. Returns `None` if the slot is empty.
pub(crate) fn erase_from_table<T>(slots: &mut [Slot<T>], index: usize) -> Option<T> {
    let capacity = slots.len();

    let Slot::Occupied { value, .. } = mem::take(&mut slots[index]) else {
        return None;
    };

    let mut hole = index;
    loop {
        let next = next_index(hole, capacity);
        match &slots[next] {
            Slot::Occupied { target, .. } if *target != next => {
                slots[hole] = mem::take(&mut slots[next]);
                hole = next;
            }
            _ => break,
        }
    }

    Some(value)
}

#[cfg(test)]
mod tests {
    use super::{displacement, erase_from_table, find_in_table, insert_into_table, Probe, Slot};

    fn empty(capacity: usize) -> Vec<Slot<u64>> {
        std::iter::repeat_with(Slot::default)
            .take(capacity)
            .collect()
    }

    // Uses the value itself as its hash.
    fn insert(slots: &mut [Slot<u64>], value: u64) -> Probe {
        let probe = find_in_table(slots, value, |v| *v == value);
        assert!(!probe.found, "{value} is already present");
        insert_into_table(slots, value, probe.index, probe.target);
        probe
    }

    fn find(slots: &[Slot<u64>], value: u64) -> Option<usize> {
        let probe = find_in_table(slots, value, |v| *v == value);
        probe.found.then_some(probe.index)
    }

    fn layout(slots: &[Slot<u64>]) -> Vec<Option<(usize, u64)>> {
        slots
            .iter()
            .map(|s| match s {
                Slot::Occupied { target, value } => Some((*target, *value)),
                Slot::Empty => None,
            })
            .collect()
    }

    #[test]
    fn empty_array() {
        let slots = empty(0);
        assert_eq!(
            find_in_table(&slots, 42, |_| true),
            Probe {
                index: 0,
                target: 0,
                found: false
            }
        );
    }

    #[test]
    fn displacement_wraps() {
        assert_eq!(displacement(3, 3, 7), 0);
        assert_eq!(displacement(5, 3, 7), 2);
        assert_eq!(displacement(1, 5, 7), 3);
    }

    #[test]
    fn colliding_values_form_a_sorted_run() {
        let mut slots = empty(7);

        // 2, 9 and 16 all map to slot 2. 3 maps to slot 3.
        assert!(!insert(&mut slots, 2).collided());
        assert!(!insert(&mut slots, 3).collided());
        let probe = insert(&mut slots, 9);
        assert!(probe.collided());
        assert_eq!(probe.index, 3);

        // 9 was inserted in front of 3, which moved forward.
        assert_eq!(
            layout(&slots),
            vec![
                None,
                None,
                Some((2, 2)),
                Some((2, 9)),
                Some((3, 3)),
                None,
                None
            ]
        );

        insert(&mut slots, 16);
        assert_eq!(find(&slots, 2), Some(2));
        assert_eq!(find(&slots, 9), Some(3));
        assert_eq!(find(&slots, 16), Some(4));
        assert_eq!(find(&slots, 3), Some(5));
        assert_eq!(find(&slots, 23), None);
        assert_eq!(find(&slots, 4), None);
    }

    #[test]
    fn lookup_stops_early() {
        let mut slots = empty(7);
        insert(&mut slots, 3);
        insert(&mut slots, 4);
        insert(&mut slots, 5);

        // 2 maps to slot 2, which is empty.
        assert_eq!(find_in_table(&slots, 2, |_| false).index, 2);
        // 10 maps to slot 3 and would go right after 3, in front of 4.
        let probe = find_in_table(&slots, 10, |v| *v == 10);
        assert!(!probe.found);
        assert_eq!(probe.index, 4);
    }

    #[test]
    fn runs_wrap_around_the_end() {
        let mut slots = empty(5);
        insert(&mut slots, 4);
        insert(&mut slots, 9);
        insert(&mut slots, 14);
        insert(&mut slots, 0);

        assert_eq!(
            layout(&slots),
            vec![Some((4, 9)), Some((4, 14)), Some((0, 0)), None, Some((4, 4))]
        );
        for value in [4, 9, 14, 0] {
            assert!(find(&slots, value).is_some());
        }
        assert_eq!(find(&slots, 19), None);
        assert_eq!(find(&slots, 5), None);
    }

    #[test]
    fn full_table_is_searched_once() {
        let mut slots = empty(3);
        for value in 0..3 {
            insert(&mut slots, value);
        }
        assert_eq!(find(&slots, 3), None);
        assert_eq!(find(&slots, 2), Some(2));
    }

    #[test]
    fn erase_shifts_the_run_back() {
        let mut slots = empty(7);
        for value in [2, 9, 16, 3, 6] {
            insert(&mut slots, value);
        }
        // [_, _, 2, 9, 16, 3, 6]

        assert_eq!(erase_from_table(&mut slots, 2), Some(2));
        assert_eq!(
            layout(&slots),
            vec![
                None,
                None,
                Some((2, 9)),
                Some((2, 16)),
                Some((3, 3)),
                None,
                Some((6, 6))
            ]
        );
        assert_eq!(find(&slots, 2), None);
        for value in [9, 16, 3, 6] {
            assert!(find(&slots, value).is_some());
        }

        // Erasing an empty slot does nothing.
        assert_eq!(erase_from_table(&mut slots, 0), None);
    }

    #[test]
    fn erase_stops_at_entries_in_their_home() {
        let mut slots = empty(7);
        for value in [2, 9, 4] {
            insert(&mut slots, value);
        }
        // [_, _, 2, 9, 4, _, _]

        assert_eq!(erase_from_table(&mut slots, 2), Some(2));
        assert_eq!(
            layout(&slots),
            vec![None, None, Some((2, 9)), None, Some((4, 4)), None, None]
        );
    }

    #[test]
    fn erase_wraps_around_the_end() {
        let mut slots = empty(5);
        for value in [4, 9, 14] {
            insert(&mut slots, value);
        }
        // [9, 14, _, _, 4]

        assert_eq!(erase_from_table(&mut slots, 4), Some(4));
        assert_eq!(
            layout(&slots),
            vec![Some((4, 14)), None, None, None, Some((4, 9))]
        );
        assert!(find(&slots, 9).is_some());
        assert!(find(&slots, 14).is_some());
    }

    #[test]
    fn random_operations_match_a_reference() {
        use std::collections::HashSet;

        const CAPACITY: usize = 61;

        let mut slots = empty(CAPACITY);
        let mut reference = HashSet::new();

        // A small linear congruential generator keeps the sequence
        // reproducible.
        let mut state = 0x2545_f491_4f6c_dd1d_u64;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            state >> 33
        };

        for _ in 0..10_000 {
            let value = next() % 200;
            if reference.contains(&value) {
                let index = find(&slots, value).expect("value should be present");
                assert_eq!(erase_from_table(&mut slots, index), Some(value));
                reference.remove(&value);
            } else if reference.len() < CAPACITY - 1 {
                insert(&mut slots, value);
                reference.insert(value);
            }

            for probe in 0..200 {
                assert_eq!(find(&slots, probe).is_some(), reference.contains(&probe));
            }
        }
    }
}
