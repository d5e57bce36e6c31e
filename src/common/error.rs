/// The error type returned by the `validate` methods of the containers.
///
/// Every variant describes a slot array that the probe engine could no longer
/// search correctly. None of them can be produced through the public API of
/// this crate; seeing one means a [`Hasher`][hasher] is inconsistent (for
/// example, its hash of a value changed after the value was inserted) or
/// memory was corrupted.
///
/// [hasher]: ./trait.Hasher.html
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    /// A stored target index does not match the hash of the stored value.
    #[error(
        "slot {index} stores target index {stored}, but its value hashes to \
    target index {expected}"
    )]
    TargetMismatch {
        /// The slot holding the value.
        index: usize,
        /// The target index stored next to the value.
        stored: usize,
        /// The target index recomputed from the value's hash.
        expected: usize,
    },

    /// A value is displaced from its target index but the probe run leading
    /// to it is broken, so lookups starting at its target index stop before
    /// reaching it.
    #[error("slot {index} cannot be reached from its target index")]
    BrokenProbeRun {
        /// The unreachable slot.
        index: usize,
    },

    /// The recorded number of values disagrees with the number of occupied
    /// slots.
    #[error("recorded size is {recorded}, but {counted} slots are occupied")]
    SizeMismatch {
        /// The size the table keeps track of.
        recorded: usize,
        /// The number of occupied slots found.
        counted: usize,
    },

    /// One shard of a `BigSet` or `BigMap` failed validation.
    #[error("shard {shard}: {source}")]
    InShard {
        /// The index of the shard.
        shard: usize,
        /// What is wrong with the shard.
        #[source]
        source: Box<InvariantError>,
    },
}
