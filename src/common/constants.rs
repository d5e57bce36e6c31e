/// Number of low hash bits that select a shard of a `BigSet`.
pub(crate) const SHARD_BITS: u32 = 12;

// 4096 shards
pub(crate) const NUM_SHARDS: usize = 1 << SHARD_BITS;

pub(crate) const SHARD_MASK: u64 = (NUM_SHARDS as u64) - 1;

/// How long a `Backoff` sleeps per wait once it is done spinning and
/// yielding.
pub(crate) const BACKOFF_SLEEP_MICROS: u64 = 50;

/// Capacities a slot array can take, in ascending order. All primes, each a
/// little more than twice the previous one.
pub(crate) const PRIME_CAPACITIES: &[u64] = &[
    5,
    11,
    29,
    61,
    131,
    277,
    587,
    1_237,
    2_609,
    5_479,
    11_519,
    24_197,
    50_821,
    106_727,
    224_129,
    470_689,
    988_453,
    2_075_761,
    4_359_101,
    9_154_151,
    19_223_749,
    40_369_897,
    84_776_801,
    178_031_303,
    373_865_753,
    785_118_091,
    1_648_748_021,
    3_462_370_883,
    7_270_978_859,
    15_269_055_661,
    32_065_016_891,
    67_336_535_501,
    141_406_724_593,
    296_954_121_661,
    623_603_655_509,
    1_309_567_676_617,
];
