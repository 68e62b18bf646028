//! Shard-hasher (spec 4.1): maps key bytes to a shard index deterministically.
//!
//! The teacher's `shard_index` helpers (`shard.rs`, `partition.rs`, `kv_shard.rs`,
//! `bucketing.rs`) all hash a key with a seeded `ahash::RandomState` and reduce
//! modulo the shard count. `ahash` is explicitly *not* guaranteed stable across
//! versions/platforms, which the teacher doesn't need (its shards are rebuilt
//! within a single process run) but this crate does: join correctness depends on
//! two independently-partitioned frames landing the same key in the same shard
//! index, possibly on different machines or at different times. MD5 is the
//! stable, universally-available digest spec.md names as its reference choice.

use md5::{Digest, Md5};

use crate::record::Value;

/// Maps a join-key value to a shard index in `[0, num_shards)`.
///
/// Integer/float/bool keys are stringified first (spec 4.1); this mirrors
/// `datawelder.partition.calculate_key`, which hashes `key.encode('utf-8')`
/// regardless of the key's original Python type.
pub fn shard_of(key: &Value, num_shards: usize) -> usize {
    assert!(num_shards > 0, "num_shards must be positive");
    let digest = Md5::digest(key.hash_bytes());
    // Interpret the full 16-byte digest as one big-endian integer, the same
    // way `int.from_bytes(hashlib.md5(key).digest(), 'big') % n` would. Using
    // only a truncated prefix of the digest does not reproduce the reference
    // test vectors in spec section 8 (S1).
    let mut acc: u128 = 0;
    for byte in digest.iter() {
        acc = (acc << 8) | (*byte as u128);
    }
    (acc % num_shards as u128) as usize
}
