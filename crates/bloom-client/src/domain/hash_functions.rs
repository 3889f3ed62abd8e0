//! Hash derivation for remote Bloom filter keys
//!
//! Every key is reduced to a [`HashPair`]: two 64-bit digests produced by
//! structurally different algorithms (FNV-1a and XXH3). The server derives its
//! k bit positions from the pair with double hashing: h(i) = h1 + i * h2.
//!
//! The algorithms sit behind [`KeyHasher`] so the pair can be swapped without
//! touching the client.

use std::fmt;
use std::hash::Hasher;

use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Two independent 64-bit digests of one key.
///
/// This is the unit the server stores and probes. On the wire it is a fixed
/// pair of unsigned 64-bit integers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashPair {
    /// First digest (FNV-1a for the default hasher)
    pub h1: u64,
    /// Second digest (XXH3 for the default hasher)
    pub h2: u64,
}

impl HashPair {
    pub const fn new(h1: u64, h2: u64) -> Self {
        Self { h1, h2 }
    }

    /// Compute k bit positions in a filter of m bits
    ///
    /// Kirsch-Mitzenmacher double hashing with wrapping arithmetic, so the
    /// same pair always lands on the same positions for a fixed (k, m).
    pub fn positions(&self, k: usize, m: usize) -> Vec<usize> {
        if m == 0 {
            return Vec::new();
        }

        (0..k)
            .map(|i| {
                let hash = self.h1.wrapping_add((i as u64).wrapping_mul(self.h2));
                (hash % m as u64) as usize
            })
            .collect()
    }
}

impl fmt::Debug for HashPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashPair({:#018x}, {:#018x})", self.h1, self.h2)
    }
}

/// Maps a key to its [`HashPair`].
///
/// Implementations must be deterministic, consume the whole key, and compute
/// the two halves with algorithms that do not derive one from the other.
pub trait KeyHasher: Send + Sync + fmt::Debug {
    fn hash_pair(&self, key: &[u8]) -> HashPair;
}

/// FNV-1a (64-bit) paired with XXH3 (64-bit).
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultKeyHasher;

impl KeyHasher for DefaultKeyHasher {
    fn hash_pair(&self, key: &[u8]) -> HashPair {
        HashPair::new(fnv1a_64(key), xxh3_64(key))
    }
}

/// FNV-1a over the full key
pub fn fnv1a_64(key: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish()
}

/// Derive the hash pair for one key with the default hasher
pub fn derive_hash_pair<K: AsRef<[u8]>>(key: K) -> HashPair {
    DefaultKeyHasher.hash_pair(key.as_ref())
}

/// Derive hash pairs for a batch of keys with the default hasher
///
/// Output index i always corresponds to `keys[i]`. Duplicates are hashed
/// again rather than collapsed.
pub fn derive_hash_pairs<K: AsRef<[u8]>>(keys: &[K]) -> Vec<HashPair> {
    hash_keys(&DefaultKeyHasher, keys)
}

/// Batch derivation with an arbitrary hasher
pub fn hash_keys<K: AsRef<[u8]>>(hasher: &dyn KeyHasher, keys: &[K]) -> Vec<HashPair> {
    keys.iter().map(|k| hasher.hash_pair(k.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    #[test]
    fn test_hash_pair_deterministic() {
        let first = derive_hash_pair("alice");
        let second = derive_hash_pair("alice");

        assert_eq!(first, second, "Same key must always produce the same pair");
    }

    #[test]
    fn test_empty_key_is_well_defined() {
        let pair = derive_hash_pair("");

        // FNV-1a of the empty input is the offset basis
        assert_eq!(pair.h1, FNV_OFFSET_BASIS);
        assert_eq!(pair, derive_hash_pair(b""));
        assert_ne!(pair.h1, pair.h2);
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // Published FNV-1a 64 test vector for "a"
        assert_eq!(fnv1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_whole_key_is_consumed() {
        let a = derive_hash_pair("prefix-shared-0");
        let b = derive_hash_pair("prefix-shared-1");

        assert_ne!(a.h1, b.h1);
        assert_ne!(a.h2, b.h2);
    }

    #[test]
    fn test_batch_preserves_order_and_duplicates() {
        let keys = ["bob", "alice", "bob", ""];
        let pairs = derive_hash_pairs(&keys);

        assert_eq!(pairs.len(), keys.len());
        for (key, pair) in keys.iter().zip(&pairs) {
            assert_eq!(*pair, derive_hash_pair(key));
        }
        assert_eq!(pairs[0], pairs[2], "Duplicates are hashed, not dropped");
    }

    #[test]
    fn test_batch_of_nothing() {
        let keys: [&str; 0] = [];
        assert!(derive_hash_pairs(&keys).is_empty());
    }

    #[test]
    fn test_halves_are_independent() {
        let samples: Vec<HashPair> = (0..10_000)
            .map(|i| derive_hash_pair(format!("user:{}", i)))
            .collect();
        let n = samples.len() as f64;

        // Bit agreement between h1 and h2 should sit near 1/2 at every position
        for bit in 0..64 {
            let agree = samples
                .iter()
                .filter(|p| (p.h1 >> bit) & 1 == (p.h2 >> bit) & 1)
                .count() as f64;
            let rate = agree / n;
            assert!(
                (0.45..=0.55).contains(&rate),
                "Bit {} agreement rate {} suggests correlated halves",
                bit,
                rate
            );
        }

        // Pearson correlation over the normalized values
        let xs: Vec<f64> = samples.iter().map(|p| p.h1 as f64 / u64::MAX as f64).collect();
        let ys: Vec<f64> = samples.iter().map(|p| p.h2 as f64 / u64::MAX as f64).collect();
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;
        let mut cov = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for (x, y) in xs.iter().zip(&ys) {
            cov += (x - mean_x) * (y - mean_y);
            var_x += (x - mean_x).powi(2);
            var_y += (y - mean_y).powi(2);
        }
        let correlation = cov / (var_x.sqrt() * var_y.sqrt());
        assert!(correlation.abs() < 0.05, "Correlation {} too high", correlation);
    }

    #[test]
    fn test_positions_within_bounds_and_varied() {
        let pair = derive_hash_pair("test_address_0xABCD");
        let positions = pair.positions(7, 10_000);

        assert_eq!(positions.len(), 7);
        assert!(positions.iter().all(|p| *p < 10_000));

        let unique: std::collections::HashSet<_> = positions.iter().collect();
        assert!(unique.len() >= 3, "Double hashing should spread positions");
    }

    #[test]
    fn test_positions_zero_width_filter() {
        assert!(derive_hash_pair("x").positions(5, 0).is_empty());
    }

    #[test]
    fn test_position_uniformity() {
        let m = 1000;
        let k = 7;
        let mut counts = vec![0usize; 10];

        for i in 0..1000 {
            let pair = derive_hash_pair(format!("element_{}", i));
            for pos in pair.positions(k, m) {
                counts[pos / 100] += 1;
            }
        }

        // ~700 per bucket, allow 50% variance
        for (i, count) in counts.iter().enumerate() {
            assert!(
                (350..=1050).contains(count),
                "Bucket {} has {} entries",
                i,
                count
            );
        }
    }

    #[derive(Debug)]
    struct SwappedHasher;

    impl KeyHasher for SwappedHasher {
        fn hash_pair(&self, key: &[u8]) -> HashPair {
            let pair = DefaultKeyHasher.hash_pair(key);
            HashPair::new(pair.h2, pair.h1)
        }
    }

    #[test]
    fn test_pluggable_hasher() {
        let pairs = hash_keys(&SwappedHasher, &["k"]);
        let default = derive_hash_pair("k");

        assert_eq!(pairs, vec![HashPair::new(default.h2, default.h1)]);
    }

    proptest! {
        #[test]
        fn prop_derivation_is_deterministic(key in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(derive_hash_pair(&key), derive_hash_pair(&key));
        }

        #[test]
        fn prop_batch_matches_single(keys in proptest::collection::vec(".{0,16}", 0..32)) {
            let pairs = derive_hash_pairs(&keys);
            prop_assert_eq!(pairs.len(), keys.len());
            for (i, key) in keys.iter().enumerate() {
                prop_assert_eq!(pairs[i], derive_hash_pair(key));
            }
        }
    }
}
