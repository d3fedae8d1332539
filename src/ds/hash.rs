//! Byte-string hash used for shard routing and bucket selection.
//!
//! A Murmur-derived 32-bit hash. The dispatcher consumes the *high* bits to
//! pick a shard and the hash table consumes the *low* bits to pick a
//! bucket, so the two uses never correlate. The function is deterministic
//! for the life of the process; cross-process stability is not promised.

const M: u32 = 0xc6a4_a793;
const R: u32 = 24;

/// Hashes `data` with the given `seed`.
///
/// Mixes four little-endian bytes at a time, then folds in the up-to-three
/// trailing bytes.
///
/// # Example
///
/// ```
/// use pincache::ds::hash::hash_bytes;
///
/// let h = hash_bytes(b"table-4/block-9", 0);
/// assert_eq!(h, hash_bytes(b"table-4/block-9", 0));
/// assert_ne!(h, hash_bytes(b"table-4/block-8", 0));
/// ```
pub fn hash_bytes(data: &[u8], seed: u32) -> u32 {
    let mut h = seed ^ (data.len() as u32).wrapping_mul(M);

    let mut chunks = data.chunks_exact(4);
    for word in &mut chunks {
        let w = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        h = h.wrapping_add(w);
        h = h.wrapping_mul(M);
        h ^= h >> 16;
    }

    let rest = chunks.remainder();
    if rest.len() >= 3 {
        h = h.wrapping_add((rest[2] as u32) << 16);
    }
    if rest.len() >= 2 {
        h = h.wrapping_add((rest[1] as u32) << 8);
    }
    if !rest.is_empty() {
        h = h.wrapping_add(rest[0] as u32);
        h = h.wrapping_mul(M);
        h ^= h >> R;
    }
    h
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: hashing is a pure function of (data, seed).
        #[test]
        fn prop_deterministic(data in prop::collection::vec(any::<u8>(), 0..64), seed in any::<u32>()) {
            prop_assert_eq!(hash_bytes(&data, seed), hash_bytes(&data, seed));
        }

        /// Property: flipping a single byte of an equal-length input always
        /// changes the hash. Each mixing step is either a bijection or adds
        /// the same constant to both sides, so a one-byte delta survives to
        /// the output.
        #[test]
        fn prop_single_byte_flip_changes_hash(
            data in prop::collection::vec(any::<u8>(), 1..48),
            index in any::<prop::sample::Index>(),
            delta in 1u8..=255,
        ) {
            let i = index.index(data.len());
            let mut flipped = data.clone();
            flipped[i] ^= delta;
            prop_assert_ne!(hash_bytes(&data, 0), hash_bytes(&flipped, 0));
        }
    }
}
