//! Cache construction surface.
//!
//! [`ShardedLruCache::new`] covers the common case (total capacity, sixteen
//! shards). The builder exists for deployments that want a different
//! contention/memory trade-off, and [`new_lru_cache`] produces the cache as
//! a trait object for code programmed against [`Cache`].
//!
//! ## Example
//!
//! ```
//! use pincache::builder::CacheBuilder;
//!
//! // 64 shards for a heavily contended block cache.
//! let cache = CacheBuilder::new(512 << 20).shard_bits(6).build::<Vec<u8>>();
//! assert!(cache.capacity() >= 512 << 20);
//! ```

use crate::error::ConfigError;
use crate::policy::sharded::{ShardedLruCache, DEFAULT_SHARD_BITS};
use crate::traits::Cache;

/// Largest supported shard exponent (256 shards). Beyond this the per-shard
/// capacity rounding dominates and contention relief is negligible.
pub const MAX_SHARD_BITS: u32 = 8;

/// Configures and builds a [`ShardedLruCache`].
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    capacity: usize,
    shard_bits: u32,
}

impl CacheBuilder {
    /// Starts a builder for a cache holding at most `capacity` total
    /// charge, with the default shard count.
    pub fn new(capacity: usize) -> Self {
        CacheBuilder {
            capacity,
            shard_bits: DEFAULT_SHARD_BITS,
        }
    }

    /// Uses `2^bits` shards. `0` means a single shard (useful for tests
    /// wanting deterministic eviction order); at most [`MAX_SHARD_BITS`].
    pub fn shard_bits(mut self, bits: u32) -> Self {
        self.shard_bits = bits;
        self
    }

    /// Builds the cache, validating the configuration.
    pub fn try_build<T>(self) -> Result<ShardedLruCache<T>, ConfigError> {
        if self.shard_bits > MAX_SHARD_BITS {
            return Err(ConfigError::new(format!(
                "shard_bits must be at most {MAX_SHARD_BITS}, got {}",
                self.shard_bits
            )));
        }
        Ok(ShardedLruCache::with_shard_bits(
            self.capacity,
            self.shard_bits,
        ))
    }

    /// Builds the cache.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid; use
    /// [`try_build`](Self::try_build) to handle that as an error.
    pub fn build<T>(self) -> ShardedLruCache<T> {
        self.try_build().expect("invalid cache configuration")
    }
}

/// Creates a cache with the given total capacity behind the object-level
/// [`Cache`] interface, with the default shard count.
///
/// `capacity == 0` yields a functioning cache that caches nothing: inserts
/// return one-shot handles whose release triggers the deleter immediately.
pub fn new_lru_cache<T: Send + Sync + 'static>(capacity: usize) -> Box<dyn Cache<T>> {
    Box::new(ShardedLruCache::new(capacity))
}
