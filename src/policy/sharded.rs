//! Sharded dispatcher over independent LRU engines.
//!
//! ```text
//!   key ──► hash_bytes(key, 0) ──► h: u32
//!
//!            high bits                      low bits
//!        ┌───────────────┐            ┌────────────────┐
//!        │ h >> (32 - b) │            │ h & (buckets-1)│
//!        └───────┬───────┘            └───────┬────────┘
//!                ▼                            ▼
//!        ┌──────────────┐             bucket inside the
//!        │ shard index  │             shard's hash table
//!        └──────────────┘
//!
//!   ┌─────────┬─────────┬─────────┬─────────┐
//!   │ shard 0 │ shard 1 │   ...   │ shard N │    N = 2^b, default 16
//!   └─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! Each operation takes exactly one shard mutex, so operations on different
//! shards proceed in parallel. `prune` and `total_charge` visit all shards
//! under separate mutex acquisitions: the sum is an approximation under
//! concurrent mutation, never a global snapshot.
//!
//! The key is hashed once per call; shard routing reads the high bits and
//! the shard's hash table reads the low bits, so the two never correlate.

use parking_lot::Mutex;

use crate::ds::entry::{Deleter, Handle};
use crate::ds::hash::hash_bytes;
use crate::policy::lru::LruShard;
use crate::traits::Cache;

/// log2 of the default shard count. Sixteen shards trade a little memory
/// for much lower mutex contention.
pub const DEFAULT_SHARD_BITS: u32 = 4;

/// Concurrent LRU cache backed by `2^bits` independent shards.
///
/// Capacity is divided evenly across shards, rounding up, so the aggregate
/// advertised capacity can exceed the requested total by at most
/// `shards - 1`.
///
/// # Example
///
/// ```
/// use pincache::ShardedLruCache;
///
/// let cache: ShardedLruCache<u64> = ShardedLruCache::new(1024);
/// let h = cache.insert(b"blk-1", 700, 1, Box::new(|_, _| {}));
/// assert_eq!(*cache.value(&h), 700);
/// cache.release(h);
///
/// let h = cache.lookup(b"blk-1").unwrap();
/// assert_eq!(*h.value(), 700);
/// cache.release(h);
/// ```
pub struct ShardedLruCache<T> {
    shards: Box<[LruShard<T>]>,
    shard_bits: u32,
    last_id: Mutex<u64>,
}

impl<T> std::fmt::Debug for ShardedLruCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedLruCache")
            .field("shard_bits", &self.shard_bits)
            .finish_non_exhaustive()
    }
}

impl<T> ShardedLruCache<T> {
    /// Creates a cache with the default sixteen shards.
    ///
    /// `capacity` is the total charge budget; `capacity == 0` yields a
    /// functioning cache that caches nothing (inserts return one-shot
    /// handles whose release fires the deleter immediately).
    pub fn new(capacity: usize) -> Self {
        Self::with_shard_bits(capacity, DEFAULT_SHARD_BITS)
    }

    /// Creates a cache with `2^shard_bits` shards. Callers go through
    /// [`CacheBuilder`](crate::builder::CacheBuilder), which validates the
    /// bit count.
    pub(crate) fn with_shard_bits(capacity: usize, shard_bits: u32) -> Self {
        let shards = 1usize << shard_bits;
        let per_shard = (capacity + shards - 1) / shards;
        ShardedLruCache {
            shards: (0..shards)
                .map(|_| LruShard::new(per_shard))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            shard_bits,
            last_id: Mutex::new(0),
        }
    }

    fn shard_for(&self, hash: u32) -> &LruShard<T> {
        let index = if self.shard_bits == 0 {
            0
        } else {
            (hash >> (32 - self.shard_bits)) as usize
        };
        &self.shards[index]
    }

    /// Inserts a mapping of `key` to `value` with the given `charge` and
    /// returns a handle pinning it. A resident entry under the same key is
    /// displaced; its deleter fires once its last handle is gone.
    ///
    /// Key bytes are copied into the entry; `deleter` is invoked exactly
    /// once with the key and value when the entry dies.
    pub fn insert(&self, key: &[u8], value: T, charge: usize, deleter: Deleter<T>) -> Handle<T> {
        let hash = hash_bytes(key, 0);
        self.shard_for(hash).insert(key, hash, value, charge, deleter)
    }

    /// Returns a handle to the entry under `key`, or `None`. The entry is
    /// pinned until the handle is released.
    pub fn lookup(&self, key: &[u8]) -> Option<Handle<T>> {
        let hash = hash_bytes(key, 0);
        self.shard_for(hash).lookup(key, hash)
    }

    /// Releases a handle previously returned by [`insert`](Self::insert) or
    /// [`lookup`](Self::lookup) on this cache.
    pub fn release(&self, handle: Handle<T>) {
        self.shard_for(handle.entry_hash()).release(handle);
    }

    /// The value pinned by `handle`. Valid for as long as the handle is
    /// borrowed, regardless of concurrent inserts or erases on its key.
    pub fn value<'h>(&self, handle: &'h Handle<T>) -> &'h T {
        handle.value()
    }

    /// Drops `key` from the cache if present. Entries pinned by handles
    /// survive until released; their deleters still fire exactly once.
    pub fn erase(&self, key: &[u8]) {
        let hash = hash_bytes(key, 0);
        self.shard_for(hash).erase(key, hash);
    }

    /// Returns a strictly increasing id. Clients sharing the cache use
    /// these to namespace their sub-keys.
    pub fn new_id(&self) -> u64 {
        let mut last_id = self.last_id.lock();
        *last_id += 1;
        *last_id
    }

    /// Evicts every entry with no outstanding handles, shard by shard.
    pub fn prune(&self) {
        for shard in self.shards.iter() {
            shard.prune();
        }
    }

    /// Sum of the charges of resident entries. Per-shard values are read
    /// under separate mutex acquisitions; under concurrent mutation the sum
    /// is an approximation.
    pub fn total_charge(&self) -> usize {
        self.shards.iter().map(|s| s.total_charge()).sum()
    }

    /// Number of resident entries, summed the same way as
    /// [`total_charge`](Self::total_charge).
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate advertised capacity (per-shard capacity times shard
    /// count). At least the requested total, exceeding it by at most
    /// `shards - 1` due to rounding.
    pub fn capacity(&self) -> usize {
        self.shards.iter().map(|s| s.capacity()).sum()
    }

    /// Aggregated counters and gauges across all shards, each shard read
    /// under its own mutex.
    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> crate::metrics::snapshot::CacheMetricsSnapshot {
        let mut snap = crate::metrics::snapshot::CacheMetricsSnapshot::default();
        for shard in self.shards.iter() {
            shard.fold_metrics(&mut snap);
        }
        snap
    }
}

impl<T: Send + Sync> Cache<T> for ShardedLruCache<T> {
    fn insert(&self, key: &[u8], value: T, charge: usize, deleter: Deleter<T>) -> Handle<T> {
        ShardedLruCache::insert(self, key, value, charge, deleter)
    }

    fn lookup(&self, key: &[u8]) -> Option<Handle<T>> {
        ShardedLruCache::lookup(self, key)
    }

    fn release(&self, handle: Handle<T>) {
        ShardedLruCache::release(self, handle)
    }

    fn erase(&self, key: &[u8]) {
        ShardedLruCache::erase(self, key)
    }

    fn new_id(&self) -> u64 {
        ShardedLruCache::new_id(self)
    }

    fn prune(&self) {
        ShardedLruCache::prune(self)
    }

    fn total_charge(&self) -> usize {
        ShardedLruCache::total_charge(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Deleter<u64> {
        Box::new(|_, _| {})
    }

    #[test]
    fn default_shard_count_and_capacity_rounding() {
        let cache: ShardedLruCache<u64> = ShardedLruCache::new(100);
        // ceil(100 / 16) = 7 per shard, advertised 112.
        assert_eq!(cache.capacity(), 112);
        assert!(cache.is_empty());

        let exact: ShardedLruCache<u64> = ShardedLruCache::new(1600);
        assert_eq!(exact.capacity(), 1600);
    }

    #[test]
    fn single_shard_routes_everything_to_shard_zero() {
        let cache: ShardedLruCache<u64> = ShardedLruCache::with_shard_bits(10, 0);
        assert_eq!(cache.capacity(), 10);
        for i in 0u64..20 {
            let h = cache.insert(&i.to_le_bytes(), i, 1, noop());
            cache.release(h);
        }
        // One shard, capacity 10, nothing pinned.
        assert_eq!(cache.total_charge(), 10);
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn operations_round_trip_through_shards() {
        let cache: ShardedLruCache<u64> = ShardedLruCache::new(1024);
        for i in 0u64..64 {
            let h = cache.insert(&i.to_le_bytes(), i * 10, 1, noop());
            cache.release(h);
        }
        assert_eq!(cache.len(), 64);
        for i in 0u64..64 {
            let h = cache.lookup(&i.to_le_bytes()).unwrap();
            assert_eq!(*cache.value(&h), i * 10);
            cache.release(h);
        }

        for i in 0u64..32 {
            cache.erase(&i.to_le_bytes());
        }
        assert_eq!(cache.len(), 32);

        cache.prune();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.total_charge(), 0);
    }

    #[test]
    fn new_id_is_strictly_increasing() {
        let cache: ShardedLruCache<u64> = ShardedLruCache::new(16);
        let a = cache.new_id();
        let b = cache.new_id();
        let c = cache.new_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn trait_object_exposes_the_full_surface() {
        let cache: Box<dyn Cache<u64>> = Box::new(ShardedLruCache::new(64));
        let h = cache.insert(b"k", 9, 1, Box::new(|_, _| {}));
        assert_eq!(*cache.value(&h), 9);
        cache.release(h);

        assert!(cache.lookup(b"k").is_some_and(|h| {
            let ok = *h.value() == 9;
            cache.release(h);
            ok
        }));
        cache.erase(b"k");
        assert!(cache.lookup(b"k").is_none());
        assert_ne!(cache.new_id(), cache.new_id());
        cache.prune();
        assert_eq!(cache.total_charge(), 0);
    }

    #[test]
    fn pinning_behavior_is_preserved_through_the_dispatcher() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let deletions = Arc::new(AtomicUsize::new(0));
        let deleter = |counter: &Arc<AtomicUsize>| -> Deleter<u64> {
            let counter = counter.clone();
            Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        };

        let cache: ShardedLruCache<u64> = ShardedLruCache::new(1024);
        let h1 = cache.insert(b"k", 1, 1, deleter(&deletions));
        cache.erase(b"k");
        assert!(cache.lookup(b"k").is_none());
        assert_eq!(deletions.load(Ordering::SeqCst), 0);
        assert_eq!(*cache.value(&h1), 1);

        cache.release(h1);
        assert_eq!(deletions.load(Ordering::SeqCst), 1);
    }
}
