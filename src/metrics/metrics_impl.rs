//! Per-shard counter storage and recording hooks.

use crate::metrics::snapshot::CacheMetricsSnapshot;

/// Counters owned by one shard, guarded by that shard's mutex.
#[derive(Debug, Default)]
pub(crate) struct ShardMetrics {
    pub(crate) lookup_hits: u64,
    pub(crate) lookup_misses: u64,
    pub(crate) inserts: u64,
    /// Inserts that displaced a resident entry under the same key.
    pub(crate) replacements: u64,
    /// Entries evicted by the capacity loop in `insert`.
    pub(crate) evictions: u64,
    /// Erase calls that found their key.
    pub(crate) erases: u64,
    /// Entries evicted by `prune`.
    pub(crate) pruned: u64,
}

impl ShardMetrics {
    #[inline]
    pub(crate) fn record_hit(&mut self) {
        self.lookup_hits += 1;
    }

    #[inline]
    pub(crate) fn record_miss(&mut self) {
        self.lookup_misses += 1;
    }

    #[inline]
    pub(crate) fn record_insert(&mut self) {
        self.inserts += 1;
    }

    #[inline]
    pub(crate) fn record_replacement(&mut self) {
        self.replacements += 1;
    }

    #[inline]
    pub(crate) fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    #[inline]
    pub(crate) fn record_erase(&mut self) {
        self.erases += 1;
    }

    #[inline]
    pub(crate) fn record_prune(&mut self) {
        self.pruned += 1;
    }

    /// Adds this shard's counters into an aggregate snapshot. The caller
    /// contributes the `usage`/`capacity` gauges.
    pub(crate) fn fold_into(&self, snap: &mut CacheMetricsSnapshot) {
        snap.lookup_hits += self.lookup_hits;
        snap.lookup_misses += self.lookup_misses;
        snap.inserts += self.inserts;
        snap.replacements += self.replacements;
        snap.evictions += self.evictions;
        snap.erases += self.erases;
        snap.pruned += self.pruned;
    }
}
