//! Feature-gated observability for the cache.
//!
//! Counters live inside each shard and are mutated while the shard mutex is
//! already held, so recording costs a plain integer increment. Reading them
//! goes through [`ShardedLruCache::metrics_snapshot`](crate::ShardedLruCache::metrics_snapshot),
//! which folds every shard's counters (and the `usage`/`capacity` gauges)
//! into one [`snapshot::CacheMetricsSnapshot`]. Like `total_charge`, the
//! fold visits shards under separate mutex acquisitions: each summand is a
//! valid past value, the total is an approximation under concurrent
//! mutation.

pub mod exporter;
pub(crate) mod metrics_impl;
pub mod snapshot;

pub use exporter::{MetricsExporter, PrometheusTextExporter};
pub use snapshot::CacheMetricsSnapshot;
