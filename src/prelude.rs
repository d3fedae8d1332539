pub use crate::builder::{new_lru_cache, CacheBuilder};
pub use crate::ds::{Deleter, Handle};
pub use crate::policy::ShardedLruCache;
pub use crate::traits::Cache;

#[cfg(feature = "metrics")]
pub use crate::metrics::snapshot::CacheMetricsSnapshot;
