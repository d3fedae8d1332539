//! # Object-level cache interface
//!
//! [`Cache`] is the contract the storage engine programs against: callers
//! hold a `Box<dyn Cache<T>>` (or generic `C: Cache<T>`) and never see the
//! sharding or the entry layout behind it.
//!
//! ## Operation summary
//!
//! | Operation      | Effect                                               |
//! |----------------|------------------------------------------------------|
//! | `insert`       | Add mapping, displace same-key prior, return handle  |
//! | `lookup`       | Find by key, pin, return handle or `None`            |
//! | `release`      | Drop one pin; entry dies when unpinned and uncached  |
//! | `value`        | Read the value behind a handle                       |
//! | `erase`        | Remove by key; pinned entries survive as zombies     |
//! | `new_id`       | Strictly increasing id for key namespacing           |
//! | `prune`        | Evict everything unpinned                            |
//! | `total_charge` | Approximate sum of resident charges                  |
//!
//! Handles are move-only pins: `release` consumes them, and the value read
//! through a handle stays valid until that release no matter what happens
//! to the key meanwhile.
//!
//! The cache reports no recoverable errors; every operation either succeeds
//! or the process aborts. Remaining caller obligations (releasing into the
//! cache that issued the handle, non-re-entrant deleters) are documented on
//! the methods and checked by debug assertions where observable.

use crate::ds::entry::{Deleter, Handle};

/// A concurrent cache of opaque values under byte-string keys, with pinning
/// handles and charge-based eviction.
///
/// Implementations are internally synchronized (`Send + Sync`); all methods
/// take `&self`.
///
/// # Example
///
/// ```
/// use pincache::{new_lru_cache, Cache};
///
/// let cache: Box<dyn Cache<Vec<u8>>> = new_lru_cache(8 << 20);
/// let id = cache.new_id();
/// let key = [&id.to_le_bytes()[..], &b"/block-0"[..]].concat();
///
/// let h = cache.insert(&key, vec![0u8; 4096], 4096, Box::new(|_, _| {}));
/// assert_eq!(cache.value(&h).len(), 4096);
/// cache.release(h);
/// ```
pub trait Cache<T>: Send + Sync {
    /// Inserts a mapping of `key` to `value` with the given `charge`,
    /// returning a handle that pins the new entry.
    ///
    /// Key bytes are borrowed for the call and copied into the entry. The
    /// `deleter` fires exactly once — with the key and the value — when the
    /// entry is no longer cached and no handle pins it (including at cache
    /// drop). Deleters run under the owning shard's lock: they must not
    /// touch this cache and should do bounded work.
    fn insert(&self, key: &[u8], value: T, charge: usize, deleter: Deleter<T>) -> Handle<T>;

    /// Returns a pinning handle to the entry under `key`, or `None` if the
    /// key is absent.
    fn lookup(&self, key: &[u8]) -> Option<Handle<T>>;

    /// Releases a handle previously returned by this cache's `insert` or
    /// `lookup`. Consuming the handle makes double-release impossible;
    /// releasing into a different cache instance is a caller bug.
    fn release(&self, handle: Handle<T>);

    /// The value supplied when the entry behind `handle` was inserted.
    fn value<'h>(&self, handle: &'h Handle<T>) -> &'h T {
        handle.value()
    }

    /// Removes `key` from the cache. A no-op for absent keys. Entries
    /// pinned by handles stay readable through them until released.
    fn erase(&self, key: &[u8]);

    /// Returns a numeric id no other `new_id` call on this cache ever
    /// returned. Callers partitioning one shared cache prefix their keys
    /// with an id to keep out of each other's namespaces.
    fn new_id(&self) -> u64;

    /// Evicts every entry that no handle currently pins. Afterwards the
    /// cache holds only pinned entries.
    fn prune(&self);

    /// Sum of the charges of resident entries. Computed per shard under
    /// separate lock acquisitions, so concurrent mutation makes it an
    /// approximation rather than a snapshot.
    fn total_charge(&self) -> usize;
}
