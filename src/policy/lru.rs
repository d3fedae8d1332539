//! # Single-shard LRU engine with pinning handles
//!
//! One shard owns a hash table, two intrusive lists, a usage counter and a
//! mutex. Every cache-resident entry is on exactly one of the two lists:
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │                         LruShard<T>                               │
//!   │                                                                   │
//!   │   ┌───────────────────────────────────────────────────────────┐   │
//!   │   │  parking_lot::Mutex<ShardInner<T>>                        │   │
//!   │   │                                                           │   │
//!   │   │   HandleTable ── (key, hash) ──► LruEntry*                │   │
//!   │   │                                                           │   │
//!   │   │   in_use: entries with outstanding handles (refs >= 2)    │   │
//!   │   │      front ──► [E] ◄──► [E] ◄──► [E] ◄── back             │   │
//!   │   │                                                           │   │
//!   │   │   lru: entries with no handles (refs == 1), LRU order     │   │
//!   │   │      front ──► [E] ◄──► [E] ◄──► [E] ◄── back             │   │
//!   │   │     (newest)                       (eviction victim)      │   │
//!   │   │                                                           │   │
//!   │   │   usage: Σ charge over both lists, compared to capacity   │   │
//!   │   └───────────────────────────────────────────────────────────┘   │
//!   └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Entry states
//!
//! | state   | refs | in_cache | where          | entered via              |
//! |---------|------|----------|----------------|--------------------------|
//! | IN_USE  | >= 2 | true     | `in_use` list  | insert, lookup           |
//! | IDLE    | 1    | true     | `lru` list     | last handle released     |
//! | ZOMBIE  | >= 1 | false    | no list        | erased/displaced pinned  |
//! | DEAD    | 0    | -        | freed          | final unref              |
//!
//! Entries migrate between the two lists only inside `ref_entry` and
//! `unref`, when they detect the entry gaining or losing its last external
//! reference. An entry erased or displaced while pinned leaves both lists
//! and the table but stays alive (ZOMBIE) until its last handle goes away;
//! its deleter still fires exactly once.
//!
//! Eviction only ever takes the back of `lru`, so pinned entries are never
//! victims and `usage` may sit above `capacity` for as long as every
//! resident entry is pinned.
//!
//! All operations hold the shard mutex for their full duration, including
//! deleter invocations; deleters must not re-enter the cache.

use parking_lot::Mutex;
use std::ptr::NonNull;

use crate::ds::entry::{Deleter, EntryList, Handle, LruEntry};
use crate::ds::handle_table::HandleTable;
#[cfg(any(test, debug_assertions))]
use crate::error::InvariantError;
#[cfg(feature = "metrics")]
use crate::metrics::metrics_impl::ShardMetrics;

/// State guarded by the shard mutex.
pub(crate) struct ShardInner<T> {
    usage: usize,
    table: HandleTable<T>,
    /// Entries currently referenced by clients, in no particular order.
    in_use: EntryList<T>,
    /// Entries with no outstanding handles, newest at the front.
    lru: EntryList<T>,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: ShardMetrics,
}

/// One independent LRU engine of the sharded cache.
pub(crate) struct LruShard<T> {
    capacity: usize,
    inner: Mutex<ShardInner<T>>,
}

// SAFETY: all entries are owned by the shard and every access to their
// bookkeeping fields is serialized by `inner`. Values and deleters move to
// whichever thread drops the last reference (T: Send, deleters are Send),
// and handles hand out `&T` across threads (T: Sync).
unsafe impl<T: Send> Send for LruShard<T> {}
unsafe impl<T: Send + Sync> Sync for LruShard<T> {}

impl<T> LruShard<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        LruShard {
            capacity,
            inner: Mutex::new(ShardInner {
                usage: 0,
                table: HandleTable::new(),
                in_use: EntryList::new(),
                lru: EntryList::new(),
                #[cfg(feature = "metrics")]
                metrics: ShardMetrics::default(),
            }),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts a mapping and returns a handle pinning it.
    ///
    /// The returned handle is valid even if the insert immediately evicted
    /// other entries: the new entry enters `in_use` with `refs == 2` and
    /// cannot be its own victim. A prior entry under the same key is
    /// displaced (its deleter fires now, or once its last handle is
    /// released). With `capacity == 0` the entry is never cached and the
    /// handle is its only reference.
    pub(crate) fn insert(
        &self,
        key: &[u8],
        hash: u32,
        value: T,
        charge: usize,
        deleter: Deleter<T>,
    ) -> Handle<T> {
        let mut inner = self.inner.lock();
        let e = LruEntry::alloc(key, hash, value, charge, deleter);

        #[cfg(feature = "metrics")]
        inner.metrics.record_insert();

        // SAFETY: `e` is fresh and detached; displaced/evicted entries come
        // straight out of the table, satisfying finish_erase's contract.
        unsafe {
            if self.capacity > 0 {
                (*e.as_ptr()).refs += 1; // the cache's own reference
                (*e.as_ptr()).in_cache = true;
                inner.in_use.push_front(e);
                inner.usage += charge;
                let displaced = inner.table.insert(e);
                #[cfg(feature = "metrics")]
                if displaced.is_some() {
                    inner.metrics.record_replacement();
                }
                inner.finish_erase(displaced);
            }
            // capacity == 0: caching is off; the entry stays detached and
            // dies when the returned handle is released.

            while inner.usage > self.capacity {
                let Some(victim) = inner.lru.back() else {
                    break; // everything resident is pinned
                };
                debug_assert_eq!((*victim.as_ptr()).refs, 1);
                let removed = inner
                    .table
                    .remove(&(*victim.as_ptr()).key, (*victim.as_ptr()).hash);
                debug_assert_eq!(removed, Some(victim));
                #[cfg(feature = "metrics")]
                inner.metrics.record_eviction();
                inner.finish_erase(removed);
            }
        }

        #[cfg(debug_assertions)]
        inner.assert_invariants();
        Handle::new(e)
    }

    /// Finds `(key, hash)` and returns a pinning handle, promoting the
    /// entry to `in_use` if this is its first external reference.
    pub(crate) fn lookup(&self, key: &[u8], hash: u32) -> Option<Handle<T>> {
        let mut inner = self.inner.lock();
        match inner.table.lookup(key, hash) {
            Some(e) => {
                #[cfg(feature = "metrics")]
                inner.metrics.record_hit();
                // SAFETY: `e` came from the table, so it is live and
                // in-cache.
                unsafe { inner.ref_entry(e) };
                Some(Handle::new(e))
            }
            None => {
                #[cfg(feature = "metrics")]
                inner.metrics.record_miss();
                None
            }
        }
    }

    /// Releases a handle, demoting the entry to `lru` when this was its
    /// last external reference, or destroying it if it was already out of
    /// the cache.
    pub(crate) fn release(&self, handle: Handle<T>) {
        let mut inner = self.inner.lock();
        // SAFETY: the handle held a reference, so the entry is live and
        // refs >= 1.
        unsafe { inner.unref(handle.into_ptr()) };
        #[cfg(debug_assertions)]
        inner.assert_invariants();
    }

    /// Removes `(key, hash)` from the cache. Entries pinned by handles
    /// survive as zombies; absent keys are a no-op.
    pub(crate) fn erase(&self, key: &[u8], hash: u32) {
        let mut inner = self.inner.lock();
        // SAFETY: the entry, if any, comes straight out of the table.
        unsafe {
            let removed = inner.table.remove(key, hash);
            #[cfg(feature = "metrics")]
            if removed.is_some() {
                inner.metrics.record_erase();
            }
            inner.finish_erase(removed);
        }
        #[cfg(debug_assertions)]
        inner.assert_invariants();
    }

    /// Evicts every unpinned resident entry. Afterwards `usage` equals the
    /// total charge of pinned entries.
    pub(crate) fn prune(&self) {
        let mut inner = self.inner.lock();
        // SAFETY: entries on `lru` are live, in-cache and unpinned.
        unsafe {
            while let Some(e) = inner.lru.back() {
                debug_assert_eq!((*e.as_ptr()).refs, 1);
                let removed = inner.table.remove(&(*e.as_ptr()).key, (*e.as_ptr()).hash);
                debug_assert_eq!(removed, Some(e));
                #[cfg(feature = "metrics")]
                inner.metrics.record_prune();
                inner.finish_erase(removed);
            }
        }
        #[cfg(debug_assertions)]
        inner.assert_invariants();
    }

    /// Current usage under the shard mutex.
    pub(crate) fn total_charge(&self) -> usize {
        self.inner.lock().usage
    }

    /// Number of resident entries.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().table.len()
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Result<(), InvariantError> {
        self.inner.lock().check_invariants()
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn fold_metrics(&self, snap: &mut crate::metrics::snapshot::CacheMetricsSnapshot) {
        let inner = self.inner.lock();
        inner.metrics.fold_into(snap);
        snap.usage += inner.usage;
        snap.capacity += self.capacity;
    }
}

impl<T> ShardInner<T> {
    /// Registers a new external reference, migrating the entry from `lru`
    /// to `in_use` when it was idle.
    ///
    /// # Safety
    ///
    /// `e` must be a live entry owned by this shard.
    unsafe fn ref_entry(&mut self, e: NonNull<LruEntry<T>>) {
        if (*e.as_ptr()).refs == 1 && (*e.as_ptr()).in_cache {
            self.lru.unlink(e);
            self.in_use.push_front(e);
        }
        (*e.as_ptr()).refs += 1;
    }

    /// Drops one reference. At zero the entry dies and its deleter fires;
    /// at one-with-membership it migrates from `in_use` to the front of
    /// `lru`.
    ///
    /// # Safety
    ///
    /// `e` must be a live entry owned by this shard with `refs >= 1`.
    unsafe fn unref(&mut self, e: NonNull<LruEntry<T>>) {
        debug_assert!((*e.as_ptr()).refs > 0);
        (*e.as_ptr()).refs -= 1;
        if (*e.as_ptr()).refs == 0 {
            debug_assert!(!(*e.as_ptr()).in_cache);
            LruEntry::free(e);
        } else if (*e.as_ptr()).in_cache && (*e.as_ptr()).refs == 1 {
            // No longer in use; becomes the newest idle entry.
            self.in_use.unlink(e);
            self.lru.push_front(e);
        }
    }

    /// Completes removal of an entry that has just been unlinked from the
    /// hash table (`None` is a no-op). This is the only place charge leaves
    /// `usage` and the only path into the ZOMBIE and DEAD states.
    ///
    /// # Safety
    ///
    /// `e`, if present, must have just been removed from the table and
    /// still be marked in-cache.
    unsafe fn finish_erase(&mut self, e: Option<NonNull<LruEntry<T>>>) {
        let Some(e) = e else { return };
        debug_assert!((*e.as_ptr()).in_cache);
        // refs == 1 means the cache held the only reference, i.e. the entry
        // sits on `lru`; otherwise it is pinned on `in_use`.
        if (*e.as_ptr()).refs == 1 {
            self.lru.unlink(e);
        } else {
            self.in_use.unlink(e);
        }
        (*e.as_ptr()).in_cache = false;
        self.usage -= (*e.as_ptr()).charge;
        self.unref(e);
    }

    #[cfg(any(test, debug_assertions))]
    fn assert_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("lru shard invariant violated: {err}");
        }
    }

    /// Walks both lists and the table, verifying the structural invariants
    /// the state machine maintains.
    #[cfg(any(test, debug_assertions))]
    fn check_invariants(&self) -> Result<(), InvariantError> {
        use std::collections::HashSet;

        let lru_entries = self.lru.collect();
        let in_use_entries = self.in_use.collect();
        if lru_entries.len() != self.lru.len() || in_use_entries.len() != self.in_use.len() {
            return Err(InvariantError::new("list length counter out of sync"));
        }

        let mut charge_sum = 0usize;
        let mut listed: HashSet<*mut LruEntry<T>> = HashSet::new();
        unsafe {
            for &e in &lru_entries {
                if (*e.as_ptr()).refs != 1 {
                    return Err(InvariantError::new("entry on lru list has refs != 1"));
                }
                if !(*e.as_ptr()).in_cache {
                    return Err(InvariantError::new("entry on lru list not marked in-cache"));
                }
                charge_sum += (*e.as_ptr()).charge;
                if !listed.insert(e.as_ptr()) {
                    return Err(InvariantError::new("entry reachable from both lists"));
                }
            }
            for &e in &in_use_entries {
                if (*e.as_ptr()).refs < 2 {
                    return Err(InvariantError::new("entry on in_use list has refs < 2"));
                }
                if !(*e.as_ptr()).in_cache {
                    return Err(InvariantError::new(
                        "entry on in_use list not marked in-cache",
                    ));
                }
                charge_sum += (*e.as_ptr()).charge;
                if !listed.insert(e.as_ptr()) {
                    return Err(InvariantError::new("entry reachable from both lists"));
                }
            }
        }

        if charge_sum != self.usage {
            return Err(InvariantError::new(format!(
                "usage {} does not match listed charge sum {}",
                self.usage, charge_sum
            )));
        }

        let tabled = self.table.collect();
        if tabled.len() != listed.len() {
            return Err(InvariantError::new(format!(
                "table holds {} entries but lists hold {}",
                tabled.len(),
                listed.len()
            )));
        }
        let mut identities: HashSet<(u32, &[u8])> = HashSet::new();
        unsafe {
            for &e in &tabled {
                if !listed.contains(&e.as_ptr()) {
                    return Err(InvariantError::new(
                        "table entry not reachable from either list",
                    ));
                }
                if !identities.insert(((*e.as_ptr()).hash, &(&(*e.as_ptr()).key)[..])) {
                    return Err(InvariantError::new(
                        "duplicate (hash, key) identity reachable from table",
                    ));
                }
            }
        }
        Ok(())
    }
}

impl<T> Drop for ShardInner<T> {
    fn drop(&mut self) {
        // Dropping with outstanding handles is a caller bug; in release
        // builds the pinned entries are leaked rather than freed so no
        // handle ever dangles.
        debug_assert!(
            self.in_use.is_empty(),
            "cache dropped with outstanding handles"
        );
        // SAFETY: entries on `lru` are live with refs == 1 and nothing else
        // references them; unref frees each and fires its deleter.
        unsafe {
            while let Some(e) = self.lru.pop_back() {
                debug_assert!((*e.as_ptr()).in_cache);
                debug_assert_eq!((*e.as_ptr()).refs, 1);
                (*e.as_ptr()).in_cache = false;
                self.unref(e);
            }
        }
    }
}
