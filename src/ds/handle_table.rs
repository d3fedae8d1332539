//! Intrusive chaining hash table over raw entry pointers.
//!
//! Buckets hold the heads of singly-linked chains threaded through each
//! entry's `next_hash` link, so the table adds no per-entry allocation and
//! no second indirection on the lookup path. The bucket count is a power of
//! two (initial 4) and doubles whenever the element count exceeds it,
//! keeping average chain length at or below one.
//!
//! The table does no locking and owns nothing: the caller holds the shard
//! mutex and decides entry lifetime. Chain order is not meaningful and may
//! be reversed by a resize.
//!
//! | Operation | Returns                   | Cost        |
//! |-----------|---------------------------|-------------|
//! | `lookup`  | matching entry or `None`  | O(1) expected |
//! | `insert`  | displaced prior or `None` | O(1) expected |
//! | `remove`  | unlinked entry or `None`  | O(1) expected |

use std::ptr::{addr_of_mut, NonNull};

use crate::ds::entry::LruEntry;

const INITIAL_BUCKETS: usize = 4;

/// Chaining hash table keyed by `(key bytes, hash)`.
pub(crate) struct HandleTable<T> {
    buckets: Box<[Option<NonNull<LruEntry<T>>>]>,
    elems: usize,
}

impl<T> HandleTable<T> {
    pub(crate) fn new() -> Self {
        HandleTable {
            buckets: vec![None; INITIAL_BUCKETS].into_boxed_slice(),
            elems: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.elems
    }

    /// Finds the entry matching `(key, hash)`, comparing the stored hash
    /// before the key bytes.
    pub(crate) fn lookup(&self, key: &[u8], hash: u32) -> Option<NonNull<LruEntry<T>>> {
        let mask = self.buckets.len() - 1;
        let mut cur = self.buckets[(hash as usize) & mask];
        // SAFETY: every pointer reachable from a bucket is a live entry
        // owned by the shard, and the caller holds the shard mutex.
        unsafe {
            while let Some(e) = cur {
                if (*e.as_ptr()).hash == hash && (&(*e.as_ptr()).key)[..] == *key {
                    return Some(e);
                }
                cur = (*e.as_ptr()).next_hash;
            }
        }
        None
    }

    /// Links `e` into the chain for its `(key, hash)`. If an entry with the
    /// same identity was present it is unlinked and returned; the caller
    /// finishes its eviction. Grows the table when `elems` exceeds the
    /// bucket count.
    ///
    /// # Safety
    ///
    /// `e` must be a live entry not currently in any table.
    pub(crate) unsafe fn insert(&mut self, e: NonNull<LruEntry<T>>) -> Option<NonNull<LruEntry<T>>> {
        let hash = (*e.as_ptr()).hash;
        let key: &[u8] = &(*e.as_ptr()).key;
        let slot = self.find_slot(key, hash);

        let old = *slot;
        (*e.as_ptr()).next_hash = match old {
            Some(prior) => (*prior.as_ptr()).next_hash,
            None => None,
        };
        *slot = Some(e);

        if old.is_none() {
            self.elems += 1;
            if self.elems > self.buckets.len() {
                self.grow();
            }
        }
        old
    }

    /// Unlinks and returns the entry matching `(key, hash)`, if any.
    ///
    /// # Safety
    ///
    /// All entries reachable from the table must be live.
    pub(crate) unsafe fn remove(&mut self, key: &[u8], hash: u32) -> Option<NonNull<LruEntry<T>>> {
        let slot = self.find_slot(key, hash);
        let result = *slot;
        if let Some(e) = result {
            *slot = (*e.as_ptr()).next_hash;
            (*e.as_ptr()).next_hash = None;
            self.elems -= 1;
        }
        result
    }

    /// Returns the location holding the matching entry's pointer: either a
    /// bucket slot or some predecessor's `next_hash` link. When no entry
    /// matches, this is the trailing `None` link of the chain, exactly
    /// where an insert belongs.
    unsafe fn find_slot(&mut self, key: &[u8], hash: u32) -> *mut Option<NonNull<LruEntry<T>>> {
        let mask = self.buckets.len() - 1;
        let mut slot: *mut Option<NonNull<LruEntry<T>>> = &mut self.buckets[(hash as usize) & mask];
        while let Some(e) = *slot {
            if (*e.as_ptr()).hash == hash && (&(*e.as_ptr()).key)[..] == *key {
                break;
            }
            slot = addr_of_mut!((*e.as_ptr()).next_hash);
        }
        slot
    }

    /// Doubles the bucket array until it exceeds the element count and
    /// rehashes every chain into it.
    unsafe fn grow(&mut self) {
        let mut new_len = INITIAL_BUCKETS;
        while new_len < self.elems {
            new_len <<= 1;
        }
        let mut new_buckets = vec![None; new_len].into_boxed_slice();

        let mut moved = 0usize;
        for i in 0..self.buckets.len() {
            let mut cur = self.buckets[i].take();
            while let Some(e) = cur {
                let next = (*e.as_ptr()).next_hash;
                let idx = ((*e.as_ptr()).hash as usize) & (new_len - 1);
                (*e.as_ptr()).next_hash = new_buckets[idx];
                new_buckets[idx] = Some(e);
                cur = next;
                moved += 1;
            }
        }
        debug_assert_eq!(moved, self.elems);
        self.buckets = new_buckets;
    }

    /// All entries currently reachable from the table, in no particular
    /// order.
    #[cfg(any(test, debug_assertions))]
    pub(crate) fn collect(&self) -> Vec<NonNull<LruEntry<T>>> {
        let mut out = Vec::with_capacity(self.elems);
        for bucket in self.buckets.iter() {
            let mut cur = *bucket;
            while let Some(e) = cur {
                out.push(e);
                cur = unsafe { (*e.as_ptr()).next_hash };
                if out.len() > self.elems {
                    panic!("cycle detected in hash chain");
                }
            }
        }
        out
    }
}
