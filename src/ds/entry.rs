//! Cache entry record, intrusive recency list, and pinning handle.
//!
//! An entry is a single heap allocation owned by the cache. Both the
//! recency lists and the hash table thread their links *through* the entry
//! (`prev`/`next` for the list the entry currently belongs to, `next_hash`
//! for its bucket chain), so membership changes never allocate.
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────┐
//!   │                    LruEntry<T>                       │
//!   ├──────────────────────────────────────────────────────┤
//!   │  key: Box<[u8]>      │ immutable after insert        │
//!   │  hash: u32           │ bucket + shard selection      │
//!   │  value: T            │ immutable after insert        │
//!   │  deleter: FnOnce     │ fires exactly once at death   │
//!   │  charge: usize       │ usage contribution            │
//!   ├──────────────────────┼───────────────────────────────┤
//!   │  refs: u32           │ cache ref (if in_cache) +     │
//!   │  in_cache: bool      │ one per outstanding handle    │
//!   ├──────────────────────┼───────────────────────────────┤
//!   │  prev / next         │ intrusive list links          │
//!   │  next_hash           │ intrusive bucket chain link   │
//!   └──────────────────────┴───────────────────────────────┘
//! ```
//!
//! Mutable bookkeeping fields (`refs`, `in_cache`, links) are only touched
//! under the owning shard's mutex, and always through raw-pointer field
//! access so that a client thread holding `&T` via a [`Handle`] never
//! aliases a `&mut LruEntry`.

use std::fmt;
use std::ptr::NonNull;

/// Destructor callback for a cache entry.
///
/// Invoked exactly once per inserted entry, with the original key bytes and
/// the value, when the entry's reference count reaches zero. This includes
/// entries still resident when the cache is dropped. Deleters run with the
/// owning shard's mutex held: they must not call back into the same cache
/// and should perform only bounded work.
pub type Deleter<T> = Box<dyn FnOnce(&[u8], T) + Send>;

/// One cached mapping. Variable-size state (the key) lives in its own
/// allocation; everything else is inline.
pub(crate) struct LruEntry<T> {
    pub(crate) key: Box<[u8]>,
    pub(crate) hash: u32,
    pub(crate) value: T,
    pub(crate) deleter: Deleter<T>,
    pub(crate) charge: usize,
    /// References: +1 for cache membership while `in_cache`, +1 per
    /// outstanding handle.
    pub(crate) refs: u32,
    /// True iff the entry is on exactly one of the shard's two lists and
    /// reachable from its hash table.
    pub(crate) in_cache: bool,
    pub(crate) prev: Option<NonNull<LruEntry<T>>>,
    pub(crate) next: Option<NonNull<LruEntry<T>>>,
    pub(crate) next_hash: Option<NonNull<LruEntry<T>>>,
}

impl<T> LruEntry<T> {
    /// Allocates a detached entry with `refs = 1` (the handle the caller
    /// will receive) and `in_cache = false`.
    pub(crate) fn alloc(
        key: &[u8],
        hash: u32,
        value: T,
        charge: usize,
        deleter: Deleter<T>,
    ) -> NonNull<LruEntry<T>> {
        let entry = Box::new(LruEntry {
            key: Box::from(key),
            hash,
            value,
            deleter,
            charge,
            refs: 1,
            in_cache: false,
            prev: None,
            next: None,
            next_hash: None,
        });
        NonNull::new(Box::into_raw(entry)).unwrap()
    }

    /// Frees the entry and fires its deleter with the original key and
    /// value.
    ///
    /// # Safety
    ///
    /// `e` must have been produced by [`LruEntry::alloc`], must not be
    /// reachable from any list or table, must have `refs == 0`, and must
    /// not be used again afterwards.
    pub(crate) unsafe fn free(e: NonNull<LruEntry<T>>) {
        let entry = Box::from_raw(e.as_ptr());
        let LruEntry {
            key, value, deleter, ..
        } = *entry;
        deleter(&key, value);
    }
}

/// Intrusive doubly-linked list over [`LruEntry`] pointers.
///
/// Front is the newest position; the back is the eviction victim. The list
/// does not own its entries; the shard's reference counting decides when an
/// entry dies.
pub(crate) struct EntryList<T> {
    head: Option<NonNull<LruEntry<T>>>,
    tail: Option<NonNull<LruEntry<T>>>,
    len: usize,
}

impl<T> EntryList<T> {
    pub(crate) const fn new() -> Self {
        EntryList {
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entry at the back (oldest position), without unlinking it.
    pub(crate) fn back(&self) -> Option<NonNull<LruEntry<T>>> {
        self.tail
    }

    /// Links a detached entry at the front (newest position).
    ///
    /// # Safety
    ///
    /// `e` must be a valid entry pointer that is not currently on any list.
    pub(crate) unsafe fn push_front(&mut self, e: NonNull<LruEntry<T>>) {
        (*e.as_ptr()).prev = None;
        (*e.as_ptr()).next = self.head;
        match self.head {
            Some(h) => (*h.as_ptr()).prev = Some(e),
            None => self.tail = Some(e),
        }
        self.head = Some(e);
        self.len += 1;
    }

    /// Unlinks an entry from this list, leaving it detached.
    ///
    /// # Safety
    ///
    /// `e` must currently be a member of this list.
    pub(crate) unsafe fn unlink(&mut self, e: NonNull<LruEntry<T>>) {
        let prev = (*e.as_ptr()).prev;
        let next = (*e.as_ptr()).next;
        match prev {
            Some(p) => (*p.as_ptr()).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => (*n.as_ptr()).prev = prev,
            None => self.tail = prev,
        }
        (*e.as_ptr()).prev = None;
        (*e.as_ptr()).next = None;
        self.len -= 1;
    }

    /// Unlinks and returns the back (oldest) entry.
    ///
    /// # Safety
    ///
    /// All entries reachable from this list must be valid.
    pub(crate) unsafe fn pop_back(&mut self) -> Option<NonNull<LruEntry<T>>> {
        let e = self.tail?;
        self.unlink(e);
        Some(e)
    }

    /// Snapshot of all member pointers, front to back.
    #[cfg(any(test, debug_assertions))]
    pub(crate) fn collect(&self) -> Vec<NonNull<LruEntry<T>>> {
        let mut out = Vec::with_capacity(self.len);
        let mut cur = self.head;
        while let Some(e) = cur {
            out.push(e);
            cur = unsafe { (*e.as_ptr()).next };
            if out.len() > self.len {
                panic!("cycle detected in entry list");
            }
        }
        out
    }
}

/// Opaque pinning reference to a cache entry.
///
/// Holding a handle keeps the entry's key and value alive even if the entry
/// is concurrently erased or displaced by a newer insert for the same key.
/// A handle does not imply the entry is still in the cache.
///
/// Handles are move-only: releasing one consumes it, so a handle cannot be
/// released twice. The only legal operations are [`Handle::value`], passing
/// the handle to the owning cache's `release`, and identity comparison.
/// Dropping a handle without releasing it leaks the pin (the entry is never
/// destroyed).
pub struct Handle<T> {
    ptr: NonNull<LruEntry<T>>,
}

impl<T> Handle<T> {
    pub(crate) fn new(ptr: NonNull<LruEntry<T>>) -> Self {
        Handle { ptr }
    }

    /// The value supplied at insertion time. Stable for the life of the
    /// handle, regardless of intervening inserts or erases on the same key.
    pub fn value(&self) -> &T {
        // SAFETY: the handle's reference keeps the entry alive, and `value`
        // is never written after insertion.
        unsafe { &(*self.ptr.as_ptr()).value }
    }

    /// Hash routed on by the sharded dispatcher.
    pub(crate) fn entry_hash(&self) -> u32 {
        // SAFETY: as above; `hash` is immutable after insertion.
        unsafe { (*self.ptr.as_ptr()).hash }
    }

    /// Consumes the handle, surrendering the raw entry pointer to the
    /// releasing shard.
    pub(crate) fn into_ptr(self) -> NonNull<LruEntry<T>> {
        self.ptr
    }
}

// SAFETY: a handle gives shared access to `T` (so `T: Sync`) and carries the
// value to whichever thread releases last (so `T: Send`). The bookkeeping
// fields it can reach are only mutated under the owning shard's mutex.
unsafe impl<T: Send + Sync> Send for Handle<T> {}
unsafe impl<T: Send + Sync> Sync for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    /// Identity comparison: two handles are equal iff they pin the same
    /// entry (not merely the same key).
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("entry", &self.ptr).finish()
    }
}
