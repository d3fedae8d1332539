// ==============================================
// CACHE BEHAVIOR TESTS (integration)
// ==============================================
//
// End-to-end behavior of the sharded cache through its public API: hit and
// miss paths, pinning semantics across overwrite and erase, eviction under
// capacity pressure, charge accounting, prune, id generation, and the
// zero-capacity mode. Numeric keys/values are converted to the byte-string
// and value types the cache expects, and one shared deleter records every
// (key, value) it is handed.

use std::sync::{Arc, Mutex};

use pincache::prelude::*;

const CACHE_SIZE: usize = 1000;

fn encode_key(k: i32) -> [u8; 4] {
    (k as u32).to_le_bytes()
}

fn decode_key(key: &[u8]) -> i32 {
    assert_eq!(key.len(), 4);
    u32::from_le_bytes([key[0], key[1], key[2], key[3]]) as i32
}

struct CacheFixture {
    cache: ShardedLruCache<i32>,
    deleted: Arc<Mutex<Vec<(i32, i32)>>>,
}

impl CacheFixture {
    fn new(capacity: usize) -> Self {
        CacheFixture {
            cache: ShardedLruCache::new(capacity),
            deleted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn deleter(&self) -> Deleter<i32> {
        let deleted = self.deleted.clone();
        Box::new(move |key, value| {
            deleted.lock().unwrap().push((decode_key(key), value));
        })
    }

    /// Looks up and immediately releases, returning the value or -1.
    fn lookup(&self, key: i32) -> i32 {
        match self.cache.lookup(&encode_key(key)) {
            Some(handle) => {
                let value = *handle.value();
                self.cache.release(handle);
                value
            }
            None => -1,
        }
    }

    /// Inserts and immediately releases the insertion handle.
    fn insert(&self, key: i32, value: i32, charge: usize) {
        let handle = self
            .cache
            .insert(&encode_key(key), value, charge, self.deleter());
        self.cache.release(handle);
    }

    /// Inserts and keeps the handle.
    fn insert_and_return_handle(&self, key: i32, value: i32, charge: usize) -> Handle<i32> {
        self.cache
            .insert(&encode_key(key), value, charge, self.deleter())
    }

    fn erase(&self, key: i32) {
        self.cache.erase(&encode_key(key));
    }

    fn deleted(&self) -> Vec<(i32, i32)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[test]
fn hit_and_miss() {
    let t = CacheFixture::new(CACHE_SIZE);
    assert_eq!(t.lookup(100), -1);

    t.insert(100, 101, 1);
    assert_eq!(t.lookup(100), 101);
    assert_eq!(t.lookup(200), -1);
    assert_eq!(t.lookup(300), -1);

    t.insert(200, 201, 1);
    assert_eq!(t.lookup(100), 101);
    assert_eq!(t.lookup(200), 201);
    assert_eq!(t.lookup(300), -1);

    // Overwriting a key deletes the old value exactly once.
    t.insert(100, 102, 1);
    assert_eq!(t.lookup(100), 102);
    assert_eq!(t.lookup(200), 201);
    assert_eq!(t.lookup(300), -1);

    assert_eq!(t.deleted(), vec![(100, 101)]);
}

#[test]
fn erase() {
    let t = CacheFixture::new(CACHE_SIZE);

    // Erasing from an empty cache invokes no deleter.
    t.erase(200);
    assert!(t.deleted().is_empty());

    t.insert(100, 101, 1);
    t.insert(200, 201, 1);
    t.erase(100);
    assert_eq!(t.lookup(100), -1);
    assert_eq!(t.lookup(200), 201);
    assert_eq!(t.deleted(), vec![(100, 101)]);

    // Erasing an already-absent key is a no-op.
    t.erase(100);
    assert_eq!(t.lookup(100), -1);
    assert_eq!(t.lookup(200), 201);
    assert_eq!(t.deleted().len(), 1);
}

#[test]
fn entries_are_pinned() {
    let t = CacheFixture::new(CACHE_SIZE);

    t.insert(100, 101, 1);
    let h1 = t.cache.lookup(&encode_key(100)).unwrap();
    assert_eq!(*h1.value(), 101);

    // Overwrite while the old value is pinned: no deleter yet.
    t.insert(100, 102, 1);
    let h2 = t.cache.lookup(&encode_key(100)).unwrap();
    assert_eq!(*h2.value(), 102);
    assert!(t.deleted().is_empty());

    t.cache.release(h1);
    assert_eq!(t.deleted(), vec![(100, 101)]);

    // Erase removes the key from the cache but h2 stays readable.
    t.erase(100);
    assert_eq!(t.lookup(100), -1);
    assert_eq!(*h2.value(), 102);
    assert_eq!(t.deleted().len(), 1);

    t.cache.release(h2);
    assert_eq!(t.deleted(), vec![(100, 101), (100, 102)]);
}

#[test]
fn eviction_policy() {
    let t = CacheFixture::new(CACHE_SIZE);
    t.insert(100, 101, 1);
    t.insert(200, 201, 1);
    t.insert(300, 301, 1);
    let pinned = t.cache.lookup(&encode_key(300)).unwrap();

    // Frequently used entries must be kept around, as must pinned ones.
    for i in 0..(CACHE_SIZE as i32 + 100) {
        t.insert(1000 + i, 2000 + i, 1);
        assert_eq!(t.lookup(1000 + i), 2000 + i);
        assert_eq!(t.lookup(100), 101);
    }
    assert_eq!(t.lookup(100), 101);
    assert_eq!(t.lookup(200), -1);
    assert_eq!(t.lookup(300), 301);
    t.cache.release(pinned);
}

#[test]
fn use_exceeds_cache_size() {
    let t = CacheFixture::new(CACHE_SIZE);

    // Overfill the cache, keeping handles on every inserted entry.
    let handles: Vec<Handle<i32>> = (0..(CACHE_SIZE as i32 + 100))
        .map(|i| t.insert_and_return_handle(1000 + i, 2000 + i, 1))
        .collect();

    // Nothing was evictable, so every entry is still findable.
    for i in 0..handles.len() as i32 {
        assert_eq!(t.lookup(1000 + i), 2000 + i);
    }
    assert!(t.cache.total_charge() > CACHE_SIZE);

    let total = handles.len();
    for h in handles {
        t.cache.release(h);
    }

    // Every deleter fires exactly once by the time the cache is gone.
    drop(t.cache);
    let deleted = t.deleted.lock().unwrap().clone();
    assert_eq!(deleted.len(), total);
}

#[test]
fn heavy_entries() {
    // Mix light and heavy entries, overfilling the cache, then confirm the
    // combined charge of surviving entries respects the capacity bound.
    let t = CacheFixture::new(CACHE_SIZE);
    const LIGHT: usize = 1;
    const HEAVY: usize = 10;
    let mut added = 0usize;
    let mut index = 0i32;
    while added < 2 * CACHE_SIZE {
        let weight = if index & 1 == 1 { LIGHT } else { HEAVY };
        t.insert(index, 1000 + index, weight);
        added += weight;
        index += 1;
    }

    let mut cached_weight = 0usize;
    for i in 0..index {
        let weight = if i & 1 == 1 { LIGHT } else { HEAVY };
        let r = t.lookup(i);
        if r >= 0 {
            cached_weight += weight;
            assert_eq!(r, 1000 + i);
        }
    }
    assert!(cached_weight <= CACHE_SIZE + CACHE_SIZE / 10);
}

#[test]
fn new_id() {
    let t = CacheFixture::new(CACHE_SIZE);
    let a = t.cache.new_id();
    let b = t.cache.new_id();
    assert_ne!(a, b);
}

#[test]
fn prune() {
    let t = CacheFixture::new(CACHE_SIZE);
    t.insert(1, 100, 1);
    t.insert(2, 200, 1);

    let handle = t.cache.lookup(&encode_key(1)).unwrap();
    t.cache.prune();
    t.cache.release(handle);

    // The pinned entry survived the prune; the idle one did not.
    assert_eq!(t.lookup(1), 100);
    assert_eq!(t.lookup(2), -1);
}

#[test]
fn prune_leaves_only_pinned_charge() {
    let t = CacheFixture::new(CACHE_SIZE);
    t.insert(1, 100, 5);
    t.insert(2, 200, 7);
    let pinned = t.cache.lookup(&encode_key(2)).unwrap();

    t.cache.prune();
    assert_eq!(t.cache.total_charge(), 7);
    t.cache.release(pinned);
}

#[test]
fn zero_size_cache() {
    let t = CacheFixture::new(0);

    t.insert(1, 100, 1);
    assert_eq!(t.lookup(1), -1);
    // The deleter fired no later than the release of the insert handle.
    assert_eq!(t.deleted(), vec![(1, 100)]);
}

#[test]
fn independent_releases_of_handles_to_the_same_key() {
    let t = CacheFixture::new(CACHE_SIZE);
    t.insert(7, 70, 1);

    let a = t.cache.lookup(&encode_key(7)).unwrap();
    let b = t.cache.lookup(&encode_key(7)).unwrap();
    assert_eq!(a, b); // same entry, two pins

    t.erase(7);
    t.cache.release(a);
    // Still one pin outstanding: no deleter yet.
    assert!(t.deleted().is_empty());

    t.cache.release(b);
    assert_eq!(t.deleted(), vec![(7, 70)]);
}

#[test]
fn destruction_fires_deleters_for_resident_entries() {
    let deleted;
    {
        let t = CacheFixture::new(CACHE_SIZE);
        t.insert(1, 10, 1);
        t.insert(2, 20, 1);
        t.insert(3, 30, 1);
        deleted = t.deleted.clone();
        // `t.cache` dropped here with three resident, unpinned entries.
    }
    let mut log = deleted.lock().unwrap().clone();
    log.sort();
    assert_eq!(log, vec![(1, 10), (2, 20), (3, 30)]);
}

#[test]
fn value_identity_is_stable_across_overwrites() {
    let t = CacheFixture::new(CACHE_SIZE);

    t.insert(42, 1, 1);
    let h1 = t.cache.lookup(&encode_key(42)).unwrap();
    t.insert(42, 2, 1);
    let h2 = t.cache.lookup(&encode_key(42)).unwrap();
    t.insert(42, 3, 1);
    let h3 = t.cache.lookup(&encode_key(42)).unwrap();

    // Each handle keeps observing the value from its own insertion.
    assert_eq!(*h1.value(), 1);
    assert_eq!(*h2.value(), 2);
    assert_eq!(*h3.value(), 3);
    assert_ne!(h1, h2);
    assert_ne!(h2, h3);

    t.cache.release(h1);
    t.cache.release(h2);
    t.cache.release(h3);
    assert_eq!(t.lookup(42), 3);
}
