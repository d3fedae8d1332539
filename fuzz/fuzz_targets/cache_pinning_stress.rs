#![no_main]

use libfuzzer_sys::fuzz_target;
use pincache::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Fuzz handle pinning across overwrites, erases and eviction pressure
//
// Keeps a pool of outstanding handles while the input bytes drive inserts,
// overwrites, erases and releases, then releases everything and checks the
// exactly-once deleter accounting.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let capacity = (data[0] % 32) as usize;
    let cache: ShardedLruCache<u32> = ShardedLruCache::new(capacity);
    let deletions = Arc::new(AtomicUsize::new(0));
    let mut insertions = 0usize;
    let mut held: Vec<Handle<u32>> = Vec::new();

    let mut idx = 1;
    while idx + 1 < data.len() {
        let op = data[idx] % 4;
        let key = [data[idx + 1] % 16];

        match op {
            0 => {
                let counter = deletions.clone();
                let h = cache.insert(
                    &key,
                    u32::from(key[0]),
                    1,
                    Box::new(move |_, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                );
                insertions += 1;
                held.push(h);
            }
            1 => {
                if let Some(h) = cache.lookup(&key) {
                    assert_eq!(*h.value(), u32::from(key[0]));
                    held.push(h);
                }
            }
            2 => {
                cache.erase(&key);
            }
            _ => {
                if !held.is_empty() {
                    let pick = (data[idx + 1] as usize) % held.len();
                    cache.release(held.swap_remove(pick));
                }
            }
        }

        idx += 2;
    }

    for h in held {
        cache.release(h);
    }
    drop(cache);
    assert_eq!(deletions.load(Ordering::SeqCst), insertions);
});
