#![no_main]

use libfuzzer_sys::fuzz_target;
use pincache::prelude::*;

// Fuzz arbitrary operation sequences on the sharded cache
//
// Decodes random sequences of insert, lookup, erase and prune operations
// from the input bytes. Debug builds re-check the shard invariants after
// every operation, so any structural corruption aborts the run.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let capacity = data[0] as usize;
    let cache: ShardedLruCache<u32> = ShardedLruCache::new(capacity);

    let mut idx = 1;
    while idx + 2 < data.len() {
        let op = data[idx] % 4;
        let key = [data[idx + 1]];
        let charge = (data[idx + 2] % 16) as usize;

        match op {
            0 => {
                let h = cache.insert(&key, u32::from(key[0]), charge, Box::new(|_, _| {}));
                cache.release(h);
            }
            1 => {
                if let Some(h) = cache.lookup(&key) {
                    assert_eq!(*h.value(), u32::from(key[0]));
                    cache.release(h);
                }
            }
            2 => {
                cache.erase(&key);
            }
            _ => {
                cache.prune();
            }
        }

        idx += 3;
    }

    // No handle is outstanding, so a prune must leave nothing behind.
    cache.prune();
    assert_eq!(cache.total_charge(), 0);
});
