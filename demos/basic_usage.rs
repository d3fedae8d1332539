use pincache::prelude::*;

fn main() {
    let cache: ShardedLruCache<String> = ShardedLruCache::new(1024);

    let h = cache.insert(
        b"table-1/block-0",
        "first block".to_string(),
        11,
        Box::new(|key, value| {
            println!("deleter: {} => {}", String::from_utf8_lossy(key), value);
        }),
    );
    println!("inserted: {}", cache.value(&h));
    cache.release(h);

    if let Some(h) = cache.lookup(b"table-1/block-0") {
        println!("hit: {}", h.value());
        cache.release(h);
    }

    println!("charge in use: {}", cache.total_charge());
    cache.erase(b"table-1/block-0");
    println!("after erase: {:?}", cache.lookup(b"table-1/block-0").is_some());
}

// Expected output:
// inserted: first block
// hit: first block
// charge in use: 11
// deleter: table-1/block-0 => first block
// after erase: false
//
// Explanation: the erase drops the cache's reference; no handle pins the
// entry at that point, so the deleter fires during the erase call itself.
