use pincache::prelude::*;

// Two readers sharing one block cache, each prefixing its keys with an id
// from new_id() so their block numbers never collide.

struct Reader {
    id: u64,
}

impl Reader {
    fn key(&self, block: u32) -> Vec<u8> {
        let mut key = self.id.to_le_bytes().to_vec();
        key.extend_from_slice(&block.to_le_bytes());
        key
    }
}

fn main() {
    let cache: ShardedLruCache<Vec<u8>> = ShardedLruCache::new(1 << 20);

    let a = Reader { id: cache.new_id() };
    let b = Reader { id: cache.new_id() };

    let h = cache.insert(&a.key(0), vec![0xAA; 4096], 4096, Box::new(|_, _| {}));
    cache.release(h);
    let h = cache.insert(&b.key(0), vec![0xBB; 4096], 4096, Box::new(|_, _| {}));
    cache.release(h);

    // Same block number, different namespaces, different payloads.
    let ha = cache.lookup(&a.key(0)).unwrap();
    let hb = cache.lookup(&b.key(0)).unwrap();
    println!("reader a block 0 byte: {:#x}", cache.value(&ha)[0]);
    println!("reader b block 0 byte: {:#x}", cache.value(&hb)[0]);
    cache.release(ha);
    cache.release(hb);

    println!("resident entries: {}", cache.len());
}

// Expected output:
// reader a block 0 byte: 0xaa
// reader b block 0 byte: 0xbb
// resident entries: 2
