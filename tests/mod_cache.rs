use vego::cache::{BlockCache, BlockCacheConfig};
use vego::errors::ErrorCode;

#[test]
fn lru_eviction_respects_recency() {
    let cache = BlockCache::with_shards(250, 1);
    cache.put("k1", &[1u8; 100]).unwrap();
    cache.put("k2", &[2u8; 100]).unwrap();
    assert!(cache.get("k1").is_some());
    cache.put("k3", &[3u8; 100]).unwrap();

    assert!(cache.get("k1").is_some());
    assert!(cache.get("k2").is_none());
    assert!(cache.get("k3").is_some());
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn returned_bytes_are_isolated_from_the_cache() {
    let cache = BlockCache::new(1024);
    let original = vec![7u8; 64];
    cache.put("block", &original).unwrap();

    let mut copy = cache.get("block").unwrap();
    copy[0] ^= 1;
    assert_eq!(cache.get("block").unwrap(), original);
}

#[test]
fn oversized_values_are_rejected() {
    let cache = BlockCache::new(100);
    let err = cache.put("big", &[0u8; 101]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert_eq!(cache.len(), 0);
}

#[test]
fn replacing_a_key_updates_the_byte_gauge() {
    let cache = BlockCache::with_shards(1000, 1);
    cache.put("k", &[0u8; 400]).unwrap();
    assert_eq!(cache.size(), 400);
    cache.put("k", &[0u8; 100]).unwrap();
    assert_eq!(cache.size(), 100);
    assert_eq!(cache.len(), 1);
}

#[test]
fn size_stays_within_capacity() {
    let cache = BlockCache::with_shards(1000, 4);
    for i in 0..200 {
        cache.put(&format!("key-{i}"), &[0u8; 100]).unwrap();
        assert!(cache.size() <= cache.capacity());
    }
    assert!(cache.stats().evictions > 0);
}

#[test]
fn stats_account_for_every_get() {
    let cache = BlockCache::new(4096);
    cache.put("a", b"alpha").unwrap();

    let mut gets = 0u64;
    for _ in 0..5 {
        cache.get("a");
        gets += 1;
    }
    for _ in 0..3 {
        cache.get("nope");
        gets += 1;
    }
    let stats = cache.stats();
    assert_eq!(stats.hits, 5);
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.hits + stats.misses, gets);
    assert!((stats.hit_rate - 5.0 / 8.0).abs() < 1e-9);

    cache.reset_stats();
    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 0);
    assert_eq!(stats.hit_rate, 0.0);
}

#[test]
fn remove_invalidate_and_clear() {
    let cache = BlockCache::new(4096);
    cache.put("a", b"one").unwrap();
    cache.put("b", b"two").unwrap();

    assert!(cache.remove("a"));
    assert!(!cache.remove("a"));
    cache.invalidate("b");
    assert!(cache.get("b").is_none());
    assert!(cache.is_empty());

    cache.put("c", b"three").unwrap();
    cache.clear();
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.size(), 0);
}

#[test]
fn shard_geometry_follows_the_config() {
    let cache = BlockCache::with_config(BlockCacheConfig { capacity_bytes: 1 << 20, shards: 8 });
    assert_eq!(cache.shard_count(), 8);
    assert_eq!(cache.capacity(), 1 << 20);

    let defaulted = BlockCache::new(1 << 20);
    assert_eq!(defaulted.shard_count(), 64);
}

#[test]
fn concurrent_readers_and_writers_keep_counts_sane() {
    use std::sync::Arc;
    let cache = Arc::new(BlockCache::with_shards(64 * 1024, 8));
    let mut handles = Vec::new();
    for t in 0..4 {
        let cache = cache.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..500 {
                let key = format!("t{t}-{i}");
                cache.put(&key, &[t as u8; 64]).unwrap();
                let _ = cache.get(&key);
                let _ = cache.get("shared-miss");
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 4 * 500 * 2);
    assert!(cache.size() <= cache.capacity());
}
