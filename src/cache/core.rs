use std::sync::atomic::Ordering;

use lru::LruCache;
use parking_lot::RwLock;

use crate::cache::config::BlockCacheConfig;
use crate::cache::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::errors::{Result, VegoError};
use crate::utils::hash::fnv1a_64;

/// A thread-safe sharded LRU cache of byte blocks, bounded per shard by
/// bytes. Stored values and returned values are always independent
/// allocations, so callers can never mutate cache contents.
pub struct BlockCache {
    shards: Vec<RwLock<Shard>>,
    per_shard_capacity: usize,
    capacity: usize,
    metrics: CacheMetrics,
}

struct Shard {
    // Unbounded at the entry level; eviction is driven by the byte gauge.
    store: LruCache<String, Vec<u8>>,
    bytes: usize,
}

impl BlockCache {
    /// A cache with the default shard count.
    #[must_use]
    pub fn new(capacity_bytes: usize) -> Self {
        Self::with_config(BlockCacheConfig { capacity_bytes, ..Default::default() })
    }

    #[must_use]
    pub fn with_shards(capacity_bytes: usize, shards: usize) -> Self {
        Self::with_config(BlockCacheConfig { capacity_bytes, shards })
    }

    #[must_use]
    pub fn with_config(config: BlockCacheConfig) -> Self {
        let shard_count = config.shards.max(1);
        let per_shard_capacity = (config.capacity_bytes / shard_count).max(1);
        let shards = (0..shard_count)
            .map(|_| RwLock::new(Shard { store: LruCache::unbounded(), bytes: 0 }))
            .collect();
        Self { shards, per_shard_capacity, capacity: config.capacity_bytes, metrics: CacheMetrics::default() }
    }

    fn shard_for(&self, key: &str) -> &RwLock<Shard> {
        let index = fnv1a_64(key.as_bytes()) % self.shards.len() as u64;
        &self.shards[index as usize]
    }

    /// Look up a block, promoting it on hit. Returns an owned copy.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let shard = self.shard_for(key);
        {
            let guard = shard.read();
            if guard.store.peek(key).is_none() {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }
        // Re-check under the write lock: the entry may have been evicted
        // between the two locks, which counts as a miss.
        let mut guard = shard.write();
        match guard.store.get(key) {
            Some(value) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a block, copying it into cache-owned storage and evicting
    /// from the LRU tail until it fits. Values larger than the whole
    /// cache are rejected.
    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        if value.len() > self.capacity {
            return Err(VegoError::invalid_argument("cache.put", "value exceeds cache capacity")
                .with_context("size", value.len().to_string())
                .with_context("capacity", self.capacity.to_string()));
        }
        let shard = self.shard_for(key);
        let mut guard = shard.write();
        if let Some(old) = guard.store.pop(key) {
            guard.bytes -= old.len();
        }
        while guard.bytes + value.len() > self.per_shard_capacity {
            match guard.store.pop_lru() {
                Some((_, evicted)) => {
                    guard.bytes -= evicted.len();
                    self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
        guard.store.put(key.to_string(), value.to_vec());
        guard.bytes += value.len();
        self.metrics.inserts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Drop a block. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let shard = self.shard_for(key);
        let mut guard = shard.write();
        match guard.store.pop(key) {
            Some(value) => {
                guard.bytes -= value.len();
                self.metrics.removes.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Fire-and-forget removal.
    pub fn invalidate(&self, key: &str) {
        let _ = self.remove(key);
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            let mut guard = shard.write();
            guard.store.clear();
            guard.bytes = 0;
        }
    }

    /// Total cached bytes across shards.
    #[must_use]
    pub fn size(&self) -> usize {
        self.shards.iter().map(|s| s.read().bytes).sum()
    }

    /// Number of cached blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().store.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[must_use]
    pub fn stats(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_stats(&self) {
        self.metrics.reset();
    }
}
