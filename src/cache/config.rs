/// Configuration for the block cache.
#[derive(Clone, Debug)]
pub struct BlockCacheConfig {
    /// Total budget across all shards, in bytes.
    pub capacity_bytes: usize,
    /// Number of independent LRU shards.
    pub shards: usize,
}

pub const DEFAULT_SHARD_COUNT: usize = 64;

impl Default for BlockCacheConfig {
    fn default() -> Self {
        Self { capacity_bytes: 64 * 1024 * 1024, shards: DEFAULT_SHARD_COUNT }
    }
}
