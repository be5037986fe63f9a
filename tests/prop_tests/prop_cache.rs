use proptest::prelude::*;
use vego::cache::BlockCache;

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 16,
        .. proptest::test_runner::Config::default()
    })]
    #[test]
    fn prop_cache_size_never_exceeds_capacity(
        ops in proptest::collection::vec(("[a-k]{1,4}", 1..129usize), 1..60),
        shards in 1..4usize
    ) {
        let cache = BlockCache::with_shards(512, shards);
        for (key, len) in &ops {
            cache.put(key, &vec![0xA5u8; *len]).unwrap();
            prop_assert!(cache.size() <= cache.capacity());
        }
        let stats = cache.stats();
        prop_assert_eq!(stats.inserts, ops.len() as u64);
    }

    #[test]
    fn prop_returned_bytes_are_independent(
        value in proptest::collection::vec(any::<u8>(), 1..256),
        flip in any::<u8>()
    ) {
        let cache = BlockCache::new(4096);
        cache.put("k", &value).unwrap();
        let mut copy = cache.get("k").unwrap();
        copy[0] ^= flip;
        prop_assert_eq!(cache.get("k").unwrap(), value);
    }
}
