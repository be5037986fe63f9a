use proptest::prelude::*;
use vego::format::RowIndex;

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 20,
        .. proptest::test_runner::Config::default()
    })]
    #[test]
    fn prop_inserted_ids_are_found(
        ids in proptest::collection::btree_map("[a-zA-Z0-9:_-]{1,24}", 0..1_000_000i64, 1..200)
    ) {
        let mut index = RowIndex::with_capacity(ids.len());
        for (id, row) in &ids {
            index.insert(id, *row).unwrap();
        }
        prop_assert_eq!(index.len(), ids.len());
        prop_assert!(index.bucket_count().is_power_of_two());
        prop_assert!(index.bucket_count() >= 16);
        prop_assert!(index.len() * 4 <= index.bucket_count() * 3);
        for (id, row) in &ids {
            prop_assert_eq!(index.lookup(id), Some(*row));
        }

        let decoded = RowIndex::decode(&index.encode().unwrap()).unwrap();
        prop_assert_eq!(&decoded, &index);
        for (id, row) in &ids {
            prop_assert_eq!(decoded.lookup(id), Some(*row));
        }
    }

    #[test]
    fn prop_last_write_wins(rows in proptest::collection::vec(0..100i64, 1..20)) {
        let mut index = RowIndex::new();
        for row in &rows {
            index.insert("the-id", *row).unwrap();
        }
        prop_assert_eq!(index.len(), 1);
        prop_assert_eq!(index.lookup("the-id"), rows.last().copied());
    }
}
