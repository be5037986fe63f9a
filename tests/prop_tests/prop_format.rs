use proptest::prelude::*;
use vego::format::{
    DataType, Field, Footer, Header, Page, PageEncoding, PageIndex, PageType, Schema,
    VersionPolicy,
};

fn data_type_strategy() -> impl Strategy<Value = DataType> {
    let leaf = prop_oneof![
        Just(DataType::Int32),
        Just(DataType::Int64),
        Just(DataType::Float32),
        Just(DataType::Float64),
        Just(DataType::Binary),
        Just(DataType::Utf8),
    ];
    leaf.prop_recursive(2, 4, 1, |inner| {
        (inner, 1..1000i32)
            .prop_map(|(child, size)| DataType::FixedSizeList { child: Box::new(child), size })
    })
}

fn schema_strategy() -> impl Strategy<Value = Schema> {
    proptest::collection::vec(
        ("[a-z][a-z0-9_]{0,12}", data_type_strategy(), any::<bool>()),
        1..6,
    )
    .prop_map(|fields| {
        Schema::new(
            fields
                .into_iter()
                .enumerate()
                .map(|(i, (name, data_type, nullable))| {
                    Field::new(format!("{name}_{i}"), data_type, nullable)
                })
                .collect(),
        )
    })
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 24,
        .. proptest::test_runner::Config::default()
    })]
    #[test]
    fn prop_page_round_trip(
        payload in proptest::collection::vec(any::<u8>(), 1..4096),
        column in 0..64i32,
        num_values in 1..100_000i32
    ) {
        let len = payload.len() as i32;
        let mut page = Page::new(PageType::Data, PageEncoding::Plain, column, num_values);
        page.set_data(payload, len).unwrap();
        let decoded = Page::decode(&page.encode().unwrap()).unwrap();
        prop_assert_eq!(&decoded, &page);
        prop_assert!(decoded.validate().is_ok());
    }

    #[test]
    fn prop_token_grammar_round_trips(data_type in data_type_strategy()) {
        let token = data_type.token();
        prop_assert_eq!(DataType::parse(&token).unwrap(), data_type);
    }

    #[test]
    fn prop_header_round_trip(schema in schema_strategy(), num_rows in 0..1_000_000i64) {
        let mut header = Header::new(schema);
        header.num_rows = num_rows;
        let decoded = Header::decode(&header.encode().unwrap()).unwrap();
        prop_assert_eq!(decoded, header);
    }

    #[test]
    fn prop_footer_round_trip(
        pages in 0..40i32,
        user in proptest::collection::btree_map("[a-u][a-z]{0,7}", "[a-z]{0,8}", 0..6)
    ) {
        let mut footer = Footer::new();
        footer.set_format_version(VersionPolicy::CURRENT);
        for page_num in 0..pages {
            footer.page_indexes.push(PageIndex {
                column_index: page_num % 4,
                page_num: page_num / 4,
                offset: 64 + i64::from(page_num) * 512,
                size: 512,
                num_values: 8,
                encoding: 0,
            });
        }
        footer.merge_metadata(&user);
        let encoded = footer.encode().unwrap();
        prop_assert_eq!(encoded.len(), 32 * 1024);
        prop_assert_eq!(Footer::decode(&encoded).unwrap(), footer);
    }

    #[test]
    fn prop_version_encoding_is_lossless(major in any::<u8>(), minor in any::<u8>()) {
        let encoded = (u16::from(major) << 8) | u16::from(minor);
        let vp = VersionPolicy::from_encoded(encoded);
        prop_assert_eq!(vp.encoded(), encoded);
        prop_assert_eq!(VersionPolicy::from_encoded(vp.encoded()), vp);
    }
}
