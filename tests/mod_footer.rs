use std::collections::BTreeMap;

use vego::errors::ErrorCode;
use vego::format::{Footer, PageIndex, VersionPolicy};

fn sample_footer() -> Footer {
    let mut footer = Footer::new();
    footer.set_format_version(VersionPolicy::CURRENT);
    for page_num in 0..3 {
        footer.page_indexes.push(PageIndex {
            column_index: 0,
            page_num,
            offset: 64 + i64::from(page_num) * 4096,
            size: 4096,
            num_values: 100,
            encoding: 0,
        });
    }
    let mut user = BTreeMap::new();
    user.insert("user.x".to_string(), "y".to_string());
    footer.merge_metadata(&user);
    footer
}

#[test]
fn footer_round_trip_is_exactly_32k() {
    let footer = sample_footer();
    let encoded = footer.encode().unwrap();
    assert_eq!(encoded.len(), 32 * 1024);
    let decoded = Footer::decode(&encoded).unwrap();
    assert_eq!(decoded, footer);
    assert_eq!(decoded.page_indexes.len(), 3);
    assert_eq!(decoded.metadata().get("user.x").map(String::as_str), Some("y"));
}

#[test]
fn a_flipped_bit_fails_decode() {
    let footer = sample_footer();
    let mut encoded = footer.encode().unwrap();
    encoded[1000] ^= 0x01;
    let err = Footer::decode(&encoded).unwrap_err();
    assert_eq!(err.code(), ErrorCode::FormatCorrupted);

    // A flip inside the checksummed prefix fails the CRC instead.
    let mut encoded = footer.encode().unwrap();
    encoded[10] ^= 0x01;
    assert!(Footer::decode(&encoded).unwrap_err().is_corruption());
}

#[test]
fn wrong_length_is_rejected() {
    let footer = sample_footer();
    let encoded = footer.encode().unwrap();
    assert!(Footer::decode(&encoded[..encoded.len() - 1]).is_err());
}

#[test]
fn format_version_round_trips_through_metadata() {
    let mut footer = Footer::new();
    footer.set_format_version(VersionPolicy::V1_1);
    assert_eq!(footer.metadata().get("vego.format.version").map(String::as_str), Some("1.1"));
    assert_eq!(
        footer.metadata().get("vego.format.features").map(String::as_str),
        Some("0x00000007")
    );
    assert_eq!(footer.get_format_version().unwrap(), VersionPolicy::V1_1);
}

#[test]
fn format_version_falls_back_to_the_footer_field() {
    let mut footer = Footer::new();
    footer.version = 1; // legacy scalar
    assert_eq!(footer.get_format_version().unwrap(), VersionPolicy::V1_0);
}

#[test]
fn row_index_and_block_cache_helpers() {
    let mut footer = Footer::new();
    footer.set_format_version(VersionPolicy::CURRENT);
    assert!(!footer.has_row_index());
    assert_eq!(footer.get_row_index_info().unwrap(), None);

    footer.set_row_index_info(8192, 640, 0xDEAD_BEEF);
    assert!(footer.has_row_index());
    assert_eq!(footer.get_row_index_info().unwrap(), Some((8192, 640, 0xDEAD_BEEF)));

    assert!(!footer.has_block_cache());
    footer.set_block_cache_info(4096);
    assert!(footer.has_block_cache());
    assert_eq!(footer.get_block_cache_info().unwrap(), Some(4096));

    footer.validate_format_metadata().unwrap();
}

#[test]
fn feature_scoped_metadata_needs_the_feature() {
    let mut footer = Footer::new();
    footer.set_format_version(VersionPolicy::V1_0);
    footer.set_row_index_info(100, 10, 1);
    let err = footer.validate_format_metadata().unwrap_err();
    assert_eq!(err.code(), ErrorCode::MetadataError);

    let mut footer = Footer::new();
    footer.set_format_version(VersionPolicy::V1_1);
    footer.set_block_cache_info(1024);
    assert_eq!(footer.validate_format_metadata().unwrap_err().code(), ErrorCode::MetadataError);
}

#[test]
fn reserved_prefix_is_enforced_at_the_boundary() {
    let mut footer = Footer::new();
    footer.set_format_version(VersionPolicy::CURRENT);
    footer.set_row_index_info(1, 2, 3);

    let mut user = BTreeMap::new();
    user.insert("app.name".to_string(), "demo".to_string());
    user.insert("vego.format.version".to_string(), "9.9".to_string());
    footer.merge_metadata(&user);

    // The sneaky reserved key was dropped; the real one survived.
    assert_eq!(footer.get_format_version().unwrap(), VersionPolicy::CURRENT);
    assert!(footer.has_row_index());

    let visible = footer.get_user_metadata();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible.get("app.name").map(String::as_str), Some("demo"));

    // Replacing user metadata again drops the old user keys wholesale.
    let mut replacement = BTreeMap::new();
    replacement.insert("app.version".to_string(), "2".to_string());
    footer.merge_metadata(&replacement);
    let visible = footer.get_user_metadata();
    assert_eq!(visible.len(), 1);
    assert!(visible.contains_key("app.version"));
}
