use vego::errors::ErrorCode;
use vego::format::{DataType, Field, Header, Schema};

fn sample_schema() -> Schema {
    let mut schema = Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("embedding", DataType::parse("fixed_size_list[128]<float32>").unwrap(), false),
        Field::new("score", DataType::Float64, true),
    ]);
    schema.metadata.insert("writer".to_string(), "vego-tests".to_string());
    schema
}

#[test]
fn header_round_trip() {
    let mut header = Header::new(sample_schema());
    header.num_rows = 12_345;
    let encoded = header.encode().unwrap();
    let decoded = Header::decode(&encoded).unwrap();
    assert_eq!(decoded, header);
    assert_eq!(decoded.schema.fields[1].data_type.token(), "fixed_size_list[128]<float32>");
}

#[test]
fn bad_magic_is_rejected() {
    let header = Header::new(sample_schema());
    let mut encoded = header.encode().unwrap();
    encoded[0] ^= 0xFF;
    let err = Header::decode(&encoded).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidMagic);
    assert!(err.is_corruption());
}

#[test]
fn out_of_window_version_is_rejected() {
    let header = Header::new(sample_schema());
    let mut encoded = header.encode().unwrap();
    // Version lives at bytes 4..6; claim a 2.x file.
    encoded[4] = 0x03;
    encoded[5] = 0x02;
    let err = Header::decode(&encoded).unwrap_err();
    assert_eq!(err.code(), ErrorCode::VersionMismatch);
}

#[test]
fn column_count_must_match_schema() {
    let mut header = Header::new(sample_schema());
    header.num_columns = 7;
    let err = header.validate().unwrap_err();
    assert_eq!(err.code(), ErrorCode::SchemaMismatch);
    assert!(err.is_validation());
}

#[test]
fn page_size_bounds_are_enforced() {
    let mut header = Header::new(sample_schema());
    header.page_size = 0;
    assert_eq!(header.validate().unwrap_err().code(), ErrorCode::InvalidArgument);
    header.page_size = 16 * 1024 * 1024 + 1;
    assert_eq!(header.validate().unwrap_err().code(), ErrorCode::InvalidArgument);
    header.page_size = 4096;
    header.validate().unwrap();
}

#[test]
fn empty_schema_is_rejected() {
    let header = Header::new(Schema::default());
    let err = header.validate().unwrap_err();
    assert_eq!(err.code(), ErrorCode::SchemaMismatch);
}
