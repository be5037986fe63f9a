use std::collections::BTreeMap;

use vego::errors::ErrorCode;
use vego::format::constants::FLAG_INDEXED;
use vego::format::{
    DataType, Field, FileReader, FileWriter, Page, PageEncoding, PageType, ReadStrategy, Schema,
};

fn vector_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("embedding", DataType::parse("fixed_size_list[4]<float32>").unwrap(), false),
    ])
}

fn data_page(column: i32, num_values: i32, fill: u8, len: usize) -> Page {
    let mut page = Page::new(PageType::Data, PageEncoding::Plain, column, num_values);
    page.set_data(vec![fill; len], len as i32).unwrap();
    page
}

#[test]
fn write_then_read_a_whole_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.vego");

    let mut writer = FileWriter::create(&path, vector_schema(), 4096).unwrap();
    writer.append_page(&data_page(0, 100, 0xAA, 800)).unwrap();
    writer.append_page(&data_page(1, 100, 0xBB, 1600)).unwrap();
    writer.append_page(&data_page(0, 50, 0xCC, 400)).unwrap();
    for row in 0..150i64 {
        writer.index_id(format!("doc-{row}"), row).unwrap();
    }
    writer.enable_block_cache(4096);
    let mut user = BTreeMap::new();
    user.insert("dataset".to_string(), "unit".to_string());
    writer.finish(&user).unwrap();

    let reader = FileReader::open(&path).unwrap();
    assert_eq!(reader.strategy(), ReadStrategy::Normal);
    assert_eq!(reader.num_rows(), 150);
    assert_eq!(reader.schema(), &vector_schema());
    assert!(reader.header().has_flag(FLAG_INDEXED));
    assert!(reader.footer().has_row_index());
    assert_eq!(reader.footer().get_block_cache_info().unwrap(), Some(4096));
    assert_eq!(
        reader.footer().get_user_metadata().get("dataset").map(String::as_str),
        Some("unit")
    );

    let page = reader.read_page(0, 0).unwrap();
    assert_eq!(page.data, vec![0xAA; 800]);
    let page = reader.read_page(0, 1).unwrap();
    assert_eq!(page.data, vec![0xCC; 400]);
    let page = reader.read_page(1, 0).unwrap();
    assert_eq!(page.num_values, 100);

    let index = reader.row_index().unwrap().expect("row index page");
    for row in [0i64, 77, 149] {
        assert_eq!(index.lookup(format!("doc-{row}")), Some(row));
    }
    assert_eq!(index.lookup("doc-150"), None);
}

#[test]
fn files_without_ids_have_no_row_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.vego");

    let mut writer = FileWriter::create(&path, vector_schema(), 4096).unwrap();
    writer.append_page(&data_page(0, 10, 0x01, 64)).unwrap();
    writer.finish(&BTreeMap::new()).unwrap();

    let reader = FileReader::open(&path).unwrap();
    assert!(!reader.footer().has_row_index());
    assert!(reader.row_index().unwrap().is_none());
    assert!(!reader.header().has_flag(FLAG_INDEXED));
}

#[test]
fn appends_outside_the_schema_leave_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bounds.vego");

    let mut writer = FileWriter::create(&path, vector_schema(), 4096).unwrap();
    let err = writer.append_page(&data_page(2, 10, 0x01, 64)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    // An invalid page is rejected before any byte reaches the file.
    let mut bad = Page::new(PageType::Data, PageEncoding::Plain, 0, 0);
    bad.set_data(vec![1; 8], 8).unwrap();
    assert!(writer.append_page(&bad).is_err());

    writer.append_page(&data_page(0, 10, 0x01, 64)).unwrap();
    writer.finish(&BTreeMap::new()).unwrap();

    let reader = FileReader::open(&path).unwrap();
    assert_eq!(reader.footer().page_indexes.len(), 1);
    assert_eq!(reader.num_rows(), 10);
}

#[test]
fn finishing_twice_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("twice.vego");

    let mut writer = FileWriter::create(&path, vector_schema(), 4096).unwrap();
    writer.append_page(&data_page(0, 1, 0x01, 16)).unwrap();
    writer.finish(&BTreeMap::new()).unwrap();
    assert_eq!(writer.finish(&BTreeMap::new()).unwrap_err().code(), ErrorCode::InvalidArgument);
}

#[test]
fn truncated_files_fail_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trunc.vego");

    let mut writer = FileWriter::create(&path, vector_schema(), 4096).unwrap();
    writer.append_page(&data_page(0, 1, 0x01, 16)).unwrap();
    writer.finish(&BTreeMap::new()).unwrap();

    let full = std::fs::read(&path).unwrap();
    std::fs::write(&path, &full[..full.len() - 1024]).unwrap();
    let err = FileReader::open(&path).unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn corrupted_page_bytes_are_caught_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flip.vego");

    let mut writer = FileWriter::create(&path, vector_schema(), 4096).unwrap();
    writer.append_page(&data_page(0, 1, 0x42, 256)).unwrap();
    writer.finish(&BTreeMap::new()).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    // Flip one payload byte in the middle of the single page.
    let page_offset = bytes.len() - 32 * 1024 - 256 - 30;
    bytes[page_offset + 30 + 128] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let reader = FileReader::open(&path).unwrap();
    let err = reader.read_page(0, 0).unwrap_err();
    assert!(err.is_corruption());
}
