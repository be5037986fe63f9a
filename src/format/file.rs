//! Whole-file composition: a [`FileWriter`] that lays out header, pages,
//! optional row-index page, and footer; and a [`FileReader`] that
//! validates the pair, decides compatibility, and serves pages by footer
//! lookup.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::errors::{Result, VegoError};
use crate::format::constants::{FLAG_INDEXED, FOOTER_SIZE, HEADER_PRELUDE_SIZE, MAX_PAGE_SIZE};
use crate::format::footer::{Footer, PageIndex};
use crate::format::header::Header;
use crate::format::page::{Page, PageType};
use crate::format::row_index::RowIndex;
use crate::format::schema::Schema;
use crate::format::version::{ReadStrategy, VersionChecker, VersionPolicy};
use crate::io::file_pool::read_full_at;
use crate::utils::num::{i32_to_usize, i64_to_u64, usize_to_i32, usize_to_u64};

/// Sequential writer for one storage file. Pages are validated before any
/// byte of them reaches disk, so a failed append leaves no partial page.
pub struct FileWriter {
    file: File,
    header: Header,
    page_indexes: Vec<PageIndex>,
    pages_per_column: HashMap<i32, i32>,
    row_index: RowIndex,
    block_cache_size: Option<i32>,
    offset: u64,
    num_rows: i64,
    finished: bool,
}

impl FileWriter {
    /// Create (truncating) a file and write its header.
    pub fn create(path: &Path, schema: Schema, page_size: i32) -> Result<Self> {
        if page_size <= 0 || i32_to_usize(page_size).is_none_or(|p| p > MAX_PAGE_SIZE) {
            return Err(VegoError::invalid_argument("writer.create", "page size out of range")
                .with_context("page_size", page_size.to_string()));
        }
        let mut header = Header::new(schema);
        header.page_size = page_size;
        let header_bytes = header.encode()?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| {
                VegoError::io("writer.create", e).with_context("path", path.display().to_string())
            })?;
        file.write_all(&header_bytes).map_err(|e| VegoError::io("writer.create", e))?;

        Ok(Self {
            file,
            header,
            page_indexes: Vec::new(),
            pages_per_column: HashMap::new(),
            row_index: RowIndex::new(),
            block_cache_size: None,
            offset: usize_to_u64(header_bytes.len()),
            num_rows: 0,
            finished: false,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.header.schema
    }

    #[must_use]
    pub fn num_rows(&self) -> i64 {
        self.num_rows
    }

    /// Append one page, recording its locator. Row accounting follows
    /// column 0 data pages.
    pub fn append_page(&mut self, page: &Page) -> Result<()> {
        self.check_open("writer.append_page")?;
        if page.column_index < 0 || page.column_index >= self.header.num_columns {
            return Err(VegoError::invalid_argument(
                "writer.append_page",
                "column index outside the schema",
            )
            .with_context("column_index", page.column_index.to_string())
            .with_context("num_columns", self.header.num_columns.to_string()));
        }
        let encoded = page.encode()?;
        let size = usize_to_i32(encoded.len())
            .ok_or_else(|| VegoError::invalid_argument("writer.append_page", "page too large"))?;
        self.file.write_all(&encoded).map_err(|e| VegoError::io("writer.append_page", e))?;

        let page_num = self.pages_per_column.entry(page.column_index).or_insert(0);
        #[allow(clippy::cast_possible_wrap)]
        self.page_indexes.push(PageIndex {
            column_index: page.column_index,
            page_num: *page_num,
            offset: self.offset as i64,
            size,
            num_values: page.num_values,
            encoding: page.encoding as u8,
        });
        *page_num += 1;
        self.offset += usize_to_u64(encoded.len());
        if page.column_index == 0 && page.page_type == PageType::Data {
            self.num_rows += i64::from(page.num_values);
        }
        Ok(())
    }

    /// Remember an id -> row mapping for the row-index page written at
    /// finish time.
    pub fn index_id(&mut self, id: impl AsRef<[u8]>, row: i64) -> Result<()> {
        self.check_open("writer.index_id")?;
        self.row_index.insert(id, row)
    }

    /// Advertise block caching in the footer metadata.
    pub fn enable_block_cache(&mut self, block_size: i32) {
        self.block_cache_size = Some(block_size);
    }

    /// Seal the file: optional row-index page, footer, and the header
    /// rewritten with final row counts.
    pub fn finish(&mut self, user_metadata: &BTreeMap<String, String>) -> Result<()> {
        self.check_open("writer.finish")?;

        let mut footer = Footer::new();
        footer.set_format_version(VersionPolicy::CURRENT);
        if !self.row_index.is_empty() {
            let page = self.row_index.to_page()?;
            let encoded = page.encode()?;
            let size = usize_to_i32(encoded.len())
                .ok_or_else(|| VegoError::invalid_argument("writer.finish", "row index too large"))?;
            #[allow(clippy::cast_possible_wrap)]
            footer.set_row_index_info(self.offset as i64, size, page.checksum);
            self.file.write_all(&encoded).map_err(|e| VegoError::io("writer.finish", e))?;
            self.offset += usize_to_u64(encoded.len());
            self.header.set_flag(FLAG_INDEXED);
            debug!("wrote row index page with {} entries", self.row_index.len());
        }
        if let Some(block_size) = self.block_cache_size {
            footer.set_block_cache_info(block_size);
        }
        for entry in &self.page_indexes {
            footer.page_indexes.push(*entry);
        }
        footer.merge_metadata(user_metadata);
        footer.touch_modified();
        let footer_bytes = footer.encode()?;

        self.header.num_rows = self.num_rows;
        let header_bytes = self.header.encode()?;

        let io = |e| VegoError::io("writer.finish", e);
        self.file.seek(SeekFrom::Start(0)).map_err(io)?;
        self.file.write_all(&header_bytes).map_err(io)?;
        self.file.seek(SeekFrom::Start(self.offset)).map_err(io)?;
        self.file.write_all(&footer_bytes).map_err(io)?;
        self.file.flush().map_err(io)?;
        self.file.sync_all().map_err(io)?;
        self.finished = true;
        Ok(())
    }

    fn check_open(&self, op: &str) -> Result<()> {
        if self.finished {
            Err(VegoError::invalid_argument(op, "writer already finished"))
        } else {
            Ok(())
        }
    }
}

/// Reader over one storage file, validated at open time.
#[derive(Debug)]
pub struct FileReader {
    file: File,
    header: Header,
    footer: Footer,
    strategy: ReadStrategy,
}

impl FileReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path).map_err(|e| {
            VegoError::io("reader.open", e).with_context("path", path.display().to_string())
        })?;
        let len = file.metadata().map_err(|e| VegoError::io("reader.open", e))?.len();
        if len < usize_to_u64(FOOTER_SIZE + HEADER_PRELUDE_SIZE) {
            return Err(VegoError::corrupted("reader.open", "file too small to hold the format")
                .with_context("len", len.to_string()));
        }

        let header = Header::read_from(&mut BufReader::new(&file))?;

        let mut footer_bytes = vec![0u8; FOOTER_SIZE];
        let read = read_full_at(&file, &mut footer_bytes, len - usize_to_u64(FOOTER_SIZE))
            .map_err(|e| VegoError::io("reader.open", e))?;
        if read != FOOTER_SIZE {
            return Err(VegoError::corrupted("reader.open", "truncated footer"));
        }
        let footer = Footer::decode(&footer_bytes)?;

        if footer.version != header.version {
            return Err(VegoError::corrupted("reader.open", "header and footer disagree on version")
                .with_context("header_version", header.version.to_string())
                .with_context("footer_version", footer.version.to_string()));
        }

        let checker = VersionChecker::current();
        checker.check_read_compatibility(header.version)?;
        footer.validate_format_metadata()?;
        let file_version = footer.get_format_version()?;
        let strategy = checker.get_read_strategy(file_version.encoded(), file_version.feature_flags);
        debug!("opened {} with strategy {:?}", path.display(), strategy);

        Ok(Self { file, header, footer, strategy })
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[must_use]
    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.header.schema
    }

    #[must_use]
    pub fn strategy(&self) -> ReadStrategy {
        self.strategy
    }

    #[must_use]
    pub fn num_rows(&self) -> i64 {
        self.header.num_rows
    }

    /// Read and re-validate one page by its footer locator.
    pub fn read_page(&self, column_index: i32, page_num: i32) -> Result<Page> {
        let entry = self.footer.page_indexes.find(column_index, page_num).ok_or_else(|| {
            VegoError::invalid_argument("reader.read_page", "no such page")
                .with_context("column_index", column_index.to_string())
                .with_context("page_num", page_num.to_string())
        })?;
        let bytes = self.read_exact_at(entry.offset, entry.size, "reader.read_page")?;
        let page = Page::decode(&bytes)?;
        if page.column_index != column_index {
            return Err(VegoError::corrupted("reader.read_page", "page belongs to another column")
                .with_context("expected", column_index.to_string())
                .with_context("found", page.column_index.to_string()));
        }
        Ok(page)
    }

    /// Load the row-index page, when the footer references one. The page
    /// checksum recorded in the footer must match the page that is read.
    pub fn row_index(&self) -> Result<Option<RowIndex>> {
        let Some((offset, size, checksum)) = self.footer.get_row_index_info()? else {
            return Ok(None);
        };
        let bytes = self.read_exact_at(offset, size, "reader.row_index")?;
        let page = Page::decode(&bytes)?;
        if page.checksum != checksum {
            return Err(VegoError::corrupted("reader.row_index", "row index checksum mismatch")
                .with_context("expected", checksum.to_string())
                .with_context("found", page.checksum.to_string()));
        }
        Ok(Some(RowIndex::from_page(&page)?))
    }

    fn read_exact_at(&self, offset: i64, size: i32, op: &str) -> Result<Vec<u8>> {
        let offset = i64_to_u64(offset)
            .ok_or_else(|| VegoError::corrupted(op, "negative offset in footer"))?;
        let size = i32_to_usize(size).ok_or_else(|| VegoError::corrupted(op, "negative size"))?;
        let mut buf = vec![0u8; size];
        let read = read_full_at(&self.file, &mut buf, offset)
            .map_err(|e| VegoError::io(op, e).with_context("offset", offset.to_string()))?;
        if read != size {
            return Err(VegoError::corrupted(op, "short read inside the file body")
                .with_context("expected", size.to_string())
                .with_context("read", read.to_string()));
        }
        Ok(buf)
    }
}
