//! The footer: a fixed 32 KiB trailer holding the page-index list, the
//! key/value metadata map (including the reserved `vego.*` keys), and a
//! CRC32 over everything preceding the checksum.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::Utc;

use crate::errors::{ErrorCode, Result, VegoError};
use crate::format::constants::{
    FOOTER_SIZE, META_BLOCK_CACHE_BLOCK_SIZE, META_BLOCK_CACHE_ENABLED, META_FORMAT_FEATURES,
    META_FORMAT_VERSION, META_ROW_INDEX_CHECKSUM, META_ROW_INDEX_OFFSET, META_ROW_INDEX_SIZE,
    RESERVED_META_PREFIX,
};
use crate::format::version::{
    FEATURE_BLOCK_CACHE, FEATURE_ROW_INDEX, VersionPolicy, normalize_version,
};
use crate::utils::num::{i32_to_usize, usize_to_i32};

/// Locator record for one page: where it lives and what it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIndex {
    pub column_index: i32,
    pub page_num: i32,
    pub offset: i64,
    pub size: i32,
    pub num_values: i32,
    pub encoding: u8,
}

impl PageIndex {
    fn write_to<W: Write>(&self, sink: &mut W) -> std::io::Result<()> {
        sink.write_i32::<LittleEndian>(self.column_index)?;
        sink.write_i32::<LittleEndian>(self.page_num)?;
        sink.write_i64::<LittleEndian>(self.offset)?;
        sink.write_i32::<LittleEndian>(self.size)?;
        sink.write_i32::<LittleEndian>(self.num_values)?;
        sink.write_u8(self.encoding)?;
        Ok(())
    }

    fn read_from<R: Read>(source: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            column_index: source.read_i32::<LittleEndian>()?,
            page_num: source.read_i32::<LittleEndian>()?,
            offset: source.read_i64::<LittleEndian>()?,
            size: source.read_i32::<LittleEndian>()?,
            num_values: source.read_i32::<LittleEndian>()?,
            encoding: source.read_u8()?,
        })
    }
}

/// (column, page#) -> locator list, in write order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageIndexList {
    entries: Vec<PageIndex>,
}

impl PageIndexList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PageIndex) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PageIndex> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn find(&self, column_index: i32, page_num: i32) -> Option<&PageIndex> {
        self.entries.iter().find(|e| e.column_index == column_index && e.page_num == page_num)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageIndex> {
        self.entries.iter()
    }
}

/// The 32 KiB trailer. `num_pages` is derived from the page-index list on
/// encode and cross-checked on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    pub version: u16,
    pub created_at: i64,
    pub modified_at: i64,
    pub page_indexes: PageIndexList,
    metadata: BTreeMap<String, String>,
}

impl Default for Footer {
    fn default() -> Self {
        Self::new()
    }
}

impl Footer {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        Self {
            version: VersionPolicy::CURRENT.encoded(),
            created_at: now,
            modified_at: now,
            page_indexes: PageIndexList::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn touch_modified(&mut self) {
        self.modified_at = Utc::now().timestamp();
    }

    /// Full metadata view, reserved keys included.
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Only the caller-owned keys (everything outside `vego.`).
    #[must_use]
    pub fn get_user_metadata(&self) -> BTreeMap<String, String> {
        self.metadata
            .iter()
            .filter(|(k, _)| !k.starts_with(RESERVED_META_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace the user keys wholesale. Existing `vego.` keys are kept and
    /// `vego.`-prefixed keys from the caller are silently dropped.
    pub fn merge_metadata(&mut self, user: &BTreeMap<String, String>) {
        self.metadata.retain(|k, _| k.starts_with(RESERVED_META_PREFIX));
        for (k, v) in user {
            if !k.starts_with(RESERVED_META_PREFIX) {
                self.metadata.insert(k.clone(), v.clone());
            }
        }
    }

    pub fn set_format_version(&mut self, vp: VersionPolicy) {
        self.version = vp.encoded();
        self.metadata.insert(META_FORMAT_VERSION.to_string(), vp.label());
        self.metadata
            .insert(META_FORMAT_FEATURES.to_string(), format!("0x{:08X}", vp.feature_flags));
    }

    /// The declared format version. Files predating the metadata keys fall
    /// back to the footer's own version field, normalized.
    pub fn get_format_version(&self) -> Result<VersionPolicy> {
        let Some(label) = self.metadata.get(META_FORMAT_VERSION) else {
            return Ok(VersionPolicy::from_encoded(normalize_version(self.version)));
        };
        let base = VersionPolicy::parse_label(label)?;
        let features = match self.metadata.get(META_FORMAT_FEATURES) {
            Some(hex) => parse_features(hex)?,
            None => base.feature_flags,
        };
        Ok(VersionPolicy::new(base.major, base.minor, features))
    }

    pub fn set_row_index_info(&mut self, offset: i64, size: i32, checksum: u32) {
        self.metadata.insert(META_ROW_INDEX_OFFSET.to_string(), offset.to_string());
        self.metadata.insert(META_ROW_INDEX_SIZE.to_string(), size.to_string());
        self.metadata.insert(META_ROW_INDEX_CHECKSUM.to_string(), checksum.to_string());
    }

    /// `(offset, size, checksum)` of the row-index page, when present.
    pub fn get_row_index_info(&self) -> Result<Option<(i64, i32, u32)>> {
        let (Some(offset), Some(size), Some(checksum)) = (
            self.metadata.get(META_ROW_INDEX_OFFSET),
            self.metadata.get(META_ROW_INDEX_SIZE),
            self.metadata.get(META_ROW_INDEX_CHECKSUM),
        ) else {
            return Ok(None);
        };
        let parse = |field: &str, value: &str| {
            VegoError::new(ErrorCode::MetadataError, "footer.rowindex", "malformed row index info")
                .with_context("field", field)
                .with_context("value", value)
        };
        let offset = offset.parse::<i64>().map_err(|_| parse("offset", offset))?;
        let size = size.parse::<i32>().map_err(|_| parse("size", size))?;
        let checksum = checksum.parse::<u32>().map_err(|_| parse("checksum", checksum))?;
        Ok(Some((offset, size, checksum)))
    }

    #[must_use]
    pub fn has_row_index(&self) -> bool {
        self.metadata.contains_key(META_ROW_INDEX_OFFSET)
    }

    pub fn set_block_cache_info(&mut self, block_size: i32) {
        self.metadata.insert(META_BLOCK_CACHE_ENABLED.to_string(), "true".to_string());
        self.metadata.insert(META_BLOCK_CACHE_BLOCK_SIZE.to_string(), block_size.to_string());
    }

    /// The advertised cache block size, when block caching is enabled.
    pub fn get_block_cache_info(&self) -> Result<Option<i32>> {
        if !self.has_block_cache() {
            return Ok(None);
        }
        let Some(value) = self.metadata.get(META_BLOCK_CACHE_BLOCK_SIZE) else {
            return Ok(None);
        };
        let block_size = value.parse::<i32>().map_err(|_| {
            VegoError::new(ErrorCode::MetadataError, "footer.blockcache", "malformed block size")
                .with_context("value", value.as_str())
        })?;
        Ok(Some(block_size))
    }

    #[must_use]
    pub fn has_block_cache(&self) -> bool {
        self.metadata.get(META_BLOCK_CACHE_ENABLED).is_some_and(|v| v == "true")
    }

    /// Feature-scoped metadata must not outrun the declared version.
    pub fn validate_format_metadata(&self) -> Result<()> {
        let vp = self.get_format_version()?;
        if self.has_row_index() && !vp.has_feature(FEATURE_ROW_INDEX) {
            return Err(VegoError::new(
                ErrorCode::MetadataError,
                "footer.validate",
                "row index metadata present but version lacks the feature",
            )
            .with_context("version", vp.label()));
        }
        if self.has_block_cache() && !vp.has_feature(FEATURE_BLOCK_CACHE) {
            return Err(VegoError::new(
                ErrorCode::MetadataError,
                "footer.validate",
                "block cache metadata present but version lacks the feature",
            )
            .with_context("version", vp.label()));
        }
        Ok(())
    }

    /// Encode to exactly `FOOTER_SIZE` bytes, zero-padded past the checksum.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let num_pages = usize_to_i32(self.page_indexes.len())
            .ok_or_else(|| VegoError::invalid_argument("footer.encode", "page count overflow"))?;

        let mut buf: Vec<u8> = Vec::with_capacity(FOOTER_SIZE);
        let io = |e| VegoError::io("footer.encode", e);
        buf.write_u16::<LittleEndian>(self.version).map_err(io)?;
        buf.write_i32::<LittleEndian>(num_pages).map_err(io)?;
        buf.write_i64::<LittleEndian>(self.created_at).map_err(io)?;
        buf.write_i64::<LittleEndian>(self.modified_at).map_err(io)?;
        buf.write_i32::<LittleEndian>(num_pages).map_err(io)?;
        for entry in self.page_indexes.iter() {
            entry.write_to(&mut buf).map_err(io)?;
        }
        let meta_count = usize_to_i32(self.metadata.len())
            .ok_or_else(|| VegoError::invalid_argument("footer.encode", "metadata count overflow"))?;
        buf.write_i32::<LittleEndian>(meta_count).map_err(io)?;
        for (k, v) in &self.metadata {
            write_string(&mut buf, k).map_err(io)?;
            write_string(&mut buf, v).map_err(io)?;
        }

        if buf.len() + 4 > FOOTER_SIZE {
            return Err(VegoError::invalid_argument("footer.encode", "footer content too large")
                .with_context("size", buf.len().to_string()));
        }
        let checksum = crc32fast::hash(&buf);
        buf.write_u32::<LittleEndian>(checksum).map_err(io)?;
        buf.resize(FOOTER_SIZE, 0);
        Ok(buf)
    }

    /// Decode from exactly `FOOTER_SIZE` bytes, recomputing the CRC over
    /// the prefix actually read.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != FOOTER_SIZE {
            return Err(VegoError::invalid_argument("footer.decode", "footer must be 32 KiB")
                .with_context("size", bytes.len().to_string()));
        }
        let corrupt = |message: &str| VegoError::corrupted("footer.decode", message);
        let mut cursor = Cursor::new(bytes);
        let io = |e| VegoError::corrupted("footer.decode", "truncated footer").with_source(e);

        let version = cursor.read_u16::<LittleEndian>().map_err(io)?;
        let num_pages = cursor.read_i32::<LittleEndian>().map_err(io)?;
        let created_at = cursor.read_i64::<LittleEndian>().map_err(io)?;
        let modified_at = cursor.read_i64::<LittleEndian>().map_err(io)?;

        let index_count = cursor.read_i32::<LittleEndian>().map_err(io)?;
        if index_count != num_pages {
            return Err(corrupt("page count disagrees with index list")
                .with_context("num_pages", num_pages.to_string())
                .with_context("index_count", index_count.to_string()));
        }
        let index_count = i32_to_usize(index_count).ok_or_else(|| corrupt("negative page count"))?;
        let mut page_indexes = PageIndexList::new();
        for _ in 0..index_count {
            page_indexes.push(PageIndex::read_from(&mut cursor).map_err(io)?);
        }

        let meta_count = cursor.read_i32::<LittleEndian>().map_err(io)?;
        let meta_count = i32_to_usize(meta_count).ok_or_else(|| corrupt("negative metadata count"))?;
        let mut metadata = BTreeMap::new();
        for _ in 0..meta_count {
            let key = read_string(&mut cursor).map_err(io)?;
            let value = read_string(&mut cursor).map_err(io)?;
            metadata.insert(key, value);
        }

        #[allow(clippy::cast_possible_truncation)]
        let checked_len = cursor.position() as usize;
        let stored = cursor.read_u32::<LittleEndian>().map_err(io)?;
        let actual = crc32fast::hash(&bytes[..checked_len]);
        if stored != actual {
            return Err(corrupt("footer checksum mismatch")
                .with_context("expected", format!("{stored:#010x}"))
                .with_context("actual", format!("{actual:#010x}")));
        }
        if bytes[checked_len + 4..].iter().any(|&b| b != 0) {
            return Err(corrupt("nonzero footer padding"));
        }

        Ok(Self { version, created_at, modified_at, page_indexes, metadata })
    }
}

fn parse_features(hex: &str) -> Result<u32> {
    hex.strip_prefix("0x")
        .and_then(|h| u32::from_str_radix(h, 16).ok())
        .ok_or_else(|| {
            VegoError::new(ErrorCode::MetadataError, "footer.features", "malformed feature flags")
                .with_context("value", hex)
        })
}

fn write_string<W: Write>(sink: &mut W, s: &str) -> std::io::Result<()> {
    let bytes = s.as_bytes();
    let len = i32::try_from(bytes.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "string too long"))?;
    sink.write_i32::<LittleEndian>(len)?;
    sink.write_all(bytes)
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> std::io::Result<String> {
    let len = cursor.read_i32::<LittleEndian>()?;
    let len = usize::try_from(len)
        .ok()
        .filter(|&l| l <= FOOTER_SIZE)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "length out of range"))?;
    let mut bytes = vec![0u8; len];
    cursor.read_exact(&mut bytes)?;
    String::from_utf8(bytes)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid UTF-8"))
}
