//! The file header: magic, version, file flags, row/column counts, default
//! page size, and the embedded schema JSON.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::{ErrorCode, Result, VegoError};
use crate::format::constants::{
    DEFAULT_PAGE_SIZE, FILE_MAGIC, FLAG_VERSIONED, HEADER_PRELUDE_SIZE, MAX_PAGE_SIZE,
    MAX_SCHEMA_LEN,
};
use crate::format::schema::Schema;
use crate::format::version::{VersionPolicy, normalize_version};
use crate::utils::num::{i32_to_usize, usize_to_i32};

/// Header layout: a fixed 60-byte prelude followed by `schema_length`
/// bytes of UTF-8 schema JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub flags: u16,
    pub num_rows: i64,
    pub num_columns: i32,
    pub page_size: i32,
    pub schema: Schema,
}

impl Header {
    /// A current-version header for the given schema.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let num_columns = schema.len() as i32;
        Self {
            version: VersionPolicy::CURRENT.encoded(),
            flags: FLAG_VERSIONED,
            num_rows: 0,
            num_columns,
            page_size: DEFAULT_PAGE_SIZE,
            schema,
        }
    }

    #[must_use]
    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    pub fn set_flag(&mut self, flag: u16) {
        self.flags |= flag;
    }

    pub fn validate(&self) -> Result<()> {
        let version = normalize_version(self.version);
        if version < VersionPolicy::MIN_READABLE.encoded()
            || version > VersionPolicy::CURRENT.encoded()
        {
            return Err(VegoError::new(
                ErrorCode::VersionMismatch,
                "header.validate",
                "version outside the supported window",
            )
            .with_context("version", VersionPolicy::from_encoded(version).label()));
        }
        if self.schema.is_empty() {
            return Err(VegoError::new(
                ErrorCode::SchemaMismatch,
                "header.validate",
                "schema has no fields",
            ));
        }
        if i32_to_usize(self.num_columns) != Some(self.schema.len()) {
            return Err(VegoError::new(
                ErrorCode::SchemaMismatch,
                "header.validate",
                "column count disagrees with schema",
            )
            .with_context("num_columns", self.num_columns.to_string())
            .with_context("schema_fields", self.schema.len().to_string()));
        }
        if self.page_size <= 0 || i32_to_usize(self.page_size).is_none_or(|p| p > MAX_PAGE_SIZE) {
            return Err(VegoError::invalid_argument("header.validate", "page size out of range")
                .with_context("page_size", self.page_size.to_string()));
        }
        Ok(())
    }

    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        self.validate()?;
        let schema_json = self.schema.to_json()?;
        if schema_json.len() > MAX_SCHEMA_LEN {
            return Err(VegoError::invalid_argument("header.write", "schema JSON too large")
                .with_context("schema_length", schema_json.len().to_string()));
        }
        let schema_length = usize_to_i32(schema_json.len())
            .ok_or_else(|| VegoError::invalid_argument("header.write", "schema length overflow"))?;

        let io = |e| VegoError::io("header.write", e);
        sink.write_u32::<LittleEndian>(FILE_MAGIC).map_err(io)?;
        sink.write_u16::<LittleEndian>(self.version).map_err(io)?;
        sink.write_u16::<LittleEndian>(self.flags).map_err(io)?;
        sink.write_i64::<LittleEndian>(self.num_rows).map_err(io)?;
        sink.write_i32::<LittleEndian>(self.num_columns).map_err(io)?;
        sink.write_i32::<LittleEndian>(self.page_size).map_err(io)?;
        sink.write_all(&[0u8; 32]).map_err(io)?;
        sink.write_i32::<LittleEndian>(schema_length).map_err(io)?;
        sink.write_all(&schema_json).map_err(io)?;
        Ok(())
    }

    pub fn read_from<R: Read>(source: &mut R) -> Result<Self> {
        let io = |e| VegoError::io("header.read", e);
        let magic = source.read_u32::<LittleEndian>().map_err(io)?;
        if magic != FILE_MAGIC {
            return Err(VegoError::new(ErrorCode::InvalidMagic, "header.read", "bad file magic")
                .with_context("expected", format!("{FILE_MAGIC:#010x}"))
                .with_context("found", format!("{magic:#010x}")));
        }
        let version = source.read_u16::<LittleEndian>().map_err(io)?;
        let flags = source.read_u16::<LittleEndian>().map_err(io)?;
        let num_rows = source.read_i64::<LittleEndian>().map_err(io)?;
        let num_columns = source.read_i32::<LittleEndian>().map_err(io)?;
        let page_size = source.read_i32::<LittleEndian>().map_err(io)?;
        let mut reserved = [0u8; 32];
        source.read_exact(&mut reserved).map_err(io)?;
        let schema_length = source.read_i32::<LittleEndian>().map_err(io)?;

        let schema_len = i32_to_usize(schema_length)
            .filter(|&len| len > 0 && len <= MAX_SCHEMA_LEN)
            .ok_or_else(|| {
                VegoError::corrupted("header.read", "schema length out of range")
                    .with_context("schema_length", schema_length.to_string())
            })?;
        let mut schema_json = vec![0u8; schema_len];
        source.read_exact(&mut schema_json).map_err(io)?;
        let schema = Schema::from_json(&schema_json)?;

        let header = Self { version, flags, num_rows, num_columns, page_size, schema };
        header.validate()?;
        Ok(header)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(HEADER_PRELUDE_SIZE + 256);
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut std::io::Cursor::new(bytes))
    }
}
