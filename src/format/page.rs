//! The page: smallest self-checksummed unit of on-disk data.
//!
//! Layout (little-endian, 30-byte header + payload):
//!
//! ```text
//! off  size  field
//! 0    1     type         (Data=0, Dictionary=1, Index=2)
//! 1    1     encoding     (Plain=0 .. BSS=7)
//! 2    4     column_index (-1 for row-index pages)
//! 6    4     num_values
//! 10   4     uncompressed_size
//! 14   4     compressed_size (== payload length, <= 16 MiB)
//! 18   4     checksum        (CRC32-IEEE of payload)
//! 22   8     reserved (zero)
//! 30   C     payload
//! ```

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::{Result, VegoError};
use crate::format::constants::{MAX_PAGE_SIZE, PAGE_HEADER_SIZE};
use crate::utils::num::{i32_to_usize, usize_to_i32};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    Data = 0,
    Dictionary = 1,
    Index = 2,
}

impl PageType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Data),
            1 => Ok(Self::Dictionary),
            2 => Ok(Self::Index),
            other => Err(VegoError::corrupted("page.read", "unknown page type")
                .with_context("value", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageEncoding {
    Plain = 0,
    Zstd = 1,
    Delta = 2,
    Rle = 3,
    FullZip = 4,
    BitPacked = 5,
    Dictionary = 6,
    Bss = 7,
}

impl PageEncoding {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Plain),
            1 => Ok(Self::Zstd),
            2 => Ok(Self::Delta),
            3 => Ok(Self::Rle),
            4 => Ok(Self::FullZip),
            5 => Ok(Self::BitPacked),
            6 => Ok(Self::Dictionary),
            7 => Ok(Self::Bss),
            other => Err(VegoError::corrupted("page.read", "unknown page encoding")
                .with_context("value", other.to_string())),
        }
    }
}

/// A column page. Owns its payload once set; the checksum always matches
/// the payload whenever the page is written or validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_type: PageType,
    pub encoding: PageEncoding,
    pub column_index: i32,
    pub num_values: i32,
    pub uncompressed_size: i32,
    pub compressed_size: i32,
    pub checksum: u32,
    pub data: Vec<u8>,
}

impl Page {
    #[must_use]
    pub fn new(page_type: PageType, encoding: PageEncoding, column_index: i32, num_values: i32) -> Self {
        Self {
            page_type,
            encoding,
            column_index,
            num_values,
            uncompressed_size: 0,
            compressed_size: 0,
            checksum: 0,
            data: Vec::new(),
        }
    }

    /// Install the payload, recomputing `compressed_size` and `checksum`.
    pub fn set_data(&mut self, data: Vec<u8>, uncompressed_size: i32) -> Result<()> {
        if data.len() > MAX_PAGE_SIZE {
            return Err(VegoError::invalid_argument("page.set_data", "payload exceeds page limit")
                .with_context("size", data.len().to_string()));
        }
        let compressed_size = usize_to_i32(data.len()).ok_or_else(|| {
            VegoError::invalid_argument("page.set_data", "payload length overflows i32")
        })?;
        self.checksum = crc32fast::hash(&data);
        self.compressed_size = compressed_size;
        self.uncompressed_size = uncompressed_size;
        self.data = data;
        Ok(())
    }

    /// Structural checks plus the payload checksum.
    pub fn validate(&self) -> Result<()> {
        let payload_len = i32_to_usize(self.compressed_size).ok_or_else(|| {
            VegoError::invalid_argument("page.validate", "negative compressed size")
        })?;
        if payload_len != self.data.len() {
            return Err(VegoError::invalid_argument("page.validate", "payload length mismatch")
                .with_context("compressed_size", self.compressed_size.to_string())
                .with_context("data_len", self.data.len().to_string()));
        }
        if payload_len > MAX_PAGE_SIZE {
            return Err(VegoError::invalid_argument("page.validate", "payload exceeds page limit"));
        }
        if self.num_values <= 0 {
            return Err(VegoError::invalid_argument("page.validate", "non-positive value count")
                .with_context("num_values", self.num_values.to_string()));
        }
        if self.uncompressed_size <= 0 {
            return Err(VegoError::invalid_argument("page.validate", "non-positive uncompressed size"));
        }
        let actual = crc32fast::hash(&self.data);
        if actual != self.checksum {
            return Err(VegoError::corrupted("page.validate", "payload checksum mismatch")
                .with_context("expected", format!("{:#010x}", self.checksum))
                .with_context("actual", format!("{actual:#010x}")));
        }
        Ok(())
    }

    /// Validate, then emit the fixed header followed by the payload.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        self.validate()?;
        let io = |e| VegoError::io("page.write", e);
        sink.write_u8(self.page_type as u8).map_err(io)?;
        sink.write_u8(self.encoding as u8).map_err(io)?;
        sink.write_i32::<LittleEndian>(self.column_index).map_err(io)?;
        sink.write_i32::<LittleEndian>(self.num_values).map_err(io)?;
        sink.write_i32::<LittleEndian>(self.uncompressed_size).map_err(io)?;
        sink.write_i32::<LittleEndian>(self.compressed_size).map_err(io)?;
        sink.write_u32::<LittleEndian>(self.checksum).map_err(io)?;
        sink.write_all(&[0u8; 8]).map_err(io)?;
        sink.write_all(&self.data).map_err(io)?;
        Ok(())
    }

    /// Read a header plus payload, re-validating the checksum.
    pub fn read_from<R: Read>(source: &mut R) -> Result<Self> {
        let io = |e| VegoError::io("page.read", e);
        let page_type = PageType::from_u8(source.read_u8().map_err(io)?)?;
        let encoding = PageEncoding::from_u8(source.read_u8().map_err(io)?)?;
        let column_index = source.read_i32::<LittleEndian>().map_err(io)?;
        let num_values = source.read_i32::<LittleEndian>().map_err(io)?;
        let uncompressed_size = source.read_i32::<LittleEndian>().map_err(io)?;
        let compressed_size = source.read_i32::<LittleEndian>().map_err(io)?;
        let checksum = source.read_u32::<LittleEndian>().map_err(io)?;
        let mut reserved = [0u8; 8];
        source.read_exact(&mut reserved).map_err(io)?;

        let payload_len = i32_to_usize(compressed_size)
            .filter(|&len| len <= MAX_PAGE_SIZE)
            .ok_or_else(|| {
                VegoError::corrupted("page.read", "compressed size out of range")
                    .with_context("compressed_size", compressed_size.to_string())
            })?;
        let mut data = vec![0u8; payload_len];
        source.read_exact(&mut data).map_err(io)?;

        let page = Self {
            page_type,
            encoding,
            column_index,
            num_values,
            uncompressed_size,
            compressed_size,
            checksum,
            data,
        };
        page.validate()?;
        Ok(page)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(PAGE_HEADER_SIZE + self.data.len());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut std::io::Cursor::new(bytes))
    }

    /// Total on-disk size, header included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        PAGE_HEADER_SIZE + self.data.len()
    }
}
