//! The id -> row hash index: an open-addressed table serialized as an
//! Index page. Hashes are FNV-1a-64 of the raw id bytes, so lookups are
//! probabilistic under hash collision; layers that need certainty carry
//! the original id in the row payload and re-verify.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::{ErrorCode, Result, VegoError};
use crate::format::constants::ROW_INDEX_MAGIC;
use crate::format::page::{Page, PageEncoding, PageType};
use crate::utils::hash::fnv1a_64;
use crate::utils::num::{i32_to_usize, i64_to_usize, usize_to_i32};

const MIN_BUCKETS: usize = 16;
const EMPTY_SLOT: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowIndexEntry {
    pub id_hash: u64,
    pub row: i64,
}

/// Open-addressed hash table with linear probing. `bucket_count` is always
/// a power of two >= 16 and the load factor stays at or below 0.75.
#[derive(Debug, Clone)]
pub struct RowIndex {
    hash_table: Vec<i64>,
    entries: Vec<RowIndexEntry>,
    checksum: u32,
}

// The stored checksum is bookkeeping, not content: two tables with the
// same buckets and entries index identically.
impl PartialEq for RowIndex {
    fn eq(&self, other: &Self) -> bool {
        self.hash_table == other.hash_table && self.entries == other.entries
    }
}

impl Eq for RowIndex {}

impl Default for RowIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl RowIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Size the table so `expected` insertions stay within the load factor.
    #[must_use]
    pub fn with_capacity(expected: usize) -> Self {
        let mut buckets = MIN_BUCKETS;
        while expected * 4 > buckets * 3 {
            buckets <<= 1;
        }
        Self { hash_table: vec![EMPTY_SLOT; buckets], entries: Vec::new(), checksum: 0 }
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
    pub fn bucket_count(&self) -> usize {
        self.hash_table.len()
    }

    /// Stored checksum. Retained verbatim from disk; decode does not
    /// recompute it.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Map an id to a row, updating in place on an `id_hash` match.
    pub fn insert(&mut self, id: impl AsRef<[u8]>, row: i64) -> Result<()> {
        self.insert_hash(fnv1a_64(id.as_ref()), row)?;
        if self.entries.len() * 4 > self.bucket_count() * 3 {
            self.rehash();
        }
        Ok(())
    }

    /// Look up a row by id. Terminates at the first empty slot.
    #[must_use]
    pub fn lookup(&self, id: impl AsRef<[u8]>) -> Option<i64> {
        let id_hash = fnv1a_64(id.as_ref());
        let mask = self.bucket_count() - 1;
        let mut bucket = hash_bucket(id_hash, self.bucket_count());
        for _ in 0..self.bucket_count() {
            match self.hash_table[bucket] {
                EMPTY_SLOT => return None,
                slot => {
                    let entry = self.entries[i64_to_usize(slot)?];
                    if entry.id_hash == id_hash {
                        return Some(entry.row);
                    }
                }
            }
            bucket = (bucket + 1) & mask;
        }
        None
    }

    fn insert_hash(&mut self, id_hash: u64, row: i64) -> Result<()> {
        let mask = self.bucket_count() - 1;
        let mut bucket = hash_bucket(id_hash, self.bucket_count());
        for _ in 0..self.bucket_count() {
            match self.hash_table[bucket] {
                EMPTY_SLOT => {
                    let slot = usize_to_i32(self.entries.len()).ok_or_else(|| {
                        VegoError::new(
                            ErrorCode::ValidationFailed,
                            "row_index.insert",
                            "entry count overflow",
                        )
                    })?;
                    self.entries.push(RowIndexEntry { id_hash, row });
                    self.hash_table[bucket] = i64::from(slot);
                    return Ok(());
                }
                slot => {
                    let idx = i64_to_usize(slot).ok_or_else(|| {
                        VegoError::corrupted("row_index.insert", "negative slot in hash table")
                    })?;
                    if self.entries[idx].id_hash == id_hash {
                        self.entries[idx].row = row;
                        return Ok(());
                    }
                }
            }
            bucket = (bucket + 1) & mask;
        }
        // Unreachable while the load factor holds.
        Err(VegoError::new(ErrorCode::ValidationFailed, "row_index.insert", "hash table full"))
    }

    /// Double the bucket count and reprobe every entry. Never shrinks.
    fn rehash(&mut self) {
        let new_buckets = self.bucket_count() * 2;
        let mask = new_buckets - 1;
        let mut table = vec![EMPTY_SLOT; new_buckets];
        for (i, entry) in self.entries.iter().enumerate() {
            let mut bucket = hash_bucket(entry.id_hash, new_buckets);
            while table[bucket] != EMPTY_SLOT {
                bucket = (bucket + 1) & mask;
            }
            table[bucket] = i as i64;
        }
        self.hash_table = table;
    }

    /// Serialize the page payload: magic, counts, table, entries, checksum.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let num_entries = usize_to_i32(self.entries.len())
            .ok_or_else(|| VegoError::invalid_argument("row_index.encode", "entry count overflow"))?;
        let bucket_count = usize_to_i32(self.bucket_count())
            .ok_or_else(|| VegoError::invalid_argument("row_index.encode", "bucket count overflow"))?;

        let mut buf: Vec<u8> = Vec::with_capacity(
            16 + self.hash_table.len() * 8 + self.entries.len() * 16,
        );
        let io = |e| VegoError::io("row_index.encode", e);
        buf.write_u32::<LittleEndian>(ROW_INDEX_MAGIC).map_err(io)?;
        buf.write_i32::<LittleEndian>(num_entries).map_err(io)?;
        buf.write_i32::<LittleEndian>(bucket_count).map_err(io)?;
        for &slot in &self.hash_table {
            buf.write_i64::<LittleEndian>(slot).map_err(io)?;
        }
        for entry in &self.entries {
            buf.write_u64::<LittleEndian>(entry.id_hash).map_err(io)?;
            buf.write_i64::<LittleEndian>(entry.row).map_err(io)?;
        }
        let checksum = crc32fast::hash(&buf);
        buf.write_u32::<LittleEndian>(checksum).map_err(io)?;
        Ok(buf)
    }

    /// Deserialize a page payload. The trailing checksum is stored as read;
    /// recomputation is left to a future integrity pass.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let io = |e| VegoError::corrupted("row_index.decode", "truncated row index").with_source(e);

        let magic = cursor.read_u32::<LittleEndian>().map_err(io)?;
        if magic != ROW_INDEX_MAGIC {
            return Err(VegoError::new(
                ErrorCode::InvalidMagic,
                "row_index.decode",
                "bad row index magic",
            )
            .with_context("found", format!("{magic:#010x}")));
        }
        let num_entries = cursor.read_i32::<LittleEndian>().map_err(io)?;
        let bucket_count = cursor.read_i32::<LittleEndian>().map_err(io)?;
        let num_entries = i32_to_usize(num_entries)
            .ok_or_else(|| VegoError::corrupted("row_index.decode", "negative entry count"))?;
        let bucket_count = i32_to_usize(bucket_count)
            .filter(|&b| b >= MIN_BUCKETS && b.is_power_of_two())
            .ok_or_else(|| {
                VegoError::corrupted("row_index.decode", "bucket count not a power of two")
            })?;

        let mut hash_table = Vec::with_capacity(bucket_count);
        for _ in 0..bucket_count {
            hash_table.push(cursor.read_i64::<LittleEndian>().map_err(io)?);
        }
        let mut entries = Vec::with_capacity(num_entries.min(bytes.len() / 16));
        for _ in 0..num_entries {
            entries.push(RowIndexEntry {
                id_hash: cursor.read_u64::<LittleEndian>().map_err(io)?,
                row: cursor.read_i64::<LittleEndian>().map_err(io)?,
            });
        }
        let checksum = cursor.read_u32::<LittleEndian>().map_err(io)?;

        for &slot in &hash_table {
            if slot != EMPTY_SLOT && i64_to_usize(slot).is_none_or(|s| s >= entries.len()) {
                return Err(VegoError::corrupted(
                    "row_index.decode",
                    "hash table slot out of range",
                )
                .with_context("slot", slot.to_string()));
            }
        }

        Ok(Self { hash_table, entries, checksum })
    }

    /// Wrap the serialized table in an Index page (`column_index = -1`).
    pub fn to_page(&self) -> Result<Page> {
        let payload = self.encode()?;
        let num_values = usize_to_i32(self.entries.len()).unwrap_or(i32::MAX).max(1);
        let uncompressed = usize_to_i32(payload.len())
            .ok_or_else(|| VegoError::invalid_argument("row_index.to_page", "payload overflow"))?;
        let mut page = Page::new(PageType::Index, PageEncoding::Plain, -1, num_values);
        page.set_data(payload, uncompressed)?;
        Ok(page)
    }

    pub fn from_page(page: &Page) -> Result<Self> {
        page.validate()?;
        if page.page_type != PageType::Index {
            return Err(VegoError::invalid_argument("row_index.from_page", "not an index page")
                .with_context("page_type", format!("{:?}", page.page_type)));
        }
        Self::decode(&page.data)
    }
}

#[inline]
fn hash_bucket(id_hash: u64, bucket_count: usize) -> usize {
    #[allow(clippy::cast_possible_truncation)]
    {
        (id_hash % bucket_count as u64) as usize
    }
}
