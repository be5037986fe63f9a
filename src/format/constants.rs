//! On-disk format constants. All multi-byte integers in the format are
//! little-endian; unspecified padding is zeroed.

/// File magic, "LANC" read as a little-endian u32.
pub const FILE_MAGIC: u32 = 0x4C41_4E43;

/// Row-index page payload magic, "RIDX".
pub const ROW_INDEX_MAGIC: u32 = 0x5249_4458;

/// Upper bound on a page's compressed payload.
pub const MAX_PAGE_SIZE: usize = 16 * 1024 * 1024;

/// Upper bound on the schema JSON embedded in the header.
pub const MAX_SCHEMA_LEN: usize = 1024 * 1024;

/// The footer always occupies exactly this many trailing bytes.
pub const FOOTER_SIZE: usize = 32 * 1024;

/// Fixed page header: type, encoding, column, values, sizes, checksum, pad.
pub const PAGE_HEADER_SIZE: usize = 30;

/// Fixed header prelude preceding the schema JSON.
pub const HEADER_PRELUDE_SIZE: usize = 60;

/// One page-index entry in the footer.
pub const PAGE_INDEX_ENTRY_SIZE: usize = 25;

/// Default page size recorded in new headers.
pub const DEFAULT_PAGE_SIZE: i32 = 64 * 1024;

// File-level header flags.
pub const FLAG_COMPRESSED: u16 = 1;
/// Reserved; encryption is a future feature.
pub const FLAG_ENCRYPTED: u16 = 2;
pub const FLAG_INDEXED: u16 = 4;
pub const FLAG_VERSIONED: u16 = 8;

/// Metadata keys under this prefix are reserved for the format itself.
pub const RESERVED_META_PREFIX: &str = "vego.";

pub const META_FORMAT_VERSION: &str = "vego.format.version";
pub const META_FORMAT_FEATURES: &str = "vego.format.features";
pub const META_ROW_INDEX_OFFSET: &str = "vego.rowindex.offset";
pub const META_ROW_INDEX_SIZE: &str = "vego.rowindex.size";
pub const META_ROW_INDEX_CHECKSUM: &str = "vego.rowindex.checksum";
pub const META_BLOCK_CACHE_ENABLED: &str = "vego.blockcache.enabled";
pub const META_BLOCK_CACHE_BLOCK_SIZE: &str = "vego.blockcache.block_size";
