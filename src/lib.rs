#![forbid(unsafe_code)]

//! Vego storage core: a columnar on-disk format for vector+metadata
//! records, the asynchronous I/O substrate that moves its bytes, and a
//! sharded LRU block cache in between.
//!
//! Files are self-describing, versioned, and checksummed: a header with
//! an embedded JSON schema, column pages with CRC32-validated payloads,
//! an optional id->row hash index, and a fixed 32 KiB footer locating
//! every page. The [`io::AsyncIo`] facade serves positional reads and
//! writes through a priority scheduler and a worker-pool executor, and
//! [`cache::BlockCache`] keeps hot page bytes in memory.

pub mod cache;
#[path = "utils/errors.rs"]
pub mod errors;
pub mod format;
pub mod io;
pub mod utils;

pub use cache::{BlockCache, BlockCacheConfig};
pub use errors::{ErrorCode, Result, Severity, VegoError};
pub use format::{
    DataType, Field, FileReader, FileWriter, Footer, Header, Page, PageEncoding, PageIndex,
    PageType, ReadStrategy, RowIndex, Schema, VersionChecker, VersionPolicy,
};
pub use io::{AsyncIo, AsyncIoConfig, CancelToken, Priority, RequestOptions};
