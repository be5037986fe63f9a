//! Format versioning: encoded (major, minor) pairs, feature-flag bitsets,
//! and the reader-side compatibility decisions.

use crate::errors::{ErrorCode, Result, VegoError, VersionRelation};

/// Feature bits advertised by a format version.
pub const FEATURE_BASIC_COLUMNAR: u32 = 1;
pub const FEATURE_ZSTD_COMPRESSION: u32 = 1 << 1;
pub const FEATURE_ROW_INDEX: u32 = 1 << 2;
pub const FEATURE_BLOCK_CACHE: u32 = 1 << 3;

/// A format version: (major, minor) plus the feature bitset that version
/// advertises. Encoded on disk as `(major << 8) | minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionPolicy {
    pub major: u8,
    pub minor: u8,
    pub feature_flags: u32,
}

impl VersionPolicy {
    pub const V1_0: Self =
        Self { major: 1, minor: 0, feature_flags: FEATURE_BASIC_COLUMNAR | FEATURE_ZSTD_COMPRESSION };
    pub const V1_1: Self =
        Self { major: 1, minor: 1, feature_flags: Self::V1_0.feature_flags | FEATURE_ROW_INDEX };
    pub const V1_2: Self =
        Self { major: 1, minor: 2, feature_flags: Self::V1_1.feature_flags | FEATURE_BLOCK_CACHE };

    pub const CURRENT: Self = Self::V1_2;
    pub const MIN_READABLE: Self = Self::V1_0;

    #[must_use]
    pub const fn new(major: u8, minor: u8, feature_flags: u32) -> Self {
        Self { major, minor, feature_flags }
    }

    #[must_use]
    pub const fn encoded(self) -> u16 {
        ((self.major as u16) << 8) | self.minor as u16
    }

    /// Decode an encoded version. Known versions come back with their full
    /// feature bitsets; unknown pairs decode with an empty bitset.
    #[must_use]
    pub fn from_encoded(encoded: u16) -> Self {
        let major = (encoded >> 8) as u8;
        let minor = (encoded & 0xFF) as u8;
        match (major, minor) {
            (1, 0) => Self::V1_0,
            (1, 1) => Self::V1_1,
            (1, 2) => Self::V1_2,
            _ => Self { major, minor, feature_flags: 0 },
        }
    }

    #[must_use]
    pub const fn has_feature(self, feature: u32) -> bool {
        self.feature_flags & feature != 0
    }

    /// "M.N" rendering used in metadata and suggestions.
    #[must_use]
    pub fn label(self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// Parse an "M.N" label.
    pub fn parse_label(label: &str) -> Result<Self> {
        let (major, minor) = label
            .split_once('.')
            .and_then(|(a, b)| Some((a.parse::<u8>().ok()?, b.parse::<u8>().ok()?)))
            .ok_or_else(|| {
                VegoError::new(ErrorCode::MetadataError, "version.parse", "malformed version label")
                    .with_context("label", label)
            })?;
        Ok(Self::from_encoded((u16::from(major) << 8) | u16::from(minor)))
    }
}

/// Map legacy scalar versions onto the encoded scheme. The very first
/// release stored a bare `1`; everything canonical passes through.
#[must_use]
pub fn normalize_version(version: u16) -> u16 {
    match version {
        1 => 0x0100,
        other => other,
    }
}

/// How a reader should approach a compatible file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// File and reader versions are identical.
    Normal,
    /// Older file without a row index: id lookups degrade to linear scans.
    FallbackLinearScan,
    /// Older file that still carries a row index.
    Compatible,
    /// Newer file. Callers must have rejected it via the compatibility
    /// check before asking for a strategy.
    Unsupported,
}

/// Reader-side compatibility decisions for one reader version.
#[derive(Debug, Clone, Copy)]
pub struct VersionChecker {
    reader: VersionPolicy,
}

impl VersionChecker {
    #[must_use]
    pub fn new(reader: VersionPolicy) -> Self {
        Self { reader }
    }

    /// A checker for the version this crate writes.
    #[must_use]
    pub fn current() -> Self {
        Self::new(VersionPolicy::CURRENT)
    }

    #[must_use]
    pub fn reader(&self) -> VersionPolicy {
        self.reader
    }

    /// Decide whether a file with the given encoded version can be read at
    /// all. Newer files (same major, higher minor; or higher major) and
    /// foreign majors are rejected with upgrade/downgrade advice.
    pub fn check_read_compatibility(&self, file_version: u16) -> Result<()> {
        let file = VersionPolicy::from_encoded(normalize_version(file_version));
        if file.major > self.reader.major {
            return Err(self
                .mismatch(file, "file requires a newer major version")
                .with_context(
                    "suggestion",
                    format!("Please upgrade to Vego {}.{} or later", file.major, file.minor),
                )
                .with_version_relation(VersionRelation::TooNew));
        }
        if file.major < self.reader.major {
            return Err(self
                .mismatch(file, "file was written by an older major version")
                .with_context(
                    "suggestion",
                    format!("Please use Vego {}.x to read this file", file.major),
                )
                .with_version_relation(VersionRelation::TooOld));
        }
        if file.minor > self.reader.minor {
            return Err(self
                .mismatch(file, "file requires a newer reader")
                .with_context(
                    "suggestion",
                    format!("Please upgrade to Vego {}.{} or later", file.major, file.minor),
                )
                .with_version_relation(VersionRelation::TooNew));
        }
        Ok(())
    }

    /// A feature is usable only when both the file and the reader advertise it.
    #[must_use]
    pub fn can_use_feature(&self, file_features: u32, feature: u32) -> bool {
        file_features & feature != 0 && self.reader.feature_flags & feature != 0
    }

    /// Pick the read strategy for an already-accepted file.
    #[must_use]
    pub fn get_read_strategy(&self, file_version: u16, file_features: u32) -> ReadStrategy {
        let file = VersionPolicy::from_encoded(normalize_version(file_version));
        if file.major != self.reader.major || file.minor > self.reader.minor {
            return ReadStrategy::Unsupported;
        }
        if file.minor == self.reader.minor {
            return ReadStrategy::Normal;
        }
        if file_features & FEATURE_ROW_INDEX != 0 {
            ReadStrategy::Compatible
        } else {
            ReadStrategy::FallbackLinearScan
        }
    }

    fn mismatch(&self, file: VersionPolicy, message: &str) -> VegoError {
        VegoError::new(ErrorCode::VersionMismatch, "version.check", message)
            .with_context("file_version", file.label())
            .with_context("reader_version", self.reader.label())
    }
}
