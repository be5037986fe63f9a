use std::collections::BTreeMap;
use thiserror::Error;

/// Stable error codes. Callers match on these (or the category predicates
/// below), never on rendered messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidMagic,
    VersionMismatch,
    FormatCorrupted,
    ValidationFailed,
    InvalidArgument,
    SchemaMismatch,
    MetadataError,
    UnsupportedType,
    Io,
    Canceled,
    Timeout,
    QueueFull,
    Stopped,
    FileNotRegistered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    Warn,
    #[default]
    Error,
    Fatal,
}

/// How a file version relates to the reader, recorded on `VersionMismatch`
/// errors so callers can branch without parsing suggestion strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRelation {
    TooNew,
    TooOld,
    FeatureNotSupported,
}

/// Crate-wide error: a stable code plus the operation that produced it,
/// structured context, and an optional wrapped cause.
#[derive(Debug, Error)]
#[error("{op}: {message}")]
pub struct VegoError {
    code: ErrorCode,
    op: String,
    message: String,
    context: BTreeMap<String, String>,
    severity: Severity,
    version_relation: Option<VersionRelation>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

pub type Result<T> = std::result::Result<T, VegoError>;

impl VegoError {
    #[must_use]
    pub fn new(code: ErrorCode, op: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            op: op.into(),
            message: message.into(),
            context: BTreeMap::new(),
            severity: Severity::Error,
            version_relation: None,
            source: None,
        }
    }

    /// Wrap an underlying I/O failure.
    #[must_use]
    pub fn io(op: impl Into<String>, source: std::io::Error) -> Self {
        let message = source.to_string();
        Self::new(ErrorCode::Io, op, message).with_source(source)
    }

    #[must_use]
    pub fn corrupted(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FormatCorrupted, op, message)
    }

    #[must_use]
    pub fn invalid_argument(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, op, message)
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub(crate) fn with_version_relation(mut self, relation: VersionRelation) -> Self {
        self.version_relation = Some(relation);
        self
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[must_use]
    pub fn op(&self) -> &str {
        &self.op
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    #[must_use]
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    /// Human-facing upgrade/downgrade advice attached to version errors.
    #[must_use]
    pub fn suggestion(&self) -> Option<&str> {
        self.context_value("suggestion")
    }

    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self.code, ErrorCode::FormatCorrupted | ErrorCode::InvalidMagic)
    }

    #[must_use]
    pub fn is_version(&self) -> bool {
        self.code == ErrorCode::VersionMismatch
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ValidationFailed | ErrorCode::InvalidArgument | ErrorCode::SchemaMismatch
        )
    }

    #[must_use]
    pub fn is_version_too_new(&self) -> bool {
        self.version_relation == Some(VersionRelation::TooNew)
    }

    #[must_use]
    pub fn is_version_too_old(&self) -> bool {
        self.version_relation == Some(VersionRelation::TooOld)
    }

    #[must_use]
    pub fn is_feature_not_supported(&self) -> bool {
        self.version_relation == Some(VersionRelation::FeatureNotSupported)
    }
}
