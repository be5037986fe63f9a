//! Schema bridge between the header's embedded JSON and typed columns.
//!
//! The JSON shape is `{"fields":[{"name","type","nullable"}],"metadata":{}}`
//! with stringly-typed column types: `int32`, `int64`, `float32`,
//! `float64`, `binary`, `string`, and the recursive
//! `fixed_size_list[N]<T>`. The JSON boundary is kept bit-exact for format
//! compatibility; only the token grammar is interpreted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorCode, Result, VegoError};

const FIXED_SIZE_LIST_PREFIX: &str = "fixed_size_list[";
const MAX_FIXED_SIZE_LIST_LEN: i64 = 100_000;

/// A column type, parsed from its token form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Int32,
    Int64,
    Float32,
    Float64,
    Binary,
    Utf8,
    FixedSizeList { child: Box<DataType>, size: i32 },
}

impl DataType {
    /// Parse a type token. Unknown tokens fail with `UnsupportedType`.
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            "binary" => Ok(Self::Binary),
            "string" => Ok(Self::Utf8),
            _ if token.starts_with(FIXED_SIZE_LIST_PREFIX) => Self::parse_fixed_size_list(token),
            _ => Err(Self::unsupported(token)),
        }
    }

    fn parse_fixed_size_list(token: &str) -> Result<Self> {
        let rest = &token[FIXED_SIZE_LIST_PREFIX.len()..];
        let close = rest.find(']').ok_or_else(|| Self::unsupported(token))?;
        let size: i64 = rest[..close].parse().map_err(|_| Self::unsupported(token))?;
        if size <= 0 || size > MAX_FIXED_SIZE_LIST_LEN {
            return Err(Self::unsupported(token)
                .with_context("reason", "fixed_size_list length out of range"));
        }
        let child_token = &rest[close + 1..];
        if !child_token.starts_with('<') || !child_token.ends_with('>') || child_token.len() < 3 {
            return Err(Self::unsupported(token));
        }
        let child = Self::parse(&child_token[1..child_token.len() - 1])?;
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self::FixedSizeList { child: Box::new(child), size: size as i32 })
    }

    /// Render the token form.
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            Self::Int32 => "int32".to_string(),
            Self::Int64 => "int64".to_string(),
            Self::Float32 => "float32".to_string(),
            Self::Float64 => "float64".to_string(),
            Self::Binary => "binary".to_string(),
            Self::Utf8 => "string".to_string(),
            Self::FixedSizeList { child, size } => {
                format!("fixed_size_list[{}]<{}>", size, child.token())
            }
        }
    }

    fn unsupported(token: &str) -> VegoError {
        VegoError::new(ErrorCode::UnsupportedType, "schema.parse", "unsupported type token")
            .with_context("token", token)
    }
}

/// One column of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self { name: name.into(), data_type, nullable }
    }
}

/// The schema embedded in a file header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    pub fields: Vec<Field>,
    pub metadata: BTreeMap<String, String>,
}

// Wire mirror of the JSON shape; types stay strings here so parse errors
// carry their own codes instead of serde's.
#[derive(Serialize, Deserialize)]
struct RawSchema {
    fields: Vec<RawField>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    data_type: String,
    nullable: bool,
}

impl Schema {
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields, metadata: BTreeMap::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let raw = RawSchema {
            fields: self
                .fields
                .iter()
                .map(|f| RawField {
                    name: f.name.clone(),
                    data_type: f.data_type.token(),
                    nullable: f.nullable,
                })
                .collect(),
            metadata: self.metadata.clone(),
        };
        serde_json::to_vec(&raw).map_err(|e| {
            VegoError::new(ErrorCode::MetadataError, "schema.encode", "schema serialization failed")
                .with_source(e)
        })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: RawSchema = serde_json::from_slice(bytes).map_err(|e| {
            VegoError::new(ErrorCode::MetadataError, "schema.decode", "malformed schema JSON")
                .with_source(e)
        })?;
        let mut fields = Vec::with_capacity(raw.fields.len());
        for f in raw.fields {
            fields.push(Field {
                name: f.name,
                data_type: DataType::parse(&f.data_type)?,
                nullable: f.nullable,
            });
        }
        Ok(Self { fields, metadata: raw.metadata })
    }
}
