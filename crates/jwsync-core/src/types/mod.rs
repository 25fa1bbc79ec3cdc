//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the merge engine:
//! - Row identifiers (`RowKey`) and schema versions (`SchemaVersion`)
//! - Cell values (`Value`) with a total order so they can form identity keys
//! - Error types (`SyncError`, `ErrorKind`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module implement `Ord` so that every collection keyed
//! by them (`BTreeMap`/`BTreeSet`) iterates in a stable order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Surrogate key of a row: the integer primary key assigned by the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey(pub i64);

impl RowKey {
    /// The key immediately after this one, or `None` at `i64::MAX`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(k) => Some(Self(k)),
            None => None,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Schema version declared by a backup's manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(pub u32);

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// A single cell value, mirroring SQLite's storage classes.
///
/// `Value` is totally ordered: variants order by storage class
/// (`Null < Integer < Real < Text < Blob`), reals by IEEE total ordering.
/// `Text` and `RawText` share the TEXT class and compare by their bytes.
/// `Null` equals `Null`, which is what identity matching needs
/// (two rows with a NULL `DocumentId` denote the same location).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    /// TEXT cell whose bytes are not valid UTF-8, kept as stored.
    RawText(Vec<u8>),
    Blob(Vec<u8>),
}

impl Value {
    /// Create a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The integer payload, if this is an integer.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The text payload, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Create a text value from stored bytes, keeping them exact.
    #[must_use]
    pub fn text_from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(s) => Self::Text(s.to_string()),
            Err(_) => Self::RawText(bytes.to_vec()),
        }
    }

    /// The bytes of a TEXT cell, whether or not they are valid UTF-8.
    #[must_use]
    pub fn text_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(s) => Some(s.as_bytes()),
            Self::RawText(b) => Some(b),
            _ => None,
        }
    }

    const fn class_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Integer(_) => 1,
            Self::Real(_) => 2,
            Self::Text(_) | Self::RawText(_) => 3,
            Self::Blob(_) => 4,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Real(a), Self::Real(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Blob(a), Self::Blob(b)) => a.cmp(b),
            _ => match (self.text_bytes(), other.text_bytes()) {
                (Some(a), Some(b)) => a.cmp(b),
                _ => self.class_rank().cmp(&other.class_rank()),
            },
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Option<i64>> for Value {
    fn from(i: Option<i64>) -> Self {
        i.map_or(Self::Null, Self::Integer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::RawText(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while merging two backups.
///
/// Every variant is fatal to the merge in progress. None is retried:
/// the merge is a deterministic transform, so a retry on the same inputs
/// would fail the same way.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The container cannot be decompressed or lacks an expected entry.
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// The declared schema version is outside the supported range,
    /// or the two inputs disagree on it.
    #[error("Unsupported schema: {0}")]
    UnsupportedSchema(String),

    /// A table required by the catalog is absent.
    #[error("Missing table: {0}")]
    MissingTable(String),

    /// A foreign key has no entry in the referenced table's key map.
    #[error(
        "Unresolved reference: {table}.{column} = {key} in {row} has no counterpart in {references}"
    )]
    UnresolvedReference {
        table: String,
        column: String,
        references: String,
        key: i64,
        row: String,
    },

    /// The table dependency graph is not acyclic.
    #[error("Cyclic schema: dependency cycle among {}", .0.join(", "))]
    CyclicSchema(Vec<String>),

    /// More than one merged row shares the identity key of a secondary row.
    #[error("Identity ambiguity in {table}: {row} matches {} existing rows", .candidates.len())]
    IdentityAmbiguity {
        table: String,
        row: String,
        candidates: Vec<String>,
    },

    /// A table needs a new surrogate key but its largest key is `i64::MAX`.
    #[error("Key space exhausted: {0} has no key left above {max}", max = i64::MAX)]
    KeySpaceExhausted(String),

    /// The configuration file or an override is malformed or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A SQLite operation on the scratch output failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl SyncError {
    /// The discriminant reported to callers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CorruptArchive(_) => ErrorKind::CorruptArchive,
            Self::UnsupportedSchema(_) => ErrorKind::UnsupportedSchema,
            Self::MissingTable(_) => ErrorKind::MissingTable,
            Self::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            Self::CyclicSchema(_) => ErrorKind::CyclicSchema,
            Self::IdentityAmbiguity { .. } => ErrorKind::IdentityAmbiguity,
            Self::KeySpaceExhausted(_) => ErrorKind::KeySpaceExhausted,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Database(_) => ErrorKind::Database,
            Self::IoError(_) => ErrorKind::Io,
        }
    }
}

/// Discriminant of a [`SyncError`], stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CorruptArchive,
    UnsupportedSchema,
    MissingTable,
    UnresolvedReference,
    CyclicSchema,
    IdentityAmbiguity,
    KeySpaceExhausted,
    InvalidConfig,
    Database,
    Io,
}

impl ErrorKind {
    /// Stable snake_case name used in CLI and HTTP output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CorruptArchive => "corrupt_archive",
            Self::UnsupportedSchema => "unsupported_schema",
            Self::MissingTable => "missing_table",
            Self::UnresolvedReference => "unresolved_reference",
            Self::CyclicSchema => "cyclic_schema",
            Self::IdentityAmbiguity => "identity_ambiguity",
            Self::KeySpaceExhausted => "key_space_exhausted",
            Self::InvalidConfig => "invalid_config",
            Self::Database => "database",
            Self::Io => "io",
        }
    }

    /// Whether the failure is caused by the caller's inputs rather than by the host.
    #[must_use]
    pub const fn is_input_error(self) -> bool {
        !matches!(self, Self::InvalidConfig | Self::Database | Self::Io)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TESTS
// =============================================================================
