//! # Manifest
//!
//! The `manifest.json` document of a backup container and its regeneration
//! after a merge.
//!
//! The regenerated manifest starts from the primary's document, so device
//! name, format version and any field this crate does not model survive.
//! Everything derived from the database content is recomputed; nothing is
//! merged field by field and the inputs' hashes are ignored.

use crate::primitives::{DEFAULT_DATABASE_NAME, MERGED_NAME_PREFIX};
use crate::snapshot::Snapshot;
use crate::{SchemaVersion, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// =============================================================================
// DOCUMENT
// =============================================================================

/// Top level of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub version: i64,
    #[serde(rename = "type", default)]
    pub kind: i64,
    pub user_data_backup: UserDataBackup,
    /// Fields not modelled here, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// The `userDataBackup` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataBackup {
    #[serde(default)]
    pub last_modified_date: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default = "default_database_name")]
    pub database_name: String,
    #[serde(default)]
    pub hash: String,
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_counts: Option<BTreeMap<String, u64>>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

fn default_database_name() -> String {
    DEFAULT_DATABASE_NAME.to_string()
}

impl Manifest {
    /// Parse a manifest document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes)
            .map_err(|e| SyncError::CorruptArchive(format!("invalid manifest.json: {e}")))
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| SyncError::IoError(format!("cannot serialize manifest: {e}")))
    }

    #[must_use]
    pub fn schema_version(&self) -> SchemaVersion {
        SchemaVersion(self.user_data_backup.schema_version)
    }

    /// Name of the database entry inside the container.
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.user_data_backup.database_name
    }
}

// =============================================================================
// UPDATER
// =============================================================================

/// Lower-case hex SHA-256 of a byte string.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `merged_YYYY-MM-DD_HH-MM-SS` for the given instant.
pub fn merged_name(completed_at: OffsetDateTime) -> Result<String, SyncError> {
    let stamp = completed_at
        .format(format_description!(
            "[year]-[month]-[day]_[hour]-[minute]-[second]"
        ))
        .map_err(|e| SyncError::IoError(format!("cannot format timestamp: {e}")))?;
    Ok(format!("{MERGED_NAME_PREFIX}_{stamp}"))
}

/// Regenerates the manifest of a merged container.
pub struct ManifestUpdater;

impl ManifestUpdater {
    /// Build the merged manifest.
    ///
    /// `template` is the primary's manifest, `database` the finalized
    /// database bytes and `merged` the snapshot they were written from.
    pub fn update(
        template: &Manifest,
        database: &[u8],
        merged: &Snapshot,
        completed_at: OffsetDateTime,
    ) -> Result<Manifest, SyncError> {
        let format_err = |e: time::error::Format| {
            SyncError::IoError(format!("cannot format timestamp: {e}"))
        };

        let mut manifest = template.clone();
        manifest.name = merged_name(completed_at)?;
        manifest.creation_date = completed_at
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(format_err)?;

        let backup = &mut manifest.user_data_backup;
        backup.last_modified_date = completed_at.format(&Rfc3339).map_err(format_err)?;
        backup.hash = content_hash(database);
        backup.schema_version = merged.schema_version.0;
        backup.database_size = Some(database.len() as u64);
        backup.row_counts = Some(merged.row_counts());

        tracing::debug!(name = %manifest.name, hash = %manifest.user_data_backup.hash, "manifest regenerated");
        Ok(manifest)
    }
}

// =============================================================================
// TESTS
// =============================================================================
