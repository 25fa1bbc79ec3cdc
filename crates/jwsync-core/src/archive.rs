//! # Archive Codec
//!
//! Reads and writes `.jwlibrary` containers: a ZIP archive holding
//! `manifest.json`, the SQLite database named by the manifest and any number
//! of attachment files.
//!
//! ## Determinism
//!
//! [`pack`] writes entries in a fixed order (manifest, database, attachments
//! sorted by name) with a fixed timestamp and permissions, so identical
//! inputs produce identical bytes.
//!
//! ## Limits
//!
//! Containers over [`MAX_CONTAINER_SIZE`] or with more than
//! [`MAX_ENTRY_COUNT`] entries are rejected before anything is decompressed.
//! Inflation is then bounded while it runs: an entry may not exceed
//! [`MAX_ENTRY_SIZE`] and all entries together may not exceed
//! [`MAX_TOTAL_INFLATED`], whatever sizes the ZIP headers claim.

use crate::manifest::{Manifest, content_hash};
use crate::primitives::{
    MANIFEST_ENTRY_NAME, MAX_CONTAINER_SIZE, MAX_ENTRY_COUNT, MAX_ENTRY_SIZE, MAX_TOTAL_INFLATED,
};
use crate::schema::Schema;
use crate::snapshot::Snapshot;
use crate::storage::load_database;
use crate::validator::reconcile_version;
use crate::SyncError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// An unpacked container.
#[derive(Debug)]
pub struct Unpacked {
    pub snapshot: Snapshot,
    pub manifest: Manifest,
    /// Raw bytes of the database entry.
    pub database: Vec<u8>,
    /// Every other entry, by name.
    pub attachments: BTreeMap<String, Vec<u8>>,
}

fn corrupt(context: &str) -> impl Fn(zip::result::ZipError) -> SyncError + '_ {
    move |e| SyncError::CorruptArchive(format!("{context}: {e}"))
}

// =============================================================================
// READ
// =============================================================================

/// Upper bound on the buffer reserved from an entry's declared size.
const PREALLOCATION_CAP: u64 = 1024 * 1024;

/// Read every file entry of a container into memory.
fn read_entries(container: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, SyncError> {
    read_entries_within(container, MAX_TOTAL_INFLATED)
}

/// [`read_entries`] with an explicit budget for the total inflated size.
fn read_entries_within(
    container: &[u8],
    total_budget: u64,
) -> Result<BTreeMap<String, Vec<u8>>, SyncError> {
    if container.len() > MAX_CONTAINER_SIZE {
        return Err(SyncError::CorruptArchive(format!(
            "container is {} bytes, limit is {}",
            container.len(),
            MAX_CONTAINER_SIZE
        )));
    }

    let mut archive = ZipArchive::new(Cursor::new(container)).map_err(corrupt("not a zip archive"))?;
    if archive.len() > MAX_ENTRY_COUNT {
        return Err(SyncError::CorruptArchive(format!(
            "container holds {} entries, limit is {}",
            archive.len(),
            MAX_ENTRY_COUNT
        )));
    }

    let mut entries = BTreeMap::new();
    let mut inflated: u64 = 0;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(corrupt("unreadable entry"))?;
        if file.is_dir() {
            continue;
        }
        if file.size() > MAX_ENTRY_SIZE {
            return Err(SyncError::CorruptArchive(format!(
                "entry {} is {} bytes, limit is {}",
                file.name(),
                file.size(),
                MAX_ENTRY_SIZE
            )));
        }

        let name = file.name().to_string();
        let remaining = total_budget.saturating_sub(inflated);
        let limit = MAX_ENTRY_SIZE.min(remaining);
        let mut bytes = Vec::with_capacity(file.size().min(PREALLOCATION_CAP) as usize);
        file.by_ref()
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| SyncError::CorruptArchive(format!("cannot inflate {name}: {e}")))?;

        let size = bytes.len() as u64;
        if size > limit {
            return Err(SyncError::CorruptArchive(if limit < MAX_ENTRY_SIZE {
                format!("inflated entries exceed {total_budget} bytes at {name}")
            } else {
                format!("entry {name} inflates past {MAX_ENTRY_SIZE} bytes")
            }));
        }
        inflated += size;
        entries.insert(name, bytes);
    }

    Ok(entries)
}

/// Split entries into manifest, database bytes and attachments.
fn split_entries(
    mut entries: BTreeMap<String, Vec<u8>>,
) -> Result<(Manifest, Vec<u8>, BTreeMap<String, Vec<u8>>), SyncError> {
    let manifest_bytes = entries
        .remove(MANIFEST_ENTRY_NAME)
        .ok_or_else(|| SyncError::CorruptArchive(format!("missing {MANIFEST_ENTRY_NAME}")))?;
    let manifest = Manifest::from_json(&manifest_bytes)?;

    let database = entries.remove(manifest.database_name()).ok_or_else(|| {
        SyncError::CorruptArchive(format!("missing database entry {}", manifest.database_name()))
    })?;

    Ok((manifest, database, entries))
}

/// Unpack a container and load its catalog tables.
///
/// The database is loaded from a scratch copy in a temporary directory that
/// is removed on every exit path.
pub fn unpack(container: &[u8], schema: &Schema) -> Result<Unpacked, SyncError> {
    let (manifest, database, attachments) = split_entries(read_entries(container)?)?;

    let scratch = tempfile::tempdir().map_err(|e| SyncError::IoError(e.to_string()))?;
    let path = scratch.path().join("input.db");
    std::fs::write(&path, &database).map_err(|e| SyncError::IoError(e.to_string()))?;

    let loaded = load_database(&path, schema).map_err(|e| match e {
        SyncError::Database(msg) => SyncError::CorruptArchive(format!("unreadable database: {msg}")),
        other => other,
    })?;

    let version = reconcile_version(manifest.user_data_backup.schema_version, loaded.user_version)?;
    let mut snapshot = Snapshot::new(version);
    for table in loaded.tables {
        snapshot.insert_table(table);
    }

    tracing::debug!(
        schema_version = %version,
        rows = snapshot.total_rows(),
        attachments = attachments.len(),
        "unpacked container"
    );

    Ok(Unpacked {
        snapshot,
        manifest,
        database,
        attachments,
    })
}

/// Whether the stored manifest hash matches the database entry.
pub fn verify(container: &[u8]) -> Result<bool, SyncError> {
    let (manifest, database, _) = split_entries(read_entries(container)?)?;
    Ok(manifest.user_data_backup.hash.eq_ignore_ascii_case(&content_hash(&database)))
}

// =============================================================================
// INSPECT
// =============================================================================

/// Summary of a container for display.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub name: String,
    pub device_name: String,
    pub last_modified: String,
    pub schema_version: u32,
    pub database_name: String,
    pub database_size: u64,
    pub hash_valid: bool,
    pub row_counts: BTreeMap<String, u64>,
    pub attachments: Vec<String>,
}

/// Unpack a container and summarise it.
pub fn inspect(container: &[u8], schema: &Schema) -> Result<Inspection, SyncError> {
    let unpacked = unpack(container, schema)?;
    let backup = &unpacked.manifest.user_data_backup;

    Ok(Inspection {
        name: unpacked.manifest.name.clone(),
        device_name: backup.device_name.clone(),
        last_modified: backup.last_modified_date.clone(),
        schema_version: unpacked.snapshot.schema_version.0,
        database_name: backup.database_name.clone(),
        database_size: unpacked.database.len() as u64,
        hash_valid: backup.hash.eq_ignore_ascii_case(&content_hash(&unpacked.database)),
        row_counts: unpacked.snapshot.row_counts(),
        attachments: unpacked.attachments.keys().cloned().collect(),
    })
}

// =============================================================================
// WRITE
// =============================================================================

/// Write a container.
///
/// The manifest is written as given; its hash must already describe
/// `database`.
pub fn pack(
    manifest: &Manifest,
    database: &[u8],
    attachments: &BTreeMap<String, Vec<u8>>,
) -> Result<Vec<u8>, SyncError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let io = |e: std::io::Error| SyncError::IoError(format!("cannot write container: {e}"));
    let zip_err = |e: zip::result::ZipError| SyncError::IoError(format!("cannot write container: {e}"));

    zip.start_file(MANIFEST_ENTRY_NAME, options).map_err(zip_err)?;
    zip.write_all(&manifest.to_json()?).map_err(io)?;

    zip.start_file(manifest.database_name(), options).map_err(zip_err)?;
    zip.write_all(database).map_err(io)?;

    for (name, bytes) in attachments {
        if name == MANIFEST_ENTRY_NAME || name == manifest.database_name() {
            continue;
        }
        zip.start_file(name.as_str(), options).map_err(zip_err)?;
        zip.write_all(bytes).map_err(io)?;
    }

    let cursor = zip.finish().map_err(zip_err)?;
    Ok(cursor.into_inner())
}

/// Union of two attachment sets; the primary's entry wins on a name clash.
#[must_use]
pub fn merge_attachments(
    primary: &BTreeMap<String, Vec<u8>>,
    secondary: &BTreeMap<String, Vec<u8>>,
) -> BTreeMap<String, Vec<u8>> {
    let mut merged = primary.clone();
    for (name, bytes) in secondary {
        match merged.get(name) {
            Some(existing) if existing != bytes => {
                tracing::warn!(entry = %name, "attachment differs between backups, keeping primary");
            }
            Some(_) => {}
            None => {
                merged.insert(name.clone(), bytes.clone());
            }
        }
    }
    merged
}

// =============================================================================
// TESTS
// =============================================================================
