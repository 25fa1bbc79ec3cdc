//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, MergeSummary};
use crate::config::AppConfig;
use jwsync_core::{
    Inspection, MergeReport, SyncError, inspect, merge, primitives::MAX_CONTAINER_SIZE,
    schema::jw_library::catalog, verify,
};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

// =============================================================================
// FILE VALIDATION
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), SyncError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| SyncError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(SyncError::CorruptArchive(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, SyncError> {
    let canonical = path.canonicalize().map_err(|e| {
        SyncError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(SyncError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path, which must be a directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, SyncError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        SyncError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(SyncError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| SyncError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read a container from disk, refusing oversized files.
pub fn read_container(path: &Path) -> Result<Vec<u8>, SyncError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_CONTAINER_SIZE as u64)?;
    std::fs::read(&validated)
        .map_err(|e| SyncError::IoError(format!("Read '{}': {}", path.display(), e)))
}

/// Where `merge` writes: `output` itself, `output/<file_name>` when it is a
/// directory, or `./<file_name>` when absent.
pub fn resolve_output(output: Option<&Path>, file_name: &str) -> Result<PathBuf, SyncError> {
    match output {
        Some(dir) if dir.is_dir() => validate_output_path(&dir.join(file_name)),
        Some(path) => validate_output_path(path),
        None => validate_output_path(Path::new(file_name)),
    }
}

/// Write through a sibling `.part` file so a failed write never leaves a
/// truncated container at `path`.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".part");
    let staging = PathBuf::from(staging);

    std::fs::write(&staging, bytes)
        .map_err(|e| SyncError::IoError(format!("Write '{}': {}", staging.display(), e)))?;

    std::fs::rename(&staging, path).map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        SyncError::IoError(format!("Move into '{}': {}", path.display(), e))
    })
}

// =============================================================================
// MERGE COMMAND
// =============================================================================

/// Merge two backups and write the result.
pub fn cmd_merge(
    config: &AppConfig,
    primary: &Path,
    secondary: &Path,
    output: Option<&Path>,
    json_mode: bool,
) -> Result<(), SyncError> {
    let primary_bytes = read_container(primary)?;
    let secondary_bytes = read_container(secondary)?;

    let outcome = merge(
        &primary_bytes,
        &secondary_bytes,
        config.merge,
        OffsetDateTime::now_utc(),
    )?;

    let destination = resolve_output(output, &outcome.file_name)?;
    write_atomically(&destination, &outcome.container)?;

    let summary = MergeSummary::from_outcome(&outcome);

    if json_mode {
        let mut value = serde_json::to_value(&summary).unwrap_or_default();
        if let Some(object) = value.as_object_mut() {
            object.insert(
                "path".to_string(),
                serde_json::Value::String(destination.to_string_lossy().into_owned()),
            );
        }
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return Ok(());
    }

    println!("Merged backup written to {}", destination.display());
    println!();
    println!("Name:    {}", summary.name);
    println!("Schema:  {}", summary.schema_version);
    println!("Size:    {} bytes", summary.size);
    println!("SHA-256: {}", summary.hash);
    println!();
    print_report(&summary.report);

    Ok(())
}

fn print_report(report: &MergeReport) {
    println!(
        "{:<16} {:>10} {:>13} {:>11}",
        "Table", "Inserted", "Deduplicated", "Superseded"
    );
    for (table, stats) in &report.tables {
        println!(
            "{:<16} {:>10} {:>13} {:>11}",
            table, stats.inserted, stats.deduplicated, stats.superseded
        );
    }
    println!(
        "{:<16} {:>10} {:>13} {:>11}",
        "Total",
        report.inserted(),
        report.deduplicated(),
        report.superseded()
    );
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// Show a backup's manifest summary and row counts.
pub fn cmd_inspect(file: &Path, json_mode: bool) -> Result<(), SyncError> {
    let container = read_container(file)?;
    let inspection = inspect(&container, &catalog())?;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&inspection).unwrap_or_default()
        );
        return Ok(());
    }

    print_inspection(&inspection);
    Ok(())
}

fn print_inspection(inspection: &Inspection) {
    println!("Backup {}", inspection.name);
    println!("==================");
    println!("Device:        {}", inspection.device_name);
    println!("Last modified: {}", inspection.last_modified);
    println!("Schema:        {}", inspection.schema_version);
    println!(
        "Database:      {} ({} bytes)",
        inspection.database_name, inspection.database_size
    );
    println!(
        "Hash:          {}",
        if inspection.hash_valid { "valid" } else { "MISMATCH" }
    );
    println!();
    println!("Rows:");
    for (table, count) in &inspection.row_counts {
        println!("  {:<16} {}", table, count);
    }
    if !inspection.attachments.is_empty() {
        println!();
        println!("Attachments:");
        for name in &inspection.attachments {
            println!("  {}", name);
        }
    }
}

// =============================================================================
// VERIFY COMMAND
// =============================================================================

/// Check a backup's stored hash. Returns whether it matches.
pub fn cmd_verify(file: &Path, json_mode: bool) -> Result<bool, SyncError> {
    let container = read_container(file)?;
    let valid = verify(&container)?;

    if json_mode {
        let output = serde_json::json!({
            "file": file.to_string_lossy(),
            "valid": valid,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else if valid {
        println!("OK: {} hash matches its database", file.display());
    } else {
        println!("MISMATCH: {} hash does not match its database", file.display());
    }

    Ok(valid)
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), SyncError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);

    println!("jwsync Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:  {}", addr);
    println!("  Policy:   {:?}", config.merge.policy);
    println!(
        "  Schemas:  {}..={}",
        config.merge.min_schema_version, config.merge.max_schema_version
    );
    println!("  Upload:   {} bytes max", config.server.max_upload_bytes);
    println!();
    println!("Endpoints:");
    println!("  GET  /health  - Health check");
    println!("  POST /merge   - Merge two backups (multipart: primary, secondary)");
    println!("  POST /inspect - Summarise a backup (multipart: file)");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&addr, config).await
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_an_io_error() {
        let err = read_container(Path::new("/definitely/not/here.jwlibrary")).unwrap_err();
        assert!(matches!(err, SyncError::IoError(_)));
    }

    #[test]
    fn directory_output_gets_the_merged_name() {
        let dir = std::env::temp_dir();
        let path = resolve_output(Some(&dir), "merged_2024-01-01_00-00-00.jwlibrary").unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("merged_2024-01-01_00-00-00.jwlibrary")
        );
        assert_eq!(path.parent(), Some(dir.canonicalize().unwrap().as_path()));
    }

    #[test]
    fn file_output_is_kept() {
        let dir = std::env::temp_dir();
        let path = resolve_output(Some(&dir.join("out.jwlibrary")), "ignored.jwlibrary").unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("out.jwlibrary")
        );
    }

    #[test]
    fn output_in_missing_directory_is_rejected() {
        let path = Path::new("/definitely/not/here/out.jwlibrary");
        assert!(resolve_output(Some(path), "x.jwlibrary").is_err());
    }
}
