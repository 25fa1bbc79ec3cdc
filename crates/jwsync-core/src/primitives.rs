//! # Fixed Constants
//!
//! Names, limits and version bounds compiled into the engine.
//! Runtime configuration (see `MergeOptions`) may narrow the schema range
//! but the container layout below is fixed by the backup format.

/// Name of the manifest entry inside a backup container.
pub const MANIFEST_ENTRY_NAME: &str = "manifest.json";

/// Database entry name used when a manifest does not name one.
pub const DEFAULT_DATABASE_NAME: &str = "userData.db";

/// File extension of backup containers (without the dot).
pub const ARCHIVE_EXTENSION: &str = "jwlibrary";

/// Prefix of the regenerated manifest name and output file.
pub const MERGED_NAME_PREFIX: &str = "merged";

/// Oldest userData schema version the built-in catalog understands.
pub const MIN_SUPPORTED_SCHEMA_VERSION: u32 = 11;

/// Newest userData schema version the built-in catalog understands.
pub const MAX_SUPPORTED_SCHEMA_VERSION: u32 = 14;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a compressed container (100 MiB).
///
/// Checked before the archive is opened.
pub const MAX_CONTAINER_SIZE: usize = 100 * 1024 * 1024;

/// Maximum decompressed size of a single container entry (512 MiB).
///
/// Checked against the entry header and again while inflating.
pub const MAX_ENTRY_SIZE: u64 = 512 * 1024 * 1024;

/// Maximum decompressed size of all entries of a container together (768 MiB).
pub const MAX_TOTAL_INFLATED: u64 = 768 * 1024 * 1024;

/// Maximum number of entries in a container.
pub const MAX_ENTRY_COUNT: usize = 10_000;
