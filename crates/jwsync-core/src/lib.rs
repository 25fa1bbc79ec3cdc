//! # jwsync-core
//!
//! The deterministic merge engine for jwsync - THE LOGIC.
//!
//! This crate merges two JW Library backups (`.jwlibrary` containers) into
//! one, preserving referential integrity: colliding keys that denote
//! different entities are renumbered, rows that denote the same entity are
//! deduplicated, and every foreign key is rewritten through per-table key
//! maps in dependency order.
//!
//! ## Layers
//!
//! - `types`, `schema`, `snapshot`: data model and table catalog
//! - `validator`, `identity`, `remap`, `merge`, `manifest`: engine
//! - `storage` (SQLite) and `archive` (ZIP): adapters
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies
//! - Deterministic: `BTreeMap` only, explicit completion time
//! - Inputs are never mutated; the merged snapshot is owned by one merge
//! - The catalog is data: no table is special-cased by name in the engine

// =============================================================================
// MODULES
// =============================================================================

pub mod archive;
pub mod identity;
pub mod manifest;
pub mod merge;
pub mod primitives;
pub mod remap;
pub mod schema;
pub mod snapshot;
pub mod storage;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{ErrorKind, RowKey, SchemaVersion, SyncError, Value};

// =============================================================================
// RE-EXPORTS: Merge Engine
// =============================================================================

pub use archive::{Inspection, Unpacked, inspect, pack, unpack, verify};
pub use identity::{ConflictPolicy, IdentityKey, IdentityResolver, Resolution};
pub use manifest::{Manifest, ManifestUpdater, UserDataBackup, content_hash};
pub use merge::{MergeOptions, MergeOutcome, MergeState, Merger, merge};
pub use remap::{KeyMap, KeyMaps, MergeReport, TableStats};
pub use schema::{Schema, TableSchema};
pub use snapshot::{Row, Snapshot, Table};
pub use validator::SchemaValidator;
