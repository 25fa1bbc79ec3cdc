//! # Merge Orchestrator
//!
//! Sequences validation, identity resolution, key remapping, database
//! rendering and manifest regeneration for one merge of two backups.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Validating → (Resolving → Remapping)* → Finalizing → Done
//!            └──────────────┴──────────┴─────────────┴──→ Failed
//! ```
//!
//! Per table, `Resolving` rewrites the secondary rows' foreign keys and
//! indexes the merged table by identity; `Remapping` classifies each row,
//! allocates keys and applies the outcome. The merged snapshot is a private
//! clone of the primary: a failure anywhere drops it and no output exists.
//!
//! ## Determinism
//!
//! The completion time is an input. Given the same containers, options and
//! time, [`Merger::merge_containers`] returns byte-identical output.

use crate::archive::{self, Unpacked};
use crate::identity::{ConflictPolicy, IdentityResolver, Resolution};
use crate::manifest::{Manifest, ManifestUpdater};
use crate::primitives::{ARCHIVE_EXTENSION, MAX_SUPPORTED_SCHEMA_VERSION, MIN_SUPPORTED_SCHEMA_VERSION};
use crate::remap::{KeyMap, KeyMaps, MergeReport, TableStats, next_in_sequence};
use crate::schema::{Schema, TableSchema};
use crate::snapshot::{Row, Snapshot};
use crate::storage::render_database;
use crate::validator::SchemaValidator;
use crate::{ErrorKind, SyncError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// =============================================================================
// OPTIONS
// =============================================================================

/// Tunables of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub policy: ConflictPolicy,
    pub min_schema_version: u32,
    pub max_schema_version: u32,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            policy: ConflictPolicy::default(),
            min_schema_version: MIN_SUPPORTED_SCHEMA_VERSION,
            max_schema_version: MAX_SUPPORTED_SCHEMA_VERSION,
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Where a merge is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum MergeState {
    Idle,
    Validating,
    Resolving(String),
    Remapping(String),
    Finalizing,
    Done,
    Failed(ErrorKind),
}

impl MergeState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

/// Result of a successful container merge.
#[derive(Debug)]
pub struct MergeOutcome {
    /// The merged `.jwlibrary` container.
    pub container: Vec<u8>,
    /// Its manifest.
    pub manifest: Manifest,
    /// Suggested file name, `<manifest name>.jwlibrary`.
    pub file_name: String,
    pub report: MergeReport,
}

// =============================================================================
// MERGER
// =============================================================================

/// Runs merges against one catalog.
///
/// A merger is reusable: each merge restarts from `Idle` and the history of
/// the latest merge stays observable until the next one starts.
#[derive(Debug)]
pub struct Merger<'a> {
    schema: &'a Schema,
    options: MergeOptions,
    state: MergeState,
    history: Vec<MergeState>,
}

impl<'a> Merger<'a> {
    #[must_use]
    pub fn new(schema: &'a Schema, options: MergeOptions) -> Self {
        Self {
            schema,
            options,
            state: MergeState::Idle,
            history: vec![MergeState::Idle],
        }
    }

    #[must_use]
    pub fn state(&self) -> &MergeState {
        &self.state
    }

    /// Every state the latest merge passed through, in order.
    #[must_use]
    pub fn history(&self) -> &[MergeState] {
        &self.history
    }

    fn enter(&mut self, next: MergeState) {
        tracing::trace!(from = ?self.state, to = ?next, "merge state");
        self.state = next.clone();
        self.history.push(next);
    }

    fn reset(&mut self) {
        self.state = MergeState::Idle;
        self.history = vec![MergeState::Idle];
    }

    fn fail<T>(&mut self, result: Result<T, SyncError>) -> Result<T, SyncError> {
        if let Err(e) = &result {
            tracing::warn!(kind = %e.kind(), error = %e, "merge failed");
            self.enter(MergeState::Failed(e.kind()));
        }
        result
    }

    /// Merge two containers into a new one.
    pub fn merge_containers(
        &mut self,
        primary: &[u8],
        secondary: &[u8],
        completed_at: OffsetDateTime,
    ) -> Result<MergeOutcome, SyncError> {
        self.reset();
        let result = self.run_containers(primary, secondary, completed_at);
        self.fail(result)
    }

    /// Merge two in-memory snapshots.
    ///
    /// Returns the merged snapshot and the report. Nothing is rendered.
    pub fn merge_snapshots(
        &mut self,
        primary: &Snapshot,
        secondary: &Snapshot,
    ) -> Result<(Snapshot, MergeReport), SyncError> {
        self.reset();
        let result = self.run_snapshots(primary, secondary).map(|merged| {
            self.enter(MergeState::Done);
            merged
        });
        self.fail(result)
    }

    fn run_containers(
        &mut self,
        primary: &[u8],
        secondary: &[u8],
        completed_at: OffsetDateTime,
    ) -> Result<MergeOutcome, SyncError> {
        self.enter(MergeState::Validating);
        let primary = archive::unpack(primary, self.schema)?;
        let secondary = archive::unpack(secondary, self.schema)?;

        let (merged, report) = self.run_snapshots(&primary.snapshot, &secondary.snapshot)?;

        self.enter(MergeState::Finalizing);
        let outcome = self.finalize(&primary, &secondary, &merged, report, completed_at)?;

        self.enter(MergeState::Done);
        tracing::info!(
            file = %outcome.file_name,
            inserted = outcome.report.inserted(),
            deduplicated = outcome.report.deduplicated(),
            superseded = outcome.report.superseded(),
            "merge complete"
        );
        Ok(outcome)
    }

    fn run_snapshots(
        &mut self,
        primary: &Snapshot,
        secondary: &Snapshot,
    ) -> Result<(Snapshot, MergeReport), SyncError> {
        if self.state != MergeState::Validating {
            self.enter(MergeState::Validating);
        }
        let order = self.schema.merge_order()?;
        let validator = SchemaValidator::new(
            self.schema,
            self.options.min_schema_version..=self.options.max_schema_version,
        );
        let version = validator.validate_pair(primary, secondary)?;
        tracing::info!(
            schema_version = %version,
            tables = order.len(),
            primary_rows = primary.total_rows(),
            secondary_rows = secondary.total_rows(),
            "inputs validated"
        );

        let mut merged = primary.clone();
        let mut maps = KeyMaps::new();
        let mut report = MergeReport::default();

        for table in order {
            let stats = self.merge_table(table, secondary, &mut merged, &mut maps)?;
            tracing::debug!(
                table = %table.name,
                inserted = stats.inserted,
                deduplicated = stats.deduplicated,
                superseded = stats.superseded,
                "table merged"
            );
            report.tables.insert(table.name.clone(), stats);
        }

        Ok((merged, report))
    }

    fn merge_table(
        &mut self,
        schema: &TableSchema,
        secondary: &Snapshot,
        merged: &mut Snapshot,
        maps: &mut KeyMaps,
    ) -> Result<TableStats, SyncError> {
        let name = schema.name.as_str();
        let source = secondary
            .table(name)
            .ok_or_else(|| SyncError::MissingTable(name.to_string()))?;
        let target = merged
            .table_mut(name)
            .ok_or_else(|| SyncError::MissingTable(name.to_string()))?;

        self.enter(MergeState::Resolving(name.to_string()));
        let rewritten = source
            .rows()
            .iter()
            .map(|row| maps.rewrite(schema, source, row))
            .collect::<Result<Vec<Row>, SyncError>>()?;
        let mut resolver = IdentityResolver::build(schema, target, self.options.policy)?;

        self.enter(MergeState::Remapping(name.to_string()));
        let sequence = match &schema.sequence {
            Some(seq) => Some((
                column_of(target.column_index(&seq.column), name, &seq.column)?,
                column_of(target.column_index(&seq.group_by), name, &seq.group_by)?,
            )),
            None => None,
        };
        let mut next_ordinal: BTreeMap<Value, i64> = BTreeMap::new();
        let mut map = KeyMap::new();
        let mut stats = TableStats::default();

        for (original, mut row) in source.rows().iter().zip(rewritten) {
            let secondary_key = source.key_of(original);

            let merged_key = match resolver.classify(target, &row)? {
                Resolution::New => {
                    let key = match target.key_column() {
                        Some(k) => {
                            let key = target.allocate_key()?;
                            row.set(k, Value::Integer(key.0));
                            Some(key)
                        }
                        None => None,
                    };
                    if let Some((column, group_by)) = sequence {
                        let group = row.get(group_by).clone();
                        let ordinal = match next_ordinal.get(&group) {
                            Some(n) => *n,
                            None => next_in_sequence(target, column, group_by, &group),
                        };
                        row.set(column, Value::Integer(ordinal));
                        next_ordinal.insert(group, ordinal.saturating_add(1));
                    }

                    let position = target.insert(row.clone())?;
                    resolver.record(position, &row);
                    stats.inserted += 1;
                    key
                }
                Resolution::Duplicate(position) => {
                    stats.deduplicated += 1;
                    target.row_at(position).and_then(|r| target.key_of(r))
                }
                Resolution::Supersede(position) => {
                    target.overwrite(position, &row);
                    stats.superseded += 1;
                    target.row_at(position).and_then(|r| target.key_of(r))
                }
            };

            if let (Some(from), Some(to)) = (secondary_key, merged_key) {
                tracing::trace!(table = %name, from = from.0, to = to.0, "mapped key");
                map.insert(from, to);
            }
        }

        maps.finish(name, map);
        Ok(stats)
    }

    fn finalize(
        &self,
        primary: &Unpacked,
        secondary: &Unpacked,
        merged: &Snapshot,
        report: MergeReport,
        completed_at: OffsetDateTime,
    ) -> Result<MergeOutcome, SyncError> {
        let stamp = completed_at
            .format(&Rfc3339)
            .map_err(|e| SyncError::IoError(format!("cannot format timestamp: {e}")))?;

        let scratch = tempfile::tempdir().map_err(|e| SyncError::IoError(e.to_string()))?;
        let database = render_database(&primary.database, merged, self.schema, &stamp, scratch.path())?;

        let manifest = ManifestUpdater::update(&primary.manifest, &database, merged, completed_at)?;
        let attachments = archive::merge_attachments(&primary.attachments, &secondary.attachments);
        let container = archive::pack(&manifest, &database, &attachments)?;
        let file_name = format!("{}.{}", manifest.name, ARCHIVE_EXTENSION);

        Ok(MergeOutcome {
            container,
            manifest,
            file_name,
            report,
        })
    }
}

fn column_of(index: Option<usize>, table: &str, column: &str) -> Result<usize, SyncError> {
    index.ok_or_else(|| SyncError::UnsupportedSchema(format!("{table} lacks column {column}")))
}

/// Merge two containers with the built-in catalog.
pub fn merge(
    primary: &[u8],
    secondary: &[u8],
    options: MergeOptions,
    completed_at: OffsetDateTime,
) -> Result<MergeOutcome, SyncError> {
    let schema = crate::schema::jw_library::catalog();
    Merger::new(&schema, options).merge_containers(primary, secondary, completed_at)
}

// =============================================================================
// TESTS
// =============================================================================
