//! # Key Remapping
//!
//! Per-table key maps from secondary keys to merged keys, and the
//! foreign-key rewrite that runs on every secondary row before it is
//! classified or inserted.
//!
//! A key map is filled while its table is merged and only read afterwards:
//! tables are processed in dependency order, so every map a row needs is
//! complete by the time the row is rewritten.

use crate::schema::TableSchema;
use crate::snapshot::{Row, Table};
use crate::{RowKey, SyncError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// KEY MAP
// =============================================================================

/// Secondary key → merged key for one table.
///
/// Distinct entities map to distinct merged keys. Secondary rows that are
/// duplicates of one another share the merged key of the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    entries: BTreeMap<RowKey, RowKey>,
}

impl KeyMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping. The first mapping for a secondary key is kept.
    pub fn insert(&mut self, secondary: RowKey, merged: RowKey) {
        self.entries.entry(secondary).or_insert(merged);
    }

    #[must_use]
    pub fn get(&self, secondary: RowKey) -> Option<RowKey> {
        self.entries.get(&secondary).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mappings sorted by secondary key.
    pub fn iter(&self) -> impl Iterator<Item = (RowKey, RowKey)> + '_ {
        self.entries.iter().map(|(a, b)| (*a, *b))
    }
}

// =============================================================================
// KEY MAPS
// =============================================================================

/// Every table's key map, by table name.
#[derive(Debug, Clone, Default)]
pub struct KeyMaps {
    maps: BTreeMap<String, KeyMap>,
}

impl KeyMaps {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the finished map of a table.
    pub fn finish(&mut self, table: impl Into<String>, map: KeyMap) {
        self.maps.insert(table.into(), map);
    }

    #[must_use]
    pub fn get(&self, table: &str) -> Option<&KeyMap> {
        self.maps.get(table)
    }

    /// Rewrite every foreign key of `row` through the referenced table's map.
    ///
    /// `table` is the secondary table the row comes from (for column
    /// positions and error context). NULL foreign keys are left as they are.
    pub fn rewrite(&self, schema: &TableSchema, table: &Table, row: &Row) -> Result<Row, SyncError> {
        let mut rewritten = row.clone();

        for fk in &schema.foreign_keys {
            let Some(index) = table.column_index(&fk.column) else {
                return Err(SyncError::UnsupportedSchema(format!(
                    "{} lacks column {}",
                    schema.name, fk.column
                )));
            };

            let key = match row.get(index) {
                Value::Null => continue,
                Value::Integer(k) => RowKey(*k),
                other => {
                    return Err(SyncError::UnsupportedSchema(format!(
                        "{}.{} holds {}",
                        schema.name, fk.column, other
                    )));
                }
            };

            let merged = self
                .maps
                .get(&fk.references)
                .and_then(|m| m.get(key))
                .ok_or_else(|| SyncError::UnresolvedReference {
                    table: schema.name.clone(),
                    column: fk.column.clone(),
                    references: fk.references.clone(),
                    key: key.0,
                    row: table
                        .key_of(row)
                        .map_or_else(|| "keyless row".to_string(), |k| format!("row {k}")),
                })?;

            tracing::trace!(
                table = %schema.name,
                column = %fk.column,
                from = key.0,
                to = merged.0,
                "rewrote foreign key"
            );
            rewritten.set(index, Value::Integer(merged.0));
        }

        Ok(rewritten)
    }
}

// =============================================================================
// SEQUENCES
// =============================================================================

/// Next free ordinal in `group` for a sequence column: one past the largest
/// value present, or 0 for an empty group.
#[must_use]
pub fn next_in_sequence(table: &Table, column: usize, group_by: usize, group: &Value) -> i64 {
    table
        .rows()
        .iter()
        .filter(|r| r.get(group_by) == group)
        .filter_map(|r| r.get(column).as_integer())
        .max()
        .map_or(0, |m| m.saturating_add(1))
}

// =============================================================================
// REPORT
// =============================================================================

/// What happened to one table's secondary rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    /// Rows inserted under a fresh key.
    pub inserted: u64,
    /// Rows dropped as duplicates of an existing entity.
    pub deduplicated: u64,
    /// Rows that overwrote an existing entity's fields.
    pub superseded: u64,
}

impl TableStats {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.inserted + self.deduplicated + self.superseded
    }
}

/// Per-table statistics of a finished merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub tables: BTreeMap<String, TableStats>,
}

impl MergeReport {
    #[must_use]
    pub fn inserted(&self) -> u64 {
        self.tables.values().map(|s| s.inserted).sum()
    }

    #[must_use]
    pub fn deduplicated(&self) -> u64 {
        self.tables.values().map(|s| s.deduplicated).sum()
    }

    #[must_use]
    pub fn superseded(&self) -> u64 {
        self.tables.values().map(|s| s.superseded).sum()
    }
}

// =============================================================================
// TESTS
// =============================================================================
