//! # Snapshots
//!
//! In-memory image of a backup database: named tables of rows.
//!
//! - Input snapshots are read-only once loaded.
//! - The merged snapshot is a clone of the primary, owned by one merge and
//!   mutated only through [`Table::insert`] and [`Table::overwrite`].
//!
//! Rows are positional: `row.values[i]` belongs to `table.columns()[i]`.
//! The column list comes from the database and is validated against the
//! declared [`TableSchema`](crate::schema::TableSchema) at load time.

use crate::{RowKey, SchemaVersion, SyncError, Value};
use std::collections::BTreeMap;

// =============================================================================
// ROW
// =============================================================================

/// One row: values in table column order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// The value at a column position, `Null` when out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }

    /// Replace the value at a column position.
    pub fn set(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }
}

// =============================================================================
// TABLE
// =============================================================================

/// A table: column names, rows, and (for keyed tables) a key index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    key_column: Option<usize>,
    rows: Vec<Row>,
    key_index: BTreeMap<RowKey, usize>,
    /// Next key to hand out; never decreases.
    next_key: Option<RowKey>,
}

impl Table {
    /// Create an empty table.
    ///
    /// `key` names the integer surrogate key column, if any. It must be one
    /// of `columns`.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        key: Option<&str>,
    ) -> Result<Self, SyncError> {
        let name = name.into();
        let key_column = match key {
            Some(k) => Some(columns.iter().position(|c| c == k).ok_or_else(|| {
                SyncError::UnsupportedSchema(format!("{name} has no key column {k}"))
            })?),
            None => None,
        };

        Ok(Self {
            name,
            columns,
            key_column,
            rows: Vec::new(),
            key_index: BTreeMap::new(),
            next_key: Some(RowKey(1)),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Position of the surrogate key column.
    #[must_use]
    pub fn key_column(&self) -> Option<usize> {
        self.key_column
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn row_at(&self, position: usize) -> Option<&Row> {
        self.rows.get(position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Surrogate key of a row of this table.
    #[must_use]
    pub fn key_of(&self, row: &Row) -> Option<RowKey> {
        self.key_column
            .and_then(|i| row.get(i).as_integer())
            .map(RowKey)
    }

    #[must_use]
    pub fn contains_key(&self, key: RowKey) -> bool {
        self.key_index.contains_key(&key)
    }

    /// Look up a row by surrogate key.
    #[must_use]
    pub fn get(&self, key: RowKey) -> Option<&Row> {
        self.key_index.get(&key).and_then(|&i| self.rows.get(i))
    }

    /// Largest key currently present.
    #[must_use]
    pub fn max_key(&self) -> Option<RowKey> {
        self.key_index.keys().next_back().copied()
    }

    /// Hand out a key above every key present or previously handed out.
    ///
    /// Fails once a key equal to `i64::MAX` has been seen.
    pub fn allocate_key(&mut self) -> Result<RowKey, SyncError> {
        let key = self
            .next_key
            .ok_or_else(|| SyncError::KeySpaceExhausted(self.name.clone()))?;
        self.next_key = key.next();
        Ok(key)
    }

    /// Append a row. Returns its position.
    ///
    /// Keyed tables require an integer key that is not already present.
    pub fn insert(&mut self, row: Row) -> Result<usize, SyncError> {
        if row.values.len() != self.columns.len() {
            return Err(SyncError::UnsupportedSchema(format!(
                "{} row has {} values for {} columns",
                self.name,
                row.values.len(),
                self.columns.len()
            )));
        }

        let position = self.rows.len();
        if let Some(k) = self.key_column {
            let key = row.get(k).as_integer().map(RowKey).ok_or_else(|| {
                SyncError::UnsupportedSchema(format!(
                    "{}.{} holds non-integer key {}",
                    self.name,
                    self.columns[k],
                    row.get(k)
                ))
            })?;
            if self.key_index.contains_key(&key) {
                return Err(SyncError::UnsupportedSchema(format!(
                    "{} has duplicate key {}",
                    self.name, key
                )));
            }
            self.key_index.insert(key, position);
            if self.next_key.is_some_and(|next| key >= next) {
                self.next_key = key.next();
            }
        }

        self.rows.push(row);
        Ok(position)
    }

    /// Overwrite the non-key values of the row at `position` with `row`'s.
    pub fn overwrite(&mut self, position: usize, row: &Row) {
        let key_column = self.key_column;
        if let Some(target) = self.rows.get_mut(position) {
            for (i, value) in row.values.iter().enumerate() {
                if Some(i) != key_column {
                    target.set(i, value.clone());
                }
            }
        }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// A loaded backup database: its schema version and catalog tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub schema_version: SchemaVersion,
    tables: BTreeMap<String, Table>,
}

impl Snapshot {
    #[must_use]
    pub fn new(schema_version: SchemaVersion) -> Self {
        Self {
            schema_version,
            tables: BTreeMap::new(),
        }
    }

    /// Add (or replace) a table.
    pub fn insert_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Tables sorted by name.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Row count per table.
    #[must_use]
    pub fn row_counts(&self) -> BTreeMap<String, u64> {
        self.tables
            .iter()
            .map(|(name, table)| (name.clone(), table.len() as u64))
            .collect()
    }

    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Table::len).sum()
    }
}

// =============================================================================
// TESTS
// =============================================================================
