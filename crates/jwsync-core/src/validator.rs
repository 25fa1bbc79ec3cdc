//! # Schema Validator
//!
//! Checks a loaded snapshot against the catalog before any merge work:
//!
//! 1. Declared schema version inside the supported range
//! 2. Every catalog table present
//! 3. Every declared column present
//! 4. Key and foreign-key columns hold integers (NULL only where allowed)
//!
//! [`SchemaValidator::validate_pair`] additionally requires both inputs to
//! declare the same version and expose the same column list per table.

use crate::schema::{Schema, TableSchema};
use crate::snapshot::{Snapshot, Table};
use crate::{SchemaVersion, SyncError, Value};
use std::ops::RangeInclusive;

/// Validates snapshots against a catalog and a supported version range.
#[derive(Debug, Clone)]
pub struct SchemaValidator<'a> {
    schema: &'a Schema,
    supported: RangeInclusive<u32>,
}

impl<'a> SchemaValidator<'a> {
    #[must_use]
    pub fn new(schema: &'a Schema, supported: RangeInclusive<u32>) -> Self {
        Self { schema, supported }
    }

    /// Validate one snapshot. Returns its schema version.
    pub fn validate(&self, snapshot: &Snapshot) -> Result<SchemaVersion, SyncError> {
        let version = snapshot.schema_version;
        if !self.supported.contains(&version.0) {
            return Err(SyncError::UnsupportedSchema(format!(
                "schema version {} is outside the supported range v{}..=v{}",
                version,
                self.supported.start(),
                self.supported.end()
            )));
        }

        for declared in self.schema.tables() {
            let table = snapshot
                .table(&declared.name)
                .ok_or_else(|| SyncError::MissingTable(declared.name.clone()))?;
            check_columns(declared, table)?;
            check_key_values(declared, table)?;
        }

        Ok(version)
    }

    /// Validate both inputs and require them to agree.
    pub fn validate_pair(
        &self,
        primary: &Snapshot,
        secondary: &Snapshot,
    ) -> Result<SchemaVersion, SyncError> {
        let version = self.validate(primary)?;
        let other = self.validate(secondary)?;

        if version != other {
            return Err(SyncError::UnsupportedSchema(format!(
                "schema versions differ: primary {} vs secondary {}",
                version, other
            )));
        }

        for declared in self.schema.tables() {
            let (Some(a), Some(b)) = (primary.table(&declared.name), secondary.table(&declared.name))
            else {
                return Err(SyncError::MissingTable(declared.name.clone()));
            };
            if a.columns() != b.columns() {
                return Err(SyncError::UnsupportedSchema(format!(
                    "{} columns differ: [{}] vs [{}]",
                    declared.name,
                    a.columns().join(", "),
                    b.columns().join(", ")
                )));
            }
        }

        Ok(version)
    }
}

/// Reconcile the manifest's declared version with the database's
/// `PRAGMA user_version`. Zero means the database does not record one.
pub fn reconcile_version(declared: u32, stored: i64) -> Result<SchemaVersion, SyncError> {
    if stored != 0 && stored != i64::from(declared) {
        return Err(SyncError::UnsupportedSchema(format!(
            "manifest declares v{declared} but database user_version is {stored}"
        )));
    }
    Ok(SchemaVersion(declared))
}

fn check_columns(declared: &TableSchema, table: &Table) -> Result<(), SyncError> {
    let missing: Vec<&str> = declared
        .columns
        .iter()
        .filter(|c| table.column_index(c).is_none())
        .map(String::as_str)
        .collect();

    if !missing.is_empty() {
        return Err(SyncError::UnsupportedSchema(format!(
            "{} lacks column(s) {}",
            declared.name,
            missing.join(", ")
        )));
    }

    if let Some(key) = &declared.key {
        if table.key_column() != table.column_index(key) {
            return Err(SyncError::UnsupportedSchema(format!(
                "{} is not keyed by {}",
                declared.name, key
            )));
        }
    }

    Ok(())
}

fn check_key_values(declared: &TableSchema, table: &Table) -> Result<(), SyncError> {
    for fk in &declared.foreign_keys {
        let Some(index) = table.column_index(&fk.column) else {
            continue;
        };
        let nullable = declared.is_nullable(&fk.column);

        for row in table.rows() {
            match row.get(index) {
                Value::Integer(_) => {}
                Value::Null if nullable => {}
                other => {
                    return Err(SyncError::UnsupportedSchema(format!(
                        "{}.{} holds {} where a key of {} is expected",
                        declared.name, fk.column, other, fk.references
                    )));
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
