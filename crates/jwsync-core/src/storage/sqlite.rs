//! # SQLite Adapter
//!
//! Loads the catalog tables of a `userData.db` into [`Table`]s and writes a
//! merged snapshot back.
//!
//! Writing never builds a database from scratch: the primary's database is
//! copied into a scratch directory and the catalog tables' contents are
//! replaced inside one transaction. Indexes, triggers, views and every
//! non-catalog table come along unchanged.

use crate::schema::Schema;
use crate::snapshot::{Row, Snapshot, Table};
use crate::{SyncError, Value};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use std::path::Path;

/// File name of the scratch database inside a scratch directory.
const SCRATCH_DATABASE: &str = "userData.db";

/// Table stamped with the merge completion time when present.
const LAST_MODIFIED_TABLE: &str = "LastModified";

// =============================================================================
// VALUE CONVERSION
// =============================================================================

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Self::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Self::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::RawText(b) => ToSqlOutput::Borrowed(ValueRef::Text(b)),
            Self::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(r) => Self::Real(r),
            ValueRef::Text(t) => Self::text_from_bytes(t),
            ValueRef::Blob(b) => Self::Blob(b.to_vec()),
        }
    }
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> SyncError + '_ {
    move |e| SyncError::Database(format!("{context}: {e}"))
}

/// Quote an identifier for interpolation into SQL.
fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

// =============================================================================
// LOAD
// =============================================================================

/// The catalog tables of one database and its stored schema version.
#[derive(Debug)]
pub struct LoadedDatabase {
    /// Catalog tables present in the database, in catalog order.
    pub tables: Vec<Table>,
    /// `PRAGMA user_version`; 0 when the database does not record one.
    pub user_version: i64,
}

/// Load every catalog table present in the database at `path`.
///
/// `path` should be a scratch copy: opening a WAL-mode database may create
/// side files next to it. Absent tables are skipped so the validator can
/// report them by name.
pub fn load_database(path: &Path, schema: &Schema) -> Result<LoadedDatabase, SyncError> {
    let conn = Connection::open(path).map_err(db_err("cannot open database"))?;

    let user_version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(db_err("cannot read user_version"))?;

    let mut tables = Vec::new();
    for declared in schema.tables() {
        if !table_exists(&conn, &declared.name)? {
            tracing::debug!(table = %declared.name, "catalog table absent");
            continue;
        }

        let columns = table_columns(&conn, &declared.name)?;
        let key = declared
            .key
            .as_deref()
            .filter(|k| columns.iter().any(|c| c == k));
        let mut table = Table::new(declared.name.clone(), columns, key)?;

        let select = format!(
            "SELECT {} FROM {}{}",
            table
                .columns()
                .iter()
                .map(|c| quote(c))
                .collect::<Vec<_>>()
                .join(", "),
            quote(&declared.name),
            key.map(|k| format!(" ORDER BY {}", quote(k)))
                .unwrap_or_default()
        );

        let width = table.columns().len();
        let mut stmt = conn
            .prepare(&select)
            .map_err(db_err("cannot prepare select"))?;
        let rows = stmt
            .query_map([], |r| {
                (0..width)
                    .map(|i| r.get_ref(i).map(Value::from))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })
            .map_err(db_err("cannot read rows"))?;

        for values in rows {
            table.insert(Row::new(values.map_err(db_err("cannot read row"))?))?;
        }

        tracing::debug!(table = %declared.name, rows = table.len(), "loaded table");
        tables.push(table);
    }

    Ok(LoadedDatabase {
        tables,
        user_version,
    })
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, SyncError> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(db_err("cannot read sqlite_master"))
}

fn table_columns(conn: &Connection, name: &str) -> Result<Vec<String>, SyncError> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
        .map_err(db_err("cannot read table_info"))?;
    let columns = stmt
        .query_map(params![name], |r| r.get::<_, String>(0))
        .map_err(db_err("cannot read table_info"))?
        .collect::<rusqlite::Result<Vec<String>>>()
        .map_err(db_err("cannot read table_info"))?;
    Ok(columns)
}

// =============================================================================
// RENDER
// =============================================================================

/// Produce the merged database file.
///
/// `seed` is the primary's database bytes; `scratch` a directory owned by
/// the caller. Every catalog table's rows are replaced by the merged rows in
/// one transaction and the `LastModified` table, when present, is stamped
/// with `stamp`. Returns the finished file's bytes.
pub fn render_database(
    seed: &[u8],
    merged: &Snapshot,
    schema: &Schema,
    stamp: &str,
    scratch: &Path,
) -> Result<Vec<u8>, SyncError> {
    let path = scratch.join(SCRATCH_DATABASE);
    std::fs::write(&path, seed).map_err(|e| SyncError::IoError(e.to_string()))?;

    let order = schema.merge_order()?;
    {
        let mut conn = Connection::open(&path).map_err(db_err("cannot open scratch database"))?;
        let tx = conn
            .transaction()
            .map_err(db_err("cannot start transaction"))?;

        // Children first so a database enforcing foreign keys accepts the deletes.
        for declared in order.iter().rev() {
            tx.execute(&format!("DELETE FROM {}", quote(&declared.name)), [])
                .map_err(db_err("cannot clear table"))?;
        }

        for declared in &order {
            let Some(table) = merged.table(&declared.name) else {
                return Err(SyncError::MissingTable(declared.name.clone()));
            };
            insert_rows(&tx, table)?;
        }

        if table_exists(&tx, LAST_MODIFIED_TABLE)? {
            tx.execute(
                &format!(
                    "UPDATE {0} SET {0} = ?1",
                    quote(LAST_MODIFIED_TABLE)
                ),
                params![stamp],
            )
            .map_err(db_err("cannot stamp LastModified"))?;
        }

        tx.commit().map_err(db_err("cannot commit merged tables"))?;
        conn.execute_batch("VACUUM")
            .map_err(db_err("cannot compact database"))?;
    }

    std::fs::read(&path).map_err(|e| SyncError::IoError(e.to_string()))
}

fn insert_rows(conn: &Connection, table: &Table) -> Result<(), SyncError> {
    let columns = table.columns();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table.name()),
        columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
        (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(db_err("cannot prepare insert"))?;

    for row in table.rows() {
        stmt.execute(rusqlite::params_from_iter(row.values.iter()))
            .map_err(|e| SyncError::Database(format!("cannot insert into {}: {e}", table.name())))?;
    }
    tracing::debug!(table = %table.name(), rows = table.len(), "wrote table");
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
