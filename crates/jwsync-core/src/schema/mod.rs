//! # Table Catalog
//!
//! Declarative description of the tables the engine merges: columns,
//! surrogate key, foreign keys, identity rule and optional last-modified
//! and sequence columns.
//!
//! The catalog is data. The merge engine never special-cases a table by
//! name; everything table-specific is expressed through [`IdentityRule`]
//! and friends. The built-in JW Library catalog lives in [`jw_library`].

pub mod jw_library;

use crate::{SyncError, Value};
use std::collections::BTreeSet;

// =============================================================================
// FOREIGN KEYS
// =============================================================================

/// A column holding the surrogate key of a row in another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Column in the referencing table.
    pub column: String,
    /// Name of the referenced table.
    pub references: String,
}

impl ForeignKey {
    #[must_use]
    pub fn new(column: impl Into<String>, references: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            references: references.into(),
        }
    }
}

// =============================================================================
// IDENTITY RULES
// =============================================================================

/// Guard selecting a branch of a [`IdentityRule::Conditional`] rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Always holds.
    Always,
    /// Holds when the column equals the value.
    Equals { column: String, value: Value },
    /// Holds when the column is not NULL.
    NotNull(String),
}

/// One branch of a conditional identity rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityBranch {
    pub when: Condition,
    pub columns: Vec<String>,
}

impl IdentityBranch {
    #[must_use]
    pub fn new(when: Condition, columns: &[&str]) -> Self {
        Self {
            when,
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

/// How two rows from different snapshots are recognised as the same entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRule {
    /// Natural key made of the listed columns.
    Columns(Vec<String>),
    /// Every non-key column participates.
    AllColumns,
    /// The first branch whose condition holds picks the columns.
    Conditional(Vec<IdentityBranch>),
    /// Pure association: rows are never matched as entities, only
    /// duplicate tuples over the listed columns are suppressed.
    Association(Vec<String>),
}

impl IdentityRule {
    /// Natural key over the given columns.
    #[must_use]
    pub fn columns(columns: &[&str]) -> Self {
        Self::Columns(columns.iter().map(|c| (*c).to_string()).collect())
    }

    /// Association over the given columns.
    #[must_use]
    pub fn association(columns: &[&str]) -> Self {
        Self::Association(columns.iter().map(|c| (*c).to_string()).collect())
    }

    #[must_use]
    pub fn is_association(&self) -> bool {
        matches!(self, Self::Association(_))
    }
}

/// A per-group ordinal column that must stay unique within its group
/// (e.g. `TagMap.Position` per `TagId`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceColumn {
    pub column: String,
    pub group_by: String,
}

// =============================================================================
// TABLE SCHEMA
// =============================================================================

/// Declared shape and merge semantics of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name as it appears in the database.
    pub name: String,
    /// Integer surrogate key column, `None` for composite-key tables.
    pub key: Option<String>,
    /// Columns that must be present (the key included).
    pub columns: Vec<String>,
    /// Foreign-key columns, rewritten through the referenced table's key map.
    pub foreign_keys: Vec<ForeignKey>,
    /// Foreign keys that may be NULL.
    pub nullable: BTreeSet<String>,
    /// Identity rule used by the resolver.
    pub identity: IdentityRule,
    /// Last-modified timestamp column enabling the newest-wins override.
    pub modified_column: Option<String>,
    /// Ordinal column re-sequenced for inserted rows.
    pub sequence: Option<SequenceColumn>,
}

impl TableSchema {
    /// Create a table with the given columns and an all-columns identity.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            key: None,
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            foreign_keys: Vec::new(),
            nullable: BTreeSet::new(),
            identity: IdentityRule::AllColumns,
            modified_column: None,
            sequence: None,
        }
    }

    /// Declare the surrogate key column.
    #[must_use]
    pub fn with_key(mut self, column: &str) -> Self {
        self.key = Some(column.to_string());
        self
    }

    /// Declare a NOT NULL foreign key.
    #[must_use]
    pub fn with_foreign_key(mut self, column: &str, references: &str) -> Self {
        self.foreign_keys.push(ForeignKey::new(column, references));
        self
    }

    /// Declare a nullable foreign key.
    #[must_use]
    pub fn with_nullable_foreign_key(mut self, column: &str, references: &str) -> Self {
        self.nullable.insert(column.to_string());
        self.with_foreign_key(column, references)
    }

    #[must_use]
    pub fn with_identity(mut self, identity: IdentityRule) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn with_modified_column(mut self, column: &str) -> Self {
        self.modified_column = Some(column.to_string());
        self
    }

    #[must_use]
    pub fn with_sequence(mut self, column: &str, group_by: &str) -> Self {
        self.sequence = Some(SequenceColumn {
            column: column.to_string(),
            group_by: group_by.to_string(),
        });
        self
    }

    /// Whether the foreign-key column accepts NULL.
    #[must_use]
    pub fn is_nullable(&self, column: &str) -> bool {
        self.nullable.contains(column)
    }

    /// Names of the tables this table references, deduplicated.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<&str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.references.as_str())
            .collect()
    }
}

// =============================================================================
// SCHEMA (CATALOG)
// =============================================================================

/// An ordered set of table schemas.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    tables: Vec<TableSchema>,
}

impl Schema {
    #[must_use]
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    /// Tables in declaration order.
    #[must_use]
    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Compute the merge order: referenced tables before referencing tables.
    ///
    /// Kahn's algorithm; ties are broken by declaration order so the result
    /// is deterministic. Fails with `MissingTable` when a foreign key names
    /// an undeclared table and with `CyclicSchema` when no order exists.
    pub fn merge_order(&self) -> Result<Vec<&TableSchema>, SyncError> {
        let index_of = |name: &str| self.tables.iter().position(|t| t.name == name);

        // dependents[i] = tables referencing table i
        let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.tables.len()];
        let mut in_degree: Vec<usize> = vec![0; self.tables.len()];

        for (i, table) in self.tables.iter().enumerate() {
            for dep in table.dependencies() {
                let j = index_of(dep).ok_or_else(|| {
                    SyncError::MissingTable(format!(
                        "{} (referenced by {})",
                        dep, table.name
                    ))
                })?;
                if dependents[j].insert(i) {
                    in_degree[i] += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.tables.len());

        while let Some(i) = ready.pop_first() {
            order.push(&self.tables[i]);
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if order.len() < self.tables.len() {
            let stuck = in_degree
                .iter()
                .enumerate()
                .filter(|(_, d)| **d > 0)
                .map(|(i, _)| self.tables[i].name.clone())
                .collect();
            return Err(SyncError::CyclicSchema(stuck));
        }

        Ok(order)
    }
}

// =============================================================================
// TESTS
// =============================================================================
