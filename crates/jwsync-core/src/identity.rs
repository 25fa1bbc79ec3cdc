//! # Identity Resolver
//!
//! Decides, for each secondary row, whether it denotes a new entity or one
//! already present in the merged table.
//!
//! The resolver indexes the merged table by identity key once, then keeps the
//! index current as rows are inserted, so secondary rows that duplicate each
//! other collapse onto the first one inserted.
//!
//! ## Outcomes
//!
//! | Match | Policy | Result |
//! |-------|--------|--------|
//! | none | any | [`Resolution::New`] |
//! | one, not newer | any | [`Resolution::Duplicate`] |
//! | one, newer and different | `NewestWins` | [`Resolution::Supersede`] |
//! | more than one | any | `IdentityAmbiguity` error |
//!
//! Association tables only suppress exact duplicate tuples.

use crate::schema::{Condition, IdentityRule, TableSchema};
use crate::snapshot::{Row, Table};
use crate::{SyncError, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// =============================================================================
// CONFLICT POLICY
// =============================================================================

/// What happens when a secondary row matches an existing merged row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the merged row unless the secondary row is strictly newer
    /// according to the table's last-modified column.
    #[default]
    NewestWins,
    /// Always keep the merged row.
    PrimaryWins,
}

// =============================================================================
// IDENTITY KEY
// =============================================================================

/// Natural-key projection of a row.
///
/// `branch` is the index of the conditional branch that selected the
/// columns (0 for unconditional rules), so keys built from different
/// column lists never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IdentityKey {
    pub branch: usize,
    pub values: Vec<Value>,
}

/// Outcome of classifying one secondary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No existing entity: insert under a fresh key.
    New,
    /// Same entity as the merged row at this position; drop the secondary row.
    Duplicate(usize),
    /// Same entity, secondary is newer: overwrite the merged row at this position.
    Supersede(usize),
}

/// Column positions of one projection.
#[derive(Debug, Clone)]
struct Projection {
    when: Guard,
    columns: Vec<usize>,
}

#[derive(Debug, Clone)]
enum Guard {
    Always,
    Equals(usize, Value),
    NotNull(usize),
}

impl Guard {
    fn holds(&self, row: &Row) -> bool {
        match self {
            Self::Always => true,
            Self::Equals(i, v) => row.get(*i) == v,
            Self::NotNull(i) => !row.get(*i).is_null(),
        }
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Per-table identity index over the merged table.
#[derive(Debug)]
pub struct IdentityResolver {
    table: String,
    association: bool,
    projections: Vec<Projection>,
    key_column: Option<usize>,
    modified_column: Option<usize>,
    policy: ConflictPolicy,
    index: BTreeMap<IdentityKey, Vec<usize>>,
}

impl IdentityResolver {
    /// Index every row of `merged` under the table's identity rule.
    pub fn build(
        schema: &TableSchema,
        merged: &Table,
        policy: ConflictPolicy,
    ) -> Result<Self, SyncError> {
        let column = |name: &str| {
            merged.column_index(name).ok_or_else(|| {
                SyncError::UnsupportedSchema(format!(
                    "{} identity refers to unknown column {}",
                    schema.name, name
                ))
            })
        };
        let columns = |names: &[String]| -> Result<Vec<usize>, SyncError> {
            names.iter().map(|n| column(n.as_str())).collect()
        };

        let projections = match &schema.identity {
            IdentityRule::Columns(names) | IdentityRule::Association(names) => vec![Projection {
                when: Guard::Always,
                columns: columns(names)?,
            }],
            IdentityRule::AllColumns => vec![Projection {
                when: Guard::Always,
                columns: (0..merged.columns().len())
                    .filter(|i| Some(*i) != merged.key_column())
                    .collect(),
            }],
            IdentityRule::Conditional(branches) => branches
                .iter()
                .map(|branch| -> Result<Projection, SyncError> {
                    let when = match &branch.when {
                        Condition::Always => Guard::Always,
                        Condition::Equals { column: c, value } => {
                            Guard::Equals(column(c.as_str())?, value.clone())
                        }
                        Condition::NotNull(c) => Guard::NotNull(column(c.as_str())?),
                    };
                    Ok(Projection {
                        when,
                        columns: columns(&branch.columns)?,
                    })
                })
                .collect::<Result<Vec<_>, SyncError>>()?,
        };

        let modified_column = match &schema.modified_column {
            Some(name) => Some(column(name.as_str())?),
            None => None,
        };

        let mut resolver = Self {
            table: schema.name.clone(),
            association: schema.identity.is_association(),
            projections,
            key_column: merged.key_column(),
            modified_column,
            policy,
            index: BTreeMap::new(),
        };

        for (position, row) in merged.rows().iter().enumerate() {
            resolver.record(position, row);
        }

        Ok(resolver)
    }

    /// Identity key of a row, `None` when no conditional branch applies.
    #[must_use]
    pub fn identity_key(&self, row: &Row) -> Option<IdentityKey> {
        self.projections
            .iter()
            .enumerate()
            .find(|(_, p)| p.when.holds(row))
            .map(|(branch, p)| IdentityKey {
                branch,
                values: p.columns.iter().map(|&i| row.get(i).clone()).collect(),
            })
    }

    /// Register the merged row at `position` under its identity key.
    pub fn record(&mut self, position: usize, row: &Row) {
        if let Some(key) = self.identity_key(row) {
            self.index.entry(key).or_default().push(position);
        }
    }

    /// Classify a secondary row whose foreign keys are already rewritten.
    pub fn classify(&self, merged: &Table, row: &Row) -> Result<Resolution, SyncError> {
        let Some(key) = self.identity_key(row) else {
            return Ok(Resolution::New);
        };
        let candidates = match self.index.get(&key) {
            Some(c) if !c.is_empty() => c,
            _ => return Ok(Resolution::New),
        };

        if self.association {
            return Ok(Resolution::Duplicate(candidates[0]));
        }

        if candidates.len() > 1 {
            return Err(SyncError::IdentityAmbiguity {
                table: self.table.clone(),
                row: describe(merged, row),
                candidates: candidates
                    .iter()
                    .filter_map(|&p| merged.row_at(p))
                    .map(|r| describe(merged, r))
                    .collect(),
            });
        }

        let position = candidates[0];
        let existing = merged.row_at(position).ok_or_else(|| {
            SyncError::Database(format!("{} index points past row {}", self.table, position))
        })?;

        if self.should_supersede(existing, row) {
            Ok(Resolution::Supersede(position))
        } else {
            Ok(Resolution::Duplicate(position))
        }
    }

    fn should_supersede(&self, existing: &Row, candidate: &Row) -> bool {
        if self.policy == ConflictPolicy::PrimaryWins {
            return false;
        }
        let Some(modified) = self.modified_column else {
            return false;
        };

        is_newer(candidate.get(modified), existing.get(modified))
            && self.fields_differ(existing, candidate)
    }

    fn fields_differ(&self, a: &Row, b: &Row) -> bool {
        a.values
            .iter()
            .zip(&b.values)
            .enumerate()
            .any(|(i, (x, y))| Some(i) != self.key_column && x != y)
    }
}

/// Whether timestamp `candidate` is strictly later than `current`.
///
/// Text compares as RFC 3339 instants when both parse, lexically otherwise.
/// A value is newer than NULL.
#[must_use]
pub fn is_newer(candidate: &Value, current: &Value) -> bool {
    match (candidate, current) {
        (Value::Null, _) => false,
        (_, Value::Null) => true,
        (Value::Text(a), Value::Text(b)) => {
            match (
                OffsetDateTime::parse(a, &Rfc3339),
                OffsetDateTime::parse(b, &Rfc3339),
            ) {
                (Ok(a), Ok(b)) => a > b,
                _ => a.cmp(b) == Ordering::Greater,
            }
        }
        (a, b) => a > b,
    }
}

/// Short human-readable rendering of a row for error messages.
fn describe(table: &Table, row: &Row) -> String {
    let fields: Vec<String> = table
        .columns()
        .iter()
        .zip(&row.values)
        .map(|(c, v)| format!("{c}={v}"))
        .collect();
    format!("{}({})", table.name(), fields.join(", "))
}

// =============================================================================
// TESTS
// =============================================================================
