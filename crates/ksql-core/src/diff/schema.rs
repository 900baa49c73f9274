//! Schema-level differ.

use serde::{Deserialize, Serialize};

use super::table::ChangeSet;
use crate::schema::{SchemaOptions, SchemaSnapshot, TableDescriptor, BOOKKEEPING_TABLE};

/// One unit of work needed to turn the `from` schema into the `to` schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaChange {
    /// Default character set or collation of the schema differs.
    AlterSchema {
        /// Schema being altered (the `from` side).
        name: String,
        /// Options wanted.
        options: SchemaOptions,
    },
    /// Table exists only in `to`.
    CreateTable(TableDescriptor),
    /// Table exists only in `from`.
    DropTable(TableDescriptor),
    /// Table exists on both sides with differences.
    AlterTable {
        /// Table name.
        table: String,
        /// What changed.
        changes: ChangeSet,
    },
}

impl SchemaChange {
    /// Name of the table concerned, if any.
    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Self::AlterSchema { .. } => None,
            Self::CreateTable(t) | Self::DropTable(t) => Some(&t.name),
            Self::AlterTable { table, .. } => Some(table),
        }
    }
}

/// Diffs one table, either side of which may be absent.
///
/// Returns `None` when both sides are absent or identical.
#[must_use]
pub fn diff_table(from: Option<&TableDescriptor>, to: Option<&TableDescriptor>) -> Option<SchemaChange> {
    match (from, to) {
        (None, None) => None,
        (None, Some(to)) => Some(SchemaChange::CreateTable(to.clone())),
        (Some(from), None) => Some(SchemaChange::DropTable(from.clone())),
        (Some(from), Some(to)) => {
            if !from.has_changed(to) {
                return None;
            }
            Some(SchemaChange::AlterTable {
                table: to.name.clone(),
                changes: from.check_changes(to),
            })
        }
    }
}

/// Compares two schema snapshots.
///
/// Tables are matched by exact name. Output order: the schema option change
/// (if any), then tables in `from` order, then tables present only in `to`
/// in `to` order. The bookkeeping table is never compared.
#[must_use]
pub fn diff_schemas(from: &SchemaSnapshot, to: &SchemaSnapshot) -> Vec<SchemaChange> {
    let mut changes = Vec::new();

    if from.options != to.options {
        changes.push(SchemaChange::AlterSchema {
            name: from.name.clone(),
            options: to.options.clone(),
        });
    }

    let tracked = |t: &&TableDescriptor| t.name != BOOKKEEPING_TABLE;

    for table in from.tables.iter().filter(tracked) {
        if let Some(change) = diff_table(Some(table), to.get_table(&table.name)) {
            changes.push(change);
        }
    }

    for table in to.tables.iter().filter(tracked) {
        if from.get_table(&table.name).is_none() {
            changes.extend(diff_table(None, Some(table)));
        }
    }

    changes
}
