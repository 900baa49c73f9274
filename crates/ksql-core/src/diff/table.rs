//! Table-level differ.
//!
//! [`TableDescriptor::check_changes`] builds the full [`ChangeSet`] between an
//! old and a new table; [`TableDescriptor::has_changed`] answers the yes/no
//! question. Both run the same walk over the same predicates, the quick check
//! merely stops at the first change, so they cannot disagree.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use super::detect::{column_changed, index_descriptor_changed, table_options_changed};
use crate::schema::{ColumnDescriptor, IndexDescriptor, TableDescriptor};

/// A column present on both sides with a different definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnChange {
    /// Definition in the old table.
    pub old: ColumnDescriptor,
    /// Definition in the new table.
    pub new: ColumnDescriptor,
}

/// New values of table options that differ. `None` means unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableOptionsChange {
    /// New storage engine.
    pub engine: Option<String>,
    /// New collation.
    pub collation: Option<String>,
    /// New comment.
    pub comment: Option<String>,
}

impl TableOptionsChange {
    fn between(old: &TableDescriptor, new: &TableDescriptor) -> Self {
        let changed = |a: &str, b: &str| (a != b).then(|| b.to_string());
        Self {
            engine: changed(&old.engine, &new.engine),
            collation: changed(&old.collation, &new.collation),
            comment: changed(&old.comment, &new.comment),
        }
    }

    /// New character set, derived from the new collation.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.collation
            .as_deref()
            .map(|c| c.split_once('_').map_or(c, |(charset, _)| charset))
    }
}

/// Structural differences between an old and a new table.
///
/// A modified index is listed twice: its old definition under
/// `deleted_indexes` and its new one under `added_indexes`. Nothing else
/// appears in more than one list. Columns dropped from the new table are not
/// reported.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Columns only in the new table.
    pub added_columns: Vec<ColumnDescriptor>,
    /// Columns whose definition changed.
    pub changed_columns: Vec<ColumnChange>,
    /// Indexes to create.
    pub added_indexes: Vec<IndexDescriptor>,
    /// Indexes to drop.
    pub deleted_indexes: Vec<IndexDescriptor>,
    /// Table option changes.
    pub options: Option<TableOptionsChange>,
}

impl ChangeSet {
    /// Returns true when there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_columns.is_empty()
            && self.changed_columns.is_empty()
            && self.added_indexes.is_empty()
            && self.deleted_indexes.is_empty()
            && self.options.is_none()
    }

    /// Names of indexes that are dropped and recreated.
    #[must_use]
    pub fn replaced_indexes(&self) -> Vec<&str> {
        self.deleted_indexes
            .iter()
            .map(IndexDescriptor::name)
            .filter(|name| self.added_indexes.iter().any(|i| i.name() == *name))
            .collect()
    }

    fn record(&mut self, change: Change<'_>) {
        match change {
            Change::AddColumn(column) => self.added_columns.push(column.clone()),
            Change::ModifyColumn { old, new } => self.changed_columns.push(ColumnChange {
                old: old.clone(),
                new: new.clone(),
            }),
            Change::AddIndex(index) => self.added_indexes.push(index.clone()),
            Change::DeleteIndex(index) => self.deleted_indexes.push(index.clone()),
            Change::Options(options) => self.options = Some(options),
        }
    }
}

/// One observed difference, borrowed from the compared tables.
enum Change<'a> {
    AddColumn(&'a ColumnDescriptor),
    ModifyColumn {
        old: &'a ColumnDescriptor,
        new: &'a ColumnDescriptor,
    },
    AddIndex(&'a IndexDescriptor),
    DeleteIndex(&'a IndexDescriptor),
    Options(TableOptionsChange),
}

/// Visits every difference between `old` and `new` until `visit` breaks.
fn walk_changes<'a>(
    old: &'a TableDescriptor,
    new: &'a TableDescriptor,
    visit: &mut impl FnMut(Change<'a>) -> ControlFlow<()>,
) -> ControlFlow<()> {
    for column in &new.columns {
        match old.get_column(&column.name) {
            None => visit(Change::AddColumn(column))?,
            Some(previous) if column_changed(previous, column) => visit(Change::ModifyColumn {
                old: previous,
                new: column,
            })?,
            Some(_) => {}
        }
    }

    for (name, index) in &new.indexes {
        match old.indexes.get(name) {
            None => visit(Change::AddIndex(index))?,
            Some(previous) if index_descriptor_changed(previous, index) => {
                visit(Change::DeleteIndex(previous))?;
                visit(Change::AddIndex(index))?;
            }
            Some(_) => {}
        }
    }

    for (name, index) in &old.indexes {
        if !new.indexes.contains_key(name) {
            visit(Change::DeleteIndex(index))?;
        }
    }

    if table_options_changed(old, new) {
        visit(Change::Options(TableOptionsChange::between(old, new)))?;
    }

    ControlFlow::Continue(())
}

impl TableDescriptor {
    /// Computes what changes turn `self` (old) into `new`.
    #[must_use]
    pub fn check_changes(&self, new: &Self) -> ChangeSet {
        let mut changes = ChangeSet::default();
        let _ = walk_changes(self, new, &mut |change| {
            changes.record(change);
            ControlFlow::Continue(())
        });
        changes
    }

    /// Returns true if [`check_changes`](Self::check_changes) would report
    /// anything, without building the change set.
    #[must_use]
    pub fn has_changed(&self, new: &Self) -> bool {
        walk_changes(self, new, &mut |_| ControlFlow::Break(())).is_break()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::schema::{IndexMeta, KeyRole};

    fn pk(table: &str) -> IndexDescriptor {
        IndexDescriptor::new(IndexMeta::new("PRIMARY", table, "id", 1, false))
    }

    fn t1_from() -> TableDescriptor {
        TableDescriptor::new("t1")
            .column(ColumnDescriptor::new("id", "int").not_null().key(KeyRole::Primary))
            .column(ColumnDescriptor::new("name", "varchar(10)"))
            .index(pk("t1"))
    }

    fn t1_to() -> TableDescriptor {
        TableDescriptor::new("t1")
            .column(ColumnDescriptor::new("id", "int").not_null().key(KeyRole::Primary))
            .column(ColumnDescriptor::new("name", "varchar(20)"))
            .column(ColumnDescriptor::new("age", "int"))
            .index(pk("t1"))
    }

    fn assert_partitioned(changes: &ChangeSet) {
        let added: BTreeSet<&str> = changes.added_columns.iter().map(|c| c.name.as_str()).collect();
        let changed: BTreeSet<&str> = changes
            .changed_columns
            .iter()
            .map(|c| c.new.name.as_str())
            .collect();
        assert!(added.is_disjoint(&changed));

        let replaced: BTreeSet<&str> = changes.replaced_indexes().into_iter().collect();
        let added_ix: BTreeSet<&str> = changes.added_indexes.iter().map(IndexDescriptor::name).collect();
        let deleted_ix: BTreeSet<&str> = changes.deleted_indexes.iter().map(IndexDescriptor::name).collect();
        let overlap: BTreeSet<&str> = added_ix.intersection(&deleted_ix).copied().collect();
        assert_eq!(overlap, replaced);
    }

    #[test]
    fn widened_column_and_new_column() {
        let changes = t1_from().check_changes(&t1_to());

        assert_eq!(changes.added_columns.len(), 1);
        assert_eq!(changes.added_columns[0].name, "age");
        assert_eq!(changes.changed_columns.len(), 1);
        assert_eq!(changes.changed_columns[0].old.char_length, Some(10));
        assert_eq!(changes.changed_columns[0].new.char_length, Some(20));
        assert!(changes.added_indexes.is_empty());
        assert!(changes.deleted_indexes.is_empty());
        assert!(changes.options.is_none());
        assert_partitioned(&changes);
    }

    #[test]
    fn identical_tables_are_empty() {
        let changes = t1_from().check_changes(&t1_from());
        assert!(changes.is_empty());
        assert!(!t1_from().has_changed(&t1_from()));
    }

    #[test]
    fn dropped_columns_are_not_reported() {
        let old = t1_to();
        let new = t1_from().column(ColumnDescriptor::new("age", "int"));
        let new = TableDescriptor {
            columns: new
                .columns
                .into_iter()
                .filter(|c| c.name != "name")
                .collect(),
            ..new
        };
        let changes = old.check_changes(&new);
        assert!(changes.added_columns.is_empty());
        assert!(changes.changed_columns.is_empty());
        assert!(!old.has_changed(&new));
    }

    #[test]
    fn changed_index_is_dropped_and_recreated() {
        let mut composite = IndexDescriptor::new(IndexMeta::new("ix_name", "t1", "name", 1, true));
        composite
            .push(IndexMeta::new("ix_name", "t1", "id", 2, true))
            .unwrap();

        let old = t1_from().index(IndexDescriptor::new(IndexMeta::new("ix_name", "t1", "name", 1, true)));
        let new = t1_from().index(composite);
        let changes = old.check_changes(&new);

        assert_eq!(changes.deleted_indexes.len(), 1);
        assert_eq!(changes.added_indexes.len(), 1);
        assert_eq!(changes.deleted_indexes[0].columns(), vec!["name"]);
        assert_eq!(changes.added_indexes[0].columns(), vec!["name", "id"]);
        assert_eq!(changes.replaced_indexes(), vec!["ix_name"]);
        assert_partitioned(&changes);
    }

    #[test]
    fn index_column_swap_is_a_replacement() {
        let old = t1_from().index(IndexDescriptor::new(IndexMeta::new("ix", "t1", "name", 1, true)));
        let new = t1_from().index(IndexDescriptor::new(IndexMeta::new("ix", "t1", "id", 1, true)));
        let changes = old.check_changes(&new);
        assert_eq!(changes.replaced_indexes(), vec!["ix"]);
    }

    #[test]
    fn added_and_removed_indexes() {
        let old = t1_from().index(IndexDescriptor::new(IndexMeta::new("ix_old", "t1", "name", 1, true)));
        let new = t1_from().index(IndexDescriptor::new(IndexMeta::new("uk_new", "t1", "name", 1, false)));
        let changes = old.check_changes(&new);
        assert_eq!(changes.added_indexes.len(), 1);
        assert_eq!(changes.added_indexes[0].name(), "uk_new");
        assert_eq!(changes.deleted_indexes.len(), 1);
        assert_eq!(changes.deleted_indexes[0].name(), "ix_old");
        assert!(changes.replaced_indexes().is_empty());
        assert_partitioned(&changes);
    }

    #[test]
    fn table_options_are_reported() {
        let old = t1_from().engine("MyISAM").collation("latin1_swedish_ci");
        let new = t1_from().engine("InnoDB").collation("utf8mb4_general_ci");
        let changes = old.check_changes(&new);
        let options = changes.options.expect("options change");
        assert_eq!(options.engine.as_deref(), Some("InnoDB"));
        assert_eq!(options.charset(), Some("utf8mb4"));
        assert_eq!(options.comment, None);
    }

    #[test]
    fn quick_check_agrees_with_full_diff() {
        let variants = vec![
            t1_from(),
            t1_to(),
            t1_from().comment("users"),
            t1_from().index(IndexDescriptor::new(IndexMeta::new("ix", "t1", "name", 1, true))),
            t1_from().index(IndexDescriptor::new(IndexMeta::new("ix", "t1", "id", 1, true))),
            TableDescriptor::new("t1"),
            TableDescriptor::new("t1").column(ColumnDescriptor::new("name", "varchar(10)")),
        ];
        for old in &variants {
            for new in &variants {
                let changes = old.check_changes(new);
                assert_eq!(old.has_changed(new), !changes.is_empty());
                assert_partitioned(&changes);
            }
        }
    }
}
