//! SQLite dialect.
//!
//! SQLite has no ALTER for column definitions, primary keys or table options.
//! Those changes come out as `--` comments that are written to diff files but
//! never executed.

use super::{render_default, DdlDialect, DdlKind, DdlStatement};
use crate::diff::ChangeSet;
use crate::schema::{ColumnDescriptor, IndexDescriptor, IndexKind, SchemaOptions, TableDescriptor};
use crate::value::quote_literal;

/// SQLite DDL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn column_list(&self, columns: &[&str]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn create_index(&self, table: &str, index: &IndexDescriptor) -> DdlStatement {
        let unique = match index.kind() {
            IndexKind::Unique => "UNIQUE ",
            IndexKind::Normal => "",
            IndexKind::Primary => {
                return DdlStatement::unsupported(
                    Some(table),
                    &format!("SQLite cannot add a primary key to existing table {table}"),
                );
            }
            IndexKind::Fulltext | IndexKind::Spatial => {
                return DdlStatement::unsupported(
                    Some(table),
                    &format!("SQLite has no {:?} index, skipped {}", index.kind(), index.name()),
                );
            }
        };
        DdlStatement::new(
            DdlKind::CreateIndex,
            Some(table),
            format!(
                "CREATE {unique}INDEX {} ON {} ({})",
                self.quote_identifier(index.name()),
                self.quote_identifier(table),
                self.column_list(&index.columns())
            ),
        )
    }

    fn drop_index(&self, table: &str, index: &IndexDescriptor) -> DdlStatement {
        if index.kind() == IndexKind::Primary {
            return DdlStatement::unsupported(
                Some(table),
                &format!("SQLite cannot drop the primary key of {table}"),
            );
        }
        DdlStatement::new(
            DdlKind::DropIndex,
            Some(table),
            format!("DROP INDEX {}", self.quote_identifier(index.name())),
        )
    }
}

impl DdlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn column_definition(&self, column: &ColumnDescriptor) -> String {
        let mut sql = format!("{} {}", self.quote_identifier(&column.name), column.column_type);
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&render_default(default, quote_literal));
        }
        sql
    }

    fn create_table(&self, table: &TableDescriptor) -> Vec<DdlStatement> {
        let primary_key = table.primary_key();
        // A lone auto-increment key must be declared inline as INTEGER.
        let rowid_alias = match primary_key.as_slice() {
            [only] => table
                .get_column(only)
                .filter(|c| c.auto_increment)
                .map(|c| c.name.as_str()),
            _ => None,
        };

        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                if Some(c.name.as_str()) == rowid_alias {
                    format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", self.quote_identifier(&c.name))
                } else {
                    self.column_definition(c)
                }
            })
            .collect();
        if rowid_alias.is_none() && !primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.column_list(&primary_key)));
        }

        let mut stmts = vec![DdlStatement::new(
            DdlKind::CreateTable,
            Some(&table.name),
            format!("CREATE TABLE {} ({})", self.quote_identifier(&table.name), parts.join(", ")),
        )];
        stmts.extend(
            table
                .indexes
                .values()
                .filter(|i| i.kind() != IndexKind::Primary)
                .map(|i| self.create_index(&table.name, i)),
        );
        stmts
    }

    fn alter_table(&self, table: &str, changes: &ChangeSet) -> Vec<DdlStatement> {
        let mut stmts: Vec<DdlStatement> = changes
            .deleted_indexes
            .iter()
            .map(|i| self.drop_index(table, i))
            .collect();

        stmts.extend(changes.added_columns.iter().map(|c| {
            DdlStatement::new(
                DdlKind::AlterTable,
                Some(table),
                format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    self.quote_identifier(table),
                    self.column_definition(c)
                ),
            )
        }));

        stmts.extend(changes.changed_columns.iter().map(|c| {
            DdlStatement::unsupported(
                Some(table),
                &format!(
                    "SQLite cannot modify column {table}.{} to {}, rebuild the table",
                    c.new.name,
                    self.column_definition(&c.new)
                ),
            )
        }));

        stmts.extend(changes.added_indexes.iter().map(|i| self.create_index(table, i)));

        if changes.options.is_some() {
            stmts.push(DdlStatement::unsupported(
                Some(table),
                &format!("SQLite has no table options, skipped options of {table}"),
            ));
        }
        stmts
    }

    fn alter_schema(&self, name: &str, _options: &SchemaOptions) -> Vec<DdlStatement> {
        vec![DdlStatement::unsupported(
            None,
            &format!("SQLite has no schema options, skipped options of {name}"),
        )]
    }
}
