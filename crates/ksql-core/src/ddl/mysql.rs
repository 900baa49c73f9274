//! MySQL dialect.

use super::{is_expression_default, render_default, DdlDialect, DdlKind, DdlStatement};
use crate::diff::{ChangeSet, TableOptionsChange};
use crate::schema::{ColumnDescriptor, IndexDescriptor, IndexKind, SchemaOptions, TableDescriptor};

/// MySQL (and MariaDB) DDL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn index_columns(&self, index: &IndexDescriptor) -> String {
        index
            .columns()
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `PRIMARY KEY (...)`, `UNIQUE KEY `name` (...)`, `KEY `name` (...)`, ...
    fn index_definition(&self, index: &IndexDescriptor) -> String {
        let name = self.quote_identifier(index.name());
        let head = match index.kind() {
            IndexKind::Primary => String::from("PRIMARY KEY"),
            IndexKind::Unique => format!("UNIQUE KEY {name}"),
            IndexKind::Normal => format!("KEY {name}"),
            IndexKind::Fulltext => format!("FULLTEXT KEY {name}"),
            IndexKind::Spatial => format!("SPATIAL KEY {name}"),
        };
        let mut sql = format!("{head} ({})", self.index_columns(index));
        if !index.comment().is_empty() {
            sql.push_str(&format!(" COMMENT {}", quote_string(index.comment())));
        }
        sql
    }

    /// Generated columns whose expression was not introspected cannot be
    /// written back.
    fn unknown_generated<'a>(
        table: &str,
        mut columns: impl Iterator<Item = &'a ColumnDescriptor>,
    ) -> Option<DdlStatement> {
        columns
            .find(|c| c.is_generated() && c.generation_expression.trim().is_empty())
            .map(|c| {
                DdlStatement::unsupported(
                    Some(table),
                    &format!("generated column {table}.{} has no known expression, skipped", c.name),
                )
            })
    }

    fn drop_index_clause(&self, index: &IndexDescriptor) -> String {
        match index.kind() {
            IndexKind::Primary => String::from("DROP PRIMARY KEY"),
            _ => format!("DROP INDEX {}", self.quote_identifier(index.name())),
        }
    }

    fn table_options(engine: &str, charset: &str, collation: &str, comment: &str) -> Vec<String> {
        let mut options = Vec::new();
        if !engine.is_empty() {
            options.push(format!("ENGINE={engine}"));
        }
        if !collation.is_empty() {
            options.push(format!("DEFAULT CHARSET={charset} COLLATE={collation}"));
        }
        if !comment.is_empty() {
            options.push(format!("COMMENT={}", quote_string(comment)));
        }
        options
    }

    fn changed_options(options: &TableOptionsChange) -> Vec<String> {
        let mut clauses = Vec::new();
        if let Some(engine) = &options.engine {
            clauses.push(format!("ENGINE={engine}"));
        }
        if let (Some(collation), Some(charset)) = (&options.collation, options.charset()) {
            clauses.push(format!("DEFAULT CHARSET={charset} COLLATE={collation}"));
        }
        if let Some(comment) = &options.comment {
            clauses.push(format!("COMMENT={}", quote_string(comment)));
        }
        clauses
    }
}

impl DdlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn column_definition(&self, column: &ColumnDescriptor) -> String {
        let mut sql = format!("{} {}", self.quote_identifier(&column.name), column.column_type);
        if column.is_generated() {
            let storage = if column.is_stored() { "STORED" } else { "VIRTUAL" };
            sql.push_str(&format!(
                " GENERATED ALWAYS AS ({}) {storage}",
                column.generation_expression.trim()
            ));
        }
        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });

        if let Some(default) = column.default.as_ref().filter(|_| !column.is_generated()) {
            sql.push_str(" DEFAULT ");
            // MySQL 8 reports expression defaults such as uuid() unparenthesised.
            if column.has_expression_default() && !is_expression_default(default) {
                sql.push_str(&format!("({})", default.trim()));
            } else {
                sql.push_str(&render_default(default, quote_string));
            }
        }
        if column.auto_increment {
            sql.push_str(" AUTO_INCREMENT");
        }
        if let Some(on_update) = column.on_update() {
            // "on update CURRENT_TIMESTAMP" -> "ON UPDATE CURRENT_TIMESTAMP"
            let expression = on_update["on update".len()..].trim();
            sql.push_str(&format!(" ON UPDATE {expression}"));
        }
        if !column.comment.is_empty() {
            sql.push_str(&format!(" COMMENT {}", quote_string(&column.comment)));
        }
        sql
    }

    fn create_table(&self, table: &TableDescriptor) -> Vec<DdlStatement> {
        if let Some(skipped) = Self::unknown_generated(&table.name, table.columns.iter()) {
            return vec![skipped];
        }
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();

        // Primary key first, then the rest in name order.
        let (primary, others): (Vec<&IndexDescriptor>, Vec<&IndexDescriptor>) = table
            .indexes
            .values()
            .partition(|i| i.kind() == IndexKind::Primary);
        parts.extend(
            primary
                .into_iter()
                .chain(others)
                .map(|i| self.index_definition(i)),
        );

        let mut sql = format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(&table.name),
            parts.join(", ")
        );
        let options = Self::table_options(&table.engine, table.charset(), &table.collation, &table.comment);
        if !options.is_empty() {
            sql.push(' ');
            sql.push_str(&options.join(" "));
        }
        vec![DdlStatement::new(DdlKind::CreateTable, Some(&table.name), sql)]
    }

    fn alter_table(&self, table: &str, changes: &ChangeSet) -> Vec<DdlStatement> {
        let touched = changes
            .added_columns
            .iter()
            .chain(changes.changed_columns.iter().map(|c| &c.new));
        if let Some(skipped) = Self::unknown_generated(table, touched) {
            return vec![skipped];
        }
        let mut clauses: Vec<String> = Vec::new();

        clauses.extend(changes.deleted_indexes.iter().map(|i| self.drop_index_clause(i)));
        clauses.extend(
            changes
                .added_columns
                .iter()
                .map(|c| format!("ADD COLUMN {}", self.column_definition(c))),
        );
        clauses.extend(
            changes
                .changed_columns
                .iter()
                .map(|c| format!("MODIFY COLUMN {}", self.column_definition(&c.new))),
        );
        clauses.extend(
            changes
                .added_indexes
                .iter()
                .map(|i| format!("ADD {}", self.index_definition(i))),
        );
        if let Some(options) = &changes.options {
            clauses.extend(Self::changed_options(options));
        }

        if clauses.is_empty() {
            return Vec::new();
        }
        let sql = format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(table),
            clauses.join(", ")
        );
        vec![DdlStatement::new(DdlKind::AlterTable, Some(table), sql)]
    }

    fn alter_schema(&self, name: &str, options: &SchemaOptions) -> Vec<DdlStatement> {
        let mut sql = format!("ALTER SCHEMA {}", self.quote_identifier(name));
        if !options.charset.is_empty() {
            sql.push_str(&format!(" DEFAULT CHARACTER SET {}", options.charset));
        }
        if !options.collation.is_empty() {
            sql.push_str(&format!(" COLLATE {}", options.collation));
        }
        vec![DdlStatement::new(DdlKind::AlterSchema, None, sql)]
    }
}

/// Quotes a string literal the way MySQL reads it under the default
/// `sql_mode`, where backslash is an escape character. Line breaks are
/// escaped so every statement stays on one line.
fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}
