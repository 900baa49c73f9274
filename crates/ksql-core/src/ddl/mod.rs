//! Dialect-specific DDL emission.
//!
//! A [`DdlDialect`] turns [`SchemaChange`]s into [`DdlStatement`]s. Every
//! statement is a single line of SQL and carries no binds, so it can be
//! executed as is or written one per line into a `.sql` file.

mod mysql;
mod sqlite;

use std::fmt;

pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

use crate::diff::{ChangeSet, SchemaChange};
use crate::schema::{ColumnDescriptor, SchemaOptions, TableDescriptor};
use crate::statement::Statement;
use crate::value::SqlValue;

/// What a DDL statement does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdlKind {
    /// Changes schema-level options.
    AlterSchema,
    /// Creates a table.
    CreateTable,
    /// Drops a table.
    DropTable,
    /// Alters a table.
    AlterTable,
    /// Creates a standalone index.
    CreateIndex,
    /// Drops a standalone index.
    DropIndex,
    /// A change the dialect cannot express; the SQL is a comment.
    Unsupported,
}

/// One emitted DDL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStatement {
    kind: DdlKind,
    table: Option<String>,
    sql: String,
}

impl DdlStatement {
    /// Creates a statement.
    #[must_use]
    pub fn new(kind: DdlKind, table: Option<&str>, sql: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.map(str::to_string),
            sql: sql.into(),
        }
    }

    /// Creates a comment standing in for a change that cannot be emitted.
    #[must_use]
    pub fn unsupported(table: Option<&str>, message: &str) -> Self {
        Self::new(DdlKind::Unsupported, table, format!("-- {message}"))
    }

    /// Statement kind.
    #[must_use]
    pub const fn kind(&self) -> DdlKind {
        self.kind
    }

    /// Table the statement concerns, if any.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns false for comments that must not be sent to the database.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.kind != DdlKind::Unsupported
    }
}

impl Statement for DdlStatement {
    fn prepare(&self) -> String {
        self.sql.clone()
    }

    fn binds(&self) -> Vec<SqlValue> {
        Vec::new()
    }
}

impl fmt::Display for DdlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Trait for dialect-specific DDL generation.
pub trait DdlDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String;

    /// Renders one column definition (name, type, nullability, default, ...).
    fn column_definition(&self, column: &ColumnDescriptor) -> String;

    /// Statements creating a table together with its indexes.
    fn create_table(&self, table: &TableDescriptor) -> Vec<DdlStatement>;

    /// Statements applying a change set to an existing table.
    fn alter_table(&self, table: &str, changes: &ChangeSet) -> Vec<DdlStatement>;

    /// Statements changing schema-level options.
    fn alter_schema(&self, name: &str, options: &SchemaOptions) -> Vec<DdlStatement>;

    /// Statements dropping a table.
    fn drop_table(&self, table: &TableDescriptor) -> Vec<DdlStatement> {
        vec![DdlStatement::new(
            DdlKind::DropTable,
            Some(&table.name),
            format!("DROP TABLE {}", self.quote_identifier(&table.name)),
        )]
    }

    /// Statements for one schema change.
    fn emit(&self, change: &SchemaChange) -> Vec<DdlStatement> {
        match change {
            SchemaChange::AlterSchema { name, options } => self.alter_schema(name, options),
            SchemaChange::CreateTable(table) => self.create_table(table),
            SchemaChange::DropTable(table) => self.drop_table(table),
            SchemaChange::AlterTable { table, changes } => self.alter_table(table, changes),
        }
    }

    /// Statements for a sequence of schema changes, in order.
    fn emit_all(&self, changes: &[SchemaChange]) -> Vec<DdlStatement> {
        changes.iter().flat_map(|c| self.emit(c)).collect()
    }
}

/// Renders a column default as SQL.
///
/// Expressions (`CURRENT_TIMESTAMP`, `NULL`, parenthesised expressions and
/// bit/hex literals) are kept verbatim; anything else becomes a string literal
/// built by `quote`.
pub(crate) fn render_default(value: &str, quote: fn(&str) -> String) -> String {
    if is_expression_default(value) {
        value.to_string()
    } else {
        quote(value)
    }
}

pub(crate) fn is_expression_default(value: &str) -> bool {
    let upper = value.trim().to_ascii_uppercase();
    const KEYWORDS: [&str; 6] = [
        "CURRENT_TIMESTAMP",
        "CURRENT_DATE",
        "CURRENT_TIME",
        "LOCALTIMESTAMP",
        "LOCALTIME",
        "NOW(",
    ];
    upper == "NULL"
        || KEYWORDS.iter().any(|k| upper.starts_with(k))
        || upper.starts_with('(')
        || upper.starts_with("B'")
        || upper.starts_with("X'")
        || upper.starts_with("0X")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::quote_literal;

    #[test]
    fn defaults_are_quoted_unless_expressions() {
        let render = |value: &str| render_default(value, quote_literal);
        assert_eq!(render("abc"), "'abc'");
        assert_eq!(render(""), "''");
        assert_eq!(render("0"), "'0'");
        assert_eq!(render("it's"), "'it''s'");
        assert_eq!(render("CURRENT_TIMESTAMP"), "CURRENT_TIMESTAMP");
        assert_eq!(render("current_timestamp(3)"), "current_timestamp(3)");
        assert_eq!(render("(uuid())"), "(uuid())");
        assert_eq!(render("b'1'"), "b'1'");
        assert_eq!(render("NULL"), "NULL");
    }

    #[test]
    fn unsupported_statements_are_comments() {
        let stmt = DdlStatement::unsupported(Some("t"), "cannot do that");
        assert_eq!(stmt.sql(), "-- cannot do that");
        assert!(!stmt.is_executable());
        assert!(stmt.binds().is_empty());
        assert_eq!(stmt.table(), Some("t"));
    }
}
