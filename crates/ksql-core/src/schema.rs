//! Schema snapshot model.
//!
//! These types hold what catalog introspection found in one database: its
//! tables, their columns and their indexes. A snapshot is built once per diff
//! run and is never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the bookkeeping table used by the migration runner.
///
/// Introspection and diffing always skip it.
pub const BOOKKEEPING_TABLE: &str = "ksql_migrate_info";

/// Name MySQL gives the primary key index.
pub const PRIMARY_INDEX: &str = "PRIMARY";

/// Role a column plays in the table's keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyRole {
    /// Part of the primary key.
    Primary,
    /// First column of a unique index.
    Unique,
    /// First column of a non-unique index.
    Multiple,
    /// Not the leading column of any index.
    #[default]
    None,
}

impl KeyRole {
    /// Parses a MySQL `COLUMN_KEY` value (`PRI`, `UNI`, `MUL` or empty).
    #[must_use]
    pub fn from_column_key(key: &str) -> Self {
        match key.to_ascii_uppercase().as_str() {
            "PRI" => Self::Primary,
            "UNI" => Self::Unique,
            "MUL" => Self::Multiple,
            _ => Self::None,
        }
    }
}

/// The physical definition of one column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Bare type name, lower case (`varchar`, `int`, `datetime`).
    pub data_type: String,
    /// Full declared type (`varchar(20)`, `int unsigned`, `enum('a','b')`).
    pub column_type: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default value. `None` means no default, `Some("")` an empty string.
    pub default: Option<String>,
    /// Maximum length of character and binary types.
    pub char_length: Option<i64>,
    /// Precision of numeric types.
    pub numeric_precision: Option<i64>,
    /// Scale of numeric types.
    pub numeric_scale: Option<i64>,
    /// Fractional-second precision of temporal types.
    pub datetime_precision: Option<i64>,
    /// Key role.
    pub key: KeyRole,
    /// Whether values are generated by auto increment.
    pub auto_increment: bool,
    /// Column comment.
    pub comment: String,
    /// Raw modifier string (`auto_increment`, `on update CURRENT_TIMESTAMP`, ...).
    pub extra: String,
    /// Expression of a generated column; empty for ordinary columns.
    #[serde(default)]
    pub generation_expression: String,
}

impl ColumnDescriptor {
    /// Creates a nullable column with the given declared type.
    ///
    /// The bare type name and any length, precision or scale are parsed
    /// out of `column_type`.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        let column_type = column_type.into().trim().to_ascii_lowercase();
        let declared = DeclaredType::parse(&column_type);
        let mut column = Self {
            name: name.into(),
            data_type: declared.base.clone(),
            column_type,
            nullable: true,
            ..Self::default()
        };
        declared.apply_to(&mut column);
        column
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the key role.
    #[must_use]
    pub fn key(mut self, key: KeyRole) -> Self {
        self.key = key;
        self
    }

    /// Marks the column auto increment and records it in `extra`.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        if !self.extra.to_ascii_lowercase().contains("auto_increment") {
            self.extra = join_extra(&self.extra, "auto_increment");
        }
        self
    }

    /// Sets the column comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Sets the raw modifier string.
    #[must_use]
    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self.auto_increment = self.extra.to_ascii_lowercase().contains("auto_increment");
        self
    }

    /// Returns the `on update ...` clause carried in `extra`, if any.
    #[must_use]
    pub fn on_update(&self) -> Option<&str> {
        let lower = self.extra.to_ascii_lowercase();
        lower.find("on update").map(|pos| self.extra[pos..].trim())
    }

    /// Makes the column generated from `expression`.
    #[must_use]
    pub fn generated(mut self, expression: impl Into<String>, stored: bool) -> Self {
        self.generation_expression = expression.into();
        let kind = if stored { "STORED GENERATED" } else { "VIRTUAL GENERATED" };
        self.extra = join_extra(&self.extra, kind);
        self
    }

    /// Returns true for generated (virtual or stored) columns.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        let lower = self.extra.to_ascii_lowercase();
        lower.contains("virtual generated") || lower.contains("stored generated")
    }

    /// Returns true for stored generated columns.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.extra.to_ascii_lowercase().contains("stored generated")
    }

    /// Returns true if the default is an expression MySQL evaluates
    /// (`DEFAULT_GENERATED` in `extra`).
    #[must_use]
    pub fn has_expression_default(&self) -> bool {
        self.extra.to_ascii_uppercase().contains("DEFAULT_GENERATED")
    }
}

fn join_extra(current: &str, addition: &str) -> String {
    if current.trim().is_empty() {
        addition.to_string()
    } else {
        format!("{} {addition}", current.trim())
    }
}

/// A declared type split into its base name and numeric arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    /// Bare type name, lower case.
    pub base: String,
    /// Numeric arguments in parentheses, if any.
    pub args: Vec<i64>,
}

impl DeclaredType {
    /// Parses `varchar(20)`, `decimal(10,2)`, `int unsigned`, `datetime(3)`.
    ///
    /// Non-numeric arguments (enum members) are ignored.
    #[must_use]
    pub fn parse(declared: &str) -> Self {
        let declared = declared.trim().to_ascii_lowercase();
        let (head, args) = match declared.find('(') {
            Some(open) => {
                let close = declared.rfind(')').unwrap_or(declared.len());
                let inner = declared.get(open + 1..close).unwrap_or_default();
                let args = inner
                    .split(',')
                    .filter_map(|a| a.trim().parse::<i64>().ok())
                    .collect();
                (&declared[..open], args)
            }
            None => (declared.as_str(), Vec::new()),
        };
        let base = head
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        Self { base, args }
    }

    /// Copies the arguments into the matching length/precision fields.
    fn apply_to(&self, column: &mut ColumnDescriptor) {
        match self.base.as_str() {
            "char" | "varchar" | "binary" | "varbinary" | "character" | "nchar" | "nvarchar" => {
                column.char_length = self.args.first().copied();
            }
            "decimal" | "numeric" | "float" | "double" | "real" => {
                column.numeric_precision = self.args.first().copied();
                column.numeric_scale = self.args.get(1).copied();
            }
            "datetime" | "timestamp" | "time" => {
                column.datetime_precision = self.args.first().copied();
            }
            _ => {}
        }
    }
}

/// Kind of an index, derived from its first row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// The primary key.
    Primary,
    /// A unique index.
    Unique,
    /// A plain (non-unique) index.
    Normal,
    /// A full-text index.
    Fulltext,
    /// A spatial index.
    Spatial,
}

impl IndexKind {
    /// Derives the kind from one index row.
    #[must_use]
    pub fn of(meta: &IndexMeta) -> Self {
        if meta.index_name.eq_ignore_ascii_case(PRIMARY_INDEX) {
            return Self::Primary;
        }
        match meta.index_type.to_ascii_uppercase().as_str() {
            "FULLTEXT" => Self::Fulltext,
            "SPATIAL" => Self::Spatial,
            _ if !meta.non_unique => Self::Unique,
            _ => Self::Normal,
        }
    }
}

/// One row of an index definition: one member column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Index name.
    pub index_name: String,
    /// Table the index belongs to.
    pub table_name: String,
    /// Whether the index allows duplicates.
    pub non_unique: bool,
    /// Member column name.
    pub column_name: String,
    /// 1-based position within a composite index.
    pub seq_in_index: i64,
    /// Index method reported by the catalog (`BTREE`, `FULLTEXT`, ...).
    pub index_type: String,
    /// Index comment.
    pub comment: String,
}

impl IndexMeta {
    /// Creates an index row.
    #[must_use]
    pub fn new(
        index_name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        seq_in_index: i64,
        non_unique: bool,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            table_name: table_name.into(),
            non_unique,
            column_name: column_name.into(),
            seq_in_index,
            index_type: String::from("BTREE"),
            comment: String::new(),
        }
    }

    /// Sets the index method.
    #[must_use]
    pub fn index_type(mut self, index_type: impl Into<String>) -> Self {
        self.index_type = index_type.into();
        self
    }

    /// Sets the index comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Returned when an index row is added to an index with another name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNameMismatch {
    /// Name of the index being built.
    pub expected: String,
    /// Name carried by the rejected row.
    pub found: String,
}

impl fmt::Display for IndexNameMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index row '{}' cannot be added to index '{}'",
            self.found, self.expected
        )
    }
}

impl std::error::Error for IndexNameMismatch {}

/// An index: its rows folded together under one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    name: String,
    kind: IndexKind,
    members: Vec<IndexMeta>,
}

impl IndexDescriptor {
    /// Starts an index from its first row, which fixes the name and kind.
    #[must_use]
    pub fn new(first: IndexMeta) -> Self {
        Self {
            name: first.index_name.clone(),
            kind: IndexKind::of(&first),
            members: vec![first],
        }
    }

    /// Appends a member row. Rows for other indexes are rejected.
    pub fn push(&mut self, meta: IndexMeta) -> Result<(), IndexNameMismatch> {
        if meta.index_name != self.name {
            return Err(IndexNameMismatch {
                expected: self.name.clone(),
                found: meta.index_name,
            });
        }
        self.members.push(meta);
        Ok(())
    }

    /// Index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index kind.
    #[must_use]
    pub const fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Member rows in sequence order.
    #[must_use]
    pub fn members(&self) -> &[IndexMeta] {
        &self.members
    }

    /// Member column names in sequence order.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.column_name.as_str()).collect()
    }

    /// Comment of the first member.
    #[must_use]
    pub fn comment(&self) -> &str {
        self.members.first().map_or("", |m| m.comment.as_str())
    }
}

/// One table's structure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Storage engine (empty where the database has none).
    pub engine: String,
    /// Table collation (empty where the database has none).
    pub collation: String,
    /// Table comment.
    pub comment: String,
    /// Columns in ordinal order.
    pub columns: Vec<ColumnDescriptor>,
    /// Indexes keyed by name.
    pub indexes: BTreeMap<String, IndexDescriptor>,
}

impl TableDescriptor {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the storage engine.
    #[must_use]
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = collation.into();
        self
    }

    /// Sets the table comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.insert(index.name().to_string(), index);
        self
    }

    /// Character set: the collation up to its first underscore.
    #[must_use]
    pub fn charset(&self) -> &str {
        self.collation
            .split_once('_')
            .map_or(self.collation.as_str(), |(charset, _)| charset)
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes.get(name)
    }

    /// Primary key columns, from the primary index or else the key roles.
    #[must_use]
    pub fn primary_key(&self) -> Vec<&str> {
        if let Some(index) = self.indexes.values().find(|i| i.kind() == IndexKind::Primary) {
            return index.columns();
        }
        self.columns
            .iter()
            .filter(|c| c.key == KeyRole::Primary)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Groups index rows by index name.
    ///
    /// Rows must arrive ordered by index name then sequence, as the catalog
    /// queries return them; the first row of each name fixes the kind.
    #[must_use]
    pub fn fold_indexes(rows: Vec<IndexMeta>) -> BTreeMap<String, IndexDescriptor> {
        let mut indexes: BTreeMap<String, IndexDescriptor> = BTreeMap::new();
        for row in rows {
            match indexes.get_mut(&row.index_name) {
                Some(index) => {
                    // Same key, so the names match.
                    let _ = index.push(row);
                }
                None => {
                    indexes.insert(row.index_name.clone(), IndexDescriptor::new(row));
                }
            }
        }
        indexes
    }
}

/// Schema-level options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaOptions {
    /// Default character set.
    pub charset: String,
    /// Default collation.
    pub collation: String,
}

impl SchemaOptions {
    /// Creates schema options.
    #[must_use]
    pub fn new(charset: impl Into<String>, collation: impl Into<String>) -> Self {
        Self {
            charset: charset.into(),
            collation: collation.into(),
        }
    }
}

/// Everything introspected from one database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Database (schema) name.
    pub name: String,
    /// Schema-level options.
    pub options: SchemaOptions,
    /// Tables in catalog order.
    pub tables: Vec<TableDescriptor>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the schema options.
    #[must_use]
    pub fn options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    /// Appends a table.
    #[must_use]
    pub fn table(mut self, table: TableDescriptor) -> Self {
        self.tables.push(table);
        self
    }

    /// Looks up a table by exact name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }
}
