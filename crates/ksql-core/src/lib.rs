//! # ksql-core
//!
//! Schema model, structural differ and DDL emission for ksql.
//!
//! This crate does no I/O. It provides:
//! - [`schema`]: snapshots of tables, columns and indexes as introspected
//!   from a database
//! - [`diff`]: comparison of two snapshots into ordered [`SchemaChange`]s
//! - [`ddl`]: dialects rendering those changes as single-line DDL
//! - [`statement`]: the [`Statement`] abstraction shared with the runner
//!
//! ## Diffing two schemas
//!
//! ```rust
//! use ksql_core::ddl::{DdlDialect, MySqlDialect};
//! use ksql_core::diff::diff_schemas;
//! use ksql_core::schema::{ColumnDescriptor, SchemaSnapshot, TableDescriptor};
//!
//! let from = SchemaSnapshot::new("app").table(
//!     TableDescriptor::new("t1").column(ColumnDescriptor::new("name", "varchar(10)")),
//! );
//! let to = SchemaSnapshot::new("app").table(
//!     TableDescriptor::new("t1").column(ColumnDescriptor::new("name", "varchar(20)")),
//! );
//!
//! let statements = MySqlDialect::new().emit_all(&diff_schemas(&from, &to));
//! assert_eq!(
//!     statements[0].sql(),
//!     "ALTER TABLE `t1` MODIFY COLUMN `name` varchar(20) NULL"
//! );
//! ```

pub mod ddl;
pub mod diff;
pub mod schema;
pub mod statement;
pub mod value;

pub use ddl::{DdlDialect, DdlKind, DdlStatement, MySqlDialect, SqliteDialect};
pub use diff::{diff_schemas, diff_table, ChangeSet, SchemaChange};
pub use schema::{
    ColumnDescriptor, IndexDescriptor, IndexKind, IndexMeta, KeyRole, SchemaOptions,
    SchemaSnapshot, TableDescriptor, BOOKKEEPING_TABLE,
};
pub use statement::{render_inline, Query, Statement};
pub use value::{SqlValue, ToSqlValue};
