//! Structural diffing of schema snapshots.
//!
//! - [`detect`]: field-by-field comparison predicates
//! - [`table`]: [`ChangeSet`] between two tables
//! - [`schema`]: ordered [`SchemaChange`]s between two snapshots

pub mod detect;
pub mod schema;
pub mod table;

pub use detect::{column_changed, index_changed, index_descriptor_changed, table_options_changed};
pub use schema::{diff_schemas, diff_table, SchemaChange};
pub use table::{ChangeSet, ColumnChange, TableOptionsChange};
