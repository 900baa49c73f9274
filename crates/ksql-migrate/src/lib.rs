//! Schema diffing and plugin-based migrations for MySQL-family databases.
//!
//! `ksql-migrate` connects to live databases through sqlx and puts the pure
//! model of [`ksql_core`] to work:
//! - **Drivers** introspect a database into a [`SchemaSnapshot`](ksql_core::SchemaSnapshot)
//!   (MySQL via `information_schema`, SQLite via `sqlite_master` and pragmas)
//! - **Differ** compares two databases and writes or applies the DDL that
//!   turns one into the other
//! - **Runner** applies and reverts compiled-in migration units, recording
//!   each one in the `ksql_migrate_info` bookkeeping table
//! - **Codegen** writes the Rust source of a new unit from a diff
//!
//! # Example
//!
//! ```rust,no_run
//! use ksql_migrate::prelude::*;
//!
//! fn add_users() -> Box<dyn MigrationUnit> {
//!     Box::new(
//!         SqlMigration::new(20_240_501_102_030, "add users", "0.1.0")
//!             .up("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
//!             .down("DROP TABLE users"),
//!     )
//! }
//!
//! # async fn run() -> ksql_migrate::Result<()> {
//! let db = Database::connect(&ConnectionConfig::sqlite_memory(), &DriverRegistry::with_defaults()).await?;
//! let mut registry = MigrationRegistry::new();
//! registry.load(&UnitBundle::new("app").unit(add_users))?;
//!
//! let report = MigrationRunner::new(db, registry).up().await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Write the DDL that turns app_dev into app_prod
//! ksql diff --from-dsn mysql://root@localhost/app_dev --from-db app_dev \
//!     --to-dsn mysql://root@localhost/app_prod --to-db app_prod
//!
//! # Apply compiled-in units
//! ksql migplug up --dsn mysql://root@localhost/app --db app
//! ```

pub mod bundle;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod database;
pub mod differ;
pub mod driver;
pub mod error;
pub mod history;
pub mod output;
pub mod runner;

pub use error::{MigrateError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::bundle::{MigrationBundle, UnitBundle};
    pub use crate::config::ConnectionConfig;
    pub use crate::database::Database;
    pub use crate::differ::{apply, diff_databases, SchemaDiff};
    pub use crate::driver::{BoxFuture, Driver, DriverRegistry};
    pub use crate::error::{MigrateError, Result};
    pub use crate::history::{MigrationHistory, MigrationRecord};
    pub use crate::runner::{
        FailurePolicy, MigrationContext, MigrationRegistry, MigrationReport, MigrationRunner,
        MigrationUnit, SqlMigration, UnitStatus,
    };
}
