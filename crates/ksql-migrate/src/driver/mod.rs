//! Database drivers.
//!
//! A [`Driver`] knows how to read one engine's catalog into a
//! [`SchemaSnapshot`] and which [`DdlDialect`] renders changes for it.
//! Drivers are looked up once by name in a [`DriverRegistry`].

mod mysql;
mod sqlite;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ksql_core::ddl::{DdlDialect, DdlStatement};
use ksql_core::diff;
use ksql_core::schema::{SchemaOptions, SchemaSnapshot, TableDescriptor};
use sqlx::AnyPool;

pub use mysql::MySqlDriver;
pub use sqlite::SqliteDriver;

use crate::error::{MigrateError, Result};

/// A boxed future used by the dyn-compatible async traits of this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Catalog introspection and DDL for one database engine.
pub trait Driver: Send + Sync {
    /// Registered name (`mysql`, `sqlite`).
    fn name(&self) -> &'static str;

    /// DDL dialect for this engine.
    fn dialect(&self) -> &dyn DdlDialect;

    /// Lists every table of `db_name` except the bookkeeping table, ordered
    /// by name, with columns in ordinal order and indexes folded by name.
    fn list_tables<'a>(
        &'a self,
        pool: &'a AnyPool,
        db_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<TableDescriptor>>>;

    /// Default character set and collation of `db_name`.
    fn schema_options<'a>(
        &'a self,
        pool: &'a AnyPool,
        db_name: &'a str,
    ) -> BoxFuture<'a, Result<SchemaOptions>>;

    /// Returns true if `table` exists in `db_name`.
    fn table_exists<'a>(
        &'a self,
        pool: &'a AnyPool,
        db_name: &'a str,
        table: &'a str,
    ) -> BoxFuture<'a, Result<bool>>;

    /// Introspects the whole schema.
    fn snapshot<'a>(
        &'a self,
        pool: &'a AnyPool,
        db_name: &'a str,
    ) -> BoxFuture<'a, Result<SchemaSnapshot>> {
        Box::pin(async move {
            let options = self.schema_options(pool, db_name).await?;
            let tables = self.list_tables(pool, db_name).await?;
            Ok(SchemaSnapshot {
                name: db_name.to_string(),
                options,
                tables,
            })
        })
    }

    /// DDL turning the `from` schema into the `to` schema.
    fn diff_schema(&self, from: &SchemaSnapshot, to: &SchemaSnapshot) -> Vec<DdlStatement> {
        self.dialect().emit_all(&diff::diff_schemas(from, to))
    }

    /// DDL for a single table; either side may be absent.
    fn diff_table(
        &self,
        from: Option<&TableDescriptor>,
        to: Option<&TableDescriptor>,
    ) -> Vec<DdlStatement> {
        diff::diff_table(from, to)
            .map(|change| self.dialect().emit(&change))
            .unwrap_or_default()
    }
}

/// Drivers keyed by name.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the MySQL and SQLite drivers.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(MySqlDriver::new());
        registry.register(SqliteDriver::new());
        registry
    }

    /// Registers a driver under its name, replacing any previous one.
    pub fn register(&mut self, driver: impl Driver + 'static) {
        self.drivers
            .insert(driver.name().to_string(), Arc::new(driver));
    }

    /// Looks up a driver by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| MigrateError::UnknownDriver(name.to_string()))
    }

    /// Registered driver names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
