//! A connected database: pool, driver and schema name.

use std::sync::Arc;

use ksql_core::ddl::DdlDialect;
use ksql_core::schema::SchemaSnapshot;
use ksql_core::statement::Statement;
use ksql_core::value::SqlValue;
use sqlx::any::{AnyArguments, AnyPoolOptions};
use sqlx::query::Query;
use sqlx::{Any, AnyPool};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::driver::{Driver, DriverRegistry};
use crate::error::{MigrateError, Result};

/// An open connection pool bound to the driver that understands it.
///
/// The pool holds a single connection: every operation is awaited before the
/// next one starts, and an in-memory SQLite database lives exactly as long as
/// that connection.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
    driver: Arc<dyn Driver>,
    name: String,
}

impl Database {
    /// Resolves the driver and opens the pool.
    pub async fn connect(config: &ConnectionConfig, registry: &DriverRegistry) -> Result<Self> {
        let driver = registry.get(&config.driver)?;

        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&config.dsn)
            .await
            .map_err(|source| MigrateError::Connection {
                driver: config.driver.clone(),
                db_name: config.db_name.clone(),
                source,
            })?;

        info!(driver = driver.name(), db = %config.db_name, "Connected");
        Ok(Self::new(pool, driver, config.db_name.clone()))
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool, driver: Arc<dyn Driver>, name: impl Into<String>) -> Self {
        Self {
            pool,
            driver,
            name: name.into(),
        }
    }

    /// The connection pool.
    #[must_use]
    pub const fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// The driver.
    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// The driver's DDL dialect.
    #[must_use]
    pub fn dialect(&self) -> &dyn DdlDialect {
        self.driver.dialect()
    }

    /// Database (schema) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Introspects the schema.
    pub async fn snapshot(&self) -> Result<SchemaSnapshot> {
        self.driver.snapshot(&self.pool, &self.name).await
    }

    /// Returns true if `table` exists.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        self.driver.table_exists(&self.pool, &self.name, table).await
    }

    /// Executes a statement with its binds. Returns the affected row count.
    pub async fn execute(&self, statement: &dyn Statement) -> Result<u64> {
        let sql = statement.prepare();
        let binds = statement.binds();
        debug!(sql = %sql, binds = binds.len(), "Executing SQL");

        let query = binds.into_iter().fold(sqlx::query(&sql), bind_value);
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Executes raw SQL text without binds.
    pub async fn execute_sql(&self, sql: &str) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("driver", &self.driver.name())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::Int(v) => query.bind(v),
        SqlValue::Float(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
    }
}
