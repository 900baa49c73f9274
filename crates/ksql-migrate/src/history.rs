//! Migration history tracking.
//!
//! This module manages the `ksql_migrate_info` bookkeeping table that records
//! which migration units have been applied to a database.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDateTime, Utc};
use ksql_core::schema::{ColumnDescriptor, IndexDescriptor, IndexMeta, KeyRole, TableDescriptor};
use ksql_core::statement::Query;
use ksql_core::BOOKKEEPING_TABLE;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::error::{MigrateError, Result};

/// `status` value of an applied unit.
pub const STATUS_MIGRATED: i64 = 0;

/// `status` value of a unit that is recorded but not applied.
pub const STATUS_NOT_MIGRATED: i64 = 1;

/// Unique index on `migrate_id`.
pub const MIGRATE_ID_INDEX: &str = "uk_migrate_id";

/// The bookkeeping table definition.
#[must_use]
pub fn bookkeeping_table() -> TableDescriptor {
    let table = BOOKKEEPING_TABLE;
    TableDescriptor::new(table)
        .engine("InnoDB")
        .collation("utf8mb4_general_ci")
        .comment("ksql migration history")
        .column(
            ColumnDescriptor::new("id", "bigint unsigned")
                .not_null()
                .key(KeyRole::Primary)
                .auto_increment(),
        )
        .column(
            ColumnDescriptor::new("migrate_id", "bigint unsigned")
                .not_null()
                .key(KeyRole::Unique)
                .comment("migration unit id"),
        )
        .column(
            ColumnDescriptor::new("name", "varchar(255)")
                .not_null()
                .default_value(""),
        )
        .column(
            ColumnDescriptor::new("status", "tinyint")
                .not_null()
                .default_value("0")
                .comment("0=migrated,1=not migrated"),
        )
        .column(
            ColumnDescriptor::new("version", "varchar(64)")
                .not_null()
                .default_value(""),
        )
        .column(
            ColumnDescriptor::new("create_time", "timestamp")
                .not_null()
                .default_value("CURRENT_TIMESTAMP"),
        )
        .column(
            ColumnDescriptor::new("update_time", "timestamp")
                .not_null()
                .default_value("CURRENT_TIMESTAMP")
                .extra("on update CURRENT_TIMESTAMP"),
        )
        .index(IndexDescriptor::new(IndexMeta::new("PRIMARY", table, "id", 1, false)))
        .index(IndexDescriptor::new(IndexMeta::new(
            MIGRATE_ID_INDEX,
            table,
            "migrate_id",
            1,
            false,
        )))
}

/// A row of the bookkeeping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    /// Row id.
    pub id: i64,
    /// Id of the migration unit.
    pub migrate_id: u64,
    /// Unit name.
    pub name: String,
    /// `STATUS_MIGRATED` or `STATUS_NOT_MIGRATED`.
    pub status: i64,
    /// Unit version.
    pub version: String,
    /// When the record was written.
    pub create_time: DateTime<Utc>,
    /// When the record last changed.
    pub update_time: DateTime<Utc>,
}

impl MigrationRecord {
    /// Returns true if the unit is recorded as applied.
    #[must_use]
    pub const fn is_migrated(&self) -> bool {
        self.status == STATUS_MIGRATED
    }
}

type RecordRow = (i64, i64, String, i64, String, String, String);

/// Manages the bookkeeping table of one database.
#[derive(Debug, Default)]
pub struct MigrationHistory {
    ready: AtomicBool,
}

impl MigrationHistory {
    /// Creates a history manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the bookkeeping table unless it already exists.
    ///
    /// The existence check runs once per manager; later calls return at once.
    pub async fn ensure_table(&self, db: &Database) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        if db.table_exists(BOOKKEEPING_TABLE).await? {
            debug!(table = BOOKKEEPING_TABLE, "Bookkeeping table present");
        } else {
            info!(table = BOOKKEEPING_TABLE, "Creating bookkeeping table");
            for statement in db.dialect().create_table(&bookkeeping_table()) {
                if !statement.is_executable() {
                    warn!(comment = %statement, "Skipping comment (unsupported operation)");
                    continue;
                }
                db.execute(&statement).await?;
            }
        }

        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Returns true if a record exists for `migrate_id`.
    pub async fn has(&self, db: &Database, migrate_id: u64) -> Result<bool> {
        self.ensure_table(db).await?;
        let (count,): (i64,) = sqlx::query_as(
            "SELECT CAST(COUNT(*) AS SIGNED) FROM ksql_migrate_info WHERE migrate_id = ?",
        )
        .bind(stored_id(migrate_id)?)
        .fetch_one(db.pool())
        .await?;
        Ok(count > 0)
    }

    /// Records a unit as applied.
    pub async fn insert(&self, db: &Database, migrate_id: u64, name: &str, version: &str) -> Result<()> {
        self.ensure_table(db).await?;
        let statement = Query::new(
            "INSERT INTO ksql_migrate_info (migrate_id, name, status, version) VALUES (?, ?, ?, ?)",
        )
        .bind(stored_id(migrate_id)?)
        .bind(name)
        .bind(STATUS_MIGRATED)
        .bind(version);
        db.execute(&statement).await?;
        Ok(())
    }

    /// Removes the record of a unit. Returns true if one was removed.
    pub async fn delete(&self, db: &Database, migrate_id: u64) -> Result<bool> {
        self.ensure_table(db).await?;
        let statement =
            Query::new("DELETE FROM ksql_migrate_info WHERE migrate_id = ?").bind(stored_id(migrate_id)?);
        Ok(db.execute(&statement).await? > 0)
    }

    /// All records, ordered by unit id.
    pub async fn list(&self, db: &Database) -> Result<Vec<MigrationRecord>> {
        self.ensure_table(db).await?;
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT CAST(id AS SIGNED), CAST(migrate_id AS SIGNED), name, CAST(status AS SIGNED), \
             version, CAST(create_time AS CHAR), CAST(update_time AS CHAR) \
             FROM ksql_migrate_info ORDER BY migrate_id",
        )
        .fetch_all(db.pool())
        .await?;

        rows.into_iter()
            .map(|(id, migrate_id, name, status, version, created, updated)| {
                Ok(MigrationRecord {
                    id,
                    migrate_id: u64::try_from(migrate_id)
                        .map_err(|_| MigrateError::InvalidMigrationId(migrate_id.to_string()))?,
                    name,
                    status,
                    version,
                    create_time: parse_timestamp(&created)?,
                    update_time: parse_timestamp(&updated)?,
                })
            })
            .collect()
    }
}

/// Converts a unit id to the signed integer the portable driver layer binds.
pub(crate) fn stored_id(migrate_id: u64) -> Result<i64> {
    i64::try_from(migrate_id).map_err(|_| MigrateError::InvalidMigrationId(migrate_id.to_string()))
}

/// Reads a timestamp column. MySQL returns `2024-05-01 10:20:30` (with a
/// fraction when the column has one), SQLite whatever text was stored.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|dt| dt.and_utc())
        .ok_or_else(|| MigrateError::InvalidTimestamp(value.to_string()))
}
