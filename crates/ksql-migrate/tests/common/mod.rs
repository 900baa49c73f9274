#![allow(dead_code)]

use ksql_migrate::prelude::*;

/// A fresh in-memory SQLite database.
pub async fn memory_db() -> Database {
    Database::connect(&ConnectionConfig::sqlite_memory(), &DriverRegistry::with_defaults())
        .await
        .unwrap_or_else(|e| panic!("Failed to open in-memory database: {e}"))
}

/// A fresh in-memory SQLite database with `sql` already executed.
pub async fn memory_db_with(sql: &[&str]) -> Database {
    let db = memory_db().await;
    for statement in sql {
        db.execute_sql(statement)
            .await
            .unwrap_or_else(|e| panic!("Failed to execute: {statement}\nError: {e}"));
    }
    db
}

/// Number of tables named `name`.
pub async fn count_tables(db: &Database, name: &str) -> i64 {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_one(db.pool())
            .await
            .unwrap();
    count
}
