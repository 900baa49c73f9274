//! Migration runner against live in-memory SQLite databases.

mod common;

use std::sync::{Arc, Mutex};

use common::{count_tables, memory_db};
use ksql_core::schema::BOOKKEEPING_TABLE;
use ksql_migrate::prelude::*;

/// A unit that records each action it runs into a shared log.
struct Recorder {
    id: u64,
    log: Arc<Mutex<Vec<(&'static str, u64)>>>,
}

impl MigrationUnit for Recorder {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        "recorder"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn up<'a>(&'a self, _ctx: &'a MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(("up", self.id));
            Ok(())
        })
    }

    fn down<'a>(&'a self, _ctx: &'a MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(("down", self.id));
            Ok(())
        })
    }
}

fn users() -> SqlMigration {
    SqlMigration::new(1, "users", "0.1.0")
        .up("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
        .down("DROP TABLE users")
}

fn broken() -> SqlMigration {
    SqlMigration::new(2, "broken", "0.1.0").up("CREATE TABLE (").down("DROP TABLE nowhere")
}

fn posts() -> SqlMigration {
    SqlMigration::new(3, "posts", "0.2.0")
        .up("CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT)")
        .down("DROP TABLE posts")
}

#[tokio::test]
async fn bookkeeping_table_is_created_once() {
    let db = memory_db().await;

    let history = MigrationHistory::new();
    history.ensure_table(&db).await.unwrap();
    history.ensure_table(&db).await.unwrap();
    // A fresh manager must find the existing table rather than recreate it.
    MigrationHistory::new().ensure_table(&db).await.unwrap();

    assert_eq!(count_tables(&db, BOOKKEEPING_TABLE).await, 1);
    assert!(MigrationHistory::new().list(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_records_round_trip() {
    let db = memory_db().await;
    let history = MigrationHistory::new();

    history.insert(&db, 20_240_501_102_030, "add users", "0.1.0").await.unwrap();
    assert!(history.has(&db, 20_240_501_102_030).await.unwrap());
    assert!(!history.has(&db, 7).await.unwrap());

    let records = history.list(&db).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].migrate_id, 20_240_501_102_030);
    assert_eq!(records[0].name, "add users");
    assert_eq!(records[0].version, "0.1.0");
    assert!(records[0].is_migrated());

    assert!(history.delete(&db, 20_240_501_102_030).await.unwrap());
    assert!(!history.delete(&db, 20_240_501_102_030).await.unwrap());
    assert!(history.list(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn units_run_in_ascending_id_order() {
    let db = memory_db().await;
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut registry = MigrationRegistry::new();
    registry
        .register(Recorder { id: 100, log: Arc::clone(&log) })
        .unwrap();
    registry
        .register(Recorder { id: 50, log: Arc::clone(&log) })
        .unwrap();
    let runner = MigrationRunner::new(db.clone(), registry);

    let report = runner.up().await.unwrap();
    assert_eq!(report.applied, vec![50, 100]);
    assert!(runner.has(50).await.unwrap());
    assert!(runner.has(100).await.unwrap());

    // Applied units are not run again.
    let report = runner.up().await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped, vec![50, 100]);

    let report = runner.down().await.unwrap();
    assert_eq!(report.applied, vec![50, 100]);
    assert!(MigrationHistory::new().list(&db).await.unwrap().is_empty());

    assert_eq!(
        *log.lock().unwrap(),
        vec![("up", 50), ("up", 100), ("down", 50), ("down", 100)]
    );
}

#[tokio::test]
async fn failing_unit_does_not_stop_the_batch() {
    let db = memory_db().await;
    let mut registry = MigrationRegistry::new();
    registry.register(users()).unwrap();
    registry.register(broken()).unwrap();
    registry.register(posts()).unwrap();
    let runner = MigrationRunner::new(db.clone(), registry);

    let report = runner.up().await.unwrap();
    assert_eq!(report.applied, vec![1, 3]);
    assert_eq!(report.failed, vec![2]);
    assert!(!report.is_success());

    assert!(db.table_exists("users").await.unwrap());
    assert!(db.table_exists("posts").await.unwrap());
    assert!(!runner.has(2).await.unwrap());

    let status = runner.status().await.unwrap();
    let applied: Vec<(u64, bool)> = status.iter().map(|s| (s.id, s.is_applied())).collect();
    assert_eq!(applied, vec![(1, true), (2, false), (3, true)]);
}

#[tokio::test]
async fn strict_policy_stops_at_the_first_failure() {
    let db = memory_db().await;
    let mut registry = MigrationRegistry::new();
    registry.register(users()).unwrap();
    registry.register(broken()).unwrap();
    registry.register(posts()).unwrap();
    let runner = MigrationRunner::new(db.clone(), registry).policy(FailurePolicy::Abort);

    let err = runner.up().await.unwrap_err();
    assert!(matches!(err, MigrateError::UnitFailed { id: 2, .. }));

    assert!(runner.has(1).await.unwrap());
    assert!(!runner.has(3).await.unwrap());
    assert!(!db.table_exists("posts").await.unwrap());
}

#[tokio::test]
async fn down_reverts_only_applied_units() {
    let db = memory_db().await;
    let mut registry = MigrationRegistry::new();
    registry.register(users()).unwrap();
    registry.register(posts()).unwrap();
    let runner = MigrationRunner::new(db.clone(), registry);

    runner.create(&users()).await.unwrap();
    db.execute_sql("CREATE TABLE users (id INTEGER PRIMARY KEY)").await.unwrap();

    let report = runner.down().await.unwrap();
    assert_eq!(report.applied, vec![1]);
    assert_eq!(report.skipped, vec![3]);
    assert!(!db.table_exists("users").await.unwrap());
}

#[tokio::test]
async fn create_records_without_running() {
    let db = memory_db().await;
    let runner = MigrationRunner::new(db.clone(), MigrationRegistry::new());

    assert!(runner.create(&users()).await.unwrap());
    assert!(!runner.create(&users()).await.unwrap());

    assert!(runner.has(1).await.unwrap());
    assert!(!db.table_exists("users").await.unwrap());
    assert_eq!(MigrationHistory::new().list(&db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn bundles_feed_the_runner() {
    fn first() -> Box<dyn MigrationUnit> {
        Box::new(users())
    }
    fn second() -> Box<dyn MigrationUnit> {
        Box::new(posts())
    }

    let db = memory_db().await;
    let bundle = UnitBundle::new("blog").unit(second).unit(first);
    let mut registry = MigrationRegistry::new();
    registry.load(&bundle).unwrap();

    let report = MigrationRunner::new(db.clone(), registry).up().await.unwrap();
    assert_eq!(report.applied, vec![1, 3]);
    assert!(db.table_exists("posts").await.unwrap());
}

/// A unit whose own work removes the bookkeeping table.
struct DropsBookkeeping;

impl MigrationUnit for DropsBookkeeping {
    fn id(&self) -> u64 {
        7
    }

    fn name(&self) -> &str {
        "drops bookkeeping"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn up<'a>(&'a self, ctx: &'a MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.execute_sql("CREATE TABLE audit (id INTEGER PRIMARY KEY)").await?;
            ctx.execute_sql(&format!("DROP TABLE {BOOKKEEPING_TABLE}")).await?;
            Ok(())
        })
    }

    fn down<'a>(&'a self, _ctx: &'a MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test]
async fn failed_bookkeeping_write_still_counts_as_applied() {
    let db = memory_db().await;
    let mut registry = MigrationRegistry::new();
    registry.register(DropsBookkeeping).unwrap();

    let report = MigrationRunner::new(db.clone(), registry).up().await.unwrap();
    assert_eq!(report.applied, vec![7]);
    assert!(report.failed.is_empty());
    assert!(report.is_success());

    assert!(db.table_exists("audit").await.unwrap());
    assert_eq!(count_tables(&db, BOOKKEEPING_TABLE).await, 0);
}
