//! SQLite introspection against live in-memory databases.

mod common;

use common::{memory_db, memory_db_with};
use ksql_core::schema::{IndexKind, KeyRole, BOOKKEEPING_TABLE};
use ksql_migrate::prelude::*;

const BLOG: &[&str] = &[
    "CREATE TABLE authors (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR(64) NOT NULL DEFAULT '', bio TEXT)",
    "CREATE TABLE posts (id INTEGER NOT NULL, author_id INTEGER NOT NULL, slug VARCHAR(64) NOT NULL, \
     views INT NOT NULL DEFAULT 0, PRIMARY KEY (id, author_id))",
    "CREATE UNIQUE INDEX uk_slug ON posts (slug)",
    "CREATE INDEX idx_author_views ON posts (author_id, views)",
];

#[tokio::test]
async fn empty_database_has_no_tables() {
    let db = memory_db().await;
    let snapshot = db.snapshot().await.unwrap();
    assert_eq!(snapshot.name, "main");
    assert!(snapshot.tables.is_empty());
}

#[tokio::test]
async fn columns_are_introspected() {
    let db = memory_db_with(BLOG).await;
    let snapshot = db.snapshot().await.unwrap();

    let names: Vec<&str> = snapshot.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["authors", "posts"]);

    let authors = snapshot.get_table("authors").unwrap();
    let id = authors.get_column("id").unwrap();
    assert_eq!(id.column_type, "integer");
    assert!(id.auto_increment);
    assert_eq!(id.key, KeyRole::Primary);

    let name = authors.get_column("name").unwrap();
    assert_eq!(name.column_type, "varchar(64)");
    assert_eq!(name.data_type, "varchar");
    assert_eq!(name.char_length, Some(64));
    assert!(!name.nullable);
    assert_eq!(name.default.as_deref(), Some(""));

    let bio = authors.get_column("bio").unwrap();
    assert!(bio.nullable);
    assert_eq!(bio.default, None);
}

#[tokio::test]
async fn indexes_are_introspected() {
    let db = memory_db_with(BLOG).await;
    let snapshot = db.snapshot().await.unwrap();
    let posts = snapshot.get_table("posts").unwrap();

    assert_eq!(posts.primary_key(), vec!["id", "author_id"]);
    assert!(!posts.get_column("id").unwrap().auto_increment);

    let slug = posts.get_index("uk_slug").unwrap();
    assert_eq!(slug.kind(), IndexKind::Unique);
    assert_eq!(slug.columns(), vec!["slug"]);

    let by_author = posts.get_index("idx_author_views").unwrap();
    assert_eq!(by_author.kind(), IndexKind::Normal);
    assert_eq!(by_author.columns(), vec!["author_id", "views"]);
    assert_eq!(by_author.members()[1].seq_in_index, 2);

    assert_eq!(posts.get_column("slug").unwrap().key, KeyRole::Unique);
    assert_eq!(posts.get_column("views").unwrap().key, KeyRole::None);
    assert_eq!(posts.get_column("views").unwrap().default.as_deref(), Some("0"));
}

#[tokio::test]
async fn bookkeeping_table_is_not_listed() {
    let db = memory_db_with(BLOG).await;
    MigrationHistory::new().ensure_table(&db).await.unwrap();

    assert!(db.table_exists(BOOKKEEPING_TABLE).await.unwrap());
    let snapshot = db.snapshot().await.unwrap();
    assert!(snapshot.get_table(BOOKKEEPING_TABLE).is_none());
    assert_eq!(snapshot.tables.len(), 2);
}

#[tokio::test]
async fn table_exists() {
    let db = memory_db_with(BLOG).await;
    assert!(db.table_exists("authors").await.unwrap());
    assert!(!db.table_exists("Authors_missing").await.unwrap());
}

#[tokio::test]
async fn unknown_driver_is_rejected_before_connecting() {
    let config = ConnectionConfig::new("oracle", "oracle://nowhere", "app");
    let err = Database::connect(&config, &DriverRegistry::with_defaults())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::UnknownDriver(name) if name == "oracle"));
}
