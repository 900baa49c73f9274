//! Example: Blog Application Migrations
//!
//! A program that carries its own migration units and exposes them through
//! the `ksql` command line.
//!
//! Run with:
//!
//! ```bash
//! cargo run --example blog_migrations -p ksql-migrate -- \
//!     migplug up --driver sqlite --dsn sqlite://blog.db?mode=rwc --db main
//! cargo run --example blog_migrations -p ksql-migrate -- \
//!     migplug show --driver sqlite --dsn sqlite://blog.db --db main
//! ```

use ksql_migrate::prelude::*;

// =============================================================================
// Migration Definitions
// =============================================================================

fn m20240101000000_create_users() -> Box<dyn MigrationUnit> {
    Box::new(
        SqlMigration::new(20_240_101_000_000, "create users", "0.1.0")
            .up(
                "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 username VARCHAR(100) NOT NULL, email VARCHAR(255) NOT NULL, \
                 created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            )
            .up("CREATE UNIQUE INDEX uk_username ON users (username)")
            .down("DROP TABLE users"),
    )
}

fn m20240102000000_create_posts() -> Box<dyn MigrationUnit> {
    Box::new(
        SqlMigration::new(20_240_102_000_000, "create posts", "0.1.0")
            .up(
                "CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 author_id INTEGER NOT NULL, title VARCHAR(200) NOT NULL, body TEXT)",
            )
            .up("CREATE INDEX idx_author ON posts (author_id)")
            .down("DROP TABLE posts"),
    )
}

/// Adds a column and backfills it with a bound statement.
struct AddPostStatus;

impl MigrationUnit for AddPostStatus {
    fn id(&self) -> u64 {
        20_240_201_000_000
    }

    fn name(&self) -> &str {
        "add post status"
    }

    fn version(&self) -> &str {
        "0.2.0"
    }

    fn up<'a>(&'a self, ctx: &'a MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.execute_sql("ALTER TABLE posts ADD COLUMN status VARCHAR(16)")
                .await?;
            let backfill = ksql_core::Query::new("UPDATE posts SET status = ? WHERE status IS NULL")
                .bind("published");
            let rows = ctx.execute(&backfill).await?;
            tracing::info!(rows, "Backfilled post status");
            Ok(())
        })
    }

    fn down<'a>(&'a self, ctx: &'a MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.execute_sql("ALTER TABLE posts DROP COLUMN status").await?;
            Ok(())
        })
    }
}

fn m20240201000000_add_post_status() -> Box<dyn MigrationUnit> {
    Box::new(AddPostStatus)
}

// =============================================================================
// Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let blog = UnitBundle::new("blog")
        .unit(m20240101000000_create_users)
        .unit(m20240102000000_create_posts)
        .unit(m20240201000000_add_post_status);

    ksql_migrate::cli::run(&[&blog]).await
}
