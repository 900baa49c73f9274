//! ksql CLI
//!
//! Command-line tool for schema diffs and migrations. This binary carries no
//! migration units; programs with their own units call
//! [`ksql_migrate::cli::run`] with their bundles.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ksql_migrate::cli::run(&[]).await
}
