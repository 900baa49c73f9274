//! Diff runner.
//!
//! Snapshots two databases, compares them and either hands the resulting DDL
//! to [`crate::output`] or executes it against the `from` database.

use std::time::Instant;

use ksql_core::ddl::DdlStatement;
use ksql_core::diff::{diff_schemas, SchemaChange};
use ksql_core::schema::SchemaSnapshot;
use tracing::{info, warn};

use crate::database::Database;
use crate::error::Result;

/// Everything one diff run produced.
#[derive(Debug, Clone)]
pub struct SchemaDiff {
    /// Snapshot of the database being changed.
    pub from: SchemaSnapshot,
    /// Snapshot of the database it should come to match.
    pub to: SchemaSnapshot,
    /// Structural changes, in application order.
    pub changes: Vec<SchemaChange>,
    /// DDL in the `from` database's dialect.
    pub statements: Vec<DdlStatement>,
}

impl SchemaDiff {
    /// Returns true if both schemas match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Statements that can be sent to the database.
    pub fn executable(&self) -> impl Iterator<Item = &DdlStatement> {
        self.statements.iter().filter(|s| s.is_executable())
    }

    /// Changes that turn the `to` schema back into the `from` schema.
    ///
    /// They run against the `from` database after it was migrated, so any
    /// schema-level change names `from` rather than `to`.
    #[must_use]
    pub fn reverse_changes(&self) -> Vec<SchemaChange> {
        let mut migrated = self.to.clone();
        migrated.name.clone_from(&self.from.name);
        diff_schemas(&migrated, &self.from)
    }
}

/// Computes the DDL that turns `from` into `to`.
///
/// Any introspection failure aborts the run.
pub async fn diff_databases(from: &Database, to: &Database) -> Result<SchemaDiff> {
    let started = Instant::now();
    let from_snapshot = from.snapshot().await?;
    let to_snapshot = to.snapshot().await?;
    Ok(diff_snapshots(from, from_snapshot, to_snapshot, started))
}

fn diff_snapshots(
    from: &Database,
    from_snapshot: SchemaSnapshot,
    to_snapshot: SchemaSnapshot,
    started: Instant,
) -> SchemaDiff {
    let changes = diff_schemas(&from_snapshot, &to_snapshot);
    let statements = from.dialect().emit_all(&changes);
    info!(
        from = %from_snapshot.name,
        to = %to_snapshot.name,
        changes = changes.len(),
        statements = statements.len(),
        elapsed = ?started.elapsed(),
        "Schema diff computed"
    );
    SchemaDiff {
        from: from_snapshot,
        to: to_snapshot,
        changes,
        statements,
    }
}

/// Executes statements in order against `db`, skipping comments.
///
/// Stops at the first failing statement. Returns the number executed.
pub async fn apply(db: &Database, statements: &[DdlStatement]) -> Result<usize> {
    let mut executed = 0;
    for statement in statements {
        if !statement.is_executable() {
            warn!(comment = %statement, "Skipping comment (unsupported operation)");
            continue;
        }
        db.execute(statement).await?;
        executed += 1;
    }
    info!(db = %db.name(), executed, "Schema changes applied");
    Ok(executed)
}
