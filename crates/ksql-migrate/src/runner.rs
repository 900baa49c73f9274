//! Migration runner.
//!
//! Units are kept in a [`MigrationRegistry`] ordered by id. The
//! [`MigrationRunner`] applies (`up`) or reverts (`down`) them against one
//! database, using the bookkeeping table to know which are applied.
//!
//! Each unit's action and its bookkeeping write are separate operations. A
//! failing unit is logged and, under [`FailurePolicy::Continue`], the batch
//! goes on with the next unit.

use std::collections::BTreeMap;
use std::time::Instant;

use ksql_core::statement::Statement;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::bundle::MigrationBundle;
use crate::database::Database;
use crate::driver::BoxFuture;
use crate::error::{MigrateError, Result};
use crate::history::{stored_id, MigrationHistory, MigrationRecord};

/// Handle passed to units while they run.
#[derive(Debug)]
pub struct MigrationContext {
    db: Database,
}

impl MigrationContext {
    /// Wraps a database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// The database being migrated.
    #[must_use]
    pub const fn db(&self) -> &Database {
        &self.db
    }

    /// Executes a statement with its binds.
    pub async fn execute(&self, statement: &dyn Statement) -> Result<u64> {
        self.db.execute(statement).await
    }

    /// Executes raw SQL. Lines starting with `--` are skipped.
    pub async fn execute_sql(&self, sql: &str) -> Result<u64> {
        if sql.trim_start().starts_with("--") {
            warn!(comment = %sql, "Skipping comment (unsupported operation)");
            return Ok(0);
        }
        self.db.execute_sql(sql).await
    }
}

/// One migration: an id, a name, a version and two actions.
pub trait MigrationUnit: Send + Sync {
    /// Unique id. Units run in ascending id order.
    fn id(&self) -> u64;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Version the unit belongs to.
    fn version(&self) -> &str;

    /// Applies the unit.
    fn up<'a>(&'a self, ctx: &'a MigrationContext) -> BoxFuture<'a, Result<()>>;

    /// Reverts the unit.
    fn down<'a>(&'a self, ctx: &'a MigrationContext) -> BoxFuture<'a, Result<()>>;
}

/// A unit made of plain SQL statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    id: u64,
    name: String,
    version: String,
    up: Vec<String>,
    down: Vec<String>,
}

impl SqlMigration {
    /// Creates a unit with no statements.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            version: version.into(),
            up: Vec::new(),
            down: Vec::new(),
        }
    }

    /// Appends a statement to the `up` action.
    #[must_use]
    pub fn up(mut self, sql: impl Into<String>) -> Self {
        self.up.push(sql.into());
        self
    }

    /// Appends a statement to the `down` action.
    #[must_use]
    pub fn down(mut self, sql: impl Into<String>) -> Self {
        self.down.push(sql.into());
        self
    }

    /// Statements of the `up` action.
    #[must_use]
    pub fn up_sql(&self) -> &[String] {
        &self.up
    }

    /// Statements of the `down` action.
    #[must_use]
    pub fn down_sql(&self) -> &[String] {
        &self.down
    }

    async fn run_all(statements: &[String], ctx: &MigrationContext) -> Result<()> {
        for sql in statements {
            ctx.execute_sql(sql).await?;
        }
        Ok(())
    }
}

impl MigrationUnit for SqlMigration {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn up<'a>(&'a self, ctx: &'a MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(Self::run_all(&self.up, ctx))
    }

    fn down<'a>(&'a self, ctx: &'a MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(Self::run_all(&self.down, ctx))
    }
}

/// Registered units, keyed and ordered by id.
#[derive(Default)]
pub struct MigrationRegistry {
    units: BTreeMap<u64, Box<dyn MigrationUnit>>,
}

impl MigrationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a unit.
    ///
    /// Fails if the id is taken or cannot be stored in the bookkeeping table.
    pub fn register(&mut self, unit: impl MigrationUnit + 'static) -> Result<()> {
        self.register_boxed(Box::new(unit))
    }

    /// Registers a boxed unit.
    pub fn register_boxed(&mut self, unit: Box<dyn MigrationUnit>) -> Result<()> {
        let id = unit.id();
        stored_id(id)?;
        if self.units.contains_key(&id) {
            return Err(MigrateError::DuplicateMigration(id));
        }
        self.units.insert(id, unit);
        Ok(())
    }

    /// Lets a bundle register its units.
    pub fn load(&mut self, bundle: &dyn MigrationBundle) -> Result<()> {
        let before = self.units.len();
        bundle.register(self)?;
        info!(
            bundle = bundle.name(),
            units = self.units.len() - before,
            "Loaded migration bundle"
        );
        Ok(())
    }

    /// Looks up a unit by id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&dyn MigrationUnit> {
        self.units.get(&id).map(Box::as_ref)
    }

    /// Units in ascending id order.
    pub fn units(&self) -> impl Iterator<Item = &dyn MigrationUnit> {
        self.units.values().map(Box::as_ref)
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if no unit is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.units.keys()).finish()
    }
}

/// What to do when a unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and go on with the next unit.
    #[default]
    Continue,
    /// Stop and return [`MigrateError::UnitFailed`].
    Abort,
}

/// Outcome of an `up` or `down` batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Units whose action ran.
    pub applied: Vec<u64>,
    /// Units already in the wanted state.
    pub skipped: Vec<u64>,
    /// Units whose action failed.
    pub failed: Vec<u64>,
}

impl MigrationReport {
    /// Returns true if no unit failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A registered unit and its bookkeeping record, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitStatus {
    /// Unit id.
    pub id: u64,
    /// Unit name.
    pub name: String,
    /// Unit version.
    pub version: String,
    /// Bookkeeping record; `None` when not applied.
    pub record: Option<MigrationRecord>,
}

impl UnitStatus {
    /// Returns true if the unit is recorded as applied.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.record.is_some()
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Up,
    Down,
}

/// Applies and reverts registered units against one database.
#[derive(Debug)]
pub struct MigrationRunner {
    ctx: MigrationContext,
    registry: MigrationRegistry,
    history: MigrationHistory,
    policy: FailurePolicy,
}

impl MigrationRunner {
    /// Creates a runner with the default (continue) failure policy.
    #[must_use]
    pub fn new(db: Database, registry: MigrationRegistry) -> Self {
        Self {
            ctx: MigrationContext::new(db),
            registry,
            history: MigrationHistory::new(),
            policy: FailurePolicy::default(),
        }
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The context handed to units.
    #[must_use]
    pub const fn context(&self) -> &MigrationContext {
        &self.ctx
    }

    /// The registry.
    #[must_use]
    pub const fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Applies every unit without a record, in ascending id order.
    pub async fn up(&self) -> Result<MigrationReport> {
        self.run(Direction::Up).await
    }

    /// Reverts every unit with a record, in ascending id order.
    pub async fn down(&self) -> Result<MigrationReport> {
        self.run(Direction::Down).await
    }

    /// Returns true if the unit `id` is recorded as applied.
    pub async fn has(&self, id: u64) -> Result<bool> {
        self.history.has(self.ctx.db(), id).await
    }

    /// Records a unit as applied without running it.
    ///
    /// Returns false, with a warning, if a record already exists.
    pub async fn create(&self, unit: &dyn MigrationUnit) -> Result<bool> {
        let db = self.ctx.db();
        if self.history.has(db, unit.id()).await? {
            warn!(id = unit.id(), name = %unit.name(), "Migration already recorded, not creating");
            return Ok(false);
        }
        self.history
            .insert(db, unit.id(), unit.name(), unit.version())
            .await?;
        info!(id = unit.id(), name = %unit.name(), "Migration recorded");
        Ok(true)
    }

    /// Every registered unit with its record.
    pub async fn status(&self) -> Result<Vec<UnitStatus>> {
        let mut records: BTreeMap<u64, MigrationRecord> = self
            .history
            .list(self.ctx.db())
            .await?
            .into_iter()
            .map(|r| (r.migrate_id, r))
            .collect();

        Ok(self
            .registry
            .units()
            .map(|unit| UnitStatus {
                id: unit.id(),
                name: unit.name().to_string(),
                version: unit.version().to_string(),
                record: records.remove(&unit.id()),
            })
            .collect())
    }

    async fn run(&self, direction: Direction) -> Result<MigrationReport> {
        let db = self.ctx.db();
        self.history.ensure_table(db).await?;

        let mut report = MigrationReport::default();
        for unit in self.registry.units() {
            let id = unit.id();
            let recorded = self.history.has(db, id).await?;
            let pending = match direction {
                Direction::Up => !recorded,
                Direction::Down => recorded,
            };
            if !pending {
                report.skipped.push(id);
                continue;
            }

            let started = Instant::now();
            let outcome = match direction {
                Direction::Up => unit.up(&self.ctx).await,
                Direction::Down => unit.down(&self.ctx).await,
            };

            match outcome {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    match direction {
                        Direction::Up => info!(id, name = %unit.name(), ?elapsed, "Migration applied"),
                        Direction::Down => info!(id, name = %unit.name(), ?elapsed, "Migration reverted"),
                    }
                    self.book(direction, unit).await;
                    report.applied.push(id);
                }
                Err(err) => {
                    error!(id, name = %unit.name(), error = %err, "Migration failed");
                    report.failed.push(id);
                    if self.policy == FailurePolicy::Abort {
                        return Err(MigrateError::UnitFailed {
                            id,
                            name: unit.name().to_string(),
                            source: Box::new(err),
                        });
                    }
                }
            }
        }

        info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Migration batch finished"
        );
        Ok(report)
    }

    /// Writes or removes the record after a successful action. Failures are
    /// logged only: the action has already run.
    async fn book(&self, direction: Direction, unit: &dyn MigrationUnit) {
        let db = self.ctx.db();
        let written = match direction {
            Direction::Up => self
                .history
                .insert(db, unit.id(), unit.name(), unit.version())
                .await,
            Direction::Down => self.history.delete(db, unit.id()).await.map(|_| ()),
        };
        if let Err(err) = written {
            error!(id = unit.id(), name = %unit.name(), error = %err, "Bookkeeping write failed");
        }
    }
}
