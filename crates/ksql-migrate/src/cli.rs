//! The `ksql` command line.
//!
//! ```bash
//! # Write the DDL that turns app_dev into app_prod to ./ksql_diff_<time>.sql
//! ksql diff --driver mysql --from-dsn mysql://root@localhost/app_dev --from-db app_dev \
//!     --to-dsn mysql://root@localhost/app_prod --to-db app_prod
//!
//! # Apply it straight away
//! ksql migrate --driver mysql --from-dsn ... --to-dsn ...
//!
//! # Apply the compiled-in migration units
//! ksql migplug up --driver mysql --dsn mysql://root@localhost/app --db app
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::bundle::MigrationBundle;
use crate::codegen::{id_from_time, write_unit_file, UnitTemplate};
use crate::config::ConnectionConfig;
use crate::database::Database;
use crate::differ::{apply, diff_databases};
use crate::driver::DriverRegistry;
use crate::output::{render_statements, write_sql_file, DiffHeader};
use crate::runner::{FailurePolicy, MigrationRegistry, MigrationReport, MigrationRunner};

/// Schema diffing and migrations for MySQL-family databases.
#[derive(Debug, Parser)]
#[command(name = "ksql")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the DDL turning the `from` database into the `to` database.
    Diff(DiffArgs),

    /// Execute the DDL turning the `from` database into the `to` database.
    Migrate(DiffArgs),

    /// Print a database's schema snapshot as JSON.
    Snapshot(ConnectArgs),

    /// Run compiled-in migration units.
    Migplug {
        #[command(subcommand)]
        action: MigplugCommand,
    },
}

/// `migplug` subcommands.
#[derive(Debug, Subcommand)]
pub enum MigplugCommand {
    /// Apply every unit that has not been applied.
    Up(RunArgs),

    /// Revert every applied unit.
    Down(RunArgs),

    /// List units and whether they are applied.
    Show(RunArgs),

    /// Generate the source of a new unit.
    Make(MakeArgs),
}

/// Connection to the database being changed and to the reference one.
#[derive(Debug, Clone, Args)]
pub struct DiffArgs {
    /// Driver name.
    #[arg(long, env = "KSQL_DRIVER", default_value = "mysql")]
    pub driver: String,

    /// Connection URL of the database to change.
    #[arg(long, env = "KSQL_FROM_DSN")]
    pub from_dsn: String,

    /// Schema name of the database to change.
    #[arg(long, env = "KSQL_FROM_DB")]
    pub from_db: String,

    /// Connection URL of the reference database.
    #[arg(long, env = "KSQL_TO_DSN")]
    pub to_dsn: String,

    /// Schema name of the reference database.
    #[arg(long, env = "KSQL_TO_DB")]
    pub to_db: String,

    /// Directory for the generated `.sql` file.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Print the SQL instead of writing or executing it.
    #[arg(long)]
    pub dry_run: bool,
}

impl DiffArgs {
    fn from_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.driver, &self.from_dsn, &self.from_db)
    }

    fn to_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.driver, &self.to_dsn, &self.to_db)
    }
}

/// Connection to one database.
#[derive(Debug, Clone, Args)]
pub struct ConnectArgs {
    /// Driver name.
    #[arg(long, env = "KSQL_DRIVER", default_value = "mysql")]
    pub driver: String,

    /// Connection URL.
    #[arg(long, env = "KSQL_DSN")]
    pub dsn: String,

    /// Schema name.
    #[arg(long, env = "KSQL_DB")]
    pub db: String,
}

impl ConnectArgs {
    fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.driver, &self.dsn, &self.db)
    }
}

/// Arguments of `migplug up|down|show`.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Stop at the first failing unit.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments of `migplug make`.
#[derive(Debug, Clone, Args)]
pub struct MakeArgs {
    /// Unit name.
    #[arg(long)]
    pub name: String,

    /// Version the unit belongs to.
    #[arg(long)]
    pub version: String,

    /// Directory for the generated source file.
    #[arg(long, default_value = "migrations")]
    pub out_dir: PathBuf,

    /// Driver name, when diffing.
    #[arg(long, default_value = "mysql")]
    pub driver: String,

    /// Connection URL of the database to change. Diffing needs all four
    /// connection arguments; without them the unit is empty.
    #[arg(long, requires_all = ["from_db", "to_dsn", "to_db"])]
    pub from_dsn: Option<String>,

    /// Schema name of the database to change.
    #[arg(long)]
    pub from_db: Option<String>,

    /// Connection URL of the reference database.
    #[arg(long)]
    pub to_dsn: Option<String>,

    /// Schema name of the reference database.
    #[arg(long)]
    pub to_db: Option<String>,
}

/// Parses the command line, sets up logging and runs the command with the
/// given compiled-in bundles.
pub async fn run(bundles: &[&dyn MigrationBundle]) -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    execute(cli.command, bundles).await
}

/// Runs one command.
pub async fn execute(command: Command, bundles: &[&dyn MigrationBundle]) -> anyhow::Result<()> {
    let drivers = DriverRegistry::with_defaults();

    match command {
        Command::Diff(args) => {
            let (from, to) = connect_pair(&args, &drivers).await?;
            let diff = diff_databases(&from, &to).await?;

            if diff.is_empty() {
                info!(from = %args.from_db, to = %args.to_db, "Schemas match, nothing to write");
            } else if args.dry_run {
                print!("{}", render_statements(&diff.statements));
            } else {
                let header = DiffHeader::new(&args.from_db, &args.to_db);
                write_sql_file(&args.out_dir, &header, &diff.statements)?;
            }
        }

        Command::Migrate(args) => {
            let (from, to) = connect_pair(&args, &drivers).await?;
            let diff = diff_databases(&from, &to).await?;

            if diff.is_empty() {
                info!(from = %args.from_db, to = %args.to_db, "Schemas match, nothing to apply");
            } else if args.dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
                print!("{}", render_statements(&diff.statements));
            } else {
                apply(&from, &diff.statements).await?;
            }
        }

        Command::Snapshot(args) => {
            let db = Database::connect(&args.config(), &drivers).await?;
            let snapshot = db.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }

        Command::Migplug { action } => migplug(action, bundles, &drivers).await?,
    }

    Ok(())
}

async fn connect_pair(args: &DiffArgs, drivers: &DriverRegistry) -> anyhow::Result<(Database, Database)> {
    let from = Database::connect(&args.from_config(), drivers)
        .await
        .context("connecting to the from database")?;
    let to = Database::connect(&args.to_config(), drivers)
        .await
        .context("connecting to the to database")?;
    Ok((from, to))
}

async fn migplug(
    action: MigplugCommand,
    bundles: &[&dyn MigrationBundle],
    drivers: &DriverRegistry,
) -> anyhow::Result<()> {
    let args = match action {
        MigplugCommand::Make(args) => return make(args, drivers).await,
        MigplugCommand::Up(ref args) | MigplugCommand::Down(ref args) | MigplugCommand::Show(ref args) => {
            args.clone()
        }
    };

    let mut registry = MigrationRegistry::new();
    for bundle in bundles {
        registry.load(*bundle)?;
    }
    if registry.is_empty() {
        info!("No migration bundles are compiled into this binary.");
    }

    let db = Database::connect(&args.connect.config(), drivers).await?;
    let policy = if args.strict {
        FailurePolicy::Abort
    } else {
        FailurePolicy::Continue
    };
    let runner = MigrationRunner::new(db, registry).policy(policy);

    match action {
        MigplugCommand::Up(_) => report("up", &runner.up().await?)?,
        MigplugCommand::Down(_) => report("down", &runner.down().await?)?,
        MigplugCommand::Show(_) => {
            let status = runner.status().await?;
            println!("\nMigrations:");
            println!("{:-<60}", "");
            for unit in &status {
                match &unit.record {
                    Some(record) => println!(
                        " [X] {} {} ({}) applied {}",
                        unit.id,
                        unit.name,
                        unit.version,
                        record.create_time.format("%Y-%m-%d %H:%M:%S")
                    ),
                    None => println!(" [ ] {} {} ({})", unit.id, unit.name, unit.version),
                }
            }
            println!();
        }
        MigplugCommand::Make(_) => {}
    }
    Ok(())
}

fn report(direction: &str, report: &MigrationReport) -> anyhow::Result<()> {
    info!(
        direction,
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Done"
    );
    if report.is_success() {
        Ok(())
    } else {
        anyhow::bail!("migrations failed: {:?}", report.failed)
    }
}

async fn make(args: MakeArgs, drivers: &DriverRegistry) -> anyhow::Result<()> {
    let mut template = UnitTemplate::new(id_from_time(chrono::Local::now()), &args.name, &args.version);

    if let (Some(from_dsn), Some(from_db), Some(to_dsn), Some(to_db)) =
        (&args.from_dsn, &args.from_db, &args.to_dsn, &args.to_db)
    {
        let from = Database::connect(&ConnectionConfig::new(&args.driver, from_dsn, from_db), drivers).await?;
        let to = Database::connect(&ConnectionConfig::new(&args.driver, to_dsn, to_db), drivers).await?;
        let up = diff_databases(&from, &to).await?;
        // Rendered in the from dialect since down runs there too.
        let down = from.dialect().emit_all(&up.reverse_changes());
        template = template.statements(up.statements, down);
    }

    write_unit_file(&args.out_dir, &template)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_diff_arguments() {
        let cli = Cli::try_parse_from([
            "ksql",
            "diff",
            "--driver",
            "sqlite",
            "--from-dsn",
            "sqlite://a.db",
            "--from-db",
            "main",
            "--to-dsn",
            "sqlite://b.db",
            "--to-db",
            "main",
            "--dry-run",
        ])
        .unwrap();
        let Command::Diff(args) = cli.command else {
            panic!("expected diff");
        };
        assert_eq!(args.driver, "sqlite");
        assert_eq!(args.from_config(), ConnectionConfig::new("sqlite", "sqlite://a.db", "main"));
        assert!(args.dry_run);
    }

    #[test]
    fn parses_migplug_strict() {
        let cli = Cli::try_parse_from([
            "ksql", "migplug", "down", "--driver", "sqlite", "--dsn", "sqlite::memory:", "--db", "main",
            "--strict",
        ])
        .unwrap();
        let Command::Migplug {
            action: MigplugCommand::Down(args),
        } = cli.command
        else {
            panic!("expected migplug down");
        };
        assert!(args.strict);
        assert_eq!(args.connect.config(), ConnectionConfig::sqlite_memory());
    }

    #[test]
    fn make_diff_arguments_come_together() {
        let partial = Cli::try_parse_from([
            "ksql", "migplug", "make", "--name", "x", "--version", "1", "--from-dsn", "sqlite::memory:",
        ]);
        assert!(partial.is_err());
    }
}
