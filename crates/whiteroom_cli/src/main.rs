//! Maintenance CLI over the WhiteRoom store.
//!
//! # Responsibility
//! - Expose migration status, migrate/rollback/validate and diagnostics.
//! - Operate on the same API the host application uses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use whiteroom_core::db::introspect;
use whiteroom_core::{Database, DbConfig, MigrationEngine, MigrationRegistry, MigrationReport};

#[derive(Parser)]
#[command(name = "whiteroom")]
#[command(version)]
#[command(about = "Inspect and migrate a WhiteRoom database")]
struct Cli {
    /// Database file (defaults to the per-user data directory)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Schema definition file applied by migration 1
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Write rolling logs into this absolute directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level used with --log-dir
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stored and latest schema versions
    Status,
    /// Apply every pending migration
    Migrate,
    /// Undo migrations down to a target version
    Rollback {
        /// Version to end at
        target: u32,
    },
    /// Dry-run pending migrations in a discarded transaction
    Validate,
    /// Print the row count of every table
    Counts,
    /// Print every row of a table as JSON
    Dump {
        /// Table name
        table: String,
    },
    /// Run the integrity check and verify the expected tables exist
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or(whiteroom_core::default_log_level());
        whiteroom_core::init_logging(level, log_dir).context("failed to start logging")?;
    }

    let mut config = match &cli.database {
        Some(path) => DbConfig::for_path(path),
        None => DbConfig::from_env().context("failed to resolve the data directory")?,
    };
    if let Some(schema) = &cli.schema {
        config = config.with_schema_path(schema);
    }

    let db = Database::open(&config).context("failed to open the database")?;
    info!(
        "event=cli_open module=cli status=ok location={:?}",
        db.location()
    );
    let engine = MigrationEngine::new(MigrationRegistry::standard(config.schema_path.clone())?);

    match cli.command {
        Commands::Status => {
            let current = engine.current_version(&db)?;
            println!("location: {:?}", db.location());
            println!("schema version: {current}");
            println!("latest version: {}", engine.latest_version());
            println!("pending: {:?}", engine.pending(&db)?);
        }
        Commands::Migrate => {
            let report = engine.migrate(&db).context("migration failed")?;
            print_report("migrated", &report);
        }
        Commands::Rollback { target } => {
            let report = engine
                .rollback(&db, target)
                .with_context(|| format!("rollback to version {target} failed"))?;
            print_report("rolled back", &report);
        }
        Commands::Validate => {
            let versions = engine.validate_migrations(&db).context("validation failed")?;
            if versions.is_empty() {
                println!("nothing to validate");
            } else {
                println!("validated versions {versions:?}; store unchanged");
            }
        }
        Commands::Counts => {
            for (table, count) in introspect::table_row_counts(&db)? {
                println!("{table:<20} {count}");
            }
        }
        Commands::Dump { table } => {
            let rows = introspect::dump_table(&db, &table)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Check => {
            let findings = introspect::integrity_check(&db)?;
            for finding in &findings {
                println!("integrity: {finding}");
            }
            engine.verify_schema(&db).context("schema verification failed")?;
            println!("schema: ok");
            if findings.iter().any(|finding| finding != "ok") {
                anyhow::bail!("integrity check reported problems");
            }
        }
    }

    Ok(())
}

fn print_report(action: &str, report: &MigrationReport) {
    if report.is_noop() {
        println!("already at version {}", report.to_version);
        return;
    }
    println!(
        "{action} {} -> {} (steps {:?})",
        report.from_version, report.to_version, report.steps
    );
}
