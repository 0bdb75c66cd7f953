//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Own the single process-wide SQLite connection and its tuning.
//! - Apply schema migrations in deterministic order.
//! - Expose the bootstrap contract consumed by the host application.
//!
//! # Invariants
//! - Migration version is tracked in the `schema_metadata` table only.
//! - Core code must not read/write application data before migrations succeed.
//! - Initialization failures are fatal; there is no read-only fallback.

use std::path::PathBuf;
use thiserror::Error;

mod config;
mod handle;
pub mod introspect;
pub mod metadata;
pub mod migrations;
pub mod schema;

pub use config::{default_data_dir, DbConfig, DbLocation, DATA_DIR_ENV, DB_FILE_NAME};
pub use handle::Database;
pub use migrations::{Migration, MigrationEngine, MigrationRegistry, MigrationReport};

use log::{error, info};
use std::time::Instant;

pub type DbResult<T> = Result<T, DbError>;

/// Errors raised by the storage handle, metadata store and migration engine.
#[derive(Debug, Error)]
pub enum DbError {
    /// No candidate path contained the schema definition file.
    #[error("schema definition file not found; probed: {}", display_paths(.candidates))]
    SchemaFileNotFound { candidates: Vec<PathBuf> },

    /// A migration step failed; the store remains at the last applied version.
    #[error("migration {version} ({description}) failed: {source}")]
    MigrationFailed {
        version: u32,
        description: String,
        #[source]
        source: Box<DbError>,
    },

    #[error("database initialization failed: {0}")]
    InitializationFailed(String),

    #[error("database corrupted: {0}")]
    DatabaseCorrupted(String),

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },

    #[error("migration {version} ({description}) has no reverse operation")]
    IrreversibleMigration { version: u32, description: String },

    #[error("cannot roll back from version {current} to {target}")]
    InvalidRollbackTarget { current: u32, target: u32 },

    #[error("unknown table `{0}`")]
    UnknownTable(String),

    #[error("migration {version} must be greater than {previous}")]
    InvalidMigrationOrder { previous: u32, version: u32 },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Opens the configured store, applies every pending migration and verifies
/// that the tables expected at the resulting version exist.
///
/// This is the bootstrap contract: it either returns a ready handle or a
/// fatal error, and must complete before any repository is used.
pub fn initialize(config: &DbConfig) -> DbResult<Database> {
    let registry = MigrationRegistry::standard(config.schema_path.clone())?;
    initialize_with(config, registry)
}

/// Same as [`initialize`], with a caller-supplied migration registry.
pub fn initialize_with(config: &DbConfig, registry: MigrationRegistry) -> DbResult<Database> {
    let started_at = Instant::now();
    info!(
        "event=core_bootstrap module=db status=start mode={}",
        config.location.mode()
    );

    let result = Database::open(config).and_then(|db| {
        let engine = MigrationEngine::new(registry);
        engine.migrate(&db)?;
        engine.verify_schema(&db)?;
        Ok(db)
    });

    match &result {
        Ok(_) => info!(
            "event=core_bootstrap module=db status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=core_bootstrap module=db status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

/// Opens an in-memory store with the standard migrations applied.
///
/// The schema file is located through the default candidate list, so this
/// works from the crate directory (tests) or with `WHITEROOM_SCHEMA_PATH` set.
pub fn open_db_in_memory() -> DbResult<Database> {
    initialize(&DbConfig::in_memory())
}
