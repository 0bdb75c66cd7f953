//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations, one transaction per migration.
//! - Roll back to an earlier version when every step is reversible.
//! - Dry-run pending migrations without committing.
//!
//! # Invariants
//! - `version` values are positive and strictly increasing.
//! - A migration's schema change and its version bump share one transaction,
//!   so the store is never left partially migrated.
//! - The pending set is always recomputed from `schema_metadata`.

use crate::db::metadata;
use crate::db::schema::SchemaLocator;
use crate::db::{Database, DbError, DbResult};
use log::{debug, error, info};
use rusqlite::Connection;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

/// One migration step body.
pub type MigrationOp = Box<dyn Fn(&Connection) -> DbResult<()> + Send + Sync>;

const INITIAL_SCHEMA_REVERSE: &str = include_str!("0001_initial_schema.down.sql");
const RECENCY_INDEXES: &str = include_str!("0002_recency_indexes.sql");
const RECENCY_INDEXES_REVERSE: &str = include_str!("0002_recency_indexes.down.sql");
const PLAY_COUNT: &str = include_str!("0003_performance_play_count.sql");
const PLAY_COUNT_REVERSE: &str = include_str!("0003_performance_play_count.down.sql");

/// Tables introduced by the schema definition file.
pub const CORE_TABLES: &[&str] = &[
    "songs",
    "performances",
    "user_preferences",
    "auto_saves",
    "backups",
    "mix_graphs",
    "markers",
];

/// A versioned schema/data transformation with an optional inverse.
pub struct Migration {
    version: u32,
    description: String,
    forward: MigrationOp,
    reverse: Option<MigrationOp>,
    tables: Vec<&'static str>,
}

impl Migration {
    pub fn new(
        version: u32,
        description: impl Into<String>,
        forward: impl Fn(&Connection) -> DbResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            forward: Box::new(forward),
            reverse: None,
            tables: Vec::new(),
        }
    }

    /// Migration whose forward operation is a SQL batch.
    pub fn sql(version: u32, description: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        Self::new(version, description, move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
    }

    pub fn with_reverse(
        mut self,
        reverse: impl Fn(&Connection) -> DbResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.reverse = Some(Box::new(reverse));
        self
    }

    pub fn with_reverse_sql(self, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        self.with_reverse(move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
    }

    /// Declares tables that must exist once this migration is applied.
    pub fn creates_tables(mut self, tables: &[&'static str]) -> Self {
        self.tables.extend_from_slice(tables);
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_reversible(&self) -> bool {
        self.reverse.is_some()
    }

    fn apply_forward(&self, conn: &Connection) -> DbResult<()> {
        (self.forward)(conn)
    }

    fn apply_reverse(&self, conn: &Connection) -> DbResult<()> {
        match &self.reverse {
            Some(reverse) => reverse(conn),
            None => Err(self.irreversible()),
        }
    }

    fn irreversible(&self) -> DbError {
        DbError::IrreversibleMigration {
            version: self.version,
            description: self.description.clone(),
        }
    }

    /// Adds version/description context to a step failure.
    ///
    /// A missing schema file stays as-is: it is a bootstrap error, not a
    /// faulty migration.
    fn failure(&self, err: DbError) -> DbError {
        match err {
            DbError::SchemaFileNotFound { .. } => err,
            other => DbError::MigrationFailed {
                version: self.version,
                description: self.description.clone(),
                source: Box::new(other),
            },
        }
    }
}

impl Debug for Migration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("reversible", &self.is_reversible())
            .field("tables", &self.tables)
            .finish()
    }
}

/// Ordered set of migrations known to this binary.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    migrations: Vec<Migration>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The application's migrations.
    ///
    /// Version 1 applies the external schema definition file, located on
    /// first use through [`SchemaLocator`] with `schema_path` probed first.
    pub fn standard(schema_path: Option<PathBuf>) -> DbResult<Self> {
        let locator = SchemaLocator::new(schema_path);
        let mut registry = Self::new();

        registry.register(
            Migration::new(1, "initial schema", move |conn| {
                let script = locator.load()?;
                conn.execute_batch(&script)?;
                Ok(())
            })
            .with_reverse_sql(INITIAL_SCHEMA_REVERSE)
            .creates_tables(CORE_TABLES),
        )?;
        registry.register(
            Migration::sql(2, "recency and name indexes", RECENCY_INDEXES)
                .with_reverse_sql(RECENCY_INDEXES_REVERSE),
        )?;
        registry.register(
            Migration::sql(3, "performance play count", PLAY_COUNT)
                .with_reverse_sql(PLAY_COUNT_REVERSE),
        )?;

        Ok(registry)
    }

    /// Appends a migration; versions must be positive and strictly increasing.
    pub fn register(&mut self, migration: Migration) -> DbResult<()> {
        let previous = self.latest_version();
        if migration.version <= previous {
            return Err(DbError::InvalidMigrationOrder {
                previous,
                version: migration.version,
            });
        }
        self.migrations.push(migration);
        Ok(())
    }

    /// Returns the latest migration version known by this registry.
    pub fn latest_version(&self) -> u32 {
        self.migrations.last().map_or(0, |migration| migration.version)
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    fn above(&self, version: u32) -> impl DoubleEndedIterator<Item = &Migration> {
        self.migrations.iter().filter(move |m| m.version > version)
    }
}

/// Outcome of a `migrate` or `rollback` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    /// Versions applied (migrate) or undone (rollback), in execution order.
    pub steps: Vec<u32>,
}

impl MigrationReport {
    fn unchanged(version: u32) -> Self {
        Self {
            from_version: version,
            to_version: version,
            steps: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Applies, validates and rolls back registered migrations.
#[derive(Debug)]
pub struct MigrationEngine {
    registry: MigrationRegistry,
}

impl MigrationEngine {
    pub fn new(registry: MigrationRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn latest_version(&self) -> u32 {
        self.registry.latest_version()
    }

    /// Reads the stored version, creating the metadata table if needed.
    pub fn current_version(&self, db: &Database) -> DbResult<u32> {
        db.write(|tx| {
            metadata::ensure_table(tx)?;
            metadata::get(tx)
        })
    }

    /// Versions that `migrate` would apply, ascending.
    pub fn pending(&self, db: &Database) -> DbResult<Vec<u32>> {
        let current = self.current_version(db)?;
        Ok(self.registry.above(current).map(Migration::version).collect())
    }

    /// Applies every pending migration in ascending order.
    ///
    /// Each migration runs in its own transaction together with the version
    /// bump. The first failure aborts the call; earlier steps stay committed.
    pub fn migrate(&self, db: &Database) -> DbResult<MigrationReport> {
        let current = self.current_version(db)?;
        self.ensure_supported(current)?;

        let mut report = MigrationReport::unchanged(current);
        for migration in self.registry.above(current) {
            info!(
                "event=migration_apply module=db status=start version={} description={:?}",
                migration.version, migration.description
            );

            let outcome = db.write(|tx| {
                migration.apply_forward(tx)?;
                metadata::set(tx, migration.version)
            });
            if let Err(err) = outcome {
                let err = migration.failure(err);
                error!(
                    "event=migration_apply module=db status=error version={} error={}",
                    migration.version, err
                );
                return Err(err);
            }

            info!(
                "event=migration_apply module=db status=ok version={}",
                migration.version
            );
            report.steps.push(migration.version);
            report.to_version = migration.version;
        }

        if report.is_noop() {
            debug!("event=migration_apply module=db status=noop version={current}");
        }
        Ok(report)
    }

    /// Undoes migrations in `(target, current]`, newest first.
    ///
    /// Fails without touching the store when any selected migration lacks a
    /// reverse operation.
    pub fn rollback(&self, db: &Database, target: u32) -> DbResult<MigrationReport> {
        let current = self.current_version(db)?;
        self.ensure_supported(current)?;
        if target >= current {
            return Err(DbError::InvalidRollbackTarget { current, target });
        }

        let steps: Vec<&Migration> = self
            .registry
            .above(target)
            .filter(|m| m.version <= current)
            .rev()
            .collect();

        if let Some(blocked) = steps.iter().find(|m| !m.is_reversible()) {
            error!(
                "event=migration_rollback module=db status=error version={} error_code=irreversible",
                blocked.version
            );
            return Err(blocked.irreversible());
        }

        let mut report = MigrationReport::unchanged(current);
        for (index, migration) in steps.iter().enumerate() {
            let next_version = steps.get(index + 1).map_or(target, |m| m.version);
            info!(
                "event=migration_rollback module=db status=start version={} next_version={}",
                migration.version, next_version
            );

            db.write(|tx| {
                migration.apply_reverse(tx)?;
                metadata::set(tx, next_version)
            })
            .map_err(|err| migration.failure(err))?;

            report.steps.push(migration.version);
            report.to_version = next_version;
        }

        info!(
            "event=migration_rollback module=db status=ok from_version={} to_version={}",
            report.from_version, report.to_version
        );
        Ok(report)
    }

    /// Runs every pending forward operation inside one transaction that is
    /// rolled back afterwards, returning the versions that were exercised.
    ///
    /// On a fresh store this covers every registered migration.
    pub fn validate_migrations(&self, db: &Database) -> DbResult<Vec<u32>> {
        let current = self.current_version(db)?;
        self.ensure_supported(current)?;

        let checked = db.scratch(|tx| {
            let mut checked = Vec::new();
            for migration in self.registry.above(current) {
                migration
                    .apply_forward(tx)
                    .and_then(|()| metadata::set(tx, migration.version))
                    .map_err(|err| migration.failure(err))?;
                checked.push(migration.version);
            }
            Ok::<_, DbError>(checked)
        });

        match &checked {
            Ok(versions) => info!(
                "event=migration_validate module=db status=ok versions={versions:?}"
            ),
            Err(err) => error!("event=migration_validate module=db status=error error={err}"),
        }
        checked
    }

    /// Confirms that every table declared by an applied migration exists.
    ///
    /// The stored version stays authoritative: a missing table is reported
    /// as corruption rather than used to re-derive the version.
    pub fn verify_schema(&self, db: &Database) -> DbResult<()> {
        let current = self.current_version(db)?;
        let expected: Vec<&'static str> = self
            .registry
            .migrations
            .iter()
            .filter(|m| m.version <= current)
            .flat_map(|m| m.tables.iter().copied())
            .collect();

        db.read(|conn| {
            for table in expected {
                if !table_exists(conn, table)? {
                    error!(
                        "event=schema_verify module=db status=error version={current} missing_table={table}"
                    );
                    return Err(DbError::DatabaseCorrupted(format!(
                        "schema version {current} expects table `{table}`, which is missing"
                    )));
                }
            }
            Ok(())
        })
    }

    fn ensure_supported(&self, current: u32) -> DbResult<()> {
        let latest = self.registry.latest_version();
        if current > latest {
            return Err(DbError::UnsupportedSchemaVersion {
                db_version: current,
                latest_supported: latest,
            });
        }
        Ok(())
    }
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
