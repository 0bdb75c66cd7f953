//! Storage handle owning the single SQLite connection.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Apply durability/concurrency pragmas for a desktop/mobile host.
//! - Register the SQL functions repositories query with.
//! - Expose scoped `read` / `write` accessors.
//!
//! # Invariants
//! - Returned handles have `foreign_keys=ON`; cascade deletes depend on it.
//! - `write` bodies run inside one IMMEDIATE transaction that commits only
//!   when the body returns `Ok`.

use super::config::{ensure_parent_dir, DbConfig, DbLocation};
use super::{DbError, DbResult};
use log::{error, info, warn};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Process-wide handle to the embedded store.
///
/// Constructed once at startup and passed by reference to every repository.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    location: DbLocation,
}

impl Database {
    /// Opens and tunes the connection described by `config`.
    ///
    /// Does not run migrations; see [`crate::db::initialize`].
    ///
    /// # Errors
    /// - `InitializationFailed` when the connection cannot be opened or
    ///   foreign-key enforcement cannot be enabled.
    /// - `DatabaseCorrupted` when the file is not a readable SQLite database.
    pub fn open(config: &DbConfig) -> DbResult<Self> {
        let started_at = Instant::now();
        let mode = config.location.mode();
        info!("event=db_open module=db status=start mode={mode}");

        let opened = match &config.location {
            DbLocation::File(path) => {
                ensure_parent_dir(path)?;
                Connection::open(path)
            }
            DbLocation::InMemory => Connection::open_in_memory(),
        };

        let conn = match opened {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(DbError::InitializationFailed(err.to_string()));
            }
        };

        if let Err(err) = tune_connection(&conn, config) {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_tune_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            conn: Mutex::new(conn),
            location: config.location.clone(),
        })
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    /// Runs `body` against the connection without an implicit transaction.
    pub fn read<T, E>(&self, body: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E> {
        let conn = self.lock();
        body(&conn)
    }

    /// Runs `body` inside one transaction.
    ///
    /// Commits when `body` returns `Ok`; an `Err`, or unwinding out of `body`,
    /// drops the transaction and rolls it back.
    pub fn write<T, E>(
        &self,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let conn = self.lock();
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;
        let value = body(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `body` inside a transaction that is always rolled back.
    pub(crate) fn scratch<T, E>(
        &self,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let conn = self.lock();
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;
        let outcome = body(&tx);
        tx.rollback()?;
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic inside a body already rolled its transaction back.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn tune_connection(conn: &Connection, config: &DbConfig) -> DbResult<()> {
    conn.busy_timeout(config.busy_timeout)
        .map_err(|err| classify_open_error(err, "busy_timeout"))?;

    match conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
    {
        Ok(mode) if mode.eq_ignore_ascii_case("wal") => {}
        // In-memory databases report `memory`; nothing to fix there.
        Ok(mode) => warn!("event=db_pragma module=db status=degraded pragma=journal_mode value={mode}"),
        Err(err) => soft_pragma_failure("journal_mode", err)?,
    }

    if let Err(err) = conn.pragma_update(None, "synchronous", "NORMAL") {
        soft_pragma_failure("synchronous", err)?;
    }

    if let Err(err) = conn.pragma_update(None, "cache_size", -config.cache_size_kib) {
        soft_pragma_failure("cache_size", err)?;
    }

    if let Err(err) = conn.pragma_update_and_check(None, "mmap_size", config.mmap_size_bytes, |row| {
        row.get::<_, i64>(0)
    }) {
        soft_pragma_failure("mmap_size", err)?;
    }

    register_functions(conn)?;
    enable_foreign_keys(conn)
}

/// `fold_case(text)` lowercases with Unicode rules; SQLite's own `lower()`,
/// `LIKE` and `NOCASE` only fold ASCII. NULL stays NULL.
fn register_functions(conn: &Connection) -> DbResult<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|value| value.to_lowercase())),
    )
    .map_err(|err| classify_open_error(err, "fold_case"))
}

fn enable_foreign_keys(conn: &Connection) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|err| classify_open_error(err, "foreign_keys"))?;
    let enabled: i64 = conn
        .pragma_query_value(None, "foreign_keys", |row| row.get(0))
        .map_err(|err| classify_open_error(err, "foreign_keys"))?;
    if enabled != 1 {
        return Err(DbError::InitializationFailed(
            "foreign key enforcement could not be enabled".to_string(),
        ));
    }
    Ok(())
}

/// Logs a tuning failure; corruption is still surfaced.
fn soft_pragma_failure(pragma: &str, err: rusqlite::Error) -> DbResult<()> {
    if is_corruption(&err) {
        return Err(DbError::DatabaseCorrupted(err.to_string()));
    }
    warn!("event=db_pragma module=db status=error pragma={pragma} error={err}");
    Ok(())
}

fn classify_open_error(err: rusqlite::Error, step: &str) -> DbError {
    if is_corruption(&err) {
        DbError::DatabaseCorrupted(err.to_string())
    } else {
        DbError::InitializationFailed(format!("{step}: {err}"))
    }
}

fn is_corruption(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_enables_foreign_keys() {
        let db = Database::open(&DbConfig::in_memory()).unwrap();
        let enabled: i64 = db
            .read(|conn| conn.pragma_query_value(None, "foreign_keys", |row| row.get(0)))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn fold_case_lowercases_beyond_ascii() {
        let db = Database::open(&DbConfig::in_memory()).unwrap();
        let (folded, null): (String, Option<String>) = db
            .read(|conn| {
                conn.query_row("SELECT fold_case('ÜBERMUT Ω'), fold_case(NULL);", [], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
            })
            .unwrap();
        assert_eq!(folded, "übermut ω");
        assert_eq!(null, None);
    }

    #[test]
    fn write_rolls_back_on_error() {
        let db = Database::open(&DbConfig::in_memory()).unwrap();
        db.write(|tx| tx.execute_batch("CREATE TABLE t (v INTEGER);"))
            .unwrap();

        let result: Result<(), rusqlite::Error> = db.write(|tx| {
            tx.execute("INSERT INTO t (v) VALUES (1);", [])?;
            Err(rusqlite::Error::QueryReturnedNoRows)
        });
        assert!(result.is_err());

        let count: i64 = db
            .read(|conn| conn.query_row("SELECT COUNT(*) FROM t;", [], |row| row.get(0)))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn scratch_never_commits() {
        let db = Database::open(&DbConfig::in_memory()).unwrap();
        db.scratch(|tx| tx.execute_batch("CREATE TABLE scratch_only (v INTEGER);"))
            .unwrap();

        let exists: i64 = db
            .read(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE name = 'scratch_only';",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(exists, 0);
    }
}
