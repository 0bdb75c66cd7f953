//! Schema metadata store.
//!
//! # Invariants
//! - `schema_version` in `schema_metadata` is the sole source of truth for the
//!   applied schema version. Table presence is never used to infer it.
//! - An absent key means version 0.

use super::{DbError, DbResult};
use rusqlite::{params, Connection, OptionalExtension};

pub const SCHEMA_VERSION_KEY: &str = "schema_version";

const CREATE_METADATA_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);";

/// Creates the metadata table when missing.
pub fn ensure_table(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(CREATE_METADATA_SQL)?;
    Ok(())
}

/// Reads the stored schema version, `0` when the key is absent.
pub fn get(conn: &Connection) -> DbResult<u32> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_metadata WHERE key = ?1;",
            [SCHEMA_VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        None => Ok(0),
        Some(value) => value.trim().parse::<u32>().map_err(|_| {
            DbError::DatabaseCorrupted(format!(
                "invalid schema_version value `{value}` in schema_metadata"
            ))
        }),
    }
}

/// Upserts the stored schema version.
pub fn set(conn: &Connection, version: u32) -> DbResult<()> {
    conn.execute(
        "INSERT INTO schema_metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        params![SCHEMA_VERSION_KEY, version.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn).unwrap();
        conn
    }

    #[test]
    fn missing_key_reads_as_zero() {
        let conn = metadata_conn();
        assert_eq!(get(&conn).unwrap(), 0);
    }

    #[test]
    fn set_is_an_idempotent_upsert() {
        let conn = metadata_conn();
        set(&conn, 3).unwrap();
        set(&conn, 3).unwrap();
        set(&conn, 4).unwrap();

        assert_eq!(get(&conn).unwrap(), 4);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_metadata;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn garbage_version_is_reported_as_corruption() {
        let conn = metadata_conn();
        conn.execute(
            "INSERT INTO schema_metadata (key, value) VALUES ('schema_version', 'two');",
            [],
        )
        .unwrap();

        assert!(matches!(get(&conn), Err(DbError::DatabaseCorrupted(_))));
    }
}
