//! Debug/introspection helpers.
//!
//! Non-core surface used by diagnostics tooling. Table names are checked
//! against `sqlite_master` before they are quoted into a statement.

use super::{Database, DbError, DbResult};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// One loosely-typed row from [`dump_table`].
pub type DumpRow = Map<String, Value>;

/// Lists user tables in name order.
pub fn table_names(db: &Database) -> DbResult<Vec<String>> {
    db.read(list_tables)
}

/// Row count for every user table.
pub fn table_row_counts(db: &Database) -> DbResult<BTreeMap<String, i64>> {
    db.read(|conn| {
        let mut counts = BTreeMap::new();
        for table in list_tables(conn)? {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {};", quote_identifier(&table)),
                [],
                |row| row.get(0),
            )?;
            counts.insert(table, count);
        }
        Ok(counts)
    })
}

/// Dumps every row of `table` as JSON-like maps keyed by column name.
///
/// Blobs are rendered as their byte length; use this for diagnostics only.
pub fn dump_table(db: &Database, table: &str) -> DbResult<Vec<DumpRow>> {
    db.read(|conn| {
        if !list_tables(conn)?.iter().any(|known| known == table) {
            return Err(DbError::UnknownTable(table.to_string()));
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY rowid;",
            quote_identifier(table)
        ))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let mut dumped = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Map::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(column.clone(), value_to_json(row.get_ref(index)?));
            }
            dumped.push(record);
        }
        Ok(dumped)
    })
}

/// Runs `PRAGMA integrity_check`; a healthy store yields `["ok"]`.
pub fn integrity_check(db: &Database) -> DbResult<Vec<String>> {
    db.read(|conn| {
        let mut stmt = conn.prepare("PRAGMA integrity_check;")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
}

fn list_tables(conn: &Connection) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name
         FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name;",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::from(v),
        ValueRef::Real(v) => Number::from_f64(v).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::from(bytes.len()),
    }
}
