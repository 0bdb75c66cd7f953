//! Auto-save snapshot storage.
//!
//! # Invariants
//! - The song snapshot is stored as one JSON document.
//! - Snapshots disappear with their song through the schema cascade.

use crate::db::Database;
use crate::model::autosave::AutoSave;
use crate::repo::{
    from_json, normalize_limit, timestamp_from_db, timestamp_to_db, to_json, RepoError, RepoResult,
};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, Params, Row};

const AUTOSAVE_SELECT_SQL: &str = "SELECT
    id,
    song_id,
    snapshot,
    timestamp,
    description
FROM auto_saves";

pub trait AutoSaveRepository {
    fn create(&self, auto_save: &AutoSave) -> RepoResult<()>;
    fn read(&self, id: &str) -> RepoResult<Option<AutoSave>>;
    fn update(&self, auto_save: &AutoSave) -> RepoResult<bool>;
    fn delete(&self, id: &str) -> RepoResult<bool>;
    /// Snapshots of one song, newest first.
    fn list_for_song(&self, song_id: &str) -> RepoResult<Vec<AutoSave>>;
    fn latest_for_song(&self, song_id: &str) -> RepoResult<Option<AutoSave>>;
    fn count_for_song(&self, song_id: &str) -> RepoResult<u64>;
    /// Prunes snapshots of `song_id` strictly older than `cutoff`.
    /// Returns the number of rows removed.
    fn delete_before(&self, song_id: &str, cutoff: DateTime<Utc>) -> RepoResult<u64>;
    /// Newest snapshots across all songs, at most `limit`.
    fn recent(&self, limit: u32) -> RepoResult<Vec<AutoSave>>;
}

pub struct SqliteAutoSaveRepository<'db> {
    db: &'db Database,
}

impl<'db> SqliteAutoSaveRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }
}

impl AutoSaveRepository for SqliteAutoSaveRepository<'_> {
    fn create(&self, auto_save: &AutoSave) -> RepoResult<()> {
        auto_save.validate()?;
        self.db.write(|tx| {
            tx.execute(
                "INSERT INTO auto_saves (id, song_id, snapshot, timestamp, description)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    auto_save.id.as_str(),
                    auto_save.song_id.as_str(),
                    to_json("auto_saves.snapshot", &auto_save.snapshot)?,
                    timestamp_to_db(&auto_save.timestamp),
                    auto_save.description.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    fn read(&self, id: &str) -> RepoResult<Option<AutoSave>> {
        self.db.read(|conn| {
            let mut found = query_auto_saves(conn, "WHERE id = ?1", [id])?;
            Ok(found.pop())
        })
    }

    fn update(&self, auto_save: &AutoSave) -> RepoResult<bool> {
        auto_save.validate()?;
        self.db.write(|tx| {
            let changed = tx.execute(
                "UPDATE auto_saves
                 SET song_id = ?2, snapshot = ?3, timestamp = ?4, description = ?5
                 WHERE id = ?1;",
                params![
                    auto_save.id.as_str(),
                    auto_save.song_id.as_str(),
                    to_json("auto_saves.snapshot", &auto_save.snapshot)?,
                    timestamp_to_db(&auto_save.timestamp),
                    auto_save.description.as_str(),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        self.db.write(|tx| {
            let changed = tx.execute("DELETE FROM auto_saves WHERE id = ?1;", [id])?;
            Ok(changed > 0)
        })
    }

    fn list_for_song(&self, song_id: &str) -> RepoResult<Vec<AutoSave>> {
        self.db.read(|conn| {
            query_auto_saves(
                conn,
                "WHERE song_id = ?1 ORDER BY timestamp DESC, id ASC",
                [song_id],
            )
        })
    }

    fn latest_for_song(&self, song_id: &str) -> RepoResult<Option<AutoSave>> {
        self.db.read(|conn| {
            let mut found = query_auto_saves(
                conn,
                "WHERE song_id = ?1 ORDER BY timestamp DESC, id ASC LIMIT 1",
                [song_id],
            )?;
            Ok(found.pop())
        })
    }

    fn count_for_song(&self, song_id: &str) -> RepoResult<u64> {
        self.db.read(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM auto_saves WHERE song_id = ?1;",
                [song_id],
                |row| row.get(0),
            )?;
            Ok(count.unsigned_abs())
        })
    }

    fn delete_before(&self, song_id: &str, cutoff: DateTime<Utc>) -> RepoResult<u64> {
        let removed = self.db.write(|tx| {
            let removed = tx.execute(
                "DELETE FROM auto_saves WHERE song_id = ?1 AND timestamp < ?2;",
                params![song_id, timestamp_to_db(&cutoff)],
            )?;
            Ok::<_, RepoError>(removed as u64)
        })?;
        if removed > 0 {
            info!(
                "event=auto_saves_pruned module=repo status=ok removed={}",
                removed
            );
        }
        Ok(removed)
    }

    fn recent(&self, limit: u32) -> RepoResult<Vec<AutoSave>> {
        self.db.read(|conn| {
            query_auto_saves(
                conn,
                "ORDER BY timestamp DESC, id ASC LIMIT ?1",
                [i64::from(normalize_limit(limit))],
            )
        })
    }
}

fn query_auto_saves(
    conn: &Connection,
    clause: &'static str,
    params: impl Params,
) -> RepoResult<Vec<AutoSave>> {
    let mut stmt = conn.prepare(&format!("{AUTOSAVE_SELECT_SQL} {clause};"))?;
    let mut rows = stmt.query(params)?;
    let mut auto_saves = Vec::new();
    while let Some(row) = rows.next()? {
        auto_saves.push(parse_auto_save_row(row)?);
    }
    Ok(auto_saves)
}

fn parse_auto_save_row(row: &Row<'_>) -> RepoResult<AutoSave> {
    let snapshot: String = row.get("snapshot")?;
    Ok(AutoSave {
        id: row.get("id")?,
        song_id: row.get("song_id")?,
        snapshot: from_json("auto_saves.snapshot", &snapshot)?,
        timestamp: timestamp_from_db("auto_saves.timestamp", row.get("timestamp")?)?,
        description: row.get("description")?,
    })
}
