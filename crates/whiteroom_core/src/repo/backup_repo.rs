//! Backup storage, capture and restore.
//!
//! # Responsibility
//! - Persist full snapshots of songs, performances and preferences.
//! - Capture the live tables into a backup and restore a backup over them.
//!
//! # Invariants
//! - A stored backup is immutable except for `name` and `description`.
//! - `capture` and `restore` each run inside one write transaction, so a
//!   failure leaves the live tables untouched.
//! - Restoring deletes every song first; the schema cascade also removes
//!   performances, markers, auto-saves and mix graphs that are not part of
//!   the snapshot.

use crate::db::Database;
use crate::model::backup::Backup;
use crate::model::performance::Performance;
use crate::model::preferences::UserPreferences;
use crate::model::song::Song;
use crate::repo::performance_repo::{insert_performance, list_performances};
use crate::repo::preferences_repo::{read_preferences, upsert_preferences};
use crate::repo::song_repo::{insert_song, list_songs};
use crate::repo::{
    from_json, normalize_limit, timestamp_from_db, timestamp_to_db, to_json, RepoError,
    RepoResult,
};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, Params, Row};
use std::time::Instant;

const BACKUP_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    timestamp,
    songs_snapshot,
    performances_snapshot,
    preferences_snapshot,
    size_bytes,
    app_version
FROM backups";

pub trait BackupRepository {
    fn create(&self, backup: &Backup) -> RepoResult<()>;
    fn read(&self, id: &str) -> RepoResult<Option<Backup>>;
    /// Renames a backup and replaces its description. Snapshot payloads are
    /// never rewritten.
    fn update_details(&self, id: &str, name: &str, description: Option<&str>)
        -> RepoResult<bool>;
    fn delete(&self, id: &str) -> RepoResult<bool>;
    /// Newest first, at most `limit`.
    fn list_recent(&self, limit: u32) -> RepoResult<Vec<Backup>>;
    /// Backups taken in `[from, to]`, oldest first.
    fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<Vec<Backup>>;
    /// Snapshots the current songs, performances and preferences into a new
    /// backup and stores it.
    fn capture(
        &self,
        name: &str,
        description: Option<&str>,
        app_version: &str,
    ) -> RepoResult<Backup>;
    /// Replaces the live songs, performances and preferences with the
    /// snapshot of backup `id`. Returns `false` when no such backup exists.
    fn restore(&self, id: &str) -> RepoResult<bool>;
}

pub struct SqliteBackupRepository<'db> {
    db: &'db Database,
}

impl<'db> SqliteBackupRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }
}

impl BackupRepository for SqliteBackupRepository<'_> {
    fn create(&self, backup: &Backup) -> RepoResult<()> {
        backup.validate()?;
        let payload = SnapshotPayload::encode(backup)?;
        self.db.write(|tx| insert_backup(tx, backup, &payload))
    }

    fn read(&self, id: &str) -> RepoResult<Option<Backup>> {
        self.db.read(|conn| read_backup(conn, id))
    }

    fn update_details(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
    ) -> RepoResult<bool> {
        crate::model::require_name("backup", name)?;
        self.db.write(|tx| {
            let changed = tx.execute(
                "UPDATE backups SET name = ?2, description = ?3 WHERE id = ?1;",
                params![id, name, description],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        self.db.write(|tx| {
            let changed = tx.execute("DELETE FROM backups WHERE id = ?1;", [id])?;
            Ok(changed > 0)
        })
    }

    fn list_recent(&self, limit: u32) -> RepoResult<Vec<Backup>> {
        self.db.read(|conn| {
            query_backups(
                conn,
                "ORDER BY timestamp DESC, id ASC LIMIT ?1",
                [i64::from(normalize_limit(limit))],
            )
        })
    }

    fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<Vec<Backup>> {
        self.db.read(|conn| {
            query_backups(
                conn,
                "WHERE timestamp BETWEEN ?1 AND ?2 ORDER BY timestamp ASC, id ASC",
                [timestamp_to_db(&from), timestamp_to_db(&to)],
            )
        })
    }

    fn capture(
        &self,
        name: &str,
        description: Option<&str>,
        app_version: &str,
    ) -> RepoResult<Backup> {
        crate::model::require_name("backup", name)?;
        let started_at = Instant::now();

        let result = self.db.write(|tx| {
            let mut backup = Backup::new(
                name,
                list_songs(tx)?,
                list_performances(tx)?,
                read_preferences(tx)?,
                app_version,
            );
            backup.description = description.map(str::to_string);
            let payload = SnapshotPayload::encode(&backup)?;
            backup.size_bytes = payload.size_bytes();
            insert_backup(tx, &backup, &payload)?;
            Ok::<_, RepoError>(backup)
        });

        match &result {
            Ok(backup) => info!(
                "event=backup_capture module=repo status=ok songs={} performances={} size_bytes={} duration_ms={}",
                backup.songs.len(),
                backup.performances.len(),
                backup.size_bytes,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=backup_capture module=repo status=error error={}",
                err
            ),
        }
        result
    }

    fn restore(&self, id: &str) -> RepoResult<bool> {
        let started_at = Instant::now();

        let result = self.db.write(|tx| {
            let Some(backup) = read_backup(tx, id)? else {
                return Ok(false);
            };
            tx.execute("DELETE FROM songs;", [])?;
            for song in &backup.songs {
                insert_song(tx, song)?;
            }
            for performance in &backup.performances {
                insert_performance(tx, performance)?;
            }
            if let Some(preferences) = &backup.preferences {
                upsert_preferences(tx, preferences)?;
            }
            Ok::<_, RepoError>(true)
        });

        match &result {
            Ok(true) => info!(
                "event=backup_restore module=repo status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Ok(false) => info!("event=backup_restore module=repo status=not_found"),
            Err(err) => error!(
                "event=backup_restore module=repo status=error error={}",
                err
            ),
        }
        result
    }
}

/// Backup snapshots encoded for storage.
struct SnapshotPayload {
    songs: String,
    performances: String,
    preferences: Option<String>,
}

impl SnapshotPayload {
    fn encode(backup: &Backup) -> RepoResult<Self> {
        Ok(Self {
            songs: to_json("backups.songs_snapshot", &backup.songs)?,
            performances: to_json("backups.performances_snapshot", &backup.performances)?,
            preferences: backup
                .preferences
                .as_ref()
                .map(|prefs| to_json("backups.preferences_snapshot", prefs))
                .transpose()?,
        })
    }

    fn size_bytes(&self) -> u64 {
        let total = self.songs.len()
            + self.performances.len()
            + self.preferences.as_ref().map_or(0, String::len);
        total as u64
    }
}

fn insert_backup(conn: &Connection, backup: &Backup, payload: &SnapshotPayload) -> RepoResult<()> {
    let size_bytes = i64::try_from(backup.size_bytes).map_err(|_| {
        RepoError::InvalidData(format!("backup size {} out of range", backup.size_bytes))
    })?;
    conn.execute(
        "INSERT INTO backups (
            id,
            name,
            description,
            timestamp,
            songs_snapshot,
            performances_snapshot,
            preferences_snapshot,
            size_bytes,
            app_version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            backup.id.as_str(),
            backup.name.as_str(),
            backup.description.as_deref(),
            timestamp_to_db(&backup.timestamp),
            payload.songs.as_str(),
            payload.performances.as_str(),
            payload.preferences.as_deref(),
            size_bytes,
            backup.app_version.as_str(),
        ],
    )?;
    Ok(())
}

fn read_backup(conn: &Connection, id: &str) -> RepoResult<Option<Backup>> {
    let mut found = query_backups(conn, "WHERE id = ?1", [id])?;
    Ok(found.pop())
}

fn query_backups(
    conn: &Connection,
    clause: &'static str,
    params: impl Params,
) -> RepoResult<Vec<Backup>> {
    let mut stmt = conn.prepare(&format!("{BACKUP_SELECT_SQL} {clause};"))?;
    let mut rows = stmt.query(params)?;
    let mut backups = Vec::new();
    while let Some(row) = rows.next()? {
        backups.push(parse_backup_row(row)?);
    }
    Ok(backups)
}

fn parse_backup_row(row: &Row<'_>) -> RepoResult<Backup> {
    let songs: String = row.get("songs_snapshot")?;
    let performances: String = row.get("performances_snapshot")?;
    let preferences = match row.get::<_, Option<String>>("preferences_snapshot")? {
        Some(raw) => Some(from_json::<UserPreferences>("backups.preferences_snapshot", &raw)?),
        None => None,
    };
    let size_bytes: i64 = row.get("size_bytes")?;

    Ok(Backup {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        timestamp: timestamp_from_db("backups.timestamp", row.get("timestamp")?)?,
        songs: from_json::<Vec<Song>>("backups.songs_snapshot", &songs)?,
        performances: from_json::<Vec<Performance>>(
            "backups.performances_snapshot",
            &performances,
        )?,
        preferences,
        size_bytes: u64::try_from(size_bytes).map_err(|_| {
            RepoError::InvalidData(format!("invalid size `{size_bytes}` in backups.size_bytes"))
        })?,
        app_version: row.get("app_version")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_size_counts_every_snapshot() {
        let backup = Backup::new(
            "nightly",
            Vec::new(),
            Vec::new(),
            Some(UserPreferences::default()),
            "0.1.0",
        );
        let payload = SnapshotPayload::encode(&backup).unwrap();
        let prefs_len = payload.preferences.as_ref().unwrap().len();

        // "[]" + "[]" + preferences document
        assert_eq!(payload.size_bytes(), (4 + prefs_len) as u64);
    }
}
