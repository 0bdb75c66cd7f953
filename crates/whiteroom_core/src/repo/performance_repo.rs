//! Performance repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `song_id` must reference an existing song; the schema rejects orphans
//!   and the error surfaces as `RepoError::ConstraintViolation`.
//! - Tags are stored as a sorted JSON array of normalized strings.

use crate::db::Database;
use crate::model::performance::{normalize_tag, normalize_tags, Performance};
use crate::repo::{
    bool_to_int, from_json, int_to_bool, like_pattern, normalize_limit, timestamp_from_db,
    timestamp_to_db, to_json, u32_from_db, RepoResult,
};
use rusqlite::{params, Connection, Params, Row};
use std::collections::BTreeSet;

const PERFORMANCE_SELECT_SQL: &str = "SELECT
    id,
    song_id,
    name,
    description,
    duration_secs,
    performance_data,
    is_favorite,
    tags,
    play_count,
    created_at,
    updated_at
FROM performances";

/// Repository interface for performances.
pub trait PerformanceRepository {
    /// Tags are stored normalized; see [`normalize_tags`].
    fn create(&self, performance: &Performance) -> RepoResult<()>;
    fn read(&self, id: &str) -> RepoResult<Option<Performance>>;
    fn update(&self, performance: &Performance) -> RepoResult<bool>;
    fn delete(&self, id: &str) -> RepoResult<bool>;
    /// Performances of one song, newest first.
    fn list_for_song(&self, song_id: &str) -> RepoResult<Vec<Performance>>;
    fn favorites(&self) -> RepoResult<Vec<Performance>>;
    fn set_favorite(&self, id: &str, favorite: bool) -> RepoResult<bool>;
    /// Increments the play counter.
    fn record_play(&self, id: &str) -> RepoResult<bool>;
    /// Exact (case-insensitive) tag match.
    fn with_tag(&self, tag: &str) -> RepoResult<Vec<Performance>>;
    /// Case-insensitive substring match on name and description.
    fn search(&self, term: &str) -> RepoResult<Vec<Performance>>;
    /// At most `limit` performances, most recently updated first. A zero
    /// limit returns nothing.
    fn recent(&self, limit: u32) -> RepoResult<Vec<Performance>>;
}

/// SQLite-backed performance repository.
pub struct SqlitePerformanceRepository<'db> {
    db: &'db Database,
}

impl<'db> SqlitePerformanceRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }
}

impl PerformanceRepository for SqlitePerformanceRepository<'_> {
    fn create(&self, performance: &Performance) -> RepoResult<()> {
        performance.validate()?;
        self.db.write(|tx| insert_performance(tx, performance))
    }

    fn read(&self, id: &str) -> RepoResult<Option<Performance>> {
        self.db.read(|conn| {
            let mut found = query_performances(conn, "WHERE id = ?1", [id])?;
            Ok(found.pop())
        })
    }

    fn update(&self, performance: &Performance) -> RepoResult<bool> {
        performance.validate()?;
        self.db.write(|tx| {
            let changed = tx.execute(
                "UPDATE performances
                 SET
                    song_id = ?2,
                    name = ?3,
                    description = ?4,
                    duration_secs = ?5,
                    performance_data = ?6,
                    is_favorite = ?7,
                    tags = ?8,
                    play_count = ?9,
                    created_at = ?10,
                    updated_at = ?11
                 WHERE id = ?1;",
                params![
                    performance.id.as_str(),
                    performance.song_id.as_str(),
                    performance.name.as_str(),
                    performance.description.as_str(),
                    performance.duration_secs,
                    to_json("performances.performance_data", &performance.data)?,
                    bool_to_int(performance.is_favorite),
                    to_json("performances.tags", &normalize_tags(&performance.tags))?,
                    performance.play_count,
                    timestamp_to_db(&performance.created_at),
                    timestamp_to_db(&performance.updated_at),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        self.db.write(|tx| {
            let changed = tx.execute("DELETE FROM performances WHERE id = ?1;", [id])?;
            Ok(changed > 0)
        })
    }

    fn list_for_song(&self, song_id: &str) -> RepoResult<Vec<Performance>> {
        self.db.read(|conn| {
            query_performances(
                conn,
                "WHERE song_id = ?1 ORDER BY created_at DESC, id ASC",
                [song_id],
            )
        })
    }

    fn favorites(&self) -> RepoResult<Vec<Performance>> {
        self.db.read(|conn| {
            query_performances(
                conn,
                "WHERE is_favorite = 1 ORDER BY updated_at DESC, id ASC",
                [],
            )
        })
    }

    fn set_favorite(&self, id: &str, favorite: bool) -> RepoResult<bool> {
        self.db.write(|tx| {
            let changed = tx.execute(
                "UPDATE performances SET is_favorite = ?2 WHERE id = ?1;",
                params![id, bool_to_int(favorite)],
            )?;
            Ok(changed > 0)
        })
    }

    fn record_play(&self, id: &str) -> RepoResult<bool> {
        self.db.write(|tx| {
            let changed = tx.execute(
                "UPDATE performances SET play_count = play_count + 1 WHERE id = ?1;",
                [id],
            )?;
            Ok(changed > 0)
        })
    }

    fn with_tag(&self, tag: &str) -> RepoResult<Vec<Performance>> {
        let Some(tag) = normalize_tag(tag) else {
            return Ok(Vec::new());
        };
        self.db.read(|conn| {
            query_performances(
                conn,
                "WHERE EXISTS (
                    SELECT 1 FROM json_each(performances.tags) AS t
                    WHERE fold_case(t.value) = ?1
                 )
                 ORDER BY updated_at DESC, id ASC",
                [tag.as_str()],
            )
        })
    }

    fn search(&self, term: &str) -> RepoResult<Vec<Performance>> {
        let pattern = like_pattern(term);
        self.db.read(|conn| {
            query_performances(
                conn,
                r"WHERE fold_case(name) LIKE ?1 ESCAPE '\'
                    OR fold_case(description) LIKE ?1 ESCAPE '\'
                 ORDER BY updated_at DESC, id ASC",
                [pattern.as_str()],
            )
        })
    }

    fn recent(&self, limit: u32) -> RepoResult<Vec<Performance>> {
        self.db.read(|conn| {
            query_performances(
                conn,
                "ORDER BY updated_at DESC, id ASC LIMIT ?1",
                [i64::from(normalize_limit(limit))],
            )
        })
    }
}

pub(crate) fn insert_performance(conn: &Connection, performance: &Performance) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO performances (
            id,
            song_id,
            name,
            description,
            duration_secs,
            performance_data,
            is_favorite,
            tags,
            play_count,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
        params![
            performance.id.as_str(),
            performance.song_id.as_str(),
            performance.name.as_str(),
            performance.description.as_str(),
            performance.duration_secs,
            to_json("performances.performance_data", &performance.data)?,
            bool_to_int(performance.is_favorite),
            to_json("performances.tags", &normalize_tags(&performance.tags))?,
            performance.play_count,
            timestamp_to_db(&performance.created_at),
            timestamp_to_db(&performance.updated_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn list_performances(conn: &Connection) -> RepoResult<Vec<Performance>> {
    query_performances(conn, "ORDER BY created_at ASC, id ASC", [])
}

fn query_performances(
    conn: &Connection,
    clause: &'static str,
    params: impl Params,
) -> RepoResult<Vec<Performance>> {
    let mut stmt = conn.prepare(&format!("{PERFORMANCE_SELECT_SQL} {clause};"))?;
    let mut rows = stmt.query(params)?;
    let mut performances = Vec::new();
    while let Some(row) = rows.next()? {
        performances.push(parse_performance_row(row)?);
    }
    Ok(performances)
}

fn parse_performance_row(row: &Row<'_>) -> RepoResult<Performance> {
    let data: String = row.get("performance_data")?;
    let tags: String = row.get("tags")?;
    let tags: BTreeSet<String> = from_json("performances.tags", &tags)?;

    Ok(Performance {
        id: row.get("id")?,
        song_id: row.get("song_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        duration_secs: row.get("duration_secs")?,
        data: from_json("performances.performance_data", &data)?,
        is_favorite: int_to_bool("performances.is_favorite", row.get("is_favorite")?)?,
        tags,
        play_count: u32_from_db("performances.play_count", row.get("play_count")?)?,
        created_at: timestamp_from_db("performances.created_at", row.get("created_at")?)?,
        updated_at: timestamp_from_db("performances.updated_at", row.get("updated_at")?)?,
    })
}
