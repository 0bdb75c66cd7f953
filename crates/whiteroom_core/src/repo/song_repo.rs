//! Song repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and search APIs over the `songs` table.
//! - Encode track config, sections, roles and custom metadata as JSON text.
//!
//! # Invariants
//! - Write paths call `Song::validate()` before SQL mutations.
//! - Deleting a song relies on schema cascades for performances, markers,
//!   auto-saves and the mix graph.

use crate::db::Database;
use crate::model::song::{Difficulty, Song, SongId, TimeSignature};
use crate::repo::{
    from_json, like_pattern, normalize_limit, timestamp_from_db, timestamp_to_db, to_json,
    u8_from_db, RepoError, RepoResult,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Params, Row};

const SONG_SELECT_SQL: &str = "SELECT
    id,
    name,
    tempo,
    time_signature_numerator,
    time_signature_denominator,
    composer,
    genre,
    mood,
    difficulty,
    rating,
    track_config,
    sections,
    roles,
    custom_metadata,
    created_at,
    updated_at
FROM songs";

/// Repository interface for songs.
pub trait SongRepository {
    fn create(&self, song: &Song) -> RepoResult<()>;
    fn read(&self, id: &str) -> RepoResult<Option<Song>>;
    /// Returns `false` when no song has `song.id`.
    fn update(&self, song: &Song) -> RepoResult<bool>;
    /// Returns `false` when no song has `id`.
    fn delete(&self, id: &str) -> RepoResult<bool>;
    /// All songs ordered by name.
    fn list_all(&self) -> RepoResult<Vec<Song>>;
    /// Case-insensitive substring match on name, composer, genre and mood.
    fn search(&self, term: &str) -> RepoResult<Vec<Song>>;
    /// At most `limit` songs (capped at `LIST_LIMIT_MAX`), most recently
    /// updated first. A zero limit returns nothing.
    fn recent(&self, limit: u32) -> RepoResult<Vec<Song>>;
    /// Songs created in `[from, to]`, oldest first.
    fn created_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<Vec<Song>>;
    fn by_genre(&self, genre: &str) -> RepoResult<Vec<Song>>;
    fn count(&self) -> RepoResult<u64>;
}

/// SQLite-backed song repository.
pub struct SqliteSongRepository<'db> {
    db: &'db Database,
}

impl<'db> SqliteSongRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }
}

impl SongRepository for SqliteSongRepository<'_> {
    fn create(&self, song: &Song) -> RepoResult<()> {
        song.validate()?;
        self.db.write(|tx| insert_song(tx, song))
    }

    fn read(&self, id: &str) -> RepoResult<Option<Song>> {
        self.db.read(|conn| {
            let mut songs = query_songs(conn, "WHERE id = ?1", [id])?;
            Ok(songs.pop())
        })
    }

    fn update(&self, song: &Song) -> RepoResult<bool> {
        song.validate()?;
        self.db.write(|tx| {
            let changed = tx.execute(
                "UPDATE songs
                 SET
                    name = ?2,
                    tempo = ?3,
                    time_signature_numerator = ?4,
                    time_signature_denominator = ?5,
                    composer = ?6,
                    genre = ?7,
                    mood = ?8,
                    difficulty = ?9,
                    rating = ?10,
                    track_config = ?11,
                    sections = ?12,
                    roles = ?13,
                    custom_metadata = ?14,
                    created_at = ?15,
                    updated_at = ?16
                 WHERE id = ?1;",
                params![
                    song.id.as_str(),
                    song.name.as_str(),
                    song.tempo,
                    song.time_signature.numerator,
                    song.time_signature.denominator,
                    song.composer.as_deref(),
                    song.genre.as_deref(),
                    song.mood.as_deref(),
                    song.difficulty.map(Difficulty::as_str),
                    song.rating,
                    to_json("songs.track_config", &song.track_config)?,
                    to_json("songs.sections", &song.sections)?,
                    to_json("songs.roles", &song.roles)?,
                    to_json("songs.custom_metadata", &song.custom_metadata)?,
                    timestamp_to_db(&song.created_at),
                    timestamp_to_db(&song.updated_at),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        self.db.write(|tx| {
            let changed = tx.execute("DELETE FROM songs WHERE id = ?1;", [id])?;
            Ok(changed > 0)
        })
    }

    fn list_all(&self) -> RepoResult<Vec<Song>> {
        self.db.read(list_songs)
    }

    fn search(&self, term: &str) -> RepoResult<Vec<Song>> {
        let pattern = like_pattern(term);
        self.db.read(|conn| {
            query_songs(
                conn,
                r"WHERE fold_case(name) LIKE ?1 ESCAPE '\'
                    OR fold_case(composer) LIKE ?1 ESCAPE '\'
                    OR fold_case(genre) LIKE ?1 ESCAPE '\'
                    OR fold_case(mood) LIKE ?1 ESCAPE '\'
                 ORDER BY name COLLATE NOCASE ASC, id ASC",
                [pattern.as_str()],
            )
        })
    }

    fn recent(&self, limit: u32) -> RepoResult<Vec<Song>> {
        self.db.read(|conn| {
            query_songs(
                conn,
                "ORDER BY updated_at DESC, id ASC LIMIT ?1",
                [i64::from(normalize_limit(limit))],
            )
        })
    }

    fn created_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<Vec<Song>> {
        self.db.read(|conn| {
            query_songs(
                conn,
                "WHERE created_at BETWEEN ?1 AND ?2 ORDER BY created_at ASC, id ASC",
                [timestamp_to_db(&from), timestamp_to_db(&to)],
            )
        })
    }

    fn by_genre(&self, genre: &str) -> RepoResult<Vec<Song>> {
        let genre = genre.to_lowercase();
        self.db.read(|conn| {
            query_songs(
                conn,
                "WHERE fold_case(genre) = ?1 ORDER BY name COLLATE NOCASE ASC, id ASC",
                [genre.as_str()],
            )
        })
    }

    fn count(&self) -> RepoResult<u64> {
        self.db.read(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM songs;", [], |row| row.get(0))?;
            Ok(count.unsigned_abs())
        })
    }
}

pub(crate) fn insert_song(conn: &Connection, song: &Song) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO songs (
            id,
            name,
            tempo,
            time_signature_numerator,
            time_signature_denominator,
            composer,
            genre,
            mood,
            difficulty,
            rating,
            track_config,
            sections,
            roles,
            custom_metadata,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
        params![
            song.id.as_str(),
            song.name.as_str(),
            song.tempo,
            song.time_signature.numerator,
            song.time_signature.denominator,
            song.composer.as_deref(),
            song.genre.as_deref(),
            song.mood.as_deref(),
            song.difficulty.map(Difficulty::as_str),
            song.rating,
            to_json("songs.track_config", &song.track_config)?,
            to_json("songs.sections", &song.sections)?,
            to_json("songs.roles", &song.roles)?,
            to_json("songs.custom_metadata", &song.custom_metadata)?,
            timestamp_to_db(&song.created_at),
            timestamp_to_db(&song.updated_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn list_songs(conn: &Connection) -> RepoResult<Vec<Song>> {
    query_songs(conn, "ORDER BY name COLLATE NOCASE ASC, id ASC", [])
}

fn query_songs(
    conn: &Connection,
    clause: &'static str,
    params: impl Params,
) -> RepoResult<Vec<Song>> {
    let mut stmt = conn.prepare(&format!("{SONG_SELECT_SQL} {clause};"))?;
    let mut rows = stmt.query(params)?;
    let mut songs = Vec::new();
    while let Some(row) = rows.next()? {
        songs.push(parse_song_row(row)?);
    }
    Ok(songs)
}

fn parse_song_row(row: &Row<'_>) -> RepoResult<Song> {
    let id: SongId = row.get("id")?;

    let difficulty = match row.get::<_, Option<String>>("difficulty")? {
        Some(value) => Some(Difficulty::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid difficulty `{value}` in songs.difficulty"))
        })?),
        None => None,
    };

    let rating = match row.get::<_, Option<i64>>("rating")? {
        Some(value) => Some(u8_from_db("songs.rating", value)?),
        None => None,
    };

    let track_config: String = row.get("track_config")?;
    let sections: String = row.get("sections")?;
    let roles: String = row.get("roles")?;
    let custom_metadata: String = row.get("custom_metadata")?;

    Ok(Song {
        id,
        name: row.get("name")?,
        tempo: row.get("tempo")?,
        time_signature: TimeSignature {
            numerator: u8_from_db(
                "songs.time_signature_numerator",
                row.get("time_signature_numerator")?,
            )?,
            denominator: u8_from_db(
                "songs.time_signature_denominator",
                row.get("time_signature_denominator")?,
            )?,
        },
        composer: row.get("composer")?,
        genre: row.get("genre")?,
        mood: row.get("mood")?,
        difficulty,
        rating,
        track_config: from_json("songs.track_config", &track_config)?,
        sections: from_json("songs.sections", &sections)?,
        roles: from_json("songs.roles", &roles)?,
        custom_metadata: from_json("songs.custom_metadata", &custom_metadata)?,
        created_at: timestamp_from_db("songs.created_at", row.get("created_at")?)?,
        updated_at: timestamp_from_db("songs.updated_at", row.get("updated_at")?)?,
    })
}
