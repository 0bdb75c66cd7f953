//! Marker storage.
//!
//! Markers are listed in musical order: bar first, then beat, then id for a
//! stable order between markers at the same position.

use crate::db::Database;
use crate::model::marker::{Marker, MarkerPosition};
use crate::model::ValidationError;
use crate::repo::{timestamp_from_db, timestamp_to_db, u32_from_db, RepoResult};
use rusqlite::{params, Connection, Params, Row};

const MARKER_SELECT_SQL: &str = "SELECT
    id,
    performance_id,
    name,
    position_bars,
    position_beats,
    color,
    note,
    created_at
FROM markers";

pub trait MarkerRepository {
    fn create(&self, marker: &Marker) -> RepoResult<()>;
    fn read(&self, id: &str) -> RepoResult<Option<Marker>>;
    fn update(&self, marker: &Marker) -> RepoResult<bool>;
    fn delete(&self, id: &str) -> RepoResult<bool>;
    fn list_for_performance(&self, performance_id: &str) -> RepoResult<Vec<Marker>>;
    /// Markers positioned in `[from, to]`, both bounds inclusive.
    fn list_in_range(
        &self,
        performance_id: &str,
        from: MarkerPosition,
        to: MarkerPosition,
    ) -> RepoResult<Vec<Marker>>;
}

pub struct SqliteMarkerRepository<'db> {
    db: &'db Database,
}

impl<'db> SqliteMarkerRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }
}

impl MarkerRepository for SqliteMarkerRepository<'_> {
    fn create(&self, marker: &Marker) -> RepoResult<()> {
        marker.validate()?;
        self.db.write(|tx| {
            tx.execute(
                "INSERT INTO markers (
                    id,
                    performance_id,
                    name,
                    position_bars,
                    position_beats,
                    color,
                    note,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    marker.id.as_str(),
                    marker.performance_id.as_str(),
                    marker.name.as_str(),
                    marker.position.bars,
                    marker.position.beats,
                    marker.color.as_str(),
                    marker.note.as_deref(),
                    timestamp_to_db(&marker.created_at),
                ],
            )?;
            Ok(())
        })
    }

    fn read(&self, id: &str) -> RepoResult<Option<Marker>> {
        self.db.read(|conn| {
            let mut found = query_markers(conn, "WHERE id = ?1", [id])?;
            Ok(found.pop())
        })
    }

    fn update(&self, marker: &Marker) -> RepoResult<bool> {
        marker.validate()?;
        self.db.write(|tx| {
            let changed = tx.execute(
                "UPDATE markers
                 SET
                    performance_id = ?2,
                    name = ?3,
                    position_bars = ?4,
                    position_beats = ?5,
                    color = ?6,
                    note = ?7,
                    created_at = ?8
                 WHERE id = ?1;",
                params![
                    marker.id.as_str(),
                    marker.performance_id.as_str(),
                    marker.name.as_str(),
                    marker.position.bars,
                    marker.position.beats,
                    marker.color.as_str(),
                    marker.note.as_deref(),
                    timestamp_to_db(&marker.created_at),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        self.db.write(|tx| {
            let changed = tx.execute("DELETE FROM markers WHERE id = ?1;", [id])?;
            Ok(changed > 0)
        })
    }

    fn list_for_performance(&self, performance_id: &str) -> RepoResult<Vec<Marker>> {
        self.db.read(|conn| {
            query_markers(
                conn,
                "WHERE performance_id = ?1
                 ORDER BY position_bars ASC, position_beats ASC, id ASC",
                [performance_id],
            )
        })
    }

    fn list_in_range(
        &self,
        performance_id: &str,
        from: MarkerPosition,
        to: MarkerPosition,
    ) -> RepoResult<Vec<Marker>> {
        if !from.beats.is_finite() || !to.beats.is_finite() {
            return Err(ValidationError::InvalidPosition(
                "range bounds must be finite".to_string(),
            )
            .into());
        }
        if from > to {
            return Ok(Vec::new());
        }
        self.db.read(|conn| {
            query_markers(
                conn,
                "WHERE performance_id = ?1
                   AND (position_bars > ?2 OR (position_bars = ?2 AND position_beats >= ?3))
                   AND (position_bars < ?4 OR (position_bars = ?4 AND position_beats <= ?5))
                 ORDER BY position_bars ASC, position_beats ASC, id ASC",
                params![performance_id, from.bars, from.beats, to.bars, to.beats],
            )
        })
    }
}

fn query_markers(
    conn: &Connection,
    clause: &'static str,
    params: impl Params,
) -> RepoResult<Vec<Marker>> {
    let mut stmt = conn.prepare(&format!("{MARKER_SELECT_SQL} {clause};"))?;
    let mut rows = stmt.query(params)?;
    let mut markers = Vec::new();
    while let Some(row) = rows.next()? {
        markers.push(parse_marker_row(row)?);
    }
    Ok(markers)
}

fn parse_marker_row(row: &Row<'_>) -> RepoResult<Marker> {
    Ok(Marker {
        id: row.get("id")?,
        performance_id: row.get("performance_id")?,
        name: row.get("name")?,
        position: MarkerPosition {
            bars: u32_from_db("markers.position_bars", row.get("position_bars")?)?,
            beats: row.get("position_beats")?,
        },
        color: row.get("color")?,
        note: row.get("note")?,
        created_at: timestamp_from_db("markers.created_at", row.get("created_at")?)?,
    })
}
