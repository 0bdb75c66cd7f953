//! Mix graph storage, one graph per song.

use crate::db::Database;
use crate::model::mix_graph::MixGraph;
use crate::repo::{from_json, timestamp_from_db, timestamp_to_db, to_json, RepoResult};
use rusqlite::{params, Connection, Params, Row};

const MIX_GRAPH_SELECT_SQL: &str = "SELECT
    id,
    song_id,
    tracks,
    buses,
    sends,
    master,
    updated_at
FROM mix_graphs";

pub trait MixGraphRepository {
    /// Fails with `ConstraintViolation` when the song already has a graph.
    fn create(&self, graph: &MixGraph) -> RepoResult<()>;
    fn read(&self, id: &str) -> RepoResult<Option<MixGraph>>;
    fn read_for_song(&self, song_id: &str) -> RepoResult<Option<MixGraph>>;
    fn update(&self, graph: &MixGraph) -> RepoResult<bool>;
    fn delete(&self, id: &str) -> RepoResult<bool>;
    /// Inserts `graph`, or replaces the graph already attached to its song.
    ///
    /// The stored row keeps the id of the existing graph; the returned value
    /// is what was stored.
    fn upsert_for_song(&self, graph: &MixGraph) -> RepoResult<MixGraph>;
}

pub struct SqliteMixGraphRepository<'db> {
    db: &'db Database,
}

impl<'db> SqliteMixGraphRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }
}

impl MixGraphRepository for SqliteMixGraphRepository<'_> {
    fn create(&self, graph: &MixGraph) -> RepoResult<()> {
        graph.validate()?;
        self.db.write(|tx| insert_mix_graph(tx, graph))
    }

    fn read(&self, id: &str) -> RepoResult<Option<MixGraph>> {
        self.db.read(|conn| {
            let mut found = query_mix_graphs(conn, "WHERE id = ?1", [id])?;
            Ok(found.pop())
        })
    }

    fn read_for_song(&self, song_id: &str) -> RepoResult<Option<MixGraph>> {
        self.db.read(|conn| read_graph_for_song(conn, song_id))
    }

    fn update(&self, graph: &MixGraph) -> RepoResult<bool> {
        graph.validate()?;
        self.db.write(|tx| {
            let changed = tx.execute(
                "UPDATE mix_graphs
                 SET
                    song_id = ?2,
                    tracks = ?3,
                    buses = ?4,
                    sends = ?5,
                    master = ?6,
                    updated_at = ?7
                 WHERE id = ?1;",
                params![
                    graph.id.as_str(),
                    graph.song_id.as_str(),
                    to_json("mix_graphs.tracks", &graph.tracks)?,
                    to_json("mix_graphs.buses", &graph.buses)?,
                    to_json("mix_graphs.sends", &graph.sends)?,
                    to_json("mix_graphs.master", &graph.master)?,
                    timestamp_to_db(&graph.updated_at),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        self.db.write(|tx| {
            let changed = tx.execute("DELETE FROM mix_graphs WHERE id = ?1;", [id])?;
            Ok(changed > 0)
        })
    }

    fn upsert_for_song(&self, graph: &MixGraph) -> RepoResult<MixGraph> {
        graph.validate()?;
        self.db.write(|tx| {
            tx.execute(
                "INSERT INTO mix_graphs (id, song_id, tracks, buses, sends, master, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(song_id) DO UPDATE SET
                    tracks = excluded.tracks,
                    buses = excluded.buses,
                    sends = excluded.sends,
                    master = excluded.master,
                    updated_at = excluded.updated_at;",
                params![
                    graph.id.as_str(),
                    graph.song_id.as_str(),
                    to_json("mix_graphs.tracks", &graph.tracks)?,
                    to_json("mix_graphs.buses", &graph.buses)?,
                    to_json("mix_graphs.sends", &graph.sends)?,
                    to_json("mix_graphs.master", &graph.master)?,
                    timestamp_to_db(&graph.updated_at),
                ],
            )?;
            let stored = read_graph_for_song(tx, &graph.song_id)?;
            Ok(stored.unwrap_or_else(|| graph.clone()))
        })
    }
}

fn insert_mix_graph(conn: &Connection, graph: &MixGraph) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO mix_graphs (id, song_id, tracks, buses, sends, master, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            graph.id.as_str(),
            graph.song_id.as_str(),
            to_json("mix_graphs.tracks", &graph.tracks)?,
            to_json("mix_graphs.buses", &graph.buses)?,
            to_json("mix_graphs.sends", &graph.sends)?,
            to_json("mix_graphs.master", &graph.master)?,
            timestamp_to_db(&graph.updated_at),
        ],
    )?;
    Ok(())
}

fn read_graph_for_song(conn: &Connection, song_id: &str) -> RepoResult<Option<MixGraph>> {
    let mut found = query_mix_graphs(conn, "WHERE song_id = ?1", [song_id])?;
    Ok(found.pop())
}

fn query_mix_graphs(
    conn: &Connection,
    clause: &'static str,
    params: impl Params,
) -> RepoResult<Vec<MixGraph>> {
    let mut stmt = conn.prepare(&format!("{MIX_GRAPH_SELECT_SQL} {clause};"))?;
    let mut rows = stmt.query(params)?;
    let mut graphs = Vec::new();
    while let Some(row) = rows.next()? {
        graphs.push(parse_mix_graph_row(row)?);
    }
    Ok(graphs)
}

fn parse_mix_graph_row(row: &Row<'_>) -> RepoResult<MixGraph> {
    let tracks: String = row.get("tracks")?;
    let buses: String = row.get("buses")?;
    let sends: String = row.get("sends")?;
    let master: String = row.get("master")?;

    Ok(MixGraph {
        id: row.get("id")?,
        song_id: row.get("song_id")?,
        tracks: from_json("mix_graphs.tracks", &tracks)?,
        buses: from_json("mix_graphs.buses", &buses)?,
        sends: from_json("mix_graphs.sends", &sends)?,
        master: from_json("mix_graphs.master", &master)?,
        updated_at: timestamp_from_db("mix_graphs.updated_at", row.get("updated_at")?)?,
    })
}
