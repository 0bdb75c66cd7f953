//! Auto-save snapshots taken by the authoring layer's save cycle.

use super::song::{Song, SongId};
use super::{new_id, now_millis, require_id, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type AutoSaveId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoSave {
    pub id: AutoSaveId,
    pub song_id: SongId,
    pub snapshot: Song,
    /// Stored at millisecond precision.
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl AutoSave {
    /// Snapshots `song` now.
    pub fn of(song: &Song, description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            song_id: song.id.clone(),
            snapshot: song.clone(),
            timestamp: now_millis(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_id("auto-save", &self.id)?;
        require_id("song", &self.song_id)?;
        self.snapshot.validate()
    }
}
