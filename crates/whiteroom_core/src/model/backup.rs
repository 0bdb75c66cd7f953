//! Full backups of songs, performances and preferences.
//!
//! A backup is immutable once written except for `name` and `description`.

use super::performance::Performance;
use super::preferences::UserPreferences;
use super::song::Song;
use super::{new_id, now_millis, require_id, require_name, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type BackupId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub id: BackupId,
    pub name: String,
    pub description: Option<String>,
    /// Stored at millisecond precision.
    pub timestamp: DateTime<Utc>,
    pub songs: Vec<Song>,
    pub performances: Vec<Performance>,
    pub preferences: Option<UserPreferences>,
    /// Size of the serialized snapshots in bytes.
    pub size_bytes: u64,
    /// Version of the application that wrote the backup.
    pub app_version: String,
}

impl Backup {
    /// Builds a backup stamped now. `size_bytes` is filled by the repository
    /// when the backup is captured, or left to the caller otherwise.
    pub fn new(
        name: impl Into<String>,
        songs: Vec<Song>,
        performances: Vec<Performance>,
        preferences: Option<UserPreferences>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            description: None,
            timestamp: now_millis(),
            songs,
            performances,
            preferences,
            size_bytes: 0,
            app_version: app_version.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_id("backup", &self.id)?;
        require_name("backup", &self.name)?;
        for song in &self.songs {
            song.validate()?;
        }
        for performance in &self.performances {
            performance.validate()?;
        }
        match &self.preferences {
            Some(preferences) => preferences.validate(),
            None => Ok(()),
        }
    }
}
