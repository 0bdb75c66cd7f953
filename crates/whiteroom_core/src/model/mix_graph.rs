//! Mixing graph attached one-to-one to a song.

use super::song::SongId;
use super::{new_id, now_millis, require_finite, require_id, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MixGraphId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixTrack {
    pub track_id: String,
    pub volume_db: f64,
    pub pan: f64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
    /// Bus id this track feeds; `None` routes straight to master.
    #[serde(default)]
    pub output_bus: Option<String>,
    #[serde(default)]
    pub inserts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixBus {
    pub id: String,
    pub name: String,
    pub volume_db: f64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub inserts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixSend {
    pub from_track: String,
    pub to_bus: String,
    pub level_db: f64,
    #[serde(default)]
    pub pre_fader: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterBus {
    pub volume_db: f64,
    #[serde(default)]
    pub limiter_enabled: bool,
    #[serde(default)]
    pub inserts: Vec<String>,
}

impl Default for MasterBus {
    fn default() -> Self {
        Self {
            volume_db: 0.0,
            limiter_enabled: true,
            inserts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixGraph {
    pub id: MixGraphId,
    pub song_id: SongId,
    pub tracks: Vec<MixTrack>,
    pub buses: Vec<MixBus>,
    pub sends: Vec<MixSend>,
    pub master: MasterBus,
    /// Stored at millisecond precision.
    pub updated_at: DateTime<Utc>,
}

impl MixGraph {
    /// Empty graph for `song_id` routed to a default master.
    pub fn new(song_id: impl Into<SongId>) -> Self {
        Self {
            id: new_id(),
            song_id: song_id.into(),
            tracks: Vec::new(),
            buses: Vec::new(),
            sends: Vec::new(),
            master: MasterBus::default(),
            updated_at: now_millis(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_id("mix graph", &self.id)?;
        require_id("song", &self.song_id)?;
        // Silence is expressed with `muted`, not an infinite attenuation.
        for track in &self.tracks {
            require_finite("tracks.volume_db", track.volume_db)?;
            require_finite("tracks.pan", track.pan)?;
        }
        for bus in &self.buses {
            require_finite("buses.volume_db", bus.volume_db)?;
        }
        for send in &self.sends {
            require_finite("sends.level_db", send.level_db)?;
        }
        require_finite("master.volume_db", self.master.volume_db)
    }
}
