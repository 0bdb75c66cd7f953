//! Performance model: a captured take of one song.

use super::song::SongId;
use super::{new_id, now_millis, require_finite, require_id, require_name, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type PerformanceId = String;

/// One played note, positioned in beats from the start of the take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub track_id: String,
    pub start_beats: f64,
    pub duration_beats: f64,
    pub pitch: u8,
    pub velocity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationPoint {
    pub parameter: String,
    pub beat: f64,
    pub value: f64,
}

/// Recorded content of a performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceData {
    #[serde(default)]
    pub events: Vec<NoteEvent>,
    #[serde(default)]
    pub automation: Vec<AutomationPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub id: PerformanceId,
    pub song_id: SongId,
    pub name: String,
    pub description: String,
    pub duration_secs: f64,
    pub data: PerformanceData,
    pub is_favorite: bool,
    /// Lowercase, trimmed, deduplicated. Repositories normalize on write.
    pub tags: BTreeSet<String>,
    pub play_count: u32,
    /// Stored at millisecond precision.
    pub created_at: DateTime<Utc>,
    /// Stored at millisecond precision.
    pub updated_at: DateTime<Utc>,
}

impl Performance {
    pub fn new(song_id: impl Into<SongId>, name: impl Into<String>) -> Self {
        Self::with_id(new_id(), song_id, name)
    }

    pub fn with_id(
        id: impl Into<PerformanceId>,
        song_id: impl Into<SongId>,
        name: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            song_id: song_id.into(),
            name: name.into(),
            description: String::new(),
            duration_secs: 0.0,
            data: PerformanceData::default(),
            is_favorite: false,
            tags: BTreeSet::new(),
            play_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds a tag after normalization; empty tags are ignored.
    pub fn add_tag(&mut self, tag: &str) {
        if let Some(tag) = normalize_tag(tag) {
            self.tags.insert(tag);
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_id("performance", &self.id)?;
        require_id("song", &self.song_id)?;
        require_name("performance", &self.name)?;
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(ValidationError::InvalidDuration(self.duration_secs.to_string()));
        }
        self.data.validate()
    }
}

impl PerformanceData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for event in &self.events {
            require_finite("events.start_beats", event.start_beats)?;
            require_finite("events.duration_beats", event.duration_beats)?;
        }
        for point in &self.automation {
            require_finite("automation.beat", point.beat)?;
            require_finite("automation.value", point.value)?;
        }
        Ok(())
    }
}

/// Normalizes one tag value: trimmed and lowercase, `None` when empty.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes a whole tag set, dropping empty values and merging duplicates.
pub fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
    tags.into_iter()
        .filter_map(|tag| normalize_tag(tag))
        .collect()
}
