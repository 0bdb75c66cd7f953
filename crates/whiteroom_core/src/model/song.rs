//! Song (composition) model.
//!
//! # Invariants
//! - `tempo` is positive and finite.
//! - Time signature numerator is at least 1; denominator is a power of two.
//! - `rating`, when set, is within `1..=5`.
//! - Track volume and pan are finite.

use super::{new_id, now_millis, require_finite, require_id, require_name, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable song identifier.
pub type SongId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub const COMMON: Self = Self {
        numerator: 4,
        denominator: 4,
    };

    pub fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.numerator == 0 || self.denominator == 0 || !self.denominator.is_power_of_two() {
            return Err(ValidationError::InvalidTimeSignature {
                numerator: self.numerator,
                denominator: self.denominator,
            });
        }
        Ok(())
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }
}

/// Per-track authoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    pub id: String,
    pub name: String,
    pub instrument: String,
    pub volume: f64,
    pub pan: f64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
}

/// Arrangement section, measured in bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub start_bar: u32,
    pub length_bars: u32,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

fn default_repeat() -> u32 {
    1
}

/// Musical role assigned to one or more tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(default)]
    pub track_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub name: String,
    /// Beats per minute.
    pub tempo: f64,
    pub time_signature: TimeSignature,
    pub composer: Option<String>,
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub rating: Option<u8>,
    pub track_config: Vec<TrackConfig>,
    pub sections: Vec<Section>,
    pub roles: Vec<Role>,
    pub custom_metadata: BTreeMap<String, String>,
    /// Stored at millisecond precision.
    pub created_at: DateTime<Utc>,
    /// Stored at millisecond precision.
    pub updated_at: DateTime<Utc>,
}

impl Song {
    /// Creates a song with a generated id in common time.
    pub fn new(name: impl Into<String>, tempo: f64) -> Self {
        Self::with_id(new_id(), name, tempo)
    }

    /// Creates a song with a caller-provided id (import paths, fixtures).
    pub fn with_id(id: impl Into<SongId>, name: impl Into<String>, tempo: f64) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            name: name.into(),
            tempo,
            time_signature: TimeSignature::COMMON,
            composer: None,
            genre: None,
            mood: None,
            difficulty: None,
            rating: None,
            track_config: Vec::new(),
            sections: Vec::new(),
            roles: Vec::new(),
            custom_metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bumps `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_id("song", &self.id)?;
        require_name("song", &self.name)?;
        if !self.tempo.is_finite() || self.tempo <= 0.0 {
            return Err(ValidationError::InvalidTempo(self.tempo.to_string()));
        }
        self.time_signature.validate()?;
        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                return Err(ValidationError::InvalidRating(rating));
            }
        }
        for track in &self.track_config {
            require_finite("track_config.volume", track.volume)?;
            require_finite("track_config.pan", track.pan)?;
        }
        Ok(())
    }
}
