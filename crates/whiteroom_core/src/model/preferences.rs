//! User preferences singleton.

use super::song::TimeSignature;
use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known id of the single preferences row.
pub const PREFERENCES_ID: &str = "default";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub theme: Theme,
    pub default_tempo: f64,
    pub default_time_signature: TimeSignature,
    pub sample_rate: u32,
    /// Audio buffer size in frames.
    pub buffer_size: u32,
    pub auto_save_enabled: bool,
    pub auto_save_interval_secs: u32,
    pub metronome_enabled: bool,
    pub midi_input_device: Option<String>,
    /// Most recent first.
    pub recent_song_ids: Vec<String>,
    pub custom_settings: BTreeMap<String, String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            default_tempo: 120.0,
            default_time_signature: TimeSignature::COMMON,
            sample_rate: 48_000,
            buffer_size: 512,
            auto_save_enabled: true,
            auto_save_interval_secs: 60,
            metronome_enabled: true,
            midi_input_device: None,
            recent_song_ids: Vec::new(),
            custom_settings: BTreeMap::new(),
        }
    }
}

impl UserPreferences {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.default_tempo.is_finite() || self.default_tempo <= 0.0 {
            return Err(ValidationError::InvalidTempo(self.default_tempo.to_string()));
        }
        self.default_time_signature.validate()?;
        if self.sample_rate == 0 {
            return Err(ValidationError::InvalidAudioSetting(
                "sample_rate must be positive".to_string(),
            ));
        }
        if !self.buffer_size.is_power_of_two() {
            return Err(ValidationError::InvalidAudioSetting(format!(
                "buffer_size must be a power of two, got {}",
                self.buffer_size
            )));
        }
        Ok(())
    }
}
