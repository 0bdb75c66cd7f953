//! Performance markers.
//!
//! # Invariants
//! - `color` is `#RRGGBB` hex.
//! - Position beats are finite and non-negative.

use super::performance::PerformanceId;
use super::{new_id, now_millis, require_id, require_name, ValidationError};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub type MarkerId = String;

pub const DEFAULT_MARKER_COLOR: &str = "#FFCC00";

static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color regex"));

/// Musical position: whole bars plus a beat offset within the bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerPosition {
    pub bars: u32,
    pub beats: f64,
}

impl MarkerPosition {
    pub fn new(bars: u32, beats: f64) -> Self {
        Self { bars, beats }
    }
}

impl PartialOrd for MarkerPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.bars.cmp(&other.bars) {
            Ordering::Equal => self.beats.partial_cmp(&other.beats),
            ordering => Some(ordering),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub performance_id: PerformanceId,
    pub name: String,
    pub position: MarkerPosition,
    pub color: String,
    pub note: Option<String>,
    /// Stored at millisecond precision.
    pub created_at: DateTime<Utc>,
}

impl Marker {
    pub fn new(
        performance_id: impl Into<PerformanceId>,
        name: impl Into<String>,
        position: MarkerPosition,
    ) -> Self {
        Self {
            id: new_id(),
            performance_id: performance_id.into(),
            name: name.into(),
            position,
            color: DEFAULT_MARKER_COLOR.to_string(),
            note: None,
            created_at: now_millis(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_id("marker", &self.id)?;
        require_id("performance", &self.performance_id)?;
        require_name("marker", &self.name)?;
        if !self.position.beats.is_finite() || self.position.beats < 0.0 {
            return Err(ValidationError::InvalidPosition(format!(
                "beats must be non-negative, got {}",
                self.position.beats
            )));
        }
        if !is_valid_color(&self.color) {
            return Err(ValidationError::InvalidColor(self.color.clone()));
        }
        Ok(())
    }
}

pub fn is_valid_color(value: &str) -> bool {
    COLOR_RE.is_match(value)
}
