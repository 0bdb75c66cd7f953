//! Domain model persisted by the core.
//!
//! # Responsibility
//! - Define typed records for every persisted entity and their nested
//!   sub-structures.
//! - Validate records before the repository layer writes them.
//!
//! # Invariants
//! - Timestamps carry millisecond precision, matching their stored form.
//!   Sub-millisecond digits on a timestamp set by hand are dropped on write,
//!   so build timestamps with [`now_millis`] for exact round trips.
//! - Floats inside nested sub-structures are finite; JSON has no encoding
//!   for NaN or infinities.
//! - Nested sub-structures are plain serde types; they are only turned into
//!   text at the repository boundary.

pub mod autosave;
pub mod backup;
pub mod marker;
pub mod mix_graph;
pub mod performance;
pub mod preferences;
pub mod song;

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Reasons a record is rejected before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{entity} id cannot be empty")]
    EmptyId { entity: &'static str },
    #[error("{entity} name cannot be empty")]
    EmptyName { entity: &'static str },
    #[error("tempo must be a positive finite number, got {0}")]
    InvalidTempo(String),
    #[error("invalid time signature {numerator}/{denominator}")]
    InvalidTimeSignature { numerator: u8, denominator: u8 },
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("duration must be a non-negative finite number, got {0}")]
    InvalidDuration(String),
    #[error("marker position is invalid: {0}")]
    InvalidPosition(String),
    #[error("color must be formatted as #RRGGBB, got `{0}`")]
    InvalidColor(String),
    #[error("invalid audio setting: {0}")]
    InvalidAudioSetting(String),
    #[error("{field} must be a finite number, got {value}")]
    NonFiniteValue { field: &'static str, value: String },
}

/// Current time truncated to the stored precision.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Fresh random record id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn require_id(entity: &'static str, id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyId { entity });
    }
    Ok(())
}

pub(crate) fn require_name(entity: &'static str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName { entity });
    }
    Ok(())
}

pub(crate) fn require_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
