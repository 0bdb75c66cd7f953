//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define per-entity data access contracts.
//! - Isolate SQLite query details and the JSON encoding of nested
//!   sub-structures from callers.
//!
//! # Invariants
//! - Repository writes call the model's `validate()` before SQL mutations.
//! - Absence by id is `Ok(None)` / `Ok(false)`, never an error.
//! - Every multi-statement write runs inside one `Database::write` call.
//! - Foreign keys and cascades are enforced by the schema, not here.

pub mod autosave_repo;
pub mod backup_repo;
pub mod marker_repo;
pub mod mix_graph_repo;
pub mod performance_repo;
pub mod preferences_repo;
pub mod song_repo;

use crate::db::DbError;
use crate::model::ValidationError;
use chrono::{DateTime, Utc};
use rusqlite::ErrorCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Missing parent row, uniqueness breach or CHECK failure.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to encode or decode {column}: {source}")]
    Serialization {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::ConstraintViolation(value.to_string()),
            Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => {
                Self::Db(DbError::DatabaseCorrupted(value.to_string()))
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Upper bound applied to caller-supplied list limits.
pub const LIST_LIMIT_MAX: u32 = 500;

/// Caps a caller limit at `LIST_LIMIT_MAX`. Zero stays zero and yields an
/// empty page.
pub fn normalize_limit(limit: u32) -> u32 {
    limit.min(LIST_LIMIT_MAX)
}

/// Wraps a search term into a `LIKE` pattern with `\` as escape character.
///
/// The term is lowercased with Unicode rules so it can be matched against
/// `fold_case(column)`. `%`, `_` and `\` in the term match literally.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

pub(crate) fn to_json<T: Serialize>(column: &'static str, value: &T) -> RepoResult<String> {
    serde_json::to_string(value).map_err(|source| RepoError::Serialization { column, source })
}

pub(crate) fn from_json<T: DeserializeOwned>(column: &'static str, raw: &str) -> RepoResult<T> {
    serde_json::from_str(raw).map_err(|source| RepoError::Serialization { column, source })
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(column: &'static str, value: i64) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

/// Timestamps are stored as Unix epoch milliseconds.
pub(crate) fn timestamp_to_db(value: &DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub(crate) fn timestamp_from_db(column: &'static str, millis: i64) -> RepoResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        RepoError::InvalidData(format!("timestamp `{millis}` out of range in {column}"))
    })
}

pub(crate) fn u32_from_db(column: &'static str, value: i64) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("value `{value}` out of range in {column}")))
}

pub(crate) fn u8_from_db(column: &'static str, value: i64) -> RepoResult<u8> {
    u8::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("value `{value}` out of range in {column}")))
}
