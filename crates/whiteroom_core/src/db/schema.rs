//! Schema definition file lookup.
//!
//! The initial migration applies an externally supplied SQL script. The file
//! is located by probing an ordered candidate list; the first existing file
//! wins and a miss on every candidate is fatal.

use super::{DbError, DbResult};
use log::{debug, info};
use std::path::PathBuf;

/// Environment variable pointing at the schema definition file.
pub const SCHEMA_PATH_ENV: &str = "WHITEROOM_SCHEMA_PATH";
/// File name probed under the install and working directories.
pub const SCHEMA_FILE_NAME: &str = "whiteroom_schema.sql";

const SCHEMA_DIR_NAME: &str = "schema";

/// Ordered list of candidate schema file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLocator {
    candidates: Vec<PathBuf>,
}

impl SchemaLocator {
    /// Builds the default probe order, with `explicit` first when given:
    /// explicit path, `WHITEROOM_SCHEMA_PATH`, `<exe dir>/schema/…`,
    /// `<cwd>/schema/…`.
    pub fn new(explicit: Option<PathBuf>) -> Self {
        let mut candidates = Vec::new();
        candidates.extend(explicit);

        if let Some(path) = std::env::var_os(SCHEMA_PATH_ENV).filter(|value| !value.is_empty()) {
            candidates.push(PathBuf::from(path));
        }

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
        {
            candidates.push(exe_dir.join(SCHEMA_DIR_NAME).join(SCHEMA_FILE_NAME));
        }

        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(SCHEMA_DIR_NAME).join(SCHEMA_FILE_NAME));
        }

        Self { candidates }
    }

    /// Uses exactly the given candidates, in order.
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Returns the first candidate that is an existing file.
    pub fn locate(&self) -> DbResult<PathBuf> {
        for candidate in &self.candidates {
            debug!(
                "event=schema_probe module=db candidate={}",
                candidate.display()
            );
            if candidate.is_file() {
                info!(
                    "event=schema_probe module=db status=ok path={}",
                    candidate.display()
                );
                return Ok(candidate.clone());
            }
        }

        Err(DbError::SchemaFileNotFound {
            candidates: self.candidates.clone(),
        })
    }

    /// Locates and reads the schema script.
    pub fn load(&self) -> DbResult<String> {
        let path = self.locate()?;
        std::fs::read_to_string(&path).map_err(|err| {
            DbError::InitializationFailed(format!(
                "failed to read schema file `{}`: {err}",
                path.display()
            ))
        })
    }
}
