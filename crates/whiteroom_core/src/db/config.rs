//! Storage configuration and per-OS data directory resolution.

use super::{DbError, DbResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "WHITEROOM_DATA_DIR";
/// File name of the store inside the data directory.
pub const DB_FILE_NAME: &str = "whiteroom.sqlite3";

const APP_DIR_NAME: &str = "WhiteRoom";
const DEFAULT_CACHE_SIZE_KIB: i64 = 8 * 1024;
const DEFAULT_MMAP_SIZE_BYTES: i64 = 64 * 1024 * 1024;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    InMemory,
}

impl DbLocation {
    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::InMemory => "memory",
        }
    }
}

/// Connection tuning and bootstrap options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub location: DbLocation,
    /// Page cache bound in KiB (applied as a negative `cache_size`).
    pub cache_size_kib: i64,
    /// Memory-mapped I/O window in bytes. `0` disables mmap.
    pub mmap_size_bytes: i64,
    pub busy_timeout: Duration,
    /// Explicit schema definition file, probed before every other candidate.
    pub schema_path: Option<PathBuf>,
}

impl DbConfig {
    /// Config for a store file at `path`.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self::with_location(DbLocation::File(path.into()))
    }

    /// Config for a private in-memory store.
    pub fn in_memory() -> Self {
        Self::with_location(DbLocation::InMemory)
    }

    /// Config for the default store file in the per-OS data directory.
    pub fn from_env() -> DbResult<Self> {
        Ok(Self::for_path(default_data_dir()?.join(DB_FILE_NAME)))
    }

    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    pub fn with_cache_size_kib(mut self, kib: i64) -> Self {
        self.cache_size_kib = kib;
        self
    }

    pub fn with_mmap_size_bytes(mut self, bytes: i64) -> Self {
        self.mmap_size_bytes = bytes;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn with_location(location: DbLocation) -> Self {
        Self {
            location,
            cache_size_kib: DEFAULT_CACHE_SIZE_KIB,
            mmap_size_bytes: DEFAULT_MMAP_SIZE_BYTES,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            schema_path: None,
        }
    }
}

/// Resolves the application data directory.
///
/// `WHITEROOM_DATA_DIR` wins when set and non-empty; otherwise the platform
/// data directory (`~/.local/share`, `~/Library/Application Support`,
/// `%APPDATA%`) joined with `WhiteRoom`.
pub fn default_data_dir() -> DbResult<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    dirs::data_dir()
        .map(|base| base.join(APP_DIR_NAME))
        .ok_or_else(|| {
            DbError::InitializationFailed(
                "could not resolve a per-user data directory".to_string(),
            )
        })
}

pub(crate) fn ensure_parent_dir(path: &Path) -> DbResult<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    std::fs::create_dir_all(parent).map_err(|err| {
        DbError::InitializationFailed(format!(
            "failed to create data directory `{}`: {err}",
            parent.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = DbConfig::in_memory()
            .with_cache_size_kib(512)
            .with_mmap_size_bytes(0)
            .with_schema_path("/tmp/schema.sql");

        assert_eq!(config.location, DbLocation::InMemory);
        assert_eq!(config.cache_size_kib, 512);
        assert_eq!(config.mmap_size_bytes, 0);
        assert_eq!(config.schema_path, Some(PathBuf::from("/tmp/schema.sql")));
        assert_eq!(config.busy_timeout, DEFAULT_BUSY_TIMEOUT);
    }

    #[test]
    fn file_config_reports_file_mode() {
        let config = DbConfig::for_path("/tmp/whiteroom.sqlite3");
        assert_eq!(config.location.mode(), "file");
        assert_eq!(DbConfig::in_memory().location.mode(), "memory");
    }
}
