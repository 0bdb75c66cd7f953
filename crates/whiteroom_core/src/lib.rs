//! Embedded persistence core for WhiteRoom.
//! Owns the schema, its migrations and every repository the host uses.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use db::{
    initialize, initialize_with, open_db_in_memory, Database, DbConfig, DbError, DbLocation,
    DbResult, Migration, MigrationEngine, MigrationRegistry, MigrationReport,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::autosave::AutoSave;
pub use model::backup::Backup;
pub use model::marker::{Marker, MarkerPosition};
pub use model::mix_graph::{MasterBus, MixBus, MixGraph, MixSend, MixTrack};
pub use model::performance::{Performance, PerformanceData};
pub use model::preferences::{Theme, UserPreferences};
pub use model::song::{Difficulty, Song, TimeSignature};
pub use model::ValidationError;
pub use repo::autosave_repo::{AutoSaveRepository, SqliteAutoSaveRepository};
pub use repo::backup_repo::{BackupRepository, SqliteBackupRepository};
pub use repo::marker_repo::{MarkerRepository, SqliteMarkerRepository};
pub use repo::mix_graph_repo::{MixGraphRepository, SqliteMixGraphRepository};
pub use repo::performance_repo::{PerformanceRepository, SqlitePerformanceRepository};
pub use repo::preferences_repo::{PreferencesRepository, SqlitePreferencesRepository};
pub use repo::song_repo::{SongRepository, SqliteSongRepository};
pub use repo::{RepoError, RepoResult};

/// Returns the core crate version.
///
/// Used as the `app_version` tag of captured backups.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
