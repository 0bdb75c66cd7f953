//! Singleton user preferences storage.
//!
//! The `user_preferences` table holds at most one row, keyed by
//! [`PREFERENCES_ID`]. Writes upsert that row in place.

use crate::db::Database;
use crate::model::now_millis;
use crate::model::preferences::{Theme, UserPreferences, PREFERENCES_ID};
use crate::model::song::TimeSignature;
use crate::repo::{
    bool_to_int, from_json, int_to_bool, timestamp_to_db, to_json, u32_from_db, u8_from_db,
    RepoError, RepoResult,
};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub trait PreferencesRepository {
    /// Stored preferences, or `None` before the first write.
    fn read(&self) -> RepoResult<Option<UserPreferences>>;
    /// Stored preferences, writing defaults first when none exist.
    fn get_or_create_default(&self) -> RepoResult<UserPreferences>;
    fn upsert(&self, preferences: &UserPreferences) -> RepoResult<()>;
    /// Overwrites the stored preferences with defaults and returns them.
    fn reset(&self) -> RepoResult<UserPreferences>;
}

pub struct SqlitePreferencesRepository<'db> {
    db: &'db Database,
}

impl<'db> SqlitePreferencesRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }
}

impl PreferencesRepository for SqlitePreferencesRepository<'_> {
    fn read(&self) -> RepoResult<Option<UserPreferences>> {
        self.db.read(read_preferences)
    }

    fn get_or_create_default(&self) -> RepoResult<UserPreferences> {
        self.db.write(|tx| {
            if let Some(existing) = read_preferences(tx)? {
                return Ok(existing);
            }
            let defaults = UserPreferences::default();
            upsert_preferences(tx, &defaults)?;
            info!("event=preferences_defaulted module=repo status=ok");
            Ok(defaults)
        })
    }

    fn upsert(&self, preferences: &UserPreferences) -> RepoResult<()> {
        preferences.validate()?;
        self.db.write(|tx| upsert_preferences(tx, preferences))
    }

    fn reset(&self) -> RepoResult<UserPreferences> {
        let defaults = UserPreferences::default();
        self.db.write(|tx| upsert_preferences(tx, &defaults))?;
        info!("event=preferences_reset module=repo status=ok");
        Ok(defaults)
    }
}

pub(crate) fn read_preferences(conn: &Connection) -> RepoResult<Option<UserPreferences>> {
    conn.query_row(
        "SELECT
            theme,
            default_tempo,
            default_time_signature_numerator,
            default_time_signature_denominator,
            sample_rate,
            buffer_size,
            auto_save_enabled,
            auto_save_interval_secs,
            metronome_enabled,
            midi_input_device,
            recent_song_ids,
            custom_settings
         FROM user_preferences
         WHERE id = ?1;",
        [PREFERENCES_ID],
        |row| Ok(parse_preferences_row(row)),
    )
    .optional()?
    .transpose()
}

pub(crate) fn upsert_preferences(
    conn: &Connection,
    preferences: &UserPreferences,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO user_preferences (
            id,
            theme,
            default_tempo,
            default_time_signature_numerator,
            default_time_signature_denominator,
            sample_rate,
            buffer_size,
            auto_save_enabled,
            auto_save_interval_secs,
            metronome_enabled,
            midi_input_device,
            recent_song_ids,
            custom_settings,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(id) DO UPDATE SET
            theme = excluded.theme,
            default_tempo = excluded.default_tempo,
            default_time_signature_numerator = excluded.default_time_signature_numerator,
            default_time_signature_denominator = excluded.default_time_signature_denominator,
            sample_rate = excluded.sample_rate,
            buffer_size = excluded.buffer_size,
            auto_save_enabled = excluded.auto_save_enabled,
            auto_save_interval_secs = excluded.auto_save_interval_secs,
            metronome_enabled = excluded.metronome_enabled,
            midi_input_device = excluded.midi_input_device,
            recent_song_ids = excluded.recent_song_ids,
            custom_settings = excluded.custom_settings,
            updated_at = excluded.updated_at;",
        params![
            PREFERENCES_ID,
            preferences.theme.as_str(),
            preferences.default_tempo,
            preferences.default_time_signature.numerator,
            preferences.default_time_signature.denominator,
            preferences.sample_rate,
            preferences.buffer_size,
            bool_to_int(preferences.auto_save_enabled),
            preferences.auto_save_interval_secs,
            bool_to_int(preferences.metronome_enabled),
            preferences.midi_input_device.as_deref(),
            to_json("user_preferences.recent_song_ids", &preferences.recent_song_ids)?,
            to_json("user_preferences.custom_settings", &preferences.custom_settings)?,
            timestamp_to_db(&now_millis()),
        ],
    )?;
    Ok(())
}

fn parse_preferences_row(row: &Row<'_>) -> RepoResult<UserPreferences> {
    let theme: String = row.get("theme")?;
    let theme = Theme::parse(&theme).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid theme `{theme}` in user_preferences.theme"))
    })?;
    let recent_song_ids: String = row.get("recent_song_ids")?;
    let custom_settings: String = row.get("custom_settings")?;

    Ok(UserPreferences {
        theme,
        default_tempo: row.get("default_tempo")?,
        default_time_signature: TimeSignature {
            numerator: u8_from_db(
                "user_preferences.default_time_signature_numerator",
                row.get("default_time_signature_numerator")?,
            )?,
            denominator: u8_from_db(
                "user_preferences.default_time_signature_denominator",
                row.get("default_time_signature_denominator")?,
            )?,
        },
        sample_rate: u32_from_db("user_preferences.sample_rate", row.get("sample_rate")?)?,
        buffer_size: u32_from_db("user_preferences.buffer_size", row.get("buffer_size")?)?,
        auto_save_enabled: int_to_bool(
            "user_preferences.auto_save_enabled",
            row.get("auto_save_enabled")?,
        )?,
        auto_save_interval_secs: u32_from_db(
            "user_preferences.auto_save_interval_secs",
            row.get("auto_save_interval_secs")?,
        )?,
        metronome_enabled: int_to_bool(
            "user_preferences.metronome_enabled",
            row.get("metronome_enabled")?,
        )?,
        midi_input_device: row.get("midi_input_device")?,
        recent_song_ids: from_json("user_preferences.recent_song_ids", &recent_song_ids)?,
        custom_settings: from_json("user_preferences.custom_settings", &custom_settings)?,
    })
}
