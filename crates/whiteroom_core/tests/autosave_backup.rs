use chrono::Duration;
use whiteroom_core::model::song::TrackConfig;
use whiteroom_core::{
    core_version, open_db_in_memory, AutoSave, AutoSaveRepository, Backup, BackupRepository,
    Database, Performance, PerformanceRepository, PreferencesRepository, Song, SongRepository,
    SqliteAutoSaveRepository, SqliteBackupRepository, SqlitePerformanceRepository,
    SqlitePreferencesRepository, SqliteSongRepository, Theme, UserPreferences, ValidationError,
};

#[test]
fn auto_save_roundtrip_and_latest() {
    let db = open_db_in_memory().unwrap();
    let song = seed_song(&db, "Sketch");
    let repo = SqliteAutoSaveRepository::new(&db);

    let mut older = AutoSave::of(&song, "interval");
    older.timestamp -= Duration::minutes(2);
    let newer = AutoSave::of(&song, "before close");
    repo.create(&older).unwrap();
    repo.create(&newer).unwrap();

    assert_eq!(repo.read(&older.id).unwrap(), Some(older.clone()));
    assert_eq!(repo.latest_for_song(&song.id).unwrap(), Some(newer.clone()));
    assert_eq!(repo.count_for_song(&song.id).unwrap(), 2);

    let ids: Vec<String> = repo
        .list_for_song(&song.id)
        .unwrap()
        .into_iter()
        .map(|save| save.id)
        .collect();
    assert_eq!(ids, vec![newer.id.clone(), older.id.clone()]);
    assert_eq!(repo.recent(1).unwrap(), vec![newer]);
}

#[test]
fn auto_save_update_delete_and_prune() {
    let db = open_db_in_memory().unwrap();
    let song = seed_song(&db, "Prune");
    let repo = SqliteAutoSaveRepository::new(&db);
    let now = whiteroom_core::model::now_millis();

    let mut saves = Vec::new();
    for minutes in [30, 20, 10, 0] {
        let mut save = AutoSave::of(&song, format!("t-{minutes}"));
        save.timestamp = now - Duration::minutes(minutes);
        repo.create(&save).unwrap();
        saves.push(save);
    }

    let removed = repo
        .delete_before(&song.id, now - Duration::minutes(15))
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(repo.count_for_song(&song.id).unwrap(), 2);

    let mut kept = saves[2].clone();
    kept.description = "renamed".to_string();
    assert!(repo.update(&kept).unwrap());
    assert_eq!(repo.read(&kept.id).unwrap(), Some(kept.clone()));

    assert!(repo.delete(&kept.id).unwrap());
    assert!(!repo.delete(&kept.id).unwrap());
    assert!(repo.read(&saves[0].id).unwrap().is_none());
}

#[test]
fn backup_create_read_and_details() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteBackupRepository::new(&db);
    let song = Song::new("Archived", 110.0);
    let take = Performance::new(&song.id, "Archived take");
    let mut backup = Backup::new(
        "manual",
        vec![song],
        vec![take],
        Some(UserPreferences::default()),
        core_version(),
    );
    backup.size_bytes = 1234;

    repo.create(&backup).unwrap();
    assert_eq!(repo.read(&backup.id).unwrap(), Some(backup.clone()));

    assert!(repo
        .update_details(&backup.id, "renamed", Some("kept for the tour"))
        .unwrap());
    let stored = repo.read(&backup.id).unwrap().unwrap();
    assert_eq!(stored.name, "renamed");
    assert_eq!(stored.description.as_deref(), Some("kept for the tour"));
    assert_eq!(stored.songs, backup.songs);
    assert!(!repo.update_details("missing", "x", None).unwrap());
    assert!(repo.update_details(&backup.id, "  ", None).is_err());

    assert!(repo.delete(&backup.id).unwrap());
    assert_eq!(repo.read(&backup.id).unwrap(), None);
}

#[test]
fn backup_listing_by_recency_and_range() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteBackupRepository::new(&db);
    let now = whiteroom_core::model::now_millis();

    for days in [3, 2, 1] {
        let mut backup = Backup::new(format!("d{days}"), Vec::new(), Vec::new(), None, "1.0.0");
        backup.timestamp = now - Duration::days(days);
        repo.create(&backup).unwrap();
    }

    let recent: Vec<String> = repo
        .list_recent(2)
        .unwrap()
        .into_iter()
        .map(|backup| backup.name)
        .collect();
    assert_eq!(recent, vec!["d1", "d2"]);

    let ranged: Vec<String> = repo
        .between(now - Duration::days(3), now - Duration::days(2))
        .unwrap()
        .into_iter()
        .map(|backup| backup.name)
        .collect();
    assert_eq!(ranged, vec!["d3", "d2"]);
}

#[test]
fn capture_then_restore_replaces_live_data() {
    let db = open_db_in_memory().unwrap();
    let songs = SqliteSongRepository::new(&db);
    let takes = SqlitePerformanceRepository::new(&db);
    let prefs = SqlitePreferencesRepository::new(&db);
    let backups = SqliteBackupRepository::new(&db);

    let original = seed_song(&db, "Original");
    let take = Performance::new(&original.id, "Original take");
    takes.create(&take).unwrap();
    let dark = UserPreferences {
        theme: Theme::Dark,
        ..UserPreferences::default()
    };
    prefs.upsert(&dark).unwrap();

    let backup = backups
        .capture("before edits", Some("checkpoint"), core_version())
        .unwrap();
    assert_eq!(backup.songs, vec![original.clone()]);
    assert_eq!(backup.performances, vec![take.clone()]);
    assert_eq!(backup.preferences, Some(dark.clone()));
    assert!(backup.size_bytes > 0);
    assert_eq!(backups.read(&backup.id).unwrap(), Some(backup.clone()));

    songs.delete(&original.id).unwrap();
    let replacement = seed_song(&db, "Replacement");
    prefs.reset().unwrap();

    assert!(backups.restore(&backup.id).unwrap());

    assert_eq!(songs.list_all().unwrap(), vec![original.clone()]);
    assert_eq!(songs.read(&replacement.id).unwrap(), None);
    assert_eq!(takes.list_for_song(&original.id).unwrap(), vec![take]);
    assert_eq!(prefs.read().unwrap(), Some(dark));
    assert!(!backups.restore("missing").unwrap());
}

#[test]
fn failed_restore_leaves_live_data_untouched() {
    let db = open_db_in_memory().unwrap();
    let songs = SqliteSongRepository::new(&db);
    let backups = SqliteBackupRepository::new(&db);

    let live = seed_song(&db, "Live");
    // The orphan performance makes the restore fail on its foreign key.
    let orphan = Performance::new("absent-song", "Orphan");
    let broken = Backup::new("broken", Vec::new(), vec![orphan], None, "1.0.0");
    backups.create(&broken).unwrap();

    assert!(backups.restore(&broken.id).is_err());
    assert_eq!(songs.list_all().unwrap(), vec![live]);
}

#[test]
fn snapshots_with_non_finite_levels_are_rejected() {
    let db = open_db_in_memory().unwrap();
    let song = seed_song(&db, "Snapshot");
    let saves = SqliteAutoSaveRepository::new(&db);
    let backups = SqliteBackupRepository::new(&db);

    let mut broken = song.clone();
    broken.track_config.push(TrackConfig {
        id: "t1".to_string(),
        name: "Bass".to_string(),
        instrument: "bass".to_string(),
        volume: f64::NAN,
        pan: 0.0,
        muted: false,
        solo: false,
    });

    let err = saves.create(&AutoSave::of(&broken, "interval")).unwrap_err();
    assert!(matches!(
        err,
        whiteroom_core::RepoError::Validation(ValidationError::NonFiniteValue { .. })
    ));
    assert_eq!(saves.count_for_song(&song.id).unwrap(), 0);

    let backup = Backup::new("broken", vec![broken], Vec::new(), None, "1.0.0");
    let err = backups.create(&backup).unwrap_err();
    assert!(matches!(
        err,
        whiteroom_core::RepoError::Validation(ValidationError::NonFiniteValue { .. })
    ));
    assert!(backups.list_recent(10).unwrap().is_empty());
}

#[test]
fn zero_limits_return_nothing() {
    let db = open_db_in_memory().unwrap();
    let song = seed_song(&db, "Limits");
    let saves = SqliteAutoSaveRepository::new(&db);
    let backups = SqliteBackupRepository::new(&db);
    saves.create(&AutoSave::of(&song, "interval")).unwrap();
    backups.capture("nightly", None, core_version()).unwrap();

    assert!(saves.recent(0).unwrap().is_empty());
    assert!(backups.list_recent(0).unwrap().is_empty());
    assert_eq!(backups.list_recent(1).unwrap().len(), 1);
}

fn seed_song(db: &Database, name: &str) -> Song {
    let song = Song::new(name, 120.0);
    SqliteSongRepository::new(db).create(&song).unwrap();
    song
}
