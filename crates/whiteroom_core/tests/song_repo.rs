use chrono::{Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use whiteroom_core::model::song::{Role, Section, TrackConfig};
use whiteroom_core::{
    open_db_in_memory, Difficulty, RepoError, Song, SongRepository, SqliteSongRepository,
    TimeSignature, ValidationError,
};

#[test]
fn create_and_read_roundtrip_every_field() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);
    let song = full_song();

    repo.create(&song).unwrap();

    assert_eq!(repo.read(&song.id).unwrap(), Some(song));
}

#[test]
fn read_missing_song_returns_none() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);

    assert_eq!(repo.read("missing").unwrap(), None);
}

#[test]
fn update_and_delete_report_whether_a_row_changed() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);
    let mut song = Song::new("Draft", 100.0);
    repo.create(&song).unwrap();

    song.name = "Final".to_string();
    song.tempo = 104.5;
    song.touch();
    assert!(repo.update(&song).unwrap());
    assert_eq!(repo.read(&song.id).unwrap(), Some(song.clone()));

    let ghost = Song::new("Ghost", 90.0);
    assert!(!repo.update(&ghost).unwrap());

    assert!(repo.delete(&song.id).unwrap());
    assert!(!repo.delete(&song.id).unwrap());
    assert_eq!(repo.count().unwrap(), 0);
}

#[test]
fn duplicate_id_is_a_constraint_violation() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);
    let song = Song::with_id("dup", "One", 120.0);
    repo.create(&song).unwrap();

    let err = repo.create(&song).unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
}

#[test]
fn invalid_song_is_rejected_before_sql() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);
    let mut song = Song::new("Odd meter", 120.0);
    song.time_signature = TimeSignature::new(7, 6);

    let err = repo.create(&song).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::InvalidTimeSignature { .. })
    ));
    assert_eq!(repo.count().unwrap(), 0);
}

#[test]
fn search_matches_name_composer_genre_and_mood_case_insensitively() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);

    let by_name = Song::new("Foolish Heart", 90.0);
    let mut by_composer = Song::new("Untitled", 90.0);
    by_composer.composer = Some("Ann FOO".to_string());
    let mut by_genre = Song::new("Groove", 90.0);
    by_genre.genre = Some("afoobeat".to_string());
    let mut by_mood = Song::new("Calm", 90.0);
    by_mood.mood = Some("Foo-ish".to_string());
    let mut unrelated = Song::new("Blue", 90.0);
    unrelated.custom_metadata.insert("note".to_string(), "foo".to_string());

    for song in [&by_name, &by_composer, &by_genre, &by_mood, &unrelated] {
        repo.create(song).unwrap();
    }

    let mut found: Vec<String> = repo
        .search("foo")
        .unwrap()
        .into_iter()
        .map(|song| song.id)
        .collect();
    found.sort();
    let mut expected = vec![by_name.id, by_composer.id, by_genre.id, by_mood.id];
    expected.sort();
    assert_eq!(found, expected);
}

#[test]
fn search_treats_wildcards_literally() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);
    repo.create(&Song::new("100% Pure", 120.0)).unwrap();
    repo.create(&Song::new("1000 Pure", 120.0)).unwrap();
    repo.create(&Song::new("snake_case", 120.0)).unwrap();
    repo.create(&Song::new("snakeXcase", 120.0)).unwrap();

    let percent = repo.search("0%").unwrap();
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0].name, "100% Pure");

    let underscore = repo.search("e_c").unwrap();
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].name, "snake_case");
}

#[test]
fn recent_orders_by_update_time_and_respects_limit() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);

    let mut old = Song::new("Old", 80.0);
    old.updated_at -= Duration::hours(2);
    let mut middle = Song::new("Middle", 80.0);
    middle.updated_at -= Duration::hours(1);
    let newest = Song::new("Newest", 80.0);
    for song in [&old, &middle, &newest] {
        repo.create(song).unwrap();
    }

    let names: Vec<String> = repo
        .recent(2)
        .unwrap()
        .into_iter()
        .map(|song| song.name)
        .collect();
    assert_eq!(names, vec!["Newest", "Middle"]);
}

#[test]
fn created_between_is_inclusive_and_oldest_first() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);

    let mut before = Song::new("Before", 120.0);
    before.created_at -= Duration::days(10);
    let mut inside = Song::new("Inside", 120.0);
    inside.created_at -= Duration::days(3);
    let edge = Song::new("Edge", 120.0);
    for song in [&before, &inside, &edge] {
        repo.create(song).unwrap();
    }

    let names: Vec<String> = repo
        .created_between(edge.created_at - Duration::days(5), edge.created_at)
        .unwrap()
        .into_iter()
        .map(|song| song.name)
        .collect();
    assert_eq!(names, vec!["Inside", "Edge"]);
}

#[test]
fn list_all_and_by_genre() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);

    let mut b = Song::new("beta", 120.0);
    b.genre = Some("Jazz".to_string());
    let mut a = Song::new("Alpha", 120.0);
    a.genre = Some("jazz".to_string());
    let mut c = Song::new("Gamma", 120.0);
    c.genre = Some("Rock".to_string());
    for song in [&b, &a, &c] {
        repo.create(song).unwrap();
    }

    let all: Vec<String> = repo
        .list_all()
        .unwrap()
        .into_iter()
        .map(|song| song.name)
        .collect();
    assert_eq!(all, vec!["Alpha", "beta", "Gamma"]);

    let jazz: Vec<String> = repo
        .by_genre("JAZZ")
        .unwrap()
        .into_iter()
        .map(|song| song.name)
        .collect();
    assert_eq!(jazz, vec!["Alpha", "beta"]);
    assert_eq!(repo.count().unwrap(), 3);
}

#[test]
fn search_and_genre_lookup_fold_non_ascii_case() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);

    let wild = Song::with_id("s1", "ÜBERMUT", 120.0);
    let mut slavonic = Song::with_id("s2", "Dance No. 8", 120.0);
    slavonic.composer = Some("Antonín DVOŘÁK".to_string());
    slavonic.genre = Some("Música Clásica".to_string());
    repo.create(&wild).unwrap();
    repo.create(&slavonic).unwrap();

    let hits = repo.search("über").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "s1");

    let hits = repo.search("dvořák").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "s2");

    let genre: Vec<String> = repo
        .by_genre("MÚSICA CLÁSICA")
        .unwrap()
        .into_iter()
        .map(|song| song.id)
        .collect();
    assert_eq!(genre, vec!["s2"]);
}

#[test]
fn recent_with_zero_limit_is_empty() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);
    repo.create(&Song::new("Only", 100.0)).unwrap();

    assert!(repo.recent(0).unwrap().is_empty());
    assert_eq!(repo.recent(1).unwrap().len(), 1);
}

#[test]
fn non_finite_track_levels_are_rejected_before_sql() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);
    let mut song = full_song();
    song.track_config[1].volume = f64::NEG_INFINITY;

    let err = repo.create(&song).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::NonFiniteValue { .. })
    ));
    assert_eq!(repo.count().unwrap(), 0);
}

#[test]
fn sub_millisecond_timestamps_read_back_truncated() {
    let db = open_db_in_memory().unwrap();
    let repo = SqliteSongRepository::new(&db);
    let mut song = Song::with_id("precise", "Precise", 120.0);
    song.created_at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
    song.updated_at = song.created_at;
    repo.create(&song).unwrap();

    let stored = repo.read("precise").unwrap().unwrap();
    let expected = Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap();
    assert_eq!(stored.created_at, expected);
    assert_eq!(stored.updated_at, expected);
}

fn full_song() -> Song {
    let mut song = Song::new("Nocturne in Glass", 72.25);
    song.time_signature = TimeSignature::new(6, 8);
    song.composer = Some("R. Vale".to_string());
    song.genre = Some("Ambient".to_string());
    song.mood = Some("melancholic".to_string());
    song.difficulty = Some(Difficulty::Advanced);
    song.rating = Some(4);
    song.track_config = vec![
        TrackConfig {
            id: "t1".to_string(),
            name: "Piano".to_string(),
            instrument: "grand_piano".to_string(),
            volume: 0.8,
            pan: -0.15,
            muted: false,
            solo: true,
        },
        TrackConfig {
            id: "t2".to_string(),
            name: "Pad".to_string(),
            instrument: "warm_pad".to_string(),
            volume: 0.55,
            pan: 0.3,
            muted: true,
            solo: false,
        },
    ];
    song.sections = vec![
        Section {
            name: "Intro".to_string(),
            start_bar: 0,
            length_bars: 8,
            repeat: 1,
        },
        Section {
            name: "Theme".to_string(),
            start_bar: 8,
            length_bars: 16,
            repeat: 2,
        },
    ];
    song.roles = vec![Role {
        name: "lead".to_string(),
        instrument: Some("grand_piano".to_string()),
        track_ids: vec!["t1".to_string()],
    }];
    song.custom_metadata = BTreeMap::from([
        ("key".to_string(), "C# minor".to_string()),
        ("tuning".to_string(), "432".to_string()),
    ]);
    song
}
