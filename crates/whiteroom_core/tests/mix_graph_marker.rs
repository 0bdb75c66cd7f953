use whiteroom_core::{
    open_db_in_memory, Database, Marker, MarkerPosition, MarkerRepository, MasterBus, MixBus,
    MixGraph, MixGraphRepository, MixSend, MixTrack, Performance, PerformanceRepository,
    RepoError, Song, SongRepository, SqliteMarkerRepository, SqliteMixGraphRepository,
    SqlitePerformanceRepository, SqliteSongRepository, ValidationError,
};

#[test]
fn mix_graph_roundtrip_and_lookup_by_song() {
    let db = open_db_in_memory().unwrap();
    let song = seed_song(&db);
    let repo = SqliteMixGraphRepository::new(&db);
    let graph = routed_graph(&song.id);

    repo.create(&graph).unwrap();

    assert_eq!(repo.read(&graph.id).unwrap(), Some(graph.clone()));
    assert_eq!(repo.read_for_song(&song.id).unwrap(), Some(graph));
    assert_eq!(repo.read_for_song("other").unwrap(), None);
}

#[test]
fn second_graph_for_same_song_is_rejected() {
    let db = open_db_in_memory().unwrap();
    let song = seed_song(&db);
    let repo = SqliteMixGraphRepository::new(&db);
    repo.create(&MixGraph::new(&song.id)).unwrap();

    let err = repo.create(&MixGraph::new(&song.id)).unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
}

#[test]
fn upsert_for_song_keeps_existing_graph_id() {
    let db = open_db_in_memory().unwrap();
    let song = seed_song(&db);
    let repo = SqliteMixGraphRepository::new(&db);

    let first = MixGraph::new(&song.id);
    let stored = repo.upsert_for_song(&first).unwrap();
    assert_eq!(stored, first);

    let replacement = routed_graph(&song.id);
    let stored = repo.upsert_for_song(&replacement).unwrap();
    assert_eq!(stored.id, first.id);
    assert_eq!(stored.tracks, replacement.tracks);
    assert_eq!(stored.master, replacement.master);
    assert_eq!(repo.read_for_song(&song.id).unwrap(), Some(stored));
}

#[test]
fn mix_graph_update_and_delete() {
    let db = open_db_in_memory().unwrap();
    let song = seed_song(&db);
    let repo = SqliteMixGraphRepository::new(&db);
    let mut graph = MixGraph::new(&song.id);
    repo.create(&graph).unwrap();

    graph.master.volume_db = -3.0;
    graph.touch();
    assert!(repo.update(&graph).unwrap());
    assert_eq!(repo.read(&graph.id).unwrap(), Some(graph.clone()));

    assert!(repo.delete(&graph.id).unwrap());
    assert!(!repo.update(&graph).unwrap());
}

#[test]
fn markers_roundtrip_and_list_in_musical_order() {
    let db = open_db_in_memory().unwrap();
    let take = seed_performance(&db);
    let repo = SqliteMarkerRepository::new(&db);

    let mut outro = Marker::new(&take.id, "Outro", MarkerPosition::new(32, 0.0));
    outro.color = "#3366ff".to_string();
    outro.note = Some("fade over 4 bars".to_string());
    let bridge = Marker::new(&take.id, "Bridge", MarkerPosition::new(16, 2.5));
    let pickup = Marker::new(&take.id, "Pickup", MarkerPosition::new(16, 0.5));
    for marker in [&outro, &bridge, &pickup] {
        repo.create(marker).unwrap();
    }

    assert_eq!(repo.read(&outro.id).unwrap(), Some(outro.clone()));
    let names: Vec<String> = repo
        .list_for_performance(&take.id)
        .unwrap()
        .into_iter()
        .map(|marker| marker.name)
        .collect();
    assert_eq!(names, vec!["Pickup", "Bridge", "Outro"]);
}

#[test]
fn list_in_range_is_inclusive_on_both_ends() {
    let db = open_db_in_memory().unwrap();
    let take = seed_performance(&db);
    let repo = SqliteMarkerRepository::new(&db);

    for (name, bars, beats) in [
        ("a", 3, 3.5),
        ("b", 4, 0.0),
        ("c", 4, 2.0),
        ("d", 8, 1.0),
        ("e", 8, 1.5),
    ] {
        repo.create(&Marker::new(&take.id, name, MarkerPosition::new(bars, beats)))
            .unwrap();
    }

    let names: Vec<String> = repo
        .list_in_range(
            &take.id,
            MarkerPosition::new(4, 0.0),
            MarkerPosition::new(8, 1.0),
        )
        .unwrap()
        .into_iter()
        .map(|marker| marker.name)
        .collect();
    assert_eq!(names, vec!["b", "c", "d"]);

    assert!(repo
        .list_in_range(
            &take.id,
            MarkerPosition::new(9, 0.0),
            MarkerPosition::new(1, 0.0)
        )
        .unwrap()
        .is_empty());
}

#[test]
fn marker_validation_and_missing_parent() {
    let db = open_db_in_memory().unwrap();
    let take = seed_performance(&db);
    let repo = SqliteMarkerRepository::new(&db);

    let mut bad_color = Marker::new(&take.id, "Verse", MarkerPosition::new(1, 0.0));
    bad_color.color = "blue".to_string();
    assert!(matches!(
        repo.create(&bad_color).unwrap_err(),
        RepoError::Validation(ValidationError::InvalidColor(_))
    ));

    let orphan = Marker::new("no-such-take", "Verse", MarkerPosition::new(1, 0.0));
    assert!(matches!(
        repo.create(&orphan).unwrap_err(),
        RepoError::ConstraintViolation(_)
    ));

    let mut marker = Marker::new(&take.id, "Verse", MarkerPosition::new(1, 0.0));
    repo.create(&marker).unwrap();
    marker.position = MarkerPosition::new(2, 1.0);
    assert!(repo.update(&marker).unwrap());
    assert_eq!(repo.read(&marker.id).unwrap(), Some(marker.clone()));
    assert!(repo.delete(&marker.id).unwrap());
    assert!(!repo.delete(&marker.id).unwrap());
}

#[test]
fn non_finite_mix_levels_are_rejected_before_sql() {
    let db = open_db_in_memory().unwrap();
    let song = seed_song(&db);
    let repo = SqliteMixGraphRepository::new(&db);

    let mut graph = routed_graph(&song.id);
    graph.tracks[0].volume_db = f64::NEG_INFINITY;
    assert!(matches!(
        repo.create(&graph).unwrap_err(),
        RepoError::Validation(ValidationError::NonFiniteValue { .. })
    ));
    assert!(matches!(
        repo.upsert_for_song(&graph).unwrap_err(),
        RepoError::Validation(ValidationError::NonFiniteValue { .. })
    ));
    assert_eq!(repo.read_for_song(&song.id).unwrap(), None);

    graph.tracks[0].volume_db = -96.0;
    graph.tracks[0].muted = true;
    repo.create(&graph).unwrap();
    assert_eq!(repo.read(&graph.id).unwrap(), Some(graph));
}

fn seed_song(db: &Database) -> Song {
    let song = Song::new("Mixdown", 128.0);
    SqliteSongRepository::new(db).create(&song).unwrap();
    song
}

fn seed_performance(db: &Database) -> Performance {
    let song = seed_song(db);
    let take = Performance::new(&song.id, "Take");
    SqlitePerformanceRepository::new(db).create(&take).unwrap();
    take
}

fn routed_graph(song_id: &str) -> MixGraph {
    let mut graph = MixGraph::new(song_id);
    graph.tracks = vec![
        MixTrack {
            track_id: "t1".to_string(),
            volume_db: -6.0,
            pan: -0.25,
            muted: false,
            solo: false,
            output_bus: Some("drums".to_string()),
            inserts: vec!["eq".to_string(), "compressor".to_string()],
        },
        MixTrack {
            track_id: "t2".to_string(),
            volume_db: -1.5,
            pan: 0.4,
            muted: true,
            solo: false,
            output_bus: None,
            inserts: Vec::new(),
        },
    ];
    graph.buses = vec![MixBus {
        id: "drums".to_string(),
        name: "Drum bus".to_string(),
        volume_db: -2.0,
        muted: false,
        inserts: vec!["glue".to_string()],
    }];
    graph.sends = vec![MixSend {
        from_track: "t2".to_string(),
        to_bus: "drums".to_string(),
        level_db: -12.0,
        pre_fader: true,
    }];
    graph.master = MasterBus {
        volume_db: -0.3,
        limiter_enabled: false,
        inserts: vec!["limiter".to_string()],
    };
    graph
}
