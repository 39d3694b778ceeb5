mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{wait_for, Harness, SAMPLE_RATE};
use stemdeck_lib::{LoadPhase, ManualBackend, PlayerError, StateChange, TrackRequest};

#[test]
fn bass_and_vocals_end_to_end() {
    let harness = Harness::new();
    let player = &harness.player;
    let requests = harness.stems(&["Bass", "Vocals"], 10.0);

    player.load(&requests).expect("load");
    assert_eq!(player.get_duration(), 10.0);
    assert!(!player.is_loading());
    {
        let recorded = harness.recorded.lock().unwrap();
        assert_eq!(recorded.states.first().and_then(|s| s.is_loading), Some(true));
        let progress = recorded.load_progress.last().expect("load progress");
        assert_eq!(progress.percentage, 100);
        assert_eq!(progress.decoded_count, 2);
        assert_eq!(recorded.load_progress[0].phase, LoadPhase::Preparing);
    }
    assert_eq!(
        harness.last_state(),
        Some(StateChange {
            is_loading: Some(false),
            duration: Some(10.0),
            ..Default::default()
        })
    );

    player.play().expect("play");
    assert!(player.is_playing());
    harness.backend.advance(3.0);
    assert!((player.get_current_time() - 3.0).abs() < 1e-9);

    let solo = player.toggle_solo("Vocals").expect("solo");
    assert_eq!(solo.len(), 2);
    assert!(solo.iter().any(|s| s.name == "Vocals" && s.is_soloed));
    assert!(solo.iter().any(|s| s.name == "Bass" && !s.is_soloed));
    assert_eq!(player.effective_gain("Bass"), Some(0.0));
    assert_eq!(player.effective_gain("Vocals"), Some(1.0));

    player.stop();
    assert!(!player.is_playing());
    assert_eq!(player.get_current_time(), 0.0);
    assert!(harness.backend.source_positions().is_empty());
    assert_eq!(
        harness.last_state(),
        Some(StateChange {
            is_playing: Some(false),
            current_time: Some(0.0),
            ..Default::default()
        })
    );
}

#[test]
fn sources_stay_in_sync_across_pause_and_seek() {
    let harness = Harness::new();
    let player = &harness.player;
    player
        .load(&harness.stems(&["Drums", "Bass", "Keys"], 8.0))
        .expect("load");

    player.play().expect("play");
    harness.backend.advance(1.234);
    let positions = harness.backend.source_positions();
    assert_eq!(positions.len(), 3);
    assert!(positions.iter().all(|p| *p == positions[0]));

    player.pause();
    player.seek(5.0).expect("seek");
    player.play().expect("resume");
    assert_eq!(
        harness.backend.source_positions(),
        vec![5 * SAMPLE_RATE as usize; 3]
    );

    harness.backend.advance(0.5);
    assert_eq!(
        harness.backend.source_positions(),
        vec![(5.5 * SAMPLE_RATE as f64) as usize; 3]
    );
    assert!((player.get_current_time() - 5.5).abs() < 1e-9);
}

#[test]
fn seeking_while_playing_restarts_every_source() {
    let harness = Harness::new();
    let player = &harness.player;
    player.load(&harness.stems(&["A", "B"], 6.0)).expect("load");
    player.play().expect("play");
    harness.backend.advance(1.0);

    player.seek(4.0).expect("seek");
    assert!(player.is_playing());
    assert_eq!(
        harness.backend.source_positions(),
        vec![4 * SAMPLE_RATE as usize; 2]
    );
    assert!((player.get_current_time() - 4.0).abs() < 1e-9);
}

#[test]
fn pause_discards_sources_and_play_builds_new_ones() {
    let harness = Harness::new();
    let player = &harness.player;
    player.load(&harness.stems(&["A", "B"], 4.0)).expect("load");

    player.play().expect("play");
    harness.backend.advance(1.0);
    player.pause();
    assert!(harness.backend.source_positions().is_empty());
    assert!((player.get_current_time() - 1.0).abs() < 1e-9);

    // Paused: the clock is not allowed to move the transport.
    harness.backend.advance(1.0);
    assert!((player.get_current_time() - 1.0).abs() < 1e-9);

    player.play().expect("play again");
    assert_eq!(
        harness.backend.source_positions(),
        vec![SAMPLE_RATE as usize; 2]
    );
}

#[test]
fn seek_while_paused_only_moves_the_offset() {
    let harness = Harness::new();
    let player = &harness.player;
    player.load(&harness.stems(&["A"], 10.0)).expect("load");

    player.seek(5.0).expect("seek");
    assert!(!player.is_playing());
    assert_eq!(player.get_current_time(), 5.0);
    assert_eq!(
        harness.recorded.lock().unwrap().progress.last(),
        Some(&(5.0, 10.0))
    );

    player.seek(99.0).expect("seek past end");
    assert_eq!(player.get_current_time(), 10.0);
    player.seek(-3.0).expect("seek before start");
    assert_eq!(player.get_current_time(), 0.0);
    assert!(player.seek(f64::NAN).is_err());
}

#[test]
fn failed_load_commits_nothing_and_allows_reload() {
    let harness = Harness::new();
    let player = &harness.player;
    let mut requests = harness.stems(&["Bass", "Vocals"], 2.0);
    requests.push(TrackRequest::new("Missing", "nowhere.wav"));

    let err = player.load(&requests).expect_err("missing stem");
    assert!(matches!(err, PlayerError::Fetch { ref track, .. } if track == "Missing"));
    assert!(player.tracks().is_empty());
    assert_eq!(player.get_duration(), 0.0);
    assert!(!player.is_loading());
    let last = harness.last_state().expect("error state");
    assert_eq!(last.is_loading, Some(false));
    assert!(last.error.expect("error message").contains("Missing"));

    player.play().expect("play with nothing loaded is a no-op");
    assert!(!player.is_playing());

    player.load(&requests[..2]).expect("reload");
    assert_eq!(player.tracks().len(), 2);
    assert_eq!(player.get_duration(), 2.0);
}

#[test]
fn undecodable_middle_stem_commits_nothing() {
    let harness = Harness::new();
    let player = &harness.player;
    std::fs::write(harness.dir.path().join("junk.wav"), vec![0x55_u8; 4096]).expect("write junk");
    let good = harness.stems(&["Drums", "Bass"], 1.0);
    let requests = vec![
        good[0].clone(),
        TrackRequest::new("Junk", "junk.wav"),
        good[1].clone(),
    ];

    let err = player.load(&requests).expect_err("decode failure");
    assert_eq!(err.track_name(), Some("Junk"));
    assert!(matches!(err, PlayerError::Decode { .. }));
    assert!(player.tracks().is_empty());
    assert_eq!(player.get_duration(), 0.0);
    assert!(!player.is_loading());

    player.load(&good).expect("reload without the junk stem");
    let names: Vec<String> = player.tracks().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["Drums".to_string(), "Bass".to_string()]);
    assert_eq!(player.get_duration(), 1.0);
}

#[test]
fn invalid_requests_are_rejected() {
    let harness = Harness::new();
    assert!(matches!(
        harness.player.load(&[]),
        Err(PlayerError::InvalidRequest(_))
    ));
    let requests = vec![
        TrackRequest::new("Dup", "a.wav"),
        TrackRequest::new("Dup", "b.wav"),
    ];
    assert!(matches!(
        harness.player.load(&requests),
        Err(PlayerError::InvalidRequest(_))
    ));
    assert!(harness.last_state().and_then(|s| s.error).is_some());
}

#[test]
fn reaching_the_end_stops_and_rewinds() {
    let harness = Harness::new();
    let player = &harness.player;
    player.load(&harness.stems(&["A", "B"], 1.0)).expect("load");
    player.play().expect("play");

    harness.backend.advance(0.5);
    assert!(player.tick());
    harness.backend.advance(0.6);
    assert!(!player.tick());

    assert!(!player.is_playing());
    assert_eq!(player.get_current_time(), 0.0);
    assert!(harness.states().contains(&StateChange {
        is_playing: Some(false),
        current_time: Some(0.0),
        ..Default::default()
    }));
    let recorded = harness.recorded.lock().unwrap();
    assert_eq!(recorded.progress.last(), Some(&(1.0, 1.0)));
    assert!(recorded.meters >= 2);
}

#[test]
fn loading_again_tears_down_playback() {
    let harness = Harness::new();
    let player = &harness.player;
    player.load(&harness.stems(&["A", "B"], 3.0)).expect("load");
    player.play().expect("play");
    harness.backend.advance(1.0);

    player.load(&harness.stems(&["C"], 2.0)).expect("second load");
    assert!(!player.is_playing());
    assert_eq!(player.get_current_time(), 0.0);
    assert_eq!(player.get_duration(), 2.0);
    assert!(harness.backend.source_positions().is_empty());
    let names: Vec<String> = player.tracks().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["C".to_string()]);
}

#[test]
fn transport_calls_are_safe_before_any_load() {
    let harness = Harness::new();
    let player = &harness.player;
    player.pause();
    player.stop();
    player.play().expect("no-op play");
    player.seek(3.0).expect("seek on empty");
    assert_eq!(player.get_current_time(), 3.0);
    assert!(!player.tick());
    assert!(harness.states().is_empty());
}

#[test]
fn resume_failure_leaves_player_stopped() {
    let backend = ManualBackend::new(SAMPLE_RATE);
    let harness = Harness::with_backend(backend.clone());
    let player = &harness.player;
    player.load(&harness.stems(&["A"], 2.0)).expect("load");

    backend.set_fail_resume(true);
    assert!(matches!(
        player.play(),
        Err(PlayerError::BackendUnavailable(_))
    ));
    assert!(!player.is_playing());
    assert!(harness.last_state().and_then(|s| s.error).is_some());

    backend.set_fail_resume(false);
    player.play().expect("play after recovery");
    assert!(player.is_playing());
}

#[test]
fn callbacks_may_call_back_into_the_player() {
    let harness = Harness::new();
    let player = harness.player.clone();
    let observer = harness.player.clone();
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    player.on_state_change(move |_| sink.lock().unwrap().push(observer.is_playing()));

    player.load(&harness.stems(&["A"], 1.0)).expect("load");
    player.play().expect("play");
    player.pause();
    assert_eq!(seen.lock().unwrap().last(), Some(&false));
    assert!(seen.lock().unwrap().contains(&true));
}

#[test]
fn replaying_from_the_end_callback_keeps_the_progress_loop() {
    let harness = Harness::new();
    let player = &harness.player;
    player.load(&harness.stems(&["A", "B"], 1.0)).expect("load");
    player.set_tick_interval_ms(2);

    let replayer = player.clone();
    let endings = Arc::new(AtomicUsize::new(0));
    let counter = endings.clone();
    player.on_state_change(move |change| {
        let ended = change.is_playing == Some(false) && change.current_time == Some(0.0);
        if ended && counter.fetch_add(1, Ordering::SeqCst) == 0 {
            let _ = replayer.play();
        }
    });

    player.play().expect("play");
    harness.backend.advance(1.1);
    assert!(wait_for(Duration::from_secs(5), || {
        endings.load(Ordering::SeqCst) == 1 && player.is_playing()
    }));

    // The restarted song must still stop by itself at its end.
    harness.backend.advance(1.5);
    assert!(
        wait_for(Duration::from_secs(5), || endings.load(Ordering::SeqCst) == 2),
        "no end-of-song stop after replay"
    );
    assert!(!player.is_playing());
    assert_eq!(player.get_current_time(), 0.0);
}
