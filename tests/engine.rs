//! End-to-end playback tests against a capturing backend.
//!
//! The backend records every play call and sleeps for the requested
//! duration, matching the blocking contract of the real audio and MIDI
//! backends, so scheduling and cancellation behavior can be observed
//! from the outside.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use pianoman::{
    Chord, Dynamics, Error, KeyboardLayout, OutputBackend, PlaybackConfig, Player, Song, Status,
    Voice,
};

#[derive(Debug, Clone)]
struct PlayCall {
    at: Instant,
    notes: Vec<u8>,
    duration: Duration,
}

#[derive(Clone, Default)]
struct CaptureBackend {
    calls: Arc<Mutex<Vec<PlayCall>>>,
}

impl CaptureBackend {
    fn new() -> Self {
        Self::default()
    }

    fn calls(&self) -> Vec<PlayCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl OutputBackend for CaptureBackend {
    fn play(
        &mut self,
        voices: &[Voice],
        duration: Duration,
        _dynamics: Dynamics,
    ) -> Result<(), Error> {
        self.calls.lock().unwrap().push(PlayCall {
            at: Instant::now(),
            notes: voices.iter().map(|v| v.midi_note).collect(),
            duration,
        });
        thread::sleep(duration);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "capture"
    }
}

fn chord(layout: &KeyboardLayout, name: &str, notes: &[&str]) -> Chord {
    let pitches = notes
        .iter()
        .map(|n| layout.pitch_named(n).unwrap().clone())
        .collect();
    Chord::new(name, pitches)
}

fn capture_player() -> (Player, CaptureBackend, Arc<Mutex<Vec<Status>>>) {
    let backend = CaptureBackend::new();
    let mut player = Player::with_backend(Box::new(backend.clone()));
    let statuses: Arc<Mutex<Vec<Status>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&statuses);
    player.on_status(move |status| sink.lock().unwrap().push(status));
    (player, backend, statuses)
}

#[test]
fn simultaneous_chord_is_one_backend_call() {
    let layout = KeyboardLayout::new(2).unwrap();
    let (mut player, backend, _) = capture_player();

    player
        .start_chord(
            chord(&layout, "C Major", &["G3", "C3", "E3"]),
            PlaybackConfig::default(),
        )
        .unwrap();
    player.wait();

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].notes, vec![48, 52, 55]);
    assert_eq!(calls[0].duration, Duration::from_millis(500));
}

#[test]
fn arpeggio_at_speed_ten_spaces_notes_by_200ms() {
    let layout = KeyboardLayout::new(2).unwrap();
    let (mut player, backend, _) = capture_player();
    let config = PlaybackConfig {
        chord_speed: 10,
        ..PlaybackConfig::default()
    };

    let start = Instant::now();
    player
        .start_chord(chord(&layout, "C Major", &["C3", "E3", "G3"]), config)
        .unwrap();
    player.wait();
    let elapsed = start.elapsed();

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    for call in &calls {
        assert_eq!(call.notes.len(), 1);
        assert_eq!(call.duration, Duration::from_millis(200));
    }
    // notes start 2.0 / 10 = 0.2s apart
    for pair in calls.windows(2) {
        let spacing = pair[1].at.duration_since(pair[0].at);
        assert!(spacing >= Duration::from_millis(190), "spacing {spacing:?}");
        assert!(spacing < Duration::from_millis(400), "spacing {spacing:?}");
    }
    assert!(elapsed >= Duration::from_millis(550), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "elapsed {elapsed:?}");
}

#[test]
fn out_of_range_shift_makes_no_backend_calls() {
    let layout = KeyboardLayout::new(4).unwrap();
    let (mut player, backend, statuses) = capture_player();
    let config = PlaybackConfig {
        octave_shift: 4,
        ..PlaybackConfig::default()
    };

    // B6 shifted up four octaves leaves the MIDI range
    player
        .start_chord(chord(&layout, "too high", &["C3", "B6"]), config)
        .unwrap();
    player.wait();

    assert!(backend.calls().is_empty());
    let statuses = statuses.lock().unwrap();
    assert!(statuses
        .iter()
        .any(|s| matches!(s, Status::ChordFailed { chord, .. } if chord == "too high")));
    assert_eq!(statuses.last(), Some(&Status::Stopped));
}

#[test]
fn empty_chord_is_rejected_up_front() {
    let (mut player, backend, _) = capture_player();
    let result = player.start_chord(Chord::new("nothing", vec![]), PlaybackConfig::default());
    assert!(matches!(result, Err(Error::EmptyChord)));
    assert!(backend.calls().is_empty());
}

#[test]
fn song_emits_now_playing_per_chord_then_stopped() {
    let layout = KeyboardLayout::new(2).unwrap();
    let (mut player, backend, statuses) = capture_player();
    let song = Song {
        title: "two chords".to_string(),
        chords: vec![
            chord(&layout, "C Major", &["C3", "E3", "G3"]),
            Chord::new("rest", vec![]),
            chord(&layout, "D Minor", &["D3", "F3", "A3"]),
        ],
    };
    let config = PlaybackConfig {
        song_speed: 20,
        ..PlaybackConfig::default()
    };

    player.start_song(song, config).unwrap();
    player.wait();

    // the empty chord is skipped entirely
    assert_eq!(backend.calls().len(), 2);
    let statuses = statuses.lock().unwrap();
    let playing: Vec<&str> = statuses
        .iter()
        .filter_map(|s| match s {
            Status::NowPlaying(name) => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(playing, vec!["C Major", "D Minor"]);
    assert_eq!(statuses.last(), Some(&Status::Stopped));
}

#[test]
fn failed_chord_is_skipped_and_song_continues() {
    let layout = KeyboardLayout::new(4).unwrap();
    let (mut player, backend, statuses) = capture_player();
    // with +4 octaves, B6 (MIDI 95) leaves the range while C3 stays inside
    let song = Song {
        title: "mixed".to_string(),
        chords: vec![
            chord(&layout, "bad", &["B6"]),
            chord(&layout, "good", &["C3"]),
        ],
    };
    let config = PlaybackConfig {
        octave_shift: 4,
        song_speed: 20,
        ..PlaybackConfig::default()
    };

    player.start_song(song, config).unwrap();
    player.wait();

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].notes, vec![48 + 48]);
    let statuses = statuses.lock().unwrap();
    assert!(statuses
        .iter()
        .any(|s| matches!(s, Status::ChordFailed { chord, .. } if chord == "bad")));
    assert_eq!(statuses.last(), Some(&Status::Stopped));
}

#[test]
fn stop_cancels_a_song_promptly_and_allows_restart() {
    let layout = KeyboardLayout::new(2).unwrap();
    let (mut player, backend, _) = capture_player();
    let long_song = Song {
        title: "long".to_string(),
        chords: (0..50)
            .map(|i| chord(&layout, &format!("chord {i}"), &["C3", "E3", "G3"]))
            .collect(),
    };
    let config = PlaybackConfig {
        song_speed: 1,
        ..PlaybackConfig::default()
    };

    player.start_song(long_song, config).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(player.is_playing());

    let stop_started = Instant::now();
    player.stop();
    // one chord (0.5s) plus a margin; the 2s inter-chord gap is interrupted
    assert!(stop_started.elapsed() < Duration::from_secs(1));
    assert!(!player.is_playing());
    let after_first = backend.calls().len();

    // a fresh song plays normally after the cancellation
    let short_song = Song {
        title: "again".to_string(),
        chords: vec![
            chord(&layout, "C Major", &["C3", "E3", "G3"]),
            chord(&layout, "D Minor", &["D3", "F3", "A3"]),
        ],
    };
    let fast = PlaybackConfig {
        song_speed: 20,
        ..PlaybackConfig::default()
    };
    player.start_song(short_song, fast).unwrap();
    player.wait();
    assert_eq!(backend.calls().len(), after_first + 2);
}

#[test]
fn current_chord_tracks_the_sounding_chord() {
    let layout = KeyboardLayout::new(2).unwrap();
    let (mut player, _, _) = capture_player();

    player
        .start_chord(
            chord(&layout, "C Major", &["C3", "E3", "G3"]),
            PlaybackConfig::default(),
        )
        .unwrap();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(player.current_chord(), Some("C Major".to_string()));
    player.wait();
    assert_eq!(player.current_chord(), None);
}

#[test]
fn starting_a_new_chord_replaces_the_active_session() {
    let layout = KeyboardLayout::new(2).unwrap();
    let (mut player, backend, _) = capture_player();
    let config = PlaybackConfig {
        chord_speed: 1, // 2s between notes: plenty of time to interrupt
        ..PlaybackConfig::default()
    };

    player
        .start_chord(chord(&layout, "slow", &["C3", "E3", "G3"]), config)
        .unwrap();
    thread::sleep(Duration::from_millis(100));
    player
        .start_chord(
            chord(&layout, "next", &["D3", "F3", "A3"]),
            PlaybackConfig::default(),
        )
        .unwrap();
    player.wait();

    // the first arpeggio got through at most one note before being replaced
    let calls = backend.calls();
    let last = calls.last().unwrap();
    assert_eq!(last.notes, vec![50, 53, 57]);
    assert!(calls.len() <= 2);
}
