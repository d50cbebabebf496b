//! Chord building, recognition and playback engine for a virtual piano
//! keyboard.
//!
//! [`Player`] is the outward command surface: it owns the configured output
//! backend, at most one active playback session, and the status callback.
//! Playback runs on worker threads so the caller (typically a UI event
//! loop) never blocks.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};

pub mod chord;
pub mod cli;
pub mod config;
pub mod error;
pub mod gm;
pub mod output;
pub mod pitch;
pub mod sched;
pub mod song;
pub mod synth;

pub use chord::{recognize, Chord};
pub use config::{OutputKind, PlaybackConfig};
pub use error::Error;
pub use output::{Dynamics, MidiOut, OutputBackend, Voice};
pub use pitch::{KeyboardLayout, Pitch};
pub use sched::{CancelToken, Status};
pub use song::{SavedChord, Song, SongFile};
pub use synth::PcSynth;

// Global shutdown flag for graceful Ctrl+C handling
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

pub fn set_shutdown_flag() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

pub fn should_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Transient state for one active playback: the worker, its cancellation
/// token, and the currently-sounding chord name for UI highlight feedback.
struct PlaybackSession {
    cancel: CancelToken,
    handle: JoinHandle<()>,
    current: Arc<Mutex<Option<String>>>,
}

/// The playback engine facade.
///
/// At most one session is active at a time. Starting a new chord or song
/// while one is playing first cancels the live session and joins its worker
/// (join-before-restart), so the backend is never driven by two sessions.
pub struct Player {
    backend: sched::SharedBackend,
    session: Option<PlaybackSession>,
    status: sched::StatusCallback,
}

impl Player {
    /// Build a player on the requested backend. `midi_port` selects a MIDI
    /// port by name; `None` takes the first available port.
    pub fn new(output: OutputKind, midi_port: Option<&str>) -> Result<Self, Error> {
        let backend: Box<dyn OutputBackend> = match output {
            OutputKind::PcAudio => Box::new(PcSynth::new()?),
            OutputKind::Midi => Box::new(MidiOut::connect(midi_port)?),
        };
        Ok(Self::with_backend(backend))
    }

    /// Build a player around any backend. Also used by tests to inject a
    /// capturing backend.
    pub fn with_backend(backend: Box<dyn OutputBackend>) -> Self {
        Player {
            backend: Arc::new(Mutex::new(backend)),
            session: None,
            status: Arc::new(|_| {}),
        }
    }

    /// Register the status callback. Invoked from worker threads with
    /// "now playing" / "stopped" events.
    pub fn on_status(&mut self, callback: impl Fn(Status) + Send + Sync + 'static) {
        self.status = Arc::new(callback);
    }

    /// Classify a pitch set into a chord label. `Ok(None)` means no match,
    /// which is a normal outcome.
    pub fn recognize(&self, pitches: &[Pitch]) -> Result<Option<String>, Error> {
        chord::recognize(pitches)
    }

    /// Play one chord on a worker thread. An empty chord is rejected here;
    /// an out-of-range note after octave shift aborts the chord on the
    /// worker and is reported through the status callback.
    pub fn start_chord(&mut self, chord: Chord, config: PlaybackConfig) -> Result<(), Error> {
        if chord.is_empty() {
            return Err(Error::EmptyChord);
        }
        self.stop();

        let backend = Arc::clone(&self.backend);
        let status = Arc::clone(&self.status);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let current = Arc::new(Mutex::new(Some(chord.name.clone())));
        let worker_current = Arc::clone(&current);

        let handle = thread::spawn(move || {
            apply_program(&backend, &config);
            status(Status::NowPlaying(chord.name.clone()));
            if let Err(e) = sched::play_chord(&backend, &chord.pitches, &config, &worker_cancel) {
                log::warn!("chord '{}' failed: {e}", chord.name);
                status(Status::ChordFailed {
                    chord: chord.name,
                    reason: e.to_string(),
                });
            }
            *worker_current.lock().unwrap() = None;
            status(Status::Stopped);
        });

        self.session = Some(PlaybackSession {
            cancel,
            handle,
            current,
        });
        Ok(())
    }

    /// Play a whole song on a worker thread, chord by chord.
    pub fn start_song(&mut self, song: Song, config: PlaybackConfig) -> Result<(), Error> {
        self.stop();

        let backend = Arc::clone(&self.backend);
        let status = Arc::clone(&self.status);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let current = Arc::new(Mutex::new(None));
        let worker_current = Arc::clone(&current);

        let handle = thread::spawn(move || {
            apply_program(&backend, &config);
            sched::play_song(
                &backend,
                &song,
                &config,
                &worker_cancel,
                &status,
                &worker_current,
            );
        });

        self.session = Some(PlaybackSession {
            cancel,
            handle,
            current,
        });
        Ok(())
    }

    /// Request cancellation of the active session and wait for its worker
    /// to settle. In-flight audio or MIDI for the current note completes
    /// naturally.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            if session.handle.join().is_err() {
                log::warn!("playback worker panicked");
            }
        }
    }

    /// Alias for [`Player::stop`]; song and chord playback share the single
    /// session slot.
    pub fn stop_song(&mut self) {
        self.stop();
    }

    /// Whether a playback worker is still running.
    pub fn is_playing(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| !s.handle.is_finished())
            .unwrap_or(false)
    }

    /// Name of the chord currently sounding, for UI highlight feedback.
    pub fn current_chord(&self) -> Option<String> {
        self.session
            .as_ref()
            .and_then(|s| s.current.lock().unwrap().clone())
    }

    /// Block until the active session finishes. The worker itself honors
    /// the global shutdown flag at note boundaries, so a Ctrl+C still
    /// unblocks this join promptly. Used by the CLI front-end.
    pub fn wait(&mut self) {
        if let Some(session) = self.session.take() {
            if session.handle.join().is_err() {
                log::warn!("playback worker panicked");
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}

fn apply_program(backend: &sched::SharedBackend, config: &PlaybackConfig) {
    if let Err(e) = backend.lock().unwrap().set_program(config.midi_program) {
        log::warn!("program change failed: {e}");
    }
}
