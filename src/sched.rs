//! Playback scheduling.
//!
//! [`play_chord`] owns the timing of a single chord, simultaneous or
//! arpeggiated. [`play_song`] iterates a saved song chord by chord on top of
//! it. Both run on a worker thread and honor cooperative cancellation at
//! note/chord boundaries: a cancelled token stops further notes promptly
//! while in-flight audio or MIDI for the current note completes naturally.

use std::cmp::Ordering;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::config::PlaybackConfig;
use crate::error::Error;
use crate::output::{Dynamics, OutputBackend, Voice};
use crate::pitch::Pitch;
use crate::song::Song;

/// Fixed duration of a simultaneous chord, and the cap on an arpeggiated
/// note's length.
pub const CHORD_DURATION: Duration = Duration::from_millis(500);

/// The active backend is a single shared resource; workers lock it per play
/// call so concurrent requests never interleave buffers or messages.
pub type SharedBackend = Arc<Mutex<Box<dyn OutputBackend>>>;

/// Status events delivered to the outward-facing callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// A chord is about to sound ("now playing <name>").
    NowPlaying(String),
    /// One chord failed and was skipped; playback continues.
    ChordFailed { chord: String, reason: String },
    /// Playback stopped, by cancellation or by reaching the end.
    Stopped,
}

pub type StatusCallback = Arc<dyn Fn(Status) + Send + Sync>;

/// Cooperative cancellation signal shared between the owner of a playback
/// session and its worker.
///
/// Waiting is a single blocking wait-with-timeout on a condvar, so workers
/// never spin-poll and still react to cancellation within the wait.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap()
    }

    /// Block for `timeout` or until a stop is requested, whichever comes
    /// first. Returns true when the token was cancelled or a process
    /// shutdown was requested.
    ///
    /// Cancellation wakes the condvar directly; the global shutdown flag
    /// has no condvar of its own, so the wait is sliced to notice it
    /// within 100 ms.
    pub fn wait(&self, timeout: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(100);
        let deadline = Instant::now() + timeout;
        let (flag, cvar) = &*self.inner;
        let mut guard = flag.lock().unwrap();
        loop {
            if *guard || crate::should_shutdown() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _timed_out) = cvar
                .wait_timeout_while(guard, SLICE.min(deadline - now), |cancelled| !*cancelled)
                .unwrap();
            guard = next;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

fn stop_requested(cancel: &CancelToken) -> bool {
    cancel.is_cancelled() || crate::should_shutdown()
}

/// Sort pitches ascending by frequency and apply the octave shift to every
/// note. Any shifted note outside the MIDI range aborts the entire chord
/// before a single backend call is made.
fn voices_for(pitches: &[Pitch], octave_shift: i8) -> Result<Vec<Voice>, Error> {
    let mut sorted: Vec<&Pitch> = pitches.iter().collect();
    sorted.sort_by(|a, b| {
        a.frequency
            .partial_cmp(&b.frequency)
            .unwrap_or(Ordering::Equal)
    });

    let mut voices = Vec::with_capacity(sorted.len());
    for pitch in sorted {
        let shifted = pitch.midi_note as i16 + 12 * octave_shift as i16;
        if !(0..=127).contains(&shifted) {
            return Err(Error::NoteOutOfRange {
                note_name: pitch.note_name.clone(),
                shifted,
            });
        }
        voices.push(Voice {
            midi_note: shifted as u8,
            frequency: pitch.frequency * 2f32.powi(octave_shift as i32),
        });
    }
    Ok(voices)
}

/// Play one chord through the backend.
///
/// `chord_speed == 0` plays every note in a single backend call lasting
/// [`CHORD_DURATION`]. `chord_speed 1..=20` arpeggiates: notes start
/// `2.0 / chord_speed` seconds apart, each held until the next starts
/// (capped at [`CHORD_DURATION`]), with cancellation checked at every note
/// boundary. Config values are snapshotted for the whole chord.
pub fn play_chord(
    backend: &SharedBackend,
    pitches: &[Pitch],
    config: &PlaybackConfig,
    cancel: &CancelToken,
) -> Result<(), Error> {
    if pitches.is_empty() {
        return Err(Error::EmptyChord);
    }
    let voices = voices_for(pitches, config.octave_shift)?;
    let dynamics = Dynamics {
        volume: config.pc_volume,
        velocity: config.midi_velocity,
    };

    if config.chord_speed == 0 {
        if stop_requested(cancel) {
            return Ok(());
        }
        backend
            .lock()
            .unwrap()
            .play(&voices, CHORD_DURATION, dynamics)?;
        return Ok(());
    }

    let gap = Duration::from_secs_f64(2.0 / config.chord_speed as f64);
    let note_duration = gap.min(CHORD_DURATION);
    for voice in &voices {
        if stop_requested(cancel) {
            log::debug!("arpeggio cancelled at note boundary");
            break;
        }
        backend
            .lock()
            .unwrap()
            .play(std::slice::from_ref(voice), note_duration, dynamics)?;
        let rest = gap.saturating_sub(note_duration);
        if !rest.is_zero() && cancel.wait(rest) {
            break;
        }
    }
    Ok(())
}

/// Play every chord of a song in order.
///
/// Empty chords are skipped as no-ops. A chord that fails (out-of-range note
/// after octave shift, or a backend send failure) is reported through the
/// status callback and playback continues with the next chord. The inter-
/// chord gap is `2.0 / song_speed` seconds, waited on the cancellation
/// token. Emits [`Status::Stopped`] on cancellation and on natural
/// completion.
pub fn play_song(
    backend: &SharedBackend,
    song: &Song,
    config: &PlaybackConfig,
    cancel: &CancelToken,
    status: &StatusCallback,
    current: &Arc<Mutex<Option<String>>>,
) {
    let gap = Duration::from_secs_f64(2.0 / config.song_speed.max(1) as f64);
    for chord in &song.chords {
        if stop_requested(cancel) {
            break;
        }
        if chord.is_empty() {
            continue;
        }

        *current.lock().unwrap() = Some(chord.name.clone());
        status(Status::NowPlaying(chord.name.clone()));
        log::trace!("song chord '{}' starting", chord.name);

        if let Err(e) = play_chord(backend, &chord.pitches, config, cancel) {
            log::warn!("chord '{}' failed: {e}", chord.name);
            status(Status::ChordFailed {
                chord: chord.name.clone(),
                reason: e.to_string(),
            });
        }

        if cancel.wait(gap) {
            break;
        }
    }
    *current.lock().unwrap() = None;
    status(Status::Stopped);
}
