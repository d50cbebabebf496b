//! Output backends.
//!
//! A backend renders a set of notes for a fixed duration and blocks the
//! calling worker for roughly that long. Backends are a single shared
//! resource: concurrent playback workers serialize access through a mutex
//! owned by the [`crate::Player`].

use std::thread;
use std::time::Duration;

use midir::{MidiOutput, MidiOutputConnection};

use crate::error::Error;

const MIDI_CLIENT_NAME: &str = "pianoman";

/// One note resolved for output: the octave shift is already applied and
/// both representations are derived from the same semitone offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub midi_note: u8,
    pub frequency: f32,
}

/// Per-call loudness, snapshotted from the configuration by the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct Dynamics {
    /// PC audio volume, 0.0..=1.0.
    pub volume: f32,
    /// MIDI velocity, 0..=127.
    pub velocity: u8,
}

/// Renders a set of notes as sound. `play` blocks for approximately
/// `duration`; cancellation is never delivered mid-call, only at note
/// boundaries in the scheduler.
pub trait OutputBackend: Send {
    fn play(&mut self, voices: &[Voice], duration: Duration, dynamics: Dynamics)
        -> Result<(), Error>;

    /// Select the instrument timbre. Idempotent; a no-op for backends
    /// without program semantics.
    fn set_program(&mut self, _program: u8) -> Result<(), Error> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// MIDI output over a midir port connection, channel 0.
pub struct MidiOut {
    conn: MidiOutputConnection,
    port_name: String,
}

impl MidiOut {
    /// Names of the currently available MIDI output ports.
    pub fn port_names() -> Result<Vec<String>, Error> {
        let midi_out =
            MidiOutput::new(MIDI_CLIENT_NAME).map_err(|e| Error::MidiInit(e.to_string()))?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect())
    }

    /// Connect to the named port, or the first available port when `None`.
    /// Fails with [`Error::NoOutputDevice`] when no port is open.
    pub fn connect(preferred: Option<&str>) -> Result<Self, Error> {
        let midi_out =
            MidiOutput::new(MIDI_CLIENT_NAME).map_err(|e| Error::MidiInit(e.to_string()))?;
        let ports = midi_out.ports();
        if ports.is_empty() {
            return Err(Error::NoOutputDevice);
        }
        let port = match preferred {
            Some(name) => ports
                .iter()
                .find(|p| midi_out.port_name(p).ok().as_deref() == Some(name))
                .ok_or_else(|| Error::MidiConnect(format!("port '{name}' not found")))?,
            None => &ports[0],
        };
        let port_name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| "<unknown>".to_string());
        let conn = midi_out
            .connect(port, "pianoman-out")
            .map_err(|e| Error::MidiConnect(e.to_string()))?;
        log::debug!("connected to MIDI port '{port_name}'");
        Ok(MidiOut { conn, port_name })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Send note-on for every voice, hold for `duration`, then note-off.
///
/// Every note that received a note-on gets a note-off attempt, even when a
/// send fails partway: a device that vanishes mid-chord must not leave the
/// remaining notes sounding on hardware. The first error is returned after
/// the release pass; secondary release failures are logged and dropped.
fn play_notes<S>(
    send: &mut S,
    voices: &[Voice],
    duration: Duration,
    velocity: u8,
) -> Result<(), Error>
where
    S: FnMut(&[u8]) -> Result<(), Error>,
{
    let mut sounding = Vec::with_capacity(voices.len());
    for voice in voices {
        if let Err(e) = send(&[0x90, voice.midi_note, velocity]) {
            release_notes(send, &sounding);
            return Err(e);
        }
        sounding.push(voice.midi_note);
    }
    thread::sleep(duration);

    let mut result = Ok(());
    for &note in &sounding {
        if let Err(e) = send(&[0x80, note, 0]) {
            log::warn!("note off for {note} failed: {e}");
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    result
}

/// Best-effort note-off pass; failures are logged, never propagated.
fn release_notes<S>(send: &mut S, notes: &[u8])
where
    S: FnMut(&[u8]) -> Result<(), Error>,
{
    for &note in notes {
        if let Err(e) = send(&[0x80, note, 0]) {
            log::warn!("note off for {note} failed during error recovery: {e}");
        }
    }
}

impl OutputBackend for MidiOut {
    fn play(
        &mut self,
        voices: &[Voice],
        duration: Duration,
        dynamics: Dynamics,
    ) -> Result<(), Error> {
        let conn = &mut self.conn;
        play_notes(
            &mut |message: &[u8]| conn.send(message).map_err(Error::from),
            voices,
            duration,
            dynamics.velocity,
        )
    }

    fn set_program(&mut self, program: u8) -> Result<(), Error> {
        self.conn.send(&[0xC0, program & 0x7F])?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MIDI Output"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices(notes: &[u8]) -> Vec<Voice> {
        notes
            .iter()
            .map(|&n| Voice {
                midi_note: n,
                frequency: crate::pitch::midi_to_frequency(n),
            })
            .collect()
    }

    #[test]
    fn every_note_on_gets_a_note_off() {
        let mut sent: Vec<Vec<u8>> = Vec::new();
        let chord = voices(&[60, 64, 67]);
        play_notes(
            &mut |msg: &[u8]| {
                sent.push(msg.to_vec());
                Ok(())
            },
            &chord,
            Duration::ZERO,
            64,
        )
        .unwrap();
        assert_eq!(
            sent,
            vec![
                vec![0x90, 60, 64],
                vec![0x90, 64, 64],
                vec![0x90, 67, 64],
                vec![0x80, 60, 0],
                vec![0x80, 64, 0],
                vec![0x80, 67, 0],
            ]
        );
    }

    #[test]
    fn failed_note_on_releases_already_sounding_notes() {
        let mut sent: Vec<Vec<u8>> = Vec::new();
        let mut calls = 0;
        let chord = voices(&[60, 64]);
        let result = play_notes(
            &mut |msg: &[u8]| {
                calls += 1;
                // the second note-on fails, as if the device vanished
                if calls == 2 {
                    return Err(Error::MidiConnect("device vanished".to_string()));
                }
                sent.push(msg.to_vec());
                Ok(())
            },
            &chord,
            Duration::ZERO,
            64,
        );
        assert!(result.is_err());
        assert_eq!(sent, vec![vec![0x90, 60, 64], vec![0x80, 60, 0]]);
    }

    #[test]
    fn failed_note_off_still_releases_the_rest() {
        let mut sent: Vec<Vec<u8>> = Vec::new();
        let chord = voices(&[60, 64]);
        let result = play_notes(
            &mut |msg: &[u8]| {
                if msg[0] == 0x80 && msg[1] == 60 {
                    return Err(Error::MidiConnect("send failed".to_string()));
                }
                sent.push(msg.to_vec());
                Ok(())
            },
            &chord,
            Duration::ZERO,
            64,
        );
        assert!(result.is_err());
        // the second note-off was still attempted
        assert_eq!(
            sent,
            vec![vec![0x90, 60, 64], vec![0x90, 64, 64], vec![0x80, 64, 0]]
        );
    }
}
