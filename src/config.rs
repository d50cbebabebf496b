//! Playback configuration.
//!
//! Owned by the caller and passed into each playback call; the engine never
//! mutates it. Workers snapshot the values they need at the start of each
//! chord rather than re-reading shared state mid-operation.

use serde::{Deserialize, Serialize};

/// Which output backend renders the notes. Exactly one is active at a time;
/// switching is a caller-level configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    PcAudio,
    Midi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    pub output: OutputKind,
    /// PC audio volume, 0.0..=1.0.
    pub pc_volume: f32,
    /// MIDI note-on velocity, 0..=127.
    pub midi_velocity: u8,
    /// 0 = all notes at once, 1..=20 = arpeggiated speed.
    pub chord_speed: u8,
    /// Inter-chord speed during song playback, 1..=20.
    pub song_speed: u8,
    /// Whole octaves to shift every note by, -4..=4.
    pub octave_shift: i8,
    /// General MIDI program number, 0..=127.
    pub midi_program: u8,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            output: OutputKind::PcAudio,
            pc_volume: 0.5,
            midi_velocity: 64,
            chord_speed: 0,
            song_speed: 10,
            octave_shift: 0,
            midi_program: 0,
        }
    }
}

impl PlaybackConfig {
    /// Bring every field into its documented range. Callers clamp at the
    /// boundary; the scheduler trusts the values it is handed.
    pub fn clamped(mut self) -> Self {
        self.pc_volume = self.pc_volume.clamp(0.0, 1.0);
        self.midi_velocity = self.midi_velocity.min(127);
        self.chord_speed = self.chord_speed.min(20);
        self.song_speed = self.song_speed.clamp(1, 20);
        self.octave_shift = self.octave_shift.clamp(-4, 4);
        self.midi_program = self.midi_program.min(127);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PlaybackConfig::default();
        assert_eq!(config.output, OutputKind::PcAudio);
        assert_eq!(config.pc_volume, 0.5);
        assert_eq!(config.midi_velocity, 64);
        assert_eq!(config.chord_speed, 0);
        assert_eq!(config.song_speed, 10);
        assert_eq!(config.octave_shift, 0);
        assert_eq!(config.midi_program, 0);
    }

    #[test]
    fn clamping_brings_fields_into_range() {
        let config = PlaybackConfig {
            output: OutputKind::Midi,
            pc_volume: 3.0,
            midi_velocity: 200,
            chord_speed: 99,
            song_speed: 0,
            octave_shift: -9,
            midi_program: 255,
        }
        .clamped();
        assert_eq!(config.pc_volume, 1.0);
        assert_eq!(config.midi_velocity, 127);
        assert_eq!(config.chord_speed, 20);
        assert_eq!(config.song_speed, 1);
        assert_eq!(config.octave_shift, -4);
        assert_eq!(config.midi_program, 127);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = PlaybackConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PlaybackConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.midi_velocity, config.midi_velocity);
        assert_eq!(back.output, config.output);
    }
}
