//! Keyboard layout and pitch derivation.
//!
//! The virtual keyboard starts at MIDI note 48 ("C3") and spans 1 to 4
//! octaves. Key ordering is the persistence contract: all white keys
//! left-to-right, then all black keys left-to-right.

use crate::error::Error;

/// MIDI note number of the leftmost key.
pub const BASE_MIDI_NOTE: u8 = 48;
/// Octave label of the leftmost key ("C3").
pub const BASE_OCTAVE: u8 = 3;

const WHITE_NOTES: [&str; 7] = ["C", "D", "E", "F", "G", "A", "B"];
const WHITE_OFFSETS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

// No black key between E/F or B/C.
const BLACK_NOTES: [&str; 5] = ["C#", "D#", "F#", "G#", "A#"];
const BLACK_OFFSETS: [u8; 5] = [1, 3, 6, 8, 10];

/// A4 = 440 Hz equal temperament.
pub fn midi_to_frequency(midi_note: u8) -> f32 {
    440.0 * 2f32.powf((midi_note as f32 - 69.0) / 12.0)
}

/// A single playable pitch. Frequency and MIDI note are always derived from
/// the same semitone offset, never set independently.
#[derive(Debug, Clone, PartialEq)]
pub struct Pitch {
    pub note_name: String,
    pub midi_note: u8,
    pub frequency: f32,
}

impl Pitch {
    fn from_midi(note_name: String, midi_note: u8) -> Self {
        Pitch {
            note_name,
            midi_note,
            frequency: midi_to_frequency(midi_note),
        }
    }
}

/// One key position on the keyboard.
#[derive(Debug, Clone)]
pub struct Key {
    pub pitch: Pitch,
    pub is_black: bool,
}

/// A fixed keyboard layout for a given octave count.
///
/// Keys are derived once at construction and immutable afterwards.
#[derive(Debug, Clone)]
pub struct KeyboardLayout {
    octaves: u8,
    keys: Vec<Key>,
}

impl KeyboardLayout {
    /// Build the layout for `octaves` octaves (1..=4). An out-of-range
    /// octave count is a caller contract violation and is rejected here,
    /// not at lookup time.
    pub fn new(octaves: u8) -> Result<Self, Error> {
        if !(1..=4).contains(&octaves) {
            return Err(Error::InvalidOctaveCount(octaves));
        }

        let mut white = Vec::with_capacity(octaves as usize * 7);
        let mut black = Vec::with_capacity(octaves as usize * 5);
        for octave in 0..octaves {
            let octave_label = BASE_OCTAVE + octave;
            for (name, offset) in WHITE_NOTES.iter().zip(WHITE_OFFSETS) {
                let midi = BASE_MIDI_NOTE + offset + octave * 12;
                white.push(Key {
                    pitch: Pitch::from_midi(format!("{name}{octave_label}"), midi),
                    is_black: false,
                });
            }
            for (name, offset) in BLACK_NOTES.iter().zip(BLACK_OFFSETS) {
                let midi = BASE_MIDI_NOTE + offset + octave * 12;
                black.push(Key {
                    pitch: Pitch::from_midi(format!("{name}{octave_label}"), midi),
                    is_black: true,
                });
            }
        }
        white.extend(black);
        Ok(KeyboardLayout {
            octaves,
            keys: white,
        })
    }

    pub fn octaves(&self) -> u8 {
        self.octaves
    }

    /// All keys in persistence order: white keys first, then black keys,
    /// both left-to-right.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Pitch at a key position, in persistence order.
    pub fn pitch_at(&self, position: usize) -> Option<&Pitch> {
        self.keys.get(position).map(|k| &k.pitch)
    }

    /// Look up a pitch by full note name, e.g. "C3" or "F#4".
    pub fn pitch_named(&self, name: &str) -> Option<&Pitch> {
        self.keys
            .iter()
            .find(|k| k.pitch.note_name == name)
            .map(|k| &k.pitch)
    }
}
