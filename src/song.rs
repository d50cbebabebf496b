//! Songs and their JSON persistence format.
//!
//! A saved song stores one boolean per physical key position for each chord
//! (`key_states`), zipped against the keyboard layout's key ordering (white
//! keys first, then black keys, both left-to-right). The octave count is
//! stored alongside so the states are reinterpreted against the same layout
//! they were captured from.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chord::Chord;
use crate::error::Error;
use crate::pitch::KeyboardLayout;

/// An ordered sequence of named chords; order is playback order. Duplicate
/// pitch sets under different names are permitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Song {
    pub title: String,
    pub chords: Vec<Chord>,
}

/// One persisted chord: a name plus one boolean per key position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedChord {
    pub chord_name: String,
    pub key_states: Vec<bool>,
}

/// On-disk song document. Field names match the original file format so
/// existing song files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongFile {
    pub song_name: String,
    pub number_of_octaves: u8,
    pub saved_keyboards: Vec<SavedChord>,
}

/// Encode a chord as key states against the given layout.
pub fn encode_key_states(chord: &Chord, layout: &KeyboardLayout) -> Vec<bool> {
    layout
        .keys()
        .iter()
        .map(|key| {
            chord
                .pitches
                .iter()
                .any(|p| p.midi_note == key.pitch.midi_note)
        })
        .collect()
}

/// Decode key states back into pitches. The caller guarantees the length
/// matches the layout; see [`SongFile::into_song`] for the lenient path.
pub fn decode_key_states(key_states: &[bool], layout: &KeyboardLayout) -> Vec<crate::pitch::Pitch> {
    layout
        .keys()
        .iter()
        .zip(key_states)
        .filter(|(_, &selected)| selected)
        .map(|(key, _)| key.pitch.clone())
        .collect()
}

impl SongFile {
    pub fn from_song(song: &Song, layout: &KeyboardLayout) -> SongFile {
        SongFile {
            song_name: song.title.clone(),
            number_of_octaves: layout.octaves(),
            saved_keyboards: song
                .chords
                .iter()
                .map(|chord| SavedChord {
                    chord_name: chord.name.clone(),
                    key_states: encode_key_states(chord, layout),
                })
                .collect(),
        }
    }

    /// Rebuild the song against a layout derived from the stored octave
    /// count. Chords whose `key_states` length does not match the layout
    /// are malformed: they are skipped with a warning and counted in the
    /// returned tally, and the remaining chords still load.
    pub fn into_song(self) -> Result<(Song, usize), Error> {
        let layout = KeyboardLayout::new(self.number_of_octaves)?;
        let mut chords = Vec::with_capacity(self.saved_keyboards.len());
        let mut skipped = 0;
        for saved in self.saved_keyboards {
            if saved.key_states.len() != layout.key_count() {
                log::warn!(
                    "skipping chord '{}': {} key states for a {}-key layout",
                    saved.chord_name,
                    saved.key_states.len(),
                    layout.key_count()
                );
                skipped += 1;
                continue;
            }
            chords.push(Chord::new(
                saved.chord_name,
                decode_key_states(&saved.key_states, &layout),
            ));
        }
        Ok((
            Song {
                title: self.song_name,
                chords,
            },
            skipped,
        ))
    }

    pub fn load(path: &Path) -> Result<SongFile, Error> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::Pitch;

    fn chord_named(layout: &KeyboardLayout, name: &str, notes: &[&str]) -> Chord {
        let pitches: Vec<Pitch> = notes
            .iter()
            .map(|n| layout.pitch_named(n).unwrap().clone())
            .collect();
        Chord::new(name, pitches)
    }

    #[test]
    fn key_states_round_trip_for_all_octave_counts() {
        for octaves in 1..=4u8 {
            let layout = KeyboardLayout::new(octaves).unwrap();
            let chord = chord_named(&layout, "C Major", &["C3", "E3", "G3"]);
            let states = encode_key_states(&chord, &layout);
            assert_eq!(states.len(), layout.key_count());
            let decoded = decode_key_states(&states, &layout);
            let mut expected: Vec<u8> = chord.pitches.iter().map(|p| p.midi_note).collect();
            let mut got: Vec<u8> = decoded.iter().map(|p| p.midi_note).collect();
            expected.sort_unstable();
            got.sort_unstable();
            assert_eq!(expected, got);
        }
    }

    #[test]
    fn song_file_round_trips_through_json() {
        let layout = KeyboardLayout::new(2).unwrap();
        let song = Song {
            title: "Test Song".to_string(),
            chords: vec![
                chord_named(&layout, "C Major", &["C3", "E3", "G3"]),
                chord_named(&layout, "F# something", &["F#3", "A#3"]),
                Chord::new("empty", vec![]),
            ],
        };
        let file = SongFile::from_song(&song, &layout);
        let json = serde_json::to_string(&file).unwrap();
        let parsed: SongFile = serde_json::from_str(&json).unwrap();
        let (loaded, skipped) = parsed.into_song().unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(loaded.title, "Test Song");
        assert_eq!(loaded.chords.len(), 3);
        assert_eq!(loaded.chords[0].pitches.len(), 3);
        assert!(loaded.chords[2].is_empty());
    }

    #[test]
    fn mismatched_key_states_are_skipped_not_fatal() {
        let file = SongFile {
            song_name: "Partial".to_string(),
            number_of_octaves: 1,
            saved_keyboards: vec![
                SavedChord {
                    chord_name: "broken".to_string(),
                    key_states: vec![true; 5],
                },
                SavedChord {
                    chord_name: "fine".to_string(),
                    key_states: {
                        let mut states = vec![false; 12];
                        states[0] = true;
                        states
                    },
                },
            ],
        };
        let (song, skipped) = file.into_song().unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(song.chords.len(), 1);
        assert_eq!(song.chords[0].name, "fine");
        assert_eq!(song.chords[0].pitches[0].note_name, "C3");
    }

    #[test]
    fn invalid_octave_count_in_file_is_an_error() {
        let file = SongFile {
            song_name: "bad".to_string(),
            number_of_octaves: 9,
            saved_keyboards: vec![],
        };
        assert!(matches!(
            file.into_song(),
            Err(Error::InvalidOctaveCount(9))
        ));
    }
}
