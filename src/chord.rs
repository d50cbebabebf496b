//! Chord naming and recognition.
//!
//! Recognition reduces the selected pitches to pitch classes (MIDI note
//! mod 12), tries every pitch class as candidate root in ascending order,
//! and matches the resulting interval pattern against an ordered catalog of
//! templates. The catalog order is the tie-break for a given root; the
//! lowest pitch class producing any match wins overall.

use crate::error::Error;
use crate::pitch::Pitch;

/// A named set of pitches. Selection order is irrelevant and membership is
/// unique. A chord with zero pitches is valid for storage but not playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    pub name: String,
    pub pitches: Vec<Pitch>,
}

impl Chord {
    pub fn new(name: impl Into<String>, pitches: Vec<Pitch>) -> Self {
        Chord {
            name: name.into(),
            pitches,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }
}

pub const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// The chord template catalog, in match priority order.
///
/// Interval values above 11 (compound ninths, elevenths, thirteenths) can
/// never equal a mod-12 interval exactly, but those templates still match
/// as supersets of partial voicings.
pub const CHORD_TEMPLATES: &[(&str, &[u8])] = &[
    ("Major", &[0, 4, 7]),
    ("Minor", &[0, 3, 7]),
    ("Diminished", &[0, 3, 6]),
    ("Augmented", &[0, 4, 8]),
    ("Major Seventh", &[0, 4, 7, 11]),
    ("Minor Seventh", &[0, 3, 7, 10]),
    ("Dominant Seventh", &[0, 4, 7, 10]),
    ("Suspended 2nd", &[0, 2, 7]),
    ("Suspended 4th", &[0, 5, 7]),
    ("Major Sixth", &[0, 4, 7, 9]),
    ("Minor Sixth", &[0, 3, 7, 9]),
    ("Ninth", &[0, 4, 7, 10, 14]),
    ("Minor Ninth", &[0, 3, 7, 10, 14]),
    ("Eleventh", &[0, 4, 7, 10, 14, 17]),
    ("Minor Eleventh", &[0, 3, 7, 10, 14, 17]),
    ("Thirteenth", &[0, 4, 7, 10, 14, 17, 21]),
    ("Minor Thirteenth", &[0, 3, 7, 10, 14, 17, 21]),
    ("Augmented Seventh", &[0, 4, 8, 10]),
    ("Diminished Seventh", &[0, 3, 6, 9]),
    ("Half-Diminished Seventh", &[0, 3, 6, 10]),
];

/// Classify a set of pitches into a chord label like "C Major".
///
/// Returns `Ok(None)` when no root/template combination matches; an
/// unrecognized chord is a normal outcome, not an error. An empty input is
/// a contract violation and is rejected.
pub fn recognize(pitches: &[Pitch]) -> Result<Option<String>, Error> {
    if pitches.is_empty() {
        return Err(Error::EmptyChord);
    }

    let mut pitch_classes: Vec<u8> = pitches.iter().map(|p| p.midi_note % 12).collect();
    pitch_classes.sort_unstable();
    pitch_classes.dedup();

    // Roots are tried in ascending pitch-class order; the first root with
    // any match wins, which makes the result root-order-dependent rather
    // than "most plausible root".
    for &root in &pitch_classes {
        let mut intervals: Vec<u8> = pitch_classes
            .iter()
            .map(|&pc| (pc + 12 - root) % 12)
            .collect();
        intervals.sort_unstable();

        if let Some(chord_type) = match_intervals(&intervals) {
            let label = format!("{} {}", NOTE_NAMES_SHARP[root as usize], chord_type);
            log::trace!("recognized {:?} as {}", intervals, label);
            return Ok(Some(label));
        }
    }
    Ok(None)
}

/// First template in catalog order that the intervals match exactly or as a
/// subset (partial voicing).
fn match_intervals(intervals: &[u8]) -> Option<&'static str> {
    for &(chord_type, template) in CHORD_TEMPLATES {
        if template == intervals {
            return Some(chord_type);
        }
        if intervals.iter().all(|i| template.contains(i)) {
            return Some(chord_type);
        }
    }
    None
}
