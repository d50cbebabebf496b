//! General MIDI program catalog: 16 instrument families of 8 programs each.
//! Program number = family index * 8 + instrument index.

pub const INSTRUMENT_FAMILIES: [(&str, [&str; 8]); 16] = [
    (
        "Piano",
        [
            "Acoustic Grand Piano",
            "Bright Acoustic Piano",
            "Electric Grand Piano",
            "Honky-tonk Piano",
            "Electric Piano 1",
            "Electric Piano 2",
            "Harpsichord",
            "Clavinet",
        ],
    ),
    (
        "Chromatic Percussion",
        [
            "Celesta",
            "Glockenspiel",
            "Music Box",
            "Vibraphone",
            "Marimba",
            "Xylophone",
            "Tubular Bells",
            "Dulcimer",
        ],
    ),
    (
        "Organ",
        [
            "Drawbar Organ",
            "Percussive Organ",
            "Rock Organ",
            "Church Organ",
            "Reed Organ",
            "Accordion",
            "Harmonica",
            "Tango Accordion",
        ],
    ),
    (
        "Guitar",
        [
            "Acoustic Guitar (nylon)",
            "Acoustic Guitar (steel)",
            "Electric Guitar (jazz)",
            "Electric Guitar (clean)",
            "Electric Guitar (muted)",
            "Overdriven Guitar",
            "Distortion Guitar",
            "Guitar harmonics",
        ],
    ),
    (
        "Bass",
        [
            "Acoustic Bass",
            "Electric Bass (finger)",
            "Electric Bass (pick)",
            "Fretless Bass",
            "Slap Bass 1",
            "Slap Bass 2",
            "Synth Bass 1",
            "Synth Bass 2",
        ],
    ),
    (
        "Strings",
        [
            "Violin",
            "Viola",
            "Cello",
            "Contrabass",
            "Tremolo Strings",
            "Pizzicato Strings",
            "Orchestral Harp",
            "Timpani",
        ],
    ),
    (
        "Ensemble",
        [
            "String Ensemble 1",
            "String Ensemble 2",
            "SynthStrings 1",
            "SynthStrings 2",
            "Choir Aahs",
            "Voice Oohs",
            "Synth Choir",
            "Orchestra Hit",
        ],
    ),
    (
        "Brass",
        [
            "Trumpet",
            "Trombone",
            "Tuba",
            "Muted Trumpet",
            "French Horn",
            "Brass Section",
            "SynthBrass 1",
            "SynthBrass 2",
        ],
    ),
    (
        "Reed",
        [
            "Soprano Sax",
            "Alto Sax",
            "Tenor Sax",
            "Baritone Sax",
            "Oboe",
            "English Horn",
            "Bassoon",
            "Clarinet",
        ],
    ),
    (
        "Pipe",
        [
            "Piccolo",
            "Flute",
            "Recorder",
            "Pan Flute",
            "Blown Bottle",
            "Shakuhachi",
            "Whistle",
            "Ocarina",
        ],
    ),
    (
        "Synth Lead",
        [
            "Lead 1 (square)",
            "Lead 2 (sawtooth)",
            "Lead 3 (calliope)",
            "Lead 4 (chiff)",
            "Lead 5 (charang)",
            "Lead 6 (voice)",
            "Lead 7 (fifths)",
            "Lead 8 (bass + lead)",
        ],
    ),
    (
        "Synth Pad",
        [
            "Pad 1 (new age)",
            "Pad 2 (warm)",
            "Pad 3 (polysynth)",
            "Pad 4 (choir)",
            "Pad 5 (bowed)",
            "Pad 6 (metallic)",
            "Pad 7 (halo)",
            "Pad 8 (sweep)",
        ],
    ),
    (
        "Synth Effects",
        [
            "FX 1 (rain)",
            "FX 2 (soundtrack)",
            "FX 3 (crystal)",
            "FX 4 (atmosphere)",
            "FX 5 (brightness)",
            "FX 6 (goblins)",
            "FX 7 (echoes)",
            "FX 8 (sci-fi)",
        ],
    ),
    (
        "Ethnic",
        [
            "Sitar", "Banjo", "Shamisen", "Koto", "Kalimba", "Bag pipe", "Fiddle", "Shanai",
        ],
    ),
    (
        "Percussive",
        [
            "Tinkle Bell",
            "Agogo",
            "Steel Drums",
            "Woodblock",
            "Taiko Drum",
            "Melodic Tom",
            "Synth Drum",
            "Reverse Cymbal",
        ],
    ),
    (
        "Sound Effects",
        [
            "Guitar Fret Noise",
            "Breath Noise",
            "Seashore",
            "Bird Tweet",
            "Telephone Ring",
            "Helicopter",
            "Applause",
            "Gunshot",
        ],
    ),
];

/// Name of a GM program number (0..=127).
pub fn program_name(program: u8) -> &'static str {
    let family = (program as usize / 8).min(15);
    let instrument = program as usize % 8;
    INSTRUMENT_FAMILIES[family].1[instrument]
}

/// Family name of a GM program number (0..=127).
pub fn family_name(program: u8) -> &'static str {
    INSTRUMENT_FAMILIES[(program as usize / 8).min(15)].0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_zero_is_acoustic_grand() {
        assert_eq!(program_name(0), "Acoustic Grand Piano");
        assert_eq!(family_name(0), "Piano");
    }

    #[test]
    fn last_program_is_gunshot() {
        assert_eq!(program_name(127), "Gunshot");
        assert_eq!(family_name(127), "Sound Effects");
    }

    #[test]
    fn family_boundaries() {
        assert_eq!(program_name(7), "Clavinet");
        assert_eq!(program_name(8), "Celesta");
        assert_eq!(family_name(64), "Reed");
    }
}
