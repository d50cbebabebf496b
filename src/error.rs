use thiserror::Error;

/// Errors reported by the playback engine.
///
/// Nothing here is fatal to the process: the caller gets the error, shows it
/// to the user, and playback either continues with the next chord or stops
/// gracefully.
#[derive(Debug, Error)]
pub enum Error {
    #[error("octave count must be between 1 and 4, got {0}")]
    InvalidOctaveCount(u8),

    #[error("chord has no notes")]
    EmptyChord,

    /// An octave-shifted note landed outside the MIDI range 0..=127.
    /// Aborts the whole chord, never a single note.
    #[error("note {note_name} is out of MIDI range after octave adjustment ({shifted})")]
    NoteOutOfRange { note_name: String, shifted: i16 },

    #[error("no MIDI output ports available")]
    NoOutputDevice,

    #[error("no audio output device available")]
    NoAudioDevice,

    #[error("MIDI initialization failed: {0}")]
    MidiInit(String),

    #[error("failed to connect to MIDI port: {0}")]
    MidiConnect(String),

    #[error("MIDI send failed: {0}")]
    MidiSend(#[from] midir::SendError),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("unknown note name: {0}")]
    UnknownNote(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid song data: {0}")]
    Json(#[from] serde_json::Error),
}
