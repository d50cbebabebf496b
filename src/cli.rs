//! Command-line front-end over the playback engine.

use std::error::Error as StdError;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::chord::Chord;
use crate::config::{OutputKind, PlaybackConfig};
use crate::error::Error;
use crate::gm;
use crate::output::MidiOut;
use crate::pitch::{KeyboardLayout, Pitch};
use crate::song::SongFile;
use crate::{set_shutdown_flag, Player, Status};

#[derive(Parser)]
#[command(name = "pianoman")]
#[command(about = "Build, recognize and play piano chords over PC audio or MIDI")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available MIDI output ports
    ListPorts,

    /// List General MIDI instrument programs
    Instruments,

    /// Recognize the chord formed by the given notes (e.g. C E G, or C3 E3 G3)
    Recognize {
        /// Note names; a bare name like F# defaults to octave 3
        notes: Vec<String>,
    },

    /// Play a single chord from the given notes
    Chord {
        /// Note names; a bare name like F# defaults to octave 3
        notes: Vec<String>,

        #[command(flatten)]
        playback: PlaybackOpts,
    },

    /// Play a saved song file (JSON)
    Song {
        /// Path to the song file
        file: PathBuf,

        #[command(flatten)]
        playback: PlaybackOpts,
    },
}

#[derive(Args)]
pub struct PlaybackOpts {
    /// Send to a MIDI output port instead of PC audio
    #[arg(long)]
    pub midi: bool,

    /// MIDI port name (defaults to the first available port)
    #[arg(long)]
    pub port: Option<String>,

    /// 0 = all notes at once, 1-20 = arpeggiated speed
    #[arg(long, default_value = "0")]
    pub chord_speed: u8,

    /// Inter-chord speed during song playback, 1-20
    #[arg(long, default_value = "10")]
    pub song_speed: u8,

    /// PC audio volume, 0.0-1.0
    #[arg(long, default_value = "0.5")]
    pub volume: f32,

    /// MIDI velocity, 0-127
    #[arg(long, default_value = "64")]
    pub velocity: u8,

    /// Whole octaves to shift playback by, -4 to 4
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub octave_shift: i8,

    /// General MIDI program number, 0-127
    #[arg(long, default_value = "0")]
    pub program: u8,

    /// Keyboard octave count used to resolve note names, 1-4
    #[arg(long, default_value = "4")]
    pub octaves: u8,
}

impl PlaybackOpts {
    fn to_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            output: if self.midi {
                OutputKind::Midi
            } else {
                OutputKind::PcAudio
            },
            pc_volume: self.volume,
            midi_velocity: self.velocity,
            chord_speed: self.chord_speed,
            song_speed: self.song_speed,
            octave_shift: self.octave_shift,
            midi_program: self.program,
        }
        .clamped()
    }
}

/// Resolve note names against the layout; a name without an octave digit
/// defaults to octave 3 (the leftmost octave).
fn parse_notes(layout: &KeyboardLayout, names: &[String]) -> Result<Vec<Pitch>, Error> {
    names
        .iter()
        .map(|name| {
            let full = if name.ends_with(|c: char| c.is_ascii_digit()) {
                name.clone()
            } else {
                format!("{name}3")
            };
            layout
                .pitch_named(&full)
                .cloned()
                .ok_or_else(|| Error::UnknownNote(name.clone()))
        })
        .collect()
}

fn make_player(opts: &PlaybackOpts) -> Result<Player, Error> {
    let config = opts.to_config();
    let mut player = Player::new(config.output, opts.port.as_deref())?;
    player.on_status(|status| match status {
        Status::NowPlaying(name) if !name.is_empty() => println!("🎵 Playing: {name}"),
        Status::NowPlaying(_) => println!("🎵 Playing"),
        Status::ChordFailed { chord, reason } => {
            println!("⚠️  Chord '{chord}' skipped: {reason}")
        }
        Status::Stopped => println!("⏹  Playback stopped"),
    });
    Ok(player)
}

pub fn run_cli() -> Result<(), Box<dyn StdError>> {
    let cli = Cli::parse();

    // Ctrl+C requests cooperative stop; workers notice at note boundaries
    ctrlc::set_handler(|| {
        set_shutdown_flag();
    })?;

    match cli.command {
        Commands::ListPorts => {
            let ports = MidiOut::port_names()?;
            if ports.is_empty() {
                println!("❌ No MIDI output ports found");
            } else {
                println!("🎹 Available MIDI ports:");
                for (i, port) in ports.iter().enumerate() {
                    println!("  {i}: {port}");
                }
            }
        }
        Commands::Instruments => {
            for program in 0u8..=127 {
                if program % 8 == 0 {
                    println!("{}:", gm::family_name(program));
                }
                println!("  {program:3}: {}", gm::program_name(program));
            }
        }
        Commands::Recognize { notes } => {
            let layout = KeyboardLayout::new(4)?;
            let pitches = parse_notes(&layout, &notes)?;
            match crate::recognize(&pitches)? {
                Some(name) => println!("🎼 {name}"),
                None => println!("Chord not recognized"),
            }
        }
        Commands::Chord { notes, playback } => {
            let layout = KeyboardLayout::new(playback.octaves)?;
            let pitches = parse_notes(&layout, &notes)?;
            let config = playback.to_config();
            let label = crate::recognize(&pitches)?.unwrap_or_default();
            let mut player = make_player(&playback)?;
            player.start_chord(Chord::new(label, pitches), config)?;
            player.wait();
        }
        Commands::Song { file, playback } => {
            let config = playback.to_config();
            let (song, skipped) = SongFile::load(&file)?.into_song()?;
            if skipped > 0 {
                println!("⚠️  Skipped {skipped} malformed chord(s) in '{}'", song.title);
            }
            println!(
                "🎶 Playing song '{}' ({} chords)",
                song.title,
                song.chords.len()
            );
            let mut player = make_player(&playback)?;
            player.start_song(song, config)?;
            player.wait();
        }
    }

    Ok(())
}
