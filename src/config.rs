//! Command line options and their validation
//!
//! Option names and semantics follow the classic midi-master invocation,
//! including `@file` response files whose contents are whitespace-split and
//! spliced into the argument list before parsing.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};

use crate::notifier::{IdMap, MidiCommand, SongIdNotifier};
use crate::timecode::FrameRate;

/// Maximum nesting of response files
const MAX_RESPONSE_DEPTH: u32 = 8;

/// Command line interface of the midimaster binary
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Show more detailed messages
    #[arg(short, long)]
    pub verbose: bool,

    /// Show available MIDI output devices and their IDs, and exit
    #[arg(short, long)]
    pub list: bool,

    /// MIDI output device to use; must be an output device (see --list)
    #[arg(short, long, value_name = "ID")]
    pub device: Option<usize>,

    /// Player connection address. Overrides the environment variable
    /// XMMS_PATH; if neither is present, connect to the player's default path
    #[arg(short = 'x', long, env = "XMMS_PATH", default_value = "")]
    pub xmms_path: String,

    /// Timecode frame rate
    #[arg(short, long, value_enum, default_value = "pal")]
    pub fps: FpsOption,

    /// Map a player song ID onto a custom ID emitted when a song begins or
    /// ends
    #[arg(short, long, value_name = "ID:CUSTOM", value_parser = parse_map_entry)]
    pub map: Vec<(i64, i64)>,

    /// Add this offset to the player song ID if no direct mapping is
    /// available
    #[arg(short, long, default_value_t = 0)]
    pub offset: i64,

    /// MIDI message to send when a song begins
    #[arg(short = 's', long, value_enum, default_value = "none")]
    pub begin_status: StatusOption,

    /// MIDI message to send when a song ends (stop or song change)
    #[arg(short = 'S', long, value_enum, default_value = "none")]
    pub end_status: StatusOption,

    /// MIDI channel for song begin messages, between 1 and 16
    #[arg(short = 'c', long, default_value_t = 1,
          value_parser = clap::value_parser!(u8).range(1..=16))]
    pub begin_channel: u8,

    /// MIDI channel for song end messages, between 1 and 16
    #[arg(short = 'C', long, default_value_t = 1,
          value_parser = clap::value_parser!(u8).range(1..=16))]
    pub end_channel: u8,

    /// Use little endian for song ID encoding in song begin messages
    #[arg(short = 'e', long)]
    pub begin_littleendian: bool,

    /// Use little endian for song ID encoding in song end messages
    #[arg(short = 'E', long)]
    pub end_littleendian: bool,

    /// Load arguments from FILE; "@FILE" works as well
    #[arg(long, value_name = "FILE")]
    pub response_file: Option<PathBuf>,
}

/// Frame rates accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FpsOption {
    /// Standard film, 24 fps
    Film,

    /// PAL video, 25 fps
    Pal,

    /// NTSC drop-frame, 29.97 fps
    Ntscd,

    /// NTSC non-drop, 30 fps
    Ntsc,
}

/// Notifier commands accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusOption {
    /// Do not send these messages
    None,

    /// Send NOTE OFF messages
    Noteoff,

    /// Send NOTE ON messages
    Noteon,

    /// Send POLYPHONIC AFTERTOUCH messages
    Pa,

    /// Send CONTROL CHANGE messages
    Cc,
}

impl StatusOption {
    fn command(self) -> Option<MidiCommand> {
        match self {
            StatusOption::None => None,
            StatusOption::Noteoff => Some(MidiCommand::NoteOff),
            StatusOption::Noteon => Some(MidiCommand::NoteOn),
            StatusOption::Pa => Some(MidiCommand::PolyAftertouch),
            StatusOption::Cc => Some(MidiCommand::ControlChange),
        }
    }
}

fn parse_map_entry(text: &str) -> Result<(i64, i64), String> {
    let (key, value) = text
        .split_once(':')
        .ok_or_else(|| format!("expected <player id>:<custom id>, got {text:?}"))?;
    let key = key
        .trim()
        .parse()
        .map_err(|err| format!("player id {key:?}: {err}"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|err| format!("custom id {value:?}: {err}"))?;
    Ok((key, value))
}

/// Expand `@file` and `--response-file file` tokens into their contents
///
/// File contents are split at whitespace; expansion nests up to
/// [MAX_RESPONSE_DEPTH] levels.
pub fn expand_args<I>(args: I) -> anyhow::Result<Vec<String>>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    // the program name is never a response-file reference
    let mut expanded: Vec<String> = args.next().into_iter().collect();
    expand_into(&mut expanded, args.collect(), 0)?;
    Ok(expanded)
}

fn expand_into(out: &mut Vec<String>, args: Vec<String>, depth: u32) -> anyhow::Result<()> {
    if depth > MAX_RESPONSE_DEPTH {
        bail!("response files nested deeper than {MAX_RESPONSE_DEPTH} levels");
    }

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let file = if let Some(path) = arg.strip_prefix('@') {
            Some(path.to_string())
        } else if arg == "--response-file" {
            Some(args.next().context("missing file after --response-file")?)
        } else if let Some(path) = arg.strip_prefix("--response-file=") {
            Some(path.to_string())
        } else {
            None
        };

        match file {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("could not open response file {path:?}"))?;
                let tokens = contents.split_whitespace().map(str::to_string).collect();
                expand_into(out, tokens, depth + 1)?;
            }
            None => out.push(arg),
        }
    }
    Ok(())
}

/// Validated runtime configuration, immutable after construction
pub struct Config {
    /// Output device id, `None` for the default device
    pub device: Option<usize>,

    /// Player connection address, empty for the library default
    pub xmms_path: String,

    /// Timecode frame rate
    pub rate: FrameRate,

    /// Song begin notifier
    pub begin: SongIdNotifier,

    /// Song end notifier
    pub end: SongIdNotifier,
}

impl Config {
    /// Validate parsed options into a runtime configuration
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let rate = match cli.fps {
            FpsOption::Film => FrameRate::Film,
            FpsOption::Pal => FrameRate::Pal,
            FpsOption::Ntsc => FrameRate::Ntsc,
            FpsOption::Ntscd => bail!("29.97 fps drop-frame timecode is not supported"),
        };

        let map: Arc<IdMap> = Arc::new(cli.map.iter().copied().collect());
        // channels are 1-based on the command line, physical 0..15 inside
        let begin = SongIdNotifier::new(
            cli.begin_status.command(),
            cli.begin_channel - 1,
            cli.begin_littleendian,
            map.clone(),
            cli.offset,
        );
        let end = SongIdNotifier::new(
            cli.end_status.command(),
            cli.end_channel - 1,
            cli.end_littleendian,
            map,
            cli.offset,
        );

        Ok(Self {
            device: cli.device,
            xmms_path: cli.xmms_path.clone(),
            rate,
            begin,
            end,
        })
    }
}
