//! Command line entry point of midimaster
//!
//! Wires the components together: parses and validates options, opens the
//! MIDI output, connects to the player, then runs the scheduler on its own
//! thread while the player event loop occupies the main thread. Exit codes:
//! 0 normal, 1 bad configuration, 2 runtime failure.

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midimaster::config::{self, Cli, Config};
use midimaster::mailbox::Mailbox;
use midimaster::midi::{self, Clock, TimedOutput};
use midimaster::mpris::MprisClient;
use midimaster::observer::PlayerObserver;
use midimaster::scheduler::TimecodeScheduler;
use midimaster::status::Status;

fn main() -> ExitCode {
    let args = match config::expand_args(std::env::args()) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::from(1);
        }
    };

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let requested = matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            let _ = err.print();
            return ExitCode::from(if requested { 0 } else { 1 });
        }
    };

    setup_logging(&cli);

    if cli.list {
        return match list_devices() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!("{err:#}");
                ExitCode::from(2)
            }
        };
    }

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:#}");
            eprintln!("See \"midimaster --help\" for details.");
            return ExitCode::from(1);
        }
    };

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

/// Route events to stderr, filtered by RUST_LOG or the verbosity flag
fn setup_logging(cli: &Cli) {
    let default_directive = if cli.verbose {
        "midimaster=debug"
    } else {
        "midimaster=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn list_devices() -> anyhow::Result<()> {
    let ports = midi::output_ports()?;
    if ports.is_empty() {
        println!("no MIDI output devices available");
    }
    for port in ports {
        println!("[{}] {}", port.id, port.name);
    }
    Ok(())
}

fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting up version {}", env!("CARGO_PKG_VERSION"));

    let clock = Clock::new();
    let output = TimedOutput::open(config.device, clock)?;
    let client = MprisClient::connect(&config.xmms_path)?;

    let mailbox = Arc::new(Mailbox::new(Status::default()));
    let scheduler = TimecodeScheduler::new(output, clock, config.rate, config.begin, config.end);

    let scheduler_mailbox = mailbox.clone();
    thread::Builder::new()
        .name("timecode-scheduler".to_string())
        .spawn(move || scheduler.run(&scheduler_mailbox))
        .context("spawning scheduler thread")?;

    let mut observer = PlayerObserver::new(mailbox, clock);
    client.run(&mut observer);

    tracing::info!("player is gone, stopping");
    Ok(())
}
