//! MIDI output with future-dated delivery
//!
//! The scheduler stamps every message with the wall-clock millisecond at
//! which it must appear on the wire. midir itself sends immediately, so
//! [TimedOutput] pairs the connection with a dispatcher thread that holds
//! each message back until its due time. The scheduler hands out
//! non-decreasing timestamps, which makes a FIFO channel sufficient to
//! preserve wire order.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use midir::MidiOutput;
use tracing::{debug, info, warn};

use crate::status::LTime;

/// Client name announced to the MIDI system
pub const CLIENT_NAME: &str = "midimaster";

/// Monotonic millisecond clock shared by the observer and the scheduler
///
/// All wall-clock timestamps in the crate come from one instance of this
/// clock, so they are directly comparable.
#[derive(Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    /// Start a clock; `now_ms` counts from this moment
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock was created
    pub fn now_ms(&self) -> LTime {
        self.origin.elapsed().as_millis() as LTime
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// One enumerated output device
pub struct PortInfo {
    /// Device id, usable as the `--device` argument
    pub id: usize,

    /// Human readable port name
    pub name: String,
}

/// Enumerate the available MIDI output devices
pub fn output_ports() -> anyhow::Result<Vec<PortInfo>> {
    let output = MidiOutput::new(CLIENT_NAME).context("creating MIDI client")?;
    Ok(output
        .ports()
        .iter()
        .enumerate()
        .map(|(id, port)| PortInfo {
            id,
            name: output
                .port_name(port)
                .unwrap_or_else(|_| String::from("<unknown>")),
        })
        .collect())
}

/// Timestamped MIDI write primitive used by the scheduler
///
/// Implementations must not block the caller and must absorb delivery
/// failures; a lost message is recovered by the next snapshot anyway.
pub trait MidiSink {
    /// Deliver a short message at wall-clock time `when`
    fn write_short(&mut self, when: LTime, bytes: &[u8]);

    /// Deliver a SysEx message at wall-clock time `when`
    fn write_sysex(&mut self, when: LTime, bytes: &[u8]);
}

struct Timed {
    when: LTime,
    bytes: Vec<u8>,
}

/// A midir output connection behind a future-dating dispatcher thread
///
/// Dropping the output closes the feed channel, joins the dispatcher and
/// closes the port.
pub struct TimedOutput {
    queue: Option<mpsc::Sender<Timed>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl TimedOutput {
    /// Open output device `device` (default: the first available one)
    ///
    /// This is the only fatal MIDI operation; everything after construction
    /// degrades to logged warnings.
    pub fn open(device: Option<usize>, clock: Clock) -> anyhow::Result<Self> {
        let output = MidiOutput::new(CLIENT_NAME).context("creating MIDI client")?;
        let ports = output.ports();
        let id = device.unwrap_or(0);
        let port = ports
            .get(id)
            .ok_or_else(|| anyhow!("no MIDI output device with id {id}, see --list"))?;
        let name = output
            .port_name(port)
            .unwrap_or_else(|_| String::from("<unknown>"));
        let mut connection = output
            .connect(port, "midimaster-timecode")
            .map_err(|err| anyhow!("opening MIDI output device [{id}] {name}: {err}"))?;
        info!("sending to MIDI output device [{id}] {name}");

        let (queue, messages) = mpsc::channel::<Timed>();
        let dispatcher = thread::Builder::new()
            .name("midi-dispatch".to_string())
            .spawn(move || {
                while let Ok(Timed { when, bytes }) = messages.recv() {
                    let lead = when - clock.now_ms();
                    if lead > 0 {
                        thread::sleep(Duration::from_millis(lead as u64));
                    }
                    if let Err(err) = connection.send(&bytes) {
                        warn!("dropping MIDI message: {err}");
                    }
                }
                connection.close();
                debug!("MIDI dispatcher finished");
            })
            .context("spawning MIDI dispatcher thread")?;

        Ok(Self {
            queue: Some(queue),
            dispatcher: Some(dispatcher),
        })
    }

    fn enqueue(&self, when: LTime, bytes: Vec<u8>) {
        let Some(queue) = &self.queue else { return };
        if queue.send(Timed { when, bytes }).is_err() {
            warn!("MIDI dispatcher is gone, dropping message");
        }
    }
}

impl MidiSink for TimedOutput {
    fn write_short(&mut self, when: LTime, bytes: &[u8]) {
        self.enqueue(when, bytes.to_vec());
    }

    fn write_sysex(&mut self, when: LTime, bytes: &[u8]) {
        self.enqueue(when, bytes.to_vec());
    }
}

impl Drop for TimedOutput {
    fn drop(&mut self) {
        self.queue.take();
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = Clock::new();
        let first = clock.now_ms();
        let second = clock.now_ms();
        assert!(first >= 0);
        assert!(second >= first);
    }

    #[test]
    fn clock_copies_share_the_origin() {
        let clock = Clock::new();
        let copy = clock;
        thread::sleep(Duration::from_millis(5));
        assert!(copy.now_ms() >= clock.now_ms().saturating_sub(1));
    }
}
