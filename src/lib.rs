//! Bridge between a music player and MIDI-capable hardware
//!
//! Midimaster listens to a player's control surface (playback state, current
//! song, playing position) and turns that sparse event stream into a dense
//! [MIDI Timecode][mtc] stream on a single output port, so that external
//! devices (lighting desks, hardware sequencers, video rigs) can chase the
//! player. On song boundaries it can additionally emit short MIDI messages
//! carrying a configurable song id.
//!
//! The crate is split along the data flow:
//!
//! * [mpris] subscribes to the player and feeds [observer::PlayerObserver]
//! * the observer publishes whole [status::Status] snapshots into a
//!   single-slot [mailbox::Mailbox]
//! * [scheduler::TimecodeScheduler] consumes snapshots, extrapolates the
//!   player clock onto the local clock and enqueues timecode into [midi]
//!
//! Control flow is strictly one way; the scheduler never talks back to the
//! observer.
//!
//! [mtc]: https://en.wikipedia.org/wiki/MIDI_timecode

pub mod config;
pub mod mailbox;
pub mod midi;
pub mod mpris;
pub mod notifier;
pub mod observer;
pub mod scheduler;
pub mod status;
pub mod timecode;
