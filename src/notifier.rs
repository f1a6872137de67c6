//! Short MIDI messages emitted on song boundaries
//!
//! A notifier maps the player's song id onto a 14 bit emitted id and packs
//! it into one short MIDI message: direct mapping if one is configured,
//! otherwise the configured offset is added; the result is clipped to 14
//! bits and split over the two data bytes in the configured byte order.

use std::collections::HashMap;
use std::sync::Arc;

use midly::live::LiveEvent;
use midly::MidiMessage;

use crate::status::SongId;

/// Direct mapping from player song ids to emitted ids
pub type IdMap = HashMap<SongId, i64>;

/// MIDI commands a notifier can emit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiCommand {
    /// NOTE OFF, status `0x80`
    NoteOff,

    /// NOTE ON, status `0x90`
    NoteOn,

    /// POLYPHONIC AFTERTOUCH, status `0xA0`
    PolyAftertouch,

    /// CONTROL CHANGE, status `0xB0`
    ControlChange,
}

/// Builder of song-boundary messages, immutable after construction
pub struct SongIdNotifier {
    command: Option<MidiCommand>,
    channel: u8,
    little_endian: bool,
    map: Arc<IdMap>,
    offset: i64,
}

impl SongIdNotifier {
    /// Create a notifier
    ///
    /// `channel` is the physical channel 0..15. A `command` of `None`
    /// suppresses all messages from this notifier.
    pub fn new(
        command: Option<MidiCommand>,
        channel: u8,
        little_endian: bool,
        map: Arc<IdMap>,
        offset: i64,
    ) -> Self {
        Self {
            command,
            channel,
            little_endian,
            map,
            offset,
        }
    }

    /// A notifier that never emits anything
    pub fn disabled() -> Self {
        Self::new(None, 0, false, Arc::new(IdMap::new()), 0)
    }

    /// Build the message announcing `song_id`, or `None` when disabled
    pub fn message(&self, song_id: SongId) -> Option<[u8; 3]> {
        let command = self.command?;

        let id = match self.map.get(&song_id) {
            Some(&mapped) => mapped,
            None => song_id + self.offset,
        };
        // lowest 14 bits only, everything above is dropped
        let id = (id & 0x3FFF) as u16;

        let low = (id & 0x7F) as u8;
        let high = (id >> 7) as u8;
        let (data1, data2) = if self.little_endian {
            (low, high)
        } else {
            (high, low)
        };

        let message = match command {
            MidiCommand::NoteOff => MidiMessage::NoteOff {
                key: data1.into(),
                vel: data2.into(),
            },
            MidiCommand::NoteOn => MidiMessage::NoteOn {
                key: data1.into(),
                vel: data2.into(),
            },
            MidiCommand::PolyAftertouch => MidiMessage::Aftertouch {
                key: data1.into(),
                vel: data2.into(),
            },
            MidiCommand::ControlChange => MidiMessage::Controller {
                controller: data1.into(),
                value: data2.into(),
            },
        };
        let event = LiveEvent::Midi {
            channel: self.channel.into(),
            message,
        };

        let mut bytes = Vec::with_capacity(3);
        event
            .write(&mut bytes)
            .expect("writing to a vector cannot fail");
        let mut packed = [0u8; 3];
        packed.copy_from_slice(&bytes);
        Some(packed)
    }
}
