//! MIDI timecode arithmetic and wire encoding
//!
//! Positions are counted in whole timecode frames from track start. A frame
//! index converts to hours/minutes/seconds/frames, which is streamed either
//! as eight quarter-frame messages (two frames of timecode per group) or as
//! one absolute full-frame SysEx message.

use midly::live::{LiveEvent, MtcQuarterFrameMessage, SystemCommon};

use crate::status::XTime;

/// MIDI timecode frame rates with whole frames per second
///
/// The 29.97 fps drop-frame rate is rejected during configuration and never
/// reaches this type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameRate {
    /// Standard film, 24 fps
    Film,

    /// PAL video, 25 fps
    Pal,

    /// NTSC non-drop, 30 fps
    Ntsc,
}

impl FrameRate {
    /// Frames per second
    pub fn fps(self) -> i64 {
        match self {
            FrameRate::Film => 24,
            FrameRate::Pal => 25,
            FrameRate::Ntsc => 30,
        }
    }

    /// Rate code in wire position: `0rr0_0000`
    ///
    /// 00 = 24 fps, 01 = 25 fps, 10 = 29.97 fps, 11 = 30 fps.
    pub fn bits(self) -> u8 {
        match self {
            FrameRate::Film => 0x00,
            FrameRate::Pal => 0x20,
            FrameRate::Ntsc => 0x60,
        }
    }

    /// Duration of one quarter frame in player-clock milliseconds
    pub fn quarter_xtime(self) -> XTime {
        (1000 / self.fps()) / 4
    }

    /// Frame index running at a player-clock position (integer floor)
    pub fn frame_at(self, xtime: XTime) -> i64 {
        xtime * self.fps() / 1000
    }

    /// Player-clock position of a frame index, rounded to nearest ms
    pub fn frame_xtime(self, frame: i64) -> XTime {
        (frame * 1000 + self.fps() / 2) / self.fps()
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} fps", self.fps())
    }
}

/// A frame index split into timecode digits
///
/// `hour` is the plain hour 0..23; the frame-rate code is merged in only at
/// encoding time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timecode {
    /// Hour, 0..23
    pub hour: u8,

    /// Minute, 0..59
    pub minute: u8,

    /// Second, 0..59
    pub second: u8,

    /// Frame within the second, 0..fps-1
    pub frame: u8,
}

impl Timecode {
    /// Split an absolute frame index into timecode digits
    pub fn at(frame_index: i64, rate: FrameRate) -> Self {
        let fps = rate.fps();
        let frame = frame_index % fps;
        let seconds = frame_index / fps;
        Self {
            hour: ((seconds / 3600) % 24) as u8,
            minute: ((seconds / 60) % 60) as u8,
            second: (seconds % 60) as u8,
            frame: frame as u8,
        }
    }
}

/// Encode a timecode position as eight quarter-frame messages
///
/// Piece `i` carries four bits of the position; piece 7 additionally carries
/// the rate code in bits 1..2 of its data nibble. The pieces describe the
/// position at the moment piece 0 is sent, two full frames before the next
/// group starts.
pub fn quarter_frames(timecode: Timecode, rate: FrameRate) -> [[u8; 2]; 8] {
    use MtcQuarterFrameMessage::*;

    let nibbles = [
        (FramesLow, timecode.frame & 0x0F),
        (FramesHigh, timecode.frame >> 4),
        (SecondsLow, timecode.second & 0x0F),
        (SecondsHigh, timecode.second >> 4),
        (MinutesLow, timecode.minute & 0x0F),
        (MinutesHigh, timecode.minute >> 4),
        (HoursLow, timecode.hour & 0x0F),
        (HoursHigh, (timecode.hour >> 4) | (rate.bits() >> 4)),
    ];

    let mut pieces = [[0u8; 2]; 8];
    for (piece, (message, value)) in pieces.iter_mut().zip(nibbles) {
        let event = LiveEvent::Common(SystemCommon::MidiTimeCodeQuarterFrame(
            message,
            value.into(),
        ));
        let mut bytes = Vec::with_capacity(2);
        event
            .write(&mut bytes)
            .expect("writing to a vector cannot fail");
        piece.copy_from_slice(&bytes);
    }
    pieces
}

/// Encode an absolute position as an MTC full-frame SysEx message
///
/// The hour byte carries the rate code in bits 5..6.
pub fn full_frame(timecode: Timecode, rate: FrameRate) -> [u8; 10] {
    [
        0xF0,
        0x7F,
        0x7F,
        0x01,
        0x01,
        timecode.hour | rate.bits(),
        timecode.minute,
        timecode.second,
        timecode.frame,
        0xF7,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_index_floors() {
        assert_eq!(FrameRate::Pal.frame_at(1000), 25);
        assert_eq!(FrameRate::Pal.frame_at(999), 24);
        assert_eq!(FrameRate::Pal.frame_at(0), 0);
        assert_eq!(FrameRate::Film.frame_at(1000), 24);
        assert_eq!(FrameRate::Ntsc.frame_at(1000), 30);
    }

    #[test]
    fn frame_xtime_rounds_to_nearest() {
        // frame 1 at 25 fps starts at 40 ms
        assert_eq!(FrameRate::Pal.frame_xtime(1), 40);
        // frame 1 at 24 fps starts at 41.66 ms
        assert_eq!(FrameRate::Film.frame_xtime(1), 42);
        assert_eq!(FrameRate::Pal.quarter_xtime(), 10);
    }

    #[test]
    fn timecode_of_frame_zero() {
        let timecode = Timecode::at(0, FrameRate::Pal);
        assert_eq!(
            timecode,
            Timecode {
                hour: 0,
                minute: 0,
                second: 0,
                frame: 0
            }
        );
        // full-frame hour byte carries the 25 fps rate code
        assert_eq!(
            full_frame(timecode, FrameRate::Pal),
            [0xF0, 0x7F, 0x7F, 0x01, 0x01, 0x20, 0x00, 0x00, 0x00, 0xF7]
        );
    }

    #[test]
    fn timecode_carries_into_minutes() {
        // 3625 frames at 25 fps are 145 seconds even
        let timecode = Timecode::at(3625, FrameRate::Pal);
        assert_eq!(
            timecode,
            Timecode {
                hour: 0,
                minute: 2,
                second: 25,
                frame: 0
            }
        );
    }

    #[test]
    fn quarter_frames_encode_the_given_frame() {
        // 1h 2m 3s frame 4
        let index = (3600 + 2 * 60 + 3) * 25 + 4;
        let timecode = Timecode::at(index, FrameRate::Pal);
        assert_eq!(
            timecode,
            Timecode {
                hour: 1,
                minute: 2,
                second: 3,
                frame: 4
            }
        );

        let pieces = quarter_frames(timecode, FrameRate::Pal);
        assert_eq!(
            pieces,
            [
                [0xF1, 0x04], // frame low
                [0xF1, 0x10], // frame high
                [0xF1, 0x23], // second low
                [0xF1, 0x30], // second high
                [0xF1, 0x42], // minute low
                [0xF1, 0x50], // minute high
                [0xF1, 0x61], // hour low
                [0xF1, 0x72], // hour high | rate code
            ]
        );
    }

    #[test]
    fn quarter_frames_of_frame_zero_carry_only_the_rate() {
        let pieces = quarter_frames(Timecode::at(0, FrameRate::Pal), FrameRate::Pal);
        for (i, piece) in pieces.iter().enumerate().take(7) {
            assert_eq!(piece, &[0xF1, (i as u8) << 4]);
        }
        assert_eq!(pieces[7], [0xF1, 0x72]);
    }
}
