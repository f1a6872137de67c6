//! The timecode scheduler: snapshots in, timed MIDI out
//!
//! Basic strategy: every playtime report pairs a player-clock value with the
//! wall-clock moment it arrived. Two such pairs define a linear
//! extrapolation from player time to wall time, which is used to stamp
//! quarter-frame messages ahead of the present. State transitions re-anchor
//! or reset the extrapolation; discontinuities in the player clock are
//! announced with an absolute full-frame message before quarter frames
//! continue from the new position.

use tracing::{debug, trace};

use crate::mailbox::Mailbox;
use crate::midi::{Clock, MidiSink};
use crate::notifier::SongIdNotifier;
use crate::status::{LTime, PlaybackState, SongId, Status, XTime};
use crate::timecode::{full_frame, quarter_frames, FrameRate, Timecode};

/// Lead time by which frames are queued into the MIDI layer, in ms
pub const SCHEDULE_HORIZON_MS: LTime = 150;

/// Consumer of status snapshots and producer of the MIDI timecode stream
///
/// The scheduler exclusively owns the output sink and all timing state; its
/// only interaction with the rest of the program is reading snapshots from
/// the mailbox.
pub struct TimecodeScheduler<S> {
    sink: S,
    clock: Clock,
    rate: FrameRate,
    begin: SongIdNotifier,
    end: SongIdNotifier,

    prev: Status,
    curr: Status,

    /// Snapshots since the last discontinuity; slope updates need two
    valid_count: u32,

    /// Index of the next timecode frame to emit, from track start
    next_frame: i64,

    /// Last wall-clock timestamp handed to the MIDI layer
    next_slot: LTime,

    // linear extrapolation ltime = (dl * xtime + dx/2) / dx + n
    dl: LTime,
    dx: XTime,
    n: LTime,
}

impl<S: MidiSink> TimecodeScheduler<S> {
    /// Create a scheduler emitting timecode at `rate` into `sink`
    pub fn new(
        sink: S,
        clock: Clock,
        rate: FrameRate,
        begin: SongIdNotifier,
        end: SongIdNotifier,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            sink,
            clock,
            rate,
            begin,
            end,
            prev: Status::default(),
            curr: Status::default(),
            valid_count: 0,
            next_frame: 0,
            next_slot: now,
            dl: 1,
            dx: 1,
            n: now,
        }
    }

    /// Consume snapshots forever
    ///
    /// The blocking mailbox read is the only suspension point: once the
    /// schedule horizon is filled, the MIDI layer delivers at the requested
    /// timestamps on its own and the scheduler has nothing to do until the
    /// player reports again.
    pub fn run(mut self, mailbox: &Mailbox<Status>) {
        loop {
            let status = mailbox.read();
            self.advance(status);
        }
    }

    /// Process one snapshot: classify the transition and act on it
    fn advance(&mut self, status: Status) {
        self.prev = self.curr;
        self.curr = status;
        self.valid_count += 1;

        use PlaybackState::*;
        match (self.prev.state, self.curr.state) {
            (Invalid, Playing | Paused) => {
                debug!("init: player is {:?}", self.curr.state);
                self.song_start();
                self.update_y_intercept();
            }

            (Playing, Paused) => {
                // player clock froze; keep the slope, re-anchor on resume
            }

            (Paused, Playing) => {
                self.update_y_intercept();
            }

            (Playing | Paused, Stopped) => {
                debug!("{:?} -> stop", self.prev.state);
                self.send_end(self.prev.song_id);
                self.next_frame = 0;
                self.valid_count = 0;
                self.send_full_frame(0);
            }

            (Stopped, Playing) => {
                debug!("stop -> play");
                self.song_start();
                self.update_y_intercept();
                self.enqueue_frames();
                self.valid_count = 1;
            }

            (Playing, Playing) => {
                if self.curr.song_id != self.prev.song_id {
                    self.send_end(self.prev.song_id);
                    self.song_start();
                    self.update_y_intercept();
                } else {
                    let frame = self.frame_at(self.curr.time.xtime);
                    if frame > self.next_frame || frame < self.frame_at(self.prev.time.xtime) {
                        debug!("jump detected: {} -> {frame}", self.next_frame);
                        self.send_full_frame(frame);
                        self.next_frame = frame;
                        self.update_y_intercept();
                        // first valid snapshot after the jump
                        self.valid_count = 1;
                    }
                }

                if self.valid_count >= 2 {
                    self.update_extrapolation();
                }
                self.enqueue_frames();
            }

            _ => {}
        }
    }

    /// Song start sequence: begin notifier, frame counter, absolute position
    fn song_start(&mut self) {
        self.send_begin(self.curr.song_id);
        self.next_frame = self.frame_at(self.curr.time.xtime);
        self.send_full_frame(self.next_frame);
    }

    /// Update the extrapolation slope from the two retained snapshots
    ///
    /// The update is skipped unless both pairs advance: `dx` must stay
    /// positive and a zero `dl` would stall the monotonic timestamp guard.
    fn update_extrapolation(&mut self) {
        let t1 = self.prev.time;
        let t2 = self.curr.time;
        if !t1.is_valid() && !t2.is_valid() {
            return;
        }
        if t2.xtime <= t1.xtime || t2.ltime <= t1.ltime {
            return;
        }

        self.dl = t2.ltime - t1.ltime;
        self.dx = t2.xtime - t1.xtime;
        self.update_y_intercept();
    }

    /// Shift the extrapolation onto the newest pair without touching the slope
    fn update_y_intercept(&mut self) {
        let t2 = self.curr.time;
        if !t2.is_valid() {
            return;
        }
        self.n = t2.ltime - (self.dl * t2.xtime + self.dx / 2) / self.dx;
    }

    /// Wall-clock time at which player position `xtime` will occur
    fn extrapolate(&self, xtime: XTime) -> LTime {
        self.n + (self.dl * xtime + self.dx / 2) / self.dx
    }

    /// Timecode frame running at player position `xtime`
    fn frame_at(&self, xtime: XTime) -> i64 {
        self.rate.frame_at(xtime)
    }

    /// Enqueue quarter frames up to the schedule horizon
    ///
    /// Each iteration emits one complete group: 8 quarter frames covering 2
    /// frames of timecode. Returns as soon as the next group would start
    /// more than the horizon ahead of the present.
    fn enqueue_frames(&mut self) {
        loop {
            let mut xtime = self.rate.frame_xtime(self.next_frame);
            if self.extrapolate(xtime) - self.clock.now_ms() > SCHEDULE_HORIZON_MS {
                return;
            }
            // non-decreasing output timestamps; only ever nudges after a jump
            while self.extrapolate(xtime) < self.next_slot {
                xtime += 1;
            }

            let timecode = Timecode::at(self.next_frame, self.rate);
            let pieces = quarter_frames(timecode, self.rate);
            let quarter = self.rate.quarter_xtime();

            let mut when = self.next_slot;
            for (i, piece) in pieces.iter().enumerate() {
                when = self.extrapolate(xtime + i as XTime * quarter);
                self.sink.write_short(when, piece);
            }

            self.next_frame += 2;
            self.next_slot = when;
            trace!(
                "enqueued frames {}..{} up to slot {when}",
                self.next_frame - 2,
                self.next_frame
            );
        }
    }

    /// Send the absolute playing position as an MTC full-frame message
    fn send_full_frame(&mut self, frame: i64) {
        let timecode = Timecode::at(frame, self.rate);
        let message = full_frame(timecode, self.rate);
        self.sink.write_sysex(self.next_slot, &message);
    }

    fn send_begin(&mut self, song_id: SongId) {
        if let Some(message) = self.begin.message(song_id) {
            debug!("send begin id of song #{song_id}");
            self.sink.write_short(self.next_slot, &message);
        }
    }

    fn send_end(&mut self, song_id: SongId) {
        if let Some(message) = self.end.message(song_id) {
            debug!("send end id of song #{song_id}");
            self.sink.write_short(self.next_slot, &message);
        }
    }
}
