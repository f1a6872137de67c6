//! Observer turning player events into whole status snapshots
//!
//! The observer owns the in-progress snapshot exclusively and is the only
//! writer to the mailbox. Publication follows the player's event order:
//! playtime reports publish, song-id changes never do, and a stop-to-play
//! transition defers publication until the next playtime so the snapshot
//! carries the new song id.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::mailbox::Mailbox;
use crate::midi::Clock;
use crate::status::{PlaybackState, SongId, Status, TimePair, XTime};

/// Receiver for the player's three event streams
pub struct PlayerObserver {
    mailbox: Arc<Mailbox<Status>>,
    clock: Clock,
    status: Status,
}

impl PlayerObserver {
    /// Create an observer publishing into `mailbox`, stamping with `clock`
    pub fn new(mailbox: Arc<Mailbox<Status>>, clock: Clock) -> Self {
        Self {
            mailbox,
            clock,
            status: Status::default(),
        }
    }

    /// The player reported its playing position in milliseconds
    pub fn playtime_changed(&mut self, xtime: XTime) {
        self.status.time = TimePair::new(xtime, self.clock.now_ms());
        trace!("playtime {xtime} ms");
        self.publish();
    }

    /// The player switched to another song
    ///
    /// Song ids arrive out of order with respect to state transitions, so
    /// nothing is published here; waiting for the next playtime guarantees a
    /// self-consistent snapshot.
    pub fn song_changed(&mut self, song_id: SongId) {
        debug!("new song id: {song_id}");
        self.status.song_id = song_id;
    }

    /// The player changed its playback state
    pub fn state_changed(&mut self, state: PlaybackState) {
        let previous = self.status.state;
        self.status.state = state;
        debug!("new status: {state:?}");

        if previous == PlaybackState::Stopped && state == PlaybackState::Playing {
            // after a stop the player announces status, then song id, then
            // playtime; publishing now would deliver a stale song id
            return;
        }
        self.publish();
    }

    fn publish(&self) {
        if self.mailbox.write(self.status) {
            trace!("scheduler skipped a snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observer() -> (Arc<Mailbox<Status>>, PlayerObserver) {
        let mailbox = Arc::new(Mailbox::new(Status::default()));
        let observer = PlayerObserver::new(mailbox.clone(), Clock::new());
        (mailbox, observer)
    }

    /// A probe write tells whether something unconsumed was in the slot.
    fn has_unread(mailbox: &Mailbox<Status>) -> bool {
        let unread = mailbox.write(Status::default());
        mailbox.read_cached();
        unread
    }

    #[test]
    fn playtime_publishes_a_complete_snapshot() {
        let (mailbox, mut observer) = observer();
        observer.state_changed(PlaybackState::Playing);
        observer.song_changed(42);
        observer.playtime_changed(1000);

        let status = mailbox.read();
        assert_eq!(status.state, PlaybackState::Playing);
        assert_eq!(status.song_id, 42);
        assert_eq!(status.time.xtime, 1000);
        assert!(status.time.is_valid());
    }

    #[test]
    fn song_change_alone_is_not_published() {
        let (mailbox, mut observer) = observer();
        observer.song_changed(42);
        assert!(!has_unread(&mailbox));
    }

    #[test]
    fn state_change_is_published() {
        let (mailbox, mut observer) = observer();
        observer.state_changed(PlaybackState::Paused);
        let status = mailbox.read();
        assert_eq!(status.state, PlaybackState::Paused);
    }

    #[test]
    fn stop_to_play_defers_until_the_next_playtime() {
        let (mailbox, mut observer) = observer();
        observer.state_changed(PlaybackState::Playing);
        observer.song_changed(42);
        observer.playtime_changed(5000);
        observer.state_changed(PlaybackState::Stopped);
        mailbox.read_cached();

        // the player restarts on another song: status first...
        observer.state_changed(PlaybackState::Playing);
        assert!(!has_unread(&mailbox), "stop->play published a stale snapshot");

        // ...then song id, then playtime, which finally publishes
        observer.song_changed(43);
        observer.playtime_changed(0);

        let status = mailbox.read();
        assert_eq!(status.state, PlaybackState::Playing);
        assert_eq!(status.song_id, 43);
        assert_eq!(status.time.xtime, 0);
    }

    #[test]
    fn cold_start_into_playing_publishes_immediately() {
        let (mailbox, mut observer) = observer();
        observer.state_changed(PlaybackState::Playing);
        let status = mailbox.read();
        assert_eq!(status.state, PlaybackState::Playing);
    }
}
