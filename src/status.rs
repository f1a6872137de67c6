//! Complete player snapshots exchanged between the observer and the scheduler

/// Song id as reported by the player. `0` means absent/invalid.
pub type SongId = i64;

/// Invalid song id
pub const SONG_ID_INVALID: SongId = 0;

/// Player-clock position in milliseconds from track start
pub type XTime = i64;

/// Wall-clock time in milliseconds from a monotonic local source
pub type LTime = i64;

/// One player-clock observation paired with the wall-clock moment it arrived
///
/// Either both fields are valid or the whole pair is [TimePair::INVALID];
/// consumers never see a half-filled pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimePair {
    /// Player position in ms when the report was made
    pub xtime: XTime,

    /// Local time in ms when the report was received
    pub ltime: LTime,
}

impl TimePair {
    /// The invalid pair, used before the first playtime report and after a stop
    pub const INVALID: TimePair = TimePair { xtime: 0, ltime: 0 };

    /// Pair a player position with the local receive time
    pub fn new(xtime: XTime, ltime: LTime) -> Self {
        Self { xtime, ltime }
    }

    /// Check that this pair holds a real observation
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// Playback state of the player
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// No state received yet; only ever the initial value
    Invalid,

    /// Playback stopped
    Stopped,

    /// Playback paused
    Paused,

    /// Playing
    Playing,
}

/// A complete, self-contained description of the player at one instant
///
/// Snapshots are always published whole so that the scheduler can classify
/// state transitions without ever seeing a half-updated snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status {
    /// Current playback state
    pub state: PlaybackState,

    /// Current song id (0 = absent)
    pub song_id: SongId,

    /// Latest playtime observation
    pub time: TimePair,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            state: PlaybackState::Invalid,
            song_id: SONG_ID_INVALID,
            time: TimePair::INVALID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_snapshot_is_invalid() {
        let status = Status::default();
        assert_eq!(status.state, PlaybackState::Invalid);
        assert_eq!(status.song_id, SONG_ID_INVALID);
        assert!(!status.time.is_valid());
    }

    #[test]
    fn time_pair_validity() {
        assert!(!TimePair::INVALID.is_valid());
        assert!(TimePair::new(0, 1).is_valid());
        assert!(TimePair::new(1, 0).is_valid());
        assert!(TimePair::new(1000, 100000).is_valid());
    }

    #[test]
    fn snapshot_keeps_fields_together() {
        let mut status = Status::default();
        status.state = PlaybackState::Playing;
        status.song_id = 42;
        status.time = TimePair::new(1000, 100000);

        let copy = status;
        assert_eq!(copy.state, PlaybackState::Playing);
        assert_eq!(copy.song_id, 42);
        assert_eq!(copy.time, TimePair::new(1000, 100000));
    }
}
