//! Player-client collaborator speaking MPRIS over D-Bus
//!
//! The bridge needs three event streams from the player: playtime (~1 Hz),
//! current song id and playback status. MPRIS deliberately does not
//! broadcast `Position`, so this client synthesizes all three by polling the
//! player proxy from a blocking loop and reporting only changes, in the
//! player's canonical order (status, song id, playtime).

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use tracing::{debug, info, warn};
use zbus::blocking::{connection, fdo, Connection};
use zbus::names::BusName;
use zbus::proxy;
use zbus::zvariant::{ObjectPath, OwnedValue, Str};

use crate::observer::PlayerObserver;
use crate::status::{PlaybackState, SongId, SONG_ID_INVALID};

#[proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_path = "/org/mpris/MediaPlayer2",
    gen_async = false
)]
trait Player {
    #[zbus(property)]
    fn playback_status(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(property(emits_changed_signal = "false"))]
    fn position(&self) -> zbus::Result<i64>;
}

/// How often the player proxy is polled
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Minimum spacing of synthesized playtime reports
const PLAYTIME_INTERVAL: Duration = Duration::from_millis(900);

/// Consecutive poll failures after which the player counts as gone
const MAX_FAILURES: u32 = 8;

/// Connection to one MPRIS player on the bus
pub struct MprisClient {
    player: PlayerProxy<'static>,
}

struct LastSeen {
    state: Option<PlaybackState>,
    song_id: Option<SongId>,
}

impl MprisClient {
    /// Connect to the session bus, or to `address` when non-empty, and
    /// attach to the first MPRIS player found there
    pub fn connect(address: &str) -> anyhow::Result<Self> {
        let connection = if address.is_empty() {
            Connection::session().context("connecting to the session bus")?
        } else {
            connection::Builder::address(address)
                .with_context(|| format!("invalid bus address {address:?}"))?
                .build()
                .with_context(|| format!("connecting to {address}"))?
        };

        let name = discover_player(&connection)?;
        info!("found player {name}");

        let player = PlayerProxy::builder(&connection)
            .destination(name)?
            .build()
            .context("creating player proxy")?;
        Ok(Self { player })
    }

    /// Drive `observer` until the player goes away
    ///
    /// The first poll delivers the requested initial values; afterwards only
    /// changes are reported. Individual poll failures are logged and
    /// absorbed; the loop returns once the player stops answering.
    pub fn run(&self, observer: &mut PlayerObserver) {
        let mut last = LastSeen {
            state: None,
            song_id: None,
        };
        let mut last_playtime: Option<Instant> = None;
        let mut failures = 0u32;

        loop {
            match self.poll(observer, &mut last, &mut last_playtime) {
                Ok(()) => failures = 0,
                Err(err) => {
                    failures += 1;
                    debug!("player poll failed: {err}");
                    if failures >= MAX_FAILURES {
                        warn!("lost contact with the player: {err}");
                        return;
                    }
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn poll(
        &self,
        observer: &mut PlayerObserver,
        last: &mut LastSeen,
        last_playtime: &mut Option<Instant>,
    ) -> zbus::Result<()> {
        let state = playback_state(&self.player.playback_status()?);
        let metadata = self.player.metadata()?;
        let song_id = song_id_from_metadata(&metadata);

        if last.state != Some(state) {
            last.state = Some(state);
            observer.state_changed(state);
        }
        if let Some(song_id) = song_id {
            if last.song_id != Some(song_id) {
                last.song_id = Some(song_id);
                observer.song_changed(song_id);
            }
        }
        let playtime_due = last_playtime.map_or(true, |at| at.elapsed() >= PLAYTIME_INTERVAL);
        if state == PlaybackState::Playing && playtime_due {
            // MPRIS reports microseconds
            let position = self.player.position()? / 1000;
            observer.playtime_changed(position);
            *last_playtime = Some(Instant::now());
        }
        Ok(())
    }
}

fn discover_player(connection: &Connection) -> anyhow::Result<BusName<'static>> {
    let dbus = fdo::DBusProxy::new(connection).context("creating bus proxy")?;
    let names = dbus.list_names().context("listing bus names")?;

    for name in names {
        if name.as_str().starts_with("org.mpris.MediaPlayer2.") {
            return Ok(name.into());
        }
    }
    Err(anyhow!("no MPRIS player is running on the bus"))
}

fn playback_state(status: &str) -> PlaybackState {
    match status {
        "Playing" => PlaybackState::Playing,
        "Paused" => PlaybackState::Paused,
        _ => PlaybackState::Stopped,
    }
}

fn song_id_from_metadata(metadata: &HashMap<String, OwnedValue>) -> Option<SongId> {
    let track = metadata.get("mpris:trackid")?;
    // MPRIS mandates an object path, but some players send a plain string
    let path = if let Ok(path) = track.downcast_ref::<ObjectPath>() {
        path.to_string()
    } else if let Ok(text) = track.downcast_ref::<Str>() {
        text.to_string()
    } else {
        return None;
    };
    Some(song_id_from_track_path(&path))
}

/// Reduce an MPRIS track id to an integer song id
///
/// Players that expose numeric track paths (mpd, xmms-alikes) keep their
/// number; opaque paths get a stable FNV-1a hash. The result is never 0 for
/// a real track; the MPRIS `NoTrack` sentinel maps to the invalid id.
fn song_id_from_track_path(path: &str) -> SongId {
    if path.ends_with("/TrackList/NoTrack") {
        return SONG_ID_INVALID;
    }

    let segment = path.rsplit('/').next().unwrap_or(path);
    if let Ok(id) = segment.parse::<SongId>() {
        if id != 0 {
            return id;
        }
    }

    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in path.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    let id = (hash & 0x3FFF_FFFF) as SongId;
    if id == 0 {
        1
    } else {
        id
    }
}
