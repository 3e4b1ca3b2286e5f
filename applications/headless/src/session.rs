//! Player session on simulated pipelines
//!
//! Wires a [`Player`] to a [`ManifestLibrary`], a JSON state file and a pair
//! of simulated pipelines running on a virtual clock, then advances time in
//! fixed steps and logs what the player reports.

use crate::config::HeadlessConfig;
use crate::error::{HeadlessError, Result};
use crate::library::ManifestLibrary;
use crate::settings::JsonSettingsStore;
use cadenza_core::{AlbumId, Catalog, PlaylistId, Scope, ShuffleMode, TrackId};
use cadenza_playback::sim::{ManualClock, SimRig};
use cadenza_playback::{PlaybackState, Player, PlayerEvent};
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How playback starts
#[derive(Debug, Clone, PartialEq)]
pub enum Start {
    /// First track of an album, optionally inside a browsing scope
    Album { album: AlbumId, scope: Option<Scope> },
    /// First track of a user playlist
    Playlist(PlaylistId),
    /// A saved radio station, by name
    Radio(String),
    /// Party mode over the configured buckets
    Party,
    /// Last saved track and modes
    Restore,
}

/// Track that started during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Played {
    /// Virtual time of the step in which the track started
    pub at_ms: u64,
    pub track_id: TrackId,
    pub title: String,
    pub uri: String,
}

/// Outcome of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub played: Vec<Played>,
    pub errors: Vec<String>,
    pub final_state: PlaybackState,
    pub elapsed_ms: u64,
}

/// Player plus its simulated output
pub struct Session {
    library: Arc<ManifestLibrary>,
    rig: SimRig,
    player: Player,
    events: Receiver<PlayerEvent>,
    save_state: bool,
}

impl Session {
    /// Build a session over `library`
    pub fn new(config: &HeadlessConfig, library: ManifestLibrary) -> Result<Self> {
        let library = Arc::new(library);
        let rig = SimRig::new(ManualClock::new());
        rig.register(&library.tracks());

        let mut builder = Player::builder(library.clone())
            .config(config.player_config()?)
            .playlists(library.clone())
            .radios(library.clone())
            .clock(Arc::new(rig.clock()))
            .pipelines(rig.factory());
        if config.state.save_state {
            builder = builder.settings(Arc::new(JsonSettingsStore::new(config.state.path.clone())));
        }

        let player = builder.build()?;
        let events = player.subscribe();

        Ok(Self {
            library,
            rig,
            player,
            events,
            save_state: config.state.save_state,
        })
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Virtual time
    pub fn now(&self) -> Duration {
        self.rig.clock().now()
    }

    /// Start playback
    ///
    /// Returns `false` when there was nothing to start (empty album, nothing
    /// saved, refused by the player).
    pub fn start(&self, start: &Start) -> Result<bool> {
        info!(?start, "Starting playback");
        let started = match start {
            Start::Album { album, scope } => {
                if self.library.tracks_for_album(*album, None)?.is_empty() {
                    return Err(HeadlessError::unknown("album", album));
                }
                self.player.play_album(*album, *scope);
                true
            }
            Start::Playlist(playlist) => {
                self.player.set_user_playlist(*playlist);
                self.player.wait_idle();
                let tracks = self
                    .player
                    .user_playlist()
                    .ok_or_else(|| HeadlessError::unknown("playlist", playlist))?;
                match tracks.first() {
                    Some(first) => self.player.load_in_playlist(first.id),
                    None => false,
                }
            }
            Start::Radio(name) => {
                let station = self
                    .library
                    .station(name)
                    .ok_or_else(|| HeadlessError::unknown("station", name))?;
                self.player.load_radio(&station.name, &station.uri)
            }
            Start::Party => {
                self.player.set_party(true);
                true
            }
            Start::Restore => self.player.restore_state()?,
        };
        self.player.wait_idle();
        Ok(started)
    }

    pub fn set_shuffle(&self, mode: ShuffleMode) {
        self.player.set_shuffle(mode);
        self.player.wait_idle();
    }

    /// Advance virtual time by `duration` in steps of `step`
    pub fn run(&self, duration: Duration, step: Duration) -> Report {
        let step = if step.is_zero() {
            Duration::from_secs(1)
        } else {
            step
        };
        let start = self.now();
        let end = start + duration;
        let mut report = Report::default();

        while self.now() < end {
            let until = (self.now() + step).min(end);
            self.rig.run_until(&self.player, until);
            self.collect(&mut report);
        }

        report.final_state = self.player.state();
        report.elapsed_ms = (self.now() - start).as_millis() as u64;
        report
    }

    fn collect(&self, report: &mut Report) {
        let at_ms = self.now().as_millis() as u64;
        for event in self.events.try_iter() {
            match event {
                PlayerEvent::CurrentTrackChanged { track } => {
                    info!(at_ms, track = %track.id, title = %track.title, "Now playing");
                    report.played.push(Played {
                        at_ms,
                        track_id: track.id,
                        title: track.title,
                        uri: track.uri,
                    });
                }
                PlayerEvent::TrackMetadataChanged { track } => {
                    info!(at_ms, title = %track.title, "Stream title");
                }
                PlayerEvent::StatusChanged { state } => {
                    info!(at_ms, ?state, "Status");
                }
                PlayerEvent::Error { uri, message } => {
                    warn!(at_ms, uri = %uri, "Playback error: {}", message);
                    report.errors.push(format!("{uri}: {message}"));
                }
                other => tracing::debug!(at_ms, event = ?other, "Player event"),
            }
        }
    }

    /// Persist the player state if enabled
    pub fn save(&self) -> Result<()> {
        if self.save_state {
            self.player.save_state()?;
        }
        Ok(())
    }
}
