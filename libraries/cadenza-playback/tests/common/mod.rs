//! Shared fixtures for player integration tests
//!
//! Every harness runs the player on simulated pipelines, a manual clock and an
//! inline catalog worker, so each test is deterministic.

#![allow(dead_code)]

use cadenza_core::{AlbumId, ArtistId, GenreId, Track};
use cadenza_playback::sim::{ManualClock, MemoryCatalog, RecordingNotifier, SimRig};
use cadenza_playback::{PlaybackState, Player, PlayerBuilder, PlayerConfig, PlayerEvent};
use crossbeam_channel::Receiver;
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT: Once = Once::new();

// ===== Test Helpers =====

/// Initialize logging once per test binary
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Whole seconds as a duration
pub fn secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

/// Milliseconds as a duration
pub fn millis(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// A1 = [T1, T2] by artist 1, A2 = [T3] by artist 2, 10 s per track
pub fn two_album_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog.add_album(AlbumId::new(1), ArtistId::new(1), None, &[(1, 10), (2, 10)]);
    catalog.add_album(AlbumId::new(2), ArtistId::new(2), None, &[(3, 10)]);
    catalog
}

/// Three albums, two genres, 6 tracks
pub fn genre_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    let rock = Some(GenreId::new(5));
    let jazz = Some(GenreId::new(6));
    catalog.add_album(AlbumId::new(1), ArtistId::new(1), rock, &[(10, 30), (11, 30)]);
    catalog.add_album(AlbumId::new(2), ArtistId::new(2), jazz, &[(20, 30), (21, 30)]);
    catalog.add_album(AlbumId::new(3), ArtistId::new(2), rock, &[(30, 30), (31, 30)]);
    catalog
}

/// Default test configuration: inline worker, 100 ms lead, 2 s skip delay
pub fn test_config() -> PlayerConfig {
    PlayerConfig {
        background_worker: false,
        ..Default::default()
    }
}

/// Player wired to simulated collaborators
pub struct Harness {
    pub catalog: Arc<MemoryCatalog>,
    pub rig: SimRig,
    pub notifier: Arc<RecordingNotifier>,
    pub player: Player,
    pub events: Receiver<PlayerEvent>,
}

impl Harness {
    pub fn new(catalog: MemoryCatalog) -> Self {
        Self::build(catalog, test_config(), |builder| builder)
    }

    pub fn build(
        catalog: MemoryCatalog,
        config: PlayerConfig,
        customize: impl FnOnce(PlayerBuilder) -> PlayerBuilder,
    ) -> Self {
        init_tracing();

        let catalog = Arc::new(catalog);
        let rig = SimRig::new(ManualClock::new());
        rig.register(&catalog.tracks());
        let notifier = Arc::new(RecordingNotifier::new());

        let builder = Player::builder(catalog.clone())
            .config(config)
            .clock(Arc::new(rig.clock()))
            .notifier(notifier.clone())
            .pipelines(rig.factory());
        let player = customize(builder).build().unwrap();
        let events = player.subscribe();

        Self {
            catalog,
            rig,
            notifier,
            player,
            events,
        }
    }

    /// Catalog track by raw id
    pub fn track(&self, id: i64) -> Track {
        self.catalog.track_by_id(id)
    }

    /// Raw id of the current track
    pub fn current_id(&self) -> Option<i64> {
        self.player.current_track().map(|t| t.id.as_i64())
    }

    /// Raw id of the resolved next track
    pub fn next_id(&self) -> Option<i64> {
        self.player.next_track().map(|t| t.id.as_i64())
    }

    pub fn state(&self) -> PlaybackState {
        self.player.state()
    }

    /// Deliver pending bus messages and catalog jobs
    pub fn settle(&self) {
        for _ in 0..16 {
            self.player.wait_idle();
            if self.player.dispatch_pending() == 0 {
                break;
            }
        }
    }

    /// Run virtual time up to `at`
    pub fn run_until(&self, at: Duration) {
        self.rig.run_until(&self.player, at);
    }

    /// Virtual time
    pub fn now(&self) -> Duration {
        self.rig.clock().now()
    }

    /// Every event emitted since the last call
    pub fn drain_events(&self) -> Vec<PlayerEvent> {
        self.events.try_iter().collect()
    }

    /// Raw ids of the tracks announced since the last drain
    pub fn started_ids(&self) -> Vec<i64> {
        self.drain_events()
            .into_iter()
            .filter_map(|event| match event {
                PlayerEvent::CurrentTrackChanged { track } => Some(track.id.as_i64()),
                _ => None,
            })
            .collect()
    }
}
