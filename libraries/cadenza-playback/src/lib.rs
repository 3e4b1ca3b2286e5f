//! Cadenza - Playback Orchestration
//!
//! Decides what plays next and plays it without gaps.
//!
//! This crate provides:
//! - Track selection through a prioritized strategy chain
//!   (radio, explicit queue, user playlist, shuffle/party, album order)
//! - Shuffle history with back/forward navigation
//! - Next dispositions (stop after track/album/artist, skip to a new album)
//! - A dual-pipeline engine for gapless handoff between tracks
//! - A thread-safe [`Player`] facade with an event stream
//!
//! # Architecture
//!
//! `cadenza-playback` knows nothing about decoding or the library database:
//! - Audio output is a pair of [`Pipeline`]s created by a factory
//! - The library, playlists, radios, notifications and settings are
//!   collaborator traits from `cadenza-core`
//! - Catalog queries run on a [`CatalogWorker`], never under the player lock
//! - Timing is driven by deadlines against a [`Clock`]; the owner calls
//!   [`Player::tick`] (or [`Player::spawn_ticker`])
//!
//! # Example
//!
//! ```rust
//! use cadenza_core::{AlbumId, ArtistId};
//! use cadenza_playback::sim::{ManualClock, MemoryCatalog, SimRig};
//! use cadenza_playback::{PlaybackState, Player, PlayerConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let catalog = Arc::new(MemoryCatalog::new());
//! catalog.add_album(AlbumId::new(1), ArtistId::new(1), None, &[(1, 180), (2, 200)]);
//!
//! let rig = SimRig::new(ManualClock::new());
//! rig.register(&catalog.tracks());
//!
//! let player = Player::builder(catalog.clone())
//!     .config(PlayerConfig { background_worker: false, ..Default::default() })
//!     .clock(Arc::new(rig.clock()))
//!     .pipelines(rig.factory())
//!     .build()
//!     .unwrap();
//!
//! player.play_album(AlbumId::new(1), None);
//! rig.run_until(&player, Duration::from_secs(190));
//!
//! assert_eq!(player.state(), PlaybackState::Playing);
//! assert_eq!(player.current_track().map(|t| t.id.as_i64()), Some(2));
//! ```

#![forbid(unsafe_code)]

pub mod clock;
pub mod context;
pub mod engine;
mod error;
pub mod events;
pub mod history;
pub mod pipeline;
mod player;
pub mod selection;
pub mod strategy;
pub mod types;
mod volume;
pub mod worker;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

// Public exports
pub use clock::{Clock, SystemClock};
pub use context::{AlbumList, PlaybackContext};
pub use engine::{DualPipelineEngine, Timer, TimerKind};
pub use error::{PlaybackError, Result};
pub use events::{EventBus, PlayerEvent};
pub use history::HistoryLedger;
pub use pipeline::{
    Bus, BusMessage, BusMessageKind, Pipeline, PipelineFactory, PipelineSlot, SourceCounter,
};
pub use player::{Player, PlayerBuilder};
pub use selection::SelectionState;
pub use strategy::{SelectionStrategy, StrategyChain};
pub use types::{PlaybackState, PlayerConfig, ReplayGainMode};
pub use volume::Volume;
pub use worker::CatalogWorker;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
