//! Cadenza Core
//!
//! Domain types, collaborator traits and error handling shared by the Cadenza
//! playback engine and its front ends.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, typed identifiers, `Scope`, `NextDisposition`
//! - **Collaborator Traits**: `Catalog`, `PlaylistStore`, `RadioDirectory`,
//!   `Notifier`, `SettingsStore`
//! - **Error Handling**: unified `CoreError` and `Result` types
//!
//! Nothing in here performs I/O. The library database, playlist store,
//! settings backend and desktop notifications live behind the traits and are
//! injected into the player at construction.
//!
//! # Example
//!
//! ```rust
//! use cadenza_core::{AlbumId, ArtistId, Track, TrackId};
//! use std::time::Duration;
//!
//! let track = Track::new(TrackId::new(42), "/music/song.flac")
//!     .with_album(AlbumId::new(7), ArtistId::new(3))
//!     .with_duration(Duration::from_secs(215))
//!     .with_title("Song");
//!
//! assert!(track.id.is_library());
//! assert!(!track.is_radio());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{CoreError, Result};
pub use traits::{Catalog, Notifier, PlaylistStore, RadioDirectory, SettingsStore};
pub use types::{
    AlbumId, ArtistId, GenreId, NextDisposition, PersistedState, PlaylistId, RadioStation,
    Scope, ShuffleMode, Track, TrackId,
};
