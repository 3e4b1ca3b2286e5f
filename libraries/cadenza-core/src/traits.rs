//! Collaborator traits consumed by the Cadenza player
//!
//! Every trait here is implemented outside the playback engine (library
//! database, playlist store, settings backend, desktop notifications). The
//! player receives them as `Arc<dyn Trait>` at construction.

use crate::error::Result;
use crate::types::{
    AlbumId, ArtistId, GenreId, PersistedState, PlaylistId, RadioStation, Scope, Track, TrackId,
};

/// Read-only query surface of the music library
///
/// Implementations may block (database, disk). The player only calls them from
/// its catalog worker, never from a pipeline callback.
pub trait Catalog: Send + Sync {
    /// Look up a single track
    fn track(&self, id: TrackId) -> Result<Option<Track>>;

    /// Ordered tracks of an album
    ///
    /// A genre filter restricts compilations to the tracks of that genre.
    fn tracks_for_album(&self, album: AlbumId, genre: Option<GenreId>) -> Result<Vec<Track>>;

    /// Ordered albums of a browsing scope
    fn albums_for_scope(&self, scope: &Scope) -> Result<Vec<AlbumId>>;

    /// Album of a track
    fn album_of(&self, track: TrackId) -> Result<Option<AlbumId>>;

    /// Album artist of a track
    fn album_artist_of(&self, track: TrackId) -> Result<Option<ArtistId>>;

    /// Whether the track's file is present
    fn path_exists(&self, track: &Track) -> bool;

    /// All genre ids known to the library
    fn genre_ids(&self) -> Result<Vec<GenreId>>;

    /// Union of several scopes, first occurrence order, no duplicates
    fn albums_for_scopes(&self, scopes: &[Scope]) -> Result<Vec<AlbumId>> {
        let mut albums = Vec::new();
        for scope in scopes {
            for album in self.albums_for_scope(scope)? {
                if !albums.contains(&album) {
                    albums.push(album);
                }
            }
        }
        Ok(albums)
    }
}

/// User playlists
pub trait PlaylistStore: Send + Sync {
    /// Ordered track ids of a playlist
    fn track_ids(&self, playlist: PlaylistId) -> Result<Vec<TrackId>>;
}

/// Saved internet radio stations
pub trait RadioDirectory: Send + Sync {
    /// Stations in display order
    fn stations(&self) -> Result<Vec<RadioStation>>;
}

/// User-visible notifications (desktop notification daemon, toast, ...)
pub trait Notifier: Send + Sync {
    /// Show a message
    fn notify(&self, message: &str);
}

/// Settings backend for restorable player state
pub trait SettingsStore: Send + Sync {
    /// Read the saved state
    fn load_state(&self) -> Result<PersistedState>;

    /// Write the state
    fn save_state(&self, state: &PersistedState) -> Result<()>;
}
