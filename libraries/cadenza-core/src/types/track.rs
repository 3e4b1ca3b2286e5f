//! Track domain type

use crate::types::{AlbumId, ArtistId, TrackId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Playable track
///
/// A value type handed between the catalog, the selection strategies and the
/// pipeline engine. Only radio tracks are mutated after construction (their
/// title follows the stream tags).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Catalog identifier or sentinel
    pub id: TrackId,

    /// File path or stream URI
    pub uri: String,

    /// Album identifier
    pub album_id: AlbumId,

    /// Album artist identifier
    pub album_artist_id: ArtistId,

    /// Duration, `None` when unknown (streams)
    pub duration: Option<Duration>,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Album name
    pub album: String,

    /// Genre name
    pub genre: String,
}

impl Track {
    /// Create a track with empty display metadata
    pub fn new(id: TrackId, uri: impl Into<String>) -> Self {
        Self {
            id,
            uri: uri.into(),
            album_id: AlbumId::new(-1),
            album_artist_id: ArtistId::new(-1),
            duration: None,
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            genre: String::new(),
        }
    }

    /// Radio stream track with metadata synthesized from the station
    pub fn radio(station_name: impl Into<String>, uri: impl Into<String>) -> Self {
        let label = "Radio".to_string();
        Self {
            id: TrackId::RADIO,
            uri: uri.into(),
            album_id: AlbumId::new(-1),
            album_artist_id: ArtistId::new(-1),
            duration: None,
            title: label.clone(),
            artist: station_name.into(),
            album: label.clone(),
            genre: label,
        }
    }

    /// Set album and album artist
    #[must_use]
    pub fn with_album(mut self, album_id: AlbumId, album_artist_id: ArtistId) -> Self {
        self.album_id = album_id;
        self.album_artist_id = album_artist_id;
        self
    }

    /// Set duration
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Set title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set artist, album and genre names
    #[must_use]
    pub fn with_names(
        mut self,
        artist: impl Into<String>,
        album: impl Into<String>,
        genre: impl Into<String>,
    ) -> Self {
        self.artist = artist.into();
        self.album = album.into();
        self.genre = genre.into();
        self
    }

    /// True for internet radio streams
    pub fn is_radio(&self) -> bool {
        self.id.is_radio()
    }

    /// Local file path, `None` for network streams
    pub fn path(&self) -> Option<&Path> {
        if self.uri.contains("://") && !self.uri.starts_with("file://") {
            return None;
        }
        Some(Path::new(self.uri.strip_prefix("file://").unwrap_or(&self.uri)))
    }

    /// Check if duration is known and non-zero
    pub fn has_known_duration(&self) -> bool {
        self.duration.is_some_and(|d| !d.is_zero())
    }
}
