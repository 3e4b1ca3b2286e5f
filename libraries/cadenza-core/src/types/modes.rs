//! Playback mode enumerations shared by the player and its settings

use serde::{Deserialize, Serialize};

/// Shuffle mode
///
/// The `*Artist` variants restrict the album universe to the current album
/// artist instead of the browsed genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShuffleMode {
    /// No shuffling
    #[default]
    None,

    /// Random tracks from the browsed genre
    Tracks,

    /// Random album order for the browsed genre
    Albums,

    /// Random tracks from the current artist
    TracksArtist,

    /// Random album order for the current artist
    AlbumsArtist,
}

impl ShuffleMode {
    /// Track-level randomness (history ledger and no-repeat bookkeeping apply)
    pub fn shuffles_tracks(self) -> bool {
        matches!(self, ShuffleMode::Tracks | ShuffleMode::TracksArtist)
    }

    /// Album-level randomness (album list permuted once per scope change)
    pub fn shuffles_albums(self) -> bool {
        matches!(self, ShuffleMode::Albums | ShuffleMode::AlbumsArtist)
    }

    /// Album universe comes from the current artist
    pub fn is_artist_scoped(self) -> bool {
        matches!(self, ShuffleMode::TracksArtist | ShuffleMode::AlbumsArtist)
    }
}

/// What to do at the next track boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextDisposition {
    /// Continue playback
    #[default]
    Continue,

    /// Stop after the current track
    StopAfterTrack,

    /// Stop when the album changes
    StopAfterAlbum,

    /// Stop when the album artist changes
    StopAfterArtist,

    /// Skip the rest of the album and start the next one
    StartNewAlbum,
}

impl NextDisposition {
    /// Dispositions that may refuse a load
    pub fn is_stop(self) -> bool {
        matches!(
            self,
            NextDisposition::StopAfterTrack
                | NextDisposition::StopAfterAlbum
                | NextDisposition::StopAfterArtist
        )
    }
}
