//! Playback context and the album list it walks
//!
//! The context answers "where are we": which album universe is being played,
//! which album and position the current track sits at, and what should happen
//! at the next track boundary.

use cadenza_core::{AlbumId, GenreId, NextDisposition, Scope, Track};
use rand::seq::SliceRandom;
use rand::Rng;

/// Where playback currently is, and what to do at the next boundary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackContext {
    /// Album universe, `None` when a single album is playing
    pub scope: Option<Scope>,

    /// Album of the current track
    pub album_id: Option<AlbumId>,

    /// Index of the current track within its album
    pub position: Option<usize>,

    /// Index of the resolved next track within its album
    pub next_position: Option<usize>,

    /// Index of the resolved previous track within its album
    pub prev_position: Option<usize>,

    /// Boundary disposition
    pub next: NextDisposition,
}

impl PlaybackContext {
    /// Genre filter applied to album track listings
    pub fn genre_filter(&self) -> Option<GenreId> {
        self.scope.as_ref().and_then(Scope::genre_filter)
    }

    /// Return to `Continue`
    pub fn reset_disposition(&mut self) {
        self.next = NextDisposition::Continue;
    }

    /// Whether the disposition forbids loading `candidate` after `current`
    ///
    /// `StopAfterTrack` refuses any load while something is current; the album
    /// and artist variants refuse only across their boundary.
    pub fn refuses(&self, current: Option<&Track>, candidate: &Track) -> bool {
        let Some(current) = current else {
            return false;
        };
        match self.next {
            NextDisposition::StopAfterTrack => true,
            NextDisposition::StopAfterAlbum => current.album_id != candidate.album_id,
            NextDisposition::StopAfterArtist => {
                current.album_artist_id != candidate.album_artist_id
            }
            NextDisposition::Continue | NextDisposition::StartNewAlbum => false,
        }
    }
}

/// Ordered album universe with an optional pre-shuffle backup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumList {
    albums: Vec<AlbumId>,
    backup: Option<Vec<AlbumId>>,
}

impl AlbumList {
    /// Replace the list, dropping any backup
    pub fn set(&mut self, albums: Vec<AlbumId>) {
        self.albums = albums;
        self.backup = None;
    }

    /// Albums in traversal order
    pub fn ids(&self) -> &[AlbumId] {
        &self.albums
    }

    /// Check membership
    pub fn contains(&self, album: AlbumId) -> bool {
        self.albums.contains(&album)
    }

    /// Index of an album
    pub fn position(&self, album: AlbumId) -> Option<usize> {
        self.albums.iter().position(|a| *a == album)
    }

    /// Remove an album, keeping order
    pub fn remove(&mut self, album: AlbumId) {
        self.albums.retain(|a| *a != album);
    }

    /// Number of albums
    pub fn len(&self) -> usize {
        self.albums.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    /// Drop every album and the backup
    pub fn clear(&mut self) {
        self.albums.clear();
        self.backup = None;
    }

    /// Permute the list, saving the canonical order first
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.backup.is_none() {
            self.backup = Some(self.albums.clone());
        }
        self.albums.shuffle(rng);
    }

    /// Put the canonical order back, if the list was shuffled
    pub fn restore_order(&mut self) {
        if let Some(backup) = self.backup.take() {
            self.albums = backup;
        }
    }

    /// Check if the list is currently permuted
    pub fn is_shuffled(&self) -> bool {
        self.backup.is_some()
    }
}
