//! User playlist traversal
//!
//! A playlist wraps around in both directions. Track shuffle permutes the
//! working order once and keeps the canonical order for when it is turned off.

use super::SelectionStrategy;
use crate::selection::SelectionState;
use cadenza_core::{Catalog, PlaylistId, Track, TrackId};
use rand::seq::SliceRandom;
use rand::Rng;

/// Active user playlist
#[derive(Debug, Clone, PartialEq)]
pub struct UserPlaylist {
    id: PlaylistId,

    /// Working order
    tracks: Vec<Track>,

    /// Canonical order while shuffled
    canonical: Option<Vec<Track>>,
}

impl UserPlaylist {
    /// Create a playlist in canonical order
    pub fn new(id: PlaylistId, tracks: Vec<Track>) -> Self {
        Self {
            id,
            tracks,
            canonical: None,
        }
    }

    /// Playlist identifier
    pub fn id(&self) -> PlaylistId {
        self.id
    }

    /// Tracks in working order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Find a track by id
    pub fn find(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Permute the working order
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.canonical.is_none() {
            self.canonical = Some(self.tracks.clone());
        }
        self.tracks.shuffle(rng);
    }

    /// Return to the canonical order
    pub fn unshuffle(&mut self) {
        if let Some(canonical) = self.canonical.take() {
            self.tracks = canonical;
        }
    }

    /// Check if the working order is permuted
    pub fn is_shuffled(&self) -> bool {
        self.canonical.is_some()
    }

    /// Track after `id`, wrapping to the first
    pub fn next_after(&self, id: TrackId) -> Option<&Track> {
        let index = self.tracks.iter().position(|t| t.id == id)?;
        self.tracks.get((index + 1) % self.tracks.len())
    }

    /// Track before `id`, wrapping to the last
    pub fn prev_before(&self, id: TrackId) -> Option<&Track> {
        let index = self.tracks.iter().position(|t| t.id == id)?;
        let len = self.tracks.len();
        self.tracks.get((index + len - 1) % len)
    }
}

/// Walks the active user playlist when the current track belongs to it
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaylistStrategy;

impl SelectionStrategy for PlaylistStrategy {
    fn name(&self) -> &'static str {
        "playlist"
    }

    fn resolve_next(&self, state: &mut SelectionState, _catalog: &dyn Catalog) -> Option<Track> {
        let current = state.current.as_ref()?;
        state.playlist.as_ref()?.next_after(current.id).cloned()
    }

    fn resolve_prev(&self, state: &mut SelectionState, _catalog: &dyn Catalog) -> Option<Track> {
        let current = state.current.as_ref()?;
        state.playlist.as_ref()?.prev_before(current.id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemoryCatalog;

    fn playlist(ids: &[i64]) -> UserPlaylist {
        UserPlaylist::new(
            PlaylistId::new(1),
            ids.iter()
                .map(|id| Track::new(TrackId::new(*id), format!("/music/{id}.flac")))
                .collect(),
        )
    }

    #[test]
    fn traversal_wraps_both_ways() {
        let list = playlist(&[1, 2, 3]);
        assert_eq!(list.next_after(TrackId::new(3)).unwrap().id, TrackId::new(1));
        assert_eq!(list.prev_before(TrackId::new(1)).unwrap().id, TrackId::new(3));
        assert_eq!(list.next_after(TrackId::new(1)).unwrap().id, TrackId::new(2));
        assert!(list.next_after(TrackId::new(9)).is_none());
    }

    #[test]
    fn single_track_playlist_repeats_itself() {
        let list = playlist(&[5]);
        assert_eq!(list.next_after(TrackId::new(5)).unwrap().id, TrackId::new(5));
        assert_eq!(list.prev_before(TrackId::new(5)).unwrap().id, TrackId::new(5));
    }

    #[test]
    fn unshuffle_restores_canonical_order() {
        let mut list = playlist(&(0..30).collect::<Vec<_>>());
        let canonical = list.tracks().to_vec();
        list.shuffle(&mut rand::thread_rng());
        assert!(list.is_shuffled());
        list.unshuffle();
        assert_eq!(list.tracks(), canonical.as_slice());
    }

    #[test]
    fn strategy_defers_when_current_is_outside_playlist() {
        let catalog = MemoryCatalog::new();
        let mut state = SelectionState::default();
        state.playlist = Some(playlist(&[1, 2]));

        state.current = Some(Track::new(TrackId::new(8), "/music/8.flac"));
        assert!(PlaylistStrategy.resolve_next(&mut state, &catalog).is_none());

        state.current = Some(Track::new(TrackId::new(2), "/music/2.flac"));
        let next = PlaylistStrategy.resolve_next(&mut state, &catalog).unwrap();
        assert_eq!(next.id, TrackId::new(1));
        let prev = PlaylistStrategy.resolve_prev(&mut state, &catalog).unwrap();
        assert_eq!(prev.id, TrackId::new(1));
    }
}
