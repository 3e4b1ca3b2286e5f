//! Track shuffle and party selection
//!
//! Random draws never repeat a track within an epoch. An epoch ends when every
//! album of the universe has been exhausted; the exhausted albums then become
//! the universe again and bookkeeping starts over.
//!
//! Navigation goes through the history ledger first, so previous/next after a
//! step back replay the same tracks instead of drawing new ones.

use super::SelectionStrategy;
use crate::selection::SelectionState;
use cadenza_core::{AlbumId, Catalog, Track, TrackId};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Tracks played in the current epoch, per album
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayedBookkeeping {
    tracks: HashMap<AlbumId, HashSet<TrackId>>,
    exhausted: Vec<AlbumId>,
}

impl PlayedBookkeeping {
    /// Mark a track as played
    pub fn record(&mut self, album: AlbumId, track: TrackId) {
        self.tracks.entry(album).or_default().insert(track);
    }

    /// Check if a track was played this epoch
    pub fn is_played(&self, album: AlbumId, track: TrackId) -> bool {
        self.tracks.get(&album).is_some_and(|played| played.contains(&track))
    }

    /// Move an album to the exhausted set
    ///
    /// Albums without any played track are not tracked as exhausted; they had
    /// nothing to offer and are dropped for good.
    pub fn exhaust(&mut self, album: AlbumId) -> bool {
        if self.tracks.remove(&album).is_some() {
            if !self.exhausted.contains(&album) {
                self.exhausted.push(album);
            }
            true
        } else {
            false
        }
    }

    /// Albums exhausted this epoch, in exhaustion order
    pub fn exhausted(&self) -> &[AlbumId] {
        &self.exhausted
    }

    /// Take the exhausted albums, leaving the set empty
    pub fn take_exhausted(&mut self) -> Vec<AlbumId> {
        std::mem::take(&mut self.exhausted)
    }

    /// Number of played tracks still tracked
    pub fn played_count(&self) -> usize {
        self.tracks.values().map(HashSet::len).sum()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.exhausted.clear();
    }
}

/// Random selection for track shuffle and party mode
#[derive(Debug, Clone, Copy, Default)]
pub struct ShuffleStrategy;

impl ShuffleStrategy {
    /// Draw an unplayed track, starting a new epoch once if the universe is
    /// exhausted
    pub fn next_random<R: Rng + ?Sized>(
        state: &mut SelectionState,
        catalog: &dyn Catalog,
        rng: &mut R,
    ) -> Option<Track> {
        if let Some(track) = Self::draw(state, catalog, rng) {
            return Some(track);
        }

        let exhausted = state.played.take_exhausted();
        if exhausted.is_empty() {
            return None;
        }

        tracing::debug!(albums = exhausted.len(), "Shuffle epoch exhausted, starting over");
        state.albums.set(exhausted);
        state.played.clear();
        Self::draw(state, catalog, rng)
    }

    /// One pass over the universe in random order
    ///
    /// Albums found without an unplayed track are removed from the album list.
    pub fn draw<R: Rng + ?Sized>(
        state: &mut SelectionState,
        catalog: &dyn Catalog,
        rng: &mut R,
    ) -> Option<Track> {
        let genre = state.context.genre_filter();
        let mut order = state.albums.ids().to_vec();
        order.shuffle(rng);

        for album in order {
            let mut tracks = match catalog.tracks_for_album(album, genre) {
                Ok(tracks) => tracks,
                Err(e) => {
                    tracing::warn!(album = %album, "Skipping album during shuffle: {}", e);
                    continue;
                }
            };
            tracks.shuffle(rng);

            if let Some(track) = tracks
                .into_iter()
                .find(|t| !state.played.is_played(album, t.id))
            {
                return Some(track);
            }

            state.played.exhaust(album);
            state.albums.remove(album);
        }
        None
    }

    fn from_ledger(id: TrackId, catalog: &dyn Catalog) -> Option<Track> {
        match catalog.track(id) {
            Ok(track) => track,
            Err(e) => {
                tracing::warn!(track = %id, "History entry lookup failed: {}", e);
                None
            }
        }
    }
}

impl SelectionStrategy for ShuffleStrategy {
    fn name(&self) -> &'static str {
        "shuffle"
    }

    fn resolve_next(&self, state: &mut SelectionState, catalog: &dyn Catalog) -> Option<Track> {
        if !state.tracks_history() {
            return None;
        }

        if let Some(track) = state
            .history
            .peek_forward()
            .and_then(|id| Self::from_ledger(id, catalog))
        {
            return Some(track);
        }

        if state.albums.is_empty() {
            return None;
        }
        Self::next_random(state, catalog, &mut rand::thread_rng())
    }

    fn resolve_prev(&self, state: &mut SelectionState, catalog: &dyn Catalog) -> Option<Track> {
        if !state.tracks_history() {
            return None;
        }

        state
            .history
            .peek_backward()
            .and_then(|id| Self::from_ledger(id, catalog))
            .or_else(|| state.current.clone())
    }
}
