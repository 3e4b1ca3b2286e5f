//! Album-order traversal
//!
//! Walks the album list in order: rest of the current album, then the first
//! track of the following album. There is no wrap-around at either end of the
//! list. The context disposition can end traversal at a track, album or
//! artist boundary, or skip the rest of the current album.

use super::SelectionStrategy;
use crate::selection::SelectionState;
use cadenza_core::{AlbumId, Catalog, GenreId, NextDisposition, Track};

/// Fallback strategy: album order
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearStrategy;

impl LinearStrategy {
    fn album_tracks(
        catalog: &dyn Catalog,
        album: AlbumId,
        genre: Option<GenreId>,
    ) -> Option<Vec<Track>> {
        match catalog.tracks_for_album(album, genre) {
            Ok(tracks) => Some(tracks),
            Err(e) => {
                tracing::warn!(album = %album, "Failed to list album tracks: {}", e);
                None
            }
        }
    }

    /// First (forward) or last (backward) track of the nearest non-empty album
    /// next to `album` in the album list
    fn neighbour_album_track(
        state: &SelectionState,
        catalog: &dyn Catalog,
        album: AlbumId,
        genre: Option<GenreId>,
        forward: bool,
    ) -> Option<(Track, usize)> {
        let Some(index) = state.albums.position(album) else {
            tracing::warn!(album = %album, "Current album is not in the album list, stopping");
            return None;
        };

        let ids = state.albums.ids();
        let candidates: Vec<AlbumId> = if forward {
            ids[index + 1..].to_vec()
        } else {
            ids[..index].iter().rev().copied().collect()
        };

        for candidate in candidates {
            let Some(mut tracks) = Self::album_tracks(catalog, candidate, genre) else {
                continue;
            };
            if tracks.is_empty() {
                continue;
            }
            return if forward {
                Some((tracks.swap_remove(0), 0))
            } else {
                let last = tracks.len() - 1;
                tracks.pop().map(|t| (t, last))
            };
        }
        None
    }
}

impl SelectionStrategy for LinearStrategy {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn resolve_next(&self, state: &mut SelectionState, catalog: &dyn Catalog) -> Option<Track> {
        let current = state.current.clone().filter(|t| t.id.is_library())?;
        let disposition = state.context.next;
        if disposition == NextDisposition::StopAfterTrack {
            return None;
        }

        let genre = state.context.genre_filter();
        let tracks = Self::album_tracks(catalog, current.album_id, genre)?;
        let position = tracks.iter().position(|t| t.id == current.id)?;

        let (candidate, candidate_position) = if disposition != NextDisposition::StartNewAlbum
            && position + 1 < tracks.len()
        {
            (tracks[position + 1].clone(), position + 1)
        } else {
            Self::neighbour_album_track(state, catalog, current.album_id, genre, true)?
        };

        let crosses = match disposition {
            NextDisposition::StopAfterAlbum => candidate.album_id != current.album_id,
            NextDisposition::StopAfterArtist => {
                candidate.album_artist_id != current.album_artist_id
            }
            _ => false,
        };
        if crosses {
            return None;
        }

        state.context.next_position = Some(candidate_position);
        Some(candidate)
    }

    fn resolve_prev(&self, state: &mut SelectionState, catalog: &dyn Catalog) -> Option<Track> {
        let current = state.current.clone().filter(|t| t.id.is_library())?;
        let genre = state.context.genre_filter();
        let tracks = Self::album_tracks(catalog, current.album_id, genre)?;
        let position = tracks.iter().position(|t| t.id == current.id)?;

        let (candidate, candidate_position) = if position > 0 {
            (tracks[position - 1].clone(), position - 1)
        } else {
            Self::neighbour_album_track(state, catalog, current.album_id, genre, false)?
        };

        state.context.prev_position = Some(candidate_position);
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemoryCatalog;
    use cadenza_core::{ArtistId, TrackId};

    fn catalog() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        catalog.add_album(AlbumId::new(1), ArtistId::new(1), None, &[(1, 60), (2, 60)]);
        catalog.add_album(AlbumId::new(2), ArtistId::new(1), None, &[(3, 60)]);
        catalog.add_album(AlbumId::new(3), ArtistId::new(2), None, &[(4, 60)]);
        catalog
    }

    fn state_at(catalog: &MemoryCatalog, id: i64) -> SelectionState {
        let mut state = SelectionState::default();
        state.albums.set(catalog.album_ids());
        state.current = Some(catalog.track_by_id(id));
        state
    }

    fn next_id(state: &mut SelectionState, catalog: &MemoryCatalog) -> Option<i64> {
        LinearStrategy
            .resolve_next(state, catalog)
            .map(|t| t.id.as_i64())
    }

    fn prev_id(state: &mut SelectionState, catalog: &MemoryCatalog) -> Option<i64> {
        LinearStrategy
            .resolve_prev(state, catalog)
            .map(|t| t.id.as_i64())
    }

    #[test]
    fn walks_albums_in_order() {
        let catalog = catalog();
        assert_eq!(next_id(&mut state_at(&catalog, 1), &catalog), Some(2));
        assert_eq!(next_id(&mut state_at(&catalog, 2), &catalog), Some(3));
        assert_eq!(next_id(&mut state_at(&catalog, 3), &catalog), Some(4));
        assert_eq!(prev_id(&mut state_at(&catalog, 3), &catalog), Some(2));
        assert_eq!(prev_id(&mut state_at(&catalog, 2), &catalog), Some(1));
    }

    #[test]
    fn no_wrap_at_either_end() {
        let catalog = catalog();
        assert_eq!(next_id(&mut state_at(&catalog, 4), &catalog), None);
        assert_eq!(prev_id(&mut state_at(&catalog, 1), &catalog), None);
    }

    #[test]
    fn records_resolved_positions() {
        let catalog = catalog();
        let mut state = state_at(&catalog, 2);
        next_id(&mut state, &catalog);
        prev_id(&mut state, &catalog);
        assert_eq!(state.context.next_position, Some(0));
        assert_eq!(state.context.prev_position, Some(0));
    }

    #[test]
    fn album_outside_list_stops() {
        let catalog = catalog();
        let mut state = state_at(&catalog, 2);
        state.albums.remove(AlbumId::new(1));
        assert_eq!(next_id(&mut state, &catalog), None);

        // Still inside the album: no album lookup needed
        let mut state = state_at(&catalog, 1);
        state.albums.remove(AlbumId::new(1));
        assert_eq!(next_id(&mut state, &catalog), Some(2));
    }

    #[test]
    fn dispositions_end_traversal_at_boundaries() {
        let catalog = catalog();

        let mut state = state_at(&catalog, 1);
        state.context.next = NextDisposition::StopAfterTrack;
        assert_eq!(next_id(&mut state, &catalog), None);

        let mut state = state_at(&catalog, 1);
        state.context.next = NextDisposition::StopAfterAlbum;
        assert_eq!(next_id(&mut state, &catalog), Some(2));
        let mut state = state_at(&catalog, 2);
        state.context.next = NextDisposition::StopAfterAlbum;
        assert_eq!(next_id(&mut state, &catalog), None);

        let mut state = state_at(&catalog, 2);
        state.context.next = NextDisposition::StopAfterArtist;
        assert_eq!(next_id(&mut state, &catalog), Some(3));
        let mut state = state_at(&catalog, 3);
        state.context.next = NextDisposition::StopAfterArtist;
        assert_eq!(next_id(&mut state, &catalog), None);
    }

    #[test]
    fn start_new_album_skips_rest_of_album() {
        let catalog = catalog();
        let mut state = state_at(&catalog, 1);
        state.context.next = NextDisposition::StartNewAlbum;
        assert_eq!(next_id(&mut state, &catalog), Some(3));
    }

    #[test]
    fn skips_empty_albums() {
        let catalog = catalog();
        catalog.add_album(AlbumId::new(9), ArtistId::new(1), None, &[]);
        let mut state = state_at(&catalog, 2);
        state.albums.set(vec![AlbumId::new(1), AlbumId::new(9), AlbumId::new(3)]);
        assert_eq!(next_id(&mut state, &catalog), Some(4));
    }

    #[test]
    fn radio_and_external_tracks_defer() {
        let catalog = catalog();
        let mut state = state_at(&catalog, 1);
        state.current = Some(Track::new(TrackId::EXTERNAL, "/tmp/x.ogg"));
        assert_eq!(next_id(&mut state, &catalog), None);
    }
}
