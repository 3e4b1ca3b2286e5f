//! Radio station cycling
//!
//! While a radio stream plays, next/previous move through the saved stations
//! with wrap-around. Stations are matched by name first since a parsed stream
//! URI can differ from the saved one.

use super::SelectionStrategy;
use crate::selection::SelectionState;
use cadenza_core::{Catalog, RadioDirectory, RadioStation, Track};
use std::sync::Arc;

/// Cycles through the radio directory
pub struct RadioStrategy {
    radios: Arc<dyn RadioDirectory>,
}

impl RadioStrategy {
    /// Create a strategy backed by a radio directory
    pub fn new(radios: Arc<dyn RadioDirectory>) -> Self {
        Self { radios }
    }

    fn neighbour(&self, state: &SelectionState, forward: bool) -> Option<Track> {
        let current = state.current.as_ref().filter(|t| t.is_radio())?;

        let stations = match self.radios.stations() {
            Ok(stations) => stations,
            Err(e) => {
                tracing::warn!("Failed to list radio stations: {}", e);
                return None;
            }
        };
        if stations.is_empty() {
            return None;
        }

        let len = stations.len();
        let index = match station_index(&stations, current) {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None if forward => 0,
            None => len - 1,
        };
        let station = &stations[index];
        Some(Track::radio(station.name.clone(), station.uri.clone()))
    }
}

fn station_index(stations: &[RadioStation], current: &Track) -> Option<usize> {
    stations
        .iter()
        .position(|s| s.name == current.artist)
        .or_else(|| stations.iter().position(|s| s.uri == current.uri))
}

impl SelectionStrategy for RadioStrategy {
    fn name(&self) -> &'static str {
        "radio"
    }

    fn resolve_next(&self, state: &mut SelectionState, _catalog: &dyn Catalog) -> Option<Track> {
        self.neighbour(state, true)
    }

    fn resolve_prev(&self, state: &mut SelectionState, _catalog: &dyn Catalog) -> Option<Track> {
        self.neighbour(state, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{MemoryCatalog, MemoryRadios};
    use cadenza_core::TrackId;

    fn strategy() -> RadioStrategy {
        RadioStrategy::new(Arc::new(MemoryRadios::new(vec![
            RadioStation::new("One", "http://one.example/stream"),
            RadioStation::new("Two", "http://two.example/stream"),
            RadioStation::new("Three", "http://three.example/stream"),
        ])))
    }

    fn state_playing(track: Track) -> SelectionState {
        let mut state = SelectionState::default();
        state.current = Some(track);
        state
    }

    #[test]
    fn cycles_with_wrap_around() {
        let catalog = MemoryCatalog::new();
        let mut state = state_playing(Track::radio("Three", "http://three.example/stream"));

        let next = strategy().resolve_next(&mut state, &catalog).unwrap();
        assert_eq!(next.artist, "One");
        assert!(next.is_radio());

        state.current = Some(Track::radio("One", "http://one.example/stream"));
        let prev = strategy().resolve_prev(&mut state, &catalog).unwrap();
        assert_eq!(prev.artist, "Three");
    }

    #[test]
    fn matches_by_uri_when_name_is_unknown() {
        let catalog = MemoryCatalog::new();
        let mut state = state_playing(Track::radio("Renamed", "http://two.example/stream"));
        let next = strategy().resolve_next(&mut state, &catalog).unwrap();
        assert_eq!(next.artist, "Three");
    }

    #[test]
    fn unknown_station_starts_from_the_ends() {
        let catalog = MemoryCatalog::new();
        let mut state = state_playing(Track::radio("Elsewhere", "http://x.example"));
        assert_eq!(strategy().resolve_next(&mut state, &catalog).unwrap().artist, "One");
        assert_eq!(strategy().resolve_prev(&mut state, &catalog).unwrap().artist, "Three");
    }

    #[test]
    fn defers_for_library_tracks_and_empty_directory() {
        let catalog = MemoryCatalog::new();
        let mut state = state_playing(Track::new(TrackId::new(1), "/music/1.flac"));
        assert!(strategy().resolve_next(&mut state, &catalog).is_none());

        let empty = RadioStrategy::new(Arc::new(MemoryRadios::new(Vec::new())));
        let mut state = state_playing(Track::radio("One", "http://one.example/stream"));
        assert!(empty.resolve_next(&mut state, &catalog).is_none());
    }
}
