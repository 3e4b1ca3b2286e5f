//! Session persistence tests
//!
//! Saving captures the current track and modes; restoring reloads the track
//! inside the whole-library universe or hands over to party mode.

mod common;

use cadenza_core::{AlbumId, GenreId, PersistedState, Scope, ShuffleMode, TrackId};
use cadenza_playback::sim::{MemoryCatalog, MemorySettings};
use cadenza_playback::PlaybackState;
use common::*;
use std::sync::Arc;

// ===== Test Helpers =====

fn with_settings(catalog: MemoryCatalog, state: PersistedState) -> (Harness, Arc<MemorySettings>) {
    let settings = Arc::new(MemorySettings::new(state));
    let store = settings.clone();
    let h = Harness::build(catalog, test_config(), move |builder| builder.settings(store));
    (h, settings)
}

// ===== Saving =====

#[test]
fn save_captures_track_and_modes() {
    let (h, settings) = with_settings(two_album_catalog(), PersistedState::default());
    h.player.play_album(AlbumId::new(1), Some(Scope::All));
    h.settle();
    h.player.set_shuffle(ShuffleMode::Tracks);
    h.settle();

    h.player.save_state().unwrap();

    let saved = settings.state();
    assert!(saved.save_state);
    assert_eq!(saved.last_track_id, Some(TrackId::new(1)));
    assert_eq!(saved.shuffle, ShuffleMode::Tracks);
    assert!(!saved.party);
}

#[test]
fn radio_is_not_saved_as_last_track() {
    let (h, settings) = with_settings(two_album_catalog(), PersistedState::default());
    h.player.load_radio("Talk", "http://radio.example/talk");
    h.settle();

    h.player.save_state().unwrap();

    assert_eq!(settings.state().last_track_id, None);
}

#[test]
fn save_without_backend_is_a_no_op() {
    let h = Harness::new(two_album_catalog());
    h.player.play_album(AlbumId::new(1), None);
    assert!(h.player.save_state().is_ok());
    assert!(!h.player.restore_state().unwrap());
}

// ===== Restoring =====

#[test]
fn restore_loads_last_track_in_library_universe() {
    let state = PersistedState {
        last_track_id: Some(TrackId::new(2)),
        ..Default::default()
    };
    let (h, _settings) = with_settings(two_album_catalog(), state);

    assert!(h.player.restore_state().unwrap());
    h.settle();

    assert_eq!(h.current_id(), Some(2));
    assert_eq!(h.state(), PlaybackState::Playing);
    assert_eq!(h.player.album_list(), vec![AlbumId::new(1), AlbumId::new(2)]);
    assert_eq!(h.player.context().scope, Some(Scope::All));
    assert_eq!(h.next_id(), Some(3));
}

#[test]
fn restore_applies_shuffle_mode() {
    let state = PersistedState {
        last_track_id: Some(TrackId::new(1)),
        shuffle: ShuffleMode::Tracks,
        ..Default::default()
    };
    let (h, _settings) = with_settings(two_album_catalog(), state);

    assert!(h.player.restore_state().unwrap());
    h.settle();

    assert_eq!(h.player.shuffle(), ShuffleMode::Tracks);
    assert_eq!(h.player.history(), vec![TrackId::new(1)]);
}

#[test]
fn restore_disabled_leaves_player_idle() {
    let state = PersistedState {
        save_state: false,
        last_track_id: Some(TrackId::new(2)),
        ..Default::default()
    };
    let (h, _settings) = with_settings(two_album_catalog(), state);

    assert!(!h.player.restore_state().unwrap());
    assert_eq!(h.current_id(), None);
    assert_eq!(h.state(), PlaybackState::Stopped);
}

#[test]
fn restore_skips_tracks_gone_from_catalog() {
    let state = PersistedState {
        last_track_id: Some(TrackId::new(99)),
        ..Default::default()
    };
    let (h, _settings) = with_settings(two_album_catalog(), state);

    assert!(!h.player.restore_state().unwrap());
    assert_eq!(h.current_id(), None);
}

#[test]
fn restore_party_draws_from_saved_buckets() {
    let state = PersistedState {
        party: true,
        party_scopes: vec![Scope::Genre(GenreId::new(5))],
        ..Default::default()
    };
    let (h, _settings) = with_settings(genre_catalog(), state);

    assert!(h.player.restore_state().unwrap());
    h.settle();

    assert!(h.player.is_party());
    let mut albums = h.player.album_list();
    albums.sort();
    assert_eq!(albums, vec![AlbumId::new(1), AlbumId::new(3)]);
    assert!(matches!(h.current_id(), Some(10 | 11 | 30 | 31)));
}
