//! Next disposition tests
//!
//! Stop after the current track, album or artist, and skipping the rest of an
//! album, both at natural track ends and on explicit navigation.

mod common;

use cadenza_core::{AlbumId, ArtistId, NextDisposition, Scope};
use cadenza_playback::sim::MemoryCatalog;
use cadenza_playback::PlaybackState;
use common::*;

// ===== Test Helpers =====

/// A1 = [T1, T2] and A2 = [T3] by artist 1, A3 = [T4] by artist 2
fn artist_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog.add_album(AlbumId::new(1), ArtistId::new(1), None, &[(1, 10), (2, 10)]);
    catalog.add_album(AlbumId::new(2), ArtistId::new(1), None, &[(3, 10)]);
    catalog.add_album(AlbumId::new(3), ArtistId::new(2), None, &[(4, 10)]);
    catalog
}

fn playing_album(catalog: MemoryCatalog, album: i64) -> Harness {
    let h = Harness::new(catalog);
    h.player.play_album(AlbumId::new(album), Some(Scope::All));
    h.settle();
    h
}

// ===== Natural Track Ends =====

#[test]
fn stop_after_track_ends_playback_at_boundary() {
    let h = playing_album(two_album_catalog(), 1);
    h.player.set_next_disposition(NextDisposition::StopAfterTrack);

    h.run_until(secs(60));

    assert_eq!(h.started_ids(), vec![1]);
    assert_eq!(h.state(), PlaybackState::Stopped);
    assert_eq!(h.player.next_disposition(), NextDisposition::Continue);
}

#[test]
fn stop_after_album_finishes_the_album() {
    let h = playing_album(two_album_catalog(), 1);
    h.player.set_next_disposition(NextDisposition::StopAfterAlbum);

    h.run_until(secs(60));

    assert_eq!(h.started_ids(), vec![1, 2]);
    assert_eq!(h.state(), PlaybackState::Stopped);
    assert_eq!(h.player.next_disposition(), NextDisposition::Continue);
}

#[test]
fn stop_after_artist_crosses_albums_of_the_same_artist() {
    let h = playing_album(artist_catalog(), 1);
    h.player.set_next_disposition(NextDisposition::StopAfterArtist);

    h.run_until(secs(100));

    assert_eq!(h.started_ids(), vec![1, 2, 3]);
    assert_eq!(h.state(), PlaybackState::Stopped);
}

#[test]
fn start_new_album_skips_rest_and_resets() {
    let h = playing_album(artist_catalog(), 1);
    h.player.set_next_disposition(NextDisposition::StartNewAlbum);
    assert_eq!(h.next_id(), Some(3));

    h.run_until(secs(15));
    assert_eq!(h.current_id(), Some(3));
    assert_eq!(h.player.next_disposition(), NextDisposition::Continue);

    h.run_until(secs(100));
    assert_eq!(h.started_ids(), vec![1, 3, 4]);
}

// ===== Explicit Navigation =====

#[test]
fn next_with_stop_after_track_stops() {
    let h = playing_album(two_album_catalog(), 1);
    h.player.set_next_disposition(NextDisposition::StopAfterTrack);

    assert!(!h.player.next());
    assert_eq!(h.state(), PlaybackState::Stopped);
    assert_eq!(h.current_id(), Some(1));
    assert_eq!(h.player.next_disposition(), NextDisposition::Continue);
}

#[test]
fn queued_track_is_refused_by_disposition() {
    let h = playing_album(two_album_catalog(), 1);
    h.player.enqueue(h.track(3));
    h.player.set_next_disposition(NextDisposition::StopAfterAlbum);
    assert_eq!(h.next_id(), Some(3));

    assert!(!h.player.next());
    assert_eq!(h.state(), PlaybackState::Stopped);
    assert_eq!(h.current_id(), Some(1));
    assert_eq!(h.player.queue().len(), 1);
}

#[test]
fn refused_track_is_not_prepared() {
    let h = playing_album(two_album_catalog(), 1);
    h.player.enqueue(h.track(3));
    h.player.set_next_disposition(NextDisposition::StopAfterAlbum);

    h.run_until(secs(30));

    assert_eq!(h.started_ids(), vec![1]);
    assert_eq!(h.state(), PlaybackState::Stopped);
    assert_eq!(h.player.queue().len(), 1);
}

#[test]
fn play_after_stop_restarts_current_track() {
    let h = playing_album(two_album_catalog(), 1);
    h.player.set_next_disposition(NextDisposition::StopAfterTrack);
    h.run_until(secs(20));
    assert_eq!(h.state(), PlaybackState::Stopped);

    h.player.play().unwrap();
    h.settle();
    assert_eq!(h.state(), PlaybackState::Playing);
    assert_eq!(h.current_id(), Some(1));
}
