//! Gapless handoff tests
//!
//! Verifies preload timing, the swap at the exact end of the active source and
//! how pause, seek, stop and queue changes move or cancel the handoff.

mod common;

use cadenza_core::{AlbumId, Scope, TrackId};
use cadenza_playback::sim::{PipelineLogEntry, PipelineOp};
use cadenza_playback::{PipelineSlot, PlaybackState, PlayerEvent};
use common::*;
use std::time::Duration;

// ===== Test Helpers =====

fn first_op(entries: &[PipelineLogEntry], op: PipelineOp, uri: &str) -> Option<Duration> {
    entries
        .iter()
        .find(|e| e.op == op && e.uri.as_deref() == Some(uri))
        .map(|e| e.at)
}

fn prepared_ids(events: &[PlayerEvent]) -> Vec<TrackId> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::NextTrackPrepared { track_id } => Some(*track_id),
            _ => None,
        })
        .collect()
}

// ===== Handoff Timing =====

#[test]
fn standby_is_prepared_lead_before_the_end() {
    let h = Harness::new(two_album_catalog());
    h.player.play_album(AlbumId::new(1), Some(Scope::All));

    h.run_until(millis(9_950));

    let entries = h.rig.log().entries();
    let prerolled = first_op(&entries, PipelineOp::Prerolled, "/music/1/2.flac").unwrap();
    assert!(prerolled <= secs(10) - millis(100));
    assert_eq!(prepared_ids(&h.drain_events()), vec![TrackId::new(2)]);
    assert_eq!(h.current_id(), Some(1));
}

#[test]
fn next_track_starts_exactly_at_previous_end() {
    let h = Harness::new(two_album_catalog());
    h.player.play_album(AlbumId::new(1), Some(Scope::All));

    h.run_until(secs(15));

    let entries = h.rig.log().entries();
    let started = entries
        .iter()
        .find(|e| e.slot == PipelineSlot::B && e.op == PipelineOp::Played)
        .unwrap();
    let stopped = entries
        .iter()
        .rev()
        .find(|e| e.slot == PipelineSlot::A && e.op == PipelineOp::Stopped)
        .unwrap();

    assert_eq!(started.at, secs(10));
    assert_eq!(stopped.at, secs(10));
    assert_eq!(h.current_id(), Some(2));
    assert_eq!(h.state(), PlaybackState::Playing);
}

#[test]
fn seek_moves_the_handoff() {
    let h = Harness::new(two_album_catalog());
    h.player.play_album(AlbumId::new(1), Some(Scope::All));
    h.run_until(secs(2));

    h.player.seek(8.0).unwrap();
    assert_eq!(h.player.next_deadline(), Some(secs(4) - millis(100)));

    h.run_until(secs(5));
    let entries = h.rig.log().entries();
    assert_eq!(first_op(&entries, PipelineOp::Played, "/music/1/2.flac"), Some(secs(4)));
    assert_eq!(h.current_id(), Some(2));
}

#[test]
fn seek_is_reported() {
    let h = Harness::new(two_album_catalog());
    h.player.play_album(AlbumId::new(1), Some(Scope::All));
    h.settle();
    h.drain_events();

    h.player.seek(3.5).unwrap();
    assert_eq!(
        h.drain_events(),
        vec![PlayerEvent::Seeked {
            position: millis(3_500)
        }]
    );
    assert_eq!(h.player.position(), Some(millis(3_500)));
}

#[test]
fn pause_holds_the_handoff() {
    let h = Harness::new(two_album_catalog());
    h.player.play_album(AlbumId::new(1), Some(Scope::All));
    h.run_until(secs(5));

    h.player.pause().unwrap();
    h.run_until(secs(50));
    assert_eq!(h.state(), PlaybackState::Paused);
    assert_eq!(h.current_id(), Some(1));

    h.player.play().unwrap();
    assert_eq!(h.player.next_deadline(), Some(secs(55) - millis(100)));
    h.run_until(secs(56));
    assert_eq!(h.current_id(), Some(2));
}

#[test]
fn stop_cancels_the_prepared_track() {
    let h = Harness::new(two_album_catalog());
    h.player.play_album(AlbumId::new(1), Some(Scope::All));
    h.run_until(millis(9_950));

    h.player.stop();
    assert_eq!(h.state(), PlaybackState::Stopped);
    assert_eq!(h.player.next_deadline(), None);
    assert!(h.rig.playing_slot().is_none());

    h.run_until(secs(30));
    assert_eq!(h.current_id(), Some(1));
}

#[test]
fn queue_change_after_preload_replaces_the_standby() {
    let h = Harness::new(two_album_catalog());
    h.player.play_album(AlbumId::new(1), Some(Scope::All));
    h.run_until(millis(9_950));
    h.drain_events();

    h.player.enqueue(h.track(3));
    let events = h.drain_events();
    assert_eq!(prepared_ids(&events), vec![TrackId::new(3)]);

    h.run_until(secs(12));
    assert_eq!(h.current_id(), Some(3));
    assert!(h.player.queue().is_empty());

    let entries = h.rig.log().entries();
    assert_eq!(first_op(&entries, PipelineOp::Played, "/music/2/3.flac"), Some(secs(10)));
}

#[test]
fn radio_streams_have_no_handoff() {
    let h = Harness::new(two_album_catalog());
    assert!(h.player.load_radio("Jazz FM", "http://radio.example/jazz"));
    h.settle();

    assert_eq!(h.state(), PlaybackState::Playing);
    assert_eq!(h.player.next_deadline(), None);
}
