/// Session integration tests
/// Loads config and manifest from disk and runs the player on virtual time
use cadenza_core::{AlbumId, TrackId};
use cadenza_headless::{HeadlessConfig, ManifestLibrary, Session, Start};
use cadenza_playback::PlaybackState;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const MANIFEST: &str = r#"
[[genres]]
id = 1
name = "Rock"

[[genres]]
id = 2
name = "Jazz"

[[albums]]
id = 1
title = "Loud"
artist_id = 1
genre = 1

[[albums.tracks]]
id = 1
path = "/music/loud/1.flac"
duration = 10

[[albums.tracks]]
id = 2
path = "/music/loud/2.flac"
duration = 10

[[albums]]
id = 2
title = "Smooth"
artist_id = 2
genre = 2

[[albums.tracks]]
id = 3
path = "/music/smooth/1.flac"
duration = 10

[[albums]]
id = 3
title = "Louder"
artist_id = 3
genre = 1

[[albums.tracks]]
id = 4
path = "/music/louder/1.flac"
duration = 10
"#;

/// Helper to write config and manifest into a temp dir and load them
fn load(dir: &Path, player_section: &str) -> (HeadlessConfig, ManifestLibrary) {
    let manifest = dir.join("library.toml");
    std::fs::write(&manifest, MANIFEST).unwrap();

    let config_path = dir.join("config.toml");
    let text = format!(
        "[library]\nmanifest = \"{}\"\n\n[state]\npath = \"{}\"\n\n[player]\n{}\n",
        manifest.display(),
        dir.join("state/state.json").display(),
        player_section
    );
    std::fs::write(&config_path, text).unwrap();

    let config = HeadlessConfig::load(Some(&config_path)).unwrap();
    config.validate().unwrap();
    let library = ManifestLibrary::load(&config.library.manifest).unwrap();
    (config, library)
}

fn ids(report: &cadenza_headless::Report) -> Vec<i64> {
    report.played.iter().map(|p| p.track_id.as_i64()).collect()
}

#[test]
fn party_draws_only_from_configured_genre() {
    let dir = TempDir::new().unwrap();
    let (config, library) = load(dir.path(), "party_scopes = [\"genre:1\"]");
    let session = Session::new(&config, library).unwrap();

    assert!(session.start(&Start::Party).unwrap());
    let report = session.run(Duration::from_secs(95), Duration::from_secs(1));

    let played = ids(&report);
    assert!(played.len() >= 3, "played {played:?}");
    assert!(played.iter().all(|id| [1, 2, 4].contains(id)), "played {played:?}");
    let first_epoch: HashSet<i64> = played[..3].iter().copied().collect();
    assert_eq!(first_epoch, HashSet::from([1, 2, 4]));
    assert!(session.player().is_party());
}

#[test]
fn album_then_resume_continues_from_saved_track() {
    let dir = TempDir::new().unwrap();
    let (config, library) = load(dir.path(), "gapless_lead_ms = 250");

    let first = Session::new(&config, library.clone()).unwrap();
    first
        .start(&Start::Album {
            album: AlbumId::new(1),
            scope: Some(cadenza_core::Scope::All),
        })
        .unwrap();
    let report = first.run(Duration::from_secs(15), Duration::from_secs(1));
    assert_eq!(ids(&report), vec![1, 2]);
    first.save().unwrap();
    assert!(dir.path().join("state/state.json").exists());

    let second = Session::new(&config, library).unwrap();
    assert!(second.start(&Start::Restore).unwrap());
    let report = second.run(Duration::from_secs(30), Duration::from_secs(1));

    // Restored into the whole library: album 2 and 3 follow
    assert_eq!(ids(&report), vec![2, 3, 4]);
    assert_eq!(report.final_state, PlaybackState::Stopped);
    assert_eq!(
        second.player().persisted_state().last_track_id,
        Some(TrackId::new(4))
    );
}
