//! Library manifest
//!
//! A TOML file standing in for the library database: albums with their
//! tracks, genres, user playlists and radio stations. Track paths are only
//! checked on disk when `check_files` is set; otherwise tracks flagged
//! `missing` are reported absent.
//!
//! ```toml
//! check_files = false
//!
//! [[genres]]
//! id = 1
//! name = "Rock"
//!
//! [[albums]]
//! id = 1
//! title = "First"
//! artist_id = 1
//! artist = "Band"
//! genre = 1
//! plays = 12
//! added = "2024-03-01"
//!
//! [[albums.tracks]]
//! id = 1
//! title = "Opening"
//! path = "/music/band/first/01.flac"
//! duration = 215
//!
//! [[playlists]]
//! id = 1
//! name = "Favourites"
//! tracks = [1]
//!
//! [[radios]]
//! name = "FIP"
//! uri = "http://icecast.radiofrance.fr/fip-hifi.aac"
//! ```

use crate::error::{HeadlessError, Result};
use cadenza_core::{
    AlbumId, ArtistId, Catalog, CoreError, GenreId, PlaylistId, PlaylistStore, RadioDirectory,
    RadioStation, Scope, Track, TrackId,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

// ===== Manifest Format =====

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Manifest {
    check_files: bool,
    genres: Vec<GenreEntry>,
    albums: Vec<AlbumManifest>,
    playlists: Vec<PlaylistEntry>,
    radios: Vec<RadioStation>,
}

#[derive(Debug, Deserialize)]
struct GenreEntry {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumManifest {
    id: i64,
    #[serde(default)]
    title: String,
    artist_id: i64,
    #[serde(default)]
    artist: String,
    genre: Option<i64>,
    #[serde(default)]
    compilation: bool,
    #[serde(default)]
    plays: u64,
    added: Option<NaiveDate>,
    #[serde(default)]
    tracks: Vec<TrackManifest>,
}

#[derive(Debug, Deserialize)]
struct TrackManifest {
    id: i64,
    #[serde(default)]
    title: String,
    path: String,
    /// Seconds
    duration: Option<u64>,
    /// Overrides the album genre (compilations)
    genre: Option<i64>,
    #[serde(default)]
    missing: bool,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    tracks: Vec<i64>,
}

// ===== Library =====

#[derive(Debug, Clone)]
struct AlbumEntry {
    id: AlbumId,
    title: String,
    artist: ArtistId,
    genre: Option<GenreId>,
    compilation: bool,
    plays: u64,
    added: Option<NaiveDate>,
    tracks: Vec<TrackId>,
}

#[derive(Debug, Clone)]
struct TrackEntry {
    track: Track,
    genre: Option<GenreId>,
}

/// Playlist summary for listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub id: PlaylistId,
    pub name: String,
    pub len: usize,
}

/// Catalog, playlist store and radio directory backed by a manifest
#[derive(Debug, Clone, Default)]
pub struct ManifestLibrary {
    albums: Vec<AlbumEntry>,
    tracks: HashMap<TrackId, TrackEntry>,
    genres: Vec<(GenreId, String)>,
    playlists: Vec<(PlaylistInfo, Vec<TrackId>)>,
    radios: Vec<RadioStation>,
    missing: HashSet<TrackId>,
    check_files: bool,
}

impl ManifestLibrary {
    /// Read and validate a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HeadlessError::Manifest(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let library = Self::from_toml(&text)?;
        tracing::info!(
            path = %path.display(),
            albums = library.albums.len(),
            tracks = library.tracks.len(),
            "Library manifest loaded"
        );
        Ok(library)
    }

    /// Parse and validate manifest text
    pub fn from_toml(text: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text)?;
        Self::from_manifest(manifest)
    }

    fn from_manifest(manifest: Manifest) -> Result<Self> {
        let genres: Vec<(GenreId, String)> = manifest
            .genres
            .into_iter()
            .map(|g| (GenreId::new(g.id), g.name))
            .collect();
        let genre_name = |id: Option<GenreId>| -> Result<String> {
            match id {
                None => Ok(String::new()),
                Some(id) => genres
                    .iter()
                    .find(|(g, _)| *g == id)
                    .map(|(_, name)| name.clone())
                    .ok_or_else(|| HeadlessError::unknown("genre", id)),
            }
        };

        let mut library = Self {
            check_files: manifest.check_files,
            radios: manifest.radios,
            ..Default::default()
        };

        for album in manifest.albums {
            let album_id = AlbumId::new(album.id);
            if library.albums.iter().any(|a| a.id == album_id) {
                return Err(HeadlessError::Manifest(format!("Duplicate album id {album_id}")));
            }
            let album_genre = album.genre.map(GenreId::new);

            let mut track_ids = Vec::with_capacity(album.tracks.len());
            for entry in album.tracks {
                let id = TrackId::new(entry.id);
                if !id.is_library() {
                    return Err(HeadlessError::Manifest(format!("Invalid track id {id}")));
                }
                if library.tracks.contains_key(&id) {
                    return Err(HeadlessError::Manifest(format!("Duplicate track id {id}")));
                }

                let genre = entry.genre.map(GenreId::new).or(album_genre);
                let mut track = Track::new(id, entry.path)
                    .with_album(album_id, ArtistId::new(album.artist_id))
                    .with_title(entry.title)
                    .with_names(album.artist.clone(), album.title.clone(), genre_name(genre)?);
                if let Some(secs) = entry.duration {
                    track = track.with_duration(Duration::from_secs(secs));
                }

                if entry.missing {
                    library.missing.insert(id);
                }
                library.tracks.insert(id, TrackEntry { track, genre });
                track_ids.push(id);
            }

            library.albums.push(AlbumEntry {
                id: album_id,
                title: album.title,
                artist: ArtistId::new(album.artist_id),
                genre: album_genre,
                compilation: album.compilation,
                plays: album.plays,
                added: album.added,
                tracks: track_ids,
            });
        }

        for playlist in manifest.playlists {
            let tracks: Vec<TrackId> = playlist.tracks.into_iter().map(TrackId::new).collect();
            if let Some(unknown) = tracks.iter().find(|id| !library.tracks.contains_key(id)) {
                return Err(HeadlessError::Manifest(format!(
                    "Playlist {} references unknown track {}",
                    playlist.id, unknown
                )));
            }
            let info = PlaylistInfo {
                id: PlaylistId::new(playlist.id),
                name: playlist.name,
                len: tracks.len(),
            };
            library.playlists.push((info, tracks));
        }

        library.genres = genres;
        Ok(library)
    }

    /// Albums as (id, title) in manifest order
    pub fn albums(&self) -> Vec<(AlbumId, String)> {
        self.albums.iter().map(|a| (a.id, a.title.clone())).collect()
    }

    /// Every track, album by album
    pub fn tracks(&self) -> Vec<Track> {
        self.albums
            .iter()
            .flat_map(|a| a.tracks.iter())
            .filter_map(|id| self.tracks.get(id))
            .map(|entry| entry.track.clone())
            .collect()
    }

    /// Number of tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Playlists in manifest order
    pub fn playlists(&self) -> Vec<PlaylistInfo> {
        self.playlists.iter().map(|(info, _)| info.clone()).collect()
    }

    /// Station by display name, case-insensitive
    pub fn station(&self, name: &str) -> Option<&RadioStation> {
        self.radios.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Tracks that are flagged missing or absent on disk
    pub fn missing_tracks(&self) -> Vec<TrackId> {
        let mut missing: Vec<TrackId> = self
            .tracks
            .values()
            .filter(|entry| !self.path_exists(&entry.track))
            .map(|entry| entry.track.id)
            .collect();
        missing.sort();
        missing
    }

    fn album(&self, id: AlbumId) -> Option<&AlbumEntry> {
        self.albums.iter().find(|a| a.id == id)
    }

    fn contains_genre(&self, album: &AlbumEntry, genre: GenreId) -> bool {
        album
            .tracks
            .iter()
            .any(|id| self.tracks.get(id).is_some_and(|t| t.genre == Some(genre)))
    }

    fn ids<'a>(albums: impl Iterator<Item = &'a AlbumEntry>) -> Vec<AlbumId> {
        albums.map(|a| a.id).collect()
    }
}

impl Catalog for ManifestLibrary {
    fn track(&self, id: TrackId) -> cadenza_core::Result<Option<Track>> {
        Ok(self.tracks.get(&id).map(|entry| entry.track.clone()))
    }

    fn tracks_for_album(
        &self,
        album: AlbumId,
        genre: Option<GenreId>,
    ) -> cadenza_core::Result<Vec<Track>> {
        let Some(album) = self.album(album) else {
            return Ok(Vec::new());
        };
        let filter = genre.filter(|_| album.compilation);
        Ok(album
            .tracks
            .iter()
            .filter_map(|id| self.tracks.get(id))
            .filter(|entry| filter.is_none() || entry.genre == filter)
            .map(|entry| entry.track.clone())
            .collect())
    }

    fn albums_for_scope(&self, scope: &Scope) -> cadenza_core::Result<Vec<AlbumId>> {
        let compilations = self.albums.iter().filter(|a| a.compilation);
        let regular = self.albums.iter().filter(|a| !a.compilation);

        Ok(match scope {
            Scope::All | Scope::Random => {
                let mut albums = Self::ids(compilations);
                albums.extend(Self::ids(regular));
                albums
            }
            Scope::Compilations => Self::ids(compilations),
            Scope::Genre(genre) => {
                let mut albums =
                    Self::ids(compilations.filter(|a| self.contains_genre(a, *genre)));
                albums.extend(Self::ids(regular.filter(|a| a.genre == Some(*genre))));
                albums
            }
            Scope::Artist(artist) => Self::ids(regular.filter(|a| a.artist == *artist)),
            Scope::Popular => {
                let mut albums: Vec<&AlbumEntry> =
                    self.albums.iter().filter(|a| a.plays > 0).collect();
                albums.sort_by(|a, b| b.plays.cmp(&a.plays));
                Self::ids(albums.into_iter())
            }
            Scope::Recent => {
                let mut albums: Vec<&AlbumEntry> =
                    self.albums.iter().filter(|a| a.added.is_some()).collect();
                albums.sort_by(|a, b| b.added.cmp(&a.added));
                Self::ids(albums.into_iter())
            }
        })
    }

    fn album_of(&self, track: TrackId) -> cadenza_core::Result<Option<AlbumId>> {
        Ok(self.tracks.get(&track).map(|entry| entry.track.album_id))
    }

    fn album_artist_of(&self, track: TrackId) -> cadenza_core::Result<Option<ArtistId>> {
        Ok(self.tracks.get(&track).map(|entry| entry.track.album_artist_id))
    }

    fn path_exists(&self, track: &Track) -> bool {
        if track.is_radio() {
            return true;
        }
        if self.check_files {
            return track.path().is_some_and(Path::exists);
        }
        !self.missing.contains(&track.id)
    }

    fn genre_ids(&self) -> cadenza_core::Result<Vec<GenreId>> {
        Ok(self.genres.iter().map(|(id, _)| *id).collect())
    }
}

impl PlaylistStore for ManifestLibrary {
    fn track_ids(&self, playlist: PlaylistId) -> cadenza_core::Result<Vec<TrackId>> {
        self.playlists
            .iter()
            .find(|(info, _)| info.id == playlist)
            .map(|(_, tracks)| tracks.clone())
            .ok_or(CoreError::PlaylistNotFound(playlist))
    }
}

impl RadioDirectory for ManifestLibrary {
    fn stations(&self) -> cadenza_core::Result<Vec<RadioStation>> {
        Ok(self.radios.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[[genres]]
id = 1
name = "Rock"

[[genres]]
id = 2
name = "Jazz"

[[albums]]
id = 10
title = "Hits"
artist_id = 99
artist = "Various"
compilation = true
added = "2024-05-01"

[[albums.tracks]]
id = 100
path = "/music/hits/1.flac"
duration = 180
genre = 1

[[albums.tracks]]
id = 101
path = "/music/hits/2.flac"
duration = 200
genre = 2

[[albums]]
id = 20
title = "Loud"
artist_id = 1
artist = "Band"
genre = 1
plays = 5

[[albums.tracks]]
id = 200
title = "Opener"
path = "/music/band/loud/1.flac"
duration = 240

[[albums.tracks]]
id = 201
path = "/music/band/loud/2.flac"
duration = 260
missing = true

[[albums]]
id = 30
title = "Smooth"
artist_id = 2
genre = 2
plays = 9
added = "2023-01-10"

[[albums.tracks]]
id = 300
path = "/music/smooth/1.flac"

[[playlists]]
id = 1
name = "Mix"
tracks = [300, 100]

[[radios]]
name = "FIP"
uri = "http://icecast.radiofrance.fr/fip-hifi.aac"
"#;

    fn library() -> ManifestLibrary {
        ManifestLibrary::from_toml(MANIFEST).unwrap()
    }

    fn ids(raw: &[i64]) -> Vec<AlbumId> {
        raw.iter().copied().map(AlbumId::new).collect()
    }

    #[test]
    fn tracks_carry_album_metadata() {
        let track = library().track(TrackId::new(200)).unwrap().unwrap();
        assert_eq!(track.album_id, AlbumId::new(20));
        assert_eq!(track.album_artist_id, ArtistId::new(1));
        assert_eq!(track.duration, Some(Duration::from_secs(240)));
        assert_eq!(track.title, "Opener");
        assert_eq!(track.album, "Loud");
        assert_eq!(track.genre, "Rock");
    }

    #[test]
    fn all_lists_compilations_first() {
        let library = library();
        assert_eq!(library.albums_for_scope(&Scope::All).unwrap(), ids(&[10, 20, 30]));
        assert_eq!(library.albums_for_scope(&Scope::Compilations).unwrap(), ids(&[10]));
    }

    #[test]
    fn genre_scope_includes_matching_compilations() {
        let library = library();
        let jazz = GenreId::new(2);
        assert_eq!(library.albums_for_scope(&Scope::Genre(jazz)).unwrap(), ids(&[10, 30]));

        let tracks = library.tracks_for_album(AlbumId::new(10), Some(jazz)).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, TrackId::new(101));

        // Regular albums ignore the filter
        let loud = library.tracks_for_album(AlbumId::new(20), Some(jazz)).unwrap();
        assert_eq!(loud.len(), 2);
    }

    #[test]
    fn popular_and_recent_are_ranked() {
        let library = library();
        assert_eq!(library.albums_for_scope(&Scope::Popular).unwrap(), ids(&[30, 20]));
        assert_eq!(library.albums_for_scope(&Scope::Recent).unwrap(), ids(&[10, 30]));
    }

    #[test]
    fn artist_scope_skips_compilations() {
        let library = library();
        let albums = library.albums_for_scope(&Scope::Artist(ArtistId::new(1))).unwrap();
        assert_eq!(albums, ids(&[20]));
    }

    #[test]
    fn missing_flag_is_reported() {
        let library = library();
        assert_eq!(library.missing_tracks(), vec![TrackId::new(201)]);
        let radio = Track::radio("FIP", "http://example.com/stream");
        assert!(library.path_exists(&radio));
    }

    #[test]
    fn check_files_uses_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.flac");
        std::fs::write(&present, b"").unwrap();
        let manifest = format!(
            r#"
check_files = true

[[albums]]
id = 1
artist_id = 1

[[albums.tracks]]
id = 1
path = "{}"

[[albums.tracks]]
id = 2
path = "{}"
"#,
            present.display(),
            dir.path().join("absent.flac").display()
        );

        let library = ManifestLibrary::from_toml(&manifest).unwrap();
        assert_eq!(library.missing_tracks(), vec![TrackId::new(2)]);
    }

    #[test]
    fn playlists_and_radios() {
        let library = library();
        assert_eq!(
            library.track_ids(PlaylistId::new(1)).unwrap(),
            vec![TrackId::new(300), TrackId::new(100)]
        );
        assert!(matches!(
            library.track_ids(PlaylistId::new(2)),
            Err(CoreError::PlaylistNotFound(_))
        ));
        assert_eq!(library.station("fip").unwrap().uri, "http://icecast.radiofrance.fr/fip-hifi.aac");
        assert_eq!(library.stations().unwrap().len(), 1);
    }

    #[test]
    fn invalid_manifests_are_rejected() {
        let duplicate = r#"
[[albums]]
id = 1
artist_id = 1
[[albums.tracks]]
id = 5
path = "/a.flac"
[[albums.tracks]]
id = 5
path = "/b.flac"
"#;
        assert!(matches!(
            ManifestLibrary::from_toml(duplicate),
            Err(HeadlessError::Manifest(_))
        ));

        let unknown_genre = r#"
[[albums]]
id = 1
artist_id = 1
genre = 7
[[albums.tracks]]
id = 1
path = "/a.flac"
"#;
        assert!(matches!(
            ManifestLibrary::from_toml(unknown_genre),
            Err(HeadlessError::Unknown { entity: "genre", .. })
        ));

        let dangling = r#"
[[playlists]]
id = 1
tracks = [4]
"#;
        assert!(ManifestLibrary::from_toml(dangling).is_err());
        assert!(matches!(
            ManifestLibrary::from_toml("albums = 3"),
            Err(HeadlessError::Toml(_))
        ));
    }
}
