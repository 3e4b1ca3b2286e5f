//! Selection state shared by the strategies
//!
//! Everything the strategies read and the player mutates lives in one value so
//! it can be snapshotted, resolved against the catalog without holding the
//! player lock, and committed back if nothing changed in the meantime.

use crate::context::{AlbumList, PlaybackContext};
use crate::history::HistoryLedger;
use crate::strategy::playlist::UserPlaylist;
use crate::strategy::queue::ExplicitQueue;
use crate::strategy::shuffle::PlayedBookkeeping;
use crate::types::ReplayGainMode;
use cadenza_core::{AlbumId, Catalog, Result, Scope, ShuffleMode, Track};
use rand::Rng;

/// Inputs of track selection
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    /// Track currently loaded
    pub current: Option<Track>,

    /// Position and boundary disposition
    pub context: PlaybackContext,

    /// Album universe
    pub albums: AlbumList,

    /// Tracks the user asked to hear next
    pub queue: ExplicitQueue,

    /// Active user playlist
    pub playlist: Option<UserPlaylist>,

    /// Shuffle mode
    pub shuffle: ShuffleMode,

    /// Party mode flag
    pub party: bool,

    /// Party buckets
    pub party_scopes: Vec<Scope>,

    /// No-repeat bookkeeping for the current shuffle epoch
    pub played: PlayedBookkeeping,

    /// Navigation ledger for shuffle and party
    pub history: HistoryLedger,

    revision: u64,
}

impl SelectionState {
    /// Create an empty selection state
    pub fn new(history_limit: usize, shuffle: ShuffleMode) -> Self {
        Self {
            shuffle,
            history: HistoryLedger::new(history_limit),
            ..Default::default()
        }
    }

    /// Mutation counter used to detect stale snapshots
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mark the state as changed
    pub fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Track-level randomness is active (ledger and bookkeeping apply)
    pub fn tracks_history(&self) -> bool {
        self.shuffle.shuffles_tracks() || self.party
    }

    /// Replay-gain hint for the current mode
    pub fn replay_gain_mode(&self) -> ReplayGainMode {
        if self.tracks_history() || self.playlist.is_some() {
            ReplayGainMode::Track
        } else {
            ReplayGainMode::Album
        }
    }

    /// Book-keep a track that just started playing
    pub fn observe_started(&mut self, track: &Track) {
        if self.tracks_history() && track.id.is_library() {
            self.history.observe(track.id);
            self.played.record(track.album_id, track.id);
        }
    }

    /// Forget shuffle history and the current epoch
    pub fn reset_shuffle_history(&mut self) {
        self.history.clear();
        self.played.clear();
    }

    /// Apply the album-level shuffle setting to the album list
    pub fn apply_album_order<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.shuffle.shuffles_albums() {
            self.albums.shuffle(rng);
        } else if self.shuffle == ShuffleMode::None {
            self.albums.restore_order();
        }
    }

    /// Install a freshly built album universe
    pub fn apply_scope<R: Rng + ?Sized>(&mut self, build: ScopeBuild, rng: &mut R) {
        self.albums.set(build.albums);
        self.context.scope = build.scope;
        self.context.album_id = Some(build.album_id);
        self.context.position = build.position;
        self.playlist = None;
        self.played.clear();
        self.apply_album_order(rng);
    }
}

/// Album universe computed for a track, ready to install
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeBuild {
    /// Scope the universe came from, `None` for a single album
    pub scope: Option<Scope>,

    /// Albums in canonical order
    pub albums: Vec<AlbumId>,

    /// Album of the track
    pub album_id: AlbumId,

    /// Position of the track within its album
    pub position: Option<usize>,
}

impl ScopeBuild {
    /// The track was found inside its album under the scope's filter, and
    /// the album belongs to the universe unless the scope is a curated list
    pub fn is_valid(&self) -> bool {
        let curated = self.scope.is_some_and(|scope| !scope.is_anchored());
        self.position.is_some() && (curated || self.albums.contains(&self.album_id))
    }
}

/// Build the album universe of `scope` around `track`
///
/// The track's album and album artist are looked up again, so a rescan that
/// moved the track is honoured. Artist-scoped shuffle modes replace the scope
/// with the album artist and ignore any genre filter.
pub fn build_scope(
    track: &Track,
    scope: Scope,
    shuffle: ShuffleMode,
    catalog: &dyn Catalog,
) -> Result<ScopeBuild> {
    let scope = if shuffle.is_artist_scoped() {
        let artist = catalog
            .album_artist_of(track.id)?
            .unwrap_or(track.album_artist_id);
        Scope::Artist(artist)
    } else {
        scope
    };

    let album_id = catalog.album_of(track.id)?.unwrap_or(track.album_id);
    let albums = catalog.albums_for_scope(&scope)?;
    let tracks = catalog.tracks_for_album(album_id, scope.genre_filter())?;
    let position = tracks.iter().position(|t| t.id == track.id);

    Ok(ScopeBuild {
        scope: Some(scope),
        albums,
        album_id,
        position,
    })
}

/// Universe made of the track's album only
pub fn build_single_album(track: &Track, catalog: &dyn Catalog) -> Result<ScopeBuild> {
    let tracks = catalog.tracks_for_album(track.album_id, None)?;
    let position = tracks.iter().position(|t| t.id == track.id);

    Ok(ScopeBuild {
        scope: None,
        albums: vec![track.album_id],
        album_id: track.album_id,
        position,
    })
}

/// Albums eligible for party mode
///
/// Genre buckets must name a genre the catalog still knows; popular and recent
/// buckets are always accepted. No valid bucket means the whole library.
pub fn party_albums(scopes: &[Scope], catalog: &dyn Catalog) -> Result<Vec<AlbumId>> {
    let genres = catalog.genre_ids()?;
    let valid: Vec<Scope> = scopes
        .iter()
        .filter(|scope| match scope {
            Scope::Genre(genre) => genres.contains(genre),
            _ => scope.is_party_bucket(),
        })
        .copied()
        .collect();

    if valid.is_empty() {
        catalog.albums_for_scope(&Scope::All)
    } else {
        catalog.albums_for_scopes(&valid)
    }
}
