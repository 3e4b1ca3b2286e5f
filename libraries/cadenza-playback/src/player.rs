//! Player facade
//!
//! Owns the selection state, the dual-pipeline engine and the event bus behind
//! a single mutex. Every public operation, bus message and timer runs under
//! that lock; catalog queries never do. They run on the catalog worker against
//! a snapshot of the selection state and are committed back only if the state
//! did not change meanwhile (otherwise they are recomputed).
//!
//! Each load bumps a generation counter. Timers and resolved neighbours carry
//! the generation they were computed for and are ignored once it is stale.
//! Load requests that finish on the worker (`load`, `play_album`, party start)
//! carry a request number instead and are dropped once a newer request was
//! made. Bus messages about a source that was replaced are dropped as well.

use crate::clock::{Clock, SystemClock};
use crate::context::PlaybackContext;
use crate::engine::{DualPipelineEngine, Timer, TimerKind};
use crate::error::{PlaybackError, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::lock;
use crate::pipeline::{Bus, BusMessage, BusMessageKind, Pipeline, PipelineFactory, PipelineSlot};
use crate::selection::{
    build_scope, build_single_album, party_albums, ScopeBuild, SelectionState,
};
use crate::strategy::{ShuffleStrategy, StrategyChain, UserPlaylist};
use crate::types::{PlaybackState, PlayerConfig};
use crate::volume::Volume;
use crate::worker::CatalogWorker;
use cadenza_core::{
    AlbumId, Catalog, CoreError, NextDisposition, Notifier, PersistedState, PlaylistId,
    PlaylistStore, RadioDirectory, RadioStation, Scope, SettingsStore, ShuffleMode, Track,
    TrackId,
};
use crossbeam_channel::{unbounded, Receiver};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

// ===== Default Collaborators =====

struct NoPlaylists;

impl PlaylistStore for NoPlaylists {
    fn track_ids(&self, playlist: PlaylistId) -> cadenza_core::Result<Vec<TrackId>> {
        Err(CoreError::PlaylistNotFound(playlist))
    }
}

struct NoRadios;

impl RadioDirectory for NoRadios {
    fn stations(&self) -> cadenza_core::Result<Vec<RadioStation>> {
        Ok(Vec::new())
    }
}

struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!("{}", message);
    }
}

// ===== Builder =====

/// Builder for [`Player`]
pub struct PlayerBuilder {
    catalog: Arc<dyn Catalog>,
    playlists: Option<Arc<dyn PlaylistStore>>,
    radios: Option<Arc<dyn RadioDirectory>>,
    notifier: Option<Arc<dyn Notifier>>,
    settings: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    strategies: Option<StrategyChain>,
    factory: Option<PipelineFactory>,
    config: PlayerConfig,
}

impl PlayerBuilder {
    fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            playlists: None,
            radios: None,
            notifier: None,
            settings: None,
            clock: None,
            strategies: None,
            factory: None,
            config: PlayerConfig::default(),
        }
    }

    /// Player configuration
    #[must_use]
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// User playlist store
    #[must_use]
    pub fn playlists(mut self, playlists: Arc<dyn PlaylistStore>) -> Self {
        self.playlists = Some(playlists);
        self
    }

    /// Radio directory
    #[must_use]
    pub fn radios(mut self, radios: Arc<dyn RadioDirectory>) -> Self {
        self.radios = Some(radios);
        self
    }

    /// User notification sink (defaults to the log)
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Settings backend for state restore
    #[must_use]
    pub fn settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Time source for engine deadlines (defaults to the system clock)
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the standard strategy chain
    #[must_use]
    pub fn strategies(mut self, strategies: StrategyChain) -> Self {
        self.strategies = Some(strategies);
        self
    }

    /// Pipeline constructor, called once per slot
    #[must_use]
    pub fn pipelines<F>(mut self, factory: F) -> Self
    where
        F: FnMut(PipelineSlot, Bus) -> Box<dyn Pipeline> + Send + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Create the player
    pub fn build(self) -> Result<Player> {
        let mut factory = self.factory.ok_or(PlaybackError::MissingPipelines)?;
        let config = self.config;

        let (bus_tx, bus_rx) = unbounded();
        let bus_a = Bus::new(PipelineSlot::A, bus_tx.clone());
        let bus_b = Bus::new(PipelineSlot::B, bus_tx);
        let counters = (bus_a.source_counter(), bus_b.source_counter());
        let a = factory(PipelineSlot::A, bus_a);
        let b = factory(PipelineSlot::B, bus_b);

        let volume = Volume::new(config.volume);
        let mut selection = SelectionState::new(config.history_limit, config.shuffle);
        selection.party_scopes = config.party_scopes.clone();

        let mut engine = DualPipelineEngine::new(a, b, config.gapless_lead())
            .with_source_counters(counters.0, counters.1);
        engine.set_volume(volume.gain());
        engine.set_replay_gain(selection.replay_gain_mode());

        let worker = if config.background_worker {
            CatalogWorker::spawn("cadenza-catalog")?
        } else {
            CatalogWorker::inline()
        };

        let radios = self.radios.unwrap_or_else(|| Arc::new(NoRadios));
        let chain = self
            .strategies
            .unwrap_or_else(|| StrategyChain::standard(radios.clone()));

        debug!(?config, "Player created");

        Ok(Player {
            shared: Arc::new(Shared {
                inner: Mutex::new(PlayerInner {
                    selection,
                    engine,
                    events: EventBus::new(),
                    volume,
                    generation: 0,
                    request: 0,
                    announced: 0,
                    neighbours: Neighbours::default(),
                    pending: None,
                    preload_due: false,
                    handled_error: None,
                }),
                catalog: self.catalog,
                playlists: self.playlists.unwrap_or_else(|| Arc::new(NoPlaylists)),
                notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
                settings: self.settings,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
                chain,
                worker,
                bus_rx,
                config,
            }),
        })
    }
}

// ===== Shared State =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOrigin {
    Direct,
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOutcome {
    Loaded,
    Refused,
    Missing,
    Failed,
}

/// Neighbours of the current track, resolved on the worker
#[derive(Debug, Clone, Default)]
struct Neighbours {
    generation: u64,
    resolved: bool,
    in_flight: bool,
    next: Option<Track>,
    next_exists: bool,
    prev: Option<Track>,
    prev_exists: bool,
}

struct PlayerInner {
    selection: SelectionState,
    engine: DualPipelineEngine,
    events: EventBus,
    volume: Volume,

    /// Bumped on every load or swap
    generation: u64,

    /// Bumped on every user request that replaces the current track
    request: u64,

    /// Generation whose stream start was already reported
    announced: u64,

    neighbours: Neighbours,

    /// Advance waiting for neighbour resolution
    pending: Option<Direction>,

    /// The preload window of the current track is open
    preload_due: bool,

    /// URI whose error was already handled
    handled_error: Option<String>,
}

impl PlayerInner {
    /// Start a new load request, superseding any still in flight
    fn supersede(&mut self) -> u64 {
        self.request += 1;
        self.request
    }
}

/// Whether the next disposition forbids replacing the current track with `track`
fn refused(inner: &PlayerInner, track: &Track) -> bool {
    let refused = inner
        .selection
        .context
        .refuses(inner.selection.current.as_ref(), track);
    if refused {
        debug!(
            track = %track.id,
            disposition = ?inner.selection.context.next,
            "Load refused by next disposition"
        );
    }
    refused
}

struct Shared {
    inner: Mutex<PlayerInner>,
    catalog: Arc<dyn Catalog>,
    playlists: Arc<dyn PlaylistStore>,
    notifier: Arc<dyn Notifier>,
    settings: Option<Arc<dyn SettingsStore>>,
    clock: Arc<dyn Clock>,
    chain: StrategyChain,
    worker: CatalogWorker,
    bus_rx: Receiver<BusMessage>,
    config: PlayerConfig,
}

/// Playback orchestrator
///
/// Cheap to clone; clones share the same player.
#[derive(Clone)]
pub struct Player {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.shared.inner);
        f.debug_struct("Player")
            .field("state", &inner.engine.state())
            .field("current", &inner.selection.current.as_ref().map(|t| t.id))
            .field("generation", &inner.generation)
            .finish()
    }
}

impl Player {
    /// Start building a player around a catalog
    pub fn builder(catalog: Arc<dyn Catalog>) -> PlayerBuilder {
        PlayerBuilder::new(catalog)
    }

    /// Run `f` under the player lock, then drain inline worker jobs
    fn locked<T>(&self, f: impl FnOnce(&Player, &mut PlayerInner) -> T) -> T {
        let out = {
            let mut inner = lock(&self.shared.inner);
            f(self, &mut inner)
        };
        self.shared.worker.run_pending();
        out
    }

    fn read<T>(&self, f: impl FnOnce(&PlayerInner) -> T) -> T {
        f(&lock(&self.shared.inner))
    }

    fn now(&self) -> Duration {
        self.shared.clock.now()
    }

    // ===== Events & Queries =====

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        lock(&self.shared.inner).events.subscribe()
    }

    /// Transport state
    pub fn state(&self) -> PlaybackState {
        self.read(|inner| inner.engine.state())
    }

    /// Track currently loaded
    pub fn current_track(&self) -> Option<Track> {
        self.read(|inner| inner.selection.current.clone())
    }

    /// Resolved next track, if resolution finished
    pub fn next_track(&self) -> Option<Track> {
        self.read(|inner| inner.neighbours.next.clone())
    }

    /// Resolved previous track, if resolution finished
    pub fn prev_track(&self) -> Option<Track> {
        self.read(|inner| inner.neighbours.prev.clone())
    }

    /// Album universe in traversal order
    pub fn album_list(&self) -> Vec<AlbumId> {
        self.read(|inner| inner.selection.albums.ids().to_vec())
    }

    /// Playback context
    pub fn context(&self) -> PlaybackContext {
        self.read(|inner| inner.selection.context.clone())
    }

    /// Shuffle history, oldest first
    pub fn history(&self) -> Vec<TrackId> {
        self.read(|inner| inner.selection.history.entries())
    }

    /// Explicit queue in play order
    pub fn queue(&self) -> Vec<Track> {
        self.read(|inner| inner.selection.queue.iter().cloned().collect())
    }

    /// Position within the current track
    pub fn position(&self) -> Option<Duration> {
        self.read(|inner| inner.engine.position())
    }

    /// Earliest armed engine deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.read(|inner| inner.engine.next_deadline())
    }

    // ===== Transport =====

    /// Load a track and start it
    ///
    /// Returns `false` if the next disposition refuses the track. The file
    /// check and the load run on the catalog worker; a later load request
    /// supersedes this one if it is still pending.
    pub fn load(&self, track: Track) -> bool {
        self.locked(|player, inner| {
            if refused(inner, &track) {
                return false;
            }
            let request = inner.supersede();
            player.run_job(
                move |_snapshot, shared| {
                    let exists = track.is_radio() || shared.catalog.path_exists(&track);
                    (track.clone(), exists)
                },
                move |player, inner, (track, exists)| {
                    if inner.request != request {
                        debug!(track = %track.id, "Load superseded by a newer request");
                        return;
                    }
                    player.load_track(inner, track, LoadOrigin::Direct, exists);
                },
            );
            true
        })
    }

    /// Start or resume playback
    ///
    /// From `Stopped` the current track is reloaded from the start.
    pub fn play(&self) -> Result<()> {
        self.locked(|player, inner| {
            let before = inner.engine.state();
            match before {
                PlaybackState::Playing | PlaybackState::Loading => Ok(()),
                PlaybackState::Paused => {
                    inner.engine.play()?;
                    player.emit_state(inner, before);
                    player.arm_handoff(inner);
                    Ok(())
                }
                PlaybackState::Stopped => {
                    let track = inner
                        .selection
                        .current
                        .clone()
                        .ok_or(PlaybackError::NoTrackLoaded)?;
                    inner.supersede();
                    player.start_track(inner, track, LoadOrigin::Direct, true);
                    Ok(())
                }
            }
        })
    }

    /// Pause playback
    pub fn pause(&self) -> Result<()> {
        self.locked(|player, inner| {
            let before = inner.engine.state();
            if matches!(before, PlaybackState::Playing | PlaybackState::Loading) {
                inner.engine.pause()?;
                player.emit_state(inner, before);
            }
            Ok(())
        })
    }

    /// Toggle between playing and paused
    pub fn play_pause(&self) -> Result<()> {
        if self.state() == PlaybackState::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Stop playback; the current track is kept
    pub fn stop(&self) {
        self.locked(|player, inner| {
            inner.supersede();
            player.stop_transport(inner);
        });
    }

    /// Skip to the next track
    ///
    /// Returns `false` when playback stopped instead (nothing left, or the
    /// next disposition ended playback).
    pub fn next(&self) -> bool {
        self.locked(|player, inner| {
            inner.supersede();
            player.advance(inner, Direction::Next)
        })
    }

    /// Go to the previous track
    pub fn prev(&self) -> bool {
        self.locked(|player, inner| {
            inner.supersede();
            player.advance(inner, Direction::Prev)
        })
    }

    /// Seek within the current track (seconds)
    pub fn seek(&self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PlaybackError::InvalidSeekPosition(seconds));
        }
        self.locked(|player, inner| {
            let mut position = Duration::from_secs_f64(seconds);
            if let Some(duration) = inner.selection.current.as_ref().and_then(|t| t.duration) {
                position = position.min(duration);
            }
            inner.engine.seek(position)?;
            if inner.engine.state() == PlaybackState::Playing {
                player.arm_handoff(inner);
            }
            inner.events.emit(PlayerEvent::Seeked { position });
            Ok(())
        })
    }

    // ===== Volume =====

    /// Set the output rate (0.0-1.0, clamped)
    pub fn set_volume(&self, rate: f64) {
        self.locked(|player, inner| {
            inner.volume.set_rate(rate);
            player.apply_volume(inner);
        });
    }

    /// Output rate
    pub fn volume(&self) -> f64 {
        self.read(|inner| inner.volume.rate())
    }

    /// Mute or unmute output
    pub fn set_muted(&self, muted: bool) {
        self.locked(|player, inner| {
            if muted {
                inner.volume.mute();
            } else {
                inner.volume.unmute();
            }
            player.apply_volume(inner);
        });
    }

    /// Check if output is muted
    pub fn is_muted(&self) -> bool {
        self.read(|inner| inner.volume.is_muted())
    }

    fn apply_volume(&self, inner: &mut PlayerInner) {
        inner.engine.set_volume(inner.volume.gain());
        inner.events.emit(PlayerEvent::VolumeChanged {
            rate: inner.volume.rate(),
            is_muted: inner.volume.is_muted(),
        });
    }

    // ===== Queue Management =====

    /// Append a track to the explicit queue
    pub fn enqueue(&self, track: Track) {
        self.locked(|player, inner| {
            inner.selection.queue.push_back(track);
            player.queue_changed(inner);
        });
    }

    /// Insert a track at the head of the explicit queue
    pub fn enqueue_front(&self, track: Track) {
        self.locked(|player, inner| {
            inner.selection.queue.push_front(track);
            player.queue_changed(inner);
        });
    }

    /// Remove a track from the explicit queue
    pub fn dequeue(&self, id: TrackId) -> bool {
        self.locked(|player, inner| {
            let removed = inner.selection.queue.remove(id);
            if removed {
                player.queue_changed(inner);
            }
            removed
        })
    }

    /// Empty the explicit queue
    pub fn clear_queue(&self) {
        self.locked(|player, inner| {
            if !inner.selection.queue.is_empty() {
                inner.selection.queue.clear();
                player.queue_changed(inner);
            }
        });
    }

    fn queue_changed(&self, inner: &mut PlayerInner) {
        inner.selection.touch();
        inner.events.emit(PlayerEvent::QueueChanged {
            length: inner.selection.queue.len(),
        });
        self.invalidate_neighbours(inner);
    }

    // ===== Modes =====

    /// What to do at the next track boundary
    pub fn set_next_disposition(&self, disposition: NextDisposition) {
        self.locked(|player, inner| {
            inner.selection.context.next = disposition;
            inner.selection.touch();
            player.invalidate_neighbours(inner);
        });
    }

    /// Current boundary disposition
    pub fn next_disposition(&self) -> NextDisposition {
        self.read(|inner| inner.selection.context.next)
    }

    /// Change the shuffle mode
    ///
    /// Turning shuffle off clears the history ledger. The album universe is
    /// rebuilt in the background for the current track.
    pub fn set_shuffle(&self, mode: ShuffleMode) {
        self.locked(|player, inner| {
            let selection = &mut inner.selection;
            if selection.shuffle == mode {
                return;
            }
            selection.shuffle = mode;
            if mode == ShuffleMode::None {
                selection.reset_shuffle_history();
            } else if let Some(track) = selection.current.clone() {
                selection.observe_started(&track);
            }
            selection.touch();
            inner.engine.set_replay_gain(inner.selection.replay_gain_mode());

            if let Some(playlist) = inner.selection.playlist.as_mut() {
                if mode.shuffles_tracks() {
                    playlist.shuffle(&mut rand::thread_rng());
                } else {
                    playlist.unshuffle();
                }
                player.invalidate_neighbours(inner);
                return;
            }

            let current = inner.selection.current.clone();
            match current {
                Some(track) if track.id.is_library() && !inner.selection.party => {
                    let scope = inner.selection.context.scope.unwrap_or(Scope::All);
                    player.rebuild_scope(scope);
                }
                _ => player.invalidate_neighbours(inner),
            }
        });
    }

    /// Current shuffle mode
    pub fn shuffle(&self) -> ShuffleMode {
        self.read(|inner| inner.selection.shuffle)
    }

    /// Use `scope` as the album universe around the current track
    pub fn set_albums(&self, scope: Scope) {
        self.locked(|player, inner| {
            match inner.selection.current.clone() {
                Some(track) if track.id.is_library() => player.rebuild_scope(scope),
                _ => debug!("No library track playing, album universe unchanged"),
            }
        });
    }

    /// Toggle party mode
    ///
    /// Enabling resets history and the boundary disposition, loads the party
    /// albums and starts a random track unless something is already playing.
    pub fn set_party(&self, enabled: bool) {
        self.locked(|player, inner| {
            if inner.selection.party == enabled {
                return;
            }
            let selection = &mut inner.selection;
            selection.party = enabled;
            selection.reset_shuffle_history();
            if enabled {
                selection.context.reset_disposition();
                selection.context.scope = None;
                selection.playlist = None;
                if let Some(track) = selection.current.clone() {
                    selection.observe_started(&track);
                }
            }
            selection.touch();
            inner.engine.set_replay_gain(inner.selection.replay_gain_mode());
            inner.events.emit(PlayerEvent::PartyChanged { enabled });
            info!(enabled, "Party mode changed");

            if enabled {
                let request = inner.supersede();
                player.refresh_party(Some(request));
            } else {
                match inner.selection.current.clone() {
                    Some(track) if track.id.is_library() => {
                        player.rebuild_scope(Scope::All);
                    }
                    _ => player.invalidate_neighbours(inner),
                }
            }
        });
    }

    /// Check if party mode is on
    pub fn is_party(&self) -> bool {
        self.read(|inner| inner.selection.party)
    }

    /// Replace the party buckets
    pub fn set_party_scopes(&self, scopes: Vec<Scope>) {
        self.locked(|player, inner| {
            inner.selection.party_scopes = scopes;
            inner.selection.touch();
            if inner.selection.party {
                player.refresh_party(None);
            }
        });
    }

    // ===== Albums, Radio & Playlists =====

    /// Play an album from its first track
    ///
    /// With a scope, the album universe becomes that scope; without one, the
    /// album alone. Party mode keeps its own universe.
    pub fn play_album(&self, album: AlbumId, scope: Option<Scope>) {
        self.locked(|player, inner| {
            let request = inner.supersede();
            player.queue_album(album, scope, request);
        });
    }

    fn queue_album(&self, album: AlbumId, scope: Option<Scope>, request: u64) {
        self.run_job(
            move |snapshot, shared| -> cadenza_core::Result<Option<(Track, bool, Option<ScopeBuild>)>> {
                let genre = scope.as_ref().and_then(Scope::genre_filter);
                let Some(first) = shared.catalog.tracks_for_album(album, genre)?.into_iter().next()
                else {
                    return Ok(None);
                };
                let exists = shared.catalog.path_exists(&first);
                let build = if snapshot.party {
                    None
                } else {
                    Some(match scope {
                        Some(scope) => build_scope(&first, scope, snapshot.shuffle, &*shared.catalog)?,
                        None => build_single_album(&first, &*shared.catalog)?,
                    })
                };
                Ok(Some((first, exists, build)))
            },
            move |player, inner, result| match result {
                Ok(Some(_)) if inner.request != request => {
                    debug!(album = %album, "Album load superseded by a newer request");
                }
                Ok(Some((first, exists, build))) => {
                    if let Some(build) = build {
                        inner.selection.apply_scope(build, &mut rand::thread_rng());
                        inner.selection.touch();
                        inner.engine.set_replay_gain(inner.selection.replay_gain_mode());
                    }
                    player.load_track(inner, first, LoadOrigin::Direct, exists);
                }
                Ok(None) => warn!(album = %album, "Album has no tracks"),
                Err(e) => warn!(album = %album, "Failed to play album: {}", e),
            },
        );
    }

    /// Play an internet radio station
    ///
    /// Leaves party mode and the album universe.
    pub fn load_radio(&self, name: &str, uri: &str) -> bool {
        let track = Track::radio(name, uri);
        self.locked(|player, inner| {
            inner.supersede();
            let selection = &mut inner.selection;
            if selection.party {
                selection.party = false;
                selection.reset_shuffle_history();
                inner.events.emit(PlayerEvent::PartyChanged { enabled: false });
            }
            let selection = &mut inner.selection;
            selection.albums.clear();
            selection.playlist = None;
            selection.context.scope = None;
            selection.context.album_id = None;
            selection.touch();
            inner.engine.set_replay_gain(inner.selection.replay_gain_mode());

            player.load_track(inner, track, LoadOrigin::Direct, true) == LoadOutcome::Loaded
        })
    }

    /// Make a user playlist the active traversal
    pub fn set_user_playlist(&self, playlist: PlaylistId) {
        self.run_job(
            move |_snapshot, shared| -> cadenza_core::Result<Vec<Track>> {
                let mut tracks = Vec::new();
                for id in shared.playlists.track_ids(playlist)? {
                    match shared.catalog.track(id)? {
                        Some(track) => tracks.push(track),
                        None => debug!(track = %id, "Playlist entry not in catalog"),
                    }
                }
                Ok(tracks)
            },
            move |player, inner, result| match result {
                Ok(tracks) => {
                    let mut list = UserPlaylist::new(playlist, tracks);
                    if inner.selection.shuffle.shuffles_tracks() {
                        list.shuffle(&mut rand::thread_rng());
                    }
                    inner.selection.playlist = Some(list);
                    inner.selection.touch();
                    inner.engine.set_replay_gain(inner.selection.replay_gain_mode());
                    player.invalidate_neighbours(inner);
                }
                Err(e) => warn!(playlist = %playlist, "Failed to load user playlist: {}", e),
            },
        );
        self.shared.worker.run_pending();
    }

    /// Leave the user playlist
    pub fn clear_user_playlist(&self) {
        self.locked(|player, inner| {
            if inner.selection.playlist.take().is_some() {
                inner.selection.touch();
                inner.engine.set_replay_gain(inner.selection.replay_gain_mode());
                player.invalidate_neighbours(inner);
            }
        });
    }

    /// Tracks of the active user playlist, in play order
    pub fn user_playlist(&self) -> Option<Vec<Track>> {
        self.read(|inner| {
            inner
                .selection
                .playlist
                .as_ref()
                .map(|list| list.tracks().to_vec())
        })
    }

    /// Load a track of the active user playlist
    pub fn load_in_playlist(&self, id: TrackId) -> bool {
        let track = self.read(|inner| {
            inner
                .selection
                .playlist
                .as_ref()
                .and_then(|list| list.find(id).cloned())
        });
        match track {
            Some(track) => self.load(track),
            None => {
                debug!(track = %id, "Track is not in the active playlist");
                false
            }
        }
    }

    // ===== Persistence =====

    /// State to persist on shutdown
    pub fn persisted_state(&self) -> PersistedState {
        self.read(|inner| PersistedState {
            save_state: true,
            last_track_id: inner
                .selection
                .current
                .as_ref()
                .map(|t| t.id)
                .filter(|id| id.is_library()),
            shuffle: inner.selection.shuffle,
            party: inner.selection.party,
            party_scopes: inner.selection.party_scopes.clone(),
            saved_at: None,
        })
    }

    /// Write the current state to the settings backend
    pub fn save_state(&self) -> Result<()> {
        let Some(settings) = self.shared.settings.clone() else {
            return Ok(());
        };
        settings.save_state(&self.persisted_state())?;
        Ok(())
    }

    /// Restore modes and the last track from the settings backend
    ///
    /// Blocks on the catalog. Returns whether a track was loaded (or party
    /// mode took over).
    pub fn restore_state(&self) -> Result<bool> {
        let Some(settings) = self.shared.settings.clone() else {
            return Ok(false);
        };
        let state = settings.load_state()?;
        if !state.save_state {
            debug!("State restore disabled");
            return Ok(false);
        }

        self.locked(|_, inner| {
            inner.selection.shuffle = state.shuffle;
            inner.selection.party_scopes = state.party_scopes.clone();
            inner.selection.touch();
            inner.engine.set_replay_gain(inner.selection.replay_gain_mode());
        });

        if state.party {
            self.set_party(true);
            return Ok(true);
        }

        let Some(id) = state.last_track_id.filter(|id| id.is_library()) else {
            return Ok(false);
        };
        let Some(track) = self.shared.catalog.track(id)? else {
            warn!(track = %id, "Saved track is no longer in the catalog");
            return Ok(false);
        };

        info!(track = %id, "Restoring last track");
        if self.load(track) {
            self.locked(|player, _| player.rebuild_scope(Scope::All));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // ===== Bus, Timers & Threads =====

    /// Handle every queued pipeline message
    pub fn dispatch_pending(&self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.shared.bus_rx.try_recv() {
            self.handle_bus_message(message);
            handled += 1;
        }
        handled
    }

    /// Fire every engine deadline that is due
    pub fn tick(&self) {
        let now = self.now();
        self.locked(|player, inner| {
            for timer in inner.engine.take_due(now) {
                player.on_timer(inner, timer);
            }
        });
    }

    /// Block until queued catalog work has run
    pub fn wait_idle(&self) {
        self.shared.worker.wait_idle();
    }

    /// Dispatch pipeline messages on a dedicated thread
    ///
    /// The thread ends once the pipelines (and their buses) are dropped.
    pub fn spawn_bus_thread(&self) -> std::io::Result<JoinHandle<()>> {
        let rx = self.shared.bus_rx.clone();
        let weak = Arc::downgrade(&self.shared);
        thread::Builder::new()
            .name("cadenza-bus".to_string())
            .spawn(move || {
                for message in rx {
                    let Some(player) = Self::upgrade(&weak) else {
                        break;
                    };
                    player.handle_bus_message(message);
                }
                debug!("Bus thread stopped");
            })
    }

    /// Fire engine deadlines on a dedicated thread at a fixed interval
    ///
    /// The thread ends once the player is dropped.
    pub fn spawn_ticker(&self, interval: Duration) -> std::io::Result<JoinHandle<()>> {
        let weak = Arc::downgrade(&self.shared);
        let ticker = crossbeam_channel::tick(interval);
        thread::Builder::new()
            .name("cadenza-ticker".to_string())
            .spawn(move || {
                while ticker.recv().is_ok() {
                    let Some(player) = Self::upgrade(&weak) else {
                        break;
                    };
                    player.tick();
                }
                debug!("Ticker stopped");
            })
    }

    fn upgrade(weak: &Weak<Shared>) -> Option<Player> {
        weak.upgrade().map(|shared| Player { shared })
    }

    fn handle_bus_message(&self, message: BusMessage) {
        trace!(slot = %message.slot, kind = ?message.kind, "Bus message");
        self.locked(|player, inner| {
            if !inner.engine.is_current(&message) {
                trace!(slot = %message.slot, "Dropping message about a replaced source");
                return;
            }
            if !inner.engine.is_active(message.slot) {
                player.on_standby_message(inner, message.kind);
                return;
            }
            match message.kind {
                BusMessageKind::StreamStart => player.on_stream_start(inner),
                BusMessageKind::AboutToFinish => player.on_about_to_finish(inner),
                BusMessageKind::EndOfStream => player.on_end_of_stream(inner),
                BusMessageKind::Error(error) => player.on_error(inner, &error),
                BusMessageKind::Tag { title } => player.on_tag(inner, title),
            }
        });
    }

    fn on_standby_message(&self, inner: &mut PlayerInner, kind: BusMessageKind) {
        if let BusMessageKind::Error(error) = kind {
            warn!("Standby pipeline failed, dropping prepared track: {}", error);
            inner.engine.cancel_standby();
        }
    }

    fn on_stream_start(&self, inner: &mut PlayerInner) {
        let before = inner.engine.state();
        if before == PlaybackState::Loading {
            inner.engine.set_state(PlaybackState::Playing);
            self.emit_state(inner, before);
        }

        if inner.announced == inner.generation {
            return;
        }
        inner.announced = inner.generation;

        let Some(track) = inner.selection.current.clone() else {
            return;
        };
        inner.handled_error = None;
        inner.selection.observe_started(&track);
        inner.selection.touch();
        debug!(track = %track.id, uri = %track.uri, "Track started");
        inner.events.emit(PlayerEvent::CurrentTrackChanged { track });

        if inner.engine.state() == PlaybackState::Playing {
            self.arm_handoff(inner);
        }
        self.request_neighbours(inner);
    }

    fn on_about_to_finish(&self, inner: &mut PlayerInner) {
        if inner.selection.current.as_ref().is_some_and(Track::is_radio) {
            return;
        }
        inner.preload_due = true;
        self.begin_preload(inner);
    }

    fn on_end_of_stream(&self, inner: &mut PlayerInner) {
        if inner.engine.standby_track().is_some() && self.swap_to_standby(inner) {
            return;
        }

        if inner.selection.context.next.is_stop() {
            info!(disposition = ?inner.selection.context.next, "Stopping at track boundary");
            inner.selection.context.reset_disposition();
            inner.selection.touch();
            self.stop_transport(inner);
            return;
        }

        if let Some(track) = inner.selection.current.clone().filter(Track::is_radio) {
            info!(uri = %track.uri, "Radio stream ended, reconnecting");
            self.start_track(inner, track, LoadOrigin::Direct, true);
            return;
        }

        self.advance(inner, Direction::Next);
    }

    fn on_error(&self, inner: &mut PlayerInner, error: &str) {
        let uri = inner
            .selection
            .current
            .as_ref()
            .map(|t| t.uri.clone())
            .unwrap_or_default();
        if inner.handled_error.as_deref() == Some(uri.as_str()) {
            trace!(uri = %uri, "Error already handled");
            return;
        }
        let notice = format!("Cannot play {}: {}", uri, error);
        self.source_failed(inner, uri, error.to_string(), &notice);
    }

    fn on_tag(&self, inner: &mut PlayerInner, title: String) {
        let Some(track) = inner.selection.current.as_mut().filter(|t| t.is_radio()) else {
            return;
        };
        if title.is_empty() || track.title == title {
            return;
        }
        track.title = title;
        let track = track.clone();
        inner.selection.touch();
        inner.events.emit(PlayerEvent::TrackMetadataChanged { track });
    }

    fn on_timer(&self, inner: &mut PlayerInner, timer: Timer) {
        if timer.generation != inner.generation {
            trace!(?timer, "Ignoring stale timer");
            return;
        }
        match timer.kind {
            TimerKind::Preload => {
                inner.preload_due = true;
                self.begin_preload(inner);
            }
            TimerKind::Swap => {
                self.swap_to_standby(inner);
            }
            TimerKind::SkipAfterError => {
                debug!("Skipping failed track");
                self.advance(inner, Direction::Next);
            }
        }
    }

    // ===== Loading =====

    /// Load with disposition check
    fn load_track(
        &self,
        inner: &mut PlayerInner,
        track: Track,
        origin: LoadOrigin,
        exists: bool,
    ) -> LoadOutcome {
        if refused(inner, &track) {
            return LoadOutcome::Refused;
        }
        self.start_track(inner, track, origin, exists)
    }

    /// Make `track` current and bind it to the active pipeline
    fn start_track(
        &self,
        inner: &mut PlayerInner,
        track: Track,
        origin: LoadOrigin,
        exists: bool,
    ) -> LoadOutcome {
        inner.generation += 1;
        inner.neighbours.resolved = false;
        inner.neighbours.next = None;
        inner.neighbours.prev = None;
        inner.pending = None;
        inner.preload_due = false;

        let uri = track.uri.clone();
        self.commit_current(inner, track, origin);

        if !exists {
            let before = inner.engine.state();
            inner.engine.stop();
            self.emit_state(inner, before);

            let notice = format!("File doesn't exist: {}", uri);
            self.source_failed(inner, uri, "File doesn't exist".to_string(), &notice);
            return LoadOutcome::Missing;
        }

        let before = inner.engine.state();
        match inner.engine.load(&uri) {
            Ok(()) => {
                debug!(uri = %uri, generation = inner.generation, "Track loaded");
                self.emit_state(inner, before);
                LoadOutcome::Loaded
            }
            Err(e) => {
                self.emit_state(inner, before);
                let notice = format!("Cannot play {}: {}", uri, e);
                self.source_failed(inner, uri, e.to_string(), &notice);
                LoadOutcome::Failed
            }
        }
    }

    fn commit_current(&self, inner: &mut PlayerInner, track: Track, origin: LoadOrigin) {
        let selection = &mut inner.selection;
        let context = &mut selection.context;

        context.position = match origin {
            LoadOrigin::Next => context.next_position,
            LoadOrigin::Prev => context.prev_position,
            LoadOrigin::Direct => None,
        };
        context.next_position = None;
        context.prev_position = None;

        if track.id.is_library() {
            let album_changed = context.album_id != Some(track.album_id);
            context.album_id = Some(track.album_id);
            if album_changed && context.next == NextDisposition::StartNewAlbum {
                context.reset_disposition();
            }
        }

        if selection.queue.consume_head(track.id) {
            inner.events.emit(PlayerEvent::QueueChanged {
                length: selection.queue.len(),
            });
        }
        selection.current = Some(track);
        selection.touch();
    }

    /// Log, notify, report and schedule a skip for the current source
    ///
    /// The failed track counts as played for the current shuffle epoch so the
    /// random draw moves on to other tracks.
    fn source_failed(&self, inner: &mut PlayerInner, uri: String, message: String, notice: &str) {
        warn!(uri = %uri, "Playback error: {}", message);
        self.shared.notifier.notify(notice);
        inner.handled_error = Some(uri.clone());

        let selection = &mut inner.selection;
        if selection.tracks_history() {
            if let Some(track) = selection.current.as_ref().filter(|t| t.id.is_library()) {
                selection.played.record(track.album_id, track.id);
                selection.touch();
            }
        }

        inner.events.emit(PlayerEvent::Error { uri, message });

        let at = self.now() + self.shared.config.error_skip_delay();
        inner
            .engine
            .schedule(TimerKind::SkipAfterError, at, inner.generation);
        self.request_neighbours(inner);
    }

    fn advance(&self, inner: &mut PlayerInner, direction: Direction) -> bool {
        if !inner.neighbours.resolved || inner.neighbours.generation != inner.generation {
            trace!(?direction, "Neighbours not resolved yet, deferring");
            inner.pending = Some(direction);
            self.request_neighbours(inner);
            return true;
        }

        let neighbours = &inner.neighbours;
        let (track, exists, origin) = match direction {
            Direction::Next => (neighbours.next.clone(), neighbours.next_exists, LoadOrigin::Next),
            Direction::Prev => (neighbours.prev.clone(), neighbours.prev_exists, LoadOrigin::Prev),
        };

        let Some(track) = track else {
            info!(?direction, "Nothing left to play, stopping");
            if inner.selection.context.next.is_stop() {
                inner.selection.context.reset_disposition();
                inner.selection.touch();
            }
            self.stop_transport(inner);
            return false;
        };

        match self.load_track(inner, track, origin, exists) {
            LoadOutcome::Loaded | LoadOutcome::Missing | LoadOutcome::Failed => true,
            LoadOutcome::Refused => {
                info!("Next disposition reached, stopping");
                inner.selection.context.reset_disposition();
                inner.selection.touch();
                self.stop_transport(inner);
                false
            }
        }
    }

    fn stop_transport(&self, inner: &mut PlayerInner) {
        let before = inner.engine.state();
        inner.engine.stop();
        inner.pending = None;
        inner.preload_due = false;
        self.emit_state(inner, before);
    }

    fn emit_state(&self, inner: &mut PlayerInner, before: PlaybackState) {
        let state = inner.engine.state();
        if state != before {
            debug!(?before, ?state, "Playback state changed");
            inner.events.emit(PlayerEvent::StatusChanged { state });
        }
    }

    // ===== Gapless Handoff =====

    fn arm_handoff(&self, inner: &mut PlayerInner) {
        let duration = inner
            .selection
            .current
            .as_ref()
            .filter(|t| !t.is_radio())
            .and_then(|t| t.duration);
        let now = self.now();
        inner.engine.arm_handoff(now, duration, inner.generation);
    }

    fn begin_preload(&self, inner: &mut PlayerInner) {
        if inner.engine.standby_track().is_some() {
            return;
        }
        if !inner.neighbours.resolved || inner.neighbours.generation != inner.generation {
            self.request_neighbours_keep(inner);
            return;
        }
        let Some(next) = inner.neighbours.next.clone() else {
            return;
        };
        if !inner.neighbours.next_exists || next.is_radio() {
            return;
        }
        if inner
            .selection
            .context
            .refuses(inner.selection.current.as_ref(), &next)
        {
            debug!("Next disposition holds the next track back");
            return;
        }

        let track_id = next.id;
        match inner.engine.prepare_standby(next) {
            Ok(()) => {
                inner.preload_due = false;
                debug!(track = %track_id, "Next track prepared");
                inner.events.emit(PlayerEvent::NextTrackPrepared { track_id });
            }
            Err(e) => warn!(track = %track_id, "Failed to prepare next track: {}", e),
        }
    }

    fn swap_to_standby(&self, inner: &mut PlayerInner) -> bool {
        match inner.engine.swap() {
            Ok(Some(track)) => {
                inner.generation += 1;
                inner.neighbours.resolved = false;
                inner.neighbours.next = None;
                inner.neighbours.prev = None;
                inner.pending = None;
                inner.preload_due = false;
                debug!(track = %track.id, slot = %inner.engine.active_slot(), "Gapless handoff");
                self.commit_current(inner, track, LoadOrigin::Next);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Gapless handoff failed: {}", e);
                false
            }
        }
    }

    // ===== Background Resolution =====

    /// Drop resolved neighbours (and the standby built from them), resolve again
    fn invalidate_neighbours(&self, inner: &mut PlayerInner) {
        if inner.engine.standby_track().is_some() {
            inner.engine.cancel_standby();
            inner.preload_due = true;
        }
        self.request_neighbours(inner);
    }

    fn request_neighbours(&self, inner: &mut PlayerInner) {
        inner.neighbours.resolved = false;
        inner.neighbours.next = None;
        inner.neighbours.prev = None;
        self.request_neighbours_keep(inner);
    }

    /// Make sure a resolution is queued without discarding current results
    fn request_neighbours_keep(&self, inner: &mut PlayerInner) {
        if inner.neighbours.in_flight {
            return;
        }
        inner.neighbours.in_flight = true;
        let player = self.clone();
        self.shared
            .worker
            .submit(Box::new(move || player.resolve_neighbours()));
    }

    fn resolve_neighbours(&self) {
        let catalog = &*self.shared.catalog;
        loop {
            let (mut snapshot, revision, generation) = {
                let inner = lock(&self.shared.inner);
                (
                    inner.selection.clone(),
                    inner.selection.revision(),
                    inner.generation,
                )
            };
            snapshot.context.next_position = None;
            snapshot.context.prev_position = None;

            let next = self.shared.chain.resolve_next(&mut snapshot, catalog);
            let next_exists = next
                .as_ref()
                .is_some_and(|t| t.is_radio() || catalog.path_exists(t));
            let prev = self.shared.chain.resolve_prev(&mut snapshot, catalog);
            let prev_exists = prev
                .as_ref()
                .is_some_and(|t| t.is_radio() || catalog.path_exists(t));

            let mut inner = lock(&self.shared.inner);
            if inner.selection.revision() != revision {
                trace!("Selection changed during resolution, retrying");
                continue;
            }

            inner.selection = snapshot;
            inner.selection.touch();
            inner.neighbours = Neighbours {
                generation,
                resolved: true,
                in_flight: false,
                next_exists,
                prev_exists,
                next,
                prev,
            };
            trace!(
                next = ?inner.neighbours.next.as_ref().map(|t| t.id),
                prev = ?inner.neighbours.prev.as_ref().map(|t| t.id),
                "Neighbours resolved"
            );

            if let Some(direction) = inner.pending.take() {
                self.advance(&mut inner, direction);
            } else if inner.preload_due {
                self.begin_preload(&mut inner);
            }
            break;
        }
    }

    /// Run `compute` on a selection snapshot off the lock, then `apply` under
    /// it, recomputing if the selection changed in between
    fn run_job<T, C, A>(&self, compute: C, apply: A)
    where
        T: Send + 'static,
        C: Fn(&SelectionState, &Shared) -> T + Send + 'static,
        A: FnOnce(&Player, &mut PlayerInner, T) + Send + 'static,
    {
        let player = self.clone();
        self.shared.worker.submit(Box::new(move || {
            let mut apply = Some(apply);
            loop {
                let (snapshot, revision) = {
                    let inner = lock(&player.shared.inner);
                    (inner.selection.clone(), inner.selection.revision())
                };
                let value = compute(&snapshot, &player.shared);

                let mut inner = lock(&player.shared.inner);
                if inner.selection.revision() != revision {
                    trace!("Selection changed during catalog job, retrying");
                    continue;
                }
                if let Some(apply) = apply.take() {
                    apply(&player, &mut inner, value);
                }
                break;
            }
        }));
        // Inline workers run the job once the caller releases the lock
    }

    /// Rebuild the album universe of `scope` around the current track
    fn rebuild_scope(&self, scope: Scope) {
        self.run_job(
            move |snapshot, shared| -> cadenza_core::Result<Option<ScopeBuild>> {
                let Some(track) = snapshot.current.as_ref().filter(|t| t.id.is_library()) else {
                    return Ok(None);
                };
                build_scope(track, scope, snapshot.shuffle, &*shared.catalog).map(Some)
            },
            move |player, inner, result| match result {
                Ok(Some(build)) => {
                    let valid = build.is_valid();
                    inner.selection.apply_scope(build, &mut rand::thread_rng());
                    if let Some(current) = inner.selection.current.clone() {
                        inner.selection.observe_started(&current);
                    }
                    inner.selection.touch();
                    inner.engine.set_replay_gain(inner.selection.replay_gain_mode());
                    if !valid {
                        warn!(?scope, "Current track is not part of its album under this scope, stopping");
                        player.stop_transport(inner);
                    }
                    player.invalidate_neighbours(inner);
                }
                Ok(None) => debug!("No library track playing, album universe unchanged"),
                Err(e) => warn!("Failed to build album universe: {}", e),
            },
        );
    }

    /// Reload the party albums; with a request, also start a random track
    /// when idle unless a newer request came in meanwhile
    fn refresh_party(&self, start: Option<u64>) {
        self.run_job(
            |snapshot, shared| -> cadenza_core::Result<(Vec<AlbumId>, Option<(Track, bool)>)> {
                let albums = party_albums(&snapshot.party_scopes, &*shared.catalog)?;
                let mut draft = snapshot.clone();
                draft.albums.set(albums.clone());
                let candidate = ShuffleStrategy::next_random(
                    &mut draft,
                    &*shared.catalog,
                    &mut rand::thread_rng(),
                )
                .map(|track| {
                    let exists = shared.catalog.path_exists(&track);
                    (track, exists)
                });
                Ok((albums, candidate))
            },
            move |player, inner, result| match result {
                Ok((albums, candidate)) => {
                    debug!(albums = albums.len(), "Party albums loaded");
                    inner.selection.albums.set(albums);
                    inner.selection.touch();

                    let idle = inner.engine.state() != PlaybackState::Playing
                        || inner.selection.current.as_ref().is_some_and(Track::is_radio);
                    let current_request = start.is_some_and(|request| request == inner.request);
                    match candidate {
                        Some((track, exists)) if current_request && idle => {
                            player.load_track(inner, track, LoadOrigin::Direct, exists);
                        }
                        _ => player.invalidate_neighbours(inner),
                    }
                }
                Err(e) => warn!("Failed to load party albums: {}", e),
            },
        );
    }
}
