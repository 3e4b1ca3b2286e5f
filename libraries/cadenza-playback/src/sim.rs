//! In-memory collaborators and simulated pipelines
//!
//! Everything here runs on virtual time: a [`ManualClock`] only moves when
//! told to, and [`SimRig::run_until`] advances it from one event (engine
//! deadline or end of a playing source) to the next. Used by the test-suite
//! and by front ends without an audio backend.

use crate::clock::Clock;
use crate::error::{PlaybackError, Result};
use crate::lock;
use crate::pipeline::{Bus, BusMessage, BusMessageKind, Pipeline, PipelineSlot};
use crate::player::Player;
use crate::types::ReplayGainMode;
use cadenza_core::{
    AlbumId, ArtistId, Catalog, GenreId, Notifier, PersistedState, PlaylistId, PlaylistStore,
    RadioDirectory, RadioStation, Scope, SettingsStore, Track, TrackId,
};
use crossbeam_channel::{unbounded, Receiver};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Upper bound on simulation steps per [`SimRig::run_until`] call
const MAX_STEPS: usize = 100_000;

// ===== Clock =====

/// Clock that only moves when advanced; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Clock at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        *lock(&self.now)
    }

    /// Move forward by `delta`
    pub fn advance(&self, delta: Duration) {
        *lock(&self.now) += delta;
    }

    /// Jump to `at`; never moves backwards
    pub fn set(&self, at: Duration) {
        let mut now = lock(&self.now);
        if at > *now {
            *now = at;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        ManualClock::now(self)
    }
}

// ===== Pipeline Log =====

/// Pipeline operation recorded by the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOp {
    /// Source bound
    SourceSet,
    /// Source prerolled
    Prerolled,
    /// Output started or resumed
    Played,
    /// Output paused
    Paused,
    /// Pipeline halted
    Stopped,
    /// Position changed
    Seeked,
}

/// One recorded operation
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineLogEntry {
    /// Virtual time of the operation
    pub at: Duration,
    /// Pipeline
    pub slot: PipelineSlot,
    /// Operation
    pub op: PipelineOp,
    /// Source bound at the time
    pub uri: Option<String>,
}

/// Shared, append-only operation log
#[derive(Debug, Clone, Default)]
pub struct PipelineLog {
    entries: Arc<Mutex<Vec<PipelineLogEntry>>>,
}

impl PipelineLog {
    /// Snapshot of every entry so far
    pub fn entries(&self) -> Vec<PipelineLogEntry> {
        lock(&self.entries).clone()
    }

    /// Forget recorded entries
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    fn push(&self, entry: PipelineLogEntry) {
        lock(&self.entries).push(entry);
    }
}

// ===== Simulated Pipelines =====

#[derive(Debug, Default)]
struct SlotState {
    uri: Option<String>,
    playing: bool,
    started: bool,
    offset: Duration,
    resumed_at: Option<Duration>,
    volume: f64,
}

impl SlotState {
    fn position(&self, now: Duration) -> Duration {
        match self.resumed_at {
            Some(resumed) if self.playing => self.offset + now.saturating_sub(resumed),
            _ => self.offset,
        }
    }
}

#[derive(Debug, Default)]
struct RigState {
    slots: [SlotState; 2],
    buses: [Option<Bus>; 2],
    durations: HashMap<String, Duration>,
    failing: HashSet<String>,
    receivers: Vec<Receiver<BusMessage>>,
}

/// Pipeline whose audio is a timeline on the rig's clock
///
/// Starting a fresh source posts `StreamStart`, or `Error` for URIs marked as
/// failing. The rig posts `EndOfStream` when the timeline reaches the source's
/// registered duration.
pub struct SimulatedPipeline {
    slot: PipelineSlot,
    bus: Bus,
    state: Arc<Mutex<RigState>>,
    clock: ManualClock,
    log: PipelineLog,
}

impl SimulatedPipeline {
    fn record(&self, op: PipelineOp, uri: Option<String>) {
        self.log.push(PipelineLogEntry {
            at: self.clock.now(),
            slot: self.slot,
            op,
            uri,
        });
    }

    fn bound_uri(&self) -> Result<String> {
        lock(&self.state).slots[self.slot.index()]
            .uri
            .clone()
            .ok_or_else(|| PlaybackError::pipeline("no source bound"))
    }
}

impl Pipeline for SimulatedPipeline {
    fn set_source(&mut self, uri: &str) -> Result<()> {
        {
            let mut state = lock(&self.state);
            let slot = &mut state.slots[self.slot.index()];
            slot.uri = Some(uri.to_string());
            slot.playing = false;
            slot.started = false;
            slot.offset = Duration::ZERO;
            slot.resumed_at = None;
        }
        self.record(PipelineOp::SourceSet, Some(uri.to_string()));
        Ok(())
    }

    fn preroll(&mut self) -> Result<()> {
        let uri = self.bound_uri()?;
        self.record(PipelineOp::Prerolled, Some(uri));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let uri = self.bound_uri()?;
        let now = self.clock.now();
        let message = {
            let mut state = lock(&self.state);
            if state.failing.contains(&uri) {
                Some(BusMessageKind::Error(format!("Could not open resource: {uri}")))
            } else {
                let slot = &mut state.slots[self.slot.index()];
                if slot.playing {
                    return Ok(());
                }
                slot.playing = true;
                slot.resumed_at = Some(now);
                if slot.started {
                    None
                } else {
                    slot.started = true;
                    Some(BusMessageKind::StreamStart)
                }
            }
        };
        self.record(PipelineOp::Played, Some(uri));
        if let Some(message) = message {
            self.bus.post(message);
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let uri = self.bound_uri()?;
        let now = self.clock.now();
        {
            let mut state = lock(&self.state);
            let slot = &mut state.slots[self.slot.index()];
            slot.offset = slot.position(now);
            slot.playing = false;
            slot.resumed_at = None;
        }
        self.record(PipelineOp::Paused, Some(uri));
        Ok(())
    }

    fn stop(&mut self) {
        let uri = {
            let mut state = lock(&self.state);
            let slot = &mut state.slots[self.slot.index()];
            let uri = slot.uri.take();
            slot.playing = false;
            slot.started = false;
            slot.offset = Duration::ZERO;
            slot.resumed_at = None;
            uri
        };
        self.record(PipelineOp::Stopped, uri);
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let uri = self.bound_uri()?;
        let now = self.clock.now();
        {
            let mut state = lock(&self.state);
            let slot = &mut state.slots[self.slot.index()];
            slot.offset = position;
            if slot.playing {
                slot.resumed_at = Some(now);
            }
        }
        self.record(PipelineOp::Seeked, Some(uri));
        Ok(())
    }

    fn position(&self) -> Option<Duration> {
        let state = lock(&self.state);
        let slot = &state.slots[self.slot.index()];
        slot.uri.as_ref()?;
        Some(slot.position(self.clock.now()))
    }

    fn set_volume(&mut self, gain: f64) {
        lock(&self.state).slots[self.slot.index()].volume = gain;
    }

    fn set_replay_gain(&mut self, mode: ReplayGainMode) {
        tracing::trace!(slot = %self.slot, ?mode, "Replay gain mode");
    }
}

// ===== Rig =====

/// Owner of two simulated pipelines and their timeline
#[derive(Debug, Clone)]
pub struct SimRig {
    clock: ManualClock,
    state: Arc<Mutex<RigState>>,
    log: PipelineLog,
}

impl SimRig {
    /// Rig running on `clock`
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(RigState::default())),
            log: PipelineLog::default(),
        }
    }

    /// Pipeline factory for [`PlayerBuilder::pipelines`](crate::PlayerBuilder::pipelines)
    pub fn factory(&self) -> impl FnMut(PipelineSlot, Bus) -> Box<dyn Pipeline> + Send + 'static {
        let state = self.state.clone();
        let clock = self.clock.clone();
        let log = self.log.clone();
        move |slot, bus| {
            lock(&state).buses[slot.index()] = Some(bus.clone());
            Box::new(SimulatedPipeline {
                slot,
                bus,
                state: state.clone(),
                clock: clock.clone(),
                log: log.clone(),
            })
        }
    }

    /// Bus pair for driving pipelines without a player
    ///
    /// Posted messages are kept by the rig and never delivered.
    pub fn buses(&self) -> (Bus, Bus) {
        let (tx, rx) = unbounded();
        lock(&self.state).receivers.push(rx);
        (
            Bus::new(PipelineSlot::A, tx.clone()),
            Bus::new(PipelineSlot::B, tx),
        )
    }

    /// Shared clock
    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    /// Operation log
    pub fn log(&self) -> PipelineLog {
        self.log.clone()
    }

    /// Length of the audio behind `uri`
    pub fn set_duration(&self, uri: &str, duration: Duration) {
        lock(&self.state)
            .durations
            .insert(uri.to_string(), duration);
    }

    /// Register the durations of `tracks`
    pub fn register(&self, tracks: &[Track]) {
        let mut state = lock(&self.state);
        for track in tracks {
            if let Some(duration) = track.duration {
                state.durations.insert(track.uri.clone(), duration);
            }
        }
    }

    /// Make every future start of `uri` fail
    pub fn fail_uri(&self, uri: &str) {
        lock(&self.state).failing.insert(uri.to_string());
    }

    /// Post a message as if `slot` had sent it
    pub fn post(&self, slot: PipelineSlot, kind: BusMessageKind) {
        let bus = lock(&self.state).buses[slot.index()].clone();
        match bus {
            Some(bus) => bus.post(kind),
            None => tracing::warn!(%slot, "No pipeline created for slot"),
        }
    }

    /// URI of `slot` while it produces output
    pub fn playing_uri(&self, slot: PipelineSlot) -> Option<String> {
        let state = lock(&self.state);
        let slot = &state.slots[slot.index()];
        if slot.playing {
            slot.uri.clone()
        } else {
            None
        }
    }

    /// Slot producing output, if any
    pub fn playing_slot(&self) -> Option<PipelineSlot> {
        [PipelineSlot::A, PipelineSlot::B]
            .into_iter()
            .find(|slot| self.playing_uri(*slot).is_some())
    }

    /// Gain last applied to `slot`
    pub fn volume(&self, slot: PipelineSlot) -> f64 {
        lock(&self.state).slots[slot.index()].volume
    }

    /// Virtual time at which the source playing in `slot` runs out
    pub fn playing_end(&self, slot: PipelineSlot) -> Option<Duration> {
        let state = lock(&self.state);
        let slot = &state.slots[slot.index()];
        if !slot.playing {
            return None;
        }
        let duration = state.durations.get(slot.uri.as_ref()?)?;
        let resumed = slot.resumed_at?;
        Some(resumed + duration.saturating_sub(slot.offset))
    }

    /// Advance virtual time to `until`, firing deadlines and source ends in
    /// time order and dispatching every resulting bus message
    pub fn run_until(&self, player: &Player, until: Duration) {
        for _ in 0..MAX_STEPS {
            player.dispatch_pending();
            player.wait_idle();

            let ends = [PipelineSlot::A, PipelineSlot::B]
                .into_iter()
                .filter_map(|slot| self.playing_end(slot));
            let step = player.next_deadline().into_iter().chain(ends).min();

            match step {
                Some(at) if at <= until => {
                    self.clock.set(at);
                    player.tick();
                    self.finish_ended();
                }
                _ => {
                    self.clock.set(until);
                    player.tick();
                    player.dispatch_pending();
                    player.wait_idle();
                    return;
                }
            }
        }
        tracing::warn!(until = ?until, "Simulation step limit reached");
    }

    /// Advance virtual time by `delta`
    pub fn run_for(&self, player: &Player, delta: Duration) {
        self.run_until(player, self.clock.now() + delta);
    }

    /// Post `EndOfStream` for every source that ran out
    fn finish_ended(&self) {
        let now = self.clock.now();
        for slot in [PipelineSlot::A, PipelineSlot::B] {
            let Some(end) = self.playing_end(slot) else {
                continue;
            };
            if end > now {
                continue;
            }
            let bus = {
                let mut state = lock(&self.state);
                let duration = state.slots[slot.index()]
                    .uri
                    .as_ref()
                    .and_then(|uri| state.durations.get(uri))
                    .copied()
                    .unwrap_or_default();
                let slot_state = &mut state.slots[slot.index()];
                slot_state.playing = false;
                slot_state.resumed_at = None;
                slot_state.offset = duration;
                state.buses[slot.index()].clone()
            };
            if let Some(bus) = bus {
                bus.post(BusMessageKind::EndOfStream);
            }
        }
    }
}

// ===== Catalog =====

#[derive(Debug, Clone)]
struct AlbumEntry {
    id: AlbumId,
    artist: ArtistId,
    genre: Option<GenreId>,
    tracks: Vec<TrackId>,
}

#[derive(Debug, Default)]
struct CatalogData {
    albums: Vec<AlbumEntry>,
    tracks: HashMap<TrackId, Track>,
    scopes: HashMap<Scope, Vec<AlbumId>>,
    missing: HashSet<TrackId>,
    failing: bool,
}

/// Library held in memory
///
/// Albums keep insertion order, which is also the order of [`Scope::All`].
/// Track files live under `/music/{album}/{track}.flac`.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    data: RwLock<CatalogData>,
}

impl MemoryCatalog {
    /// Empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an album with `(track id, seconds)` entries in album order
    pub fn add_album(
        &self,
        album: AlbumId,
        artist: ArtistId,
        genre: Option<GenreId>,
        tracks: &[(i64, u64)],
    ) {
        let tracks: Vec<Track> = tracks
            .iter()
            .map(|&(id, secs)| {
                Track::new(TrackId::new(id), format!("/music/{album}/{id}.flac"))
                    .with_album(album, artist)
                    .with_duration(Duration::from_secs(secs))
                    .with_title(format!("Track {id}"))
                    .with_names(
                        format!("Artist {artist}"),
                        format!("Album {album}"),
                        genre.map(|g| format!("Genre {g}")).unwrap_or_default(),
                    )
            })
            .collect();
        self.add_tracks(album, artist, genre, tracks);
    }

    /// Add an album made of prebuilt tracks
    pub fn add_tracks(
        &self,
        album: AlbumId,
        artist: ArtistId,
        genre: Option<GenreId>,
        tracks: Vec<Track>,
    ) {
        let mut data = self.write();
        data.albums.retain(|a| a.id != album);
        data.albums.push(AlbumEntry {
            id: album,
            artist,
            genre,
            tracks: tracks.iter().map(|t| t.id).collect(),
        });
        for track in tracks {
            data.tracks.insert(track.id, track);
        }
    }

    /// Pin the albums returned for `scope`
    pub fn set_scope(&self, scope: Scope, albums: Vec<AlbumId>) {
        self.write().scopes.insert(scope, albums);
    }

    /// Drop an album and its tracks
    pub fn remove_album(&self, album: AlbumId) {
        let mut data = self.write();
        if let Some(index) = data.albums.iter().position(|a| a.id == album) {
            let entry = data.albums.remove(index);
            for id in entry.tracks {
                data.tracks.remove(&id);
            }
        }
    }

    /// Pretend the file of `track` was deleted
    pub fn mark_missing(&self, track: TrackId) {
        self.write().missing.insert(track);
    }

    /// Make every query fail
    pub fn set_failing(&self, failing: bool) {
        self.write().failing = failing;
    }

    /// Album ids in insertion order
    pub fn album_ids(&self) -> Vec<AlbumId> {
        self.read().albums.iter().map(|a| a.id).collect()
    }

    /// Every track, album by album
    pub fn tracks(&self) -> Vec<Track> {
        let data = self.read();
        data.albums
            .iter()
            .flat_map(|a| a.tracks.iter())
            .filter_map(|id| data.tracks.get(id).cloned())
            .collect()
    }

    /// Track by raw id
    ///
    /// # Panics
    ///
    /// Panics if the track was never added.
    pub fn track_by_id(&self, id: i64) -> Track {
        match self.read().tracks.get(&TrackId::new(id)) {
            Some(track) => track.clone(),
            None => panic!("track {id} is not in the memory catalog"),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CatalogData> {
        self.data
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CatalogData> {
        self.data
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check(data: &CatalogData) -> cadenza_core::Result<()> {
        if data.failing {
            return Err(cadenza_core::CoreError::catalog("catalog unavailable"));
        }
        Ok(())
    }
}

impl Catalog for MemoryCatalog {
    fn track(&self, id: TrackId) -> cadenza_core::Result<Option<Track>> {
        let data = self.read();
        Self::check(&data)?;
        Ok(data.tracks.get(&id).cloned())
    }

    fn tracks_for_album(
        &self,
        album: AlbumId,
        genre: Option<GenreId>,
    ) -> cadenza_core::Result<Vec<Track>> {
        let data = self.read();
        Self::check(&data)?;
        let Some(entry) = data.albums.iter().find(|a| a.id == album) else {
            return Ok(Vec::new());
        };
        if genre.is_some() && entry.genre != genre {
            return Ok(Vec::new());
        }
        Ok(entry
            .tracks
            .iter()
            .filter_map(|id| data.tracks.get(id).cloned())
            .collect())
    }

    fn albums_for_scope(&self, scope: &Scope) -> cadenza_core::Result<Vec<AlbumId>> {
        let data = self.read();
        Self::check(&data)?;
        if let Some(albums) = data.scopes.get(scope) {
            return Ok(albums.clone());
        }
        let albums = data.albums.iter();
        Ok(match scope {
            Scope::All | Scope::Random => albums.map(|a| a.id).collect(),
            Scope::Genre(genre) => albums
                .filter(|a| a.genre == Some(*genre))
                .map(|a| a.id)
                .collect(),
            Scope::Artist(artist) => albums
                .filter(|a| a.artist == *artist)
                .map(|a| a.id)
                .collect(),
            Scope::Popular | Scope::Recent | Scope::Compilations => Vec::new(),
        })
    }

    fn album_of(&self, track: TrackId) -> cadenza_core::Result<Option<AlbumId>> {
        let data = self.read();
        Self::check(&data)?;
        Ok(data.tracks.get(&track).map(|t| t.album_id))
    }

    fn album_artist_of(&self, track: TrackId) -> cadenza_core::Result<Option<ArtistId>> {
        let data = self.read();
        Self::check(&data)?;
        Ok(data.tracks.get(&track).map(|t| t.album_artist_id))
    }

    fn path_exists(&self, track: &Track) -> bool {
        !self.read().missing.contains(&track.id)
    }

    fn genre_ids(&self) -> cadenza_core::Result<Vec<GenreId>> {
        let data = self.read();
        Self::check(&data)?;
        let mut genres: Vec<GenreId> = data.albums.iter().filter_map(|a| a.genre).collect();
        genres.sort();
        genres.dedup();
        Ok(genres)
    }
}

// ===== Other Collaborators =====

/// Playlists held in memory
#[derive(Debug, Default)]
pub struct MemoryPlaylists {
    playlists: RwLock<HashMap<PlaylistId, Vec<TrackId>>>,
}

impl MemoryPlaylists {
    /// No playlists
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a playlist
    pub fn set(&self, playlist: PlaylistId, tracks: Vec<TrackId>) {
        self.playlists
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(playlist, tracks);
    }
}

impl PlaylistStore for MemoryPlaylists {
    fn track_ids(&self, playlist: PlaylistId) -> cadenza_core::Result<Vec<TrackId>> {
        self.playlists
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&playlist)
            .cloned()
            .ok_or(cadenza_core::CoreError::PlaylistNotFound(playlist))
    }
}

/// Fixed radio directory
#[derive(Debug, Clone, Default)]
pub struct MemoryRadios {
    stations: Vec<RadioStation>,
}

impl MemoryRadios {
    /// Directory with `stations` in display order
    pub fn new(stations: Vec<RadioStation>) -> Self {
        Self { stations }
    }
}

impl RadioDirectory for MemoryRadios {
    fn stations(&self) -> cadenza_core::Result<Vec<RadioStation>> {
        Ok(self.stations.clone())
    }
}

/// Notifier that keeps every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// No messages yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in delivery order
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }
}

/// Settings held in memory
#[derive(Debug, Default)]
pub struct MemorySettings {
    state: Mutex<PersistedState>,
}

impl MemorySettings {
    /// Settings starting from `state`
    pub fn new(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Last saved state
    pub fn state(&self) -> PersistedState {
        lock(&self.state).clone()
    }
}

impl SettingsStore for MemorySettings {
    fn load_state(&self) -> cadenza_core::Result<PersistedState> {
        Ok(self.state())
    }

    fn save_state(&self, state: &PersistedState) -> cadenza_core::Result<()> {
        *lock(&self.state) = state.clone();
        Ok(())
    }
}
