//! Dual-pipeline gapless engine
//!
//! Two pipelines alternate roles. The active one plays the current track; the
//! standby one is prepared with the next track shortly before the active one
//! ends, then started at the boundary while the old one is stopped.
//!
//! Timing is driven by deadlines rather than callbacks: the engine arms a
//! preload deadline (end minus lead) and a swap deadline (end) whenever the
//! remaining time of the active track becomes known. The owner polls
//! [`DualPipelineEngine::take_due`] with the current clock time.
//!
//! Whenever a slot's source is replaced or released the engine bumps that
//! slot's [`SourceCounter`]; bus messages stamped with an older count are
//! reports about a source that is gone.

use crate::error::{PlaybackError, Result};
use crate::pipeline::{BusMessage, Pipeline, PipelineSlot, SourceCounter};
use crate::types::{PlaybackState, ReplayGainMode};
use cadenza_core::Track;
use std::time::Duration;

/// What a deadline triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Prepare the standby pipeline with the next track
    Preload,

    /// Start the standby pipeline and stop the active one
    Swap,

    /// Skip past a failed or missing source
    SkipAfterError,
}

/// Armed deadline, tied to the load generation that armed it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    /// Clock time at which the timer fires
    pub at: Duration,

    /// Load generation the timer belongs to
    pub generation: u64,

    /// Action
    pub kind: TimerKind,
}

/// Two pipelines, one active and one standby
pub struct DualPipelineEngine {
    pipelines: [Box<dyn Pipeline>; 2],
    sources: [SourceCounter; 2],
    active: PipelineSlot,
    state: PlaybackState,
    has_source: bool,
    standby: Option<Track>,
    timers: Vec<Timer>,
    lead: Duration,
}

impl DualPipelineEngine {
    /// Create an engine; slot A starts as the active pipeline
    pub fn new(a: Box<dyn Pipeline>, b: Box<dyn Pipeline>, lead: Duration) -> Self {
        Self {
            pipelines: [a, b],
            sources: [SourceCounter::default(), SourceCounter::default()],
            active: PipelineSlot::A,
            state: PlaybackState::Stopped,
            has_source: false,
            standby: None,
            timers: Vec::new(),
            lead,
        }
    }

    /// Share source counters with the buses of the two pipelines
    #[must_use]
    pub fn with_source_counters(mut self, a: SourceCounter, b: SourceCounter) -> Self {
        self.sources = [a, b];
        self
    }

    /// Check if a bus message is about the source currently bound to its slot
    pub fn is_current(&self, message: &BusMessage) -> bool {
        self.sources[message.slot.index()].current() == message.source
    }

    /// Transport state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Override the transport state (stream start confirmations)
    pub fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
    }

    /// Slot currently producing the audible output
    pub fn active_slot(&self) -> PipelineSlot {
        self.active
    }

    /// Check if a bus message comes from the active pipeline
    pub fn is_active(&self, slot: PipelineSlot) -> bool {
        self.active == slot
    }

    /// Track bound to the standby pipeline
    pub fn standby_track(&self) -> Option<&Track> {
        self.standby.as_ref()
    }

    /// Position of the active pipeline
    pub fn position(&self) -> Option<Duration> {
        self.pipelines[self.active.index()].position()
    }

    /// Bind a track to the active pipeline and start it
    ///
    /// Clears every timer and any prepared standby. The state becomes
    /// `Loading` until the stream start is confirmed.
    pub fn load(&mut self, uri: &str) -> Result<()> {
        self.timers.clear();
        self.cancel_standby();

        self.sources[self.active.index()].bump();
        let active = self.active_mut();
        active.stop();
        active.set_source(uri)?;
        active.play()?;

        self.has_source = true;
        self.state = PlaybackState::Loading;
        Ok(())
    }

    /// Resume or restart output
    pub fn play(&mut self) -> Result<()> {
        if !self.has_source {
            return Err(PlaybackError::NoTrackLoaded);
        }
        self.active_mut().play()?;
        self.state = match self.state {
            PlaybackState::Stopped => PlaybackState::Loading,
            PlaybackState::Loading => PlaybackState::Loading,
            PlaybackState::Playing | PlaybackState::Paused => PlaybackState::Playing,
        };
        Ok(())
    }

    /// Pause output; handoff deadlines are disarmed, the standby is kept
    pub fn pause(&mut self) -> Result<()> {
        if !self.has_source {
            return Err(PlaybackError::NoTrackLoaded);
        }
        self.active_mut().pause()?;
        self.disarm_handoff();
        self.state = PlaybackState::Paused;
        Ok(())
    }

    /// Halt both pipelines and drop every timer
    pub fn stop(&mut self) {
        for (pipeline, source) in self.pipelines.iter_mut().zip(&self.sources) {
            source.bump();
            pipeline.stop();
        }
        self.standby = None;
        self.has_source = false;
        self.timers.clear();
        self.state = PlaybackState::Stopped;
    }

    /// Jump within the active track
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        if !self.has_source {
            return Err(PlaybackError::NoTrackLoaded);
        }
        self.active_mut().seek(position)
    }

    /// Arm preload and swap deadlines from the active pipeline's position
    ///
    /// Does nothing for tracks of unknown duration (streams); those rely on
    /// end-of-stream alone. The preload deadline is skipped when a standby is
    /// already prepared.
    pub fn arm_handoff(&mut self, now: Duration, duration: Option<Duration>, generation: u64) {
        self.disarm_handoff();
        let Some(duration) = duration.filter(|d| !d.is_zero()) else {
            return;
        };

        let position = self.position().unwrap_or_default();
        let remaining = duration.saturating_sub(position);

        if self.standby.is_none() {
            self.schedule(TimerKind::Preload, now + remaining.saturating_sub(self.lead), generation);
        }
        self.schedule(TimerKind::Swap, now + remaining, generation);
    }

    /// Drop pending preload and swap deadlines
    pub fn disarm_handoff(&mut self) {
        self.timers
            .retain(|t| !matches!(t.kind, TimerKind::Preload | TimerKind::Swap));
    }

    /// Bind the next track to the standby pipeline and preroll it
    pub fn prepare_standby(&mut self, track: Track) -> Result<()> {
        let slot = self.active.other().index();
        self.sources[slot].bump();
        let standby = &mut self.pipelines[slot];
        standby.stop();
        standby.set_source(&track.uri)?;
        standby.preroll()?;
        self.standby = Some(track);
        Ok(())
    }

    /// Release the standby pipeline
    pub fn cancel_standby(&mut self) {
        if self.standby.take().is_some() {
            let slot = self.active.other().index();
            self.sources[slot].bump();
            self.pipelines[slot].stop();
        }
    }

    /// Start the standby pipeline, stop the active one, exchange roles
    ///
    /// Returns the track that became active, or `None` without a standby.
    pub fn swap(&mut self) -> Result<Option<Track>> {
        let Some(track) = self.standby.take() else {
            return Ok(None);
        };

        let next = self.active.other();
        if let Err(e) = self.pipelines[next.index()].play() {
            self.sources[next.index()].bump();
            self.pipelines[next.index()].stop();
            return Err(e);
        }
        self.sources[self.active.index()].bump();
        self.pipelines[self.active.index()].stop();
        self.active = next;
        self.disarm_handoff();
        self.has_source = true;
        self.state = PlaybackState::Playing;
        Ok(Some(track))
    }

    /// Arm a deadline
    pub fn schedule(&mut self, kind: TimerKind, at: Duration, generation: u64) {
        self.timers.push(Timer {
            at,
            generation,
            kind,
        });
    }

    /// Remove and return every deadline due at `now`, earliest first
    pub fn take_due(&mut self, now: Duration) -> Vec<Timer> {
        let (mut due, pending): (Vec<Timer>, Vec<Timer>) =
            self.timers.drain(..).partition(|t| t.at <= now);
        self.timers = pending;
        due.sort_by_key(|t| t.at);
        due
    }

    /// Earliest armed deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.iter().map(|t| t.at).min()
    }

    /// Apply output gain to both pipelines
    pub fn set_volume(&mut self, gain: f64) {
        for pipeline in &mut self.pipelines {
            pipeline.set_volume(gain);
        }
    }

    /// Apply the replay-gain hint to both pipelines
    pub fn set_replay_gain(&mut self, mode: ReplayGainMode) {
        for pipeline in &mut self.pipelines {
            pipeline.set_replay_gain(mode);
        }
    }

    fn active_mut(&mut self) -> &mut Box<dyn Pipeline> {
        &mut self.pipelines[self.active.index()]
    }
}

impl std::fmt::Debug for DualPipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualPipelineEngine")
            .field("active", &self.active)
            .field("state", &self.state)
            .field("standby", &self.standby.as_ref().map(|t| t.id))
            .field("timers", &self.timers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualClock, PipelineOp, SimRig};
    use cadenza_core::TrackId;

    fn engine(rig: &SimRig) -> DualPipelineEngine {
        let mut factory = rig.factory();
        let (a, b) = rig.buses();
        let counters = (a.source_counter(), b.source_counter());
        DualPipelineEngine::new(
            factory(PipelineSlot::A, a),
            factory(PipelineSlot::B, b),
            Duration::from_millis(100),
        )
        .with_source_counters(counters.0, counters.1)
    }

    fn end_of_stream(engine: &DualPipelineEngine, slot: PipelineSlot) -> BusMessage {
        BusMessage {
            slot,
            source: engine.sources[slot.index()].current(),
            kind: crate::pipeline::BusMessageKind::EndOfStream,
        }
    }

    fn track(id: i64, secs: u64) -> Track {
        Track::new(TrackId::new(id), format!("/music/{id}.flac"))
            .with_duration(Duration::from_secs(secs))
    }

    #[test]
    fn load_enters_loading() {
        let rig = SimRig::new(ManualClock::new());
        let mut engine = engine(&rig);
        engine.load("/music/1.flac").unwrap();
        assert_eq!(engine.state(), PlaybackState::Loading);
        assert_eq!(rig.playing_uri(PipelineSlot::A).as_deref(), Some("/music/1.flac"));
    }

    #[test]
    fn play_without_source_fails() {
        let rig = SimRig::new(ManualClock::new());
        let mut engine = engine(&rig);
        assert!(matches!(engine.play(), Err(PlaybackError::NoTrackLoaded)));
        assert!(matches!(engine.pause(), Err(PlaybackError::NoTrackLoaded)));
    }

    #[test]
    fn arm_handoff_from_position() {
        let clock = ManualClock::new();
        let rig = SimRig::new(clock.clone());
        let mut engine = engine(&rig);
        let t = track(1, 10);
        engine.load(&t.uri).unwrap();

        clock.advance(Duration::from_secs(4));
        engine.arm_handoff(clock.now(), t.duration, 1);

        assert_eq!(engine.next_deadline(), Some(Duration::from_millis(9_900)));
        let due = engine.take_due(Duration::from_secs(10));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].kind, TimerKind::Preload);
        assert_eq!(due[1].kind, TimerKind::Swap);
        assert_eq!(due[1].at, Duration::from_secs(10));
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn unknown_duration_arms_nothing() {
        let rig = SimRig::new(ManualClock::new());
        let mut engine = engine(&rig);
        engine.load("http://radio.example/stream").unwrap();
        engine.arm_handoff(Duration::ZERO, None, 1);
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn pause_disarms_but_keeps_standby() {
        let rig = SimRig::new(ManualClock::new());
        let mut engine = engine(&rig);
        engine.load("/music/1.flac").unwrap();
        engine.arm_handoff(Duration::ZERO, Some(Duration::from_secs(5)), 1);
        engine.prepare_standby(track(2, 5)).unwrap();

        engine.pause().unwrap();
        assert_eq!(engine.state(), PlaybackState::Paused);
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(engine.standby_track().map(|t| t.id), Some(TrackId::new(2)));
    }

    #[test]
    fn swap_exchanges_roles() {
        let clock = ManualClock::new();
        let rig = SimRig::new(clock.clone());
        let mut engine = engine(&rig);
        engine.load("/music/1.flac").unwrap();
        engine.prepare_standby(track(2, 5)).unwrap();

        clock.advance(Duration::from_secs(5));
        let swapped = engine.swap().unwrap().unwrap();

        assert_eq!(swapped.id, TrackId::new(2));
        assert_eq!(engine.active_slot(), PipelineSlot::B);
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert!(engine.standby_track().is_none());

        let log = rig.log().entries();
        let played = log
            .iter()
            .find(|e| e.slot == PipelineSlot::B && e.op == PipelineOp::Played)
            .unwrap();
        let stopped = log
            .iter()
            .rev()
            .find(|e| e.slot == PipelineSlot::A && e.op == PipelineOp::Stopped)
            .unwrap();
        assert_eq!(played.at, Duration::from_secs(5));
        assert_eq!(stopped.at, Duration::from_secs(5));

        assert!(engine.swap().unwrap().is_none());
    }

    #[test]
    fn load_clears_standby_and_timers() {
        let rig = SimRig::new(ManualClock::new());
        let mut engine = engine(&rig);
        engine.load("/music/1.flac").unwrap();
        engine.prepare_standby(track(2, 5)).unwrap();
        engine.schedule(TimerKind::SkipAfterError, Duration::from_secs(2), 1);

        engine.load("/music/3.flac").unwrap();
        assert!(engine.standby_track().is_none());
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(engine.active_slot(), PipelineSlot::A);
    }

    #[test]
    fn stop_resets_everything() {
        let rig = SimRig::new(ManualClock::new());
        let mut engine = engine(&rig);
        engine.load("/music/1.flac").unwrap();
        engine.schedule(TimerKind::SkipAfterError, Duration::from_secs(2), 1);
        engine.stop();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.next_deadline(), None);
        assert!(rig.playing_uri(PipelineSlot::A).is_none());
    }

    #[test]
    fn replaced_sources_make_their_messages_stale() {
        let rig = SimRig::new(ManualClock::new());
        let mut engine = engine(&rig);
        engine.load("/music/1.flac").unwrap();
        let first = end_of_stream(&engine, PipelineSlot::A);
        assert!(engine.is_current(&first));

        engine.prepare_standby(track(2, 5)).unwrap();
        let prepared = end_of_stream(&engine, PipelineSlot::B);
        assert!(engine.is_current(&first));

        engine.swap().unwrap();
        assert!(!engine.is_current(&first));
        assert!(engine.is_current(&prepared));

        engine.load("/music/3.flac").unwrap();
        assert!(!engine.is_current(&prepared));
    }
}
