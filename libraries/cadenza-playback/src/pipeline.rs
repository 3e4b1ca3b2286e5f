//! Audio pipeline abstraction
//!
//! A pipeline decodes and renders one source. The engine owns two of them and
//! alternates: while one plays, the other can be prepared with the next track.
//! Pipelines report asynchronously through a [`Bus`]; the player drains those
//! messages outside of any pipeline call. Every message is stamped with the
//! slot's [`SourceCounter`], so reports about a source that has since been
//! replaced can be dropped.

use crate::error::Result;
use crate::types::ReplayGainMode;
use crossbeam_channel::Sender;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Which of the two pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineSlot {
    /// First pipeline
    A,
    /// Second pipeline
    B,
}

impl PipelineSlot {
    /// Array index of the slot
    pub fn index(self) -> usize {
        match self {
            PipelineSlot::A => 0,
            PipelineSlot::B => 1,
        }
    }

    /// The other slot
    pub fn other(self) -> Self {
        match self {
            PipelineSlot::A => PipelineSlot::B,
            PipelineSlot::B => PipelineSlot::A,
        }
    }
}

impl fmt::Display for PipelineSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineSlot::A => write!(f, "A"),
            PipelineSlot::B => write!(f, "B"),
        }
    }
}

/// What a pipeline reports
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessageKind {
    /// Audio of the bound source started flowing
    StreamStart,

    /// The source is close to its end
    AboutToFinish,

    /// The source ended
    EndOfStream,

    /// The source could not be played
    Error(String),

    /// Stream title tag (radio)
    Tag {
        /// Title announced by the stream
        title: String,
    },
}

/// Number of sources bound to one slot so far
///
/// Shared between the engine, which bumps it whenever the slot's source is
/// replaced or released, and the slot's bus, which stamps it on messages.
#[derive(Debug, Clone, Default)]
pub struct SourceCounter(Arc<AtomicU64>);

impl SourceCounter {
    /// Current count
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn bump(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

/// Message posted by a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    /// Originating pipeline
    pub slot: PipelineSlot,

    /// Source count of the slot when the message was posted
    pub source: u64,

    /// Payload
    pub kind: BusMessageKind,
}

/// Posting end of the message bus handed to each pipeline
#[derive(Debug, Clone)]
pub struct Bus {
    slot: PipelineSlot,
    source: SourceCounter,
    tx: Sender<BusMessage>,
}

impl Bus {
    pub(crate) fn new(slot: PipelineSlot, tx: Sender<BusMessage>) -> Self {
        Self {
            slot,
            source: SourceCounter::default(),
            tx,
        }
    }

    /// Slot this bus posts for
    pub fn slot(&self) -> PipelineSlot {
        self.slot
    }

    /// Counter stamped on this bus's messages
    pub fn source_counter(&self) -> SourceCounter {
        self.source.clone()
    }

    /// Post a message; silently dropped once the player is gone
    pub fn post(&self, kind: BusMessageKind) {
        let message = BusMessage {
            slot: self.slot,
            source: self.source.current(),
            kind,
        };
        if self.tx.send(message).is_err() {
            tracing::trace!(slot = %self.slot, "Bus closed, dropping message");
        }
    }
}

/// One decode/render pipeline
///
/// Implementations must not call back into the player; everything they need
/// to report goes through their [`Bus`].
pub trait Pipeline: Send {
    /// Bind a source, discarding the previous one
    fn set_source(&mut self, uri: &str) -> Result<()>;

    /// Prepare the bound source without producing audio
    fn preroll(&mut self) -> Result<()>;

    /// Start or resume output
    fn play(&mut self) -> Result<()>;

    /// Pause output, keeping the position
    fn pause(&mut self) -> Result<()>;

    /// Halt and release the source
    fn stop(&mut self);

    /// Jump within the bound source
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Position within the bound source
    fn position(&self) -> Option<Duration>;

    /// Output gain (0.0-1.0)
    fn set_volume(&mut self, gain: f64);

    /// Replay-gain hint
    fn set_replay_gain(&mut self, _mode: ReplayGainMode) {}
}

/// Builds the pipeline of a slot around its bus
pub type PipelineFactory = Box<dyn FnMut(PipelineSlot, Bus) -> Box<dyn Pipeline> + Send>;
