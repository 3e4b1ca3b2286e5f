//! Core types for playback orchestration

use cadenza_core::{Scope, ShuffleMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport state of the engine
///
/// The error condition is not a state of its own: a failed source keeps the
/// previous state while the skip timer is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No track loaded, or transport halted
    #[default]
    Stopped,

    /// Source bound, waiting for the stream to start
    Loading,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,
}

/// Replay-gain hint pushed to both pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayGainMode {
    /// Album gain for album-ordered listening
    #[default]
    Album,

    /// Track gain when tracks come from different albums
    Track,
}

/// Configuration for the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// How long before the end of a track the standby pipeline is prepared
    pub gapless_lead_ms: u64,

    /// Delay before skipping past a failed or missing source
    pub error_skip_delay_ms: u64,

    /// Soft cap on history ledger nodes (0 = unbounded)
    pub history_limit: usize,

    /// Initial volume rate (0.0..=1.0)
    pub volume: f64,

    /// Initial shuffle mode
    pub shuffle: ShuffleMode,

    /// Party buckets; empty means the whole library
    pub party_scopes: Vec<Scope>,

    /// Run catalog queries on a background thread
    ///
    /// When disabled, queued work runs on the calling thread right after the
    /// public call that produced it returns. Tests use this for determinism.
    pub background_worker: bool,
}

impl PlayerConfig {
    /// Gapless lead as a duration
    pub fn gapless_lead(&self) -> Duration {
        Duration::from_millis(self.gapless_lead_ms)
    }

    /// Error skip delay as a duration
    pub fn error_skip_delay(&self) -> Duration {
        Duration::from_millis(self.error_skip_delay_ms)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            gapless_lead_ms: 100,
            error_skip_delay_ms: 2000,
            history_limit: 500,
            volume: 1.0,
            shuffle: ShuffleMode::None,
            party_scopes: Vec::new(),
            background_worker: true,
        }
    }
}
