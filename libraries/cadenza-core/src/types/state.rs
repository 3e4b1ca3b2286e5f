//! Player state persisted between sessions

use crate::types::{Scope, ShuffleMode, TrackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Restorable player state
///
/// The settings backend decides the storage format; the player only reads this
/// on startup and produces it on shutdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Whether the state should be restored at all
    pub save_state: bool,

    /// Last playing track
    pub last_track_id: Option<TrackId>,

    /// Shuffle mode
    pub shuffle: ShuffleMode,

    /// Party mode flag
    pub party: bool,

    /// Party buckets
    pub party_scopes: Vec<Scope>,

    /// When the state was captured
    pub saved_at: Option<DateTime<Utc>>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            save_state: true,
            last_track_id: None,
            shuffle: ShuffleMode::None,
            party: false,
            party_scopes: Vec::new(),
            saved_at: None,
        }
    }
}
