//! Player Events
//!
//! Events are emitted while the player lock is held, so every subscriber sees
//! them in the order the state changed. Emitted at:
//! - Stream start of a new track (once per load)
//! - Transport state changes
//! - Party, volume, queue and seek changes
//! - Standby pipeline preparation
//! - Source errors and missing files

use crate::types::PlaybackState;
use cadenza_core::{Track, TrackId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Events emitted by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// A new track started streaming
    CurrentTrackChanged {
        /// The new current track
        track: Track,
    },

    /// Metadata of the current track changed without a track change
    /// (radio stream titles)
    TrackMetadataChanged {
        /// The current track with updated metadata
        track: Track,
    },

    /// Transport state changed
    StatusChanged {
        /// The new state
        state: PlaybackState,
    },

    /// Party mode toggled
    PartyChanged {
        /// Whether party mode is on
        enabled: bool,
    },

    /// Volume changed
    VolumeChanged {
        /// Linear rate (0.0-1.0)
        rate: f64,
        /// Whether output is muted
        is_muted: bool,
    },

    /// Position jumped
    Seeked {
        /// New position
        position: Duration,
    },

    /// Explicit queue changed
    QueueChanged {
        /// New queue length
        length: usize,
    },

    /// Next track bound to the standby pipeline
    NextTrackPrepared {
        /// ID of the prepared track
        track_id: TrackId,
    },

    /// A source failed or is missing
    Error {
        /// URI of the failing source
        uri: String,
        /// Error message
        message: String,
    },
}

/// Fan-out of player events to any number of subscribers
///
/// Disconnected subscribers are dropped on the next emit.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<PlayerEvent>>,
}

impl EventBus {
    /// Create a bus without subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver an event to every live subscriber
    pub fn emit(&mut self, event: PlayerEvent) {
        tracing::trace!(?event, "Emitting player event");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers (as of the last emit)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_events_in_order() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.emit(PlayerEvent::PartyChanged { enabled: true });
        bus.emit(PlayerEvent::QueueChanged { length: 2 });

        for rx in [a, b] {
            assert_eq!(rx.try_recv().unwrap(), PlayerEvent::PartyChanged { enabled: true });
            assert_eq!(rx.try_recv().unwrap(), PlayerEvent::QueueChanged { length: 2 });
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());

        bus.emit(PlayerEvent::StatusChanged {
            state: PlaybackState::Playing,
        });
        assert_eq!(bus.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }

    #[test]
    fn events_serialize() {
        let event = PlayerEvent::NextTrackPrepared {
            track_id: TrackId::new(3),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"NextTrackPrepared":{"track_id":3}}"#);
    }
}
