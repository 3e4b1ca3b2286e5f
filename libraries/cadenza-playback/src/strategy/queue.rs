//! Explicit queue
//!
//! Tracks the user asked to hear next. The head is the next track; it is
//! consumed when the player actually loads it, so resolving the next track any
//! number of times never drains the queue.

use super::SelectionStrategy;
use crate::selection::SelectionState;
use cadenza_core::{Catalog, Track, TrackId};
use std::collections::VecDeque;

/// Ordered list of user-enqueued tracks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplicitQueue {
    tracks: VecDeque<Track>,
}

impl ExplicitQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track
    pub fn push_back(&mut self, track: Track) {
        self.tracks.push_back(track);
    }

    /// Insert a track at the head ("play next")
    pub fn push_front(&mut self, track: Track) {
        self.tracks.push_front(track);
    }

    /// Next queued track
    pub fn front(&self) -> Option<&Track> {
        self.tracks.front()
    }

    /// Remove the head if it is `id`
    ///
    /// Returns whether the head was consumed.
    pub fn consume_head(&mut self, id: TrackId) -> bool {
        if self.tracks.front().is_some_and(|t| t.id == id) {
            self.tracks.pop_front();
            true
        } else {
            false
        }
    }

    /// Remove the first occurrence of `id`
    pub fn remove(&mut self, id: TrackId) -> bool {
        match self.tracks.iter().position(|t| t.id == id) {
            Some(index) => {
                self.tracks.remove(index);
                true
            }
            None => false,
        }
    }

    /// Check if `id` is queued
    pub fn contains(&self, id: TrackId) -> bool {
        self.tracks.iter().any(|t| t.id == id)
    }

    /// Remove every track
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Queued tracks in play order
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Number of queued tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Queue head wins over everything but radio; no opinion on "previous"
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStrategy;

impl SelectionStrategy for QueueStrategy {
    fn name(&self) -> &'static str {
        "queue"
    }

    fn resolve_next(&self, state: &mut SelectionState, _catalog: &dyn Catalog) -> Option<Track> {
        state.queue.front().cloned()
    }

    fn resolve_prev(&self, _state: &mut SelectionState, _catalog: &dyn Catalog) -> Option<Track> {
        None
    }
}
