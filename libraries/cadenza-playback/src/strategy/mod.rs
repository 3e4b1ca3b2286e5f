//! Track selection strategies
//!
//! Each strategy answers "what comes next / before" for one playback mode, or
//! declines with `None`. The chain consults them in fixed priority order and
//! the first answer wins:
//!
//! 1. [`RadioStrategy`] (radio stream playing)
//! 2. [`QueueStrategy`] (explicit queue, forward only)
//! 3. [`PlaylistStrategy`] (user playlist)
//! 4. [`ShuffleStrategy`] (track shuffle or party)
//! 5. [`LinearStrategy`] (album order)
//!
//! Strategies only read the catalog; mutations they make go to the snapshot
//! of [`SelectionState`] they are handed (shuffle bookkeeping, resolved
//! positions) and are committed by the player.

pub mod linear;
pub mod playlist;
pub mod queue;
pub mod radio;
pub mod shuffle;

pub use linear::LinearStrategy;
pub use playlist::{PlaylistStrategy, UserPlaylist};
pub use queue::{ExplicitQueue, QueueStrategy};
pub use radio::RadioStrategy;
pub use shuffle::{PlayedBookkeeping, ShuffleStrategy};

use crate::selection::SelectionState;
use cadenza_core::{Catalog, RadioDirectory, Track};
use std::sync::Arc;

/// One playback mode's answer to next/previous
pub trait SelectionStrategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Track to play after the current one, `None` to defer
    fn resolve_next(&self, state: &mut SelectionState, catalog: &dyn Catalog) -> Option<Track>;

    /// Track to play before the current one, `None` to defer
    fn resolve_prev(&self, state: &mut SelectionState, catalog: &dyn Catalog) -> Option<Track>;
}

/// Strategies in priority order
pub struct StrategyChain {
    strategies: Vec<Box<dyn SelectionStrategy>>,
}

impl StrategyChain {
    /// Build a chain from strategies already in priority order
    pub fn new(strategies: Vec<Box<dyn SelectionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Radio, queue, playlist, shuffle, linear
    pub fn standard(radios: Arc<dyn RadioDirectory>) -> Self {
        Self::new(vec![
            Box::new(RadioStrategy::new(radios)),
            Box::new(QueueStrategy),
            Box::new(PlaylistStrategy),
            Box::new(ShuffleStrategy),
            Box::new(LinearStrategy),
        ])
    }

    /// First non-empty next answer
    pub fn resolve_next(&self, state: &mut SelectionState, catalog: &dyn Catalog) -> Option<Track> {
        for strategy in &self.strategies {
            if let Some(track) = strategy.resolve_next(state, catalog) {
                tracing::trace!(strategy = strategy.name(), track = %track.id, "Resolved next track");
                return Some(track);
            }
        }
        None
    }

    /// First non-empty previous answer
    pub fn resolve_prev(&self, state: &mut SelectionState, catalog: &dyn Catalog) -> Option<Track> {
        for strategy in &self.strategies {
            if let Some(track) = strategy.resolve_prev(state, catalog) {
                tracing::trace!(strategy = strategy.name(), track = %track.id, "Resolved previous track");
                return Some(track);
            }
        }
        None
    }

    /// Number of strategies
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::{RadioStation, TrackId};

    struct NoStations;

    impl RadioDirectory for NoStations {
        fn stations(&self) -> cadenza_core::Result<Vec<RadioStation>> {
            Ok(Vec::new())
        }
    }

    struct Fixed(&'static str, Option<i64>);

    impl SelectionStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn resolve_next(&self, _: &mut SelectionState, _: &dyn Catalog) -> Option<Track> {
            self.1.map(|id| Track::new(TrackId::new(id), "/x.flac"))
        }

        fn resolve_prev(&self, _: &mut SelectionState, _: &dyn Catalog) -> Option<Track> {
            None
        }
    }

    #[test]
    fn standard_chain_order() {
        let chain = StrategyChain::standard(Arc::new(NoStations));
        assert_eq!(chain.len(), 5);
        assert_eq!(
            format!("{chain:?}"),
            r#"["radio", "queue", "playlist", "shuffle", "linear"]"#
        );
    }

    #[test]
    fn first_answer_wins() {
        let chain = StrategyChain::new(vec![
            Box::new(Fixed("empty", None)),
            Box::new(Fixed("first", Some(1))),
            Box::new(Fixed("second", Some(2))),
        ]);
        let catalog = crate::sim::MemoryCatalog::new();
        let mut state = SelectionState::default();

        let next = chain.resolve_next(&mut state, &catalog).unwrap();
        assert_eq!(next.id, TrackId::new(1));
        assert!(chain.resolve_prev(&mut state, &catalog).is_none());
    }
}
