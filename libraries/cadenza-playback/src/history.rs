//! Shuffle history ledger
//!
//! Doubly linked list of played track ids with a cursor, stored in an arena.
//! Stepping backward then forward returns to the same id. Recording a new id
//! while stepped back replaces the forward branch.

use cadenza_core::TrackId;

#[derive(Debug, Clone, Copy)]
struct Node {
    track: TrackId,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Played-track ledger used by track-level shuffle and party mode
#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
    nodes: Vec<Node>,
    cursor: Option<usize>,

    /// Soft cap on arena size (0 = unbounded)
    limit: usize,
}

impl HistoryLedger {
    /// Create an empty ledger
    ///
    /// `limit` bounds how many nodes are kept once the arena is compacted;
    /// 0 disables compaction.
    pub fn new(limit: usize) -> Self {
        Self {
            nodes: Vec::new(),
            cursor: None,
            limit,
        }
    }

    /// Track at the cursor
    pub fn current(&self) -> Option<TrackId> {
        self.cursor.map(|i| self.nodes[i].track)
    }

    /// Track one step forward, without moving
    pub fn peek_forward(&self) -> Option<TrackId> {
        let next = self.nodes[self.cursor?].next?;
        Some(self.nodes[next].track)
    }

    /// Track one step backward, without moving
    pub fn peek_backward(&self) -> Option<TrackId> {
        let prev = self.nodes[self.cursor?].prev?;
        Some(self.nodes[prev].track)
    }

    /// Append a track after the cursor and move onto it
    ///
    /// Does nothing if the track is already at the cursor. Returns whether a
    /// node was added.
    pub fn record(&mut self, track: TrackId) -> bool {
        if self.current() == Some(track) {
            return false;
        }

        let index = self.nodes.len();
        self.nodes.push(Node {
            track,
            prev: self.cursor,
            next: None,
        });
        if let Some(cursor) = self.cursor {
            self.nodes[cursor].next = Some(index);
        }
        self.cursor = Some(index);

        if self.limit > 0 && self.nodes.len() > self.limit.saturating_mul(2) {
            self.compact();
        }
        true
    }

    /// Move the cursor forward
    pub fn step_forward(&mut self) -> Option<TrackId> {
        let next = self.nodes[self.cursor?].next?;
        self.cursor = Some(next);
        Some(self.nodes[next].track)
    }

    /// Move the cursor backward
    pub fn step_backward(&mut self) -> Option<TrackId> {
        let prev = self.nodes[self.cursor?].prev?;
        self.cursor = Some(prev);
        Some(self.nodes[prev].track)
    }

    /// Reconcile the ledger with a track that just started
    ///
    /// Steps onto a neighbour holding the same track (the user navigated the
    /// ledger), otherwise records a new node.
    pub fn observe(&mut self, track: TrackId) {
        if self.current() == Some(track) {
            return;
        }
        if self.peek_forward() == Some(track) {
            self.step_forward();
        } else if self.peek_backward() == Some(track) {
            self.step_backward();
        } else {
            self.record(track);
        }
    }

    /// Drop every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.cursor = None;
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Reachable ids from oldest to newest
    pub fn entries(&self) -> Vec<TrackId> {
        let Some(cursor) = self.cursor else {
            return Vec::new();
        };

        let mut head = cursor;
        while let Some(prev) = self.nodes[head].prev {
            head = prev;
        }

        let mut entries = Vec::new();
        let mut node = Some(head);
        while let Some(i) = node {
            entries.push(self.nodes[i].track);
            node = self.nodes[i].next;
        }
        entries
    }

    /// Rebuild the arena from the reachable chain, dropping the oldest entries
    /// beyond the limit. The cursor and everything ahead of it are kept.
    fn compact(&mut self) {
        let Some(cursor) = self.cursor else {
            self.nodes.clear();
            return;
        };

        let mut behind = Vec::new();
        let mut node = self.nodes[cursor].prev;
        while let Some(i) = node {
            behind.push(self.nodes[i].track);
            node = self.nodes[i].prev;
        }

        let mut ahead = Vec::new();
        let mut node = self.nodes[cursor].next;
        while let Some(i) = node {
            ahead.push(self.nodes[i].track);
            node = self.nodes[i].next;
        }

        let keep_behind = self
            .limit
            .saturating_sub(1 + ahead.len())
            .min(behind.len());
        behind.truncate(keep_behind);
        behind.reverse();

        let current = self.nodes[cursor].track;
        let chain: Vec<TrackId> = behind
            .iter()
            .copied()
            .chain(std::iter::once(current))
            .chain(ahead)
            .collect();

        let last = chain.len() - 1;
        self.nodes = chain
            .into_iter()
            .enumerate()
            .map(|(i, track)| Node {
                track,
                prev: i.checked_sub(1),
                next: (i < last).then_some(i + 1),
            })
            .collect();
        self.cursor = Some(keep_behind);
    }
}
