//! Receive history for duplicate suppression.
//!
//! Records which unique ids arrived recently and from whom, so repeated
//! DATA receptions and re-advertised REQUESTs can be recognized. Entries
//! older than the retention window are purged lazily before each insert.

use core::time::Duration;
use std::collections::HashMap;

use goal_core::time::SimTime;
use goal_core::types::{NodeAddress, PacketId};

#[derive(Debug, Clone, Copy)]
struct RecvInfo {
    received_at: SimTime,
    sender: NodeAddress,
}

/// Recently received unique ids with arrival time and previous hop.
pub struct RecvHistory {
    entries: HashMap<PacketId, RecvInfo>,
    retention: Duration,
}

impl RecvHistory {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            retention,
        }
    }

    /// Whether `uid` was received at all (any sender).
    #[must_use]
    pub fn contains(&self, uid: PacketId) -> bool {
        self.entries.contains_key(&uid)
    }

    /// Whether `uid` was received from this particular sender. Used for
    /// REQUEST duplicate detection: only a repeat from the same previous
    /// hop proves the sender failed to see our ACK.
    #[must_use]
    pub fn seen_from(&self, uid: PacketId, sender: NodeAddress) -> bool {
        self.entries
            .get(&uid)
            .is_some_and(|info| info.sender == sender)
    }

    /// Record a reception, purging expired entries first.
    pub fn record(&mut self, uid: PacketId, sender: NodeAddress, now: SimTime) {
        self.purge(now);
        self.entries.insert(
            uid,
            RecvInfo {
                received_at: now,
                sender,
            },
        );
    }

    /// Drop entries older than the retention window.
    pub fn purge(&mut self, now: SimTime) {
        let retention = self.retention;
        self.entries
            .retain(|_, info| now.saturating_since(info.received_at) <= retention);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
