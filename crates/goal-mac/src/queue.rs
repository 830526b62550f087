//! Per-destination queues of pending data packets.
//!
//! One FIFO per target, served round-robin so no destination starves.
//! Retried packets go back to the front of their queue and win the next
//! burst toward that target.

use std::collections::{BTreeMap, VecDeque};

use goal_core::types::NodeAddress;

use crate::packet::DataPacket;

/// FIFO queues keyed by target address with a round-robin cursor.
pub struct PacketQueues {
    // BTreeMap keeps round-robin order deterministic.
    queues: BTreeMap<NodeAddress, VecDeque<DataPacket>>,
    cursor: usize,
    total: usize,
}

impl PacketQueues {
    pub fn new() -> Self {
        Self {
            queues: BTreeMap::new(),
            cursor: 0,
            total: 0,
        }
    }

    /// Queue a newly accepted packet at the back of its target's FIFO.
    pub fn push_back(&mut self, pkt: DataPacket) {
        self.queues.entry(pkt.target).or_default().push_back(pkt);
        self.total += 1;
    }

    /// Queue a retried packet at the front of its target's FIFO.
    pub fn push_front(&mut self, pkt: DataPacket) {
        self.queues.entry(pkt.target).or_default().push_front(pkt);
        self.total += 1;
    }

    /// Pop up to `max_burst` packets for the next target in round-robin
    /// order. Empty queues are dropped; returns `None` when nothing is
    /// pending anywhere.
    pub fn pop_burst(&mut self, max_burst: usize) -> Option<(NodeAddress, Vec<DataPacket>)> {
        if self.queues.is_empty() {
            return None;
        }
        let idx = self.cursor % self.queues.len();
        self.cursor = (self.cursor + 1) % self.queues.len();
        let target = *self.queues.keys().nth(idx).expect("index is in range");

        let queue = self.queues.get_mut(&target).expect("key exists");
        let take = max_burst.min(queue.len());
        let burst: Vec<DataPacket> = queue.drain(..take).collect();
        self.total -= burst.len();
        if queue.is_empty() {
            self.queues.remove(&target);
        }
        Some((target, burst))
    }

    /// Total number of queued packets across all targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct targets with pending packets.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.queues.len()
    }
}

impl Default for PacketQueues {
    fn default() -> Self {
        Self::new()
    }
}
