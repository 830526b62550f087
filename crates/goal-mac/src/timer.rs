//! Protocol timers.
//!
//! Every suspended piece of protocol work is an armed timer with a tagged
//! payload; expiry re-enters the state machine through the tag. Multiple
//! backoff, pre-send and ack-timeout timers can be outstanding at once.
//! Cancelling a timer that already fired (or was never armed) is a no-op.

use core::time::Duration;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use goal_core::time::SimTime;
use goal_core::types::{NodeAddress, PacketId, RequestId};
use goal_core::wire::Frame;

use crate::packet::DataPacket;
use crate::schedule::SlotHandle;

/// Opaque identity of one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct TimerId(u64);

/// State carried by a pending REPLY backoff.
#[derive(Debug, Clone)]
pub struct BackoffState {
    /// Who asked; the REPLY is unicast here.
    pub requester: NodeAddress,
    pub req_id: RequestId,
    /// Absolute start of the requester's advertised DATA window.
    pub data_send_at: SimTime,
    /// The computed backoff, advertised in the REPLY.
    pub backoff: Duration,
    /// The transmit slot reserved for the REPLY.
    pub slot: SlotHandle,
}

/// Packets awaiting acknowledgment from one next hop.
#[derive(Debug, Clone, Default)]
pub struct AckPending {
    pub pending: HashMap<PacketId, DataPacket>,
}

/// The best REPLY seen so far for one request round.
#[derive(Debug, Clone, Copy)]
pub struct BestReply {
    pub next_hop: NodeAddress,
    pub backoff: Duration,
}

/// State of one outbound round between REQUEST and DATA transmission.
#[derive(Debug, Clone)]
pub struct DataSendState {
    pub req_id: RequestId,
    pub packets: Vec<DataPacket>,
    /// The reserved DATA transmit slot.
    pub slot: SlotHandle,
    /// Total channel time of the burst.
    pub burst_tx_time: Duration,
    /// Minimum-backoff reply retained per round; none means no forwarder
    /// answered in time.
    pub best: Option<BestReply>,
}

/// Tagged timer payload; dispatch on expiry happens via this tag.
#[derive(Debug, Clone)]
pub enum TimerKind {
    /// Waiting out a VBF backoff before sending a REPLY.
    Backoff(BackoffState),
    /// Holding a fully built frame until its reserved slot arrives.
    PreSend(Frame),
    /// Waiting for ACKs on an in-flight DATA burst.
    AckTimeout(AckPending),
    /// Waiting for the reserved DATA window of an outbound round.
    DataSend(DataSendState),
    /// Coalescing sink-side ACKs for recently arrived DATA.
    AccumAck(BTreeSet<PacketId>),
    /// Randomized delay before starting the next round.
    NextRound,
}

struct Armed {
    deadline: SimTime,
    kind: TimerKind,
}

/// The set of armed timers for one MAC instance.
pub struct TimerSet {
    armed: BTreeMap<TimerId, Armed>,
    next_id: u64,
}

impl TimerSet {
    pub fn new() -> Self {
        Self {
            armed: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Arm a timer to fire at `deadline`.
    pub fn arm(&mut self, deadline: SimTime, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.armed.insert(id, Armed { deadline, kind });
        id
    }

    /// Cancel a timer, returning its payload. Already fired or cancelled
    /// timers yield `None`; that is not an error.
    pub fn cancel(&mut self, id: TimerId) -> Option<TimerKind> {
        self.armed.remove(&id).map(|a| a.kind)
    }

    /// Earliest armed deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<SimTime> {
        self.armed.values().map(|a| a.deadline).min()
    }

    /// Remove and return the earliest timer due at or before `now`.
    /// Ties fire in arming order.
    pub fn pop_due(&mut self, now: SimTime) -> Option<(TimerId, TimerKind)> {
        let id = self
            .armed
            .iter()
            .filter(|(_, a)| a.deadline <= now)
            .min_by_key(|(id, a)| (a.deadline, **id))
            .map(|(id, _)| *id)?;
        self.cancel(id).map(|kind| (id, kind))
    }

    /// Iterate mutably over armed payloads.
    pub fn kinds_mut(&mut self) -> impl Iterator<Item = (TimerId, &mut TimerKind)> {
        self.armed.iter_mut().map(|(id, a)| (*id, &mut a.kind))
    }

    /// Iterate over armed payloads.
    pub fn kinds(&self) -> impl Iterator<Item = (TimerId, &TimerKind)> {
        self.armed.iter().map(|(id, a)| (*id, &a.kind))
    }

    /// Keep only timers whose payload satisfies the predicate, returning
    /// how many were removed.
    pub fn retain_kinds(&mut self, mut keep: impl FnMut(&TimerKind) -> bool) -> usize {
        let before = self.armed.len();
        self.armed.retain(|_, a| keep(&a.kind));
        before - self.armed.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.armed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

impl Default for TimerSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_and_pop_in_deadline_order() {
        let mut t = TimerSet::new();
        t.arm(SimTime::from_millis(300), TimerKind::NextRound);
        t.arm(SimTime::from_millis(100), TimerKind::NextRound);
        t.arm(SimTime::from_millis(200), TimerKind::NextRound);

        assert_eq!(t.next_deadline(), Some(SimTime::from_millis(100)));
        let (_, _) = t.pop_due(SimTime::from_millis(250)).unwrap();
        assert_eq!(t.next_deadline(), Some(SimTime::from_millis(200)));
        assert!(t.pop_due(SimTime::from_millis(150)).is_none());
        assert!(t.pop_due(SimTime::from_millis(200)).is_some());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut t = TimerSet::new();
        let id = t.arm(SimTime::from_millis(100), TimerKind::NextRound);
        assert!(t.cancel(id).is_some());
        assert!(t.cancel(id).is_none());
    }

    #[test]
    fn test_fired_timer_cannot_be_cancelled() {
        let mut t = TimerSet::new();
        let id = t.arm(SimTime::from_millis(100), TimerKind::NextRound);
        let (fired, _) = t.pop_due(SimTime::from_millis(100)).unwrap();
        assert_eq!(fired, id);
        assert!(t.cancel(id).is_none());
    }

    #[test]
    fn test_retain_kinds() {
        let mut t = TimerSet::new();
        t.arm(SimTime::from_millis(1), TimerKind::AckTimeout(AckPending::default()));
        t.arm(SimTime::from_millis(2), TimerKind::NextRound);
        let removed = t.retain_kinds(|k| !matches!(k, TimerKind::AckTimeout(p) if p.pending.is_empty()));
        assert_eq!(removed, 1);
        assert_eq!(t.len(), 1);
    }
}
