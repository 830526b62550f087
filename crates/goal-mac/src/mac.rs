//! The GOAL MAC engine.
//!
//! [`GoalMac`] is a sans-IO state machine: the host feeds it received
//! frames and clock readings at explicit instants, and it answers with
//! [`MacEffect`]s to perform. All waiting happens through the timer set;
//! [`GoalMac::next_deadline`] tells the host when to call
//! [`GoalMac::poll`] again.
//!
//! A round of channel access proceeds as follows. A node with queued data
//! broadcasts a REQUEST advertising the burst's unique ids and a reserved
//! future send window. Every neighbor inside the forwarding pipe computes
//! a VBF backoff and answers with a unicast REPLY once it elapses; the
//! requester sends the burst at the advertised instant to the replier
//! with the smallest backoff. Reception is confirmed either by the sink's
//! accumulative ACK, by overhearing the next hop re-advertise the same
//! ids, or by a PUSH ACK from a node that already holds them. Unconfirmed
//! packets return to the queue for another round until the retransmission
//! limit drops them.

use core::time::Duration;
use std::collections::{BTreeSet, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use goal_core::geometry::Vec3;
use goal_core::time::SimTime;
use goal_core::types::{NodeAddress, PacketId, RequestId};
use goal_core::wire::{AckBody, BaseHeader, DataBody, Direction, Frame, ReplyBody, RequestBody};

use crate::backoff::{self, BackoffParams};
use crate::config::MacConfig;
use crate::error::MacError;
use crate::history::RecvHistory;
use crate::packet::DataPacket;
use crate::queue::PacketQueues;
use crate::schedule::{ReservationSchedule, SlotHandle};
use crate::timer::{
    AckPending, BackoffState, BestReply, DataSendState, TimerId, TimerKind, TimerSet,
};
use crate::traits::{Mobility, Phy, PhyStatus};

/// An action the host must carry out on the engine's behalf.
#[derive(Debug)]
pub enum MacEffect {
    /// Hand these frame bytes to the channel.
    Transmit(Vec<u8>),
    /// A packet reached its destination; pass it to the upper layer.
    Deliver(DataPacket),
}

/// The complete MAC state of one node.
pub struct GoalMac<M: Mobility, P: Phy> {
    cfg: MacConfig,
    addr: NodeAddress,
    mobility: M,
    phy: P,
    schedule: ReservationSchedule,
    queues: PacketQueues,
    history: RecvHistory,
    /// Uids this node put into the network itself. Seeing one of them
    /// advertised back is a routing loop, never a forwarding opportunity.
    origin: HashSet<PacketId>,
    /// Uids already handed to the upper layer, for exactly-once delivery.
    delivered: HashSet<PacketId>,
    timers: TimerSet,
    /// Whether a round (NextRound, DataSend or AckTimeout) is in flight.
    in_round: bool,
    req_seq: u32,
    uid_seq: u32,
    rng: StdRng,
}

impl<M: Mobility, P: Phy> GoalMac<M, P> {
    pub fn new(addr: NodeAddress, cfg: MacConfig, mobility: M, phy: P, seed: u64) -> Self {
        let schedule = ReservationSchedule::new(cfg.min_interval(), cfg.big_interval());
        let history = RecvHistory::new(cfg.recv_history_retention());
        Self {
            addr,
            mobility,
            phy,
            schedule,
            queues: PacketQueues::new(),
            history,
            origin: HashSet::new(),
            delivered: HashSet::new(),
            timers: TimerSet::new(),
            in_round: false,
            req_seq: 0,
            uid_seq: 0,
            rng: StdRng::seed_from_u64(seed),
            cfg,
        }
    }

    #[must_use]
    pub fn address(&self) -> NodeAddress {
        self.addr
    }

    #[must_use]
    pub fn config(&self) -> &MacConfig {
        &self.cfg
    }

    pub fn phy_mut(&mut self) -> &mut P {
        &mut self.phy
    }

    /// Instant of the earliest pending timer; the host must call
    /// [`poll`](Self::poll) no later than this.
    #[must_use]
    pub fn next_deadline(&self) -> Option<SimTime> {
        self.timers.next_deadline()
    }

    /// Whether a round is currently in flight.
    #[must_use]
    pub fn in_round(&self) -> bool {
        self.in_round
    }

    /// Number of packets queued for a future round.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queues.len()
    }

    /// Uids of sent data packets still awaiting acknowledgment.
    #[must_use]
    pub fn pending_ack_ids(&self) -> Vec<PacketId> {
        let mut ids: Vec<PacketId> = self
            .timers
            .kinds()
            .filter_map(|(_, k)| match k {
                TimerKind::AckTimeout(p) => Some(p.pending.keys().copied()),
                _ => None,
            })
            .flatten()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Accept a payload from the upper layer for delivery to `target`.
    ///
    /// The packet is queued and a round starts after a randomized delay;
    /// the resulting transmissions surface through [`poll`](Self::poll).
    pub fn enqueue(&mut self, target: NodeAddress, sink_pos: Vec3, payload: Vec<u8>, now: SimTime) {
        let mut pkt = DataPacket {
            uid: self.alloc_uid(),
            target,
            source_pos: self.mobility.current_position(),
            sink_pos,
            forwards: 0,
            size: 0,
            tx_time: Duration::ZERO,
            payload,
        };
        let len = pkt.to_frame(self.addr, target, now).encode().len();
        pkt.size = len as u16;
        pkt.tx_time = self.phy.tx_time(len);
        debug!(addr = %self.addr, uid = ?pkt.uid, target = %target, "packet accepted from upper layer");
        self.origin.insert(pkt.uid);
        self.insert_queue(pkt, false, now);
    }

    /// Process a frame received from the channel at instant `now`.
    pub fn handle_frame(&mut self, raw: &[u8], now: SimTime) -> Result<Vec<MacEffect>, MacError> {
        let frame = Frame::parse(raw)?;
        let mut effects = Vec::new();
        if frame.base().error_flag {
            trace!(addr = %self.addr, uid = ?frame.base().uid, "corrupted frame ignored");
            return Ok(effects);
        }
        if frame.base().src == self.addr {
            return Ok(effects);
        }
        match frame {
            Frame::Request(base, body) => self.on_request(&base, &body, now),
            Frame::Reply(base, body) => {
                if base.dst == self.addr {
                    self.on_reply(&body);
                } else {
                    self.on_overheard_reply(&base, &body);
                }
            }
            Frame::Ack(_, body) => {
                if body.push {
                    self.on_push_ack(&body, now);
                } else {
                    self.on_ack(&body, now);
                }
            }
            Frame::Data(base, body) => self.on_data(&base, &body, now, &mut effects),
        }
        Ok(effects)
    }

    /// Fire every timer due at or before `now` and collect the effects.
    pub fn poll(&mut self, now: SimTime) -> Vec<MacEffect> {
        let mut effects = Vec::new();
        while let Some((_, kind)) = self.timers.pop_due(now) {
            match kind {
                TimerKind::NextRound => self.start_round(now),
                TimerKind::PreSend(frame) => effects.extend(self.send_out(frame, now)),
                TimerKind::Backoff(state) => self.send_reply(state, now, &mut effects),
                TimerKind::DataSend(state) => self.on_data_window(state, now),
                TimerKind::AckTimeout(pending) => self.on_ack_timeout(pending, now),
                TimerKind::AccumAck(ids) => self.send_accum_ack(ids, now, &mut effects),
            }
        }
        effects
    }

    // Inbound handlers.

    fn on_request(&mut self, base: &BaseHeader, body: &RequestBody, now: SimTime) {
        if body.requester == self.addr {
            return;
        }

        // Overhearing the next hop advertise ids we are waiting on is as
        // good as an ack: the packets moved one hop forward.
        let mut implicit = 0usize;
        for (_, kind) in self.timers.kinds_mut() {
            if let TimerKind::AckTimeout(p) = kind {
                for id in &body.ids {
                    if p.pending.remove(id).is_some() {
                        implicit += 1;
                    }
                }
            }
        }
        if implicit > 0 {
            trace!(addr = %self.addr, count = implicit, "implicitly acknowledged by forwarded request");
            self.timers
                .retain_kinds(|k| !matches!(k, TimerKind::AckTimeout(p) if p.pending.is_empty()));
            self.finish_round_if_idle(now);
        }

        // Ids already taken from this same previous hop get a push ack
        // instead of a contention. The same uid arriving over a different
        // hop is not a retransmission to us and earns no ack.
        let dup_ids: Vec<PacketId> = body
            .ids
            .iter()
            .copied()
            .filter(|id| self.history.seen_from(*id, base.src))
            .collect();
        if !dup_ids.is_empty() {
            debug!(addr = %self.addr, req_id = ?body.req_id, count = dup_ids.len(),
                "already hold advertised packets, scheduling push ack");
            let mut frame = Frame::Ack(
                self.control_base(body.requester, now),
                AckBody {
                    sender: self.addr,
                    reply_to: body.requester,
                    push: true,
                    req_id: Some(body.req_id),
                    ids: dup_ids,
                },
            );
            self.finalize(&mut frame);
            let tx = frame.base().tx_time;
            let at = self
                .schedule
                .next_available_start(now, tx, false, now, &mut self.rng);
            self.schedule.insert(at, at + tx, false);
            self.timers.arm(at, TimerKind::PreSend(frame));
        }

        let data_begin = base.timestamp + body.send_time;
        let data_end = data_begin + body.data_tx_time;

        // A burst carrying ids we originated or already hold is coming
        // back at us. Stay out of the contention entirely, but still keep
        // our transmissions clear of the advertised window.
        let looped = implicit > 0 || body.ids.iter().any(|id| self.origin.contains(id));
        let fresh = body
            .ids
            .iter()
            .filter(|id| !self.history.contains(**id) && !self.origin.contains(*id))
            .count();
        if looped || fresh == 0 {
            trace!(addr = %self.addr, req_id = ?body.req_id, looped,
                "no new packets in request, not contending");
            self.reserve_receive_window(data_begin, data_end);
            return;
        }

        // Only contend if the advertised data window fits our schedule;
        // a conflicting window would collide at this receiver.
        if !self.schedule.is_available(data_begin, data_end, now) {
            trace!(addr = %self.addr, req_id = ?body.req_id,
                "advertised data window conflicts with schedule, not contending");
            self.reserve_receive_window(data_begin, data_end);
            return;
        }

        let Some(backoff_delay) = backoff::compute(
            self.cfg.backoff_kind,
            &self.backoff_params(),
            self.mobility.current_position(),
            body.source_pos,
            body.sender_pos,
            body.sink_pos,
        ) else {
            trace!(addr = %self.addr, req_id = ?body.req_id, "outside forwarding pipe, not contending");
            self.reserve_receive_window(data_begin, data_end);
            return;
        };

        self.reserve_receive_window(data_begin, data_end);

        let reply_tx_time = self.reply_tx_time(body.req_id);
        let reply_send =
            self.schedule
                .next_available_start(now + backoff_delay, reply_tx_time, false, now, &mut self.rng);
        let slot = self
            .schedule
            .insert(reply_send, reply_send + reply_tx_time, false);
        debug!(addr = %self.addr, req_id = ?body.req_id, requester = %body.requester,
            backoff = ?backoff_delay, reply_send = %reply_send, "contending to forward");
        self.timers.arm(
            reply_send,
            TimerKind::Backoff(BackoffState {
                requester: body.requester,
                req_id: body.req_id,
                data_send_at: data_begin,
                backoff: backoff_delay,
                slot,
            }),
        );
    }

    fn on_reply(&mut self, body: &ReplyBody) {
        for (_, kind) in self.timers.kinds_mut() {
            if let TimerKind::DataSend(state) = kind {
                if state.req_id != body.req_id {
                    continue;
                }
                if state.best.map_or(true, |b| body.backoff < b.backoff) {
                    state.best = Some(BestReply {
                        next_hop: body.replier,
                        backoff: body.backoff,
                    });
                }
                debug!(addr = %self.addr, req_id = ?body.req_id, replier = %body.replier,
                    backoff = ?body.backoff, "reply received");
                return;
            }
        }
        trace!(addr = %self.addr, req_id = ?body.req_id, "reply for unknown round ignored");
    }

    fn on_overheard_reply(&mut self, base: &BaseHeader, body: &ReplyBody) {
        // Another answer to the same round beat ours onto the channel, so
        // our pending reply lost. Backoffs order the repliers; whoever
        // transmitted first computed the smaller delay.
        let mut lost: Option<(TimerId, SlotHandle)> = None;
        for (id, kind) in self.timers.kinds() {
            if let TimerKind::Backoff(s) = kind {
                if s.req_id == body.req_id && s.requester == base.dst {
                    lost = Some((id, s.slot));
                    break;
                }
            }
        }
        if let Some((id, slot)) = lost {
            debug!(addr = %self.addr, req_id = ?body.req_id, winner = %body.replier,
                "lost reply contention");
            self.timers.cancel(id);
            self.schedule.set_receive_only(slot);
        }

        // The winner takes the burst at the advertised instant; predict
        // when it reaches us from the replier's position and keep our
        // transmissions clear of it.
        let prop_delay = Duration::from_secs_f64(
            self.mobility.current_position().dist(body.replier_pos) / self.cfg.prop_speed,
        );
        let begin = base.timestamp + body.send_time + prop_delay;
        let guard = self.cfg.guard_time();
        self.schedule
            .insert(begin.saturating_sub(guard), begin + guard, true);
    }

    fn on_data(
        &mut self,
        base: &BaseHeader,
        body: &DataBody,
        now: SimTime,
        effects: &mut Vec<MacEffect>,
    ) {
        if base.dst != self.addr && !base.dst.is_broadcast() {
            return;
        }
        if body.target == self.addr {
            if self.history.contains(base.uid) {
                trace!(addr = %self.addr, uid = ?base.uid, "duplicate data at destination ignored");
                return;
            }
            self.history.record(base.uid, base.src, now);
            if self.delivered.insert(base.uid) {
                debug!(addr = %self.addr, uid = ?base.uid, "packet reached its destination");
                effects.push(MacEffect::Deliver(DataPacket::from_frame(base, body)));
            }
            // Coalesce the ack across the rest of the burst: each arrival
            // pushes the deadline past the expected next packet.
            let found = self
                .timers
                .kinds()
                .find(|(_, k)| matches!(k, TimerKind::AccumAck(_)))
                .map(|(id, _)| id);
            let mut ids = match found.and_then(|id| self.timers.cancel(id)) {
                Some(TimerKind::AccumAck(ids)) => ids,
                _ => BTreeSet::new(),
            };
            ids.insert(base.uid);
            let deadline = now + base.tx_time + self.cfg.data_packet_interval() * 2;
            self.timers.arm(deadline, TimerKind::AccumAck(ids));
            return;
        }

        // Forwarding: take custody and start a round of our own.
        if self.history.contains(base.uid) {
            trace!(addr = %self.addr, uid = ?base.uid, "duplicate data ignored");
            return;
        }
        self.history.record(base.uid, base.src, now);
        let mut pkt = DataPacket::from_frame(base, body);
        pkt.forwards = 0;
        self.insert_queue(pkt, false, now);
    }

    fn on_ack(&mut self, body: &AckBody, now: SimTime) {
        let mut acked = 0usize;
        for (_, kind) in self.timers.kinds_mut() {
            if let TimerKind::AckTimeout(p) = kind {
                for id in &body.ids {
                    if p.pending.remove(id).is_some() {
                        acked += 1;
                    }
                }
            }
        }
        if acked > 0 {
            debug!(addr = %self.addr, count = acked, sender = %body.sender, "data acknowledged");
            self.timers
                .retain_kinds(|k| !matches!(k, TimerKind::AckTimeout(p) if p.pending.is_empty()));
            self.finish_round_if_idle(now);
        }
    }

    fn on_push_ack(&mut self, body: &AckBody, now: SimTime) {
        if body.reply_to != self.addr {
            return;
        }
        let Some(req_id) = body.req_id else {
            return;
        };
        let mut emptied: Option<(TimerId, SlotHandle)> = None;
        for (id, kind) in self.timers.kinds_mut() {
            if let TimerKind::DataSend(state) = kind {
                if state.req_id != req_id {
                    continue;
                }
                state.packets.retain(|p| !body.ids.contains(&p.uid));
                if state.packets.is_empty() {
                    emptied = Some((id, state.slot));
                }
                break;
            }
        }
        if let Some((id, slot)) = emptied {
            debug!(addr = %self.addr, req_id = ?req_id,
                "entire burst already held downstream, round cancelled");
            self.timers.cancel(id);
            self.schedule.remove(slot);
            self.finish_round_if_idle(now);
        }
    }

    // Timer expiry handlers.

    fn start_round(&mut self, now: SimTime) {
        let Some((_, packets)) = self.queues.pop_burst(self.cfg.max_burst) else {
            self.in_round = false;
            return;
        };

        let data_tx_time: Duration = packets
            .iter()
            .map(|p| p.tx_time + self.cfg.data_packet_interval())
            .sum();
        let req_id = RequestId::new(self.req_seq);
        self.req_seq = self.req_seq.wrapping_add(1);

        let head = &packets[0];
        let mut frame = Frame::Request(
            self.control_base(NodeAddress::BROADCAST, now),
            RequestBody {
                requester: self.addr,
                reply_to: self.addr,
                sink_pos: head.sink_pos,
                source_pos: head.source_pos,
                sender_pos: self.mobility.current_position(),
                req_id,
                send_time: Duration::ZERO,
                data_tx_time,
                ids: packets.iter().map(|p| p.uid).collect(),
            },
        );
        self.finalize(&mut frame);
        let req_tx_time = frame.base().tx_time;

        // Jittered start so synchronized neighbors do not all request at
        // once, then a slot clear of existing reservations.
        let jitter = req_tx_time.mul_f64(self.rng.gen_range(0.0..5.0));
        let req_send =
            self.schedule
                .next_available_start(now + jitter, req_tx_time, false, now, &mut self.rng);
        self.schedule.insert(req_send, req_send + req_tx_time, false);

        // The data window must lie past the whole contention phase.
        let earliest = req_send
            + req_tx_time
            + self.cfg.max_backoff()
            + self.cfg.max_delay() * 2
            + self.cfg.estimate_error();
        let data_send =
            self.schedule
                .next_available_start(earliest, data_tx_time, true, now, &mut self.rng);
        let slot = self.schedule.insert(data_send, data_send + data_tx_time, false);

        if let Frame::Request(_, body) = &mut frame {
            body.send_time = data_send.saturating_since(now);
        }
        debug!(addr = %self.addr, req_id = ?req_id, packets = packets.len(),
            req_send = %req_send, data_send = %data_send, "starting request round");
        self.timers.arm(req_send, TimerKind::PreSend(frame));
        self.timers.arm(
            data_send,
            TimerKind::DataSend(DataSendState {
                req_id,
                packets,
                slot,
                burst_tx_time: data_tx_time,
                best: None,
            }),
        );
    }

    fn send_reply(&mut self, state: BackoffState, now: SimTime, effects: &mut Vec<MacEffect>) {
        let mut frame = Frame::Reply(
            self.control_base(state.requester, now),
            ReplyBody {
                replier: self.addr,
                req_id: state.req_id,
                replier_pos: self.mobility.current_position(),
                send_time: state.data_send_at.saturating_since(now),
                backoff: state.backoff,
            },
        );
        self.finalize(&mut frame);
        debug!(addr = %self.addr, req_id = ?state.req_id, requester = %state.requester,
            backoff = ?state.backoff, "sending reply");
        effects.extend(self.send_out(frame, now));
    }

    fn on_data_window(&mut self, state: DataSendState, now: SimTime) {
        let DataSendState {
            req_id,
            packets,
            slot,
            burst_tx_time,
            best,
        } = state;
        let Some(best) = best else {
            debug!(addr = %self.addr, req_id = ?req_id, "no reply received, returning burst to queue");
            self.schedule.remove(slot);
            self.in_round = false;
            for pkt in packets.into_iter().rev() {
                self.insert_queue(pkt, true, now);
            }
            return;
        };

        debug!(addr = %self.addr, req_id = ?req_id, next_hop = %best.next_hop,
            packets = packets.len(), "sending data burst");
        let mut at = now + Duration::from_micros(10);
        let mut pending = HashMap::new();
        for pkt in packets {
            let frame = pkt.to_frame(self.addr, best.next_hop, now);
            self.timers.arm(at, TimerKind::PreSend(frame));
            at += self.cfg.data_packet_interval() + pkt.tx_time;
            pending.insert(pkt.uid, pkt);
        }
        let deadline = now
            + self.cfg.max_delay() * 2
            + burst_tx_time
            + self.cfg.next_round_max_wait()
            + self.cfg.estimate_error()
            + Duration::from_micros(500);
        self.timers
            .arm(deadline, TimerKind::AckTimeout(AckPending { pending }));
    }

    fn on_ack_timeout(&mut self, pending: AckPending, now: SimTime) {
        if !pending.pending.is_empty() {
            debug!(addr = %self.addr, unacked = pending.pending.len(),
                "ack timeout, requeueing unacknowledged packets");
            let mut pkts: Vec<DataPacket> = pending.pending.into_values().collect();
            pkts.sort_by_key(|p| p.uid.as_u32());
            for pkt in pkts.into_iter().rev() {
                self.insert_queue(pkt, true, now);
            }
        }
        self.finish_round_if_idle(now);
    }

    fn send_accum_ack(&mut self, ids: BTreeSet<PacketId>, now: SimTime, effects: &mut Vec<MacEffect>) {
        let ids: Vec<PacketId> = ids.into_iter().collect();
        debug!(addr = %self.addr, count = ids.len(), "sending accumulated ack");
        let mut frame = Frame::Ack(
            self.control_base(NodeAddress::BROADCAST, now),
            AckBody {
                sender: self.addr,
                reply_to: self.addr,
                push: false,
                req_id: None,
                ids,
            },
        );
        self.finalize(&mut frame);
        effects.extend(self.send_out(frame, now));
    }

    // Internals.

    /// Reserve a neighbor's advertised DATA window, plus guard time on
    /// both sides, as receive-only. Own slot searches keep clear of it.
    fn reserve_receive_window(&mut self, begin: SimTime, end: SimTime) {
        let guard = self.cfg.guard_time();
        self.schedule
            .insert(begin.saturating_sub(guard), end + guard, true);
    }

    /// Queue a packet for a future round, charging one transmission
    /// attempt. Past the retransmission limit the packet is dropped.
    fn insert_queue(&mut self, mut pkt: DataPacket, front: bool, now: SimTime) {
        if pkt.forwards > self.cfg.max_retrans {
            debug!(addr = %self.addr, uid = ?pkt.uid, forwards = pkt.forwards,
                "retransmission limit reached, packet dropped");
            return;
        }
        pkt.forwards += 1;
        if front {
            self.queues.push_front(pkt);
        } else {
            self.queues.push_back(pkt);
        }
        self.advance_round(now);
    }

    /// Start a round after a randomized delay, unless one is in flight
    /// or there is nothing to send.
    fn advance_round(&mut self, now: SimTime) {
        if self.in_round || self.queues.is_empty() {
            return;
        }
        self.in_round = true;
        let wait = if self.cfg.next_round_max_wait_secs > 0.0 {
            Duration::from_secs_f64(self.rng.gen_range(0.0..self.cfg.next_round_max_wait_secs))
        } else {
            Duration::ZERO
        };
        self.timers.arm(now + wait, TimerKind::NextRound);
    }

    /// Clear the round flag once no round-owning timer remains, then try
    /// to start the next round.
    fn finish_round_if_idle(&mut self, now: SimTime) {
        let busy = self.timers.kinds().any(|(_, k)| {
            matches!(
                k,
                TimerKind::NextRound | TimerKind::DataSend(_) | TimerKind::AckTimeout(_)
            )
        });
        if !busy {
            self.in_round = false;
            self.advance_round(now);
        }
    }

    /// Final gate to the channel: check the transducer, refresh the
    /// relative send-time fields for the queueing delay since the frame
    /// was built, and emit the bytes.
    fn send_out(&mut self, mut frame: Frame, now: SimTime) -> Option<MacEffect> {
        match self.phy.status() {
            PhyStatus::Sending => {
                warn!(addr = %self.addr, frame = ?frame.frame_type(),
                    "transducer busy sending, frame dropped");
                return None;
            }
            PhyStatus::Sleeping => {
                self.phy.power_on();
                self.phy.interrupt_reception(frame.base().tx_time);
            }
            PhyStatus::Receiving => {
                self.phy.interrupt_reception(frame.base().tx_time);
            }
            PhyStatus::Idle => {}
        }

        let queued = now.saturating_since(frame.base().timestamp);
        match &mut frame {
            Frame::Request(_, b) => b.send_time = b.send_time.saturating_sub(queued),
            Frame::Reply(_, b) => b.send_time = b.send_time.saturating_sub(queued),
            _ => {}
        }
        let base = frame.base_mut();
        base.timestamp = now;
        base.direction = Direction::Down;
        Some(MacEffect::Transmit(frame.encode()))
    }

    fn control_base(&mut self, dst: NodeAddress, now: SimTime) -> BaseHeader {
        BaseHeader {
            direction: Direction::Down,
            error_flag: false,
            src: self.addr,
            dst,
            size: 0,
            tx_time: Duration::ZERO,
            timestamp: now,
            forwards: 0,
            uid: self.alloc_uid(),
        }
    }

    /// Fill in the wire size and transmission time of a built frame.
    fn finalize(&self, frame: &mut Frame) {
        let len = frame.encode().len();
        let base = frame.base_mut();
        base.size = len as u16;
        base.tx_time = self.phy.tx_time(len);
    }

    /// Channel time of a REPLY frame, measured on a throwaway encoding.
    fn reply_tx_time(&self, req_id: RequestId) -> Duration {
        let scratch = Frame::Reply(
            BaseHeader {
                direction: Direction::Down,
                error_flag: false,
                src: self.addr,
                dst: self.addr,
                size: 0,
                tx_time: Duration::ZERO,
                timestamp: SimTime::ZERO,
                forwards: 0,
                uid: PacketId::new(0),
            },
            ReplyBody {
                replier: self.addr,
                req_id,
                replier_pos: Vec3::default(),
                send_time: Duration::ZERO,
                backoff: Duration::ZERO,
            },
        );
        self.phy.tx_time(scratch.encode().len())
    }

    fn backoff_params(&self) -> BackoffParams {
        BackoffParams {
            max_delay: self.cfg.vbf_max_delay(),
            pipe_width: self.cfg.pipe_width,
            tx_radius: self.cfg.tx_radius,
            prop_speed: self.cfg.prop_speed,
        }
    }

    /// Network-unique id: originator address in the high half, a local
    /// counter in the low half.
    fn alloc_uid(&mut self) -> PacketId {
        let n = self.uid_seq;
        self.uid_seq = self.uid_seq.wrapping_add(1);
        PacketId::new((u32::from(self.addr.as_u16()) << 16) | (n & 0xFFFF))
    }
}
