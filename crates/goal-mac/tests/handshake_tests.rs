//! End-to-end handshake tests driving several MAC instances against each
//! other, with the test acting as the acoustic channel.

use core::time::Duration;

use goal_core::geometry::Vec3;
use goal_core::time::SimTime;
use goal_core::types::{NodeAddress, RequestId};
use goal_core::wire::{BaseHeader, Direction, Frame, FrameType, ReplyBody};
use goal_mac::{GoalMac, MacConfig, MacEffect, Mobility, Phy, PhyStatus};

struct FixedMobility(Vec3);

impl Mobility for FixedMobility {
    fn current_position(&self) -> Vec3 {
        self.0
    }
}

struct StubPhy;

impl Phy for StubPhy {
    fn status(&self) -> PhyStatus {
        PhyStatus::Idle
    }

    fn power_on(&mut self) {}

    fn interrupt_reception(&mut self, _duration: Duration) {}

    fn tx_time(&self, size: usize) -> Duration {
        // 10 kbit/s acoustic modem
        Duration::from_micros(size as u64 * 800)
    }
}

type Node = GoalMac<FixedMobility, StubPhy>;

const SOURCE: u16 = 1;
const FORWARDER: u16 = 2;
const SINK: u16 = 3;
const SINK_POS: Vec3 = Vec3::new(160.0, 0.0, 0.0);

/// Nominal one-hop propagation delay used when handing frames across.
const HOP: Duration = Duration::from_millis(60);

fn node(addr: u16, pos: Vec3) -> Node {
    GoalMac::new(
        NodeAddress::new(addr),
        MacConfig::default(),
        FixedMobility(pos),
        StubPhy,
        u64::from(addr),
    )
}

/// Drive `mac` until it transmits a frame of `want`, returning the
/// emission instant and the bytes. Panics if none appears by `limit`.
fn pump_until(mac: &mut Node, want: FrameType, limit: SimTime) -> (SimTime, Vec<u8>) {
    while let Some(d) = mac.next_deadline() {
        assert!(d <= limit, "no {want:?} frame before {limit}");
        for effect in mac.poll(d) {
            if let MacEffect::Transmit(bytes) = effect {
                let frame = Frame::parse(&bytes).unwrap();
                if frame.frame_type() == want {
                    return (d, bytes);
                }
            }
        }
    }
    panic!("timers drained without a {want:?} frame");
}

#[test]
fn test_three_node_relay_delivers_payload() {
    let mut source = node(SOURCE, Vec3::new(0.0, 0.0, 0.0));
    let mut forwarder = node(FORWARDER, Vec3::new(80.0, 0.0, 0.0));
    let mut sink = node(SINK, SINK_POS);

    source.enqueue(NodeAddress::new(SINK), SINK_POS, b"hello".to_vec(), SimTime::ZERO);

    // Source advertises its burst; the forwarder contends and wins.
    let (t_req, req) = pump_until(&mut source, FrameType::Request, SimTime::from_secs(5));
    forwarder.handle_frame(&req, t_req + HOP).unwrap();
    let (t_rep, rep) = pump_until(&mut forwarder, FrameType::Reply, t_req + Duration::from_secs(8));
    source.handle_frame(&rep, t_rep + HOP).unwrap();

    // The burst goes out in the advertised window, unicast to the winner.
    let (t_data, data) = pump_until(&mut source, FrameType::Data, t_req + Duration::from_secs(20));
    let data_frame = Frame::parse(&data).unwrap();
    assert_eq!(data_frame.base().dst, NodeAddress::new(FORWARDER));
    assert_eq!(source.pending_ack_ids().len(), 1);

    // The forwarder takes custody and starts its own round; overhearing
    // that round's REQUEST implicitly acknowledges the source.
    forwarder.handle_frame(&data, t_data + HOP).unwrap();
    assert_eq!(forwarder.queued(), 1);
    let (t_req2, req2) =
        pump_until(&mut forwarder, FrameType::Request, t_data + Duration::from_secs(5));
    source.handle_frame(&req2, t_req2 + HOP).unwrap();
    assert!(source.pending_ack_ids().is_empty());

    // Second hop: the sink itself contends, receives the burst, and
    // acknowledges with an accumulated ACK.
    sink.handle_frame(&req2, t_req2 + HOP).unwrap();
    let (t_rep2, rep2) =
        pump_until(&mut sink, FrameType::Reply, t_req2 + Duration::from_secs(8));
    forwarder.handle_frame(&rep2, t_rep2 + HOP).unwrap();
    let (t_data2, data2) =
        pump_until(&mut forwarder, FrameType::Data, t_req2 + Duration::from_secs(20));

    let delivered = sink.handle_frame(&data2, t_data2 + HOP).unwrap();
    let payloads: Vec<_> = delivered
        .iter()
        .filter_map(|e| match e {
            MacEffect::Deliver(pkt) => Some(pkt.payload.clone()),
            MacEffect::Transmit(_) => None,
        })
        .collect();
    assert_eq!(payloads, vec![b"hello".to_vec()]);

    let (t_ack, ack) = pump_until(&mut sink, FrameType::Ack, t_data2 + Duration::from_secs(2));
    forwarder.handle_frame(&ack, t_ack + HOP).unwrap();
    assert!(forwarder.pending_ack_ids().is_empty());
    assert_eq!(forwarder.queued(), 0);
}

#[test]
fn test_forwarded_packet_keeps_identity() {
    let mut source = node(SOURCE, Vec3::new(0.0, 0.0, 0.0));
    let mut forwarder = node(FORWARDER, Vec3::new(80.0, 0.0, 0.0));

    source.enqueue(NodeAddress::new(SINK), SINK_POS, vec![7; 32], SimTime::ZERO);
    let (t_req, req) = pump_until(&mut source, FrameType::Request, SimTime::from_secs(5));
    let advertised = match Frame::parse(&req).unwrap() {
        Frame::Request(_, body) => body.ids.clone(),
        other => panic!("expected request, got {other:?}"),
    };

    forwarder.handle_frame(&req, t_req + HOP).unwrap();
    let (t_rep, rep) = pump_until(&mut forwarder, FrameType::Reply, t_req + Duration::from_secs(8));
    source.handle_frame(&rep, t_rep + HOP).unwrap();
    let (t_data, data) = pump_until(&mut source, FrameType::Data, t_req + Duration::from_secs(20));
    forwarder.handle_frame(&data, t_data + HOP).unwrap();

    // The re-advertised round carries the same uid with a fresh attempt
    // count, so upstream nodes can match it.
    let (_, req2) = pump_until(&mut forwarder, FrameType::Request, t_data + Duration::from_secs(5));
    match Frame::parse(&req2).unwrap() {
        Frame::Request(_, body) => assert_eq!(body.ids, advertised),
        other => panic!("expected request, got {other:?}"),
    }
}

#[test]
fn test_overheard_reply_cancels_contention() {
    let mut loser = node(4, Vec3::new(60.0, 30.0, 0.0));

    let req = Frame::Request(
        BaseHeader {
            direction: Direction::Down,
            error_flag: false,
            src: NodeAddress::new(SOURCE),
            dst: NodeAddress::BROADCAST,
            size: 140,
            tx_time: Duration::from_millis(112),
            timestamp: SimTime::from_millis(100),
            forwards: 0,
            uid: goal_core::types::PacketId::new(0x0001_0001),
        },
        goal_core::wire::RequestBody {
            requester: NodeAddress::new(SOURCE),
            reply_to: NodeAddress::new(SOURCE),
            sink_pos: SINK_POS,
            source_pos: Vec3::default(),
            sender_pos: Vec3::default(),
            req_id: RequestId::new(3),
            send_time: Duration::from_secs(8),
            data_tx_time: Duration::from_millis(300),
            ids: vec![goal_core::types::PacketId::new(0x0001_0000)],
        },
    );
    loser.handle_frame(&req.encode(), SimTime::from_millis(150)).unwrap();
    assert!(loser.next_deadline().is_some(), "should be waiting out a backoff");

    // Another contender answers the same round first. It won the channel,
    // so our reply is withdrawn even though its reported backoff is
    // larger than ours.
    let winner_reply = Frame::Reply(
        BaseHeader {
            direction: Direction::Down,
            error_flag: false,
            src: NodeAddress::new(FORWARDER),
            dst: NodeAddress::new(SOURCE),
            size: 76,
            tx_time: Duration::from_millis(60),
            timestamp: SimTime::from_millis(400),
            forwards: 0,
            uid: goal_core::types::PacketId::new(0x0002_0001),
        },
        ReplyBody {
            replier: NodeAddress::new(FORWARDER),
            req_id: RequestId::new(3),
            replier_pos: Vec3::new(80.0, 0.0, 0.0),
            send_time: Duration::from_secs(7),
            backoff: Duration::from_secs(5),
        },
    );
    loser.handle_frame(&winner_reply.encode(), SimTime::from_millis(450)).unwrap();
    assert!(loser.next_deadline().is_none(), "backoff should be cancelled");
}
