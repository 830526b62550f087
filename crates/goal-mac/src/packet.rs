//! The pending data packet: the unit held in queues, data-send sets and
//! ack-pending maps between hops.

use core::time::Duration;

use goal_core::geometry::Vec3;
use goal_core::time::SimTime;
use goal_core::types::{NodeAddress, PacketId};
use goal_core::wire::{BaseHeader, DataBody, Direction, Frame};

/// A data packet awaiting its turn in a REQUEST round.
///
/// Immutable payload plus the header fields the MAC tracks between hops.
/// `forwards` counts transmission attempts at this hop; it resets when
/// the packet is accepted by the next forwarder.
#[derive(Debug, Clone)]
pub struct DataPacket {
    pub uid: PacketId,
    /// Final destination (sink) address; also the queueing key.
    pub target: NodeAddress,
    pub source_pos: Vec3,
    pub sink_pos: Vec3,
    /// Transmission attempts at this hop.
    pub forwards: u8,
    /// Wire size of the full DATA frame, bytes.
    pub size: u16,
    /// Channel occupancy of one transmission of this packet.
    pub tx_time: Duration,
    pub payload: Vec<u8>,
}

impl DataPacket {
    /// Build the DATA frame for one transmission of this packet.
    pub fn to_frame(&self, src: NodeAddress, next_hop: NodeAddress, now: SimTime) -> Frame {
        Frame::Data(
            BaseHeader {
                direction: Direction::Down,
                error_flag: false,
                src,
                dst: next_hop,
                size: self.size,
                tx_time: self.tx_time,
                timestamp: now,
                forwards: self.forwards,
                uid: self.uid,
            },
            DataBody {
                target: self.target,
                source_pos: self.source_pos,
                sink_pos: self.sink_pos,
                payload: self.payload.clone(),
            },
        )
    }

    /// Reconstruct a pending packet from a received DATA frame.
    pub fn from_frame(base: &BaseHeader, body: &DataBody) -> Self {
        Self {
            uid: base.uid,
            target: body.target,
            source_pos: body.source_pos,
            sink_pos: body.sink_pos,
            forwards: base.forwards,
            size: base.size,
            tx_time: base.tx_time,
            payload: body.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let pkt = DataPacket {
            uid: PacketId::new(12),
            target: NodeAddress::new(1),
            source_pos: Vec3::new(1.0, 2.0, 3.0),
            sink_pos: Vec3::new(4.0, 5.0, 6.0),
            forwards: 3,
            size: 300,
            tx_time: Duration::from_millis(240),
            payload: vec![1, 2, 3],
        };
        let frame = pkt.to_frame(NodeAddress::new(7), NodeAddress::new(8), SimTime::from_secs(1));
        let bytes = frame.encode();
        match Frame::parse(&bytes).unwrap() {
            Frame::Data(base, body) => {
                assert_eq!(base.src, NodeAddress::new(7));
                assert_eq!(base.dst, NodeAddress::new(8));
                let back = DataPacket::from_frame(&base, &body);
                assert_eq!(back.uid, pkt.uid);
                assert_eq!(back.target, pkt.target);
                assert_eq!(back.forwards, 3);
                assert_eq!(back.payload, pkt.payload);
            }
            other => panic!("expected data frame, got {other:?}"),
        }
    }
}
