//! Type-specific frame bodies.

use core::time::Duration;

use crate::error::FrameError;
use crate::geometry::Vec3;
use crate::types::{NodeAddress, PacketId, RequestId};

use super::{encode_id_trailer, parse_id_trailer};

fn encode_pos(pos: Vec3, out: &mut Vec<u8>) {
    out.extend_from_slice(&pos.x.to_bits().to_be_bytes());
    out.extend_from_slice(&pos.y.to_bits().to_be_bytes());
    out.extend_from_slice(&pos.z.to_bits().to_be_bytes());
}

fn parse_pos(raw: &[u8]) -> Vec3 {
    let f = |i: usize| {
        f64::from_bits(u64::from_be_bytes(
            raw[i..i + 8].try_into().expect("slice is 8 bytes"),
        ))
    };
    Vec3::new(f(0), f(8), f(16))
}

fn parse_duration(raw: &[u8]) -> Duration {
    Duration::from_nanos(u64::from_be_bytes(
        raw.try_into().expect("slice is 8 bytes"),
    ))
}

fn parse_addr(raw: &[u8]) -> NodeAddress {
    NodeAddress::new(u16::from_be_bytes([raw[0], raw[1]]))
}

/// REQUEST body: advertises a pending DATA burst and solicits forwarders.
///
/// `send_time` is relative to the frame's transmit instant; it is rewritten
/// just before transmission to subtract queueing delay.
#[derive(Debug, Clone)]
pub struct RequestBody {
    pub requester: NodeAddress,
    pub reply_to: NodeAddress,
    pub sink_pos: Vec3,
    pub source_pos: Vec3,
    pub sender_pos: Vec3,
    pub req_id: RequestId,
    /// How long after this frame's transmission the DATA burst starts.
    pub send_time: Duration,
    /// Total transmission time of the advertised DATA burst.
    pub data_tx_time: Duration,
    /// Unique ids of the bundled data packets.
    pub ids: Vec<PacketId>,
}

/// requester(2) + reply_to(2) + 3 positions(72) + req_id(4)
/// + send_time(8) + data_tx_time(8).
const REQUEST_FIXED_SIZE: usize = 96;

impl RequestBody {
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.requester.as_u16().to_be_bytes());
        out.extend_from_slice(&self.reply_to.as_u16().to_be_bytes());
        encode_pos(self.sink_pos, out);
        encode_pos(self.source_pos, out);
        encode_pos(self.sender_pos, out);
        out.extend_from_slice(&self.req_id.as_u32().to_be_bytes());
        out.extend_from_slice(&(self.send_time.as_nanos() as u64).to_be_bytes());
        out.extend_from_slice(&(self.data_tx_time.as_nanos() as u64).to_be_bytes());
        encode_id_trailer(&self.ids, out);
    }

    pub(crate) fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < REQUEST_FIXED_SIZE {
            return Err(FrameError::TooShort {
                min: REQUEST_FIXED_SIZE,
                actual: raw.len(),
            });
        }
        Ok(RequestBody {
            requester: parse_addr(&raw[0..2]),
            reply_to: parse_addr(&raw[2..4]),
            sink_pos: parse_pos(&raw[4..28]),
            source_pos: parse_pos(&raw[28..52]),
            sender_pos: parse_pos(&raw[52..76]),
            req_id: RequestId::new(u32::from_be_bytes(
                raw[76..80].try_into().expect("slice is 4 bytes"),
            )),
            send_time: parse_duration(&raw[80..88]),
            data_tx_time: parse_duration(&raw[88..96]),
            ids: parse_id_trailer(&raw[REQUEST_FIXED_SIZE..])?,
        })
    }
}

/// REPLY body: a forwarder's offer, unicast back to the requester.
#[derive(Debug, Clone)]
pub struct ReplyBody {
    pub replier: NodeAddress,
    pub req_id: RequestId,
    pub replier_pos: Vec3,
    /// The requester's advertised DATA send time, relative to this frame's
    /// transmit instant; rewritten before transmission like the REQUEST's.
    pub send_time: Duration,
    /// The backoff this replier computed; smaller wins.
    pub backoff: Duration,
}

/// replier(2) + req_id(4) + position(24) + send_time(8) + backoff(8).
const REPLY_SIZE: usize = 46;

impl ReplyBody {
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.replier.as_u16().to_be_bytes());
        out.extend_from_slice(&self.req_id.as_u32().to_be_bytes());
        encode_pos(self.replier_pos, out);
        out.extend_from_slice(&(self.send_time.as_nanos() as u64).to_be_bytes());
        out.extend_from_slice(&(self.backoff.as_nanos() as u64).to_be_bytes());
    }

    pub(crate) fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < REPLY_SIZE {
            return Err(FrameError::TooShort {
                min: REPLY_SIZE,
                actual: raw.len(),
            });
        }
        Ok(ReplyBody {
            replier: parse_addr(&raw[0..2]),
            req_id: RequestId::new(u32::from_be_bytes(
                raw[2..6].try_into().expect("slice is 4 bytes"),
            )),
            replier_pos: parse_pos(&raw[6..30]),
            send_time: parse_duration(&raw[30..38]),
            backoff: parse_duration(&raw[38..46]),
        })
    }
}

/// ACK body. A PUSH ack carries the request id it preempts.
#[derive(Debug, Clone)]
pub struct AckBody {
    pub sender: NodeAddress,
    pub reply_to: NodeAddress,
    pub push: bool,
    pub req_id: Option<RequestId>,
    /// Unique ids being acknowledged.
    pub ids: Vec<PacketId>,
}

/// sender(2) + reply_to(2) + push(1) + req_id(4).
const ACK_FIXED_SIZE: usize = 9;

impl AckBody {
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.sender.as_u16().to_be_bytes());
        out.extend_from_slice(&self.reply_to.as_u16().to_be_bytes());
        out.push(u8::from(self.push));
        let req_id = self.req_id.map_or(0, |r| r.as_u32());
        out.extend_from_slice(&req_id.to_be_bytes());
        encode_id_trailer(&self.ids, out);
    }

    pub(crate) fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < ACK_FIXED_SIZE {
            return Err(FrameError::TooShort {
                min: ACK_FIXED_SIZE,
                actual: raw.len(),
            });
        }
        let push = raw[4] != 0;
        let req_id_raw = u32::from_be_bytes(raw[5..9].try_into().expect("slice is 4 bytes"));
        Ok(AckBody {
            sender: parse_addr(&raw[0..2]),
            reply_to: parse_addr(&raw[2..4]),
            push,
            req_id: push.then(|| RequestId::new(req_id_raw)),
            ids: parse_id_trailer(&raw[ACK_FIXED_SIZE..])?,
        })
    }
}

/// DATA body: the routed payload plus the geometry its forwarding needs.
#[derive(Debug, Clone)]
pub struct DataBody {
    /// Final destination (sink) address.
    pub target: NodeAddress,
    /// Position of the packet's originator.
    pub source_pos: Vec3,
    /// Position of the sink.
    pub sink_pos: Vec3,
    /// Opaque upper-layer payload.
    pub payload: Vec<u8>,
}

/// target(2) + source_pos(24) + sink_pos(24).
const DATA_FIXED_SIZE: usize = 50;

impl DataBody {
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.target.as_u16().to_be_bytes());
        encode_pos(self.source_pos, out);
        encode_pos(self.sink_pos, out);
        out.extend_from_slice(&self.payload);
    }

    pub(crate) fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < DATA_FIXED_SIZE {
            return Err(FrameError::TooShort {
                min: DATA_FIXED_SIZE,
                actual: raw.len(),
            });
        }
        Ok(DataBody {
            target: parse_addr(&raw[0..2]),
            source_pos: parse_pos(&raw[2..26]),
            sink_pos: parse_pos(&raw[26..50]),
            payload: raw[DATA_FIXED_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_body_round_trip() {
        let body = ReplyBody {
            replier: NodeAddress::new(7),
            req_id: RequestId::new(42),
            replier_pos: Vec3::new(-1.5, 2.25, 3.0),
            send_time: Duration::from_millis(900),
            backoff: Duration::from_millis(80),
        };
        let mut out = Vec::new();
        body.encode_into(&mut out);
        assert_eq!(out.len(), REPLY_SIZE);
        let parsed = ReplyBody::parse(&out).unwrap();
        assert_eq!(parsed.replier, NodeAddress::new(7));
        assert_eq!(parsed.req_id, RequestId::new(42));
        assert_eq!(parsed.replier_pos, Vec3::new(-1.5, 2.25, 3.0));
        assert_eq!(parsed.backoff, Duration::from_millis(80));
    }

    #[test]
    fn test_non_push_ack_has_no_req_id() {
        let body = AckBody {
            sender: NodeAddress::new(1),
            reply_to: NodeAddress::new(2),
            push: false,
            req_id: Some(RequestId::new(99)),
            ids: vec![],
        };
        let mut out = Vec::new();
        body.encode_into(&mut out);
        // req_id only means anything on a PUSH ack
        let parsed = AckBody::parse(&out).unwrap();
        assert_eq!(parsed.req_id, None);
    }

    #[test]
    fn test_data_body_empty_payload() {
        let body = DataBody {
            target: NodeAddress::new(1),
            source_pos: Vec3::default(),
            sink_pos: Vec3::default(),
            payload: vec![],
        };
        let mut out = Vec::new();
        body.encode_into(&mut out);
        assert_eq!(out.len(), DATA_FIXED_SIZE);
        let parsed = DataBody::parse(&out).unwrap();
        assert!(parsed.payload.is_empty());
    }
}
