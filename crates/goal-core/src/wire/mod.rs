//! Frame model and byte codec.
//!
//! A frame is a fixed base header, a type-specific body, and (for REQUEST
//! and ACK) a count-prefixed trailer of bundled packet ids. Everything is
//! big-endian on the wire. Parsing returns owned structures; a frame is
//! built once per transmission rather than mutated in place.

mod body;
mod header;

pub use body::{AckBody, DataBody, ReplyBody, RequestBody};
pub use header::{BaseHeader, Direction, FrameType, BASE_HEADER_SIZE};

use crate::error::FrameError;
use crate::types::PacketId;

/// A fully parsed MAC frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Request(BaseHeader, RequestBody),
    Reply(BaseHeader, ReplyBody),
    Ack(BaseHeader, AckBody),
    Data(BaseHeader, DataBody),
}

impl Frame {
    /// The base header common to all frame types.
    #[must_use]
    pub fn base(&self) -> &BaseHeader {
        match self {
            Frame::Request(h, _) | Frame::Reply(h, _) | Frame::Ack(h, _) | Frame::Data(h, _) => h,
        }
    }

    pub fn base_mut(&mut self) -> &mut BaseHeader {
        match self {
            Frame::Request(h, _) | Frame::Reply(h, _) | Frame::Ack(h, _) | Frame::Data(h, _) => h,
        }
    }

    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Request(..) => FrameType::Request,
            Frame::Reply(..) => FrameType::Reply,
            Frame::Ack(..) => FrameType::Ack,
            Frame::Data(..) => FrameType::Data,
        }
    }

    /// Serialize to wire bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BASE_HEADER_SIZE + 64);
        self.base().encode_into(self.frame_type(), &mut out);
        match self {
            Frame::Request(_, b) => b.encode_into(&mut out),
            Frame::Reply(_, b) => b.encode_into(&mut out),
            Frame::Ack(_, b) => b.encode_into(&mut out),
            Frame::Data(_, b) => b.encode_into(&mut out),
        }
        out
    }

    /// Parse a frame from wire bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        let (frame_type, base) = BaseHeader::parse(raw)?;
        let rest = &raw[BASE_HEADER_SIZE..];
        match frame_type {
            FrameType::Request => Ok(Frame::Request(base, RequestBody::parse(rest)?)),
            FrameType::Reply => Ok(Frame::Reply(base, ReplyBody::parse(rest)?)),
            FrameType::Ack => Ok(Frame::Ack(base, AckBody::parse(rest)?)),
            FrameType::Data => Ok(Frame::Data(base, DataBody::parse(rest)?)),
        }
    }
}

/// Encode a count-prefixed trailer of packet ids.
fn encode_id_trailer(ids: &[PacketId], out: &mut Vec<u8>) {
    out.extend_from_slice(&(ids.len() as u32).to_be_bytes());
    for id in ids {
        out.extend_from_slice(&id.as_u32().to_be_bytes());
    }
}

/// Parse a count-prefixed trailer of packet ids.
fn parse_id_trailer(raw: &[u8]) -> Result<Vec<PacketId>, FrameError> {
    if raw.len() < 4 {
        return Err(FrameError::TooShort {
            min: 4,
            actual: raw.len(),
        });
    }
    let count = u32::from_be_bytes(raw[0..4].try_into().expect("slice is 4 bytes")) as usize;
    let available = (raw.len() - 4) / 4;
    if available < count {
        return Err(FrameError::TrailerTruncated {
            declared: count,
            available,
        });
    }
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let off = 4 + i * 4;
        let id = u32::from_be_bytes(raw[off..off + 4].try_into().expect("slice is 4 bytes"));
        ids.push(PacketId::new(id));
    }
    Ok(ids)
}
