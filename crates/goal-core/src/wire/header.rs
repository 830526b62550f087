//! The base header shared by all frame types.

use core::time::Duration;

use crate::error::FrameError;
use crate::time::SimTime;
use crate::types::{NodeAddress, PacketId};

/// Base header wire size:
/// type(1) + direction(1) + error(1) + src(2) + dst(2) + size(2)
/// + tx_time(8) + timestamp(8) + forwards(1) + uid(4).
pub const BASE_HEADER_SIZE: usize = 30;

/// Frame type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Request = 0x01,
    Reply = 0x02,
    Ack = 0x03,
    Data = 0x04,
}

impl FrameType {
    pub fn from_byte(b: u8) -> Result<Self, FrameError> {
        match b {
            0x01 => Ok(FrameType::Request),
            0x02 => Ok(FrameType::Reply),
            0x03 => Ok(FrameType::Ack),
            0x04 => Ok(FrameType::Data),
            other => Err(FrameError::InvalidFrameType(other)),
        }
    }
}

/// Whether a frame is travelling down to the channel or up from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up = 0x00,
    Down = 0x01,
}

impl Direction {
    pub fn from_byte(b: u8) -> Result<Self, FrameError> {
        match b {
            0x00 => Ok(Direction::Up),
            0x01 => Ok(Direction::Down),
            other => Err(FrameError::InvalidDirection(other)),
        }
    }
}

/// Fields common to every frame.
#[derive(Debug, Clone)]
pub struct BaseHeader {
    pub direction: Direction,
    /// Set by the PHY when the frame arrived corrupted.
    pub error_flag: bool,
    pub src: NodeAddress,
    pub dst: NodeAddress,
    /// Logical frame size in bytes, used for transmission-time estimates.
    pub size: u16,
    /// Time this frame occupies the channel.
    pub tx_time: Duration,
    /// Instant the frame was handed to the channel.
    pub timestamp: SimTime,
    /// Retransmission counter for DATA packets, zero otherwise.
    pub forwards: u8,
    pub uid: PacketId,
}

impl BaseHeader {
    pub(crate) fn encode_into(&self, frame_type: FrameType, out: &mut Vec<u8>) {
        out.push(frame_type as u8);
        out.push(self.direction as u8);
        out.push(u8::from(self.error_flag));
        out.extend_from_slice(&self.src.as_u16().to_be_bytes());
        out.extend_from_slice(&self.dst.as_u16().to_be_bytes());
        out.extend_from_slice(&self.size.to_be_bytes());
        out.extend_from_slice(&(self.tx_time.as_nanos() as u64).to_be_bytes());
        out.extend_from_slice(&self.timestamp.as_nanos().to_be_bytes());
        out.push(self.forwards);
        out.extend_from_slice(&self.uid.as_u32().to_be_bytes());
    }

    /// Parse the base header, returning the frame type tag alongside it.
    pub(crate) fn parse(raw: &[u8]) -> Result<(FrameType, Self), FrameError> {
        if raw.len() < BASE_HEADER_SIZE {
            return Err(FrameError::TooShort {
                min: BASE_HEADER_SIZE,
                actual: raw.len(),
            });
        }
        let frame_type = FrameType::from_byte(raw[0])?;
        let direction = Direction::from_byte(raw[1])?;
        let error_flag = raw[2] != 0;
        let src = NodeAddress::new(u16::from_be_bytes([raw[3], raw[4]]));
        let dst = NodeAddress::new(u16::from_be_bytes([raw[5], raw[6]]));
        let size = u16::from_be_bytes([raw[7], raw[8]]);
        let tx_time = Duration::from_nanos(u64::from_be_bytes(
            raw[9..17].try_into().expect("slice is 8 bytes"),
        ));
        let timestamp = SimTime::from_nanos(u64::from_be_bytes(
            raw[17..25].try_into().expect("slice is 8 bytes"),
        ));
        let forwards = raw[25];
        let uid = PacketId::new(u32::from_be_bytes(
            raw[26..30].try_into().expect("slice is 4 bytes"),
        ));
        Ok((
            frame_type,
            BaseHeader {
                direction,
                error_flag,
                src,
                dst,
                size,
                tx_time,
                timestamp,
                forwards,
                uid,
            },
        ))
    }
}
