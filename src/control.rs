//! Bluetooth Mesh Transport Control messages. Only the Segment Acknowledgement is interpreted;
//! the other opcodes are recognized so they can be logged and dropped.
use crate::bytes::ToFromBytesEndian;
use crate::lower::{BlockAck, SeqZero, OBO};
use core::convert::TryFrom;

/// 7 Bit Control Opcode
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum ControlOpcode {
    SegmentAck = 0x00,
    FriendPoll = 0x01,
    FriendUpdate = 0x02,
    FriendRequest = 0x03,
    FriendOffer = 0x04,
    FriendClear = 0x05,
    FriendClearConfirm = 0x06,
    FriendSubscriptionListAdd = 0x07,
    FriendSubscriptionListRemove = 0x08,
    FriendSubscriptionListConfirm = 0x09,
    Heartbeat = 0x0A,
}
impl ControlOpcode {
    #[must_use]
    pub fn new(opcode: u8) -> Option<Self> {
        match opcode {
            0x00 => Some(ControlOpcode::SegmentAck),
            0x01 => Some(ControlOpcode::FriendPoll),
            0x02 => Some(ControlOpcode::FriendUpdate),
            0x03 => Some(ControlOpcode::FriendRequest),
            0x04 => Some(ControlOpcode::FriendOffer),
            0x05 => Some(ControlOpcode::FriendClear),
            0x06 => Some(ControlOpcode::FriendClearConfirm),
            0x07 => Some(ControlOpcode::FriendSubscriptionListAdd),
            0x08 => Some(ControlOpcode::FriendSubscriptionListRemove),
            0x09 => Some(ControlOpcode::FriendSubscriptionListConfirm),
            0x0A => Some(ControlOpcode::Heartbeat),
            _ => None,
        }
    }
}
impl From<ControlOpcode> for u8 {
    fn from(opcode: ControlOpcode) -> Self {
        opcode as u8
    }
}
impl TryFrom<u8> for ControlOpcode {
    type Error = ControlMessageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ControlOpcode::new(value).ok_or(ControlMessageError::BadOpcode)
    }
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, thiserror::Error)]
pub enum ControlMessageError {
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("bad control message bytes")]
    BadBytes,
    #[error("bad control message length")]
    BadLength,
    #[error("bad control opcode")]
    BadOpcode,
}
pub trait ControlMessage: Sized {
    const OPCODE: ControlOpcode;
    fn byte_len(&self) -> usize;
    /// # Errors
    /// Returns `ControlMessageError` if `buf` doesn't hold exactly one message.
    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError>;
    /// # Errors
    /// `BufferTooSmall` if `buf.len() < self.byte_len()`.
    fn pack(&self, buf: &mut [u8]) -> Result<(), ControlMessageError>;
    fn to_control_payload(&self) -> ControlPayload {
        let mut payload = vec![0_u8; self.byte_len()];
        self.pack(&mut payload)
            .expect("payload sized from byte_len");
        ControlPayload {
            opcode: Self::OPCODE,
            payload,
        }
    }
}
/// Opcode and parameters of a control message, before segmentation or after reassembly.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct ControlPayload {
    pub opcode: ControlOpcode,
    pub payload: Vec<u8>,
}

/// Segment Acknowledgement
/// | Field    | Bits | Notes                                          |
/// |----------|------|------------------------------------------------|
/// | OBO      | 1    | Sent by a Friend on behalf of a Low Power node |
/// | SeqZero  | 13   | SeqZero of the acknowledged message            |
/// | RFU      | 2    |                                                |
/// | BlockAck | 32   | Bit `n` set when segment `n` was received      |
///
/// Big endian. A `BlockAck` of 0 means the receiver is busy and cancelled the message.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct SegmentAck {
    pub obo: OBO,
    pub seq_zero: SeqZero,
    pub block_ack: BlockAck,
}
const SEGMENT_ACK_LEN: usize = 6;
impl SegmentAck {
    #[must_use]
    pub const fn new(seq_zero: SeqZero, block_ack: BlockAck) -> Self {
        Self {
            obo: OBO(false),
            seq_zero,
            block_ack,
        }
    }
    #[must_use]
    pub fn is_cancel(&self) -> bool {
        self.block_ack.is_empty()
    }
}
impl ControlMessage for SegmentAck {
    const OPCODE: ControlOpcode = ControlOpcode::SegmentAck;

    fn byte_len(&self) -> usize {
        SEGMENT_ACK_LEN
    }

    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
        if buf.len() != SEGMENT_ACK_LEN {
            return Err(ControlMessageError::BadLength);
        }
        let head = u16::from_bytes_be(&buf[..2]).ok_or(ControlMessageError::BadBytes)?;
        let block_ack = u32::from_bytes_be(&buf[2..]).ok_or(ControlMessageError::BadBytes)?;
        Ok(SegmentAck {
            obo: OBO(head & 0x8000 != 0),
            seq_zero: SeqZero::new_masked(head >> 2),
            block_ack: BlockAck(block_ack),
        })
    }

    fn pack(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        if buf.len() < SEGMENT_ACK_LEN {
            return Err(ControlMessageError::BufferTooSmall);
        }
        let head = (u16::from(self.obo.0) << 15) | (self.seq_zero.value() << 2);
        buf[..2].copy_from_slice(&head.to_bytes_be());
        buf[2..SEGMENT_ACK_LEN].copy_from_slice(&self.block_ack.0.to_bytes_be());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_ack_layout() {
        let mut block_ack = BlockAck::default();
        block_ack.set(0);
        block_ack.set(1);
        let ack = SegmentAck::new(SeqZero::new(0x09ab), block_ack);
        let payload = ack.to_control_payload();
        assert_eq!(payload.opcode, ControlOpcode::SegmentAck);
        assert_eq!(payload.payload, hex::decode("26ac00000003").unwrap());
        assert_eq!(SegmentAck::unpack(&payload.payload), Ok(ack));
    }
    #[test]
    fn test_segment_ack_obo_and_cancel() {
        let ack = SegmentAck::unpack(&[0x80, 0x04, 0, 0, 0, 0]).unwrap();
        assert!(ack.obo.0);
        assert_eq!(ack.seq_zero, SeqZero::new(1));
        assert!(ack.is_cancel());
        assert_eq!(
            SegmentAck::unpack(&[0, 0, 0]),
            Err(ControlMessageError::BadLength)
        );
    }
    #[test]
    fn test_opcodes() {
        assert_eq!(ControlOpcode::new(0x0A), Some(ControlOpcode::Heartbeat));
        assert_eq!(ControlOpcode::new(0x0B), None);
        assert_eq!(u8::from(ControlOpcode::FriendOffer), 0x04);
    }
}
