//! Transport Layer Reassembler. Collects the segments of one segmented message.
use crate::control::{ControlOpcode, ControlPayload};
use crate::crypto::aes::MicSize;
use crate::crypto::{AID, AKF};
use crate::lower::{self, BlockAck, SegN, SegO, SegmentHeader, SeqZero};
use crate::upper::{EncryptedAccessPDU, UpperPDU};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, thiserror::Error)]
pub enum ReassembleError {
    #[error("not a segmented PDU")]
    NotSegmented,
    #[error("segment doesn't belong to this message")]
    HeaderMismatch,
    #[error("segment has a bad length")]
    BadSegmentLength,
    #[error("message isn't complete")]
    Incomplete,
    #[error("reassembled upper transport PDU is malformed")]
    BadUpperPDU,
}

/// What every segment of one message has in common.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum LowerHeader {
    Access { akf: AKF, aid: AID, big_mic: bool },
    Control(ControlOpcode),
}
impl LowerHeader {
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(self, LowerHeader::Control(_))
    }
    #[must_use]
    pub const fn max_seg_len(&self) -> usize {
        if self.is_control() {
            lower::SegmentedControlPDU::max_seg_len()
        } else {
            lower::SegmentedAccessPDU::max_seg_len()
        }
    }
}
fn split_segment(pdu: &lower::PDU) -> Result<(LowerHeader, SegmentHeader, &[u8]), ReassembleError> {
    match pdu {
        lower::PDU::SegmentedAccess(a) => Ok((
            LowerHeader::Access {
                akf: a.akf(),
                aid: a.aid(),
                big_mic: a.szmic().0,
            },
            *a.header(),
            a.segment_data(),
        )),
        lower::PDU::SegmentedControl(c) => Ok((
            LowerHeader::Control(c.opcode()),
            *c.header(),
            c.segment_data(),
        )),
        lower::PDU::UnsegmentedAccess(_) | lower::PDU::UnsegmentedControl(_) => {
            Err(ReassembleError::NotSegmented)
        }
    }
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct ContextHeader {
    lower_header: LowerHeader,
    seq_zero: SeqZero,
    seg_n: SegN,
    block_ack: BlockAck,
}
impl ContextHeader {
    #[must_use]
    pub const fn lower_header(&self) -> LowerHeader {
        self.lower_header
    }
    #[must_use]
    pub const fn seq_zero(&self) -> SeqZero {
        self.seq_zero
    }
    #[must_use]
    pub const fn seg_n(&self) -> SegN {
        self.seg_n
    }
    #[must_use]
    pub const fn block_ack(&self) -> BlockAck {
        self.block_ack
    }
    #[must_use]
    pub fn all_acked(&self) -> bool {
        self.block_ack.all_acked(self.seg_n)
    }
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.lower_header.max_seg_len() * self.seg_n.segment_count()
    }
}
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Context {
    storage: Vec<u8>,
    data_len: usize,
    header: ContextHeader,
}
impl Context {
    /// Starts a context from any segment of the message. Segments can arrive in any order.
    /// # Errors
    /// See [`Context::insert`].
    pub fn new(first: &lower::PDU) -> Result<Self, ReassembleError> {
        let (lower_header, seg_header, _) = split_segment(first)?;
        let header = ContextHeader {
            lower_header,
            seq_zero: seg_header.seq_zero,
            seg_n: seg_header.seg_n,
            block_ack: BlockAck::default(),
        };
        let mut out = Self {
            storage: vec![0_u8; header.max_len()],
            data_len: 0,
            header,
        };
        out.insert(first)?;
        Ok(out)
    }
    #[must_use]
    pub fn header(&self) -> &ContextHeader {
        &self.header
    }
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.header.all_acked()
    }
    /// Stores a segment. Returns `false` if it was a duplicate.
    /// # Errors
    /// `HeaderMismatch` if the segment belongs to another message, `BadSegmentLength` for a short
    /// middle segment or an oversized one.
    pub fn insert(&mut self, pdu: &lower::PDU) -> Result<bool, ReassembleError> {
        let (lower_header, seg_header, data) = split_segment(pdu)?;
        if lower_header != self.header.lower_header
            || seg_header.seq_zero != self.header.seq_zero
            || seg_header.seg_n != self.header.seg_n
        {
            return Err(ReassembleError::HeaderMismatch);
        }
        let max_seg_len = lower_header.max_seg_len();
        if data.len() > max_seg_len || (!seg_header.is_last() && data.len() != max_seg_len) {
            return Err(ReassembleError::BadSegmentLength);
        }
        let seg_o: SegO = seg_header.seg_o;
        if self.header.block_ack.get(seg_o.value()) {
            return Ok(false);
        }
        let pos = usize::from(seg_o.value()) * max_seg_len;
        self.storage[pos..pos + data.len()].copy_from_slice(data);
        self.header.block_ack.set(seg_o.value());
        if seg_header.is_last() {
            self.data_len = pos + data.len();
        }
        Ok(true)
    }
    /// Consumes the context and returns the reassembled upper transport PDU.
    /// # Errors
    /// `Incomplete` if segments are missing, `BadUpperPDU` if the data can't hold a TransMIC.
    pub fn finish(self) -> Result<UpperPDU, ReassembleError> {
        if !self.is_ready() {
            return Err(ReassembleError::Incomplete);
        }
        let data = &self.storage[..self.data_len];
        match self.header.lower_header {
            LowerHeader::Access { akf, aid, big_mic } => Ok(UpperPDU::Access(
                EncryptedAccessPDU::from_bytes(akf, aid, data, MicSize::from(big_mic))
                    .map_err(|_| ReassembleError::BadUpperPDU)?,
            )),
            LowerHeader::Control(opcode) => Ok(UpperPDU::Control(ControlPayload {
                opcode,
                payload: data.to_vec(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CTL;

    fn message_6_segments() -> (lower::PDU, lower::PDU) {
        (
            lower::PDU::from_bytes(
                &hex::decode("8026ac01ee9dddfd2169326d23f3afdf").unwrap(),
                CTL(false),
            )
            .unwrap(),
            lower::PDU::from_bytes(
                &hex::decode("8026ac21cfdc18c52fdef772e0e17308").unwrap(),
                CTL(false),
            )
            .unwrap(),
        )
    }
    #[test]
    fn test_reassemble_out_of_order() {
        let (first, second) = message_6_segments();
        let mut context = Context::new(&second).unwrap();
        assert!(!context.is_ready());
        assert_eq!(context.header().block_ack(), BlockAck(0b10));
        assert_eq!(context.insert(&first), Ok(true));
        assert_eq!(context.insert(&first), Ok(false));
        assert!(context.is_ready());
        match context.finish().unwrap() {
            UpperPDU::Access(a) => assert_eq!(
                a.to_bytes(),
                hex::decode("ee9dddfd2169326d23f3afdfcfdc18c52fdef772e0e17308").unwrap()
            ),
            UpperPDU::Control(_) => panic!("expected access"),
        }
    }
    #[test]
    fn test_incomplete_and_mismatch() {
        let (first, _) = message_6_segments();
        let context = Context::new(&first).unwrap();
        assert!(matches!(context.finish(), Err(ReassembleError::Incomplete)));
        let mut context = Context::new(&first).unwrap();
        let other = lower::PDU::from_bytes(
            &hex::decode("8026b021cfdc18c52fdef772e0e17308").unwrap(),
            CTL(false),
        )
        .unwrap();
        assert_eq!(context.insert(&other), Err(ReassembleError::HeaderMismatch));
    }
    #[test]
    fn test_short_middle_segment() {
        let short_first =
            lower::PDU::from_bytes(&hex::decode("8026ac01ee9d").unwrap(), CTL(false)).unwrap();
        assert!(matches!(
            Context::new(&short_first),
            Err(ReassembleError::BadSegmentLength)
        ));
    }
}
