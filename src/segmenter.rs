//! Transport Layer Segmenter. Splits an upper transport PDU into lower transport PDUs.
use crate::lower::{
    self, BlockAck, LowerError, SegN, SegO, SegmentHeader, SegmentedAccessPDU,
    SegmentedControlPDU, SeqZero, UnsegmentedAccessPDU, UnsegmentedControlPDU, SZMIC,
    UNSEGMENTED_ACCESS_PDU_LEN, UNSEGMENTED_CONTROL_PDU_LEN,
};
use crate::upper::UpperPDU;

/// Number of lower transport PDUs an upper transport PDU of `upper_len` bytes needs. Access PDUs
/// with a small TransMIC that fit in 15 bytes and control PDUs that fit in 11 bytes go
/// unsegmented. Everything else is segmented.
#[must_use]
pub fn segment_count(upper_len: usize, is_control: bool, big_mic: bool) -> usize {
    let (max_unsegmented, seg_len) = if is_control {
        (UNSEGMENTED_CONTROL_PDU_LEN, SegmentedControlPDU::max_seg_len())
    } else {
        (UNSEGMENTED_ACCESS_PDU_LEN, SegmentedAccessPDU::max_seg_len())
    };
    if !big_mic && upper_len <= max_unsegmented {
        1
    } else {
        (upper_len + seg_len - 1) / seg_len
    }
}

/// Holds one upper transport PDU and hands out its lower transport PDUs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Segmenter {
    upper_pdu: UpperPDU,
    upper_bytes: Vec<u8>,
    seq_zero: SeqZero,
    seg_n: Option<SegN>,
}
impl Segmenter {
    /// See [`segment_count`] for when the PDU gets segmented.
    /// # Errors
    /// `TooManySegments` if more than 32 segments are needed.
    pub fn new(upper_pdu: UpperPDU, seq_zero: SeqZero) -> Result<Self, LowerError> {
        let (upper_bytes, force_seg) = match &upper_pdu {
            UpperPDU::Access(a) => (a.to_bytes(), a.mic().is_big()),
            UpperPDU::Control(c) => (c.payload.clone(), false),
        };
        let count = segment_count(upper_bytes.len(), upper_pdu.is_control(), force_seg);
        let seg_n = if count == 1 && !force_seg {
            None
        } else {
            Some(SegN::from_segment_count(count)?)
        };
        Ok(Self {
            upper_pdu,
            upper_bytes,
            seq_zero,
            seg_n,
        })
    }
    #[must_use]
    pub fn is_segmented(&self) -> bool {
        self.seg_n.is_some()
    }
    #[must_use]
    pub fn seg_n(&self) -> Option<SegN> {
        self.seg_n
    }
    #[must_use]
    pub fn seq_zero(&self) -> SeqZero {
        self.seq_zero
    }
    #[must_use]
    pub fn seg_count(&self) -> usize {
        self.seg_n.map_or(1, SegN::segment_count)
    }
    fn seg_len(&self) -> usize {
        if self.upper_pdu.is_control() {
            SegmentedControlPDU::max_seg_len()
        } else {
            SegmentedAccessPDU::max_seg_len()
        }
    }
    fn seg_data(&self, seg_o: SegO) -> &[u8] {
        let seg_len = self.seg_len();
        let start = usize::from(seg_o.value()) * seg_len;
        let end = (start + seg_len).min(self.upper_bytes.len());
        &self.upper_bytes[start..end]
    }
    /// Lower transport PDU for segment `seg_o`. Unsegmented messages only have segment 0.
    /// # Errors
    /// `BadSegmentHeader` if `seg_o` is past the last segment.
    pub fn segment(&self, seg_o: SegO) -> Result<lower::PDU, LowerError> {
        match (self.seg_n, &self.upper_pdu) {
            (None, _) if seg_o.value() != 0 => Err(LowerError::BadSegmentHeader),
            (Some(seg_n), _) if seg_o.value() > seg_n.value() => {
                Err(LowerError::BadSegmentHeader)
            }
            (None, UpperPDU::Access(a)) => Ok(lower::PDU::UnsegmentedAccess(
                UnsegmentedAccessPDU::new(a.akf(), a.aid(), &self.upper_bytes)?,
            )),
            (None, UpperPDU::Control(c)) => Ok(lower::PDU::UnsegmentedControl(
                UnsegmentedControlPDU::new(c.opcode, &self.upper_bytes)?,
            )),
            (Some(seg_n), UpperPDU::Access(a)) => {
                Ok(lower::PDU::SegmentedAccess(SegmentedAccessPDU::new(
                    a.akf(),
                    a.aid(),
                    SZMIC(a.mic().is_big()),
                    self.seq_zero,
                    seg_o,
                    seg_n,
                    self.seg_data(seg_o),
                )?))
            }
            (Some(seg_n), UpperPDU::Control(c)) => {
                Ok(lower::PDU::SegmentedControl(SegmentedControlPDU::new(
                    c.opcode,
                    SegmentHeader::new(false, self.seq_zero, seg_o, seg_n),
                    self.seg_data(seg_o),
                )?))
            }
        }
    }
    /// Iterates over every segment not set in `block_ack`.
    #[must_use]
    pub fn iter(&self, block_ack: BlockAck) -> SegmentIterator<'_> {
        SegmentIterator {
            block_ack,
            segmenter: self,
            seg_o: 0,
        }
    }
}
pub struct SegmentIterator<'a> {
    block_ack: BlockAck,
    segmenter: &'a Segmenter,
    seg_o: u8,
}
impl<'a> Iterator for SegmentIterator<'a> {
    type Item = (SegO, lower::PDU);

    fn next(&mut self) -> Option<Self::Item> {
        let last = self.segmenter.seg_count() as u8;
        // Skip acked segments.
        while self.seg_o < last && self.block_ack.get(self.seg_o) {
            self.seg_o += 1;
        }
        if self.seg_o >= last {
            return None;
        }
        let seg_o = SegO::new(self.seg_o);
        self.seg_o += 1;
        self.segmenter.segment(seg_o).ok().map(|pdu| (seg_o, pdu))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlOpcode, ControlPayload};
    use crate::crypto::aes::MicSize;
    use crate::crypto::{AID, AKF};
    use crate::mesh::SequenceNumber;
    use crate::upper::EncryptedAccessPDU;

    fn message_6() -> UpperPDU {
        UpperPDU::Access(
            EncryptedAccessPDU::from_bytes(
                AKF(false),
                AID::new(0),
                &hex::decode("ee9dddfd2169326d23f3afdfcfdc18c52fdef772e0e17308").unwrap(),
                MicSize::Small,
            )
            .unwrap(),
        )
    }
    #[test]
    fn test_message_6_segments() {
        let segmenter =
            Segmenter::new(message_6(), SeqZero::from_seq(SequenceNumber::new(0x3129ab))).unwrap();
        assert_eq!(segmenter.seg_count(), 2);
        let segments: Vec<Vec<u8>> = segmenter
            .iter(BlockAck::default())
            .map(|(_, pdu)| pdu.to_bytes().as_ref().to_vec())
            .collect();
        assert_eq!(
            segments,
            vec![
                hex::decode("8026ac01ee9dddfd2169326d23f3afdf").unwrap(),
                hex::decode("8026ac21cfdc18c52fdef772e0e17308").unwrap(),
            ]
        );
    }
    #[test]
    fn test_skips_acked_segments() {
        let segmenter = Segmenter::new(message_6(), SeqZero::new(1)).unwrap();
        let mut ack = BlockAck::default();
        ack.set(0);
        let resend: Vec<SegO> = segmenter.iter(ack).map(|(seg_o, _)| seg_o).collect();
        assert_eq!(resend, vec![SegO::new(1)]);
        ack.set(1);
        assert_eq!(segmenter.iter(ack).count(), 0);
        assert!(segmenter.segment(SegO::new(2)).is_err());
    }
    #[test]
    fn test_unsegmented_and_control() {
        let small = UpperPDU::Access(
            EncryptedAccessPDU::from_bytes(AKF(true), AID::new(5), &[1; 10], MicSize::Small)
                .unwrap(),
        );
        let segmenter = Segmenter::new(small, SeqZero::new(0)).unwrap();
        assert!(!segmenter.is_segmented());
        assert!(matches!(
            segmenter.segment(SegO::new(0)),
            Ok(lower::PDU::UnsegmentedAccess(_))
        ));
        let control = UpperPDU::Control(ControlPayload {
            opcode: ControlOpcode::Heartbeat,
            payload: vec![7; 20],
        });
        let segmenter = Segmenter::new(control, SeqZero::new(9)).unwrap();
        assert_eq!(segmenter.seg_count(), 3);
        let last = segmenter.segment(SegO::new(2)).unwrap();
        assert_eq!(last.to_bytes().len(), 1 + 3 + 4);
    }
    #[test]
    fn test_big_mic_always_segmented() {
        let pdu = UpperPDU::Access(
            EncryptedAccessPDU::from_bytes(AKF(true), AID::new(5), &[1; 10], MicSize::Big)
                .unwrap(),
        );
        let segmenter = Segmenter::new(pdu, SeqZero::new(0)).unwrap();
        assert!(segmenter.is_segmented());
        assert_eq!(segmenter.seg_count(), 1);
    }
}
