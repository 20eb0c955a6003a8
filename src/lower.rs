//! Lower Transport Layer PDUs. Frames one upper transport PDU (or one segment of it) for the
//! Network Layer.
//! Lower Transport PDU
//! | CTL | SEG | Format              |
//! |  0  |  0  | Unsegmented Access  |
//! |  0  |  1  | Segmented Access    |
//! |  1  |  0  | Unsegmented Control |
//! |  1  |  1  | Segmented Control   |
use crate::control::ControlOpcode;
use crate::crypto::{AID, AKF};
use crate::mesh::{SequenceNumber, CTL, U24};
use crate::bytes::ToFromBytesEndian;
use core::convert::TryFrom;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, thiserror::Error)]
pub enum LowerError {
    #[error("lower transport PDU has a bad length")]
    BadLength,
    #[error("unknown control opcode")]
    BadOpcode,
    #[error("segment header is inconsistent")]
    BadSegmentHeader,
    #[error("message needs more than 32 segments")]
    TooManySegments,
}

/// Size MIC flag of a segmented access message. Set for an 8 byte TransMIC.
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq, Default)]
pub struct SZMIC(pub bool);
impl From<SZMIC> for bool {
    fn from(s: SZMIC) -> Self {
        s.0
    }
}
impl From<bool> for SZMIC {
    fn from(b: bool) -> Self {
        SZMIC(b)
    }
}
/// 13 Bits SeqZero. Least significant bits of the SeqAuth of a segmented message.
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq, Default)]
pub struct SeqZero(u16);
pub const SEQ_ZERO_MAX: u16 = (1_u16 << 13) - 1;
impl SeqZero {
    /// # Panics
    /// Panics if `seq_zero > SEQ_ZERO_MAX`.
    #[must_use]
    pub fn new(seq_zero: u16) -> Self {
        assert!(seq_zero <= SEQ_ZERO_MAX, "seq_zero {} overflow", seq_zero);
        SeqZero(seq_zero)
    }
    #[must_use]
    pub const fn new_masked(seq_zero: u16) -> Self {
        SeqZero(seq_zero & SEQ_ZERO_MAX)
    }
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
    #[must_use]
    pub fn from_seq(seq: SequenceNumber) -> Self {
        Self::new_masked(seq.value() as u16)
    }
    /// Recovers the full SeqAuth from this `SeqZero` and the SEQ of any segment of the message.
    /// Segments are sent at most 8191 sequence numbers after the first one.
    #[must_use]
    pub fn seq_auth(self, seq: SequenceNumber) -> Option<SequenceNumber> {
        let delta = seq.value().wrapping_sub(u32::from(self.0)) & u32::from(SEQ_ZERO_MAX);
        seq.value().checked_sub(delta).map(SequenceNumber::new)
    }
}
/// Segments are numbered 0 through 31.
pub const SEG_MAX: u8 = 0x1F;
pub const MAX_SEGMENTS: usize = SEG_MAX as usize + 1;

/// 5 bit SegO (Segment Offset number)
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq, Default)]
pub struct SegO(u8);
impl SegO {
    /// # Panics
    /// Panics if `v > SEG_MAX`.
    #[must_use]
    pub fn new(v: u8) -> Self {
        assert!(v <= SEG_MAX, "seg_o {} overflow", v);
        Self(v)
    }
    #[must_use]
    pub const fn new_masked(v: u8) -> Self {
        Self(v & SEG_MAX)
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}
impl From<SegO> for u8 {
    fn from(s: SegO) -> Self {
        s.0
    }
}
/// 5 bit SegN (Last Segment number)
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq, Default)]
pub struct SegN(u8);
impl SegN {
    /// # Panics
    /// Panics if `v > SEG_MAX`.
    #[must_use]
    pub fn new(v: u8) -> Self {
        assert!(v <= SEG_MAX, "seg_n {} overflow", v);
        Self(v)
    }
    #[must_use]
    pub const fn new_masked(v: u8) -> Self {
        Self(v & SEG_MAX)
    }
    /// `SegN` of a message split into `count` segments.
    /// # Errors
    /// `TooManySegments` if `count > 32`, `BadLength` if `count == 0`.
    pub fn from_segment_count(count: usize) -> Result<Self, LowerError> {
        match count {
            0 => Err(LowerError::BadLength),
            c if c > MAX_SEGMENTS => Err(LowerError::TooManySegments),
            c => Ok(SegN((c - 1) as u8)),
        }
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
    #[must_use]
    pub fn segment_count(self) -> usize {
        usize::from(self.0) + 1
    }
}
impl From<SegN> for u8 {
    fn from(s: SegN) -> Self {
        s.0
    }
}
/// Bitmap of received segments. Bit `n` is segment `n`.
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq, Default)]
pub struct BlockAck(pub u32);
impl BlockAck {
    /// Sets the `bit` bit to 1. Does nothing if bit >= 32
    pub fn set(&mut self, bit: u8) {
        debug_assert!(bit < 32, "{} index overflow into u32", bit);
        if bit >= 32 {
            return;
        }
        (self.0) |= 1_u32 << u32::from(bit);
    }
    /// Returns the bit status (1 or 0) of the `bit` bit. Returns `False` for bit >= 32
    #[must_use]
    pub fn get(self, bit: u8) -> bool {
        if bit >= 32 {
            false
        } else {
            (self.0 & (1_u32 << u32::from(bit))) != 0
        }
    }
    /// Every bit from 0 to `seg_n` set.
    #[must_use]
    pub fn full(seg_n: SegN) -> BlockAck {
        BlockAck(u32::MAX >> (31 - u32::from(seg_n.0)))
    }
    /// Returns if the block ack (bits 0 through `seg_n`) is all 1s. False if otherwise
    #[must_use]
    pub fn all_acked(self, seg_n: SegN) -> bool {
        let full = Self::full(seg_n).0;
        self.0 & full == full
    }
    /// Segments `0..=seg_n` not in the block ack.
    pub fn missing(self, seg_n: SegN) -> impl Iterator<Item = SegO> {
        (0..=seg_n.0).filter(move |&b| !self.get(b)).map(SegO)
    }
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }
    #[must_use]
    pub const fn max_len() -> usize {
        32
    }
}
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct SEG(pub bool);
impl SEG {
    #[must_use]
    pub const fn new_upper_masked(v: u8) -> SEG {
        SEG(v & 0x80 != 0)
    }
}
impl From<SEG> for bool {
    fn from(s: SEG) -> Self {
        s.0
    }
}
impl From<bool> for SEG {
    fn from(b: bool) -> Self {
        SEG(b)
    }
}
/// On Behalf Of flag of a Segment Acknowledgement.
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq, Default)]
pub struct OBO(pub bool);

/// `flag(1) | SeqZero(13) | SegO(5) | SegN(5)`. `flag` is SZMIC for access messages and RFU for
/// control messages.
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct SegmentHeader {
    pub flag: bool,
    pub seq_zero: SeqZero,
    pub seg_o: SegO,
    pub seg_n: SegN,
}
impl SegmentHeader {
    #[must_use]
    pub fn new(flag: bool, seq_zero: SeqZero, seg_o: SegO, seg_n: SegN) -> Self {
        Self {
            flag,
            seq_zero,
            seg_o,
            seg_n,
        }
    }
    #[must_use]
    pub fn pack_into_u24(self) -> U24 {
        U24::new_masked(
            (u32::from(self.flag) << 23)
                | (u32::from(self.seq_zero.0) << 10)
                | (u32::from(self.seg_o.0) << 5)
                | u32::from(self.seg_n.0),
        )
    }
    /// # Errors
    /// `BadSegmentHeader` if `SegO > SegN`.
    pub fn unpack_from_u24(v: U24) -> Result<Self, LowerError> {
        let v = v.value();
        let header = SegmentHeader {
            flag: v & (1 << 23) != 0,
            seq_zero: SeqZero::new_masked((v >> 10) as u16),
            seg_o: SegO::new_masked((v >> 5) as u8),
            seg_n: SegN::new_masked(v as u8),
        };
        if header.seg_o.0 > header.seg_n.0 {
            Err(LowerError::BadSegmentHeader)
        } else {
            Ok(header)
        }
    }
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.seg_o.0 == self.seg_n.0
    }
}

const SEG_HEADER_LEN: usize = 3;
/// Max bytes of upper transport PDU in an unsegmented access message (11 payload + 4 MIC).
pub const UNSEGMENTED_ACCESS_PDU_LEN: usize = 15;
/// Opcode plus the smallest TransMIC.
const MIN_UNSEGMENTED_ACCESS_PDU_LEN: usize = 5;
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct UnsegmentedAccessPDU {
    akf: AKF,
    aid: AID,
    access_pdu_buf: [u8; UNSEGMENTED_ACCESS_PDU_LEN],
    access_pdu_len: u8,
}
impl UnsegmentedAccessPDU {
    /// # Errors
    /// `BadLength` unless `5 <= data.len() <= 15`.
    pub fn new(akf: AKF, aid: AID, data: &[u8]) -> Result<UnsegmentedAccessPDU, LowerError> {
        if data.len() > UNSEGMENTED_ACCESS_PDU_LEN || data.len() < MIN_UNSEGMENTED_ACCESS_PDU_LEN
        {
            return Err(LowerError::BadLength);
        }
        let mut buf = [0_u8; UNSEGMENTED_ACCESS_PDU_LEN];
        buf[..data.len()].copy_from_slice(data);
        Ok(UnsegmentedAccessPDU {
            akf,
            aid,
            access_pdu_buf: buf,
            access_pdu_len: data.len() as u8,
        })
    }
    #[must_use]
    pub const fn akf(&self) -> AKF {
        self.akf
    }
    #[must_use]
    pub const fn aid(&self) -> AID {
        self.aid
    }
    #[must_use]
    pub fn upper_pdu(&self) -> &[u8] {
        &self.access_pdu_buf[..usize::from(self.access_pdu_len)]
    }
    #[must_use]
    pub fn to_bytes(&self) -> PDUBytes {
        let mut out = PDUBytes::empty();
        out.push(u8::from(self.akf.0) << 6 | self.aid.value());
        out.extend(self.upper_pdu());
        out
    }
    /// # Errors
    /// `BadLength` if the upper PDU is too short or long, `BadSegmentHeader` if SEG is set.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LowerError> {
        let first = *bytes.first().ok_or(LowerError::BadLength)?;
        if SEG::new_upper_masked(first).0 {
            return Err(LowerError::BadSegmentHeader);
        }
        Self::new(AKF(first & 0x40 != 0), AID::new_masked(first), &bytes[1..])
    }
}
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct SegmentedAccessPDU {
    akf: AKF,
    aid: AID,
    segment_header: SegmentHeader,
    segment_buf: [u8; SegmentedAccessPDU::max_seg_len()],
    len: u8,
}

impl SegmentedAccessPDU {
    /// # Errors
    /// `BadLength` if `data` is empty or longer than 12 bytes.
    pub fn new(
        akf: AKF,
        aid: AID,
        szmic: SZMIC,
        seq_zero: SeqZero,
        seg_o: SegO,
        seg_n: SegN,
        data: &[u8],
    ) -> Result<Self, LowerError> {
        if data.is_empty() || data.len() > Self::max_seg_len() {
            return Err(LowerError::BadLength);
        }
        if seg_o > SegO(seg_n.0) {
            return Err(LowerError::BadSegmentHeader);
        }
        let mut buf = [0_u8; SegmentedAccessPDU::max_seg_len()];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            akf,
            aid,
            segment_header: SegmentHeader::new(szmic.0, seq_zero, seg_o, seg_n),
            segment_buf: buf,
            len: data.len() as u8,
        })
    }
    #[must_use]
    pub const fn akf(&self) -> AKF {
        self.akf
    }
    #[must_use]
    pub const fn aid(&self) -> AID {
        self.aid
    }
    #[must_use]
    pub const fn szmic(&self) -> SZMIC {
        SZMIC(self.segment_header.flag)
    }
    #[must_use]
    pub const fn header(&self) -> &SegmentHeader {
        &self.segment_header
    }
    #[must_use]
    pub fn segment_data(&self) -> &[u8] {
        &self.segment_buf[..usize::from(self.len)]
    }
    #[must_use]
    pub fn to_bytes(&self) -> PDUBytes {
        let mut out = PDUBytes::empty();
        out.push(0x80 | u8::from(self.akf.0) << 6 | self.aid.value());
        out.extend(&self.segment_header.pack_into_u24().to_bytes_be());
        out.extend(self.segment_data());
        out
    }
    /// # Errors
    /// `BadLength` for a missing header or segment, `BadSegmentHeader` if SEG is clear or
    /// `SegO > SegN`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LowerError> {
        if bytes.len() <= 1 + SEG_HEADER_LEN {
            return Err(LowerError::BadLength);
        }
        if !SEG::new_upper_masked(bytes[0]).0 {
            return Err(LowerError::BadSegmentHeader);
        }
        let header = SegmentHeader::unpack_from_u24(
            U24::from_bytes_be(&bytes[1..=SEG_HEADER_LEN]).ok_or(LowerError::BadLength)?,
        )?;
        Self::new(
            AKF(bytes[0] & 0x40 != 0),
            AID::new_masked(bytes[0]),
            SZMIC(header.flag),
            header.seq_zero,
            header.seg_o,
            header.seg_n,
            &bytes[1 + SEG_HEADER_LEN..],
        )
    }
    #[must_use]
    pub const fn max_seg_len() -> usize {
        12
    }
}

pub const UNSEGMENTED_CONTROL_PDU_LEN: usize = 11;
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct UnsegmentedControlPDU {
    parameters_buf: [u8; UNSEGMENTED_CONTROL_PDU_LEN],
    parameters_len: u8,
    opcode: ControlOpcode,
}
impl UnsegmentedControlPDU {
    /// # Errors
    /// `BadLength` if `parameters.len() > 11`.
    pub fn new(
        opcode: ControlOpcode,
        parameters: &[u8],
    ) -> Result<UnsegmentedControlPDU, LowerError> {
        if parameters.len() > UNSEGMENTED_CONTROL_PDU_LEN {
            return Err(LowerError::BadLength);
        }
        let mut buf = [0_u8; UNSEGMENTED_CONTROL_PDU_LEN];
        buf[..parameters.len()].copy_from_slice(parameters);
        Ok(UnsegmentedControlPDU {
            parameters_buf: buf,
            parameters_len: parameters.len() as u8,
            opcode,
        })
    }
    #[must_use]
    pub const fn opcode(&self) -> ControlOpcode {
        self.opcode
    }
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.parameters_buf[..usize::from(self.parameters_len)]
    }
    #[must_use]
    pub fn to_bytes(&self) -> PDUBytes {
        let mut out = PDUBytes::empty();
        out.push(u8::from(self.opcode));
        out.extend(self.data());
        out
    }
    /// # Errors
    /// `BadOpcode` for an unknown opcode, `BadLength` for too many parameters.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LowerError> {
        let first = *bytes.first().ok_or(LowerError::BadLength)?;
        if SEG::new_upper_masked(first).0 {
            return Err(LowerError::BadSegmentHeader);
        }
        let opcode = ControlOpcode::new(first & 0x7F).ok_or(LowerError::BadOpcode)?;
        Self::new(opcode, &bytes[1..])
    }
}
/// Segmented Control PDU Lengths
/// | # Packets  | PDU Size |
/// |      1     |     8    |
/// |      2     |    16    |
/// |      n     |    n*8   |
/// |     32     |    256   |
pub const SEGMENTED_CONTROL_PDU_LEN: usize = 8;
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct SegmentedControlPDU {
    opcode: ControlOpcode,
    segment_header: SegmentHeader,
    segment_buf: [u8; SEGMENTED_CONTROL_PDU_LEN],
    segment_buf_len: u8,
}
impl SegmentedControlPDU {
    /// # Errors
    /// `BadLength` if `data` is empty or longer than 8 bytes.
    pub fn new(
        opcode: ControlOpcode,
        header: SegmentHeader,
        data: &[u8],
    ) -> Result<SegmentedControlPDU, LowerError> {
        if data.is_empty() || data.len() > SEGMENTED_CONTROL_PDU_LEN {
            return Err(LowerError::BadLength);
        }
        let mut buf = [0_u8; SEGMENTED_CONTROL_PDU_LEN];
        buf[..data.len()].copy_from_slice(data);
        Ok(SegmentedControlPDU {
            opcode,
            segment_header: header,
            segment_buf: buf,
            segment_buf_len: data.len() as u8,
        })
    }
    #[must_use]
    pub fn segment_data(&self) -> &[u8] {
        &self.segment_buf[..usize::from(self.segment_buf_len)]
    }
    #[must_use]
    pub const fn opcode(&self) -> ControlOpcode {
        self.opcode
    }
    #[must_use]
    pub const fn header(&self) -> &SegmentHeader {
        &self.segment_header
    }
    #[must_use]
    pub fn to_bytes(&self) -> PDUBytes {
        let mut out = PDUBytes::empty();
        out.push(0x80 | u8::from(self.opcode));
        out.extend(&self.segment_header.pack_into_u24().to_bytes_be());
        out.extend(self.segment_data());
        out
    }
    /// # Errors
    /// See [`SegmentedAccessPDU::from_bytes`]. `BadOpcode` for an unknown opcode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LowerError> {
        if bytes.len() <= 1 + SEG_HEADER_LEN {
            return Err(LowerError::BadLength);
        }
        if !SEG::new_upper_masked(bytes[0]).0 {
            return Err(LowerError::BadSegmentHeader);
        }
        let opcode = ControlOpcode::new(bytes[0] & 0x7F).ok_or(LowerError::BadOpcode)?;
        let header = SegmentHeader::unpack_from_u24(
            U24::from_bytes_be(&bytes[1..=SEG_HEADER_LEN]).ok_or(LowerError::BadLength)?,
        )?;
        Self::new(opcode, header, &bytes[1 + SEG_HEADER_LEN..])
    }
    #[must_use]
    pub const fn max_seg_len() -> usize {
        SEGMENTED_CONTROL_PDU_LEN
    }
}

#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub enum PDU {
    UnsegmentedAccess(UnsegmentedAccessPDU),
    SegmentedAccess(SegmentedAccessPDU),
    UnsegmentedControl(UnsegmentedControlPDU),
    SegmentedControl(SegmentedControlPDU),
}
impl PDU {
    #[must_use]
    pub fn is_seg(&self) -> bool {
        match self {
            PDU::UnsegmentedAccess(_) | PDU::UnsegmentedControl(_) => false,
            PDU::SegmentedAccess(_) | PDU::SegmentedControl(_) => true,
        }
    }
    #[must_use]
    pub fn is_control(&self) -> bool {
        match self {
            PDU::UnsegmentedAccess(_) | PDU::SegmentedAccess(_) => false,
            PDU::UnsegmentedControl(_) | PDU::SegmentedControl(_) => true,
        }
    }
    #[must_use]
    pub fn ctl(&self) -> CTL {
        CTL(self.is_control())
    }
    #[must_use]
    pub fn segment_header(&self) -> Option<&SegmentHeader> {
        match self {
            PDU::SegmentedAccess(p) => Some(p.header()),
            PDU::SegmentedControl(p) => Some(p.header()),
            PDU::UnsegmentedAccess(_) | PDU::UnsegmentedControl(_) => None,
        }
    }
    /// Number of bytes required to hold any serialized `lower::PDU` in a byte buffer.
    #[must_use]
    pub const fn max_len() -> usize {
        16
    }
    #[must_use]
    pub fn to_bytes(&self) -> PDUBytes {
        match self {
            PDU::UnsegmentedAccess(p) => p.to_bytes(),
            PDU::SegmentedAccess(p) => p.to_bytes(),
            PDU::UnsegmentedControl(p) => p.to_bytes(),
            PDU::SegmentedControl(p) => p.to_bytes(),
        }
    }
    /// # Errors
    /// Returns `LowerError` if `bytes` isn't a valid PDU of the kind `ctl` and SEG select.
    pub fn from_bytes(bytes: &[u8], ctl: CTL) -> Result<Self, LowerError> {
        let first = *bytes.first().ok_or(LowerError::BadLength)?;
        if bytes.len() > Self::max_len() {
            return Err(LowerError::BadLength);
        }
        Ok(match (ctl.0, SEG::new_upper_masked(first).0) {
            (true, true) => PDU::SegmentedControl(SegmentedControlPDU::from_bytes(bytes)?),
            (true, false) => PDU::UnsegmentedControl(UnsegmentedControlPDU::from_bytes(bytes)?),
            (false, false) => PDU::UnsegmentedAccess(UnsegmentedAccessPDU::from_bytes(bytes)?),
            (false, true) => PDU::SegmentedAccess(SegmentedAccessPDU::from_bytes(bytes)?),
        })
    }
}
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct PDUBytes {
    buf: [u8; PDU::max_len()],
    buf_len: usize,
}
impl PDUBytes {
    const fn empty() -> PDUBytes {
        PDUBytes {
            buf: [0_u8; PDU::max_len()],
            buf_len: 0,
        }
    }
    fn push(&mut self, b: u8) {
        self.buf[self.buf_len] = b;
        self.buf_len += 1;
    }
    fn extend(&mut self, bytes: &[u8]) {
        self.buf[self.buf_len..self.buf_len + bytes.len()].copy_from_slice(bytes);
        self.buf_len += bytes.len();
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf_len
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf_len == 0
    }
    #[must_use]
    pub fn seg(&self) -> SEG {
        debug_assert!(!self.is_empty());
        SEG::new_upper_masked(self.buf[0])
    }
}
impl AsRef<[u8]> for PDUBytes {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.buf_len]
    }
}
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct PDUBytesError;
impl TryFrom<&[u8]> for PDUBytes {
    type Error = PDUBytesError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let l = value.len();
        if l == 0 || l > PDU::max_len() {
            Err(PDUBytesError)
        } else {
            let mut out = PDUBytes::empty();
            out.extend(value);
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segmented_access_vector() {
        // Mesh Profile sample data Message #6, segment 1 of 2.
        let pdu = SegmentedAccessPDU::from_bytes(
            &hex::decode("8026ac01ee9dddfd2169326d23f3afdf").unwrap(),
        )
        .unwrap();
        assert_eq!(pdu.akf(), AKF(false));
        assert_eq!(pdu.header().seq_zero, SeqZero::new(0x09ab));
        assert_eq!(pdu.header().seg_o, SegO::new(0));
        assert_eq!(pdu.header().seg_n, SegN::new(1));
        assert_eq!(
            pdu.to_bytes().as_ref(),
            &hex::decode("8026ac01ee9dddfd2169326d23f3afdf").unwrap()[..]
        );
    }
    #[test]
    fn test_unsegmented_access() {
        let bytes = hex::decode("665ca6cd5c8ef0b05e1e6dbd").unwrap();
        match PDU::from_bytes(&bytes, CTL(false)).unwrap() {
            PDU::UnsegmentedAccess(p) => {
                assert_eq!(p.akf(), AKF(true));
                assert_eq!(p.aid(), AID::new(0x26));
                assert_eq!(p.to_bytes().as_ref(), &bytes[..]);
            }
            other => panic!("wrong pdu {:?}", other),
        }
        assert_eq!(
            UnsegmentedAccessPDU::from_bytes(&[0x00, 1, 2, 3]),
            Err(LowerError::BadLength)
        );
    }
    #[test]
    fn test_control_pdus() {
        let ack = PDU::from_bytes(&hex::decode("0026ac00000003").unwrap(), CTL(true)).unwrap();
        assert!(matches!(ack, PDU::UnsegmentedControl(p) if p.opcode() == ControlOpcode::SegmentAck));
        assert_eq!(
            PDU::from_bytes(&[0x7F], CTL(true)),
            Err(LowerError::BadOpcode)
        );
        let header = SegmentHeader::new(false, SeqZero::new(3), SegO::new(1), SegN::new(1));
        let seg = SegmentedControlPDU::new(ControlOpcode::Heartbeat, header, &[1, 2]).unwrap();
        let bytes = seg.to_bytes();
        assert!(bytes.seg().0);
        assert_eq!(
            PDU::from_bytes(bytes.as_ref(), CTL(true)),
            Ok(PDU::SegmentedControl(seg))
        );
    }
    #[test]
    fn test_bad_segment_header() {
        // SegO 2 > SegN 1
        assert_eq!(
            SegmentedAccessPDU::from_bytes(&[0x80, 0x00, 0x00, 0x41, 0xAA]),
            Err(LowerError::BadSegmentHeader)
        );
    }
    #[test]
    fn test_block_ack() {
        let mut ack = BlockAck::default();
        ack.set(0);
        ack.set(2);
        assert!(!ack.all_acked(SegN::new(2)));
        assert_eq!(
            ack.missing(SegN::new(3)).collect::<Vec<_>>(),
            vec![SegO::new(1), SegO::new(3)]
        );
        ack.set(1);
        assert!(ack.all_acked(SegN::new(2)));
        assert_eq!(BlockAck::full(SegN::new(31)).0, u32::MAX);
        assert_eq!(BlockAck::full(SegN::new(0)).0, 1);
    }
    #[test]
    fn test_seq_auth_recovery() {
        let seq_zero = SeqZero::from_seq(SequenceNumber::new(0x3129ab));
        assert_eq!(
            seq_zero.seq_auth(SequenceNumber::new(0x3129ad)),
            Some(SequenceNumber::new(0x3129ab))
        );
        // SEQ wrapped past the 13 bit boundary.
        let seq_zero = SeqZero::from_seq(SequenceNumber::new(0x001fff));
        assert_eq!(
            seq_zero.seq_auth(SequenceNumber::new(0x002001)),
            Some(SequenceNumber::new(0x001fff))
        );
        assert_eq!(SegN::from_segment_count(33), Err(LowerError::TooManySegments));
        assert_eq!(SegN::from_segment_count(2), Ok(SegN::new(1)));
    }
}
