//! Proxy PDU framing for MTU limited links (GATT). Every PDU sent to or received from the link is
//! wrapped in a one byte header `SAR(2) | Type(6)` and split into MTU sized chunks.
use core::convert::TryFrom;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("empty proxy PDU")]
    Empty,
    #[error("message type {0:#04x} is reserved")]
    BadMessageType(u8),
    #[error("continuation or last segment without a first segment")]
    UnexpectedContinuation,
    #[error("complete PDU in the middle of a segmented one")]
    UnexpectedComplete,
    #[error("segment message type changed mid message")]
    TypeMismatch,
    #[error("MTU {0} too small")]
    MtuTooSmall(usize),
    #[error("segmented message longer than {} bytes", MAX_MESSAGE_LEN)]
    TooLong,
}

/// Largest message carried in proxy PDUs: a Provisioning Public Key (opcode + X + Y). Network
/// PDUs, beacons and proxy configuration messages are all shorter.
pub const MAX_MESSAGE_LEN: usize = 1 + 64;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum MessageType {
    NetworkPDU = 0x00,
    MeshBeacon = 0x01,
    ProxyConfiguration = 0x02,
    ProvisioningPDU = 0x03,
}
impl TryFrom<u8> for MessageType {
    type Error = ProxyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(MessageType::NetworkPDU),
            0x01 => Ok(MessageType::MeshBeacon),
            0x02 => Ok(MessageType::ProxyConfiguration),
            0x03 => Ok(MessageType::ProvisioningPDU),
            _ => Err(ProxyError::BadMessageType(value)),
        }
    }
}
/// Segmentation And Reassembly
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum SAR {
    Complete = 0b00,
    First = 0b01,
    Continuation = 0b10,
    Last = 0b11,
}
impl SAR {
    #[must_use]
    pub const fn from_masked_u8(v: u8) -> SAR {
        match v & 0b11 {
            0b00 => SAR::Complete,
            0b01 => SAR::First,
            0b10 => SAR::Continuation,
            _ => SAR::Last,
        }
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct ProxyHeader {
    pub sar: SAR,
    pub message_type: MessageType,
}
impl ProxyHeader {
    #[must_use]
    pub const fn new(sar: SAR, message_type: MessageType) -> Self {
        Self { sar, message_type }
    }
}
impl From<ProxyHeader> for u8 {
    fn from(h: ProxyHeader) -> Self {
        ((h.sar as u8) << 6) | h.message_type as u8
    }
}
impl TryFrom<u8> for ProxyHeader {
    type Error = ProxyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(ProxyHeader {
            sar: SAR::from_masked_u8(value >> 6),
            message_type: MessageType::try_from(value & 0x3F)?,
        })
    }
}

/// Splits `pdu` into proxy PDUs of at most `mtu` bytes (header included).
/// # Errors
/// `MtuTooSmall` if `mtu < 2`, `Empty` for an empty `pdu`.
pub fn segment(
    message_type: MessageType,
    pdu: &[u8],
    mtu: usize,
) -> Result<Vec<Vec<u8>>, ProxyError> {
    if mtu < 2 {
        return Err(ProxyError::MtuTooSmall(mtu));
    }
    if pdu.is_empty() {
        return Err(ProxyError::Empty);
    }
    let chunk_len = mtu - 1;
    let chunk_count = (pdu.len() + chunk_len - 1) / chunk_len;
    Ok(pdu
        .chunks(chunk_len)
        .enumerate()
        .map(|(i, chunk)| {
            let sar = match (i, chunk_count) {
                (_, 1) => SAR::Complete,
                (0, _) => SAR::First,
                (i, c) if i + 1 == c => SAR::Last,
                _ => SAR::Continuation,
            };
            let mut out = Vec::with_capacity(chunk.len() + 1);
            out.push(ProxyHeader::new(sar, message_type).into());
            out.extend_from_slice(chunk);
            out
        })
        .collect())
}

/// Reassembles proxy PDUs coming from one link.
#[derive(Clone, Debug, Default)]
pub struct ProxyReassembler {
    pending: Option<(MessageType, Vec<u8>)>,
}
impl ProxyReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Feeds one proxy PDU. Returns the message once its last segment arrives. A `First` segment
    /// while another message is pending drops the pending one.
    /// # Errors
    /// Any framing error. The pending message (if any) is dropped.
    pub fn push(&mut self, proxy_pdu: &[u8]) -> Result<Option<(MessageType, Vec<u8>)>, ProxyError> {
        let (&first, data) = proxy_pdu.split_first().ok_or(ProxyError::Empty)?;
        let header = ProxyHeader::try_from(first).map_err(|e| {
            self.pending = None;
            e
        })?;
        match header.sar {
            SAR::Complete => {
                if self.pending.take().is_some() {
                    return Err(ProxyError::UnexpectedComplete);
                }
                Ok(Some((header.message_type, data.to_vec())))
            }
            SAR::First => {
                if data.len() > MAX_MESSAGE_LEN {
                    self.pending = None;
                    return Err(ProxyError::TooLong);
                }
                self.pending = Some((header.message_type, data.to_vec()));
                Ok(None)
            }
            SAR::Continuation | SAR::Last => {
                let (message_type, mut buf) = self
                    .pending
                    .take()
                    .ok_or(ProxyError::UnexpectedContinuation)?;
                if message_type != header.message_type {
                    return Err(ProxyError::TypeMismatch);
                }
                if buf.len() + data.len() > MAX_MESSAGE_LEN {
                    return Err(ProxyError::TooLong);
                }
                buf.extend_from_slice(data);
                if header.sar == SAR::Last {
                    Ok(Some((message_type, buf)))
                } else {
                    self.pending = Some((message_type, buf));
                    Ok(None)
                }
            }
        }
    }
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
    pub fn reset(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_fits_one_write() {
        // Provisioning Start: opcode + 5 parameters.
        let start = [0x02, 0x00, 0x00, 0x02, 0x01, 0x04];
        let pdus = segment(MessageType::ProvisioningPDU, &start, 20).unwrap();
        assert_eq!(pdus.len(), 1);
        assert_eq!(pdus[0].len(), 7);
        assert_eq!(pdus[0][0], 0x03);
    }
    #[test]
    fn test_segment_and_reassemble() {
        let pdu: Vec<u8> = (0..50).collect();
        let pdus = segment(MessageType::NetworkPDU, &pdu, 20).unwrap();
        assert_eq!(pdus.len(), 3);
        assert_eq!(pdus[0][0], 0b0100_0000);
        assert_eq!(pdus[1][0], 0b1000_0000);
        assert_eq!(pdus[2][0], 0b1100_0000);
        let mut reassembler = ProxyReassembler::new();
        assert_eq!(reassembler.push(&pdus[0]), Ok(None));
        assert_eq!(reassembler.push(&pdus[1]), Ok(None));
        assert_eq!(
            reassembler.push(&pdus[2]),
            Ok(Some((MessageType::NetworkPDU, pdu)))
        );
        assert!(!reassembler.is_pending());
    }
    #[test]
    fn test_reassembly_errors() {
        let mut reassembler = ProxyReassembler::new();
        assert_eq!(
            reassembler.push(&[0b1100_0000, 1]),
            Err(ProxyError::UnexpectedContinuation)
        );
        assert_eq!(reassembler.push(&[0x3F]), Err(ProxyError::BadMessageType(0x3F)));
        assert_eq!(reassembler.push(&[0b0100_0000, 1]), Ok(None));
        assert_eq!(
            reassembler.push(&[0b1100_0011, 1]),
            Err(ProxyError::TypeMismatch)
        );
        reassembler.reset();
        assert_eq!(reassembler.push(&[0b0100_0011; 20]), Ok(None));
        for _ in 0..2 {
            assert_eq!(reassembler.push(&[0b1000_0011; 20]), Ok(None));
        }
        // 57 bytes pending, 19 more would pass the Public Key size.
        assert_eq!(
            reassembler.push(&[0b1000_0011; 20]),
            Err(ProxyError::TooLong)
        );
        assert!(!reassembler.is_pending());
        assert_eq!(
            reassembler.push(&[0b1100_0011; 20]),
            Err(ProxyError::UnexpectedContinuation)
        );
        let public_key: Vec<u8> = (0..MAX_MESSAGE_LEN as u8).collect();
        for pdu in segment(MessageType::ProvisioningPDU, &public_key, 20).unwrap() {
            if let Some(done) = reassembler.push(&pdu).unwrap() {
                assert_eq!(done, (MessageType::ProvisioningPDU, public_key.clone()));
            }
        }
        assert!(!reassembler.is_pending());
        assert_eq!(
            segment(MessageType::NetworkPDU, &[1], 1),
            Err(ProxyError::MtuTooSmall(1))
        );
    }
}
