//! Access Layer between Models and the rest of the stack (Transport, Network, etc). The most
//! surface layer of the stack. An access PDU is an opcode (1, 2 or 3 bytes) followed by the
//! model's parameters.
use crate::bytes::ToFromBytesEndian;
use crate::mesh::{CompanyID, ModelID};
use core::fmt::{Display, Formatter};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum SigOpcode {
    SingleOctet(u8),
    DoubleOctet(u16),
}
impl SigOpcode {
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        match self {
            SigOpcode::SingleOctet(_) => 1,
            SigOpcode::DoubleOctet(_) => 2,
        }
    }
}
impl From<SigOpcode> for Opcode {
    fn from(opcode: SigOpcode) -> Self {
        Opcode::SIG(opcode)
    }
}
const VENDOR_OPCODE_MAX: u8 = (1_u8 << 6) - 1;
/// 6 bit Vendor Opcode
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct VendorOpcode(u8);
impl VendorOpcode {
    /// # Panics
    /// Panics if `opcode > 0x3F`.
    #[must_use]
    pub fn new(opcode: u8) -> Self {
        assert!(opcode <= VENDOR_OPCODE_MAX, "vendor opcode {} overflow", opcode);
        VendorOpcode(opcode)
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, thiserror::Error)]
pub enum OpcodeError {
    #[error("opcode 0x7F is reserved")]
    Reserved,
    #[error("buffer too short for opcode")]
    TooShort,
    #[error("value isn't a valid opcode of its kind")]
    Invalid,
}
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    SIG(SigOpcode),
    Vendor(VendorOpcode, CompanyID),
}
impl Opcode {
    /// Picks the SIG opcode form from the value: `< 0x7F` is one byte, `0x8000..=0xBFFF` is two.
    /// # Panics
    /// Panics if `opcode` is neither.
    #[must_use]
    pub fn sig(opcode: u16) -> Opcode {
        if opcode < 0x7F {
            Opcode::SIG(SigOpcode::SingleOctet(opcode as u8))
        } else {
            assert!(
                opcode & 0xC000 == 0x8000,
                "{:#06x} is not a SIG opcode",
                opcode
            );
            Opcode::SIG(SigOpcode::DoubleOctet(opcode))
        }
    }
    #[must_use]
    pub fn vendor(opcode: u8, company_id: CompanyID) -> Opcode {
        Opcode::Vendor(VendorOpcode::new(opcode), company_id)
    }
    #[must_use]
    pub fn company_id(&self) -> Option<CompanyID> {
        match self {
            Opcode::Vendor(_, cid) => Some(*cid),
            Opcode::SIG(_) => None,
        }
    }
    #[must_use]
    pub fn is_sig(&self) -> bool {
        self.company_id().is_none()
    }
    #[must_use]
    pub fn is_vendor(&self) -> bool {
        !self.is_sig()
    }
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match self {
            Opcode::SIG(o) => o.byte_len(),
            Opcode::Vendor(_, _) => 3,
        }
    }
    #[must_use]
    pub const fn max_byte_len() -> usize {
        3
    }
    /// Reads the opcode at the start of `bytes`. The length is picked from the two high bits of
    /// the first byte so `bytes` can be a whole access PDU.
    /// # Errors
    /// `Reserved` for `0x7F`, `TooShort` if `bytes` ends inside the opcode.
    pub fn unpack_from(bytes: &[u8]) -> Result<Self, OpcodeError> {
        let first = *bytes.first().ok_or(OpcodeError::TooShort)?;
        match first >> 6 {
            _ if first == 0x7F => Err(OpcodeError::Reserved),
            0b00 | 0b01 => Ok(Opcode::SIG(SigOpcode::SingleOctet(first))),
            0b10 => {
                let op = u16::from_bytes_be(bytes.get(..2).ok_or(OpcodeError::TooShort)?)
                    .ok_or(OpcodeError::TooShort)?;
                Ok(Opcode::SIG(SigOpcode::DoubleOctet(op)))
            }
            _ => {
                let company_id = u16::from_bytes_le(bytes.get(1..3).ok_or(OpcodeError::TooShort)?)
                    .ok_or(OpcodeError::TooShort)?;
                Ok(Opcode::Vendor(
                    VendorOpcode(first & VENDOR_OPCODE_MAX),
                    CompanyID(company_id),
                ))
            }
        }
    }
    /// Writes the opcode into the start of `buffer`. Two byte SIG opcodes are big endian, the
    /// vendor company ID is little endian.
    /// # Errors
    /// `TooShort` if `buffer.len() < self.byte_len()`, `Invalid` if the stored value doesn't fit
    /// its form.
    pub fn pack_into(&self, buffer: &mut [u8]) -> Result<(), OpcodeError> {
        if buffer.len() < self.byte_len() {
            return Err(OpcodeError::TooShort);
        }
        match *self {
            Opcode::SIG(SigOpcode::SingleOctet(s)) => {
                if s == 0x7F {
                    return Err(OpcodeError::Reserved);
                }
                if s & 0x80 != 0 {
                    return Err(OpcodeError::Invalid);
                }
                buffer[0] = s;
            }
            Opcode::SIG(SigOpcode::DoubleOctet(d)) => {
                if d & 0xC000 != 0x8000 {
                    return Err(OpcodeError::Invalid);
                }
                buffer[..2].copy_from_slice(&d.to_bytes_be());
            }
            Opcode::Vendor(opcode, company_id) => {
                buffer[0] = opcode.0 | 0xC0;
                buffer[1..3].copy_from_slice(&company_id.0.to_bytes_le());
            }
        }
        Ok(())
    }
}
impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Opcode::SIG(SigOpcode::SingleOctet(s)) => write!(f, "{:#04x}", s),
            Opcode::SIG(SigOpcode::DoubleOctet(d)) => write!(f, "{:#06x}", d),
            Opcode::Vendor(o, c) => write!(f, "{:#04x}:{:#06x}", o.0, c.0),
        }
    }
}

/// Access PDU before Upper Transport encryption.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct AccessMessage {
    pub opcode: Opcode,
    pub parameters: Vec<u8>,
}
/// Biggest access PDU: 32 segments of 12 bytes minus the 4 byte TransMIC.
pub const MAX_ACCESS_PDU_LEN: usize = 380;
impl AccessMessage {
    #[must_use]
    pub fn new(opcode: Opcode, parameters: impl Into<Vec<u8>>) -> AccessMessage {
        AccessMessage {
            opcode,
            parameters: parameters.into(),
        }
    }
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.opcode.byte_len() + self.parameters.len()
    }
    /// # Errors
    /// Anything [`Opcode::pack_into`] reports.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OpcodeError> {
        let mut out = vec![0_u8; self.byte_len()];
        self.opcode.pack_into(&mut out)?;
        out[self.opcode.byte_len()..].copy_from_slice(&self.parameters);
        Ok(out)
    }
    /// # Errors
    /// Anything [`Opcode::unpack_from`] reports.
    pub fn from_bytes(bytes: &[u8]) -> Result<AccessMessage, OpcodeError> {
        let opcode = Opcode::unpack_from(bytes)?;
        Ok(AccessMessage {
            opcode,
            parameters: bytes[opcode.byte_len()..].to_vec(),
        })
    }
}

/// SIG or vendor model identifier as carried by configuration messages.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelIdentifier {
    model_id: ModelID,
    company_id: Option<CompanyID>,
}
impl ModelIdentifier {
    #[must_use]
    pub const fn new_sig(sig_model_id: ModelID) -> ModelIdentifier {
        ModelIdentifier {
            model_id: sig_model_id,
            company_id: None,
        }
    }
    /// Creates a new vendor model from a `ModelID` and Bluetooth `CompanyID`
    #[must_use]
    pub const fn new_vendor(model_id: ModelID, company_id: CompanyID) -> ModelIdentifier {
        ModelIdentifier {
            model_id,
            company_id: Some(company_id),
        }
    }
    #[must_use]
    pub fn byte_len(&self) -> usize {
        if self.is_vendor() {
            ModelID::byte_len() + CompanyID::byte_len()
        } else {
            ModelID::byte_len()
        }
    }
    #[must_use]
    pub const fn model_id(&self) -> ModelID {
        self.model_id
    }
    /// Returns the `CompanyID` of the vendor model or `None` if it's a SIG model.
    #[must_use]
    pub const fn company_id(&self) -> Option<CompanyID> {
        self.company_id
    }
    #[must_use]
    pub const fn is_vendor(&self) -> bool {
        self.company_id.is_some()
    }
    /// Little endian. Vendor models put the `CompanyID` first.
    #[must_use]
    pub fn to_bytes_le(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        if let Some(company_id) = self.company_id {
            out.extend_from_slice(&company_id.0.to_bytes_le());
        }
        out.extend_from_slice(&self.model_id.0.to_bytes_le());
        out
    }
    /// 2 bytes is a SIG model, 4 bytes a vendor model.
    #[must_use]
    pub fn from_bytes_le(buf: &[u8]) -> Option<Self> {
        match buf.len() {
            2 => Some(Self::new_sig(ModelID(u16::from_bytes_le(buf)?))),
            4 => Some(Self::new_vendor(
                ModelID(u16::from_bytes_le(&buf[2..4])?),
                CompanyID(u16::from_bytes_le(&buf[..2])?),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_key_status_pdu() {
        let message = AccessMessage::new(Opcode::sig(0x8003), vec![0x00, 0x56, 0x34, 0x12]);
        assert_eq!(
            message.to_bytes().unwrap(),
            hex::decode("800300563412").unwrap()
        );
        assert_eq!(
            AccessMessage::from_bytes(&hex::decode("800300563412").unwrap()),
            Ok(message)
        );
    }
    #[test]
    fn test_opcode_forms() {
        assert_eq!(Opcode::unpack_from(&[0x02]), Ok(Opcode::sig(0x02)));
        assert_eq!(Opcode::unpack_from(&[0x7F]), Err(OpcodeError::Reserved));
        assert_eq!(Opcode::unpack_from(&[0x80]), Err(OpcodeError::TooShort));
        let vendor = Opcode::vendor(0x01, CompanyID(0x0059));
        let mut buf = [0_u8; 3];
        vendor.pack_into(&mut buf).unwrap();
        assert_eq!(buf, [0xC1, 0x59, 0x00]);
        assert_eq!(Opcode::unpack_from(&buf), Ok(vendor));
        assert_eq!(vendor.to_string(), "0x01:0x0059");
    }
    #[test]
    fn test_opcode_pack_errors() {
        let mut buf = [0_u8; 1];
        assert_eq!(
            Opcode::sig(0x8201).pack_into(&mut buf),
            Err(OpcodeError::TooShort)
        );
        assert_eq!(
            Opcode::SIG(SigOpcode::DoubleOctet(0x1234)).pack_into(&mut [0; 2]),
            Err(OpcodeError::Invalid)
        );
    }
    #[test]
    fn test_model_identifier() {
        let sig = ModelIdentifier::new_sig(ModelID(0x1000));
        assert_eq!(sig.to_bytes_le(), vec![0x00, 0x10]);
        let vendor = ModelIdentifier::new_vendor(ModelID(0x0001), CompanyID(0x0059));
        assert_eq!(vendor.to_bytes_le(), vec![0x59, 0x00, 0x01, 0x00]);
        assert_eq!(
            ModelIdentifier::from_bytes_le(&vendor.to_bytes_le()),
            Some(vendor)
        );
    }
}
