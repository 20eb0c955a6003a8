//! Small field types shared by every Mesh layer.
use crate::bytes::ToFromBytesEndian;
use core::convert::TryFrom;
use core::fmt::{Display, Error, Formatter};

macro_rules! bool_flag {
    ( $( $(#[$meta:meta])* $name:ident ),* ) => {
        $(
            $(#[$meta])*
            #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
            #[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
            pub struct $name(pub bool);
            impl From<$name> for bool {
                #[must_use]
                fn from(f: $name) -> Self {
                    f.0
                }
            }
            impl From<bool> for $name {
                #[must_use]
                fn from(b: bool) -> Self {
                    $name(b)
                }
            }
        )*
    };
}
bool_flag!(
    /// Least significant bit of the IV Index.
    IVI,
    /// Network Control flag. Set for control messages (8 byte NetMIC).
    CTL,
    KeyRefreshFlag,
    IVUpdateFlag
);

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct TTL(u8);

const TTL_MASK: u8 = 127;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, thiserror::Error)]
#[error("value {0} out of range")]
pub struct OutOfRange(pub u32);

impl TTL {
    /// # Panics
    /// Panics if `v > 127`.
    #[must_use]
    pub fn new(v: u8) -> TTL {
        assert!(
            v <= TTL_MASK,
            "TTL {} is bigger than max TTL {}",
            v,
            TTL_MASK
        );
        TTL(v)
    }
    /// Returns u8 with 7 lower bits being TTL and the 1 highest bit being a flag
    #[must_use]
    pub const fn with_flag(self, flag: bool) -> u8 {
        self.0 | ((flag as u8) << 7)
    }
    /// returns 7 bit TTL + 1 bit bool flag from 8bit uint.
    #[must_use]
    pub const fn new_with_flag(v: u8) -> (TTL, bool) {
        (TTL(v & TTL_MASK), v & !TTL_MASK != 0)
    }
    #[must_use]
    pub const fn from_masked_u8(v: u8) -> TTL {
        TTL(v & TTL_MASK)
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}
impl TryFrom<u8> for TTL {
    type Error = OutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > TTL_MASK {
            Err(OutOfRange(value.into()))
        } else {
            Ok(TTL(value))
        }
    }
}
impl Display for TTL {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "TTL({})", self.0)
    }
}
/// 7-bit `NID` (different than `NetworkID`!!)
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct NID(u8);

impl Display for NID {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "NID({:#04x})", self.0)
    }
}
const NID_MASK: u8 = 0x7F;

impl NID {
    /// # Panics
    /// Panics if `v > 0x7F`.
    #[must_use]
    pub fn new(v: u8) -> NID {
        assert!(v <= NID_MASK, "NID {} is bigger than max NID {}", v, NID_MASK);
        NID(v)
    }
    #[must_use]
    pub const fn with_flag(self, flag: bool) -> u8 {
        self.0 | ((flag as u8) << 7)
    }
    #[must_use]
    pub const fn new_with_flag(v: u8) -> (NID, bool) {
        (NID(v & NID_MASK), v & 0x80 != 0)
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// 24-bit Unsigned Integer. Backs `SequenceNumber` and other 3 byte fields.
#[derive(Default, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct U24(u32);
pub const U24_MAX: u32 = (1_u32 << 24) - 1;
impl Display for U24 {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "U24({})", self.0)
    }
}
impl U24 {
    /// # Panics
    /// Panics if `v > U24_MAX`.
    #[must_use]
    pub fn new(v: u32) -> U24 {
        assert!(v <= U24_MAX, "number {} is bigger than max U24 {}", v, U24_MAX);
        U24(v)
    }
    /// Creates a U24 by masking the 4th byte of 'v'
    #[must_use]
    pub const fn new_masked(v: u32) -> U24 {
        U24(v & U24_MAX)
    }
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}
impl TryFrom<u32> for U24 {
    type Error = OutOfRange;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > U24_MAX {
            Err(OutOfRange(value))
        } else {
            Ok(U24(value))
        }
    }
}
impl ToFromBytesEndian for U24 {
    type AsBytesType = [u8; 3];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        let b = self.0.to_le_bytes();
        [b[0], b[1], b[2]]
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        let b = self.0.to_be_bytes();
        [b[1], b[2], b[3]]
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        match bytes {
            &[a, b, c] => Some(U24(u32::from_le_bytes([a, b, c, 0]))),
            _ => None,
        }
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        match bytes {
            &[a, b, c] => Some(U24(u32::from_be_bytes([0, a, b, c]))),
            _ => None,
        }
    }
}
#[derive(Copy, Clone, Eq, Ord, PartialOrd, PartialEq, Debug, Default, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct IVIndex(pub u32);
impl IVIndex {
    #[must_use]
    pub const fn ivi(self) -> IVI {
        IVI(self.0 & 1 == 1)
    }
    /// Picks the IV Index a received PDU was sent with. Nodes accept the current IV Index or the
    /// one before it, told apart by the IVI bit.
    #[must_use]
    pub fn matching_ivi(self, ivi: IVI) -> Option<IVIndex> {
        if self.ivi() == ivi {
            Some(self)
        } else {
            self.0.checked_sub(1).map(IVIndex)
        }
    }
}
impl Display for IVIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "IVIndex({})", self.0)
    }
}
impl ToFromBytesEndian for IVIndex {
    type AsBytesType = [u8; 4];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        self.0.to_bytes_le()
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        self.0.to_bytes_be()
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        Some(Self(u32::from_bytes_le(bytes)?))
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        Some(Self(u32::from_bytes_be(bytes)?))
    }
}
/// 24bit Sequence number
#[derive(Copy, Clone, Eq, Ord, PartialOrd, PartialEq, Debug, Default, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceNumber(pub U24);
impl SequenceNumber {
    #[must_use]
    pub fn new(seq: u32) -> Self {
        SequenceNumber(U24::new(seq))
    }
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0.value()
    }
}
impl Display for SequenceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "SequenceNumber({:#08x})", self.value())
    }
}
impl ToFromBytesEndian for SequenceNumber {
    type AsBytesType = [u8; 3];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        self.0.to_bytes_le()
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        self.0.to_bytes_be()
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        Some(SequenceNumber(U24::from_bytes_le(bytes)?))
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        Some(SequenceNumber(U24::from_bytes_be(bytes)?))
    }
}
/// 12-bit global Key Index.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyIndex(u16);
pub const KEY_INDEX_MAX: u16 = (1 << 12) - 1;
impl KeyIndex {
    /// # Panics
    /// Panics if `index > KEY_INDEX_MAX` (4095).
    #[must_use]
    pub fn new(index: u16) -> KeyIndex {
        assert!(index <= KEY_INDEX_MAX, "key index {} overflow", index);
        KeyIndex(index)
    }
    #[must_use]
    pub const fn new_masked(index: u16) -> KeyIndex {
        KeyIndex(index & KEY_INDEX_MAX)
    }
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}
impl TryFrom<u16> for KeyIndex {
    type Error = OutOfRange;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value > KEY_INDEX_MAX {
            Err(OutOfRange(value.into()))
        } else {
            Ok(KeyIndex(value))
        }
    }
}
impl ToFromBytesEndian for KeyIndex {
    type AsBytesType = [u8; 2];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        self.0.to_bytes_le()
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        self.0.to_bytes_be()
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        KeyIndex::try_from(u16::from_bytes_le(bytes)?).ok()
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        KeyIndex::try_from(u16::from_bytes_be(bytes)?).ok()
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct NetKeyIndex(pub KeyIndex);
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct AppKeyIndex(pub KeyIndex);

/// Packs two 12-bit key indexes into 3 octets (little endian), `first` in the low 12 bits.
/// Used by the configuration messages that carry a NetKey/AppKey index pair.
#[must_use]
pub fn pack_key_indexes(first: KeyIndex, second: KeyIndex) -> [u8; 3] {
    let v = u32::from(first.value()) | (u32::from(second.value()) << 12);
    U24::new_masked(v).to_bytes_le()
}
/// Reverse of [`pack_key_indexes`].
#[must_use]
pub fn unpack_key_indexes(bytes: &[u8]) -> Option<(KeyIndex, KeyIndex)> {
    let v = U24::from_bytes_le(bytes)?.value();
    Some((
        KeyIndex::new_masked(v as u16),
        KeyIndex::new_masked((v >> 12) as u16),
    ))
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct CompanyID(pub u16);
impl CompanyID {
    #[must_use]
    pub const fn byte_len() -> usize {
        2
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelID(pub u16);
impl ModelID {
    #[must_use]
    pub const fn byte_len() -> usize {
        2
    }
}
/// Number of elements a node exposes. Provisioning assigns one unicast address per element.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementCount(pub u8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl() {
        assert_eq!(TTL::new(5).with_flag(true), 0x85);
        assert_eq!(TTL::new_with_flag(0x85), (TTL::new(5), true));
        assert!(TTL::try_from(128).is_err());
    }
    #[test]
    #[should_panic]
    fn test_ttl_out_of_range() {
        let _ = TTL::new(128);
    }
    #[test]
    fn test_u24_bytes() {
        let v = U24::new(0x3129ab);
        assert_eq!(v.to_bytes_be(), [0x31, 0x29, 0xab]);
        assert_eq!(U24::from_bytes_be(&[0x31, 0x29, 0xab]), Some(v));
        assert_eq!(U24::from_bytes_le(&[0xab, 0x29, 0x31]), Some(v));
    }
    #[test]
    fn test_matching_ivi() {
        let iv = IVIndex(0x1234_5678);
        assert_eq!(iv.matching_ivi(IVI(false)), Some(iv));
        assert_eq!(iv.matching_ivi(IVI(true)), Some(IVIndex(0x1234_5677)));
        assert_eq!(IVIndex(0).matching_ivi(IVI(true)), None);
    }
    #[test]
    fn test_key_index_pair() {
        let packed = pack_key_indexes(KeyIndex::new(0x456), KeyIndex::new(0x123));
        assert_eq!(packed, [0x56, 0x34, 0x12]);
        assert_eq!(
            unpack_key_indexes(&packed),
            Some((KeyIndex::new(0x456), KeyIndex::new(0x123)))
        );
    }
}
