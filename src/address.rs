//! Bluetooth Mesh Addresses.
//! All address are 16-bit. Virtual Addresses are 128-bit Label UUIDs but only a 14-bit hash is
//! sent with a message and only the hash is tracked here.
//!
//! | Bits (16)             | Type          |
//! | --------------------- | ------------- |
//! | 0b0000 0000 0000 0000 | Unassigned    |
//! | 0b0xxx xxxx xxxx xxxx | Unicast       |
//! | 0b10xx xxxx xxxx xxxx | Virtual       |
//! | 0b11xx xxxx xxxx xxxx | Group         |
//!
//! Endian depends on layer!!
//! Little: Access/Foundation
//! Big: Everything else
use crate::bytes::ToFromBytesEndian;
use core::convert::TryFrom;
use core::fmt::{Display, Formatter};

pub const ADDRESS_LEN: usize = 2;

const UNICAST_BIT: u16 = 0x8000;
pub const UNICAST_MAX: u16 = 0x7FFF;
const GROUP_BITS: u16 = 0xC000;
const VIRTUAL_BITS: u16 = 0x8000;

/// Element Unicast Address. Each Element has one Unicast assigned to it.
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct UnicastAddress(u16);
/// Group Address. Some Group Address are reserved.
///
/// | Values        | Group Name    |
/// | ------------- | ------------- |
/// | 0xFF00-0xFFFB | RFU           |
/// | 0xFFFC        | All Proxies   |
/// | 0xFFFD        | All Friends   |
/// | 0xFFFE        | All Relays    |
/// | 0xFFFF        | All Nodes     |
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct GroupAddress(u16);
/// Only stores the 14 bit hash of the virtual Label UUID.
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct VirtualAddressHash(u16);

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, thiserror::Error)]
#[error("address {0:#06x} is the wrong kind of address")]
pub struct AddressError(pub u16);

impl UnicastAddress {
    /// Creates a new `UnicastAddress`.
    /// # Panics
    /// Panics if the `u16` is not a valid `UnicastAddress` (`v == 0 || v & 0x8000 != 0`).
    #[must_use]
    pub fn new(v: u16) -> UnicastAddress {
        match UnicastAddress::try_from(v) {
            Ok(u) => u,
            Err(_) => panic!("non unicast address '{:#06x}'", v),
        }
    }
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
    /// Address of the element `offset` elements after this one. `None` once the unicast range
    /// runs out.
    #[must_use]
    pub fn offset(self, offset: u8) -> Option<UnicastAddress> {
        let v = self.0.checked_add(u16::from(offset))?;
        UnicastAddress::try_from(v).ok()
    }
}
impl GroupAddress {
    /// # Panics
    /// Panics if `group_address` isn't a value group address.
    #[must_use]
    pub fn new(group_address: u16) -> Self {
        match Self::try_from(group_address) {
            Ok(g) => g,
            Err(_) => panic!("invalid group address given"),
        }
    }
    #[must_use]
    pub const fn all_proxies() -> GroupAddress {
        GroupAddress(0xFFFC)
    }
    #[must_use]
    pub const fn all_friends() -> GroupAddress {
        GroupAddress(0xFFFD)
    }
    #[must_use]
    pub const fn all_relays() -> GroupAddress {
        GroupAddress(0xFFFE)
    }
    #[must_use]
    pub const fn all_nodes() -> GroupAddress {
        GroupAddress(0xFFFF)
    }
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}
impl VirtualAddressHash {
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}
impl TryFrom<u16> for UnicastAddress {
    type Error = AddressError;

    fn try_from(v: u16) -> Result<UnicastAddress, Self::Error> {
        if v == 0 || v & UNICAST_BIT != 0 {
            Err(AddressError(v))
        } else {
            Ok(UnicastAddress(v))
        }
    }
}
impl TryFrom<u16> for GroupAddress {
    type Error = AddressError;

    fn try_from(v: u16) -> Result<GroupAddress, Self::Error> {
        if v & GROUP_BITS == GROUP_BITS {
            Ok(GroupAddress(v))
        } else {
            Err(AddressError(v))
        }
    }
}
impl TryFrom<u16> for VirtualAddressHash {
    type Error = AddressError;
    fn try_from(v: u16) -> Result<VirtualAddressHash, Self::Error> {
        if v & GROUP_BITS == VIRTUAL_BITS {
            Ok(VirtualAddressHash(v))
        } else {
            Err(AddressError(v))
        }
    }
}
impl From<UnicastAddress> for u16 {
    #[must_use]
    fn from(v: UnicastAddress) -> Self {
        v.0
    }
}
impl From<GroupAddress> for u16 {
    #[must_use]
    fn from(v: GroupAddress) -> Self {
        v.0
    }
}
impl Display for UnicastAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum Address {
    Unassigned,
    Unicast(UnicastAddress),
    Group(GroupAddress),
    VirtualHash(VirtualAddressHash),
}
impl Address {
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        !matches!(self, Address::Unassigned)
    }
    #[must_use]
    pub fn is_unicast(&self) -> bool {
        matches!(self, Address::Unicast(_))
    }
    #[must_use]
    pub fn unicast(&self) -> Option<UnicastAddress> {
        match self {
            Address::Unicast(u) => Some(*u),
            _ => None,
        }
    }
    #[must_use]
    pub fn value(&self) -> u16 {
        match self {
            Address::Unassigned => 0,
            Address::Unicast(u) => u.0,
            Address::Group(g) => g.0,
            Address::VirtualHash(h) => h.0,
        }
    }
}
impl Default for Address {
    fn default() -> Self {
        Address::Unassigned
    }
}
impl From<u16> for Address {
    #[must_use]
    fn from(v: u16) -> Address {
        if v == 0 {
            Address::Unassigned
        } else if v & UNICAST_BIT == 0 {
            Address::Unicast(UnicastAddress(v))
        } else if v & GROUP_BITS == GROUP_BITS {
            Address::Group(GroupAddress(v))
        } else {
            Address::VirtualHash(VirtualAddressHash(v))
        }
    }
}
impl From<UnicastAddress> for Address {
    fn from(u: UnicastAddress) -> Self {
        Address::Unicast(u)
    }
}
impl From<GroupAddress> for Address {
    fn from(g: GroupAddress) -> Self {
        Address::Group(g)
    }
}
impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#06x}", self.value())
    }
}
impl ToFromBytesEndian for Address {
    type AsBytesType = [u8; ADDRESS_LEN];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        self.value().to_bytes_le()
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        self.value().to_bytes_be()
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        Some(u16::from_bytes_le(bytes)?.into())
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        Some(u16::from_bytes_be(bytes)?.into())
    }
}
impl ToFromBytesEndian for UnicastAddress {
    type AsBytesType = [u8; ADDRESS_LEN];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        self.0.to_bytes_le()
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        self.0.to_bytes_be()
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        UnicastAddress::try_from(u16::from_bytes_le(bytes)?).ok()
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        UnicastAddress::try_from(u16::from_bytes_be(bytes)?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_kinds() {
        assert_eq!(Address::from(0), Address::Unassigned);
        assert!(Address::from(0x1201).is_unicast());
        assert_eq!(Address::from(0xFFFD), Address::Group(GroupAddress::all_friends()));
        assert!(matches!(Address::from(0x8123), Address::VirtualHash(_)));
    }
    #[test]
    fn test_unicast_offset() {
        let base = UnicastAddress::new(0x7FFE);
        assert_eq!(base.offset(1), Some(UnicastAddress::new(0x7FFF)));
        assert_eq!(base.offset(2), None);
        assert!(UnicastAddress::try_from(0).is_err());
    }
}
