//! Endian aware conversion between fixed size values and byte slices.
//! Mesh mixes endianness between layers (Network/Transport are big endian, Access/Foundation is
//! little endian) so every field type spells out which one it wants.

/// A value that packs into a fixed number of bytes in either byte order.
pub trait ToFromBytesEndian: Sized {
    type AsBytesType: AsRef<[u8]> + AsMut<[u8]>;

    #[must_use]
    fn byte_size() -> usize {
        core::mem::size_of::<Self::AsBytesType>()
    }
    #[must_use]
    fn to_bytes_le(&self) -> Self::AsBytesType;
    #[must_use]
    fn to_bytes_be(&self) -> Self::AsBytesType;
    /// Returns `None` if `bytes.len() != Self::byte_size()` or the bytes are invalid.
    #[must_use]
    fn from_bytes_le(bytes: &[u8]) -> Option<Self>;
    /// Returns `None` if `bytes.len() != Self::byte_size()` or the bytes are invalid.
    #[must_use]
    fn from_bytes_be(bytes: &[u8]) -> Option<Self>;
}

macro_rules! implement_to_from_bytes {
    ( $( $t:ty ),* ) => {
        $(
            impl ToFromBytesEndian for $t {
                type AsBytesType = [u8; core::mem::size_of::<$t>()];

                #[inline]
                fn to_bytes_le(&self) -> Self::AsBytesType {
                    self.to_le_bytes()
                }

                #[inline]
                fn to_bytes_be(&self) -> Self::AsBytesType {
                    self.to_be_bytes()
                }

                #[inline]
                fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
                    Some(<$t>::from_le_bytes(bytes.try_into().ok()?))
                }

                #[inline]
                fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
                    Some(<$t>::from_be_bytes(bytes.try_into().ok()?))
                }
            }
        )*
    };
}
implement_to_from_bytes!(u8, u16, u32, u64, i16);

/// Lowercase hex of a byte slice. Used for logging public (non secret) PDUs.
pub struct HexSlice<'a>(pub &'a [u8]);
impl core::fmt::Display for HexSlice<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
impl core::fmt::Debug for HexSlice<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_endian() {
        assert_eq!(0x1234_u16.to_bytes_be(), [0x12, 0x34]);
        assert_eq!(0x1234_u16.to_bytes_le(), [0x34, 0x12]);
        assert_eq!(u32::from_bytes_be(&[0x12, 0x34, 0x56, 0x78]), Some(0x1234_5678));
        assert_eq!(u32::from_bytes_be(&[0x12, 0x34, 0x56]), None);
        assert_eq!(<u16 as ToFromBytesEndian>::byte_size(), 2);
    }
    #[test]
    fn test_hex_slice() {
        assert_eq!(HexSlice(&[0x00, 0xab, 0x0f]).to_string(), "00ab0f");
    }
}
