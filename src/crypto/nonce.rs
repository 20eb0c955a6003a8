//! 13 byte AES-CCM nonces. Each Mesh layer builds its own nonce type out of the header fields of
//! the PDU being secured.
use crate::address::{Address, UnicastAddress};
use crate::bytes::ToFromBytesEndian;
use crate::crypto::k_funcs::k1;
use crate::crypto::{ECDHSecret, ProvisioningSalt};
use crate::mesh::{IVIndex, SequenceNumber, CTL, TTL};
use core::convert::{TryFrom, TryInto};

pub const NONCE_LEN: usize = 13;
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
pub struct Nonce([u8; NONCE_LEN]);
impl Nonce {
    #[must_use]
    pub const fn new(bytes: [u8; NONCE_LEN]) -> Nonce {
        Nonce(bytes)
    }
}
impl AsRef<[u8]> for Nonce {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}
impl TryFrom<&[u8]> for Nonce {
    type Error = core::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Nonce(value.try_into()?))
    }
}
macro_rules! nonce_newtype {
    ( $( $(#[$meta:meta])* $name:ident ),* ) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
            pub struct $name(Nonce);
            impl $name {
                #[must_use]
                pub const fn new(nonce: Nonce) -> Self {
                    Self(nonce)
                }
                #[must_use]
                pub const fn new_bytes(bytes: [u8; NONCE_LEN]) -> Self {
                    Self(Nonce(bytes))
                }
                #[must_use]
                pub const fn nonce(&self) -> &Nonce {
                    &self.0
                }
            }
            impl AsRef<[u8]> for $name {
                fn as_ref(&self) -> &[u8] {
                    self.0.as_ref()
                }
            }
        )*
    };
}
nonce_newtype!(NetworkNonce, AppNonce, DeviceNonce, SessionNonce);

/// Nonce Types
/// 0x04--0xFF RFU
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum NonceType {
    Network = 0x00,
    Application = 0x01,
    Device = 0x02,
    Proxy = 0x03,
}
impl NonceType {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct NetworkNonceParts {
    pub ctl: CTL,
    pub ttl: TTL,
    pub src: UnicastAddress,
    pub seq: SequenceNumber,
    pub iv_index: IVIndex,
}

impl NetworkNonceParts {
    #[must_use]
    pub fn to_nonce(&self) -> NetworkNonce {
        let seq = self.seq.to_bytes_be();
        let src = self.src.to_bytes_be();
        let iv = self.iv_index.to_bytes_be();
        NetworkNonce::new_bytes([
            NonceType::Network.as_u8(),
            self.ttl.with_flag(self.ctl.0),
            seq[0],
            seq[1],
            seq[2],
            src[0],
            src[1],
            0x00,
            0x00,
            iv[0],
            iv[1],
            iv[2],
            iv[3],
        ])
    }
}

/// Fields shared by the application and device nonces.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct AccessNonceParts {
    /// Set for a segmented access message with an 8 byte TransMIC.
    pub aszmic: bool,
    pub seq: SequenceNumber,
    pub src: UnicastAddress,
    pub dst: Address,
    pub iv_index: IVIndex,
}
impl AccessNonceParts {
    fn to_bytes(&self, nonce_type: NonceType) -> [u8; NONCE_LEN] {
        let seq = self.seq.to_bytes_be();
        let src = self.src.to_bytes_be();
        let dst = self.dst.to_bytes_be();
        let iv = self.iv_index.to_bytes_be();
        [
            nonce_type.as_u8(),
            u8::from(self.aszmic) << 7,
            seq[0],
            seq[1],
            seq[2],
            src[0],
            src[1],
            dst[0],
            dst[1],
            iv[0],
            iv[1],
            iv[2],
            iv[3],
        ]
    }
    #[must_use]
    pub fn to_app_nonce(&self) -> AppNonce {
        AppNonce::new_bytes(self.to_bytes(NonceType::Application))
    }
    #[must_use]
    pub fn to_device_nonce(&self) -> DeviceNonce {
        DeviceNonce::new_bytes(self.to_bytes(NonceType::Device))
    }
}
impl SessionNonce {
    /// The 13 least significant bytes of `k1(ECDHSecret, ProvisioningSalt, "prsn")`.
    #[must_use]
    pub fn from_salt_and_secret(salt: &ProvisioningSalt, secret: &ECDHSecret) -> Self {
        let k = k1(secret.as_ref(), salt.as_salt(), b"prsn");
        let mut out = [0_u8; NONCE_LEN];
        out.copy_from_slice(&k.as_ref()[16 - NONCE_LEN..]);
        SessionNonce::new_bytes(out)
    }
}
