//! Crypto Keys uses for Mesh Security.
use crate::crypto::k_funcs::{k1, k2, k4};
use crate::crypto::{hex_16_to_array, ECDHSecret, NetworkID, ProvisioningSalt, Salt, AID, AKF};
use crate::mesh::NID;
use crate::random::{self, Randomizable};
use core::convert::{TryFrom, TryInto};
use core::fmt::{Error, Formatter, LowerHex};
use core::str::FromStr;
use zeroize::Zeroize;

pub const KEY_LEN: usize = 16;

/// 128-bit AES Key.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct Key([u8; KEY_LEN]);
pub const ZERO_KEY: Key = Key([0_u8; KEY_LEN]);

impl Key {
    #[must_use]
    pub const fn new(key_bytes: [u8; KEY_LEN]) -> Key {
        Key(key_bytes)
    }
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Key> {
        Some(Key::new(hex_16_to_array(hex)?))
    }
    #[must_use]
    pub const fn as_salt(&self) -> Salt {
        Salt(self.0)
    }
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; KEY_LEN] {
        self.0
    }
}
impl Zeroize for Key {
    fn zeroize(&mut self) {
        self.0.zeroize()
    }
}
impl Randomizable for Key {
    fn random_secure() -> Self {
        Self::new(random::secure_16_bytes())
    }
}
impl TryFrom<&[u8]> for Key {
    type Error = core::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Key::new(value.try_into()?))
    }
}
impl AsRef<[u8]> for Key {
    #[must_use]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
impl LowerHex for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        for &b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, thiserror::Error)]
#[error("expected 32 hex characters")]
pub struct KeyError;
impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::from_hex(s).ok_or(KeyError)
    }
}

macro_rules! key_newtype {
    ( $( $(#[$meta:meta])* $name:ident ),* ) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
            #[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
            pub struct $name(Key);
            impl $name {
                #[must_use]
                pub const fn new(key: Key) -> Self {
                    Self(key)
                }
                #[must_use]
                pub const fn new_bytes(key_bytes: [u8; KEY_LEN]) -> Self {
                    Self(Key::new(key_bytes))
                }
                #[must_use]
                pub fn from_hex(hex: &str) -> Option<Self> {
                    Some(Self::new_bytes(hex_16_to_array(hex)?))
                }
                #[must_use]
                pub const fn key(&self) -> &Key {
                    &self.0
                }
            }
            impl From<Key> for $name {
                fn from(k: Key) -> Self {
                    Self(k)
                }
            }
            impl From<$name> for Key {
                fn from(k: $name) -> Self {
                    k.0
                }
            }
            impl TryFrom<&[u8]> for $name {
                type Error = core::array::TryFromSliceError;

                fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
                    Ok(Self(Key::try_from(value)?))
                }
            }
            impl AsRef<[u8]> for $name {
                fn as_ref(&self) -> &[u8] {
                    self.0.as_ref()
                }
            }
            impl Zeroize for $name {
                fn zeroize(&mut self) {
                    self.0.zeroize()
                }
            }
        )*
    };
}
key_newtype!(
    /// Network Key. Every other network layer key is derived from it.
    NetKey,
    /// Network layer encryption key (from `k2`).
    EncryptionKey,
    /// Network header obfuscation key (from `k2`).
    PrivacyKey,
    /// Per node key used for configuration messages. Derived at the end of provisioning.
    DevKey,
    /// Application Key.
    AppKey,
    /// Provisioning Data encryption key.
    SessionKey,
    /// Key for the provisioning confirmation CMAC.
    ConfirmationKey
);

impl NetKey {
    /// Derives `NetworkID` from `self` by using `crypto::k3`.
    #[must_use]
    pub fn derive_network_id(&self) -> NetworkID {
        self.into()
    }
    /// Master security credentials (`k2` with `P = 0x00`).
    #[must_use]
    pub fn derive_master_credentials(&self) -> (NID, EncryptionKey, PrivacyKey) {
        k2(self.key(), &[0x00])
    }
}
impl Randomizable for NetKey {
    fn random_secure() -> Self {
        Self(Key::random_secure())
    }
}
impl DevKey {
    /// `DevKey = k1(ECDHSecret, ProvisioningSalt, "prdk")`
    #[must_use]
    pub fn from_salt_and_secret(salt: &ProvisioningSalt, secret: &ECDHSecret) -> Self {
        Self::new(k1(secret.as_ref(), salt.as_salt(), b"prdk"))
    }
    #[must_use]
    pub const fn akf() -> AKF {
        AKF(false)
    }
}
impl AppKey {
    #[must_use]
    pub fn aid(&self) -> AID {
        k4(self)
    }
    #[must_use]
    pub const fn akf() -> AKF {
        AKF(true)
    }
}
impl Randomizable for AppKey {
    fn random_secure() -> Self {
        Self(Key::random_secure())
    }
}
impl SessionKey {
    /// `SessionKey = k1(ECDHSecret, ProvisioningSalt, "prsk")`
    #[must_use]
    pub fn from_salt_and_secret(salt: &ProvisioningSalt, secret: &ECDHSecret) -> Self {
        Self::new(k1(secret.as_ref(), salt.as_salt(), b"prsk"))
    }
}
impl ConfirmationKey {
    /// `ConfirmationKey = k1(ECDHSecret, ConfirmationSalt, "prck")`
    #[must_use]
    pub fn from_salt_and_secret(confirmation_salt: Salt, secret: &ECDHSecret) -> Self {
        Self::new(k1(secret.as_ref(), confirmation_salt, b"prck"))
    }
}
