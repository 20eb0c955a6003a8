//! Crypto functions (AES, ECDH) that the Mesh uses.
//! AES is primarily used in the `crypto::k_funcs` and in network/application layer encryption.
//! ECDH is used for the provisioning key exchange.
use crate::bytes::ToFromBytesEndian;
use crate::crypto::key::{Key, NetKey};
use core::convert::TryFrom;
use core::fmt::{Display, Error, Formatter};

pub mod aes;
pub mod ecdh;
pub mod k_funcs;
pub mod key;
pub mod materials;
pub mod nonce;
pub mod secret;

pub use aes::MicSize;
pub use k_funcs::{k1, k2, k3, k4, s1};
pub use secret::Secret;

/// Every failure the primitives can report. A caller receiving `AuthenticationFailed` for a
/// transport PDU drops the PDU; it is not a fault.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq, Hash, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key, nonce or buffer length")]
    InvalidArgument,
    #[error("message integrity check failed")]
    AuthenticationFailed,
}

/// Helper function to convert a 16 byte (32 character) hex string to 16 byte array.
/// Returns `None` if `hex.len() != 32` or if `hex` contains non-hex characters.
#[must_use]
pub fn hex_16_to_array(hex: &str) -> Option<[u8; 16]> {
    if hex.len() != 32 {
        None
    } else {
        let mut out = [0_u8; 16];
        for (pos, c) in hex.chars().enumerate() {
            let value = u8::try_from(c.to_digit(16)?).ok()?;
            out[pos / 2] |= if pos % 2 == 1 { value } else { value << 4 };
        }
        Some(out)
    }
}

/// `salt(input)`: AES-CMAC of `input` under the all zero key. Alias of [`s1`].
#[must_use]
pub fn salt(input: &[u8]) -> Salt {
    s1(input)
}

fn key_from_slice(key: &[u8]) -> Result<Key, CryptoError> {
    Key::try_from(key).map_err(|_| CryptoError::InvalidArgument)
}
fn nonce_from_slice(nonce: &[u8]) -> Result<nonce::Nonce, CryptoError> {
    nonce::Nonce::try_from(nonce).map_err(|_| CryptoError::InvalidArgument)
}

/// AES-CCM encrypts `plaintext` and returns `ciphertext || MIC`.
/// # Errors
/// `InvalidArgument` if `key` isn't 16 bytes or `nonce` isn't 13 bytes.
pub fn ccm_encrypt(
    plaintext: &[u8],
    key: &[u8],
    nonce: &[u8],
    mic_size: MicSize,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = aes::AESCipher::new(key_from_slice(key)?);
    let nonce = nonce_from_slice(nonce)?;
    let mut out = Vec::with_capacity(plaintext.len() + mic_size.byte_size());
    out.extend_from_slice(plaintext);
    let mic = cipher.ccm_encrypt(&nonce, &[], &mut out, mic_size)?;
    out.extend_from_slice(&mic.to_bytes_be()[..mic.byte_size()]);
    Ok(out)
}
/// Reverse of [`ccm_encrypt`]. `ciphertext` ends with the MIC.
/// # Errors
/// `InvalidArgument` on bad key/nonce lengths or a `ciphertext` shorter than the MIC.
/// `AuthenticationFailed` if the MIC doesn't verify.
pub fn ccm_decrypt(
    ciphertext: &[u8],
    key: &[u8],
    nonce: &[u8],
    mic_size: MicSize,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = aes::AESCipher::new(key_from_slice(key)?);
    let nonce = nonce_from_slice(nonce)?;
    let data_len = ciphertext
        .len()
        .checked_sub(mic_size.byte_size())
        .ok_or(CryptoError::InvalidArgument)?;
    let mic = MIC::try_from_bytes_be(&ciphertext[data_len..]).ok_or(CryptoError::InvalidArgument)?;
    let mut out = ciphertext[..data_len].to_vec();
    cipher.ccm_decrypt(&nonce, &[], &mut out, mic)?;
    Ok(out)
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Ord, PartialOrd)]
pub enum MIC {
    Big(u64),
    Small(u32),
}
const BIG_MIC_SIZE: usize = 8;
const SMALL_MIC_SIZE: usize = 4;
impl MIC {
    #[must_use]
    pub fn try_from_bytes_be(bytes: &[u8]) -> Option<MIC> {
        match bytes.len() {
            SMALL_MIC_SIZE => Some(MIC::Small(u32::from_bytes_be(bytes)?)),
            BIG_MIC_SIZE => Some(MIC::Big(u64::from_bytes_be(bytes)?)),
            _ => None,
        }
    }
    #[must_use]
    pub fn is_big(&self) -> bool {
        matches!(self, MIC::Big(_))
    }
    /// Return the size in bytes (4 or 8) needed to represent the MIC.
    /// ```
    /// use bluetooth_mesh_provisioner::crypto::MIC;
    /// assert_eq!(MIC::Big(0u64).byte_size(), 8);
    /// assert_eq!(MIC::Small(0u32).byte_size(), 4);
    /// ```
    #[must_use]
    pub fn byte_size(&self) -> usize {
        if self.is_big() {
            BIG_MIC_SIZE
        } else {
            SMALL_MIC_SIZE
        }
    }
    #[must_use]
    pub fn mic_size(&self) -> MicSize {
        if self.is_big() {
            MicSize::Big
        } else {
            MicSize::Small
        }
    }
    /// Big endian bytes. Only the first `byte_size()` bytes are used.
    #[must_use]
    pub fn to_bytes_be(&self) -> [u8; BIG_MIC_SIZE] {
        let mut out = [0_u8; BIG_MIC_SIZE];
        match self {
            MIC::Big(b) => out.copy_from_slice(&b.to_be_bytes()),
            MIC::Small(s) => out[..SMALL_MIC_SIZE].copy_from_slice(&s.to_be_bytes()),
        }
        out
    }
    /// # Panics
    /// Panics if `buf.len() != self.byte_size()`.
    pub fn be_pack_into(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_bytes_be()[..self.byte_size()])
    }
    #[must_use]
    pub const fn small_size() -> usize {
        SMALL_MIC_SIZE
    }
    #[must_use]
    pub const fn big_size() -> usize {
        BIG_MIC_SIZE
    }
}
impl Display for MIC {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            MIC::Big(b) => write!(f, "Big({:016x})", b),
            MIC::Small(s) => write!(f, "Small({:08x})", s),
        }
    }
}

/// 6 bit Application Key ID
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
pub struct AID(u8);
const AID_MAX: u8 = (1 << 6) - 1;

impl AID {
    /// Creates a new 6 bit `AID`
    /// # Panics
    /// Panics if `aid > AID_MAX` (63)
    #[must_use]
    pub fn new(aid: u8) -> AID {
        assert!(aid <= AID_MAX, "AID {} overflow", aid);
        AID(aid)
    }
    /// Creates a AID by masking `aid` to just 6 (lower) bits
    #[must_use]
    pub const fn new_masked(aid: u8) -> AID {
        AID(aid & AID_MAX)
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}
/// Application Key Flag. Set when the upper transport PDU is encrypted with an AppKey, clear for
/// the DevKey.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord, Default)]
pub struct AKF(pub bool);
impl From<bool> for AKF {
    fn from(b: bool) -> Self {
        AKF(b)
    }
}
impl From<AKF> for bool {
    fn from(a: AKF) -> Self {
        a.0
    }
}
pub const SALT_LEN: usize = 16;
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
pub struct Salt(pub [u8; SALT_LEN]);

impl Salt {
    #[must_use]
    pub const fn new(salt: [u8; SALT_LEN]) -> Salt {
        Salt(salt)
    }
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Salt> {
        Some(Salt::new(hex_16_to_array(hex)?))
    }
    #[must_use]
    pub fn as_key(&self) -> Key {
        Key::new(self.0)
    }
}
impl AsRef<[u8]> for Salt {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
/// `s1(ConfirmationSalt || RandomProvisioner || RandomDevice)`. Salt for every session key.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
pub struct ProvisioningSalt(pub Salt);
impl ProvisioningSalt {
    #[must_use]
    pub const fn as_salt(&self) -> Salt {
        self.0
    }
}
/// Shared P-256 ECDH secret (the X coordinate of the shared point).
pub type ECDHSecret = Secret<32>;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
pub struct NetworkID(pub u64);
impl From<&NetKey> for NetworkID {
    fn from(k: &NetKey) -> Self {
        NetworkID(k3(k.key()))
    }
}
