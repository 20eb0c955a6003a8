//! A module for crypto AES functions. Essentially a wrapper around the RustCrypto AES, CMAC and
//! CCM crates. This lets the rest of the library code not depend on any 3rd party cipher types.
//! Bluetooth Mesh uses 128-bit exclusively as its Key bit size.
use crate::bytes::ToFromBytesEndian;
use crate::crypto::key::Key;
use crate::crypto::nonce::Nonce;
use crate::crypto::{CryptoError, MIC};
use aead::AeadInPlace;
use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use ccm::consts::{U13, U16, U4, U8};
use ccm::Ccm;
use cmac::{Cmac, Mac};

const AES_BLOCK_LEN: usize = 16;
pub type AesBlock = [u8; AES_BLOCK_LEN];

type AesCcmBigMic = Ccm<Aes128, U8, U13>;
type AesCcmSmallMic = Ccm<Aes128, U4, U13>;

#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Debug, Hash)]
pub enum MicSize {
    Big,
    Small,
}
impl MicSize {
    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            MicSize::Big => MIC::big_size(),
            MicSize::Small => MIC::small_size(),
        }
    }
    #[must_use]
    pub fn is_big(self) -> bool {
        matches!(self, MicSize::Big)
    }
}
impl From<bool> for MicSize {
    /// `true` for the 8 byte MIC.
    fn from(big: bool) -> Self {
        if big {
            MicSize::Big
        } else {
            MicSize::Small
        }
    }
}
pub struct AESCipher(Key);
impl AESCipher {
    #[must_use]
    pub fn new(key: Key) -> AESCipher {
        AESCipher(key)
    }
    fn key_array(&self) -> &GenericArray<u8, U16> {
        GenericArray::from_slice(self.0.as_ref())
    }
    /// Encrypts one block with AES-128 ECB. Only used for network header obfuscation.
    #[must_use]
    pub fn ecb_encrypt_block(&self, block: AesBlock) -> AesBlock {
        let cipher = <Aes128 as KeyInit>::new(self.key_array());
        let mut block = GenericArray::clone_from_slice(&block[..]);
        cipher.encrypt_block(&mut block);
        let mut out = [0_u8; AES_BLOCK_LEN];
        out.copy_from_slice(block.as_slice());
        out
    }
    /// AES-CMAC of `m`.
    #[must_use]
    pub fn cmac(&self, m: &[u8]) -> Key {
        self.cmac_slice(&[m])
    }
    /// AES-CMAC of every slice in `ms` concatenated together.
    #[must_use]
    pub fn cmac_slice(&self, ms: &[&[u8]]) -> Key {
        let mut mac = <Cmac<Aes128> as Mac>::new(self.key_array());
        for m in ms {
            mac.update(m);
        }
        let mut out = [0_u8; AES_BLOCK_LEN];
        out.copy_from_slice(mac.finalize().into_bytes().as_slice());
        Key::new(out)
    }
    /// Encrypts `payload` in place and returns the MIC.
    /// # Errors
    /// `InvalidArgument` if the payload is too long for CCM with a 13 byte nonce.
    pub fn ccm_encrypt(
        &self,
        nonce: &Nonce,
        associated_data: &[u8],
        payload: &mut [u8],
        mic_size: MicSize,
    ) -> Result<MIC, CryptoError> {
        let nonce = GenericArray::from_slice(nonce.as_ref());
        match mic_size {
            MicSize::Big => {
                let tag = <AesCcmBigMic as KeyInit>::new(self.key_array())
                    .encrypt_in_place_detached(nonce, associated_data, payload)
                    .map_err(|_| CryptoError::InvalidArgument)?;
                Ok(MIC::Big(
                    u64::from_bytes_be(tag.as_slice()).expect("hard coded length"),
                ))
            }
            MicSize::Small => {
                let tag = <AesCcmSmallMic as KeyInit>::new(self.key_array())
                    .encrypt_in_place_detached(nonce, associated_data, payload)
                    .map_err(|_| CryptoError::InvalidArgument)?;
                Ok(MIC::Small(
                    u32::from_bytes_be(tag.as_slice()).expect("hard coded length"),
                ))
            }
        }
    }
    /// Decrypts `payload` in place. `payload` is left untouched if the MIC doesn't match.
    /// # Errors
    /// `AuthenticationFailed` if `mic` doesn't verify.
    pub fn ccm_decrypt(
        &self,
        nonce: &Nonce,
        associated_data: &[u8],
        payload: &mut [u8],
        mic: MIC,
    ) -> Result<(), CryptoError> {
        let nonce = GenericArray::from_slice(nonce.as_ref());
        match mic {
            MIC::Big(b) => <AesCcmBigMic as KeyInit>::new(self.key_array())
                .decrypt_in_place_detached(
                    nonce,
                    associated_data,
                    payload,
                    GenericArray::from_slice(&b.to_be_bytes()[..]),
                ),
            MIC::Small(s) => <AesCcmSmallMic as KeyInit>::new(self.key_array())
                .decrypt_in_place_detached(
                    nonce,
                    associated_data,
                    payload,
                    GenericArray::from_slice(&s.to_be_bytes()[..]),
                ),
        }
        .map_err(|_| CryptoError::AuthenticationFailed)
    }
}
impl From<Key> for AESCipher {
    fn from(k: Key) -> Self {
        Self::new(k)
    }
}
