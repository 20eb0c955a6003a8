//! Provisioning Data: the network credentials handed to a new node, sealed with the session key.
use crate::address::{UnicastAddress, ADDRESS_LEN};
use crate::bytes::ToFromBytesEndian;
use crate::crypto::aes::{AESCipher, MicSize};
use crate::crypto::key::{NetKey, SessionKey, KEY_LEN};
use crate::crypto::nonce::SessionNonce;
use crate::crypto::{CryptoError, ECDHSecret, ProvisioningSalt};
use crate::mesh::{IVIndex, IVUpdateFlag, KeyIndex, KeyRefreshFlag, NetKeyIndex};
use crate::provisioning::protocol::{EncryptedProvisioningData, ENCRYPTED_PROVISIONING_DATA_LEN};
use core::convert::TryFrom;

pub struct SessionSecurityMaterials {
    pub key: SessionKey,
    pub nonce: SessionNonce,
}
impl SessionSecurityMaterials {
    #[must_use]
    pub fn from_secret_salt(
        secret: &ECDHSecret,
        salt: &ProvisioningSalt,
    ) -> SessionSecurityMaterials {
        SessionSecurityMaterials {
            key: SessionKey::from_salt_and_secret(salt, secret),
            nonce: SessionNonce::from_salt_and_secret(salt, secret),
        }
    }
}
impl Drop for SessionSecurityMaterials {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.key);
    }
}

/// Key Refresh (bit 0) and IV Update (bit 1) flags. Other bits are prohibited.
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Default, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct Flags {
    pub key_refresh: KeyRefreshFlag,
    pub iv_update: IVUpdateFlag,
}
pub const FLAGS_MAX: u8 = 0b11;
impl From<Flags> for u8 {
    fn from(f: Flags) -> Self {
        u8::from(f.key_refresh.0) | (u8::from(f.iv_update.0) << 1)
    }
}
impl TryFrom<u8> for Flags {
    type Error = crate::mesh::OutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > FLAGS_MAX {
            Err(crate::mesh::OutOfRange(value.into()))
        } else {
            Ok(Flags {
                key_refresh: KeyRefreshFlag(value & 0b01 != 0),
                iv_update: IVUpdateFlag(value & 0b10 != 0),
            })
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash, thiserror::Error)]
pub enum DataError {
    #[error("provisioning data MIC failed")]
    DecryptionFailed,
    #[error("provisioning data field {0} invalid")]
    BadField(usize),
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub struct ProvisioningData {
    pub net_key: NetKey,
    pub net_key_index: NetKeyIndex,
    pub flags: Flags,
    pub iv_index: IVIndex,
    pub element_address: UnicastAddress,
}
const INDEX_POS: usize = KEY_LEN;
const FLAGS_POS: usize = INDEX_POS + 2;
const IV_POS: usize = FLAGS_POS + 1;
const ADDRESS_POS: usize = IV_POS + 4;
/// Length of all the fields packed together as bytes (25 bytes).
pub const PACKED_LEN: usize = ADDRESS_POS + ADDRESS_LEN;

impl ProvisioningData {
    /// `NetKey(16) || KeyIndex(2) || Flags(1) || IVIndex(4) || UnicastAddress(2)`, big endian.
    #[must_use]
    pub fn packed_unencrypted(&self) -> [u8; PACKED_LEN] {
        let mut out = [0_u8; PACKED_LEN];
        out[..INDEX_POS].copy_from_slice(self.net_key.key().as_ref());
        out[INDEX_POS..FLAGS_POS].copy_from_slice(&self.net_key_index.0.to_bytes_be());
        out[FLAGS_POS] = self.flags.into();
        out[IV_POS..ADDRESS_POS].copy_from_slice(&self.iv_index.to_bytes_be());
        out[ADDRESS_POS..].copy_from_slice(&self.element_address.to_bytes_be());
        out
    }
    /// # Errors
    /// `BadField(pos)` for an out of range key index, prohibited flag bits or a non unicast
    /// address.
    pub fn unpack_unencrypted(buf: &[u8; PACKED_LEN]) -> Result<ProvisioningData, DataError> {
        let net_key = NetKey::try_from(&buf[..INDEX_POS]).expect("hard coded length");
        let net_key_index = NetKeyIndex(
            KeyIndex::from_bytes_be(&buf[INDEX_POS..FLAGS_POS])
                .ok_or(DataError::BadField(INDEX_POS))?,
        );
        let flags = Flags::try_from(buf[FLAGS_POS]).map_err(|_| DataError::BadField(FLAGS_POS))?;
        let iv_index =
            IVIndex::from_bytes_be(&buf[IV_POS..ADDRESS_POS]).expect("hard coded length");
        let element_address = UnicastAddress::from_bytes_be(&buf[ADDRESS_POS..])
            .ok_or(DataError::BadField(ADDRESS_POS))?;
        Ok(ProvisioningData {
            net_key,
            net_key_index,
            flags,
            iv_index,
            element_address,
        })
    }
    /// # Errors
    /// Only fails if the cipher rejects the buffer sizes, which are fixed.
    pub fn encrypt(
        &self,
        security_materials: &SessionSecurityMaterials,
    ) -> Result<EncryptedProvisioningData, CryptoError> {
        let mut data = self.packed_unencrypted();
        let mic = AESCipher::new(*security_materials.key.key()).ccm_encrypt(
            security_materials.nonce.nonce(),
            &[],
            &mut data,
            MicSize::Big,
        )?;
        Ok(EncryptedProvisioningData { data, mic })
    }
    /// # Errors
    /// `DecryptionFailed` if the MIC doesn't verify, otherwise see
    /// [`ProvisioningData::unpack_unencrypted`].
    pub fn decrypt(
        security_materials: &SessionSecurityMaterials,
        encrypted: &EncryptedProvisioningData,
    ) -> Result<ProvisioningData, DataError> {
        let mut data: [u8; ENCRYPTED_PROVISIONING_DATA_LEN] = encrypted.data;
        AESCipher::new(*security_materials.key.key())
            .ccm_decrypt(
                security_materials.nonce.nonce(),
                &[],
                &mut data,
                encrypted.mic,
            )
            .map_err(|_| DataError::DecryptionFailed)?;
        let out = ProvisioningData::unpack_unencrypted(&data);
        zeroize::Zeroize::zeroize(&mut data);
        out
    }
}
