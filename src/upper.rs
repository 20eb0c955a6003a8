//! Upper Transport Layer. Encrypts and authenticates access PDUs with an application or device
//! key. Control messages pass through unencrypted.
use crate::control::ControlPayload;
use crate::crypto::aes::{AESCipher, MicSize};
use crate::crypto::key::{AppKey, DevKey, Key};
use crate::crypto::nonce::{AccessNonceParts, Nonce};
use crate::crypto::{CryptoError, AID, AKF, MIC};
use crate::lower::{SegmentedAccessPDU, MAX_SEGMENTS};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, thiserror::Error)]
pub enum UpperError {
    #[error("access PDU too long to segment")]
    TooLong,
    #[error("upper transport PDU shorter than its TransMIC")]
    TooShort,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Largest encrypted upper transport access PDU: 32 segments of 12 bytes.
pub const ENCRYPTED_ACCESS_PDU_MAX_LEN: usize = MAX_SEGMENTS * SegmentedAccessPDU::max_seg_len();

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SecurityMaterials {
    App(AppKey),
    Device(DevKey),
}
impl SecurityMaterials {
    #[must_use]
    pub fn key(&self) -> &Key {
        match self {
            SecurityMaterials::App(k) => k.key(),
            SecurityMaterials::Device(k) => k.key(),
        }
    }
    #[must_use]
    pub fn akf(&self) -> AKF {
        AKF(matches!(self, SecurityMaterials::App(_)))
    }
    /// AID of the application key. Device key messages carry an AID of 0.
    #[must_use]
    pub fn aid(&self) -> AID {
        match self {
            SecurityMaterials::App(k) => k.aid(),
            SecurityMaterials::Device(_) => AID::new_masked(0),
        }
    }
    fn nonce(&self, parts: &AccessNonceParts) -> Nonce {
        match self {
            SecurityMaterials::App(_) => *parts.to_app_nonce().nonce(),
            SecurityMaterials::Device(_) => *parts.to_device_nonce().nonce(),
        }
    }
    /// Encrypts `access_pdu`. The nonce ASZMIC bit follows `mic_size`, since only segmented
    /// messages may use the 8 byte TransMIC.
    /// # Errors
    /// `TooLong` if the result won't fit into 32 segments.
    pub fn encrypt(
        &self,
        access_pdu: &[u8],
        parts: &AccessNonceParts,
        mic_size: MicSize,
    ) -> Result<EncryptedAccessPDU, UpperError> {
        if access_pdu.len() + mic_size.byte_size() > ENCRYPTED_ACCESS_PDU_MAX_LEN {
            return Err(UpperError::TooLong);
        }
        let parts = AccessNonceParts {
            aszmic: mic_size.is_big(),
            ..*parts
        };
        let mut data = access_pdu.to_vec();
        let mic = AESCipher::new(*self.key()).ccm_encrypt(
            &self.nonce(&parts),
            &[],
            &mut data,
            mic_size,
        )?;
        Ok(EncryptedAccessPDU {
            akf: self.akf(),
            aid: self.aid(),
            data,
            mic,
        })
    }
    /// # Errors
    /// `Crypto(AuthenticationFailed)` if the TransMIC doesn't verify with this key.
    pub fn decrypt(
        &self,
        pdu: &EncryptedAccessPDU,
        parts: &AccessNonceParts,
    ) -> Result<Vec<u8>, UpperError> {
        let parts = AccessNonceParts {
            aszmic: pdu.mic.is_big(),
            ..*parts
        };
        let mut data = pdu.data.clone();
        AESCipher::new(*self.key()).ccm_decrypt(&self.nonce(&parts), &[], &mut data, pdu.mic)?;
        Ok(data)
    }
}

/// Upper Transport Access PDU: encrypted access payload followed by the TransMIC.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct EncryptedAccessPDU {
    akf: AKF,
    aid: AID,
    data: Vec<u8>,
    mic: MIC,
}
impl EncryptedAccessPDU {
    /// Splits the trailing `mic_size` TransMIC off `bytes`.
    /// # Errors
    /// `TooShort` if `bytes` can't hold the MIC, `TooLong` past 32 segments.
    pub fn from_bytes(
        akf: AKF,
        aid: AID,
        bytes: &[u8],
        mic_size: MicSize,
    ) -> Result<Self, UpperError> {
        if bytes.len() > ENCRYPTED_ACCESS_PDU_MAX_LEN {
            return Err(UpperError::TooLong);
        }
        let data_len = bytes
            .len()
            .checked_sub(mic_size.byte_size())
            .filter(|&l| l > 0)
            .ok_or(UpperError::TooShort)?;
        Ok(EncryptedAccessPDU {
            akf,
            aid,
            data: bytes[..data_len].to_vec(),
            mic: MIC::try_from_bytes_be(&bytes[data_len..]).ok_or(UpperError::TooShort)?,
        })
    }
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.mic.to_bytes_be()[..self.mic.byte_size()]);
        out
    }
    #[must_use]
    pub const fn akf(&self) -> AKF {
        self.akf
    }
    #[must_use]
    pub const fn aid(&self) -> AID {
        self.aid
    }
    #[must_use]
    pub const fn mic(&self) -> MIC {
        self.mic
    }
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
    /// Length including the TransMIC.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() + self.mic.byte_size()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum UpperPDU {
    Access(EncryptedAccessPDU),
    Control(ControlPayload),
}
impl UpperPDU {
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self, UpperPDU::Control(_))
    }
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            UpperPDU::Access(a) => a.len(),
            UpperPDU::Control(c) => c.payload.len(),
        }
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, UnicastAddress};
    use crate::mesh::{IVIndex, SequenceNumber};

    fn parts() -> AccessNonceParts {
        AccessNonceParts {
            aszmic: false,
            seq: SequenceNumber::new(0x3129ab),
            src: UnicastAddress::new(0x0003),
            dst: Address::from(0x1201),
            iv_index: IVIndex(0x1234_5678),
        }
    }
    #[test]
    fn test_device_key_vector() {
        // Mesh Profile sample data Message #6 (Config AppKey Add upper transport PDU).
        let dev_key = DevKey::from_hex("9d6dd0e96eb25dc19a40ed9914f8f03f").unwrap();
        let access = hex::decode(
            "0056341263964771734fbd76e3b40519d1d94a48",
        )
        .unwrap();
        let sm = SecurityMaterials::Device(dev_key);
        let encrypted = sm.encrypt(&access, &parts(), MicSize::Small).unwrap();
        assert_eq!(
            encrypted.to_bytes(),
            hex::decode("ee9dddfd2169326d23f3afdfcfdc18c52fdef772e0e17308").unwrap()
        );
        assert_eq!(sm.decrypt(&encrypted, &parts()), Ok(access));
    }
    #[test]
    fn test_app_key_round_trip_big_mic() {
        let app_key = AppKey::from_hex("63964771734fbd76e3b40519d1d94a48").unwrap();
        let sm = SecurityMaterials::App(app_key);
        let access = b"\x82\x02\x01\x00".to_vec();
        let encrypted = sm.encrypt(&access, &parts(), MicSize::Big).unwrap();
        assert_eq!(encrypted.akf(), AKF(true));
        assert_eq!(encrypted.aid(), app_key.aid());
        assert_eq!(encrypted.len(), access.len() + 8);
        let parsed = EncryptedAccessPDU::from_bytes(
            encrypted.akf(),
            encrypted.aid(),
            &encrypted.to_bytes(),
            MicSize::Big,
        )
        .unwrap();
        assert_eq!(sm.decrypt(&parsed, &parts()), Ok(access));
    }
    #[test]
    fn test_wrong_key_fails() {
        let sm = SecurityMaterials::Device(DevKey::new_bytes([1; 16]));
        let encrypted = sm.encrypt(&[0x80, 0x08, 0x00], &parts(), MicSize::Small).unwrap();
        let other = SecurityMaterials::Device(DevKey::new_bytes([2; 16]));
        assert_eq!(
            other.decrypt(&encrypted, &parts()),
            Err(UpperError::Crypto(CryptoError::AuthenticationFailed))
        );
        assert_eq!(
            sm.encrypt(&[0; 381], &parts(), MicSize::Small),
            Err(UpperError::TooLong)
        );
    }
}
