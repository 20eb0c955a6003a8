//! Bluetooth Mesh Network Layer. Network layer is BIG Endian.
//! Encrypts `DST || TransportPDU` with the network `EncryptionKey` and then obfuscates
//! `CTL/TTL || SEQ || SRC` with the `PrivacyKey` so only nodes holding the NetKey can read them.

use crate::address::{Address, UnicastAddress};
use crate::bytes::ToFromBytesEndian;
use crate::crypto::aes::{AESCipher, AesBlock, MicSize};
use crate::crypto::materials::NetworkKeys;
use crate::crypto::nonce::NetworkNonceParts;
use crate::crypto::{CryptoError, MIC};
use crate::lower;
use crate::mesh::{IVIndex, SequenceNumber, CTL, IVI, NID, TTL};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, thiserror::Error)]
pub enum NetError {
    #[error("network PDU has a bad length")]
    BadLength,
    #[error("NID doesn't match the network key")]
    NIDMismatch,
    #[error("no IV Index matches the IVI bit")]
    NoMatchingIV,
    #[error("source isn't a unicast address")]
    BadSource,
    #[error("destination is unassigned")]
    BadDestination,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Mesh Network PDU Header
/// From Mesh Core v1.0
/// | Field Name    | Bits  | Notes                                                     |
/// |---------------|-------|-----------------------------------------------------------|
/// | IVI           | 1     | Least significant bit of IV Index                         |
/// | NID           | 7     | Value derived from the NetKey used to encrypt this PDU    |
/// | CTL           | 1     | Network Control                                           |
/// | TTL           | 7     | Time To Live                                              |
/// | SEQ           | 24    | Sequence Number                                           |
/// | SRC           | 16    | Source Unicast Address                                    |
/// | DST           | 16    | Destination Address (Unicast, Group or Virtual            |
/// | Transport PDU | 8-128 | Transport PDU (1-16 Bytes)                                |
/// | NetMIC        | 32,64 | Message Integrity check for Payload (4 or 8 bytes)        |
///
/// NetMIC is 32 bit when CTL == 0
/// NetMIC is 64 bit when CTL == 1
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Header {
    pub ivi: IVI,
    pub nid: NID,
    pub ctl: CTL,
    pub ttl: TTL,
    pub seq: SequenceNumber,
    pub src: UnicastAddress,
    pub dst: Address,
}

pub const PDU_HEADER_LEN: usize = 1 + 1 + 3 + 2 + 2;
const OBFUSCATED_POS: usize = 1;
const DST_POS: usize = 7;
const PRIVACY_RANDOM_LEN: usize = 7;
/// Smallest network PDU: header, 1 byte transport PDU and a small NetMIC.
pub const MIN_PDU_LEN: usize = PDU_HEADER_LEN + 1 + 4;
pub const MAX_PDU_LEN: usize = PDU_HEADER_LEN + lower::PDU::max_len() + 8;

impl Header {
    #[must_use]
    pub fn mic_size(&self) -> MicSize {
        MicSize::from(self.ctl.0)
    }
    #[must_use]
    pub fn nonce_parts(&self, iv_index: IVIndex) -> NetworkNonceParts {
        NetworkNonceParts {
            ctl: self.ctl,
            ttl: self.ttl,
            src: self.src,
            seq: self.seq,
            iv_index,
        }
    }
    /// Unobfuscated, unencrypted header bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PDU_HEADER_LEN] {
        let mut out = [0_u8; PDU_HEADER_LEN];
        out[0] = self.nid.with_flag(self.ivi.0);
        out[1] = self.ttl.with_flag(self.ctl.0);
        out[2..5].copy_from_slice(&self.seq.to_bytes_be());
        out[5..7].copy_from_slice(&self.src.to_bytes_be());
        out[7..9].copy_from_slice(&self.dst.to_bytes_be());
        out
    }
}

/// `PECB = e(PrivacyKey, 0x0000000000 || IV Index || PrivacyRandom)`. The first 6 bytes are XORed
/// over `CTL/TTL || SEQ || SRC`.
fn pecb(keys: &NetworkKeys, iv_index: IVIndex, privacy_random: &[u8]) -> AesBlock {
    let mut block: AesBlock = [0_u8; 16];
    block[5..9].copy_from_slice(&iv_index.to_bytes_be());
    block[9..].copy_from_slice(&privacy_random[..PRIVACY_RANDOM_LEN]);
    AESCipher::new(*keys.privacy_key().key()).ecb_encrypt_block(block)
}
fn xor_obfuscated(pdu: &mut [u8], pecb: &AesBlock) {
    for (b, p) in pdu[OBFUSCATED_POS..DST_POS].iter_mut().zip(pecb.iter()) {
        *b ^= *p;
    }
}

/// Plaintext Network PDU.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PDU {
    pub header: Header,
    pub payload: lower::PDUBytes,
}
impl PDU {
    /// Encrypts and obfuscates the PDU. The header `NID` and `IVI` are taken from `keys` and
    /// `iv_index`.
    /// # Errors
    /// `BadDestination` for an unassigned `dst`.
    pub fn encrypt(&self, keys: &NetworkKeys, iv_index: IVIndex) -> Result<EncryptedPDU, NetError> {
        if !self.header.dst.is_assigned() {
            return Err(NetError::BadDestination);
        }
        let header = Header {
            ivi: iv_index.ivi(),
            nid: keys.nid(),
            ..self.header
        };
        let mic_size = header.mic_size();
        let mut out = Vec::with_capacity(PDU_HEADER_LEN + self.payload.len() + mic_size.byte_size());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(self.payload.as_ref());
        let mic = AESCipher::new(*keys.encryption_key().key()).ccm_encrypt(
            header.nonce_parts(iv_index).to_nonce().nonce(),
            &[],
            &mut out[DST_POS..],
            mic_size,
        )?;
        out.extend_from_slice(&mic.to_bytes_be()[..mic.byte_size()]);
        let pecb = pecb(keys, iv_index, &out[DST_POS..]);
        xor_obfuscated(&mut out, &pecb);
        Ok(EncryptedPDU(out))
    }
}

/// Obfuscated and encrypted Network PDU as it travels over the bearer.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct EncryptedPDU(Vec<u8>);
impl EncryptedPDU {
    /// # Errors
    /// `BadLength` unless `14 <= bytes.len() <= 29`.
    pub fn new(bytes: &[u8]) -> Result<EncryptedPDU, NetError> {
        if bytes.len() < MIN_PDU_LEN || bytes.len() > MAX_PDU_LEN {
            Err(NetError::BadLength)
        } else {
            Ok(EncryptedPDU(bytes.to_vec()))
        }
    }
    #[must_use]
    pub fn nid(&self) -> NID {
        NID::new_with_flag(self.0[0]).0
    }
    #[must_use]
    pub fn ivi(&self) -> IVI {
        IVI(NID::new_with_flag(self.0[0]).1)
    }
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
    /// Deobfuscates and decrypts the PDU with `keys`. `iv_index` is the node's current IV Index;
    /// the IVI bit picks it or the one before.
    /// # Errors
    /// `NIDMismatch` if `keys` is for another subnet, `Crypto(AuthenticationFailed)` if the NetMIC
    /// doesn't verify. Either way the PDU should just be dropped.
    pub fn decrypt(&self, keys: &NetworkKeys, iv_index: IVIndex) -> Result<PDU, NetError> {
        if self.nid() != keys.nid() {
            return Err(NetError::NIDMismatch);
        }
        let iv_index = iv_index
            .matching_ivi(self.ivi())
            .ok_or(NetError::NoMatchingIV)?;
        let mut buf = self.0.clone();
        let pecb = pecb(keys, iv_index, &buf[DST_POS..]);
        xor_obfuscated(&mut buf, &pecb);
        let (ttl, ctl) = TTL::new_with_flag(buf[1]);
        let seq = SequenceNumber::from_bytes_be(&buf[2..5]).ok_or(NetError::BadLength)?;
        let src = UnicastAddress::from_bytes_be(&buf[5..7]).ok_or(NetError::BadSource)?;
        let header = Header {
            ivi: self.ivi(),
            nid: self.nid(),
            ctl: CTL(ctl),
            ttl,
            seq,
            src,
            dst: Address::Unassigned,
        };
        let mic_size = header.mic_size();
        let mic_pos = buf
            .len()
            .checked_sub(mic_size.byte_size())
            .filter(|&p| p > PDU_HEADER_LEN)
            .ok_or(NetError::BadLength)?;
        let mic = MIC::try_from_bytes_be(&buf[mic_pos..]).ok_or(NetError::BadLength)?;
        AESCipher::new(*keys.encryption_key().key()).ccm_decrypt(
            header.nonce_parts(iv_index).to_nonce().nonce(),
            &[],
            &mut buf[DST_POS..mic_pos],
            mic,
        )?;
        let dst = Address::from_bytes_be(&buf[DST_POS..PDU_HEADER_LEN]).ok_or(NetError::BadLength)?;
        if !dst.is_assigned() {
            return Err(NetError::BadDestination);
        }
        let payload = lower::PDUBytes::try_from(&buf[PDU_HEADER_LEN..mic_pos])
            .map_err(|_| NetError::BadLength)?;
        Ok(PDU {
            header: Header { dst, ..header },
            payload,
        })
    }
}
impl AsRef<[u8]> for EncryptedPDU {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
