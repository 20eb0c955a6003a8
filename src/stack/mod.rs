//! Mesh Transport. Glues the Access, Upper Transport, Lower Transport and Network layers together
//! for messages between the provisioner and the nodes it provisioned.
//!
//! Layers (top to bottom):
//! - Access ([`crate::access`])
//! - Upper Transport ([`crate::upper`])
//! - Lower Transport ([`crate::lower`], [`crate::segmenter`], [`crate::reassembler`])
//! - Network ([`crate::net`])
//!
//! [`MeshTransport`] is stateless apart from the shared sequence counter. Per node state
//! (in flight operation, reassembly, timers) lives in [`dispatcher::MessageDispatcher`].

pub mod dispatcher;
#[cfg(feature = "full_stack")]
pub mod driver;
pub mod segments;

use crate::access::{AccessMessage, OpcodeError};
use crate::address::{Address, UnicastAddress};
use crate::config::TransportConfig;
use crate::control::{ControlMessageError, ControlPayload};
use crate::crypto::aes::MicSize;
use crate::crypto::key::{AppKey, DevKey};
use crate::crypto::materials::{AppKeyMap, ApplicationSecurityMaterials, NetworkCredentials};
use crate::crypto::nonce::AccessNonceParts;
use crate::lower::{self, LowerError, SeqZero};
use crate::mesh::{
    AppKeyIndex, ElementCount, IVIndex, NetKeyIndex, SequenceNumber, U24_MAX,
};
use crate::models::{MessageKey, MessagePackError};
use crate::net::{self, NetError};
use crate::segmenter::{self, Segmenter};
use crate::upper::{EncryptedAccessPDU, SecurityMaterials, UpperError, UpperPDU};
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A provisioned node as the provisioner sees it. Produced by a completed provisioning handshake.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeIdentity {
    /// Primary element address. The node owns `element_count` consecutive addresses from it.
    pub address: UnicastAddress,
    pub element_count: ElementCount,
    pub device_key: DevKey,
    pub net_key_index: NetKeyIndex,
    pub iv_index: IVIndex,
}
impl NodeIdentity {
    /// `true` if `address` is one of the node's element addresses.
    #[must_use]
    pub fn owns(&self, address: UnicastAddress) -> bool {
        let first = self.address.value();
        address.value() >= first
            && u32::from(address.value()) < u32::from(first) + u32::from(self.element_count.0)
    }
}

/// Range of sequence numbers handed out by [`SeqCounter::inc_seq`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SeqRange {
    start: u32,
    end: u32,
}
impl SeqRange {
    #[must_use]
    pub fn start(&self) -> SequenceNumber {
        SequenceNumber::new(self.start)
    }
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }
    /// `offset`th sequence number of the range.
    #[must_use]
    pub fn nth(&self, offset: u32) -> Option<SequenceNumber> {
        let seq = self.start.checked_add(offset)?;
        if seq < self.end {
            Some(SequenceNumber::new(seq))
        } else {
            None
        }
    }
}

/// Atomic 24-bit sequence number counter of a source address. Shared between every node the
/// source talks to.
#[derive(Debug, Default)]
pub struct SeqCounter(AtomicU32);
impl SeqCounter {
    #[must_use]
    pub fn new(next: SequenceNumber) -> Self {
        SeqCounter(AtomicU32::new(next.value()))
    }
    /// Next sequence number that will be handed out.
    #[must_use]
    pub fn check(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
    /// Reserves `amount` consecutive sequence numbers. `None` once the 24-bit space is used up.
    pub fn inc_seq(&self, amount: u32) -> Option<SeqRange> {
        let start = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |seq| {
                seq.checked_add(amount).filter(|&end| end <= U24_MAX + 1)
            })
            .ok()?;
        Some(SeqRange {
            start,
            end: start + amount,
        })
    }
    /// # Errors
    /// `OutOfSeq` if the sequence space is used up.
    pub fn next(&self) -> Result<SequenceNumber, TransportError> {
        self.inc_seq(1)
            .map(|range| range.start())
            .ok_or(TransportError::OutOfSeq)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, thiserror::Error)]
pub enum TransportError {
    #[error("sequence numbers exhausted")]
    OutOfSeq,
    #[error("no application key with index {0:?}")]
    UnknownAppKey(AppKeyIndex),
    #[error("no key decrypts the access message")]
    NoMatchingKey,
    #[error("PDU source isn't the expected node")]
    UnexpectedSource,
    #[error(transparent)]
    Net(#[from] NetError),
    #[error(transparent)]
    Lower(#[from] LowerError),
    #[error(transparent)]
    Upper(#[from] UpperError),
    #[error(transparent)]
    Opcode(#[from] OpcodeError),
    #[error(transparent)]
    Control(#[from] ControlMessageError),
    #[error(transparent)]
    Pack(#[from] MessagePackError),
}

/// An access message encrypted and ready to segment. `seqs` holds one sequence number per
/// segment for the first transmission; the first one is the SeqAuth.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreparedMessage {
    pub segmenter: Segmenter,
    pub seqs: SeqRange,
}

/// Decrypted network PDU with its lower transport PDU parsed.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct IncomingPDU {
    pub header: net::Header,
    pub iv_index: IVIndex,
    pub pdu: lower::PDU,
}

pub struct MeshTransport {
    logger: slog::Logger,
    config: TransportConfig,
    src: UnicastAddress,
    iv_index: IVIndex,
    credentials: NetworkCredentials,
    app_keys: AppKeyMap,
    seq: Arc<SeqCounter>,
}
impl MeshTransport {
    #[must_use]
    pub fn new(
        logger: slog::Logger,
        config: TransportConfig,
        src: UnicastAddress,
        iv_index: IVIndex,
        credentials: NetworkCredentials,
        seq: Arc<SeqCounter>,
    ) -> Self {
        Self {
            logger,
            config,
            src,
            iv_index,
            credentials,
            app_keys: AppKeyMap::new(),
            seq,
        }
    }
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
    #[must_use]
    pub fn src(&self) -> UnicastAddress {
        self.src
    }
    #[must_use]
    pub fn iv_index(&self) -> IVIndex {
        self.iv_index
    }
    pub fn set_iv_index(&mut self, iv_index: IVIndex) {
        self.iv_index = iv_index;
    }
    #[must_use]
    pub fn credentials(&self) -> &NetworkCredentials {
        &self.credentials
    }
    #[must_use]
    pub fn seq_counter(&self) -> &Arc<SeqCounter> {
        &self.seq
    }
    pub fn add_app_key(&mut self, index: AppKeyIndex, app_key: AppKey) {
        self.app_keys.insert(
            index,
            ApplicationSecurityMaterials::new(app_key, self.credentials.index()),
        );
    }
    pub fn remove_app_key(&mut self, index: AppKeyIndex) -> bool {
        self.app_keys.remove_key(index).is_some()
    }
    /// # Errors
    /// `OutOfSeq` if the sequence space is used up.
    pub fn next_seq(&self) -> Result<SequenceNumber, TransportError> {
        self.seq.next()
    }

    /// Encrypts `message` for `dst` and reserves one sequence number per segment.
    /// # Errors
    /// `UnknownAppKey` for a missing app key, `OutOfSeq`, or any layer error for a message that
    /// can't be encrypted or segmented.
    pub fn prepare_access(
        &self,
        node: &NodeIdentity,
        dst: Address,
        message: &AccessMessage,
        key: MessageKey,
    ) -> Result<PreparedMessage, TransportError> {
        let sm = match key {
            MessageKey::Device => SecurityMaterials::Device(node.device_key),
            MessageKey::App(index) => SecurityMaterials::App(
                self.app_keys
                    .get_key(index)
                    .ok_or(TransportError::UnknownAppKey(index))?
                    .app_key,
            ),
        };
        let access_pdu = message.to_bytes()?;
        let small_len = access_pdu.len() + MicSize::Small.byte_size();
        let big_mic = self.config.big_trans_mic
            && segmenter::segment_count(small_len, false, false) > 1;
        let mic_size = MicSize::from(big_mic);
        let seg_count = segmenter::segment_count(
            access_pdu.len() + mic_size.byte_size(),
            false,
            big_mic,
        );
        if seg_count > lower::MAX_SEGMENTS {
            return Err(UpperError::TooLong.into());
        }
        let seqs = self
            .seq
            .inc_seq(seg_count as u32)
            .ok_or(TransportError::OutOfSeq)?;
        let seq_auth = seqs.start();
        let encrypted = sm.encrypt(
            &access_pdu,
            &AccessNonceParts {
                aszmic: big_mic,
                seq: seq_auth,
                src: self.src,
                dst,
                iv_index: self.iv_index,
            },
            mic_size,
        )?;
        trace!(self.logger, "access encrypted";
            "dst" => %dst, "seq_auth" => seq_auth.value(), "segments" => seg_count);
        Ok(PreparedMessage {
            segmenter: Segmenter::new(UpperPDU::Access(encrypted), SeqZero::from_seq(seq_auth))?,
            seqs,
        })
    }

    /// Wraps a lower transport PDU in an encrypted network PDU from our source address.
    /// # Errors
    /// Network layer errors (unassigned `dst`).
    pub fn encode_network(
        &self,
        dst: Address,
        pdu: &lower::PDU,
        seq: SequenceNumber,
    ) -> Result<Vec<u8>, TransportError> {
        let keys = self.credentials.network_keys();
        let header = net::Header {
            ivi: self.iv_index.ivi(),
            nid: keys.nid(),
            ctl: pdu.ctl(),
            ttl: self.config.default_ttl,
            seq,
            src: self.src,
            dst,
        };
        let encrypted = net::PDU {
            header,
            payload: pdu.to_bytes(),
        }
        .encrypt(keys, self.iv_index)?;
        Ok(encrypted.into_bytes())
    }

    /// Unsegmented control message (Segment Acknowledgements) with a fresh sequence number.
    /// # Errors
    /// `OutOfSeq`, `Lower` if the payload doesn't fit one PDU.
    pub fn encode_control(
        &self,
        dst: Address,
        payload: &ControlPayload,
    ) -> Result<Vec<u8>, TransportError> {
        let pdu = lower::PDU::UnsegmentedControl(lower::UnsegmentedControlPDU::new(
            payload.opcode,
            &payload.payload,
        )?);
        self.encode_network(dst, &pdu, self.next_seq()?)
    }

    /// Decrypts a network PDU and parses its lower transport PDU.
    /// # Errors
    /// `Net` for PDUs of another subnet, MIC failures or bad lengths. `Lower` for a malformed
    /// lower transport PDU.
    pub fn decode_network(&self, bytes: &[u8]) -> Result<IncomingPDU, TransportError> {
        let encrypted = net::EncryptedPDU::new(bytes)?;
        let iv_index = self
            .iv_index
            .matching_ivi(encrypted.ivi())
            .ok_or(NetError::NoMatchingIV)?;
        let pdu = encrypted.decrypt(self.credentials.network_keys(), iv_index)?;
        let lower = lower::PDU::from_bytes(pdu.payload.as_ref(), pdu.header.ctl)?;
        Ok(IncomingPDU {
            header: pdu.header,
            iv_index,
            pdu: lower,
        })
    }

    /// Decrypts an upper transport access PDU from `node`. Device key messages use the node's
    /// device key, application key messages every app key with a matching AID.
    /// # Errors
    /// `NoMatchingKey` if no key authenticates the PDU, `Opcode` for a malformed access PDU.
    pub fn open_access(
        &self,
        node: &NodeIdentity,
        header: &net::Header,
        iv_index: IVIndex,
        seq_auth: SequenceNumber,
        pdu: &EncryptedAccessPDU,
    ) -> Result<AccessMessage, TransportError> {
        let parts = AccessNonceParts {
            aszmic: pdu.mic().is_big(),
            seq: seq_auth,
            src: header.src,
            dst: header.dst,
            iv_index,
        };
        let access_pdu = if pdu.akf().0 {
            self.app_keys
                .matching_aid(pdu.aid())
                .find_map(|(_, sm)| SecurityMaterials::App(sm.app_key).decrypt(pdu, &parts).ok())
                .ok_or(TransportError::NoMatchingKey)?
        } else {
            SecurityMaterials::Device(node.device_key)
                .decrypt(pdu, &parts)
                .map_err(|_| TransportError::NoMatchingKey)?
        };
        Ok(AccessMessage::from_bytes(&access_pdu)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::access::Opcode;
    use crate::crypto::key::NetKey;
    use crate::mesh::KeyIndex;
    use crate::provisioning::data::Flags;

    pub(crate) fn message_6_node() -> NodeIdentity {
        NodeIdentity {
            address: UnicastAddress::new(0x1201),
            element_count: ElementCount(1),
            device_key: DevKey::from_hex("9d6dd0e96eb25dc19a40ed9914f8f03f").unwrap(),
            net_key_index: NetKeyIndex(KeyIndex::new(0)),
            iv_index: IVIndex(0x1234_5678),
        }
    }
    pub(crate) fn message_6_credentials() -> NetworkCredentials {
        NetworkCredentials::new(
            NetKey::from_hex("7dd7364cd842ad18c17c2b820c84c3d6").unwrap(),
            NetKeyIndex(KeyIndex::new(0)),
            Flags::default(),
        )
    }
    /// Provisioner at 0x0003 with the Mesh Profile sample keys.
    pub(crate) fn transport(next_seq: u32) -> MeshTransport {
        MeshTransport::new(
            crate::discard_logger(),
            TransportConfig::default(),
            UnicastAddress::new(0x0003),
            IVIndex(0x1234_5678),
            message_6_credentials(),
            Arc::new(SeqCounter::new(SequenceNumber::new(next_seq))),
        )
    }

    #[test]
    fn test_seq_counter() {
        let counter = SeqCounter::new(SequenceNumber::new(U24_MAX - 2));
        let range = counter.inc_seq(2).unwrap();
        assert_eq!(range.start(), SequenceNumber::new(U24_MAX - 2));
        assert_eq!(range.nth(1), Some(SequenceNumber::new(U24_MAX - 1)));
        assert_eq!(range.nth(2), None);
        assert!(counter.inc_seq(2).is_none());
        assert_eq!(counter.next(), Ok(SequenceNumber::new(U24_MAX)));
        assert_eq!(counter.next(), Err(TransportError::OutOfSeq));
    }
    #[test]
    fn test_message_6_prepare() {
        let transport = transport(0x3129ab);
        let message = AccessMessage::from_bytes(
            &hex::decode("0056341263964771734fbd76e3b40519d1d94a48").unwrap(),
        )
        .unwrap();
        let node = message_6_node();
        let prepared = transport
            .prepare_access(&node, node.address.into(), &message, MessageKey::Device)
            .unwrap();
        assert_eq!(prepared.seqs.len(), 2);
        assert_eq!(prepared.seqs.start(), SequenceNumber::new(0x3129ab));
        let segments: Vec<Vec<u8>> = prepared
            .segmenter
            .iter(lower::BlockAck::default())
            .map(|(_, pdu)| pdu.to_bytes().as_ref().to_vec())
            .collect();
        assert_eq!(
            segments,
            vec![
                hex::decode("8026ac01ee9dddfd2169326d23f3afdf").unwrap(),
                hex::decode("8026ac21cfdc18c52fdef772e0e17308").unwrap(),
            ]
        );
        assert_eq!(transport.seq_counter().check(), 0x3129ad);
    }
    #[test]
    fn test_network_round_trip() {
        let transport = transport(0x000100);
        let node = message_6_node();
        let message = AccessMessage::new(Opcode::sig(0x8008), vec![0x00]);
        let prepared = transport
            .prepare_access(&node, node.address.into(), &message, MessageKey::Device)
            .unwrap();
        assert!(!prepared.segmenter.is_segmented());
        let lower_pdu = prepared.segmenter.segment(lower::SegO::new(0)).unwrap();
        let bytes = transport
            .encode_network(node.address.into(), &lower_pdu, prepared.seqs.start())
            .unwrap();
        let incoming = transport.decode_network(&bytes).unwrap();
        assert_eq!(incoming.pdu, lower_pdu);
        assert_eq!(incoming.header.src, UnicastAddress::new(0x0003));
        assert_eq!(incoming.header.seq, SequenceNumber::new(0x000100));
        let upper = match incoming.pdu {
            lower::PDU::UnsegmentedAccess(a) => EncryptedAccessPDU::from_bytes(
                a.akf(),
                a.aid(),
                a.upper_pdu(),
                MicSize::Small,
            )
            .unwrap(),
            _ => panic!("expected unsegmented access"),
        };
        assert_eq!(
            transport.open_access(
                &node,
                &incoming.header,
                incoming.iv_index,
                incoming.header.seq,
                &upper
            ),
            Ok(message)
        );
        let mut tampered = bytes.clone();
        tampered[12] ^= 1;
        assert!(transport.decode_network(&tampered).is_err());
    }
    #[test]
    fn test_unknown_app_key() {
        let transport = transport(1);
        let node = message_6_node();
        let message = AccessMessage::new(Opcode::sig(0x8201), vec![]);
        let index = AppKeyIndex(KeyIndex::new(3));
        assert_eq!(
            transport.prepare_access(
                &node,
                node.address.into(),
                &message,
                MessageKey::App(index)
            ),
            Err(TransportError::UnknownAppKey(index))
        );
    }
    #[test]
    fn test_node_owns() {
        let node = NodeIdentity {
            element_count: ElementCount(3),
            ..message_6_node()
        };
        assert!(node.owns(UnicastAddress::new(0x1203)));
        assert!(!node.owns(UnicastAddress::new(0x1204)));
        assert!(!node.owns(UnicastAddress::new(0x1200)));
    }
}
