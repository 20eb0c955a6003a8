//! Message State Dispatcher. Runs at most one operation per node: sends its PDUs, resends lost
//! segments, acknowledges incoming segmented messages and turns the node's answer into a
//! [`MeshEvent`].
//!
//! The dispatcher never blocks and owns no clock. Every entry point takes `now` and
//! [`MessageDispatcher::next_deadline`] says when [`MessageDispatcher::poll`] wants to run next.
use crate::access::AccessMessage;
use crate::address::{Address, UnicastAddress};
use crate::control::{ControlMessage, ControlOpcode, SegmentAck};
use crate::crypto::aes::MicSize;
use crate::interface::{EventSink, LinkError, MeshEvent, OutboundTransport};
use crate::lower::{self, SegO};
use crate::mesh::{IVIndex, SequenceNumber};
use crate::models::{Operation, StatusMessage};
use crate::net;
use crate::proxy::{self, MessageType, ProxyError, ProxyReassembler};
use crate::stack::segments::{AckOutcome, IncomingSegments, OutgoingMessage, SegmentOutcome};
use crate::stack::{IncomingPDU, MeshTransport, NodeIdentity, TransportError};
use crate::upper::{EncryptedAccessPDU, UpperPDU};
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, thiserror::Error)]
pub enum DispatchError {
    #[error("an operation is already in flight for this node")]
    Busy,
    #[error("unknown node {0}")]
    UnknownNode(UnicastAddress),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum FailureReason {
    /// The node answered with an all zero BlockAck.
    Cancelled,
    Link(LinkError),
}

/// The operation in flight and its segment bookkeeping.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InFlight {
    operation: Operation,
    outgoing: OutgoingMessage,
    /// Proxy PDUs handed to the link and not yet reported written.
    unwritten: Vec<Vec<u8>>,
    deadline: Instant,
}
impl InFlight {
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }
    #[must_use]
    pub fn outgoing(&self) -> &OutgoingMessage {
        &self.outgoing
    }
    /// Incomplete timer of the operation.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MessageOperationState {
    Idle,
    AwaitingAck(Box<InFlight>),
    Complete,
    Failed(FailureReason),
}
impl MessageOperationState {
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, MessageOperationState::AwaitingAck(_))
    }
    #[must_use]
    pub fn in_flight(&self) -> Option<&InFlight> {
        match self {
            MessageOperationState::AwaitingAck(f) => Some(&**f),
            _ => None,
        }
    }
    fn in_flight_mut(&mut self) -> Option<&mut InFlight> {
        match self {
            MessageOperationState::AwaitingAck(f) => Some(&mut **f),
            _ => None,
        }
    }
}
impl Default for MessageOperationState {
    fn default() -> Self {
        MessageOperationState::Idle
    }
}

struct NodeSlot {
    identity: NodeIdentity,
    state: MessageOperationState,
    incoming: IncomingSegments,
    proxy: ProxyReassembler,
}
impl NodeSlot {
    fn new(identity: NodeIdentity) -> Self {
        Self {
            identity,
            state: MessageOperationState::Idle,
            incoming: IncomingSegments::new(),
            proxy: ProxyReassembler::new(),
        }
    }
}
fn slot_mut(
    nodes: &mut BTreeMap<UnicastAddress, NodeSlot>,
    node: UnicastAddress,
) -> Result<&mut NodeSlot, DispatchError> {
    nodes.get_mut(&node).ok_or(DispatchError::UnknownNode(node))
}

pub struct MessageDispatcher<T: OutboundTransport, E: EventSink> {
    logger: slog::Logger,
    transport: MeshTransport,
    link: T,
    events: E,
    nodes: BTreeMap<UnicastAddress, NodeSlot>,
}
impl<T: OutboundTransport, E: EventSink> MessageDispatcher<T, E> {
    pub fn new(
        logger: impl Into<Option<slog::Logger>>,
        transport: MeshTransport,
        link: T,
        events: E,
    ) -> Self {
        Self {
            logger: logger.into().unwrap_or_else(crate::discard_logger),
            transport,
            link,
            events,
            nodes: BTreeMap::new(),
        }
    }
    /// Registers a provisioned node. Replaces (and resets) a node with the same address.
    pub fn add_node(&mut self, identity: NodeIdentity) -> Option<NodeIdentity> {
        debug!(self.logger, "node added"; "node" => %identity.address,
            "elements" => identity.element_count.0);
        self.nodes
            .insert(identity.address, NodeSlot::new(identity))
            .map(|slot| slot.identity)
    }
    pub fn remove_node(&mut self, node: UnicastAddress) -> Option<NodeIdentity> {
        self.nodes.remove(&node).map(|slot| slot.identity)
    }
    #[must_use]
    pub fn node(&self, node: UnicastAddress) -> Option<&NodeIdentity> {
        self.nodes.get(&node).map(|slot| &slot.identity)
    }
    #[must_use]
    pub fn state(&self, node: UnicastAddress) -> Option<&MessageOperationState> {
        self.nodes.get(&node).map(|slot| &slot.state)
    }
    #[must_use]
    pub fn transport(&self) -> &MeshTransport {
        &self.transport
    }
    pub fn transport_mut(&mut self) -> &mut MeshTransport {
        &mut self.transport
    }
    #[must_use]
    pub fn link(&self) -> &T {
        &self.link
    }
    pub fn link_mut(&mut self) -> &mut T {
        &mut self.link
    }
    #[must_use]
    pub fn events(&self) -> &E {
        &self.events
    }
    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    /// Encrypts, segments and writes `operation` to `node`.
    /// # Errors
    /// `Busy` while another operation is awaiting its acknowledgement. `Transport` if the
    /// message can't be built, `Link`/`Proxy` if it can't be written (the state becomes
    /// `Failed`).
    pub fn send(
        &mut self,
        node: UnicastAddress,
        operation: Operation,
        now: Instant,
    ) -> Result<(), DispatchError> {
        let slot = slot_mut(&mut self.nodes, node)?;
        if slot.state.is_busy() {
            return Err(DispatchError::Busy);
        }
        let identity = slot.identity;
        let message = operation
            .to_access_message()
            .map_err(TransportError::from)?;
        let dst = Address::from(identity.address);
        let prepared = self
            .transport
            .prepare_access(&identity, dst, &message, operation.key())?;
        let seqs = prepared.seqs;
        let outgoing = OutgoingMessage::new(prepared, dst, self.transport.config(), now);
        let mut pdus = Vec::with_capacity(outgoing.seg_count());
        for (i, (_, pdu)) in outgoing.pending_segments().enumerate() {
            let seq = seqs.nth(i as u32).ok_or(TransportError::OutOfSeq)?;
            pdus.push(self.transport.encode_network(dst, &pdu, seq)?);
        }
        let unwritten = match self.write_network(node, &pdus) {
            Ok(written) => written,
            Err(e) => {
                if let DispatchError::Link(link) = e {
                    slot_mut(&mut self.nodes, node)?.state =
                        MessageOperationState::Failed(FailureReason::Link(link));
                }
                warn!(self.logger, "operation write failed"; "node" => %node, "error" => %e);
                return Err(e);
            }
        };
        debug!(self.logger, "operation sent";
            "node" => %node,
            "operation" => operation.name(),
            "seq_auth" => seqs.start().value(),
            "segments" => outgoing.seg_count());
        let deadline = now + self.transport.config().incomplete_timeout;
        slot_mut(&mut self.nodes, node)?.state =
            MessageOperationState::AwaitingAck(Box::new(InFlight {
                operation,
                outgoing,
                unwritten,
                deadline,
            }));
        Ok(())
    }

    /// The link finished writing `bytes` to `node`. An unsegmented unacknowledged operation is
    /// complete once all of its writes are done.
    /// # Errors
    /// `UnknownNode`
    pub fn on_write_complete(
        &mut self,
        node: UnicastAddress,
        bytes: &[u8],
    ) -> Result<(), DispatchError> {
        let slot = slot_mut(&mut self.nodes, node)?;
        let done = match slot.state.in_flight_mut() {
            Some(f) => {
                if let Some(pos) = f.unwritten.iter().position(|w| w.as_slice() == bytes) {
                    f.unwritten.remove(pos);
                }
                f.unwritten.is_empty()
                    && !f.outgoing.is_segmented()
                    && !f.operation.is_acknowledged()
            }
            None => false,
        };
        if done {
            slot.state = MessageOperationState::Complete;
            info!(self.logger, "operation complete"; "node" => %node);
            self.events.on_event(MeshEvent::OperationComplete { node });
        }
        Ok(())
    }

    /// Bytes from `node`'s link. PDUs that fail to decrypt or parse are dropped.
    /// # Errors
    /// `UnknownNode`, or a `Link`/`Transport` error while writing a Segment Acknowledgement or
    /// resending segments.
    pub fn on_notification(
        &mut self,
        node: UnicastAddress,
        bytes: &[u8],
        now: Instant,
    ) -> Result<(), DispatchError> {
        let slot = slot_mut(&mut self.nodes, node)?;
        let (message_type, pdu) = match slot.proxy.push(bytes) {
            Ok(Some(complete)) => complete,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!(self.logger, "bad proxy PDU"; "node" => %node, "error" => %e);
                return Ok(());
            }
        };
        if message_type != MessageType::NetworkPDU {
            trace!(self.logger, "ignoring proxy message"; "type" => ?message_type);
            return Ok(());
        }
        let identity = slot.identity;
        let incoming = match self.transport.decode_network(&pdu) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!(self.logger, "dropped network PDU"; "node" => %node, "error" => %e);
                return Ok(());
            }
        };
        if !identity.owns(incoming.header.src) {
            warn!(self.logger, "network PDU from a foreign source";
                "node" => %node, "src" => %incoming.header.src);
            return Ok(());
        }
        trace!(self.logger, "network PDU";
            "src" => %incoming.header.src, "seq" => incoming.header.seq.value());
        match incoming.pdu {
            lower::PDU::UnsegmentedControl(control) => {
                if control.opcode() != ControlOpcode::SegmentAck {
                    trace!(self.logger, "ignoring control message"; "opcode" => ?control.opcode());
                    return Ok(());
                }
                match SegmentAck::unpack(control.data()) {
                    Ok(ack) => self.handle_ack(node, &ack, now),
                    Err(e) => {
                        warn!(self.logger, "bad segment ack"; "node" => %node, "error" => %e);
                        Ok(())
                    }
                }
            }
            lower::PDU::UnsegmentedAccess(access) => {
                match EncryptedAccessPDU::from_bytes(
                    access.akf(),
                    access.aid(),
                    access.upper_pdu(),
                    MicSize::Small,
                ) {
                    Ok(upper) => {
                        let header = incoming.header;
                        self.handle_access(node, &header, incoming.iv_index, header.seq, &upper);
                        Ok(())
                    }
                    Err(e) => {
                        warn!(self.logger, "bad access PDU"; "node" => %node, "error" => %e);
                        Ok(())
                    }
                }
            }
            lower::PDU::SegmentedAccess(_) | lower::PDU::SegmentedControl(_) => {
                self.handle_segment(node, &incoming, now)
            }
        }
    }

    /// Abandons whatever `node` was doing and reports one `TransactionFailed`.
    /// # Errors
    /// `UnknownNode`
    pub fn on_incomplete_timer_expired(&mut self, node: UnicastAddress) -> Result<(), DispatchError> {
        let slot = slot_mut(&mut self.nodes, node)?;
        slot.state = MessageOperationState::Idle;
        slot.incoming.clear();
        warn!(self.logger, "incomplete timer expired"; "node" => %node);
        self.events.on_event(MeshEvent::TransactionFailed {
            node,
            incomplete_timer_expired: true,
        });
        Ok(())
    }

    /// Clears `node`'s operation, reassembly and timers. No events are raised.
    pub fn disconnect(&mut self, node: UnicastAddress) -> bool {
        match self.nodes.get_mut(&node) {
            Some(slot) => {
                slot.state = MessageOperationState::Idle;
                slot.incoming.clear();
                slot.proxy.reset();
                debug!(self.logger, "node disconnected"; "node" => %node);
                true
            }
            None => false,
        }
    }

    /// Earliest timer across every node.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.nodes
            .values()
            .flat_map(|slot| {
                let flight = slot.state.in_flight();
                slot.incoming
                    .next_deadline()
                    .into_iter()
                    .chain(flight.map(|f| f.deadline))
                    .chain(flight.and_then(|f| f.outgoing.next_deadline()))
            })
            .min()
    }

    /// Fires every timer due at `now`: incomplete timers, delayed Segment Acknowledgements and
    /// segment retransmissions.
    /// # Errors
    /// `Link`/`Transport` errors while writing. Remaining nodes are still processed.
    pub fn poll(&mut self, now: Instant) -> Result<(), DispatchError> {
        let mut result = Ok(());
        let nodes: Vec<UnicastAddress> = self.nodes.keys().copied().collect();
        for node in nodes {
            if let Err(e) = self.poll_node(node, now) {
                warn!(self.logger, "timer handling failed"; "node" => %node, "error" => %e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
    fn poll_node(&mut self, node: UnicastAddress, now: Instant) -> Result<(), DispatchError> {
        let slot = slot_mut(&mut self.nodes, node)?;
        let reassembly_expired = !slot.incoming.expire(now).is_empty();
        let flight_expired = slot.state.in_flight().map_or(false, |f| now >= f.deadline);
        if reassembly_expired || flight_expired {
            return self.on_incomplete_timer_expired(node);
        }
        let acks = slot.incoming.due_acks(now);
        let resend: Option<Vec<SegO>> = match slot.state.in_flight_mut() {
            Some(f) => {
                if f.outgoing.retransmit_due(now) {
                    Some(f.outgoing.pending_segments().map(|(seg_o, _)| seg_o).collect())
                } else {
                    None
                }
            }
            None => None,
        };
        for (src, ack) in acks {
            self.send_ack(node, src, &ack)?;
        }
        if let Some(segments) = resend {
            debug!(self.logger, "retransmitting"; "node" => %node, "segments" => segments.len());
            self.resend(node, &segments)?;
        }
        Ok(())
    }

    fn handle_ack(
        &mut self,
        node: UnicastAddress,
        ack: &SegmentAck,
        now: Instant,
    ) -> Result<(), DispatchError> {
        let slot = slot_mut(&mut self.nodes, node)?;
        let (outcome, acknowledged) = match slot.state.in_flight_mut() {
            Some(f) => (f.outgoing.apply_ack(ack, now), f.operation.is_acknowledged()),
            None => (AckOutcome::Ignored, false),
        };
        match outcome {
            AckOutcome::Complete if acknowledged => {
                debug!(self.logger, "segments acked, waiting for status"; "node" => %node);
                Ok(())
            }
            AckOutcome::Complete => {
                slot.state = MessageOperationState::Complete;
                info!(self.logger, "operation complete"; "node" => %node);
                self.events.on_event(MeshEvent::OperationComplete { node });
                Ok(())
            }
            AckOutcome::Resend(missing) => {
                debug!(self.logger, "resending missing segments";
                    "node" => %node, "segments" => missing.len());
                self.resend(node, &missing)
            }
            AckOutcome::Cancelled => {
                slot.state = MessageOperationState::Failed(FailureReason::Cancelled);
                warn!(self.logger, "node cancelled the transaction"; "node" => %node);
                self.events.on_event(MeshEvent::TransactionFailed {
                    node,
                    incomplete_timer_expired: false,
                });
                Ok(())
            }
            AckOutcome::Ignored => {
                trace!(self.logger, "ignoring segment ack";
                    "node" => %node, "seq_zero" => ack.seq_zero.value());
                Ok(())
            }
        }
    }

    fn handle_segment(
        &mut self,
        node: UnicastAddress,
        incoming: &IncomingPDU,
        now: Instant,
    ) -> Result<(), DispatchError> {
        let slot = slot_mut(&mut self.nodes, node)?;
        let outcome = match slot.incoming.insert(incoming, self.transport.config(), now) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(self.logger, "dropped segment"; "node" => %node, "error" => %e);
                return Ok(());
            }
        };
        if matches!(
            outcome,
            SegmentOutcome::Pending | SegmentOutcome::Complete { .. }
        ) {
            // Every new segment of a response restarts the operation's incomplete timer.
            let timeout = self.transport.config().incomplete_timeout;
            if let Some(f) = slot.state.in_flight_mut() {
                f.deadline = now + timeout;
            }
        }
        match outcome {
            SegmentOutcome::Complete {
                header,
                iv_index,
                seq_auth,
                upper_pdu,
                ack,
            } => {
                self.send_ack(node, header.src, &ack)?;
                match upper_pdu {
                    UpperPDU::Access(pdu) => {
                        self.handle_access(node, &header, iv_index, seq_auth, &pdu);
                    }
                    UpperPDU::Control(control) => {
                        trace!(self.logger, "ignoring control message"; "opcode" => ?control.opcode);
                    }
                }
                Ok(())
            }
            SegmentOutcome::Duplicate { src, ack } => self.send_ack(node, src, &ack),
            SegmentOutcome::Pending | SegmentOutcome::Stale => Ok(()),
        }
    }

    fn handle_access(
        &mut self,
        node: UnicastAddress,
        header: &net::Header,
        iv_index: IVIndex,
        seq_auth: SequenceNumber,
        pdu: &EncryptedAccessPDU,
    ) {
        let slot = match self.nodes.get_mut(&node) {
            Some(slot) => slot,
            None => return,
        };
        let message: AccessMessage =
            match self
                .transport
                .open_access(&slot.identity, header, iv_index, seq_auth, pdu)
            {
                Ok(message) => message,
                Err(e) => {
                    warn!(self.logger, "dropped access message"; "node" => %node, "error" => %e);
                    return;
                }
            };
        let expected = slot
            .state
            .in_flight()
            .and_then(|f| f.operation.expected_response());
        if let Some(expected) = expected {
            match StatusMessage::parse_expected(&message, expected) {
                Ok(Some(status)) => {
                    slot.state = MessageOperationState::Complete;
                    info!(self.logger, "status received";
                        "node" => %node, "opcode" => %message.opcode,
                        "success" => status.is_success());
                    self.events.on_event(MeshEvent::StatusReceived {
                        src: header.src,
                        status,
                    });
                    return;
                }
                Ok(None) => (),
                Err(e) => {
                    warn!(self.logger, "malformed status"; "node" => %node,
                        "opcode" => %message.opcode, "error" => %e);
                    return;
                }
            }
        }
        debug!(self.logger, "access message"; "src" => %header.src, "opcode" => %message.opcode);
        self.events.on_event(MeshEvent::AccessReceived {
            src: header.src,
            dst: header.dst,
            message,
        });
    }

    /// Resends `segments` of the in flight message, each with a new sequence number.
    fn resend(&mut self, node: UnicastAddress, segments: &[SegO]) -> Result<(), DispatchError> {
        let slot = slot_mut(&mut self.nodes, node)?;
        let outgoing = match slot.state.in_flight() {
            Some(f) => &f.outgoing,
            None => return Ok(()),
        };
        let mut pdus = Vec::with_capacity(segments.len());
        for &seg_o in segments {
            let pdu = outgoing.segment(seg_o).map_err(TransportError::from)?;
            let seq = self.transport.next_seq()?;
            pdus.push(self.transport.encode_network(outgoing.dst(), &pdu, seq)?);
        }
        let written = self.write_network(node, &pdus)?;
        if let Some(f) = slot_mut(&mut self.nodes, node)?.state.in_flight_mut() {
            f.unwritten.extend(written);
        }
        Ok(())
    }

    fn send_ack(
        &mut self,
        node: UnicastAddress,
        src: UnicastAddress,
        ack: &SegmentAck,
    ) -> Result<(), DispatchError> {
        trace!(self.logger, "segment ack";
            "src" => %src, "seq_zero" => ack.seq_zero.value(), "block_ack" => ack.block_ack.0);
        let pdu = self
            .transport
            .encode_control(Address::from(src), &ack.to_control_payload())?;
        self.write_network(node, &[pdu]).map(|_| ())
    }

    /// Frames Network PDUs into proxy PDUs and writes them to `node`'s link. Returns the writes.
    fn write_network(
        &mut self,
        node: UnicastAddress,
        pdus: &[Vec<u8>],
    ) -> Result<Vec<Vec<u8>>, DispatchError> {
        let mtu = self.link.mtu();
        let mut written = Vec::with_capacity(pdus.len());
        for pdu in pdus {
            for chunk in proxy::segment(MessageType::NetworkPDU, pdu, mtu)? {
                self.link.send(Address::from(node), &chunk)?;
                written.push(chunk);
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::crypto::key::AppKey;
    use crate::interface::testing::RecordingTransport;
    use crate::lower::BlockAck;
    use crate::mesh::{AppKeyIndex, KeyIndex, NetKeyIndex};
    use crate::models::config::{app_key, composition_data};
    use crate::models::generics::onoff;
    use crate::models::{MessageKey, PackableMessage, StatusCode};
    use crate::stack::tests::{message_6_credentials, message_6_node, transport};
    use crate::stack::SeqCounter;
    use core::time::Duration;
    use std::sync::Arc;

    const NODE: u16 = 0x1201;
    const APP_KEY_INDEX: u16 = 0x456;

    type Dispatcher = MessageDispatcher<RecordingTransport, Vec<MeshEvent>>;

    fn node() -> UnicastAddress {
        UnicastAddress::new(NODE)
    }
    fn app_key() -> AppKey {
        AppKey::from_hex("63964771734fbd76e3b40519d1d94a48").unwrap()
    }
    fn dispatcher() -> Dispatcher {
        let mut transport = transport(0x000100);
        transport.add_app_key(AppKeyIndex(KeyIndex::new(APP_KEY_INDEX)), app_key());
        let mut dispatcher = MessageDispatcher::new(
            None,
            transport,
            RecordingTransport::new(66),
            Vec::new(),
        );
        dispatcher.add_node(message_6_node());
        dispatcher
    }
    /// The node's side of the link.
    struct Peer {
        transport: MeshTransport,
        provisioner: NodeIdentity,
    }
    impl Peer {
        fn new() -> Self {
            let mut transport = MeshTransport::new(
                crate::discard_logger(),
                TransportConfig::default(),
                node(),
                message_6_node().iv_index,
                message_6_credentials(),
                Arc::new(SeqCounter::new(SequenceNumber::new(0x000400))),
            );
            transport.add_app_key(AppKeyIndex(KeyIndex::new(APP_KEY_INDEX)), app_key());
            Self {
                transport,
                provisioner: NodeIdentity {
                    address: UnicastAddress::new(0x0003),
                    ..message_6_node()
                },
            }
        }
        /// Proxy PDUs carrying `message` to the provisioner.
        fn frames(&self, message: &AccessMessage) -> Vec<Vec<u8>> {
            let dst = Address::from(0x0003);
            let prepared = self
                .transport
                .prepare_access(&self.provisioner, dst, message, MessageKey::Device)
                .unwrap();
            prepared
                .segmenter
                .iter(BlockAck::default())
                .enumerate()
                .map(|(i, (_, pdu))| {
                    let seq = prepared.seqs.nth(i as u32).unwrap();
                    let mut frame = vec![0x00];
                    frame.extend(self.transport.encode_network(dst, &pdu, seq).unwrap());
                    frame
                })
                .collect()
        }
        fn ack_frame(&self, ack: SegmentAck) -> Vec<u8> {
            let mut frame = vec![0x00];
            frame.extend(
                self.transport
                    .encode_control(Address::from(0x0003), &ack.to_control_payload())
                    .unwrap(),
            );
            frame
        }
        /// Decodes a proxy PDU the dispatcher wrote.
        fn decode(&self, frame: &[u8]) -> IncomingPDU {
            assert_eq!(frame[0], 0x00, "expected a complete Network PDU");
            self.transport.decode_network(&frame[1..]).unwrap()
        }
    }
    fn sent(dispatcher: &mut Dispatcher) -> Vec<Vec<u8>> {
        dispatcher
            .link_mut()
            .take()
            .into_iter()
            .map(|(dst, bytes)| {
                assert_eq!(dst, Address::from(NODE));
                bytes
            })
            .collect()
    }
    fn app_key_add() -> Operation {
        Operation::AppKeyAdd(app_key::Add {
            net_key_index: NetKeyIndex(KeyIndex::new(0x123)),
            app_key_index: AppKeyIndex(KeyIndex::new(APP_KEY_INDEX)),
            app_key: app_key(),
        })
    }
    fn composition_status() -> AccessMessage {
        composition_data::Status {
            page_number: 0,
            data: hex::decode("0c001a0001000800030000000201000000100c003412").unwrap(),
        }
        .to_access_message()
        .unwrap()
    }

    #[test]
    fn test_status_completes_operation() {
        let now = Instant::now();
        let mut dispatcher = dispatcher();
        let peer = Peer::new();
        dispatcher
            .send(node(), Operation::CompositionDataGet(composition_data::Get(0)), now)
            .unwrap();
        let writes = sent(&mut dispatcher);
        assert_eq!(writes.len(), 1);
        let pdu = peer.decode(&writes[0]);
        assert!(!pdu.pdu.is_seg());
        assert_eq!(pdu.header.src, UnicastAddress::new(0x0003));
        assert!(dispatcher.state(node()).unwrap().is_busy());
        assert_eq!(
            dispatcher.send(node(), Operation::DefaultTTLGet, now),
            Err(DispatchError::Busy)
        );

        let frames = peer.frames(&composition_status());
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            dispatcher.on_notification(node(), frame, now).unwrap();
        }
        // One Segment Acknowledgement covering all three segments.
        let writes = sent(&mut dispatcher);
        assert_eq!(writes.len(), 1);
        match peer.decode(&writes[0]).pdu {
            lower::PDU::UnsegmentedControl(control) => {
                let ack = SegmentAck::unpack(control.data()).unwrap();
                assert_eq!(ack.block_ack, BlockAck(0b111));
            }
            other => panic!("expected a segment ack, got {:?}", other),
        }
        match dispatcher.events().as_slice() {
            [MeshEvent::StatusReceived {
                src,
                status: StatusMessage::CompositionData(status),
            }] => {
                assert_eq!(*src, node());
                assert_eq!(status.page0().unwrap().elements.len(), 1);
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(
            dispatcher.state(node()),
            Some(&MessageOperationState::Complete)
        );
        dispatcher.send(node(), Operation::DefaultTTLGet, now).unwrap();
    }
    #[test]
    fn test_resends_only_missing_segments() {
        let now = Instant::now();
        let mut dispatcher = dispatcher();
        let peer = Peer::new();
        dispatcher.send(node(), app_key_add(), now).unwrap();
        let writes = sent(&mut dispatcher);
        assert_eq!(writes.len(), 2);
        let first = peer.decode(&writes[0]);
        let seq_zero = first.pdu.segment_header().unwrap().seq_zero;
        assert_eq!(seq_zero.value(), 0x0100);

        dispatcher
            .on_notification(node(), &peer.ack_frame(SegmentAck::new(seq_zero, BlockAck(0b01))), now)
            .unwrap();
        let writes = sent(&mut dispatcher);
        assert_eq!(writes.len(), 1);
        let resent = peer.decode(&writes[0]);
        let header = resent.pdu.segment_header().unwrap();
        assert_eq!(header.seg_o, SegO::new(1));
        assert_eq!(header.seq_zero, seq_zero);
        assert_eq!(resent.header.seq, SequenceNumber::new(0x000102));

        dispatcher
            .on_notification(node(), &peer.ack_frame(SegmentAck::new(seq_zero, BlockAck(0b11))), now)
            .unwrap();
        assert!(sent(&mut dispatcher).is_empty());
        // Acked, but AppKey Add still waits for its status.
        assert!(dispatcher.state(node()).unwrap().is_busy());
        assert!(dispatcher.events().is_empty());

        let status = app_key::Status {
            status_code: StatusCode::Success,
            net_key_index: NetKeyIndex(KeyIndex::new(0x123)),
            app_key_index: AppKeyIndex(KeyIndex::new(APP_KEY_INDEX)),
        }
        .to_access_message()
        .unwrap();
        let frames = peer.frames(&status);
        assert_eq!(frames.len(), 1);
        dispatcher.on_notification(node(), &frames[0], now).unwrap();
        match dispatcher.events().as_slice() {
            [MeshEvent::StatusReceived { status, .. }] => assert!(status.is_success()),
            other => panic!("unexpected events {:?}", other),
        }
    }
    #[test]
    fn test_unacknowledged_completes_on_write() {
        let now = Instant::now();
        let mut dispatcher = dispatcher();
        let set = onoff::Set {
            on_off: true,
            tid: 7,
            transition: None,
        };
        dispatcher
            .send(
                node(),
                Operation::GenericOnOffSetUnacknowledged(
                    AppKeyIndex(KeyIndex::new(APP_KEY_INDEX)),
                    set,
                ),
                now,
            )
            .unwrap();
        let writes = sent(&mut dispatcher);
        assert_eq!(writes.len(), 1);
        dispatcher.on_write_complete(node(), &[0x00, 0x01]).unwrap();
        assert!(dispatcher.events().is_empty());
        dispatcher.on_write_complete(node(), &writes[0]).unwrap();
        assert_eq!(
            dispatcher.events().as_slice(),
            &[MeshEvent::OperationComplete { node: node() }]
        );
        assert_eq!(
            dispatcher.state(node()),
            Some(&MessageOperationState::Complete)
        );
    }
    #[test]
    fn test_incomplete_timer_fails_once() {
        let now = Instant::now();
        let mut dispatcher = dispatcher();
        let peer = Peer::new();
        let operation = Operation::CompositionDataGet(composition_data::Get(0));
        dispatcher.send(node(), operation.clone(), now).unwrap();
        let frames = peer.frames(&composition_status());
        // The last segment never arrives.
        dispatcher.on_notification(node(), &frames[0], now).unwrap();
        dispatcher.on_notification(node(), &frames[1], now).unwrap();
        dispatcher.poll(now + Duration::from_secs(1)).unwrap();
        assert!(dispatcher.events().is_empty());

        let expired = now + Duration::from_secs(11);
        assert!(dispatcher.next_deadline().unwrap() <= expired);
        dispatcher.poll(expired).unwrap();
        dispatcher.poll(expired + Duration::from_secs(10)).unwrap();
        assert_eq!(
            dispatcher.events().as_slice(),
            &[MeshEvent::TransactionFailed {
                node: node(),
                incomplete_timer_expired: true,
            }]
        );
        assert_eq!(dispatcher.state(node()), Some(&MessageOperationState::Idle));
        assert_eq!(dispatcher.next_deadline(), None);
        dispatcher.send(node(), operation, expired).unwrap();
    }
    #[test]
    fn test_segments_restart_incomplete_timer() {
        let now = Instant::now();
        let mut dispatcher = dispatcher();
        let peer = Peer::new();
        dispatcher
            .send(node(), Operation::CompositionDataGet(composition_data::Get(0)), now)
            .unwrap();
        let frames = peer.frames(&composition_status());
        assert_eq!(frames.len(), 3);
        dispatcher
            .on_notification(node(), &frames[0], now + Duration::from_secs(8))
            .unwrap();
        dispatcher
            .on_notification(node(), &frames[1], now + Duration::from_secs(9))
            .unwrap();
        dispatcher.poll(now + Duration::from_millis(10_500)).unwrap();
        assert!(dispatcher.events().is_empty());
        assert!(dispatcher.state(node()).unwrap().is_busy());

        dispatcher
            .on_notification(node(), &frames[2], now + Duration::from_millis(10_600))
            .unwrap();
        match dispatcher.events().as_slice() {
            [MeshEvent::StatusReceived {
                status: StatusMessage::CompositionData(_),
                ..
            }] => (),
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(
            dispatcher.state(node()),
            Some(&MessageOperationState::Complete)
        );
    }
    #[test]
    fn test_retransmits_on_timer() {
        let now = Instant::now();
        let mut dispatcher = dispatcher();
        let peer = Peer::new();
        dispatcher.send(node(), app_key_add(), now).unwrap();
        let first = sent(&mut dispatcher);
        let interval = TransportConfig::default().retransmit_interval;
        assert_eq!(dispatcher.next_deadline(), Some(now + interval));
        dispatcher.poll(now + interval).unwrap();
        let resent = sent(&mut dispatcher);
        assert_eq!(resent.len(), 2);
        // Same segments, new sequence numbers.
        for (old, new) in first.iter().zip(&resent) {
            let old = peer.decode(old);
            let new = peer.decode(new);
            assert_eq!(old.pdu, new.pdu);
            assert!(new.header.seq > old.header.seq);
        }
    }
    #[test]
    fn test_timer_skips_acked_segments() {
        let now = Instant::now();
        let mut dispatcher = dispatcher();
        let peer = Peer::new();
        dispatcher.send(node(), app_key_add(), now).unwrap();
        let seq_zero = peer.decode(&sent(&mut dispatcher)[0])
            .pdu
            .segment_header()
            .unwrap()
            .seq_zero;
        dispatcher
            .on_notification(node(), &peer.ack_frame(SegmentAck::new(seq_zero, BlockAck(0b01))), now)
            .unwrap();
        assert_eq!(sent(&mut dispatcher).len(), 1);

        let interval = TransportConfig::default().retransmit_interval;
        dispatcher.poll(now + interval).unwrap();
        let resent = sent(&mut dispatcher);
        assert_eq!(resent.len(), 1);
        let header = *peer.decode(&resent[0]).pdu.segment_header().unwrap();
        assert_eq!(header.seg_o, SegO::new(1));
    }
    #[test]
    fn test_cancelled_by_node() {
        let now = Instant::now();
        let mut dispatcher = dispatcher();
        let peer = Peer::new();
        dispatcher.send(node(), app_key_add(), now).unwrap();
        let header = *peer.decode(&sent(&mut dispatcher)[0]).pdu.segment_header().unwrap();
        dispatcher
            .on_notification(
                node(),
                &peer.ack_frame(SegmentAck::new(header.seq_zero, BlockAck(0))),
                now,
            )
            .unwrap();
        assert_eq!(
            dispatcher.events().as_slice(),
            &[MeshEvent::TransactionFailed {
                node: node(),
                incomplete_timer_expired: false,
            }]
        );
        assert_eq!(
            dispatcher.state(node()),
            Some(&MessageOperationState::Failed(FailureReason::Cancelled))
        );
    }
    #[test]
    fn test_drops_noise_and_disconnects() {
        let now = Instant::now();
        let mut dispatcher = dispatcher();
        let peer = Peer::new();
        dispatcher.send(node(), app_key_add(), now).unwrap();
        let mut frame = peer.frames(&composition_status()).remove(0);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        dispatcher.on_notification(node(), &frame, now).unwrap();
        dispatcher.on_notification(node(), &[], now).unwrap();
        assert!(dispatcher.events().is_empty());
        assert!(dispatcher.state(node()).unwrap().is_busy());
        assert_eq!(
            dispatcher.on_notification(UnicastAddress::new(0x0777), &frame, now),
            Err(DispatchError::UnknownNode(UnicastAddress::new(0x0777)))
        );

        let other = NodeIdentity {
            address: UnicastAddress::new(0x2000),
            ..message_6_node()
        };
        dispatcher.add_node(other);
        dispatcher.send(other.address, app_key_add(), now).unwrap();
        assert!(dispatcher.disconnect(node()));
        assert_eq!(dispatcher.state(node()), Some(&MessageOperationState::Idle));
        assert!(dispatcher.state(other.address).unwrap().is_busy());
        assert!(dispatcher.events().is_empty());
    }
    #[test]
    fn test_link_failure() {
        let now = Instant::now();
        let mut dispatcher = dispatcher();
        dispatcher.link_mut().fail = true;
        assert_eq!(
            dispatcher.send(node(), Operation::NodeReset, now),
            Err(DispatchError::Link(LinkError::Closed))
        );
        assert_eq!(
            dispatcher.state(node()),
            Some(&MessageOperationState::Failed(FailureReason::Link(
                LinkError::Closed
            )))
        );
    }
}
