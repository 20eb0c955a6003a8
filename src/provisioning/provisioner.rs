//! Provisioner side of the provisioning handshake.
//!
//! `Invite -> Capabilities -> Start + PublicKey -> PublicKey -> [OOB] -> Confirmation ->
//! Random -> Data -> Complete`. Every stage is entered once. Any failure ends the handshake for
//! good; the caller starts a new [`Provisioner`] from the Invite.
//!
//! Like the message dispatcher, the provisioner never blocks and owns no clock. Entry points take
//! `now` and [`Provisioner::poll`] enforces the protocol timeout.
use crate::address::{Address, UnicastAddress, UNICAST_MAX};
use crate::config::{AuthPreference, ProvisioningConfig};
use crate::crypto::ecdh::{self, EcdhError};
use crate::crypto::key::{ConfirmationKey, DevKey};
use crate::crypto::materials::NetworkCredentials;
use crate::crypto::{CryptoError, ECDHSecret};
use crate::interface::{EventSink, LinkError, MeshEvent, OOBValue, OutboundTransport};
use crate::mesh::{ElementCount, IVIndex};
use crate::provisioning::confirmation::{self, AuthValue, ConfirmationSalt, Inputs};
use crate::provisioning::data::{ProvisioningData, SessionSecurityMaterials};
use crate::provisioning::protocol::{
    Algorithm, AttentionTimer, AuthenticationMethod, Capabilities, Confirmation, ErrorCode,
    InputOOBAction, Invite, OOBSize, OutputOOBAction, ProtocolPDUError, PublicKey,
    PublicKeyType, Random, Start, PDU,
};
use crate::proxy::{self, MessageType, ProxyError, ProxyReassembler};
use crate::random;
use crate::stack::NodeIdentity;
use core::time::Duration;
use std::time::Instant;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Handshake abandoned if the device stays silent this long.
pub const PROTOCOL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, thiserror::Error)]
pub enum ProvisioningError {
    /// Handshake over. Either the device sent `Failed` or a local check tripped.
    #[error("provisioning failed with {0}")]
    Failed(ErrorCode),
    #[error("not possible in the current stage")]
    BadStage,
    #[error("device capabilities rejected")]
    InvalidCapabilities,
    #[error("no authentication method fits the device capabilities")]
    UnsupportedAuthentication,
    #[error("device stopped answering")]
    TimedOut,
    #[error(transparent)]
    Protocol(#[from] ProtocolPDUError),
    #[error(transparent)]
    Ecdh(#[from] EcdhError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

/// Where the handshake is. `Failed` carries the code reported in
/// [`MeshEvent::ProvisioningFailed`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Stage {
    Idle,
    Invited,
    KeyExchange,
    AwaitingOutputOOB,
    AwaitingInputComplete,
    Confirming,
    Revealing,
    DataSent,
    Complete,
    Failed(ErrorCode),
}

struct Negotiation {
    invite: Invite,
    capabilities: Capabilities,
    start: Start,
}

/// Secrets of one handshake. Wiped when the handshake ends either way.
struct Session {
    element_count: ElementCount,
    secret: ECDHSecret,
    salt: ConfirmationSalt,
    confirmation_key: ConfirmationKey,
    auth_value: AuthValue,
    random: Random,
}
impl Drop for Session {
    fn drop(&mut self) {
        self.confirmation_key.zeroize();
        self.random.0.zeroize();
    }
}

enum State {
    Idle,
    Invited(Invite),
    KeyExchange {
        negotiation: Negotiation,
        private_key: ecdh::PrivateKey,
        public_key: PublicKey,
    },
    AwaitingOutputOOB(Box<Session>),
    AwaitingInputComplete(Box<Session>),
    Confirming(Box<Session>),
    Revealing(Box<Session>, Confirmation),
    DataSent(NodeIdentity),
    Complete(NodeIdentity),
    Failed(ErrorCode),
}

pub struct Provisioner<T: OutboundTransport, E: EventSink> {
    logger: slog::Logger,
    config: ProvisioningConfig,
    credentials: NetworkCredentials,
    iv_index: IVIndex,
    address: UnicastAddress,
    link: T,
    events: E,
    proxy: ProxyReassembler,
    state: State,
    deadline: Option<Instant>,
}
impl<T: OutboundTransport, E: EventSink> Provisioner<T, E> {
    /// Provisioner that hands `credentials` and the primary address `address` to the device on
    /// the other end of `link`.
    #[must_use]
    pub fn new(
        logger: impl Into<Option<slog::Logger>>,
        config: ProvisioningConfig,
        credentials: NetworkCredentials,
        iv_index: IVIndex,
        address: UnicastAddress,
        link: T,
        events: E,
    ) -> Self {
        Self {
            logger: logger.into().unwrap_or_else(crate::discard_logger),
            config,
            credentials,
            iv_index,
            address,
            link,
            events,
            proxy: ProxyReassembler::new(),
            state: State::Idle,
            deadline: None,
        }
    }
    #[must_use]
    pub fn stage(&self) -> Stage {
        match &self.state {
            State::Idle => Stage::Idle,
            State::Invited(_) => Stage::Invited,
            State::KeyExchange { .. } => Stage::KeyExchange,
            State::AwaitingOutputOOB(_) => Stage::AwaitingOutputOOB,
            State::AwaitingInputComplete(_) => Stage::AwaitingInputComplete,
            State::Confirming(_) => Stage::Confirming,
            State::Revealing(_, _) => Stage::Revealing,
            State::DataSent(_) => Stage::DataSent,
            State::Complete(_) => Stage::Complete,
            State::Failed(code) => Stage::Failed(*code),
        }
    }
    /// The new node, once the device confirmed the Provisioning Data.
    #[must_use]
    pub fn node_identity(&self) -> Option<NodeIdentity> {
        match &self.state {
            State::Complete(identity) => Some(*identity),
            _ => None,
        }
    }
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(
            self.state,
            State::Idle | State::Complete(_) | State::Failed(_)
        )
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
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }
    /// Sends the Invite. Only valid once, on a fresh provisioner.
    /// # Errors
    /// `BadStage` if already started. Link errors end the handshake.
    pub fn invite(&mut self, now: Instant) -> Result<(), ProvisioningError> {
        if !matches!(self.state, State::Idle) {
            return Err(ProvisioningError::BadStage);
        }
        let invite = Invite(AttentionTimer(self.config.attention_timer));
        info!(self.logger, "inviting device";
            "attention_timer" => self.config.attention_timer, "address" => %self.address);
        self.deadline = Some(now + PROTOCOL_TIMEOUT);
        self.send(&PDU::Invite(invite))?;
        self.state = State::Invited(invite);
        Ok(())
    }
    /// Feeds one proxy PDU received from the device.
    /// # Errors
    /// `BadStage` if no handshake is running. Otherwise every error ends the handshake and is
    /// also reported as [`MeshEvent::ProvisioningFailed`].
    pub fn on_notification(&mut self, bytes: &[u8], now: Instant) -> Result<(), ProvisioningError> {
        if !self.is_active() {
            return Err(ProvisioningError::BadStage);
        }
        let (message_type, bytes) = match self.proxy.push(bytes) {
            Ok(Some(complete)) => complete,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!(self.logger, "bad proxy PDU"; "error" => %e);
                return Ok(());
            }
        };
        if message_type != MessageType::ProvisioningPDU {
            trace!(self.logger, "ignoring proxy message"; "type" => ?message_type);
            return Ok(());
        }
        let pdu = match PDU::from_bytes(&bytes) {
            Ok(pdu) => pdu,
            Err(ProtocolPDUError::ZeroElements) => {
                return self.fail(ErrorCode::InvalidFormat, ProvisioningError::InvalidCapabilities)
            }
            Err(e @ ProtocolPDUError::BadOpcode(_)) => {
                return self.fail(ErrorCode::InvalidPDU, e.into())
            }
            Err(e) => return self.fail(ErrorCode::InvalidFormat, e.into()),
        };
        trace!(self.logger, "provisioning PDU received"; "opcode" => ?pdu.opcode());
        self.deadline = Some(now + PROTOCOL_TIMEOUT);
        self.handle(pdu)
    }
    /// Answers [`MeshEvent::OutputOOBRequested`] with the value the device output.
    /// # Errors
    /// `BadStage` unless the provisioner is waiting for it. Link errors end the handshake.
    pub fn provide_auth_value(
        &mut self,
        auth_value: AuthValue,
        now: Instant,
    ) -> Result<(), ProvisioningError> {
        match core::mem::replace(&mut self.state, State::Idle) {
            State::AwaitingOutputOOB(mut session) => {
                session.auth_value = auth_value;
                self.deadline = Some(now + PROTOCOL_TIMEOUT);
                self.send_confirmation(session)
            }
            other => {
                self.state = other;
                Err(ProvisioningError::BadStage)
            }
        }
    }
    /// Fails the handshake if the device has been silent for [`PROTOCOL_TIMEOUT`].
    /// # Errors
    /// `TimedOut` when the timeout fires.
    pub fn poll(&mut self, now: Instant) -> Result<(), ProvisioningError> {
        match self.deadline {
            Some(deadline) if now >= deadline && self.is_active() => {
                self.fail(ErrorCode::UnexpectedError, ProvisioningError::TimedOut)
            }
            _ => Ok(()),
        }
    }
    fn handle(&mut self, pdu: PDU) -> Result<(), ProvisioningError> {
        if let PDU::Failed(failed) = pdu {
            return self.fail(failed.0, ProvisioningError::Failed(failed.0));
        }
        match (core::mem::replace(&mut self.state, State::Idle), pdu) {
            (State::Invited(invite), PDU::Capabilities(capabilities)) => {
                self.on_capabilities(invite, capabilities)
            }
            (
                State::KeyExchange {
                    negotiation,
                    private_key,
                    public_key,
                },
                PDU::PublicKey(device_public_key),
            ) => self.on_public_key(negotiation, private_key, public_key, device_public_key),
            (State::AwaitingInputComplete(session), PDU::InputComplete(_)) => {
                debug!(self.logger, "device input complete");
                self.send_confirmation(session)
            }
            (State::Confirming(session), PDU::Confirmation(device_confirmation)) => {
                self.send(&PDU::Random(session.random))?;
                self.state = State::Revealing(session, device_confirmation);
                Ok(())
            }
            (State::Revealing(session, device_confirmation), PDU::Random(device_random)) => {
                self.on_device_random(&session, device_confirmation, device_random)
            }
            (State::DataSent(identity), PDU::Complete(_)) => {
                info!(self.logger, "provisioning complete";
                    "address" => %identity.address, "elements" => identity.element_count.0);
                self.state = State::Complete(identity);
                self.deadline = None;
                self.events
                    .on_event(MeshEvent::ProvisioningComplete(identity));
                Ok(())
            }
            (_, pdu) => {
                warn!(self.logger, "unexpected provisioning PDU"; "opcode" => ?pdu.opcode());
                self.fail(
                    ErrorCode::UnexpectedPDU,
                    ProvisioningError::Failed(ErrorCode::UnexpectedPDU),
                )
            }
        }
    }
    fn on_capabilities(
        &mut self,
        invite: Invite,
        capabilities: Capabilities,
    ) -> Result<(), ProvisioningError> {
        debug!(self.logger, "capabilities";
            "elements" => capabilities.num_elements.0,
            "static_oob" => capabilities.static_oob,
            "output_oob" => capabilities.output_oob_actions.0,
            "input_oob" => capabilities.input_oob_actions.0);
        if !capabilities.algorithms.supports_p256() {
            return self.fail(ErrorCode::InvalidFormat, ProvisioningError::InvalidCapabilities);
        }
        let last_address =
            u32::from(self.address.value()) + u32::from(capabilities.num_elements.0) - 1;
        if last_address > u32::from(UNICAST_MAX) {
            return self.fail(
                ErrorCode::CannotAssignAddresses,
                ProvisioningError::Failed(ErrorCode::CannotAssignAddresses),
            );
        }
        let auth_method = match select_auth_method(&self.config.auth_preference, &capabilities) {
            Some(method) => method,
            None => {
                return self.fail(
                    ErrorCode::UnexpectedError,
                    ProvisioningError::UnsupportedAuthentication,
                )
            }
        };
        let start = Start {
            algorithm: Algorithm::FIPSP256,
            public_key_type: PublicKeyType::NoOOB,
            auth_method,
        };
        let key_pair = ecdh::PrivateKey::new().and_then(|private_key| {
            let public_key = private_key.public_key()?;
            Ok((private_key, public_key))
        });
        let (private_key, public_key) = match key_pair {
            Ok(pair) => pair,
            Err(e) => return self.fail(ErrorCode::OutOfResources, e.into()),
        };
        debug!(self.logger, "starting"; "auth_method" => ?auth_method);
        self.send(&PDU::Start(start))?;
        self.send(&PDU::PublicKey(public_key))?;
        self.state = State::KeyExchange {
            negotiation: Negotiation {
                invite,
                capabilities,
                start,
            },
            private_key,
            public_key,
        };
        Ok(())
    }
    fn on_public_key(
        &mut self,
        negotiation: Negotiation,
        private_key: ecdh::PrivateKey,
        provisioner_public_key: PublicKey,
        device_public_key: PublicKey,
    ) -> Result<(), ProvisioningError> {
        if device_public_key == provisioner_public_key {
            warn!(self.logger, "device reflected our public key");
            return self.fail(ErrorCode::InvalidFormat, EcdhError::InvalidPublicKey.into());
        }
        let secret = match private_key.agree(&device_public_key) {
            Ok(secret) => secret,
            Err(e) => return self.fail(ErrorCode::InvalidFormat, e.into()),
        };
        let inputs = Inputs {
            invite: negotiation.invite,
            capabilities: negotiation.capabilities,
            start: negotiation.start,
            provisioner_public_key,
            device_public_key,
        };
        let salt = match inputs.salt() {
            Ok(salt) => salt,
            Err(e) => return self.fail(ErrorCode::UnexpectedError, e.into()),
        };
        let auth_value = match &self.config.auth_preference {
            AuthPreference::Static(value) => value.clone(),
            _ => AuthValue::zero(),
        };
        let mut session = Box::new(Session {
            element_count: negotiation.capabilities.num_elements,
            confirmation_key: salt.confirmation_key(&secret),
            secret,
            salt,
            auth_value,
            random: Random(random::secure_16_bytes()),
        });
        match negotiation.start.auth_method {
            AuthenticationMethod::NoOOB | AuthenticationMethod::StaticOOB => {
                self.send_confirmation(session)
            }
            AuthenticationMethod::OutputOOB(action, size) => {
                debug!(self.logger, "waiting for output OOB value";
                    "action" => ?action, "size" => size.value());
                self.state = State::AwaitingOutputOOB(session);
                self.events
                    .on_event(MeshEvent::OutputOOBRequested { action, size });
                Ok(())
            }
            AuthenticationMethod::InputOOB(action, size) => {
                let (value, auth_value) = input_oob_value(action, size);
                session.auth_value = auth_value;
                debug!(self.logger, "waiting for input complete";
                    "action" => ?action, "size" => size.value());
                self.state = State::AwaitingInputComplete(session);
                self.events
                    .on_event(MeshEvent::InputOOBDisplay { action, value });
                Ok(())
            }
        }
    }
    fn send_confirmation(&mut self, session: Box<Session>) -> Result<(), ProvisioningError> {
        let confirmation = confirmation::confirmation_value(
            &session.confirmation_key,
            &session.random,
            &session.auth_value,
        );
        self.send(&PDU::Confirmation(confirmation))?;
        self.state = State::Confirming(session);
        Ok(())
    }
    /// The device's Confirmation is only checked now that its Random is revealed. Nothing derived
    /// from the session leaves the provisioner unless it matches.
    fn on_device_random(
        &mut self,
        session: &Session,
        device_confirmation: Confirmation,
        device_random: Random,
    ) -> Result<(), ProvisioningError> {
        let expected = confirmation::confirmation_value(
            &session.confirmation_key,
            &device_random,
            &session.auth_value,
        );
        if !bool::from(expected.0[..].ct_eq(&device_confirmation.0[..])) {
            return self.fail(
                ErrorCode::ConfirmationFailed,
                ProvisioningError::Failed(ErrorCode::ConfirmationFailed),
            );
        }
        let provisioning_salt = session
            .salt
            .provisioning_salt(&session.random, &device_random);
        let materials =
            SessionSecurityMaterials::from_secret_salt(&session.secret, &provisioning_salt);
        let data = ProvisioningData {
            net_key: *self.credentials.net_key(),
            net_key_index: self.credentials.index(),
            flags: self.credentials.flags(),
            iv_index: self.iv_index,
            element_address: self.address,
        };
        let encrypted = match data.encrypt(&materials) {
            Ok(encrypted) => encrypted,
            Err(e) => return self.fail(ErrorCode::UnexpectedError, e.into()),
        };
        self.send(&PDU::Data(encrypted))?;
        let identity = NodeIdentity {
            address: self.address,
            element_count: session.element_count,
            device_key: DevKey::from_salt_and_secret(&provisioning_salt, &session.secret),
            net_key_index: self.credentials.index(),
            iv_index: self.iv_index,
        };
        debug!(self.logger, "provisioning data sent"; "address" => %self.address);
        self.state = State::DataSent(identity);
        Ok(())
    }
    /// Frames `pdu` for the link. A write failure ends the handshake.
    fn send(&mut self, pdu: &PDU) -> Result<(), ProvisioningError> {
        let mtu = self.link.mtu();
        let link = &mut self.link;
        let result = proxy::segment(MessageType::ProvisioningPDU, &pdu.to_bytes(), mtu)
            .map_err(ProvisioningError::from)
            .and_then(|chunks| {
                chunks
                    .iter()
                    .try_for_each(|chunk| link.send(Address::Unassigned, chunk))
                    .map_err(ProvisioningError::from)
            });
        match result {
            Ok(()) => {
                trace!(self.logger, "provisioning PDU sent"; "opcode" => ?pdu.opcode());
                Ok(())
            }
            Err(e) => self.fail(ErrorCode::UnexpectedError, e),
        }
    }
    /// Ends the handshake. Dropping the state wipes the session secrets.
    fn fail(&mut self, error_code: ErrorCode, error: ProvisioningError) -> Result<(), ProvisioningError> {
        warn!(self.logger, "provisioning failed"; "error_code" => %error_code, "error" => %error);
        self.state = State::Failed(error_code);
        self.deadline = None;
        self.proxy.reset();
        self.events
            .on_event(MeshEvent::ProvisioningFailed { error_code });
        Err(error)
    }
}

/// Picks the Start authentication method. `None` if the preference can't be met.
fn select_auth_method(
    preference: &AuthPreference,
    capabilities: &Capabilities,
) -> Option<AuthenticationMethod> {
    let output = || {
        let size = capabilities.output_oob_size?;
        OutputOOBAction::ALL
            .iter()
            .copied()
            .find(|action| capabilities.output_oob_actions.supports(*action))
            .map(|action| AuthenticationMethod::OutputOOB(action, size))
    };
    let input = || {
        let size = capabilities.input_oob_size?;
        InputOOBAction::ALL
            .iter()
            .copied()
            .find(|action| capabilities.input_oob_actions.supports(*action))
            .map(|action| AuthenticationMethod::InputOOB(action, size))
    };
    match preference {
        AuthPreference::NoOOB => Some(AuthenticationMethod::NoOOB),
        AuthPreference::Static(_) if capabilities.static_oob => {
            Some(AuthenticationMethod::StaticOOB)
        }
        AuthPreference::Static(_) => None,
        AuthPreference::Output => output(),
        AuthPreference::Input => input(),
        AuthPreference::Auto => output()
            .or_else(input)
            .or(Some(AuthenticationMethod::NoOOB)),
    }
}

const ALPHANUMERIC: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random value for the user to enter on the device, and the matching `AuthValue`.
fn input_oob_value(action: InputOOBAction, size: OOBSize) -> (OOBValue, AuthValue) {
    match action {
        InputOOBAction::InputAlphanumeric => {
            let value: String = (0..size.value())
                .map(|_| {
                    char::from(ALPHANUMERIC[random::secure_below(ALPHANUMERIC.len() as u32) as usize])
                })
                .collect();
            let auth_value =
                AuthValue::from_alphanumeric(&value).expect("at most 8 ascii characters");
            (OOBValue::Alphanumeric(value), auth_value)
        }
        InputOOBAction::InputNumber => {
            let value = random::secure_below(10_u32.pow(u32::from(size.value())));
            (OOBValue::Numeric(value), AuthValue::from_numeric(value))
        }
        InputOOBAction::Push | InputOOBAction::Twist => {
            // Counts start at 1.
            let value = 1 + random::secure_below(10_u32.pow(u32::from(size.value())) - 1);
            (OOBValue::Numeric(value), AuthValue::from_numeric(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key::NetKey;
    use crate::interface::testing::RecordingTransport;
    use crate::mesh::{KeyIndex, NetKeyIndex};
    use crate::provisioning::data::Flags;
    use crate::provisioning::protocol::{
        Complete, Failed, InputComplete, InputOOBActions, Opcode, OutputOOBActions,
    };

    const MTU: usize = 20;

    type TestProvisioner = Provisioner<RecordingTransport, Vec<MeshEvent>>;

    fn credentials() -> NetworkCredentials {
        NetworkCredentials::new(
            NetKey::from_hex("7dd7364cd842ad18c17c2b820c84c3d6").unwrap(),
            NetKeyIndex(KeyIndex::new(0x0123)),
            Flags::default(),
        )
    }
    fn provisioner(auth_preference: AuthPreference, address: u16) -> TestProvisioner {
        Provisioner::new(
            None,
            ProvisioningConfig::new(5, auth_preference),
            credentials(),
            IVIndex(0x1234_5678),
            UnicastAddress::new(address),
            RecordingTransport::new(MTU),
            Vec::new(),
        )
    }

    /// Unprovisioned device answering the provisioner.
    struct Device {
        capabilities: Capabilities,
        auth_value: AuthValue,
        /// Check the provisioner's confirmation before revealing the random.
        verify_provisioner: bool,
        private_key: Option<ecdh::PrivateKey>,
        public_key: PublicKey,
        random: Random,
        proxy: ProxyReassembler,
        invite: Option<Invite>,
        start: Option<Start>,
        secret: Option<ECDHSecret>,
        salt: Option<ConfirmationSalt>,
        provisioner_confirmation: Option<Confirmation>,
        provisioner_random: Option<Random>,
        received: Option<ProvisioningData>,
        device_key: Option<DevKey>,
    }
    impl Device {
        fn new(capabilities: Capabilities, auth_value: AuthValue) -> Self {
            let private_key = ecdh::PrivateKey::new().unwrap();
            let public_key = private_key.public_key().unwrap();
            Device {
                capabilities,
                auth_value,
                verify_provisioner: true,
                private_key: Some(private_key),
                public_key,
                random: Random(random::secure_16_bytes()),
                proxy: ProxyReassembler::new(),
                invite: None,
                start: None,
                secret: None,
                salt: None,
                provisioner_confirmation: None,
                provisioner_random: None,
                received: None,
                device_key: None,
            }
        }
        fn confirmation_key(&self) -> ConfirmationKey {
            self.salt
                .unwrap()
                .confirmation_key(self.secret.as_ref().unwrap())
        }
        fn respond(&mut self, pdu: PDU) -> Vec<PDU> {
            match pdu {
                PDU::Invite(invite) => {
                    self.invite = Some(invite);
                    vec![PDU::Capabilities(self.capabilities)]
                }
                PDU::Start(start) => {
                    self.start = Some(start);
                    vec![]
                }
                PDU::PublicKey(provisioner_public_key) => {
                    let secret = self
                        .private_key
                        .take()
                        .unwrap()
                        .agree(&provisioner_public_key)
                        .unwrap();
                    let inputs = Inputs {
                        invite: self.invite.unwrap(),
                        capabilities: self.capabilities,
                        start: self.start.unwrap(),
                        provisioner_public_key,
                        device_public_key: self.public_key,
                    };
                    self.salt = Some(inputs.salt().unwrap());
                    self.secret = Some(secret);
                    vec![PDU::PublicKey(self.public_key)]
                }
                PDU::Confirmation(confirmation) => {
                    self.provisioner_confirmation = Some(confirmation);
                    vec![PDU::Confirmation(confirmation::confirmation_value(
                        &self.confirmation_key(),
                        &self.random,
                        &self.auth_value,
                    ))]
                }
                PDU::Random(provisioner_random) => {
                    let expected = confirmation::confirmation_value(
                        &self.confirmation_key(),
                        &provisioner_random,
                        &self.auth_value,
                    );
                    if self.verify_provisioner && Some(expected) != self.provisioner_confirmation {
                        return vec![PDU::Failed(Failed(ErrorCode::ConfirmationFailed))];
                    }
                    self.provisioner_random = Some(provisioner_random);
                    vec![PDU::Random(self.random)]
                }
                PDU::Data(encrypted) => {
                    let salt = self
                        .salt
                        .unwrap()
                        .provisioning_salt(&self.provisioner_random.unwrap(), &self.random);
                    let secret = self.secret.as_ref().unwrap();
                    let materials = SessionSecurityMaterials::from_secret_salt(secret, &salt);
                    self.received = Some(ProvisioningData::decrypt(&materials, &encrypted).unwrap());
                    self.device_key = Some(DevKey::from_salt_and_secret(&salt, secret));
                    vec![PDU::Complete(Complete)]
                }
                other => panic!("device got {:?}", other),
            }
        }
    }

    fn notify(
        provisioner: &mut TestProvisioner,
        pdu: &PDU,
        now: Instant,
    ) -> Result<(), ProvisioningError> {
        for chunk in proxy::segment(MessageType::ProvisioningPDU, &pdu.to_bytes(), MTU).unwrap() {
            provisioner.on_notification(&chunk, now)?;
        }
        Ok(())
    }
    /// Runs the link until the provisioner stops writing. Returns every PDU it wrote.
    fn exchange(provisioner: &mut TestProvisioner, device: &mut Device, now: Instant) -> Vec<PDU> {
        let mut written = Vec::new();
        loop {
            let sent = provisioner.link_mut().take();
            if sent.is_empty() {
                return written;
            }
            let mut responses = Vec::new();
            for (dst, chunk) in sent {
                assert_eq!(dst, Address::Unassigned);
                if let Some((message_type, bytes)) = device.proxy.push(&chunk).unwrap() {
                    assert_eq!(message_type, MessageType::ProvisioningPDU);
                    let pdu = PDU::from_bytes(&bytes).unwrap();
                    written.push(pdu);
                    responses.extend(device.respond(pdu));
                }
            }
            for pdu in responses {
                // Failures show up in the stage and the events.
                let _ = notify(provisioner, &pdu, now);
            }
        }
    }
    fn opcodes(pdus: &[PDU]) -> Vec<Opcode> {
        pdus.iter().map(PDU::opcode).collect()
    }

    #[test]
    fn test_no_oob_handshake() {
        let now = Instant::now();
        let mut device = Device::new(Capabilities::minimal(ElementCount(2)), AuthValue::zero());
        let mut provisioner = provisioner(AuthPreference::Auto, 0x1201);
        provisioner.invite(now).unwrap();
        let written = exchange(&mut provisioner, &mut device, now);
        assert_eq!(
            opcodes(&written),
            vec![
                Opcode::Invite,
                Opcode::Start,
                Opcode::PublicKey,
                Opcode::Confirmation,
                Opcode::Random,
                Opcode::Data,
            ]
        );
        assert_eq!(provisioner.stage(), Stage::Complete);
        assert_eq!(device.invite, Some(Invite(AttentionTimer(5))));
        assert_eq!(
            device.start.unwrap().auth_method,
            AuthenticationMethod::NoOOB
        );

        let identity = provisioner.node_identity().unwrap();
        assert_eq!(identity.address, UnicastAddress::new(0x1201));
        assert_eq!(identity.element_count, ElementCount(2));
        assert_eq!(identity.iv_index, IVIndex(0x1234_5678));
        assert_eq!(Some(identity.device_key), device.device_key);
        assert_eq!(
            provisioner.events(),
            &vec![MeshEvent::ProvisioningComplete(identity)]
        );
        assert_eq!(provisioner.next_deadline(), None);

        let data = device.received.unwrap();
        assert_eq!(data.net_key, *credentials().net_key());
        assert_eq!(data.net_key_index, credentials().index());
        assert_eq!(data.iv_index, IVIndex(0x1234_5678));
        assert_eq!(data.element_address, UnicastAddress::new(0x1201));
    }
    #[test]
    fn test_static_oob() {
        let now = Instant::now();
        let value = [0x5c; 16];
        let mut capabilities = Capabilities::minimal(ElementCount(1));
        capabilities.static_oob = true;
        let mut device = Device::new(capabilities, AuthValue::from_static(value));
        let mut provisioner = provisioner(AuthPreference::Static(AuthValue::from_static(value)), 0x0010);
        provisioner.invite(now).unwrap();
        exchange(&mut provisioner, &mut device, now);
        assert_eq!(provisioner.stage(), Stage::Complete);
        assert_eq!(
            device.start.unwrap().auth_method,
            AuthenticationMethod::StaticOOB
        );
        assert!(device.received.is_some());
    }
    #[test]
    fn test_static_oob_unsupported_by_device() {
        let now = Instant::now();
        let mut device = Device::new(Capabilities::minimal(ElementCount(1)), AuthValue::zero());
        let mut provisioner =
            provisioner(AuthPreference::Static(AuthValue::from_static([1; 16])), 0x0010);
        provisioner.invite(now).unwrap();
        let written = exchange(&mut provisioner, &mut device, now);
        assert_eq!(opcodes(&written), vec![Opcode::Invite]);
        assert_eq!(
            provisioner.stage(),
            Stage::Failed(ErrorCode::UnexpectedError)
        );
        assert_eq!(
            provisioner.events(),
            &vec![MeshEvent::ProvisioningFailed {
                error_code: ErrorCode::UnexpectedError
            }]
        );
    }
    #[test]
    fn test_output_oob() {
        let now = Instant::now();
        let mut capabilities = Capabilities::minimal(ElementCount(1));
        capabilities.output_oob_size = Some(OOBSize::new(4));
        capabilities.output_oob_actions = OutputOOBActions(1 << 3);
        let mut device = Device::new(capabilities, AuthValue::from_numeric(4821));
        let mut provisioner = provisioner(AuthPreference::Output, 0x0200);
        provisioner.invite(now).unwrap();
        let written = exchange(&mut provisioner, &mut device, now);
        assert_eq!(
            opcodes(&written),
            vec![Opcode::Invite, Opcode::Start, Opcode::PublicKey]
        );
        assert_eq!(provisioner.stage(), Stage::AwaitingOutputOOB);
        assert_eq!(
            provisioner.events(),
            &vec![MeshEvent::OutputOOBRequested {
                action: OutputOOBAction::OutputNumeric,
                size: OOBSize::new(4),
            }]
        );

        provisioner
            .provide_auth_value(AuthValue::from_numeric(4821), now)
            .unwrap();
        let written = exchange(&mut provisioner, &mut device, now);
        assert_eq!(
            opcodes(&written),
            vec![Opcode::Confirmation, Opcode::Random, Opcode::Data]
        );
        assert_eq!(provisioner.stage(), Stage::Complete);
        assert_eq!(
            provisioner.provide_auth_value(AuthValue::zero(), now),
            Err(ProvisioningError::BadStage)
        );
    }
    #[test]
    fn test_input_oob() {
        let now = Instant::now();
        let mut capabilities = Capabilities::minimal(ElementCount(3));
        capabilities.input_oob_size = Some(OOBSize::new(6));
        capabilities.input_oob_actions = InputOOBActions(1 << 2);
        let mut device = Device::new(capabilities, AuthValue::zero());
        let mut provisioner = provisioner(AuthPreference::Auto, 0x0300);
        provisioner.invite(now).unwrap();
        exchange(&mut provisioner, &mut device, now);
        assert_eq!(provisioner.stage(), Stage::AwaitingInputComplete);
        let value = match provisioner.events().as_slice() {
            [MeshEvent::InputOOBDisplay {
                action: InputOOBAction::InputNumber,
                value: OOBValue::Numeric(value),
            }] => *value,
            other => panic!("unexpected events {:?}", other),
        };
        assert!(value < 1_000_000);

        // The user types the value on the device.
        device.auth_value = AuthValue::from_numeric(value);
        notify(&mut provisioner, &PDU::InputComplete(InputComplete), now).unwrap();
        let written = exchange(&mut provisioner, &mut device, now);
        assert_eq!(
            opcodes(&written),
            vec![Opcode::Confirmation, Opcode::Random, Opcode::Data]
        );
        assert_eq!(provisioner.stage(), Stage::Complete);
        assert_eq!(
            provisioner.node_identity().unwrap().element_count,
            ElementCount(3)
        );
    }
    #[test]
    fn test_confirmation_mismatch_never_sends_data() {
        let now = Instant::now();
        let mut capabilities = Capabilities::minimal(ElementCount(1));
        capabilities.output_oob_size = Some(OOBSize::new(4));
        capabilities.output_oob_actions = OutputOOBActions(1 << 3);
        let mut device = Device::new(capabilities, AuthValue::from_numeric(1111));
        // Reveals its random without checking ours, so the provisioner's check is the one that
        // trips.
        device.verify_provisioner = false;
        let mut provisioner = provisioner(AuthPreference::Output, 0x0200);
        provisioner.invite(now).unwrap();
        exchange(&mut provisioner, &mut device, now);
        provisioner
            .provide_auth_value(AuthValue::from_numeric(2222), now)
            .unwrap();
        let written = exchange(&mut provisioner, &mut device, now);
        assert_eq!(
            opcodes(&written),
            vec![Opcode::Confirmation, Opcode::Random]
        );
        assert_eq!(
            provisioner.stage(),
            Stage::Failed(ErrorCode::ConfirmationFailed)
        );
        assert_eq!(
            provisioner.events().last(),
            Some(&MeshEvent::ProvisioningFailed {
                error_code: ErrorCode::ConfirmationFailed
            })
        );
        assert!(device.received.is_none());
        assert!(provisioner.node_identity().is_none());
    }
    #[test]
    fn test_device_rejects_confirmation() {
        let now = Instant::now();
        let mut capabilities = Capabilities::minimal(ElementCount(1));
        capabilities.static_oob = true;
        let mut device = Device::new(capabilities, AuthValue::from_static([1; 16]));
        let mut provisioner =
            provisioner(AuthPreference::Static(AuthValue::from_static([2; 16])), 0x0200);
        provisioner.invite(now).unwrap();
        let written = exchange(&mut provisioner, &mut device, now);
        assert!(!opcodes(&written).contains(&Opcode::Data));
        assert_eq!(
            provisioner.stage(),
            Stage::Failed(ErrorCode::ConfirmationFailed)
        );
    }
    #[test]
    fn test_zero_elements() {
        let now = Instant::now();
        let mut provisioner = provisioner(AuthPreference::Auto, 0x0200);
        provisioner.invite(now).unwrap();
        provisioner.link_mut().take();
        let mut bytes = PDU::Capabilities(Capabilities::minimal(ElementCount(1))).to_bytes();
        bytes[1] = 0;
        let chunks = proxy::segment(MessageType::ProvisioningPDU, &bytes, MTU).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            provisioner.on_notification(&chunks[0], now),
            Err(ProvisioningError::InvalidCapabilities)
        );
        assert_eq!(provisioner.stage(), Stage::Failed(ErrorCode::InvalidFormat));
        assert!(provisioner.link().sent.is_empty());
    }
    #[test]
    fn test_cannot_assign_addresses() {
        let now = Instant::now();
        let mut provisioner = provisioner(AuthPreference::Auto, 0x7FFF);
        provisioner.invite(now).unwrap();
        provisioner.link_mut().take();
        assert_eq!(
            notify(
                &mut provisioner,
                &PDU::Capabilities(Capabilities::minimal(ElementCount(2))),
                now
            ),
            Err(ProvisioningError::Failed(ErrorCode::CannotAssignAddresses))
        );
        assert!(provisioner.link().sent.is_empty());
        assert_eq!(
            provisioner.events(),
            &vec![MeshEvent::ProvisioningFailed {
                error_code: ErrorCode::CannotAssignAddresses
            }]
        );
    }
    #[test]
    fn test_unexpected_pdu() {
        let now = Instant::now();
        let mut provisioner = provisioner(AuthPreference::Auto, 0x0200);
        provisioner.invite(now).unwrap();
        assert_eq!(
            notify(&mut provisioner, &PDU::Random(Random([3; 16])), now),
            Err(ProvisioningError::Failed(ErrorCode::UnexpectedPDU))
        );
        assert_eq!(provisioner.stage(), Stage::Failed(ErrorCode::UnexpectedPDU));
        assert_eq!(
            notify(&mut provisioner, &PDU::Complete(Complete), now),
            Err(ProvisioningError::BadStage)
        );
        assert_eq!(provisioner.events().len(), 1);
    }
    #[test]
    fn test_reflected_public_key() {
        let now = Instant::now();
        let mut provisioner = provisioner(AuthPreference::Auto, 0x0200);
        provisioner.invite(now).unwrap();
        provisioner.link_mut().take();
        notify(
            &mut provisioner,
            &PDU::Capabilities(Capabilities::minimal(ElementCount(1))),
            now,
        )
        .unwrap();
        let mut reassembler = ProxyReassembler::new();
        let ours = provisioner
            .link_mut()
            .take()
            .into_iter()
            .filter_map(|(_, chunk)| reassembler.push(&chunk).unwrap())
            .find_map(|(_, bytes)| match PDU::from_bytes(&bytes).unwrap() {
                PDU::PublicKey(key) => Some(key),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            notify(&mut provisioner, &PDU::PublicKey(ours), now),
            Err(ProvisioningError::Ecdh(EcdhError::InvalidPublicKey))
        );
        assert_eq!(provisioner.stage(), Stage::Failed(ErrorCode::InvalidFormat));
        assert!(provisioner.link_mut().take().is_empty());
        assert_eq!(
            provisioner.events(),
            &vec![MeshEvent::ProvisioningFailed {
                error_code: ErrorCode::InvalidFormat
            }]
        );
    }
    #[test]
    fn test_device_failed() {
        let now = Instant::now();
        let mut provisioner = provisioner(AuthPreference::Auto, 0x0200);
        provisioner.invite(now).unwrap();
        assert_eq!(
            notify(
                &mut provisioner,
                &PDU::Failed(Failed(ErrorCode::OutOfResources)),
                now
            ),
            Err(ProvisioningError::Failed(ErrorCode::OutOfResources))
        );
        assert_eq!(
            provisioner.events(),
            &vec![MeshEvent::ProvisioningFailed {
                error_code: ErrorCode::OutOfResources
            }]
        );
    }
    #[test]
    fn test_timeout() {
        let now = Instant::now();
        let mut provisioner = provisioner(AuthPreference::Auto, 0x0200);
        assert_eq!(provisioner.poll(now), Ok(()));
        provisioner.invite(now).unwrap();
        assert_eq!(
            provisioner.invite(now),
            Err(ProvisioningError::BadStage)
        );
        assert_eq!(provisioner.next_deadline(), Some(now + PROTOCOL_TIMEOUT));
        assert_eq!(provisioner.poll(now + Duration::from_secs(59)), Ok(()));
        assert_eq!(
            provisioner.poll(now + PROTOCOL_TIMEOUT),
            Err(ProvisioningError::TimedOut)
        );
        assert_eq!(
            provisioner.stage(),
            Stage::Failed(ErrorCode::UnexpectedError)
        );
        assert_eq!(provisioner.next_deadline(), None);
    }
    #[test]
    fn test_input_oob_values() {
        for _ in 0..16 {
            let (value, auth_value) =
                input_oob_value(InputOOBAction::InputAlphanumeric, OOBSize::new(8));
            match value {
                OOBValue::Alphanumeric(s) => {
                    assert_eq!(s.len(), 8);
                    assert!(s.bytes().all(|b| ALPHANUMERIC.contains(&b)));
                    assert_eq!(Some(auth_value), AuthValue::from_alphanumeric(&s));
                }
                other => panic!("unexpected {:?}", other),
            }
            match input_oob_value(InputOOBAction::Push, OOBSize::new(1)).0 {
                OOBValue::Numeric(n) => assert!((1..10).contains(&n)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
