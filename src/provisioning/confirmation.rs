//! Confirmation (commit/reveal) math for the provisioning handshake.
use crate::crypto::aes::AESCipher;
use crate::crypto::key::ConfirmationKey;
use crate::crypto::{s1, ECDHSecret, ProvisioningSalt, Salt, Secret};
use crate::provisioning::protocol::{
    self, Capabilities, Confirmation, Invite, ProtocolPDU, PublicKey, Random, Start,
};

/// The five PDUs both sides hash into the `ConfirmationSalt`, in handshake order.
pub struct Inputs {
    pub invite: Invite,
    pub capabilities: Capabilities,
    pub start: Start,
    pub provisioner_public_key: PublicKey,
    pub device_public_key: PublicKey,
}

const CAPABILITIES_POS: usize = 1;
const START_POS: usize = CAPABILITIES_POS + 11;
const PROV_KEY_POS: usize = START_POS + 5;
const DEVICE_KEY_POS: usize = PROV_KEY_POS + protocol::KEY_COMPONENT_LEN * 2;
pub const INPUT_LEN: usize = DEVICE_KEY_POS + protocol::KEY_COMPONENT_LEN * 2;

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub struct ConfirmationSalt(pub Salt);
impl Inputs {
    /// `Invite || Capabilities || Start || PublicKeyProvisioner || PublicKeyDevice` (145 bytes),
    /// parameters only.
    /// # Errors
    /// Anything the PDUs' `pack` reports (a `Capabilities` in an impossible state).
    pub fn to_bytes(&self) -> Result<[u8; INPUT_LEN], protocol::ProtocolPDUError> {
        let mut buf = [0_u8; INPUT_LEN];
        self.invite.pack(&mut buf[..CAPABILITIES_POS])?;
        self.capabilities
            .pack(&mut buf[CAPABILITIES_POS..START_POS])?;
        self.start.pack(&mut buf[START_POS..PROV_KEY_POS])?;
        self.provisioner_public_key
            .pack(&mut buf[PROV_KEY_POS..DEVICE_KEY_POS])?;
        self.device_public_key
            .pack(&mut buf[DEVICE_KEY_POS..INPUT_LEN])?;
        Ok(buf)
    }
    /// # Errors
    /// See [`Inputs::to_bytes`].
    pub fn salt(&self) -> Result<ConfirmationSalt, protocol::ProtocolPDUError> {
        Ok(ConfirmationSalt(s1(&self.to_bytes()?)))
    }
}
impl ConfirmationSalt {
    #[must_use]
    pub fn confirmation_key(&self, secret: &ECDHSecret) -> ConfirmationKey {
        ConfirmationKey::from_salt_and_secret(self.0, secret)
    }
    /// `s1(ConfirmationSalt || RandomProvisioner || RandomDevice)`
    #[must_use]
    pub fn provisioning_salt(
        &self,
        provisioner_random: &Random,
        device_random: &Random,
    ) -> ProvisioningSalt {
        let mut buf = [0_u8; 16 * 3];
        buf[..16].copy_from_slice(self.0.as_ref());
        buf[16..32].copy_from_slice(&provisioner_random.0);
        buf[32..].copy_from_slice(&device_random.0);
        ProvisioningSalt(s1(&buf))
    }
}

pub const AUTH_VALUE_LEN: usize = 16;
/// 16 byte authentication value mixed into both confirmations. Zeroized on drop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthValue(Secret<AUTH_VALUE_LEN>);
impl AuthValue {
    /// No OOB authentication: all zeros.
    #[must_use]
    pub fn zero() -> AuthValue {
        AuthValue(Secret::new([0_u8; AUTH_VALUE_LEN]))
    }
    /// Static OOB value, used as is.
    #[must_use]
    pub fn from_static(value: [u8; AUTH_VALUE_LEN]) -> AuthValue {
        AuthValue(Secret::new(value))
    }
    /// Numeric OOB (blink/beep/vibrate count, or digits). Big endian, right aligned.
    #[must_use]
    pub fn from_numeric(value: u32) -> AuthValue {
        let mut out = [0_u8; AUTH_VALUE_LEN];
        out[AUTH_VALUE_LEN - 4..].copy_from_slice(&value.to_be_bytes());
        AuthValue(Secret::new(out))
    }
    /// Alphanumeric OOB. ASCII, zero padded on the right. `None` if longer than 16 bytes or not
    /// ASCII.
    #[must_use]
    pub fn from_alphanumeric(value: &str) -> Option<AuthValue> {
        if !value.is_ascii() || value.len() > AUTH_VALUE_LEN {
            return None;
        }
        let mut out = [0_u8; AUTH_VALUE_LEN];
        out[..value.len()].copy_from_slice(value.as_bytes());
        Some(AuthValue(Secret::new(out)))
    }
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; AUTH_VALUE_LEN] {
        self.0.expose()
    }
}
/// `CMAC_ConfirmationKey(Random || AuthValue)`
#[must_use]
pub fn confirmation_value(
    key: &ConfirmationKey,
    random: &Random,
    auth_value: &AuthValue,
) -> Confirmation {
    Confirmation(
        AESCipher::new(*key.key())
            .cmac_slice(&[&random.0[..], &auth_value.as_bytes()[..]])
            .to_bytes(),
    )
}
