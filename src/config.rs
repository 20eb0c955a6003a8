//! Engine configuration. Everything has a `Default` matching the Mesh Profile recommendations.
use crate::mesh::TTL;
use crate::provisioning::confirmation::AuthValue;
use core::time::Duration;

/// Lower/Upper transport timing and framing knobs.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportConfig {
    /// TTL of every originated Network PDU.
    pub default_ttl: TTL,
    /// Incomplete timer. A transaction (outgoing or incoming) that isn't finished before this
    /// fires is abandoned.
    pub incomplete_timeout: Duration,
    /// Base of the receiver acknowledgement delay. `ack_delay_per_ttl * TTL` is added.
    pub ack_delay: Duration,
    pub ack_delay_per_ttl: Duration,
    /// Time between resends of unacknowledged segments.
    pub retransmit_interval: Duration,
    pub max_retransmits: u8,
    /// Use the 8 byte TransMIC for segmented access messages.
    pub big_trans_mic: bool,
}
impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            default_ttl: TTL::new(10),
            incomplete_timeout: Duration::from_secs(10),
            ack_delay: Duration::from_millis(150),
            ack_delay_per_ttl: Duration::from_millis(50),
            retransmit_interval: Duration::from_millis(500),
            max_retransmits: 4,
            big_trans_mic: false,
        }
    }
}
impl TransportConfig {
    /// `ack_delay + ack_delay_per_ttl * ttl`
    #[must_use]
    pub fn ack_delay_for(&self, ttl: TTL) -> Duration {
        self.ack_delay + self.ack_delay_per_ttl * u32::from(ttl.value())
    }
}

/// How the provisioner picks the authentication method from the device's capabilities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthPreference {
    /// Output OOB if offered, then input OOB, then no OOB. Static OOB needs the value, so it is
    /// only used through `Static`.
    Auto,
    NoOOB,
    Static(AuthValue),
    Output,
    Input,
}
impl Default for AuthPreference {
    fn default() -> Self {
        AuthPreference::Auto
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisioningConfig {
    /// Attention timer (seconds) sent in the Invite.
    pub attention_timer: u8,
    pub auth_preference: AuthPreference,
}
impl Default for ProvisioningConfig {
    fn default() -> Self {
        ProvisioningConfig::new(5, AuthPreference::Auto)
    }
}
impl ProvisioningConfig {
    #[must_use]
    pub fn new(attention_timer: u8, auth_preference: AuthPreference) -> Self {
        Self {
            attention_timer,
            auth_preference,
        }
    }
}
