//! Boundaries to the outside world. The link (usually a GATT proxy connection) implements
//! [`OutboundTransport`] and the application implements [`EventSink`].
use crate::access::AccessMessage;
use crate::address::{Address, UnicastAddress};
use crate::models::StatusMessage;
use crate::provisioning::protocol::{ErrorCode, InputOOBAction, OOBSize, OutputOOBAction};
use crate::stack::NodeIdentity;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, thiserror::Error)]
pub enum LinkError {
    #[error("link closed")]
    Closed,
    #[error("link write failed")]
    WriteFailed,
}

/// Byte pipe to the radio. Calls return once the bytes are queued; the link reports the actual
/// write through the `on_write_complete` callbacks.
pub trait OutboundTransport {
    /// Queues one write of `bytes` (never longer than [`OutboundTransport::mtu`]) to `node`.
    /// `Address::Unassigned` during provisioning.
    /// # Errors
    /// Returns `LinkError` if the link can't take the write.
    fn send(&mut self, node: Address, bytes: &[u8]) -> Result<(), LinkError>;
    /// Max bytes per write.
    fn mtu(&self) -> usize;
}
impl<T: OutboundTransport + ?Sized> OutboundTransport for &mut T {
    fn send(&mut self, node: Address, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).send(node, bytes)
    }
    fn mtu(&self) -> usize {
        (**self).mtu()
    }
}
impl<T: OutboundTransport + ?Sized> OutboundTransport for Box<T> {
    fn send(&mut self, node: Address, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).send(node, bytes)
    }
    fn mtu(&self) -> usize {
        (**self).mtu()
    }
}

/// Value the provisioner shows the user for Input OOB. The user enters it on the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OOBValue {
    Numeric(u32),
    Alphanumeric(String),
}

/// Everything the engine pushes back to the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshEvent {
    /// The device accepted the Provisioning Data.
    ProvisioningComplete(NodeIdentity),
    /// Handshake aborted. `error_code` came from the device or describes the local failure.
    ProvisioningFailed { error_code: ErrorCode },
    /// The device will output a value. Answer with `Provisioner::provide_auth_value`.
    OutputOOBRequested {
        action: OutputOOBAction,
        size: OOBSize,
    },
    /// Show `value` to the user for entry on the device.
    InputOOBDisplay {
        action: InputOOBAction,
        value: OOBValue,
    },
    /// Expected status message of the current operation.
    StatusReceived {
        src: UnicastAddress,
        status: StatusMessage,
    },
    /// Access message nothing was waiting for.
    AccessReceived {
        src: UnicastAddress,
        dst: Address,
        message: AccessMessage,
    },
    /// The current operation finished without a status (unacknowledged or segments acked).
    OperationComplete { node: UnicastAddress },
    /// Transaction abandoned. `incomplete_timer_expired` is set when the incomplete timer fired,
    /// clear when the peer cancelled it.
    TransactionFailed {
        node: UnicastAddress,
        incomplete_timer_expired: bool,
    },
}
pub trait EventSink {
    fn on_event(&mut self, event: MeshEvent);
}
impl<E: EventSink + ?Sized> EventSink for &mut E {
    fn on_event(&mut self, event: MeshEvent) {
        (**self).on_event(event)
    }
}
impl EventSink for Vec<MeshEvent> {
    fn on_event(&mut self, event: MeshEvent) {
        self.push(event)
    }
}

/// Test doubles shared by the stateful modules' tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every write. `fail` makes every `send` fail.
    #[derive(Clone, Debug, Default)]
    pub struct RecordingTransport {
        pub sent: Vec<(Address, Vec<u8>)>,
        pub mtu: usize,
        pub fail: bool,
    }
    impl RecordingTransport {
        pub fn new(mtu: usize) -> Self {
            Self {
                sent: Vec::new(),
                mtu,
                fail: false,
            }
        }
        pub fn take(&mut self) -> Vec<(Address, Vec<u8>)> {
            core::mem::take(&mut self.sent)
        }
    }
    impl OutboundTransport for RecordingTransport {
        fn send(&mut self, node: Address, bytes: &[u8]) -> Result<(), LinkError> {
            if self.fail {
                return Err(LinkError::Closed);
            }
            assert!(bytes.len() <= self.mtu, "write bigger than mtu");
            self.sent.push((node, bytes.to_vec()));
            Ok(())
        }
        fn mtu(&self) -> usize {
            self.mtu
        }
    }
}
