//! Payload producers and parsers for the messages the dispatcher sends and expects back.
use crate::access::{AccessMessage, Opcode};

pub mod config;
pub mod generics;
pub mod operation;

pub use operation::{MessageKey, Operation, StatusMessage};

/// Error when trying to pack a message into a byte buffer.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, thiserror::Error)]
pub enum MessagePackError {
    /// Byte Buffer too small to fit the whole message.
    #[error("buffer too small for message")]
    SmallBuffer,
    /// Incoming Byte Buffer length doesn't make sense.
    #[error("bad message length")]
    BadLength,
    /// Incoming Byte Buffer creates an invalid message.
    #[error("bad message bytes")]
    BadBytes,
    /// Message can't be packed because the object is in a bad state.
    #[error("message in a bad state")]
    BadState,
}

/// An Access Message that can be packed into a (little endian) byte buffer.
/// If a message comes in that matches `Opcode`, the dispatcher will try to decode it with
/// `PackableMessage::unpack_from`.
pub trait PackableMessage: Sized {
    fn opcode() -> Opcode;
    /// Bytes need to fit the entire message in bytes (excluding opcode).
    fn message_size(&self) -> usize;
    /// Pack the message into the byte buffer (without the opcode). If the length of the buffer is
    /// too small or the object is in a bad state, return `MessagePackError`.
    fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError>;
    /// Unpack the message from the byte buffer (without the opcode). Make sure to check for a valid
    /// message or return a `MessagePackError` otherwise.
    fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError>;

    /// # Errors
    /// Whatever `pack_into` reports.
    fn to_access_message(&self) -> Result<AccessMessage, MessagePackError> {
        let mut parameters = vec![0_u8; self.message_size()];
        self.pack_into(&mut parameters)?;
        Ok(AccessMessage::new(Self::opcode(), parameters))
    }
    /// # Errors
    /// `BadBytes` if the opcode doesn't match, otherwise whatever `unpack_from` reports.
    fn from_access_message(message: &AccessMessage) -> Result<Self, MessagePackError> {
        if message.opcode != Self::opcode() {
            return Err(MessagePackError::BadBytes);
        }
        Self::unpack_from(&message.parameters)
    }
}

/// Foundation model status codes carried by every configuration status message.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum StatusCode {
    Success,
    InvalidAddress,
    InvalidModel,
    InvalidAppKeyIndex,
    InvalidNetKeyIndex,
    InsufficientResources,
    KeyIndexAlreadyStored,
    InvalidPublishParameters,
    NotASubscribeModel,
    StorageFailure,
    FeatureNotSupported,
    CannotUpdate,
    CannotRemove,
    CannotBind,
    TemporarilyUnableToChangeState,
    CannotSet,
    UnspecifiedError,
    InvalidBinding,
    /// RFU
    Unknown(u8),
}
impl StatusCode {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, StatusCode::Success)
    }
}
impl From<u8> for StatusCode {
    fn from(b: u8) -> Self {
        match b {
            0x00 => StatusCode::Success,
            0x01 => StatusCode::InvalidAddress,
            0x02 => StatusCode::InvalidModel,
            0x03 => StatusCode::InvalidAppKeyIndex,
            0x04 => StatusCode::InvalidNetKeyIndex,
            0x05 => StatusCode::InsufficientResources,
            0x06 => StatusCode::KeyIndexAlreadyStored,
            0x07 => StatusCode::InvalidPublishParameters,
            0x08 => StatusCode::NotASubscribeModel,
            0x09 => StatusCode::StorageFailure,
            0x0A => StatusCode::FeatureNotSupported,
            0x0B => StatusCode::CannotUpdate,
            0x0C => StatusCode::CannotRemove,
            0x0D => StatusCode::CannotBind,
            0x0E => StatusCode::TemporarilyUnableToChangeState,
            0x0F => StatusCode::CannotSet,
            0x10 => StatusCode::UnspecifiedError,
            0x11 => StatusCode::InvalidBinding,
            b => StatusCode::Unknown(b),
        }
    }
}
impl From<StatusCode> for u8 {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::Success => 0x00,
            StatusCode::InvalidAddress => 0x01,
            StatusCode::InvalidModel => 0x02,
            StatusCode::InvalidAppKeyIndex => 0x03,
            StatusCode::InvalidNetKeyIndex => 0x04,
            StatusCode::InsufficientResources => 0x05,
            StatusCode::KeyIndexAlreadyStored => 0x06,
            StatusCode::InvalidPublishParameters => 0x07,
            StatusCode::NotASubscribeModel => 0x08,
            StatusCode::StorageFailure => 0x09,
            StatusCode::FeatureNotSupported => 0x0A,
            StatusCode::CannotUpdate => 0x0B,
            StatusCode::CannotRemove => 0x0C,
            StatusCode::CannotBind => 0x0D,
            StatusCode::TemporarilyUnableToChangeState => 0x0E,
            StatusCode::CannotSet => 0x0F,
            StatusCode::UnspecifiedError => 0x10,
            StatusCode::InvalidBinding => 0x11,
            StatusCode::Unknown(b) => b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_bytes() {
        for b in 0..=0x20_u8 {
            assert_eq!(u8::from(StatusCode::from(b)), b);
        }
        assert!(StatusCode::from(0).is_success());
        assert_eq!(StatusCode::from(0x12), StatusCode::Unknown(0x12));
    }
}
