//! Operations the dispatcher can run against a node and the status messages they expect back.
use crate::access::{AccessMessage, Opcode};
use crate::mesh::AppKeyIndex;
use crate::models::config::{
    app_key, composition_data, default_ttl, model_app, model_publication, model_subscription,
    node_reset, ConfigOpcode,
};
use crate::models::generics::{level, onoff};
use crate::models::{MessagePackError, PackableMessage, StatusCode};
use core::convert::TryFrom;

/// Which key the Upper Transport encrypts the operation with.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum MessageKey {
    Device,
    App(AppKeyIndex),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Operation {
    CompositionDataGet(composition_data::Get),
    AppKeyAdd(app_key::Add),
    ModelAppBind(model_app::Bind),
    ModelAppUnbind(model_app::Unbind),
    ModelPublicationSet(model_publication::Set),
    ModelSubscriptionAdd(model_subscription::Add),
    ModelSubscriptionDelete(model_subscription::Delete),
    NodeReset,
    DefaultTTLGet,
    DefaultTTLSet(default_ttl::Set),
    GenericOnOffGet(AppKeyIndex),
    GenericOnOffSet(AppKeyIndex, onoff::Set),
    GenericOnOffSetUnacknowledged(AppKeyIndex, onoff::Set),
    GenericLevelGet(AppKeyIndex),
    GenericLevelSet(AppKeyIndex, level::Set),
    GenericLevelSetUnacknowledged(AppKeyIndex, level::Set),
    /// Raw vendor model message. `response` is the opcode of the expected answer, `None` for
    /// unacknowledged messages.
    Vendor {
        app_key_index: AppKeyIndex,
        message: AccessMessage,
        response: Option<Opcode>,
    },
}
impl Operation {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CompositionDataGet(_) => "composition_data_get",
            Operation::AppKeyAdd(_) => "app_key_add",
            Operation::ModelAppBind(_) => "model_app_bind",
            Operation::ModelAppUnbind(_) => "model_app_unbind",
            Operation::ModelPublicationSet(_) => "model_publication_set",
            Operation::ModelSubscriptionAdd(_) => "model_subscription_add",
            Operation::ModelSubscriptionDelete(_) => "model_subscription_delete",
            Operation::NodeReset => "node_reset",
            Operation::DefaultTTLGet => "default_ttl_get",
            Operation::DefaultTTLSet(_) => "default_ttl_set",
            Operation::GenericOnOffGet(_) => "generic_onoff_get",
            Operation::GenericOnOffSet(_, _) => "generic_onoff_set",
            Operation::GenericOnOffSetUnacknowledged(_, _) => "generic_onoff_set_unack",
            Operation::GenericLevelGet(_) => "generic_level_get",
            Operation::GenericLevelSet(_, _) => "generic_level_set",
            Operation::GenericLevelSetUnacknowledged(_, _) => "generic_level_set_unack",
            Operation::Vendor { .. } => "vendor",
        }
    }
    /// Configuration messages use the device key, everything else an application key.
    #[must_use]
    pub fn key(&self) -> MessageKey {
        match self {
            Operation::GenericOnOffGet(index)
            | Operation::GenericOnOffSet(index, _)
            | Operation::GenericOnOffSetUnacknowledged(index, _)
            | Operation::GenericLevelGet(index)
            | Operation::GenericLevelSet(index, _)
            | Operation::GenericLevelSetUnacknowledged(index, _)
            | Operation::Vendor {
                app_key_index: index,
                ..
            } => MessageKey::App(*index),
            _ => MessageKey::Device,
        }
    }
    /// Opcode of the status message that finishes the operation. `None` for unacknowledged
    /// messages.
    #[must_use]
    pub fn expected_response(&self) -> Option<Opcode> {
        match self {
            Operation::CompositionDataGet(_) => Some(ConfigOpcode::CompositionDataStatus.into()),
            Operation::AppKeyAdd(_) => Some(ConfigOpcode::AppKeyStatus.into()),
            Operation::ModelAppBind(_) | Operation::ModelAppUnbind(_) => {
                Some(ConfigOpcode::ModelAppStatus.into())
            }
            Operation::ModelPublicationSet(_) => Some(ConfigOpcode::ModelPublicationStatus.into()),
            Operation::ModelSubscriptionAdd(_) | Operation::ModelSubscriptionDelete(_) => {
                Some(ConfigOpcode::ModelSubscriptionStatus.into())
            }
            Operation::NodeReset => Some(ConfigOpcode::NodeResetStatus.into()),
            Operation::DefaultTTLGet | Operation::DefaultTTLSet(_) => {
                Some(ConfigOpcode::DefaultTTLStatus.into())
            }
            Operation::GenericOnOffGet(_) | Operation::GenericOnOffSet(_, _) => {
                Some(Opcode::sig(onoff::STATUS_OPCODE))
            }
            Operation::GenericLevelGet(_) | Operation::GenericLevelSet(_, _) => {
                Some(Opcode::sig(level::STATUS_OPCODE))
            }
            Operation::GenericOnOffSetUnacknowledged(_, _)
            | Operation::GenericLevelSetUnacknowledged(_, _) => None,
            Operation::Vendor { response, .. } => *response,
        }
    }
    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        self.expected_response().is_some()
    }
    /// # Errors
    /// Whatever the message's `pack_into` reports.
    pub fn to_access_message(&self) -> Result<AccessMessage, MessagePackError> {
        match self {
            Operation::CompositionDataGet(m) => m.to_access_message(),
            Operation::AppKeyAdd(m) => m.to_access_message(),
            Operation::ModelAppBind(m) => m.to_access_message(),
            Operation::ModelAppUnbind(m) => m.to_access_message(),
            Operation::ModelPublicationSet(m) => m.to_access_message(),
            Operation::ModelSubscriptionAdd(m) => m.to_access_message(),
            Operation::ModelSubscriptionDelete(m) => m.to_access_message(),
            Operation::NodeReset => node_reset::Reset.to_access_message(),
            Operation::DefaultTTLGet => default_ttl::Get.to_access_message(),
            Operation::DefaultTTLSet(m) => m.to_access_message(),
            Operation::GenericOnOffGet(_) => onoff::Get.to_access_message(),
            Operation::GenericOnOffSet(_, m) => m.to_access_message(),
            Operation::GenericOnOffSetUnacknowledged(_, m) => {
                onoff::SetUnacknowledged(*m).to_access_message()
            }
            Operation::GenericLevelGet(_) => level::Get.to_access_message(),
            Operation::GenericLevelSet(_, m) => m.to_access_message(),
            Operation::GenericLevelSetUnacknowledged(_, m) => {
                level::SetUnacknowledged(*m).to_access_message()
            }
            Operation::Vendor { message, .. } => Ok(message.clone()),
        }
    }
}

/// Parsed status message surfaced through `MeshEvent::StatusReceived`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum StatusMessage {
    CompositionData(composition_data::Status),
    AppKey(app_key::Status),
    ModelApp(model_app::Status),
    ModelPublication(model_publication::Status),
    ModelSubscription(model_subscription::Status),
    NodeReset,
    DefaultTTL(default_ttl::Status),
    GenericOnOff(onoff::Status),
    GenericLevel(level::Status),
    Vendor(AccessMessage),
}
impl StatusMessage {
    /// Parses a known SIG status message. `Ok(None)` if the opcode isn't a status this crate
    /// understands.
    /// # Errors
    /// `MessagePackError` if the opcode matches but the parameters don't.
    pub fn parse(message: &AccessMessage) -> Result<Option<StatusMessage>, MessagePackError> {
        let params = &message.parameters[..];
        if let Ok(opcode) = ConfigOpcode::try_from(message.opcode) {
            return Ok(Some(match opcode {
                ConfigOpcode::CompositionDataStatus => {
                    StatusMessage::CompositionData(composition_data::Status::unpack_from(params)?)
                }
                ConfigOpcode::AppKeyStatus => {
                    StatusMessage::AppKey(app_key::Status::unpack_from(params)?)
                }
                ConfigOpcode::ModelAppStatus => {
                    StatusMessage::ModelApp(model_app::Status::unpack_from(params)?)
                }
                ConfigOpcode::ModelPublicationStatus => StatusMessage::ModelPublication(
                    model_publication::Status::unpack_from(params)?,
                ),
                ConfigOpcode::ModelSubscriptionStatus => StatusMessage::ModelSubscription(
                    model_subscription::Status::unpack_from(params)?,
                ),
                ConfigOpcode::NodeResetStatus => {
                    node_reset::Status::unpack_from(params)?;
                    StatusMessage::NodeReset
                }
                ConfigOpcode::DefaultTTLStatus => {
                    StatusMessage::DefaultTTL(default_ttl::Status::unpack_from(params)?)
                }
                _ => return Ok(None),
            }));
        }
        if message.opcode == Opcode::sig(onoff::STATUS_OPCODE) {
            Ok(Some(StatusMessage::GenericOnOff(onoff::Status::unpack_from(
                params,
            )?)))
        } else if message.opcode == Opcode::sig(level::STATUS_OPCODE) {
            Ok(Some(StatusMessage::GenericLevel(level::Status::unpack_from(
                params,
            )?)))
        } else {
            Ok(None)
        }
    }
    /// Parses `message` as the answer `expected` by an operation. Vendor responses are passed
    /// through untouched.
    /// # Errors
    /// `MessagePackError` if the parameters don't match the opcode.
    pub fn parse_expected(
        message: &AccessMessage,
        expected: Opcode,
    ) -> Result<Option<StatusMessage>, MessagePackError> {
        if message.opcode != expected {
            return Ok(None);
        }
        if expected.is_vendor() {
            return Ok(Some(StatusMessage::Vendor(message.clone())));
        }
        StatusMessage::parse(message)
    }
    /// Configuration status code, `None` for messages without one.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            StatusMessage::AppKey(s) => Some(s.status_code),
            StatusMessage::ModelApp(s) => Some(s.status_code),
            StatusMessage::ModelPublication(s) => Some(s.status_code),
            StatusMessage::ModelSubscription(s) => Some(s.status_code),
            _ => None,
        }
    }
    /// `false` only for configuration statuses reporting an error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code().map_or(true, StatusCode::is_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key::AppKey;
    use crate::mesh::{CompanyID, KeyIndex, NetKeyIndex};

    #[test]
    fn test_operation_keys_and_responses() {
        let add = Operation::AppKeyAdd(app_key::Add {
            net_key_index: NetKeyIndex(KeyIndex::new(0x456)),
            app_key_index: AppKeyIndex(KeyIndex::new(0x123)),
            app_key: AppKey::from_hex("63964771734fbd76e3b40519d1d94a48").unwrap(),
        });
        assert_eq!(add.key(), MessageKey::Device);
        assert_eq!(add.expected_response(), Some(Opcode::sig(0x8003)));
        let index = AppKeyIndex(KeyIndex::new(1));
        let unack = Operation::GenericOnOffSetUnacknowledged(
            index,
            onoff::Set {
                on_off: true,
                tid: 0,
                transition: None,
            },
        );
        assert_eq!(unack.key(), MessageKey::App(index));
        assert!(!unack.is_acknowledged());
        assert_eq!(
            unack.to_access_message().unwrap().opcode,
            Opcode::sig(0x8203)
        );
    }
    #[test]
    fn test_parse_status() {
        let message = AccessMessage::from_bytes(&hex::decode("800300563412").unwrap()).unwrap();
        let status = StatusMessage::parse(&message).unwrap().unwrap();
        assert!(status.is_success());
        assert_eq!(status.status_code(), Some(StatusCode::Success));
        let failed = AccessMessage::new(Opcode::sig(0x8003), vec![0x03, 0x56, 0x34, 0x12]);
        assert!(!StatusMessage::parse(&failed).unwrap().unwrap().is_success());
        let onoff = AccessMessage::new(Opcode::sig(0x8204), vec![0x01]);
        assert!(matches!(
            StatusMessage::parse(&onoff),
            Ok(Some(StatusMessage::GenericOnOff(_)))
        ));
        let get = AccessMessage::new(Opcode::sig(0x8201), vec![]);
        assert_eq!(StatusMessage::parse(&get), Ok(None));
        let bad = AccessMessage::new(Opcode::sig(0x8003), vec![0x00]);
        assert_eq!(
            StatusMessage::parse(&bad),
            Err(MessagePackError::BadLength)
        );
    }
    #[test]
    fn test_parse_vendor_expected() {
        let opcode = Opcode::vendor(0x01, CompanyID(0x0059));
        let message = AccessMessage::new(opcode, vec![1, 2, 3]);
        assert_eq!(
            StatusMessage::parse_expected(&message, opcode),
            Ok(Some(StatusMessage::Vendor(message.clone())))
        );
        assert_eq!(
            StatusMessage::parse_expected(&message, Opcode::sig(0x8003)),
            Ok(None)
        );
    }
}
