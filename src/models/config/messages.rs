//! Configuration messages that address a model on an element.
use crate::access::ModelIdentifier;
use crate::address::{UnicastAddress, ADDRESS_LEN};
use crate::bytes::ToFromBytesEndian;
use crate::models::MessagePackError;

/// Splits `buffer` into a `fixed_len` prefix and the trailing `ModelIdentifier` (2 or 4 bytes).
fn split_model(
    buffer: &[u8],
    fixed_len: usize,
) -> Result<(&[u8], ModelIdentifier), MessagePackError> {
    if buffer.len() != fixed_len + 2 && buffer.len() != fixed_len + 4 {
        return Err(MessagePackError::BadLength);
    }
    let model_identifier =
        ModelIdentifier::from_bytes_le(&buffer[fixed_len..]).ok_or(MessagePackError::BadBytes)?;
    Ok((&buffer[..fixed_len], model_identifier))
}
fn element_address(buffer: &[u8]) -> Result<UnicastAddress, MessagePackError> {
    UnicastAddress::from_bytes_le(&buffer[..ADDRESS_LEN]).ok_or(MessagePackError::BadBytes)
}
fn check_len(buffer: &[u8], len: usize) -> Result<(), MessagePackError> {
    if buffer.len() < len {
        Err(MessagePackError::SmallBuffer)
    } else {
        Ok(())
    }
}

pub mod app_key {
    use crate::access::Opcode;
    use crate::crypto::key::{AppKey, KEY_LEN};
    use crate::mesh::{pack_key_indexes, unpack_key_indexes, AppKeyIndex, NetKeyIndex};
    use crate::models::config::ConfigOpcode;
    use crate::models::{MessagePackError, PackableMessage, StatusCode};
    use core::convert::TryFrom;

    const INDEXES_LEN: usize = 3;

    #[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
    pub struct Add {
        pub net_key_index: NetKeyIndex,
        pub app_key_index: AppKeyIndex,
        pub app_key: AppKey,
    }
    impl PackableMessage for Add {
        fn opcode() -> Opcode {
            ConfigOpcode::AppKeyAdd.into()
        }

        fn message_size(&self) -> usize {
            INDEXES_LEN + KEY_LEN
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            super::check_len(buffer, self.message_size())?;
            buffer[..INDEXES_LEN]
                .copy_from_slice(&pack_key_indexes(self.net_key_index.0, self.app_key_index.0));
            buffer[INDEXES_LEN..INDEXES_LEN + KEY_LEN].copy_from_slice(self.app_key.as_ref());
            Ok(())
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            if buffer.len() != INDEXES_LEN + KEY_LEN {
                return Err(MessagePackError::BadLength);
            }
            let (net, app) =
                unpack_key_indexes(&buffer[..INDEXES_LEN]).ok_or(MessagePackError::BadBytes)?;
            Ok(Add {
                net_key_index: NetKeyIndex(net),
                app_key_index: AppKeyIndex(app),
                app_key: AppKey::try_from(&buffer[INDEXES_LEN..])
                    .map_err(|_| MessagePackError::BadBytes)?,
            })
        }
    }
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Status {
        pub status_code: StatusCode,
        pub net_key_index: NetKeyIndex,
        pub app_key_index: AppKeyIndex,
    }
    impl PackableMessage for Status {
        fn opcode() -> Opcode {
            ConfigOpcode::AppKeyStatus.into()
        }

        fn message_size(&self) -> usize {
            1 + INDEXES_LEN
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            super::check_len(buffer, self.message_size())?;
            buffer[0] = self.status_code.into();
            buffer[1..1 + INDEXES_LEN]
                .copy_from_slice(&pack_key_indexes(self.net_key_index.0, self.app_key_index.0));
            Ok(())
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            if buffer.len() != 1 + INDEXES_LEN {
                return Err(MessagePackError::BadLength);
            }
            let (net, app) = unpack_key_indexes(&buffer[1..]).ok_or(MessagePackError::BadBytes)?;
            Ok(Status {
                status_code: buffer[0].into(),
                net_key_index: NetKeyIndex(net),
                app_key_index: AppKeyIndex(app),
            })
        }
    }
}

pub mod model_app {
    use crate::access::{ModelIdentifier, Opcode};
    use crate::address::{UnicastAddress, ADDRESS_LEN};
    use crate::bytes::ToFromBytesEndian;
    use crate::mesh::{AppKeyIndex, KeyIndex};
    use crate::models::config::ConfigOpcode;
    use crate::models::{MessagePackError, PackableMessage, StatusCode};

    const FIXED_LEN: usize = ADDRESS_LEN + 2;

    /// Binding between an AppKey and a model. Same layout for Bind and Unbind.
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Binding {
        pub element_address: UnicastAddress,
        pub app_key_index: AppKeyIndex,
        pub model_identifier: ModelIdentifier,
    }
    impl Binding {
        fn byte_len(&self) -> usize {
            FIXED_LEN + self.model_identifier.byte_len()
        }
        fn pack(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            super::check_len(buffer, self.byte_len())?;
            buffer[..ADDRESS_LEN].copy_from_slice(&self.element_address.to_bytes_le());
            buffer[ADDRESS_LEN..FIXED_LEN].copy_from_slice(&self.app_key_index.0.to_bytes_le());
            buffer[FIXED_LEN..self.byte_len()]
                .copy_from_slice(&self.model_identifier.to_bytes_le());
            Ok(())
        }
        fn unpack(buffer: &[u8]) -> Result<Binding, MessagePackError> {
            let (fixed, model_identifier) = super::split_model(buffer, FIXED_LEN)?;
            Ok(Binding {
                element_address: super::element_address(fixed)?,
                app_key_index: AppKeyIndex(
                    KeyIndex::from_bytes_le(&fixed[ADDRESS_LEN..])
                        .ok_or(MessagePackError::BadBytes)?,
                ),
                model_identifier,
            })
        }
    }
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Bind(pub Binding);
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Unbind(pub Binding);
    macro_rules! binding_message {
        ($name:ident, $opcode:expr) => {
            impl PackableMessage for $name {
                fn opcode() -> Opcode {
                    $opcode.into()
                }

                fn message_size(&self) -> usize {
                    self.0.byte_len()
                }

                fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
                    self.0.pack(buffer)
                }

                fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
                    Ok($name(Binding::unpack(buffer)?))
                }
            }
        };
    }
    binding_message!(Bind, ConfigOpcode::ModelAppBind);
    binding_message!(Unbind, ConfigOpcode::ModelAppUnbind);

    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Status {
        pub status_code: StatusCode,
        pub binding: Binding,
    }
    impl PackableMessage for Status {
        fn opcode() -> Opcode {
            ConfigOpcode::ModelAppStatus.into()
        }

        fn message_size(&self) -> usize {
            1 + self.binding.byte_len()
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            super::check_len(buffer, self.message_size())?;
            buffer[0] = self.status_code.into();
            self.binding.pack(&mut buffer[1..])
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            let (&status_code, rest) = buffer.split_first().ok_or(MessagePackError::BadLength)?;
            Ok(Status {
                status_code: status_code.into(),
                binding: Binding::unpack(rest)?,
            })
        }
    }
}

pub mod model_publication {
    use crate::access::{ModelIdentifier, Opcode};
    use crate::address::{Address, UnicastAddress, ADDRESS_LEN};
    use crate::bytes::ToFromBytesEndian;
    use crate::mesh::{AppKeyIndex, KeyIndex, TTL};
    use crate::models::config::ConfigOpcode;
    use crate::models::{MessagePackError, PackableMessage, StatusCode};
    use core::convert::TryFrom;

    /// Raw Publish Period: 6 bit step count, 2 bit step resolution.
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
    #[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
    pub struct PublishPeriod(pub u8);
    impl PublishPeriod {
        #[must_use]
        pub const fn disabled() -> PublishPeriod {
            PublishPeriod(0)
        }
        /// Period in milliseconds (100ms, 1s, 10s or 10min steps).
        #[must_use]
        pub const fn as_millis(self) -> u32 {
            let steps = (self.0 & 0x3F) as u32;
            match self.0 >> 6 {
                0 => steps * 100,
                1 => steps * 1_000,
                2 => steps * 10_000,
                _ => steps * 600_000,
            }
        }
    }
    /// Publish retransmissions: 3 bit count, 5 bit interval steps (50ms each, plus one).
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
    #[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
    pub struct PublishRetransmit {
        pub count: u8,
        pub interval_steps: u8,
    }
    impl From<PublishRetransmit> for u8 {
        fn from(r: PublishRetransmit) -> Self {
            (r.count & 0x07) | (r.interval_steps << 3)
        }
    }
    impl From<u8> for PublishRetransmit {
        fn from(b: u8) -> Self {
            PublishRetransmit {
                count: b & 0x07,
                interval_steps: b >> 3,
            }
        }
    }

    /// Publication parameters (everything but the element address and model).
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    #[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
    pub struct PublishInfo {
        pub address: Address,
        pub app_key_index: AppKeyIndex,
        pub credential_flag: bool,
        /// `None` means the node's Default TTL (0xFF on the wire).
        pub ttl: Option<TTL>,
        pub period: PublishPeriod,
        pub retransmit: PublishRetransmit,
    }
    impl PublishInfo {
        pub const LEN: usize = 7;
        fn pack(&self, buf: &mut [u8]) {
            buf[..2].copy_from_slice(&self.address.to_bytes_le());
            let index = self.app_key_index.0.value() | (u16::from(self.credential_flag) << 12);
            buf[2..4].copy_from_slice(&index.to_bytes_le());
            buf[4] = self.ttl.map_or(0xFF, TTL::value);
            buf[5] = self.period.0;
            buf[6] = self.retransmit.into();
        }
        fn unpack(buf: &[u8]) -> Result<PublishInfo, MessagePackError> {
            let index = u16::from_bytes_le(&buf[2..4]).ok_or(MessagePackError::BadLength)?;
            if index & 0xE000 != 0 {
                return Err(MessagePackError::BadBytes);
            }
            let ttl = match buf[4] {
                0xFF => None,
                b => Some(TTL::try_from(b).map_err(|_| MessagePackError::BadBytes)?),
            };
            Ok(PublishInfo {
                address: Address::from_bytes_le(&buf[..2]).ok_or(MessagePackError::BadLength)?,
                app_key_index: AppKeyIndex(KeyIndex::new_masked(index)),
                credential_flag: index & (1 << 12) != 0,
                ttl,
                period: PublishPeriod(buf[5]),
                retransmit: buf[6].into(),
            })
        }
    }

    const FIXED_LEN: usize = ADDRESS_LEN + PublishInfo::LEN;

    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Set {
        pub element_address: UnicastAddress,
        pub publication: PublishInfo,
        pub model_identifier: ModelIdentifier,
    }
    impl PackableMessage for Set {
        fn opcode() -> Opcode {
            ConfigOpcode::ModelPublicationSet.into()
        }

        fn message_size(&self) -> usize {
            FIXED_LEN + self.model_identifier.byte_len()
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            super::check_len(buffer, self.message_size())?;
            buffer[..ADDRESS_LEN].copy_from_slice(&self.element_address.to_bytes_le());
            self.publication.pack(&mut buffer[ADDRESS_LEN..FIXED_LEN]);
            buffer[FIXED_LEN..self.message_size()]
                .copy_from_slice(&self.model_identifier.to_bytes_le());
            Ok(())
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            let (fixed, model_identifier) = super::split_model(buffer, FIXED_LEN)?;
            Ok(Set {
                element_address: super::element_address(fixed)?,
                publication: PublishInfo::unpack(&fixed[ADDRESS_LEN..])?,
                model_identifier,
            })
        }
    }
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Status {
        pub status_code: StatusCode,
        pub element_address: UnicastAddress,
        pub publication: PublishInfo,
        pub model_identifier: ModelIdentifier,
    }
    impl PackableMessage for Status {
        fn opcode() -> Opcode {
            ConfigOpcode::ModelPublicationStatus.into()
        }

        fn message_size(&self) -> usize {
            1 + FIXED_LEN + self.model_identifier.byte_len()
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            super::check_len(buffer, self.message_size())?;
            buffer[0] = self.status_code.into();
            buffer[1..1 + ADDRESS_LEN].copy_from_slice(&self.element_address.to_bytes_le());
            self.publication
                .pack(&mut buffer[1 + ADDRESS_LEN..1 + FIXED_LEN]);
            buffer[1 + FIXED_LEN..self.message_size()]
                .copy_from_slice(&self.model_identifier.to_bytes_le());
            Ok(())
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            let (&status_code, rest) = buffer.split_first().ok_or(MessagePackError::BadLength)?;
            let (fixed, model_identifier) = super::split_model(rest, FIXED_LEN)?;
            Ok(Status {
                status_code: status_code.into(),
                element_address: super::element_address(fixed)?,
                publication: PublishInfo::unpack(&fixed[ADDRESS_LEN..])?,
                model_identifier,
            })
        }
    }
}

pub mod model_subscription {
    use crate::access::{ModelIdentifier, Opcode};
    use crate::address::{Address, UnicastAddress, ADDRESS_LEN};
    use crate::bytes::ToFromBytesEndian;
    use crate::models::config::ConfigOpcode;
    use crate::models::{MessagePackError, PackableMessage, StatusCode};

    const FIXED_LEN: usize = ADDRESS_LEN * 2;

    /// Subscription of a model to a group (or virtual hash) address. Same layout for Add and
    /// Delete.
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Subscription {
        pub element_address: UnicastAddress,
        pub address: Address,
        pub model_identifier: ModelIdentifier,
    }
    impl Subscription {
        fn byte_len(&self) -> usize {
            FIXED_LEN + self.model_identifier.byte_len()
        }
        fn pack(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            super::check_len(buffer, self.byte_len())?;
            buffer[..ADDRESS_LEN].copy_from_slice(&self.element_address.to_bytes_le());
            buffer[ADDRESS_LEN..FIXED_LEN].copy_from_slice(&self.address.to_bytes_le());
            buffer[FIXED_LEN..self.byte_len()]
                .copy_from_slice(&self.model_identifier.to_bytes_le());
            Ok(())
        }
        fn unpack(buffer: &[u8]) -> Result<Subscription, MessagePackError> {
            let (fixed, model_identifier) = super::split_model(buffer, FIXED_LEN)?;
            Ok(Subscription {
                element_address: super::element_address(fixed)?,
                address: Address::from_bytes_le(&fixed[ADDRESS_LEN..])
                    .ok_or(MessagePackError::BadBytes)?,
                model_identifier,
            })
        }
        fn check_address(&self) -> Result<(), MessagePackError> {
            match self.address {
                Address::Group(_) | Address::VirtualHash(_) => Ok(()),
                Address::Unassigned | Address::Unicast(_) => Err(MessagePackError::BadState),
            }
        }
    }
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Add(pub Subscription);
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Delete(pub Subscription);
    macro_rules! subscription_message {
        ($name:ident, $opcode:expr) => {
            impl PackableMessage for $name {
                fn opcode() -> Opcode {
                    $opcode.into()
                }

                fn message_size(&self) -> usize {
                    self.0.byte_len()
                }

                fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
                    self.0.check_address()?;
                    self.0.pack(buffer)
                }

                fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
                    Ok($name(Subscription::unpack(buffer)?))
                }
            }
        };
    }
    subscription_message!(Add, ConfigOpcode::ModelSubscriptionAdd);
    subscription_message!(Delete, ConfigOpcode::ModelSubscriptionDelete);

    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Status {
        pub status_code: StatusCode,
        pub subscription: Subscription,
    }
    impl PackableMessage for Status {
        fn opcode() -> Opcode {
            ConfigOpcode::ModelSubscriptionStatus.into()
        }

        fn message_size(&self) -> usize {
            1 + self.subscription.byte_len()
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            super::check_len(buffer, self.message_size())?;
            buffer[0] = self.status_code.into();
            self.subscription.pack(&mut buffer[1..])
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            let (&status_code, rest) = buffer.split_first().ok_or(MessagePackError::BadLength)?;
            Ok(Status {
                status_code: status_code.into(),
                subscription: Subscription::unpack(rest)?,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, GroupAddress};
    use crate::crypto::key::AppKey;
    use crate::mesh::{AppKeyIndex, CompanyID, KeyIndex, ModelID, NetKeyIndex, TTL};
    use crate::models::{PackableMessage, StatusCode};

    #[test]
    fn test_app_key_add() {
        let add = app_key::Add {
            net_key_index: NetKeyIndex(KeyIndex::new(0x456)),
            app_key_index: AppKeyIndex(KeyIndex::new(0x123)),
            app_key: AppKey::from_hex("63964771734fbd76e3b40519d1d94a48").unwrap(),
        };
        let bytes = add.to_access_message().unwrap().to_bytes().unwrap();
        assert_eq!(
            bytes,
            hex::decode("0056341263964771734fbd76e3b40519d1d94a48").unwrap()
        );
        assert_eq!(app_key::Add::unpack_from(&bytes[1..]), Ok(add));
    }
    #[test]
    fn test_app_key_status() {
        let status = app_key::Status::unpack_from(&hex::decode("00563412").unwrap()).unwrap();
        assert_eq!(status.status_code, StatusCode::Success);
        assert_eq!(status.net_key_index, NetKeyIndex(KeyIndex::new(0x456)));
        assert_eq!(status.app_key_index, AppKeyIndex(KeyIndex::new(0x123)));
    }
    #[test]
    fn test_model_app_bind() {
        let bind = model_app::Bind(model_app::Binding {
            element_address: UnicastAddress::new(0x1201),
            app_key_index: AppKeyIndex(KeyIndex::new(1)),
            model_identifier: ModelIdentifier::new_sig(ModelID(0x1000)),
        });
        let bytes = bind.to_access_message().unwrap().to_bytes().unwrap();
        assert_eq!(bytes, vec![0x80, 0x3D, 0x01, 0x12, 0x01, 0x00, 0x00, 0x10]);
        let vendor = model_app::Binding {
            model_identifier: ModelIdentifier::new_vendor(ModelID(0x0001), CompanyID(0x0059)),
            ..bind.0
        };
        let mut status = vec![0x0D];
        status.extend_from_slice(&[0x01, 0x12, 0x01, 0x00, 0x59, 0x00, 0x01, 0x00]);
        assert_eq!(
            model_app::Status::unpack_from(&status),
            Ok(model_app::Status {
                status_code: StatusCode::CannotBind,
                binding: vendor,
            })
        );
        assert_eq!(
            model_app::Status::unpack_from(&status[..4]),
            Err(crate::models::MessagePackError::BadLength)
        );
    }
    #[test]
    fn test_model_publication_set() {
        let set = model_publication::Set {
            element_address: UnicastAddress::new(0x0005),
            publication: model_publication::PublishInfo {
                address: Address::Group(GroupAddress::new(0xC001)),
                app_key_index: AppKeyIndex(KeyIndex::new(2)),
                credential_flag: true,
                ttl: None,
                period: model_publication::PublishPeriod(0x41),
                retransmit: model_publication::PublishRetransmit {
                    count: 2,
                    interval_steps: 3,
                },
            },
            model_identifier: ModelIdentifier::new_sig(ModelID(0x1000)),
        };
        let message = set.to_access_message().unwrap();
        assert_eq!(
            message.to_bytes().unwrap(),
            vec![0x03, 0x05, 0x00, 0x01, 0xC0, 0x02, 0x10, 0xFF, 0x41, 0x1A, 0x00, 0x10]
        );
        assert_eq!(model_publication::Set::from_access_message(&message), Ok(set));
        assert_eq!(set.publication.period.as_millis(), 1_000);
    }
    #[test]
    fn test_model_publication_status_ttl() {
        let mut bytes = vec![0x00, 0x05, 0x00, 0x01, 0xC0, 0x02, 0x00, 0x05, 0x00, 0x00];
        bytes.extend_from_slice(&[0x00, 0x10]);
        let status = model_publication::Status::unpack_from(&bytes).unwrap();
        assert_eq!(status.publication.ttl, Some(TTL::new(5)));
        assert!(!status.publication.credential_flag);
        bytes[6] = 0x20;
        assert!(model_publication::Status::unpack_from(&bytes).is_err());
    }
    #[test]
    fn test_model_subscription() {
        let subscription = model_subscription::Subscription {
            element_address: UnicastAddress::new(0x0005),
            address: Address::Group(GroupAddress::new(0xC001)),
            model_identifier: ModelIdentifier::new_sig(ModelID(0x1000)),
        };
        assert_eq!(
            model_subscription::Delete(subscription)
                .to_access_message()
                .unwrap()
                .to_bytes()
                .unwrap(),
            vec![0x80, 0x1C, 0x05, 0x00, 0x01, 0xC0, 0x00, 0x10]
        );
        let unicast = model_subscription::Subscription {
            address: Address::Unicast(UnicastAddress::new(0x0002)),
            ..subscription
        };
        assert_eq!(
            model_subscription::Add(unicast).to_access_message(),
            Err(crate::models::MessagePackError::BadState)
        );
    }
}
