//! Configuration Client messages. Always encrypted with the target node's device key.
use crate::access::SigOpcode::{DoubleOctet, SingleOctet};
use crate::access::{Opcode, OpcodeError};
use core::convert::TryFrom;

pub mod messages;

pub use messages::{app_key, model_app, model_publication, model_subscription};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum ConfigOpcode {
    AppKeyAdd,
    AppKeyStatus,

    CompositionDataGet,
    CompositionDataStatus,

    DefaultTTLGet,
    DefaultTTLSet,
    DefaultTTLStatus,

    ModelAppBind,
    ModelAppStatus,
    ModelAppUnbind,

    ModelPublicationSet,
    ModelPublicationStatus,

    ModelSubscriptionAdd,
    ModelSubscriptionDelete,
    ModelSubscriptionStatus,

    NodeReset,
    NodeResetStatus,
}

impl TryFrom<Opcode> for ConfigOpcode {
    type Error = OpcodeError;
    fn try_from(opcode: Opcode) -> Result<Self, OpcodeError> {
        match opcode {
            Opcode::SIG(SingleOctet(s)) => match s {
                0x00 => Ok(ConfigOpcode::AppKeyAdd),
                0x02 => Ok(ConfigOpcode::CompositionDataStatus),
                0x03 => Ok(ConfigOpcode::ModelPublicationSet),
                _ => Err(OpcodeError::Invalid),
            },
            Opcode::SIG(DoubleOctet(d)) => match d {
                0x8003 => Ok(ConfigOpcode::AppKeyStatus),
                0x8008 => Ok(ConfigOpcode::CompositionDataGet),
                0x800C => Ok(ConfigOpcode::DefaultTTLGet),
                0x800D => Ok(ConfigOpcode::DefaultTTLSet),
                0x800E => Ok(ConfigOpcode::DefaultTTLStatus),
                0x8019 => Ok(ConfigOpcode::ModelPublicationStatus),
                0x801B => Ok(ConfigOpcode::ModelSubscriptionAdd),
                0x801C => Ok(ConfigOpcode::ModelSubscriptionDelete),
                0x801F => Ok(ConfigOpcode::ModelSubscriptionStatus),
                0x803D => Ok(ConfigOpcode::ModelAppBind),
                0x803E => Ok(ConfigOpcode::ModelAppStatus),
                0x803F => Ok(ConfigOpcode::ModelAppUnbind),
                0x8049 => Ok(ConfigOpcode::NodeReset),
                0x804A => Ok(ConfigOpcode::NodeResetStatus),
                _ => Err(OpcodeError::Invalid),
            },
            Opcode::Vendor(_, _) => Err(OpcodeError::Invalid),
        }
    }
}
impl From<ConfigOpcode> for Opcode {
    fn from(opcode: ConfigOpcode) -> Self {
        match opcode {
            ConfigOpcode::AppKeyAdd => SingleOctet(0x00).into(),
            ConfigOpcode::AppKeyStatus => DoubleOctet(0x8003).into(),
            ConfigOpcode::CompositionDataGet => DoubleOctet(0x8008).into(),
            ConfigOpcode::CompositionDataStatus => SingleOctet(0x02).into(),
            ConfigOpcode::DefaultTTLGet => DoubleOctet(0x800C).into(),
            ConfigOpcode::DefaultTTLSet => DoubleOctet(0x800D).into(),
            ConfigOpcode::DefaultTTLStatus => DoubleOctet(0x800E).into(),
            ConfigOpcode::ModelAppBind => DoubleOctet(0x803D).into(),
            ConfigOpcode::ModelAppStatus => DoubleOctet(0x803E).into(),
            ConfigOpcode::ModelAppUnbind => DoubleOctet(0x803F).into(),
            ConfigOpcode::ModelPublicationSet => SingleOctet(0x03).into(),
            ConfigOpcode::ModelPublicationStatus => DoubleOctet(0x8019).into(),
            ConfigOpcode::ModelSubscriptionAdd => DoubleOctet(0x801B).into(),
            ConfigOpcode::ModelSubscriptionDelete => DoubleOctet(0x801C).into(),
            ConfigOpcode::ModelSubscriptionStatus => DoubleOctet(0x801F).into(),
            ConfigOpcode::NodeReset => DoubleOctet(0x8049).into(),
            ConfigOpcode::NodeResetStatus => DoubleOctet(0x804A).into(),
        }
    }
}

pub mod composition_data {
    use crate::access::Opcode;
    use crate::bytes::ToFromBytesEndian;
    use crate::mesh::{CompanyID, ModelID};
    use crate::models::config::ConfigOpcode;
    use crate::models::{MessagePackError, PackableMessage};

    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
    pub struct Get(pub u8);
    impl PackableMessage for Get {
        fn opcode() -> Opcode {
            ConfigOpcode::CompositionDataGet.into()
        }

        fn message_size(&self) -> usize {
            1
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            if buffer.is_empty() {
                Err(MessagePackError::SmallBuffer)
            } else {
                buffer[0] = self.0;
                Ok(())
            }
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            if buffer.len() == 1 {
                Ok(Get(buffer[0]))
            } else {
                Err(MessagePackError::BadLength)
            }
        }
    }
    #[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Status {
        pub page_number: u8,
        pub data: Vec<u8>,
    }
    impl Status {
        /// Parses `data` as Composition Data Page 0. `None` for other pages or malformed data.
        #[must_use]
        pub fn page0(&self) -> Option<CompositionDataPage0> {
            if self.page_number == 0 {
                CompositionDataPage0::unpack(&self.data)
            } else {
                None
            }
        }
    }
    impl PackableMessage for Status {
        fn opcode() -> Opcode {
            ConfigOpcode::CompositionDataStatus.into()
        }

        fn message_size(&self) -> usize {
            1 + self.data.len()
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            if buffer.len() < self.message_size() {
                Err(MessagePackError::SmallBuffer)
            } else {
                buffer[0] = self.page_number;
                buffer[1..self.message_size()].copy_from_slice(&self.data);
                Ok(())
            }
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            let (&page_number, data) = buffer.split_first().ok_or(MessagePackError::BadLength)?;
            Ok(Status {
                page_number,
                data: data.to_vec(),
            })
        }
    }

    #[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Element {
        pub location: u16,
        pub sig_models: Vec<ModelID>,
        pub vendor_models: Vec<(CompanyID, ModelID)>,
    }
    #[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct CompositionDataPage0 {
        pub cid: CompanyID,
        pub pid: u16,
        pub vid: u16,
        pub crpl: u16,
        pub features: u16,
        pub elements: Vec<Element>,
    }
    const HEADER_LEN: usize = 10;
    impl CompositionDataPage0 {
        #[must_use]
        pub fn unpack(buf: &[u8]) -> Option<CompositionDataPage0> {
            if buf.len() < HEADER_LEN {
                return None;
            }
            let u16_at = |pos: usize| u16::from_bytes_le(buf.get(pos..pos + 2)?);
            let mut out = CompositionDataPage0 {
                cid: CompanyID(u16_at(0)?),
                pid: u16_at(2)?,
                vid: u16_at(4)?,
                crpl: u16_at(6)?,
                features: u16_at(8)?,
                elements: Vec::new(),
            };
            let mut pos = HEADER_LEN;
            while pos < buf.len() {
                let location = u16_at(pos)?;
                let num_s = usize::from(*buf.get(pos + 2)?);
                let num_v = usize::from(*buf.get(pos + 3)?);
                pos += 4;
                let mut sig_models = Vec::with_capacity(num_s);
                for _ in 0..num_s {
                    sig_models.push(ModelID(u16_at(pos)?));
                    pos += 2;
                }
                let mut vendor_models = Vec::with_capacity(num_v);
                for _ in 0..num_v {
                    vendor_models.push((CompanyID(u16_at(pos)?), ModelID(u16_at(pos + 2)?)));
                    pos += 4;
                }
                out.elements.push(Element {
                    location,
                    sig_models,
                    vendor_models,
                });
            }
            Some(out)
        }
        #[must_use]
        pub fn supports_relay(&self) -> bool {
            self.features & 0b0001 != 0
        }
        #[must_use]
        pub fn supports_proxy(&self) -> bool {
            self.features & 0b0010 != 0
        }
    }
}
pub mod default_ttl {
    use crate::access::Opcode;
    use crate::mesh::TTL;
    use crate::models::config::ConfigOpcode;
    use crate::models::{MessagePackError, PackableMessage};
    use core::convert::TryFrom;

    /// Default TTL of 1 is prohibited.
    fn default_ttl(b: u8) -> Result<TTL, MessagePackError> {
        match TTL::try_from(b) {
            Ok(ttl) if ttl.value() != 1 => Ok(ttl),
            _ => Err(MessagePackError::BadBytes),
        }
    }

    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Get;
    impl PackableMessage for Get {
        fn opcode() -> Opcode {
            ConfigOpcode::DefaultTTLGet.into()
        }

        fn message_size(&self) -> usize {
            0
        }

        fn pack_into(&self, _buffer: &mut [u8]) -> Result<(), MessagePackError> {
            Ok(())
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            if buffer.is_empty() {
                Ok(Get)
            } else {
                Err(MessagePackError::BadLength)
            }
        }
    }
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Set(pub TTL);
    impl PackableMessage for Set {
        fn opcode() -> Opcode {
            ConfigOpcode::DefaultTTLSet.into()
        }

        fn message_size(&self) -> usize {
            1
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            if buffer.is_empty() {
                Err(MessagePackError::SmallBuffer)
            } else if self.0.value() == 1 {
                Err(MessagePackError::BadState)
            } else {
                buffer[0] = self.0.value();
                Ok(())
            }
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            if buffer.len() == 1 {
                Ok(Set(default_ttl(buffer[0])?))
            } else {
                Err(MessagePackError::BadLength)
            }
        }
    }
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Status(pub TTL);
    impl PackableMessage for Status {
        fn opcode() -> Opcode {
            ConfigOpcode::DefaultTTLStatus.into()
        }

        fn message_size(&self) -> usize {
            1
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            if buffer.is_empty() {
                Err(MessagePackError::SmallBuffer)
            } else {
                buffer[0] = self.0.value();
                Ok(())
            }
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            if buffer.len() == 1 {
                Ok(Status(default_ttl(buffer[0])?))
            } else {
                Err(MessagePackError::BadLength)
            }
        }
    }
}
pub mod node_reset {
    use crate::access::Opcode;
    use crate::models::config::ConfigOpcode;
    use crate::models::{MessagePackError, PackableMessage};

    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Reset;
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Status;

    macro_rules! empty_message {
        ($name:ident, $opcode:expr) => {
            impl PackableMessage for $name {
                fn opcode() -> Opcode {
                    $opcode.into()
                }

                fn message_size(&self) -> usize {
                    0
                }

                fn pack_into(&self, _buffer: &mut [u8]) -> Result<(), MessagePackError> {
                    Ok(())
                }

                fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
                    if buffer.is_empty() {
                        Ok($name)
                    } else {
                        Err(MessagePackError::BadLength)
                    }
                }
            }
        };
    }
    empty_message!(Reset, ConfigOpcode::NodeReset);
    empty_message!(Status, ConfigOpcode::NodeResetStatus);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TTL;
    use crate::models::PackableMessage;

    #[test]
    fn test_opcode_round_trip() {
        for opcode in [
            ConfigOpcode::AppKeyAdd,
            ConfigOpcode::AppKeyStatus,
            ConfigOpcode::CompositionDataGet,
            ConfigOpcode::ModelPublicationSet,
            ConfigOpcode::ModelSubscriptionStatus,
            ConfigOpcode::NodeResetStatus,
        ] {
            assert_eq!(ConfigOpcode::try_from(Opcode::from(opcode)), Ok(opcode));
        }
        assert!(ConfigOpcode::try_from(Opcode::sig(0x8201)).is_err());
    }
    #[test]
    fn test_composition_data_get() {
        let message = composition_data::Get(0).to_access_message().unwrap();
        assert_eq!(message.to_bytes().unwrap(), vec![0x80, 0x08, 0x00]);
    }
    #[test]
    fn test_composition_page0() {
        // CID 0x000C, PID 0x001A, VID 0x0001, CRPL 8, relay + proxy, one element with the
        // configuration server, generic OnOff server and one vendor model.
        let data = hex::decode("0c001a0001000800030000000201000000100c003412").unwrap();
        let status = composition_data::Status::unpack_from(
            &[&[0_u8][..], &data[..]].concat(),
        )
        .unwrap();
        let page = status.page0().unwrap();
        assert_eq!(page.cid, crate::mesh::CompanyID(0x000C));
        assert_eq!(page.crpl, 8);
        assert!(page.supports_relay() && page.supports_proxy());
        assert_eq!(page.elements.len(), 1);
        assert_eq!(page.elements[0].sig_models.len(), 2);
        assert_eq!(
            page.elements[0].vendor_models,
            vec![(crate::mesh::CompanyID(0x000C), crate::mesh::ModelID(0x1234))]
        );
        assert!(composition_data::CompositionDataPage0::unpack(&data[..data.len() - 1]).is_none());
    }
    #[test]
    fn test_default_ttl() {
        assert_eq!(
            default_ttl::Status::unpack_from(&[0x07]),
            Ok(default_ttl::Status(TTL::new(7)))
        );
        assert_eq!(
            default_ttl::Status::unpack_from(&[0x01]),
            Err(crate::models::MessagePackError::BadBytes)
        );
        assert_eq!(
            default_ttl::Set(TTL::new(1)).to_access_message(),
            Err(crate::models::MessagePackError::BadState)
        );
        assert_eq!(
            node_reset::Reset.to_access_message().unwrap().to_bytes().unwrap(),
            vec![0x80, 0x49]
        );
    }
}
