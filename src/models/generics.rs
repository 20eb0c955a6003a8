//! Generic OnOff and Generic Level client messages. Encrypted with an application key.
use crate::models::MessagePackError;

/// Generic Default Transition Time format: 6 bit step count, 2 bit step resolution.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct TransitionTime(pub u8);
impl TransitionTime {
    /// Step count 0x3F means the value is unknown.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 & 0x3F == 0x3F
    }
    #[must_use]
    pub const fn as_millis(self) -> Option<u32> {
        if self.is_unknown() {
            return None;
        }
        let steps = (self.0 & 0x3F) as u32;
        Some(match self.0 >> 6 {
            0 => steps * 100,
            1 => steps * 1_000,
            2 => steps * 10_000,
            _ => steps * 600_000,
        })
    }
}
/// Optional transition of a Set message. `delay` is in 5 ms steps.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct Transition {
    pub time: TransitionTime,
    pub delay: u8,
}
fn unpack_transition(buf: &[u8]) -> Result<Option<Transition>, MessagePackError> {
    match buf {
        [] => Ok(None),
        [time, delay] if !TransitionTime(*time).is_unknown() => Ok(Some(Transition {
            time: TransitionTime(*time),
            delay: *delay,
        })),
        [_, _] => Err(MessagePackError::BadBytes),
        _ => Err(MessagePackError::BadLength),
    }
}
fn transition_len(transition: Option<Transition>) -> usize {
    if transition.is_some() {
        2
    } else {
        0
    }
}
fn pack_transition(transition: Option<Transition>, buf: &mut [u8]) {
    if let Some(transition) = transition {
        buf[0] = transition.time.0;
        buf[1] = transition.delay;
    }
}

pub mod onoff {
    use super::{Transition, TransitionTime};
    use crate::access::Opcode;
    use crate::models::{MessagePackError, PackableMessage};

    pub const GET_OPCODE: u16 = 0x8201;
    pub const SET_OPCODE: u16 = 0x8202;
    pub const SET_UNACKNOWLEDGED_OPCODE: u16 = 0x8203;
    pub const STATUS_OPCODE: u16 = 0x8204;

    fn on_off(b: u8) -> Result<bool, MessagePackError> {
        match b {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(MessagePackError::BadBytes),
        }
    }

    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Get;
    impl PackableMessage for Get {
        fn opcode() -> Opcode {
            Opcode::sig(GET_OPCODE)
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
    pub struct Set {
        pub on_off: bool,
        /// Transaction Identifier. Repeated Sets with the same TID are ignored by the server.
        pub tid: u8,
        pub transition: Option<Transition>,
    }
    impl Set {
        fn pack(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            if buffer.len() < self.len() {
                return Err(MessagePackError::SmallBuffer);
            }
            buffer[0] = u8::from(self.on_off);
            buffer[1] = self.tid;
            super::pack_transition(self.transition, &mut buffer[2..]);
            Ok(())
        }
        fn unpack(buffer: &[u8]) -> Result<Set, MessagePackError> {
            if buffer.len() < 2 {
                return Err(MessagePackError::BadLength);
            }
            Ok(Set {
                on_off: on_off(buffer[0])?,
                tid: buffer[1],
                transition: super::unpack_transition(&buffer[2..])?,
            })
        }
        fn len(&self) -> usize {
            2 + super::transition_len(self.transition)
        }
    }
    impl PackableMessage for Set {
        fn opcode() -> Opcode {
            Opcode::sig(SET_OPCODE)
        }

        fn message_size(&self) -> usize {
            self.len()
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            self.pack(buffer)
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            Set::unpack(buffer)
        }
    }
    /// Same parameters as [`Set`] but the server doesn't answer.
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct SetUnacknowledged(pub Set);
    impl PackableMessage for SetUnacknowledged {
        fn opcode() -> Opcode {
            Opcode::sig(SET_UNACKNOWLEDGED_OPCODE)
        }

        fn message_size(&self) -> usize {
            self.0.len()
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            self.0.pack(buffer)
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            Ok(SetUnacknowledged(Set::unpack(buffer)?))
        }
    }

    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Status {
        pub present: bool,
        /// Target state and remaining time while a transition is running.
        pub target: Option<(bool, TransitionTime)>,
    }
    impl PackableMessage for Status {
        fn opcode() -> Opcode {
            Opcode::sig(STATUS_OPCODE)
        }

        fn message_size(&self) -> usize {
            if self.target.is_some() {
                3
            } else {
                1
            }
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            if buffer.len() < self.message_size() {
                return Err(MessagePackError::SmallBuffer);
            }
            buffer[0] = u8::from(self.present);
            if let Some((target, remaining)) = self.target {
                buffer[1] = u8::from(target);
                buffer[2] = remaining.0;
            }
            Ok(())
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            match buffer {
                [present] => Ok(Status {
                    present: on_off(*present)?,
                    target: None,
                }),
                [present, target, remaining] => Ok(Status {
                    present: on_off(*present)?,
                    target: Some((on_off(*target)?, TransitionTime(*remaining))),
                }),
                _ => Err(MessagePackError::BadLength),
            }
        }
    }
}

pub mod level {
    use super::{Transition, TransitionTime};
    use crate::access::Opcode;
    use crate::bytes::ToFromBytesEndian;
    use crate::models::{MessagePackError, PackableMessage};

    pub const GET_OPCODE: u16 = 0x8205;
    pub const SET_OPCODE: u16 = 0x8206;
    pub const SET_UNACKNOWLEDGED_OPCODE: u16 = 0x8207;
    pub const STATUS_OPCODE: u16 = 0x8208;

    fn level_at(buffer: &[u8], pos: usize) -> Result<i16, MessagePackError> {
        buffer
            .get(pos..pos + 2)
            .and_then(i16::from_bytes_le)
            .ok_or(MessagePackError::BadLength)
    }

    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Get;
    impl PackableMessage for Get {
        fn opcode() -> Opcode {
            Opcode::sig(GET_OPCODE)
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
    pub struct Set {
        pub level: i16,
        pub tid: u8,
        pub transition: Option<Transition>,
    }
    impl Set {
        fn len(&self) -> usize {
            3 + super::transition_len(self.transition)
        }
        fn pack(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            if buffer.len() < self.len() {
                return Err(MessagePackError::SmallBuffer);
            }
            buffer[..2].copy_from_slice(&self.level.to_bytes_le());
            buffer[2] = self.tid;
            super::pack_transition(self.transition, &mut buffer[3..]);
            Ok(())
        }
        fn unpack(buffer: &[u8]) -> Result<Set, MessagePackError> {
            Ok(Set {
                level: level_at(buffer, 0)?,
                tid: *buffer.get(2).ok_or(MessagePackError::BadLength)?,
                transition: super::unpack_transition(&buffer[3..])?,
            })
        }
    }
    impl PackableMessage for Set {
        fn opcode() -> Opcode {
            Opcode::sig(SET_OPCODE)
        }

        fn message_size(&self) -> usize {
            self.len()
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            self.pack(buffer)
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            Set::unpack(buffer)
        }
    }
    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct SetUnacknowledged(pub Set);
    impl PackableMessage for SetUnacknowledged {
        fn opcode() -> Opcode {
            Opcode::sig(SET_UNACKNOWLEDGED_OPCODE)
        }

        fn message_size(&self) -> usize {
            self.0.len()
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            self.0.pack(buffer)
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            Ok(SetUnacknowledged(Set::unpack(buffer)?))
        }
    }

    #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
    pub struct Status {
        pub present: i16,
        pub target: Option<(i16, TransitionTime)>,
    }
    impl PackableMessage for Status {
        fn opcode() -> Opcode {
            Opcode::sig(STATUS_OPCODE)
        }

        fn message_size(&self) -> usize {
            if self.target.is_some() {
                5
            } else {
                2
            }
        }

        fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
            if buffer.len() < self.message_size() {
                return Err(MessagePackError::SmallBuffer);
            }
            buffer[..2].copy_from_slice(&self.present.to_bytes_le());
            if let Some((target, remaining)) = self.target {
                buffer[2..4].copy_from_slice(&target.to_bytes_le());
                buffer[4] = remaining.0;
            }
            Ok(())
        }

        fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
            match buffer.len() {
                2 => Ok(Status {
                    present: level_at(buffer, 0)?,
                    target: None,
                }),
                5 => Ok(Status {
                    present: level_at(buffer, 0)?,
                    target: Some((level_at(buffer, 2)?, TransitionTime(buffer[4]))),
                }),
                _ => Err(MessagePackError::BadLength),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PackableMessage;

    #[test]
    fn test_onoff_set() {
        let set = onoff::Set {
            on_off: true,
            tid: 7,
            transition: Some(Transition {
                time: TransitionTime(0x41),
                delay: 2,
            }),
        };
        assert_eq!(
            set.to_access_message().unwrap().to_bytes().unwrap(),
            vec![0x82, 0x02, 0x01, 0x07, 0x41, 0x02]
        );
        let unack = onoff::SetUnacknowledged(onoff::Set {
            transition: None,
            ..set
        });
        assert_eq!(
            unack.to_access_message().unwrap().to_bytes().unwrap(),
            vec![0x82, 0x03, 0x01, 0x07]
        );
        assert_eq!(
            onoff::Set::unpack_from(&[0x02, 0x07]),
            Err(MessagePackError::BadBytes)
        );
        assert_eq!(
            onoff::Set::unpack_from(&[0x01, 0x07, 0x41]),
            Err(MessagePackError::BadLength)
        );
    }
    #[test]
    fn test_onoff_status() {
        assert_eq!(
            onoff::Status::unpack_from(&[0x01]),
            Ok(onoff::Status {
                present: true,
                target: None
            })
        );
        assert_eq!(
            onoff::Status::unpack_from(&[0x00, 0x01, 0x0A]),
            Ok(onoff::Status {
                present: false,
                target: Some((true, TransitionTime(0x0A)))
            })
        );
        assert_eq!(TransitionTime(0x0A).as_millis(), Some(1_000));
        assert_eq!(TransitionTime(0x3F).as_millis(), None);
    }
    #[test]
    fn test_level() {
        let set = level::Set {
            level: -2,
            tid: 1,
            transition: None,
        };
        assert_eq!(
            set.to_access_message().unwrap().to_bytes().unwrap(),
            vec![0x82, 0x06, 0xFE, 0xFF, 0x01]
        );
        assert_eq!(
            level::Status::unpack_from(&[0x00, 0x80, 0xFF, 0x7F, 0x05]),
            Ok(level::Status {
                present: i16::MIN,
                target: Some((i16::MAX, TransitionTime(0x05)))
            })
        );
        assert_eq!(
            level::Status::unpack_from(&[0x00]),
            Err(MessagePackError::BadLength)
        );
    }
}
