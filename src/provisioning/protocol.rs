//! Provisioning Protocol PDUs. Every PDU is one type byte followed by fixed size big endian
//! parameters.
use crate::bytes::ToFromBytesEndian;
use crate::crypto::MIC;
use crate::mesh::ElementCount;
use core::convert::{TryFrom, TryInto};

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
#[repr(u8)]
pub enum Opcode {
    Invite = 0x00,
    Capabilities = 0x01,
    Start = 0x02,
    PublicKey = 0x03,
    InputComplete = 0x04,
    Confirmation = 0x05,
    Random = 0x06,
    Data = 0x07,
    Complete = 0x08,
    Failed = 0x09,
}
impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        opcode as u8
    }
}
impl TryFrom<u8> for Opcode {
    type Error = ProtocolPDUError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Opcode::Invite),
            0x01 => Ok(Opcode::Capabilities),
            0x02 => Ok(Opcode::Start),
            0x03 => Ok(Opcode::PublicKey),
            0x04 => Ok(Opcode::InputComplete),
            0x05 => Ok(Opcode::Confirmation),
            0x06 => Ok(Opcode::Random),
            0x07 => Ok(Opcode::Data),
            0x08 => Ok(Opcode::Complete),
            0x09 => Ok(Opcode::Failed),
            _ => Err(ProtocolPDUError::BadOpcode(value)),
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash, thiserror::Error)]
pub enum ProtocolPDUError {
    #[error("unknown provisioning PDU type {0:#04x}")]
    BadOpcode(u8),
    #[error("PDU fields in an unpackable state")]
    BadState,
    #[error("prohibited or RFU field value")]
    BadBytes,
    #[error("wrong PDU length")]
    BadLength,
    #[error("capabilities report zero elements")]
    ZeroElements,
}

pub trait ProtocolPDU: Sized {
    const OPCODE: Opcode;
    fn opcode(&self) -> Opcode {
        Self::OPCODE
    }
    fn byte_len() -> usize;
    /// # Errors
    /// `BadLength` if `buf.len() != Self::byte_len()`.
    fn pack(&self, buf: &mut [u8]) -> Result<(), ProtocolPDUError>;
    /// # Errors
    /// `BadLength` on a length mismatch, `BadBytes` on invalid field values.
    fn unpack(buf: &[u8]) -> Result<Self, ProtocolPDUError>;
    #[must_use]
    fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0_u8; Self::byte_len()];
        self.pack(&mut out).expect("buffer sized by byte_len");
        out
    }
}
fn expect_len(buf: &[u8], len: usize) -> Result<(), ProtocolPDUError> {
    if buf.len() == len {
        Ok(())
    } else {
        Err(ProtocolPDUError::BadLength)
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub enum PDU {
    Invite(Invite),
    Capabilities(Capabilities),
    Start(Start),
    PublicKey(PublicKey),
    InputComplete(InputComplete),
    Confirmation(Confirmation),
    Random(Random),
    Data(EncryptedProvisioningData),
    Complete(Complete),
    Failed(Failed),
}
impl PDU {
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            PDU::Invite(_) => Invite::OPCODE,
            PDU::Capabilities(_) => Capabilities::OPCODE,
            PDU::Start(_) => Start::OPCODE,
            PDU::PublicKey(_) => PublicKey::OPCODE,
            PDU::InputComplete(_) => InputComplete::OPCODE,
            PDU::Confirmation(_) => Confirmation::OPCODE,
            PDU::Random(_) => Random::OPCODE,
            PDU::Data(_) => EncryptedProvisioningData::OPCODE,
            PDU::Complete(_) => Complete::OPCODE,
            PDU::Failed(_) => Failed::OPCODE,
        }
    }
    /// Type byte followed by the packed parameters.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![u8::from(self.opcode())];
        out.extend(match self {
            PDU::Invite(pdu) => pdu.to_vec(),
            PDU::Capabilities(pdu) => pdu.to_vec(),
            PDU::Start(pdu) => pdu.to_vec(),
            PDU::PublicKey(pdu) => pdu.to_vec(),
            PDU::InputComplete(pdu) => pdu.to_vec(),
            PDU::Confirmation(pdu) => pdu.to_vec(),
            PDU::Random(pdu) => pdu.to_vec(),
            PDU::Data(pdu) => pdu.to_vec(),
            PDU::Complete(pdu) => pdu.to_vec(),
            PDU::Failed(pdu) => pdu.to_vec(),
        });
        out
    }
    /// # Errors
    /// `BadLength` for an empty buffer, otherwise whatever the PDU's `unpack` reports.
    pub fn from_bytes(bytes: &[u8]) -> Result<PDU, ProtocolPDUError> {
        let (&first, buf) = bytes.split_first().ok_or(ProtocolPDUError::BadLength)?;
        // The upper 2 bits of the type byte are padding and must be zero.
        Ok(match Opcode::try_from(first)? {
            Opcode::Invite => PDU::Invite(Invite::unpack(buf)?),
            Opcode::Capabilities => PDU::Capabilities(Capabilities::unpack(buf)?),
            Opcode::Start => PDU::Start(Start::unpack(buf)?),
            Opcode::PublicKey => PDU::PublicKey(PublicKey::unpack(buf)?),
            Opcode::InputComplete => PDU::InputComplete(InputComplete::unpack(buf)?),
            Opcode::Confirmation => PDU::Confirmation(Confirmation::unpack(buf)?),
            Opcode::Random => PDU::Random(Random::unpack(buf)?),
            Opcode::Data => PDU::Data(EncryptedProvisioningData::unpack(buf)?),
            Opcode::Complete => PDU::Complete(Complete::unpack(buf)?),
            Opcode::Failed => PDU::Failed(Failed::unpack(buf)?),
        })
    }
}

/// Attention Timer state in seconds. 0 is off.
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct AttentionTimer(pub u8);

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub struct Invite(pub AttentionTimer);
impl ProtocolPDU for Invite {
    const OPCODE: Opcode = Opcode::Invite;

    fn byte_len() -> usize {
        1
    }

    fn pack(&self, buf: &mut [u8]) -> Result<(), ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        buf[0] = (self.0).0;
        Ok(())
    }

    fn unpack(buf: &[u8]) -> Result<Self, ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        Ok(Invite(AttentionTimer(buf[0])))
    }
}

macro_rules! byte_enum {
    ( $(#[$meta:meta])* $name:ident { $( $variant:ident = $value:literal ),* $(,)? } ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
        #[repr(u8)]
        pub enum $name {
            $( $variant = $value ),*
        }
        impl From<$name> for u8 {
            fn from(v: $name) -> Self {
                v as u8
            }
        }
        impl TryFrom<u8> for $name {
            type Error = ProtocolPDUError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok($name::$variant), )*
                    _ => Err(ProtocolPDUError::BadBytes),
                }
            }
        }
    };
}
byte_enum!(
    /// Only FIPS P-256 Elliptic Curve is defined.
    Algorithm { FIPSP256 = 0x00 }
);
byte_enum!(
    /// Start PDU choice of public key delivery.
    PublicKeyType { NoOOB = 0x00, OOB = 0x01 }
);
byte_enum!(AuthenticationMethodType {
    NoOOB = 0x00,
    StaticOOB = 0x01,
    OutputOOB = 0x02,
    InputOOB = 0x03,
});
byte_enum!(OutputOOBAction {
    Blink = 0x00,
    Beep = 0x01,
    Vibrate = 0x02,
    OutputNumeric = 0x03,
    OutputAlphanumeric = 0x04,
});
byte_enum!(InputOOBAction {
    Push = 0x00,
    Twist = 0x01,
    InputNumber = 0x02,
    InputAlphanumeric = 0x03,
});
impl OutputOOBAction {
    pub const ALL: [OutputOOBAction; 5] = [
        OutputOOBAction::Blink,
        OutputOOBAction::Beep,
        OutputOOBAction::Vibrate,
        OutputOOBAction::OutputNumeric,
        OutputOOBAction::OutputAlphanumeric,
    ];
}
impl InputOOBAction {
    pub const ALL: [InputOOBAction; 4] = [
        InputOOBAction::Push,
        InputOOBAction::Twist,
        InputOOBAction::InputNumber,
        InputOOBAction::InputAlphanumeric,
    ];
}

/// Bitmap of supported algorithms. Bit 0 is FIPS P-256.
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub struct Algorithms(pub u16);
impl Algorithms {
    #[must_use]
    pub const fn supports_p256(self) -> bool {
        self.0 & 1 == 1
    }
}
/// Bitmap of the supported Output OOB actions. Bit `n` is the action with value `n`.
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash, Default)]
pub struct OutputOOBActions(pub u16);
impl OutputOOBActions {
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
    #[must_use]
    pub fn supports(self, action: OutputOOBAction) -> bool {
        self.0 & (1_u16 << u8::from(action)) != 0
    }
}
/// Bitmap of the supported Input OOB actions. Bit `n` is the action with value `n`.
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash, Default)]
pub struct InputOOBActions(pub u16);
impl InputOOBActions {
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
    #[must_use]
    pub fn supports(self, action: InputOOBAction) -> bool {
        self.0 & (1_u16 << u8::from(action)) != 0
    }
}
/// Number of digits/characters of an Input or Output OOB value (1..=8).
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub struct OOBSize(u8);
pub const OOB_SIZE_MAX: u8 = 8;
impl OOBSize {
    /// # Panics
    /// Panics if `size > 8 || size < 1`.
    #[must_use]
    pub fn new(size: u8) -> OOBSize {
        match OOBSize::try_from(size) {
            Ok(size) => size,
            Err(_) => panic!("bad OOB size {}", size),
        }
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}
impl TryFrom<u8> for OOBSize {
    type Error = ProtocolPDUError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1..=OOB_SIZE_MAX => Ok(OOBSize(value)),
            _ => Err(ProtocolPDUError::BadBytes),
        }
    }
}
impl From<OOBSize> for u8 {
    fn from(size: OOBSize) -> Self {
        size.0
    }
}
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub enum AuthenticationMethod {
    NoOOB,
    StaticOOB,
    OutputOOB(OutputOOBAction, OOBSize),
    InputOOB(InputOOBAction, OOBSize),
}
impl AuthenticationMethod {
    #[must_use]
    pub const fn method_type(&self) -> AuthenticationMethodType {
        match self {
            AuthenticationMethod::NoOOB => AuthenticationMethodType::NoOOB,
            AuthenticationMethod::StaticOOB => AuthenticationMethodType::StaticOOB,
            AuthenticationMethod::OutputOOB(_, _) => AuthenticationMethodType::OutputOOB,
            AuthenticationMethod::InputOOB(_, _) => AuthenticationMethodType::InputOOB,
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub struct Capabilities {
    pub num_elements: ElementCount,
    pub algorithms: Algorithms,
    /// Device can deliver its public key out of band.
    pub public_key_oob: bool,
    pub static_oob: bool,
    pub output_oob_size: Option<OOBSize>,
    pub output_oob_actions: OutputOOBActions,
    pub input_oob_size: Option<OOBSize>,
    pub input_oob_actions: InputOOBActions,
}
impl Capabilities {
    /// Single element, P-256, no OOB of any kind.
    #[must_use]
    pub const fn minimal(num_elements: ElementCount) -> Capabilities {
        Capabilities {
            num_elements,
            algorithms: Algorithms(1),
            public_key_oob: false,
            static_oob: false,
            output_oob_size: None,
            output_oob_actions: OutputOOBActions(0),
            input_oob_size: None,
            input_oob_actions: InputOOBActions(0),
        }
    }
}
fn bool_byte(b: u8) -> Result<bool, ProtocolPDUError> {
    match b {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ProtocolPDUError::BadBytes),
    }
}
fn optional_size(b: u8) -> Result<Option<OOBSize>, ProtocolPDUError> {
    if b == 0 {
        Ok(None)
    } else {
        Ok(Some(OOBSize::try_from(b)?))
    }
}
impl ProtocolPDU for Capabilities {
    const OPCODE: Opcode = Opcode::Capabilities;

    fn byte_len() -> usize {
        11
    }

    fn pack(&self, buf: &mut [u8]) -> Result<(), ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        if self.output_oob_actions.is_zero() && self.output_oob_size.is_some()
            || self.input_oob_actions.is_zero() && self.input_oob_size.is_some()
        {
            return Err(ProtocolPDUError::BadState);
        }
        buf[0] = self.num_elements.0;
        buf[1..3].copy_from_slice(&self.algorithms.0.to_bytes_be());
        buf[3] = u8::from(self.public_key_oob);
        buf[4] = u8::from(self.static_oob);
        buf[5] = self.output_oob_size.map_or(0, u8::from);
        buf[6..8].copy_from_slice(&self.output_oob_actions.0.to_bytes_be());
        buf[8] = self.input_oob_size.map_or(0, u8::from);
        buf[9..11].copy_from_slice(&self.input_oob_actions.0.to_bytes_be());
        Ok(())
    }

    fn unpack(buf: &[u8]) -> Result<Self, ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        let num_elements = ElementCount(buf[0]);
        if num_elements.0 == 0 {
            return Err(ProtocolPDUError::ZeroElements);
        }
        let out = Capabilities {
            num_elements,
            algorithms: Algorithms(u16::from_bytes_be(&buf[1..3]).expect("hard coded length")),
            public_key_oob: bool_byte(buf[3])?,
            static_oob: bool_byte(buf[4])?,
            output_oob_size: optional_size(buf[5])?,
            output_oob_actions: OutputOOBActions(
                u16::from_bytes_be(&buf[6..8]).expect("hard coded length"),
            ),
            input_oob_size: optional_size(buf[8])?,
            input_oob_actions: InputOOBActions(
                u16::from_bytes_be(&buf[9..11]).expect("hard coded length"),
            ),
        };
        if out.output_oob_actions.is_zero() && out.output_oob_size.is_some()
            || out.input_oob_actions.is_zero() && out.input_oob_size.is_some()
        {
            return Err(ProtocolPDUError::BadBytes);
        }
        Ok(out)
    }
}
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub struct Start {
    pub algorithm: Algorithm,
    pub public_key_type: PublicKeyType,
    pub auth_method: AuthenticationMethod,
}
impl ProtocolPDU for Start {
    const OPCODE: Opcode = Opcode::Start;

    fn byte_len() -> usize {
        5
    }

    fn pack(&self, buf: &mut [u8]) -> Result<(), ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        buf[0] = self.algorithm.into();
        buf[1] = self.public_key_type.into();
        buf[2] = self.auth_method.method_type().into();
        let (action, size) = match self.auth_method {
            AuthenticationMethod::NoOOB | AuthenticationMethod::StaticOOB => (0, 0),
            AuthenticationMethod::OutputOOB(action, size) => (action.into(), size.into()),
            AuthenticationMethod::InputOOB(action, size) => (action.into(), size.into()),
        };
        buf[3] = action;
        buf[4] = size;
        Ok(())
    }

    fn unpack(buf: &[u8]) -> Result<Self, ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        let auth_method = match AuthenticationMethodType::try_from(buf[2])? {
            AuthenticationMethodType::NoOOB | AuthenticationMethodType::StaticOOB
                if buf[3] != 0 || buf[4] != 0 =>
            {
                return Err(ProtocolPDUError::BadBytes)
            }
            AuthenticationMethodType::NoOOB => AuthenticationMethod::NoOOB,
            AuthenticationMethodType::StaticOOB => AuthenticationMethod::StaticOOB,
            AuthenticationMethodType::OutputOOB => {
                AuthenticationMethod::OutputOOB(buf[3].try_into()?, buf[4].try_into()?)
            }
            AuthenticationMethodType::InputOOB => {
                AuthenticationMethod::InputOOB(buf[3].try_into()?, buf[4].try_into()?)
            }
        };
        Ok(Start {
            algorithm: Algorithm::try_from(buf[0])?,
            public_key_type: PublicKeyType::try_from(buf[1])?,
            auth_method,
        })
    }
}
pub const KEY_COMPONENT_LEN: usize = 32;
/// P-256 public key as raw X and Y coordinates.
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug, Default)]
pub struct PublicKey {
    pub x: [u8; KEY_COMPONENT_LEN],
    pub y: [u8; KEY_COMPONENT_LEN],
}
impl ProtocolPDU for PublicKey {
    const OPCODE: Opcode = Opcode::PublicKey;

    fn byte_len() -> usize {
        KEY_COMPONENT_LEN * 2
    }

    fn pack(&self, buf: &mut [u8]) -> Result<(), ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        buf[..KEY_COMPONENT_LEN].copy_from_slice(&self.x[..]);
        buf[KEY_COMPONENT_LEN..].copy_from_slice(&self.y[..]);
        Ok(())
    }

    fn unpack(buf: &[u8]) -> Result<Self, ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        let mut out = PublicKey::default();
        out.x.copy_from_slice(&buf[..KEY_COMPONENT_LEN]);
        out.y.copy_from_slice(&buf[KEY_COMPONENT_LEN..]);
        Ok(out)
    }
}

macro_rules! empty_pdu {
    ( $name:ident, $opcode:expr ) => {
        #[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash, Default)]
        pub struct $name;
        impl ProtocolPDU for $name {
            const OPCODE: Opcode = $opcode;

            fn byte_len() -> usize {
                0
            }
            fn pack(&self, buf: &mut [u8]) -> Result<(), ProtocolPDUError> {
                expect_len(buf, 0)
            }
            fn unpack(buf: &[u8]) -> Result<Self, ProtocolPDUError> {
                expect_len(buf, 0)?;
                Ok($name)
            }
        }
    };
}
empty_pdu!(InputComplete, Opcode::InputComplete);
empty_pdu!(Complete, Opcode::Complete);

macro_rules! block_pdu {
    ( $(#[$meta:meta])* $name:ident, $opcode:expr ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Default, Debug, Hash)]
        pub struct $name(pub [u8; BLOCK_LEN]);
        impl ProtocolPDU for $name {
            const OPCODE: Opcode = $opcode;

            fn byte_len() -> usize {
                BLOCK_LEN
            }
            fn pack(&self, buf: &mut [u8]) -> Result<(), ProtocolPDUError> {
                expect_len(buf, BLOCK_LEN)?;
                buf.copy_from_slice(&self.0[..]);
                Ok(())
            }
            fn unpack(buf: &[u8]) -> Result<Self, ProtocolPDUError> {
                expect_len(buf, BLOCK_LEN)?;
                let mut out = $name::default();
                out.0.copy_from_slice(buf);
                Ok(out)
            }
        }
    };
}
const BLOCK_LEN: usize = 16;
pub const CONFIRMATION_LEN: usize = BLOCK_LEN;
pub const RANDOM_LEN: usize = BLOCK_LEN;
block_pdu!(
    /// `CMAC_ConfirmationKey(Random || AuthValue)`
    Confirmation,
    Opcode::Confirmation
);
block_pdu!(Random, Opcode::Random);

pub const ENCRYPTED_PROVISIONING_DATA_LEN: usize = 25;
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub struct EncryptedProvisioningData {
    pub data: [u8; ENCRYPTED_PROVISIONING_DATA_LEN],
    pub mic: MIC,
}
impl ProtocolPDU for EncryptedProvisioningData {
    const OPCODE: Opcode = Opcode::Data;

    fn byte_len() -> usize {
        ENCRYPTED_PROVISIONING_DATA_LEN + MIC::big_size()
    }

    fn pack(&self, buf: &mut [u8]) -> Result<(), ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        if !self.mic.is_big() {
            return Err(ProtocolPDUError::BadState);
        }
        buf[..ENCRYPTED_PROVISIONING_DATA_LEN].copy_from_slice(&self.data[..]);
        self.mic
            .be_pack_into(&mut buf[ENCRYPTED_PROVISIONING_DATA_LEN..]);
        Ok(())
    }

    fn unpack(buf: &[u8]) -> Result<Self, ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        let mut data = [0_u8; ENCRYPTED_PROVISIONING_DATA_LEN];
        data.copy_from_slice(&buf[..ENCRYPTED_PROVISIONING_DATA_LEN]);
        let mic = MIC::try_from_bytes_be(&buf[ENCRYPTED_PROVISIONING_DATA_LEN..])
            .expect("hard coded length");
        Ok(EncryptedProvisioningData { data, mic })
    }
}

/// Provisioning Failed error codes.
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Debug)]
pub enum ErrorCode {
    Prohibited,
    InvalidPDU,
    InvalidFormat,
    UnexpectedPDU,
    ConfirmationFailed,
    OutOfResources,
    DecryptionFailed,
    UnexpectedError,
    CannotAssignAddresses,
    /// RFU code sent by the peer.
    Unknown(u8),
}
impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Prohibited => 0x00,
            ErrorCode::InvalidPDU => 0x01,
            ErrorCode::InvalidFormat => 0x02,
            ErrorCode::UnexpectedPDU => 0x03,
            ErrorCode::ConfirmationFailed => 0x04,
            ErrorCode::OutOfResources => 0x05,
            ErrorCode::DecryptionFailed => 0x06,
            ErrorCode::UnexpectedError => 0x07,
            ErrorCode::CannotAssignAddresses => 0x08,
            ErrorCode::Unknown(c) => c,
        }
    }
}
impl From<u8> for ErrorCode {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ErrorCode::Prohibited,
            0x01 => ErrorCode::InvalidPDU,
            0x02 => ErrorCode::InvalidFormat,
            0x03 => ErrorCode::UnexpectedPDU,
            0x04 => ErrorCode::ConfirmationFailed,
            0x05 => ErrorCode::OutOfResources,
            0x06 => ErrorCode::DecryptionFailed,
            0x07 => ErrorCode::UnexpectedError,
            0x08 => ErrorCode::CannotAssignAddresses,
            c => ErrorCode::Unknown(c),
        }
    }
}
impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}({:#04x})", self, u8::from(*self))
    }
}
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Debug, Hash)]
pub struct Failed(pub ErrorCode);
impl ProtocolPDU for Failed {
    const OPCODE: Opcode = Opcode::Failed;

    fn byte_len() -> usize {
        1
    }

    fn pack(&self, buf: &mut [u8]) -> Result<(), ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        buf[0] = self.0.into();
        Ok(())
    }

    fn unpack(buf: &[u8]) -> Result<Self, ProtocolPDUError> {
        expect_len(buf, Self::byte_len())?;
        Ok(Failed(buf[0].into()))
    }
}
