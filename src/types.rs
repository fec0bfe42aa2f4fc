//! This module defines the small typed values that travel through the bridge:
//! command keys, device command triplets, frame directions and access flags.

use snafu::Snafu;

use core::convert::TryFrom;
use core::fmt;
use core::ops::Deref;

use crate::codec::{CONTROL_REQUEST_START, CONTROL_RESPONSE_START};

/// Error type for this module
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The byte isn't one of the two control-frame start markers.
    #[snafu(display("Invalid control start byte {:#04x}", byte))]
    InvalidStartByte { byte: u8 },
    /// The byte isn't a valid set/read access flag.
    #[snafu(display("Invalid access flag {:#04x}", byte))]
    InvalidAccess { byte: u8 },
}

/// The two physical links the bridge sits between.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum Link {
    /// The older fixed-envelope command/response link.
    Control,
    /// The newer variable-length framed link to the camera.
    Device,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "control"),
            Self::Device => write!(f, "device"),
        }
    }
}

/// 16-bit command key built from the two command-identifying bytes of a
/// control frame header (`KB0` at offset 2, `KB1` at offset 3).
///
/// ## Example
/// ```
/// use camlink_bridge::{key, CommandKey};
/// let k = CommandKey::new(0x00, 0x16);
/// assert_eq!(k, key(0x00, 0x16));
/// assert_eq!(*k, 0x0016);
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct CommandKey(u16);

/// Create a new [`CommandKey`] from its high and low bytes.
pub const fn key(kb0: u8, kb1: u8) -> CommandKey {
    CommandKey(((kb0 as u16) << 8) | kb1 as u16)
}

impl CommandKey {
    /// Combine `kb0` (high byte) and `kb1` (low byte) into a key.
    pub const fn new(kb0: u8, kb1: u8) -> Self {
        key(kb0, kb1)
    }

    /// The high byte, sent in the RESERVED position of a control header.
    pub const fn high(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// The low byte, sent in the CMD position of a control header.
    pub const fn low(self) -> u8 {
        self.0 as u8
    }
}

impl Deref for CommandKey {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u16> for CommandKey {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl PartialEq<u16> for CommandKey {
    fn eq(&self, other: &u16) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}


/// The three command bytes identifying an operation on the device link.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct DeviceCommand([u8; 3]);

/// Create a new [`DeviceCommand`] triplet.
pub const fn device_cmd(c1: u8, c2: u8, c3: u8) -> DeviceCommand {
    DeviceCommand([c1, c2, c3])
}

impl DeviceCommand {
    /// The command type byte, the first byte after the length field.
    pub const fn kind(self) -> u8 {
        self.0[0]
    }
}

impl Deref for DeviceCommand {
    type Target = [u8; 3];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; 3]> for DeviceCommand {
    fn from(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }
}

/// Direction of a control frame, encoded in its start byte.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum Direction {
    /// Sent by the control peer, starts with `0xAA`.
    Request,
    /// Sent back to the control peer, starts with `0x55`.
    Response,
}

impl Direction {
    /// Decode a control frame start byte.
    /// # Errors
    /// Returns [`Error::InvalidStartByte`] for anything but `0xAA` or `0x55`.
    pub fn from_start_byte(byte: u8) -> Result<Self, Error> {
        match byte {
            CONTROL_REQUEST_START => Ok(Self::Request),
            CONTROL_RESPONSE_START => Ok(Self::Response),
            _ => InvalidStartByteSnafu { byte }.fail(),
        }
    }

    pub const fn start_byte(self) -> u8 {
        match self {
            Self::Request => CONTROL_REQUEST_START,
            Self::Response => CONTROL_RESPONSE_START,
        }
    }
}

/// Whether a control request writes or reads a setting.
///
/// Carried as the first payload byte of every control request.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum Access {
    Read,
    Set,
}

impl Access {
    pub const fn flag(self) -> u8 {
        match self {
            Self::Read => 0x00,
            Self::Set => 0x01,
        }
    }
}

impl TryFrom<u8> for Access {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Self::Read),
            0x01 => Ok(Self::Set),
            _ => InvalidAccessSnafu { byte }.fail(),
        }
    }
}

impl From<Access> for u8 {
    fn from(access: Access) -> Self {
        access.flag()
    }
}

/// Identifies which decoded concept a pending request's eventual response
/// represents.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash, Default)]
pub enum CorrelationTag {
    /// Plain acknowledge, no decoded value.
    #[default]
    None,
    ImagePalette,
    BrightnessContrast,
    AutoNuc,
    Status,
    Temperature,
    Version,
}
