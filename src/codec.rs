//! Packet codec for both frame formats.
//!
//! Control frame: `START LEN RESERVED CMD PAYLOAD.. CHECKSUM EB AA`
//!
//! * `START` is `0xAA` for requests and `0x55` for responses.
//! * `LEN` counts RESERVED through CHECKSUM, i.e. payload length + 3.
//! * `CHECKSUM` is the 8-bit sum of every byte before it, START included.
//!
//! Device frame: `55 AA LEN BODY.. CHECKSUM F0`
//!
//! * `BODY` is the command triplet plus argument for commands, or a status
//!   byte plus payload for responses.
//! * `LEN` counts the body bytes, i.e. everything between LEN and CHECKSUM.
//! * `CHECKSUM` is the XOR of LEN and the body.
//!
//! Builders are consumed by `finalize()`, which returns the finished frame.
//! The parse helpers and the decoded views don't re-validate integrity, call
//! [`verify_control_frame`] / [`verify_device_frame`] first.

use arrayvec::ArrayVec;
use snafu::{ensure, OptionExt, Snafu};

use crate::checksum::{control_checksum, control_sum, device_checksum, device_xor};
use crate::nom_parser;
use crate::types::{CommandKey, DeviceCommand, Direction};

/// Capacity of a built frame, header and trailer included.
pub const MAX_FRAME_LEN: usize = 32;

pub const CONTROL_REQUEST_START: u8 = 0xAA;
pub const CONTROL_RESPONSE_START: u8 = 0x55;
pub const CONTROL_END: [u8; 2] = [0xEB, 0xAA];
/// Marker following CMD in every control response.
pub const CONTROL_RESPONSE_MARKER: u8 = 0x33;
pub const CONTROL_MIN_LEN: usize = 8;
const CONTROL_HEADER_LEN: usize = 4;
const CONTROL_TRAILER_LEN: usize = 3;

pub const DEVICE_START: [u8; 2] = [0x55, 0xAA];
pub const DEVICE_END: u8 = 0xF0;
pub const DEVICE_MIN_LEN: usize = 6;
const DEVICE_TRAILER_LEN: usize = 2;

/// Both formats carry their payload from byte index 4 on.
pub const PAYLOAD_OFFSET: usize = 4;

/// A finished frame, ready for transmission.
pub type FrameBytes = ArrayVec<u8, MAX_FRAME_LEN>;

/// Error type for this module
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Appending would leave no room for the frame trailer.
    #[snafu(display("Frame overflow: {} bytes needed, {} remaining", needed, remaining))]
    Overflow { needed: usize, remaining: usize },
    /// The bytes don't have the structure of a frame.
    #[snafu(display("Malformed frame"))]
    Malformed,
}

/// Incremental builder for control frames.
///
/// ```
/// use camlink_bridge::codec::ControlFrameBuilder;
/// use camlink_bridge::{Access, Direction};
///
/// let mut frame = ControlFrameBuilder::new(Direction::Request, 0x16);
/// frame.add_byte(Access::Set.flag()).unwrap();
/// frame.add_byte(0x00).unwrap();
/// let frame = frame.finalize();
/// assert_eq!(frame.as_slice(), &[0xAA, 0x05, 0x00, 0x16, 0x01, 0x00, 0xC6, 0xEB, 0xAA]);
/// ```
#[derive(Debug, Clone)]
pub struct ControlFrameBuilder {
    data: FrameBytes,
}

impl ControlFrameBuilder {
    /// Start a frame with header `[START][0][0][cmd]`.
    pub fn new(direction: Direction, cmd: u8) -> Self {
        Self::with_reserved(direction, 0x00, cmd)
    }

    /// Start a frame whose RESERVED/CMD pair carries a full command key.
    pub fn for_key(direction: Direction, key: CommandKey) -> Self {
        Self::with_reserved(direction, key.high(), key.low())
    }

    fn with_reserved(direction: Direction, reserved: u8, cmd: u8) -> Self {
        let mut data = FrameBytes::new();
        data.push(direction.start_byte());
        data.push(0); // LEN, written by finalize()
        data.push(reserved);
        data.push(cmd);
        Self { data }
    }

    /// Number of payload bytes added so far.
    pub fn payload_len(&self) -> usize {
        self.data.len() - CONTROL_HEADER_LEN
    }

    /// Payload bytes that still fit.
    pub fn remaining(&self) -> usize {
        self.data.remaining_capacity() - CONTROL_TRAILER_LEN
    }

    pub fn add_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.add_bytes(&[byte])
    }

    /// Append a little-endian u16.
    pub fn add_u16(&mut self, value: u16) -> Result<(), Error> {
        self.add_bytes(&value.to_le_bytes())
    }

    /// Append a little-endian u32.
    pub fn add_u32(&mut self, value: u32) -> Result<(), Error> {
        self.add_bytes(&value.to_le_bytes())
    }

    /// Append `bytes` to the payload. Nothing is appended if they don't all fit.
    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let remaining = self.remaining();
        ensure!(
            bytes.len() <= remaining,
            OverflowSnafu {
                needed: bytes.len(),
                remaining
            }
        );
        self.data.extend(bytes.iter().copied());
        Ok(())
    }

    /// Write LEN, append the checksum and the end marker.
    pub fn finalize(mut self) -> FrameBytes {
        self.data[1] = (self.payload_len() + CONTROL_TRAILER_LEN) as u8;
        let checksum = control_sum(&self.data);
        // room for the trailer is reserved by add_bytes()
        self.data.push(checksum);
        self.data.extend(CONTROL_END.iter().copied());
        self.data
    }
}

/// Incremental builder for device frames.
///
/// ```
/// use camlink_bridge::codec::DeviceFrameBuilder;
/// use camlink_bridge::device_cmd;
///
/// let mut frame = DeviceFrameBuilder::command(device_cmd(0x02, 0x01, 0x08));
/// frame.add_bytes(&1u32.to_be_bytes()).unwrap();
/// let frame = frame.finalize();
/// assert_eq!(
///     frame.as_slice(),
///     &[0x55, 0xAA, 0x07, 0x02, 0x01, 0x08, 0x00, 0x00, 0x00, 0x01, 0x0D, 0xF0]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct DeviceFrameBuilder {
    data: FrameBytes,
}

impl DeviceFrameBuilder {
    /// Start a frame with header `[55][AA][0][kind]`.
    pub fn new(kind: u8) -> Self {
        let mut data = FrameBytes::new();
        data.extend(DEVICE_START.iter().copied());
        data.push(0); // LEN, written by finalize()
        data.push(kind);
        Self { data }
    }

    /// Start a frame for a full command triplet.
    pub fn command(cmd: DeviceCommand) -> Self {
        let mut builder = Self::new(cmd.kind());
        builder.data.extend(cmd[1..].iter().copied());
        builder
    }

    /// Bytes that still fit before the checksum and end marker.
    pub fn remaining(&self) -> usize {
        self.data.remaining_capacity() - DEVICE_TRAILER_LEN
    }

    pub fn add_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.add_bytes(&[byte])
    }

    /// Append a little-endian u16.
    pub fn add_u16(&mut self, value: u16) -> Result<(), Error> {
        self.add_bytes(&value.to_le_bytes())
    }

    /// Append `bytes`. Nothing is appended if they don't all fit.
    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let remaining = self.remaining();
        ensure!(
            bytes.len() <= remaining,
            OverflowSnafu {
                needed: bytes.len(),
                remaining
            }
        );
        self.data.extend(bytes.iter().copied());
        Ok(())
    }

    /// Write LEN, append the XOR checksum and the end marker.
    pub fn finalize(mut self) -> FrameBytes {
        self.data[2] = (self.data.len() - 3) as u8;
        let checksum = device_xor(&self.data[2..]);
        self.data.push(checksum);
        self.data.push(DEVICE_END);
        self.data
    }
}

/// Check start marker, end marker and checksum of a control frame.
pub fn verify_control_frame(frame: &[u8]) -> bool {
    let len = frame.len();
    len >= CONTROL_MIN_LEN
        && Direction::from_start_byte(frame[0]).is_ok()
        && frame[len - 2..] == CONTROL_END
        && control_checksum(frame) == frame[len - 3]
}

/// Check start markers, end marker and checksum of a device frame.
pub fn verify_device_frame(frame: &[u8]) -> bool {
    let len = frame.len();
    len >= DEVICE_MIN_LEN
        && frame[..2] == DEVICE_START
        && frame[len - 1] == DEVICE_END
        && device_checksum(frame) == frame[len - 2]
}

/// Command identifier of a control frame (byte index 3).
pub fn command_id(frame: &[u8]) -> Option<u8> {
    frame.get(3).copied()
}

/// Command key of a control frame (byte indices 2 and 3).
pub fn command_key(frame: &[u8]) -> Option<CommandKey> {
    match frame.get(2..4) {
        Some(&[kb0, kb1]) => Some(CommandKey::new(kb0, kb1)),
        _ => None,
    }
}

/// Payload section of a control frame.
pub fn control_payload(frame: &[u8]) -> &[u8] {
    frame
        .get(PAYLOAD_OFFSET..frame.len().saturating_sub(CONTROL_TRAILER_LEN))
        .unwrap_or_default()
}

/// Payload section of a device frame.
pub fn device_payload(frame: &[u8]) -> &[u8] {
    frame
        .get(PAYLOAD_OFFSET..frame.len().saturating_sub(DEVICE_TRAILER_LEN))
        .unwrap_or_default()
}

pub fn control_payload_byte(frame: &[u8], offset: usize) -> Option<u8> {
    control_payload(frame).get(offset).copied()
}

/// Little-endian u16 at `offset` into the control payload.
pub fn control_payload_u16(frame: &[u8], offset: usize) -> Option<u16> {
    read_u16(control_payload(frame), offset)
}

pub fn device_payload_byte(frame: &[u8], offset: usize) -> Option<u8> {
    device_payload(frame).get(offset).copied()
}

/// Little-endian u16 at `offset` into the device payload.
pub fn device_payload_u16(frame: &[u8], offset: usize) -> Option<u16> {
    read_u16(device_payload(frame), offset)
}

fn read_u16(payload: &[u8], offset: usize) -> Option<u16> {
    match payload.get(offset..offset.checked_add(2)?) {
        Some(&[lo, hi]) => Some(u16::from_le_bytes([lo, hi])),
        _ => None,
    }
}

/// Decoded view of a control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame<'a> {
    pub direction: Direction,
    pub length: u8,
    pub key: CommandKey,
    pub payload: &'a [u8],
}

impl<'a> ControlFrame<'a> {
    /// Decode a complete control frame, checksum included.
    /// # Errors
    /// Returns [`Error::Malformed`] if the bytes don't form a valid frame.
    pub fn parse(frame: &'a [u8]) -> Result<Self, Error> {
        nom_parser::control_frame(frame).context(MalformedSnafu)
    }

    /// The CMD byte.
    pub fn command(&self) -> u8 {
        self.key.low()
    }
}

/// Decoded view of a device frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFrame<'a> {
    pub length: u8,
    /// Everything between LEN and the checksum.
    pub body: &'a [u8],
}

impl<'a> DeviceFrame<'a> {
    /// Decode a complete device frame, checksum included.
    /// # Errors
    /// Returns [`Error::Malformed`] if the bytes don't form a valid frame.
    pub fn parse(frame: &'a [u8]) -> Result<Self, Error> {
        nom_parser::device_frame(frame).context(MalformedSnafu)
    }

    /// Command triplet, when this is a device command.
    pub fn command(&self) -> Option<DeviceCommand> {
        match self.body.get(..3) {
            Some(&[c1, c2, c3]) => Some(DeviceCommand::from([c1, c2, c3])),
            _ => None,
        }
    }

    /// Argument bytes following the command triplet.
    pub fn argument(&self) -> &'a [u8] {
        self.body.get(3..).unwrap_or_default()
    }

    /// Status byte, when this is a device response.
    pub fn status(&self) -> Option<u8> {
        self.body.first().copied()
    }

    /// Response payload following the status byte.
    pub fn response_payload(&self) -> &'a [u8] {
        self.body.get(1..).unwrap_or_default()
    }
}
