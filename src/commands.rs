//! Per-command translation logic and the default command table.
//!
//! A control request is turned into a device command by a [`Translator`],
//! and the device's reply is turned back into a control response by a
//! [`Responder`]. Both are closed sets of variants, dispatched by `match`.
//!
//! Device commands always carry a 4-byte big-endian argument:
//!
//! `55 AA 07 C1 C2 C3 A3 A2 A1 A0 XOR F0`
//!
//! Control responses share one header shape:
//!
//! `55 LEN 00 CMD 33 [payload..] CS EB AA`

use snafu::{OptionExt, ResultExt, Snafu};

use crate::codec::{
    self, ControlFrameBuilder, DeviceFrameBuilder, FrameBytes, CONTROL_RESPONSE_MARKER,
};
use crate::mapping::{MappingEntry, Matcher};
use crate::types::{device_cmd, key, Access, CorrelationTag, DeviceCommand, Direction};

/// Control response byte acknowledging a command.
pub const ACK: u8 = 0x01;
/// Control response byte rejecting a command.
pub const NAK: u8 = 0x00;
/// Device response status of a successful command.
pub const DEVICE_STATUS_OK: u8 = 0x00;

/// Length of the argument of every device command.
const ARGUMENT_LEN: usize = 4;
/// Position of the status byte in a device response.
const DEVICE_STATUS_OFFSET: usize = 3;

/// Error type for this module
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The request payload ends before the value the command needs.
    #[snafu(display("Request payload too short, {} bytes needed", needed))]
    MissingValue { needed: usize },
    /// The request value has no device counterpart.
    #[snafu(display("No device value for request value {:#04x}", value))]
    UnmappedValue { value: u8 },
    /// The device reply carries fewer payload bytes than forwarded.
    #[snafu(display("Device reply too short: {} payload bytes", len))]
    ShortReply { len: usize },
    #[snafu(display("Frame encoding failed: {}", source))]
    Codec { source: codec::Error },
}

/// How a control request becomes the argument of a device command.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum Translator {
    /// Always send this argument.
    Constant(u32),
    /// Send the request's value byte.
    ValueByte,
    /// Use the request's value byte as index into a device value table.
    Lookup(&'static [u32]),
    /// Read query, the argument is zero.
    Query,
    /// Copy `len` request payload bytes from `offset` verbatim. Copies
    /// shorter than the argument are zero-padded in front.
    Copy { offset: usize, len: usize },
}

impl Translator {
    /// Build the device frame for `cmd` from a verified control request.
    /// # Errors
    /// Fails if the request lacks the value this translator needs or if the
    /// value has no device counterpart.
    pub fn translate(&self, cmd: DeviceCommand, request: &[u8]) -> Result<FrameBytes, Error> {
        let mut frame = DeviceFrameBuilder::command(cmd);
        let argument = match *self {
            Translator::Constant(argument) => argument,
            Translator::ValueByte => u32::from(request_value(request)?),
            Translator::Lookup(values) => {
                let value = request_value(request)?;
                *values
                    .get(usize::from(value))
                    .context(UnmappedValueSnafu { value })?
            }
            Translator::Query => 0,
            Translator::Copy { offset, len } => {
                let needed = offset + len;
                let bytes = codec::control_payload(request)
                    .get(offset..needed)
                    .context(MissingValueSnafu { needed })?;
                let padding = ARGUMENT_LEN.saturating_sub(len);
                frame
                    .add_bytes(&[0; ARGUMENT_LEN][..padding])
                    .context(CodecSnafu)?;
                frame.add_bytes(bytes).context(CodecSnafu)?;
                return Ok(frame.finalize());
            }
        };
        frame
            .add_bytes(&argument.to_be_bytes())
            .context(CodecSnafu)?;
        Ok(frame.finalize())
    }
}

/// The value byte following the access flag.
fn request_value(request: &[u8]) -> Result<u8, Error> {
    codec::control_payload_byte(request, 1).context(MissingValueSnafu { needed: 2usize })
}

/// How a device reply becomes the control response.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum Responder {
    /// `33 01` on success, `33 00` when the device reports an error.
    Ack,
    /// `33 VALUE` echoing the request's value byte, NAK on device error.
    EchoValue,
    /// `33 B0 B1 B2 B3` forwarding the device payload, NAK on device error.
    DevicePayload,
}

impl Responder {
    /// Build the control response to `request` from the verified device
    /// reply `reply`.
    ///
    /// Fields are taken by position; the LEN bytes of either frame are not
    /// consulted.
    pub fn respond(&self, reply: &[u8], request: &[u8]) -> Result<FrameBytes, Error> {
        let cmd = codec::command_id(request).context(MissingValueSnafu { needed: 1usize })?;

        let mut frame = ControlFrameBuilder::new(Direction::Response, cmd);
        frame.add_byte(CONTROL_RESPONSE_MARKER).context(CodecSnafu)?;

        if reply.get(DEVICE_STATUS_OFFSET) != Some(&DEVICE_STATUS_OK) {
            frame.add_byte(NAK).context(CodecSnafu)?;
            return Ok(frame.finalize());
        }

        let appended = match *self {
            Responder::Ack => frame.add_byte(ACK),
            Responder::EchoValue => frame.add_byte(request_value(request)?),
            Responder::DevicePayload => {
                let payload = codec::device_payload(reply);
                let value = payload
                    .get(..ARGUMENT_LEN)
                    .context(ShortReplySnafu { len: payload.len() })?;
                frame.add_bytes(value)
            }
        };
        appended.context(CodecSnafu)?;
        Ok(frame.finalize())
    }
}

const ZOOM_LEVELS: &[u32] = &[0x08, 0x10];

const READ: Matcher = Matcher::Access(Access::Read);
const SET: Matcher = Matcher::Access(Access::Set);

/// The camera's command catalogue, sorted by key.
pub static DEFAULT_COMMANDS: &[MappingEntry] = &[
    MappingEntry::new(
        key(0x00, 0x03),
        Access::Read,
        device_cmd(0x02, 0x02, 0x10),
        Translator::Query,
        Responder::DevicePayload,
        "Status",
    )
    .tagged(CorrelationTag::Status),
    MappingEntry::new(
        key(0x00, 0x04),
        Access::Read,
        device_cmd(0x02, 0x02, 0x20),
        Translator::Query,
        Responder::DevicePayload,
        "Temperature",
    )
    .tagged(CorrelationTag::Temperature),
    MappingEntry::new(
        key(0x00, 0x05),
        Access::Read,
        device_cmd(0x02, 0x02, 0x30),
        Translator::Query,
        Responder::DevicePayload,
        "Version",
    )
    .tagged(CorrelationTag::Version),
    MappingEntry::new(
        key(0x00, 0x11),
        Access::Set,
        device_cmd(0x01, 0x00, 0x04),
        Translator::Constant(1),
        Responder::Ack,
        "Save settings",
    ),
    MappingEntry::new(
        key(0x00, 0x15),
        Access::Set,
        device_cmd(0x01, 0x00, 0x07),
        Translator::ValueByte,
        Responder::Ack,
        "Auto shutter state",
    )
    .matching(SET)
    .tagged(CorrelationTag::AutoNuc),
    MappingEntry::new(
        key(0x00, 0x15),
        Access::Read,
        device_cmd(0x01, 0x00, 0x80),
        Translator::Query,
        Responder::DevicePayload,
        "Auto shutter state read",
    )
    .matching(READ)
    .tagged(CorrelationTag::AutoNuc),
    MappingEntry::new(
        key(0x00, 0x16),
        Access::Set,
        device_cmd(0x02, 0x01, 0x08),
        Translator::Constant(1),
        Responder::Ack,
        "Manual NUC",
    ),
    MappingEntry::new(
        key(0x00, 0x17),
        Access::Set,
        device_cmd(0x01, 0x00, 0x01),
        Translator::Copy { offset: 1, len: 2 },
        Responder::Ack,
        "Auto shutter period",
    )
    .matching(SET)
    .tagged(CorrelationTag::AutoNuc),
    MappingEntry::new(
        key(0x00, 0x17),
        Access::Read,
        device_cmd(0x01, 0x00, 0x80),
        Translator::Query,
        Responder::DevicePayload,
        "Auto shutter period read",
    )
    .matching(READ)
    .tagged(CorrelationTag::AutoNuc),
    MappingEntry::new(
        key(0x00, 0x2A),
        Access::Set,
        device_cmd(0x02, 0x00, 0x06),
        Translator::Lookup(ZOOM_LEVELS),
        Responder::Ack,
        "Zoom",
    ),
    MappingEntry::new(
        key(0x00, 0x2D),
        Access::Set,
        device_cmd(0x02, 0x00, 0x04),
        Translator::Constant(0x09),
        Responder::Ack,
        "Image palette black hot",
    )
    .matching(Matcher::SetValue(1))
    .tagged(CorrelationTag::ImagePalette),
    MappingEntry::new(
        key(0x00, 0x2D),
        Access::Set,
        device_cmd(0x02, 0x00, 0x04),
        Translator::Constant(0x00),
        Responder::Ack,
        "Image palette white hot",
    )
    .matching(Matcher::SetValue(0))
    .tagged(CorrelationTag::ImagePalette),
    MappingEntry::new(
        key(0x00, 0x2D),
        Access::Read,
        device_cmd(0x02, 0x00, 0x80),
        Translator::Query,
        Responder::DevicePayload,
        "Image palette read",
    )
    .matching(READ)
    .tagged(CorrelationTag::ImagePalette),
    MappingEntry::new(
        key(0x00, 0x30),
        Access::Set,
        device_cmd(0x02, 0x00, 0x05),
        Translator::ValueByte,
        Responder::Ack,
        "Image flip",
    ),
    MappingEntry::new(
        key(0x00, 0x31),
        Access::Set,
        device_cmd(0x02, 0x0D, 0x06),
        Translator::ValueByte,
        Responder::Ack,
        "Image filter",
    ),
    MappingEntry::new(
        key(0x00, 0x32),
        Access::Set,
        device_cmd(0x01, 0x00, 0x02),
        Translator::ValueByte,
        Responder::Ack,
        "Analog video pause",
    ),
    MappingEntry::new(
        key(0x00, 0x3A),
        Access::Set,
        device_cmd(0x02, 0x02, 0x06),
        Translator::ValueByte,
        Responder::Ack,
        "AGC mode",
    ),
    MappingEntry::new(
        key(0x00, 0x3B),
        Access::Set,
        device_cmd(0x02, 0x02, 0x1F),
        Translator::ValueByte,
        Responder::EchoValue,
        "Contrast",
    )
    .matching(SET)
    .tagged(CorrelationTag::BrightnessContrast),
    MappingEntry::new(
        key(0x00, 0x3B),
        Access::Read,
        device_cmd(0x02, 0x04, 0x80),
        Translator::Query,
        Responder::DevicePayload,
        "Contrast read",
    )
    .matching(READ)
    .tagged(CorrelationTag::BrightnessContrast),
    MappingEntry::new(
        key(0x00, 0x3C),
        Access::Set,
        device_cmd(0x02, 0x02, 0x1E),
        Translator::ValueByte,
        Responder::EchoValue,
        "Brightness",
    )
    .matching(SET)
    .tagged(CorrelationTag::BrightnessContrast),
    MappingEntry::new(
        key(0x00, 0x3C),
        Access::Read,
        device_cmd(0x02, 0x04, 0x80),
        Translator::Query,
        Responder::DevicePayload,
        "Brightness read",
    )
    .matching(READ)
    .tagged(CorrelationTag::BrightnessContrast),
];
