//! Sans-io protocol bridge between a fixed-envelope control link and a
//! framed camera link.
//!
//! Bytes received on either link are assembled into frames, verified and
//! translated into the other link's format. Control requests wait in a
//! bounded FIFO until the camera answers them or they expire.
//!
//! The crate performs no I/O itself: the host feeds received bytes to a
//! [`Bridge`], transmits the frames it returns and supplies a millisecond
//! [`Clock`]. See the `serial_bridge` demo for a host running on two serial
//! ports.
//!
//! The building blocks are usable on their own:
//!
//! * [`checksum`] and [`codec`] build, verify and decode frames of both links.
//! * [`assembler`] cuts a byte stream into frames.
//! * [`mapping`] and [`commands`] describe how each control command
//!   translates.
//! * [`tracker`] holds requests awaiting a response.
//! * [`engine`] ties lookup, translation and tracking together.

pub mod assembler;
pub mod bridge;
mod buffer;
pub mod checksum;
pub mod codec;
pub mod commands;
pub mod config;
pub mod engine;
pub mod mapping;
mod nom_parser;
pub mod tracker;
pub mod types;

pub use assembler::{ControlAssembler, DeviceAssembler, FrameAssembler};
pub use bridge::{Bridge, Clock, Outcome, Transmission, Transport};
pub use codec::FrameBytes;
pub use config::BridgeConfig;
pub use engine::{TranslateError, TranslationEngine};
pub use mapping::{EntryId, MappingEntry, MappingTable, Matcher};
pub use tracker::{PendingEntry, PendingTracker};
pub use types::{
    device_cmd, key, Access, CommandKey, CorrelationTag, DeviceCommand, Direction, Link,
};
