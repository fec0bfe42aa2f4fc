//! Byte-stream framing for the two links.
//!
//! An assembler is fed one byte at a time and hands out a complete frame as
//! soon as the link's end marker arrives. It never blocks and never fails:
//! noise, overlong frames and stalled senders only reset it to idle.

use arrayvec::ArrayVec;
use log::{debug, trace, warn};

use crate::buffer::Buffer;
use crate::codec::{CONTROL_END, DEVICE_END, DEVICE_START};
use crate::config::{CONTROL_RX_CAPACITY, DEVICE_RX_CAPACITY};
use crate::types::{Direction, Link};

/// Assembler for the control link.
pub type ControlAssembler = FrameAssembler<CONTROL_RX_CAPACITY>;
/// Assembler for the device link.
pub type DeviceAssembler = FrameAssembler<DEVICE_RX_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Waiting for a start marker.
    Idle,
    /// Start marker seen, collecting bytes until the end marker.
    Accumulating,
}

#[derive(Debug, Clone)]
pub struct FrameAssembler<const N: usize> {
    link: Link,
    buffer: Buffer<N>,
    silence_ms: Option<u32>,
    last_byte_ms: u32,
}

impl<const N: usize> FrameAssembler<N> {
    /// Create an assembler for `link`. With `silence_ms` set, a gap longer
    /// than that between two bytes of one frame discards the partial frame.
    pub fn new(link: Link, silence_ms: Option<u32>) -> Self {
        Self {
            link,
            buffer: Buffer::new(),
            silence_ms,
            last_byte_ms: 0,
        }
    }

    pub fn link(&self) -> Link {
        self.link
    }

    pub fn state(&self) -> AssemblerState {
        if self.buffer.is_empty() {
            AssemblerState::Idle
        } else {
            AssemblerState::Accumulating
        }
    }

    /// Bytes of the frame collected so far.
    pub fn buffered(&self) -> &[u8] {
        self.buffer.as_ref()
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feed one received byte, `now_ms` being the time of its arrival.
    ///
    /// Returns the complete frame when `byte` finished one.
    pub fn push_byte(&mut self, byte: u8, now_ms: u32) -> Option<ArrayVec<u8, N>> {
        if let (Some(limit), false) = (self.silence_ms, self.buffer.is_empty()) {
            let gap = now_ms.wrapping_sub(self.last_byte_ms);
            if gap > limit {
                warn!(
                    "{} link silent for {} ms, dropping {} buffered bytes",
                    self.link,
                    gap,
                    self.buffer.len()
                );
                self.buffer.clear();
            }
        }
        self.last_byte_ms = now_ms;

        if self.buffer.is_empty() {
            self.start(byte);
            return None;
        }

        if self.link == Link::Device && self.buffer.len() == 1 && byte != DEVICE_START[1] {
            trace!("device link: bad second start byte {:#04x}", byte);
            self.buffer.clear();
            self.start(byte);
            return None;
        }

        if !self.buffer.push(byte) {
            self.overflow();
            return None;
        }

        if self.is_complete() {
            let frame = self.buffer.take();
            debug!("{} link: frame complete {:02X?}", self.link, frame.as_slice());
            return Some(frame);
        }

        if self.buffer.is_full() {
            self.overflow();
        }
        None
    }

    fn start(&mut self, byte: u8) {
        let accepted = match self.link {
            Link::Control => Direction::from_start_byte(byte).is_ok(),
            Link::Device => byte == DEVICE_START[0],
        };
        if accepted {
            self.buffer.push(byte);
        } else {
            trace!("{} link: discarding {:#04x} while idle", self.link, byte);
        }
    }

    fn is_complete(&self) -> bool {
        match self.link {
            Link::Control => self.buffer.ends_with(&CONTROL_END),
            Link::Device => self.buffer.last() == Some(DEVICE_END),
        }
    }

    fn overflow(&mut self) {
        warn!(
            "{} link: no end marker within {} bytes, frame dropped",
            self.link, N
        );
        self.buffer.clear();
    }
}

impl ControlAssembler {
    pub fn control(silence_ms: Option<u32>) -> Self {
        Self::new(Link::Control, silence_ms)
    }
}

impl DeviceAssembler {
    pub fn device(silence_ms: Option<u32>) -> Self {
        Self::new(Link::Device, silence_ms)
    }
}
