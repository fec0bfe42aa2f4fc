//! The bridge between the two links.
//!
//! See [`Bridge`] for more details.

use log::warn;

use crate::assembler::{ControlAssembler, DeviceAssembler};
use crate::codec::FrameBytes;
use crate::config::{BridgeConfig, TRACKER_CAPACITY};
use crate::engine::{TranslateError, TranslationEngine};
use crate::mapping::MappingTable;
use crate::types::Link;

/// Monotonic millisecond clock. The counter may wrap.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<F> Clock for F
where
    F: Fn() -> u32,
{
    fn now_ms(&self) -> u32 {
        self()
    }
}

/// Blocking transmitters for both links.
pub trait Transport {
    /// Send `frame` to the device, returns false on failure.
    fn transmit_device(&mut self, frame: &[u8]) -> bool;
    /// Send `frame` to the control peer, returns false on failure.
    fn transmit_control(&mut self, frame: &[u8]) -> bool;
}

/// A frame to be sent on one of the links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    link: Link,
    data: FrameBytes,
}

impl Transmission {
    /// The link to send the frame on.
    pub fn link(&self) -> Link {
        self.link
    }

    /// Returns the data to be sent.
    pub fn get_data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> FrameBytes {
        self.data
    }
}

/// Result of feeding one byte to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No complete frame yet.
    NeedData,
    /// A frame was translated and is to be (or has been) transmitted.
    Send(Transmission),
    /// A complete frame was received but dropped.
    Dropped(TranslateError),
    /// The transport refused the translated frame.
    TransmitFailed(Transmission),
}

/// Sans-io protocol bridge for one control/device link pair.
///
/// Feed every received byte to [`receive_byte()`](Self::receive_byte) and
/// transmit what it hands back, or let
/// [`on_byte_received()`](Self::on_byte_received) do the transmitting.
/// Call [`poll_timeouts()`](Self::poll_timeouts) periodically to evict
/// requests the device never answered.
///
/// # Example
///
/// ```
/// use camlink_bridge::{Bridge, Link, Outcome};
///
/// let mut bridge = Bridge::new(|| 0u32);
///
/// // manual NUC request from the control side
/// let request = [0xAA, 0x05, 0x00, 0x16, 0x01, 0x00, 0xC6, 0xEB, 0xAA];
/// let mut outcome = Outcome::NeedData;
/// for byte in request {
///     outcome = bridge.receive_byte(Link::Control, byte);
/// }
/// match outcome {
///     Outcome::Send(tx) => {
///         assert_eq!(tx.link(), Link::Device);
///         assert_eq!(&tx.get_data()[..6], &[0x55, 0xAA, 0x07, 0x02, 0x01, 0x08]);
///     }
///     other => panic!("unexpected {:?}", other),
/// }
/// assert_eq!(bridge.pending_count(), 1);
/// ```
#[derive(Debug)]
pub struct Bridge<C, const N: usize = TRACKER_CAPACITY> {
    control: ControlAssembler,
    device: DeviceAssembler,
    engine: TranslationEngine<N>,
    clock: C,
    config: BridgeConfig,
}

impl<C: Clock> Bridge<C> {
    /// Bridge with the default configuration and command table.
    pub fn new(clock: C) -> Self {
        Self::with_config(clock, BridgeConfig::default())
    }

    pub fn with_config(clock: C, config: BridgeConfig) -> Self {
        Self::with_table(clock, config, MappingTable::default())
    }
}

impl<C: Clock, const N: usize> Bridge<C, N> {
    /// Bridge translating with a custom command table.
    pub fn with_table(clock: C, config: BridgeConfig, table: MappingTable) -> Self {
        Self {
            control: ControlAssembler::control(config.control_silence_ms),
            device: DeviceAssembler::device(config.device_silence_ms),
            engine: TranslationEngine::new(table, config.command_timeout_ms),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn engine(&self) -> &TranslationEngine<N> {
        &self.engine
    }

    pub fn pending_count(&self) -> usize {
        self.engine.pending_count()
    }

    /// Process one byte received on `link`.
    ///
    /// When the byte completes a frame, the frame is translated and the
    /// result is returned for transmission on the other link.
    pub fn receive_byte(&mut self, link: Link, byte: u8) -> Outcome {
        let now_ms = self.clock.now_ms();
        match link {
            Link::Control => match self.control.push_byte(byte, now_ms) {
                Some(frame) => {
                    let result = self.engine.translate_control(&frame, now_ms);
                    outcome(link, &frame, result)
                }
                None => Outcome::NeedData,
            },
            Link::Device => match self.device.push_byte(byte, now_ms) {
                Some(frame) => {
                    let result = self.engine.process_device_response(&frame);
                    outcome(link, &frame, result)
                }
                None => Outcome::NeedData,
            },
        }
    }

    /// Process one byte received on `link` and transmit the translated frame,
    /// if any, through `transport`.
    ///
    /// A request whose device command couldn't be sent stays pending until
    /// it expires.
    pub fn on_byte_received<T: Transport>(
        &mut self,
        link: Link,
        byte: u8,
        transport: &mut T,
    ) -> Outcome {
        match self.receive_byte(link, byte) {
            Outcome::Send(tx) => {
                let sent = match tx.link {
                    Link::Device => transport.transmit_device(&tx.data),
                    Link::Control => transport.transmit_control(&tx.data),
                };
                if sent {
                    Outcome::Send(tx)
                } else {
                    warn!("Transmit on {} link failed", tx.link);
                    Outcome::TransmitFailed(tx)
                }
            }
            outcome => outcome,
        }
    }

    /// Evict expired requests, returns how many were evicted.
    pub fn poll_timeouts(&mut self) -> usize {
        let now_ms = self.clock.now_ms();
        self.engine.check_timeouts(now_ms)
    }

    /// Drop partial frames on both links.
    pub fn reset_links(&mut self) {
        self.control.reset();
        self.device.reset();
    }
}

fn outcome(link: Link, frame: &[u8], result: Result<FrameBytes, TranslateError>) -> Outcome {
    match result {
        Ok(data) => Outcome::Send(Transmission {
            link: other_link(link),
            data,
        }),
        Err(err) => {
            warn!("Dropped {} frame {:02X?}: {}", link, frame, err);
            Outcome::Dropped(err)
        }
    }
}

fn other_link(link: Link) -> Link {
    match link {
        Link::Control => Link::Device,
        Link::Device => Link::Control,
    }
}
