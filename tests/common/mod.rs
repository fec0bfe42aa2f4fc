#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use camlink_bridge::{Bridge, Clock, Link, Outcome, Transport};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Millisecond clock advanced by hand, shared between test and bridge.
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<u32>>);

impl ManualClock {
    pub fn new(start_ms: u32) -> ManualClock {
        ManualClock(Rc::new(Cell::new(start_ms)))
    }

    pub fn set(&self, now_ms: u32) {
        self.0.set(now_ms);
    }

    pub fn advance(&self, ms: u32) {
        self.0.set(self.0.get().wrapping_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.0.get()
    }
}

/// Both serial links as seen from the bridge: everything transmitted is
/// recorded per link.
#[derive(Default)]
pub struct SerialLinks {
    pub device_tx: Vec<Vec<u8>>,
    pub control_tx: Vec<Vec<u8>>,
    do_write_error: bool,
}

impl SerialLinks {
    pub fn new() -> Rc<RefCell<SerialLinks>> {
        Rc::new(RefCell::new(SerialLinks::default()))
    }

    pub fn trigger_write_error(&mut self) {
        self.do_write_error = true;
    }
}

pub struct SerialIOPlane(Rc<RefCell<SerialLinks>>);

impl SerialIOPlane {
    pub fn new(links: &Rc<RefCell<SerialLinks>>) -> SerialIOPlane {
        SerialIOPlane(links.clone())
    }

    fn transmit(&mut self, link: Link, frame: &[u8]) -> bool {
        let mut inner = self.0.borrow_mut();
        if inner.do_write_error {
            inner.do_write_error = false;
            return false;
        }
        match link {
            Link::Device => inner.device_tx.push(frame.to_vec()),
            Link::Control => inner.control_tx.push(frame.to_vec()),
        }
        true
    }
}

impl Transport for SerialIOPlane {
    fn transmit_device(&mut self, frame: &[u8]) -> bool {
        self.transmit(Link::Device, frame)
    }

    fn transmit_control(&mut self, frame: &[u8]) -> bool {
        self.transmit(Link::Control, frame)
    }
}

/// Feed `bytes` one at a time, returning every outcome other than `NeedData`.
pub fn feed<T: Transport>(
    bridge: &mut Bridge<ManualClock>,
    link: Link,
    bytes: &[u8],
    transport: &mut T,
) -> Vec<Outcome> {
    bytes
        .iter()
        .map(|byte| bridge.on_byte_received(link, *byte, transport))
        .filter(|outcome| *outcome != Outcome::NeedData)
        .collect()
}
