//! Bridge a control peer and a camera attached to two serial ports.
//!
//! Usage: serial_bridge <control port> <device port> [baud rate]

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use camlink_bridge::{Bridge, Link, Outcome, Transport};
use serialport::SerialPort;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct SerialPorts {
    control: Box<dyn SerialPort>,
    device: Box<dyn SerialPort>,
}

impl Transport for SerialPorts {
    fn transmit_device(&mut self, frame: &[u8]) -> bool {
        self.device.write_all(frame).is_ok()
    }

    fn transmit_control(&mut self, frame: &[u8]) -> bool {
        self.control.write_all(frame).is_ok()
    }
}

fn open(path: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
    serialport::new(path, baud_rate)
        .timeout(Duration::from_millis(5))
        .open()
        .with_context(|| format!("Failed to open serial port {}", path))
}

/// Read what is available on `link` and feed it to the bridge.
fn pump<C: camlink_bridge::Clock>(
    bridge: &mut Bridge<C>,
    ports: &mut SerialPorts,
    link: Link,
) -> Result<()> {
    let mut buf = [0u8; 64];
    let port = match link {
        Link::Control => &mut ports.control,
        Link::Device => &mut ports.device,
    };
    let len = match port.read(&mut buf) {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
        Err(e) => return Err(e).context("Serial read failed"),
    };
    for byte in &buf[..len] {
        match bridge.on_byte_received(link, *byte, ports) {
            Outcome::Send(tx) => println!("{} -> {}: {:02X?}", link, tx.link(), tx.get_data()),
            Outcome::Dropped(err) => println!("{} frame dropped: {}", link, err),
            Outcome::TransmitFailed(tx) => bail!("Transmit on {} link failed", tx.link()),
            Outcome::NeedData => {}
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (control_path, device_path) = match (args.next(), args.next()) {
        (Some(control), Some(device)) => (control, device),
        _ => bail!("Usage: serial_bridge <control port> <device port> [baud rate]"),
    };
    let baud_rate = match args.next() {
        Some(rate) => rate.parse().context("Invalid baud rate")?,
        None => 115_200,
    };

    let mut ports = SerialPorts {
        control: open(&control_path, baud_rate)?,
        device: open(&device_path, baud_rate)?,
    };

    let start = Instant::now();
    let mut bridge = Bridge::new(move || start.elapsed().as_millis() as u32);
    let mut last_poll = Instant::now();

    println!("Bridging {} <-> {}", control_path, device_path);
    loop {
        pump(&mut bridge, &mut ports, Link::Control)?;
        pump(&mut bridge, &mut ports, Link::Device)?;

        if last_poll.elapsed() >= POLL_INTERVAL {
            let expired = bridge.poll_timeouts();
            if expired > 0 {
                println!("{} request(s) expired", expired);
            }
            last_poll = Instant::now();
        }
    }
}
