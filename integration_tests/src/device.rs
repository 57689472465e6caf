//! Serial link standing in for the Uno.
//!
//! The host's USB-serial adapter is wired to the bridge UART (GPIO17/GPIO18),
//! so this side receives RGB lines and prints tank status lines.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

use crate::protocol::{build_tank_line, parse_rgb_line};

/// Find candidate USB-serial adapters.
pub fn find_uart_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .filter(|p| p.port_name.contains("ttyUSB") || p.port_name.contains("ttyACM"))
        .map(|p| p.port_name)
        .collect())
}

/// Resolve a port argument - returns the port path if not "auto", otherwise auto-detects.
pub fn resolve_port(port_arg: &str) -> Result<String> {
    if port_arg != "auto" {
        return Ok(port_arg.to_string());
    }

    match find_uart_ports()?.into_iter().next() {
        Some(port) => Ok(port),
        None => anyhow::bail!("No serial adapter found - ensure the UART is connected"),
    }
}

/// Host end of the bridge UART.
pub struct UnoLink {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl UnoLink {
    /// Open the link.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(50))
            .open()?;

        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }

    /// Drain all pending data from the serial port.
    pub fn drain_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        self.pending.clear();

        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Print a tank status line as the Uno would.
    pub fn send_tank(&mut self, tanks: [i32; 3]) -> Result<()> {
        self.send_raw(&build_tank_line(tanks))
    }

    /// Send arbitrary text, for malformed-input tests.
    pub fn send_raw(&mut self, text: &str) -> Result<()> {
        self.port.write_all(text.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one newline-terminated line, or `None` if nothing arrives in time.
    pub fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let start = Instant::now();
        let mut buf = [0u8; 64];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line[..pos]).into_owned();
                return Ok(Some(text));
            }

            if start.elapsed() >= timeout {
                return Ok(None);
            }

            match self.port.read(&mut buf) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Wait for an RGB command from the bridge.
    pub fn expect_rgb(&mut self, timeout: Duration) -> Result<[u8; 3]> {
        match self.read_line(timeout)? {
            Some(line) => parse_rgb_line(&line),
            None => anyhow::bail!("Timeout waiting for RGB line"),
        }
    }

    /// Fail if the bridge sends anything within `window`.
    pub fn expect_silence(&mut self, window: Duration) -> Result<()> {
        match self.read_line(window)? {
            Some(line) => anyhow::bail!("Expected no output, got {:?}", line),
            None => Ok(()),
        }
    }
}
