//! Serial transport to the panel hardware
//!
//! One `PanelPort` instance is the sole owner of the serial device; every
//! frame the bridge emits goes through it. The panel speaks 115200 baud
//! and announces itself with an informational `OK:<variant> Ready` line
//! after the USB CDC port re-enumerates.

use anyhow::{Context, Result};
use mfa_bridge::Frame;
use serialport::{SerialPort, SerialPortType};
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

const BAUD_RATE: u32 = 115_200;

/// USB vendor ids of the supported boards (Arduino, SparkFun)
const KNOWN_VIDS: [u16; 2] = [0x2341, 0x1B4F];

/// Substrings that identify the board in a port description
const KNOWN_DESCRIPTIONS: [&str; 5] = ["arduino", "leonardo", "pro micro", "ch340", "cp210"];

/// Find the panel's serial device by USB vendor id or description
pub fn find_panel_port() -> Option<String> {
    let ports = serialport::available_ports().ok()?;
    for info in &ports {
        if let SerialPortType::UsbPort(usb) = &info.port_type {
            if KNOWN_VIDS.contains(&usb.vid) {
                return Some(info.port_name.clone());
            }
            let description = usb.product.as_deref().unwrap_or("").to_lowercase();
            if KNOWN_DESCRIPTIONS.iter().any(|d| description.contains(d)) {
                return Some(info.port_name.clone());
            }
        }
    }
    None
}

/// List all serial ports for the `--list-ports` utility mode
pub fn list_ports() -> Result<Vec<(String, String)>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    Ok(ports
        .into_iter()
        .map(|info| {
            let description = match &info.port_type {
                SerialPortType::UsbPort(usb) => format!(
                    "USB {:04x}:{:04x} {}",
                    usb.vid,
                    usb.pid,
                    usb.product.as_deref().unwrap_or("")
                ),
                other => format!("{:?}", other),
            };
            (info.port_name, description)
        })
        .collect())
}

/// The single owner of the serial transport
pub struct PanelPort {
    port: Box<dyn SerialPort>,
    name: String,
}

impl PanelPort {
    /// Open the panel port and wait out the USB re-enumeration the board
    /// performs on connect. Any boot lines already buffered (the ready
    /// line) are drained into the log.
    pub fn open(name: &str) -> Result<PanelPort> {
        let port = serialport::new(name, BAUD_RATE)
            .timeout(Duration::from_millis(200))
            .open()
            .with_context(|| format!("Failed to open serial port {}", name))?;

        // The board resets when the CDC port opens; give it time to come
        // back before the first command
        std::thread::sleep(Duration::from_secs(2));

        let mut panel = PanelPort {
            port,
            name: name.to_string(),
        };
        panel.drain_boot_lines();
        log::info!("Panel connected on {}", name);
        Ok(panel)
    }

    /// Read whatever the board has already sent (typically the
    /// `OK:<variant> Ready` line) and log it; purely informational.
    fn drain_boot_lines(&mut self) {
        let Ok(clone) = self.port.try_clone() else {
            return;
        };
        let mut reader = BufReader::new(clone);
        let mut line = String::new();
        while let Ok(n) = reader.read_line(&mut line) {
            if n == 0 {
                break;
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                log::debug!("Panel → {}", trimmed);
            }
            line.clear();
        }
    }

    /// Write one frame, newline-terminated
    pub fn send(&mut self, frame: Frame) -> Result<()> {
        let line = frame.to_line();
        log::trace!("Panel ← {}", line);
        self.port
            .write_all(format!("{}\n", line).as_bytes())
            .with_context(|| format!("Serial write to {} failed", self.name))?;
        Ok(())
    }
}
