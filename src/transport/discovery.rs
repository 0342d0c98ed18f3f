//! Serial device discovery for finding attached printers

use crate::transport::serial::SerialConnector;
use anyhow::{anyhow, Result};
use gstream_shared::protocol;
use tokio_serial::{SerialPortInfo, SerialPortType};
use tracing::{debug, info};

/// Configuration for serial discovery
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Use exactly these ports instead of enumerating
    pub ports: Vec<String>,
    /// Baud rate for every discovered device
    pub baud_rate: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            baud_rate: protocol::DEFAULT_BAUD_RATE,
        }
    }
}

/// A printer found on a serial port
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Port path, e.g. `/dev/ttyUSB0` or `COM3`
    pub port_name: String,
    /// Short description from the USB descriptor if available
    pub description: String,
    /// Connector for opening this device
    pub connector: SerialConnector,
}

/// Serial port discovery service
pub struct SerialDiscovery {
    config: DiscoveryConfig,
}

impl SerialDiscovery {
    /// Create a new discovery service
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Discover printers on serial ports
    pub fn discover(&self) -> Result<Vec<DiscoveredDevice>> {
        if !self.config.ports.is_empty() {
            info!("[DISCOVERY] Using {} configured port(s)", self.config.ports.len());
            return Ok(self
                .config
                .ports
                .iter()
                .map(|port| self.device(port.clone(), "Configured port".into()))
                .collect());
        }

        let ports = tokio_serial::available_ports()
            .map_err(|e| anyhow!("Failed to enumerate serial ports: {}", e))?;

        Ok(self.select(ports))
    }

    /// Keep the ports that look like controller boards, sorted by name
    fn select(&self, ports: Vec<SerialPortInfo>) -> Vec<DiscoveredDevice> {
        let mut devices: Vec<DiscoveredDevice> = ports
            .into_iter()
            .filter(|port| {
                let keep = is_controller_port(&port.port_name);
                if !keep {
                    debug!("[DISCOVERY] Ignoring {}", port.port_name);
                }
                keep
            })
            .map(|port| {
                let description = describe(&port.port_type);
                self.device(port.port_name, description)
            })
            .collect();

        devices.sort_by(|a, b| a.port_name.cmp(&b.port_name));
        devices
    }

    fn device(&self, port_name: String, description: String) -> DiscoveredDevice {
        DiscoveredDevice {
            connector: SerialConnector::new(port_name.clone(), self.config.baud_rate),
            port_name,
            description,
        }
    }
}

/// Check if a port name matches the patterns printer boards enumerate as
///
/// - Linux: `/dev/ttyUSB*`, `/dev/ttyACM*`
/// - macOS: `/dev/cu.usbserial-*`, `/dev/cu.usbmodem*`
/// - Windows: `COM<n>`
pub fn is_controller_port(port_name: &str) -> bool {
    if let Some(num) = port_name.strip_prefix("COM") {
        return !num.is_empty() && num.chars().all(|c| c.is_ascii_digit());
    }

    ["/dev/ttyUSB", "/dev/ttyACM", "/dev/cu.usbserial-", "/dev/cu.usbmodem"]
        .iter()
        .any(|prefix| port_name.starts_with(prefix))
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => format!(
            "USB {} {}",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port")
        ),
        SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}
