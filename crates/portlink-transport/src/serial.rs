use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::info;

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Default line rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial line settings. Defaults to 9600 8N1 without flow control.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Initial read timeout; adjusted later through [`LinkStream::set_read_timeout`].
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Opens serial devices as [`LinkStream`]s.
pub struct SerialLink;

impl SerialLink {
    /// Open `path` (e.g. `/dev/ttyUSB0`, `COM3`) with the given settings.
    pub fn open(path: &str, config: &SerialConfig) -> Result<LinkStream> {
        let port = serialport::new(path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|err| TransportError::Serial {
                path: path.to_string(),
                message: err.to_string(),
            })?;

        info!(path, baud = config.baud_rate, "serial link open");
        Ok(LinkStream::from_serial(port))
    }
}

/// One entry from [`available_ports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSummary {
    pub name: String,
    pub kind: &'static str,
    pub description: Option<String>,
}

/// Enumerate serial devices visible to the OS.
pub fn available_ports() -> Result<Vec<PortSummary>> {
    let ports = serialport::available_ports().map_err(|err| TransportError::Serial {
        path: "<enumerate>".to_string(),
        message: err.to_string(),
    })?;

    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, description) = match port.port_type {
                SerialPortType::UsbPort(usb) => (
                    "usb",
                    usb.product
                        .or(usb.manufacturer)
                        .or_else(|| Some(format!("{:04x}:{:04x}", usb.vid, usb.pid))),
                ),
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortSummary {
                name: port.port_name,
                kind,
                description,
            }
        })
        .collect())
}
