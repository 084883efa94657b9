//! Serial port handling
//!
//! Opens the sensor's serial device as an async byte stream and enumerates
//! USB ports it could be attached to.

use serialport::{SerialPortInfo, SerialPortType};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use super::TransportError;

/// A USB serial port the sensor may be attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path (e.g. "/dev/ttyACM0" or "COM3")
    pub name: String,
    /// USB vendor ID
    pub vid: u16,
    /// USB product ID
    pub pid: u16,
    /// Product string reported by the device
    pub product: Option<String>,
}

impl PortInfo {
    fn from_usb(info: SerialPortInfo) -> Option<Self> {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Some(Self {
                name: info.port_name,
                vid: usb.vid,
                pid: usb.pid,
                product: usb.product,
            }),
            _ => None,
        }
    }
}

/// Keep one entry per device path, ordered by path
fn dedup_sorted(mut ports: Vec<PortInfo>) -> Vec<PortInfo> {
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    ports.dedup_by(|a, b| a.name == b.name);
    ports
}

/// USB serial ports (CDC-ACM and USB-UART bridges); the sensor only
/// attaches over USB, so built-in UARTs are left out
pub fn list_ports() -> Result<Vec<PortInfo>, TransportError> {
    let ports = serialport::available_ports()?
        .into_iter()
        .filter_map(PortInfo::from_usb)
        .collect();
    Ok(dedup_sorted(ports))
}

/// Open the sensor's serial device, 8N1 without flow control
pub fn open_serial(path: &str, baud_rate: u32) -> Result<SerialStream, TransportError> {
    tracing::debug!(path, baud_rate, "opening serial device");
    let stream = tokio_serial::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()?;
    Ok(stream)
}
