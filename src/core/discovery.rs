//! Controller discovery
//!
//! Scans the serial ports the OS exposes and picks the one whose hardware id
//! carries the controller's USB signature.

use super::transport::TransportError;
use serde::Serialize;
use serialport::{SerialPortInfo, SerialPortType};

/// USB vendor/product signature of the controller's CH343 bridge
pub const DEFAULT_SIGNATURE: &str = "VID:PID=1A86:55D3";

/// One serial port as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortRecord {
    /// Device path (COM5, /dev/ttyACM0, ...)
    pub path: String,
    /// Hardware id string, e.g. `USB VID:PID=1A86:55D3 SER=... PRODUCT=...`
    pub hardware_id: String,
}

impl PortRecord {
    /// Create a record
    pub fn new(path: impl Into<String>, hardware_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hardware_id: hardware_id.into(),
        }
    }

    /// Case-insensitive substring match against the hardware id
    pub fn matches(&self, signature: &str) -> bool {
        self.hardware_id
            .to_uppercase()
            .contains(&signature.to_uppercase())
    }
}

impl From<SerialPortInfo> for PortRecord {
    fn from(info: SerialPortInfo) -> Self {
        let hardware_id = match &info.port_type {
            SerialPortType::UsbPort(usb) => {
                let mut id = format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid);
                if let Some(serial) = &usb.serial_number {
                    id.push_str(" SER=");
                    id.push_str(serial);
                }
                if let Some(product) = &usb.product {
                    id.push_str(" PRODUCT=");
                    id.push_str(product);
                }
                id
            }
            SerialPortType::PciPort => "PCI".to_string(),
            SerialPortType::BluetoothPort => "BLUETOOTH".to_string(),
            SerialPortType::Unknown => "n/a".to_string(),
        };
        Self {
            path: info.port_name,
            hardware_id,
        }
    }
}

/// Source of serial port listings
#[cfg_attr(test, mockall::automock)]
pub trait PortEnumerator: Send + Sync {
    /// List every serial port currently present
    fn ports(&self) -> Result<Vec<PortRecord>, TransportError>;
}

/// The OS port list, via `serialport::available_ports`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn ports(&self) -> Result<Vec<PortRecord>, TransportError> {
        let ports = serialport::available_ports()
            .map_err(|e| TransportError::Io(e.into()))?;
        Ok(ports.into_iter().map(PortRecord::from).collect())
    }
}

/// Return the path of the first port matching `signature`
pub fn resolve(
    enumerator: &dyn PortEnumerator,
    signature: &str,
) -> Result<String, TransportError> {
    let ports = enumerator.ports()?;
    tracing::debug!("Scanning {} serial ports for {}", ports.len(), signature);

    match ports.into_iter().find(|p| p.matches(signature)) {
        Some(port) => {
            tracing::info!("Controller found on {} ({})", port.path, port.hardware_id);
            Ok(port.path)
        }
        None => {
            tracing::error!("Controller not found in available serial ports");
            Err(TransportError::DeviceNotFound(signature.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn listing() -> Vec<PortRecord> {
        vec![
            PortRecord::new("/dev/ttyS0", "n/a"),
            PortRecord::new("/dev/ttyUSB0", "USB VID:PID=0403:6001 SER=A50285BI"),
            PortRecord::new("/dev/ttyACM0", "usb vid:pid=1a86:55d3 ser=5847012345"),
            PortRecord::new("/dev/ttyACM1", "USB VID:PID=1A86:55D3 SER=5847099999"),
        ]
    }

    #[test]
    fn test_resolve_first_match_case_insensitive() {
        let mut enumerator = MockPortEnumerator::new();
        enumerator.expect_ports().times(1).returning(|| Ok(listing()));

        let path = resolve(&enumerator, DEFAULT_SIGNATURE).unwrap();
        assert_eq!(path, "/dev/ttyACM0");
    }

    #[test]
    fn test_resolve_not_found() {
        let mut enumerator = MockPortEnumerator::new();
        enumerator
            .expect_ports()
            .returning(|| Ok(vec![PortRecord::new("COM1", "n/a")]));

        match resolve(&enumerator, DEFAULT_SIGNATURE) {
            Err(TransportError::DeviceNotFound(sig)) => assert_eq!(sig, DEFAULT_SIGNATURE),
            other => panic!("expected DeviceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_empty_listing() {
        let mut enumerator = MockPortEnumerator::new();
        enumerator.expect_ports().returning(|| Ok(Vec::new()));
        assert!(matches!(
            resolve(&enumerator, DEFAULT_SIGNATURE),
            Err(TransportError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_usb_info_renders_hardware_id() {
        let info = SerialPortInfo {
            port_name: "COM7".to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x1A86,
                pid: 0x55D3,
                serial_number: Some("5847012345".to_string()),
                manufacturer: None,
                product: Some("USB Single Serial".to_string()),
            }),
        };
        let record = PortRecord::from(info);
        assert_eq!(record.path, "COM7");
        assert!(record.hardware_id.starts_with("USB VID:PID=1A86:55D3 SER=5847012345"));
        assert!(record.matches(DEFAULT_SIGNATURE));
    }
}
