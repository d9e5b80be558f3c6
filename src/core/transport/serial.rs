//! Serial port transport implementation

use super::{Channel, TransportError};
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., COM3, /dev/ttyACM0)
    pub port: String,
    /// Baud rate the port is opened at
    pub baud_rate: u32,
    /// Read timeout
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl SerialConfig {
    /// Create a new serial configuration with a 100 ms read timeout
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            timeout: Duration::from_millis(100),
        }
    }

    /// Set read timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port channel
pub struct SerialChannel {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Open the port described by `config` (8N1, no flow control)
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::Connection(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{}: {}", config.port, e),
                )),
                _ => TransportError::Connection(e.into()),
            })?;

        Ok(Self {
            name: config.port.clone(),
            port,
        })
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Channel for SerialChannel {
    fn bytes_to_read(&self) -> io::Result<u32> {
        self.port.bytes_to_read().map_err(io::Error::from)
    }

    fn baud_rate(&self) -> io::Result<u32> {
        self.port.baud_rate().map_err(io::Error::from)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()> {
        self.port.set_baud_rate(baud_rate).map_err(io::Error::from)
    }

    fn try_clone_channel(&self) -> io::Result<Box<dyn Channel>> {
        let port = self.port.try_clone().map_err(io::Error::from)?;
        Ok(Box::new(Self {
            name: self.name.clone(),
            port,
        }))
    }

    fn description(&self) -> String {
        match self.port.baud_rate() {
            Ok(baud) => format!("{} @ {} baud", self.name, baud),
            Err(_) => self.name.clone(),
        }
    }
}

/// Durations stored as integer milliseconds in config files
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SerialConfig::new("/dev/ttyACM0", 115_200);
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.timeout, Duration::from_millis(100));

        let config = config.timeout(Duration::from_millis(5));
        assert_eq!(config.timeout, Duration::from_millis(5));
    }

    #[test]
    fn test_open_missing_port_is_connection_error() {
        let config = SerialConfig::new("/dev/makcu-does-not-exist", 115_200);
        match SerialChannel::open(&config) {
            Err(TransportError::Connection(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opened a port that should not exist"),
        }
    }
}
