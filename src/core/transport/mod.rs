//! Transport layer for the controller link
//!
//! The session never touches `serialport` directly. It talks to a [`Channel`],
//! a full-duplex byte channel that also exposes the few serial knobs the
//! handshake needs (input queue depth, baud rate switching, handle cloning).
//!
//! Two implementations exist:
//! - [`SerialChannel`] over a real USB-serial port
//! - [`MemoryChannel`], an in-process loopback used for simulation and tests

mod memory;
mod serial;

pub use memory::{MemoryChannel, MemoryProbe};
pub use serial::{SerialChannel, SerialConfig};
pub(crate) use serial::duration_millis;

use std::io::{self, Read, Write};
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// No serial port carries the expected hardware signature
    #[error("Device not found: no serial port matches {0}")]
    DeviceNotFound(String),

    /// I/O failure while opening, configuring or writing to the channel
    #[error("Connection error: {0}")]
    Connection(#[source] io::Error),

    /// I/O failure while the listener was polling the channel
    #[error("Channel read error: {0}")]
    ChannelRead(#[source] io::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error outside the session lifecycle (port enumeration, log files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Full-duplex byte channel to the controller
///
/// Reads and writes may be driven from different threads through separate
/// handles obtained with [`Channel::try_clone_channel`].
pub trait Channel: Read + Write + Send {
    /// Number of bytes waiting in the input queue
    fn bytes_to_read(&self) -> io::Result<u32>;

    /// Current line speed
    fn baud_rate(&self) -> io::Result<u32>;

    /// Change the line speed without closing the handle
    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()>;

    /// Open a second handle onto the same line
    fn try_clone_channel(&self) -> io::Result<Box<dyn Channel>>;

    /// Human readable description (port name, baud)
    fn description(&self) -> String;
}

/// Transport statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TransportStats {
    /// Bytes written to the channel
    pub bytes_sent: u64,
    /// Commands written to the channel
    pub commands_sent: u64,
    /// Report bytes accepted as valid button frames
    pub frames_accepted: u64,
    /// Report bytes discarded as invalid
    pub frames_rejected: u64,
    /// Write or read failures
    pub errors: u64,
    /// Connection uptime in seconds
    pub uptime_secs: u64,
}

/// Returns true for read errors that only mean "nothing arrived in time"
pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
