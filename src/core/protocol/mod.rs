//! Controller wire protocol
//!
//! Outbound traffic is a one-off binary handshake followed by `km.*` text
//! commands terminated with a carriage return. Inbound traffic, once the
//! report stream is enabled, is a sequence of single-byte button bitmasks.

pub mod command;
pub mod decoder;

pub use command::{Command, MotionProfile, HANDSHAKE_FRAME};
pub use decoder::{decode_frame, ButtonBitmask, FrameOutcome};

/// Baud rate the port is opened at for the handshake
pub const BOOTSTRAP_BAUD: u32 = 115_200;

/// Baud rate the device runs at after the handshake
pub const OPERATING_BAUD: u32 = 4_000_000;
