//! Outbound commands

use serde::{Deserialize, Serialize};

/// Vendor frame that switches the device into its high-speed command mode.
/// Sent once at the bootstrap baud rate; the device does not answer.
pub const HANDSHAKE_FRAME: [u8; 9] = [0xDE, 0xAD, 0x05, 0x00, 0xA5, 0x00, 0x09, 0x3D, 0x00];

/// Duration and curve parameters appended to every move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionProfile {
    /// Segment count the device spreads the move over
    pub duration: u32,
    /// Bezier control point, x
    pub ctrl_x: i32,
    /// Bezier control point, y
    pub ctrl_y: i32,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            duration: 10,
            ctrl_x: 50,
            ctrl_y: 60,
        }
    }
}

/// Text commands understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `km.buttons(1)` - start the button report stream
    EnableButtonStream,
    /// `km.move(...)` - relative pointer move
    Move {
        /// Horizontal delta
        dx: i32,
        /// Vertical delta
        dy: i32,
        /// Duration and curve
        profile: MotionProfile,
    },
    /// `km.left(1)` then `km.left(0)` - primary button click
    Click,
}

impl Command {
    /// Relative move with the given profile
    pub fn move_by(dx: i32, dy: i32, profile: MotionProfile) -> Self {
        Self::Move { dx, dy, profile }
    }

    /// Exact bytes put on the wire
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::EnableButtonStream => b"km.buttons(1)\r".to_vec(),
            // The terminator sits inside the closing parenthesis; the device
            // accepts this framing and it is kept byte-for-byte.
            Self::Move { dx, dy, profile } => format!(
                "km.move({},{}, {}, ctrl_x={}, ctrl_y={}\r)",
                dx, dy, profile.duration, profile.ctrl_x, profile.ctrl_y
            )
            .into_bytes(),
            Self::Click => b"km.left(1)\r km.left(0)\r".to_vec(),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnableButtonStream => "buttons",
            Self::Move { .. } => "move",
            Self::Click => "click",
        }
    }
}
