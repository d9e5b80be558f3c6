//! # Makcu Core Library
//!
//! Host-side link to the MAKCU USB-serial input controller:
//! - Controller discovery by USB hardware id
//! - Handshake and baud switch to the 4 Mbaud command mode
//! - Background decoding of the button report stream into press/release edges
//! - Lock-serialized `km.move` / `km.left` commands on the same line
//!
//! ## Example
//!
//! ```rust,no_run
//! use makcu_core::{Button, Session, SessionConfig, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = Session::open(SessionConfig::default()).await?;
//!
//!     session.move_relative(25, -10);
//!     session.click();
//!
//!     let mut rx = session.subscribe();
//!     while let Ok(event) = rx.recv().await {
//!         if let SessionEvent::Button(edge) = event {
//!             println!("{edge}");
//!         }
//!         if session.is_pressed(Button::Side2) {
//!             break;
//!         }
//!     }
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::AppConfig;
pub use crate::core::buttons::{Button, ButtonEvent, ButtonStates};
pub use crate::core::controller::Controller;
pub use crate::core::discovery::{PortEnumerator, PortRecord, SystemPorts, DEFAULT_SIGNATURE};
pub use crate::core::logger::{LogFormat, WireLogger};
pub use crate::core::protocol::{Command, MotionProfile};
pub use crate::core::session::{Session, SessionConfig, SessionEvent, StopReason};
pub use crate::core::transport::{
    Channel, MemoryChannel, MemoryProbe, SerialChannel, SerialConfig, TransportError,
    TransportStats,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
