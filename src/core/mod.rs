//! Core module containing the controller link
//!
//! This module provides:
//! - Transport layer over a full-duplex serial channel
//! - Port discovery by USB hardware id
//! - Wire protocol: handshake frame, text commands, button report decoder
//! - Session management with a background report listener
//! - Button state model
//! - Wire trace logging
//! - A forgiving caller-facing controller handle

pub mod buttons;
pub mod controller;
pub mod discovery;
pub mod logger;
pub mod protocol;
pub mod session;
pub mod transport;
