//! Caller-facing controller handle
//!
//! Thin wrapper over [`Session`] with the forgiving surface applications
//! expect: `connect` reports success as a bool, and moves, clicks and button
//! queries simply do nothing (or report "released") while disconnected.

use super::buttons::{Button, ButtonStates};
use super::logger::WireLog;
use super::session::{Session, SessionConfig};
use super::transport::Channel;
use tracing::error;

/// Controller handle
pub struct Controller {
    config: SessionConfig,
    wire_log: Option<WireLog>,
    session: Option<Session>,
}

impl Controller {
    /// Create a disconnected controller
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            wire_log: None,
            session: None,
        }
    }

    /// Attach a wire trace used by the next connect
    #[must_use]
    pub fn with_wire_log(mut self, log: WireLog) -> Self {
        self.wire_log = Some(log);
        self
    }

    /// Find and open the controller. Errors are logged, not returned.
    pub async fn connect(&mut self) -> bool {
        self.close().await;
        match Session::open_with(
            &super::discovery::SystemPorts,
            self.config.clone(),
            self.wire_log.clone(),
        )
        .await
        {
            Ok(session) => {
                self.session = Some(session);
                true
            }
            Err(e) => {
                error!("Could not connect to controller: {}", e);
                false
            }
        }
    }

    /// Connect over an already open channel
    pub async fn connect_channel(&mut self, channel: Box<dyn Channel>) -> bool {
        self.close().await;
        match Session::establish_with_log(channel, self.config.clone(), self.wire_log.clone())
            .await
        {
            Ok(session) => {
                self.session = Some(session);
                true
            }
            Err(e) => {
                error!("Could not connect to controller: {}", e);
                false
            }
        }
    }

    /// Whether a live session exists
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_connected)
    }

    /// Relative move; fractional deltas are truncated toward zero
    pub fn move_by(&self, dx: f64, dy: f64) {
        if let Some(session) = &self.session {
            #[allow(clippy::cast_possible_truncation)]
            session.move_relative(dx as i32, dy as i32);
        }
    }

    /// Primary button click
    pub fn click(&self) {
        if let Some(session) = &self.session {
            session.click();
        }
    }

    /// Whether `button` is held; false while disconnected
    pub fn is_pressed(&self, button: Button) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_pressed(button))
    }

    /// Snapshot of every button
    pub fn buttons(&self) -> ButtonStates {
        self.session
            .as_ref()
            .map(Session::buttons)
            .unwrap_or_default()
    }

    /// Underlying session, if connected once
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Close the current session, if any
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::BOOTSTRAP_BAUD;
    use crate::core::transport::MemoryChannel;

    #[tokio::test]
    async fn test_disconnected_controller_is_inert() {
        let controller = Controller::new(SessionConfig::default());
        assert!(!controller.is_connected());
        controller.move_by(10.0, 10.0);
        controller.click();
        assert!(!controller.is_pressed(Button::Left));
        assert_eq!(controller.buttons(), ButtonStates::new());
    }

    #[tokio::test]
    async fn test_move_truncates_toward_zero() {
        let (channel, probe) = MemoryChannel::new(BOOTSTRAP_BAUD);
        let mut controller = Controller::new(SessionConfig::default());
        assert!(controller.connect_channel(Box::new(channel)).await);
        probe.take_written();

        controller.move_by(3.9, -2.7);
        assert_eq!(probe.take_written(), b"km.move(3,-2, 10, ctrl_x=50, ctrl_y=60\r)");

        controller.close().await;
        assert!(!controller.is_connected());
    }

    #[tokio::test]
    async fn test_connect_channel_failure_returns_false() {
        let (channel, probe) = MemoryChannel::new(BOOTSTRAP_BAUD);
        probe.fail_writes(true);
        let mut controller = Controller::new(SessionConfig::default());
        assert!(!controller.connect_channel(Box::new(channel)).await);
        assert!(controller.session().is_none());
    }
}
