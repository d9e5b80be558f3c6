//! Controller session
//!
//! A [`Session`] owns the serial line to one controller. Opening it runs the
//! handshake, then a listener task decodes the button report stream in the
//! background while callers send moves and clicks through a single writer
//! lock.
//!
//! ```text
//!   caller ──move/click──▶ writer lock ──▶ channel (write half)
//!   listener ◀──1 byte──── channel (read half, cloned handle)
//!        │
//!        └──▶ button table + last bitmask (RwLock) ──▶ queries / events
//! ```

use super::buttons::{Button, ButtonEvent, ButtonStates};
use super::discovery::{self, PortEnumerator, SystemPorts, DEFAULT_SIGNATURE};
use super::logger::WireLog;
use super::protocol::{
    decode_frame, Command, FrameOutcome, MotionProfile, BOOTSTRAP_BAUD, HANDSHAKE_FRAME,
    OPERATING_BAUD,
};
use super::transport::{
    is_timeout, Channel, SerialChannel, SerialConfig, TransportError, TransportStats,
};
use parking_lot::{Mutex, RwLock};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Why the listener stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Session closed or dropped
    Closed,
    /// A command write failed and the session dropped its connection
    Disconnected,
    /// The channel failed while polling
    ReadError(String),
}

/// Session events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A button edge was decoded
    Button(ButtonEvent),
    /// A command write failed; the session is no longer connected
    Disconnected,
    /// The listener task exited
    ListenerStopped(StopReason),
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hardware id signature used to find the port
    pub signature: String,
    /// Fixed port path; skips discovery when set
    pub port: Option<String>,
    /// Baud rate for the handshake frame
    pub bootstrap_baud: u32,
    /// Baud rate after the handshake
    pub operating_baud: u32,
    /// Read timeout on the serial handle
    pub read_timeout: Duration,
    /// Listener sleep when no input is waiting
    pub poll_interval: Duration,
    /// Parameters appended to every move
    pub motion: MotionProfile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signature: DEFAULT_SIGNATURE.to_string(),
            port: None,
            bootstrap_baud: BOOTSTRAP_BAUD,
            operating_baud: OPERATING_BAUD,
            read_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1),
            motion: MotionProfile::default(),
        }
    }
}

/// State shared between the session handle and its listener
struct Shared {
    connected: AtomicBool,
    stop: AtomicBool,
    writer: Mutex<Box<dyn Channel>>,
    buttons: RwLock<ButtonStates>,
    stats: RwLock<TransportStats>,
    event_tx: broadcast::Sender<SessionEvent>,
    wire_log: Option<WireLog>,
    connected_at: Instant,
}

impl Shared {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Clear the connection flag; true if it was set.
    ///
    /// Takes the writer lock so no command is mid-write once this returns.
    fn mark_disconnected(&self) -> bool {
        let _writer = self.writer.lock();
        self.connected.swap(false, Ordering::AcqRel)
    }

    /// Best-effort command write. Failures are logged, never returned.
    fn write_command(&self, command: &Command) {
        let bytes = command.encode();
        let result = {
            let mut writer = self.writer.lock();
            // The flag only flips under this lock
            if !self.is_connected() {
                trace!("Dropping {} command, session not connected", command.name());
                return;
            }
            writer.write_all(&bytes).and_then(|()| writer.flush())
        };

        match result {
            Ok(()) => {
                debug!("Sent {} ({} bytes)", command.name(), bytes.len());
                let mut stats = self.stats.write();
                stats.bytes_sent += bytes.len() as u64;
                stats.commands_sent += 1;
                drop(stats);
                if let Some(log) = &self.wire_log {
                    log.lock().log_tx(&bytes);
                }
            }
            Err(e) => {
                let err = TransportError::Connection(e);
                error!("Failed to send {} command: {}", command.name(), err);
                self.stats.write().errors += 1;
                if self.mark_disconnected() {
                    let _ = self.event_tx.send(SessionEvent::Disconnected);
                }
            }
        }
    }

    fn handle_frame(&self, value: u8) {
        let outcome = {
            let mut buttons = self.buttons.write();
            decode_frame(&mut buttons, value)
        };

        if let Some(log) = &self.wire_log {
            log.lock().log_rx(&[value]);
        }

        match outcome {
            FrameOutcome::Rejected(value) => {
                trace!("Discarding invalid button frame 0x{:02X}", value);
                self.stats.write().frames_rejected += 1;
            }
            FrameOutcome::Accepted(events) => {
                for event in events {
                    debug!("Button {}", event);
                    let _ = self.event_tx.send(SessionEvent::Button(event));
                }
                // counted last, so a frame's edges are queued once it shows up here
                self.stats.write().frames_accepted += 1;
            }
        }
    }
}

/// Active controller session
pub struct Session {
    shared: Arc<Shared>,
    description: String,
    motion: MotionProfile,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Find the controller, open it and run the handshake
    pub async fn open(config: SessionConfig) -> Result<Self, TransportError> {
        Self::open_with(&SystemPorts, config, None).await
    }

    /// Like [`Session::open`], with an explicit port source and optional wire log
    pub async fn open_with(
        enumerator: &dyn PortEnumerator,
        config: SessionConfig,
        wire_log: Option<WireLog>,
    ) -> Result<Self, TransportError> {
        let path = match &config.port {
            Some(path) => path.clone(),
            None => discovery::resolve(enumerator, &config.signature)?,
        };

        info!("Opening {} at {} baud", path, config.bootstrap_baud);
        let serial = SerialConfig::new(&path, config.bootstrap_baud).timeout(config.read_timeout);
        let channel = SerialChannel::open(&serial)?;

        Self::establish_with_log(Box::new(channel), config, wire_log).await
    }

    /// Run the handshake over an already open channel and start listening
    pub async fn establish(
        channel: Box<dyn Channel>,
        config: SessionConfig,
    ) -> Result<Self, TransportError> {
        Self::establish_with_log(channel, config, None).await
    }

    /// [`Session::establish`] with a wire trace attached
    pub async fn establish_with_log(
        mut channel: Box<dyn Channel>,
        config: SessionConfig,
        wire_log: Option<WireLog>,
    ) -> Result<Self, TransportError> {
        channel
            .write_all(&HANDSHAKE_FRAME)
            .and_then(|()| channel.flush())
            .map_err(TransportError::Connection)?;
        if let Some(log) = &wire_log {
            log.lock().log_tx(&HANDSHAKE_FRAME);
        }

        channel
            .set_baud_rate(config.operating_baud)
            .map_err(TransportError::Connection)?;

        let reader = channel
            .try_clone_channel()
            .map_err(TransportError::Connection)?;
        let description = channel.description();

        let (event_tx, _) = broadcast::channel(256);
        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            writer: Mutex::new(channel),
            buttons: RwLock::new(ButtonStates::new()),
            stats: RwLock::new(TransportStats::default()),
            event_tx,
            wire_log,
            connected_at: Instant::now(),
        });

        let enable = Command::EnableButtonStream.encode();
        {
            let mut writer = shared.writer.lock();
            writer
                .write_all(&enable)
                .and_then(|()| writer.flush())
                .map_err(TransportError::Connection)?;
        }
        if let Some(log) = &shared.wire_log {
            log.lock().log_tx(&enable);
        }

        shared.connected.store(true, Ordering::Release);
        info!("Controller connected ({})", description);

        let listener_shared = shared.clone();
        let poll_interval = config.poll_interval;
        let listener = tokio::task::spawn_blocking(move || {
            listen(&listener_shared, reader, poll_interval);
        });

        Ok(Self {
            shared,
            description,
            motion: config.motion,
            listener: Mutex::new(Some(listener)),
        })
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Port and baud rate
    pub fn connection_info(&self) -> &str {
        &self.description
    }

    /// Relative pointer move. No-op when not connected.
    pub fn move_relative(&self, dx: i32, dy: i32) {
        self.shared
            .write_command(&Command::move_by(dx, dy, self.motion));
    }

    /// Primary button press and release. No-op when not connected.
    pub fn click(&self) {
        self.shared.write_command(&Command::Click);
    }

    /// Whether `button` is currently held down
    pub fn is_pressed(&self, button: Button) -> bool {
        self.shared.buttons.read().is_pressed(button)
    }

    /// Consistent snapshot of every button
    pub fn buttons(&self) -> ButtonStates {
        *self.shared.buttons.read()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Get connection statistics
    pub fn stats(&self) -> TransportStats {
        let mut stats = self.shared.stats.read().clone();
        stats.uptime_secs = self.shared.connected_at.elapsed().as_secs();
        stats
    }

    /// Whether the listener task is still running
    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Disconnect, stop the listener and wait for it to finish
    pub async fn close(&self) {
        // stop first, so the listener reports Closed rather than Disconnected
        self.shared.stop.store(true, Ordering::Release);
        self.shared.mark_disconnected();

        let handle = self.listener.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Listener task ended abnormally: {}", e);
            }
        }
        if let Some(log) = &self.shared.wire_log {
            let mut log = log.lock();
            log.log_info("session closed");
            log.flush();
        }
        info!("Controller session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.mark_disconnected();
    }
}

/// Listener loop: poll, read one byte, decode. Runs on a blocking thread.
fn listen(shared: &Shared, mut reader: Box<dyn Channel>, poll_interval: Duration) {
    let mut byte = [0u8; 1];

    let reason = loop {
        if !shared.is_connected() || shared.stop.load(Ordering::Acquire) {
            // close() raises stop before clearing the flag
            break if shared.stop.load(Ordering::Acquire) {
                StopReason::Closed
            } else {
                StopReason::Disconnected
            };
        }

        match reader.bytes_to_read() {
            Ok(0) => {
                std::thread::sleep(poll_interval);
                continue;
            }
            Ok(_) => {}
            Err(e) => break read_failure(shared, e),
        }

        match reader.read(&mut byte) {
            Ok(0) => {}
            Ok(_) => shared.handle_frame(byte[0]),
            Err(ref e) if is_timeout(e) => {}
            Err(e) => break read_failure(shared, e),
        }
    };

    // Writers must not keep talking to a line nobody is listening on.
    shared.mark_disconnected();
    debug!("Button listener stopped: {:?}", reason);
    let _ = shared.event_tx.send(SessionEvent::ListenerStopped(reason));
}

fn read_failure(shared: &Shared, e: std::io::Error) -> StopReason {
    let err = TransportError::ChannelRead(e);
    error!("Button listener stopping: {}", err);
    shared.stats.write().errors += 1;
    StopReason::ReadError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::discovery::{MockPortEnumerator, PortRecord};
    use crate::core::transport::{MemoryChannel, MemoryProbe};

    async fn memory_session() -> (Session, MemoryProbe) {
        let (channel, probe) = MemoryChannel::new(BOOTSTRAP_BAUD);
        let session = Session::establish(Box::new(channel), SessionConfig::default())
            .await
            .unwrap();
        (session, probe)
    }

    async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_handshake_sequence() {
        let (session, probe) = memory_session().await;

        let mut expected = HANDSHAKE_FRAME.to_vec();
        expected.extend_from_slice(b"km.buttons(1)\r");
        assert_eq!(probe.written(), expected);
        assert_eq!(probe.baud_history(), vec![BOOTSTRAP_BAUD, OPERATING_BAUD]);
        assert!(session.is_connected());
        assert!(session.buttons().pressed().next().is_none());

        session.close().await;
    }

    #[tokio::test]
    async fn test_open_reports_device_not_found() {
        let mut enumerator = MockPortEnumerator::new();
        enumerator
            .expect_ports()
            .returning(|| Ok(vec![PortRecord::new("/dev/ttyS0", "n/a")]));

        let result = Session::open_with(&enumerator, SessionConfig::default(), None).await;
        assert!(matches!(result, Err(TransportError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn test_handshake_write_failure_is_connection_error() {
        let (channel, probe) = MemoryChannel::new(BOOTSTRAP_BAUD);
        probe.fail_writes(true);

        let result = Session::establish(Box::new(channel), SessionConfig::default()).await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }

    #[tokio::test]
    async fn test_listener_decodes_edges() {
        let (session, probe) = memory_session().await;
        let mut rx = session.subscribe();

        probe.push(&[0x01, 0x01, 0x00, 0x02]);

        assert_eq!(next_event(&mut rx).await, SessionEvent::Button(ButtonEvent::Pressed(Button::Left)));
        assert_eq!(next_event(&mut rx).await, SessionEvent::Button(ButtonEvent::Released(Button::Left)));
        assert_eq!(next_event(&mut rx).await, SessionEvent::Button(ButtonEvent::Pressed(Button::Right)));

        assert!(session.is_pressed(Button::Right));
        assert!(!session.is_pressed(Button::Left));
        assert_eq!(session.stats().frames_accepted, 4);

        session.close().await;
    }

    #[tokio::test]
    async fn test_write_failure_disconnects() {
        let (session, probe) = memory_session().await;
        let mut rx = session.subscribe();

        probe.fail_writes(true);
        session.click();

        // Both events arrive, in either order
        let mut seen = Vec::new();
        while seen.len() < 2 {
            seen.push(next_event(&mut rx).await);
        }
        assert!(seen.contains(&SessionEvent::Disconnected));
        assert!(seen.contains(&SessionEvent::ListenerStopped(StopReason::Disconnected)));
        assert!(!session.is_connected());
        assert_eq!(session.stats().errors, 1);

        // Later calls are silent no-ops
        probe.fail_writes(false);
        probe.take_written();
        session.move_relative(1, 1);
        assert!(probe.written().is_empty());

        session.close().await;
    }

    #[tokio::test]
    async fn test_read_error_stops_listener_and_clears_flag() {
        let (session, probe) = memory_session().await;
        let mut rx = session.subscribe();

        probe.fail_reads(true);

        match next_event(&mut rx).await {
            SessionEvent::ListenerStopped(StopReason::ReadError(msg)) => {
                assert!(msg.contains("Channel read error"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!session.is_connected());

        session.close().await;
        assert!(!session.is_listening());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_writes_reach_line_after_close() {
        let (session, probe) = memory_session().await;
        let session = Arc::new(session);
        probe.take_written();
        probe.set_write_chunk(2);

        let mut writers = Vec::new();
        for worker in 0..4 {
            let session = session.clone();
            writers.push(tokio::task::spawn_blocking(move || {
                for i in 0..2_000 {
                    session.move_relative(worker, i);
                }
            }));
        }

        tokio::time::sleep(Duration::from_millis(2)).await;
        session.close().await;
        let at_close = probe.written().len();

        for writer in writers {
            writer.await.unwrap();
        }
        assert_eq!(probe.written().len(), at_close);
        // nothing was cut off mid-command either
        let written = probe.written();
        assert!(written.is_empty() || written.ends_with(b")"));
    }

    #[tokio::test]
    async fn test_close_awaits_listener() {
        let (session, _probe) = memory_session().await;
        let mut rx = session.subscribe();
        assert!(session.is_listening());

        session.close().await;

        assert!(!session.is_connected());
        assert!(!session.is_listening());
        assert_eq!(
            next_event(&mut rx).await,
            SessionEvent::ListenerStopped(StopReason::Closed)
        );
    }
}
