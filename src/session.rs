//! SerialSession: one serial connection plus its periodic inbound poll.
//!
//! The transport sits behind a single mutex shared with the poller thread,
//! so writes never interleave on the wire. The handle is released when the
//! session disconnects or is dropped.

use crate::config::SessionConfig;
use crate::constants::{NOTIFICATION_CAPACITY, READ_CHUNK_SIZE};
use crate::error::{FillerError, Result};
use crate::protocol::{encode_line, LineBuffer};
use crate::registry::PortRegistry;
use crate::transport::{Connector, SerialTransport, SystemConnector};
use crate::types::{ConnectionParams, Notification};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use log::Level;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Log levels for wire traffic
#[derive(Debug, Clone, Copy, Default)]
struct WireTrace {
    tx: bool,
    rx: bool,
}

impl WireTrace {
    fn level(enabled: bool) -> Level {
        if enabled {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

struct PortIo {
    transport: Box<dyn SerialTransport>,
    lines: LineBuffer,
    trace: WireTrace,
    /// Set while reads keep failing, so a failure streak is reported once
    read_failing: bool,
}

type SharedPort = Arc<Mutex<PortIo>>;

fn lock(port: &SharedPort) -> MutexGuard<'_, PortIo> {
    port.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PortIo {
    fn write_lines<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<()> {
        for line in lines {
            let line = line.as_ref();
            self.transport
                .write_all(&encode_line(line))
                .and_then(|_| self.transport.flush())
                .map_err(FillerError::Write)?;
            log::log!(WireTrace::level(self.trace.tx), "TX: {}", line);
        }
        Ok(())
    }

    /// Move whatever the OS has buffered into the line buffer without blocking
    fn fill(&mut self) -> Result<()> {
        let mut available = self.transport.bytes_to_read()?;
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while available > 0 {
            let want = available.min(READ_CHUNK_SIZE);
            let n = self.transport.read(&mut chunk[..want])?;
            if n == 0 {
                break;
            }
            let dropped = self.lines.extend(&chunk[..n]);
            if dropped > 0 {
                log::warn!("Discarded {} bytes of unterminated input", dropped);
            }
            available = available.saturating_sub(n);
        }
        Ok(())
    }

    /// Next non-blank line; undecodable lines are logged and yield `None`
    fn take_line(&mut self) -> Option<String> {
        match self.lines.next_line()? {
            Ok(line) if line.is_empty() => None,
            Ok(line) => {
                log::log!(WireTrace::level(self.trace.rx), "RX: {}", line);
                Some(line)
            }
            Err(e) => {
                log::warn!("Dropping inbound line: {}", FillerError::from(e));
                None
            }
        }
    }

    /// Fill the line buffer, returning the error that starts a failure streak
    fn refill(&mut self) -> Option<FillerError> {
        match self.fill() {
            Ok(()) => {
                if self.read_failing {
                    log::info!("Serial reads recovered");
                    self.read_failing = false;
                }
                None
            }
            Err(_) if self.read_failing => None,
            Err(e) => {
                log::warn!("Serial read failed: {}", e);
                self.read_failing = true;
                Some(e)
            }
        }
    }

    fn poll(&mut self) -> Option<String> {
        self.refill();
        self.take_line()
    }
}

/// Background thread polling the port on a fixed cadence
struct Poller {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    fn spawn(
        port: SharedPort,
        interval: Duration,
        display_for: Duration,
        events: Notifier,
    ) -> Result<Self> {
        let (shutdown, stop) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("serial-poll".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop) -> _ => break,
                        recv(ticker) -> _ => {
                            let mut io = lock(&port);
                            if let Some(e) = io.refill() {
                                events.publish(Notification::warning(format!(
                                    "Serial read failed: {}",
                                    e
                                )));
                            }
                            while io.lines.has_line() {
                                if let Some(line) = io.take_line() {
                                    events.publish(
                                        Notification::info(format!("Received: {}", line))
                                            .display_for(display_for),
                                    );
                                }
                            }
                        }
                    }
                }
                log::debug!("Serial poller stopped");
            })?;
        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        // Dropping the sender wakes the thread's select
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Serial poller panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Link {
    params: ConnectionParams,
    port: SharedPort,
    poller: Option<Poller>,
}

/// Bounded notification queue that keeps the newest entries
#[derive(Clone)]
struct Notifier {
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
}

impl Notifier {
    fn new() -> Self {
        let (tx, rx) = bounded(NOTIFICATION_CAPACITY);
        Self { tx, rx }
    }

    fn publish(&self, notification: Notification) {
        let mut pending = notification;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(n)) => {
                    if let Ok(stale) = self.rx.try_recv() {
                        log::debug!("Notification queue full, dropped: {}", stale.message);
                    }
                    pending = n;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Owns a single serial connection
pub struct SerialSession {
    connector: Box<dyn Connector>,
    config: SessionConfig,
    trace: WireTrace,
    link: Option<Link>,
    events: Notifier,
}

impl Default for SerialSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialSession {
    /// Session on the host's serial devices with default settings
    pub fn new() -> Self {
        Self::with_connector(SystemConnector, SessionConfig::default())
    }

    /// Session opening ports through `connector`
    pub fn with_connector(
        connector: impl Connector + 'static,
        config: SessionConfig,
    ) -> Self {
        Self {
            connector: Box::new(connector),
            config,
            trace: WireTrace::default(),
            link: None,
            events: Notifier::new(),
        }
    }

    /// Open the port and start polling it
    pub fn connect(&mut self, params: ConnectionParams) -> Result<()> {
        if let Some(link) = &self.link {
            return Err(FillerError::AlreadyConnected {
                port: link.params.port.clone(),
            });
        }
        let port_name = params.port.trim();
        if port_name.is_empty() || PortRegistry::is_sentinel(port_name) {
            return Err(FillerError::PortUnavailable(
                "No serial ports available".to_string(),
            ));
        }

        let transport = self.connector.open(&params, self.config.read_timeout())?;
        let port = Arc::new(Mutex::new(PortIo {
            transport,
            lines: LineBuffer::new(),
            trace: self.trace,
            read_failing: false,
        }));
        let poller = if self.config.background_poll {
            Some(Poller::spawn(
                Arc::clone(&port),
                self.config.poll_interval(),
                self.config.status_display(),
                self.events.clone(),
            )?)
        } else {
            None
        };

        let status = format!("Connected to {} at {} baud", params.port, params.baud_rate);
        log::info!("{}", status);
        self.notify(Notification::info(status));
        self.link = Some(Link {
            params,
            port,
            poller,
        });
        Ok(())
    }

    /// Stop polling and close the port. Does nothing when already closed.
    pub fn disconnect(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        if let Some(mut poller) = link.poller.take() {
            poller.stop();
        }
        {
            let io = lock(&link.port);
            if !io.lines.is_empty() {
                log::debug!("Discarding {} unread inbound bytes", io.lines.len());
            }
        }
        // Last reference: the transport is closed here
        drop(link.port);
        log::info!("Disconnected from {}", link.params.port);
        self.notify(Notification::info("Disconnected"));
    }

    /// Write one line followed by `\n`. No acknowledgement is awaited.
    pub fn send(&self, line: &str) -> Result<()> {
        self.send_batch(&[line])
    }

    /// Write several lines back to back under one lock.
    ///
    /// Stops at the first failed write; earlier lines stay sent.
    pub fn send_batch<S: AsRef<str>>(&self, lines: &[S]) -> Result<()> {
        let link = self.link.as_ref().ok_or(FillerError::NotConnected)?;
        lock(&link.port).write_lines(lines)
    }

    /// Return one buffered inbound line, if a complete one has arrived
    pub fn poll_once(&self) -> Option<String> {
        let link = self.link.as_ref()?;
        lock(&link.port).poll()
    }

    /// Whether a port is open
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Port and baud rate of the open session
    pub fn connection_params(&self) -> Option<&ConnectionParams> {
        self.link.as_ref().map(|link| &link.params)
    }

    /// Settings the session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Log transmitted and/or received lines at info instead of debug
    pub fn set_wire_trace(&mut self, tx: bool, rx: bool) {
        self.trace = WireTrace { tx, rx };
        if let Some(link) = &self.link {
            lock(&link.port).trace = self.trace;
        }
    }

    /// Receiver for status and error notifications.
    ///
    /// The queue holds `NOTIFICATION_CAPACITY` entries. When nobody drains
    /// it, the oldest entries are dropped to make room for new ones.
    pub fn notifications(&self) -> Receiver<Notification> {
        self.events.rx.clone()
    }

    /// Queue a notification for the operator
    pub fn notify(&self, notification: Notification) {
        self.events.publish(notification);
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NO_PORTS_SENTINEL;
    use crate::mock::MockDevice;
    use crate::types::{BaudRate, Severity};

    fn manual_config() -> SessionConfig {
        SessionConfig {
            background_poll: false,
            ..SessionConfig::default()
        }
    }

    fn session(device: &MockDevice) -> SerialSession {
        SerialSession::with_connector(device.connector(), manual_config())
    }

    fn com3() -> ConnectionParams {
        ConnectionParams::new("COM3", BaudRate::B9600)
    }

    #[test]
    fn connect_opens_handle_and_disconnect_releases_it() {
        let device = MockDevice::with_ports(["COM3"]);
        let mut session = session(&device);
        session.connect(com3()).unwrap();
        assert!(session.is_connected());
        assert_eq!(device.open_handles(), 1);
        assert_eq!(session.connection_params(), Some(&com3()));

        session.disconnect();
        assert!(!session.is_connected());
        assert_eq!(device.open_handles(), 0);
    }

    #[test]
    fn disconnect_twice_is_harmless() {
        let device = MockDevice::new();
        let mut session = session(&device);
        session.disconnect();
        session.connect(com3()).unwrap();
        session.disconnect();
        session.disconnect();
        assert!(!session.is_connected());
    }

    #[test]
    fn unknown_port_fails_to_connect() {
        let device = MockDevice::with_ports(["COM3"]);
        let mut session = session(&device);
        let err = session
            .connect(ConnectionParams::new("COM7", BaudRate::B9600))
            .unwrap_err();
        assert!(matches!(err, FillerError::Connect { ref port, .. } if port == "COM7"));
        assert!(!session.is_connected());
    }

    #[test]
    fn sentinel_and_blank_ports_are_unavailable() {
        let device = MockDevice::new();
        let mut session = session(&device);
        for name in [NO_PORTS_SENTINEL, "", "  "] {
            let err = session
                .connect(ConnectionParams::new(name, BaudRate::B9600))
                .unwrap_err();
            assert!(matches!(err, FillerError::PortUnavailable(_)));
        }
        assert_eq!(device.open_handles(), 0);
    }

    #[test]
    fn second_connect_is_rejected() {
        let device = MockDevice::new();
        let mut session = session(&device);
        session.connect(com3()).unwrap();
        let err = session
            .connect(ConnectionParams::new("COM4", BaudRate::B115200))
            .unwrap_err();
        assert!(matches!(err, FillerError::AlreadyConnected { ref port } if port == "COM3"));
        assert_eq!(device.open_handles(), 1);
    }

    #[test]
    fn send_frames_line_with_newline() {
        let device = MockDevice::new();
        let mut session = session(&device);
        session.connect(com3()).unwrap();
        session.send("SET COUNT 4").unwrap();
        assert_eq!(device.written(), b"SET COUNT 4\n");
    }

    #[test]
    fn send_requires_connection() {
        let device = MockDevice::new();
        let session = session(&device);
        assert!(matches!(session.send("STOP"), Err(FillerError::NotConnected)));
        assert!(device.written().is_empty());
    }

    #[test]
    fn failed_write_surfaces_as_write_error() {
        let device = MockDevice::new();
        let mut session = session(&device);
        session.connect(com3()).unwrap();
        device.set_fail_writes(true);
        assert!(matches!(session.send("STOP"), Err(FillerError::Write(_))));
        assert!(session.is_connected());
    }

    #[test]
    fn poll_once_returns_trimmed_lines_one_at_a_time() {
        let device = MockDevice::new();
        let mut session = session(&device);
        session.connect(com3()).unwrap();
        assert_eq!(session.poll_once(), None);

        device.push_inbound(b"  Bottle 1 filled \r\nBottle 2");
        assert_eq!(session.poll_once().as_deref(), Some("Bottle 1 filled"));
        assert_eq!(session.poll_once(), None);

        device.push_inbound(b" filled\n");
        assert_eq!(session.poll_once().as_deref(), Some("Bottle 2 filled"));
    }

    #[test]
    fn poll_once_swallows_invalid_utf8() {
        let device = MockDevice::new();
        let mut session = session(&device);
        session.connect(com3()).unwrap();
        device.push_inbound(&[0xc3, 0x28, b'\n']);
        device.push_inbound(b"READY\n");
        assert_eq!(session.poll_once(), None);
        assert_eq!(session.poll_once().as_deref(), Some("READY"));
    }

    #[test]
    fn poll_once_when_disconnected_is_empty() {
        let device = MockDevice::new();
        let session = session(&device);
        device.push_inbound(b"READY\n");
        assert_eq!(session.poll_once(), None);
    }

    #[test]
    fn background_poller_publishes_received_lines() {
        let device = MockDevice::new();
        let config = SessionConfig {
            poll_interval_ms: 10,
            ..SessionConfig::default()
        };
        let mut session = SerialSession::with_connector(device.connector(), config);
        let events = session.notifications();
        session.connect(com3()).unwrap();
        assert_eq!(
            events.recv_timeout(Duration::from_secs(1)).unwrap().message,
            "Connected to COM3 at 9600 baud"
        );

        device.push_inbound(b"Cycle complete\n");
        let received = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(received.message, "Received: Cycle complete");
        assert_eq!(received.severity, Severity::Info);
        assert_eq!(received.display_for, Some(Duration::from_millis(3000)));

        session.disconnect();
        assert_eq!(device.open_handles(), 0);
    }

    #[test]
    fn dropping_session_closes_port() {
        let device = MockDevice::new();
        {
            let mut session =
                SerialSession::with_connector(device.connector(), SessionConfig::default());
            session.connect(com3()).unwrap();
            assert_eq!(device.open_handles(), 1);
        }
        assert_eq!(device.open_handles(), 0);
    }

    #[test]
    fn poll_once_survives_failing_reads() {
        let device = MockDevice::new();
        let mut session = session(&device);
        session.connect(com3()).unwrap();
        device.push_inbound(b"READY\n");
        device.set_fail_reads(true);
        assert_eq!(session.poll_once(), None);
        assert_eq!(session.poll_once(), None);
        assert!(session.is_connected());

        device.set_fail_reads(false);
        assert_eq!(session.poll_once().as_deref(), Some("READY"));
    }

    #[test]
    fn read_failure_streak_is_reported_once() {
        let device = MockDevice::new();
        let config = SessionConfig {
            poll_interval_ms: 10,
            ..SessionConfig::default()
        };
        let mut session = SerialSession::with_connector(device.connector(), config);
        let events = session.notifications();
        session.connect(com3()).unwrap();
        events.recv_timeout(Duration::from_secs(1)).unwrap();

        device.set_fail_reads(true);
        let failure = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(failure.severity, Severity::Warning);
        assert!(failure.message.starts_with("Serial read failed: "));
        assert!(events.recv_timeout(Duration::from_millis(200)).is_err());

        device.set_fail_reads(false);
        device.push_inbound(b"READY\n");
        let received = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(received.message, "Received: READY");
        assert!(session.is_connected());
    }

    #[test]
    fn full_notification_queue_drops_oldest() {
        let device = MockDevice::new();
        let session = session(&device);
        let events = session.notifications();
        for n in 0..NOTIFICATION_CAPACITY + 6 {
            session.notify(Notification::info(n.to_string()));
        }
        let queued: Vec<String> = events.try_iter().map(|n| n.message).collect();
        assert_eq!(queued.len(), NOTIFICATION_CAPACITY);
        assert_eq!(queued.first().map(String::as_str), Some("6"));
        let last = (NOTIFICATION_CAPACITY + 5).to_string();
        assert_eq!(queued.last(), Some(&last));
    }
}
