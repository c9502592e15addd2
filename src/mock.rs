//! In-memory filling machine for development and testing without hardware.
//!
//! `MockDevice` records every byte written to its "wire" and serves queued
//! inbound bytes. With echo enabled it answers each command line with
//! `OK <command>`, which is enough to watch the status channel work:
//!
//!   BOTTLE_FILLER_MOCK=1 RUST_LOG=bottle_filler=debug cargo run --example control_panel

use crate::error::{FillerError, Result};
use crate::transport::{Connector, SerialTransport};
use crate::types::ConnectionParams;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct DeviceState {
    ports: Vec<String>,
    wire: Vec<u8>,
    inbound: VecDeque<u8>,
    fail_writes: bool,
    fail_reads: bool,
    echo: bool,
    open_handles: usize,
    last_params: Option<ConnectionParams>,
}

/// Shared handle on a simulated device
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// Device reachable under any port name
    pub fn new() -> Self {
        Self::default()
    }

    /// Device reachable only under the given port names
    pub fn with_ports<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let device = Self::default();
        device.lock().ports = ports.into_iter().map(Into::into).collect();
        device
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connector opening transports onto this device
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            device: self.clone(),
        }
    }

    /// Everything written so far
    pub fn written(&self) -> Vec<u8> {
        self.lock().wire.clone()
    }

    /// Written bytes split into lines, terminators removed
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.lock().wire)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Queue bytes for the host to read
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.lock().inbound.extend(bytes.iter().copied());
    }

    /// Make every following write fail as if the cable was pulled
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make polling fail as if the device vanished
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Answer every written command line with `OK <command>`
    pub fn set_echo(&self, echo: bool) {
        self.lock().echo = echo;
    }

    /// Transports currently open and not yet dropped
    pub fn open_handles(&self) -> usize {
        self.lock().open_handles
    }

    /// Parameters of the most recent successful open
    pub fn last_params(&self) -> Option<ConnectionParams> {
        self.lock().last_params.clone()
    }
}

/// Connector handing out transports onto a `MockDevice`
#[derive(Debug, Clone)]
pub struct MockConnector {
    device: MockDevice,
}

impl Connector for MockConnector {
    fn open(
        &self,
        params: &ConnectionParams,
        _read_timeout: Duration,
    ) -> Result<Box<dyn SerialTransport>> {
        let mut state = self.device.lock();
        if !state.ports.is_empty() && !state.ports.contains(&params.port) {
            return Err(FillerError::Connect {
                port: params.port.clone(),
                source: serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "no such device",
                ),
            });
        }
        state.open_handles += 1;
        state.last_params = Some(params.clone());
        log::info!("[MOCK FILLER] Opened {} at {} baud", params.port, params.baud_rate);
        Ok(Box::new(MockPort {
            device: self.device.clone(),
        }))
    }
}

struct MockPort {
    device: MockDevice,
}

impl SerialTransport for MockPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.device.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"));
        }
        state.wire.extend_from_slice(data);
        if state.echo {
            for line in String::from_utf8_lossy(data).lines() {
                let reply = format!("OK {}\n", line);
                state.inbound.extend(reply.bytes());
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let state = self.device.lock();
        if state.fail_reads {
            return Err(FillerError::SerialPort(serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                "device disconnected",
            )));
        }
        Ok(state.inbound.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let mut state = self.device.lock();
        let n = buffer.len().min(state.inbound.len());
        for (slot, byte) in buffer.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        let mut state = self.device.lock();
        state.open_handles = state.open_handles.saturating_sub(1);
        log::info!("[MOCK FILLER] Closed");
    }
}
