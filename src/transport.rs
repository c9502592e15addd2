//! Serial transport seam.
//!
//! `Connector` opens ports, `SerialTransport` moves bytes. The system
//! implementation wraps the `serialport` crate; tests plug in fakes.

use crate::error::{FillerError, Result};
use crate::types::ConnectionParams;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

/// An open serial connection.
///
/// Only `Send`: the session keeps it behind a mutex.
pub trait SerialTransport: Send {
    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Push buffered output to the device
    fn flush(&mut self) -> io::Result<()>;

    /// Number of bytes waiting in the OS input buffer
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Read up to `buffer.len()` bytes
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize>;
}

/// Opens transports for a session
pub trait Connector: Send {
    /// Open the port named in `params`
    fn open(
        &self,
        params: &ConnectionParams,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialTransport>>;
}

/// Connector for the host's serial devices
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    fn open(
        &self,
        params: &ConnectionParams,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialTransport>> {
        let port = serialport::new(params.port.as_str(), params.baud_rate.as_u32())
            .timeout(read_timeout)
            .open()
            .map_err(|source| FillerError::Connect {
                port: params.port.clone(),
                source,
            })?;
        Ok(Box::new(SystemPort { port }))
    }
}

/// `serialport` handle; closed when dropped
pub struct SystemPort {
    port: Box<dyn SerialPort>,
}

impl SerialTransport for SystemPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.port)
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.port, buffer)
    }
}
