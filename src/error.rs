//! Error types for bottle-filler operations.

use thiserror::Error;

/// Result type alias for bottle-filler operations.
pub type Result<T> = std::result::Result<T, FillerError>;

/// Error types for serial control of the filling machine.
#[derive(Error, Debug)]
pub enum FillerError {
    /// No port enumerated, or the selected entry is not a real port
    #[error("No serial port available: {0}")]
    PortUnavailable(String),

    /// The port could not be opened
    #[error("Failed to connect to {port}: {source}")]
    Connect {
        /// Port that failed to open
        port: String,
        /// Underlying serial port error
        #[source]
        source: serialport::Error,
    },

    /// A session is already open
    #[error("Already connected to {port}")]
    AlreadyConnected {
        /// Port of the open session
        port: String,
    },

    /// Writing a command to the port failed
    #[error("Failed to send command: {0}")]
    Write(#[source] std::io::Error),

    /// Action requires an open session
    #[error("Not connected to any device")]
    NotConnected,

    /// Inbound bytes were not valid UTF-8
    #[error("Invalid inbound text: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// Baud rate outside the supported set
    #[error("Unsupported baud rate: {0}")]
    InvalidBaudRate(u32),

    /// Malformed configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_operator_alerts() {
        assert_eq!(
            FillerError::NotConnected.to_string(),
            "Not connected to any device"
        );
        assert_eq!(
            FillerError::InvalidBaudRate(1200).to_string(),
            "Unsupported baud rate: 1200"
        );
    }

    #[test]
    fn connect_error_keeps_source() {
        let err = FillerError::Connect {
            port: "COM3".to_string(),
            source: serialport::Error::new(serialport::ErrorKind::NoDevice, "gone"),
        };
        assert!(err.to_string().starts_with("Failed to connect to COM3"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
