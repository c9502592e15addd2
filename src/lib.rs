//! # Bottle Filler Control Library
//!
//! A Rust library for driving an automated bottle-filling machine whose
//! microcontroller speaks a newline-terminated text protocol over a serial
//! port.
//!
//! ## Features
//!
//! - Enumerate serial ports for operator selection
//! - Open and close a single serial session with a background inbound poll
//! - Send the fill configuration and start/stop/repeat commands in wire order
//! - Surface firmware status lines and errors on a notification channel
//! - In-memory mock device for development without hardware
//!
//! ## Example
//!
//! ```no_run
//! use bottle_filler::{BaudRate, ConnectionParams, ControlFacade, FillParameters};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut panel = ControlFacade::default();
//!     panel.connect(ConnectionParams::new("/dev/ttyUSB0", BaudRate::B9600))?;
//!     panel.start(&FillParameters::default())?;
//!     panel.stop()?;
//!     panel.disconnect();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod facade;
pub mod mock;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

pub use config::SessionConfig;
pub use error::{FillerError, Result};
pub use facade::ControlFacade;
pub use protocol::Command;
pub use registry::PortRegistry;
pub use session::SerialSession;
pub use transport::{Connector, SerialTransport, SystemConnector};
pub use types::*;
