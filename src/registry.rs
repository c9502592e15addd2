//! Serial port enumeration for operator selection.

use crate::constants::NO_PORTS_SENTINEL;
use serialport::SerialPortInfo;

/// Function used to enumerate ports
pub type Enumerator = fn() -> serialport::Result<Vec<SerialPortInfo>>;

/// Lists the host's serial devices at call time
#[derive(Clone, Copy)]
pub struct PortRegistry {
    enumerate: Enumerator,
}

impl Default for PortRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PortRegistry {
    /// Registry over `serialport::available_ports`
    pub fn new() -> Self {
        Self::with_enumerator(serialport::available_ports)
    }

    /// Registry over a custom enumeration function
    pub fn with_enumerator(enumerate: Enumerator) -> Self {
        Self { enumerate }
    }

    /// Device names in OS order. Enumeration failure reads as "none found".
    pub fn list_ports(&self) -> Vec<String> {
        match (self.enumerate)() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                log::warn!("Port enumeration failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Entries for a port picker; the sentinel stands in for an empty list
    pub fn port_choices(&self) -> Vec<String> {
        let ports = self.list_ports();
        if ports.is_empty() {
            vec![NO_PORTS_SENTINEL.to_string()]
        } else {
            ports
        }
    }

    /// Whether `port` is the "none found" placeholder
    pub fn is_sentinel(port: &str) -> bool {
        port == NO_PORTS_SENTINEL
    }
}
