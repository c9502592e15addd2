//! List Ports Example
//!
//! Prints the serial ports an operator could pick, exactly as the control
//! panel offers them (the "No ports found" entry stands in for none).
//!
//! Usage:
//!   cargo run --example list_ports

use bottle_filler::{PortRegistry, SessionConfig};

fn main() -> bottle_filler::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SessionConfig::from_env()?;
    log::info!(
        "Polling every {} ms once connected (read timeout {} ms)",
        config.poll_interval_ms,
        config.read_timeout_ms
    );

    for port in PortRegistry::new().port_choices() {
        println!("{}", port);
    }
    Ok(())
}
