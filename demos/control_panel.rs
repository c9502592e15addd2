//! Control Panel Example
//!
//! A terminal stand-in for the operator panel of the filling machine:
//! - Interactive serial port and baud rate selection (or command-line argument)
//! - Editing fill parameters before each run
//! - Start / Stop / Toggle repeat / Disconnect actions
//! - Status lines from the firmware printed as they arrive
//!
//! Usage:
//!   cargo run --example control_panel                  # Interactive mode
//!   cargo run --example control_panel -- COM3          # Specify port
//!   cargo run --example control_panel -- /dev/ttyUSB0 115200
//!
//! Without hardware, use the mock device (it answers every command with "OK"):
//!   BOTTLE_FILLER_MOCK=1 cargo run --example control_panel -- mock
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example control_panel

use bottle_filler::constants::*;
use bottle_filler::mock::MockDevice;
use bottle_filler::{
    BaudRate, ConnectionParams, ControlFacade, FillParameters, FillerError, Notification,
    PortRegistry, Result, SerialSession, SessionConfig, SessionState, Severity,
};
use crossbeam_channel::Receiver;
use inquire::{CustomType, InquireError, Select};
use log::{error, info};

fn prompt_error(e: InquireError) -> FillerError {
    std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("Selection cancelled: {}", e),
    )
    .into()
}

/// Interactive serial port selection using inquire
fn select_port() -> Result<String> {
    let choices = PortRegistry::new().port_choices();
    Select::new("Select a serial port:", choices)
        .prompt()
        .map_err(prompt_error)
}

fn select_baud() -> Result<BaudRate> {
    let default_index = BaudRate::ALL
        .iter()
        .position(|b| b.as_u32() == DEFAULT_BAUD_RATE)
        .unwrap_or(0);
    Select::new("Select baud rate:", BaudRate::ALL.to_vec())
        .with_starting_cursor(default_index)
        .prompt()
        .map_err(prompt_error)
}

fn edit_parameters(current: FillParameters) -> Result<FillParameters> {
    let fill_time_secs = CustomType::<f64>::new("Fill time (s):")
        .with_default(current.fill_time_secs)
        .with_help_message(&format!(
            "{} to {}, step {}",
            FILL_TIME_RANGE.0, FILL_TIME_RANGE.1, FILL_TIME_STEP
        ))
        .prompt()
        .map_err(prompt_error)?;
    let bottle_count = CustomType::<u32>::new("Bottle count:")
        .with_default(current.bottle_count)
        .with_help_message(&format!("{} to {}", BOTTLE_COUNT_RANGE.0, BOTTLE_COUNT_RANGE.1))
        .prompt()
        .map_err(prompt_error)?;
    let bottle_distance_cm = CustomType::<f64>::new("Bottle distance (cm):")
        .with_default(current.bottle_distance_cm)
        .with_help_message(&format!(
            "{} to {}, step {}",
            BOTTLE_DISTANCE_RANGE.0, BOTTLE_DISTANCE_RANGE.1, BOTTLE_DISTANCE_STEP
        ))
        .prompt()
        .map_err(prompt_error)?;
    let repeat_delay_secs = CustomType::<f64>::new("Repeat delay (s):")
        .with_default(current.repeat_delay_secs)
        .with_help_message(&format!(
            "{} to {}, step {}",
            REPEAT_DELAY_RANGE.0, REPEAT_DELAY_RANGE.1, REPEAT_DELAY_STEP
        ))
        .prompt()
        .map_err(prompt_error)?;

    Ok(FillParameters {
        fill_time_secs,
        bottle_count,
        bottle_distance_cm,
        repeat_delay_secs,
    }
    .clamped())
}

fn show(notification: &Notification) {
    match notification.severity {
        Severity::Info => info!("{}", notification.message),
        Severity::Warning => log::warn!("{}", notification.message),
        Severity::Error => error!("{}", notification.message),
    }
}

fn drain(events: &Receiver<Notification>) {
    for notification in events.try_iter() {
        show(&notification);
    }
}

fn main() -> Result<()> {
    // Initialize logger with default info level if RUST_LOG is not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SessionConfig::from_env()?;
    let session = if std::env::var_os("BOTTLE_FILLER_MOCK").is_some() {
        let device = MockDevice::new();
        device.set_echo(true);
        SerialSession::with_connector(device.connector(), config)
    } else {
        SerialSession::with_connector(bottle_filler::SystemConnector, config)
    };
    let mut panel = ControlFacade::new(session);
    let events = panel.session().notifications();

    // Get port name from command line argument or interactive selection
    let mut args = std::env::args().skip(1);
    let port_name = args.next().map(Ok).unwrap_or_else(select_port)?;
    let baud_rate = match args.next() {
        Some(raw) => {
            let value: u32 = raw
                .parse()
                .map_err(|_| FillerError::Config(format!("invalid baud rate {:?}", raw)))?;
            BaudRate::try_from(value)?
        }
        None => select_baud()?,
    };
    let params = ConnectionParams::new(port_name, baud_rate);

    if let Err(e) = panel.connect(params.clone()) {
        show(&Notification::from(&e));
        return Err(e);
    }
    drain(&events);

    let mut fill = FillParameters::default();
    loop {
        let repeat_label = match panel.state() {
            SessionState::Connected { repeat: true } => "Repeat ON",
            _ => "Repeat OFF",
        };
        let connect_label = if panel.state().is_connected() {
            "Disconnect"
        } else {
            "Connect"
        };
        let actions = vec!["Start", "Stop", repeat_label, "Edit parameters", connect_label, "Quit"];
        let action = Select::new("Action:", actions).prompt().map_err(prompt_error)?;

        let outcome = match action {
            "Start" => panel.start(&fill),
            "Stop" => panel.stop(),
            "Edit parameters" => edit_parameters(fill).map(|p| fill = p),
            "Disconnect" | "Connect" => panel.toggle_connection(params.clone()).map(|_| ()),
            "Quit" => break,
            _ => panel.toggle_repeat().map(|_| ()),
        };
        if let Err(e) = outcome {
            show(&Notification::from(&e));
        }
        drain(&events);
    }

    panel.disconnect();
    drain(&events);
    Ok(())
}
