use crate::constants::*;
use crate::error::FillerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Baud rates the firmware accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BaudRate {
    #[default]
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
}

impl BaudRate {
    pub const ALL: [BaudRate; 5] = [
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
    ];

    /// Bits per second
    pub fn as_u32(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
        }
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = FillerError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        SUPPORTED_BAUD_RATES
            .iter()
            .position(|&rate| rate == value)
            .map(|index| BaudRate::ALL[index])
            .ok_or(FillerError::InvalidBaudRate(value))
    }
}

impl From<BaudRate> for u32 {
    fn from(baud: BaudRate) -> u32 {
        baud.as_u32()
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Port and speed of a session. Fixed for as long as the session is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub port: String,
    #[serde(default)]
    pub baud_rate: BaudRate,
}

impl ConnectionParams {
    /// Parameters for `port` at `baud_rate`
    pub fn new(port: impl Into<String>, baud_rate: BaudRate) -> Self {
        Self {
            port: port.into(),
            baud_rate,
        }
    }
}

/// Parameters of one filling run, read when the run is started
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillParameters {
    pub fill_time_secs: f64,
    pub bottle_count: u32,
    pub bottle_distance_cm: f64,
    pub repeat_delay_secs: f64,
}

impl Default for FillParameters {
    fn default() -> Self {
        Self {
            fill_time_secs: DEFAULT_FILL_TIME,
            bottle_count: DEFAULT_BOTTLE_COUNT,
            bottle_distance_cm: DEFAULT_BOTTLE_DISTANCE,
            repeat_delay_secs: DEFAULT_REPEAT_DELAY,
        }
    }
}

impl FillParameters {
    /// Clamp every field into its operator range.
    ///
    /// Non-finite floats fall back to the field default.
    pub fn clamped(&self) -> Self {
        Self {
            fill_time_secs: clamp_or(self.fill_time_secs, FILL_TIME_RANGE, DEFAULT_FILL_TIME),
            bottle_count: self
                .bottle_count
                .clamp(BOTTLE_COUNT_RANGE.0, BOTTLE_COUNT_RANGE.1),
            bottle_distance_cm: clamp_or(
                self.bottle_distance_cm,
                BOTTLE_DISTANCE_RANGE,
                DEFAULT_BOTTLE_DISTANCE,
            ),
            repeat_delay_secs: clamp_or(
                self.repeat_delay_secs,
                REPEAT_DELAY_RANGE,
                DEFAULT_REPEAT_DELAY,
            ),
        }
    }
}

fn clamp_or(value: f64, (min, max): (f64, f64), fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Combined connection and repeat-mode state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected { repeat: bool },
}

impl SessionState {
    /// Whether a session is open
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected { .. })
    }
}

/// Severity of an operator notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Status or error message for the operator UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    /// Auto-dismiss after this long; `None` keeps it until replaced
    pub display_for: Option<Duration>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Notification stamped with the current time
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            display_for: None,
            timestamp: Utc::now(),
        }
    }

    /// Status message
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// Operator should look, nothing failed hard
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Failed action
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Auto-dismiss after `duration`
    pub fn display_for(mut self, duration: Duration) -> Self {
        self.display_for = Some(duration);
        self
    }
}

impl From<&FillerError> for Notification {
    fn from(err: &FillerError) -> Self {
        match err {
            FillerError::NotConnected | FillerError::PortUnavailable(_) => {
                Notification::warning(err.to_string())
            }
            _ => Notification::error(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_rate_accepts_only_supported_values() {
        for value in SUPPORTED_BAUD_RATES {
            assert_eq!(BaudRate::try_from(value).unwrap().as_u32(), value);
        }
        assert!(matches!(
            BaudRate::try_from(4800),
            Err(FillerError::InvalidBaudRate(4800))
        ));
        assert_eq!(BaudRate::default().as_u32(), DEFAULT_BAUD_RATE);
        let listed: Vec<u32> = BaudRate::ALL.iter().map(|b| b.as_u32()).collect();
        assert_eq!(listed, SUPPORTED_BAUD_RATES);
    }

    #[test]
    fn baud_rate_serializes_as_number() {
        let params = ConnectionParams::new("COM3", BaudRate::B115200);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"port":"COM3","baud_rate":115200}"#);

        let parsed: ConnectionParams =
            serde_json::from_str(r#"{"port":"/dev/ttyUSB0"}"#).unwrap();
        assert_eq!(parsed.baud_rate, BaudRate::B9600);
        let slow = r#"{"port":"x","baud_rate":300}"#;
        assert!(serde_json::from_str::<ConnectionParams>(slow).is_err());
    }

    #[test]
    fn fill_defaults_match_operator_panel() {
        let params = FillParameters::default();
        assert_eq!(params.fill_time_secs, 5.0);
        assert_eq!(params.bottle_count, 4);
        assert_eq!(params.bottle_distance_cm, 10.0);
        assert_eq!(params.repeat_delay_secs, 10.0);
        assert_eq!(params.clamped(), params);
    }

    #[test]
    fn clamped_pulls_values_into_range() {
        let params = FillParameters {
            fill_time_secs: 0.0,
            bottle_count: 500,
            bottle_distance_cm: f64::NAN,
            repeat_delay_secs: 7200.0,
        }
        .clamped();
        assert_eq!(params.fill_time_secs, 0.1);
        assert_eq!(params.bottle_count, 100);
        assert_eq!(params.bottle_distance_cm, DEFAULT_BOTTLE_DISTANCE);
        assert_eq!(params.repeat_delay_secs, 3600.0);
    }

    #[test]
    fn session_state_reports_connection() {
        assert!(!SessionState::Disconnected.is_connected());
        assert!(SessionState::Connected { repeat: true }.is_connected());
        assert_eq!(SessionState::default(), SessionState::Disconnected);
    }

    #[test]
    fn errors_map_to_notification_severity() {
        let n = Notification::from(&FillerError::NotConnected);
        assert_eq!(n.severity, Severity::Warning);
        assert_eq!(n.message, "Not connected to any device");

        let n = Notification::from(&FillerError::Write(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "unplugged",
        )));
        assert_eq!(n.severity, Severity::Error);
        assert_eq!(n.display_for, None);
    }
}
