//! Protocol constants for bottle-filler communication.
//!
//! This module defines the constants used by the line protocol, the serial
//! port defaults, the polling cadence and the fill parameter ranges.

/// Terminator appended to every outbound command line
pub const LINE_TERMINATOR: u8 = b'\n';

/// Entry shown to the operator when no serial port was enumerated
pub const NO_PORTS_SENTINEL: &str = "No ports found";

/// Baud rates accepted by the firmware
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Baud rate used when the operator does not pick one
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Interval between inbound polls
pub const POLL_INTERVAL_MS: u64 = 100;

/// Read timeout configured on the port
pub const READ_TIMEOUT_MS: u64 = 1000;

/// How long a received status line stays visible
pub const STATUS_DISPLAY_MS: u64 = 3000;

/// Size of a single read from the port
pub const READ_CHUNK_SIZE: usize = 256;

/// Longest unterminated inbound line kept before it is discarded
pub const MAX_LINE_LEN: usize = 4096;

/// Capacity of the notification channel
pub const NOTIFICATION_CAPACITY: usize = 64;

/// Fill time range in seconds, default and step
pub const FILL_TIME_RANGE: (f64, f64) = (0.1, 60.0);
pub const DEFAULT_FILL_TIME: f64 = 5.0;
pub const FILL_TIME_STEP: f64 = 0.1;

/// Bottle count range and default
pub const BOTTLE_COUNT_RANGE: (u32, u32) = (1, 100);
pub const DEFAULT_BOTTLE_COUNT: u32 = 4;

/// Distance between bottles in centimetres
pub const BOTTLE_DISTANCE_RANGE: (f64, f64) = (1.0, 100.0);
pub const DEFAULT_BOTTLE_DISTANCE: f64 = 10.0;
pub const BOTTLE_DISTANCE_STEP: f64 = 0.5;

/// Delay between repeated runs in seconds
pub const REPEAT_DELAY_RANGE: (f64, f64) = (1.0, 3600.0);
pub const DEFAULT_REPEAT_DELAY: f64 = 10.0;
pub const REPEAT_DELAY_STEP: f64 = 1.0;
