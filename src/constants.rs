//! Protocol constants for LewanSoul bus servo communication.
//!
//! This module defines the constants used on the half-duplex servo bus:
//! framing bytes, turnaround timing, retry budgets and the documented
//! numeric ranges of the servo parameters.

use std::time::Duration;

/// Frame header: two consecutive 0x55 bytes announce a packet
pub const FRAME_HEADER: [u8; 2] = [0x55, 0x55];

/// Smallest possible frame: header + ID + length + command + checksum
pub const MIN_FRAME_LEN: usize = 6;

/// Highest individually addressable servo ID
pub const MAX_SERVO_ID: u8 = 253;

/// Broadcast ID: every servo receives, none replies
pub const BROADCAST_ID: u8 = 254;

/// Baud rate of the servo bus (115200 bps)
pub const BAUD_RATE: u32 = 115_200;

/// Device-imposed turnaround before a reply starts appearing on the bus
pub const BUS_TURNAROUND: Duration = Duration::from_micros(340);

/// Number of read polls per send attempt
pub const READ_POLL_ATTEMPTS: u32 = 20;

/// Wall-clock budget for a full query including resends
pub const QUERY_RETRY_BUDGET: Duration = Duration::from_secs(1);

/// Serial port read timeout for the hardware channel
pub const PORT_TIMEOUT: Duration = Duration::from_millis(50);

/// Full deflection range of the output shaft, 0 ~ 240 degrees
pub const POSITION_RANGE: (u16, u16) = (0, 1000);

/// Centre position, 50% rotation
pub const DEFAULT_POSITION: u16 = 500;

/// Travel time range in milliseconds
pub const DURATION_RANGE: (u16, u16) = (0, 30_000);

/// Travel time used when a caller does not supply one
pub const DEFAULT_MOVE_MS: u16 = 500;

/// Calibration offset range, equivalent to -30 ~ +30 degrees
pub const OFFSET_RANGE: (i8, i8) = (-125, 125);

/// Range the controller accepts for voltage alarm limits, in mV
pub const VOLTAGE_LIMIT_RANGE: (u16, u16) = (4500, 12_000);

/// Temperature alarm limit range in degrees Celsius
pub const TEMPERATURE_LIMIT_RANGE: (u8, u8) = (50, 100);

/// Continuous rotation speed range in motor mode
pub const MOTOR_SPEED_RANGE: (i16, i16) = (-1000, 1000);

/// Number of legs on the hexapod
pub const LEG_COUNT: usize = 6;

/// Joints per leg: shoulder, knee, ankle
pub const JOINTS_PER_LEG: usize = 3;

/// Leg names, indexed by leg number
pub const LEG_NAMES: [&str; LEG_COUNT] = [
    "Port rear",
    "Port centre",
    "Port front",
    "Starboard rear",
    "Starboard centre",
    "Starboard front",
];
