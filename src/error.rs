//! Error types for bus servo operations.

use crate::command::Command;
use thiserror::Error;

/// Frame construction errors. These indicate a programming error in the
/// caller, not a bus condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Parameter payload does not match the command's declared arity
    #[error("{command:?} takes {expected} parameter byte(s), got {actual}")]
    InvalidParameterCount {
        /// Command being encoded
        command: Command,
        /// Parameter bytes the command expects
        expected: usize,
        /// Parameter bytes supplied
        actual: usize,
    },
}

/// Reply frame validation errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer absent or too short to hold a frame yet
    #[error("no complete frame available")]
    Empty,

    /// Header, checksum, command or length validation failed
    #[error("corrupt frame")]
    Corrupt,
}

/// Errors surfaced by the bus transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying channel failed
    #[error("channel I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// No valid reply arrived within the retry budget
    #[error("no reply within the retry budget")]
    Timeout,

    /// A reply arrived but failed frame validation
    #[error("corrupt reply")]
    Corrupt,

    /// Frame construction failed before transmission
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Errors surfaced by the servo proxy and leg controller.
#[derive(Error, Debug)]
pub enum ServoError {
    /// Bus-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Caller-supplied value violates a documented protocol range.
    /// Rejected before any bytes are transmitted.
    #[error("{what} {value} outside {min}..={max}")]
    OutOfRange {
        /// Which parameter was out of range
        what: &'static str,
        /// The offending value
        value: i32,
        /// Lowest permitted value
        min: i32,
        /// Highest permitted value
        max: i32,
    },
}

/// Errors surfaced by the gait sequencer.
#[derive(Error, Debug)]
pub enum GaitError {
    /// A servo operation failed mid-waypoint; the transition was aborted
    /// before its trigger pass
    #[error(transparent)]
    Servo(#[from] ServoError),

    /// The leg solver could not reach the requested foot position
    #[error("leg {leg} cannot reach ({x:.1}, {y:.1}, {z:.1})")]
    Unreachable {
        /// Leg index, 0-5
        leg: usize,
        /// Requested foot coordinates
        x: f64,
        /// Requested foot coordinates
        y: f64,
        /// Requested foot coordinates
        z: f64,
    },
}
