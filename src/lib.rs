//! # Hexapod Bus Servo Library
//!
//! A Rust library for driving LewanSoul/HiWonder-style serial bus servos
//! and the six-legged walkers built from them. Up to 253 servos share one
//! half-duplex UART; this crate owns the framing, checksums and direction
//! discipline of that bus and layers a typed per-servo API, a three-joint
//! leg controller and a tripod gait sequencer on top.
//!
//! ## Features
//!
//! - Bit-exact frame codec with checksum validation
//! - Direction-switched transport with timed read-back and retry
//! - Typed servo operations: moves, staged moves, limits, telemetry
//! - Staged "standby then trigger" motion across all 18 leg joints
//! - Tripod walking, turning in place and posture transitions
//!
//! Inverse kinematics is deliberately not included: the gait sequencer
//! consumes a caller-supplied [`LegSolver`].
//!
//! ## Example
//!
//! ```no_run
//! use hexapod_bus::{BusTransport, SerialChannel, Servo};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let channel = SerialChannel::open("/dev/ttyAMA0")?;
//!     let bus = BusTransport::shared(Box::new(channel));
//!     let servo = Servo::new(bus, 1)?;
//!     println!("position: {}", servo.read_position()?);
//!     println!("voltage: {} mV", servo.read_voltage()?);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod gait;
pub mod leg;
pub mod servo;
pub mod transport;

pub use channel::{BusChannel, SerialChannel};
#[cfg(feature = "raspi")]
pub use channel::{DirectionPins, RX_CON_PIN, TX_CON_PIN};
pub use command::{Command, CommandKind, ParamKind};
pub use error::{CodecError, DecodeError, GaitError, ServoError, TransportError};
pub use frame::{checksum, Frame, Params};
pub use gait::{Hexapod, HexapodDiagnostics, LegSolver, Posture};
pub use leg::{JointPositions, JointSnapshot, Leg, LegSnapshot};
pub use servo::{LedFaultMask, LedMode, MotorMode, Servo, ServoState, ServoTarget};
pub use transport::{BusTransport, SharedBus};
