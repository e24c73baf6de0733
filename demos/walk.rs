//! Walking Demo
//!
//! Drives a SpiderPi-class hexapod through a stand, a few steps forward,
//! a turn on the spot and a sit. Shows how a consumer supplies the
//! inverse kinematics through the `LegSolver` seam.
//!
//! Usage:
//!   cargo run --example walk -- /dev/ttyAMA0
//!   cargo run --features raspi --example walk -- /dev/ttyAMA0   # on the Pi
//!
//! Set RUST_LOG to watch the bus traffic:
//!   RUST_LOG=trace cargo run --example walk -- /dev/ttyAMA0

use std::f64::consts::PI;
use std::thread;
use std::time::Duration;

use hexapod_bus::{Hexapod, JointPositions, LegSolver, SerialChannel};
use log::info;

/// Distance across the shoulder joint bracket, mm.
const THIGH: f64 = 44.60;
/// Upper leg member, mm.
const CALF: f64 = 75.00;
/// Lower leg member, mm.
const FOOT: f64 = 126.50;

/// Inverse kinematics for the SpiderPi leg geometry.
///
/// Works in the vertical plane through the shoulder joint, the knee and
/// the requested toe position; port-side joint angles map directly to
/// servo positions and the starboard side mirrors them.
struct SpiderLegs;

/// Joint angle in radians to a servo position over the 240 degree range.
fn remap(angle: f64) -> u16 {
    ((angle.to_degrees() / 120.0) * 500.0 + 500.0).clamp(0.0, 1000.0) as u16
}

impl LegSolver for SpiderLegs {
    fn solve_leg(&self, leg: usize, x: f64, y: f64, z: f64) -> Option<JointPositions> {
        let y = if y == 0.0 { 1.0 } else { y };
        let z = if z == 0.0 { 1.0 } else { z };

        let reach = (x * x + y * y).sqrt();
        if reach > THIGH + CALF + FOOT {
            return None;
        }
        let mut w = reach - THIGH;
        if w == 0.0 {
            w = 1.0;
        }

        let shoulder = remap((x / y).atan());

        let toedist = (w * w + z * z).sqrt();
        if toedist > CALF + FOOT {
            return None;
        }
        let kneeang =
            ((toedist * toedist + CALF * CALF - FOOT * FOOT) / (2.0 * toedist * CALF)).acos();
        let knee = remap(kneeang - (w / z).atan());

        let ankleang =
            ((FOOT * FOOT + CALF * CALF - toedist * toedist) / (2.0 * FOOT * CALF)).acos();
        let ankle = remap(PI - ankleang);

        Some(if leg > 2 {
            // Servo polarity flips on the starboard side.
            JointPositions {
                shoulder: 1000 - shoulder,
                knee: 1000 - knee,
                ankle: 1000 - ankle,
            }
        } else {
            JointPositions { shoulder, knee, ankle }
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let port_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyAMA0".to_string());

    info!("Opening servo bus on {port_name}...");
    let channel = SerialChannel::open(&port_name)?;

    #[cfg(feature = "raspi")]
    let channel = channel.with_direction_pins(hexapod_bus::DirectionPins::new(
        hexapod_bus::RX_CON_PIN,
        hexapod_bus::TX_CON_PIN,
    )?);

    let mut hexapod = Hexapod::new(Box::new(channel), Box::new(SpiderLegs))?;

    info!("Standing up");
    hexapod.load_all()?;
    hexapod.stand()?;
    thread::sleep(Duration::from_millis(500));

    info!("Walking forward");
    for _ in 0..4 {
        hexapod.forward_step(1.0, 2000)?;
    }

    info!("Turning on the spot");
    hexapod.pivot(20.0, 300)?;
    hexapod.pivot(20.0, 300)?;

    info!("Stepping back");
    hexapod.backward_step(1.0, 2000)?;

    info!("Sitting down");
    hexapod.sit()?;

    info!("Walk complete");
    Ok(())
}
