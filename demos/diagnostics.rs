//! Bus Interrogation Demo
//!
//! Walks the whole servo bus leg by leg and prints a JSON health snapshot
//! of every joint: limits, position, temperature, voltage, offset and
//! load state.
//!
//! Usage:
//!   cargo run --example diagnostics -- /dev/ttyAMA0
//!
//! A servo that never answers shows up as a timeout for its leg; check
//! the harness wiring and the direction pins before suspecting firmware.

use hexapod_bus::{BusTransport, Leg, SerialChannel};
use log::{info, warn};

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

    let bus = BusTransport::shared(Box::new(channel));

    info!("Six legs under test");
    for index in 0..6 {
        let leg = Leg::new(&bus, index)?;
        info!("Interrogating {} leg", leg.name());
        match leg.read_diagnostics() {
            Ok(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            Err(err) => warn!("{} leg failed: {err}", leg.name()),
        }
    }

    info!("Leg interrogation complete");
    Ok(())
}
