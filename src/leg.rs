//! One articulated leg: shoulder, knee and ankle servos working as a unit.
//!
//! Joint IDs follow the harness wiring: leg `n` owns servos `n*3 + 1`
//! (shoulder), `n*3 + 2` (knee) and `n*3 + 3` (ankle). The leg holds no
//! state of its own; everything delegates to the three proxies.

use serde::{Deserialize, Serialize};

use crate::constants::{JOINTS_PER_LEG, LEG_COUNT, LEG_NAMES};
use crate::error::ServoError;
use crate::servo::{Servo, ServoTarget};
use crate::transport::SharedBus;

/// Servo positions for the three joints of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointPositions {
    /// Shoulder servo position, 0-1000
    pub shoulder: u16,
    /// Knee servo position, 0-1000
    pub knee: u16,
    /// Ankle servo position, 0-1000
    pub ankle: u16,
}

/// Diagnostic readings for one joint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointSnapshot {
    /// Servo bus ID
    pub id: u8,
    /// Rotation limits (low, high)
    pub rotation_limits: (u16, u16),
    /// Current shaft position
    pub position: i16,
    /// Temperature alarm limit in Celsius
    pub temperature_limit: u8,
    /// Internal temperature in Celsius
    pub temperature: u8,
    /// Voltage alarm limits in mV (low, high)
    pub voltage_limits_mv: (u16, u16),
    /// Input voltage in mV
    pub voltage_mv: u16,
    /// Calibration offset
    pub offset: i8,
    /// Torque output enabled
    pub loaded: bool,
}

/// Diagnostic readings for a whole leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegSnapshot {
    /// Leg index, 0-5
    pub leg: usize,
    /// Human name of the leg ("Port rear", ...)
    pub name: String,
    /// Shoulder, knee, ankle
    pub joints: [JointSnapshot; 3],
}

/// Three servo proxies driven as one kinematic unit.
pub struct Leg {
    index: usize,
    shoulder: Servo,
    knee: Servo,
    ankle: Servo,
}

impl Leg {
    /// Build leg `index` (0-5) on a shared bus.
    pub fn new(bus: &SharedBus, index: usize) -> Result<Self, ServoError> {
        if index >= LEG_COUNT {
            return Err(ServoError::OutOfRange {
                what: "leg index",
                value: index as i32,
                min: 0,
                max: LEG_COUNT as i32 - 1,
            });
        }
        let base = (index * JOINTS_PER_LEG) as u8;
        Ok(Leg {
            index,
            shoulder: Servo::new(bus.clone(), base + 1)?,
            knee: Servo::new(bus.clone(), base + 2)?,
            ankle: Servo::new(bus.clone(), base + 3)?,
        })
    }

    /// Leg index, 0-5.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Human name of the leg.
    pub fn name(&self) -> &'static str {
        LEG_NAMES[self.index]
    }

    /// Shoulder joint proxy.
    pub fn shoulder(&self) -> &Servo {
        &self.shoulder
    }

    /// Knee joint proxy.
    pub fn knee(&self) -> &Servo {
        &self.knee
    }

    /// Ankle joint proxy.
    pub fn ankle(&self) -> &Servo {
        &self.ankle
    }

    /// Stage all three joints for the same travel time. Nothing moves
    /// until [`Leg::trigger_all`].
    pub fn stage_position(
        &mut self,
        joints: JointPositions,
        duration_ms: u16,
    ) -> Result<(), ServoError> {
        self.shoulder.stage(ServoTarget::new(joints.shoulder, duration_ms)?)?;
        self.knee.stage(ServoTarget::new(joints.knee, duration_ms)?)?;
        self.ankle.stage(ServoTarget::new(joints.ankle, duration_ms)?)?;
        Ok(())
    }

    /// Stage the joints with individual travel times.
    pub fn stage_joints(&mut self, targets: [ServoTarget; 3]) -> Result<(), ServoError> {
        self.shoulder.stage(targets[0])?;
        self.knee.stage(targets[1])?;
        self.ankle.stage(targets[2])?;
        Ok(())
    }

    /// Trigger all three staged moves, shoulder first.
    ///
    /// The transport is sequential, so the joints do not start in the same
    /// UART time-slot; each servo starts its travel clock when its own
    /// trigger arrives. Callers wanting a whole-body start should trigger
    /// every leg back to back with nothing in between.
    pub fn trigger_all(&mut self) -> Result<(), ServoError> {
        self.shoulder.trigger()?;
        self.knee.trigger()?;
        self.ankle.trigger()?;
        Ok(())
    }

    /// Move all three joints immediately, same travel time.
    pub fn set_position(
        &mut self,
        joints: JointPositions,
        duration_ms: u16,
    ) -> Result<(), ServoError> {
        self.shoulder.move_to(ServoTarget::new(joints.shoulder, duration_ms)?)?;
        self.knee.move_to(ServoTarget::new(joints.knee, duration_ms)?)?;
        self.ankle.move_to(ServoTarget::new(joints.ankle, duration_ms)?)?;
        Ok(())
    }

    /// Stop all three joints dead.
    pub fn stop_all(&mut self) -> Result<(), ServoError> {
        self.shoulder.stop()?;
        self.knee.stop()?;
        self.ankle.stop()?;
        Ok(())
    }

    /// Enable torque on all three joints.
    pub fn load_all(&mut self) -> Result<(), ServoError> {
        self.shoulder.set_load(true)?;
        self.knee.set_load(true)?;
        self.ankle.set_load(true)?;
        Ok(())
    }

    /// Cut torque on all three joints; the leg goes limp.
    pub fn unload_all(&mut self) -> Result<(), ServoError> {
        self.shoulder.set_load(false)?;
        self.knee.set_load(false)?;
        self.ankle.set_load(false)?;
        Ok(())
    }

    /// Write and commit calibration offsets, shoulder/knee/ankle order.
    pub fn set_offsets(&mut self, offsets: [i8; 3]) -> Result<(), ServoError> {
        self.shoulder.set_offset(offsets[0])?;
        self.knee.set_offset(offsets[1])?;
        self.ankle.set_offset(offsets[2])?;
        Ok(())
    }

    /// Current shaft positions, shoulder/knee/ankle order.
    pub fn read_positions(&self) -> Result<[i16; 3], ServoError> {
        Ok([
            self.shoulder.read_position()?,
            self.knee.read_position()?,
            self.ankle.read_position()?,
        ])
    }

    /// Interrogate all three joints. The first failing read aborts the
    /// aggregate with that joint's error.
    pub fn read_diagnostics(&self) -> Result<LegSnapshot, ServoError> {
        Ok(LegSnapshot {
            leg: self.index,
            name: self.name().to_string(),
            joints: [
                snapshot_joint(&self.shoulder)?,
                snapshot_joint(&self.knee)?,
                snapshot_joint(&self.ankle)?,
            ],
        })
    }
}

fn snapshot_joint(servo: &Servo) -> Result<JointSnapshot, ServoError> {
    Ok(JointSnapshot {
        id: servo.id(),
        rotation_limits: servo.get_rotation_limits()?,
        position: servo.read_position()?,
        temperature_limit: servo.get_temperature_limit()?,
        temperature: servo.read_temperature()?,
        voltage_limits_mv: servo.get_voltage_limits()?,
        voltage_mv: servo.read_voltage()?,
        offset: servo.get_offset()?,
        loaded: servo.read_load()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::{BusEvent, MockChannel};
    use crate::command::Command;
    use crate::transport::BusTransport;

    fn leg_on(mock: &MockChannel, index: usize) -> Leg {
        Leg::new(&BusTransport::shared(Box::new(mock.clone())), index).unwrap()
    }

    #[test]
    fn joint_ids_follow_the_harness_wiring() {
        let mock = MockChannel::new();
        let leg = leg_on(&mock, 4);
        assert_eq!(leg.shoulder().id(), 13);
        assert_eq!(leg.knee().id(), 14);
        assert_eq!(leg.ankle().id(), 15);
        assert_eq!(leg.name(), "Starboard centre");
        assert!(Leg::new(&BusTransport::shared(Box::new(mock.clone())), 6).is_err());
    }

    #[test]
    fn stage_then_trigger_is_three_stages_then_three_triggers() {
        let mock = MockChannel::new();
        let mut leg = leg_on(&mock, 0);

        let joints = JointPositions { shoulder: 400, knee: 500, ankle: 600 };
        leg.stage_position(joints, 800).unwrap();
        leg.trigger_all().unwrap();

        let frames = mock.written_frames();
        assert_eq!(frames.len(), 6);
        // Three stage frames, shoulder-knee-ankle...
        for (frame, id) in frames[..3].iter().zip([1u8, 2, 3]) {
            assert_eq!(frame[2], id);
            assert_eq!(frame[4], Command::MoveTimeWaitWrite.code());
        }
        // ...then three triggers in the same order, no queries anywhere.
        for (frame, id) in frames[3..].iter().zip([1u8, 2, 3]) {
            assert_eq!(frame[2], id);
            assert_eq!(frame[4], Command::MoveStart.code());
        }
        assert!(!mock.events().contains(&BusEvent::SetReadMode));
    }

    #[test]
    fn a_failing_stage_aborts_the_leg() {
        let mock = MockChannel::new();
        let mut leg = leg_on(&mock, 0);
        mock.fail_after_writes(1);

        let joints = JointPositions { shoulder: 400, knee: 500, ankle: 600 };
        let err = leg.stage_position(joints, 800).unwrap_err();
        assert!(matches!(err, ServoError::Transport(_)));
        assert_eq!(mock.written_frames().len(), 1);
    }

    #[test]
    fn out_of_range_joint_positions_transmit_nothing() {
        let mock = MockChannel::new();
        let mut leg = leg_on(&mock, 0);
        let joints = JointPositions { shoulder: 400, knee: 1500, ankle: 600 };
        // Shoulder stages fine, the knee is rejected before its frame.
        assert!(leg.stage_position(joints, 800).is_err());
        assert_eq!(mock.written_frames().len(), 1);
    }
}
