//! Typed per-servo view over the bus transport.
//!
//! Each [`Servo`] owns the ID of one actuator and translates domain calls
//! into single protocol commands. Values that the protocol bounds are
//! checked here, before any bytes touch the wire. Reads always interrogate
//! the device; the local [`ServoState`] snapshot records only what has
//! been successfully written.

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::constants::{
    DURATION_RANGE, MAX_SERVO_ID, MOTOR_SPEED_RANGE, OFFSET_RANGE, POSITION_RANGE,
    TEMPERATURE_LIMIT_RANGE, VOLTAGE_LIMIT_RANGE,
};
use crate::error::{ServoError, TransportError};
use crate::frame::Params;
use crate::transport::SharedBus;

/// One move: where to go and how long to take getting there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoTarget {
    position: u16,
    duration_ms: u16,
}

impl ServoTarget {
    /// Validate a target against the protocol ranges (position 0-1000,
    /// duration 0-30000 ms).
    pub fn new(position: u16, duration_ms: u16) -> Result<Self, ServoError> {
        check("position", position as i32, POSITION_RANGE.0 as i32, POSITION_RANGE.1 as i32)?;
        check(
            "duration",
            duration_ms as i32,
            DURATION_RANGE.0 as i32,
            DURATION_RANGE.1 as i32,
        )?;
        Ok(ServoTarget { position, duration_ms })
    }

    /// Target position, 0-1000 over the 240 degree range.
    pub fn position(&self) -> u16 {
        self.position
    }

    /// Travel time in milliseconds.
    pub fn duration_ms(&self) -> u16 {
        self.duration_ms
    }

    /// Build from a device reply without range checks; firmware answers
    /// are taken at face value.
    fn from_reply(position: u16, duration_ms: u16) -> Self {
        ServoTarget { position, duration_ms }
    }
}

/// LED behaviour: lit steady or dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedMode {
    /// LED always on (wire value 0)
    Lit,
    /// LED off (wire value 1)
    Dark,
}

impl LedMode {
    fn to_wire(self) -> u8 {
        match self {
            LedMode::Lit => 0,
            LedMode::Dark => 1,
        }
    }

    fn from_wire(byte: u8) -> Self {
        if byte == 0 {
            LedMode::Lit
        } else {
            LedMode::Dark
        }
    }
}

/// Which fault conditions make the LED flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedFaultMask(u8);

impl LedFaultMask {
    /// No alarm
    pub const NONE: LedFaultMask = LedFaultMask(0);
    /// Over temperature
    pub const OVER_TEMPERATURE: LedFaultMask = LedFaultMask(1);
    /// Over voltage
    pub const OVER_VOLTAGE: LedFaultMask = LedFaultMask(2);
    /// Locked rotor
    pub const STALLED: LedFaultMask = LedFaultMask(4);
    /// All three alarms
    pub const ALL: LedFaultMask = LedFaultMask(7);

    /// Build from raw bits, 0-7.
    pub fn from_bits(bits: u8) -> Result<Self, ServoError> {
        check("LED fault mask", bits as i32, 0, 7)?;
        Ok(LedFaultMask(bits))
    }

    /// Raw bits as transmitted.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// True if every flag in `other` is set in `self`.
    pub fn contains(self, other: LedFaultMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for LedFaultMask {
    type Output = LedFaultMask;

    fn bitor(self, rhs: LedFaultMask) -> LedFaultMask {
        LedFaultMask(self.0 | rhs.0)
    }
}

/// Shaft control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorMode {
    /// Position control over the limited 240 degree range
    Position,
    /// Continuous rotation at a signed speed, -1000..=1000
    Continuous {
        /// Rotation speed; negative reverses
        speed: i16,
    },
}

/// Snapshot of the last successfully written values.
///
/// `None` means "never written through this proxy"; the device may well
/// hold a value from a previous session (offsets and limits are stored in
/// non-volatile memory).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoState {
    /// Last immediate or triggered move
    pub last_target: Option<ServoTarget>,
    /// Move staged but not yet triggered
    pub staged_target: Option<ServoTarget>,
    /// Rotation limits (low, high)
    pub rotation_limits: Option<(u16, u16)>,
    /// Voltage alarm limits in mV (low, high)
    pub voltage_limits_mv: Option<(u16, u16)>,
    /// Temperature alarm limit in Celsius
    pub temperature_limit: Option<u8>,
    /// Calibration offset
    pub offset: Option<i8>,
    /// Torque output enabled
    pub loaded: Option<bool>,
    /// LED behaviour
    pub led_mode: Option<LedMode>,
    /// LED fault mask
    pub led_faults: Option<LedFaultMask>,
    /// Position or continuous rotation
    pub motor_mode: Option<MotorMode>,
}

/// Proxy for one bus servo.
pub struct Servo {
    id: u8,
    bus: SharedBus,
    state: ServoState,
}

impl Servo {
    /// Attach a proxy to servo `id` (0-253) on a shared bus.
    pub fn new(bus: SharedBus, id: u8) -> Result<Self, ServoError> {
        check("servo ID", id as i32, 0, MAX_SERVO_ID as i32)?;
        Ok(Servo {
            id,
            bus,
            state: ServoState::default(),
        })
    }

    /// The servo's bus address.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// What this proxy has successfully written so far.
    pub fn state(&self) -> &ServoState {
        &self.state
    }

    fn write(&self, command: Command, params: Params) -> Result<(), ServoError> {
        self.bus
            .lock()
            .send_command(self.id, command, params)
            .map_err(ServoError::from)
    }

    fn query(&self, command: Command) -> Result<Params, ServoError> {
        self.bus.lock().query(self.id, command).map_err(ServoError::from)
    }

    /// Command 1: move immediately.
    pub fn move_to(&mut self, target: ServoTarget) -> Result<(), ServoError> {
        self.write(
            Command::MoveTimeWrite,
            Params::Pair(target.position(), target.duration_ms()),
        )?;
        self.state.last_target = Some(target);
        Ok(())
    }

    /// Command 2: the last commanded (position, duration) as the device
    /// remembers it. Not necessarily where the shaft is now.
    pub fn read_target(&self) -> Result<ServoTarget, ServoError> {
        let (position, duration) = expect_pair(self.query(Command::MoveTimeRead)?)?;
        Ok(ServoTarget::from_reply(position, duration))
    }

    /// Command 7: prime a move. Nothing happens until [`Servo::trigger`].
    pub fn stage(&mut self, target: ServoTarget) -> Result<(), ServoError> {
        self.write(
            Command::MoveTimeWaitWrite,
            Params::Pair(target.position(), target.duration_ms()),
        )?;
        self.state.staged_target = Some(target);
        Ok(())
    }

    /// Command 11: execute the staged move. The device buffers exactly one
    /// pending move and starts its travel clock on receipt.
    pub fn trigger(&mut self) -> Result<(), ServoError> {
        self.write(Command::MoveStart, Params::None)?;
        if let Some(target) = self.state.staged_target.take() {
            self.state.last_target = Some(target);
        }
        Ok(())
    }

    /// Command 12: stop dead wherever the shaft happens to be.
    pub fn stop(&mut self) -> Result<(), ServoError> {
        self.write(Command::MoveStop, Params::None)
    }

    /// Commands 17 + 18: adjust the calibration offset and commit it to
    /// non-volatile memory so it survives power-cycling.
    pub fn set_offset(&mut self, offset: i8) -> Result<(), ServoError> {
        check("offset", offset as i32, OFFSET_RANGE.0 as i32, OFFSET_RANGE.1 as i32)?;
        self.write(Command::AngleOffsetAdjust, Params::Byte(offset as u8))?;
        self.write(Command::AngleOffsetWrite, Params::None)?;
        self.state.offset = Some(offset);
        Ok(())
    }

    /// Command 19: read the calibration offset.
    pub fn get_offset(&self) -> Result<i8, ServoError> {
        Ok(expect_byte(self.query(Command::AngleOffsetRead)?)? as i8)
    }

    /// Command 20: set rotation limits; `low < high`, both 0-1000.
    pub fn set_rotation_limits(&mut self, low: u16, high: u16) -> Result<(), ServoError> {
        check_pair("rotation limit", low, high, POSITION_RANGE)?;
        self.write(Command::AngleLimitWrite, Params::Pair(low, high))?;
        self.state.rotation_limits = Some((low, high));
        Ok(())
    }

    /// Command 21: read rotation limits.
    pub fn get_rotation_limits(&self) -> Result<(u16, u16), ServoError> {
        expect_pair(self.query(Command::AngleLimitRead)?)
    }

    /// Command 22: set voltage alarm limits in mV; `low < high`, both
    /// 4500-12000.
    pub fn set_voltage_limits(&mut self, low_mv: u16, high_mv: u16) -> Result<(), ServoError> {
        check_pair("voltage limit", low_mv, high_mv, VOLTAGE_LIMIT_RANGE)?;
        self.write(Command::VinLimitWrite, Params::Pair(low_mv, high_mv))?;
        self.state.voltage_limits_mv = Some((low_mv, high_mv));
        Ok(())
    }

    /// Command 23: read voltage alarm limits in mV.
    pub fn get_voltage_limits(&self) -> Result<(u16, u16), ServoError> {
        expect_pair(self.query(Command::VinLimitRead)?)
    }

    /// Command 24: set the temperature alarm limit, 50-100 Celsius.
    pub fn set_temperature_limit(&mut self, celsius: u8) -> Result<(), ServoError> {
        check(
            "temperature limit",
            celsius as i32,
            TEMPERATURE_LIMIT_RANGE.0 as i32,
            TEMPERATURE_LIMIT_RANGE.1 as i32,
        )?;
        self.write(Command::TempLimitWrite, Params::Byte(celsius))?;
        self.state.temperature_limit = Some(celsius);
        Ok(())
    }

    /// Command 25: read the temperature alarm limit.
    pub fn get_temperature_limit(&self) -> Result<u8, ServoError> {
        expect_byte(self.query(Command::TempLimitRead)?)
    }

    /// Command 26: read the internal temperature in Celsius.
    pub fn read_temperature(&self) -> Result<u8, ServoError> {
        expect_byte(self.query(Command::TempRead)?)
    }

    /// Command 27: read the input voltage in mV.
    pub fn read_voltage(&self) -> Result<u16, ServoError> {
        expect_word(self.query(Command::VinRead)?)
    }

    /// Command 28: read the current shaft position. Signed: a loaded shaft
    /// can be pushed slightly past zero.
    pub fn read_position(&self) -> Result<i16, ServoError> {
        Ok(expect_word(self.query(Command::PosRead)?)? as i16)
    }

    /// Command 29: select position control or continuous rotation.
    pub fn set_motor_mode(&mut self, mode: MotorMode) -> Result<(), ServoError> {
        let params = match mode {
            MotorMode::Position => Params::Pair(0, 0),
            MotorMode::Continuous { speed } => {
                check(
                    "motor speed",
                    speed as i32,
                    MOTOR_SPEED_RANGE.0 as i32,
                    MOTOR_SPEED_RANGE.1 as i32,
                )?;
                Params::Pair(1, speed as u16)
            }
        };
        self.write(Command::MotorModeWrite, params)?;
        self.state.motor_mode = Some(mode);
        Ok(())
    }

    /// Command 30: read the motor mode.
    pub fn read_motor_mode(&self) -> Result<MotorMode, ServoError> {
        let (mode, speed) = expect_pair(self.query(Command::MotorModeRead)?)?;
        Ok(if mode == 0 {
            MotorMode::Position
        } else {
            MotorMode::Continuous { speed: speed as i16 }
        })
    }

    /// Command 31: enable (`true`) or cut (`false`) torque output.
    pub fn set_load(&mut self, loaded: bool) -> Result<(), ServoError> {
        self.write(Command::LoadModeWrite, Params::Byte(loaded as u8))?;
        self.state.loaded = Some(loaded);
        Ok(())
    }

    /// Command 32: read whether torque output is enabled.
    pub fn read_load(&self) -> Result<bool, ServoError> {
        Ok(expect_byte(self.query(Command::LoadModeRead)?)? != 0)
    }

    /// Command 33: set LED behaviour.
    pub fn set_led_mode(&mut self, mode: LedMode) -> Result<(), ServoError> {
        self.write(Command::LedCtrlWrite, Params::Byte(mode.to_wire()))?;
        self.state.led_mode = Some(mode);
        Ok(())
    }

    /// Command 34: read LED behaviour.
    pub fn read_led_mode(&self) -> Result<LedMode, ServoError> {
        Ok(LedMode::from_wire(expect_byte(self.query(Command::LedCtrlRead)?)?))
    }

    /// Command 35: set which faults flash the LED.
    pub fn set_led_fault_mask(&mut self, mask: LedFaultMask) -> Result<(), ServoError> {
        self.write(Command::LedErrorWrite, Params::Byte(mask.bits()))?;
        self.state.led_faults = Some(mask);
        Ok(())
    }

    /// Command 36: read the LED fault mask.
    pub fn read_led_fault_mask(&self) -> Result<LedFaultMask, ServoError> {
        let bits = expect_byte(self.query(Command::LedErrorRead)?)?;
        LedFaultMask::from_bits(bits & 0x07)
    }
}

fn check(what: &'static str, value: i32, min: i32, max: i32) -> Result<(), ServoError> {
    if value < min || value > max {
        return Err(ServoError::OutOfRange { what, value, min, max });
    }
    Ok(())
}

fn check_pair(
    what: &'static str,
    low: u16,
    high: u16,
    range: (u16, u16),
) -> Result<(), ServoError> {
    check(what, low as i32, range.0 as i32, range.1 as i32)?;
    check(what, high as i32, range.0 as i32, range.1 as i32)?;
    if low >= high {
        return Err(ServoError::OutOfRange {
            what,
            value: low as i32,
            min: range.0 as i32,
            max: high as i32 - 1,
        });
    }
    Ok(())
}

fn expect_byte(params: Params) -> Result<u8, ServoError> {
    match params {
        Params::Byte(b) => Ok(b),
        _ => Err(TransportError::Corrupt.into()),
    }
}

fn expect_word(params: Params) -> Result<u16, ServoError> {
    match params {
        Params::Word(w) => Ok(w),
        _ => Err(TransportError::Corrupt.into()),
    }
}

fn expect_pair(params: Params) -> Result<(u16, u16), ServoError> {
    match params {
        Params::Pair(a, b) => Ok((a, b)),
        _ => Err(TransportError::Corrupt.into()),
    }
}
