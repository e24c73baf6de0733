//! The bus servo command catalog.
//!
//! Command codes are sparse over 1..=36. Codes 3-6, 9-10 and 15-16 are
//! reserved by the protocol; 13 (ID write) and 14 (ID read) exist on the
//! wire but are deliberately left out of the catalog because rewriting an
//! ID, or asking 18 daisy-chained servos to answer an ID query at once,
//! can wreck a populated bus.

/// Number of parameter bytes a command carries in its request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// No parameters, length byte 3
    None,
    /// One parameter byte, length byte 4
    Byte,
    /// Two little-endian 16-bit words, length byte 7
    Pair,
}

impl ParamKind {
    /// Number of parameter bytes on the wire.
    pub fn byte_len(self) -> usize {
        match self {
            ParamKind::None => 0,
            ParamKind::Byte => 1,
            ParamKind::Pair => 4,
        }
    }
}

/// Whether a command mutates servo state or requests a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Servo consumes the frame silently
    Write,
    /// Servo answers with a reply frame echoing the command code
    Read,
}

/// A protocol operation the bus servos understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// 1: move to position over a duration, immediately
    MoveTimeWrite,
    /// 2: read back the last commanded (position, duration)
    MoveTimeRead,
    /// 7: stage a move; nothing happens until MoveStart
    MoveTimeWaitWrite,
    /// 8: read back the staged move (known to wedge some firmware)
    MoveTimeWaitRead,
    /// 11: execute the staged move
    MoveStart,
    /// 12: stop dead, abandoning any travel in progress
    MoveStop,
    /// 17: adjust the calibration offset (volatile)
    AngleOffsetAdjust,
    /// 18: commit the adjusted offset to non-volatile memory
    AngleOffsetWrite,
    /// 19: read the calibration offset
    AngleOffsetRead,
    /// 20: set rotation limits (low, high)
    AngleLimitWrite,
    /// 21: read rotation limits
    AngleLimitRead,
    /// 22: set input voltage alarm limits in mV (low, high)
    VinLimitWrite,
    /// 23: read input voltage alarm limits
    VinLimitRead,
    /// 24: set the temperature alarm limit in Celsius
    TempLimitWrite,
    /// 25: read the temperature alarm limit
    TempLimitRead,
    /// 26: read the internal temperature
    TempRead,
    /// 27: read the input voltage in mV
    VinRead,
    /// 28: read the current shaft position
    PosRead,
    /// 29: select position mode or continuous rotation with a signed speed
    MotorModeWrite,
    /// 30: read the motor mode and speed
    MotorModeRead,
    /// 31: load (1) or unload (0) the output shaft
    LoadModeWrite,
    /// 32: read the load mode
    LoadModeRead,
    /// 33: LED control, 0 lit / 1 dark
    LedCtrlWrite,
    /// 34: read the LED control state
    LedCtrlRead,
    /// 35: set which fault conditions flash the LED
    LedErrorWrite,
    /// 36: read the LED fault mask
    LedErrorRead,
}

impl Command {
    /// Numeric code transmitted in the frame's command byte.
    pub fn code(self) -> u8 {
        match self {
            Command::MoveTimeWrite => 1,
            Command::MoveTimeRead => 2,
            Command::MoveTimeWaitWrite => 7,
            Command::MoveTimeWaitRead => 8,
            Command::MoveStart => 11,
            Command::MoveStop => 12,
            Command::AngleOffsetAdjust => 17,
            Command::AngleOffsetWrite => 18,
            Command::AngleOffsetRead => 19,
            Command::AngleLimitWrite => 20,
            Command::AngleLimitRead => 21,
            Command::VinLimitWrite => 22,
            Command::VinLimitRead => 23,
            Command::TempLimitWrite => 24,
            Command::TempLimitRead => 25,
            Command::TempRead => 26,
            Command::VinRead => 27,
            Command::PosRead => 28,
            Command::MotorModeWrite => 29,
            Command::MotorModeRead => 30,
            Command::LoadModeWrite => 31,
            Command::LoadModeRead => 32,
            Command::LedCtrlWrite => 33,
            Command::LedCtrlRead => 34,
            Command::LedErrorWrite => 35,
            Command::LedErrorRead => 36,
        }
    }

    /// Look a command up by wire code. Reserved and unsupported codes
    /// (3-6, 9-10, 13-16) return `None`.
    pub fn from_code(code: u8) -> Option<Command> {
        Some(match code {
            1 => Command::MoveTimeWrite,
            2 => Command::MoveTimeRead,
            7 => Command::MoveTimeWaitWrite,
            8 => Command::MoveTimeWaitRead,
            11 => Command::MoveStart,
            12 => Command::MoveStop,
            17 => Command::AngleOffsetAdjust,
            18 => Command::AngleOffsetWrite,
            19 => Command::AngleOffsetRead,
            20 => Command::AngleLimitWrite,
            21 => Command::AngleLimitRead,
            22 => Command::VinLimitWrite,
            23 => Command::VinLimitRead,
            24 => Command::TempLimitWrite,
            25 => Command::TempLimitRead,
            26 => Command::TempRead,
            27 => Command::VinRead,
            28 => Command::PosRead,
            29 => Command::MotorModeWrite,
            30 => Command::MotorModeRead,
            31 => Command::LoadModeWrite,
            32 => Command::LoadModeRead,
            33 => Command::LedCtrlWrite,
            34 => Command::LedCtrlRead,
            35 => Command::LedErrorWrite,
            36 => Command::LedErrorRead,
            _ => return None,
        })
    }

    /// Parameter arity of the request frame. Fixed per code; frames with a
    /// different parameter count are rejected by the codec.
    pub fn param_kind(self) -> ParamKind {
        match self {
            Command::MoveTimeWrite
            | Command::MoveTimeWaitWrite
            | Command::AngleLimitWrite
            | Command::VinLimitWrite
            | Command::MotorModeWrite => ParamKind::Pair,
            Command::AngleOffsetAdjust
            | Command::TempLimitWrite
            | Command::LoadModeWrite
            | Command::LedCtrlWrite
            | Command::LedErrorWrite => ParamKind::Byte,
            _ => ParamKind::None,
        }
    }

    /// Write commands are consumed silently; read commands are answered.
    pub fn kind(self) -> CommandKind {
        match self {
            Command::MoveTimeRead
            | Command::MoveTimeWaitRead
            | Command::AngleOffsetRead
            | Command::AngleLimitRead
            | Command::VinLimitRead
            | Command::TempLimitRead
            | Command::TempRead
            | Command::VinRead
            | Command::PosRead
            | Command::MotorModeRead
            | Command::LoadModeRead
            | Command::LedCtrlRead
            | Command::LedErrorRead => CommandKind::Read,
            _ => CommandKind::Write,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Command; 26] = [
        Command::MoveTimeWrite,
        Command::MoveTimeRead,
        Command::MoveTimeWaitWrite,
        Command::MoveTimeWaitRead,
        Command::MoveStart,
        Command::MoveStop,
        Command::AngleOffsetAdjust,
        Command::AngleOffsetWrite,
        Command::AngleOffsetRead,
        Command::AngleLimitWrite,
        Command::AngleLimitRead,
        Command::VinLimitWrite,
        Command::VinLimitRead,
        Command::TempLimitWrite,
        Command::TempLimitRead,
        Command::TempRead,
        Command::VinRead,
        Command::PosRead,
        Command::MotorModeWrite,
        Command::MotorModeRead,
        Command::LoadModeWrite,
        Command::LoadModeRead,
        Command::LedCtrlWrite,
        Command::LedCtrlRead,
        Command::LedErrorWrite,
        Command::LedErrorRead,
    ];

    #[test]
    fn codes_round_trip() {
        for cmd in ALL {
            assert_eq!(Command::from_code(cmd.code()), Some(cmd));
        }
    }

    #[test]
    fn reserved_codes_are_rejected() {
        for code in [0, 3, 4, 5, 6, 9, 10, 13, 14, 15, 16, 37, 255] {
            assert_eq!(Command::from_code(code), None, "code {code}");
        }
    }

    #[test]
    fn arity_matches_the_catalog() {
        let pairs = [
            (Command::MoveTimeWrite, ParamKind::Pair),
            (Command::MoveTimeRead, ParamKind::None),
            (Command::MoveTimeWaitWrite, ParamKind::Pair),
            (Command::MoveStart, ParamKind::None),
            (Command::MoveStop, ParamKind::None),
            (Command::AngleOffsetAdjust, ParamKind::Byte),
            (Command::AngleOffsetWrite, ParamKind::None),
            (Command::AngleLimitWrite, ParamKind::Pair),
            (Command::VinLimitWrite, ParamKind::Pair),
            (Command::TempLimitWrite, ParamKind::Byte),
            (Command::MotorModeWrite, ParamKind::Pair),
            (Command::LoadModeWrite, ParamKind::Byte),
            (Command::LedCtrlWrite, ParamKind::Byte),
            (Command::LedErrorWrite, ParamKind::Byte),
        ];
        for (cmd, kind) in pairs {
            assert_eq!(cmd.param_kind(), kind, "{cmd:?}");
        }
    }

    #[test]
    fn read_commands_take_no_parameters() {
        for cmd in ALL {
            if cmd.kind() == CommandKind::Read {
                assert_eq!(cmd.param_kind(), ParamKind::None, "{cmd:?}");
            }
        }
    }
}
