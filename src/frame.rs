//! Frame codec for the half-duplex servo bus.
//!
//! Every packet is `0x55 0x55`, servo ID, a length byte, the command code,
//! 0/1/2/4 parameter bytes and a checksum. The length byte counts ID
//! through checksum minus the header, i.e. `3 + parameter bytes`. The
//! checksum is the bitwise NOT of the byte sum over the ID-through-params
//! region; header and checksum byte are excluded.

use crate::command::{Command, ParamKind};
use crate::constants::{FRAME_HEADER, MIN_FRAME_LEN};
use crate::error::{CodecError, DecodeError};

/// Parameter payload carried by a frame.
///
/// Requests carry `None`, `Byte` or `Pair` depending on the command's
/// arity. Replies may additionally carry a single `Word` (voltage and
/// position reads). Signed quantities (offset, continuous-rotation speed,
/// near-zero positions) travel as two's complement and are reinterpreted
/// by the servo proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Params {
    /// No parameters
    None,
    /// Single byte
    Byte(u8),
    /// Single little-endian 16-bit word
    Word(u16),
    /// Two little-endian 16-bit words
    Pair(u16, u16),
}

impl Params {
    /// Number of parameter bytes on the wire.
    pub fn byte_len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Byte(_) => 1,
            Params::Word(_) => 2,
            Params::Pair(..) => 4,
        }
    }

    fn matches(&self, kind: ParamKind) -> bool {
        matches!(
            (self, kind),
            (Params::None, ParamKind::None)
                | (Params::Byte(_), ParamKind::Byte)
                | (Params::Pair(..), ParamKind::Pair)
        )
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        match *self {
            Params::None => {}
            Params::Byte(b) => buf.push(b),
            Params::Word(w) => buf.extend_from_slice(&w.to_le_bytes()),
            Params::Pair(a, b) => {
                buf.extend_from_slice(&a.to_le_bytes());
                buf.extend_from_slice(&b.to_le_bytes());
            }
        }
    }
}

/// A validated frame: who it addresses, what it asks, what it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Servo ID, 0-253, or 254 for broadcast
    pub id: u8,
    /// The protocol operation
    pub command: Command,
    /// Parameter payload
    pub params: Params,
}

/// Checksum over the ID-through-params region: `(!sum) & 0xFF`.
pub fn checksum(body: &[u8]) -> u8 {
    !body.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Total frame length implied by a length byte, or `None` for length
/// codes the protocol never produces.
pub(crate) fn frame_total_len(length_byte: u8) -> Option<usize> {
    match length_byte {
        3 | 4 | 5 | 7 => Some(length_byte as usize + 3),
        _ => None,
    }
}

impl Frame {
    /// Build a wire frame for `command` addressed to `id`.
    ///
    /// Fails with [`CodecError::InvalidParameterCount`] if the payload does
    /// not match the command's declared arity.
    pub fn encode(id: u8, command: Command, params: Params) -> Result<Vec<u8>, CodecError> {
        let kind = command.param_kind();
        if !params.matches(kind) {
            return Err(CodecError::InvalidParameterCount {
                command,
                expected: kind.byte_len(),
                actual: params.byte_len(),
            });
        }

        let mut body = Vec::with_capacity(MIN_FRAME_LEN + params.byte_len());
        body.push(id);
        body.push(3 + params.byte_len() as u8);
        body.push(command.code());
        params.write_to(&mut body);
        body.push(checksum(&body[..]));

        let mut frame = Vec::with_capacity(2 + body.len());
        frame.extend_from_slice(&FRAME_HEADER);
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Validate a complete reply buffer against `expected` and extract it.
    ///
    /// An absent or too-short buffer is [`DecodeError::Empty`]; a bad
    /// header, impossible or mismatched length byte, checksum failure, or a
    /// command byte other than `expected` is [`DecodeError::Corrupt`].
    pub fn decode(bytes: &[u8], expected: Command) -> Result<Frame, DecodeError> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(DecodeError::Empty);
        }
        if bytes[..2] != FRAME_HEADER {
            return Err(DecodeError::Corrupt);
        }

        let total = frame_total_len(bytes[3]).ok_or(DecodeError::Corrupt)?;
        if bytes.len() != total {
            return Err(DecodeError::Corrupt);
        }

        let body = &bytes[2..total - 1];
        if checksum(body) != bytes[total - 1] {
            return Err(DecodeError::Corrupt);
        }
        if bytes[4] != expected.code() {
            return Err(DecodeError::Corrupt);
        }

        let params = match bytes[3] {
            3 => Params::None,
            4 => Params::Byte(bytes[5]),
            5 => Params::Word(u16::from_le_bytes([bytes[5], bytes[6]])),
            7 => Params::Pair(
                u16::from_le_bytes([bytes[5], bytes[6]]),
                u16::from_le_bytes([bytes[7], bytes[8]]),
            ),
            _ => unreachable!("frame_total_len admits 3/4/5/7 only"),
        };

        Ok(Frame {
            id: bytes[2],
            command: expected,
            params,
        })
    }
}
