//! Bus transport: serializes every host/servo exchange onto the shared
//! half-duplex link.
//!
//! All 18 servos hang off one UART. A write points the line at the bus,
//! transmits, and returns. A query additionally waits out the servo's
//! turnaround, points the line back at the host, and polls for the reply,
//! resending the request until either a valid frame lands or the retry
//! budget runs out. Exclusive access is the caller's job; [`SharedBus`]
//! wraps the transport in a mutex whose guard spans complete cycles.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::channel::BusChannel;
use crate::command::Command;
use crate::constants::{BUS_TURNAROUND, QUERY_RETRY_BUDGET, READ_POLL_ATTEMPTS};
use crate::error::{DecodeError, TransportError};
use crate::frame::{frame_total_len, Frame, Params};

/// Handle under which every servo proxy reaches the one physical bus.
/// Each proxy call holds the lock for its full send/settle/read cycle, so
/// concurrent hosts cannot interleave bytes on the wire.
pub type SharedBus = Arc<Mutex<BusTransport>>;

/// Owns the half-duplex channel and enforces direction discipline.
pub struct BusTransport {
    channel: Box<dyn BusChannel>,
}

impl BusTransport {
    /// Take exclusive ownership of a channel.
    pub fn new(channel: Box<dyn BusChannel>) -> Self {
        BusTransport { channel }
    }

    /// Wrap a channel in the shared, lockable form the proxies expect.
    pub fn shared(channel: Box<dyn BusChannel>) -> SharedBus {
        Arc::new(Mutex::new(BusTransport::new(channel)))
    }

    /// Switch the line to write mode and emit one frame.
    ///
    /// Broadcast (ID 254) is write-only: every servo receives the frame and
    /// none replies. Addressing broadcast with a read command is only
    /// meaningful with a single device on the bus; that precondition is the
    /// caller's to uphold.
    pub fn send_command(
        &mut self,
        id: u8,
        command: Command,
        params: Params,
    ) -> Result<(), TransportError> {
        let bytes = Frame::encode(id, command, params)?;
        self.channel.set_write_mode()?;
        trace!("tx {}", hex(&bytes));
        self.channel.write(&bytes)?;
        Ok(())
    }

    /// Send a read command and wait for the matching reply.
    ///
    /// One cycle is: clear stale input, transmit, sleep the device
    /// turnaround, switch to read mode, then poll. Bytes are accumulated
    /// across polls until the frame's declared length has arrived; a buffer
    /// that then fails validation ends the cycle. Cycles repeat until the
    /// wall-clock budget is spent, after which the transport reports
    /// `Corrupt` if the last cycle saw a mangled reply and `Timeout`
    /// otherwise.
    pub fn query(&mut self, id: u8, command: Command) -> Result<Params, TransportError> {
        let deadline = Instant::now() + QUERY_RETRY_BUDGET;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.channel.clear_input()?;
            self.send_command(id, command, Params::None)?;
            thread::sleep(BUS_TURNAROUND);
            self.channel.set_read_mode()?;

            let mut corrupt = false;
            let mut pending: Vec<u8> = Vec::new();
            for _ in 0..READ_POLL_ATTEMPTS {
                thread::sleep(BUS_TURNAROUND);
                let chunk = self.channel.read_available()?;
                pending.extend_from_slice(&chunk);
                if pending.is_empty() {
                    continue;
                }
                if let Some(total) = declared_total(&pending) {
                    if pending.len() < total {
                        // Reply still coming in.
                        continue;
                    }
                }
                match Frame::decode(&pending, command) {
                    Ok(frame) => {
                        trace!("rx {}", hex(&pending));
                        return Ok(frame.params);
                    }
                    Err(DecodeError::Empty) => continue,
                    Err(DecodeError::Corrupt) => {
                        debug!(
                            "servo {id}: corrupt reply to {command:?}: {}",
                            hex(&pending)
                        );
                        corrupt = true;
                        self.channel.clear_input()?;
                        break;
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(if corrupt {
                    TransportError::Corrupt
                } else {
                    TransportError::Timeout
                });
            }
            debug!("servo {id}: no reply to {command:?} on attempt {attempt}, resending");
        }
    }
}

/// Total frame length the buffer claims, once the length byte is in.
fn declared_total(pending: &[u8]) -> Option<usize> {
    if pending.len() >= 4 {
        frame_total_len(pending[3])
    } else {
        None
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::{BusEvent, MockChannel};
    use crate::frame::checksum;

    fn transport(mock: &MockChannel) -> BusTransport {
        BusTransport::new(Box::new(mock.clone()))
    }

    fn reply(id: u8, command: Command, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x55, 0x55, id, 3 + payload.len() as u8, command.code()];
        bytes.extend_from_slice(payload);
        bytes.push(checksum(&bytes[2..]));
        bytes
    }

    #[test]
    fn send_switches_to_write_mode_first() {
        let mock = MockChannel::new();
        let mut bus = transport(&mock);
        bus.send_command(3, Command::MoveStart, Params::None).unwrap();

        let events = mock.events();
        assert_eq!(events[0], BusEvent::SetWriteMode);
        assert!(matches!(events[1], BusEvent::Write(_)));
    }

    #[test]
    fn query_returns_the_reply_payload() {
        let mock = MockChannel::new();
        mock.push_reply(reply(7, Command::PosRead, &[0xF4, 0x01]));
        let mut bus = transport(&mock);

        let params = bus.query(7, Command::PosRead).unwrap();
        assert_eq!(params, Params::Word(500));

        // Direction discipline: cleared, written, then switched to read.
        let events = mock.events();
        assert_eq!(
            events[..3],
            [
                BusEvent::ClearInput,
                BusEvent::SetWriteMode,
                BusEvent::Write(Frame::encode(7, Command::PosRead, Params::None).unwrap()),
            ]
        );
        assert_eq!(events[3], BusEvent::SetReadMode);
    }

    #[test]
    fn query_reassembles_a_reply_split_across_polls() {
        let mock = MockChannel::new();
        let frame = reply(2, Command::VinRead, &[0x6A, 0x2A]);
        mock.push_reply(frame[..3].to_vec());
        mock.push_reply(frame[3..].to_vec());
        let mut bus = transport(&mock);

        let params = bus.query(2, Command::VinRead).unwrap();
        assert_eq!(params, Params::Word(0x2A6A));
    }

    #[test]
    fn silent_bus_times_out_after_resending() {
        let mock = MockChannel::new();
        let mut bus = transport(&mock);

        let started = Instant::now();
        let err = bus.query(1, Command::TempRead).unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
        assert!(started.elapsed() >= QUERY_RETRY_BUDGET);

        let sends = mock
            .events()
            .iter()
            .filter(|e| matches!(e, BusEvent::Write(_)))
            .count();
        assert!(sends > 1, "expected resends, saw {sends} send(s)");
    }

    #[test]
    fn mangled_replies_surface_as_corrupt() {
        let mock = MockChannel::new();
        // More corrupt replies than the budget can consume.
        for _ in 0..10_000 {
            let mut bytes = reply(1, Command::TempRead, &[55]);
            let last = bytes.len() - 1;
            bytes[last] ^= 0xFF;
            mock.push_reply(bytes);
        }
        let mut bus = transport(&mock);

        let err = bus.query(1, Command::TempRead).unwrap_err();
        assert!(matches!(err, TransportError::Corrupt));
    }

    #[test]
    fn encode_failure_transmits_nothing() {
        let mock = MockChannel::new();
        let mut bus = transport(&mock);
        let err = bus
            .send_command(1, Command::MoveStart, Params::Byte(1))
            .unwrap_err();
        assert!(matches!(err, TransportError::Codec(_)));
        assert!(mock.events().is_empty());
    }
}
