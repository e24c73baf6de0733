//! The physical half-duplex channel under the bus transport.
//!
//! The servo bus is one wire pair: the host and the servos cannot transmit
//! at the same time, and on the Raspberry Pi expansion board the direction
//! is selected by two GPIO lines (RX_CON on GPIO 17, TX_CON on GPIO 27).
//! [`BusChannel`] is the seam between the protocol engine and that
//! hardware; [`SerialChannel`] is the serialport-backed implementation and
//! [`mock::MockChannel`] a recording double for tests.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::constants::{BAUD_RATE, PORT_TIMEOUT};

/// One half-duplex byte channel with explicit direction control.
///
/// Implementations are free to make the direction switches no-ops when the
/// hardware switches direction on its own (USB bus-servo adapters do).
pub trait BusChannel: Send {
    /// Point the line at the servos. Must be called before transmitting.
    fn set_write_mode(&mut self) -> io::Result<()>;

    /// Point the line at the host so a servo reply can come in.
    fn set_read_mode(&mut self) -> io::Result<()>;

    /// Transmit bytes onto the bus.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Drain and return whatever has arrived since the last read.
    /// Returns an empty buffer when nothing is pending.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    /// Throw away any unread input.
    fn clear_input(&mut self) -> io::Result<()>;
}

/// GPIO pair that steers the expansion board's UART direction.
#[cfg(feature = "raspi")]
pub struct DirectionPins {
    rx_con: rppal::gpio::OutputPin,
    tx_con: rppal::gpio::OutputPin,
}

/// BCM pin driving RX_CON on the expansion board.
#[cfg(feature = "raspi")]
pub const RX_CON_PIN: u8 = 17;

/// BCM pin driving TX_CON on the expansion board.
#[cfg(feature = "raspi")]
pub const TX_CON_PIN: u8 = 27;

#[cfg(feature = "raspi")]
impl DirectionPins {
    /// Claim the two direction lines, leaving the board in write mode.
    pub fn new(rx_con: u8, tx_con: u8) -> rppal::gpio::Result<Self> {
        let gpio = rppal::gpio::Gpio::new()?;
        let mut pins = DirectionPins {
            rx_con: gpio.get(rx_con)?.into_output(),
            tx_con: gpio.get(tx_con)?.into_output(),
        };
        pins.write_mode();
        Ok(pins)
    }

    fn write_mode(&mut self) {
        self.rx_con.set_low();
        self.tx_con.set_high();
    }

    fn read_mode(&mut self) {
        self.rx_con.set_high();
        self.tx_con.set_low();
    }
}

/// Serial port implementation of [`BusChannel`].
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    #[cfg(feature = "raspi")]
    pins: Option<DirectionPins>,
}

impl SerialChannel {
    /// Open the bus UART at the protocol's 115200 baud.
    pub fn open(port_name: &str) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, BAUD_RATE)
            .timeout(PORT_TIMEOUT)
            .open()?;
        Ok(SerialChannel {
            port,
            #[cfg(feature = "raspi")]
            pins: None,
        })
    }

    /// Open with a custom read timeout.
    pub fn open_with_timeout(
        port_name: &str,
        timeout: Duration,
    ) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, BAUD_RATE).timeout(timeout).open()?;
        Ok(SerialChannel {
            port,
            #[cfg(feature = "raspi")]
            pins: None,
        })
    }

    /// Steer direction through the expansion board's GPIO pair.
    #[cfg(feature = "raspi")]
    pub fn with_direction_pins(mut self, pins: DirectionPins) -> Self {
        self.pins = Some(pins);
        self
    }

    /// List available serial ports.
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, serialport::Error> {
        serialport::available_ports()
    }
}

impl BusChannel for SerialChannel {
    fn set_write_mode(&mut self) -> io::Result<()> {
        #[cfg(feature = "raspi")]
        if let Some(pins) = self.pins.as_mut() {
            pins.write_mode();
        }
        Ok(())
    }

    fn set_read_mode(&mut self) -> io::Result<()> {
        #[cfg(feature = "raspi")]
        if let Some(pins) = self.pins.as_mut() {
            pins.read_mode();
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let pending = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if pending == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; pending];
        self.port.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}

pub mod mock {
    //! A recording [`BusChannel`] for driving the stack without hardware.

    use super::BusChannel;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Arc;

    /// Everything a channel was asked to do, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BusEvent {
        /// Direction switched towards the servos
        SetWriteMode,
        /// Direction switched towards the host
        SetReadMode,
        /// Bytes transmitted
        Write(Vec<u8>),
        /// Input buffer discarded
        ClearInput,
    }

    #[derive(Default)]
    struct Inner {
        events: Vec<BusEvent>,
        replies: VecDeque<Vec<u8>>,
        fail_after_writes: Option<usize>,
    }

    /// Shared-handle mock: clone it, hand one clone to the transport, keep
    /// the other to script replies and inspect traffic.
    ///
    /// Each scripted reply is delivered by one `read_available` call.
    /// `clear_input` is recorded but does not consume scripted replies;
    /// they stand for bytes the device has not sent yet.
    #[derive(Clone, Default)]
    pub struct MockChannel {
        inner: Arc<Mutex<Inner>>,
    }

    impl MockChannel {
        /// Fresh channel with no scripted replies.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a buffer to be handed out by a future `read_available`.
        pub fn push_reply(&self, bytes: Vec<u8>) {
            self.inner.lock().replies.push_back(bytes);
        }

        /// Let `remaining` writes succeed, then fail every write with
        /// `BrokenPipe`.
        pub fn fail_after_writes(&self, remaining: usize) {
            self.inner.lock().fail_after_writes = Some(remaining);
        }

        /// Everything recorded so far.
        pub fn events(&self) -> Vec<BusEvent> {
            self.inner.lock().events.clone()
        }

        /// Drain the recording.
        pub fn take_events(&self) -> Vec<BusEvent> {
            std::mem::take(&mut self.inner.lock().events)
        }

        /// Just the transmitted buffers, in order.
        pub fn written_frames(&self) -> Vec<Vec<u8>> {
            self.inner
                .lock()
                .events
                .iter()
                .filter_map(|event| match event {
                    BusEvent::Write(bytes) => Some(bytes.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl BusChannel for MockChannel {
        fn set_write_mode(&mut self) -> io::Result<()> {
            self.inner.lock().events.push(BusEvent::SetWriteMode);
            Ok(())
        }

        fn set_read_mode(&mut self) -> io::Result<()> {
            self.inner.lock().events.push(BusEvent::SetReadMode);
            Ok(())
        }

        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            let mut inner = self.inner.lock();
            if let Some(remaining) = inner.fail_after_writes.as_mut() {
                if *remaining == 0 {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "bus gone"));
                }
                *remaining -= 1;
            }
            inner.events.push(BusEvent::Write(bytes.to_vec()));
            Ok(())
        }

        fn read_available(&mut self) -> io::Result<Vec<u8>> {
            Ok(self.inner.lock().replies.pop_front().unwrap_or_default())
        }

        fn clear_input(&mut self) -> io::Result<()> {
            self.inner.lock().events.push(BusEvent::ClearInput);
            Ok(())
        }
    }
}
