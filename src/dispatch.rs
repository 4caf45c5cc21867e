//! Bus command handling.
//!
//! The bridge is a slave on a byte-oriented peripheral bus. The master writes a one-byte
//! [`Command`], optionally followed by parameters, and reads back the reply.
//!
//! | Command    | Byte   | Request            | Reply                                   |
//! |------------|--------|--------------------|-----------------------------------------|
//! | `Ping`     | `0x01` |                    | `P O N G`                               |
//! | `Uptime`   | `0x02` |                    | timer ticks, 4 bytes little endian      |
//! | `Status`   | `0x03` |                    | status register byte                    |
//! | `ReadLog`  | `0x04` |                    | `[len][bytes]...` chunks, then `0`      |
//! | `SendCode` | `0x05` | command house unit | `0` on success, otherwise an error code |
//!
//! Any other byte is answered with `0xFF` and logged.

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use nb::block;

use crate::bridge::Bridge;
use crate::consts::{BUS_ADDRESS, COMMAND_PULSE_TICKS, STARTUP_PULSE_TICKS};
use crate::error::Error;
use crate::event_log::EventRecord;

/// The byte transport the bus master talks through, e.g. an I²C or USI slave peripheral.
pub trait Transport {
    /// Transport error
    type Error: Debug;

    /// Starts listening as a slave on `address`.
    fn init_slave(&mut self, address: u8) -> Result<(), Self::Error>;

    /// `true` if the master has written a byte that has not been read yet.
    fn has_pending_data(&mut self) -> bool;

    /// Reads the next byte from the master.
    fn receive_byte(&mut self) -> nb::Result<u8, Self::Error>;

    /// Queues a byte for the master to read.
    fn transmit_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;
}

/// Commands understood by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Liveness check
    Ping = 0x01,
    /// Read the uptime counter
    Uptime = 0x02,
    /// Read the status register
    Status = 0x03,
    /// Drain the event log
    ReadLog = 0x04,
    /// Send an X10 code
    SendCode = 0x05,
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Command::Ping),
            0x02 => Ok(Command::Uptime),
            0x03 => Ok(Command::Status),
            0x04 => Ok(Command::ReadLog),
            0x05 => Ok(Command::SendCode),
            other => Err(other),
        }
    }
}

/// Reads commands from a [`Transport`] and runs them against a [`Bridge`].
///
/// Handles one command at a time; a `SendCode` blocks until the code is on the line.
#[derive(Debug)]
pub struct CommandDispatcher<'b, 'a, TX, RX, LED, D, const N: usize>
where
    TX: OutputPin,
    RX: InputPin,
    LED: OutputPin,
    D: DelayNs,
{
    bridge: &'b Bridge<'a, TX, RX, LED, D, N>,
}

impl<'b, 'a, TX, RX, LED, D, const N: usize> CommandDispatcher<'b, 'a, TX, RX, LED, D, N>
where
    TX: OutputPin,
    RX: InputPin,
    LED: OutputPin,
    D: DelayNs,
{
    /// Creates a dispatcher for `bridge`.
    pub fn new(bridge: &'b Bridge<'a, TX, RX, LED, D, N>) -> Self {
        Self { bridge }
    }

    /// Start-up sequence: logs [`EventRecord::Startup`], joins the bus at
    /// [`BUS_ADDRESS`] and flashes the status light.
    ///
    /// # Errors
    /// [`Error::Transport`] if the slave could not be set up.
    pub fn start<T: Transport>(&mut self, transport: &mut T) -> Result<(), Error> {
        let _ = self.bridge.log_event(EventRecord::Startup);
        transport
            .init_slave(BUS_ADDRESS)
            .map_err(|_| Error::Transport)?;
        self.bridge.pulse(STARTUP_PULSE_TICKS);
        info!("x10 bridge listening on {}", BUS_ADDRESS);
        Ok(())
    }

    /// Handles one command if the master has sent one.
    ///
    /// ```rust,ignore
    /// dispatcher.start(&mut transport)?;
    /// loop {
    ///     dispatcher.poll(&mut transport)?;
    /// }
    /// ```
    ///
    /// # Returns
    /// `true` if a command was handled.
    ///
    /// # Errors
    /// [`Error::Transport`] if the transport failed mid-command.
    pub fn poll<T: Transport>(&mut self, transport: &mut T) -> Result<bool, Error> {
        if !transport.has_pending_data() {
            return Ok(false);
        }

        self.bridge.pulse(COMMAND_PULSE_TICKS);
        let byte = receive(transport)?;
        self.dispatch(byte, transport)?;
        Ok(true)
    }

    /// Runs the command `byte`, reading parameters from and replying through `transport`.
    ///
    /// Unknown bytes are answered and logged, not reported as errors.
    ///
    /// # Errors
    /// [`Error::Transport`] if the transport failed.
    pub fn dispatch<T: Transport>(&mut self, byte: u8, transport: &mut T) -> Result<(), Error> {
        let Ok(command) = Command::try_from(byte) else {
            return self.invalid(byte, transport);
        };
        debug!("dispatching command {}", byte);

        match command {
            Command::Ping => self.ping(transport),
            Command::Uptime => self.uptime(transport),
            Command::Status => reply(transport, &[self.bridge.status()]),
            Command::ReadLog => self.read_log(transport),
            Command::SendCode => self.send_code(transport),
        }
    }

    fn ping<T: Transport>(&mut self, transport: &mut T) -> Result<(), Error> {
        let _ = self.bridge.log_event(EventRecord::Ping);
        reply(transport, b"PONG")
    }

    fn uptime<T: Transport>(&mut self, transport: &mut T) -> Result<(), Error> {
        let _ = self.bridge.log_event(EventRecord::Uptime);
        reply(transport, &self.bridge.uptime().to_le_bytes())
    }

    fn read_log<T: Transport>(&mut self, transport: &mut T) -> Result<(), Error> {
        let _ = self
            .bridge
            .drain_log(|byte| block!(transport.transmit_byte(byte)))
            .map_err(|_| Error::Transport)?;
        Ok(())
    }

    fn send_code<T: Transport>(&mut self, transport: &mut T) -> Result<(), Error> {
        let command = receive(transport)?;
        let house = receive(transport)?;
        let unit = receive(transport)?;

        // Logged before validation so rejected requests show up too
        let _ = self.bridge.log_event(EventRecord::X10Send {
            command,
            house,
            unit,
        });

        let code = match self.bridge.send(command, house, unit) {
            Ok(()) => 0,
            Err(err) => {
                warn!("send rejected with code {}", err.result_code());
                err.result_code()
            }
        };
        reply(transport, &[code])
    }

    fn invalid<T: Transport>(&mut self, byte: u8, transport: &mut T) -> Result<(), Error> {
        warn!("invalid command byte {}", byte);
        reply(transport, &[0xff])?;
        let _ = self.bridge.log_event(EventRecord::InvalidCommand(byte));
        Ok(())
    }
}

fn receive<T: Transport>(transport: &mut T) -> Result<u8, Error> {
    block!(transport.receive_byte()).map_err(|_| Error::Transport)
}

fn reply<T: Transport>(transport: &mut T, bytes: &[u8]) -> Result<(), Error> {
    for &byte in bytes {
        block!(transport.transmit_byte(byte)).map_err(|_| Error::Transport)?;
    }
    Ok(())
}
