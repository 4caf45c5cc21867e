//! Volatile event log.
//!
//! The [`EventLog`] appends small records to a [`RingBuffer`] and streams them to the bus
//! master on request. Records are stored back to back with no delimiters; their length is
//! implied by their first byte (see [`EventKind::record_len`]).
//!
//! ## Overflow
//!
//! When a record does not fit, the log is not trimmed. Instead the whole buffer is dropped,
//! [`StatusFlag::LogOverflow`] is raised, and logging starts again from empty. The flag stays
//! up until the next complete drain.
//!
//! ## Drain format
//!
//! ```text
//! [len][len bytes] [len][len bytes] ... [0x00]
//! ```
//!
//! Every chunk is at most the log capacity, and the stream always ends with a zero length.

use heapless::Vec;

use crate::ring::RingBuffer;
use crate::status::{StatusFlag, StatusRegister};

/// Length of the longest record.
pub const MAX_RECORD_LEN: usize = 4;

/// First byte of every log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum EventKind {
    /// The firmware started. No payload.
    Startup = 0x01,
    /// The bus master sent an unknown command. Payload: the offending byte.
    InvalidCommand = 0x02,
    /// A `Ping` command was handled. No payload.
    Ping = 0x03,
    /// An `Uptime` command was handled. No payload.
    Uptime = 0x04,
    /// A function frame was received. Payload: command, house letter, unit number.
    X10Recv = 0x05,
    /// A `SendCode` command was received. Payload: command, house letter, unit number.
    X10Send = 0x06,
}

impl EventKind {
    /// Total record length, kind byte included.
    pub const fn record_len(self) -> usize {
        match self {
            EventKind::Startup | EventKind::Ping | EventKind::Uptime => 1,
            EventKind::InvalidCommand => 2,
            EventKind::X10Recv | EventKind::X10Send => 4,
        }
    }
}

impl TryFrom<u8> for EventKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(EventKind::Startup),
            0x02 => Ok(EventKind::InvalidCommand),
            0x03 => Ok(EventKind::Ping),
            0x04 => Ok(EventKind::Uptime),
            0x05 => Ok(EventKind::X10Recv),
            0x06 => Ok(EventKind::X10Send),
            other => Err(other),
        }
    }
}

/// A decoded log record.
///
/// `house` is the ASCII house letter and `unit` the unit number (1-16), exactly as they
/// appear on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum EventRecord {
    /// See [`EventKind::Startup`]
    Startup,
    /// See [`EventKind::InvalidCommand`]
    InvalidCommand(u8),
    /// See [`EventKind::Ping`]
    Ping,
    /// See [`EventKind::Uptime`]
    Uptime,
    /// See [`EventKind::X10Recv`]
    X10Recv {
        /// Function code
        command: u8,
        /// House letter
        house: u8,
        /// Unit number
        unit: u8,
    },
    /// See [`EventKind::X10Send`]
    X10Send {
        /// Requested command code
        command: u8,
        /// Requested house letter
        house: u8,
        /// Requested unit number
        unit: u8,
    },
}

impl EventRecord {
    /// The record's kind byte.
    pub fn kind(&self) -> EventKind {
        match self {
            EventRecord::Startup => EventKind::Startup,
            EventRecord::InvalidCommand(_) => EventKind::InvalidCommand,
            EventRecord::Ping => EventKind::Ping,
            EventRecord::Uptime => EventKind::Uptime,
            EventRecord::X10Recv { .. } => EventKind::X10Recv,
            EventRecord::X10Send { .. } => EventKind::X10Send,
        }
    }

    /// Serializes the record into its log bytes.
    pub fn encode(&self) -> Vec<u8, MAX_RECORD_LEN> {
        let mut bytes = Vec::new();
        let _ = bytes.push(self.kind() as u8);
        match *self {
            EventRecord::InvalidCommand(byte) => {
                let _ = bytes.push(byte);
            }
            EventRecord::X10Recv {
                command,
                house,
                unit,
            }
            | EventRecord::X10Send {
                command,
                house,
                unit,
            } => {
                let _ = bytes.extend_from_slice(&[command, house, unit]);
            }
            EventRecord::Startup | EventRecord::Ping | EventRecord::Uptime => {}
        }
        bytes
    }

    /// Parses the record at the start of `bytes`.
    ///
    /// # Returns
    /// The record and its length, or `None` if the kind byte is unknown or the record is
    /// truncated.
    pub fn parse(bytes: &[u8]) -> Option<(EventRecord, usize)> {
        let kind = EventKind::try_from(*bytes.first()?).ok()?;
        let len = kind.record_len();
        let body = bytes.get(..len)?;
        let record = match kind {
            EventKind::Startup => EventRecord::Startup,
            EventKind::InvalidCommand => EventRecord::InvalidCommand(body[1]),
            EventKind::Ping => EventRecord::Ping,
            EventKind::Uptime => EventRecord::Uptime,
            EventKind::X10Recv => EventRecord::X10Recv {
                command: body[1],
                house: body[2],
                unit: body[3],
            },
            EventKind::X10Send => EventRecord::X10Send {
                command: body[1],
                house: body[2],
                unit: body[3],
            },
        };
        Some((record, len))
    }
}

/// Fixed-capacity event log backed by a [`RingBuffer`].
///
/// The overflow flag lives in a [`StatusRegister`] borrowed for the log's lifetime, so the
/// same register can be reported by the `Status` command.
#[derive(Debug)]
pub struct EventLog<'a, const N: usize> {
    ring: RingBuffer<N>,
    status: &'a StatusRegister,
}

impl<'a, const N: usize> EventLog<'a, N> {
    /// Creates an empty log reporting overflow into `status`.
    pub const fn new(status: &'a StatusRegister) -> Self {
        Self {
            ring: RingBuffer::new(),
            status,
        }
    }

    /// Returns `true` if nothing is waiting to be drained.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Appends raw record bytes.
    ///
    /// If the record does not fit, the log is reset and [`StatusFlag::LogOverflow`] is
    /// raised; the reset runs inside a critical section so an interrupt cannot log into a
    /// half-reset buffer.
    ///
    /// # Returns
    /// How many bytes were inserted before the buffer filled up.
    pub fn append(&mut self, event: &[u8]) -> usize {
        let inserted = self.ring.insert(event);

        if inserted < event.len() {
            critical_section::with(|_| {
                self.status.set(StatusFlag::LogOverflow);
                self.ring.initialize(b'@');
            });
            warn!("event log overflow, {} bytes dropped", event.len() - inserted);
        }

        inserted
    }

    /// Encodes and appends a typed record.
    pub fn record(&mut self, record: EventRecord) -> usize {
        self.append(&record.encode())
    }

    /// Moves the buffered records out into a new log, leaving this one empty.
    ///
    /// Lets the caller drain a snapshot without holding the log locked.
    pub fn take(&mut self) -> Self {
        Self {
            ring: core::mem::take(&mut self.ring),
            status: self.status,
        }
    }

    /// Streams everything buffered to `transmit` in length-prefixed chunks.
    ///
    /// Writes `[len][bytes...]` for each contiguous run of the ring, then a single zero.
    /// [`StatusFlag::LogOverflow`] is cleared once the terminator has been sent.
    ///
    /// # Returns
    /// The number of record bytes drained, or the first error from `transmit`. On error the
    /// overflow flag is left untouched.
    pub fn drain<E, F>(&mut self, mut transmit: F) -> Result<usize, E>
    where
        F: FnMut(u8) -> Result<(), E>,
    {
        let mut failure = None;

        let count = self.ring.read_with_drain(N, |run| {
            let mut sent = 0;
            while sent < run.len() {
                let len = (run.len() - sent).min(N).min(u8::MAX as usize);
                let chunk = &run[sent..sent + len];
                let result = transmit(len as u8)
                    .and_then(|_| chunk.iter().try_for_each(|&byte| transmit(byte)));
                if let Err(err) = result {
                    failure = Some(err);
                    break;
                }
                sent += len;
            }
            sent
        });

        if let Some(err) = failure {
            return Err(err);
        }

        transmit(0)?;
        self.status.clear(StatusFlag::LogOverflow);
        debug!("drained {} log bytes", count);
        Ok(count)
    }
}
