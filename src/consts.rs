//! Constants used across the bridge.
//!
//! This module defines the bus-facing values (slave address, status register bits),
//! the event log sizing, and the TW523 line timing used by the protocol engine.
//!
//! ## Key Concepts
//!
//! - **Status bits**: Sticky flags reported by the `Status` command.
//! - **Log capacity**: Size of the ring buffer backing the event log. One slot is always
//!   kept free, so the log holds at most `LOG_CAPACITY - 1` bytes.
//! - **Frame layout**: A frame is 13 sampled bits, 4 start-code bits followed by a 4-bit house
//!   code and a 5-bit key (4 data bits plus the function flag). On the wire every data bit is
//!   followed by its complement, so a frame occupies 22 half cycles.
//! - **Settle delay**: Time after a zero-crossing edge before the receive line is sampled.

/// Default bus slave address of the bridge.
pub const BUS_ADDRESS: u8 = 0x28;

/// Capacity (in bytes) of the event log ring buffer.
pub const LOG_CAPACITY: usize = 32;

/// Status register bit: the event log overflowed and was reset since the last drain.
pub const STATUS_LOG_OVERFLOW: u8 = 0x01;

/// Status register bit: reserved for power-line errors. Never raised.
pub const STATUS_X10_ERROR: u8 = 0x02;

/// Number of sampled bits in one frame, including the start code.
pub const FRAME_BITS: u8 = 13;

/// Number of start-code bits at the head of a frame. These are not followed by a complement.
pub const START_BITS: u8 = 4;

/// The start code `1110`, most significant bit first.
pub const START_CODE: u16 = 0b1110;

/// Bit position of the start code inside a frame word.
pub const START_SHIFT: u16 = 9;

/// Bit position of the house code inside a frame word.
pub const HOUSE_SHIFT: u16 = 5;

/// Number of half cycles one frame occupies on the line.
pub const FRAME_HALF_CYCLES: u8 = START_BITS + (FRAME_BITS - START_BITS) * 2;

/// Silent half cycles between the address frame and the function frame of a send.
pub const FRAME_GAP_EDGES: u8 = 6;

/// Edges ignored by the receiver after a complete frame.
pub const RECEIVE_QUIET_EDGES: u8 = 5;

/// Delay after a zero crossing before the receive line is sampled, in microseconds.
pub const SETTLE_DELAY_US: u32 = 500;

/// Width of a transmitted `1` burst, in microseconds.
pub const BURST_WIDTH_US: u32 = 1_000;

/// Half cycle of 60 Hz mains, in microseconds.
pub const HALF_CYCLE_US: u32 = 8_334;

/// Width of a single indicator blink, in nanoseconds.
pub const INDICATOR_PULSE_NS: u32 = 2_000;

/// The indicator blinks on every tick where `uptime & INDICATOR_TICK_MASK == 0`.
pub const INDICATOR_TICK_MASK: u32 = 0x7;

/// Indicator pulse length at start-up, in timer ticks.
pub const STARTUP_PULSE_TICKS: u16 = 1_000;

/// Indicator pulse length for each received bus command, in timer ticks.
pub const COMMAND_PULSE_TICKS: u16 = 100;

/// Poll interval used by sends with a timeout, in microseconds.
pub const SEND_POLL_US: u32 = 100;
