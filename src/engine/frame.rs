//! X10 frame layout and half-cycle encoding.
//!
//! A frame is a 13-bit word, most significant bit first:
//!
//! ```text
//!  12 11 10  9 | 8  7  6  5 | 4  3  2  1 | 0
//!  1  1  1  0  |    house   |    key     | function flag
//! ```
//!
//! The start code is sent as-is, one bit per zero-crossing half cycle. Every other bit is
//! sent as the bit followed by its complement, so a frame takes 22 half cycles.
//!
//! X10 addresses a device and commands it in two frames: an address frame carrying the unit
//! code (flag clear) and a function frame carrying the command (flag set).

use crate::consts::{
    FRAME_BITS, FRAME_GAP_EDGES, FRAME_HALF_CYCLES, HOUSE_SHIFT, START_BITS, START_CODE,
    START_SHIFT,
};

/// The low five bits of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Key {
    /// Address frame with a 4-bit unit code.
    Unit(u8),
    /// Function frame with a 4-bit command code.
    Function(u8),
}

/// One decoded frame. Codes are the raw 4-bit line values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Frame {
    /// 4-bit house code
    pub house: u8,
    /// Unit or function payload
    pub key: Key,
}

impl Frame {
    /// Packs the frame into a 13-bit word, start code included.
    pub fn to_word(&self) -> u16 {
        let (key, flag) = match self.key {
            Key::Unit(unit) => (unit, 0),
            Key::Function(command) => (command, 1),
        };
        (START_CODE << START_SHIFT)
            | (u16::from(self.house & 0x0f) << HOUSE_SHIFT)
            | (u16::from(key & 0x0f) << 1)
            | flag
    }

    /// Unpacks a received word. The start code is not checked.
    pub fn from_word(word: u16) -> Self {
        let house = ((word >> HOUSE_SHIFT) & 0x0f) as u8;
        let code = ((word >> 1) & 0x0f) as u8;
        let key = if word & 1 != 0 {
            Key::Function(code)
        } else {
            Key::Unit(code)
        };
        Self { house, key }
    }
}

/// The line level for half cycle `slot` (0-21) of a frame word. `true` means a burst.
pub fn half_cycle(word: u16, slot: u8) -> bool {
    if slot < START_BITS {
        return (word >> (FRAME_BITS - 1 - slot)) & 1 != 0;
    }
    let data = slot - START_BITS;
    let bit = (word >> (FRAME_BITS - 1 - START_BITS - data / 2)) & 1 != 0;
    // Odd slots carry the complement
    if data & 1 == 1 { !bit } else { bit }
}

/// Half-cycle stream for one send: address frame, a silent gap, then the function frame.
///
/// Yields one line level per zero-crossing edge.
#[derive(Debug, Clone)]
pub struct TransmitSequence {
    frames: [u16; 2],
    position: u8,
}

impl TransmitSequence {
    /// Total number of edges a send occupies.
    pub const LEN: u8 = FRAME_HALF_CYCLES * 2 + FRAME_GAP_EDGES;

    /// Builds the stream for 4-bit `house`, `unit` and `command` codes.
    pub fn new(house: u8, unit: u8, command: u8) -> Self {
        let address = Frame {
            house,
            key: Key::Unit(unit),
        };
        let function = Frame {
            house,
            key: Key::Function(command),
        };
        Self {
            frames: [address.to_word(), function.to_word()],
            position: 0,
        }
    }

    /// Returns `true` once every half cycle has been yielded.
    pub fn is_finished(&self) -> bool {
        self.position >= Self::LEN
    }
}

impl Iterator for TransmitSequence {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        const FUNCTION_START: u8 = FRAME_HALF_CYCLES + FRAME_GAP_EDGES;

        let slot = self.position;
        let level = if slot < FRAME_HALF_CYCLES {
            half_cycle(self.frames[0], slot)
        } else if slot < FUNCTION_START {
            false
        } else if slot < Self::LEN {
            half_cycle(self.frames[1], slot - FUNCTION_START)
        } else {
            return None;
        };
        self.position += 1;
        Some(level)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = Self::LEN.saturating_sub(self.position) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for TransmitSequence {}
