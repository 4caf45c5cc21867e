//! The bridge status register.
//!
//! A single byte of sticky flags read by the bus master with the `Status` command.
//! The register is shared by the interrupt and main contexts, so every access goes
//! through a `critical_section` mutex.

use core::cell::Cell;
use critical_section::Mutex;

use crate::consts::{STATUS_LOG_OVERFLOW, STATUS_X10_ERROR};

/// Flags held in the [`StatusRegister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum StatusFlag {
    /// The event log overflowed and was reset. Cleared by a complete log drain.
    LogOverflow = STATUS_LOG_OVERFLOW,
    /// Reserved for power-line errors. Nothing raises it.
    X10Error = STATUS_X10_ERROR,
}

/// Interrupt-safe status byte.
///
/// # Example
/// ```rust
/// use x10_bridge::status::{StatusFlag, StatusRegister};
///
/// static STATUS: StatusRegister = StatusRegister::new();
///
/// STATUS.set(StatusFlag::LogOverflow);
/// assert_eq!(STATUS.read(), 0x01);
/// STATUS.clear(StatusFlag::LogOverflow);
/// assert_eq!(STATUS.read(), 0x00);
/// ```
#[derive(Debug)]
pub struct StatusRegister {
    bits: Mutex<Cell<u8>>,
}

impl StatusRegister {
    /// Creates a register with every flag clear.
    pub const fn new() -> Self {
        Self {
            bits: Mutex::new(Cell::new(0)),
        }
    }

    /// Returns the raw register byte.
    pub fn read(&self) -> u8 {
        critical_section::with(|cs| self.bits.borrow(cs).get())
    }

    /// Returns `true` if `flag` is raised.
    pub fn is_set(&self, flag: StatusFlag) -> bool {
        self.read() & flag as u8 != 0
    }

    /// Raises `flag`.
    pub fn set(&self, flag: StatusFlag) {
        critical_section::with(|cs| {
            let bits = self.bits.borrow(cs);
            bits.set(bits.get() | flag as u8);
        });
    }

    /// Clears `flag`.
    pub fn clear(&self, flag: StatusFlag) {
        critical_section::with(|cs| {
            let bits = self.bits.borrow(cs);
            bits.set(bits.get() & !(flag as u8));
        });
    }
}

impl Default for StatusRegister {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_independent() {
        let status = StatusRegister::new();
        status.set(StatusFlag::X10Error);
        status.set(StatusFlag::LogOverflow);
        assert_eq!(status.read(), 0x03);

        status.clear(StatusFlag::LogOverflow);
        assert!(!status.is_set(StatusFlag::LogOverflow));
        assert!(status.is_set(StatusFlag::X10Error));
        assert_eq!(status.read(), 0x02);
    }
}
