//! Error type shared by the bridge components.

use thiserror::Error;

/// Errors reported by the bridge.
///
/// None of these are fatal: the firmware logs them (where the protocol says so), answers the
/// bus master and keeps running.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Error {
    /// The bus master sent a command byte that is not in the command table.
    #[error("invalid command byte {0:#04x}")]
    InvalidCommand(u8),
    /// A house letter, unit number or command code has no X10 encoding.
    #[error("invalid house, unit or command code")]
    InvalidCode,
    /// A send with a timeout gave up waiting for the zero-crossing clock.
    #[error("timed out waiting for the line clock")]
    Timeout,
    /// The bus transport failed to receive or transmit a byte.
    #[error("bus transport error")]
    Transport,
}

impl Error {
    /// The one-byte result returned to the bus master for a `SendCode` request.
    pub fn result_code(&self) -> u8 {
        match self {
            Error::InvalidCode => 1,
            Error::Timeout => 2,
            Error::InvalidCommand(_) | Error::Transport => 0xff,
        }
    }
}
