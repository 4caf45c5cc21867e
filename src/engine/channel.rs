//! Single-slot hand-off between the main context and the edge interrupt.
//!
//! The main context owns a send request until it is placed in the slot. The edge interrupt
//! picks it up when the line is idle, owns the transmission until the last half cycle and
//! then marks the slot done. The main context only ever polls, so nothing on the interrupt
//! path can block.
//!
//! ```text
//!   Idle --submit--> Pending --start--> InFlight --finish--> Done --poll_done--> Idle
//!                       |                   |
//!                       +--cancel--> Idle   +--cancel--> InFlight(cancelled) --finish--> Idle
//! ```

use core::cell::Cell;
use core::convert::Infallible;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use nb::block;

use crate::consts::SEND_POLL_US;
use crate::engine::codes::{house_code, unit_code};
use crate::error::Error;

/// A validated send, held as 4-bit line codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct SendRequest {
    /// 4-bit house code
    pub house: u8,
    /// 4-bit unit code
    pub unit: u8,
    /// 4-bit command code
    pub command: u8,
}

impl SendRequest {
    /// Validates a request given as it arrives on the bus.
    ///
    /// # Errors
    /// [`Error::InvalidCode`] if `command` does not fit in four bits or `house` / `unit` are
    /// not in the code tables.
    pub fn lookup(command: u8, house: u8, unit: u8) -> Result<Self, Error> {
        if command > 0x0f {
            return Err(Error::InvalidCode);
        }
        let house = house_code(house).ok_or(Error::InvalidCode)?;
        let unit = unit_code(unit).ok_or(Error::InvalidCode)?;
        Ok(Self {
            house,
            unit,
            command,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Idle,
    Pending(SendRequest),
    InFlight { cancelled: bool },
    Done,
}

/// The send slot shared by the main and interrupt contexts.
#[derive(Debug)]
pub struct SendChannel {
    slot: Mutex<Cell<Slot>>,
}

impl SendChannel {
    /// Creates an empty channel.
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(Slot::Idle)),
        }
    }

    fn update<R>(&self, f: impl FnOnce(Slot) -> (Slot, R)) -> R {
        critical_section::with(|cs| {
            let cell = self.slot.borrow(cs);
            let (next, result) = f(cell.get());
            cell.set(next);
            result
        })
    }

    /// Places `request` in the slot.
    ///
    /// Returns `WouldBlock` while another send is pending or on the line.
    pub fn submit(&self, request: SendRequest) -> nb::Result<(), Infallible> {
        self.update(|slot| match slot {
            Slot::Idle | Slot::Done => (Slot::Pending(request), Ok(())),
            busy => (busy, Err(nb::Error::WouldBlock)),
        })
    }

    /// Succeeds once no send is pending or on the line.
    pub fn poll_idle(&self) -> nb::Result<(), Infallible> {
        self.update(|slot| match slot {
            Slot::Idle | Slot::Done => (slot, Ok(())),
            busy => (busy, Err(nb::Error::WouldBlock)),
        })
    }

    /// Succeeds once the submitted send has gone out, and empties the slot.
    pub fn poll_done(&self) -> nb::Result<(), Infallible> {
        self.update(|slot| match slot {
            Slot::Done | Slot::Idle => (Slot::Idle, Ok(())),
            busy => (busy, Err(nb::Error::WouldBlock)),
        })
    }

    /// Abandons the submitted send.
    ///
    /// A request the interrupt has not picked up yet is withdrawn. One already on the line is
    /// flagged and stops at the next edge.
    ///
    /// # Returns
    /// `true` if nothing reached the line.
    pub fn cancel(&self) -> bool {
        self.update(|slot| match slot {
            Slot::Pending(_) => (Slot::Idle, true),
            Slot::InFlight { .. } => (Slot::InFlight { cancelled: true }, false),
            Slot::Done => (Slot::Idle, false),
            Slot::Idle => (Slot::Idle, true),
        })
    }

    /// Validates and sends one code, blocking until it has gone out on the line.
    ///
    /// Waits for any earlier send to finish first. Nothing bounds either wait: if the
    /// zero-crossing edges stop, this never returns. Use
    /// [`send_timeout()`](Self::send_timeout) where the clock is not guaranteed.
    ///
    /// # Errors
    /// [`Error::InvalidCode`] if the code cannot be encoded. Nothing is sent.
    pub fn send(&self, command: u8, house: u8, unit: u8) -> Result<(), Error> {
        let Ok(()) = block!(self.poll_idle());
        let request = SendRequest::lookup(command, house, unit)?;
        let Ok(()) = block!(self.submit(request));
        let Ok(()) = block!(self.poll_done());
        debug!("sent command {} to {}{}", command, house, unit);
        Ok(())
    }

    /// Like [`send()`](Self::send), but gives up after roughly `timeout_us` microseconds.
    ///
    /// The slot is polled every 100 µs using `delay`. On expiry a request still waiting in
    /// the slot is withdrawn and one already on the line is aborted at the next edge.
    ///
    /// # Errors
    /// [`Error::InvalidCode`] as for `send()`, or [`Error::Timeout`].
    pub fn send_timeout<W: DelayNs>(
        &self,
        command: u8,
        house: u8,
        unit: u8,
        delay: &mut W,
        timeout_us: u32,
    ) -> Result<(), Error> {
        let mut remaining = timeout_us;

        if !wait_for(|| self.poll_idle(), delay, &mut remaining) {
            warn!("send timed out waiting for the line");
            return Err(Error::Timeout);
        }
        let request = SendRequest::lookup(command, house, unit)?;
        if !wait_for(|| self.submit(request), delay, &mut remaining) {
            warn!("send timed out waiting for the line");
            return Err(Error::Timeout);
        }
        if !wait_for(|| self.poll_done(), delay, &mut remaining) {
            let withdrawn = self.cancel();
            warn!("send timed out, withdrawn before transmission: {}", withdrawn);
            return Err(Error::Timeout);
        }

        debug!("sent command {} to {}{}", command, house, unit);
        Ok(())
    }

    /// Interrupt side: takes a pending request and marks it in flight.
    pub fn start(&self) -> Option<SendRequest> {
        self.update(|slot| match slot {
            Slot::Pending(request) => (Slot::InFlight { cancelled: false }, Some(request)),
            other => (other, None),
        })
    }

    /// Interrupt side: `true` if the main context abandoned the send in flight.
    pub fn is_cancelled(&self) -> bool {
        critical_section::with(|cs| {
            matches!(self.slot.borrow(cs).get(), Slot::InFlight { cancelled: true })
        })
    }

    /// Interrupt side: ends the send in flight.
    ///
    /// A cancelled send has no waiter, so the slot goes straight back to idle.
    pub fn finish(&self) {
        self.update(|slot| match slot {
            Slot::InFlight { cancelled: false } => (Slot::Done, ()),
            Slot::InFlight { cancelled: true } => (Slot::Idle, ()),
            other => (other, ()),
        })
    }
}

impl Default for SendChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `f` every [`SEND_POLL_US`] until it succeeds or `remaining` runs out.
fn wait_for<W, F>(mut f: F, delay: &mut W, remaining: &mut u32) -> bool
where
    W: DelayNs,
    F: FnMut() -> nb::Result<(), Infallible>,
{
    loop {
        if f().is_ok() {
            return true;
        }
        if *remaining == 0 {
            return false;
        }
        let step = (*remaining).min(SEND_POLL_US);
        delay.delay_us(step);
        *remaining -= step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    #[test]
    fn test_lookup_validates_codes() {
        assert_eq!(
            SendRequest::lookup(2, b'M', 1),
            Ok(SendRequest {
                house: 0,
                unit: 6,
                command: 2
            })
        );
        assert_eq!(SendRequest::lookup(2, b'Z', 1), Err(Error::InvalidCode));
        assert_eq!(SendRequest::lookup(2, b'A', 0), Err(Error::InvalidCode));
        assert_eq!(SendRequest::lookup(16, b'A', 1), Err(Error::InvalidCode));
    }

    #[test]
    fn test_slot_hand_off() {
        let channel = SendChannel::new();
        let request = SendRequest::lookup(1, b'A', 2).unwrap();

        assert_eq!(channel.start(), None);
        channel.submit(request).unwrap();
        assert_eq!(channel.submit(request), Err(nb::Error::WouldBlock));
        assert_eq!(channel.poll_idle(), Err(nb::Error::WouldBlock));

        assert_eq!(channel.start(), Some(request));
        assert_eq!(channel.poll_done(), Err(nb::Error::WouldBlock));

        channel.finish();
        assert_eq!(channel.poll_idle(), Ok(()));
        assert_eq!(channel.poll_done(), Ok(()));
        assert_eq!(channel.start(), None);
    }

    #[test]
    fn test_cancel_withdraws_pending_request() {
        let channel = SendChannel::new();
        channel.submit(SendRequest::lookup(1, b'A', 2).unwrap()).unwrap();
        assert!(channel.cancel());
        assert_eq!(channel.start(), None);
        assert_eq!(channel.poll_idle(), Ok(()));
    }

    #[test]
    fn test_cancel_in_flight_aborts_at_finish() {
        let channel = SendChannel::new();
        channel.submit(SendRequest::lookup(1, b'A', 2).unwrap()).unwrap();
        assert!(channel.start().is_some());

        assert!(!channel.cancel());
        assert!(channel.is_cancelled());
        assert_eq!(channel.poll_idle(), Err(nb::Error::WouldBlock));

        channel.finish();
        assert!(!channel.is_cancelled());
        assert_eq!(channel.poll_idle(), Ok(()));
    }

    #[test]
    fn test_send_rejects_invalid_code_without_submitting() {
        let channel = SendChannel::new();
        assert_eq!(channel.send(3, b'Z', 1), Err(Error::InvalidCode));
        assert_eq!(channel.start(), None);
    }

    #[test]
    fn test_send_timeout_without_clock() {
        let channel = SendChannel::new();
        let mut delay = NoopDelay::new();
        assert_eq!(
            channel.send_timeout(3, b'A', 1, &mut delay, 1_000),
            Err(Error::Timeout)
        );
        // The request never reached the line, so it was withdrawn
        assert_eq!(channel.start(), None);
        assert_eq!(channel.poll_idle(), Ok(()));
    }

    #[test]
    fn test_send_completes_with_clock_thread() {
        let channel = SendChannel::new();
        std::thread::scope(|s| {
            let _ = s.spawn(|| {
                loop {
                    if channel.start().is_some() {
                        channel.finish();
                        break;
                    }
                    std::thread::yield_now();
                }
            });
            assert_eq!(channel.send(3, b'A', 1), Ok(()));
        });
    }
}
