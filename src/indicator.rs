//! Status light driver and uptime counter.
//!
//! [`StatusIndicator`] is advanced from the periodic timer interrupt. Each call to
//! [`on_tick()`](StatusIndicator::on_tick) bumps the uptime counter; while a pulse is pending
//! the light gets a short blink every eighth tick, otherwise it is held off.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::consts::{INDICATOR_PULSE_NS, INDICATOR_TICK_MASK};

/// Timer-driven blinker for the status light.
///
/// ## Example
///
/// ```rust
/// # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
/// # use embedded_hal_mock::eh1::delay::NoopDelay;
/// use x10_bridge::indicator::StatusIndicator;
///
/// # let led = Pin::new(&[
/// #     PinTransaction::set(PinState::Low),
/// #     PinTransaction::set(PinState::High),
/// #     PinTransaction::set(PinState::Low),
/// # ]);
/// let mut indicator = StatusIndicator::new(led, NoopDelay::new());
/// indicator.pulse(2);
/// indicator.on_tick(); // Called from the timer interrupt
/// assert_eq!(indicator.uptime(), 1);
/// # indicator.led.done();
/// ```
#[derive(Debug)]
pub struct StatusIndicator<LED, D>
where
    LED: OutputPin,
    D: DelayNs,
{
    /// Status light output pin
    pub led: LED,
    delay: D,
    remaining: u16,
    uptime: u32,
}

impl<LED, D> StatusIndicator<LED, D>
where
    LED: OutputPin,
    D: DelayNs,
{
    /// Creates the indicator with the light off and uptime at zero.
    pub fn new(mut led: LED, delay: D) -> Self {
        let _ = led.set_low(); // Start dark
        Self {
            led,
            delay,
            remaining: 0,
            uptime: 0,
        }
    }

    /// Requests a pulse lasting `ticks` timer ticks.
    ///
    /// Replaces whatever was left of the previous pulse; pulses are not queued.
    /// A duration of zero turns the light off at the next tick.
    pub fn pulse(&mut self, ticks: u16) {
        self.remaining = ticks;
    }

    /// Ticks left on the current pulse.
    pub fn remaining(&self) -> u16 {
        self.remaining
    }

    /// Timer ticks since start-up. Wraps after `u32::MAX`.
    pub fn uptime(&self) -> u32 {
        self.uptime
    }

    /// Advances the indicator by one timer tick.
    pub fn on_tick(&mut self) {
        let tick = self.uptime;
        self.uptime = self.uptime.wrapping_add(1);

        if self.remaining > 0 {
            self.remaining -= 1;
            if tick & INDICATOR_TICK_MASK == 0 {
                let _ = self.led.set_high();
                self.delay.delay_ns(INDICATOR_PULSE_NS);
                let _ = self.led.set_low();
            }
        } else {
            let _ = self.led.set_low();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    #[test]
    fn test_pulse_blinks_on_eighth_ticks_then_turns_off() {
        let mut expected = vec![PinTransaction::set(PinState::Low)];
        // Ticks 0 and 8 blink, the rest of the 10-tick pulse stays dark
        expected.push(PinTransaction::set(PinState::High));
        expected.push(PinTransaction::set(PinState::Low));
        expected.push(PinTransaction::set(PinState::High));
        expected.push(PinTransaction::set(PinState::Low));
        // Ticks 10 and 11 force the light off
        expected.push(PinTransaction::set(PinState::Low));
        expected.push(PinTransaction::set(PinState::Low));
        let led = PinMock::new(&expected);

        let mut indicator = StatusIndicator::new(led, NoopDelay::new());
        indicator.pulse(10);
        for _ in 0..12 {
            indicator.on_tick();
        }

        assert_eq!(indicator.remaining(), 0);
        assert_eq!(indicator.uptime(), 12);
        indicator.led.done();
    }

    #[test]
    fn test_new_pulse_overwrites_remaining() {
        let led = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let mut indicator = StatusIndicator::new(led, NoopDelay::new());

        indicator.pulse(1_000);
        indicator.on_tick();
        indicator.pulse(3);
        assert_eq!(indicator.remaining(), 3);
        indicator.on_tick();
        assert_eq!(indicator.remaining(), 2);
        indicator.led.done();
    }

    #[test]
    fn test_uptime_counts_without_pulse() {
        let led = PinMock::new(&vec![PinTransaction::set(PinState::Low); 5]);
        let mut indicator = StatusIndicator::new(led, NoopDelay::new());
        for _ in 0..4 {
            indicator.on_tick();
        }
        assert_eq!(indicator.uptime(), 4);
        indicator.led.done();
    }
}
