//! Clock sources for the bridge.
//!
//! The bridge needs two clocks: the zero-crossing edge, which times every X10 half cycle,
//! and a periodic timer that drives the status light and the uptime counter. This module
//! wires them up in one of two ways: interrupt handlers using `critical_section::with`
//! (`timer-isr` feature), or a blocking loop on a delay provider (`delay-loop` feature).
//!
//! Contains:
//! - `compute_timer_period`: runtime timer compare value calculator
//! - `const_timer_period`: compile-time timer compare value calculator
//! - `half_cycle_us`: half-cycle length for a mains frequency
//! - `InterruptSources` and `arm_interrupts`: interrupt setup (feature `timer-isr`)
//! - `init_x10_bridge!()`, `setup_x10_bridge!()`, `x10_edge_interrupt!()` and
//!   `x10_timer_interrupt!()`: static bridge and ISR bodies (feature `timer-isr`)
//! - `run_clock_loop` and `run_clock_edges`: blocking clock for hosted builds
//!   (feature `delay-loop`)
//!
//! Common prescalers: (For use with `compute_timer_period` and `const_timer_period`)
//!
//! | PRESCALER | TIMER_COUNTS | Overflow Interval |
//! |-----------|--------------|-------------------|
//! |        64 |          250 |              1 ms |
//! |       256 |          125 |              2 ms |
//! |       256 |          250 |              4 ms |
//! |      1024 |          125 |              8 ms |
//! |      1024 |          250 |             16 ms |

use libm::{ceil, round};

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg_attr(feature = "delay-loop", allow(unused_imports))]
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use macros::*;

/// 1,000,000 microseconds = 1 second
pub const MICROSECONDS_PER_SECOND: u32 = 1_000_000;

/// Computes the compare value for a CTC-mode timer.
///
/// # Arguments
/// - `f_cpu`: CPU frequency in Hz
/// - `prescaler`: timer prescaler (e.g., 8, 64, 256)
/// - `tick_us`: desired tick interval in microseconds (e.g., 1000.0)
///
/// # Returns
/// - Timer counts per tick, rounded to the nearest integer
pub fn compute_timer_period(f_cpu: u32, prescaler: u32, tick_us: f32) -> u16 {
    let ticks_per_second = f64::from(f_cpu) / f64::from(prescaler);
    let counts = ticks_per_second * (f64::from(tick_us) / f64::from(MICROSECONDS_PER_SECOND));
    round(counts) as u16
}

/// Compile-time timer compare value calculator.
///
/// Integer arithmetic only, so the result is truncated rather than rounded.
///
/// # Arguments
/// - `f_cpu`: CPU frequency in Hz
/// - `prescaler`: timer prescaler (e.g., 8, 64, 256)
/// - `tick_us`: desired tick interval in whole microseconds
///
/// # Returns
/// - Timer counts per tick
pub const fn const_timer_period(f_cpu: u32, prescaler: u32, tick_us: u32) -> u16 {
    let counts = (f_cpu / prescaler) as u64 * tick_us as u64 / MICROSECONDS_PER_SECOND as u64;
    counts as u16
}

/// Length of one mains half cycle in whole microseconds, rounded up.
///
/// 60 Hz gives 8334 µs, 50 Hz gives 10000 µs.
pub fn half_cycle_us(line_hz: f64) -> u32 {
    ceil(f64::from(MICROSECONDS_PER_SECOND) / (2.0 * line_hz)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::HALF_CYCLE_US;

    #[test]
    fn test_timer_period_for_one_millisecond() {
        assert_eq!(compute_timer_period(16_000_000, 64, 1_000.0), 250);
        assert_eq!(const_timer_period(16_000_000, 64, 1_000), 250);
        assert_eq!(compute_timer_period(16_000_000, 1024, 16_000.0), 250);
    }

    #[test]
    fn test_period_rounding_differs_from_truncation() {
        // 8 MHz / 1024 = 7812.5 counts per second
        assert_eq!(compute_timer_period(8_000_000, 1024, 1_000.0), 8);
        assert_eq!(const_timer_period(8_000_000, 1024, 1_000), 7);
    }

    #[test]
    fn test_half_cycle_lengths() {
        assert_eq!(half_cycle_us(60.0), HALF_CYCLE_US);
        assert_eq!(half_cycle_us(50.0), 10_000);
    }
}
