//! # x10-bridge
//!
//! A portable, no_std core for a bus-to-X10 power-line bridge built around a TW523 (or
//! PSC05) transceiver.
//!
//! The bridge sits on a peripheral bus as a slave device. A bus master sends it short
//! commands (ping, uptime, status, read log, send code) and the bridge turns "send code"
//! requests into X10 frames on the mains, while decoding whatever other X10 devices send.
//! Everything it does is recorded in a small event log the master can drain.
//!
//! The crate is built from:
//! - `embedded-hal` traits for the TW523 pins, the status light and timing
//! - a zero-crossing clocked protocol engine for X10 transmit and receive
//! - interrupt-safe shared state with `critical-section`
//! - optional clock sources using either interrupt handlers or a blocking delay loop
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` and uses the `critical-section` std implementation |
//! | `delay-loop`          | Exports a blocking clock loop driven by `embedded_hal::delay::DelayNs` |
//! | `timer-isr` (default) | Exports the static bridge and interrupt handler macros |
//! | `defmt-0-3`           | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use x10_bridge::dispatch::CommandDispatcher;
//! use x10_bridge::{init_x10_bridge, setup_x10_bridge, x10_edge_interrupt, x10_timer_interrupt};
//!
//! init_x10_bridge!(TxPin, RxPin, LedPin, Delay);
//!
//! fn main() -> ! {
//!     setup_x10_bridge!(tx, rx, led, Delay::new(), Delay::new());
//!     x10_bridge::timer::arm_interrupts(&mut board, PERIOD);
//!
//!     let mut dispatcher = CommandDispatcher::new(&X10_BRIDGE);
//!     dispatcher.start(&mut i2c).unwrap();
//!     loop {
//!         let _ = dispatcher.poll(&mut i2c);
//!     }
//! }
//!
//! #[interrupt]
//! fn INT0() {
//!     x10_edge_interrupt!();
//! }
//!
//! #[interrupt]
//! fn TIMER1_OVF() {
//!     x10_timer_interrupt!();
//! }
//! ```
//!
//! ## Integration Notes
//!
//! - Every X10 bit is timed from the mains zero crossing; the edge interrupt must fire on
//!   both rising and falling crossings
//! - A `SendCode` blocks the command loop until the code is on the line. If zero crossings
//!   stop, it blocks forever; [`Bridge::send_timeout`](bridge::Bridge::send_timeout) bounds
//!   the wait where that matters
//! - Only one bridge instance should be active at a time in interrupt-driven mode
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod fmt;

pub use critical_section;
pub use heapless;
pub use nb;

pub mod bridge;
pub mod consts;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod indicator;
pub mod ring;
pub mod status;
pub mod timer;
