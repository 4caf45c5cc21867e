//! The shared bridge context.
//!
//! [`Bridge`] gathers everything the interrupt handlers and the command loop both touch:
//! the event log, the status register, the protocol engine, the status indicator and the
//! send channel. It is built `const` so it can live in a `static`, and every method takes
//! `&self`; interior state sits behind `critical_section` mutexes.
//!
//! The interrupt side calls [`on_edge()`](Bridge::on_edge) on each zero crossing and
//! [`on_timer_tick()`](Bridge::on_timer_tick) from the periodic timer. The main side calls
//! the rest, usually through [`CommandDispatcher`](crate::dispatch::CommandDispatcher).
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//! # use embedded_hal_mock::eh1::delay::NoopDelay;
//! use x10_bridge::bridge::Bridge;
//! use x10_bridge::engine::{EngineConfig, ProtocolEngine};
//! use x10_bridge::event_log::EventRecord;
//! use x10_bridge::indicator::StatusIndicator;
//! use x10_bridge::status::StatusRegister;
//!
//! static STATUS: StatusRegister = StatusRegister::new();
//! let bridge: Bridge<'_, Pin, Pin, Pin, NoopDelay, 32> = Bridge::new(&STATUS);
//!
//! # let tx = Pin::new(&[PinTransaction::set(PinState::Low)]);
//! # let rx = Pin::new(&[]);
//! # let led = Pin::new(&[PinTransaction::set(PinState::Low)]);
//! bridge.attach(
//!     ProtocolEngine::new(tx, rx, NoopDelay::new(), EngineConfig::default()),
//!     StatusIndicator::new(led, NoopDelay::new()),
//! );
//! bridge.log_event(EventRecord::Ping);
//!
//! let mut out = Vec::new();
//! let _ = bridge.drain_log(|byte| {
//!     out.push(byte);
//!     Ok::<(), ()>(())
//! });
//! assert_eq!(out, [1, 0x03, 0]);
//! # if let Some((mut engine, mut indicator)) = bridge.release() {
//! #     engine.tx.done();
//! #     engine.rx.done();
//! #     indicator.led.done();
//! # }
//! ```

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::engine::channel::SendChannel;
use crate::engine::{EdgeEvent, EngineMode, ProtocolEngine};
use crate::error::Error;
use crate::event_log::{EventLog, EventRecord};
use crate::indicator::StatusIndicator;
use crate::status::StatusRegister;

/// Shared state of one X10 bridge.
///
/// ## Type Parameters
///
/// - `TX`, `RX`: TW523 transmit and receive pins
/// - `LED`: status light pin
/// - `D`: delay provider, one instance each for the engine and the indicator
/// - `N`: event log capacity in bytes
#[derive(Debug)]
pub struct Bridge<'a, TX, RX, LED, D, const N: usize>
where
    TX: OutputPin,
    RX: InputPin,
    LED: OutputPin,
    D: DelayNs,
{
    status: &'a StatusRegister,
    log: Mutex<RefCell<EventLog<'a, N>>>,
    engine: Mutex<RefCell<Option<ProtocolEngine<TX, RX, D>>>>,
    indicator: Mutex<RefCell<Option<StatusIndicator<LED, D>>>>,
    channel: SendChannel,
}

impl<'a, TX, RX, LED, D, const N: usize> Bridge<'a, TX, RX, LED, D, N>
where
    TX: OutputPin,
    RX: InputPin,
    LED: OutputPin,
    D: DelayNs,
{
    /// Creates a bridge with an empty log and no hardware attached.
    pub const fn new(status: &'a StatusRegister) -> Self {
        Self {
            status,
            log: Mutex::new(RefCell::new(EventLog::new(status))),
            engine: Mutex::new(RefCell::new(None)),
            indicator: Mutex::new(RefCell::new(None)),
            channel: SendChannel::new(),
        }
    }

    /// Installs the engine and indicator. Until then the interrupt entry points do nothing.
    pub fn attach(&self, engine: ProtocolEngine<TX, RX, D>, indicator: StatusIndicator<LED, D>) {
        critical_section::with(|cs| {
            *self.engine.borrow_ref_mut(cs) = Some(engine);
            *self.indicator.borrow_ref_mut(cs) = Some(indicator);
        });
    }

    /// Removes and returns the engine and indicator.
    pub fn release(&self) -> Option<(ProtocolEngine<TX, RX, D>, StatusIndicator<LED, D>)> {
        critical_section::with(|cs| {
            let engine = self.engine.borrow_ref_mut(cs).take();
            let indicator = self.indicator.borrow_ref_mut(cs).take();
            engine.zip(indicator)
        })
    }

    /// Zero-crossing entry point. Call once per edge.
    ///
    /// Holds the status light on while a frame is arriving and logs every received command.
    pub fn on_edge(&self) -> Option<EdgeEvent> {
        critical_section::with(|cs| {
            let event = self
                .engine
                .borrow_ref_mut(cs)
                .as_mut()?
                .on_edge(&self.channel)?;

            match event {
                EdgeEvent::FrameStarted => self.pulse_in(cs, u16::MAX),
                EdgeEvent::UnitAddressed { .. } => self.pulse_in(cs, 0),
                EdgeEvent::Received {
                    command,
                    house,
                    unit,
                } => {
                    self.pulse_in(cs, 0);
                    let _ = self
                        .log
                        .borrow_ref_mut(cs)
                        .record(EventRecord::X10Recv {
                            command,
                            house,
                            unit,
                        });
                }
                EdgeEvent::Sent => {}
            }
            Some(event)
        })
    }

    /// Periodic timer entry point.
    pub fn on_timer_tick(&self) {
        critical_section::with(|cs| {
            if let Some(indicator) = self.indicator.borrow_ref_mut(cs).as_mut() {
                indicator.on_tick();
            }
        });
    }

    /// Appends a record to the event log.
    ///
    /// # Returns
    /// The bytes stored; less than the record length means the log overflowed and was reset.
    pub fn log_event(&self, record: EventRecord) -> usize {
        critical_section::with(|cs| self.log.borrow_ref_mut(cs).record(record))
    }

    /// Streams the event log to `transmit`.
    ///
    /// The buffered records are moved out first, so interrupts keep logging while the
    /// snapshot is sent. See [`EventLog::drain`] for the wire format.
    ///
    /// # Errors
    /// The first error from `transmit`. The records of the failed snapshot are lost.
    pub fn drain_log<E, F>(&self, transmit: F) -> Result<usize, E>
    where
        F: FnMut(u8) -> Result<(), E>,
    {
        let mut snapshot = critical_section::with(|cs| self.log.borrow_ref_mut(cs).take());
        snapshot.drain(transmit)
    }

    /// The status register byte.
    pub fn status(&self) -> u8 {
        self.status.read()
    }

    /// Timer ticks since the indicator was attached.
    pub fn uptime(&self) -> u32 {
        critical_section::with(|cs| {
            self.indicator
                .borrow_ref(cs)
                .as_ref()
                .map_or(0, |indicator| indicator.uptime())
        })
    }

    /// Starts a status light pulse of `ticks` timer ticks.
    pub fn pulse(&self, ticks: u16) {
        critical_section::with(|cs| self.pulse_in(cs, ticks));
    }

    fn pulse_in(&self, cs: CriticalSection<'_>, ticks: u16) {
        if let Some(indicator) = self.indicator.borrow_ref_mut(cs).as_mut() {
            indicator.pulse(ticks);
        }
    }

    /// What the protocol engine is doing. `Idle` if none is attached.
    pub fn mode(&self) -> EngineMode {
        critical_section::with(|cs| {
            self.engine
                .borrow_ref(cs)
                .as_ref()
                .map_or(EngineMode::Idle, |engine| engine.mode())
        })
    }

    /// The send channel feeding the engine.
    pub fn channel(&self) -> &SendChannel {
        &self.channel
    }

    /// Sends one X10 code and blocks until it has gone out. See [`SendChannel::send`].
    ///
    /// # Errors
    /// [`Error::InvalidCode`] if the code cannot be encoded.
    pub fn send(&self, command: u8, house: u8, unit: u8) -> Result<(), Error> {
        self.channel.send(command, house, unit)
    }

    /// Sends one X10 code, giving up after `timeout_us`. See [`SendChannel::send_timeout`].
    ///
    /// # Errors
    /// [`Error::InvalidCode`] or [`Error::Timeout`].
    pub fn send_timeout<W: DelayNs>(
        &self,
        command: u8,
        house: u8,
        unit: u8,
        delay: &mut W,
        timeout_us: u32,
    ) -> Result<(), Error> {
        self.channel
            .send_timeout(command, house, unit, delay, timeout_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::engine::frame::TransmitSequence;
    use crate::status::StatusFlag;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// RX line shared with the test. `true` means carrier present.
    #[derive(Debug, Clone, Default)]
    struct Line(Arc<AtomicBool>);

    impl ErrorType for Line {
        type Error = Infallible;
    }

    impl InputPin for Line {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.load(Ordering::SeqCst))
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    type TestBridge<'a> = Bridge<'a, PinMock, Line, PinMock, NoopDelay, 32>;

    fn drain(bridge: &TestBridge<'_>) -> Vec<u8> {
        let mut out = Vec::new();
        let Ok(_) = bridge.drain_log(|byte| {
            out.push(byte);
            Ok::<(), Infallible>(())
        });
        out
    }

    fn finish(bridge: &TestBridge<'_>) {
        let (mut engine, mut indicator) = bridge.release().unwrap();
        engine.tx.done();
        indicator.led.done();
    }

    #[test]
    fn test_detached_bridge_ignores_interrupts() {
        let status = StatusRegister::new();
        let bridge: TestBridge<'_> = Bridge::new(&status);
        assert_eq!(bridge.on_edge(), None);
        bridge.on_timer_tick();
        assert_eq!(bridge.uptime(), 0);
        assert_eq!(bridge.mode(), EngineMode::Idle);
        assert!(bridge.release().is_none());
    }

    #[test]
    fn test_received_command_is_logged_and_lights_indicator() {
        let status = StatusRegister::new();
        let bridge: TestBridge<'_> = Bridge::new(&status);
        let line = Line::default();
        let led = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            // Held on from the start bit
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            // Forced off once the frame is in
            PinTransaction::set(PinState::Low),
        ]);
        bridge.attach(
            ProtocolEngine::new(
                PinMock::new(&[PinTransaction::set(PinState::Low)]),
                line.clone(),
                NoopDelay::new(),
                EngineConfig::default(),
            ),
            StatusIndicator::new(led, NoopDelay::new()),
        );

        let mut sequence = TransmitSequence::new(0b0000, 0b0110, 2);
        line.0.store(sequence.next().unwrap(), Ordering::SeqCst);
        assert_eq!(bridge.on_edge(), Some(EdgeEvent::FrameStarted));
        bridge.on_timer_tick();

        for level in sequence {
            line.0.store(level, Ordering::SeqCst);
            let _ = bridge.on_edge();
        }
        bridge.on_timer_tick();

        assert_eq!(drain(&bridge), vec![4, 0x05, 2, b'M', 1, 0]);
        assert_eq!(bridge.uptime(), 2);
        finish(&bridge);
    }

    #[test]
    fn test_send_completes_on_clock_thread() {
        let status = StatusRegister::new();
        let bridge: TestBridge<'_> = Bridge::new(&status);

        let mut expected = vec![PinTransaction::set(PinState::Low)];
        for level in TransmitSequence::new(0b0110, 0b0110, 3) {
            if level {
                expected.push(PinTransaction::set(PinState::High));
                expected.push(PinTransaction::set(PinState::Low));
            }
        }
        bridge.attach(
            ProtocolEngine::new(
                PinMock::new(&expected),
                Line::default(),
                NoopDelay::new(),
                EngineConfig::default(),
            ),
            StatusIndicator::new(
                PinMock::new(&[PinTransaction::set(PinState::Low)]),
                NoopDelay::new(),
            ),
        );

        std::thread::scope(|s| {
            let _ = s.spawn(|| {
                while bridge.on_edge() != Some(EdgeEvent::Sent) {
                    std::thread::yield_now();
                }
            });
            assert_eq!(bridge.send(3, b'A', 1), Ok(()));
        });

        assert_eq!(bridge.mode(), EngineMode::Idle);
        finish(&bridge);
    }

    #[test]
    fn test_send_timeout_without_edges() {
        let status = StatusRegister::new();
        let bridge: TestBridge<'_> = Bridge::new(&status);
        let mut delay = NoopDelay::new();

        assert_eq!(
            bridge.send_timeout(3, b'A', 1, &mut delay, 500),
            Err(Error::Timeout)
        );
        assert_eq!(
            bridge.send_timeout(3, b'Z', 1, &mut delay, 500),
            Err(Error::InvalidCode)
        );
    }

    #[test]
    fn test_overflow_flag_survives_until_drained() {
        let status = StatusRegister::new();
        let bridge: TestBridge<'_> = Bridge::new(&status);

        for _ in 0..8 {
            let _ = bridge.log_event(EventRecord::X10Send {
                command: 1,
                house: b'A',
                unit: 1,
            });
        }
        assert!(status.is_set(StatusFlag::LogOverflow));
        assert_eq!(bridge.status(), 0x01);

        let _ = drain(&bridge);
        assert_eq!(bridge.status(), 0x00);
    }
}
