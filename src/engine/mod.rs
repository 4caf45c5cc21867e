//! TW523 power-line protocol engine.
//!
//! This module provides [`ProtocolEngine`], a bit-level X10 modem clocked by the mains
//! zero-crossing signal. Each zero crossing is one edge; [`on_edge()`](ProtocolEngine::on_edge)
//! must be called once per edge, typically from the edge interrupt handler.
//!
//! On every edge the engine does exactly one of:
//!
//! - **Transmit** the next half cycle of a pending send, bursting the TX line for a `1`.
//! - **Decode** the RX line: look for a start bit, then sample the four start-code bits and
//!   every other data bit, skipping the complements.
//! - **Rest** for a few edges after a received frame.
//!
//! Sends arrive through a [`SendChannel`]. The engine only picks a request up between
//! frames, so a send never interrupts a frame being received.
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//! # use embedded_hal_mock::eh1::delay::NoopDelay;
//! use x10_bridge::engine::{EngineConfig, EngineMode, ProtocolEngine};
//! use x10_bridge::engine::channel::SendChannel;
//!
//! # let tx = Pin::new(&[PinTransaction::set(PinState::Low)]);
//! # let rx = Pin::new(&[PinTransaction::get(PinState::High)]);
//! let channel = SendChannel::new();
//! let mut engine = ProtocolEngine::new(tx, rx, NoopDelay::new(), EngineConfig::default());
//!
//! // Called from the zero-crossing interrupt
//! assert_eq!(engine.on_edge(&channel), None);
//! assert_eq!(engine.mode(), EngineMode::Idle);
//! # engine.tx.done();
//! # engine.rx.done();
//! ```
//!
//! For wiring the engine to interrupts, see [`crate::bridge`] and [`crate::timer`].

pub mod channel;
pub mod codes;
pub mod frame;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::consts::{
    BURST_WIDTH_US, FRAME_BITS, RECEIVE_QUIET_EDGES, SETTLE_DELAY_US, START_BITS, START_CODE,
};
use channel::SendChannel;
use codes::{house_letter, unit_number};
use frame::{Frame, Key, TransmitSequence};

/// What the engine is doing between edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum EngineMode {
    /// Waiting for a start bit or a send request.
    #[default]
    Idle,
    /// Driving a send onto the line.
    Sending,
    /// Part way through an incoming frame.
    Receiving {
        /// Bits sampled so far (1-12)
        bits: u8,
    },
}

/// Line timing.
///
/// The defaults match a TW523 on 60 Hz mains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct EngineConfig {
    /// Wait after an edge before sampling RX, in µs.
    pub settle_us: u32,
    /// Width of a transmitted `1` burst, in µs.
    pub burst_us: u32,
    /// Edges ignored after each received frame.
    pub quiet_edges: u8,
    /// RX reads low while a carrier is present.
    pub rx_inverted: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_us: SETTLE_DELAY_US,
            burst_us: BURST_WIDTH_US,
            quiet_edges: RECEIVE_QUIET_EDGES,
            rx_inverted: true,
        }
    }
}

/// Something worth reacting to that happened on an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum EdgeEvent {
    /// A start bit was seen on RX.
    FrameStarted,
    /// An address frame arrived. The unit is remembered for the next function frame.
    UnitAddressed {
        /// House letter
        house: u8,
        /// Unit number
        unit: u8,
    },
    /// A function frame arrived.
    Received {
        /// 4-bit function code
        command: u8,
        /// House letter
        house: u8,
        /// Unit number from the preceding address frame, or 0 if there was none
        unit: u8,
    },
    /// The last half cycle of a send went out.
    Sent,
}

#[derive(Debug, Clone, Copy, Default)]
struct ReceiveState {
    bit_count: u8,
    edge_count: u8,
    shift: u16,
    mask: u16,
    quiet: u8,
}

/// Bit-level X10 transmitter and receiver.
///
/// ## Type Parameters
///
/// - `TX`: [`OutputPin`] driving the TW523 transmit input. High sends carrier.
/// - `RX`: [`InputPin`] reading the TW523 receive output.
/// - `D`: [`DelayNs`] used for the settle and burst timing inside the edge handler.
#[derive(Debug)]
pub struct ProtocolEngine<TX, RX, D>
where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
{
    /// Transmit pin
    pub tx: TX,
    /// Receive pin
    pub rx: RX,
    delay: D,
    config: EngineConfig,
    receive: ReceiveState,
    sending: Option<TransmitSequence>,
    pending_unit: Option<u8>,
    /// Number of sends completed
    pub sends_completed: u16,
    /// Number of frames decoded
    pub frames_received: u16,
}

impl<TX, RX, D> ProtocolEngine<TX, RX, D>
where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
{
    /// Creates an idle engine and drives TX low.
    pub fn new(mut tx: TX, rx: RX, delay: D, config: EngineConfig) -> Self {
        let _ = tx.set_low();
        Self {
            tx,
            rx,
            delay,
            config,
            receive: ReceiveState::default(),
            sending: None,
            pending_unit: None,
            sends_completed: 0,
            frames_received: 0,
        }
    }

    /// The current mode.
    pub fn mode(&self) -> EngineMode {
        if self.sending.is_some() {
            EngineMode::Sending
        } else if self.receive.bit_count > 0 {
            EngineMode::Receiving {
                bits: self.receive.bit_count,
            }
        } else {
            EngineMode::Idle
        }
    }

    /// The timing in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advances the engine by one zero-crossing edge.
    ///
    /// A send waiting in `channel` starts on the first edge where the engine is idle, and
    /// the channel is marked done on the edge that carries the last half cycle.
    ///
    /// # Returns
    /// The event this edge produced, if any.
    pub fn on_edge(&mut self, channel: &SendChannel) -> Option<EdgeEvent> {
        if self.sending.is_some() {
            return self.transmit_edge(channel);
        }

        if self.receive.quiet > 0 {
            self.receive.quiet -= 1;
            return None;
        }

        if self.receive.bit_count == 0 {
            if let Some(request) = channel.start() {
                trace!(
                    "starting send: house {} unit {} command {}",
                    request.house, request.unit, request.command
                );
                self.sending = Some(TransmitSequence::new(
                    request.house,
                    request.unit,
                    request.command,
                ));
                return self.transmit_edge(channel);
            }
            return self.look_for_start();
        }

        self.receive_edge()
    }

    fn transmit_edge(&mut self, channel: &SendChannel) -> Option<EdgeEvent> {
        if channel.is_cancelled() {
            let _ = self.tx.set_low();
            self.sending = None;
            channel.finish();
            warn!("send abandoned mid-transmission");
            return None;
        }

        let sequence = self.sending.as_mut()?;
        let level = sequence.next();
        let finished = sequence.is_finished();

        if level == Some(true) {
            let _ = self.tx.set_high();
            self.delay.delay_us(self.config.burst_us);
            let _ = self.tx.set_low();
        }

        if !finished {
            return None;
        }

        self.sending = None;
        self.sends_completed = self.sends_completed.wrapping_add(1);
        channel.finish();
        Some(EdgeEvent::Sent)
    }

    fn look_for_start(&mut self) -> Option<EdgeEvent> {
        self.delay.delay_us(self.config.settle_us);
        if !self.line_active() {
            return None;
        }

        let shift = 1 << (FRAME_BITS - 1);
        self.receive = ReceiveState {
            bit_count: 1,
            edge_count: 1,
            shift,
            mask: shift >> 1,
            quiet: 0,
        };
        Some(EdgeEvent::FrameStarted)
    }

    fn receive_edge(&mut self) -> Option<EdgeEvent> {
        self.receive.edge_count = self.receive.edge_count.wrapping_add(1);

        // Past the start code only the true half of each bit pair is sampled
        if self.receive.bit_count > START_BITS && self.receive.edge_count & 1 == 0 {
            return None;
        }

        self.delay.delay_us(self.config.settle_us);
        if self.line_active() {
            self.receive.shift |= self.receive.mask;
        }
        self.receive.mask >>= 1;
        self.receive.bit_count += 1;

        if self.receive.bit_count < FRAME_BITS {
            return None;
        }
        self.finish_frame()
    }

    fn finish_frame(&mut self) -> Option<EdgeEvent> {
        let word = self.receive.shift;
        self.receive = ReceiveState {
            quiet: self.config.quiet_edges,
            ..ReceiveState::default()
        };
        self.frames_received = self.frames_received.wrapping_add(1);

        if word >> (FRAME_BITS - START_BITS) != START_CODE {
            trace!("frame with bad start code {}", word);
        }

        let frame = Frame::from_word(word);
        let house = house_letter(frame.house);
        match frame.key {
            Key::Unit(unit) => {
                self.pending_unit = Some(unit);
                Some(EdgeEvent::UnitAddressed {
                    house,
                    unit: unit_number(unit),
                })
            }
            Key::Function(command) => {
                let unit = self.pending_unit.take().map(unit_number).unwrap_or(0);
                trace!("received command {} for {}{}", command, house, unit);
                Some(EdgeEvent::Received {
                    command,
                    house,
                    unit,
                })
            }
        }
    }

    /// `true` if RX shows a carrier. A pin read error counts as no carrier.
    fn line_active(&mut self) -> bool {
        let level = if self.config.rx_inverted {
            self.rx.is_low()
        } else {
            self.rx.is_high()
        };
        level.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use channel::SendRequest;
    use core::cell::Cell;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use std::rc::Rc;

    /// RX line whose level the test sets directly. `true` means carrier present.
    #[derive(Debug, Clone, Default)]
    struct FakeLine(Rc<Cell<bool>>);

    impl ErrorType for FakeLine {
        type Error = Infallible;
    }

    impl InputPin for FakeLine {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.get())
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.get())
        }
    }

    fn quiet_tx() -> PinMock {
        PinMock::new(&[PinTransaction::set(PinState::Low)])
    }

    #[test]
    fn test_decodes_address_then_function_frame() {
        let line = FakeLine::default();
        let channel = SendChannel::new();
        let mut engine = ProtocolEngine::new(
            quiet_tx(),
            line.clone(),
            NoopDelay::new(),
            EngineConfig::default(),
        );

        // House M, unit 1, command 2, exactly as the transmitter would send it
        let mut events = Vec::new();
        for level in TransmitSequence::new(0b0000, 0b0110, 2) {
            line.0.set(level);
            if let Some(event) = engine.on_edge(&channel) {
                events.push(event);
            }
        }

        assert_eq!(
            events,
            vec![
                EdgeEvent::FrameStarted,
                EdgeEvent::UnitAddressed { house: b'M', unit: 1 },
                EdgeEvent::FrameStarted,
                EdgeEvent::Received {
                    command: 2,
                    house: b'M',
                    unit: 1
                },
            ]
        );
        assert_eq!(engine.frames_received, 2);
        engine.tx.done();
    }

    #[test]
    fn test_receiving_mode_counts_bits() {
        let line = FakeLine::default();
        let channel = SendChannel::new();
        let mut engine = ProtocolEngine::new(
            quiet_tx(),
            line.clone(),
            NoopDelay::new(),
            EngineConfig::default(),
        );

        line.0.set(true);
        assert_eq!(engine.on_edge(&channel), Some(EdgeEvent::FrameStarted));
        assert_eq!(engine.mode(), EngineMode::Receiving { bits: 1 });
        assert_eq!(engine.on_edge(&channel), None);
        assert_eq!(engine.mode(), EngineMode::Receiving { bits: 2 });
        engine.tx.done();
    }

    #[test]
    fn test_idle_line_stays_idle() {
        let line = FakeLine::default();
        let channel = SendChannel::new();
        let mut engine = ProtocolEngine::new(
            quiet_tx(),
            line,
            NoopDelay::new(),
            EngineConfig::default(),
        );

        for _ in 0..30 {
            assert_eq!(engine.on_edge(&channel), None);
            assert_eq!(engine.mode(), EngineMode::Idle);
        }
        engine.tx.done();
    }

    #[test]
    fn test_transmits_both_frames() {
        let sequence = TransmitSequence::new(0b0000, 0b0110, 2);
        let mut expected = vec![PinTransaction::set(PinState::Low)];
        for level in sequence.clone() {
            if level {
                expected.push(PinTransaction::set(PinState::High));
                expected.push(PinTransaction::set(PinState::Low));
            }
        }
        let tx = PinMock::new(&expected);

        let channel = SendChannel::new();
        let mut engine =
            ProtocolEngine::new(tx, FakeLine::default(), NoopDelay::new(), EngineConfig::default());

        channel.submit(SendRequest::lookup(2, b'M', 1).unwrap()).unwrap();
        for _ in 0..TransmitSequence::LEN - 1 {
            assert_eq!(engine.on_edge(&channel), None);
            assert_eq!(engine.mode(), EngineMode::Sending);
        }
        assert_eq!(engine.on_edge(&channel), Some(EdgeEvent::Sent));
        assert_eq!(engine.mode(), EngineMode::Idle);
        assert_eq!(engine.sends_completed, 1);
        assert_eq!(channel.poll_done(), Ok(()));
        engine.tx.done();
    }

    #[test]
    fn test_invalid_house_never_leaves_idle() {
        let channel = SendChannel::new();
        let mut engine = ProtocolEngine::new(
            quiet_tx(),
            FakeLine::default(),
            NoopDelay::new(),
            EngineConfig::default(),
        );

        assert_eq!(channel.send(2, b'Z', 1), Err(Error::InvalidCode));
        assert_eq!(Error::InvalidCode.result_code(), 1);
        assert_eq!(engine.on_edge(&channel), None);
        assert_eq!(engine.mode(), EngineMode::Idle);
        engine.tx.done();
    }

    #[test]
    fn test_cancel_stops_transmission() {
        // Start code 1110: three bursts go out before the cancel lands
        let mut expected = vec![PinTransaction::set(PinState::Low)];
        for _ in 0..3 {
            expected.push(PinTransaction::set(PinState::High));
            expected.push(PinTransaction::set(PinState::Low));
        }
        expected.push(PinTransaction::set(PinState::Low));
        let tx = PinMock::new(&expected);

        let channel = SendChannel::new();
        let mut engine =
            ProtocolEngine::new(tx, FakeLine::default(), NoopDelay::new(), EngineConfig::default());

        channel.submit(SendRequest::lookup(2, b'M', 1).unwrap()).unwrap();
        for _ in 0..3 {
            assert_eq!(engine.on_edge(&channel), None);
        }
        assert!(!channel.cancel());
        assert_eq!(engine.on_edge(&channel), None);
        assert_eq!(engine.mode(), EngineMode::Idle);
        assert_eq!(channel.poll_idle(), Ok(()));
        assert_eq!(engine.sends_completed, 0);
        engine.tx.done();
    }

    #[test]
    fn test_function_frame_without_address_reports_unit_zero() {
        let line = FakeLine::default();
        let channel = SendChannel::new();
        let mut engine = ProtocolEngine::new(
            quiet_tx(),
            line.clone(),
            NoopDelay::new(),
            EngineConfig::default(),
        );

        let word = Frame {
            house: 0b0110,
            key: Key::Function(5),
        }
        .to_word();
        let mut last = None;
        for slot in 0..crate::consts::FRAME_HALF_CYCLES {
            line.0.set(frame::half_cycle(word, slot));
            if let Some(event) = engine.on_edge(&channel) {
                last = Some(event);
            }
        }
        assert_eq!(
            last,
            Some(EdgeEvent::Received {
                command: 5,
                house: b'A',
                unit: 0
            })
        );
        engine.tx.done();
    }
}
