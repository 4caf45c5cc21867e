use crate::bridge::Bridge;
use crate::engine::EdgeEvent;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

/// Runs a blocking loop that clocks the bridge from a delay provider.
///
/// Stands in for both interrupts where there is no zero-crossing detector, e.g. on a host
/// driving a simulated line. Each half cycle the bridge gets one edge and one timer tick.
///
/// # Arguments
/// - `bridge`: The bridge to clock
/// - `delay`: A delay provider implementing `DelayNs`
/// - `half_cycle_us`: Time between edges, e.g. [`HALF_CYCLE_US`](crate::consts::HALF_CYCLE_US)
///
/// # Example
/// ```rust,ignore
/// std::thread::scope(|s| {
///     s.spawn(|| run_clock_loop(&bridge, &mut delay, HALF_CYCLE_US));
///     bridge.send(2, b'A', 1)?;
/// });
/// ```
///
/// # Notes
/// - This loop never returns; run it on its own thread or task.
pub fn run_clock_loop<TX, RX, LED, D, W, const N: usize>(
    bridge: &Bridge<'_, TX, RX, LED, D, N>,
    delay: &mut W,
    half_cycle_us: u32,
) -> !
where
    TX: OutputPin,
    RX: InputPin,
    LED: OutputPin,
    D: DelayNs,
    W: DelayNs,
{
    loop {
        let _ = run_clock_edges(bridge, delay, half_cycle_us, 1);
    }
}

/// Clocks the bridge for `edges` half cycles.
///
/// # Returns
/// The number of sends completed during the run.
pub fn run_clock_edges<TX, RX, LED, D, W, const N: usize>(
    bridge: &Bridge<'_, TX, RX, LED, D, N>,
    delay: &mut W,
    half_cycle_us: u32,
    edges: u32,
) -> u32
where
    TX: OutputPin,
    RX: InputPin,
    LED: OutputPin,
    D: DelayNs,
    W: DelayNs,
{
    let mut sent = 0;
    for _ in 0..edges {
        if bridge.on_edge() == Some(EdgeEvent::Sent) {
            sent += 1;
        }
        bridge.on_timer_tick();
        delay.delay_us(half_cycle_us);
    }
    sent
}
