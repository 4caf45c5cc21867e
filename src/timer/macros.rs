/// Declares the static `X10_STATUS` register and `X10_BRIDGE` instance.
///
/// Both the main loop and the interrupt handlers reach the bridge through these statics.
/// The event log gets [`LOG_CAPACITY`](crate::consts::LOG_CAPACITY) bytes.
///
/// # Arguments
/// - `$tx`: The concrete type of the TW523 transmit pin (must implement `OutputPin`)
/// - `$rx`: The concrete type of the TW523 receive pin (must implement `InputPin`)
/// - `$led`: The concrete type of the status light pin (must implement `OutputPin`)
/// - `$delay`: The concrete delay provider type (must implement `DelayNs`)
///
/// # Example
/// ```rust,ignore
/// init_x10_bridge!(PB4, PB5, PB3, Delay);
/// ```
#[macro_export]
macro_rules! init_x10_bridge {
    ( $tx:ty, $rx:ty, $led:ty, $delay:ty ) => {
        /// Bridge status register
        pub static X10_STATUS: $crate::status::StatusRegister =
            $crate::status::StatusRegister::new();
        /// Shared bridge context
        pub static X10_BRIDGE: $crate::bridge::Bridge<
            'static,
            $tx,
            $rx,
            $led,
            $delay,
            { $crate::consts::LOG_CAPACITY },
        > = $crate::bridge::Bridge::new(&X10_STATUS);
    };
}

/// Attaches a protocol engine and status indicator to `X10_BRIDGE`.
///
/// # Arguments
/// - `$tx`, `$rx`, `$led`: The pins
/// - `$engine_delay`, `$led_delay`: One delay provider each for the engine and the light
/// - `$config`: Optional [`EngineConfig`](crate::engine::EngineConfig); defaults to TW523
///   timing
///
/// # Example
/// ```rust,ignore
/// setup_x10_bridge!(tx, rx, led, Delay::new(), Delay::new());
/// ```
///
/// # Notes
/// - Requires `init_x10_bridge!` to have been used earlier.
#[macro_export]
macro_rules! setup_x10_bridge {
    ( $tx:expr, $rx:expr, $led:expr, $engine_delay:expr, $led_delay:expr ) => {
        $crate::setup_x10_bridge!(
            $tx,
            $rx,
            $led,
            $engine_delay,
            $led_delay,
            $crate::engine::EngineConfig::default()
        )
    };
    ( $tx:expr, $rx:expr, $led:expr, $engine_delay:expr, $led_delay:expr, $config:expr ) => {
        X10_BRIDGE.attach(
            $crate::engine::ProtocolEngine::new($tx, $rx, $engine_delay, $config),
            $crate::indicator::StatusIndicator::new($led, $led_delay),
        )
    };
}

/// Body of the zero-crossing interrupt handler.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn INT0() {
///     x10_edge_interrupt!();
/// }
/// ```
///
/// # Notes
/// - Does nothing until `setup_x10_bridge!` has run.
#[macro_export]
macro_rules! x10_edge_interrupt {
    () => {{
        let _ = X10_BRIDGE.on_edge();
    }};
}

/// Body of the periodic timer interrupt handler.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIMER1_OVF() {
///     x10_timer_interrupt!();
/// }
/// ```
#[macro_export]
macro_rules! x10_timer_interrupt {
    () => {
        X10_BRIDGE.on_timer_tick()
    };
}
