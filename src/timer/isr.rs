/// The two interrupt sources the bridge runs on.
///
/// Implemented by the board support code, which knows how the zero-crossing detector and
/// the periodic timer are wired.
pub trait InterruptSources {
    /// Enables the zero-crossing edge interrupt.
    fn configure_edge_interrupt(&mut self);

    /// Starts the periodic timer with compare value `period`.
    ///
    /// See [`compute_timer_period`](super::compute_timer_period).
    fn configure_periodic_timer(&mut self, period: u16);
}

/// Configures both interrupt sources inside one critical section.
///
/// Neither interrupt can fire until both are set up, so the first edge never races the
/// first timer tick.
///
/// # Example
/// ```rust
/// use x10_bridge::timer::{InterruptSources, arm_interrupts, const_timer_period};
///
/// struct Board;
///
/// impl InterruptSources for Board {
///     fn configure_edge_interrupt(&mut self) { /* enable INT0 */ }
///     fn configure_periodic_timer(&mut self, _period: u16) { /* start TIMER1 */ }
/// }
///
/// arm_interrupts(&mut Board, const_timer_period(16_000_000, 64, 1_000));
/// ```
pub fn arm_interrupts<S: InterruptSources>(sources: &mut S, period: u16) {
    critical_section::with(|_| {
        sources.configure_edge_interrupt();
        sources.configure_periodic_timer(period);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        edge: bool,
        period: Option<u16>,
    }

    impl InterruptSources for Recorder {
        fn configure_edge_interrupt(&mut self) {
            self.edge = true;
        }

        fn configure_periodic_timer(&mut self, period: u16) {
            self.period = Some(period);
        }
    }

    #[test]
    fn test_arms_both_sources() {
        let mut board = Recorder::default();
        arm_interrupts(&mut board, 250);
        assert!(board.edge);
        assert_eq!(board.period, Some(250));
    }
}
