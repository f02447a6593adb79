use std::time::Duration;

/// The physical line and the busy-wait facilities the transmit path
/// needs. Implementations wrap a GPIO pair (or a simulation of one).
///
/// `delay` must be accurate to well under a half-bit period while a
/// critical section is held; transmission timing depends on it.
pub trait BusLine: Send {
    /// Drive the output side of the line to `level`.
    fn drive(&mut self, level: bool);

    /// Read the input side of the line.
    fn sample(&mut self) -> bool;

    /// Busy-wait for `d`.
    fn delay(&mut self, d: Duration);

    /// Suppress preemption so half-bit timing stays exact. This guards
    /// timing, not data: nothing else touches transmit state.
    fn enter_critical(&mut self);

    fn exit_critical(&mut self);
}

/// The receive-side resources: an edge detector and the two one-shot
/// timers the receive state machine schedules against. The same
/// environment that implements this also delivers the resulting edge
/// and expiry events back to the receiver.
pub trait RxControl: Send {
    /// Watch for the next transition of the line to `level`.
    fn listen(&mut self, level: bool);

    /// Stop watching for edges.
    fn mute(&mut self);

    /// Arm the sample timer, replacing any pending shot.
    fn arm_sample(&mut self, after: Duration);

    /// Arm the quiet timer, replacing any pending shot.
    fn arm_quiet(&mut self, after: Duration);

    /// Cancel both timers.
    fn cancel_timers(&mut self);
}

/// Receive control for setups without a receive path, such as a
/// transmit-only test rig.
pub struct NullRxControl;

impl RxControl for NullRxControl {
    fn listen(&mut self, _level: bool) {}
    fn mute(&mut self) {}
    fn arm_sample(&mut self, _after: Duration) {}
    fn arm_quiet(&mut self, _after: Duration) {}
    fn cancel_timers(&mut self) {}
}
