use super::hal::{BusLine, RxControl};
use super::machine::{RxActions, RxFrame, RxMachine};
use super::timing::{self, BitTiming};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backward query replies are a single byte.
pub const REPLY_BITS: u8 = 8;
/// Unsolicited event frames are full 24-bit frames.
pub const EVENT_FRAME_BITS: u8 = 24;

/// Construction parameters for the transceiver. Pin selection and
/// peripheral wiring live in the `BusLine`/`RxControl` implementations.
#[derive(Debug, Clone)]
pub struct PhyConfig {
    pub baud: u32,
    /// Line level when no one is transmitting. Determines the edge
    /// direction of a start condition.
    pub idle_level: bool,
}

impl Default for PhyConfig {
    fn default() -> PhyConfig {
        PhyConfig {
            baud: 1200,
            idle_level: false,
        }
    }
}

/// Outcome of waiting for a backward frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// A complete frame of the expected length
    Value(u32),
    /// A frame arrived but not with the expected bit count
    Garbled,
    /// Nothing arrived within the budget
    Silence,
}

enum RxMode {
    /// Waiting for short synchronous replies to explicit requests
    Query,
    /// Continuously listening for event frames
    Event,
}

/// Receive-side state shared between the caller and the interrupt
/// context that feeds the state machine.
pub struct Receiver {
    machine: RxMachine,
    mode: RxMode,
    callback: Option<Box<dyn FnMut(u32) + Send>>,
    parked_callback: Option<Box<dyn FnMut(u32) + Send>>,
    ready: Option<RxFrame>,
}

impl Receiver {
    fn new(timing: BitTiming, idle_level: bool) -> Receiver {
        Receiver {
            machine: RxMachine::new(timing, idle_level, REPLY_BITS),
            mode: RxMode::Query,
            callback: None,
            parked_callback: None,
            ready: None,
        }
    }

    fn completed(&mut self, actions: &mut RxActions) {
        if let Some(frame) = actions.completed.take() {
            match self.mode {
                RxMode::Query => {
                    self.ready = Some(frame);
                }
                RxMode::Event => {
                    // Anything but a complete event frame is noise
                    if frame.bits == EVENT_FRAME_BITS {
                        if let Some(cb) = &mut self.callback {
                            cb(frame.value);
                        }
                    }
                }
            }
        }
    }
}

/// Entry points for the interrupt context. Whoever owns the edge
/// detector and timers calls these and applies the returned actions.
/// In event mode the registered callback runs inside these calls and
/// must not block or call back into the receiver.
#[derive(Clone)]
pub struct RxHandle(Arc<Mutex<Receiver>>);

impl RxHandle {
    pub fn on_edge(&self, level: bool) -> RxActions {
        let mut rx = self.0.lock().unwrap();
        let mut actions = rx.machine.edge(level);
        rx.completed(&mut actions);
        actions
    }

    pub fn on_sample(&self, level: bool) -> RxActions {
        let mut rx = self.0.lock().unwrap();
        let mut actions = rx.machine.sample_due(level);
        rx.completed(&mut actions);
        actions
    }

    pub fn on_quiet(&self) -> RxActions {
        let mut rx = self.0.lock().unwrap();
        let mut actions = rx.machine.quiet_due();
        rx.completed(&mut actions);
        actions
    }
}

/// The Manchester transceiver. Owns the physical line; transmission is
/// blocking and timing-exact, reception runs in whatever context
/// delivers events to the [`RxHandle`].
pub struct Transceiver<L: BusLine> {
    line: L,
    ctl: Box<dyn RxControl>,
    timing: BitTiming,
    idle_level: bool,
    rx: Arc<Mutex<Receiver>>,
    attached: bool,
}

impl<L: BusLine> Transceiver<L> {
    pub fn new(mut line: L, mut ctl: Box<dyn RxControl>, config: &PhyConfig) -> Transceiver<L> {
        let timing = BitTiming::from_baud(config.baud);
        line.drive(config.idle_level);
        let rx = Arc::new(Mutex::new(Receiver::new(timing, config.idle_level)));
        let actions = rx.lock().unwrap().machine.reset();
        apply(&mut *ctl, &actions);
        Transceiver {
            line,
            ctl,
            timing,
            idle_level: config.idle_level,
            rx,
            attached: false,
        }
    }

    pub fn rx_handle(&self) -> RxHandle {
        RxHandle(self.rx.clone())
    }

    pub fn timing(&self) -> &BitTiming {
        &self.timing
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Transmit the low `bits` bits of `word`, MSB first: a start
    /// condition, then per bit the true value for a half-bit followed
    /// by its complement. Runs with preemption suppressed so every
    /// half-bit meets the receivers' timing tolerance, then re-arms
    /// reception and blocks for the bus settle interval.
    pub fn send(&mut self, word: u32, bits: u8) {
        assert!(bits <= 32 && bits > 0);
        // The line must never feed our own transmission back in
        self.ctl.mute();
        self.ctl.cancel_timers();

        let half = self.timing.half_bit();
        self.line.enter_critical();
        self.line.drive(!self.idle_level);
        self.line.delay(half);
        self.line.drive(self.idle_level);
        self.line.delay(half);
        let mut data = word << (32 - bits);
        for _ in 0..bits {
            let bit = data & 0x8000_0000 != 0;
            self.line.drive(bit);
            self.line.delay(half);
            self.line.drive(!bit);
            self.line.delay(half);
            data <<= 1;
        }
        self.line.drive(self.idle_level);
        self.line.exit_critical();

        // Re-arm for a backward frame
        let actions = {
            let mut rx = self.rx.lock().unwrap();
            rx.ready = None;
            let expected = match rx.mode {
                RxMode::Query => REPLY_BITS,
                RxMode::Event => EVENT_FRAME_BITS,
            };
            rx.machine.set_expected_bits(expected);
            rx.machine.reset()
        };
        apply(&mut *self.ctl, &actions);

        self.line.delay(timing::SETTLE);
    }

    /// Block until a backward frame of `bits` bits arrives or the
    /// timeout budget for that length runs out. `None` is the normal
    /// outcome when no device has anything to say.
    pub fn recv(&mut self, bits: u8) -> Option<u32> {
        match self.recv_reply(bits) {
            Reply::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Like [`recv`](Self::recv) but keeps garbled frames apart from
    /// silence, which the enumeration protocol needs.
    pub fn recv_reply(&mut self, bits: u8) -> Reply {
        {
            let mut rx = self.rx.lock().unwrap();
            rx.machine.set_expected_bits(bits);
        }
        let budget = self.timing.recv_budget(bits);
        let tick = self.timing.half_bit();
        let mut waited = Duration::ZERO;
        loop {
            {
                let mut rx = self.rx.lock().unwrap();
                if let Some(frame) = rx.ready.take() {
                    return if frame.bits == bits {
                        Reply::Value(frame.value)
                    } else {
                        Reply::Garbled
                    };
                }
            }
            if waited >= budget {
                return Reply::Silence;
            }
            self.line.delay(tick);
            waited += tick;
        }
    }

    /// Switch to event mode: continuously listen for 24-bit frames and
    /// run `callback` for each complete one.
    pub fn attach(&mut self, callback: Box<dyn FnMut(u32) + Send>) {
        let actions = {
            let mut rx = self.rx.lock().unwrap();
            rx.mode = RxMode::Event;
            rx.callback = Some(callback);
            rx.machine.set_expected_bits(EVENT_FRAME_BITS);
            rx.machine.reset()
        };
        apply(&mut *self.ctl, &actions);
        self.attached = true;
    }

    /// Leave event mode. When this returns no further callback can
    /// run, so a query transaction may follow safely.
    pub fn detach(&mut self) {
        self.ctl.mute();
        self.ctl.cancel_timers();
        let actions = {
            let mut rx = self.rx.lock().unwrap();
            rx.parked_callback = rx.callback.take();
            rx.mode = RxMode::Query;
            rx.machine.set_expected_bits(REPLY_BITS);
            rx.machine.reset()
        };
        apply(&mut *self.ctl, &actions);
        self.attached = false;
    }

    /// Restore event mode with the callback parked by `detach`.
    pub fn reattach(&mut self) {
        let cb = self.rx.lock().unwrap().parked_callback.take();
        if let Some(cb) = cb {
            self.attach(cb);
        }
    }
}

fn apply(ctl: &mut dyn RxControl, actions: &RxActions) {
    if actions.mute {
        ctl.mute();
    }
    if let Some(level) = actions.listen {
        ctl.listen(level);
    }
    if let Some(d) = actions.sample_in {
        ctl.arm_sample(d);
    }
    if let Some(d) = actions.quiet_in {
        ctl.arm_quiet(d);
    }
}
