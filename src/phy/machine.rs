use super::timing::BitTiming;
use std::time::Duration;

/// A complete backward or forward frame assembled by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxFrame {
    /// Accumulated bits, MSB first
    pub value: u32,
    /// Number of bits actually received
    pub bits: u8,
}

/// Receiver states.
///
/// `Idle` waits for the first transition away from the idle level.
/// `Start` has seen that transition and expects the return to idle
/// that completes the start condition. `Armed` has accepted an edge
/// and waits for the sample timer to read the next bit. `Gap` has
/// sampled a bit and waits for the next edge, or for the quiet timer
/// to declare the frame finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    Idle,
    Start,
    Armed,
    Gap,
}

/// What the surrounding interrupt glue must do after feeding an event
/// to the machine. Arming a timer replaces any pending shot of the
/// same timer.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RxActions {
    /// Enable the edge detector for a transition to this level
    pub listen: Option<bool>,
    /// Disable the edge detector
    pub mute: bool,
    /// Arm the sample timer
    pub sample_in: Option<Duration>,
    /// Arm the quiet timer
    pub quiet_in: Option<Duration>,
    /// A frame has been fully received
    pub completed: Option<RxFrame>,
}

/// The Manchester receive state machine as a pure transition function.
/// It owns no hardware; edges and timer expiries are fed in by whatever
/// execution context the environment provides and the returned actions
/// are applied to the line's edge detector and timers.
#[derive(Debug)]
pub struct RxMachine {
    timing: BitTiming,
    idle_level: bool,
    expected_bits: u8,
    state: RxState,
    accum: u32,
    count: u8,
}

impl RxMachine {
    pub fn new(timing: BitTiming, idle_level: bool, expected_bits: u8) -> RxMachine {
        RxMachine {
            timing,
            idle_level,
            expected_bits,
            state: RxState::Idle,
            accum: 0,
            count: 0,
        }
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    pub fn expected_bits(&self) -> u8 {
        self.expected_bits
    }

    pub fn set_expected_bits(&mut self, bits: u8) {
        self.expected_bits = bits;
    }

    /// Return to `Idle` and start listening for a new frame.
    pub fn reset(&mut self) -> RxActions {
        self.state = RxState::Idle;
        self.accum = 0;
        self.count = 0;
        RxActions {
            listen: Some(!self.idle_level),
            ..RxActions::default()
        }
    }

    /// The line transitioned to `level`.
    pub fn edge(&mut self, level: bool) -> RxActions {
        match self.state {
            RxState::Idle if level != self.idle_level => {
                self.state = RxState::Start;
                // The return to idle must come within the sample
                // deadline or this was not a start condition.
                RxActions {
                    listen: Some(self.idle_level),
                    quiet_in: Some(self.timing.sample_point()),
                    ..RxActions::default()
                }
            }
            RxState::Start if level == self.idle_level => {
                self.state = RxState::Armed;
                self.accum = 0;
                self.count = 0;
                RxActions {
                    mute: true,
                    sample_in: Some(self.timing.sample_point()),
                    quiet_in: Some(self.timing.quiet_window()),
                    ..RxActions::default()
                }
            }
            RxState::Gap => {
                self.state = RxState::Armed;
                RxActions {
                    mute: true,
                    sample_in: Some(self.timing.sample_point()),
                    quiet_in: Some(self.timing.quiet_window()),
                    ..RxActions::default()
                }
            }
            // Stale or misdirected edge
            _ => RxActions::default(),
        }
    }

    /// The sample timer expired; `level` is the line level right now.
    pub fn sample_due(&mut self, level: bool) -> RxActions {
        match self.state {
            RxState::Armed => {
                if self.count < self.expected_bits {
                    self.accum = (self.accum << 1) | u32::from(level);
                    self.count += 1;
                }
                self.state = RxState::Gap;
                RxActions {
                    listen: Some(!level),
                    ..RxActions::default()
                }
            }
            _ => RxActions::default(),
        }
    }

    /// The quiet timer expired: the line has been still too long for
    /// the frame to continue.
    pub fn quiet_due(&mut self) -> RxActions {
        match self.state {
            RxState::Start => {
                // No start condition after all
                self.reset()
            }
            RxState::Gap => {
                let frame = if self.count > 0 {
                    Some(RxFrame {
                        value: self.accum,
                        bits: self.count,
                    })
                } else {
                    None
                };
                let mut actions = self.reset();
                actions.completed = frame;
                actions
            }
            _ => RxActions::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn machine(bits: u8) -> RxMachine {
        RxMachine::new(BitTiming::from_baud(1200), false, bits)
    }

    /// Feed the event sequence a well formed frame produces: start
    /// condition, then per bit a sample expiry followed by the mid-bit
    /// edge, then the trailing idle sample and quiet expiry.
    fn run_frame(m: &mut RxMachine, bits: &[bool]) -> Option<RxFrame> {
        m.reset();
        assert_eq!(m.edge(true).listen, Some(false));
        let a = m.edge(false);
        assert!(a.mute && a.sample_in.is_some());
        for &b in bits {
            let a = m.sample_due(b);
            assert_eq!(a.listen, Some(!b));
            let a = m.edge(!b);
            assert!(a.sample_in.is_some());
        }
        // After the last mid-bit edge the sample lands in the idle
        // period following the frame.
        m.sample_due(false);
        m.quiet_due().completed
    }

    fn to_bits(value: u32, count: u8) -> Vec<bool> {
        (0..count).rev().map(|i| (value >> i) & 1 == 1).collect()
    }

    #[test]
    fn decodes_a_byte_msb_first() {
        let mut m = machine(8);
        let frame = run_frame(&mut m, &to_bits(0xb2, 8)).unwrap();
        assert_eq!(frame, RxFrame { value: 0xb2, bits: 8 });
    }

    #[test]
    fn decodes_all_zero_and_all_one_frames() {
        let mut m = machine(8);
        assert_eq!(run_frame(&mut m, &to_bits(0x00, 8)).unwrap().value, 0);
        assert_eq!(run_frame(&mut m, &to_bits(0xff, 8)).unwrap().value, 0xff);
    }

    #[test]
    fn decodes_24_bit_frames() {
        let mut m = machine(24);
        let frame = run_frame(&mut m, &to_bits(0x123456, 24)).unwrap();
        assert_eq!(frame.value, 0x123456);
        assert_eq!(frame.bits, 24);
    }

    #[test]
    fn lone_edge_is_not_a_start_condition() {
        let mut m = machine(8);
        m.reset();
        m.edge(true);
        let a = m.quiet_due();
        assert!(a.completed.is_none());
        assert_eq!(m.state(), RxState::Idle);
    }

    #[test]
    fn surplus_bits_are_discarded() {
        let mut m = machine(8);
        let frame = run_frame(&mut m, &to_bits(0x3ff, 10)).unwrap();
        // Only the first 8 bits are kept
        assert_eq!(frame.bits, 8);
        assert_eq!(frame.value, 0xff);
    }

    #[test]
    fn truncated_frame_never_reaches_the_expected_length() {
        let mut m = machine(8);
        // Five data bits; the dangling sample after the last edge picks
        // up the idle level as a sixth bit.
        let frame = run_frame(&mut m, &to_bits(0x15, 5)).unwrap();
        assert_eq!(frame.bits, 6);
        assert_eq!(frame.value, 0x2a);
        assert_ne!(frame.bits, m.expected_bits());
    }

    #[test]
    fn machine_rearms_after_completion() {
        let mut m = machine(8);
        run_frame(&mut m, &to_bits(0xa5, 8)).unwrap();
        let frame = run_frame(&mut m, &to_bits(0x5a, 8)).unwrap();
        assert_eq!(frame.value, 0x5a);
    }
}
