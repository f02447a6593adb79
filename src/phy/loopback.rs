//! Virtual-time loopback for the PHY: records the waveform a
//! transmission puts on the line and replays waveforms into a
//! receiver, driving its timers without real hardware or real time.

use super::hal::BusLine;
use super::machine::{RxActions, RxFrame, RxMachine};
use super::timing::BitTiming;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One level change on the simulated line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at: Duration,
    pub level: bool,
}

struct LineState {
    now: Duration,
    level: bool,
    transitions: Vec<Transition>,
    critical: u32,
}

/// A [`BusLine`] over a virtual clock. `delay` advances the clock
/// instead of sleeping, so timing-exact code runs instantly under
/// test while the recorded waveform keeps exact timestamps.
pub struct LoopbackLine {
    state: Arc<Mutex<LineState>>,
}

/// Reader side of a [`LoopbackLine`].
#[derive(Clone)]
pub struct WaveformLog {
    state: Arc<Mutex<LineState>>,
}

impl LoopbackLine {
    pub fn new(idle_level: bool) -> (LoopbackLine, WaveformLog) {
        let state = Arc::new(Mutex::new(LineState {
            now: Duration::ZERO,
            level: idle_level,
            transitions: Vec::new(),
            critical: 0,
        }));
        (
            LoopbackLine {
                state: state.clone(),
            },
            WaveformLog { state },
        )
    }
}

impl WaveformLog {
    pub fn transitions(&self) -> Vec<Transition> {
        self.state.lock().unwrap().transitions.clone()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().transitions.clear();
    }

    pub fn elapsed(&self) -> Duration {
        self.state.lock().unwrap().now
    }
}

impl BusLine for LoopbackLine {
    fn drive(&mut self, level: bool) {
        let mut s = self.state.lock().unwrap();
        if s.level != level {
            s.level = level;
            let at = s.now;
            s.transitions.push(Transition { at, level });
        }
    }

    fn sample(&mut self) -> bool {
        self.state.lock().unwrap().level
    }

    fn delay(&mut self, d: Duration) {
        self.state.lock().unwrap().now += d;
    }

    fn enter_critical(&mut self) {
        self.state.lock().unwrap().critical += 1;
    }

    fn exit_critical(&mut self) {
        let mut s = self.state.lock().unwrap();
        assert!(s.critical > 0, "unbalanced critical section");
        s.critical -= 1;
    }
}

/// An event delivered to a receive sink during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayEvent {
    Edge(bool),
    Sample(bool),
    Quiet,
}

/// Replay a recorded waveform into a receive sink, maintaining the
/// edge detector direction and the two one-shot timers from the
/// actions the sink returns. The sink starts out listening for the
/// first transition away from idle with no timers armed, the state a
/// freshly reset receiver asks for.
pub fn replay<F>(transitions: &[Transition], idle_level: bool, mut sink: F)
where
    F: FnMut(ReplayEvent) -> RxActions,
{
    #[derive(PartialEq)]
    enum Kind {
        Edge,
        Sample,
        Quiet,
    }

    let mut level = idle_level;
    let mut listen: Option<bool> = Some(!idle_level);
    let mut sample_at: Option<Duration> = None;
    let mut quiet_at: Option<Duration> = None;
    let mut next_transition = 0usize;

    loop {
        let mut next: Option<(Duration, Kind)> = None;
        let mut consider = |t: Option<Duration>, kind: Kind| {
            if let Some(t) = t {
                match &next {
                    Some((best, _)) if *best <= t => {}
                    _ => next = Some((t, kind)),
                }
            }
        };
        consider(sample_at, Kind::Sample);
        consider(quiet_at, Kind::Quiet);
        consider(
            transitions.get(next_transition).map(|t| t.at),
            Kind::Edge,
        );

        let Some((now, kind)) = next else { break };
        let actions = match kind {
            Kind::Sample => {
                sample_at = None;
                sink(ReplayEvent::Sample(level))
            }
            Kind::Quiet => {
                quiet_at = None;
                sink(ReplayEvent::Quiet)
            }
            Kind::Edge => {
                level = transitions[next_transition].level;
                next_transition += 1;
                if listen == Some(level) {
                    sink(ReplayEvent::Edge(level))
                } else {
                    continue;
                }
            }
        };

        if actions.mute {
            listen = None;
        }
        if let Some(l) = actions.listen {
            listen = Some(l);
        }
        if let Some(d) = actions.sample_in {
            sample_at = Some(now + d);
        }
        if let Some(d) = actions.quiet_in {
            quiet_at = Some(now + d);
        }
    }
}

/// Decode every frame contained in a waveform.
pub fn decode(
    transitions: &[Transition],
    idle_level: bool,
    timing: BitTiming,
    expected_bits: u8,
) -> Vec<RxFrame> {
    let mut machine = RxMachine::new(timing, idle_level, expected_bits);
    let mut frames = Vec::new();
    machine.reset();
    replay(transitions, idle_level, |ev| {
        let mut actions = match ev {
            ReplayEvent::Edge(l) => machine.edge(l),
            ReplayEvent::Sample(l) => machine.sample_due(l),
            ReplayEvent::Quiet => machine.quiet_due(),
        };
        if let Some(frame) = actions.completed.take() {
            frames.push(frame);
        }
        actions
    });
    frames
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::phy::hal::NullRxControl;
    use crate::phy::transceiver::{PhyConfig, Transceiver};

    fn transceiver(config: &PhyConfig) -> (Transceiver<LoopbackLine>, WaveformLog) {
        let (line, log) = LoopbackLine::new(config.idle_level);
        (
            Transceiver::new(line, Box::new(NullRxControl), config),
            log,
        )
    }

    fn round_trip(word: u32, bits: u8, config: &PhyConfig) {
        let (mut t, log) = transceiver(config);
        log.clear();
        t.send(word, bits);
        let frames = decode(
            &log.transitions(),
            config.idle_level,
            *t.timing(),
            bits,
        );
        assert_eq!(frames, vec![RxFrame { value: word, bits }]);
    }

    #[test]
    fn frames_survive_the_wire() {
        let config = PhyConfig::default();
        round_trip(0x0000, 16, &config);
        round_trip(0xffff, 16, &config);
        round_trip(0xa955, 16, &config);
        round_trip(0x123456, 24, &config);
        round_trip(0xff, 8, &config);
    }

    #[test]
    fn every_standard_and_direct_address_survives_the_wire() {
        let config = PhyConfig::default();
        for addr in 0..64u32 {
            // Standard command with the low bit set
            round_trip(((addr << 1) | 1) << 8 | 0x90, 16, &config);
            // Direct arc power with the low bit clear
            round_trip((addr << 1) << 8 | 0xfe, 16, &config);
        }
        for group in 0..16u32 {
            // Group bit in the top position must survive
            round_trip((0x81 | (group << 1)) << 8 | 0x05, 16, &config);
        }
        // Broadcast
        round_trip(0xff00 | 0x08, 16, &config);
    }

    #[test]
    fn idle_high_polarity_inverts_the_start_edge() {
        let config = PhyConfig {
            baud: 2400,
            idle_level: true,
        };
        let (mut t, log) = transceiver(&config);
        log.clear();
        t.send(0x5a5a, 16);
        let transitions = log.transitions();
        // Start condition: first transition leaves the idle level
        assert_eq!(transitions[0].level, false);
        let frames = decode(&transitions, true, *t.timing(), 16);
        assert_eq!(frames, vec![RxFrame { value: 0x5a5a, bits: 16 }]);
    }

    #[test]
    fn recv_without_reply_returns_none_within_budget() {
        let config = PhyConfig::default();
        let (mut t, log) = transceiver(&config);
        let before = log.elapsed();
        assert_eq!(t.recv(8), None);
        let waited = log.elapsed() - before;
        assert!(waited >= t.timing().recv_budget(8));
        // The budget is finite: well under a second of bus time
        assert!(waited < Duration::from_secs(1));
    }

    #[test]
    fn event_mode_delivers_frames_until_detached() {
        let config = PhyConfig::default();

        // Record a 24-bit event frame with a second transmitter
        let (mut source, source_log) = transceiver(&config);
        source_log.clear();
        let payload = (1u32 << 17) | (3 << 10) | 1;
        source.send(payload, 24);
        let waveform = source_log.transitions();

        let (mut master, _log) = transceiver(&config);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        master.attach(Box::new(move |value| {
            sink.lock().unwrap().push(value);
        }));

        let deliver = |rx: crate::phy::transceiver::RxHandle| {
            replay(&waveform, config.idle_level, |ev| match ev {
                ReplayEvent::Edge(l) => rx.on_edge(l),
                ReplayEvent::Sample(l) => rx.on_sample(l),
                ReplayEvent::Quiet => rx.on_quiet(),
            });
        };

        deliver(master.rx_handle());
        assert_eq!(seen.lock().unwrap().as_slice(), &[payload]);

        // After detach the callback must stay silent
        master.detach();
        deliver(master.rx_handle());
        assert_eq!(seen.lock().unwrap().len(), 1);

        // Reattach restores delivery
        master.reattach();
        deliver(master.rx_handle());
        assert_eq!(seen.lock().unwrap().as_slice(), &[payload, payload]);
    }
}
