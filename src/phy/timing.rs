use std::time::Duration;

/// Minimum bus settle time after a forward frame
pub const SETTLE: Duration = Duration::from_micros(13500);

/// Guard interval before a backward frame may start
pub const BACKWARD_GUARD: Duration = Duration::from_micros(2400);

/// Wait after RANDOMISE for all devices to draw a new random address
pub const RANDOMISE_SETTLE: Duration = Duration::from_millis(100);

/// Bit-level timing, fixed once at construction from the baud rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTiming {
    half_bit: Duration,
}

impl BitTiming {
    /// Half a bit lasts 1/(2*baud) seconds, rounded to whole
    /// microseconds.
    pub fn from_baud(baud: u32) -> BitTiming {
        assert!(baud > 0);
        let micros = 1_000_000 / (2 * baud);
        BitTiming {
            half_bit: Duration::from_micros(micros as u64),
        }
    }

    pub fn half_bit(&self) -> Duration {
        self.half_bit
    }

    pub fn bit(&self) -> Duration {
        2 * self.half_bit
    }

    /// Where the line is sampled after an accepted edge. 1.5 half-bit
    /// periods lands in the first phase of the next bit.
    pub fn sample_point(&self) -> Duration {
        self.half_bit * 3 / 2
    }

    /// How long the line must stay quiet after the last edge before
    /// the frame counts as complete.
    pub fn quiet_window(&self) -> Duration {
        3 * self.bit()
    }

    /// How long `recv` waits for a backward frame of the given length:
    /// the backward guard, the frame itself including its start
    /// condition, and half a bit of slack.
    pub fn recv_budget(&self, bits: u8) -> Duration {
        BACKWARD_GUARD + self.bit() * (bits as u32 + 1) + self.half_bit
    }

    /// Duration of a forward frame including the start condition.
    pub fn frame_duration(&self, bits: u8) -> Duration {
        self.bit() * (bits as u32 + 1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn half_bit_from_baud() {
        assert_eq!(
            BitTiming::from_baud(1200).half_bit(),
            Duration::from_micros(416)
        );
        assert_eq!(
            BitTiming::from_baud(2400).half_bit(),
            Duration::from_micros(208)
        );
    }

    #[test]
    fn recv_budget_scales_with_frame_length() {
        let t = BitTiming::from_baud(1200);
        assert!(t.recv_budget(24) > t.recv_budget(8));
        assert!(t.recv_budget(8) > BACKWARD_GUARD);
    }
}
