//! Round clock - counts down and rolls over into a new round

/// Countdown driven by the slow round schedule
#[derive(Debug, Clone)]
pub struct RoundClock {
    duration: u32,
    remaining: u32,
}

impl RoundClock {
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            remaining: duration,
        }
    }

    /// Seconds (round ticks) left in the current round
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Advance one round tick. Returns true when the round expired,
    /// in which case the clock has already been rewound to its full duration.
    pub fn tick(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.remaining = self.duration;
            true
        } else {
            false
        }
    }
}
