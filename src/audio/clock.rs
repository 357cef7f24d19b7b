use std::cell::Cell;
use std::time::{Duration, Instant};

/// Elapsed-time source for the cooperative timeout checks.
pub trait Clock {
    fn elapsed(&self) -> Duration;
}

/// Wall clock started when the listen begins.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    started: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Simulated clock that advances one step per query.
///
/// The capture loop asks for the time once per frame, so a step equal to the
/// frame duration makes timeouts track audio time for offline input.
#[derive(Debug, Clone)]
pub struct StepClock {
    now: Cell<Duration>,
    step: Duration,
}

impl StepClock {
    pub fn new(step: Duration) -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            step,
        }
    }

    pub fn per_frame(frame_ms: u64) -> Self {
        Self::new(Duration::from_millis(frame_ms))
    }

    /// Start the clock with `offset` already elapsed.
    pub fn starting_at(self, offset: Duration) -> Self {
        self.now.set(offset);
        self
    }
}

impl Clock for StepClock {
    fn elapsed(&self) -> Duration {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}
