use std::time::Instant;

/// Monotonic engine clock measuring microseconds since engine start.
///
/// Every timestamp in the pipeline (emit times, schedule times, animation
/// start times) is a `u64` microsecond count from this clock.
#[derive(Debug, Clone)]
pub struct EngineClock {
    start: Instant,
}

impl EngineClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Microseconds elapsed since the clock was created.
    #[must_use]
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for EngineClock {
    fn default() -> Self {
        Self::new()
    }
}
