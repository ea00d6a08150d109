/// Monotonic millisecond clock. The firmware backs this with
/// `esp_timer_get_time`; tests use a manual clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Fixed-interval timer checked once per loop iteration.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval_ms: u64,
    last_ms: Option<u64>,
}

impl Cadence {
    /// A cadence that is due immediately on the first check.
    pub fn new(interval_ms: u64) -> Self {
        Self { interval_ms, last_ms: None }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        }
    }

    /// Restart the interval from `now_ms`.
    pub fn mark(&mut self, now_ms: u64) {
        self.last_ms = Some(now_ms);
    }

    /// Make the next check due regardless of elapsed time.
    pub fn expire(&mut self) {
        self.last_ms = None;
    }
}
