use std::time::Duration;

/// Retry backoff policy for chunk delivery.
///
/// Pure mapping from attempt number to wait duration, parameterized so tests
/// can exercise the schedule without real timers.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Wait before the second attempt (i.e. after the first failure)
    pub base: Duration,
    /// Growth factor applied per additional failed attempt
    pub multiplier: u32,
    /// Upper bound on any single wait
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2,
            cap: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Wait duration after the given failed attempt (1-based).
    ///
    /// With the defaults this yields 1s, 2s, 4s, 8s, 16s, then 30s capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut wait = self.base;
        for _ in 1..attempt.max(1) {
            wait = match wait.checked_mul(self.multiplier) {
                Some(w) if w < self.cap => w,
                _ => return self.cap,
            };
        }
        wait.min(self.cap)
    }
}
