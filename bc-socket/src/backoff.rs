//! Reconnect delay schedule.
//!
//! The base schedule is `min(initial * 2^(attempt - 1), max)`. Optional
//! jitter scales the base delay by a random factor and is re-clamped to the
//! ceiling, so a configured ceiling is never exceeded.

use std::time::Duration;

/// Exponential backoff with a ceiling and optional jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter_factor: f64,
}

impl Backoff {
    /// Create a schedule without jitter.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            jitter_factor: 0.0,
        }
    }

    /// Set the jitter factor, clamped to `0.0..=1.0`.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = if factor.is_finite() { factor.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    /// Base delay before attempt number `attempt` (1-based).
    ///
    /// Attempt 0 is treated as attempt 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let max_nanos = self.max.as_nanos();
        // Anything past 2^100 is clamped anyway.
        let factor = 1u128 << exponent.min(100);
        let nanos = self.initial.as_nanos().saturating_mul(factor).min(max_nanos);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Apply jitter to a base delay.
    ///
    /// `unit` is a uniform sample from `[0, 1)`; the result lies in
    /// `[base * (1 - jitter), base * (1 + jitter)]`, clamped to the ceiling.
    pub fn jitter(&self, base: Duration, unit: f64) -> Duration {
        if !self.has_jitter() {
            return base;
        }
        let scale = 1.0 + self.jitter_factor * (unit.clamp(0.0, 1.0) * 2.0 - 1.0);
        base.mul_f64(scale.max(0.0)).min(self.max)
    }

    /// Delay before `attempt` with a fresh random jitter sample.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base = self.delay(attempt);
        if !self.has_jitter() {
            base
        } else {
            self.jitter(base, rand::random::<f64>())
        }
    }

    /// Whether jitter is applied.
    pub fn has_jitter(&self) -> bool {
        self.jitter_factor > 0.0
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1_000), Duration::from_millis(30_000))
    }
}
