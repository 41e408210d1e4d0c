use rand::Rng;
use std::time::Duration;

/// Upper bound of the random extension applied on top of the exponential delay.
pub const JITTER_RATIO: f64 = 0.25;

/// Where the jitter fraction comes from. `Fixed` keeps tests deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Jitter {
    Random,
    Fixed(f64),
    None,
}

impl Jitter {
    fn sample(&self) -> f64 {
        match self {
            Jitter::Random => rand::thread_rng().gen_range(0.0..1.0),
            Jitter::Fixed(fraction) => fraction.clamp(0.0, 1.0),
            Jitter::None => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total calls allowed, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Jitter,
}

impl RetryPolicy {
    /// Oracle throttling: 5 calls, 1s doubling to 30s.
    pub fn throttling() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: Jitter::Random,
        }
    }

    /// Frame source local allowance: 3 grabs, 1s doubling to 5s.
    pub fn capture() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter: Jitter::Random,
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Wait before the call that follows failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = backoff_delay(attempt, self.base_delay, self.max_delay);
        with_jitter(exponential, self.jitter.sample(), self.max_delay)
    }
}

/// `base * 2^(attempt-1)`, capped at `cap`.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.checked_mul(1u32 << exponent).unwrap_or(cap).min(cap)
}

/// Extend `delay` by up to `JITTER_RATIO` of itself, never beyond `cap`.
pub fn with_jitter(delay: Duration, fraction: f64, cap: Duration) -> Duration {
    let extra = delay.mul_f64(JITTER_RATIO * fraction.clamp(0.0, 1.0));
    (delay + extra).min(cap.max(delay))
}
