use std::time::Duration;

pub const CONSECUTIVE_FAILURE_THRESHOLD: u32 = 5;
pub const BUDGET_PAUSE: Duration = Duration::from_secs(60);

/// Counts back-to-back cycles that produced no judgment.
/// Once the threshold is reached every further attempt is preceded by a pause,
/// until a cycle succeeds.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    consecutive: u32,
    threshold: u32,
    pause: Duration,
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self::new(CONSECUTIVE_FAILURE_THRESHOLD, BUDGET_PAUSE)
    }
}

impl ErrorBudget {
    pub fn new(threshold: u32, pause: Duration) -> Self {
        Self { consecutive: 0, threshold, pause }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    /// Returns the new consecutive count.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive = self.consecutive.saturating_add(1);
        self.consecutive
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Pause owed before the next attempt, if the budget is spent.
    pub fn pause_due(&self) -> Option<Duration> {
        (self.consecutive >= self.threshold).then_some(self.pause)
    }
}
