use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::info;

use super::time::{to_chrono, Pacer};
use crate::error::Interrupted;

pub const COOLDOWN_PERIOD: Duration = Duration::from_secs(15 * 60);
/// Expiry is checked at this cadence to bound log volume.
pub const COOLDOWN_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownPoll {
    Elapsed,
    Pending { remaining: Duration },
}

/// Suppresses analysis for a fixed window after a confirmed alert.
#[derive(Debug, Clone, Copy)]
pub struct CooldownTimer {
    period: Duration,
    poll_interval: Duration,
}

impl Default for CooldownTimer {
    fn default() -> Self {
        Self::new(COOLDOWN_PERIOD, COOLDOWN_POLL_INTERVAL)
    }
}

impl CooldownTimer {
    pub fn new(period: Duration, poll_interval: Duration) -> Self {
        Self { period, poll_interval }
    }

    /// Deadline for a cooldown starting at `now`.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + to_chrono(self.period)
    }

    /// Time left before `until`, or `None` once it has passed.
    pub fn remaining(&self, until: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        if now >= until {
            return None;
        }
        (until - now).to_std().ok()
    }

    /// One poll: report expiry, or log the remaining time and wait one poll interval.
    pub async fn poll(&self, until: DateTime<Utc>, pacer: &Pacer) -> Result<CooldownPoll, Interrupted> {
        let Some(remaining) = self.remaining(until, pacer.now()) else {
            info!(cooldown_until = %until, "Cooldown elapsed, resuming monitoring");
            return Ok(CooldownPoll::Elapsed);
        };

        info!(
            remaining_secs = remaining.as_secs(),
            cooldown_until = %until,
            "In cooldown, analysis suppressed"
        );
        pacer.wait(self.poll_interval).await?;
        Ok(CooldownPoll::Pending { remaining })
    }
}
