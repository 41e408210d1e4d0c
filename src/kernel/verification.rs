use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::event::{ImageSeries, Judgment};
use super::resilience::ResilientOracle;
use super::scheduler::{CaptureScheduler, SeriesPlan};
use super::time::Pacer;
use crate::error::{CycleError, Interrupted, ResilienceError, VerificationIncomplete};

/// Independent re-checks per verification round.
pub const VERIFICATION_ROUNDS: usize = 4;
/// Failure votes needed to confirm. Favors precision: one dissent is tolerated.
pub const VERIFICATION_QUORUM: usize = 3;
/// Intra-series spacing for re-checks, independent of the primary cadence.
pub const VERIFICATION_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub rounds: usize,
    pub quorum: usize,
    pub interval: Duration,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            rounds: VERIFICATION_ROUNDS,
            quorum: VERIFICATION_QUORUM,
            interval: VERIFICATION_INTERVAL,
        }
    }
}

/// One re-check. Anything other than a positive judgment votes "no failure".
#[derive(Debug, Clone)]
pub enum Recheck {
    Judged(Judgment),
    CaptureFailed(String),
    Inconclusive(String),
}

impl Recheck {
    pub fn voted_failure(&self) -> bool {
        matches!(self, Recheck::Judged(j) if j.failed)
    }

    fn captured(&self) -> bool {
        !matches!(self, Recheck::CaptureFailed(_))
    }
}

/// The re-checks gathered after a positive primary judgment. Discarded after the vote.
#[derive(Debug, Clone)]
pub struct VerificationRound {
    rechecks: Vec<Recheck>,
    quorum: usize,
}

impl VerificationRound {
    pub fn new(rechecks: Vec<Recheck>, quorum: usize) -> Self {
        Self { rechecks, quorum }
    }

    pub fn rechecks(&self) -> &[Recheck] {
        &self.rechecks
    }

    pub fn failure_votes(&self) -> usize {
        self.rechecks.iter().filter(|r| r.voted_failure()).count()
    }

    /// Confirmed when failure votes reach the quorum.
    pub fn decide(&self) -> Result<bool, VerificationIncomplete> {
        if !self.rechecks.iter().any(Recheck::captured) {
            return Err(VerificationIncomplete);
        }
        Ok(self.failure_votes() >= self.quorum)
    }

    /// Most recent re-check that saw the failure.
    pub fn evidence(&self) -> Option<&Judgment> {
        self.rechecks.iter().rev().find_map(|r| match r {
            Recheck::Judged(j) if j.failed => Some(j),
            _ => None,
        })
    }
}

pub struct VerificationEngine {
    policy: VerificationPolicy,
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self::new(VerificationPolicy::default())
    }
}

impl VerificationEngine {
    pub fn new(policy: VerificationPolicy) -> Self {
        Self { policy }
    }

    /// Capture and judge `rounds` fresh series, strictly one after another.
    pub async fn verify(
        &self,
        scheduler: &CaptureScheduler,
        oracle: &ResilientOracle,
        pacer: &Pacer,
    ) -> Result<VerificationRound, Interrupted> {
        let plan = SeriesPlan {
            images: scheduler.plan().images,
            interval: self.policy.interval,
        };
        let mut rechecks = Vec::with_capacity(self.policy.rounds);

        for round in 1..=self.policy.rounds {
            let recheck = self.recheck(scheduler, oracle, plan, pacer).await?;
            match &recheck {
                Recheck::Judged(j) => info!(
                    round,
                    failed = j.failed,
                    confidence = j.confidence,
                    "Verification judgment received"
                ),
                Recheck::CaptureFailed(reason) => warn!(round, reason = %reason, "Verification capture failed, counting as no failure"),
                Recheck::Inconclusive(reason) => warn!(round, reason = %reason, "Verification judgment unavailable, counting as no failure"),
            }
            rechecks.push(recheck);
        }

        Ok(VerificationRound::new(rechecks, self.policy.quorum))
    }

    async fn recheck(
        &self,
        scheduler: &CaptureScheduler,
        oracle: &ResilientOracle,
        plan: SeriesPlan,
        pacer: &Pacer,
    ) -> Result<Recheck, Interrupted> {
        let series: Arc<ImageSeries> = match scheduler.capture_series(plan, pacer).await {
            Ok(series) => series,
            Err(CycleError::Interrupted) => return Err(Interrupted),
            Err(err) => return Ok(Recheck::CaptureFailed(err.to_string())),
        };

        match oracle.judge(series, pacer).await {
            Ok(judgment) => Ok(Recheck::Judged(judgment)),
            Err(ResilienceError::Interrupted) => Err(Interrupted),
            Err(err) => Ok(Recheck::Inconclusive(err.to_string())),
        }
    }
}
