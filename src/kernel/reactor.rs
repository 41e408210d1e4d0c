use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::cooldown::{CooldownPoll, CooldownTimer};
use super::event::{AlertEvent, Judgment, StatusEvent};
use super::resilience::budget::ErrorBudget;
use super::resilience::ResilientOracle;
use super::scheduler::CaptureScheduler;
use super::state::{transition, DecisionState, Signal};
use super::telemetry::event::TelemetryEvent;
use super::telemetry::recorder::TelemetryRecorder;
use super::time::Pacer;
use super::verification::{VerificationEngine, VerificationRound};
use crate::error::{CycleError, Interrupted};
use crate::services::notify::Notifier;

pub const DEFAULT_ANALYSIS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct ReactorConfig {
    /// Pause after a cycle that leaves the machine monitoring.
    pub analysis_interval: Duration,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self { analysis_interval: DEFAULT_ANALYSIS_INTERVAL }
    }
}

/// What one step did.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Primary judgment negative.
    Clear,
    /// Primary judgment positive; verification is next.
    Suspected,
    Confirmed { cooldown_until: chrono::DateTime<chrono::Utc>, failure_votes: usize },
    Rejected { failure_votes: usize },
    /// Verification could not capture anything.
    Unverified,
    Suppressed { remaining: Duration },
    CooldownElapsed,
    /// No judgment could be produced.
    Failed(CycleError),
}

#[derive(Debug, Clone)]
pub struct Step {
    pub next: DecisionState,
    pub outcome: CycleOutcome,
}

impl Step {
    /// True when the step finished an analysis cycle and left the machine monitoring.
    pub fn settles(&self) -> bool {
        matches!(
            self.outcome,
            CycleOutcome::Clear | CycleOutcome::Rejected { .. } | CycleOutcome::Unverified | CycleOutcome::Failed(_)
        )
    }
}

/// The decision state machine: MONITORING -> VERIFYING -> COOLDOWN -> MONITORING.
///
/// **LAW**: one pipeline in flight at a time. A step finishes every capture,
/// judgment and verification it starts before returning.
pub struct Reactor {
    scheduler: CaptureScheduler,
    oracle: ResilientOracle,
    verifier: VerificationEngine,
    cooldown: CooldownTimer,
    budget: ErrorBudget,
    notifier: Notifier,
    config: ReactorConfig,
    pub telemetry: TelemetryRecorder,
}

impl Reactor {
    pub fn new(
        scheduler: CaptureScheduler,
        oracle: ResilientOracle,
        verifier: VerificationEngine,
        notifier: Notifier,
        config: ReactorConfig,
    ) -> Self {
        Self {
            scheduler,
            oracle,
            verifier,
            cooldown: CooldownTimer::default(),
            budget: ErrorBudget::default(),
            notifier,
            config,
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: CooldownTimer) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_budget(mut self, budget: ErrorBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn budget(&self) -> &ErrorBudget {
        &self.budget
    }

    /// Advance the machine by one state's worth of work.
    pub async fn step(&mut self, state: DecisionState, pacer: &Pacer) -> Result<Step, Interrupted> {
        match state {
            DecisionState::Monitoring => self.monitor(pacer).await,
            DecisionState::Verifying { primary } => self.verify(primary, pacer).await,
            DecisionState::Cooldown { until } => self.cool_down(until, pacer).await,
        }
    }

    /// One on-demand cycle: honours cooldown without waiting, and verifies inline.
    pub async fn run_once(&mut self, state: DecisionState, pacer: &Pacer) -> Result<Step, Interrupted> {
        let state = match state {
            DecisionState::Cooldown { until } => match self.cooldown.remaining(until, pacer.now()) {
                Some(remaining) => {
                    info!(remaining_secs = remaining.as_secs(), "Manual cycle suppressed by cooldown");
                    self.telemetry.record(TelemetryEvent::CooldownSuppressed);
                    return Ok(Step {
                        next: DecisionState::Cooldown { until },
                        outcome: CycleOutcome::Suppressed { remaining },
                    });
                }
                None => advance(&DecisionState::Cooldown { until }, Signal::CooldownElapsed),
            },
            other => other,
        };

        let step = self.step(state, pacer).await?;
        match step.next {
            DecisionState::Verifying { .. } => self.step(step.next, pacer).await,
            _ => Ok(step),
        }
    }

    /// Automatic loop until shutdown.
    pub async fn run(&mut self, pacer: &Pacer) {
        info!(
            images_per_series = self.scheduler.plan().images,
            interval_secs = self.scheduler.plan().interval.as_secs(),
            analysis_interval_secs = self.config.analysis_interval.as_secs(),
            "Decision loop started"
        );

        let mut state = DecisionState::default();
        loop {
            let step = match self.step(state, pacer).await {
                Ok(step) => step,
                Err(Interrupted) => break,
            };

            // A due budget pause replaces the analysis interval.
            let settles = step.settles() && self.budget.pause_due().is_none();
            state = step.next;

            if settles && pacer.wait(self.config.analysis_interval).await.is_err() {
                break;
            }
        }

        info!("Decision loop stopped");
    }

    async fn monitor(&mut self, pacer: &Pacer) -> Result<Step, Interrupted> {
        if let Some(pause) = self.budget.pause_due() {
            let consecutive_failures = self.budget.consecutive_failures();
            warn!(
                consecutive_failures,
                pause_secs = pause.as_secs(),
                "Too many consecutive failures, pausing before next attempt"
            );
            self.telemetry.record(TelemetryEvent::BudgetPause { consecutive_failures });
            pacer.wait(pause).await?;
        }

        let cycle_id = Uuid::new_v4();
        info!(%cycle_id, started_at = %pacer.now(), "Analysis cycle started");

        let judgment = match self.judge_primary(pacer).await {
            Ok(judgment) => judgment,
            Err(CycleError::Interrupted) => return Err(Interrupted),
            Err(err) => return Ok(self.cycle_failed(cycle_id, err, pacer)),
        };

        self.budget.record_success();

        if !judgment.failed {
            info!(
                %cycle_id,
                at = %pacer.now(),
                confidence = judgment.confidence,
                "No print failure detected"
            );
            self.finish_cycle(false, "No print failure was detected in the image series.".to_string(), pacer).await;
            return Ok(Step {
                next: advance(&DecisionState::Monitoring, Signal::PrimaryClear),
                outcome: CycleOutcome::Clear,
            });
        }

        warn!(
            %cycle_id,
            at = %pacer.now(),
            confidence = judgment.confidence,
            explanation = %judgment.explanation,
            "Possible print failure detected, verifying"
        );
        Ok(Step {
            next: advance(&DecisionState::Monitoring, Signal::PrimaryFailed(judgment)),
            outcome: CycleOutcome::Suspected,
        })
    }

    async fn judge_primary(&self, pacer: &Pacer) -> Result<Judgment, CycleError> {
        let series = self.scheduler.run_cycle(pacer).await?;
        Ok(self.oracle.judge(series, pacer).await?)
    }

    fn cycle_failed(&mut self, cycle_id: Uuid, err: CycleError, pacer: &Pacer) -> Step {
        let consecutive_failures = self.budget.record_failure();
        error!(
            %cycle_id,
            at = %pacer.now(),
            kind = err.kind(),
            error = %err,
            consecutive_failures,
            "Analysis cycle failed"
        );
        self.telemetry.record(TelemetryEvent::CycleFailed {
            kind: err.kind().to_string(),
            consecutive_failures,
        });
        Step {
            next: advance(&DecisionState::Monitoring, Signal::CycleFailed),
            outcome: CycleOutcome::Failed(err),
        }
    }

    async fn verify(&mut self, primary: Judgment, pacer: &Pacer) -> Result<Step, Interrupted> {
        let verifying = DecisionState::Verifying { primary: primary.clone() };
        let round = self.verifier.verify(&self.scheduler, &self.oracle, pacer).await?;
        let rounds = round.rechecks().len();
        let failure_votes = round.failure_votes();

        let confirmed = match round.decide() {
            Ok(confirmed) => confirmed,
            Err(incomplete) => {
                warn!(error = %incomplete, "Verification could not run, returning to monitoring");
                self.record_verification(failure_votes, rounds, false);
                self.finish_cycle(
                    false,
                    "Possible print failure could not be verified; no verification images were captured.".to_string(),
                    pacer,
                )
                .await;
                return Ok(Step {
                    next: advance(&verifying, Signal::Rejected),
                    outcome: CycleOutcome::Unverified,
                });
            }
        };
        self.record_verification(failure_votes, rounds, confirmed);

        if !confirmed {
            info!(failure_votes, rounds, at = %pacer.now(), "Print failure not confirmed");
            self.finish_cycle(
                false,
                format!("Possible print failure was not confirmed ({failure_votes} of {rounds} verification checks)."),
                pacer,
            )
            .await;
            return Ok(Step {
                next: advance(&verifying, Signal::Rejected),
                outcome: CycleOutcome::Rejected { failure_votes },
            });
        }

        let alert = build_alert(&primary, &round, pacer);
        let description = format!(
            "Print failure confirmed by {failure_votes} of {rounds} verification checks: {}",
            alert.explanation
        );
        warn!(failure_votes, rounds, at = %alert.timestamp, "Print failure confirmed, alerting");

        let delivered = self.notifier.dispatch_alert(alert).await;
        self.telemetry.record(TelemetryEvent::AlertDispatched { delivered });
        self.finish_cycle(true, description, pacer).await;

        let cooldown_until = self.cooldown.start(pacer.now());
        info!(%cooldown_until, "Entering cooldown");
        Ok(Step {
            next: advance(&verifying, Signal::Confirmed { cooldown_until }),
            outcome: CycleOutcome::Confirmed { cooldown_until, failure_votes },
        })
    }

    async fn cool_down(&mut self, until: chrono::DateTime<chrono::Utc>, pacer: &Pacer) -> Result<Step, Interrupted> {
        let state = DecisionState::Cooldown { until };
        match self.cooldown.poll(until, pacer).await? {
            CooldownPoll::Elapsed => Ok(Step {
                next: advance(&state, Signal::CooldownElapsed),
                outcome: CycleOutcome::CooldownElapsed,
            }),
            CooldownPoll::Pending { remaining } => {
                self.telemetry.record(TelemetryEvent::CooldownSuppressed);
                Ok(Step {
                    next: state,
                    outcome: CycleOutcome::Suppressed { remaining },
                })
            }
        }
    }

    fn record_verification(&mut self, failure_votes: usize, rounds: usize, confirmed: bool) {
        self.telemetry.record(TelemetryEvent::VerificationDecided {
            failure_votes: failure_votes as u8,
            rounds: rounds as u8,
            confirmed,
        });
    }

    async fn finish_cycle(&mut self, print_failed: bool, description: String, pacer: &Pacer) {
        self.telemetry.record(TelemetryEvent::CycleCompleted { print_failed });
        self.notifier
            .publish_status(StatusEvent {
                timestamp: pacer.now(),
                print_failed,
                description,
            })
            .await;
    }
}

fn advance(state: &DecisionState, signal: Signal) -> DecisionState {
    transition(state, signal).unwrap_or_else(|| {
        warn!(state = state.label(), "Ignored signal for current state");
        state.clone()
    })
}

fn build_alert(primary: &Judgment, round: &VerificationRound, pacer: &Pacer) -> AlertEvent {
    let evidence = round.evidence().unwrap_or(primary);
    AlertEvent {
        timestamp: pacer.now(),
        confirmed: true,
        explanation: evidence.explanation.clone(),
        representative_image: evidence.source_series.latest().clone(),
    }
}
