use std::collections::VecDeque;
use super::event::TelemetryEvent;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub cycle_stats: CycleStats,
    pub verification_stats: VerificationStats,
    pub alert_stats: AlertStats,
    pub suppressed_polls: u64,
    pub budget_pauses: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleStats {
    pub completed: u64,
    pub reported_failed: u64,
    pub errors: u64,
    pub max_consecutive_errors: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationStats {
    pub rounds: u64,
    pub confirmed: u64,
    pub rejected: u64,
    pub avg_failure_votes: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertStats {
    pub dispatched: u64,
    pub undelivered: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();
    let mut total_votes: u64 = 0;

    for event in events {
        match event {
            TelemetryEvent::CycleCompleted { print_failed } => {
                snap.cycle_stats.completed += 1;
                if *print_failed {
                    snap.cycle_stats.reported_failed += 1;
                }
            }
            TelemetryEvent::CycleFailed { consecutive_failures, .. } => {
                snap.cycle_stats.errors += 1;
                snap.cycle_stats.max_consecutive_errors =
                    snap.cycle_stats.max_consecutive_errors.max(*consecutive_failures);
            }
            TelemetryEvent::VerificationDecided { failure_votes, confirmed, .. } => {
                snap.verification_stats.rounds += 1;
                total_votes += u64::from(*failure_votes);
                if *confirmed {
                    snap.verification_stats.confirmed += 1;
                } else {
                    snap.verification_stats.rejected += 1;
                }
            }
            TelemetryEvent::AlertDispatched { delivered } => {
                snap.alert_stats.dispatched += 1;
                if !delivered {
                    snap.alert_stats.undelivered += 1;
                }
            }
            TelemetryEvent::CooldownSuppressed => snap.suppressed_polls += 1,
            TelemetryEvent::BudgetPause { .. } => snap.budget_pauses += 1,
        }
    }

    if snap.verification_stats.rounds > 0 {
        snap.verification_stats.avg_failure_votes =
            total_votes as f64 / snap.verification_stats.rounds as f64;
    }

    snap
}
