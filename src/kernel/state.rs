use chrono::{DateTime, Utc};

use super::event::Judgment;

/// Where the decision pipeline currently stands.
/// Owned by the reactor loop and threaded through each step; nothing else mutates it.
#[derive(Debug, Clone)]
pub enum DecisionState {
    /// Periodic capture + judgment.
    Monitoring,
    /// A primary judgment came back positive and awaits confirmation.
    Verifying { primary: Judgment },
    /// Analysis suppressed until `until`.
    Cooldown { until: DateTime<Utc> },
}

impl Default for DecisionState {
    fn default() -> Self {
        Self::Monitoring
    }
}

impl DecisionState {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionState::Monitoring => "monitoring",
            DecisionState::Verifying { .. } => "verifying",
            DecisionState::Cooldown { .. } => "cooldown",
        }
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        match self {
            DecisionState::Cooldown { until } => Some(*until),
            _ => None,
        }
    }

    pub fn is_monitoring(&self) -> bool {
        matches!(self, DecisionState::Monitoring)
    }
}

/// Facts that may move the machine.
#[derive(Debug, Clone)]
pub enum Signal {
    PrimaryClear,
    PrimaryFailed(Judgment),
    /// Cycle produced no judgment; the machine stays put.
    CycleFailed,
    Confirmed { cooldown_until: DateTime<Utc> },
    Rejected,
    CooldownElapsed,
}

/// Pure function: (current state, signal) -> next state.
/// Returns `None` for signals that do not apply to the current state.
pub fn transition(current: &DecisionState, signal: Signal) -> Option<DecisionState> {
    use DecisionState::*;

    match (current, signal) {
        (Monitoring, Signal::PrimaryClear) => Some(Monitoring),
        (Monitoring, Signal::PrimaryFailed(primary)) => Some(Verifying { primary }),
        (Monitoring, Signal::CycleFailed) => Some(Monitoring),

        (Verifying { .. }, Signal::Confirmed { cooldown_until }) => Some(Cooldown { until: cooldown_until }),
        // A rejected verification does not penalize future checks.
        (Verifying { .. }, Signal::Rejected) => Some(Monitoring),

        (Cooldown { .. }, Signal::CooldownElapsed) => Some(Monitoring),

        _ => None,
    }
}
