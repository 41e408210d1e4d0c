use serde::{Deserialize, Serialize};

// Allowed: counts, labels, flags
// Forbidden: image bytes, model explanations, secrets

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// A judgment was produced and the cycle published a status.
    CycleCompleted { print_failed: bool },

    /// No judgment could be produced.
    CycleFailed {
        kind: String,
        consecutive_failures: u32,
    },

    VerificationDecided {
        failure_votes: u8,
        rounds: u8,
        confirmed: bool,
    },

    AlertDispatched { delivered: bool },

    /// A cooldown poll found the window still open.
    CooldownSuppressed,

    /// The consecutive-error budget forced a pause.
    BudgetPause { consecutive_failures: u32 },
}
