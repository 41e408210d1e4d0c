//! Error taxonomy for the decision pipeline.
//!
//! External-call errors (`CaptureError`, `OracleError`) are classified at the
//! service boundary. The resilience layer turns them into `ResilienceError`,
//! and a cycle that cannot produce a judgment ends in `CycleError`.

use thiserror::Error;

/// Frame source failure for a single grab.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// Worth retrying: timeout, empty frame, stream hiccup.
    #[error("transient capture failure: {0}")]
    Transient(String),
    /// Not worth retrying: grabber missing, bad stream address.
    #[error("permanent capture failure: {0}")]
    Permanent(String),
}

impl CaptureError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::Transient(_))
    }
}

/// Inference oracle failure for a single call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle throttled: {0}")]
    Throttled(String),
    #[error("oracle credentials expired: {0}")]
    CredentialsExpired(String),
    /// Malformed response, unparseable judgment, rejected request.
    #[error("oracle failure: {0}")]
    Permanent(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
    #[error("credential bundle invalid: {0}")]
    Invalid(String),
}

/// What the resilience layer surfaces once its own retries are spent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResilienceError {
    #[error("throttled on all {attempts} attempts")]
    ThrottleExhausted { attempts: u32 },
    #[error("credentials rejected after reload: {0}")]
    CredentialsRejected(String),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("interrupted by shutdown")]
    Interrupted,
}

/// A cooperative wait was cut short by shutdown.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("interrupted by shutdown")]
pub struct Interrupted;

impl From<Interrupted> for ResilienceError {
    fn from(_: Interrupted) -> Self {
        ResilienceError::Interrupted
    }
}

/// Verification could not capture a single series.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("verification incomplete: no series could be captured")]
pub struct VerificationIncomplete;

/// A monitoring cycle that produced no judgment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CycleError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("judgment failed: {0}")]
    Judgment(ResilienceError),
    #[error("interrupted by shutdown")]
    Interrupted,
}

impl From<Interrupted> for CycleError {
    fn from(_: Interrupted) -> Self {
        CycleError::Interrupted
    }
}

impl From<ResilienceError> for CycleError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::Interrupted => CycleError::Interrupted,
            other => CycleError::Judgment(other),
        }
    }
}

impl CycleError {
    /// Short label used in logs and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Capture(CaptureError::Transient(_)) => "capture_transient",
            CycleError::Capture(CaptureError::Permanent(_)) => "capture_permanent",
            CycleError::Judgment(ResilienceError::ThrottleExhausted { .. }) => "throttle_exhausted",
            CycleError::Judgment(ResilienceError::CredentialsRejected(_))
            | CycleError::Judgment(ResilienceError::Credentials(_)) => "credentials",
            CycleError::Judgment(_) => "oracle",
            CycleError::Interrupted => "interrupted",
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("invalid MQTT broker address: {0}")]
    InvalidBroker(String),
    #[error("sink rejected message: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
