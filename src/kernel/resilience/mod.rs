//! Retry, backoff and credential refresh around the external capabilities.
//!
//! Nothing here knows about decision states. Callers get either a result or
//! an error that already accounts for every local retry.

pub mod backoff;
pub mod budget;
pub mod credentials;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CaptureError, CycleError, OracleError, ResilienceError};
use crate::kernel::event::{ImageSeries, Judgment};
use crate::kernel::time::Pacer;
use crate::services::camera::FrameSource;
use crate::services::oracle::Oracle;

use backoff::RetryPolicy;
use credentials::SessionCredentials;

/// Oracle calls with throttling backoff and one reload-and-retry on credential expiry.
#[derive(Clone)]
pub struct ResilientOracle {
    oracle: Arc<dyn Oracle>,
    credentials: Arc<SessionCredentials>,
    policy: RetryPolicy,
}

impl ResilientOracle {
    pub fn new(oracle: Arc<dyn Oracle>, credentials: Arc<SessionCredentials>, policy: RetryPolicy) -> Self {
        Self { oracle, credentials, policy }
    }

    pub async fn judge(&self, series: Arc<ImageSeries>, pacer: &Pacer) -> Result<Judgment, ResilienceError> {
        let mut throttled: u32 = 0;
        let mut reloaded = false;

        loop {
            if pacer.is_cancelled() {
                return Err(ResilienceError::Interrupted);
            }

            let keys = self.credentials.keys().await?;
            match self.oracle.judge(series.clone(), &keys).await {
                Ok(judgment) => {
                    if throttled > 0 {
                        debug!(throttled, "Oracle call succeeded after throttling");
                    }
                    return Ok(judgment);
                }
                Err(OracleError::Throttled(reason)) => {
                    throttled += 1;
                    if throttled >= self.policy.max_attempts {
                        warn!(attempts = throttled, reason = %reason, "Oracle throttling budget exhausted");
                        return Err(ResilienceError::ThrottleExhausted { attempts: throttled });
                    }
                    let delay = self.policy.delay_for(throttled);
                    warn!(
                        attempt = throttled,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Oracle throttled, backing off"
                    );
                    pacer.wait(delay).await?;
                }
                Err(OracleError::CredentialsExpired(reason)) => {
                    if reloaded {
                        return Err(ResilienceError::CredentialsRejected(reason));
                    }
                    warn!(reason = %reason, "Oracle credentials expired, reloading");
                    self.credentials.refresh().await?;
                    reloaded = true;
                }
                Err(err @ OracleError::Permanent(_)) => return Err(ResilienceError::Oracle(err)),
            }
        }
    }
}

/// Frame grabs with a small local retry allowance for transient failures.
#[derive(Clone)]
pub struct ResilientCapture {
    source: Arc<dyn FrameSource>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl ResilientCapture {
    pub fn new(source: Arc<dyn FrameSource>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self { source, policy, timeout }
    }

    pub async fn grab(&self, pacer: &Pacer) -> Result<Vec<u8>, CycleError> {
        let mut attempt: u32 = 0;

        loop {
            if pacer.is_cancelled() {
                return Err(CycleError::Interrupted);
            }
            attempt += 1;

            match self.source.capture(self.timeout).await {
                Ok(frame) => return Ok(frame),
                Err(CaptureError::Transient(reason)) if attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Frame grab failed, retrying"
                    );
                    pacer.wait(delay).await?;
                }
                Err(err) => return Err(CycleError::Capture(err)),
            }
        }
    }
}
