#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use printwatch::error::{CaptureError, CredentialError, NotifyError, OracleError};
use printwatch::kernel::event::{AlertEvent, ImageSeries, Judgment, StatusEvent};
use printwatch::kernel::reactor::{Reactor, ReactorConfig};
use printwatch::kernel::resilience::backoff::{Jitter, RetryPolicy};
use printwatch::kernel::resilience::credentials::{CredentialSource, Credentials, SessionCredentials, SessionKeys};
use printwatch::kernel::resilience::{ResilientCapture, ResilientOracle};
use printwatch::kernel::scheduler::{CaptureScheduler, SeriesPlan};
use printwatch::kernel::time::{ManualClock, Pacer};
use printwatch::kernel::verification::VerificationEngine;
use printwatch::services::camera::FrameSource;
use printwatch::services::notify::{AlertSink, Notifier, StatusSink};
use printwatch::services::oracle::Oracle;

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap()
}

/// Frame source that plays back a script, then keeps returning a frame.
#[derive(Default)]
pub struct ScriptedFrameSource {
    script: Mutex<VecDeque<Result<Vec<u8>, CaptureError>>>,
    calls: AtomicUsize,
}

impl ScriptedFrameSource {
    pub fn push(&self, result: Result<Vec<u8>, CaptureError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn fail_permanently(&self, times: usize) {
        for _ in 0..times {
            self.push(Err(CaptureError::Permanent("stream unreachable".into())));
        }
    }

    pub fn succeed(&self, times: usize) {
        for _ in 0..times {
            self.push(Ok(frame()));
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn capture(&self, _timeout: Duration) -> Result<Vec<u8>, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| Ok(frame()))
    }
}

/// Frame source that blocks each grab until the test releases it.
pub struct GatedFrameSource {
    pub entered: Notify,
    pub release: Semaphore,
}

impl GatedFrameSource {
    pub fn new() -> Self {
        Self { entered: Notify::new(), release: Semaphore::new(0) }
    }
}

#[async_trait]
impl FrameSource for GatedFrameSource {
    async fn capture(&self, _timeout: Duration) -> Result<Vec<u8>, CaptureError> {
        self.entered.notify_one();
        self.release.acquire().await.unwrap().forget();
        Ok(frame())
    }
}

pub fn frame() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9]
}

#[derive(Debug, Clone)]
pub enum Reply {
    Clear,
    Failed(&'static str),
    Err(OracleError),
}

/// Oracle that answers from a script, then reports "no failure".
#[derive(Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Reply>>,
    access_keys: Mutex<Vec<String>>,
    series_sizes: Mutex<Vec<usize>>,
}

impl ScriptedOracle {
    pub fn push(&self, reply: Reply) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn push_all(&self, replies: impl IntoIterator<Item = Reply>) {
        for reply in replies {
            self.push(reply);
        }
    }

    /// Queue a verification outcome, one reply per re-check.
    pub fn push_votes(&self, votes: &[bool]) {
        for &failed in votes {
            self.push(if failed { Reply::Failed("spaghetti on the bed") } else { Reply::Clear });
        }
    }

    pub fn calls(&self) -> usize {
        self.access_keys.lock().unwrap().len()
    }

    /// Access key id each call was signed with.
    pub fn access_keys(&self) -> Vec<String> {
        self.access_keys.lock().unwrap().clone()
    }

    pub fn series_sizes(&self) -> Vec<usize> {
        self.series_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn judge(&self, series: Arc<ImageSeries>, keys: &SessionKeys) -> Result<Judgment, OracleError> {
        self.access_keys.lock().unwrap().push(keys.access_key_id.clone());
        self.series_sizes.lock().unwrap().push(series.len());

        match self.script.lock().unwrap().pop_front().unwrap_or(Reply::Clear) {
            Reply::Clear => Ok(Judgment::new(false, 0.9, "Print looks normal", series)),
            Reply::Failed(explanation) => Ok(Judgment::new(true, 0.85, explanation, series)),
            Reply::Err(err) => Err(err),
        }
    }
}

/// Hands out keys `key-1`, `key-2`, ... with no expiry.
#[derive(Default)]
pub struct StaticCredentialSource {
    fetches: AtomicUsize,
}

impl StaticCredentialSource {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn fetch(&self) -> Result<Credentials, CredentialError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Credentials {
            keys: SessionKeys::new(format!("key-{n}"), "secret", Some("session".to_string())),
            expires_at: None,
            role: "arn:aws:iam::123456789012:role/inspector".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<AlertEvent>>,
}

impl RecordingAlertSink {
    pub fn alerts(&self) -> Vec<AlertEvent> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_alert(&self, alert: &AlertEvent) -> Result<(), NotifyError> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Alert sink that always refuses delivery.
pub struct RefusingAlertSink;

#[async_trait]
impl AlertSink for RefusingAlertSink {
    fn name(&self) -> &'static str {
        "refusing"
    }

    async fn send_alert(&self, _alert: &AlertEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected("503 Service Unavailable".into()))
    }
}

#[derive(Default)]
pub struct RecordingStatusSink {
    statuses: Mutex<Vec<StatusEvent>>,
}

impl RecordingStatusSink {
    pub fn statuses(&self) -> Vec<StatusEvent> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusSink for RecordingStatusSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, status: &StatusEvent) -> Result<(), NotifyError> {
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }
}

/// A reactor wired to fakes on a virtual clock.
pub struct Harness {
    pub clock: ManualClock,
    pub cancel: CancellationToken,
    pub pacer: Pacer,
    pub frames: Arc<ScriptedFrameSource>,
    pub oracle: Arc<ScriptedOracle>,
    pub source: Arc<StaticCredentialSource>,
    pub credentials: Arc<SessionCredentials>,
    pub alerts: Arc<RecordingAlertSink>,
    pub statuses: Arc<RecordingStatusSink>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = ManualClock::new(epoch());
        let cancel = CancellationToken::new();
        let pacer = Pacer::new(Arc::new(clock.clone()), cancel.clone());
        let source = Arc::new(StaticCredentialSource::default());
        let credentials = Arc::new(SessionCredentials::new(source.clone(), Arc::new(clock.clone())));

        Self {
            clock,
            cancel,
            pacer,
            frames: Arc::new(ScriptedFrameSource::default()),
            oracle: Arc::new(ScriptedOracle::default()),
            source,
            credentials,
            alerts: Arc::new(RecordingAlertSink::default()),
            statuses: Arc::new(RecordingStatusSink::default()),
        }
    }

    pub fn reactor(&self) -> Reactor {
        self.reactor_with(self.frames.clone(), self.notifier())
    }

    pub fn reactor_with(&self, frames: Arc<dyn FrameSource>, notifier: Notifier) -> Reactor {
        let capture = ResilientCapture::new(frames, RetryPolicy::capture().with_jitter(Jitter::None), Duration::from_secs(15));
        let scheduler = CaptureScheduler::new(capture, SeriesPlan::default());
        let oracle = ResilientOracle::new(
            self.oracle.clone(),
            self.credentials.clone(),
            RetryPolicy::throttling().with_jitter(Jitter::None),
        );

        Reactor::new(scheduler, oracle, VerificationEngine::default(), notifier, ReactorConfig::default())
    }

    pub fn notifier(&self) -> Notifier {
        Notifier::new()
            .with_alert_sink(self.alerts.clone())
            .with_status_sink(self.statuses.clone())
    }
}
