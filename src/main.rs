use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use printwatch::config::Config;
use printwatch::kernel::reactor::{CycleOutcome, Reactor, ReactorConfig};
use printwatch::kernel::resilience::backoff::RetryPolicy;
use printwatch::kernel::resilience::credentials::SessionCredentials;
use printwatch::kernel::resilience::{ResilientCapture, ResilientOracle};
use printwatch::kernel::scheduler::{CaptureScheduler, SeriesPlan};
use printwatch::kernel::telemetry::metrics::TelemetrySnapshot;
use printwatch::kernel::time::{Clock, Pacer, SystemClock};
use printwatch::kernel::trigger::{TriggerError, TriggerHandle};
use printwatch::kernel::verification::VerificationEngine;
use printwatch::services::camera::FfmpegFrameSource;
use printwatch::services::credentials::{AssumeRoleCredentialSource, StsRoleExchange};
use printwatch::services::notify::{DiscordAlertSink, LogStatusSink, MqttStatusSink, Notifier};
use printwatch::services::oracle::VisionOracle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Configuration faults are the only fatal errors.
    let config = Config::from_env().context("invalid configuration")?;

    let default_directive = if config.verbose_logging { "printwatch=debug" } else { "printwatch=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)))
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        region = %config.region,
        images_per_series = config.images_per_series,
        interval_secs = config.interval_between_images.as_secs(),
        test_mode = config.test_mode,
        "Print watcher booting"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cancel = CancellationToken::new();
    let pacer = Pacer::new(clock.clone(), cancel.clone());

    let reactor = build_reactor(&config, clock, cancel.clone())?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    let snapshot = if config.test_mode {
        run_manual(reactor, pacer).await
    } else {
        let mut reactor = reactor;
        reactor.run(&pacer).await;
        reactor.telemetry.snapshot()
    };

    tracing::info!(
        cycles = snapshot.cycle_stats.completed,
        cycle_errors = snapshot.cycle_stats.errors,
        verifications = snapshot.verification_stats.rounds,
        confirmed = snapshot.verification_stats.confirmed,
        alerts = snapshot.alert_stats.dispatched,
        budget_pauses = snapshot.budget_pauses,
        "Session summary"
    );

    Ok(())
}

fn build_reactor(config: &Config, clock: Arc<dyn Clock>, cancel: CancellationToken) -> anyhow::Result<Reactor> {
    let frames = Arc::new(FfmpegFrameSource::new(config.stream_url.clone()));
    let capture = ResilientCapture::new(frames, RetryPolicy::capture(), config.capture_timeout);
    let scheduler = CaptureScheduler::new(
        capture,
        SeriesPlan {
            images: config.images_per_series,
            interval: config.interval_between_images,
        },
    );

    let endpoint = config
        .oracle_endpoint
        .clone()
        .unwrap_or_else(|| VisionOracle::regional_endpoint(&config.region));
    let oracle = VisionOracle::new(&endpoint, config.region.clone(), config.model_id.clone())
        .context("failed to build oracle client")?;
    let source = AssumeRoleCredentialSource::new(
        config.credentials_dir.clone(),
        config.profile.clone(),
        config.role_arn.clone(),
        Arc::new(StsRoleExchange::new(config.region.clone())),
    );
    let credentials = Arc::new(SessionCredentials::new(Arc::new(source), clock));
    let oracle = ResilientOracle::new(Arc::new(oracle), credentials, RetryPolicy::throttling());

    let mut notifier = Notifier::new();
    match &config.discord_webhook_url {
        Some(url) => {
            let sink = DiscordAlertSink::new(url.clone()).context("failed to build Discord client")?;
            notifier = notifier.with_alert_sink(Arc::new(sink));
        }
        None => tracing::info!("Discord webhook URL not configured, alerts will only be logged"),
    }
    let mqtt = match (&config.mqtt_broker_url, &config.mqtt_topic) {
        (Some(url), Some(topic)) => match MqttStatusSink::connect(url, topic.clone(), cancel) {
            Ok(sink) => Some(sink),
            Err(e) => {
                tracing::error!(error = %e, "MQTT status sink unavailable, statuses will only be logged");
                None
            }
        },
        (None, None) => {
            tracing::info!("MQTT not configured, statuses will only be logged");
            None
        }
        _ => {
            tracing::warn!("MQTT_BROKER_URL and MQTT_TOPIC must both be set, statuses will only be logged");
            None
        }
    };
    notifier = match mqtt {
        Some(sink) => notifier.with_status_sink(Arc::new(sink)),
        None => notifier.with_status_sink(Arc::new(LogStatusSink)),
    };

    Ok(Reactor::new(
        scheduler,
        oracle,
        VerificationEngine::default(),
        notifier,
        ReactorConfig { analysis_interval: config.analysis_interval },
    ))
}

/// Manual-trigger mode: one cycle per stdin line, overlapping triggers rejected.
async fn run_manual(reactor: Reactor, pacer: Pacer) -> TelemetrySnapshot {
    tracing::info!("Running in test mode - press Enter to trigger a cycle");

    let handle = TriggerHandle::new(reactor, pacer.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = pacer.cancel_token().cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(_)) => {
                let handle = handle.clone();
                tokio::spawn(async move {
                    match handle.try_trigger().await {
                        Ok(CycleOutcome::Failed(err)) => tracing::warn!(error = %err, "Manual cycle failed"),
                        Ok(outcome) => tracing::info!(?outcome, "Manual cycle finished"),
                        Err(TriggerError::Busy) => tracing::warn!("Cycle already running, trigger ignored"),
                        Err(TriggerError::Interrupted) => {}
                    }
                });
            }
            Ok(None) => {
                // Stdin closed; keep serving until shutdown, like a detached container.
                pacer.cancel_token().cancelled().await;
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read trigger input");
                break;
            }
        }
    }

    handle.with_reactor(|reactor| reactor.telemetry.snapshot()).await
}
