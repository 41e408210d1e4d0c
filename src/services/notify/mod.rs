//! Outbound notification sinks. Delivery failures are logged and never
//! feed back into the decision pipeline.

pub mod discord;
pub mod mqtt;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::NotifyError;
use crate::kernel::event::{AlertEvent, StatusEvent};

pub use discord::DiscordAlertSink;
pub use mqtt::MqttStatusSink;

#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send_alert(&self, alert: &AlertEvent) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait StatusSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn publish(&self, status: &StatusEvent) -> Result<(), NotifyError>;
}

/// Writes every status event to the log.
#[derive(Debug, Default)]
pub struct LogStatusSink;

#[async_trait]
impl StatusSink for LogStatusSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, status: &StatusEvent) -> Result<(), NotifyError> {
        info!(
            timestamp = %status.timestamp,
            print_failed = status.print_failed,
            description = %status.description,
            "Print status"
        );
        Ok(())
    }
}

/// Fans events out to the configured sinks.
#[derive(Clone, Default)]
pub struct Notifier {
    alert_sinks: Vec<Arc<dyn AlertSink>>,
    status_sinks: Vec<Arc<dyn StatusSink>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sinks.push(sink);
        self
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status_sinks.push(sink);
        self
    }

    /// Returns true if at least one sink accepted the alert.
    pub async fn dispatch_alert(&self, alert: AlertEvent) -> bool {
        if self.alert_sinks.is_empty() {
            info!(timestamp = %alert.timestamp, "Print failure confirmed, no alert sink configured");
            return false;
        }

        let mut delivered = false;
        for sink in &self.alert_sinks {
            match sink.send_alert(&alert).await {
                Ok(()) => {
                    info!(sink = sink.name(), "Alert delivered");
                    delivered = true;
                }
                Err(e) => error!(sink = sink.name(), error = %e, "Failed to deliver alert"),
            }
        }
        delivered
    }

    pub async fn publish_status(&self, status: StatusEvent) {
        for sink in &self.status_sinks {
            if let Err(e) = sink.publish(&status).await {
                error!(sink = sink.name(), error = %e, "Failed to publish status");
            }
        }
    }
}
