use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::AlertSink;
use crate::error::NotifyError;
use crate::kernel::event::AlertEvent;

const ALERT_COLOR: u32 = 0xFF0000;

/// Discord webhook: embed plus the representative frame as an attachment.
pub struct DiscordAlertSink {
    client: Client,
    webhook_url: String,
}

impl DiscordAlertSink {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            webhook_url: webhook_url.into(),
        })
    }
}

/// The `payload_json` part of the webhook message.
pub fn alert_payload(alert: &AlertEvent) -> Value {
    json!({
        "content": "⚠️ **CRITICAL: Print Failure Detected**",
        "embeds": [{
            "title": "⚠️ CRITICAL: Print Failure Detected",
            "description": format!("{}\n\nPlease verify in person or inspect the image above.", alert.explanation),
            "color": ALERT_COLOR,
            "timestamp": alert.timestamp.to_rfc3339(),
        }]
    })
}

#[async_trait]
impl AlertSink for DiscordAlertSink {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send_alert(&self, alert: &AlertEvent) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&alert_payload(alert))?;
        let file = Part::bytes(alert.representative_image.jpeg.to_vec())
            .file_name("analyzed_frame.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().text("payload_json", payload).part("file", file);

        let response = self.client.post(&self.webhook_url).multipart(form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{status}: {body}")));
        }
        Ok(())
    }
}
