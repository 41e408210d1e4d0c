use async_trait::async_trait;
use reqwest::Url;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::StatusSink;
use crate::error::NotifyError;
use crate::kernel::event::StatusEvent;

const DEFAULT_PORT: u16 = 1883;
const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const QUEUE_CAPACITY: usize = 10;

/// Publishes each status event as JSON `{timestamp, print_failed, description}` to one topic.
/// Publishing only enqueues; a background task owns the broker connection.
pub struct MqttStatusSink {
    client: AsyncClient,
    topic: String,
}

impl MqttStatusSink {
    /// Must be called inside a tokio runtime. The connection task stops on `cancel`.
    pub fn connect(broker_url: &str, topic: impl Into<String>, cancel: CancellationToken) -> Result<Self, NotifyError> {
        let (host, port) = broker_address(broker_url)?;
        let client_id = format!("printwatch-{}", uuid::Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, host.clone(), port);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, eventloop) = AsyncClient::new(options, QUEUE_CAPACITY);
        tokio::spawn(drive(eventloop, cancel));
        debug!(%host, port, "MQTT status sink started");

        Ok(Self {
            client,
            topic: topic.into(),
        })
    }
}

async fn drive(mut eventloop: EventLoop, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            event = eventloop.poll() => {
                if let Err(e) = event {
                    warn!(error = %e, "MQTT connection error, retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }
}

/// Host and port from `mqtt://host[:port]` or `tcp://host[:port]`.
pub fn broker_address(url: &str) -> Result<(String, u16), NotifyError> {
    let parsed = Url::parse(url).map_err(|e| NotifyError::InvalidBroker(format!("{url}: {e}")))?;
    if !matches!(parsed.scheme(), "mqtt" | "tcp") {
        return Err(NotifyError::InvalidBroker(format!("unsupported scheme in {url}")));
    }
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| NotifyError::InvalidBroker(format!("no host in {url}")))?;
    Ok((host.to_string(), parsed.port().unwrap_or(DEFAULT_PORT)))
}

pub fn status_payload(status: &StatusEvent) -> Result<Vec<u8>, NotifyError> {
    Ok(serde_json::to_vec(status)?)
}

#[async_trait]
impl StatusSink for MqttStatusSink {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn publish(&self, status: &StatusEvent) -> Result<(), NotifyError> {
        let payload = status_payload(status)?;
        self.client.try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)?;
        Ok(())
    }
}
