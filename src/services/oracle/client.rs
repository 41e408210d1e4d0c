use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

use super::prompt::request_body;
use super::signing::signed_headers;
use super::verdict::{parse_verdict, response_text};
use super::Oracle;
use crate::error::OracleError;
use crate::kernel::event::{ImageSeries, Judgment};
use crate::kernel::resilience::credentials::SessionKeys;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const JSON: &str = "application/json";

/// Vision model runtime reached over HTTPS with SigV4-signed requests.
#[derive(Clone)]
pub struct VisionOracle {
    client: Client,
    invoke_url: Url,
    region: String,
    model_id: String,
}

impl VisionOracle {
    pub fn new(endpoint: &str, region: impl Into<String>, model_id: impl Into<String>) -> Result<Self, OracleError> {
        let model_id = model_id.into();
        Ok(Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| OracleError::Permanent(format!("http client: {e}")))?,
            invoke_url: invoke_url(endpoint, &model_id)?,
            region: region.into(),
            model_id,
        })
    }

    /// Regional runtime endpoint.
    pub fn regional_endpoint(region: &str) -> String {
        format!("https://bedrock-runtime.{region}.amazonaws.com")
    }
}

/// `{endpoint}/model/{model_id}/invoke`, with the model id as one encoded path segment.
fn invoke_url(endpoint: &str, model_id: &str) -> Result<Url, OracleError> {
    let mut url = Url::parse(endpoint).map_err(|e| OracleError::Permanent(format!("invalid endpoint {endpoint}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| OracleError::Permanent(format!("endpoint cannot carry a path: {endpoint}")))?
        .pop_if_empty()
        .extend(["model", model_id, "invoke"]);
    Ok(url)
}

#[async_trait]
impl Oracle for VisionOracle {
    async fn judge(&self, series: Arc<ImageSeries>, keys: &SessionKeys) -> Result<Judgment, OracleError> {
        let body = serde_json::to_vec(&request_body(&series))
            .map_err(|e| OracleError::Permanent(format!("request encoding: {e}")))?;
        debug!(images = series.len(), model = %self.model_id, "Sending series for analysis");

        let headers = [("content-type", JSON), ("accept", JSON)];
        let signature = signed_headers(
            keys,
            &self.region,
            "POST",
            self.invoke_url.as_str(),
            &headers,
            &body,
            SystemTime::now(),
        )?;

        let mut request = self.client.post(self.invoke_url.clone()).body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        for (name, value) in signature {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(classify_transport)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OracleError::Throttled(format!("response body interrupted: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        let verdict = parse_verdict(&response_text(&text)?)?;
        debug!(print_failed = verdict.print_failed, confidence = verdict.confidence, "Received analysis");
        Ok(Judgment::new(verdict.print_failed, verdict.confidence, verdict.explanation, series))
    }
}

/// Map a non-success HTTP response onto the oracle error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> OracleError {
    let detail = format!("{status}: {}", body.trim());

    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::SERVICE_UNAVAILABLE
        || body.contains("ThrottlingException")
    {
        return OracleError::Throttled(detail);
    }

    let expired = body.contains("ExpiredToken") || body.to_ascii_lowercase().contains("expired");
    if status == StatusCode::UNAUTHORIZED || (status == StatusCode::FORBIDDEN && expired) {
        return OracleError::CredentialsExpired(detail);
    }

    OracleError::Permanent(detail)
}

/// Timeouts and connection failures are worth backing off on; anything else is not.
fn classify_transport(err: reqwest::Error) -> OracleError {
    if err.is_timeout() || err.is_connect() {
        OracleError::Throttled(format!("transport: {err}"))
    } else {
        OracleError::Permanent(format!("transport: {err}"))
    }
}
