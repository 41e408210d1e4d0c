//! Runtime configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::kernel::reactor::DEFAULT_ANALYSIS_INTERVAL;
use crate::kernel::scheduler::{DEFAULT_IMAGES_PER_SERIES, DEFAULT_INTERVAL_BETWEEN_IMAGES};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub stream_url: String,
    pub model_id: String,
    pub role_arn: String,
    pub region: String,
    pub oracle_endpoint: Option<String>,
    pub profile: String,
    pub credentials_dir: PathBuf,
    pub images_per_series: usize,
    pub interval_between_images: Duration,
    pub analysis_interval: Duration,
    pub capture_timeout: Duration,
    pub discord_webhook_url: Option<String>,
    pub mqtt_broker_url: Option<String>,
    pub mqtt_topic: Option<String>,
    pub verbose_logging: bool,
    pub test_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            stream_url: required("RTSP_URL")?,
            model_id: required("INFERENCE_PROFILE_ARN")?,
            role_arn: required("AWS_ROLE_ARN")?,
            region: get("AWS_REGION").unwrap_or_else(|| "us-west-2".to_string()),
            oracle_endpoint: get("ORACLE_ENDPOINT"),
            profile: get("APP_AWS_PROFILE").unwrap_or_else(|| "default".to_string()),
            credentials_dir: get("CREDENTIALS_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/creds")),
            images_per_series: positive(&get, "IMAGES_PER_SERIES", DEFAULT_IMAGES_PER_SERIES as u64)? as usize,
            interval_between_images: Duration::from_secs(positive(
                &get,
                "INTERVAL_BETWEEN_IMAGES",
                DEFAULT_INTERVAL_BETWEEN_IMAGES.as_secs(),
            )?),
            analysis_interval: Duration::from_secs(positive(&get, "ANALYSIS_INTERVAL", DEFAULT_ANALYSIS_INTERVAL.as_secs())?),
            capture_timeout: Duration::from_secs(positive(&get, "CAPTURE_TIMEOUT", 15)?),
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            mqtt_broker_url: get("MQTT_BROKER_URL"),
            mqtt_topic: get("MQTT_TOPIC"),
            verbose_logging: flag(&get, "VERBOSE_LOGGING")?,
            test_mode: flag(&get, "TEST_MODE")?,
        })
    }
}

fn positive<G>(get: &G, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}

fn flag<G>(get: &G, key: &'static str) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) if v == "false" || v == "0" => Ok(false),
        Some(value) => Err(ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("RTSP_URL", "rtsp://printer.local/stream1"),
        ("INFERENCE_PROFILE_ARN", "us.amazon.nova-lite-v1:0"),
        ("AWS_ROLE_ARN", "arn:aws:iam::123456789012:role/inspector"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = config(&REQUIRED).unwrap();

        assert_eq!(cfg.images_per_series, 3);
        assert_eq!(cfg.interval_between_images, Duration::from_secs(10));
        assert_eq!(cfg.region, "us-west-2");
        assert_eq!(cfg.profile, "default");
        assert!(!cfg.test_mode);
        assert!(cfg.discord_webhook_url.is_none());
        assert!(cfg.mqtt_broker_url.is_none());
        assert_eq!(cfg.credentials_dir, PathBuf::from("/creds"));
    }

    #[test]
    fn mqtt_status_channel_is_read() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MQTT_BROKER_URL", "mqtt://broker.local:1884"));
        pairs.push(("MQTT_TOPIC", "printers/mk4/status"));
        let cfg = config(&pairs).unwrap();

        assert_eq!(cfg.mqtt_broker_url.as_deref(), Some("mqtt://broker.local:1884"));
        assert_eq!(cfg.mqtt_topic.as_deref(), Some("printers/mk4/status"));
    }

    #[test]
    fn missing_stream_is_fatal() {
        let err = config(&REQUIRED[1..]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("RTSP_URL"));
    }

    #[test]
    fn zero_series_size_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("IMAGES_PER_SERIES", "0"));
        assert!(matches!(config(&pairs), Err(ConfigError::Invalid { key: "IMAGES_PER_SERIES", .. })));
    }

    #[test]
    fn flags_parse_case_insensitively() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TEST_MODE", "TRUE"));
        pairs.push(("VERBOSE_LOGGING", "1"));
        let cfg = config(&pairs).unwrap();

        assert!(cfg.test_mode);
        assert!(cfg.verbose_logging);
    }
}
