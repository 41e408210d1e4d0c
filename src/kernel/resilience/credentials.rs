use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::CredentialError;
use crate::kernel::time::{to_chrono, Clock};

/// Refresh this long before the advertised expiry.
pub const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Secret material. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Signing keys for one session: long-lived profile keys or an assumed role's temporary keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub access_key_id: String,
    pub secret_access_key: Secret,
    pub session_token: Option<Secret>,
}

impl SessionKeys {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>, session_token: Option<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: Secret::new(secret_access_key),
            session_token: session_token.map(Secret::new),
        }
    }
}

/// Time-bounded keys for one assumed-role session.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub keys: SessionKeys,
    pub expires_at: Option<DateTime<Utc>>,
    pub role: String,
}

/// Where credentials are re-read from. Each `fetch` repeats the role exchange.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self) -> Result<Credentials, CredentialError>;
}

/// Owns the current credentials and their validity window.
/// Callers only ask for currently valid keys.
pub struct SessionCredentials {
    source: Arc<dyn CredentialSource>,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<Credentials>>,
    refreshes: AtomicU64,
}

impl SessionCredentials {
    pub fn new(source: Arc<dyn CredentialSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            current: Mutex::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Keys that are valid now, loading or refreshing as needed.
    pub async fn keys(&self) -> Result<SessionKeys, CredentialError> {
        let mut current = self.current.lock().await;
        if let Some(creds) = current.as_ref() {
            if self.is_fresh(creds) {
                return Ok(creds.keys.clone());
            }
            debug!(role = %creds.role, "Credentials near expiry, reloading");
        }

        let creds = self.load().await?;
        let keys = creds.keys.clone();
        *current = Some(creds);
        Ok(keys)
    }

    /// Drop the cached bundle and reload it from the source.
    pub async fn refresh(&self) -> Result<(), CredentialError> {
        let mut current = self.current.lock().await;
        *current = None;
        let creds = self.load().await?;
        *current = Some(creds);
        Ok(())
    }

    /// Number of loads performed, including the first.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    fn is_fresh(&self, creds: &Credentials) -> bool {
        match creds.expires_at {
            Some(expires_at) => self.clock.now() + to_chrono(EXPIRY_SKEW) < expires_at,
            None => true,
        }
    }

    async fn load(&self) -> Result<Credentials, CredentialError> {
        let creds = self.source.fetch().await?;
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        info!(
            role = %creds.role,
            expires_at = ?creds.expires_at,
            "Assumed role session loaded"
        );
        Ok(creds)
    }
}
