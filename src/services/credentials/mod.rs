//! Credential store and role exchange.
//!
//! Each fetch re-reads the mounted credentials file and exchanges the profile's
//! keys for a fresh assumed-role session.

pub mod sts;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::CredentialError;
use crate::kernel::resilience::credentials::{CredentialSource, Credentials, SessionKeys};

pub use sts::StsRoleExchange;

/// Session name presented to the role exchange.
pub const ROLE_SESSION_NAME: &str = "BedrockSession";

/// File name of the credentials store inside the mounted directory.
pub const CREDENTIALS_FILE: &str = "credentials";

/// Trades base keys for a role's temporary session.
#[async_trait]
pub trait RoleExchange: Send + Sync {
    async fn assume_role(&self, base: &SessionKeys, role: &str, session_name: &str) -> Result<Credentials, CredentialError>;
}

/// Extract one profile's keys from an INI-style credentials file.
/// All three of access key, secret key and session token are required.
pub fn parse_profile(contents: &str, profile: &str) -> Result<SessionKeys, CredentialError> {
    let mut in_profile = false;
    let mut seen = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;
    let mut session_token = None;

    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = name.trim() == profile;
            seen |= in_profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            match key.trim() {
                "aws_access_key_id" => access_key_id = value,
                "aws_secret_access_key" => secret_access_key = value,
                "aws_session_token" => session_token = value,
                _ => {}
            }
        }
    }

    if !seen {
        return Err(CredentialError::Invalid(format!("no profile '{profile}' in credentials file")));
    }
    match (access_key_id, secret_access_key, session_token) {
        (Some(id), Some(secret), Some(token)) => Ok(SessionKeys::new(id, secret, Some(token))),
        _ => Err(CredentialError::Invalid(format!(
            "profile '{profile}' is missing aws_access_key_id, aws_secret_access_key or aws_session_token"
        ))),
    }
}

/// Re-reads `<dir>/credentials` on every fetch and assumes the configured role with those keys.
pub struct AssumeRoleCredentialSource {
    dir: PathBuf,
    profile: String,
    role: String,
    exchange: Arc<dyn RoleExchange>,
}

impl AssumeRoleCredentialSource {
    pub fn new(
        dir: impl Into<PathBuf>,
        profile: impl Into<String>,
        role: impl Into<String>,
        exchange: Arc<dyn RoleExchange>,
    ) -> Self {
        Self {
            dir: dir.into(),
            profile: profile.into(),
            role: role.into(),
            exchange,
        }
    }

    async fn base_keys(&self) -> Result<SessionKeys, CredentialError> {
        let path = self.dir.join(CREDENTIALS_FILE);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CredentialError::Unavailable(format!("{}: {e}", path.display())))?;
        parse_profile(&contents, &self.profile)
    }
}

#[async_trait]
impl CredentialSource for AssumeRoleCredentialSource {
    async fn fetch(&self) -> Result<Credentials, CredentialError> {
        let base = self.base_keys().await?;
        debug!(profile = %self.profile, role = %self.role, "Assuming role");
        self.exchange.assume_role(&base, &self.role, ROLE_SESSION_NAME).await
    }
}
