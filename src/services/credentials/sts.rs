use async_trait::async_trait;
use aws_sdk_sts::config::{BehaviorVersion, Credentials as StsKeys, Region};
use aws_sdk_sts::error::SdkError;
use aws_sdk_sts::Client;
use chrono::{DateTime, Utc};

use super::RoleExchange;
use crate::error::CredentialError;
use crate::kernel::resilience::credentials::{Credentials, SessionKeys};

/// Role exchange against the security token service.
pub struct StsRoleExchange {
    region: String,
}

impl StsRoleExchange {
    pub fn new(region: impl Into<String>) -> Self {
        Self { region: region.into() }
    }

    fn client(&self, base: &SessionKeys) -> Client {
        let keys = StsKeys::new(
            base.access_key_id.clone(),
            base.secret_access_key.expose().to_string(),
            base.session_token.as_ref().map(|token| token.expose().to_string()),
            None,
            "printwatch-profile",
        );
        let config = aws_sdk_sts::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(keys)
            .build();
        Client::from_conf(config)
    }
}

#[async_trait]
impl RoleExchange for StsRoleExchange {
    async fn assume_role(&self, base: &SessionKeys, role: &str, session_name: &str) -> Result<Credentials, CredentialError> {
        let output = self
            .client(base)
            .assume_role()
            .role_arn(role)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(service) => CredentialError::Invalid(format!("assume role refused: {}", service.err())),
                other => CredentialError::Unavailable(format!("assume role: {other}")),
            })?;

        let issued = output
            .credentials()
            .ok_or_else(|| CredentialError::Invalid("assume role returned no credentials".into()))?;

        Ok(Credentials {
            keys: SessionKeys::new(
                issued.access_key_id(),
                issued.secret_access_key(),
                Some(issued.session_token().to_string()),
            ),
            expires_at: DateTime::<Utc>::from_timestamp(issued.expiration().secs(), 0),
            role: role.to_string(),
        })
    }
}
