use aws_credential_types::Credentials as AwsCredentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningParams, SigningSettings};
use aws_sigv4::sign::v4;
use std::time::SystemTime;

use crate::error::OracleError;
use crate::kernel::resilience::credentials::SessionKeys;

/// Signing name of the model runtime service.
pub const SIGNING_NAME: &str = "bedrock";

/// SigV4 headers to add to a request. `headers` must be sent exactly as signed.
pub fn signed_headers(
    keys: &SessionKeys,
    region: &str,
    method: &str,
    url: &str,
    headers: &[(&str, &str)],
    body: &[u8],
    time: SystemTime,
) -> Result<Vec<(String, String)>, OracleError> {
    let identity = AwsCredentials::new(
        keys.access_key_id.clone(),
        keys.secret_access_key.expose().to_string(),
        keys.session_token.as_ref().map(|token| token.expose().to_string()),
        None,
        "printwatch-session",
    )
    .into();

    let params: SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name(SIGNING_NAME)
        .time(time)
        .settings(SigningSettings::default())
        .build()
        .map_err(|e| OracleError::Permanent(format!("signing parameters: {e}")))?
        .into();

    let signable = SignableRequest::new(method, url, headers.iter().copied(), SignableBody::Bytes(body))
        .map_err(|e| OracleError::Permanent(format!("unsignable request: {e}")))?;

    let (instructions, _signature) = sign(signable, &params)
        .map_err(|e| OracleError::Permanent(format!("request signing failed: {e}")))?
        .into_parts();

    Ok(instructions
        .headers()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}
