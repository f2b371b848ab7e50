//! AWS Secrets Manager integration.

use aws_sdk_secretsmanager::Client as SecretsClient;

use crate::{Error, Result};

/// Get a secret's string value from Secrets Manager.
///
/// Not cached: rotated credentials take effect on the next invocation.
pub async fn get_secret(client: &SecretsClient, secret_id: &str) -> Result<String> {
    let response = client
        .get_secret_value()
        .secret_id(secret_id)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret {}: {}", secret_id, e)))?;

    response
        .secret_string()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Aws(format!("Secret {} has no string value", secret_id)))
}
