//! Google service-account credentials and the providers that load them.

use std::fmt;

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;

use crate::secrets::get_secret;
use crate::{Error, Result};

/// Service-account key file, as downloaded from the Google Cloud console.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub auth_provider_x509_cert_url: Option<String>,
    #[serde(default)]
    pub client_x509_cert_url: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountCredentials {
    /// Parse a credential blob.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::Credentials(format!("Failed to parse credentials: {}", e)))
    }
}

impl fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("type", &self.account_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Source of service-account credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Load the credentials. Any failure is fatal for the current request.
    async fn load(&self) -> Result<ServiceAccountCredentials>;
}

/// Loads the credential blob from a fixed Secrets Manager secret.
pub struct SecretsManagerCredentialProvider {
    client: SecretsClient,
    secret_id: String,
}

impl SecretsManagerCredentialProvider {
    pub fn new(client: SecretsClient, secret_id: impl Into<String>) -> Self {
        Self {
            client,
            secret_id: secret_id.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for SecretsManagerCredentialProvider {
    async fn load(&self) -> Result<ServiceAccountCredentials> {
        let raw = get_secret(&self.client, &self.secret_id)
            .await
            .map_err(|e| Error::Credentials(e.to_string()))?;
        ServiceAccountCredentials::from_json(&raw)
    }
}
