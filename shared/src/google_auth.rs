//! OAuth2 access tokens for Google APIs from service-account credentials.
//!
//! Uses the JWT bearer grant: an RS256-signed assertion is exchanged at the
//! credentials' `token_uri` for a short-lived access token.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::info;

use crate::credentials::{CredentialProvider, ServiceAccountCredentials};
use crate::{Error, Result};

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Supplies bearer tokens to the Google REST clients.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token, for the Firestore emulator and tests.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Claims of the service-account assertion.
#[derive(Debug, Serialize, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(credentials: &ServiceAccountCredentials, scopes: &[&str], now: i64) -> Self {
        Self {
            iss: credentials.client_email.clone(),
            scope: scopes.join(" "),
            aud: credentials.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Sign the assertion for `credentials`.
pub fn sign_assertion(credentials: &ServiceAccountCredentials, claims: &AssertionClaims) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
        .map_err(|e| Error::Credentials(format!("Invalid private key: {}", e)))?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = credentials.private_key_id.clone();

    encode(&header, claims, &key)
        .map_err(|e| Error::Credentials(format!("Failed to sign assertion: {}", e)))
}

/// Lazily loads credentials and mints one token per instance.
///
/// Build one per invocation; the repository and calendar client share it so
/// the credential load and token exchange happen at most once per request.
pub struct ServiceAccountAuth {
    http_client: reqwest::Client,
    provider: Arc<dyn CredentialProvider>,
    scopes: Vec<&'static str>,
    token: OnceCell<String>,
}

impl ServiceAccountAuth {
    pub fn new(
        http_client: reqwest::Client,
        provider: Arc<dyn CredentialProvider>,
        scopes: Vec<&'static str>,
    ) -> Self {
        Self {
            http_client,
            provider,
            scopes,
            token: OnceCell::new(),
        }
    }

    async fn mint(&self) -> Result<String> {
        let credentials = self.provider.load().await?;
        let claims = AssertionClaims::new(&credentials, &self.scopes, Utc::now().timestamp());
        let assertion = sign_assertion(&credentials, &claims)?;

        let response = self
            .http_client
            .post(&credentials.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| Error::Credentials(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Credentials(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Credentials(format!("Failed to parse token response: {}", e)))?;

        info!("Minted access token for {}", credentials.client_email);
        Ok(token.access_token)
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String> {
        self.token.get_or_try_init(|| self.mint()).await.cloned()
    }
}
