//! Error types for the calendar sync webhook.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while syncing an appointment.
#[derive(Error, Debug)]
pub enum Error {
    /// A required request field is missing
    #[error("{0}")]
    Input(String),

    /// A referenced document or external id does not exist
    #[error("{0}")]
    Lookup(String),

    /// Appointment or client data is not usable
    #[error("{0}")]
    Validation(String),

    /// A stored timestamp is not in the expected pattern
    #[error("{0}")]
    Format(String),

    /// Calendar API call failed (already normalized to a 4xx status)
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// Credential load or token exchange failed
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Document store error
    #[error("Document store error: {0}")]
    Store(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Input(_) | Error::Lookup(_) | Error::Validation(_) | Error::Format(_) => 400,
            Error::Remote { status, .. } => *status,
            _ => 500,
        }
    }

    /// Whether this is an anticipated failure reported back with its own message.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
