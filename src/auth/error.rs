use thiserror::Error;

use crate::error::BrokerError;

/// Errors raised by the login and token-exchange flows.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required credential or setting is absent.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The operator submitted an empty request token.
    #[error("No request_token provided or captured")]
    MissingToken,
    /// The callback listener saw no request token in time. Callers fall back
    /// to manual entry rather than failing.
    #[error("Timed out after {secs}s waiting for the login redirect")]
    CaptureTimeout { secs: u64 },
    /// Token exchange failed at the transport level or upstream rejected it.
    #[error("Token exchange failed{}: {body}", status_suffix(.status))]
    Exchange { status: Option<u16>, body: String },
    /// A success response did not carry the expected field.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// Writing the token file or env file failed.
    #[error("Failed to persist token to {path}: {message}")]
    Persistence { path: String, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<AuthError> for BrokerError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Configuration(message) => BrokerError::Configuration(message),
            AuthError::Exchange {
                status: Some(status),
                body,
            } => BrokerError::api(status, body),
            AuthError::CaptureTimeout { secs } => BrokerError::Timeout(secs * 1000),
            other => BrokerError::Authentication(other.to_string()),
        }
    }
}
