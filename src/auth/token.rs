use std::fmt;

use serde::{Deserialize, Serialize};

/// API key and secret issued for a broker app.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"..")
            .finish()
    }
}

/// One-time token handed back by the broker after an interactive login.
///
/// Not `Clone`. [`exchange`](crate::auth::providers::kite::KiteAuth::exchange)
/// takes it by value, so each token is spent at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct RequestToken(String);

impl RequestToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Session credential for authenticated API calls. Valid until the broker's
/// daily session expiry; never parsed.
///
/// # Example
/// ```
/// use brokerlink::auth::AccessToken;
///
/// let token = AccessToken::new("abc123");
/// assert_eq!(token.expose(), "abc123");
/// assert_eq!(format!("{token:?}"), "AccessToken(..)");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token string, for headers and persistence.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// Result of a successful Kite token exchange.
#[derive(Debug, Clone)]
pub struct KiteSession {
    pub access_token: AccessToken,
    pub user_id: Option<String>,
    pub public_token: Option<String>,
}
