use reqwest::StatusCode;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::auth::error::AuthError;
use crate::auth::token::{AccessToken, Credentials, KiteSession, RequestToken};
use crate::config::{KiteConfig, DEFAULT_KITE_API_URL};
use crate::provider::http::{shared_client, KITE_VERSION};

/// Kite Connect session API: request-token exchange and logout.
///
/// # Example
/// ```no_run
/// use brokerlink::auth::{Credentials, RequestToken};
/// use brokerlink::auth::providers::kite::KiteAuth;
///
/// # async fn example() -> Result<(), brokerlink::auth::AuthError> {
/// let auth = KiteAuth::new(Credentials::new("api_key", "api_secret"));
/// let session = auth.exchange(RequestToken::new("request_token")).await?;
/// println!("{:?}", session.user_id);
/// # Ok(())
/// # }
/// ```
pub struct KiteAuth {
    client: reqwest::Client,
    credentials: Credentials,
    api_url: String,
}

impl KiteAuth {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            client: shared_client().clone(),
            credentials,
            api_url: DEFAULT_KITE_API_URL.to_string(),
        }
    }

    pub fn from_config(config: &KiteConfig) -> Result<Self, AuthError> {
        Ok(Self::new(config.credentials()?).with_api_url(config.api_url.clone()))
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn session_url(&self) -> String {
        format!("{}/session/token", self.api_url.trim_end_matches('/'))
    }

    /// Spend a request token on an access token.
    ///
    /// Takes the token by value: a request token is valid for one exchange
    /// only, and the broker rejects a reused one with 403.
    pub async fn exchange(&self, request_token: RequestToken) -> Result<KiteSession, AuthError> {
        let checksum = checksum(
            &self.credentials.api_key,
            request_token.as_str(),
            &self.credentials.api_secret,
        );
        debug!(url = %self.session_url(), "exchanging request token");
        let resp = self
            .client
            .post(self.session_url())
            .header("X-Kite-Version", KITE_VERSION)
            .form(&[
                ("api_key", self.credentials.api_key.as_str()),
                ("request_token", request_token.as_str()),
                ("checksum", checksum.as_str()),
            ])
            .send()
            .await
            .map_err(|err| AuthError::Exchange {
                status: None,
                body: err.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|err| AuthError::Exchange {
            status: Some(status.as_u16()),
            body: err.to_string(),
        })?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "token exchange rejected");
            return Err(AuthError::Exchange {
                status: Some(status.as_u16()),
                body,
            });
        }

        let session = parse_session(&body)?;
        info!(user_id = ?session.user_id, "access token acquired");
        Ok(session)
    }

    /// Invalidate an access token server-side.
    pub async fn invalidate(&self, access_token: &AccessToken) -> Result<(), AuthError> {
        let resp = self
            .client
            .delete(self.session_url())
            .header("X-Kite-Version", KITE_VERSION)
            .query(&[
                ("api_key", self.credentials.api_key.as_str()),
                ("access_token", access_token.expose()),
            ])
            .send()
            .await?;
        let status = resp.status();
        // An already-expired session is as good as invalidated.
        if status.is_success() || status == StatusCode::FORBIDDEN {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AuthError::Exchange {
            status: Some(status.as_u16()),
            body,
        })
    }
}

/// `sha256(api_key + request_token + api_secret)` as lowercase hex.
pub fn checksum(api_key: &str, request_token: &str, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.update(request_token.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extract the session from a success body. The token may sit under `data`
/// or at the top level.
pub fn parse_session(body: &str) -> Result<KiteSession, AuthError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| AuthError::MalformedResponse(format!("invalid JSON: {err}")))?;
    let data = value.get("data").filter(|data| data.is_object());
    let field = |name: &str| -> Option<String> {
        data.and_then(|d| d.get(name))
            .or_else(|| value.get(name))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let access_token = field("access_token").ok_or_else(|| {
        AuthError::MalformedResponse("response has no access_token field".into())
    })?;
    Ok(KiteSession {
        access_token: AccessToken::new(access_token),
        user_id: field("user_id"),
        public_token: field("public_token"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_sha256_of_concatenation() {
        let expected = format!("{:x}", Sha256::digest(b"keytokensecret"));
        assert_eq!(checksum("key", "token", "secret"), expected);
        assert_eq!(checksum("key", "token", "secret").len(), 64);
    }

    #[test]
    fn parses_nested_access_token() {
        let session =
            parse_session(r#"{"status":"success","data":{"access_token":"XYZ","user_id":"AB1234"}}"#)
                .unwrap();
        assert_eq!(session.access_token.expose(), "XYZ");
        assert_eq!(session.user_id.as_deref(), Some("AB1234"));
    }

    #[test]
    fn parses_top_level_access_token() {
        let session = parse_session(r#"{"access_token":"XYZ"}"#).unwrap();
        assert_eq!(session.access_token.expose(), "XYZ");
    }

    #[test]
    fn missing_access_token_is_malformed() {
        assert!(matches!(
            parse_session(r#"{"status":"success","data":{"user_id":"AB1234"}}"#),
            Err(AuthError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_session(r#"{"data":{"access_token":""}}"#),
            Err(AuthError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_session("<html>"),
            Err(AuthError::MalformedResponse(_))
        ));
    }
}
