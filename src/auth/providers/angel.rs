use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::error::AuthError;
use crate::auth::totp::Totp;
use crate::config::{AngelConfig, AngelLogin};
use crate::provider::http::{angel_headers, shared_client};

const LOGIN_PATH: &str = "/rest/auth/angelbroking/user/v1/loginByPassword";

/// Tokens returned by a SmartAPI login.
#[derive(Clone)]
pub struct AngelSession {
    pub jwt_token: String,
    pub refresh_token: Option<String>,
    pub feed_token: Option<String>,
}

/// `data` of a login response. Older gateways send `accessToken` in place of
/// `jwtToken`, and some send both.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    #[serde(default)]
    jwt_token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    feed_token: Option<String>,
}

impl fmt::Debug for AngelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AngelSession")
            .field("jwt_token", &"..")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| ".."))
            .field("feed_token", &self.feed_token.as_ref().map(|_| ".."))
            .finish()
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    clientcode: &'a str,
    password: &'a str,
    totp: &'a str,
}

#[derive(Deserialize)]
struct LoginEnvelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errorcode: Option<String>,
    data: Option<serde_json::Value>,
}

/// SmartAPI password + TOTP login.
///
/// # Example
/// ```no_run
/// use brokerlink::auth::providers::angel::AngelAuth;
/// use brokerlink::config::BrokerConfig;
///
/// # async fn example() -> Result<(), brokerlink::auth::AuthError> {
/// let config = BrokerConfig::from_env();
/// let session = AngelAuth::from_config(&config.angel)?.login().await?;
/// # let _ = session;
/// # Ok(())
/// # }
/// ```
pub struct AngelAuth {
    client: reqwest::Client,
    login: AngelLogin,
    api_url: String,
}

impl AngelAuth {
    pub fn from_config(config: &AngelConfig) -> Result<Self, AuthError> {
        Ok(Self {
            client: shared_client().clone(),
            login: config.login_fields()?,
            api_url: config.api_url.clone(),
        })
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Log in with a TOTP generated from the configured secret.
    pub async fn login(&self) -> Result<AngelSession, AuthError> {
        let totp = Totp::from_base32(&self.login.totp_secret)?.now();
        self.login_with_totp(&totp).await
    }

    /// Log in with an explicit one-time code.
    pub async fn login_with_totp(&self, totp: &str) -> Result<AngelSession, AuthError> {
        let url = format!("{}{LOGIN_PATH}", self.api_url.trim_end_matches('/'));
        debug!(%url, client_code = %self.login.client_code, "smartapi login");
        let resp = self
            .client
            .post(&url)
            .headers(angel_headers(&self.login.api_key, None, None))
            .json(&LoginRequest {
                clientcode: &self.login.client_code,
                password: &self.login.password,
                totp,
            })
            .send()
            .await
            .map_err(|err| AuthError::Exchange {
                status: None,
                body: err.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AuthError::Exchange {
                status: Some(status.as_u16()),
                body,
            });
        }

        let session = parse_login(&body)?;
        info!(client_code = %self.login.client_code, "smartapi session established");
        Ok(session)
    }
}

/// Decode a login envelope. The JWT is `data.jwtToken`, or `data.accessToken`
/// on older gateways.
pub fn parse_login(body: &str) -> Result<AngelSession, AuthError> {
    let envelope: LoginEnvelope = serde_json::from_str(body)
        .map_err(|err| AuthError::MalformedResponse(format!("invalid JSON: {err}")))?;
    if !envelope.status {
        let message = envelope.message.unwrap_or_else(|| "login rejected".into());
        let code = envelope.errorcode.filter(|c| !c.is_empty());
        return Err(AuthError::Exchange {
            status: None,
            body: match code {
                Some(code) => format!("{message} ({code})"),
                None => message,
            },
        });
    }
    let data = envelope
        .data
        .filter(|data| data.is_object())
        .ok_or_else(|| AuthError::MalformedResponse(format!("no data in login response: {body}")))?;
    let data: LoginData = serde_json::from_value(data)?;
    let jwt_token = [data.jwt_token, data.access_token]
        .into_iter()
        .flatten()
        .find(|token| !token.trim().is_empty())
        .ok_or_else(|| {
            AuthError::MalformedResponse("Could not obtain JWT from SmartAPI response".into())
        })?;
    Ok(AngelSession {
        jwt_token,
        refresh_token: data.refresh_token,
        feed_token: data.feed_token,
    })
}
