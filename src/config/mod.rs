//! Runtime configuration, resolved once at startup from the environment.
//!
//! [`BrokerConfig::from_env`] loads `.env` (if present) and reads every
//! setting the clients need. The resulting value is passed explicitly to the
//! flows and clients; nothing reads the process environment after startup.

use std::fmt;
use std::path::PathBuf;

use crate::auth::{AuthError, Credentials};

pub const DEFAULT_KITE_API_URL: &str = "https://api.kite.trade";
pub const DEFAULT_KITE_LOGIN_URL: &str = "https://kite.zerodha.com/connect/login";
pub const DEFAULT_KITE_WS_URL: &str = "wss://ws.kite.trade";
pub const DEFAULT_ANGEL_API_URL: &str = "https://apiconnect.angelone.in";

/// File holding the bare Kite access token between runs.
pub const DEFAULT_TOKEN_FILE: &str = ".kite_access_token";
pub const DEFAULT_ENV_FILE: &str = ".env";
/// Key upserted into the env file after a successful login.
pub const ACCESS_TOKEN_ENV_KEY: &str = "KITE_ACCESS_TOKEN";

/// Kite Connect settings.
#[derive(Clone)]
pub struct KiteConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Redirect URL registered for the app. A loopback URL enables automatic
    /// request-token capture.
    pub redirect_url: Option<String>,
    /// Pre-existing access token, allowing reuse without a new login.
    pub access_token: Option<String>,
    /// Request token for the non-interactive exchange command.
    pub request_token: Option<String>,
    pub api_url: String,
    pub login_url: String,
    pub ws_url: String,
    pub token_file: PathBuf,
    pub env_file: PathBuf,
}

impl Default for KiteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            redirect_url: None,
            access_token: None,
            request_token: None,
            api_url: DEFAULT_KITE_API_URL.to_string(),
            login_url: DEFAULT_KITE_LOGIN_URL.to_string(),
            ws_url: DEFAULT_KITE_WS_URL.to_string(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
        }
    }
}

impl fmt::Debug for KiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KiteConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| ".."))
            .field("redirect_url", &self.redirect_url)
            .field("access_token", &self.access_token.as_ref().map(|_| ".."))
            .field("request_token", &self.request_token.as_ref().map(|_| ".."))
            .field("api_url", &self.api_url)
            .field("login_url", &self.login_url)
            .field("ws_url", &self.ws_url)
            .field("token_file", &self.token_file)
            .field("env_file", &self.env_file)
            .finish()
    }
}

impl KiteConfig {
    pub fn require_api_key(&self) -> Result<&str, AuthError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AuthError::Configuration("KITE_API_KEY missing in .env".into()))
    }

    /// API key and secret, both required for the token exchange.
    pub fn credentials(&self) -> Result<Credentials, AuthError> {
        let api_key = self.require_api_key()?;
        let api_secret = self
            .api_secret
            .as_deref()
            .ok_or_else(|| AuthError::Configuration("KITE_API_SECRET missing in .env".into()))?;
        Ok(Credentials::new(api_key, api_secret))
    }
}

/// Angel One SmartAPI settings.
#[derive(Clone)]
pub struct AngelConfig {
    pub api_key: Option<String>,
    pub client_code: Option<String>,
    pub password: Option<String>,
    /// Base32 TOTP secret from the SmartAPI TOTP enrolment.
    pub totp_secret: Option<String>,
    pub api_url: String,
}

impl Default for AngelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            client_code: None,
            password: None,
            totp_secret: None,
            api_url: DEFAULT_ANGEL_API_URL.to_string(),
        }
    }
}

impl fmt::Debug for AngelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AngelConfig")
            .field("api_key", &self.api_key)
            .field("client_code", &self.client_code)
            .field("password", &self.password.as_ref().map(|_| ".."))
            .field("totp_secret", &self.totp_secret.as_ref().map(|_| ".."))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Login fields validated as present.
#[derive(Clone)]
pub struct AngelLogin {
    pub api_key: String,
    pub client_code: String,
    pub password: String,
    pub totp_secret: String,
}

impl AngelConfig {
    /// All four login fields, or a configuration error naming every missing key.
    pub fn login_fields(&self) -> Result<AngelLogin, AuthError> {
        let fields = [
            ("ANGEL_API_KEY", &self.api_key),
            ("ANGEL_CLIENT_CODE", &self.client_code),
            ("ANGEL_PASSWORD", &self.password),
            ("ANGEL_TOTP_SECRET", &self.totp_secret),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(AuthError::Configuration(format!(
                "Missing env vars: {}",
                missing.join(", ")
            )));
        }
        Ok(AngelLogin {
            api_key: self.api_key.clone().unwrap_or_default(),
            client_code: self.client_code.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
            totp_secret: self.totp_secret.clone().unwrap_or_default(),
        })
    }

    pub fn require_api_key(&self) -> Result<&str, AuthError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AuthError::Configuration("ANGEL_API_KEY not set in .env".into()))
    }
}

/// Configuration for both brokers.
#[derive(Debug, Clone, Default)]
pub struct BrokerConfig {
    pub kite: KiteConfig,
    pub angel: AngelConfig,
}

impl BrokerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // missing .env is fine
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut kite = KiteConfig {
            api_key: get("KITE_API_KEY"),
            api_secret: get("KITE_API_SECRET"),
            redirect_url: get("KITE_REDIRECT_URL"),
            access_token: get("KITE_ACCESS_TOKEN"),
            request_token: get("KITE_REQUEST_TOKEN"),
            ..KiteConfig::default()
        };
        if let Some(url) = get("KITE_API_URL") {
            kite.api_url = url;
        }
        if let Some(url) = get("KITE_LOGIN_URL") {
            kite.login_url = url;
        }
        if let Some(url) = get("KITE_WS_URL") {
            kite.ws_url = url;
        }

        let mut angel = AngelConfig {
            api_key: get("ANGEL_API_KEY"),
            client_code: get("ANGEL_CLIENT_CODE"),
            password: get("ANGEL_PASSWORD"),
            totp_secret: get("ANGEL_TOTP_SECRET"),
            ..AngelConfig::default()
        };
        if let Some(url) = get("ANGEL_API_URL") {
            angel.api_url = url;
        }

        Self { kite, angel }
    }
}
