//! Kite Connect login: browser URL, request-token capture, exchange, persist.
//!
//! Each step is a separate method so the CLI can interleave its own prompts
//! and Ctrl-C handling; nothing here reads the process environment.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use super::callback::{read_manual_token, CallbackListener, CallbackTarget, CaptureOutcome};
use super::error::AuthError;
use super::providers::kite::KiteAuth;
use super::store::{EnvFile, FileTokenStore, TokenStore};
use super::token::{AccessToken, KiteSession, RequestToken};
use crate::config::{KiteConfig, ACCESS_TOKEN_ENV_KEY};

/// Build the Kite Connect login URL for `api_key`. Pure; no network I/O.
///
/// ```
/// use brokerlink::auth::flow::build_login_url;
///
/// let url = build_login_url("https://kite.zerodha.com/connect/login", Some("abc")).unwrap();
/// assert_eq!(url.as_str(), "https://kite.zerodha.com/connect/login?v=3&api_key=abc");
/// ```
pub fn build_login_url(login_base: &str, api_key: Option<&str>) -> Result<Url, AuthError> {
    let api_key = api_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AuthError::Configuration("KITE_API_KEY missing in .env".into()))?;
    let mut url = Url::parse(login_base)
        .map_err(|err| AuthError::Configuration(format!("invalid login URL {login_base}: {err}")))?;
    url.query_pairs_mut()
        .append_pair("v", "3")
        .append_pair("api_key", api_key);
    Ok(url)
}

/// Where a fresh access token is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    pub token_file: PathBuf,
    /// Env file to upsert `KITE_ACCESS_TOKEN` into, if requested.
    pub env_file: Option<PathBuf>,
}

impl Destinations {
    pub fn from_config(config: &KiteConfig, write_env: bool) -> Self {
        Self {
            token_file: config.token_file.clone(),
            env_file: write_env.then(|| config.env_file.clone()),
        }
    }
}

/// What [`TokenExchangeFlow::persist`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub token_file: PathBuf,
    pub env_file: Option<PathBuf>,
}

/// The interactive Kite login sequence.
pub struct TokenExchangeFlow {
    config: KiteConfig,
    auth: KiteAuth,
}

impl TokenExchangeFlow {
    /// Requires both `KITE_API_KEY` and `KITE_API_SECRET`.
    pub fn new(config: KiteConfig) -> Result<Self, AuthError> {
        let auth = KiteAuth::from_config(&config)?;
        Ok(Self { config, auth })
    }

    pub fn config(&self) -> &KiteConfig {
        &self.config
    }

    pub fn login_url(&self) -> Result<Url, AuthError> {
        build_login_url(&self.config.login_url, self.config.api_key.as_deref())
    }

    /// Listener target for automatic capture, or `None` when the configured
    /// redirect URL is missing or not a loopback address.
    pub fn callback_target(&self, bind_host: &str, fallback_port: u16) -> Option<CallbackTarget> {
        let redirect = self.config.redirect_url.as_deref()?;
        let target = CallbackTarget::from_redirect(redirect, bind_host, fallback_port);
        if target.is_none() {
            info!(%redirect, "redirect URL is not a loopback address; using manual capture");
        }
        target
    }

    /// Bind a listener on `target` and wait up to `timeout` for the redirect.
    ///
    /// A bind failure is reported as [`CaptureOutcome::NotCaptured`] so the
    /// caller falls through to manual entry.
    pub async fn capture_automatic(
        &self,
        target: &CallbackTarget,
        timeout: Duration,
    ) -> Result<CaptureOutcome, AuthError> {
        let listener = match CallbackListener::bind(target) {
            Ok(listener) => listener,
            Err(err) => {
                warn!(error = %err, "callback listener unavailable");
                return Ok(CaptureOutcome::NotCaptured);
            }
        };
        listener.wait(timeout).await
    }

    /// Read a pasted token (or the whole redirect URL) from `input`.
    pub fn capture_manual(&self, input: &mut impl BufRead) -> Result<RequestToken, AuthError> {
        read_manual_token(input)
    }

    pub async fn exchange(&self, request_token: RequestToken) -> Result<KiteSession, AuthError> {
        self.auth.exchange(request_token).await
    }

    /// Write the token file and, if requested, upsert the env file.
    pub fn persist(
        &self,
        access_token: &AccessToken,
        destinations: &Destinations,
    ) -> Result<PersistReport, AuthError> {
        persist(access_token, destinations)
    }
}

/// Overwrite the token file with exactly the token and optionally upsert
/// `KITE_ACCESS_TOKEN` into an env file.
///
/// All or nothing: the env file is read and rendered before anything is
/// written, and the previous token file is put back if the env write fails.
pub fn persist(
    access_token: &AccessToken,
    destinations: &Destinations,
) -> Result<PersistReport, AuthError> {
    let pending_env = match &destinations.env_file {
        Some(env_path) => Some(
            EnvFile::new(env_path)
                .prepare_upsert(ACCESS_TOKEN_ENV_KEY, access_token.expose())
                .map_err(|err| persistence(env_path, err))?,
        ),
        None => None,
    };

    let store = FileTokenStore::new(&destinations.token_file);
    let previous = store
        .snapshot()
        .map_err(|err| persistence(&destinations.token_file, err))?;
    store
        .save(access_token)
        .map_err(|err| persistence(&destinations.token_file, err))?;
    info!(path = %destinations.token_file.display(), "access token saved");

    if let Some(pending) = pending_env {
        let env_path = pending.path().to_path_buf();
        if let Err(err) = pending.commit() {
            if let Err(rollback) = store.restore(previous) {
                warn!(error = %rollback, "could not restore the previous token file");
            }
            return Err(persistence(&env_path, err));
        }
        info!(path = %env_path.display(), key = ACCESS_TOKEN_ENV_KEY, "env file updated");
    }

    Ok(PersistReport {
        token_file: destinations.token_file.clone(),
        env_file: destinations.env_file.clone(),
    })
}

/// Where a reusable access token was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    File(PathBuf),
}

/// The access token for authenticated calls: `KITE_ACCESS_TOKEN` first, then
/// the token file.
pub fn stored_access_token(
    config: &KiteConfig,
) -> Result<Option<(AccessToken, TokenSource)>, AuthError> {
    if let Some(token) = config.access_token.as_deref() {
        return Ok(Some((AccessToken::new(token.trim()), TokenSource::Environment)));
    }
    let stored = FileTokenStore::new(&config.token_file).load()?;
    Ok(stored.map(|token| (token, TokenSource::File(config.token_file.clone()))))
}

/// Like [`stored_access_token`], but a missing token is an error.
pub fn require_access_token(config: &KiteConfig) -> Result<AccessToken, AuthError> {
    stored_access_token(config)?
        .map(|(token, _)| token)
        .ok_or_else(|| {
            AuthError::Configuration(
                "Missing access token. Run `brokerlink kite login` first.".into(),
            )
        })
}

fn persistence(path: &Path, err: AuthError) -> AuthError {
    match err {
        AuthError::Persistence { .. } => err,
        other => AuthError::Persistence {
            path: path.display().to_string(),
            message: other.to_string(),
        },
    }
}
