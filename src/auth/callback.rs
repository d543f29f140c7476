//! Loopback listener that catches the broker's login redirect.

use std::io::BufRead;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tiny_http::{Header, Request, Response, Server};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use super::error::AuthError;
use super::token::RequestToken;

pub const DEFAULT_CALLBACK_HOST: &str = "127.0.0.1";
pub const DEFAULT_CALLBACK_PORT: u16 = 8765;
pub const DEFAULT_CALLBACK_PATH: &str = "/callback";
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(200);

const CAPTURED_HTML: &str =
    "<h2>Request token received. You can close this tab and return to the terminal.</h2>";
const MISSING_HTML: &str = "<h3>No request_token found in the URL.</h3>";

/// Where the loopback listener binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl CallbackTarget {
    /// Derive a listener target from the app's redirect URL.
    ///
    /// Returns `None` unless the redirect is an http(s) URL on a loopback
    /// host; anything else needs manual capture. The listener binds to
    /// `bind_host`, on the redirect's port or `fallback_port` when it has none.
    pub fn from_redirect(redirect_url: &str, bind_host: &str, fallback_port: u16) -> Option<Self> {
        let parsed = Url::parse(redirect_url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        if !parsed.host_str().is_some_and(is_loopback_host) {
            return None;
        }
        let path = match parsed.path() {
            "" | "/" => DEFAULT_CALLBACK_PATH.to_string(),
            other => other.to_string(),
        };
        Some(Self {
            host: bind_host.to_string(),
            port: parsed.port().unwrap_or(fallback_port),
            path,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bracketed_host(), self.port)
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.bracketed_host(), self.port, self.path)
    }

    fn bracketed_host(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

/// `127.0.0.1`, `::1`, `localhost` or any other loopback IP literal.
pub fn is_loopback_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

/// Result of waiting on the callback listener.
#[derive(Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured(RequestToken),
    /// Nothing arrived in time. Not an error: the caller falls back to
    /// manual entry.
    NotCaptured,
}

impl CaptureOutcome {
    /// The captured token, or [`AuthError::CaptureTimeout`] for a wait of
    /// `timeout` that saw none. The timeout is recoverable; callers fall back
    /// to [`read_manual_token`].
    pub fn into_result(self, timeout: Duration) -> Result<RequestToken, AuthError> {
        match self {
            Self::Captured(token) => Ok(token),
            Self::NotCaptured => Err(AuthError::CaptureTimeout {
                secs: timeout.as_secs(),
            }),
        }
    }
}

/// A bound loopback HTTP listener waiting for one `request_token`.
///
/// Requests without the parameter get a 400 and the wait continues. The
/// first request carrying it gets a 200 and ends the wait.
pub struct CallbackListener {
    server: Arc<Server>,
    local_addr: SocketAddr,
}

impl CallbackListener {
    /// Bind `target`. Only loopback hosts are accepted.
    pub fn bind(target: &CallbackTarget) -> Result<Self, AuthError> {
        if !is_loopback_host(&target.host) {
            return Err(AuthError::Configuration(format!(
                "Callback listener must bind a loopback address, not {}",
                target.host
            )));
        }
        let addr = target.bind_addr();
        let server = Server::http(&addr).map_err(|err| {
            AuthError::Configuration(format!("Failed to start callback server on {addr}: {err}"))
        })?;
        let local_addr = server.server_addr().to_ip().ok_or_else(|| {
            AuthError::Configuration(format!("Callback server on {addr} has no IP address"))
        })?;
        info!(%local_addr, "callback listener bound");
        Ok(Self {
            server: Arc::new(server),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Block (asynchronously) until a request token arrives or `timeout`
    /// elapses. The listener is shut down before this returns, and also if
    /// the future is dropped early (e.g. on Ctrl-C).
    pub async fn wait(self, timeout: Duration) -> Result<CaptureOutcome, AuthError> {
        let (tx, rx) = oneshot::channel();
        let server = self.server.clone();
        let worker = std::thread::Builder::new()
            .name("callback-listener".into())
            .spawn(move || serve_until_captured(&server, tx))?;
        let _shutdown = ShutdownGuard {
            server: self.server.clone(),
        };

        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(token)) => CaptureOutcome::Captured(token),
            Ok(Err(_)) => {
                warn!("callback listener stopped before a request token arrived");
                CaptureOutcome::NotCaptured
            }
            Err(_) => {
                info!(secs = timeout.as_secs(), "no request token within timeout");
                CaptureOutcome::NotCaptured
            }
        };

        self.server.unblock();
        let _ = tokio::task::spawn_blocking(move || worker.join()).await;
        Ok(outcome)
    }
}

struct ShutdownGuard {
    server: Arc<Server>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

fn serve_until_captured(server: &Server, tx: oneshot::Sender<RequestToken>) {
    let mut slot = Some(tx);
    while let Some(sender) = slot.as_ref() {
        if sender.is_closed() {
            return;
        }
        let request = match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(err) => {
                warn!(error = %err, "callback listener receive failed");
                return;
            }
        };
        debug!(url = %request.url(), "callback request");
        match extract_request_token(request.url()) {
            Some(token) => {
                respond(request, 200, CAPTURED_HTML);
                if let Some(sender) = slot.take() {
                    let _ = sender.send(RequestToken::new(token));
                }
            }
            None => respond(request, 400, MISSING_HTML),
        }
    }
}

fn respond(request: Request, status: u16, body: &str) {
    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) = "Content-Type: text/html; charset=utf-8".parse::<Header>() {
        response = response.with_header(header);
    }
    if let Err(err) = request.respond(response) {
        debug!(error = %err, "failed to answer callback request");
    }
}

/// Pull a non-empty `request_token` out of a request target such as
/// `/callback?request_token=abc&status=success`.
pub fn extract_request_token(target: &str) -> Option<String> {
    let parsed = Url::parse(&format!("http://localhost{target}")).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "request_token")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Interpret operator input: either the bare token or the full redirect URL.
pub fn parse_pasted_token(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        if let Some((_, value)) = url.query_pairs().find(|(key, _)| key == "request_token") {
            let value = value.trim();
            return (!value.is_empty()).then(|| value.to_string());
        }
    }
    Some(trimmed.to_string())
}

/// Read one line of operator input as a request token.
pub fn read_manual_token(input: &mut impl BufRead) -> Result<RequestToken, AuthError> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    parse_pasted_token(&line)
        .map(RequestToken::new)
        .ok_or(AuthError::MissingToken)
}
