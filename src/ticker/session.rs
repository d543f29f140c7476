//! Kite ticker WebSocket session with a reconnecting supervisor.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{
    net::TcpStream,
    sync::watch,
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::CloseFrame, Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;

use super::codec::parse_frame;
use super::handler::TickHandler;
use crate::auth::AccessToken;
use crate::config::KiteConfig;
use crate::error::{BrokerError, Result};
use crate::types::TickMode;

type TickerSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for the reconnect backoff.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);
/// Kite sends a heartbeat every second; this much silence means the link is dead.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// What to subscribe to and how to recover from disconnects.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerOptions {
    pub mode: TickMode,
    pub tokens: Vec<u32>,
    pub reconnect: bool,
    /// Base delay before the first reconnect; doubles per attempt up to
    /// [`MAX_RECONNECT_DELAY`].
    pub reconnect_interval: Duration,
    pub reconnect_max_tries: u32,
}

impl Default for TickerOptions {
    fn default() -> Self {
        Self {
            mode: TickMode::Full,
            tokens: Vec::new(),
            reconnect: true,
            reconnect_interval: Duration::from_secs(5),
            reconnect_max_tries: 50,
        }
    }
}

/// Opens a tick stream. The connection is established (or refused) before
/// `connect` returns; later disconnects are reported to the handler.
#[async_trait]
pub trait TickerTransport: Send + Sync {
    async fn connect(
        &self,
        options: TickerOptions,
        handler: Box<dyn TickHandler>,
    ) -> Result<TickerHandle>;
}

/// A running tick stream. Dropping it stops the stream.
pub struct TickerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl TickerHandle {
    /// Close the socket and wait for the supervisor to exit.
    pub async fn close(mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.join().await
    }

    /// Wait until the stream ends on its own (reconnects exhausted or
    /// disabled).
    pub async fn wait(&mut self) -> Result<()> {
        self.join().await
    }

    async fn join(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|error| BrokerError::Stream(format!("ticker task failed: {error}")))?;
        }
        Ok(())
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.shutdown_tx.send(true);
            task.abort();
        }
    }
}

/// The Kite Connect WebSocket transport.
///
/// # Example
/// ```no_run
/// use brokerlink::auth::AccessToken;
/// use brokerlink::ticker::{KiteTicker, TickHandler, TickerOptions, TickerTransport};
/// use brokerlink::types::Tick;
///
/// struct Print;
/// impl TickHandler for Print {
///     fn on_tick(&mut self, ticks: &[Tick]) {
///         for t in ticks {
///             println!("{} {}", t.instrument_token, t.last_price);
///         }
///     }
/// }
///
/// # async fn example() -> brokerlink::error::Result<()> {
/// let ticker = KiteTicker::new("api_key", AccessToken::new("access_token"));
/// let options = TickerOptions { tokens: vec![408065], ..Default::default() };
/// let handle = ticker.connect(options, Box::new(Print)).await?;
/// handle.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct KiteTicker {
    api_key: String,
    access_token: AccessToken,
    ws_url: String,
}

impl KiteTicker {
    pub fn new(api_key: impl Into<String>, access_token: AccessToken) -> Self {
        Self {
            api_key: api_key.into(),
            access_token,
            ws_url: crate::config::DEFAULT_KITE_WS_URL.to_string(),
        }
    }

    pub fn from_config(config: &KiteConfig, access_token: AccessToken) -> Result<Self> {
        Ok(Self::new(config.require_api_key()?, access_token).with_ws_url(config.ws_url.clone()))
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    fn socket_url(&self) -> Result<Url> {
        build_socket_url(&self.ws_url, &self.api_key, self.access_token.expose())
    }
}

#[async_trait]
impl TickerTransport for KiteTicker {
    async fn connect(
        &self,
        options: TickerOptions,
        mut handler: Box<dyn TickHandler>,
    ) -> Result<TickerHandle> {
        if options.tokens.is_empty() {
            return Err(BrokerError::InvalidArgument("no instrument tokens to subscribe".into()));
        }
        let url = self.socket_url()?;
        let socket = open_subscribed(&url, &options).await?;
        handler.on_connect();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_supervisor_loop(socket, handler, shutdown_rx, url, options));
        Ok(TickerHandle {
            shutdown_tx,
            task: Some(task),
        })
    }
}

/// `<ws_url>/?api_key=..&access_token=..`
pub fn build_socket_url(ws_url: &str, api_key: &str, access_token: &str) -> Result<Url> {
    let mut url = Url::parse(ws_url)
        .map_err(|error| BrokerError::Configuration(format!("Invalid ticker URL: {error}")))?;
    url.query_pairs_mut()
        .append_pair("api_key", api_key)
        .append_pair("access_token", access_token);
    Ok(url)
}

/// Subscription messages sent after every (re)connect.
pub fn subscription_messages(options: &TickerOptions) -> [Value; 2] {
    [
        json!({ "a": "subscribe", "v": options.tokens }),
        json!({ "a": "mode", "v": [options.mode.to_string(), options.tokens] }),
    ]
}

async fn open_subscribed(url: &Url, options: &TickerOptions) -> Result<TickerSocket> {
    let (mut socket, _) = connect_async(url.as_str()).await.map_err(map_connect_error)?;
    for message in subscription_messages(options) {
        socket
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|error| BrokerError::Stream(format!("ticker subscribe failed: {error}")))?;
    }
    info!(tokens = options.tokens.len(), mode = %options.mode, "ticker subscribed");
    Ok(socket)
}

enum ConnectionOutcome {
    Shutdown,
    Disconnected { code: Option<u16>, reason: String },
}

async fn run_supervisor_loop(
    mut socket: TickerSocket,
    mut handler: Box<dyn TickHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
    url: Url,
    options: TickerOptions,
) {
    let mut attempt = 0u32;
    'session: loop {
        match run_active_connection(&mut socket, handler.as_mut(), &mut shutdown_rx).await {
            ConnectionOutcome::Shutdown => {
                handler.on_close(Some(1000), "closed by client");
                break;
            }
            ConnectionOutcome::Disconnected { code, reason } => {
                warn!(?code, %reason, "ticker disconnected");
                handler.on_close(code, &reason);
            }
        }
        if !options.reconnect {
            break;
        }

        loop {
            if attempt >= options.reconnect_max_tries {
                warn!(attempt, "ticker reconnect attempts exhausted");
                handler.on_noreconnect();
                break 'session;
            }
            attempt += 1;
            handler.on_reconnect(attempt);

            let delay = compute_backoff_delay(attempt, options.reconnect_interval, MAX_RECONNECT_DELAY);
            debug!(attempt, ?delay, "ticker reconnect scheduled");
            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        handler.on_close(Some(1000), "closed by client");
                        break 'session;
                    }
                }
            }

            match open_subscribed(&url, &options).await {
                Ok(reconnected) => {
                    socket = reconnected;
                    attempt = 0;
                    handler.on_connect();
                    continue 'session;
                }
                Err(error) => {
                    handler.on_error(&error);
                    if matches!(error, BrokerError::Authentication(_)) {
                        handler.on_noreconnect();
                        break 'session;
                    }
                }
            }
        }
    }
}

async fn run_active_connection(
    socket: &mut TickerSocket,
    handler: &mut dyn TickHandler,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> ConnectionOutcome {
    let idle = time::sleep(IDLE_TIMEOUT);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    let _ = socket.send(Message::Close(None)).await;
                    return ConnectionOutcome::Shutdown;
                }
            }
            _ = &mut idle => {
                return ConnectionOutcome::Disconnected {
                    code: None,
                    reason: format!("no data for {}s", IDLE_TIMEOUT.as_secs()),
                };
            }
            frame = socket.next() => {
                idle.as_mut().reset(Instant::now() + IDLE_TIMEOUT);
                match frame {
                    Some(Ok(Message::Binary(bytes))) => match parse_frame(&bytes) {
                        Ok(ticks) if !ticks.is_empty() => handler.on_tick(&ticks),
                        Ok(_) => {}
                        Err(error) => handler.on_error(&error),
                    },
                    Some(Ok(Message::Text(text))) => handle_text_message(&text, handler),
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = socket.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => return closed(frame),
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        let error = BrokerError::Stream(format!("ticker receive failed: {error}"));
                        handler.on_error(&error);
                        return ConnectionOutcome::Disconnected {
                            code: None,
                            reason: error.to_string(),
                        };
                    }
                    None => {
                        return ConnectionOutcome::Disconnected {
                            code: None,
                            reason: "stream ended".into(),
                        };
                    }
                }
            }
        }
    }
}

fn closed(frame: Option<CloseFrame<'_>>) -> ConnectionOutcome {
    match frame {
        Some(frame) => ConnectionOutcome::Disconnected {
            code: Some(u16::from(frame.code)),
            reason: frame.reason.to_string(),
        },
        None => ConnectionOutcome::Disconnected {
            code: None,
            reason: "closed by server".into(),
        },
    }
}

/// Text frames carry `{"type": "order"|"error"|"message", "data": ..}`.
fn handle_text_message(text: &str, handler: &mut dyn TickHandler) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        debug!(%text, "ignoring non-JSON ticker message");
        return;
    };
    match value.get("type").and_then(Value::as_str) {
        Some("order") => {
            if let Some(order) = value.get("data") {
                handler.on_order_update(order);
            }
        }
        Some("error") => {
            let message = value
                .get("data")
                .map(|data| data.as_str().map(str::to_string).unwrap_or_else(|| data.to_string()))
                .unwrap_or_default();
            handler.on_error(&BrokerError::Stream(message));
        }
        _ => debug!(%text, "ticker message"),
    }
}

fn compute_backoff_delay(attempt: u32, base: Duration, max_delay: Duration) -> Duration {
    let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1)) as f64;
    let scaled = base.as_secs_f64() * multiplier;
    Duration::from_secs_f64(scaled.min(max_delay.as_secs_f64()))
}

fn map_connect_error(error: WsError) -> BrokerError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            if matches!(status, 401 | 403) {
                BrokerError::Authentication(format!(
                    "Ticker handshake rejected with status {status}; the access token may have expired"
                ))
            } else {
                BrokerError::api(status, format!("Ticker handshake failed with status {status}"))
            }
        }
        WsError::Io(error) => BrokerError::Io(error),
        WsError::Url(error) => BrokerError::Configuration(format!("Invalid ticker URL: {error}")),
        other => BrokerError::Stream(format!("Ticker connect failed: {other}")),
    }
}
