//! `brokerlink kite ...` handlers.

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::warn;

use super::{ExchangeArgs, HistoricalArgs, LoginArgs, LtpArgs, TickerArgs};
use crate::auth::callback::read_manual_token;
use crate::auth::providers::kite::KiteAuth;
use crate::auth::{
    require_access_token, stored_access_token, AuthError, Destinations,
    FileTokenStore, KiteSession, RequestToken, TokenExchangeFlow, TokenSource, TokenStore,
};
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::provider::{HistoricalQuery, KiteClient};
use crate::ticker::{KiteTicker, TickHandler, TickerOptions, TickerTransport};
use crate::types::Tick;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Handle `brokerlink kite login`.
pub async fn handle_login(config: &BrokerConfig, args: &LoginArgs) -> CliResult {
    let flow = TokenExchangeFlow::new(config.kite.clone())?;
    let login_url = flow.login_url()?;

    println!("🔗 Open this URL and log in:\n   {login_url}");
    if !args.no_browser {
        if let Err(err) = open::that(login_url.as_str()) {
            warn!(error = %err, "could not open a browser");
            println!("   (Could not open a browser; copy the URL above.)");
        }
    }

    let request_token = capture_request_token(&flow, args).await?;
    let session = interruptible(flow.exchange(request_token)).await?;
    save_session(&flow, &session, args.write_env)?;

    println!("\nNext steps:");
    println!("   brokerlink kite ltp NSE:INFY");
    println!("   brokerlink kite ticker INFY TCS");
    Ok(())
}

async fn capture_request_token(
    flow: &TokenExchangeFlow,
    args: &LoginArgs,
) -> Result<RequestToken, Box<dyn std::error::Error>> {
    match flow.callback_target(&args.host, args.port) {
        Some(target) => {
            println!(
                "⏳ Waiting for the redirect on {} (timeout {}s, Ctrl-C to abort)...",
                target.url(),
                args.timeout_secs
            );
            let timeout = Duration::from_secs(args.timeout_secs);
            let outcome = interruptible(flow.capture_automatic(&target, timeout)).await?;
            match outcome.into_result(timeout) {
                Ok(token) => {
                    println!("✅ Captured request_token");
                    return Ok(token);
                }
                Err(err) => println!("⚠️  {err}; falling back to manual entry."),
            }
        }
        None => {
            println!("After logging in, copy request_token from the redirect URL.");
        }
    }
    prompt_for_token().await
}

async fn prompt_for_token() -> Result<RequestToken, Box<dyn std::error::Error>> {
    print!("📋 Paste request_token (or the whole redirect URL): ");
    std::io::stdout().flush()?;
    let read = tokio::task::spawn_blocking(|| read_manual_token(&mut std::io::stdin().lock()));
    Ok(interruptible(read).await??)
}

/// Run `work` unless Ctrl-C arrives first.
async fn interruptible<T, E>(
    work: impl Future<Output = Result<T, E>>,
) -> Result<T, Box<dyn std::error::Error>>
where
    E: Into<Box<dyn std::error::Error>>,
{
    race_interrupt(work, tokio::signal::ctrl_c()).await
}

async fn race_interrupt<T, E, I>(
    work: impl Future<Output = Result<T, E>>,
    interrupt: impl Future<Output = I>,
) -> Result<T, Box<dyn std::error::Error>>
where
    E: Into<Box<dyn std::error::Error>>,
{
    tokio::select! {
        result = work => result.map_err(Into::into),
        _ = interrupt => Err("Interrupted".into()),
    }
}

fn save_session(flow: &TokenExchangeFlow, session: &KiteSession, write_env: bool) -> CliResult {
    let destinations = Destinations::from_config(flow.config(), write_env);
    let report = flow.persist(&session.access_token, &destinations)?;
    match &session.user_id {
        Some(user) => println!("✅ Logged in as {user}"),
        None => println!("✅ Access token issued"),
    }
    println!("   Token saved to {}", report.token_file.display());
    if let Some(env_file) = &report.env_file {
        println!("   KITE_ACCESS_TOKEN written to {}", env_file.display());
    }
    Ok(())
}

/// Handle `brokerlink kite exchange`.
pub async fn handle_exchange(config: &BrokerConfig, args: &ExchangeArgs) -> CliResult {
    let raw = args
        .request_token
        .as_deref()
        .or(config.kite.request_token.as_deref())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)?;
    let flow = TokenExchangeFlow::new(config.kite.clone())?;
    let session = flow.exchange(RequestToken::new(raw)).await?;
    save_session(&flow, &session, args.write_env)
}

/// Handle `brokerlink kite status`.
pub async fn handle_status(config: &BrokerConfig) -> CliResult {
    println!("🔐 Kite Connect status\n");
    let key = if config.kite.api_key.is_some() { "✅ set" } else { "❌ missing" };
    let secret = if config.kite.api_secret.is_some() { "✅ set" } else { "❌ missing" };
    println!("  KITE_API_KEY:    {key}");
    println!("  KITE_API_SECRET: {secret}");
    match &config.kite.redirect_url {
        Some(url) => println!("  Redirect URL:    {url}"),
        None => println!("  Redirect URL:    not set (manual capture)"),
    }
    match stored_access_token(&config.kite) {
        Ok(Some((_, TokenSource::Environment))) => {
            println!("  Access token:    ✅ from KITE_ACCESS_TOKEN")
        }
        Ok(Some((_, TokenSource::File(path)))) => {
            println!("  Access token:    ✅ from {}", path.display())
        }
        Ok(None) => println!("  Access token:    ❌ not logged in"),
        Err(e) => println!("  Access token:    ⚠️  {e}"),
    }
    Ok(())
}

/// Handle `brokerlink kite logout`.
pub async fn handle_logout(config: &BrokerConfig) -> CliResult {
    let store = FileTokenStore::new(&config.kite.token_file);
    let Some((token, _)) = stored_access_token(&config.kite)? else {
        println!("Not logged in.");
        return Ok(());
    };
    KiteAuth::from_config(&config.kite)?.invalidate(&token).await?;
    store.clear()?;
    println!("✅ Logged out; removed {}", store.path().display());
    if config.kite.access_token.is_some() {
        println!("   KITE_ACCESS_TOKEN is still set in the environment or .env.");
    }
    Ok(())
}

fn client(config: &BrokerConfig) -> Result<KiteClient, BrokerError> {
    let token = require_access_token(&config.kite)?;
    KiteClient::from_config(&config.kite, token)
}

/// Handle `brokerlink kite ltp`.
pub async fn handle_ltp(config: &BrokerConfig, args: &LtpArgs) -> CliResult {
    let kite = client(config)?;
    let instruments: Vec<&str> = args.instruments.iter().map(String::as_str).collect();
    for (symbol, quote) in kite.ltp(&instruments).await? {
        println!("{symbol} {}", quote.last_price);
    }
    Ok(())
}

/// Handle `brokerlink kite historical`.
pub async fn handle_historical(config: &BrokerConfig, args: &HistoricalArgs) -> CliResult {
    let kite = client(config)?;
    let instrument = kite.find_instrument(&args.exchange, &args.symbol).await?;

    let (from, to) = lookback_window(chrono::Local::now().naive_local(), args.days)?;
    let candles = kite
        .historical(&HistoricalQuery {
            instrument_token: instrument.instrument_token,
            interval: args.interval,
            from,
            to,
            continuous: args.continuous,
            oi: args.oi,
        })
        .await?;

    for candle in candles.iter().take(args.limit) {
        let oi = candle.oi.map(|oi| format!(" oi={oi}")).unwrap_or_default();
        println!(
            "{} o={} h={} l={} c={} v={}{oi}",
            candle.timestamp, candle.open, candle.high, candle.low, candle.close, candle.volume
        );
    }
    Ok(())
}

/// `[now - days, now]`, for a positive number of days that fits the calendar.
fn lookback_window(
    now: NaiveDateTime,
    days: i64,
) -> Result<(NaiveDateTime, NaiveDateTime), BrokerError> {
    if days < 1 {
        return Err(BrokerError::InvalidArgument(format!(
            "--days must be at least 1, got {days}"
        )));
    }
    TimeDelta::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .map(|from| (from, now))
        .ok_or_else(|| BrokerError::InvalidArgument(format!("--days {days} is out of range")))
}

struct PrintTicks;

impl TickHandler for PrintTicks {
    fn on_connect(&mut self) {
        println!("Connected. Subscribed.");
    }

    fn on_tick(&mut self, ticks: &[Tick]) {
        for tick in ticks {
            println!("Tick: {} {}", tick.instrument_token, tick.last_price);
        }
    }

    fn on_close(&mut self, code: Option<u16>, reason: &str) {
        println!("Closed: {} {reason}", code.map(|c| c.to_string()).unwrap_or_default());
    }

    fn on_error(&mut self, error: &BrokerError) {
        eprintln!("Error: {error}");
    }

    fn on_reconnect(&mut self, attempt: u32) {
        println!("Reconnecting... attempt {attempt}");
    }

    fn on_noreconnect(&mut self) {
        println!("Reconnection failed; stopping.");
    }
}

/// Handle `brokerlink kite ticker`.
pub async fn handle_ticker(config: &BrokerConfig, args: &TickerArgs) -> CliResult {
    let token = require_access_token(&config.kite)?;
    let kite = KiteClient::from_config(&config.kite, token.clone())?;

    let by_symbol: HashMap<String, u32> = kite
        .instruments(&args.exchange)
        .await?
        .into_iter()
        .map(|i| (i.tradingsymbol, i.instrument_token))
        .collect();
    let missing: Vec<&str> = args
        .symbols
        .iter()
        .filter(|s| !by_symbol.contains_key(s.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(BrokerError::NotFound(format!(
            "Symbols not found on {}: {}",
            args.exchange,
            missing.join(", ")
        ))
        .into());
    }
    let tokens = args.symbols.iter().filter_map(|s| by_symbol.get(s).copied()).collect();

    let ticker = KiteTicker::from_config(&config.kite, token)?;
    let options = TickerOptions {
        mode: args.mode,
        tokens,
        ..TickerOptions::default()
    };
    let mut handle = ticker.connect(options, Box::new(PrintTicks)).await?;

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        finished = handle.wait() => {
            finished?;
            false
        }
    };
    if interrupted {
        handle.close().await?;
    }
    Ok(())
}
