//! Kite Connect REST client for quotes, instruments and historical candles.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::AccessToken;
use crate::config::KiteConfig;
use crate::error::{BrokerError, Result};
use crate::types::{Candle, Instrument, KiteInterval, Ltp};

use super::http::{kite_headers, shared_client, status_to_error};

#[derive(Debug, Deserialize)]
struct KiteEnvelope<T> {
    #[serde(default)]
    status: String,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandleData {
    #[serde(default)]
    candles: Vec<Value>,
}

/// Historical data query.
#[derive(Debug, Clone)]
pub struct HistoricalQuery {
    pub instrument_token: u32,
    pub interval: KiteInterval,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    /// Stitch expired futures contracts into one series.
    pub continuous: bool,
    /// Include open interest as a seventh column.
    pub oi: bool,
}

/// Authenticated Kite Connect client.
///
/// # Example
/// ```no_run
/// use brokerlink::auth::AccessToken;
/// use brokerlink::provider::kite::KiteClient;
///
/// # async fn example() -> brokerlink::error::Result<()> {
/// let kite = KiteClient::new("api_key", AccessToken::new("access_token"));
/// for (symbol, quote) in kite.ltp(&["NSE:INFY", "NSE:TCS"]).await? {
///     println!("{symbol} {}", quote.last_price);
/// }
/// # Ok(())
/// # }
/// ```
pub struct KiteClient {
    client: reqwest::Client,
    api_key: String,
    access_token: AccessToken,
    base_url: String,
}

impl KiteClient {
    pub fn new(api_key: impl Into<String>, access_token: AccessToken) -> Self {
        Self {
            client: shared_client().clone(),
            api_key: api_key.into(),
            access_token,
            base_url: crate::config::DEFAULT_KITE_API_URL.to_string(),
        }
    }

    pub fn from_config(config: &KiteConfig, access_token: AccessToken) -> Result<Self> {
        let api_key = config.require_api_key()?;
        Ok(Self::new(api_key, access_token).with_base_url(config.api_url.clone()))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = self.url(path);
        debug!(%url, "kite GET");
        let resp = self
            .client
            .get(&url)
            .headers(kite_headers(&self.api_key, self.access_token.expose()))
            .query(query)
            .send()
            .await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(envelope_error(status, &body));
        }
        Ok(resp)
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self.get(path, query).await?;
        let status = resp.status().as_u16();
        let envelope: KiteEnvelope<T> = resp.json().await?;
        unwrap_envelope(status, envelope)
    }

    /// Last traded price for each `EXCHANGE:TRADINGSYMBOL` key.
    pub async fn ltp(&self, instruments: &[&str]) -> Result<BTreeMap<String, Ltp>> {
        if instruments.is_empty() {
            return Err(BrokerError::InvalidArgument("no instruments given".into()));
        }
        let query: Vec<(&str, String)> =
            instruments.iter().map(|i| ("i", (*i).to_string())).collect();
        self.get_data("/quote/ltp", &query).await
    }

    /// Instrument master for one exchange.
    pub async fn instruments(&self, exchange: &str) -> Result<Vec<Instrument>> {
        let body = self
            .get(&format!("/instruments/{exchange}"), &[])
            .await?
            .text()
            .await?;
        Instrument::parse_csv(&body)
    }

    /// Resolve a trading symbol listed directly on `exchange`.
    pub async fn find_instrument(&self, exchange: &str, tradingsymbol: &str) -> Result<Instrument> {
        let instruments = self.instruments(exchange).await?;
        find_in(instruments, exchange, tradingsymbol)
    }

    pub async fn historical(&self, query: &HistoricalQuery) -> Result<Vec<Candle>> {
        let path = format!(
            "/instruments/historical/{}/{}",
            query.instrument_token, query.interval
        );
        let params = [
            ("from", query.from.format("%Y-%m-%d %H:%M:%S").to_string()),
            ("to", query.to.format("%Y-%m-%d %H:%M:%S").to_string()),
            ("continuous", u8::from(query.continuous).to_string()),
            ("oi", u8::from(query.oi).to_string()),
        ];
        let data: CandleData = self.get_data(&path, &params).await?;
        Candle::from_rows(&data.candles)
    }
}

/// Match on symbol and on `segment == exchange`, which excludes derivatives
/// segments that share a symbol.
pub fn find_in(
    instruments: Vec<Instrument>,
    exchange: &str,
    tradingsymbol: &str,
) -> Result<Instrument> {
    instruments
        .into_iter()
        .find(|i| i.tradingsymbol == tradingsymbol && i.segment == exchange)
        .ok_or_else(|| BrokerError::NotFound(format!("{exchange}:{tradingsymbol}")))
}

fn unwrap_envelope<T>(status: u16, envelope: KiteEnvelope<T>) -> Result<T> {
    if envelope.status != "success" {
        return Err(kite_error(
            status,
            envelope.message.unwrap_or_else(|| "request failed".into()),
            envelope.error_type,
        ));
    }
    envelope
        .data
        .ok_or_else(|| BrokerError::InvalidState("success response without data".into()))
}

/// Map an error body to a [`BrokerError`], preferring Kite's own
/// `error_type` over the HTTP status.
fn envelope_error(status: u16, body: &str) -> BrokerError {
    match serde_json::from_str::<KiteEnvelope<Value>>(body) {
        Ok(envelope) => kite_error(
            status,
            envelope.message.unwrap_or_else(|| body.to_string()),
            envelope.error_type,
        ),
        Err(_) => status_to_error(status, body),
    }
}

fn kite_error(status: u16, message: String, error_type: Option<String>) -> BrokerError {
    match error_type.as_deref() {
        Some("TokenException") => BrokerError::Authentication(message),
        _ if matches!(status, 401 | 403 | 429) => status_to_error(status, &message),
        Some(code) => BrokerError::api_with_code(status, message, code),
        None => BrokerError::api(status, message),
    }
}
