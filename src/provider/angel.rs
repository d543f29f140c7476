//! SmartAPI REST client for candles, charges, order modification and scrip
//! search.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::AngelConfig;
use crate::error::{BrokerError, Result};
use crate::types::angel::{
    AngelEnvelope, CandleRequest, ChargeOrder, ChargesRequest, ModifiedOrder, ModifyOrderRequest,
    ScripMatch, SearchScripRequest,
};
use crate::types::Candle;

use super::http::{angel_headers, shared_client, status_to_error};

const CANDLE_PATH: &str = "/rest/secure/angelbroking/historical/v1/getCandleData";
const CHARGES_PATH: &str = "/rest/secure/angelbroking/brokerage/v1/estimateCharges";
const MODIFY_ORDER_PATH: &str = "/rest/secure/angelbroking/order/v1/modifyOrder";
const SEARCH_SCRIP_PATH: &str = "/rest/secure/angelbroking/order/v1/searchScrip";

/// Authenticated SmartAPI client.
///
/// # Example
/// ```no_run
/// use brokerlink::auth::providers::angel::AngelAuth;
/// use brokerlink::config::BrokerConfig;
/// use brokerlink::provider::angel::AngelClient;
///
/// # async fn example() -> brokerlink::error::Result<()> {
/// let config = BrokerConfig::from_env();
/// let session = AngelAuth::from_config(&config.angel)?.login().await?;
/// let client = AngelClient::from_config(&config.angel, session.jwt_token)?;
/// let hits = client.search_scrip("NSE", "SBIN").await?;
/// println!("{hits:?}");
/// # Ok(())
/// # }
/// ```
pub struct AngelClient {
    client: reqwest::Client,
    api_key: String,
    jwt: String,
    client_code: Option<String>,
    base_url: String,
}

impl AngelClient {
    pub fn new(api_key: impl Into<String>, jwt: impl Into<String>) -> Self {
        Self {
            client: shared_client().clone(),
            api_key: api_key.into(),
            jwt: jwt.into(),
            client_code: None,
            base_url: crate::config::DEFAULT_ANGEL_API_URL.to_string(),
        }
    }

    pub fn from_config(config: &AngelConfig, jwt: impl Into<String>) -> Result<Self> {
        let mut client = Self::new(config.require_api_key()?, jwt).with_base_url(config.api_url.clone());
        client.client_code = config.client_code.clone();
        Ok(client)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Send `X-ClientCode` on every request.
    pub fn with_client_code(mut self, code: impl Into<String>) -> Self {
        self.client_code = Some(code.into());
        self
    }

    /// POST and unwrap the envelope. `data` may legitimately be null, e.g.
    /// a search with no hits.
    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        debug!(%url, "smartapi POST");
        let resp = self
            .client
            .post(&url)
            .headers(angel_headers(
                &self.api_key,
                Some(&self.jwt),
                self.client_code.as_deref(),
            ))
            .json(body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        if !(200..300).contains(&status) {
            return Err(status_to_error(status, &text));
        }
        let envelope: AngelEnvelope<T> = serde_json::from_str(&text)?;
        unwrap_envelope(status, envelope)
    }

    async fn post_required<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.post(path, body)
            .await?
            .ok_or_else(|| BrokerError::InvalidState("success response without data".into()))
    }

    pub async fn candle_data(&self, request: &CandleRequest) -> Result<Vec<Candle>> {
        let rows: Option<Vec<Value>> = self.post(CANDLE_PATH, request).await?;
        Candle::from_rows(&rows.unwrap_or_default())
    }

    /// Brokerage and statutory charges for a basket of hypothetical orders.
    pub async fn estimate_charges(&self, orders: &[ChargeOrder]) -> Result<Value> {
        if orders.is_empty() {
            return Err(BrokerError::InvalidArgument("no orders to estimate".into()));
        }
        self.post_required(CHARGES_PATH, &ChargesRequest { orders }).await
    }

    pub async fn modify_order(&self, request: &ModifyOrderRequest) -> Result<ModifiedOrder> {
        self.post_required(MODIFY_ORDER_PATH, request).await
    }

    pub async fn search_scrip(&self, exchange: &str, query: &str) -> Result<Vec<ScripMatch>> {
        let request = SearchScripRequest {
            exchange: exchange.to_string(),
            searchscrip: query.to_string(),
        };
        let hits: Option<Vec<ScripMatch>> = self.post(SEARCH_SCRIP_PATH, &request).await?;
        Ok(hits.unwrap_or_default())
    }
}

fn unwrap_envelope<T>(status: u16, envelope: AngelEnvelope<T>) -> Result<Option<T>> {
    if !envelope.status {
        let message = envelope.message.unwrap_or_else(|| "request failed".into());
        return Err(match envelope.errorcode.filter(|code| !code.is_empty()) {
            Some(code) if code == "AG8001" => BrokerError::Authentication(message),
            Some(code) => BrokerError::api_with_code(status, message, code),
            None => BrokerError::api(status, message),
        });
    }
    Ok(envelope.data)
}
