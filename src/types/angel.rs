//! SmartAPI request and response types.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Response envelope wrapping every SmartAPI payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AngelEnvelope<T> {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errorcode: Option<String>,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AngelInterval {
    OneMinute,
    ThreeMinute,
    FiveMinute,
    TenMinute,
    FifteenMinute,
    ThirtyMinute,
    OneHour,
    OneDay,
}

/// Body of `getCandleData`. Dates are `YYYY-MM-DD HH:MM` in exchange time.
///
/// ```
/// use brokerlink::types::angel::{AngelInterval, CandleRequest};
///
/// let req = CandleRequest::builder()
///     .exchange("NSE")
///     .symboltoken("3045")
///     .interval(AngelInterval::FiveMinute)
///     .fromdate("2025-04-02 09:30")
///     .todate("2025-04-02 11:00")
///     .build();
/// assert_eq!(req.symboltoken, "3045");
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct CandleRequest {
    #[builder(into)]
    pub exchange: String,
    #[builder(into)]
    pub symboltoken: String,
    pub interval: AngelInterval,
    #[builder(into)]
    pub fromdate: String,
    #[builder(into)]
    pub todate: String,
}

/// One leg of a brokerage estimate. Quantities and prices travel as strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeOrder {
    pub product_type: String,
    pub transaction_type: String,
    pub quantity: String,
    pub price: String,
    pub exchange: String,
    pub symbol_name: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChargesRequest<'a> {
    pub orders: &'a [ChargeOrder],
}

/// Body of `modifyOrder`.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct ModifyOrderRequest {
    #[builder(into, default = String::from("NORMAL"))]
    pub variety: String,
    #[builder(into)]
    pub orderid: String,
    #[builder(into, default = String::from("LIMIT"))]
    pub ordertype: String,
    #[builder(into, default = String::from("INTRADAY"))]
    pub producttype: String,
    #[builder(into, default = String::from("DAY"))]
    pub duration: String,
    #[builder(into)]
    pub price: String,
    #[builder(into)]
    pub quantity: String,
    #[builder(into)]
    pub tradingsymbol: String,
    #[builder(into)]
    pub symboltoken: String,
    #[builder(into)]
    pub exchange: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModifiedOrder {
    pub orderid: String,
    #[serde(default)]
    pub uniqueorderid: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchScripRequest {
    pub exchange: String,
    pub searchscrip: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScripMatch {
    pub exchange: String,
    pub tradingsymbol: String,
    pub symboltoken: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn modify_order_defaults_match_broker_wire_format() {
        let req = ModifyOrderRequest::builder()
            .orderid("250402000297497")
            .price("699")
            .quantity("2")
            .tradingsymbol("SBIN-EQ")
            .symboltoken("3045")
            .exchange("NSE")
            .build();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "variety": "NORMAL",
                "orderid": "250402000297497",
                "ordertype": "LIMIT",
                "producttype": "INTRADAY",
                "duration": "DAY",
                "price": "699",
                "quantity": "2",
                "tradingsymbol": "SBIN-EQ",
                "symboltoken": "3045",
                "exchange": "NSE"
            })
        );
    }

    #[test]
    fn interval_uses_screaming_case() {
        assert_eq!(AngelInterval::FiveMinute.to_string(), "FIVE_MINUTE");
        assert_eq!(
            serde_json::to_value(AngelInterval::OneDay).unwrap(),
            json!("ONE_DAY")
        );
    }
}
