//! `brokerlink angel ...` handlers.

use std::path::Path;

use serde::Deserialize;

use super::{BrokerageArgs, CandlesArgs, ModifyOrderArgs, SearchArgs};
use crate::auth::providers::angel::AngelAuth;
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::provider::AngelClient;
use crate::types::angel::{CandleRequest, ChargeOrder, ModifyOrderRequest};

type CliResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Log in and build a client carrying the fresh JWT.
async fn client(config: &BrokerConfig) -> Result<AngelClient> {
    let session = AngelAuth::from_config(&config.angel)?.login().await?;
    AngelClient::from_config(&config.angel, session.jwt_token)
}

/// Handle `brokerlink angel login`.
pub async fn handle_login(config: &BrokerConfig) -> CliResult {
    let session = AngelAuth::from_config(&config.angel)?.login().await?;
    println!("✅ SmartAPI login successful");
    println!("{}", session.jwt_token);
    Ok(())
}

/// Handle `brokerlink angel candles`.
pub async fn handle_candles(config: &BrokerConfig, args: &CandlesArgs) -> CliResult {
    let request = CandleRequest::builder()
        .exchange(args.exchange.as_str())
        .symboltoken(args.symbol_token.as_str())
        .interval(args.interval)
        .fromdate(args.from.as_str())
        .todate(args.to.as_str())
        .build();
    let candles = client(config).await?.candle_data(&request).await?;
    if candles.is_empty() {
        println!("No candles in range.");
    }
    for c in &candles {
        println!(
            "{} o={} h={} l={} c={} v={}",
            c.timestamp, c.open, c.high, c.low, c.close, c.volume
        );
    }
    Ok(())
}

/// Handle `brokerlink angel brokerage`.
pub async fn handle_brokerage(config: &BrokerConfig, args: &BrokerageArgs) -> CliResult {
    let orders = load_orders(&args.orders)?;
    let estimate = client(config).await?.estimate_charges(&orders).await?;
    println!("{}", serde_json::to_string_pretty(&estimate)?);
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OrdersFile {
    Wrapped { orders: Vec<ChargeOrder> },
    List(Vec<ChargeOrder>),
}

fn load_orders(path: &Path) -> Result<Vec<ChargeOrder>> {
    let raw = std::fs::read_to_string(path)?;
    let orders = match serde_json::from_str::<OrdersFile>(&raw) {
        Ok(OrdersFile::Wrapped { orders } | OrdersFile::List(orders)) => orders,
        Err(err) => {
            return Err(BrokerError::InvalidArgument(format!(
                "{} is not a list of orders: {err}",
                path.display()
            )))
        }
    };
    if orders.is_empty() {
        return Err(BrokerError::InvalidArgument(format!(
            "{} contains no orders",
            path.display()
        )));
    }
    Ok(orders)
}

/// Handle `brokerlink angel modify-order`.
pub async fn handle_modify_order(config: &BrokerConfig, args: &ModifyOrderArgs) -> CliResult {
    let request = ModifyOrderRequest::builder()
        .variety(args.variety.as_str())
        .orderid(args.order_id.as_str())
        .ordertype(args.order_type.as_str())
        .producttype(args.product_type.as_str())
        .duration(args.duration.as_str())
        .price(args.price.as_str())
        .quantity(args.quantity.as_str())
        .tradingsymbol(args.tradingsymbol.as_str())
        .symboltoken(args.symbol_token.as_str())
        .exchange(args.exchange.as_str())
        .build();
    let modified = client(config).await?.modify_order(&request).await?;
    println!("✅ Order {} modified", modified.orderid);
    if let Some(unique) = modified.uniqueorderid {
        println!("   uniqueorderid: {unique}");
    }
    Ok(())
}

/// Handle `brokerlink angel search`.
pub async fn handle_search(config: &BrokerConfig, args: &SearchArgs) -> CliResult {
    let hits = client(config)
        .await?
        .search_scrip(&args.exchange, &args.query)
        .await?;
    if hits.is_empty() {
        println!("No matches for {} on {}.", args.query, args.exchange);
    }
    for hit in hits {
        println!("{}:{} {}", hit.exchange, hit.tradingsymbol, hit.symboltoken);
    }
    Ok(())
}
