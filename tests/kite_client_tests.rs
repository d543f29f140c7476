use brokerlink::auth::AccessToken;
use brokerlink::error::BrokerError;
use brokerlink::provider::{HistoricalQuery, KiteClient};
use brokerlink::types::KiteInterval;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INSTRUMENTS_CSV: &str = "instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,strike,tick_size,lot_size,instrument_type,segment,exchange\n\
256265,1001,NIFTY 50,\"NIFTY 50\",0,,0,0,0,EQ,INDICES,NSE\n\
408065,1594,INFY,\"INFOSYS\",0,,0,0.05,1,EQ,NSE,NSE\n\
2953217,11536,TCS,\"TATA CONSULTANCY SERV LT\",0,,0,0.05,1,EQ,NSE,NSE\n";

fn client(server: &MockServer) -> KiteClient {
    KiteClient::new("kite_key", AccessToken::new("tok")).with_base_url(server.uri())
}

#[tokio::test]
async fn ltp_sends_token_auth_and_decodes_quotes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote/ltp"))
        .and(header("authorization", "token kite_key:tok"))
        .and(header("x-kite-version", "3"))
        .and(query_param("i", "NSE:INFY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "NSE:INFY": {"instrument_token": 408065, "last_price": 1512.35},
                "NSE:TCS": {"instrument_token": 2953217, "last_price": 3890.0}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let quotes = client(&server).ltp(&["NSE:INFY", "NSE:TCS"]).await.unwrap();
    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes["NSE:INFY"].last_price, 1512.35);
    assert_eq!(quotes["NSE:TCS"].instrument_token, 2953217);
}

#[tokio::test]
async fn ltp_needs_at_least_one_instrument() {
    let server = MockServer::start().await;
    let err = client(&server).ltp(&[]).await.unwrap_err();
    assert!(matches!(err, BrokerError::InvalidArgument(_)));
}

#[tokio::test]
async fn expired_token_maps_to_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote/ltp"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "status": "error",
            "message": "Incorrect `api_key` or `access_token`.",
            "error_type": "TokenException"
        })))
        .mount(&server)
        .await;

    let err = client(&server).ltp(&["NSE:INFY"]).await.unwrap_err();
    assert!(matches!(err, BrokerError::Authentication(_)));
    assert_eq!(err.recovery_suggestion(), brokerlink::error::RecoverySuggestion::Reauthenticate);
}

#[tokio::test]
async fn find_instrument_matches_symbol_and_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/instruments/NSE"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INSTRUMENTS_CSV))
        .expect(2)
        .mount(&server)
        .await;

    let kite = client(&server);
    let infy = kite.find_instrument("NSE", "INFY").await.unwrap();
    assert_eq!(infy.instrument_token, 408065);
    assert_eq!(infy.name, "INFOSYS");

    let err = kite.find_instrument("NSE", "NIFTY 50").await.unwrap_err();
    assert!(matches!(err, BrokerError::NotFound(_)));
}

#[tokio::test]
async fn historical_passes_range_and_flags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/instruments/historical/408065/5minute"))
        .and(query_param("from", "2024-01-01 09:15:00"))
        .and(query_param("to", "2024-01-05 15:30:00"))
        .and(query_param("continuous", "0"))
        .and(query_param("oi", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"candles": [
                ["2024-01-05T09:15:00+0530", 1500.0, 1510.0, 1495.0, 1505.0, 12000, 0],
                ["2024-01-05T09:20:00+0530", 1505.0, 1507.5, 1501.0, 1502.0, 8000, 0]
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let day = |d: u32, h: u32, m: u32| {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    };
    let candles = client(&server)
        .historical(&HistoricalQuery {
            instrument_token: 408065,
            interval: KiteInterval::FiveMinute,
            from: day(1, 9, 15),
            to: day(5, 15, 30),
            continuous: false,
            oi: true,
        })
        .await
        .unwrap();

    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].open, 1500.0);
    assert_eq!(candles[1].volume, 8000);
    assert_eq!(candles[1].oi, Some(0));
}

#[tokio::test]
async fn input_exception_keeps_broker_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/instruments/historical/1/day"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "error",
            "message": "invalid from date",
            "error_type": "InputException"
        })))
        .mount(&server)
        .await;

    let at = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let err = client(&server)
        .historical(&HistoricalQuery {
            instrument_token: 1,
            interval: KiteInterval::Day,
            from: at,
            to: at,
            continuous: false,
            oi: false,
        })
        .await
        .unwrap_err();
    match err {
        BrokerError::Api { status, message, code } => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid from date");
            assert_eq!(code.as_deref(), Some("InputException"));
        }
        other => panic!("expected Api, got {other:?}"),
    }
}
