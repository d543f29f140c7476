mod support;

use brokerlink::auth::providers::angel::AngelAuth;
use brokerlink::auth::AuthError;
use brokerlink::config::AngelConfig;
use brokerlink::error::BrokerError;
use brokerlink::provider::AngelClient;
use brokerlink::types::angel::{AngelInterval, CandleRequest, ChargeOrder, ModifyOrderRequest};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> AngelClient {
    AngelClient::from_config(&support::angel_config(server), "Bearer jwt-1").unwrap()
}

#[tokio::test]
async fn login_posts_credentials_with_totp() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/auth/angelbroking/user/v1/loginByPassword"))
        .and(header("x-privatekey", "angel_key"))
        .and(header("x-usertype", "USER"))
        .and(header("x-sourceid", "WEB"))
        .and(body_partial_json(json!({"clientcode": "A123456", "password": "1234"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "SUCCESS",
            "errorcode": "",
            "data": {"jwtToken": "eyJhbGciOi", "refreshToken": "r", "feedToken": "f"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = AngelAuth::from_config(&support::angel_config(&server))
        .unwrap()
        .login()
        .await
        .expect("login");
    assert_eq!(session.jwt_token, "eyJhbGciOi");
    assert_eq!(session.refresh_token.as_deref(), Some("r"));
}

#[tokio::test]
async fn login_sends_explicit_totp() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/auth/angelbroking/user/v1/loginByPassword"))
        .and(body_json(json!({"clientcode": "A123456", "password": "1234", "totp": "123456"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": {"accessToken": "legacy"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = AngelAuth::from_config(&support::angel_config(&server))
        .unwrap()
        .login_with_totp("123456")
        .await
        .unwrap();
    assert_eq!(session.jwt_token, "legacy");
}

#[tokio::test]
async fn rejected_login_is_an_exchange_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/auth/angelbroking/user/v1/loginByPassword"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": false,
            "message": "Invalid totp",
            "errorcode": "AB1050",
            "data": null
        })))
        .mount(&server)
        .await;

    let err = AngelAuth::from_config(&support::angel_config(&server))
        .unwrap()
        .login_with_totp("000000")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Exchange { .. }));
}

#[test]
fn login_lists_every_missing_setting() {
    let config = AngelConfig {
        api_key: Some("k".into()),
        ..AngelConfig::default()
    };
    let Err(AuthError::Configuration(message)) = AngelAuth::from_config(&config) else {
        panic!("expected a configuration error");
    };
    assert!(message.contains("ANGEL_CLIENT_CODE"));
    assert!(message.contains("ANGEL_PASSWORD"));
    assert!(message.contains("ANGEL_TOTP_SECRET"));
    assert!(!message.contains("ANGEL_API_KEY"));
}

#[tokio::test]
async fn candle_data_sends_bearer_once_and_decodes_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/secure/angelbroking/historical/v1/getCandleData"))
        .and(header("authorization", "Bearer jwt-1"))
        .and(header("x-clientcode", "A123456"))
        .and(body_json(json!({
            "exchange": "NSE",
            "symboltoken": "3045",
            "interval": "FIVE_MINUTE",
            "fromdate": "2025-04-02 09:30",
            "todate": "2025-04-02 11:00"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "SUCCESS",
            "errorcode": "",
            "data": [
                ["2025-04-02T09:30:00+05:30", 771.1, 772.0, 770.0, 771.5, 90112],
                ["2025-04-02T09:35:00+05:30", 771.5, 773.0, 771.0, 772.9, 50210]
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = CandleRequest::builder()
        .exchange("NSE")
        .symboltoken("3045")
        .interval(AngelInterval::FiveMinute)
        .fromdate("2025-04-02 09:30")
        .todate("2025-04-02 11:00")
        .build();
    let candles = client(&server).candle_data(&request).await.unwrap();
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[1].close, 772.9);
}

#[tokio::test]
async fn estimate_charges_wraps_orders() {
    let server = MockServer::start().await;
    let order = ChargeOrder {
        product_type: "DELIVERY".into(),
        transaction_type: "BUY".into(),
        quantity: "10".into(),
        price: "800".into(),
        exchange: "NSE".into(),
        symbol_name: "745AS33".into(),
        token: "17117".into(),
    };
    Mock::given(method("POST"))
        .and(path("/rest/secure/angelbroking/brokerage/v1/estimateCharges"))
        .and(body_json(json!({"orders": [{
            "product_type": "DELIVERY",
            "transaction_type": "BUY",
            "quantity": "10",
            "price": "800",
            "exchange": "NSE",
            "symbol_name": "745AS33",
            "token": "17117"
        }]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": {"summary": {"total_charges": 12.5}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let estimate = client(&server).estimate_charges(&[order]).await.unwrap();
    assert_eq!(estimate["summary"]["total_charges"], json!(12.5));
}

#[tokio::test]
async fn modify_order_returns_order_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/secure/angelbroking/order/v1/modifyOrder"))
        .and(body_partial_json(json!({"orderid": "250402000297497", "variety": "NORMAL"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": {"orderid": "250402000297497", "uniqueorderid": "u-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = ModifyOrderRequest::builder()
        .orderid("250402000297497")
        .price("699")
        .quantity("2")
        .tradingsymbol("SBIN-EQ")
        .symboltoken("3045")
        .exchange("NSE")
        .build();
    let modified = client(&server).modify_order(&request).await.unwrap();
    assert_eq!(modified.orderid, "250402000297497");
    assert_eq!(modified.uniqueorderid.as_deref(), Some("u-1"));
}

#[tokio::test]
async fn search_scrip_handles_hits_and_no_hits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/secure/angelbroking/order/v1/searchScrip"))
        .and(body_json(json!({"exchange": "NSE", "searchscrip": "SBIN"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": [{"exchange": "NSE", "tradingsymbol": "SBIN-EQ", "symboltoken": "3045"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/secure/angelbroking/order/v1/searchScrip"))
        .and(body_json(json!({"exchange": "NSE", "searchscrip": "ZZZZ"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "No matching trading symbols found",
            "data": null
        })))
        .mount(&server)
        .await;

    let angel = client(&server);
    let hits = angel.search_scrip("NSE", "SBIN").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].symboltoken, "3045");
    assert!(angel.search_scrip("NSE", "ZZZZ").await.unwrap().is_empty());
}

#[tokio::test]
async fn status_false_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/secure/angelbroking/order/v1/searchScrip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": false,
            "message": "Invalid API Key",
            "errorcode": "AG8004",
            "data": null
        })))
        .mount(&server)
        .await;

    let err = client(&server).search_scrip("NSE", "SBIN").await.unwrap_err();
    match err {
        BrokerError::Api { code, message, .. } => {
            assert_eq!(message, "Invalid API Key");
            assert_eq!(code.as_deref(), Some("AG8004"));
        }
        other => panic!("expected Api, got {other:?}"),
    }
}

#[tokio::test]
async fn http_unauthorized_is_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/secure/angelbroking/order/v1/searchScrip"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let err = client(&server).search_scrip("NSE", "SBIN").await.unwrap_err();
    assert!(matches!(err, BrokerError::Authentication(_)));
}
