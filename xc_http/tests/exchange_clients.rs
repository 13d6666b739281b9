//! End-to-end tests of the exchange clients against a local mock server.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use mockito::Matcher;
use serde_json::json;
use xc_http::BinanceClient;
use xc_http::BybitAuth;
use xc_http::BybitClient;
use xc_http::ErrorKind;
use xc_http::ExecutionSettings;
use xc_http::FailureReason;
use xc_http::HttpError;
use xc_http::HtxAuth;
use xc_http::HtxClient;
use xc_http::KucoinAuth;
use xc_http::KucoinClient;
use xc_http::OkxClient;
use xc_http::Params;
use xc_http::Reply;
use xc_ratelimit::KeyedRateLimiter;
use xc_ratelimit::MinSpacing;

fn fast_settings() -> ExecutionSettings {
    ExecutionSettings { retries: 3, delay: Duration::from_millis(5), backoff: 2.0, ..Default::default() }
}

fn no_spacing() -> Arc<dyn KeyedRateLimiter> {
    Arc::new(MinSpacing::new(Duration::ZERO))
}

#[tokio::test]
async fn test_public_call_returns_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v5/market/kline")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
            Matcher::UrlEncoded("interval".into(), "60".into()),
            Matcher::UrlEncoded("category".into(), "linear".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"retCode":0,"retMsg":"OK","result":{"symbol":"BTCUSDT","list":[]}}"#)
        .expect(1)
        .create_async()
        .await;

    let client = BybitClient::builder().base_url(server.url()).rate_limiter(no_spacing()).settings(fast_settings()).build().unwrap();
    let reply = client.get_kline("BTCUSDT", "60", Params::new().with("category", "linear")).await.unwrap();

    assert!(!reply.is_full());
    assert_eq!(reply.body()["result"]["symbol"], "BTCUSDT");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/fapi/v1/klines")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
        .expect(1)
        .create_async()
        .await;

    let client = BinanceClient::builder().base_url(server.url()).rate_limiter(no_spacing()).settings(fast_settings()).build().unwrap();
    let error = client.get_kline("NOPE", "1h", Params::new()).await.unwrap_err();

    match error {
        HttpError::RequestFailed(failed) => {
            assert_eq!(failed.reason, FailureReason::NonRetryable { attempt: 1 });
            assert_eq!(failed.attempts(), 1);
            assert_eq!(failed.kind(), ErrorKind::HttpClientError);
            assert_eq!(failed.errors[0].status(), Some(400));
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_exhausts_budget() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("GET", "/api/v1/contracts/active").with_status(503).with_body("unavailable").expect(3).create_async().await;

    let client = KucoinClient::builder().base_url(server.url()).rate_limiter(no_spacing()).settings(fast_settings()).build().unwrap();
    let error = client.get_all_symbols().await.unwrap_err();

    match error {
        HttpError::RequestFailed(failed) => {
            assert_eq!(failed.reason, FailureReason::Exhausted { retries: 3 });
            assert_eq!(failed.attempts(), 3);
            assert!(failed.errors.iter().all(|error| error.status() == Some(503)));
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_then_success() {
    let mut server = mockito::Server::new_async().await;
    let failing = server.mock("GET", "/v4/perpetualMarkets").match_query(Matcher::Any).with_status(500).expect(1).create_async().await;
    let healthy = server
        .mock("GET", "/v4/perpetualMarkets")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"markets":{"BTC-USD":{"ticker":"BTC-USD"}}}"#)
        .expect(1)
        .create_async()
        .await;

    let client = xc_http::DydxClient::builder().base_url(server.url()).rate_limiter(no_spacing()).settings(fast_settings()).build().unwrap();
    let reply = client.get_perpetual_markets(Params::new().with("ticker", "BTC-USD")).await.unwrap();

    assert_eq!(reply.body()["markets"]["BTC-USD"]["ticker"], "BTC-USD");
    failing.assert_async().await;
    healthy.assert_async().await;
}

#[tokio::test]
async fn test_api_error_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v5/public/funding-rate")
        .match_query(Matcher::UrlEncoded("instId".into(), "BTC-USDT-SWAP".into()))
        .with_status(200)
        .with_body(r#"{"code":"51001","msg":"Instrument ID does not exist","data":[]}"#)
        .expect(1)
        .create_async()
        .await;

    let client = OkxClient::builder().base_url(server.url()).rate_limiter(no_spacing()).settings(fast_settings()).build().unwrap();
    let error = client.get_funding_rate("BTC-USDT-SWAP").await.unwrap_err();

    match error {
        HttpError::Api(api) => {
            assert_eq!(api.message, "OKX returned code 51001: Instrument ID does not exist");
            assert_eq!(api.response.status, 200);
            assert_eq!(api.body["code"], "51001");
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_signed_call_sends_auth_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v2/position")
        .match_query(Matcher::UrlEncoded("symbol".into(), "XBTUSDTM".into()))
        .match_header("KC-API-KEY", "kc-key")
        .match_header("KC-API-KEY-VERSION", "2")
        .match_header("KC-API-PASSPHRASE", "f9Ft/4TxlSc3VzwCoVWeOIe3NarHq35v1eTRN3FrQj4=")
        .match_header("KC-API-SIGN", Matcher::Regex(r"^[A-Za-z0-9+/]{43}=$".into()))
        .match_header("KC-API-TIMESTAMP", Matcher::Regex(r"^\d{13}$".into()))
        .with_status(200)
        .with_body(r#"{"code":"200000","data":{"symbol":"XBTUSDTM"}}"#)
        .expect(1)
        .create_async()
        .await;

    let client = KucoinClient::builder()
        .base_url(server.url())
        .rate_limiter(no_spacing())
        .settings(fast_settings())
        .credentials(KucoinAuth::new("kc-key", "kc-secret", "kc-pass"))
        .build()
        .unwrap();
    let reply = client.get_position_details("XBTUSDTM").await.unwrap();

    assert_eq!(reply.body()["data"]["symbol"], "XBTUSDTM");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_htx_signature_travels_in_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/linear-swap-api/v3/unified_account_info")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("AccessKeyId".into(), "htx-key".into()),
            Matcher::UrlEncoded("SignatureMethod".into(), "HmacSHA256".into()),
            Matcher::UrlEncoded("SignatureVersion".into(), "2".into()),
            Matcher::Regex("Signature=".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"code":200,"msg":"","data":[]}"#)
        .expect(1)
        .create_async()
        .await;

    let client = HtxClient::builder()
        .base_url(server.url())
        .rate_limiter(no_spacing())
        .credentials(HtxAuth::new("htx-key", "htx-secret"))
        .build()
        .unwrap();
    client.query_unified_account_assets(Params::new()).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_credentials_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("GET", Matcher::Any).expect(0).create_async().await;

    let client = BybitClient::builder().base_url(server.url()).rate_limiter(no_spacing()).build().unwrap();
    let error = client.get_position_info("linear", Params::new()).await.unwrap_err();

    assert!(matches!(error, HttpError::MissingCredentials("Bybit")));
    assert_eq!(error.kind(), None);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_order_placement_is_sent_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v5/order/create")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"category": "linear", "symbol": "BTCUSDT", "side": "Buy"})))
        .with_status(502)
        .expect(1)
        .create_async()
        .await;

    let client = BybitClient::builder()
        .base_url(server.url())
        .rate_limiter(no_spacing())
        .settings(fast_settings())
        .credentials(BybitAuth::new("by-key", "by-secret"))
        .build()
        .unwrap();
    let error = client.place_order(&json!({"category": "linear", "symbol": "BTCUSDT", "side": "Buy"})).await.unwrap_err();

    match error {
        HttpError::RequestFailed(failed) => assert_eq!(failed.reason, FailureReason::Exhausted { retries: 1 }),
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_full_reply_carries_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/fapi/v1/fundingInfo")
        .with_status(200)
        .with_header("x-mbx-used-weight-1m", "7")
        .with_body(r#"[{"symbol":"BTCUSDT","fundingIntervalHours":8}]"#)
        .create_async()
        .await;

    let client = BinanceClient::builder().base_url(server.url()).rate_limiter(no_spacing()).build().unwrap();
    let reply = client.with_settings(client.venue().settings().with_full(true)).get_funding_rate_info().await.unwrap();

    match reply {
        Reply::Full(response, body) => {
            assert_eq!(response.status, 200);
            assert_eq!(response.header("X-MBX-USED-WEIGHT-1M"), Some("7"));
            assert_eq!(body[0]["fundingIntervalHours"], 8);
        }
        Reply::Body(_) => panic!("expected a full reply"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_shared_limiter_spaces_clients() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/ticker")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"code":"200000","data":{}}"#)
        .expect(2)
        .create_async()
        .await;

    let limiter: Arc<dyn KeyedRateLimiter> = Arc::new(MinSpacing::new(Duration::from_millis(150)));
    let first = KucoinClient::builder().base_url(server.url()).rate_limiter(limiter.clone()).build().unwrap();
    let second = KucoinClient::builder().base_url(server.url()).rate_limiter(limiter).build().unwrap();

    let started = Instant::now();
    first.get_ticker("XBTUSDTM").await.unwrap();
    second.get_ticker("ETHUSDTM").await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(150));
    mock.assert_async().await;
}
