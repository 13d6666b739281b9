use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::ClientBuilder;
use super::Exchange;
use super::Venue;
use super::expect_object;
use super::field;
use super::require;
use crate::errors::ApiError;
use crate::errors::Result;
use crate::executor::ExecutionSettings;
use crate::request::CONTENT_TYPE_JSON;
use crate::request::Method;
use crate::request::Params;
use crate::request::RequestParts;
use crate::response::RawResponse;
use crate::response::Reply;
use crate::signing::Signer;
use crate::signing::hmac_sha256_base64;
use crate::signing::timestamp_ms;

const MAIN_DOMAIN: &str = "https://api.bitget.com";

/// Bitget API key
///
/// Field names follow the secrets file layout.
#[derive(Clone, Deserialize)]
pub struct BitgetAuth {
    pub access_key: String,
    pub secret_key: String,
    pub passphrase: String,

    /// `en-US` or `zh-CN`
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en-US".to_string()
}

impl BitgetAuth {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self { access_key: access_key.into(), secret_key: secret_key.into(), passphrase: passphrase.into(), locale: default_locale() }
    }
}

impl fmt::Debug for BitgetAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitgetAuth").field("access_key", &self.access_key).field("locale", &self.locale).finish_non_exhaustive()
    }
}

/// `base64(hmac(timestamp + METHOD + path?query + body))`
impl Signer for BitgetAuth {
    fn sign_at(&self, parts: &mut RequestParts, now: OffsetDateTime) {
        let timestamp = timestamp_ms(now).to_string();
        let payload = format!("{}{}{}{}", timestamp, parts.method, parts.path_with_query(), parts.body_str());
        let signature = hmac_sha256_base64(&self.secret_key, &payload);

        parts.set_header("ACCESS-KEY", &self.access_key);
        parts.set_header("ACCESS-SIGN", signature);
        parts.set_header("ACCESS-TIMESTAMP", timestamp);
        parts.set_header("ACCESS-PASSPHRASE", &self.passphrase);
        parts.set_header("locale", &self.locale);

        if parts.method == Method::Post {
            parts.set_header("Content-Type", CONTENT_TYPE_JSON);
        }
    }
}

pub type BitgetClientBuilder = ClientBuilder<BitgetClient>;

/// Bitget USDT-M / coin-M futures (mix) client
#[derive(Clone)]
pub struct BitgetClient {
    venue: Venue,
    auth: Option<BitgetAuth>,
}

impl Exchange for BitgetClient {
    const NAME: &'static str = "Bitget";
    const BASE_URL: &'static str = MAIN_DOMAIN;

    type Auth = BitgetAuth;

    fn assemble(venue: Venue, auth: Option<BitgetAuth>) -> Self {
        Self { venue, auth }
    }
}

impl BitgetClient {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> BitgetClientBuilder {
        BitgetClientBuilder::default()
    }

    pub fn with_settings(&self, settings: ExecutionSettings) -> Self {
        Self { venue: self.venue.with_settings(settings), auth: self.auth.clone() }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    pub async fn get_ticker(&self, symbol: &str, product_type: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v2/mix/market/ticker").query(Params::new().with("productType", product_type).with("symbol", symbol));
        self.venue.public("bitget.futures.market.get_ticker", parts, check).await
    }

    /// Candles; `params` may carry `startTime`, `endTime`, `kLineType`, `limit`
    pub async fn get_candlestick_data(&self, symbol: &str, product_type: &str, granularity: &str, params: Params) -> Result<Reply<Value>> {
        let params = params.with("symbol", symbol).with("productType", product_type).with("granularity", granularity);
        let parts = self.venue.get("/api/v2/mix/market/candles").query(params);
        self.venue.public("bitget.futures.market.get_candlestick_data", parts, check).await
    }

    pub async fn get_next_funding_time(&self, symbol: &str, product_type: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v2/mix/market/funding-time").query(Params::new().with("productType", product_type).with("symbol", symbol));
        self.venue.public("bitget.futures.market.get_next_funding_time", parts, check).await
    }

    /// `params` may carry `pageSize`, `pageNo`
    pub async fn get_historical_funding_rates(&self, symbol: &str, product_type: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v2/mix/market/history-fund-rate").query(params.with("symbol", symbol).with("productType", product_type));
        self.venue.public("bitget.futures.market.get_historical_funding_rates", parts, check).await
    }

    /// Every symbol of `product_type` unless `params` names a `symbol`
    pub async fn get_current_funding_rate(&self, product_type: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v2/mix/market/current-fund-rate").query(params.with("productType", product_type));
        self.venue.public("bitget.futures.market.get_current_funding_rate", parts, check).await
    }

    pub async fn get_single_account(&self, symbol: &str, product_type: &str, margin_coin: &str) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v2/mix/account/account").query(position_params(symbol, product_type, margin_coin));
        self.venue.signed("bitget.futures.account.get_single_account", parts, auth, check).await
    }

    pub async fn get_single_position(&self, symbol: &str, product_type: &str, margin_coin: &str) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v2/mix/position/single-position").query(position_params(symbol, product_type, margin_coin));
        self.venue.signed("bitget.futures.position.get_single_position", parts, auth, check).await
    }

    pub async fn place_order<T>(&self, order: &T) -> Result<Reply<Value>>
    where
        T: Serialize + ?Sized,
    {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/api/v2/mix/order/place-order").json(order)?;
        self.venue.signed("bitget.futures.trade.place_order", parts, auth, check).await
    }
}

/// Private GET queries are signed sorted by key
fn position_params(symbol: &str, product_type: &str, margin_coin: &str) -> Params {
    Params::new().with("symbol", symbol).with("productType", product_type).with("marginCoin", margin_coin).sorted()
}

fn check(response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
    let object = expect_object(response, body)?;

    match object.get("code").and_then(Value::as_str) {
        Some("00000") => Ok(()),
        _ => Err(ApiError::new(format!("Bitget returned code {}: {}", field(object, "code"), field(object, "msg")), response, body)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    fn auth() -> BitgetAuth {
        BitgetAuth::new("bg-key", "bg-secret", "bg-pass")
    }

    #[test]
    fn test_sign_get_with_sorted_query() {
        let mut parts = RequestParts::get(MAIN_DOMAIN, "/api/v2/mix/account/account").query(position_params("BTCUSDT", "USDT-FUTURES", "USDT"));
        auth().sign_at(&mut parts, datetime!(2024-01-02 03:04:05.678 UTC));

        assert_eq!(parts.path_with_query(), "/api/v2/mix/account/account?marginCoin=USDT&productType=USDT-FUTURES&symbol=BTCUSDT");
        assert_eq!(parts.header_value("ACCESS-KEY"), Some("bg-key"));
        assert_eq!(parts.header_value("ACCESS-TIMESTAMP"), Some("1704164645678"));
        assert_eq!(parts.header_value("ACCESS-PASSPHRASE"), Some("bg-pass"));
        assert_eq!(parts.header_value("locale"), Some("en-US"));
        assert_eq!(parts.header_value("ACCESS-SIGN"), Some("ZyBh3mjqpdoa5YhwbF2hC008vWu3Dh1ynHA8oM8+1nY="));
        assert_eq!(parts.header_value("Content-Type"), None);
    }

    #[test]
    fn test_sign_post_covers_body() {
        let mut parts = RequestParts::post(MAIN_DOMAIN, "/api/v2/mix/order/place-order").json(&json!({"symbol": "BTCUSDT"})).unwrap();
        auth().sign_at(&mut parts, datetime!(2024-01-02 03:04:05.678 UTC));

        assert_eq!(parts.header_value("ACCESS-SIGN"), Some("xYWRMdNyfpLwS4WRJs2FwR4Nmik15BNQNxHNnSZfD6g="));
        assert_eq!(parts.header_value("Content-Type"), Some(CONTENT_TYPE_JSON));
    }

    #[test]
    fn test_auth_from_secrets_layout() {
        let auth: BitgetAuth = serde_json::from_value(json!({"access_key": "k", "secret_key": "s", "passphrase": "p"})).unwrap();
        assert_eq!(auth.locale, "en-US");
        assert!(!format!("{auth:?}").contains("\"s\""));
    }

    #[test]
    fn test_check() {
        let response = RawResponse::new(200, "");
        assert!(check(&response, &json!({"code": "00000", "data": []})).is_ok());

        let error = check(&response, &json!({"code": "40034", "msg": "Parameter does not exist"})).unwrap_err();
        assert_eq!(error.message, "Bitget returned code 40034: Parameter does not exist");

        assert_eq!(check(&response, &json!([])).unwrap_err().message, "unexpected response type");
    }

    #[tokio::test]
    async fn test_private_call_without_credentials() {
        let client = BitgetClient::new().unwrap();
        let error = client.get_single_account("BTCUSDT", "USDT-FUTURES", "USDT").await.unwrap_err();
        assert!(matches!(error, crate::errors::HttpError::MissingCredentials("Bitget")));
        assert!(client.venue().limiter().interval() > std::time::Duration::ZERO);
    }
}
