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
use crate::request::Params;
use crate::request::RequestParts;
use crate::response::RawResponse;
use crate::response::Reply;
use crate::signing::Signer;
use crate::signing::hmac_sha256_base64;
use crate::signing::timestamp_ms;

const FUTURES_BASE_URL: &str = "https://api-futures.kucoin.com";

/// KuCoin API key
#[derive(Clone, Deserialize)]
pub struct KucoinAuth {
    pub key: String,
    pub secret: String,
    pub passphrase: String,

    /// API key version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "2".to_string()
}

impl KucoinAuth {
    pub fn new(key: impl Into<String>, secret: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self { key: key.into(), secret: secret.into(), passphrase: passphrase.into(), version: default_version() }
    }
}

impl fmt::Debug for KucoinAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KucoinAuth").field("key", &self.key).field("version", &self.version).finish_non_exhaustive()
    }
}

/// `base64(hmac(timestamp + METHOD + path?query + body))`, passphrase signed with the same secret
impl Signer for KucoinAuth {
    fn sign_at(&self, parts: &mut RequestParts, now: OffsetDateTime) {
        let timestamp = timestamp_ms(now).to_string();
        let payload = format!("{}{}{}{}", timestamp, parts.method, parts.path_with_query(), parts.body_str());

        parts.set_header("KC-API-KEY", &self.key);
        parts.set_header("KC-API-SIGN", hmac_sha256_base64(&self.secret, &payload));
        parts.set_header("KC-API-TIMESTAMP", timestamp);
        parts.set_header("KC-API-PASSPHRASE", hmac_sha256_base64(&self.secret, &self.passphrase));
        parts.set_header("KC-API-KEY-VERSION", &self.version);
    }
}

pub type KucoinClientBuilder = ClientBuilder<KucoinClient>;

/// KuCoin futures client
#[derive(Clone)]
pub struct KucoinClient {
    venue: Venue,
    auth: Option<KucoinAuth>,
}

impl Exchange for KucoinClient {
    const NAME: &'static str = "KuCoin";
    const BASE_URL: &'static str = FUTURES_BASE_URL;

    type Auth = KucoinAuth;

    fn assemble(venue: Venue, auth: Option<KucoinAuth>) -> Self {
        Self { venue, auth }
    }
}

impl KucoinClient {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> KucoinClientBuilder {
        KucoinClientBuilder::default()
    }

    pub fn with_settings(&self, settings: ExecutionSettings) -> Self {
        Self { venue: self.venue.with_settings(settings), auth: self.auth.clone() }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    pub async fn get_symbol(&self, symbol: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get(format!("/api/v1/contracts/{symbol}"));
        self.venue.public("kucoin.classic_rest.futures.market.get_symbol", parts, check).await
    }

    pub async fn get_all_symbols(&self) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v1/contracts/active");
        self.venue.public("kucoin.classic_rest.futures.market.get_all_symbols", parts, check).await
    }

    pub async fn get_ticker(&self, symbol: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v1/ticker").query(Params::new().with("symbol", symbol));
        self.venue.public("kucoin.classic_rest.futures.market.get_ticker", parts, check).await
    }

    /// `granularity` in minutes; `params` may carry `from`, `to`
    pub async fn get_klines(&self, symbol: &str, granularity: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v1/kline/query").query(params.with("symbol", symbol).with("granularity", granularity));
        self.venue.public("kucoin.classic_rest.futures.market.get_klines", parts, check).await
    }

    pub async fn get_current_funding_rate(&self, symbol: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get(format!("/api/v1/funding-rate/{symbol}/current"));
        self.venue.public("kucoin.classic_rest.futures.funding_fees.get_current_funding_rate", parts, check).await
    }

    /// Funding history between two millisecond timestamps
    pub async fn get_public_funding_history(&self, symbol: &str, from: i64, to: i64) -> Result<Reply<Value>> {
        let params = Params::new().with("symbol", symbol).with("from", from.to_string()).with("to", to.to_string());
        let parts = self.venue.get("/api/v1/contract/funding-rates").query(params);
        self.venue.public("kucoin.classic_rest.futures.funding_fees.get_public_funding_history", parts, check).await
    }

    /// Token and instance servers for the public WebSocket feed
    pub async fn get_public_token(&self) -> Result<Reply<Value>> {
        let parts = self.venue.post("/api/v1/bullet-public");
        self.venue.public("kucoin.classic_websocket.base_info.futures.get_public_token", parts, check).await
    }

    /// `params` may carry `currency`
    pub async fn get_futures_account(&self, params: Params) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v1/account-overview").query(params);
        self.venue.signed("kucoin.classic_rest.account.account_funding.get_futures_account", parts, auth, check).await
    }

    pub async fn get_private_funding_history(&self, symbol: &str, params: Params) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v1/funding-history").query(params.with("symbol", symbol));
        self.venue.signed("kucoin.classic_rest.futures.funding_fees.get_private_funding_history", parts, auth, check).await
    }

    /// Sent once
    pub async fn add_order<T>(&self, order: &T) -> Result<Reply<Value>>
    where
        T: Serialize + ?Sized,
    {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/api/v1/orders").json(order)?;
        self.venue.signed_once("kucoin.classic_rest.futures.orders.add_order", parts, auth, check).await
    }

    /// Take-profit and stop-loss order; sent once
    pub async fn add_tp_sl_order<T>(&self, order: &T) -> Result<Reply<Value>>
    where
        T: Serialize + ?Sized,
    {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/api/v1/st-orders").json(order)?;
        self.venue.signed_once("kucoin.classic_rest.futures.orders.add_tp_sl_order", parts, auth, check).await
    }

    pub async fn get_position_details(&self, symbol: &str) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v2/position").query(Params::new().with("symbol", symbol));
        self.venue.signed("kucoin.classic_rest.futures.positions.get_position_details", parts, auth, check).await
    }

    pub async fn get_position_list(&self, params: Params) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v1/positions").query(params);
        self.venue.signed("kucoin.classic_rest.futures.positions.get_position_list", parts, auth, check).await
    }

    pub async fn get_positions_history(&self, params: Params) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v1/history-positions").query(params);
        self.venue.signed("kucoin.classic_rest.futures.positions.get_positions_history", parts, auth, check).await
    }

    /// Sent once
    pub async fn add_isolated_margin<T>(&self, data: &T) -> Result<Reply<Value>>
    where
        T: Serialize + ?Sized,
    {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/api/v1/position/margin/deposit-margin").json(data)?;
        self.venue.signed_once("kucoin.classic_rest.futures.positions.add_isolated_margin", parts, auth, check).await
    }

    /// Sent once
    pub async fn remove_isolated_margin<T>(&self, data: &T) -> Result<Reply<Value>>
    where
        T: Serialize + ?Sized,
    {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/api/v1/margin/withdrawMargin").json(data)?;
        self.venue.signed_once("kucoin.classic_rest.futures.positions.remove_isolated_margin", parts, auth, check).await
    }

    /// Token and instance servers for the private WebSocket feed
    pub async fn get_private_token(&self) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/api/v1/bullet-private");
        self.venue.signed("kucoin.classic_websocket.base_info.futures.get_private_token", parts, auth, check).await
    }
}

fn check(response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
    let object = expect_object(response, body)?;

    match object.get("code").and_then(Value::as_str) {
        Some("200000") => Ok(()),
        _ => Err(ApiError::new(format!("KuCoin returned code {}: {}", field(object, "code"), field(object, "msg")), response, body)),
    }
}
