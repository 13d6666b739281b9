use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
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
use crate::signing::iso_millis;
use crate::signing::timestamp_ms;

const OKX_BASE_URL: &str = "https://www.okx.com";

/// OKX API key
#[derive(Clone, Deserialize)]
pub struct OkxAuth {
    pub key: String,
    pub secret: String,
    pub passphrase: String,

    /// Request validity in milliseconds, sent as `expTime`
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl OkxAuth {
    pub fn new(key: impl Into<String>, secret: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self { key: key.into(), secret: secret.into(), passphrase: passphrase.into(), ttl: None }
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl fmt::Debug for OkxAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OkxAuth").field("key", &self.key).field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

/// `base64(hmac(iso_timestamp + METHOD + path?query + body))`
impl Signer for OkxAuth {
    fn sign_at(&self, parts: &mut RequestParts, now: OffsetDateTime) {
        let timestamp = iso_millis(now);
        let payload = format!("{}{}{}{}", timestamp, parts.method, parts.path_with_query(), parts.body_str());

        parts.set_header("OK-ACCESS-KEY", &self.key);
        parts.set_header("OK-ACCESS-SIGN", hmac_sha256_base64(&self.secret, &payload));
        parts.set_header("OK-ACCESS-TIMESTAMP", timestamp);
        parts.set_header("OK-ACCESS-PASSPHRASE", &self.passphrase);

        if let Some(ttl) = self.ttl.filter(|ttl| *ttl > 0) {
            let expires = timestamp_ms(now).saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX));
            parts.set_header("expTime", expires.to_string());
        }
    }
}

pub type OkxClientBuilder = ClientBuilder<OkxClient>;

/// OKX V5 API client
#[derive(Clone)]
pub struct OkxClient {
    venue: Venue,
    auth: Option<OkxAuth>,
}

impl Exchange for OkxClient {
    const NAME: &'static str = "OKX";
    const BASE_URL: &'static str = OKX_BASE_URL;

    type Auth = OkxAuth;

    fn assemble(venue: Venue, auth: Option<OkxAuth>) -> Self {
        Self { venue, auth }
    }
}

impl OkxClient {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> OkxClientBuilder {
        OkxClientBuilder::default()
    }

    pub fn with_settings(&self, settings: ExecutionSettings) -> Self {
        Self { venue: self.venue.with_settings(settings), auth: self.auth.clone() }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    pub async fn get_ticker(&self, inst_id: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v5/market/ticker").query(Params::new().with("instId", inst_id));
        self.venue.public("okx.api.order_book_trading.market_data.get_ticker", parts, check).await
    }

    /// `inst_type` is `SPOT`, `MARGIN`, `SWAP`, `FUTURES` or `OPTION`
    pub async fn get_instruments(&self, inst_type: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v5/public/instruments").query(params.with("instType", inst_type));
        self.venue.public("okx.api.public_data.rest.get_instruments", parts, check).await
    }

    pub async fn get_funding_rate(&self, inst_id: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v5/public/funding-rate").query(Params::new().with("instId", inst_id));
        self.venue.public("okx.api.public_data.rest.get_funding_rate", parts, check).await
    }

    /// `params` may carry `before`, `after`, `limit`
    pub async fn get_funding_rate_history(&self, inst_id: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v5/public/funding-rate-history").query(params.with("instId", inst_id));
        self.venue.public("okx.api.public_data.rest.get_funding_rate_history", parts, check).await
    }

    pub async fn get_mark_price(&self, inst_type: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v5/public/mark-price").query(params.with("instType", inst_type));
        self.venue.public("okx.api.public_data.rest.get_mark_price", parts, check).await
    }

    /// `params` may carry `ccy` as a comma separated list
    pub async fn get_balance(&self, params: Params) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v5/account/balance").query(params);
        self.venue.signed("okx.api.trading_account.rest.get_balance", parts, auth, check).await
    }

    pub async fn get_positions(&self, params: Params) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v5/account/positions").query(params);
        self.venue.signed("okx.api.trading_account.rest.get_positions", parts, auth, check).await
    }

    /// `extra` may carry `instId`, `ccy`, `posSide`
    pub async fn set_leverage(&self, lever: &str, mgn_mode: &str, mut extra: Map<String, Value>) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        extra.insert("lever".to_string(), Value::from(lever));
        extra.insert("mgnMode".to_string(), Value::from(mgn_mode));
        let parts = self.venue.post("/api/v5/account/set-leverage").json(&extra)?;
        self.venue.signed("okx.api.trading_account.rest.set_leverage", parts, auth, check).await
    }

    /// Margin change for an isolated position; sent once
    pub async fn increase_decrease_margin<T>(&self, data: &T) -> Result<Reply<Value>>
    where
        T: Serialize + ?Sized,
    {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/api/v5/account/position/margin-balance").json(data)?;
        self.venue.signed_once("okx.api.trading_account.rest.increase_decrease_margin", parts, auth, check).await
    }

    pub async fn place_algo_order<T>(&self, order: &T) -> Result<Reply<Value>>
    where
        T: Serialize + ?Sized,
    {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/api/v5/trade/order-algo").json(order)?;
        self.venue.signed("okx.api.order_book_trading.algo_trading_rest.place_algo_order", parts, auth, check).await
    }
}

fn check(response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
    let object = expect_object(response, body)?;

    match object.get("code").and_then(Value::as_str) {
        Some("0") => Ok(()),
        _ => Err(ApiError::new(format!("OKX returned code {}: {}", field(object, "code"), field(object, "msg")), response, body)),
    }
}
