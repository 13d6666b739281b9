use std::fmt;

use serde::Deserialize;
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
use crate::request::Method;
use crate::request::Params;
use crate::request::RequestParts;
use crate::response::RawResponse;
use crate::response::Reply;
use crate::signing::Signer;
use crate::signing::hmac_sha256_hex;
use crate::signing::timestamp_ms;

const FUTURES_BASE_URL: &str = "https://contract.mexc.com";

/// MEXC API key
#[derive(Clone, Deserialize)]
pub struct MexcAuth {
    pub key: String,
    pub secret: String,
}

impl MexcAuth {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { key: key.into(), secret: secret.into() }
    }
}

impl fmt::Debug for MexcAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MexcAuth").field("key", &self.key).finish_non_exhaustive()
    }
}

/// `hex(hmac(key + timestamp + (query | body)))`; the query must already be sorted
impl Signer for MexcAuth {
    fn sign_at(&self, parts: &mut RequestParts, now: OffsetDateTime) {
        let timestamp = timestamp_ms(now).to_string();
        let signed = match parts.method {
            Method::Get | Method::Delete => parts.query.encode(),
            Method::Post => parts.body_str().to_string(),
        };
        let signature = hmac_sha256_hex(&self.secret, &format!("{}{}{}", self.key, timestamp, signed));

        parts.set_header("Request-Time", timestamp);
        parts.set_header("ApiKey", &self.key);
        parts.set_header("Signature", signature);
    }
}

pub type MexcClientBuilder = ClientBuilder<MexcClient>;

/// MEXC futures (contract) client
#[derive(Clone)]
pub struct MexcClient {
    venue: Venue,
    auth: Option<MexcAuth>,
}

impl Exchange for MexcClient {
    const NAME: &'static str = "MEXC";
    const BASE_URL: &'static str = FUTURES_BASE_URL;

    type Auth = MexcAuth;

    fn assemble(venue: Venue, auth: Option<MexcAuth>) -> Self {
        Self { venue, auth }
    }
}

impl MexcClient {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> MexcClientBuilder {
        MexcClientBuilder::default()
    }

    pub fn with_settings(&self, settings: ExecutionSettings) -> Self {
        Self { venue: self.venue.with_settings(settings), auth: self.auth.clone() }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    /// Every contract unless `params` names a `symbol`
    pub async fn get_contract_info(&self, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v1/contract/detail").query(params);
        self.venue.public("mexc.futures.market.get_contract_info", parts, check).await
    }

    pub async fn get_index_price(&self, symbol: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get(format!("/api/v1/contract/index_price/{symbol}"));
        self.venue.public("mexc.futures.market.get_index_price", parts, check).await
    }

    pub async fn get_funding_rate(&self, symbol: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get(format!("/api/v1/contract/funding_rate/{symbol}"));
        self.venue.public("mexc.futures.market.get_funding_rate", parts, check).await
    }

    /// `params` may carry `interval`, `start`, `end`
    pub async fn get_candlestick_data(&self, symbol: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get(format!("/api/v1/contract/kline/{symbol}")).query(params);
        self.venue.public("mexc.futures.market.get_candlestick_data", parts, check).await
    }

    pub async fn get_ticker(&self, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/api/v1/contract/ticker").query(params);
        self.venue.public("mexc.futures.market.get_ticker", parts, check).await
    }

    pub async fn get_account_assets(&self) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v1/private/account/assets");
        self.venue.signed("mexc.futures.account_trading.get_account_assets", parts, auth, check).await
    }

    pub async fn get_currency_asset(&self, currency: &str) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get(format!("/api/v1/private/account/asset/{currency}"));
        self.venue.signed("mexc.futures.account_trading.get_currency_asset", parts, auth, check).await
    }

    /// `params` may carry `symbol`, `positionId`
    pub async fn get_open_positions(&self, params: Params) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/api/v1/private/position/open_positions").query(params.sorted());
        self.venue.signed("mexc.futures.account_trading.get_open_positions", parts, auth, check).await
    }
}

fn check(response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
    let object = expect_object(response, body)?;

    match object.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(()),
        _ => Err(ApiError::new(format!("MEXC returned code {}: {}", field(object, "code"), field(object, "message")), response, body)),
    }
}
