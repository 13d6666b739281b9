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
use crate::request::Method;
use crate::request::Params;
use crate::request::RequestParts;
use crate::response::RawResponse;
use crate::response::Reply;
use crate::signing::Signer;
use crate::signing::hmac_sha256_hex;
use crate::signing::timestamp_ms;

const BYBIT_BASE_URL: &str = "https://api.bybit.com";
const RECV_WINDOW: &str = "5000";

/// Bybit API key
#[derive(Clone, Deserialize)]
pub struct BybitAuth {
    pub key: String,
    pub secret: String,

    /// Receive window in milliseconds
    #[serde(default = "default_recv_window")]
    pub recv_window: String,
}

fn default_recv_window() -> String {
    RECV_WINDOW.to_string()
}

impl BybitAuth {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { key: key.into(), secret: secret.into(), recv_window: default_recv_window() }
    }
}

impl fmt::Debug for BybitAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BybitAuth").field("key", &self.key).field("recv_window", &self.recv_window).finish_non_exhaustive()
    }
}

/// `hex(hmac(timestamp + key + recv_window + (query | body)))`
impl Signer for BybitAuth {
    fn sign_at(&self, parts: &mut RequestParts, now: OffsetDateTime) {
        let timestamp = timestamp_ms(now).to_string();
        let signed = match parts.method {
            Method::Post => parts.body_str().to_string(),
            Method::Get | Method::Delete => parts.query.encode(),
        };
        let signature = hmac_sha256_hex(&self.secret, &format!("{}{}{}{}", timestamp, self.key, self.recv_window, signed));

        parts.set_header("X-BAPI-API-KEY", &self.key);
        parts.set_header("X-BAPI-SIGN", signature);
        parts.set_header("X-BAPI-SIGN-TYPE", "2");
        parts.set_header("X-BAPI-TIMESTAMP", timestamp);
        parts.set_header("X-BAPI-RECV-WINDOW", &self.recv_window);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetLeverage<'a> {
    category: &'a str,
    symbol: &'a str,
    buy_leverage: &'a str,
    sell_leverage: &'a str,
}

pub type BybitClientBuilder = ClientBuilder<BybitClient>;

/// Bybit V5 unified API client
#[derive(Clone)]
pub struct BybitClient {
    venue: Venue,
    auth: Option<BybitAuth>,
}

impl Exchange for BybitClient {
    const NAME: &'static str = "Bybit";
    const BASE_URL: &'static str = BYBIT_BASE_URL;

    type Auth = BybitAuth;

    fn assemble(venue: Venue, auth: Option<BybitAuth>) -> Self {
        Self { venue, auth }
    }
}

impl BybitClient {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> BybitClientBuilder {
        BybitClientBuilder::default()
    }

    pub fn with_settings(&self, settings: ExecutionSettings) -> Self {
        Self { venue: self.venue.with_settings(settings), auth: self.auth.clone() }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    /// Klines; `params` may carry `category`, `start`, `end`, `limit`
    pub async fn get_kline(&self, symbol: &str, interval: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/v5/market/kline").query(params.with("symbol", symbol).with("interval", interval));
        self.venue.public("bybit.v5.market.get_kline", parts, check).await
    }

    pub async fn get_instruments_info(&self, category: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/v5/market/instruments-info").query(params.with("category", category));
        self.venue.public("bybit.v5.market.get_instruments_info", parts, check).await
    }

    pub async fn get_tickers(&self, category: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/v5/market/tickers").query(params.with("category", category));
        self.venue.public("bybit.v5.market.get_tickers", parts, check).await
    }

    pub async fn get_funding_rate_history(&self, category: &str, symbol: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/v5/market/funding/history").query(params.with("category", category).with("symbol", symbol));
        self.venue.public("bybit.v5.market.get_funding_rate_history", parts, check).await
    }

    /// Amount of `coin` that can be withdrawn from the unified account
    pub async fn get_transferable_amount_unified(&self, coin: &str) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/v5/account/withdrawal").query(Params::new().with("coinName", coin));
        self.venue.signed("bybit.v5.account.get_transferable_amount_unified", parts, auth, check).await
    }

    pub async fn get_position_info(&self, category: &str, params: Params) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/v5/position/list").query(params.with("category", category));
        self.venue.signed("bybit.v5.position.get_position_info", parts, auth, check).await
    }

    pub async fn set_leverage(&self, category: &str, symbol: &str, buy: &str, sell: &str) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let payload = SetLeverage { category, symbol, buy_leverage: buy, sell_leverage: sell };
        let parts = self.venue.post("/v5/position/set-leverage").json(&payload)?;
        self.venue.signed("bybit.v5.position.set_leverage", parts, auth, check).await
    }

    /// Take-profit, stop-loss or trailing stop for a position; sent once
    pub async fn set_trading_stop<T>(&self, data: &T) -> Result<Reply<Value>>
    where
        T: Serialize + ?Sized,
    {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/v5/position/trading-stop").json(data)?;
        self.venue.signed_once("bybit.v5.position.set_trading_stop", parts, auth, check).await
    }

    pub async fn get_closed_pnl(&self, category: &str, params: Params) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/v5/position/closed-pnl").query(params.with("category", category));
        self.venue.signed("bybit.v5.position.get_closed_pnl", parts, auth, check).await
    }

    /// Sent once
    pub async fn place_order<T>(&self, order: &T) -> Result<Reply<Value>>
    where
        T: Serialize + ?Sized,
    {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/v5/order/create").json(order)?;
        self.venue.signed_once("bybit.v5.trade.place_order", parts, auth, check).await
    }
}

fn check(response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
    let object = expect_object(response, body)?;

    match object.get("retCode").and_then(Value::as_i64) {
        Some(0) => Ok(()),
        _ => Err(ApiError::new(format!("Bybit returned code {}: {}", field(object, "retCode"), field(object, "retMsg")), response, body)),
    }
}
