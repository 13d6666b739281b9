use std::convert::Infallible;

use serde_json::Value;

use super::ClientBuilder;
use super::Exchange;
use super::Venue;
use super::field;
use crate::errors::ApiError;
use crate::errors::Result;
use crate::executor::ExecutionSettings;
use crate::request::Params;
use crate::response::RawResponse;
use crate::response::Reply;

const USDS_FUTURES_BASE_URL: &str = "https://fapi.binance.com";

pub type BinanceClientBuilder = ClientBuilder<BinanceClient>;

/// Binance USDⓈ-M futures market data client
#[derive(Clone)]
pub struct BinanceClient {
    venue: Venue,
}

impl Exchange for BinanceClient {
    const NAME: &'static str = "Binance";
    const BASE_URL: &'static str = USDS_FUTURES_BASE_URL;

    type Auth = Infallible;

    fn assemble(venue: Venue, _auth: Option<Infallible>) -> Self {
        Self { venue }
    }
}

impl BinanceClient {
    /// Create a new Binance client with default configuration
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a new client builder
    pub fn builder() -> BinanceClientBuilder {
        BinanceClientBuilder::default()
    }

    /// Same client with different retry settings
    pub fn with_settings(&self, settings: ExecutionSettings) -> Self {
        Self { venue: self.venue.with_settings(settings) }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    /// Kline/candlestick bars; `params` may carry `startTime`, `endTime`, `limit`
    pub async fn get_kline(&self, symbol: &str, interval: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/fapi/v1/klines").query(params.with("symbol", symbol).with("interval", interval));
        self.venue.public("binance.derivatives.usdsm_futures.market_data.rest.get_kline", parts, check).await
    }

    pub async fn get_funding_rate_history(&self, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/fapi/v1/fundingRate").query(params);
        self.venue.public("binance.derivatives.usdsm_futures.market_data.rest.get_funding_rate_history", parts, check).await
    }

    /// Funding rate info for symbols with adjusted cap/floor or interval
    pub async fn get_funding_rate_info(&self) -> Result<Reply<Value>> {
        let parts = self.venue.get("/fapi/v1/fundingInfo");
        self.venue.public("binance.derivatives.usdsm_futures.market_data.rest.get_funding_rate_info", parts, check).await
    }

    /// Latest price for one symbol, or every symbol when `params` has no `symbol`
    pub async fn get_price_ticker_v2(&self, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/fapi/v2/ticker/price").query(params);
        self.venue.public("binance.derivatives.usdsm_futures.market_data.rest.get_price_ticker_v2", parts, check).await
    }
}

/// Objects carrying a `code` are errors; arrays are always data
fn check(response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
    match body {
        Value::Array(_) => Ok(()),
        Value::Object(object) if object.contains_key("code") => {
            Err(ApiError::new(format!("Binance returned code {}: {}", field(object, "code"), field(object, "msg")), response, body))
        }
        Value::Object(_) => Ok(()),
        _ => Err(ApiError::unexpected_type(response, body)),
    }
}
