use std::convert::Infallible;

use serde_json::Value;

use super::ClientBuilder;
use super::Exchange;
use super::Venue;
use super::expect_object;
use crate::errors::ApiError;
use crate::errors::Result;
use crate::executor::ExecutionSettings;
use crate::request::Params;
use crate::response::RawResponse;
use crate::response::Reply;

const INDEXER_MAINNET_HTTP: &str = "https://indexer.dydx.trade";

pub type DydxClientBuilder = ClientBuilder<DydxClient>;

/// dYdX v4 indexer client
#[derive(Clone)]
pub struct DydxClient {
    venue: Venue,
}

impl Exchange for DydxClient {
    const NAME: &'static str = "dYdX";
    const BASE_URL: &'static str = INDEXER_MAINNET_HTTP;

    type Auth = Infallible;

    fn assemble(venue: Venue, _auth: Option<Infallible>) -> Self {
        Self { venue }
    }
}

impl DydxClient {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> DydxClientBuilder {
        DydxClientBuilder::default()
    }

    pub fn with_settings(&self, settings: ExecutionSettings) -> Self {
        Self { venue: self.venue.with_settings(settings) }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    /// `params` may carry `ticker`, `limit`
    pub async fn get_perpetual_markets(&self, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/v4/perpetualMarkets").query(params);
        self.venue.public("dydx.indexer.http.markets.get_perpetual_markets", parts, check).await
    }

    /// Candles for `market` (e.g. `BTC-USD`); `params` may carry `limit`, `fromISO`, `toISO`
    pub async fn get_candles(&self, market: &str, resolution: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get(format!("/v4/candles/perpetualMarkets/{market}")).query(params.with("resolution", resolution));
        self.venue.public("dydx.indexer.http.markets.get_candles", parts, check).await
    }
}

/// The indexer reports errors through HTTP status only
fn check(response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
    expect_object(response, body).map(|_| ())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_check_only_requires_object() {
        let response = RawResponse::new(200, "");
        assert!(check(&response, &json!({"markets": {}})).is_ok());
        assert!(check(&response, &json!({"errors": [{"msg": "x"}]})).is_ok());
        assert!(check(&response, &json!([])).is_err());
    }

    #[test]
    fn test_custom_base_url_is_trimmed() {
        let client = DydxClient::builder().base_url("https://indexer.v4testnet.dydx.exchange/").build().unwrap();
        assert_eq!(client.venue().base_url(), "https://indexer.v4testnet.dydx.exchange");
    }
}
