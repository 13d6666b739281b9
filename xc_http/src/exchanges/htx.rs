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
use crate::signing::iso_seconds;

pub const FUTURES_BASE_URL: &str = "https://api.hbdm.com";

/// Endpoint recommended for AWS-hosted callers
pub const FUTURES_AWS_BASE_URL: &str = "https://api.hbdm.vn";

/// HTX API key
#[derive(Clone, Deserialize)]
pub struct HtxAuth {
    pub access_key: String,
    pub secret_key: String,
}

impl HtxAuth {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self { access_key: access_key.into(), secret_key: secret_key.into() }
    }
}

impl fmt::Debug for HtxAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtxAuth").field("access_key", &self.access_key).finish_non_exhaustive()
    }
}

/// Signature v2: auth params join the query, which is sorted and signed as
/// `METHOD\nhost\npath\nquery`, then `Signature` is appended.
impl Signer for HtxAuth {
    fn sign_at(&self, parts: &mut RequestParts, now: OffsetDateTime) {
        let mut query = parts.query.clone();
        query.remove("Signature");
        query.set("AccessKeyId", self.access_key.as_str());
        query.set("SignatureMethod", "HmacSHA256");
        query.set("SignatureVersion", "2");
        query.set("Timestamp", iso_seconds(now));

        let mut query = query.sorted();
        let payload = format!("{}\n{}\n{}\n{}", parts.method, parts.host(), parts.path, query.encode());
        query.set("Signature", hmac_sha256_base64(&self.secret_key, &payload));

        parts.query = query;
    }
}

pub type HtxClientBuilder = ClientBuilder<HtxClient>;

/// HTX USDT-margined swaps client
#[derive(Clone)]
pub struct HtxClient {
    venue: Venue,
    auth: Option<HtxAuth>,
}

impl Exchange for HtxClient {
    const NAME: &'static str = "HTX";
    const BASE_URL: &'static str = FUTURES_BASE_URL;

    type Auth = HtxAuth;

    fn assemble(venue: Venue, auth: Option<HtxAuth>) -> Self {
        Self { venue, auth }
    }
}

impl HtxClient {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> HtxClientBuilder {
        HtxClientBuilder::default()
    }

    pub fn with_settings(&self, settings: ExecutionSettings) -> Self {
        Self { venue: self.venue.with_settings(settings), auth: self.auth.clone() }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    /// Depth for `contract_code`; `depth_type` is `step0`..`step19`
    pub async fn get_market_depth(&self, contract_code: &str, depth_type: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get("/linear-swap-ex/market/depth").query(Params::new().with("contract_code", contract_code).with("type", depth_type));
        self.venue.public("htx.new.usdtm_futures.market_data.get_market_depth", parts, check_market).await
    }

    pub async fn get_market_bbo(&self, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/linear-swap-ex/market/bbo").query(params);
        self.venue.public("htx.new.usdtm_futures.market_data.get_market_bbo", parts, check_market).await
    }

    /// `params` may carry `size`, `from`, `to`
    pub async fn get_kline_data(&self, contract_code: &str, period: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/linear-swap-ex/market/history/kline").query(params.with("contract_code", contract_code).with("period", period));
        self.venue.public("htx.new.usdtm_futures.market_data.get_kline_data", parts, check_market).await
    }

    pub async fn get_last_trade(&self, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/linear-swap-ex/market/trade").query(params);
        self.venue.public("htx.new.usdtm_futures.market_data.get_last_trade", parts, check_market).await
    }

    pub async fn query_funding_rate(&self, contract_code: &str) -> Result<Reply<Value>> {
        let parts = self.venue.get("/linear-swap-api/v1/swap_funding_rate").query(Params::new().with("contract_code", contract_code));
        self.venue.public("htx.new.usdtm_futures.reference_data.query_funding_rate", parts, check_reference).await
    }

    pub async fn query_batch_funding_rate(&self, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/linear-swap-api/v1/swap_batch_funding_rate").query(params);
        self.venue.public("htx.new.usdtm_futures.reference_data.query_batch_funding_rate", parts, check_reference).await
    }

    /// `params` may carry `page_index`, `page_size`
    pub async fn query_historical_funding_rate(&self, contract_code: &str, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/linear-swap-api/v1/swap_historical_funding_rate").query(params.with("contract_code", contract_code));
        self.venue.public("htx.new.usdtm_futures.reference_data.query_historical_funding_rate", parts, check_reference).await
    }

    pub async fn query_contract_info(&self, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/linear-swap-api/v1/swap_contract_info").query(params);
        self.venue.public("htx.new.usdtm_futures.reference_data.query_contract_info", parts, check_reference).await
    }

    pub async fn query_contract_elements(&self, params: Params) -> Result<Reply<Value>> {
        let parts = self.venue.get("/linear-swap-api/v1/swap_query_elements").query(params);
        self.venue.public("htx.new.usdtm_futures.reference_data.query_contract_elements", parts, check_reference).await
    }

    pub async fn place_order<T>(&self, order: &T) -> Result<Reply<Value>>
    where
        T: Serialize + ?Sized,
    {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.post("/linear-swap-api/v1/swap_order").json(order)?;
        self.venue.signed("htx.new.usdtm_futures.trade.place_order", parts, auth, check_reference).await
    }

    pub async fn query_unified_account_assets(&self, params: Params) -> Result<Reply<Value>> {
        let auth = require(&self.auth, Self::NAME)?;
        let parts = self.venue.get("/linear-swap-api/v3/unified_account_info").query(params);
        self.venue.signed("htx.new.usdtm_futures.unified_account.query_unified_account_assets", parts, auth, check_unified).await
    }
}

fn check_status(response: &RawResponse, body: &Value, code_key: &str, msg_key: &str) -> std::result::Result<(), ApiError> {
    let object = expect_object(response, body)?;

    match object.get("status").and_then(Value::as_str) {
        Some("ok") => Ok(()),
        _ => Err(ApiError::new(
            format!("HTX returned {}: {}: {}", field(object, "status"), field(object, code_key), field(object, msg_key)),
            response,
            body,
        )),
    }
}

/// Market data reports `err-code` / `err-msg`
fn check_market(response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
    check_status(response, body, "err-code", "err-msg")
}

/// Reference data and trading report `err_code` / `err_msg`
fn check_reference(response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
    check_status(response, body, "err_code", "err_msg")
}

/// v3 unified account endpoints report a numeric `code`
fn check_unified(response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
    let object = expect_object(response, body)?;

    match object.get("code").and_then(Value::as_i64) {
        Some(200) => Ok(()),
        _ => Err(ApiError::new(format!("HTX returned code {}: {}", field(object, "code"), field(object, "msg")), response, body)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    fn auth() -> HtxAuth {
        HtxAuth::new("htx-key", "htx-secret")
    }

    #[test]
    fn test_sign_appends_sorted_auth_params() {
        let mut parts = RequestParts::get(FUTURES_BASE_URL, "/linear-swap-api/v3/unified_account_info").query(Params::new().with("contract_code", "BTC-USDT"));
        auth().sign_at(&mut parts, datetime!(2024-01-02 03:04:05.678 UTC));

        assert_eq!(
            parts.path_with_query(),
            "/linear-swap-api/v3/unified_account_info?AccessKeyId=htx-key&SignatureMethod=HmacSHA256&SignatureVersion=2\
             &Timestamp=2024-01-02T03%3A04%3A05&contract_code=BTC-USDT&Signature=A7jRwPjQOixnN3BMLxhpB40a68iW4iSeNOMsp0TU5Yo%3D"
        );
        assert!(parts.headers.is_empty());
    }

    #[test]
    fn test_resigning_replaces_signature() {
        let mut parts = RequestParts::get(FUTURES_BASE_URL, "/linear-swap-api/v3/unified_account_info");
        auth().sign_at(&mut parts, datetime!(2024-01-02 03:04:05 UTC));
        auth().sign_at(&mut parts, datetime!(2024-01-02 03:04:09 UTC));

        assert_eq!(parts.query.iter().filter(|(key, _)| *key == "Signature").count(), 1);
        assert_eq!(parts.query.get("Timestamp"), Some("2024-01-02T03:04:09"));
    }

    #[test]
    fn test_check_market() {
        let response = RawResponse::new(200, "");
        assert!(check_market(&response, &json!({"status": "ok", "tick": {}})).is_ok());

        let error = check_market(&response, &json!({"status": "error", "err-code": "invalid-parameter", "err-msg": "invalid contract code"})).unwrap_err();
        assert_eq!(error.message, "HTX returned error: invalid-parameter: invalid contract code");
    }

    #[test]
    fn test_check_reference() {
        let response = RawResponse::new(200, "");
        let error = check_reference(&response, &json!({"status": "error", "err_code": 1014, "err_msg": "This contract doesn't exist."})).unwrap_err();
        assert_eq!(error.message, "HTX returned error: 1014: This contract doesn't exist.");
    }

    #[test]
    fn test_check_unified() {
        let response = RawResponse::new(200, "");
        assert!(check_unified(&response, &json!({"code": 200, "msg": "", "data": []})).is_ok());

        let error = check_unified(&response, &json!({"code": 1030, "msg": "Abnormal service"})).unwrap_err();
        assert_eq!(error.message, "HTX returned code 1030: Abnormal service");
    }

    #[test]
    fn test_aws_base_url() {
        let client = HtxClient::builder().base_url(FUTURES_AWS_BASE_URL).build().unwrap();
        assert_eq!(client.venue().base_url(), FUTURES_AWS_BASE_URL);
    }
}
