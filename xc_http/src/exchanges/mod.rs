//! One client per exchange, all sharing the same request pipeline.
//!
//! Every endpoint method acquires the limiter slot for its operation key, runs the request
//! through [`execute_request`] with the client's settings and returns the JSON body.

pub mod binance;
pub mod bitget;
pub mod bybit;
pub mod dydx;
pub mod htx;
pub mod kucoin;
pub mod mexc;
pub mod okx;

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use xc_ratelimit::KeyedRateLimiter;
use xc_ratelimit::MinSpacing;

use crate::client::HttpClient;
use crate::client::HttpClientConfig;
use crate::errors::ApiError;
use crate::errors::AttemptError;
use crate::errors::HttpError;
use crate::errors::Result;
use crate::executor::ExecutionSettings;
use crate::executor::Request;
use crate::executor::SendFuture;
use crate::executor::execute_request;
use crate::request::RequestParts;
use crate::response::RawResponse;
use crate::response::Reply;
use crate::signing::Signer;

pub use binance::BinanceClient;
pub use bitget::BitgetAuth;
pub use bitget::BitgetClient;
pub use bybit::BybitAuth;
pub use bybit::BybitClient;
pub use dydx::DydxClient;
pub use htx::HtxAuth;
pub use htx::HtxClient;
pub use kucoin::KucoinAuth;
pub use kucoin::KucoinClient;
pub use mexc::MexcAuth;
pub use mexc::MexcClient;
pub use okx::OkxAuth;
pub use okx::OkxClient;

/// Application-level check run on a parsed body
pub type Check = fn(&RawResponse, &Value) -> std::result::Result<(), ApiError>;

/// Per-exchange wiring used by [`ClientBuilder`]
pub trait Exchange: Sized {
    /// Name used in logs and credential errors
    const NAME: &'static str;

    const BASE_URL: &'static str;

    type Auth: Signer + Clone + 'static;

    fn assemble(venue: Venue, auth: Option<Self::Auth>) -> Self;
}

/// Shared plumbing behind every exchange client
#[derive(Clone)]
pub struct Venue {
    http: HttpClient,
    base_url: String,
    limiter: Arc<dyn KeyedRateLimiter>,
    settings: ExecutionSettings,
}

impl Venue {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    pub fn limiter(&self) -> &Arc<dyn KeyedRateLimiter> {
        &self.limiter
    }

    pub(crate) fn with_settings(&self, settings: ExecutionSettings) -> Self {
        Self { settings, ..self.clone() }
    }

    pub(crate) fn get(&self, path: impl Into<String>) -> RequestParts {
        RequestParts::get(self.base_url.as_str(), path)
    }

    pub(crate) fn post(&self, path: impl Into<String>) -> RequestParts {
        RequestParts::post(self.base_url.as_str(), path)
    }

    /// Unsigned call with the client's settings
    pub(crate) async fn public(&self, key: &str, parts: RequestParts, check: Check) -> Result<Reply<Value>> {
        self.call(key, parts, None, check, self.settings).await
    }

    /// Signed call with the client's settings
    pub(crate) async fn signed(&self, key: &str, parts: RequestParts, signer: &dyn Signer, check: Check) -> Result<Reply<Value>> {
        self.call(key, parts, Some(signer), check, self.settings).await
    }

    /// Signed call limited to a single attempt, for requests that must not be applied twice
    pub(crate) async fn signed_once(&self, key: &str, parts: RequestParts, signer: &dyn Signer, check: Check) -> Result<Reply<Value>> {
        self.call(key, parts, Some(signer), check, self.settings.single_shot()).await
    }

    pub(crate) async fn call(&self, key: &str, parts: RequestParts, signer: Option<&dyn Signer>, check: Check, settings: ExecutionSettings) -> Result<Reply<Value>> {
        self.limiter.acquire(key).await;

        let endpoint = Endpoint { http: &self.http, parts, signer, check };

        execute_request(&endpoint, &settings).await.inspect_err(|error| {
            tracing::error!(key, kind = ?error.kind(), "Request failed: {}", error);
        })
    }
}

/// Credentials a private endpoint needs, checked before any slot is acquired
pub(crate) fn require<'a, A>(auth: &'a Option<A>, exchange: &'static str) -> Result<&'a A> {
    auth.as_ref().ok_or(HttpError::MissingCredentials(exchange))
}

struct Endpoint<'a> {
    http: &'a HttpClient,
    parts: RequestParts,
    signer: Option<&'a dyn Signer>,
    check: Check,
}

impl Request for Endpoint<'_> {
    type Body = Value;

    fn perform(&self) -> SendFuture<'_> {
        Box::pin(async move {
            match self.signer {
                Some(signer) => {
                    let mut parts = self.parts.clone();
                    signer.sign(&mut parts);
                    self.http.send(&parts).await
                }
                None => self.http.send(&self.parts).await,
            }
        })
    }

    fn parse(&self, response: &RawResponse) -> std::result::Result<Value, AttemptError> {
        Ok(serde_json::from_slice(&response.body)?)
    }

    fn validate(&self, response: &RawResponse, body: &Value) -> std::result::Result<(), ApiError> {
        (self.check)(response, body)
    }
}

/// Builder shared by every exchange client
pub struct ClientBuilder<E: Exchange> {
    http_config: HttpClientConfig,
    http: Option<HttpClient>,
    base_url: String,
    settings: ExecutionSettings,
    rate_limiter: Option<Arc<dyn KeyedRateLimiter>>,
    auth: Option<E::Auth>,
    _exchange: PhantomData<E>,
}

impl<E: Exchange> Default for ClientBuilder<E> {
    fn default() -> Self {
        Self {
            http_config: HttpClientConfig::default(),
            http: None,
            base_url: E::BASE_URL.to_string(),
            settings: ExecutionSettings::default(),
            rate_limiter: None,
            auth: None,
            _exchange: PhantomData,
        }
    }
}

impl<E: Exchange> ClientBuilder<E> {
    /// Set custom base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Configure HTTP client settings
    pub fn http_config(mut self, config: HttpClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Reuse an existing connection pool; `http_config` is ignored
    pub fn http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Default retry settings for every endpoint
    pub fn settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Share a limiter across clients; a private [`MinSpacing`] is used otherwise
    pub fn rate_limiter(mut self, limiter: Arc<dyn KeyedRateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Set API credentials for private endpoints
    pub fn credentials(mut self, auth: E::Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<E> {
        let http = match self.http {
            Some(http) => http,
            None => HttpClient::with_config(self.http_config)?,
        };

        let limiter = self.rate_limiter.unwrap_or_else(|| Arc::new(MinSpacing::default()));
        let base_url = self.base_url.trim_end_matches('/').to_string();

        Ok(E::assemble(Venue { http, base_url, limiter, settings: self.settings }, self.auth))
    }
}

pub(crate) fn expect_object<'a>(response: &RawResponse, body: &'a Value) -> std::result::Result<&'a Map<String, Value>, ApiError> {
    body.as_object().ok_or_else(|| ApiError::unexpected_type(response, body))
}

/// Render a body field for an error message; strings unquoted, absent fields as `null`
pub(crate) fn field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(value) => value.to_string(),
        None => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_field_rendering() {
        let body = json!({"code": "00000", "retCode": 10001, "msg": null});
        let object = body.as_object().unwrap();

        assert_eq!(field(object, "code"), "00000");
        assert_eq!(field(object, "retCode"), "10001");
        assert_eq!(field(object, "msg"), "null");
        assert_eq!(field(object, "missing"), "null");
    }

    #[test]
    fn test_expect_object_rejects_arrays() {
        let response = RawResponse::new(200, "[]");
        let error = expect_object(&response, &json!([])).unwrap_err();
        assert_eq!(error.message, "unexpected response type");
    }

    #[test]
    fn test_require_reports_exchange() {
        let missing: Option<BybitAuth> = None;
        let error = require(&missing, "Bybit").unwrap_err();
        assert!(matches!(error, HttpError::MissingCredentials("Bybit")));
    }
}
