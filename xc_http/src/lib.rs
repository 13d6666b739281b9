//! Rate-limited, retrying REST clients for crypto exchange APIs.

pub mod client;
pub mod errors;
pub mod exchanges;
pub mod executor;
pub mod request;
pub mod response;
pub mod signing;

pub use client::HttpClient;
pub use client::HttpClientConfig;
pub use errors::ApiError;
pub use errors::AttemptError;
pub use errors::ErrorKind;
pub use errors::FailureReason;
pub use errors::HttpError;
pub use errors::RequestFailed;
pub use errors::Result;
pub use exchanges::BinanceClient;
pub use exchanges::BitgetAuth;
pub use exchanges::BitgetClient;
pub use exchanges::BybitAuth;
pub use exchanges::BybitClient;
pub use exchanges::DydxClient;
pub use exchanges::HtxAuth;
pub use exchanges::HtxClient;
pub use exchanges::KucoinAuth;
pub use exchanges::KucoinClient;
pub use exchanges::MexcAuth;
pub use exchanges::MexcClient;
pub use exchanges::OkxAuth;
pub use exchanges::OkxClient;
pub use executor::execute_request;
pub use executor::ExecutionSettings;
pub use executor::Request;
pub use request::Method;
pub use request::Params;
pub use request::RequestParts;
pub use response::RawResponse;
pub use response::Reply;
pub use signing::Signer;
