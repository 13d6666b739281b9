use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::response::RawResponse;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification the retry loop decides on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network failure, timeout or unreadable body
    Transport,

    /// 4xx status
    HttpClientError,

    /// 5xx status
    HttpServerError,

    /// Successful HTTP exchange carrying an exchange-reported failure
    ApplicationError,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transport | Self::HttpServerError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::HttpClientError => "http_client_error",
            Self::HttpServerError => "http_server_error",
            Self::ApplicationError => "application_error",
        };
        f.write_str(name)
    }
}

/// Failure of a single send/read attempt
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("Transport error: {0}")]
    Transport(BoxError),

    #[error("HTTP {status}: {}", snippet(.body))]
    Status { status: u16, body: String },

    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl AttemptError {
    pub fn transport<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Transport(error.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Decode(_) => ErrorKind::Transport,
            Self::Status { status, .. } if *status < 500 => ErrorKind::HttpClientError,
            Self::Status { .. } => ErrorKind::HttpServerError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// HTTP status, when the attempt got one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Why the retry loop gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NonRetryable { attempt: u32 },
    Exhausted { retries: u32 },
    DeadlineExceeded { attempt: u32 },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonRetryable { attempt } => write!(f, "non-retryable error encountered on attempt {attempt}"),
            Self::Exhausted { retries } => write!(f, "retry budget of {retries} attempt(s) exhausted"),
            Self::DeadlineExceeded { attempt } => write!(f, "deadline exceeded after {attempt} attempt(s)"),
        }
    }
}

/// Transport or protocol failure, carrying every attempt's error in order
#[derive(Error, Debug)]
#[error("{reason}: [{}]", join(.errors))]
pub struct RequestFailed {
    pub reason: FailureReason,
    pub errors: Vec<AttemptError>,
}

impl RequestFailed {
    pub fn new(reason: FailureReason, errors: Vec<AttemptError>) -> Self {
        Self { reason, errors }
    }

    /// Kind of the last attempt's failure
    pub fn kind(&self) -> ErrorKind {
        self.errors.last().map(AttemptError::kind).unwrap_or(ErrorKind::Transport)
    }

    pub fn attempts(&self) -> usize {
        self.errors.len()
    }
}

/// Exchange rejected the request despite a successful HTTP exchange
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub response: RawResponse,
    pub body: Value,
}

impl ApiError {
    pub fn new(message: impl Into<String>, response: &RawResponse, body: &Value) -> Self {
        Self { message: message.into(), response: response.clone(), body: body.clone() }
    }

    pub fn unexpected_type(response: &RawResponse, body: &Value) -> Self {
        Self::new("unexpected response type", response, body)
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ApplicationError
    }
}

#[derive(Error, Debug)]
pub enum HttpError {
    #[error(transparent)]
    RequestFailed(#[from] RequestFailed),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("JSON encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Missing credentials for {0}")]
    MissingCredentials(&'static str),
}

impl HttpError {
    /// Classification of request failures; `None` for local errors raised before sending
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::RequestFailed(failed) => Some(failed.kind()),
            Self::Api(api) => Some(api.kind()),
            Self::Client(_) | Self::Encode(_) | Self::MissingCredentials(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;

const SNIPPET_LEN: usize = 200;

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(SNIPPET_LEN) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

fn join(errors: &[AttemptError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
