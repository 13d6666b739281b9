use std::borrow::Cow;

use bytes::Bytes;

/// Fully-read HTTP response handed to the executor and validators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, url: String::new(), headers: Vec::new(), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Result of a successful execution
///
/// `Full` is produced when the caller asked for the raw response alongside the body.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<B> {
    Body(B),
    Full(RawResponse, B),
}

impl<B> Reply<B> {
    pub fn body(&self) -> &B {
        match self {
            Self::Body(body) | Self::Full(_, body) => body,
        }
    }

    pub fn into_body(self) -> B {
        match self {
            Self::Body(body) | Self::Full(_, body) => body,
        }
    }

    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            Self::Body(_) => None,
            Self::Full(response, _) => Some(response),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        assert!(RawResponse::new(200, "").is_success());
        assert!(RawResponse::new(204, "").is_success());
        assert!(!RawResponse::new(301, "").is_success());
        assert!(!RawResponse::new(404, "").is_success());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let mut response = RawResponse::new(200, "");
        response.headers.push(("Content-Type".to_string(), "application/json".to_string()));

        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn test_reply_accessors() {
        let full = Reply::Full(RawResponse::new(200, "1"), 1);
        assert!(full.is_full());
        assert_eq!(full.response().map(|r| r.status), Some(200));
        assert_eq!(full.into_body(), 1);

        let body = Reply::<i32>::Body(2);
        assert!(body.response().is_none());
        assert_eq!(*body.body(), 2);
    }
}
