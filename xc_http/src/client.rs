use std::time::Duration;

use reqwest::Client;
use reqwest::ClientBuilder;

use crate::errors::AttemptError;
use crate::errors::Result;
use crate::request::RequestParts;
use crate::response::RawResponse;

/// Configuration for HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum idle connections per host (default: 50)
    pub pool_max_idle_per_host: usize,

    /// Idle timeout for connections (default: 90s)
    pub pool_idle_timeout: Duration,

    /// Connection establishment timeout (default: 5s)
    pub connect_timeout: Duration,

    /// Per-attempt request timeout (default: 10s)
    pub request_timeout: Duration,

    /// TCP keepalive interval (default: 60s)
    pub tcp_keepalive: Duration,

    /// Enable TCP_NODELAY (default: true)
    pub tcp_nodelay: bool,

    /// HTTP/2 adaptive window sizing (default: true)
    pub http2_adaptive_window: bool,

    /// HTTP/2 keep-alive interval (default: 30s)
    pub http2_keep_alive_interval: Duration,

    /// HTTP/2 keep-alive timeout (default: 20s)
    pub http2_keep_alive_timeout: Duration,

    /// Enable Hickory DNS for async resolution (default: true)
    pub hickory_dns: bool,

    /// User-Agent header sent with every request
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 50,
            pool_idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            tcp_keepalive: Duration::from_secs(60),
            tcp_nodelay: true,
            http2_adaptive_window: true,
            http2_keep_alive_interval: Duration::from_secs(30),
            http2_keep_alive_timeout: Duration::from_secs(20),
            hickory_dns: true,
            user_agent: None,
        }
    }
}

impl HttpClientConfig {
    /// Configuration with shorter timeouts.
    pub fn low_latency() -> Self {
        Self {
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            tcp_keepalive: Duration::from_secs(30),
            http2_keep_alive_interval: Duration::from_secs(20),
            http2_keep_alive_timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }
}

/// Pooled HTTP transport shared by every exchange client
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            // Connection pooling
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            // TCP optimization
            .tcp_nodelay(config.tcp_nodelay)
            .tcp_keepalive(Some(config.tcp_keepalive))
            // Timeouts
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            // TLS with rustls
            .use_rustls_tls()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            // HTTP/2
            .http2_adaptive_window(config.http2_adaptive_window)
            .http2_keep_alive_interval(Some(config.http2_keep_alive_interval))
            .http2_keep_alive_timeout(config.http2_keep_alive_timeout)
            // Compression
            .gzip(true)
            .brotli(true);

        if config.hickory_dns {
            builder = builder.hickory_dns(true);
        }

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        let client = builder.build()?;

        Ok(Self { client, config })
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Send `parts` and read the whole body
    ///
    /// Any status is returned as a response; only connect, timeout and body read failures are errors.
    pub async fn send(&self, parts: &RequestParts) -> std::result::Result<RawResponse, AttemptError> {
        let url = parts.url();
        tracing::debug!(method = %parts.method, url = %url, "Sending request");

        let mut request = self.client.request(parts.method.into(), url.as_str());

        for (name, value) in &parts.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &parts.body {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(AttemptError::transport)?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        let body = response.bytes().await.map_err(AttemptError::transport)?;

        Ok(RawResponse { status, url, headers, body })
    }
}
