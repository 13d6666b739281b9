use std::path::Path;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use xc_http::ExecutionSettings;
use xc_http::HttpClientConfig;
use xc_ratelimit::MinSpacing;

/// Environment overrides look like `XC_EXECUTION__RETRIES=5`
pub const ENV_PREFIX: &str = "XC";

/// Retry policy shared by every client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub retries: u32,
    pub delay_ms: u64,
    pub backoff: f64,
    pub full: bool,
    pub max_delay_ms: Option<u64>,
    pub deadline_ms: Option<u64>,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self { retries: 3, delay_ms: 1000, backoff: 2.0, full: false, max_delay_ms: None, deadline_ms: None }
    }
}

impl ExecutionSection {
    pub fn settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            retries: self.retries,
            delay: Duration::from_millis(self.delay_ms),
            backoff: self.backoff,
            full: self.full,
            max_delay: self.max_delay_ms.map(Duration::from_millis),
            deadline: self.deadline_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub interval_ms: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self { interval_ms: xc_ratelimit::DEFAULT_INTERVAL.as_millis() as u64 }
    }
}

impl RateLimitSection {
    pub fn limiter(&self) -> MinSpacing {
        MinSpacing::new(Duration::from_millis(self.interval_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub pool_max_idle_per_host: usize,
    pub user_agent: Option<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        let defaults = HttpClientConfig::default();
        Self {
            connect_timeout_ms: defaults.connect_timeout.as_millis() as u64,
            request_timeout_ms: defaults.request_timeout.as_millis() as u64,
            pool_max_idle_per_host: defaults.pool_max_idle_per_host,
            user_agent: None,
        }
    }
}

impl HttpSection {
    pub fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            user_agent: self.user_agent.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct XcConfig {
    pub execution: ExecutionSection,
    pub rate_limit: RateLimitSection,
    pub http: HttpSection,

    /// JSON secrets file for private endpoints
    pub secrets_path: Option<String>,
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__").try_parsing(true)
}

fn build(path: Option<&Path>, env: Environment) -> Result<XcConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    builder.add_source(env).build()?.try_deserialize()
}

/// Load the file at `path` (format from its extension), then apply `XC_` overrides
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<XcConfig, ConfigError> {
    build(Some(path.as_ref()), environment())
}

/// Defaults plus `XC_` overrides
pub fn load_env_config() -> Result<XcConfig, ConfigError> {
    build(None, environment())
}

/// Load config with fallback to default
pub fn load_or_default(path: &str) -> XcConfig {
    match load_config(path) {
        Ok(config) => {
            tracing::info!("Loaded config from {path}");
            config
        }
        Err(err) => {
            tracing::warn!("Failed to load config from {}: {}. Using defaults.", path, err);
            XcConfig::default()
        }
    }
}
