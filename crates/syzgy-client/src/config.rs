//! Connection settings for the SyzgyDB service

use url::Url;

use crate::error::{SyzgyError, SyzgyResult};

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Configuration for the HTTP connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service base URL, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Value of the `User-Agent` header
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("syzgy-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Read `SYZGY_URL` and `SYZGY_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("SYZGY_URL") {
            config.base_url = url;
        }
        if let Some(secs) = std::env::var("SYZGY_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
        {
            config.timeout_secs = secs;
        }
        config
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, connect_timeout_secs: u64) -> Self {
        self.connect_timeout_secs = connect_timeout_secs;
        self
    }

    /// Set user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Check that the base URL is an absolute http(s) URL.
    pub fn validate(&self) -> SyzgyResult<()> {
        let parsed = Url::parse(&self.base_url).map_err(|err| {
            SyzgyError::InvalidArgument(format!("invalid base url `{}`: {err}", self.base_url))
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(SyzgyError::InvalidArgument(format!(
                "unsupported url scheme `{other}`, expected http or https"
            ))),
        }
    }
}
