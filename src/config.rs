use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::sign::{RECV_WINDOW_MS, REDACTED};
use crate::validator::DEFAULT_QUOTE_ASSET;

pub const TESTNET_BASE_URL: &str = "https://testnet.binancefuture.com";

/// API key and secret handed in by whoever loads credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("API key cannot be empty".to_string()));
        }
        if self.api_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("API secret cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &REDACTED)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub recv_window: u64,
    pub quote_asset: String,
    /// Refuse any base URL that is not a testnet host.
    pub testnet_only: bool,
    /// Response bodies longer than this are truncated in audit records.
    pub max_logged_body: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: TESTNET_BASE_URL.to_string(),
            timeout_ms: 10_000,
            recv_window: RECV_WINDOW_MS,
            quote_asset: DEFAULT_QUOTE_ASSET.to_string(),
            testnet_only: false,
            max_logged_body: 512,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_recv_window(mut self, recv_window: u64) -> Self {
        self.recv_window = recv_window;
        self
    }

    pub fn with_quote_asset(mut self, quote_asset: impl Into<String>) -> Self {
        self.quote_asset = quote_asset.into();
        self
    }

    pub fn with_testnet_only(mut self, testnet_only: bool) -> Self {
        self.testnet_only = testnet_only;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Base URL without a trailing slash, parsed.
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        Ok(Url::parse(self.base_url.trim_end_matches('/'))?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.parsed_base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "Unsupported URL scheme: {}",
                url.scheme()
            )));
        }
        if self.testnet_only && !self.base_url.contains("testnet") {
            return Err(ConfigError::Invalid(format!(
                "Base URL {} is not a testnet host",
                self.base_url
            )));
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        // The exchange caps recvWindow at 60 seconds.
        if self.recv_window == 0 || self.recv_window > 60_000 {
            return Err(ConfigError::Invalid(format!(
                "recvWindow must be between 1 and 60000, got {}",
                self.recv_window
            )));
        }

        if self.quote_asset.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Quote asset cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
