//! Client configuration
//!
//! Settings are read from `FORUM_`-prefixed environment variables layered
//! over built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Backend address used when `FORUM_API_URL` is not set
pub const DEFAULT_API_URL: &str = "http://localhost:5005";

/// Forum client configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the forum backend, without trailing slash
    pub api_url: String,
    /// JSON file used to persist the session; memory only when unset
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    /// Per-request timeout in seconds; requests may hang forever when unset
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Create a new ClientConfig from environment variables
    ///
    /// # Environment Variables
    /// - `FORUM_API_URL`: backend base URL (default: "http://localhost:5005")
    /// - `FORUM_SESSION_FILE`: path of the session file (default: unset)
    /// - `FORUM_REQUEST_TIMEOUT_SECS`: request timeout in seconds (default: unset)
    pub fn from_env() -> ConfigResult<Self> {
        let settings = config::Config::builder()
            .set_default("api_url", DEFAULT_API_URL)?
            .add_source(config::Environment::with_prefix("FORUM"))
            .build()?;

        let mut config: ClientConfig = settings.try_deserialize()?;
        config.api_url = config.api_url.trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_url must start with http:// or https://, got {:?}",
                self.api_url
            )));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Request timeout as a duration, if one is configured
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_file: None,
            request_timeout_secs: None,
        }
    }
}
