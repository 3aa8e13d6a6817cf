//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::errors::{ElmError, Result};

/// Default translation endpoint of a locally running cql-translation-service
pub const DEFAULT_WEBSERVICE_URL: &str = "http://localhost:8080/cql/translator";

/// Prefix for environment overrides, e.g. `CQL_TO_ELM_WEBSERVICE_URL`
pub const ENV_PREFIX: &str = "CQL_TO_ELM";

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Configuration for the translation client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Endpoint every request is posted to
    pub webservice_url: String,
    /// Whole-request timeout; `None` leaves requests unbounded
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Fail with `BoundaryNotFound` instead of falling back to a single segment
    #[serde(default)]
    pub require_boundary: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            webservice_url: DEFAULT_WEBSERVICE_URL.to_string(),
            timeout_ms: None,
            require_boundary: false,
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Build a configuration pointing at `url` with everything else defaulted
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            webservice_url: url.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let webservice_url = std::env::var("CQL_TO_ELM_WEBSERVICE_URL")
            .unwrap_or_else(|_| DEFAULT_WEBSERVICE_URL.to_string());

        let timeout_ms = match std::env::var("CQL_TO_ELM_TIMEOUT_MS") {
            Ok(raw) => Some(raw.parse::<u64>().map_err(|e| ElmError::ConfigError {
                message: format!("CQL_TO_ELM_TIMEOUT_MS: {}", e),
            })?),
            Err(_) => None,
        };

        let require_boundary = match std::env::var("CQL_TO_ELM_REQUIRE_BOUNDARY") {
            Ok(raw) => raw.parse::<bool>().map_err(|e| ElmError::ConfigError {
                message: format!("CQL_TO_ELM_REQUIRE_BOUNDARY: {}", e),
            })?,
            Err(_) => false,
        };

        Ok(Self {
            webservice_url,
            timeout_ms,
            require_boundary,
            user_agent: default_user_agent(),
        })
    }

    /// Layer defaults, an optional config file and `CQL_TO_ELM_*` variables
    ///
    /// The result is not validated so callers can apply overrides first;
    /// `ElmTranslator::new` validates before building a client.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("webservice_url", DEFAULT_WEBSERVICE_URL)?
            .set_default("require_boundary", false)?
            .set_default("user_agent", default_user_agent())?;

        if let Some(path) = path {
            if !path.exists() {
                return Err(ElmError::FileError {
                    path: path.display().to_string(),
                    message: "Config file not found".to_string(),
                });
            }
            debug!("Reading config file {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }

        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        info!("Translation endpoint: {}", config.webservice_url);
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.webservice_url.trim().is_empty() {
            return Err(ElmError::ConfigError {
                message: "webservice_url is required".to_string(),
            });
        }

        if !(self.webservice_url.starts_with("http://")
            || self.webservice_url.starts_with("https://"))
        {
            return Err(ElmError::ConfigError {
                message: format!(
                    "webservice_url must be an http(s) URL, got {}",
                    self.webservice_url
                ),
            });
        }

        if self.timeout_ms == Some(0) {
            return Err(ElmError::ConfigError {
                message: "timeout_ms must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Request timeout as a `Duration`, if configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
