//! Configuration types for invoice-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`ApiConfig::base_url`]
pub const ENV_API_URL: &str = "INVOICE_DL_API_URL";
/// Environment variable overriding [`DownloadDefaults::max_invoices`]
pub const ENV_MAX_INVOICES: &str = "INVOICE_DL_MAX_INVOICES";
/// Environment variable overriding [`DownloadDefaults::provider`]
pub const ENV_PROVIDER: &str = "INVOICE_DL_PROVIDER";
/// Environment variable overriding [`ApiConfig::request_timeout`] (seconds)
pub const ENV_REQUEST_TIMEOUT: &str = "INVOICE_DL_REQUEST_TIMEOUT";

/// Backend connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the invoice backend (default: "http://localhost:8001")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for short request/response calls (status, providers, OTP submission)
    ///
    /// The job stream itself is long-running and is only bounded by the
    /// connect timeout; it ends when the server closes it or the job is cancelled.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// TCP connect timeout for every request (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Defaults applied when building [`DownloadParams`](crate::types::DownloadParams)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadDefaults {
    /// Invoice cap used by [`Config::default_params`] (default: 100)
    #[serde(default = "default_max_invoices")]
    pub max_invoices: u32,

    /// Provider selected when the operator does not pick one (None = backend default)
    #[serde(default)]
    pub provider: Option<String>,
}

impl Default for DownloadDefaults {
    fn default() -> Self {
        Self {
            max_invoices: default_max_invoices(),
            provider: None,
        }
    }
}

/// 2FA challenge settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChallengeConfig {
    /// Minimum code length checked before a submission is attempted (default: 4)
    #[serde(default = "default_min_code_length")]
    pub min_code_length: usize,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            min_code_length: default_min_code_length(),
        }
    }
}

/// Main configuration for invoice-dl
///
/// Fields are organized into sub-configs:
/// - [`api`](ApiConfig): backend URL, timeouts, user agent
/// - [`download`](DownloadDefaults): default job parameters
/// - [`challenge`](ChallengeConfig): 2FA code validation
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Default job parameters
    #[serde(default)]
    pub download: DownloadDefaults,

    /// 2FA challenge settings
    #[serde(default)]
    pub challenge: ChallengeConfig,
}

impl Config {
    /// Load configuration from a JSON file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from defaults overridden by environment variables
    ///
    /// A `.env` file in the working directory (or a parent) is loaded first if present.
    /// Recognized variables: `INVOICE_DL_API_URL`, `INVOICE_DL_MAX_INVOICES`,
    /// `INVOICE_DL_PROVIDER`, `INVOICE_DL_REQUEST_TIMEOUT` (seconds).
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }

        let mut config = Config::default();

        if let Ok(url) = std::env::var(ENV_API_URL) {
            config.api.base_url = url;
        }
        if let Ok(raw) = std::env::var(ENV_MAX_INVOICES) {
            config.download.max_invoices = parse_env(ENV_MAX_INVOICES, &raw)?;
        }
        if let Ok(provider) = std::env::var(ENV_PROVIDER) {
            let provider = provider.trim().to_lowercase();
            config.download.provider = (!provider.is_empty()).then_some(provider);
        }
        if let Ok(raw) = std::env::var(ENV_REQUEST_TIMEOUT) {
            config.api.request_timeout = Duration::from_secs(parse_env(ENV_REQUEST_TIMEOUT, &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url).map_err(|e| Error::Config {
            message: format!("base URL '{}' is invalid: {}", self.api.base_url, e),
            key: Some("api.base_url".to_string()),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("base URL must use http or https, not '{}'", url.scheme()),
                key: Some("api.base_url".to_string()),
            });
        }

        let timeout = self.api.request_timeout.as_secs();
        if !(1..=300).contains(&timeout) {
            return Err(Error::Config {
                message: format!("request timeout must be between 1 and 300 seconds, not {timeout}"),
                key: Some("api.request_timeout".to_string()),
            });
        }

        if self.download.max_invoices == 0 {
            return Err(Error::Config {
                message: "max_invoices must be positive".to_string(),
                key: Some("download.max_invoices".to_string()),
            });
        }

        if self.challenge.min_code_length == 0 {
            return Err(Error::Config {
                message: "min_code_length must be at least 1".to_string(),
                key: Some("challenge.min_code_length".to_string()),
            });
        }

        Ok(())
    }

    /// Job parameters pre-filled from [`DownloadDefaults`]
    pub fn default_params(&self) -> crate::types::DownloadParams {
        let mut params = crate::types::DownloadParams::new(self.download.max_invoices);
        params.provider = self.download.provider.clone();
        params
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| Error::Config {
        message: format!("{key}='{raw}' is invalid: {e}"),
        key: Some(key.to_string()),
    })
}

fn default_base_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    concat!("invoice-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_invoices() -> u32 {
    100
}

fn default_min_code_length() -> usize {
    4
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
