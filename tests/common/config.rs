//! Test configuration helpers for mock and live backends

use invoice_dl::{Config, DownloadSession};
use wiremock::MockServer;

/// Error type for test configuration
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Configuration pointing at a mock backend
pub fn mock_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config
}

/// Session talking to a mock backend over HTTP
pub fn create_mock_session(server: &MockServer) -> DownloadSession {
    DownloadSession::new(mock_config(server)).unwrap()
}

/// Load the live backend configuration from `.env` and the environment
///
/// Required environment variables:
/// - `INVOICE_DL_API_URL` - Backend base URL (e.g., http://localhost:8001)
///
/// Optional environment variables:
/// - `INVOICE_DL_PROVIDER` - Vendor to download from
/// - `INVOICE_DL_MAX_INVOICES` - Invoice cap (tests override it to keep runs short)
pub fn load_live_config() -> Result<Config, ConfigError> {
    if !has_live_backend() {
        return Err(ConfigError(
            "INVOICE_DL_API_URL not set in environment".to_string(),
        ));
    }
    Config::from_env().map_err(|e| ConfigError(format!("Failed to load config: {}", e)))
}

/// Create a session for the live backend
pub fn create_live_session() -> Result<DownloadSession, ConfigError> {
    let config = load_live_config()?;
    DownloadSession::new(config).map_err(|e| ConfigError(format!("Failed to create session: {}", e)))
}

/// Check if a live backend is configured
pub fn has_live_backend() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("INVOICE_DL_API_URL").is_ok()
}

/// Skip test if no live backend is configured
#[macro_export]
macro_rules! skip_if_no_backend {
    () => {
        if !$crate::common::has_live_backend() {
            eprintln!("Skipping test: INVOICE_DL_API_URL not found in .env");
            return;
        }
    };
}
