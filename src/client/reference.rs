//! Backend status and vendor reference data.

use crate::error::Result;
use crate::types::{ProviderInfo, ProvidersResponse, StatusResponse};

use super::ApiClient;

const STATUS_PATH: &str = "api/status";
const PROVIDERS_PATH: &str = "api/providers";

impl ApiClient {
    /// Fetch the backend status (`otp_required` means a 2FA code is pending)
    pub async fn status(&self) -> Result<StatusResponse> {
        self.get_json(STATUS_PATH).await
    }

    /// Fetch the known vendors and whether each can be used
    pub async fn providers(&self) -> Result<Vec<ProviderInfo>> {
        let response: ProvidersResponse = self.get_json(PROVIDERS_PATH).await?;
        tracing::debug!(count = response.providers.len(), "fetched providers");
        Ok(response.providers)
    }
}
