//! HTTP client for the invoice backend.
//!
//! The `ApiClient` methods are organized by concern:
//! - [`download`] - job start and event-stream consumption
//! - [`challenge`] - 2FA code submission and status check
//! - [`reference`] - backend status and vendor reference data
//!
//! The client is stateless between calls: it never holds a job, a cancellation
//! handle or a pending challenge. Those belong to the session.

mod challenge;
mod download;
mod reference;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use challenge::detail_mentions_otp;
pub use download::{JobEvent, interpret_frame};

use crate::backend::{InvoiceBackend, ProgressCallback};
use crate::config::Config;
use crate::error::{DownloadError, Error, Result};
use crate::types::{
    DownloadParams, DownloadResult, OtpResult, ProviderInfo, StatusResponse,
};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Client for the invoice backend REST and streaming endpoints
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    request_timeout: Duration,
}

impl ApiClient {
    /// Create a client from configuration
    ///
    /// # Errors
    /// Returns a configuration error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = normalize_base_url(&config.api.base_url)?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.api.connect_timeout)
            .user_agent(config.api.user_agent.as_str())
            .build()
            .map_err(|e| Error::Config {
                message: format!("Failed to create HTTP client: {}", e),
                key: None,
            })?;

        Ok(Self {
            http,
            base_url,
            request_timeout: config.api.request_timeout,
        })
    }

    /// Base URL every endpoint is resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        decode_json(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;
        decode_json(response).await
    }
}

#[async_trait]
impl InvoiceBackend for ApiClient {
    async fn start_download(
        &self,
        params: &DownloadParams,
        cancel: &CancellationToken,
        on_progress: ProgressCallback<'_>,
    ) -> Result<DownloadResult> {
        ApiClient::start_download(self, params, cancel, on_progress).await
    }

    async fn submit_otp(&self, code: &str) -> Result<OtpResult> {
        ApiClient::submit_otp(self, code).await
    }

    async fn check_2fa(&self) -> Result<OtpResult> {
        ApiClient::check_2fa(self).await
    }

    async fn status(&self) -> Result<StatusResponse> {
        ApiClient::status(self).await
    }

    async fn providers(&self) -> Result<Vec<ProviderInfo>> {
        ApiClient::providers(self).await
    }
}

/// Parse the base URL so that relative endpoint paths append to it
fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|e| Error::Config {
        message: format!("base URL '{}' is invalid: {}", raw, e),
        key: Some("api.base_url".to_string()),
    })
}

/// Decode a JSON response, turning non-2xx answers into `RequestFailed`
async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let detail = error_detail(response).await;
        tracing::warn!(status = status.as_u16(), detail = %detail, "backend request failed");
        return Err(DownloadError::RequestFailed {
            status: Some(status.as_u16()),
            detail,
        }
        .into());
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Server-provided error detail, or the status line when there is none
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    detail_from_body(&body).unwrap_or_else(|| status.to_string())
}

fn detail_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(detail) if detail.trim().is_empty() => None,
        serde_json::Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}
