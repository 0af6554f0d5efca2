//! Backend seam used by the session state machine

use crate::Result;
use crate::types::{
    DownloadParams, DownloadResult, OtpResult, ProgressEvent, ProviderInfo, StatusResponse,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Progress observer passed into [`InvoiceBackend::start_download`]
///
/// Called synchronously from inside the download future, in decode order, and
/// never after that future has settled.
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(ProgressEvent) + Send);

/// Operations a [`DownloadSession`](crate::session::DownloadSession) needs from the backend
///
/// Implementations are stateless between calls. [`ApiClient`](crate::client::ApiClient)
/// is the HTTP implementation; tests can substitute scripted backends.
///
/// # Examples
///
/// ```no_run
/// use invoice_dl::{ApiClient, Config, DownloadParams, InvoiceBackend, ProgressEvent};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new(&Config::default())?;
/// let cancel = CancellationToken::new();
///
/// let result = client
///     .start_download(&DownloadParams::new(10), &cancel, &mut |p: ProgressEvent| {
///         println!("{}/{:?} {}", p.current, p.total(), p.message);
///     })
///     .await?;
/// println!("{} invoice(s)", result.count);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait InvoiceBackend: Send + Sync {
    /// Start a job and drive its event stream to a terminal outcome
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`](crate::DownloadError) for every protocol outcome
    /// other than success (`RequestFailed`, `OtpRequired`, `Application`,
    /// `NoResult`, `Cancelled`), or a transport error.
    async fn start_download(
        &self,
        params: &DownloadParams,
        cancel: &CancellationToken,
        on_progress: ProgressCallback<'_>,
    ) -> Result<DownloadResult>;

    /// Submit a 2FA code (single round trip, no retry)
    async fn submit_otp(&self, code: &str) -> Result<OtpResult>;

    /// Ask whether the backend currently needs a 2FA code
    async fn check_2fa(&self) -> Result<OtpResult>;

    /// Fetch the backend status
    async fn status(&self) -> Result<StatusResponse>;

    /// Fetch vendor reference data
    async fn providers(&self) -> Result<Vec<ProviderInfo>>;
}
