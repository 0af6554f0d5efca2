//! Job start and event-stream consumption.

use crate::backend::ProgressCallback;
use crate::error::{DownloadError, Result};
use crate::event_stream::{EventStreamDecoder, StreamFrame};
use crate::types::{DownloadParams, DownloadResult, ProgressEvent, StreamError};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use super::challenge::classify_stream_error;
use super::{ApiClient, error_detail};

const DOWNLOAD_PATH: &str = "api/download";

/// Meaning of one decoded stream frame
#[derive(Debug)]
pub enum JobEvent {
    /// Progress tick
    Progress(ProgressEvent),
    /// Terminal result (the stream may still continue)
    Done(DownloadResult),
    /// Terminal error, already classified
    Failed(DownloadError),
    /// Malformed payload or unknown event type
    Ignored,
}

/// Interpret a decoded frame
///
/// Malformed `progress` and `done` payloads are ignored rather than failing the
/// job. A malformed `error` payload still fails the job, carrying the raw payload.
pub fn interpret_frame(frame: &StreamFrame) -> JobEvent {
    match frame.event.as_str() {
        "progress" => match serde_json::from_str::<ProgressEvent>(&frame.data) {
            Ok(progress) => JobEvent::Progress(progress),
            Err(e) => {
                tracing::debug!(error = %e, data = %frame.data, "skipping malformed progress payload");
                JobEvent::Ignored
            }
        },
        "done" => match serde_json::from_str::<DownloadResult>(&frame.data) {
            Ok(result) => JobEvent::Done(result),
            Err(e) => {
                tracing::warn!(error = %e, data = %frame.data, "skipping malformed done payload");
                JobEvent::Ignored
            }
        },
        "error" => match serde_json::from_str::<StreamError>(&frame.data) {
            Ok(error) => JobEvent::Failed(classify_stream_error(error)),
            Err(_) => JobEvent::Failed(DownloadError::Application {
                detail: frame.data.clone(),
            }),
        },
        other => {
            tracing::trace!(event = other, "ignoring unknown stream event");
            JobEvent::Ignored
        }
    }
}

impl ApiClient {
    /// Start a download job and follow its event stream to a terminal outcome
    ///
    /// Progress ticks are passed to `on_progress` in stream order. The call returns
    /// once the stream ends (with the last `done` payload), an `error` event arrives,
    /// or `cancel` fires. Cancellation is checked before the request and at every
    /// suspension point; once observed, no further chunk is read.
    ///
    /// # Errors
    ///
    /// - `OtpRequired` - the request was rejected with 401, or the job reported a
    ///   2FA challenge
    /// - `RequestFailed` - any other non-2xx answer
    /// - `Application` - the job reported an error
    /// - `NoResult` - the stream ended without a `done` payload
    /// - `Cancelled` - `cancel` fired
    /// - `Network` - transport failure
    pub async fn start_download(
        &self,
        params: &DownloadParams,
        cancel: &CancellationToken,
        on_progress: ProgressCallback<'_>,
    ) -> Result<DownloadResult> {
        if cancel.is_cancelled() {
            tracing::debug!("download cancelled before request");
            return Err(DownloadError::Cancelled.into());
        }

        let url = self.endpoint(DOWNLOAD_PATH)?;
        tracing::info!(
            provider = params.provider.as_deref().unwrap_or("default"),
            max_invoices = params.max_invoices,
            year = ?params.year,
            month = ?params.month,
            force = params.force_redownload,
            "starting download job"
        );

        let request = self.http.post(url).json(params).send();
        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("download cancelled while waiting for response");
                return Err(DownloadError::Cancelled.into());
            }
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let detail = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("download cancelled while reading error response");
                    return Err(DownloadError::Cancelled.into());
                }
                detail = error_detail(response) => detail,
            };
            if status == StatusCode::UNAUTHORIZED {
                tracing::info!(detail = %detail, "backend requires a 2FA code");
                return Err(DownloadError::OtpRequired { detail }.into());
            }
            tracing::warn!(status = status.as_u16(), detail = %detail, "download request rejected");
            return Err(DownloadError::RequestFailed {
                status: Some(status.as_u16()),
                detail,
            }
            .into());
        }

        let mut decoder = EventStreamDecoder::new();
        let mut result: Option<DownloadResult> = None;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    decoder.finish();
                    tracing::debug!("download cancelled while streaming");
                    return Err(DownloadError::Cancelled.into());
                }
                chunk = response.chunk() => chunk?,
            };
            let Some(chunk) = chunk else {
                break;
            };

            for frame in decoder.feed(&chunk) {
                match interpret_frame(&frame) {
                    JobEvent::Progress(progress) => on_progress(progress),
                    JobEvent::Done(done) => {
                        tracing::debug!(count = done.count, "received terminal result");
                        result = Some(done);
                    }
                    JobEvent::Failed(error) => {
                        tracing::info!(error = %error, "job reported an error");
                        return Err(error.into());
                    }
                    JobEvent::Ignored => {}
                }
            }
        }

        decoder.finish();
        match result {
            Some(result) => {
                tracing::info!(count = result.count, files = result.files.len(), "download job finished");
                Ok(result)
            }
            None => {
                tracing::warn!("stream ended without a result");
                Err(DownloadError::NoResult.into())
            }
        }
    }
}
