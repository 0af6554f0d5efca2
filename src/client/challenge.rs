//! 2FA code submission and challenge detection.

use crate::error::{DownloadError, Result};
use crate::types::{OtpRequest, OtpResult, StreamError};

use super::ApiClient;

const SUBMIT_OTP_PATH: &str = "api/submit-otp";
const CHECK_2FA_PATH: &str = "api/check-2fa";

/// Text fallback for recognizing a 2FA challenge in an error detail
///
/// Case-insensitive substring match on "2FA" or "OTP". Only consulted when the
/// backend did not send an explicit `requires_otp` flag.
pub fn detail_mentions_otp(detail: &str) -> bool {
    let detail = detail.to_lowercase();
    detail.contains("2fa") || detail.contains("otp")
}

/// Classify a stream `error` payload
///
/// An explicit `requires_otp` flag always wins; the text fallback only applies
/// when the flag is absent.
pub(crate) fn classify_stream_error(error: StreamError) -> DownloadError {
    let requires_otp = error
        .requires_otp
        .unwrap_or_else(|| detail_mentions_otp(&error.detail));

    if requires_otp {
        DownloadError::OtpRequired {
            detail: error.detail,
        }
    } else {
        DownloadError::Application {
            detail: error.detail,
        }
    }
}

impl ApiClient {
    /// Submit a 2FA code
    ///
    /// A rejected code is a successful call returning `success: false`. Transport
    /// and HTTP-level failures are returned as errors.
    pub async fn submit_otp(&self, code: &str) -> Result<OtpResult> {
        tracing::info!("submitting 2FA code");
        let request = OtpRequest {
            otp_code: code.to_string(),
        };
        let result: OtpResult = self.post_json(SUBMIT_OTP_PATH, &request).await?;
        tracing::debug!(
            success = result.success,
            requires_otp = result.requires_otp,
            "2FA submission answered"
        );
        Ok(result)
    }

    /// Ask the backend whether a 2FA code is currently required
    pub async fn check_2fa(&self) -> Result<OtpResult> {
        self.get_json(CHECK_2FA_PATH).await
    }
}
