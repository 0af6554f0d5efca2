//! Error types for invoice-dl
//!
//! This module provides the error taxonomy used by the download client and the
//! session state machine:
//! - Download protocol failures ([`DownloadError`]): request failures, 2FA
//!   challenges, application errors reported by the job, missing results and
//!   cancellation
//! - Local failures: challenge code validation, invalid state transitions,
//!   configuration problems
//! - Machine-readable error codes for logging and UI mapping

use thiserror::Error;

/// Result type alias for invoice-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for invoice-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.base_url")
        key: Option<String>,
    },

    /// Download protocol error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Input rejected locally before any network call was made
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation not allowed in the session's current phase
    #[error("cannot {operation} while session is {phase}")]
    InvalidState {
        /// The operation that was attempted (e.g., "submit challenge")
        operation: String,
        /// The phase that prevents the operation
        phase: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid endpoint URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while driving a download job
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The job-start request failed before any stream existed
    #[error("request failed: {detail}")]
    RequestFailed {
        /// HTTP status, when the server answered at all
        status: Option<u16>,
        /// Server-provided detail, or the status line
        detail: String,
    },

    /// The backend is blocked on an interactive 2FA code
    #[error("2FA code required: {detail}")]
    OtpRequired {
        /// Server-provided detail
        detail: String,
    },

    /// The job reported an error that is not a 2FA challenge
    #[error("download failed: {detail}")]
    Application {
        /// Server-provided detail
        detail: String,
    },

    /// The stream ended without a terminal result
    #[error("stream ended without a result")]
    NoResult,

    /// The job was cancelled by the operator or superseded by a newer job
    #[error("download cancelled")]
    Cancelled,
}

impl Error {
    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Download(e) => match e {
                DownloadError::RequestFailed { .. } => "request_failed",
                DownloadError::OtpRequired { .. } => "otp_required",
                DownloadError::Application { .. } => "application_error",
                DownloadError::NoResult => "no_result",
                DownloadError::Cancelled => "cancelled",
            },
            Error::Validation(_) => "validation_error",
            Error::InvalidState { .. } => "invalid_state",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Url(_) => "invalid_url",
            Error::Io(_) => "io_error",
        }
    }

    /// True if the operation ended because cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Download(DownloadError::Cancelled))
    }

    /// True if the backend needs an interactive 2FA code before it can proceed
    pub fn requires_otp(&self) -> bool {
        matches!(self, Error::Download(DownloadError::OtpRequired { .. }))
    }

    /// True for transport and HTTP-level failures (no usable response)
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Download(DownloadError::RequestFailed { .. })
        )
    }
}
