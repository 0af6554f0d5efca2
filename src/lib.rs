//! # invoice-dl
//!
//! Client library that drives server-side invoice download jobs.
//!
//! The backend scrapes vendor portals (Amazon, Free Mobile, Freebox, ...) and
//! streams the progress of each job as server-sent events. Some vendors stop
//! mid-job and ask for a 2FA code; this crate surfaces that challenge, submits the
//! operator's code and restarts the interrupted job with the same parameters.
//!
//! ## Design Philosophy
//!
//! invoice-dl is designed to be:
//! - **Library-first** - No UI, a session object any front end can drive
//! - **Event-driven** - Consumers subscribe to events or watch snapshots, no polling required
//! - **Cancellable** - Every suspension point of a job honours cancellation
//! - **Sensible defaults** - Works out of the box against a local backend
//!
//! ## Quick Start
//!
//! ```no_run
//! use invoice_dl::{ChallengeOutcome, Config, DownloadParams, DownloadSession, Phase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = DownloadSession::new(Config::default())?;
//!     session.bootstrap().await;
//!
//!     // Subscribe to events
//!     let mut events = session.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let params = DownloadParams::new(50).provider("free_mobile").year(2024);
//!     if session.start(params).finished().await == Some(Phase::ChallengePending) {
//!         if let ChallengeOutcome::Resumed(job) = session.submit_challenge("123456").await? {
//!             job.finished().await;
//!         }
//!     }
//!
//!     println!("{:?}", session.snapshot().result);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Backend abstraction used by the session
pub mod backend;
/// HTTP client for the invoice backend
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Server-sent event stream decoding
pub mod event_stream;
/// Download session state machine
pub mod session;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use backend::{InvoiceBackend, ProgressCallback};
pub use client::ApiClient;
pub use config::Config;
pub use error::{DownloadError, Error, Result};
pub use event_stream::{EventStreamDecoder, StreamFrame};
pub use session::{ChallengeOutcome, DownloadSession, JobHandle, SessionSnapshot};
pub use types::{
    DownloadParams, DownloadResult, JobId, OtpResult, Phase, ProgressEvent, ProviderInfo,
    SessionEvent, StatusResponse,
};

/// Helper function to cancel the running job on a termination signal.
///
/// Waits for a termination signal and then calls the session's `cancel()` method.
/// Returns whether a running job was signalled.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use invoice_dl::{Config, DownloadSession, run_until_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let session = DownloadSession::new(Config::from_env()?)?;
///     let job = session.start(session.config().default_params());
///
///     tokio::select! {
///         phase = job.finished() => println!("finished: {:?}", phase),
///         _ = run_until_signal(&session) => println!("interrupted"),
///     }
///
///     Ok(())
/// }
/// ```
pub async fn run_until_signal(session: &DownloadSession) -> bool {
    wait_for_signal().await;
    let signalled = session.cancel();
    tracing::info!(signalled, phase = %session.phase(), "shutdown signal handled");
    signalled
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut terminate, mut interrupt) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(terminate), Ok(interrupt)) => (terminate, interrupt),
        (Err(e), _) | (_, Err(e)) => {
            // Sandboxes may refuse signal registration; Ctrl+C still works there
            tracing::warn!(error = %e, "signal handlers unavailable, waiting for ctrl_c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl_c");
            }
            return;
        }
    };

    let name = tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
    };
    tracing::info!(signal = name, "received shutdown signal");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl_c");
        return;
    }
    tracing::info!(signal = "ctrl_c", "received shutdown signal");
}
