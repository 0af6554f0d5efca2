//! Startup probe: backend status and vendor reference data.

use super::DownloadSession;
use super::state::SessionSnapshot;

impl DownloadSession {
    /// Load backend status and the vendor list
    ///
    /// If the backend reports a pending 2FA code and the session is idle, the
    /// session moves to `ChallengePending` with nothing to resume. Both requests are
    /// best effort: failures are logged and the vendor list falls back to empty.
    pub async fn bootstrap(&self) -> SessionSnapshot {
        let (status, providers) = tokio::join!(self.backend.status(), self.backend.providers());

        match status {
            Ok(status) if status.requires_otp() => {
                let applied =
                    self.transition(|inner, events| inner.challenge_hint(&status.message, events));
                tracing::info!(applied, "backend reports a pending 2FA code");
            }
            Ok(status) => {
                tracing::debug!(status = %status.status, "backend status");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch backend status");
            }
        }

        let providers = providers.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to fetch providers");
            Vec::new()
        });
        tracing::debug!(count = providers.len(), "loaded providers");

        self.transition(|inner, _| {
            inner.snapshot.providers = providers;
            inner.snapshot.clone()
        })
    }
}
