//! Job lifecycle control: start, cancel, reset.

use crate::types::{DownloadParams, JobId, Phase, ProgressEvent};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::DownloadSession;
use super::state::STATUS_STARTING;

/// Handle to a job started by a session
#[derive(Debug)]
pub struct JobHandle {
    job: JobId,
    handle: JoinHandle<Option<Phase>>,
}

impl JobHandle {
    /// Id of the job
    pub fn job(&self) -> JobId {
        self.job
    }

    /// The job task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job to settle
    ///
    /// Returns the phase the session moved to, or `None` if the job was superseded
    /// (or the session reset) before its outcome arrived.
    pub async fn finished(self) -> Option<Phase> {
        match self.handle.await {
            Ok(phase) => phase,
            Err(e) => {
                tracing::error!(job = self.job.get(), error = %e, "download task panicked");
                None
            }
        }
    }
}

impl DownloadSession {
    /// Start a download job
    ///
    /// Allowed from any phase. A live job is cancelled and superseded: its
    /// progress and outcome no longer touch the session. Any parameters pending
    /// a challenge are discarded.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use invoice_dl::*;
    /// # async fn example(session: DownloadSession) {
    /// let handle = session.start(DownloadParams::new(50).provider("freebox").year(2024));
    /// match handle.finished().await {
    ///     Some(Phase::Completed) => println!("{:?}", session.snapshot().result),
    ///     Some(Phase::ChallengePending) => println!("2FA code needed"),
    ///     other => println!("job ended in {:?}", other),
    /// }
    /// # }
    /// ```
    pub fn start(&self, params: DownloadParams) -> JobHandle {
        let (job, cancel) = self.transition(|inner, events| {
            inner.begin(params.clone(), STATUS_STARTING, events)
        });
        self.spawn_job(job, params, cancel)
    }

    /// Request cancellation of the running job
    ///
    /// Returns `true` if a running job was signalled. The session moves to
    /// `Cancelled` once the job observes the signal; outside `Running` this is a
    /// no-op returning `false`.
    pub fn cancel(&self) -> bool {
        let signalled = self.transition(|inner, _| inner.request_cancel());
        if signalled {
            tracing::info!("cancellation requested");
        }
        signalled
    }

    /// Return to `Idle`, discarding any live job and pending challenge
    ///
    /// Vendor reference data is kept. Outcomes of the discarded job are ignored.
    pub fn reset(&self) {
        self.transition(|inner, events| inner.reset(events));
        tracing::info!("session reset");
    }

    /// Run one job on its own task and settle the session with its outcome
    pub(crate) fn spawn_job(
        &self,
        job: JobId,
        params: DownloadParams,
        cancel: CancellationToken,
    ) -> JobHandle {
        let session = self.clone();
        let handle = tokio::spawn(async move {
            let reporter = session.clone();
            let mut on_progress = move |progress: ProgressEvent| {
                reporter.transition(|inner, events| inner.progress(job, progress, events));
            };

            let outcome = session
                .backend
                .start_download(&params, &cancel, &mut on_progress)
                .await;

            session.transition(|inner, events| inner.settle(job, outcome, events))
        });

        JobHandle { job, handle }
    }
}
