//! Session record and its transitions.
//!
//! Every transition runs under the session lock and pushes the events it produces
//! into `events`; the caller broadcasts them before the lock is released so that
//! observers see transitions in the order they were applied.

use crate::error::{DownloadError, Error, Result};
use crate::types::{
    DownloadParams, DownloadResult, JobId, OtpResult, Phase, ProgressEvent, ProviderInfo,
    SessionEvent,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

pub(crate) const STATUS_IDLE: &str = "Ready";
pub(crate) const STATUS_STARTING: &str = "Starting download...";
pub(crate) const STATUS_DOWNLOADING: &str = "Downloading invoices...";
pub(crate) const STATUS_COMPLETED: &str = "Download complete";
pub(crate) const STATUS_CANCELLED: &str = "Download cancelled";
pub(crate) const STATUS_FAILED: &str = "Download failed";
pub(crate) const STATUS_RESUMING: &str = "2FA code accepted, resuming download...";
pub(crate) const STATUS_CHALLENGE_CLEARED: &str = "2FA code accepted";
pub(crate) const CHALLENGE_REJECTED: &str = "Invalid 2FA code";
pub(crate) const CHALLENGE_SUBMIT_FAILED: &str = "Failed to submit 2FA code";

/// Read-only view of a session, handed to observers
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Current phase
    pub phase: Phase,
    /// Human-readable status line
    pub status: String,
    /// Last progress tick of the running job
    pub progress: Option<ProgressEvent>,
    /// Result of the last completed job
    pub result: Option<DownloadResult>,
    /// Error message of the last failed job
    pub error: Option<String>,
    /// Why the last challenge submission did not go through
    pub challenge_error: Option<String>,
    /// Parameters that will be resumed once the challenge is answered
    pub pending_resume: Option<DownloadParams>,
    /// Parameters of the job in flight
    pub in_flight: Option<DownloadParams>,
    /// Job currently owned by the session
    pub job: Option<JobId>,
    /// Vendor reference data (empty until bootstrap succeeds)
    pub providers: Vec<ProviderInfo>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            status: STATUS_IDLE.to_string(),
            progress: None,
            result: None,
            error: None,
            challenge_error: None,
            pending_resume: None,
            in_flight: None,
            job: None,
            providers: Vec::new(),
        }
    }
}

impl SessionSnapshot {
    /// A job is in flight
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// The session is waiting for a 2FA code
    pub fn awaits_challenge(&self) -> bool {
        self.phase == Phase::ChallengePending
    }
}

/// What a submitted code led to, decided under the lock
pub(crate) enum ChallengeDecision {
    /// Restart with the pending parameters
    Resume(JobId, CancellationToken, DownloadParams),
    /// No job to resume; back to idle
    Cleared,
    /// Code not accepted, still waiting
    Rejected(String),
}

/// Mutable session state, owned by the session lock
#[derive(Default)]
pub(crate) struct Inner {
    pub(crate) snapshot: SessionSnapshot,
    /// Cancellation handle of the live job; replaced only by `begin` and `reset`
    cancel: Option<CancellationToken>,
    /// Last job id handed out
    job_seq: u64,
    /// Bumped by every transition that invalidates an in-progress challenge exchange
    epoch: u64,
}

impl Inner {
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    fn set_phase(&mut self, phase: Phase, events: &mut Vec<SessionEvent>) {
        if self.snapshot.phase != phase {
            self.snapshot.phase = phase;
            events.push(SessionEvent::PhaseChanged { phase });
        }
    }

    fn is_current(&self, job: JobId) -> bool {
        self.snapshot.job == Some(job)
    }

    /// Start a new job, superseding any live one
    pub(crate) fn begin(
        &mut self,
        params: DownloadParams,
        status: &str,
        events: &mut Vec<SessionEvent>,
    ) -> (JobId, CancellationToken) {
        if let Some(previous) = self.cancel.take() {
            if let Some(job) = self.snapshot.job {
                tracing::info!(job = job.get(), "superseding live download job");
            }
            previous.cancel();
        }

        self.job_seq += 1;
        self.epoch += 1;
        let job = JobId(self.job_seq);
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let snapshot = &mut self.snapshot;
        snapshot.job = Some(job);
        snapshot.in_flight = Some(params.clone());
        snapshot.pending_resume = None;
        snapshot.progress = None;
        snapshot.result = None;
        snapshot.error = None;
        snapshot.challenge_error = None;
        snapshot.status = status.to_string();

        self.set_phase(Phase::Running, events);
        events.push(SessionEvent::Started { job, params });
        (job, cancel)
    }

    /// Record a progress tick; ticks from superseded jobs are dropped
    pub(crate) fn progress(
        &mut self,
        job: JobId,
        progress: ProgressEvent,
        events: &mut Vec<SessionEvent>,
    ) -> bool {
        if !self.is_current(job) || self.snapshot.phase != Phase::Running {
            tracing::trace!(job = job.get(), "dropping progress from superseded job");
            return false;
        }

        self.snapshot.status = if progress.message.is_empty() {
            STATUS_DOWNLOADING.to_string()
        } else {
            progress.message.clone()
        };
        self.snapshot.progress = Some(progress.clone());
        events.push(SessionEvent::Progress { job, progress });
        true
    }

    /// Apply a job outcome; returns the phase the job settled in, or None if superseded
    pub(crate) fn settle(
        &mut self,
        job: JobId,
        outcome: Result<DownloadResult>,
        events: &mut Vec<SessionEvent>,
    ) -> Option<Phase> {
        if !self.is_current(job) {
            tracing::debug!(job = job.get(), "ignoring outcome of superseded job");
            return None;
        }

        self.cancel = None;
        self.snapshot.job = None;
        self.snapshot.progress = None;
        let params = self.snapshot.in_flight.take();

        match outcome {
            Ok(result) => {
                tracing::info!(job = job.get(), count = result.count, "download completed");
                self.snapshot.status = if result.message.is_empty() {
                    STATUS_COMPLETED.to_string()
                } else {
                    result.message.clone()
                };
                self.snapshot.result = Some(result.clone());
                self.set_phase(Phase::Completed, events);
                events.push(SessionEvent::Completed { job, result });
            }
            Err(Error::Download(DownloadError::Cancelled)) => {
                tracing::info!(job = job.get(), "download cancelled");
                self.snapshot.error = None;
                self.snapshot.status = STATUS_CANCELLED.to_string();
                self.set_phase(Phase::Cancelled, events);
                events.push(SessionEvent::Cancelled { job });
            }
            Err(Error::Download(DownloadError::OtpRequired { detail })) => {
                tracing::info!(job = job.get(), detail = %detail, "download paused on 2FA challenge");
                self.epoch += 1;
                let message = challenge_prompt(&detail);
                self.snapshot.pending_resume = params;
                self.snapshot.challenge_error = None;
                self.snapshot.status = message.clone();
                self.set_phase(Phase::ChallengePending, events);
                events.push(SessionEvent::ChallengeRequired { message });
            }
            Err(error) => {
                tracing::warn!(job = job.get(), error = %error, code = error.error_code(), "download failed");
                let message = error.to_string();
                self.snapshot.error = Some(message.clone());
                self.snapshot.status = STATUS_FAILED.to_string();
                self.set_phase(Phase::Failed, events);
                events.push(SessionEvent::Failed {
                    job,
                    error: message,
                });
            }
        }

        Some(self.snapshot.phase)
    }

    /// Signal the live job; the phase changes when its outcome arrives
    pub(crate) fn request_cancel(&mut self) -> bool {
        match (&self.cancel, self.snapshot.phase) {
            (Some(cancel), Phase::Running) => {
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Drop every job and challenge, keeping only reference data
    pub(crate) fn reset(&mut self, events: &mut Vec<SessionEvent>) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.epoch += 1;

        let providers = std::mem::take(&mut self.snapshot.providers);
        let phase = self.snapshot.phase;
        self.snapshot = SessionSnapshot {
            providers,
            phase,
            ..SessionSnapshot::default()
        };
        self.set_phase(Phase::Idle, events);
    }

    /// Backend reported a pending challenge at startup
    pub(crate) fn challenge_hint(&mut self, message: &str, events: &mut Vec<SessionEvent>) -> bool {
        if self.snapshot.phase != Phase::Idle {
            return false;
        }
        self.epoch += 1;
        let message = if message.trim().is_empty() {
            challenge_prompt("")
        } else {
            message.to_string()
        };
        self.snapshot.pending_resume = None;
        self.snapshot.status = message.clone();
        self.set_phase(Phase::ChallengePending, events);
        events.push(SessionEvent::ChallengeRequired { message });
        true
    }

    /// Record why a challenge submission did not go through
    pub(crate) fn challenge_error(&mut self, message: &str, events: &mut Vec<SessionEvent>) {
        self.snapshot.challenge_error = Some(message.to_string());
        events.push(SessionEvent::ChallengeRejected {
            message: message.to_string(),
        });
    }

    /// Apply the answer to a submitted code
    ///
    /// Returns None when the session moved on while the code was in flight.
    pub(crate) fn answer_challenge(
        &mut self,
        epoch: u64,
        answer: &OtpResult,
        events: &mut Vec<SessionEvent>,
    ) -> Option<ChallengeDecision> {
        if self.epoch != epoch || self.snapshot.phase != Phase::ChallengePending {
            tracing::debug!("ignoring 2FA answer for a discarded challenge");
            return None;
        }

        if !answer.success || answer.requires_otp {
            let message = if answer.message.is_empty() {
                CHALLENGE_REJECTED.to_string()
            } else {
                answer.message.clone()
            };
            self.challenge_error(&message, events);
            return Some(ChallengeDecision::Rejected(message));
        }

        match self.snapshot.pending_resume.take() {
            Some(params) => {
                let (job, cancel) = self.begin(params.clone(), STATUS_RESUMING, events);
                Some(ChallengeDecision::Resume(job, cancel, params))
            }
            None => {
                self.epoch += 1;
                self.snapshot.challenge_error = None;
                self.snapshot.status = if answer.message.is_empty() {
                    STATUS_CHALLENGE_CLEARED.to_string()
                } else {
                    answer.message.clone()
                };
                self.set_phase(Phase::Idle, events);
                Some(ChallengeDecision::Cleared)
            }
        }
    }
}

fn challenge_prompt(detail: &str) -> String {
    if detail.trim().is_empty() {
        "2FA code required, enter the code you received".to_string()
    } else {
        format!("2FA code required: {}", detail)
    }
}
