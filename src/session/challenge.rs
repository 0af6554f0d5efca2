//! 2FA challenge handling and automatic resumption.

use crate::error::{Error, Result};
use crate::types::Phase;

use super::DownloadSession;
use super::control::JobHandle;
use super::state::{CHALLENGE_SUBMIT_FAILED, ChallengeDecision};

/// Result of submitting a 2FA code
#[derive(Debug)]
pub enum ChallengeOutcome {
    /// Code accepted; the interrupted job was restarted with its original parameters
    Resumed(JobHandle),
    /// Code accepted; there was no interrupted job, so the session is idle again
    Cleared,
    /// Code not accepted; the session keeps waiting for a code
    Rejected {
        /// Backend message for the operator
        message: String,
        /// The backend still (or again) requires a code
        requires_otp: bool,
    },
}

impl DownloadSession {
    /// Submit the operator's 2FA code
    ///
    /// Only valid while the session waits for a code. The code is trimmed and
    /// checked against the configured minimum length before anything is sent. When the backend accepts the code, the job that hit the
    /// challenge is restarted with exactly the parameters it was started with.
    ///
    /// # Errors
    ///
    /// - `InvalidState` - the session is not waiting for a code, or it moved on
    ///   while the code was being submitted
    /// - `Validation` - the code is too short (nothing is sent)
    /// - Transport and HTTP failures of the submission; the session keeps waiting
    pub async fn submit_challenge(&self, code: &str) -> Result<ChallengeOutcome> {
        let epoch = {
            let inner = self.lock();
            if inner.snapshot.phase != Phase::ChallengePending {
                return Err(Error::InvalidState {
                    operation: "submit challenge".to_string(),
                    phase: inner.snapshot.phase.to_string(),
                });
            }
            inner.epoch()
        };

        let code = code.trim();
        let min_length = self.config.challenge.min_code_length;
        if code.chars().count() < min_length {
            let message = format!("2FA code must have at least {} characters", min_length);
            self.transition(|inner, events| {
                if inner.epoch() == epoch {
                    inner.challenge_error(&message, events);
                }
            });
            return Err(Error::Validation(message));
        }

        let answer = match self.backend.submit_otp(code).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "2FA code submission failed");
                self.transition(|inner, events| {
                    if inner.epoch() == epoch {
                        inner.challenge_error(CHALLENGE_SUBMIT_FAILED, events);
                    }
                });
                return Err(e);
            }
        };

        let decision = self.transition(|inner, events| {
            inner
                .answer_challenge(epoch, &answer, events)
                .ok_or_else(|| Error::InvalidState {
                    operation: "apply 2FA answer".to_string(),
                    phase: inner.snapshot.phase.to_string(),
                })
        })?;

        Ok(match decision {
            ChallengeDecision::Resume(job, cancel, params) => {
                tracing::info!(job = job.get(), "2FA code accepted, resuming download");
                ChallengeOutcome::Resumed(self.spawn_job(job, params, cancel))
            }
            ChallengeDecision::Cleared => {
                tracing::info!("2FA code accepted, no download to resume");
                ChallengeOutcome::Cleared
            }
            ChallengeDecision::Rejected(message) => {
                tracing::info!(requires_otp = answer.requires_otp, "2FA code rejected");
                ChallengeOutcome::Rejected {
                    message,
                    requires_otp: answer.requires_otp,
                }
            }
        })
    }

    /// Ask the backend whether it is blocked on a 2FA code
    ///
    /// Informational only; the session phase is not changed.
    pub async fn check_challenge(&self) -> Result<bool> {
        let result = self.backend.check_2fa().await?;
        Ok(result.requires_otp)
    }
}
