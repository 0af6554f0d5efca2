//! Scripted backend for exercising the session without a server.

use crate::backend::{InvoiceBackend, ProgressCallback};
use crate::config::Config;
use crate::error::{DownloadError, Error, Result};
use crate::session::DownloadSession;
use crate::types::{
    DownloadParams, DownloadResult, OtpResult, Phase, ProgressEvent, ProviderInfo, SessionEvent,
    StatusResponse,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio_util::sync::CancellationToken;

/// How one scripted download behaves
pub(crate) enum Script {
    /// Report the ticks, then settle with the outcome
    Run {
        progress: Vec<ProgressEvent>,
        outcome: Result<DownloadResult>,
    },
    /// Report the ticks, then wait for cancellation
    Hang { progress: Vec<ProgressEvent> },
    /// Wait for `release` regardless of cancellation, then report the ticks and settle
    Stubborn {
        release: Arc<Notify>,
        progress: Vec<ProgressEvent>,
        outcome: Result<DownloadResult>,
    },
}

/// Backend calls, in the order they were made
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    Download(DownloadParams),
    SubmitOtp(String),
    Check2fa,
    Status,
    Providers,
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    downloads: Mutex<VecDeque<Script>>,
    otp_answers: Mutex<VecDeque<Result<OtpResult>>>,
    status: Mutex<Option<StatusResponse>>,
    providers: Mutex<Option<Vec<ProviderInfo>>>,
    calls: Mutex<Vec<Call>>,
    /// Tokens handed to each download, in call order
    tokens: Mutex<Vec<CancellationToken>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_download(&self, script: Script) {
        self.downloads.lock().unwrap().push_back(script);
    }

    pub(crate) fn push_otp_answer(&self, answer: Result<OtpResult>) {
        self.otp_answers.lock().unwrap().push_back(answer);
    }

    pub(crate) fn set_status(&self, status: &str, message: &str) {
        *self.status.lock().unwrap() = Some(StatusResponse {
            status: status.to_string(),
            message: message.to_string(),
        });
    }

    pub(crate) fn set_providers(&self, providers: Vec<ProviderInfo>) {
        *self.providers.lock().unwrap() = Some(providers);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn download_calls(&self) -> Vec<DownloadParams> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Download(params) => Some(params),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn otp_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SubmitOtp(code) => Some(code),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn token(&self, index: usize) -> CancellationToken {
        self.tokens.lock().unwrap()[index].clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl InvoiceBackend for ScriptedBackend {
    async fn start_download(
        &self,
        params: &DownloadParams,
        cancel: &CancellationToken,
        on_progress: ProgressCallback<'_>,
    ) -> Result<DownloadResult> {
        self.record(Call::Download(params.clone()));
        self.tokens.lock().unwrap().push(cancel.clone());
        let script = self.downloads.lock().unwrap().pop_front();

        match script {
            Some(Script::Run { progress, outcome }) => {
                for tick in progress {
                    if cancel.is_cancelled() {
                        return Err(DownloadError::Cancelled.into());
                    }
                    on_progress(tick);
                    tokio::task::yield_now().await;
                }
                outcome
            }
            Some(Script::Hang { progress }) => {
                for tick in progress {
                    on_progress(tick);
                }
                cancel.cancelled().await;
                Err(DownloadError::Cancelled.into())
            }
            Some(Script::Stubborn {
                release,
                progress,
                outcome,
            }) => {
                release.notified().await;
                for tick in progress {
                    on_progress(tick);
                }
                outcome
            }
            None => Err(DownloadError::Application {
                detail: "no scripted download left".to_string(),
            }
            .into()),
        }
    }

    async fn submit_otp(&self, code: &str) -> Result<OtpResult> {
        self.record(Call::SubmitOtp(code.to_string()));
        self.otp_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(otp_answer(true, "Code OTP accepté", false)))
    }

    async fn check_2fa(&self) -> Result<OtpResult> {
        self.record(Call::Check2fa);
        let pending = self
            .status
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|s| s.requires_otp());
        Ok(otp_answer(!pending, "", pending))
    }

    async fn status(&self) -> Result<StatusResponse> {
        self.record(Call::Status);
        self.status.lock().unwrap().clone().ok_or_else(|| {
            DownloadError::RequestFailed {
                status: Some(500),
                detail: "status unavailable".to_string(),
            }
            .into()
        })
    }

    async fn providers(&self) -> Result<Vec<ProviderInfo>> {
        self.record(Call::Providers);
        self.providers.lock().unwrap().clone().ok_or_else(|| {
            DownloadError::RequestFailed {
                status: None,
                detail: "connection refused".to_string(),
            }
            .into()
        })
    }
}

/// Session over a scripted backend with default configuration
pub(crate) fn create_test_session(backend: &Arc<ScriptedBackend>) -> DownloadSession {
    DownloadSession::with_backend(Config::default(), backend.clone())
}

pub(crate) fn tick(current: u64, total: i64, message: &str) -> ProgressEvent {
    ProgressEvent {
        current,
        total: Some(total),
        message: message.to_string(),
    }
}

pub(crate) fn result(count: u32) -> DownloadResult {
    DownloadResult {
        success: true,
        message: format!("{} facture(s) téléchargée(s)", count),
        count,
        files: (1..=count).map(|i| format!("invoice-{i}.pdf")).collect(),
    }
}

pub(crate) fn otp_answer(success: bool, message: &str, requires_otp: bool) -> OtpResult {
    OtpResult {
        success,
        message: message.to_string(),
        requires_otp,
    }
}

pub(crate) fn otp_required(detail: &str) -> Error {
    DownloadError::OtpRequired {
        detail: detail.to_string(),
    }
    .into()
}

pub(crate) fn provider(id: &str, configured: bool) -> ProviderInfo {
    ProviderInfo {
        id: id.to_string(),
        name: id.to_uppercase(),
        configured,
        implemented: true,
    }
}

/// Wait until the session reaches `phase`, failing the test after a few seconds
pub(crate) async fn wait_for_phase(session: &DownloadSession, phase: Phase) {
    let mut rx = session.watch();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|snapshot| snapshot.phase == phase),
    )
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {phase}; now {}", session.phase()))
    .unwrap();
}

/// Drain every event that is already buffered
pub(crate) fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
