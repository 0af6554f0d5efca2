//! Core types for invoice-dl

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of one job started by a session
///
/// Every call that starts a job (initial start or automatic resumption) gets a new id.
/// Progress and outcomes carrying a stale id are ignored by the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters of one download job, sent as the body of `POST /api/download`
///
/// At most one of {single month, month set, date range} is meaningful at a time.
/// The client forwards whatever is set; the backend decides precedence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadParams {
    /// Vendor id (e.g. "amazon", "freebox"); backend default when None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Maximum number of invoices to retrieve
    pub max_invoices: u32,

    /// Year filter, used alone or with `month`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    /// Single month (1-12), used with `year`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,

    /// Set of months (1-12), used with `year`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months: Option<Vec<u32>>,

    /// First day of an inclusive date range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_start: Option<NaiveDate>,

    /// Last day of an inclusive date range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_end: Option<NaiveDate>,

    /// Download invoices again even if they already exist locally
    #[serde(default)]
    pub force_redownload: bool,
}

impl DownloadParams {
    /// Parameters with only an invoice cap set
    pub fn new(max_invoices: u32) -> Self {
        Self {
            provider: None,
            max_invoices,
            year: None,
            month: None,
            months: None,
            date_start: None,
            date_end: None,
            force_redownload: false,
        }
    }

    /// Select a vendor
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Restrict to a year
    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Restrict to a single month
    pub fn month(mut self, month: u32) -> Self {
        self.month = Some(month);
        self
    }

    /// Restrict to a set of months
    pub fn months(mut self, months: impl IntoIterator<Item = u32>) -> Self {
        self.months = Some(months.into_iter().collect());
        self
    }

    /// Restrict to an inclusive date range
    pub fn date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_start = Some(start);
        self.date_end = Some(end);
        self
    }

    /// Set the force-redownload flag
    pub fn force_redownload(mut self, force: bool) -> Self {
        self.force_redownload = force;
        self
    }
}

/// Progress tick reported by a running job (`progress` stream event)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Items processed so far
    pub current: u64,

    /// Expected item count; negative or absent means unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,

    /// Human-readable status
    #[serde(default)]
    pub message: String,
}

impl ProgressEvent {
    /// Expected item count, if the job knows it
    pub fn total(&self) -> Option<u64> {
        self.total.and_then(|t| u64::try_from(t).ok())
    }

    /// Completed fraction in `0.0..=1.0`, if the total is known and non-zero
    pub fn fraction(&self) -> Option<f64> {
        match self.total() {
            Some(total) if total > 0 => Some((self.current as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}

/// Terminal success payload (`done` stream event)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Whether the job succeeded
    pub success: bool,

    /// Human-readable summary
    #[serde(default)]
    pub message: String,

    /// Number of invoices retrieved
    #[serde(default)]
    pub count: u32,

    /// Produced files, in the order the job reported them
    #[serde(default)]
    pub files: Vec<String>,
}

/// Terminal error payload (`error` stream event)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamError {
    /// Error message
    #[serde(default)]
    pub detail: String,

    /// Explicit challenge flag; None when the backend did not send one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_otp: Option<bool>,
}

/// Body of `POST /api/submit-otp`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OtpRequest {
    /// Operator-entered code
    pub otp_code: String,
}

/// Response of `POST /api/submit-otp` and `GET /api/check-2fa`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpResult {
    /// Whether the backend accepted the code (or, for check-2fa, needs none)
    pub success: bool,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Whether a further or different code is still needed
    #[serde(default)]
    pub requires_otp: bool,
}

/// Vendor reference data from `GET /api/providers`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Vendor id, as accepted by [`DownloadParams::provider`]
    pub id: String,
    /// Display name
    pub name: String,
    /// Credentials are present on the backend
    #[serde(default)]
    pub configured: bool,
    /// A scraper exists for this vendor
    #[serde(default)]
    pub implemented: bool,
}

impl ProviderInfo {
    /// A job can be started for this vendor
    pub fn is_available(&self) -> bool {
        self.configured && self.implemented
    }
}

/// Response of `GET /api/providers`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProvidersResponse {
    /// Known vendors
    #[serde(default)]
    pub providers: Vec<ProviderInfo>,
}

/// Response of `GET /api/status`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Status keyword ("ok", "ready", "otp_required", "error")
    pub status: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

impl StatusResponse {
    /// Status keyword the backend uses when it is blocked on a 2FA code
    pub const OTP_REQUIRED: &'static str = "otp_required";

    /// The backend is waiting for a 2FA code
    pub fn requires_otp(&self) -> bool {
        self.status == Self::OTP_REQUIRED
    }
}

/// Session phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No job started, or the session was reset
    #[default]
    Idle,
    /// A job is in flight
    Running,
    /// The backend is blocked on a 2FA code
    ChallengePending,
    /// The last job finished with a result
    Completed,
    /// The last job failed
    Failed,
    /// The last job was cancelled
    Cancelled,
}

impl Phase {
    /// True for phases that end a job (completed, failed, cancelled)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Cancelled)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::ChallengePending => "challenge_pending",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
            Phase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Event emitted by a [`DownloadSession`](crate::session::DownloadSession)
///
/// Events are broadcast in the order the session applied them. Progress events
/// keep the exact order in which they were decoded from the job stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session moved to a new phase
    PhaseChanged {
        /// New phase
        phase: Phase,
    },

    /// A job was started (or resumed after a challenge)
    Started {
        /// Job id
        job: JobId,
        /// Parameters sent to the backend
        params: DownloadParams,
    },

    /// Progress tick from the running job
    Progress {
        /// Job id
        job: JobId,
        /// The tick
        progress: ProgressEvent,
    },

    /// Job finished with a result
    Completed {
        /// Job id
        job: JobId,
        /// Terminal payload
        result: DownloadResult,
    },

    /// Job failed
    Failed {
        /// Job id
        job: JobId,
        /// Error message
        error: String,
    },

    /// Job was cancelled
    Cancelled {
        /// Job id
        job: JobId,
    },

    /// The backend needs a 2FA code
    ChallengeRequired {
        /// Prompt for the operator
        message: String,
    },

    /// A submitted code was rejected, or the submission failed
    ChallengeRejected {
        /// Message for the operator
        message: String,
    },
}
