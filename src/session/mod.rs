//! Download session state machine.
//!
//! `DownloadSession` sequences the protocol client and the challenge exchange on
//! behalf of one operator. Its methods are organized by concern:
//! - [`control`] - starting, cancelling and resetting jobs
//! - [`challenge`] - 2FA code submission and automatic resumption
//! - [`bootstrap`] - startup status and vendor reference data
//! - [`state`] - the session record and its transitions
//!
//! ```text
//! Idle ──start──▶ Running ──done──▶ Completed
//!                  │  ▲   ──error─▶ Failed
//!                  │  │   ──cancel▶ Cancelled
//!        2FA needed│  │code accepted
//!                  ▼  │
//!            ChallengePending
//! ```

mod bootstrap;
mod challenge;
mod control;
mod state;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use challenge::ChallengeOutcome;
pub use control::JobHandle;
pub use state::SessionSnapshot;

use crate::backend::InvoiceBackend;
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::Result;
use crate::types::{Phase, SessionEvent};
use state::Inner;
use futures::{Stream, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

/// Drives download jobs and 2FA challenges for one operator (cloneable, all fields are Arc-wrapped)
#[derive(Clone)]
pub struct DownloadSession {
    /// Backend the jobs run against
    pub(crate) backend: Arc<dyn InvoiceBackend>,
    /// Configuration (minimum code length, default parameters)
    pub(crate) config: Arc<Config>,
    /// Session record; never held across an await
    pub(crate) inner: Arc<Mutex<Inner>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<SessionEvent>,
    /// Latest snapshot for observers that only care about current state
    pub(crate) snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl std::fmt::Debug for DownloadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSession")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl DownloadSession {
    /// Create a session talking to the HTTP backend described by `config`
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate or the HTTP
    /// client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = ApiClient::new(&config)?;
        tracing::debug!(base_url = %client.base_url(), "created download session");
        Ok(Self::with_backend(config, Arc::new(client)))
    }

    /// Create a session over any backend implementation
    pub fn with_backend(config: Config, backend: Arc<dyn InvoiceBackend>) -> Self {
        // Buffer of 1000 events; slow subscribers receive `RecvError::Lagged`
        let (event_tx, _rx) = broadcast::channel(1000);
        let (snapshot_tx, _rx) = watch::channel(SessionSnapshot::default());

        Self {
            backend,
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(Inner::default())),
            event_tx,
            snapshot_tx: Arc::new(snapshot_tx),
        }
    }

    /// Subscribe to session events
    ///
    /// Each subscriber receives every event independently, in the order the session
    /// applied them.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use invoice_dl::{Config, DownloadSession, SessionEvent};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let session = DownloadSession::new(Config::default())?;
    ///
    ///     let mut events = session.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             if let SessionEvent::Progress { progress, .. } = event {
    ///                 println!("{}", progress.message);
    ///             }
    ///         }
    ///     });
    ///
    ///     session.start(session.config().default_params());
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Session events as a stream
    ///
    /// Like [`subscribe`](Self::subscribe), but events missed by a lagging consumer
    /// are skipped with a warning instead of surfacing as an error.
    pub fn events(&self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|event| async move {
            match event {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream consumer lagged");
                    None
                }
            }
        })
    }

    /// Current state of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot.clone()
    }

    /// Current phase of the session
    pub fn phase(&self) -> Phase {
        self.lock().snapshot.phase
    }

    /// Receiver that always holds the latest snapshot
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Stream of snapshots, starting with the current one
    ///
    /// Intermediate snapshots may be skipped if the consumer is slower than the
    /// session; the latest one is always delivered.
    pub fn snapshots(&self) -> WatchStream<SessionSnapshot> {
        WatchStream::new(self.watch())
    }

    /// Configuration the session was created with
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves a consistent record; keep going
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a transition, then publish its events and the new snapshot
    ///
    /// Events are sent while the lock is held so that concurrent transitions
    /// cannot interleave their events.
    pub(crate) fn transition<R>(
        &self,
        apply: impl FnOnce(&mut Inner, &mut Vec<SessionEvent>) -> R,
    ) -> R {
        let mut inner = self.lock();
        let mut events = Vec::new();
        let output = apply(&mut inner, &mut events);

        for event in events {
            // No subscribers is fine
            self.event_tx.send(event).ok();
        }
        self.snapshot_tx.send_if_modified(|published| {
            if *published == inner.snapshot {
                return false;
            }
            *published = inner.snapshot.clone();
            true
        });
        output
    }
}
