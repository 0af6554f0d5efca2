//! Operator console example
//!
//! This example drives one invoice download from a terminal:
//! - Loading configuration from `.env` / environment variables
//! - Probing the backend and listing vendors
//! - Subscribing to session events
//! - Prompting for a 2FA code when the vendor asks for one
//! - Cancelling on Ctrl+C
//!
//! ```bash
//! INVOICE_DL_API_URL=http://localhost:8001 INVOICE_DL_PROVIDER=free_mobile \
//!     cargo run --example operator_console
//! ```

use invoice_dl::{
    ChallengeOutcome, Config, DownloadSession, JobHandle, Phase, SessionEvent, run_until_signal,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let session = DownloadSession::new(config)?;

    // Probe the backend
    let snapshot = session.bootstrap().await;
    println!("Vendors:");
    for provider in &snapshot.providers {
        let mark = if provider.is_available() { "✓" } else { "·" };
        println!("  {} {:<14} {}", mark, provider.id, provider.name);
    }

    // Print events as they arrive
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Started { job, params } => {
                    println!(
                        "▶ Job #{} started ({} invoice(s) max, vendor: {})",
                        job,
                        params.max_invoices,
                        params.provider.as_deref().unwrap_or("default")
                    );
                }
                SessionEvent::Progress { progress, .. } => match progress.fraction() {
                    Some(fraction) => {
                        println!("  [{:>3.0}%] {}", fraction * 100.0, progress.message)
                    }
                    None => println!("  [ .. ] {}", progress.message),
                },
                SessionEvent::Completed { result, .. } => {
                    println!("✓ {} ({} file(s))", result.message, result.files.len());
                    for file in &result.files {
                        println!("    {}", file);
                    }
                }
                SessionEvent::Failed { error, .. } => println!("✗ {}", error),
                SessionEvent::Cancelled { .. } => println!("■ Download cancelled"),
                SessionEvent::ChallengeRequired { message } => println!("🔐 {}", message),
                SessionEvent::ChallengeRejected { message } => println!("✗ {}", message),
                SessionEvent::PhaseChanged { .. } => {}
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut job: Option<JobHandle> = if snapshot.phase == Phase::ChallengePending {
        None
    } else {
        Some(session.start(session.config().default_params()))
    };

    loop {
        if let Some(handle) = job.take() {
            let finished = handle.finished();
            tokio::pin!(finished);
            let phase = tokio::select! {
                phase = &mut finished => phase,
                _ = run_until_signal(&session) => {
                    println!("Interrupted, waiting for the job to stop...");
                    finished.await
                }
            };
            if phase != Some(Phase::ChallengePending) {
                break;
            }
        }

        if session.phase() != Phase::ChallengePending {
            break;
        }

        println!("Enter 2FA code (empty line to abort):");
        let Some(line) = stdin.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            session.reset();
            break;
        }

        match session.submit_challenge(&line).await {
            Ok(ChallengeOutcome::Resumed(handle)) => job = Some(handle),
            Ok(ChallengeOutcome::Cleared) => {
                println!("Code accepted, starting download");
                job = Some(session.start(session.config().default_params()));
            }
            Ok(ChallengeOutcome::Rejected { .. }) => {}
            Err(e) => println!("✗ {}", e),
        }
    }

    let snapshot = session.snapshot();
    println!("Final state: {} - {}", snapshot.phase, snapshot.status);
    Ok(())
}
