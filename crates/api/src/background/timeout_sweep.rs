//! Periodic timeout sweep for stale generation jobs.
//!
//! Pollers normally resolve jobs, but a poller can be lost (client
//! detached and never resolved, process restart before resume, bounded
//! poll retries exhausted). The sweep is the backstop: any active job
//! past its `deadline_at` is force-transitioned to `timed_out`, which
//! releases the single-flight lock. Runs on a fixed interval using
//! `tokio::time::interval`.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use minimuse_db::repositories::JobRepo;

/// How often the sweep runs.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Run the timeout sweep loop.
///
/// The interval can be overridden via `TIMEOUT_SWEEP_INTERVAL_SECS`.
/// Runs until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    let interval_secs: u64 = std::env::var("TIMEOUT_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

    tracing::info!(interval_secs, "Timeout sweep started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Timeout sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match JobRepo::time_out_stale(&pool).await {
                    Ok(timed_out) if !timed_out.is_empty() => {
                        tracing::info!(
                            count = timed_out.len(),
                            job_ids = ?timed_out,
                            "Timeout sweep: forced stale jobs to timed_out",
                        );
                    }
                    Ok(_) => {
                        tracing::debug!("Timeout sweep: nothing stale");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Timeout sweep failed");
                    }
                }
            }
        }
    }
}
