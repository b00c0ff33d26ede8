//! Per-job status pollers.
//!
//! [`PollerManager`] owns one cancellable Tokio task per in-flight job.
//! Each task queries the synthesis provider at the tool's cadence until
//! the job reaches a terminal state or its wall-clock deadline expires.
//! Cancelling a poller never mutates the job store: the job stays
//! active server-side so a later session (or the startup resume) can
//! re-attach.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use minimuse_core::tool::ToolKind;
use minimuse_core::types::{DbId, Timestamp};
use minimuse_db::models::job::Job;
use minimuse_db::repositories::{CreditRepo, JobRepo};
use minimuse_provider::{SynthesisProvider, TaskState};
use tokio_util::sync::CancellationToken;

/// Consecutive transport failures tolerated before a poller gives up.
///
/// A poller that gives up detaches without touching the job; the
/// timeout sweep delivers the terminal state once the deadline passes.
const MAX_CONSECUTIVE_POLL_FAILURES: u32 = 5;

/// Manages the status pollers for all in-flight jobs.
///
/// Created once at application startup. The returned `Arc` can be
/// cheaply cloned into request handlers via the engine.
pub struct PollerManager {
    pool: minimuse_db::DbPool,
    provider: Arc<dyn SynthesisProvider>,
    /// Active poll tasks indexed by job id.
    active: tokio::sync::RwLock<HashMap<DbId, ActivePoller>>,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
}

/// Internal bookkeeping for a single poll task.
struct ActivePoller {
    handle: tokio::task::JoinHandle<()>,
    /// Per-job cancellation token (child of the master token).
    cancel: CancellationToken,
}

impl PollerManager {
    pub fn new(pool: minimuse_db::DbPool, provider: Arc<dyn SynthesisProvider>) -> Arc<Self> {
        Arc::new(Self {
            pool,
            provider,
            active: tokio::sync::RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Attach a poller to `job` if none is attached yet.
    ///
    /// Idempotent: a second call for the same job id is a no-op and
    /// returns `false`, so repeated pending-resolver hits never stack
    /// duplicate status queries. Jobs without a provider ref cannot be
    /// polled (the process died between insert and provider submit);
    /// they are left for the timeout sweep.
    pub async fn ensure_polling(self: &Arc<Self>, job: &Job) -> bool {
        let tool = match job.tool() {
            Ok(tool) => tool,
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Cannot poll job with unknown tool");
                return false;
            }
        };

        let Some(provider_ref) = job.provider_ref.clone() else {
            tracing::warn!(
                job_id = job.id,
                "Job has no provider ref; leaving it to the timeout sweep",
            );
            return false;
        };

        let mut active = self.active.write().await;

        if let Some(existing) = active.get(&job.id) {
            if !existing.handle.is_finished() {
                return false;
            }
            // A resolved poller left its entry behind; replace it.
            active.remove(&job.id);
        }

        let cancel = self.cancel.child_token();
        let task_cancel = cancel.clone();
        let manager = Arc::clone(self);
        let job_id = job.id;
        let deadline_at = job.deadline_at;

        let handle = tokio::spawn(async move {
            manager
                .poll_job(job_id, tool, &provider_ref, deadline_at, task_cancel)
                .await;
        });

        active.insert(job_id, ActivePoller { handle, cancel });

        tracing::debug!(
            job_id,
            tool = tool.slug(),
            poll_interval_ms = tool.poll_interval().as_millis() as u64,
            "Status poller attached",
        );
        true
    }

    /// Re-attach pollers to every active job in the store.
    ///
    /// Called once at startup so a server restart never strands an
    /// in-flight job. Returns the number of pollers attached.
    pub async fn resume_all(self: &Arc<Self>) -> usize {
        let jobs = match JobRepo::list_active(&self.pool).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load active jobs for poller resume");
                return 0;
            }
        };

        let mut attached = 0;
        for job in &jobs {
            if self.ensure_polling(job).await {
                attached += 1;
            }
        }

        if attached > 0 {
            tracing::info!(attached, "Resumed status pollers for in-flight jobs");
        }
        attached
    }

    /// Stop polling a job locally without touching the store.
    pub async fn detach(&self, job_id: DbId) {
        if let Some(poller) = self.active.write().await.remove(&job_id) {
            poller.cancel.cancel();
            tracing::debug!(job_id, "Status poller detached");
        }
    }

    /// Number of live poll tasks.
    pub async fn active_count(&self) -> usize {
        self.active
            .read()
            .await
            .values()
            .filter(|p| !p.handle.is_finished())
            .count()
    }

    /// Cancel all pollers and wait for them to wind down.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let pollers: Vec<ActivePoller> = {
            let mut active = self.active.write().await;
            active.drain().map(|(_, p)| p).collect()
        };
        for poller in pollers {
            let _ = poller.handle.await;
        }
    }

    /// The poll loop for one job.
    ///
    /// Resolution paths, in priority order: local cancel (detach, no
    /// store mutation), deadline expiry (force timed_out), provider
    /// terminal state (completed/failed). A transition that reports
    /// not-applied means another observer resolved the job first; the
    /// poller just stops.
    async fn poll_job(
        &self,
        job_id: DbId,
        tool: ToolKind,
        provider_ref: &str,
        deadline_at: Timestamp,
        cancel: CancellationToken,
    ) {
        let remaining = (deadline_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        let deadline = tokio::time::sleep(remaining);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(tool.poll_interval());
        let mut consecutive_failures: u32 = 0;
        let mut observed_processing = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(job_id, "Poller cancelled");
                    return;
                }
                _ = &mut deadline => {
                    match JobRepo::time_out(&self.pool, job_id).await {
                        Ok(true) => {
                            tracing::info!(job_id, tool = tool.slug(), "Job timed out at deadline");
                        }
                        Ok(false) => {
                            tracing::debug!(job_id, "Deadline fired but job already resolved");
                        }
                        Err(e) => {
                            tracing::error!(job_id, error = %e, "Failed to time out job");
                        }
                    }
                    return;
                }
                _ = ticker.tick() => {
                    match self.provider.fetch_status(provider_ref).await {
                        Ok(status) => {
                            consecutive_failures = 0;
                            match status.state {
                                TaskState::Queued => {}
                                TaskState::Processing => {
                                    if !observed_processing {
                                        observed_processing = true;
                                        if let Err(e) = JobRepo::mark_processing(&self.pool, job_id).await {
                                            tracing::error!(job_id, error = %e, "Failed to mark job processing");
                                        }
                                    }
                                }
                                TaskState::Succeeded => {
                                    self.resolve_completed(job_id, status.output_url).await;
                                    return;
                                }
                                TaskState::Failed => {
                                    let message = status
                                        .error
                                        .unwrap_or_else(|| "Provider reported failure".into());
                                    self.resolve_failed(job_id, &message).await;
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            tracing::warn!(
                                job_id,
                                consecutive_failures,
                                error = %e,
                                "Status query failed",
                            );
                            if consecutive_failures >= MAX_CONSECUTIVE_POLL_FAILURES {
                                tracing::error!(
                                    job_id,
                                    "Giving up after repeated status-query failures; \
                                     the timeout sweep will resolve this job",
                                );
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn resolve_completed(&self, job_id: DbId, output_url: Option<String>) {
        let Some(uri) = output_url else {
            // Success without an output location breaks the provider
            // contract; the job cannot be delivered.
            self.resolve_failed(job_id, "Provider returned success without an output URL")
                .await;
            return;
        };

        match JobRepo::complete(&self.pool, job_id, &uri).await {
            Ok(true) => {
                tracing::info!(job_id, "Job completed");
            }
            Ok(false) => {
                tracing::debug!(job_id, "Completion observed after job already resolved");
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to mark job completed");
            }
        }
    }

    /// Mark the job failed and refund its reservation.
    ///
    /// No automatic retry: a retry is a fresh submit initiated by the
    /// user. The refund is exactly-once regardless of how many
    /// observers report the same failure.
    async fn resolve_failed(&self, job_id: DbId, message: &str) {
        match JobRepo::fail(&self.pool, job_id, message).await {
            Ok(true) => {
                tracing::info!(job_id, error = message, "Job failed");
            }
            Ok(false) => {
                tracing::debug!(job_id, "Failure observed after job already resolved");
                return;
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to mark job as failed");
                return;
            }
        }

        match CreditRepo::refund_for_job(&self.pool, job_id).await {
            Ok(true) => {
                tracing::info!(job_id, "Reservation refunded for failed job");
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to refund failed job");
            }
        }
    }
}
