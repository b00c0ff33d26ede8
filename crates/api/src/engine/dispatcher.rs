//! Submit orchestration: validation, credit gate, single-flight, and
//! provider hand-off.
//!
//! Credits are reserved before the single-flight insert, so the two
//! rejection paths after the reservation (active-job conflict,
//! synchronous provider rejection) each carry a compensating deposit.

use std::sync::Arc;

use chrono::Utc;
use minimuse_core::input::GenerationInput;
use minimuse_core::tool::ToolKind;
use minimuse_core::types::DbId;
use minimuse_db::models::job::Job;
use minimuse_db::repositories::{CreateJobError, CreditRepo, JobRepo};
use minimuse_provider::SynthesisProvider;

use super::poller::PollerManager;

/// Why a submission was rejected.
///
/// Every variant is recoverable at the caller: nothing here panics and
/// no partial state survives a rejection.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The payload failed local structural validation.
    #[error("{0}")]
    Validation(#[from] minimuse_core::error::CoreError),

    /// The balance does not cover the request's cost.
    #[error("Insufficient credits for this generation")]
    InsufficientCredits,

    /// A queued/processing job already holds the single-flight lock.
    /// Carries the existing job (when still visible) so the caller can
    /// attach to it instead of retrying blindly.
    #[error("A generation is already in progress for this tool")]
    ActiveJobExists(Option<Box<Job>>),

    /// The provider rejected the submission synchronously. No job row
    /// remains and the reservation was returned.
    #[error("Provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// A broken internal assumption (e.g. an unserializable payload).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The generation-job coordinator.
///
/// One instance serves all six tools: validation, pricing, poll
/// cadence, and deadlines all come from the input's [`ToolKind`], so
/// the lifecycle logic exists exactly once.
pub struct GenerationEngine {
    pool: minimuse_db::DbPool,
    provider: Arc<dyn SynthesisProvider>,
    pollers: Arc<PollerManager>,
}

impl GenerationEngine {
    pub fn new(pool: minimuse_db::DbPool, provider: Arc<dyn SynthesisProvider>) -> Arc<Self> {
        let pollers = PollerManager::new(pool.clone(), Arc::clone(&provider));
        Arc::new(Self {
            pool,
            provider,
            pollers,
        })
    }

    /// The poller registry (exposed for the resolver and shutdown).
    pub fn pollers(&self) -> &Arc<PollerManager> {
        &self.pollers
    }

    /// Submit a generation request.
    ///
    /// On success the job is queued, the provider holds the work, and a
    /// status poller is attached. Every rejection path leaves the
    /// user's balance exactly where it started.
    pub async fn submit(
        &self,
        user_id: DbId,
        input: GenerationInput,
    ) -> Result<Job, SubmitError> {
        // 1. Local validation. No side effects before this passes.
        input.validate()?;
        let tool = input.tool();
        let cost = input.cost();
        let input_json = serde_json::to_value(&input)
            .map_err(|e| SubmitError::Internal(format!("Failed to serialize input: {e}")))?;

        // 2. Credit gate.
        if !CreditRepo::reserve(&self.pool, user_id, cost).await? {
            tracing::info!(user_id, tool = tool.slug(), cost, "Submission rejected: insufficient credits");
            return Err(SubmitError::InsufficientCredits);
        }

        // 3. Single-flight insert. On conflict the reservation from
        // step 2 must come back.
        let deadline_at = Utc::now() + tool.deadline();
        let mut job = match JobRepo::create(
            &self.pool,
            user_id,
            tool,
            &input_json,
            cost,
            deadline_at,
        )
        .await
        {
            Ok(job) => job,
            Err(CreateJobError::AlreadyActive) => {
                self.deposit_back(user_id, cost).await;
                let existing = JobRepo::find_active(&self.pool, user_id, tool).await?;
                tracing::info!(
                    user_id,
                    tool = tool.slug(),
                    existing_job_id = existing.as_ref().map(|j| j.id),
                    "Submission rejected: active job exists",
                );
                return Err(SubmitError::ActiveJobExists(existing.map(Box::new)));
            }
            Err(CreateJobError::Database(e)) => {
                self.deposit_back(user_id, cost).await;
                return Err(SubmitError::Database(e));
            }
        };

        // 4. Fire-and-forget hand-off to the provider.
        let provider_ref = match self.provider.submit(tool, &input_json).await {
            Ok(provider_ref) => provider_ref,
            Err(e) => {
                // Synchronous rejection: the job never materializes.
                if let Err(discard_err) = JobRepo::discard(&self.pool, job.id).await {
                    tracing::error!(
                        job_id = job.id,
                        error = %discard_err,
                        "Failed to discard provider-rejected job",
                    );
                }
                self.deposit_back(user_id, cost).await;
                tracing::warn!(
                    user_id,
                    tool = tool.slug(),
                    error = %e,
                    "Submission rejected by provider",
                );
                return Err(SubmitError::ProviderRejected(e.to_string()));
            }
        };

        JobRepo::set_provider_ref(&self.pool, job.id, &provider_ref).await?;
        job.provider_ref = Some(provider_ref);

        tracing::info!(
            job_id = job.id,
            user_id,
            tool = tool.slug(),
            cost,
            "Generation job submitted",
        );

        // 5. Start tracking. The caller gets the job either way; a
        // poller that failed to attach is recovered by the resolver.
        self.pollers.ensure_polling(&job).await;

        Ok(job)
    }

    /// The pending-job resolver: the active job for `(user, tool)`,
    /// with a poller guaranteed to be attached when one exists.
    ///
    /// Safe to call on every session attachment; re-attaching is
    /// idempotent.
    pub async fn resolve_pending(
        &self,
        user_id: DbId,
        tool: ToolKind,
    ) -> Result<Option<Job>, sqlx::Error> {
        let Some(job) = JobRepo::find_active(&self.pool, user_id, tool).await? else {
            return Ok(None);
        };
        self.pollers.ensure_polling(&job).await;
        Ok(Some(job))
    }

    /// Re-attach pollers for all active jobs (startup).
    pub async fn resume_all(&self) -> usize {
        self.pollers.resume_all().await
    }

    /// Stop all pollers (graceful shutdown).
    pub async fn shutdown(&self) {
        self.pollers.shutdown().await;
    }

    /// Best-effort compensating deposit; a failure here leaks the
    /// reservation and is the one thing worth shouting about.
    async fn deposit_back(&self, user_id: DbId, cost: i32) {
        if let Err(e) = CreditRepo::deposit(&self.pool, user_id, cost).await {
            tracing::error!(
                user_id,
                cost,
                error = %e,
                "Failed to return a credit reservation; balance is now inconsistent",
            );
        }
    }
}
