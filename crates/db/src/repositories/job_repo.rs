//! Repository for the `generation_jobs` table.
//!
//! This is the single mutation point for job state. Every transition is
//! one UPDATE guarded by the current status in its WHERE clause, so the
//! forward-only lifecycle (`queued -> processing -> terminal`) holds
//! under concurrent observers: whichever caller wins the race applies
//! the transition, everyone else gets `false` back.

use minimuse_core::tool::ToolKind;
use minimuse_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::job::{Job, JobListQuery};
use crate::models::status::JobStatus;

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, user_id, tool_id, status_id, credits_reserved, credits_refunded, \
    input, provider_ref, result_uri, error_message, \
    deadline_at, created_at, updated_at, completed_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Name of the partial unique index enforcing single-flight.
const ACTIVE_CONSTRAINT: &str = "uq_generation_jobs_active";

/// Errors from job creation.
#[derive(Debug, thiserror::Error)]
pub enum CreateJobError {
    /// The `(user, tool)` pair already has a queued or processing job.
    /// Carries no row; the caller fetches it via `find_active` to build
    /// an informative conflict response.
    #[error("An active job already exists for this user and tool")]
    AlreadyActive,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Provides CRUD operations for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new queued job.
    ///
    /// The partial unique index on `(user_id, tool_id)` over active
    /// statuses makes the single-flight check and the insert one atomic
    /// operation: two racing submissions cannot both succeed, the loser
    /// gets [`CreateJobError::AlreadyActive`].
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        tool: ToolKind,
        input: &serde_json::Value,
        credits_reserved: i32,
        deadline_at: Timestamp,
    ) -> Result<Job, CreateJobError> {
        let query = format!(
            "INSERT INTO generation_jobs \
                 (user_id, tool_id, status_id, credits_reserved, input, deadline_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        let result = sqlx::query_as::<_, Job>(&query)
            .bind(user_id)
            .bind(tool.id())
            .bind(JobStatus::Queued.id())
            .bind(credits_reserved)
            .bind(input)
            .bind(deadline_at)
            .fetch_one(pool)
            .await;

        match result {
            Ok(job) => Ok(job),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some("23505")
                    && db_err.constraint() == Some(ACTIVE_CONSTRAINT) =>
            {
                Err(CreateJobError::AlreadyActive)
            }
            Err(other) => Err(CreateJobError::Database(other)),
        }
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The queued/processing job for `(user, tool)`, if any.
    ///
    /// This is the pending-job resolver query. The partial unique index
    /// guarantees at most one row matches.
    pub async fn find_active(
        pool: &PgPool,
        user_id: DbId,
        tool: ToolKind,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE user_id = $1 AND tool_id = $2 AND status_id IN ($3, $4)"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(user_id)
            .bind(tool.id())
            .bind(JobStatus::Queued.id())
            .bind(JobStatus::Processing.id())
            .fetch_optional(pool)
            .await
    }

    /// All queued/processing jobs, oldest first. Used at startup to
    /// re-attach a poller to every job that survived a restart.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE status_id IN ($1, $2) \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Queued.id())
            .bind(JobStatus::Processing.id())
            .fetch_all(pool)
            .await
    }

    /// Record the provider's correlation token after a successful
    /// submission.
    pub async fn set_provider_ref(
        pool: &PgPool,
        id: DbId,
        provider_ref: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE generation_jobs SET provider_ref = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(provider_ref)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove a job the provider rejected synchronously.
    ///
    /// Only a still-queued row without a provider ref can be discarded;
    /// anything else is retained for history.
    pub async fn discard(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM generation_jobs \
             WHERE id = $1 AND status_id = $2 AND provider_ref IS NULL",
        )
        .bind(id)
        .bind(JobStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// queued -> processing, on first observation of provider progress.
    ///
    /// Returns `false` when the job already advanced (benign race with
    /// another observer) or is terminal.
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(JobStatus::Processing.id())
        .bind(JobStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// queued/processing -> completed with the result location.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        result_uri: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $2, result_uri = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(id)
        .bind(JobStatus::Completed.id())
        .bind(result_uri)
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// queued/processing -> failed with the provider's error message.
    pub async fn fail(pool: &PgPool, id: DbId, error_message: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $2, error_message = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(error_message)
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// queued/processing -> timed_out.
    ///
    /// Applies at most once no matter how many deadline observers fire:
    /// the status guard means only the first caller's UPDATE matches.
    pub async fn time_out(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($3, $4)",
        )
        .bind(id)
        .bind(JobStatus::TimedOut.id())
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Force every active job past its deadline to timed_out.
    ///
    /// The timeout sweep's one query; returns the affected job IDs.
    pub async fn time_out_stale(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "UPDATE generation_jobs \
             SET status_id = $1, completed_at = NOW(), updated_at = NOW() \
             WHERE status_id IN ($2, $3) AND deadline_at < NOW() \
             RETURNING id",
        )
        .bind(JobStatus::TimedOut.id())
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Processing.id())
        .fetch_all(pool)
        .await
    }

    /// List a user's jobs, newest first, with optional status filter
    /// and pagination.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        params: &JobListQuery,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);

        if let Some(status_id) = params.status_id {
            let query = format!(
                "SELECT {COLUMNS} FROM generation_jobs \
                 WHERE user_id = $1 AND status_id = $2 \
                 ORDER BY created_at DESC \
                 LIMIT $3 OFFSET $4"
            );
            sqlx::query_as::<_, Job>(&query)
                .bind(user_id)
                .bind(status_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        } else {
            let query = format!(
                "SELECT {COLUMNS} FROM generation_jobs \
                 WHERE user_id = $1 \
                 ORDER BY created_at DESC \
                 LIMIT $2 OFFSET $3"
            );
            sqlx::query_as::<_, Job>(&query)
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
    }
}
