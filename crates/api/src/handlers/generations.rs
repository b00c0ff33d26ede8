//! Handlers for the `/generations` resource.
//!
//! All endpoints require authentication via [`AuthUser`]; users only
//! ever see their own jobs.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use minimuse_core::error::CoreError;
use minimuse_core::input::GenerationInput;
use minimuse_core::tool::ToolKind;
use minimuse_core::types::DbId;
use minimuse_db::models::job::{Job, JobListQuery};
use minimuse_db::repositories::JobRepo;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a job by ID and verify the caller owns it.
///
/// Returns `NotFound` if the job does not exist, `Forbidden` if the
/// caller is not the owner.
async fn find_and_authorize(
    pool: &sqlx::PgPool,
    job_id: DbId,
    auth: &AuthUser,
) -> AppResult<Job> {
    let job = JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    if job.user_id != auth.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot view another user's job".into(),
        )));
    }

    Ok(job)
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/generations
///
/// Submit a new generation job. Returns 201 with the created job, or
/// one of `VALIDATION_ERROR`, `INSUFFICIENT_CREDITS`,
/// `ACTIVE_PROJECT_EXISTS`, `PROVIDER_REJECTED`.
pub async fn submit_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<GenerationInput>,
) -> AppResult<impl IntoResponse> {
    let job = state.engine.submit(auth.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Pending
// ---------------------------------------------------------------------------

/// Query parameters for the pending check.
#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    /// Tool slug, e.g. `text_to_video`.
    pub tool: String,
}

/// Response body for the pending check.
#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub has_pending_task: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_task: Option<Job>,
}

/// GET /api/v1/generations/pending?tool={slug}
///
/// The pending-job resolver: reports the caller's active job for the
/// tool, if any, and guarantees a status poller is tracking it. Called
/// on every session attachment so a reload never loses an in-flight
/// job; calling it repeatedly is idempotent.
pub async fn pending_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PendingQuery>,
) -> AppResult<impl IntoResponse> {
    let tool = ToolKind::from_slug(&params.tool).map_err(AppError::Core)?;

    let job = state.engine.resolve_pending(auth.user_id, tool).await?;

    Ok(Json(DataResponse {
        data: PendingResponse {
            has_pending_task: job.is_some(),
            pending_task: job,
        },
    }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/generations/{id}
///
/// Get a single job by ID. Status, `result_uri` (when completed) and
/// `error_message` (when failed) are all on the returned record;
/// `timed_out` is reported distinctly from `failed` because the
/// provider may still be working past a local timeout.
pub async fn get_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_and_authorize(&state.pool, job_id, &auth).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/generations
///
/// List the caller's jobs, newest first. Supports optional `status_id`,
/// `limit`, and `offset` query parameters.
pub async fn list_generations(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list_by_user(&state.pool, auth.user_id, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}
