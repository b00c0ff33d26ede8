//! Generation job entity and query DTOs.

use minimuse_core::tool::{ToolId, ToolKind};
use minimuse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::{JobStatus, StatusId};

/// A row from the `generation_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub user_id: DbId,
    pub tool_id: ToolId,
    pub status_id: StatusId,
    pub credits_reserved: i32,
    pub credits_refunded: bool,
    pub input: serde_json::Value,
    pub provider_ref: Option<String>,
    /// Set if and only if the job completed.
    pub result_uri: Option<String>,
    /// Set if and only if the job failed.
    pub error_message: Option<String>,
    /// Wall-clock bound: past this instant the job is force-timed-out.
    pub deadline_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// The tool that produced this job.
    ///
    /// The column is constrained to the seeded lookup table, so an
    /// unknown id means the row and the code disagree about the seed
    /// data, surfaced as `CoreError::Internal`.
    pub fn tool(&self) -> Result<ToolKind, minimuse_core::error::CoreError> {
        ToolKind::from_id(self.tool_id)
    }

    /// Decoded lifecycle status.
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::from_id(self.status_id)
    }

    /// Whether the job is still holding the single-flight lock.
    pub fn is_active(&self) -> bool {
        self.status().is_some_and(|s| !s.is_terminal())
    }
}

/// Query parameters for `GET /api/v1/generations`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    /// Filter by status ID (e.g. 3 = completed).
    pub status_id: Option<StatusId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
