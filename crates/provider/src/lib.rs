//! Client for the external media-synthesis provider.
//!
//! The provider is an opaque black box reachable only through two
//! operations: submit a task, poll its status. There is no webhook
//! surface -- convergence is the poller's job. [`SynthesisProvider`] is
//! the seam the engine depends on; [`api::SynthesisApi`] is the real
//! HTTP implementation, and tests substitute their own.

pub mod api;

use async_trait::async_trait;
use minimuse_core::tool::ToolKind;
use serde::{Deserialize, Serialize};

/// Provider-side lifecycle state of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

/// One status-query result.
///
/// Wire shape: `{ "status": "...", "output_url": ..., "error": ... }`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatus {
    #[serde(rename = "status")]
    pub state: TaskState,
    /// Present when `state` is `Succeeded`.
    pub output_url: Option<String>,
    /// Present when `state` is `Failed`.
    pub error: Option<String>,
}

/// Errors from the provider layer.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// The two operations the coordinator is allowed to assume.
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    /// Submit a generation task. Returns the provider's opaque
    /// correlation token on success; a synchronous error here means no
    /// work was accepted.
    async fn submit(
        &self,
        tool: ToolKind,
        input: &serde_json::Value,
    ) -> Result<String, ProviderError>;

    /// Query the current state of a previously submitted task.
    async fn fetch_status(&self, provider_ref: &str) -> Result<TaskStatus, ProviderError>;
}
