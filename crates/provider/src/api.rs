//! REST client for the synthesis provider's HTTP endpoints.
//!
//! Wraps the provider's task API (submission, status retrieval) using
//! [`reqwest`]. Authentication is a Bearer API key supplied at
//! construction time.

use async_trait::async_trait;
use minimuse_core::tool::ToolKind;
use serde::Deserialize;

use crate::{ProviderError, SynthesisProvider, TaskStatus};

/// HTTP client for the synthesis provider.
pub struct SynthesisApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Response returned by `POST /v1/tasks` after a task is accepted.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    /// Provider-assigned identifier for the queued task.
    task_id: String,
}

impl SynthesisApi {
    /// Create a new API client.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `https://synthesis.example.com`.
    /// * `api_key`  - Bearer token for the provider account.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ProviderError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SynthesisProvider for SynthesisApi {
    async fn submit(
        &self,
        tool: ToolKind,
        input: &serde_json::Value,
    ) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "tool": tool.slug(),
            "input": input,
        });

        let response = self
            .client
            .post(format!("{}/v1/tasks", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;

        tracing::debug!(
            tool = tool.slug(),
            task_id = %submitted.task_id,
            "Task submitted to synthesis provider",
        );

        Ok(submitted.task_id)
    }

    async fn fetch_status(&self, provider_ref: &str) -> Result<TaskStatus, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/tasks/{}", self.base_url, provider_ref))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
