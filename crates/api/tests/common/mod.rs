//! Shared helpers for API integration tests: a scriptable mock
//! synthesis provider, app construction mirroring `main.rs`, JWT
//! helpers, and request plumbing.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use async_trait::async_trait;
use minimuse_api::auth::jwt::{create_token, JwtConfig};
use minimuse_api::config::ServerConfig;
use minimuse_api::engine::GenerationEngine;
use minimuse_api::router::build_app_router;
use minimuse_api::state::AppState;
use minimuse_core::tool::ToolKind;
use minimuse_core::types::DbId;
use minimuse_db::repositories::CreditRepo;
use minimuse_provider::{ProviderError, SynthesisProvider, TaskState, TaskStatus};

// ---------------------------------------------------------------------------
// Mock provider
// ---------------------------------------------------------------------------

/// Scriptable in-memory stand-in for the synthesis provider.
///
/// Defaults: submissions are accepted with sequential task ids, status
/// queries report `processing`. Tests flip the scripted state and
/// assert on the invocation counters.
pub struct MockProvider {
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    reject_submissions: AtomicBool,
    next_task: AtomicUsize,
    status: Mutex<TaskStatus>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            reject_submissions: AtomicBool::new(false),
            next_task: AtomicUsize::new(1),
            status: Mutex::new(TaskStatus {
                state: TaskState::Processing,
                output_url: None,
                error: None,
            }),
        })
    }

    /// Make every subsequent submission fail synchronously.
    pub fn reject_submissions(&self) {
        self.reject_submissions.store(true, Ordering::SeqCst);
    }

    /// Script the state reported by subsequent status queries.
    pub fn set_status(&self, state: TaskState, output_url: Option<&str>, error: Option<&str>) {
        *self.status.lock().unwrap() = TaskStatus {
            state,
            output_url: output_url.map(str::to_string),
            error: error.map(str::to_string),
        };
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisProvider for MockProvider {
    async fn submit(
        &self,
        _tool: ToolKind,
        _input: &serde_json::Value,
    ) -> Result<String, ProviderError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(ProviderError::Api {
                status: 422,
                body: "unsupported input".into(),
            });
        }
        let n = self.next_task.fetch_add(1, Ordering::SeqCst);
        Ok(format!("task-{n}"))
    }

    async fn fetch_status(&self, _provider_ref: &str) -> Result<TaskStatus, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.status.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret".to_string(),
        },
        provider_url: "http://localhost:9".to_string(),
        provider_api_key: String::new(),
    }
}

/// Build the full application router plus the engine behind it, using
/// the given database pool and provider.
///
/// This mirrors the construction in `main.rs` so integration tests
/// exercise the same middleware stack that production uses.
pub fn build_test_app(
    pool: PgPool,
    provider: Arc<dyn SynthesisProvider>,
) -> (Router, Arc<GenerationEngine>) {
    let config = test_config();
    let engine = GenerationEngine::new(pool.clone(), provider);

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine: Arc::clone(&engine),
    };

    (build_app_router(state, &config), engine)
}

/// A valid Bearer token for `user_id`, signed with the test secret.
pub fn bearer(user_id: DbId) -> String {
    let token = create_token(user_id, &test_config().jwt).unwrap();
    format!("Bearer {token}")
}

/// Seed a credit account with the given balance.
pub async fn seed_credits(pool: &PgPool, user_id: DbId, balance: i32) {
    CreditRepo::ensure_account(pool, user_id).await.unwrap();
    CreditRepo::deposit(pool, user_id, balance).await.unwrap();
}

/// Current balance for `user_id`.
pub async fn balance(pool: &PgPool, user_id: DbId) -> i32 {
    CreditRepo::find(pool, user_id)
        .await
        .unwrap()
        .map(|a| a.balance)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Request plumbing
// ---------------------------------------------------------------------------

/// Issue a GET request with optional Bearer auth.
pub async fn get(app: Router, uri: &str, auth: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Issue a POST request with a JSON body and optional Bearer auth.
pub async fn post_json(
    app: Router,
    uri: &str,
    auth: Option<&str>,
    body: &serde_json::Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the response is an error with the expected status and code.
pub async fn assert_error(response: Response<Body>, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code, "unexpected error body: {json}");
}

// ---------------------------------------------------------------------------
// Request payload fixtures
// ---------------------------------------------------------------------------

/// A valid text-to-video request body (720p, 5s; costs 10 credits).
pub fn text_to_video_body() -> serde_json::Value {
    serde_json::json!({
        "tool": "text_to_video",
        "input": {
            "prompt": "A sunrise over snowy mountains",
            "resolution": "720p",
            "duration_secs": 5,
        },
    })
}

/// A valid baby-image request body (costs 2 credits).
pub fn baby_image_body() -> serde_json::Value {
    serde_json::json!({
        "tool": "baby_image",
        "input": {
            "mother_photo": {
                "url": "https://cdn.example.com/uploads/mother.jpg",
                "content_type": "image/jpeg",
                "size_bytes": 500_000,
            },
            "father_photo": {
                "url": "https://cdn.example.com/uploads/father.jpg",
                "content_type": "image/jpeg",
                "size_bytes": 500_000,
            },
            "gender": "surprise",
        },
    })
}
