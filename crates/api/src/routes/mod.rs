pub mod credits;
pub mod generations;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generations                 list, submit (GET, POST)
/// /generations/pending         pending-job resolver (GET, ?tool=slug)
/// /generations/{id}            get job (GET)
///
/// /credits                     credit balance (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/generations", generations::router())
        .nest("/credits", credits::router())
}
