//! Handler for the read-only credit balance endpoint.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use minimuse_db::repositories::CreditRepo;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for the balance check.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i32,
}

/// GET /api/v1/credits
///
/// The caller's current credit balance. A user with no account row yet
/// simply has zero credits; top-ups happen in the external billing
/// system.
pub async fn get_balance(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let balance = CreditRepo::find(&state.pool, auth.user_id)
        .await?
        .map(|account| account.balance)
        .unwrap_or(0);

    Ok(Json(DataResponse {
        data: BalanceResponse { balance },
    }))
}
