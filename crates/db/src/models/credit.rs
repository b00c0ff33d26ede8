//! Credit account entity.

use minimuse_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `credit_accounts` table.
///
/// The balance is only ever touched through `CreditRepo::reserve` and
/// the deposit/refund paths; top-ups and pricing live in an external
/// billing system.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditAccount {
    pub user_id: DbId,
    pub balance: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
