//! Repository for the `credit_accounts` table -- the credit gate.
//!
//! `reserve` is the only way credits leave an account and is a single
//! conditional UPDATE: the row lock makes concurrent reservations from
//! the same user serialize, so a double-submit can never spend the same
//! balance twice, including across browser tabs.

use minimuse_core::types::DbId;
use sqlx::PgPool;

use crate::models::credit::CreditAccount;
use crate::models::status::JobStatus;

/// Provides the reserve/deposit contract over credit balances.
pub struct CreditRepo;

impl CreditRepo {
    /// Create the account row with a zero balance if it does not exist.
    pub async fn ensure_account(pool: &PgPool, user_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO credit_accounts (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Fetch the account, if any.
    pub async fn find(pool: &PgPool, user_id: DbId) -> Result<Option<CreditAccount>, sqlx::Error> {
        sqlx::query_as::<_, CreditAccount>(
            "SELECT user_id, balance, created_at, updated_at \
             FROM credit_accounts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Atomically take `cost` credits from the balance.
    ///
    /// Returns `true` when granted. A missing account or an
    /// insufficient balance both return `false` with no mutation: the
    /// guard in the WHERE clause is the whole check, there is no
    /// read-then-write window.
    pub async fn reserve(pool: &PgPool, user_id: DbId, cost: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE credit_accounts \
             SET balance = balance - $2, updated_at = NOW() \
             WHERE user_id = $1 AND balance >= $2",
        )
        .bind(user_id)
        .bind(cost)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return `amount` credits to the balance.
    ///
    /// Compensating action for the synchronous rejection paths
    /// (single-flight conflict, provider rejection), where no job row
    /// survives to carry a refund marker.
    pub async fn deposit(pool: &PgPool, user_id: DbId, amount: i32) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE credit_accounts \
             SET balance = balance + $2, updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(amount)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Refund a failed job's reservation, exactly once.
    ///
    /// The `credits_refunded` marker is flipped and the deposit made in
    /// one transaction, keyed on the marker still being unset and the
    /// job actually being failed: however many pollers or sweeps
    /// observe the failure, only the first refund applies.
    pub async fn refund_for_job(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let marked = sqlx::query_as::<_, (DbId, i32)>(
            "UPDATE generation_jobs \
             SET credits_refunded = TRUE, updated_at = NOW() \
             WHERE id = $1 AND credits_refunded = FALSE AND status_id = $2 \
             RETURNING user_id, credits_reserved",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id, credits_reserved)) = marked else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query(
            "UPDATE credit_accounts \
             SET balance = balance + $2, updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(credits_reserved)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
