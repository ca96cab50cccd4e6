//! Persistence seam for the login flow.
//!
//! The state machine only talks to [`LoginStore`]; the Postgres
//! implementation lives here, the in-memory one in [`super::memory`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::models::{Account, LoginChallenge};

/// Outcome of the locked resend mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResendUpdate {
    /// Hash/expiry replaced and `send_count` bumped to the returned value.
    Updated { send_count: i32 },
    /// Resend budget exhausted; nothing was mutated.
    LimitReached,
    /// Challenge missing, used or expired; nothing was mutated.
    Gone,
}

#[async_trait]
pub trait LoginStore: Send + Sync {
    /// Case-insensitive account lookup; `None` rather than an error when the
    /// email is unknown, so callers can branch explicitly.
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// Persist the lockout fields computed by the policy.
    async fn save_lockout_state(
        &self,
        account_id: Uuid,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn insert_challenge(&self, challenge: &LoginChallenge) -> Result<()>;

    /// Compensating delete for the challenge-plus-delivery unit of work.
    async fn delete_challenge(&self, id: Uuid) -> Result<()>;

    /// Fetch a challenge that is neither used nor expired.
    async fn find_active_challenge(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<LoginChallenge>>;

    /// Increment the attempt counter, returning the new value.
    async fn record_failed_attempt(&self, id: Uuid) -> Result<i32>;

    /// Unconditionally force a challenge terminal.
    async fn mark_used(&self, id: Uuid) -> Result<()>;

    /// Mark the challenge used only if it is still active. Returns whether
    /// this caller won; two concurrent verifies cannot both see `true`.
    async fn mark_used_if_active(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Replace the OTP hash and extend expiry under an exclusive row lock,
    /// re-checking used/expiry/resend-budget after the lock is held.
    async fn apply_resend(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
        max_resends: i32,
    ) -> Result<ResendUpdate>;
}

#[derive(Clone)]
pub struct PgLoginStore {
    pool: PgPool,
}

impl PgLoginStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        password_hash: row.get("password_hash"),
        email_verified: row.get("email_verified"),
        is_active: row.get("is_active"),
        failed_login_attempts: row.get("failed_login_attempts"),
        account_locked_until: row.get("account_locked_until"),
    }
}

fn challenge_from_row(row: &sqlx::postgres::PgRow) -> LoginChallenge {
    LoginChallenge {
        id: row.get("id"),
        account_id: row.get("account_id"),
        otp_hash: row.get("otp_hash"),
        expires_at: row.get("expires_at"),
        attempts: row.get("attempts"),
        send_count: row.get("send_count"),
        last_sent_at: row.get("last_sent_at"),
        is_used: row.get("is_used"),
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, username, full_name, password_hash, \
     email_verified, is_active, failed_login_attempts, account_locked_until";

#[async_trait]
impl LoginStore for PgLoginStore {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by email")?;
        Ok(row.as_ref().map(account_from_row))
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by id")?;
        Ok(row.as_ref().map(account_from_row))
    }

    async fn save_lockout_state(
        &self,
        account_id: Uuid,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let query = r"
            UPDATE users
            SET failed_login_attempts = $2,
                account_locked_until = $3
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .bind(failed_attempts)
            .bind(locked_until)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to save lockout state")?;
        Ok(())
    }

    async fn insert_challenge(&self, challenge: &LoginChallenge) -> Result<()> {
        let query = r"
            INSERT INTO login_challenges
                (id, account_id, otp_hash, expires_at, attempts, send_count, last_sent_at, is_used)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(challenge.id)
            .bind(challenge.account_id)
            .bind(&challenge.otp_hash)
            .bind(challenge.expires_at)
            .bind(challenge.attempts)
            .bind(challenge.send_count)
            .bind(challenge.last_sent_at)
            .bind(challenge.is_used)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert login challenge")?;
        Ok(())
    }

    async fn delete_challenge(&self, id: Uuid) -> Result<()> {
        let query = "DELETE FROM login_challenges WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete login challenge")?;
        Ok(())
    }

    async fn find_active_challenge(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<LoginChallenge>> {
        let query = r"
            SELECT id, account_id, otp_hash, expires_at, attempts, send_count,
                   last_sent_at, is_used
            FROM login_challenges
            WHERE id = $1
              AND is_used = FALSE
              AND expires_at > $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup login challenge")?;
        Ok(row.as_ref().map(challenge_from_row))
    }

    async fn record_failed_attempt(&self, id: Uuid) -> Result<i32> {
        let query = r"
            UPDATE login_challenges
            SET attempts = attempts + 1
            WHERE id = $1
            RETURNING attempts
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to record challenge attempt")?;
        Ok(row.get("attempts"))
    }

    async fn mark_used(&self, id: Uuid) -> Result<()> {
        let query = "UPDATE login_challenges SET is_used = TRUE WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to mark challenge used")?;
        Ok(())
    }

    async fn mark_used_if_active(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        // Row-level atomicity makes this the single winner decision for
        // concurrent verifies.
        let query = r"
            UPDATE login_challenges
            SET is_used = TRUE
            WHERE id = $1
              AND is_used = FALSE
              AND expires_at > $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to consume challenge")?;
        Ok(result.rows_affected() == 1)
    }

    async fn apply_resend(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
        max_resends: i32,
    ) -> Result<ResendUpdate> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin resend transaction")?;

        // Exclusive lock, then re-check: two concurrent resends serialize
        // here and the loser observes the winner's committed increment.
        let query = r"
            SELECT expires_at, send_count, is_used
            FROM login_challenges
            WHERE id = $1
            FOR UPDATE
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lock challenge for resend")?;

        let Some(row) = row else {
            tx.rollback().await.ok();
            return Ok(ResendUpdate::Gone);
        };

        let is_used: bool = row.get("is_used");
        let challenge_expires: DateTime<Utc> = row.get("expires_at");
        if is_used || challenge_expires <= now {
            tx.rollback().await.ok();
            return Ok(ResendUpdate::Gone);
        }

        let send_count: i32 = row.get("send_count");
        // send_count includes the initial send; the resend budget is on top.
        if send_count - 1 >= max_resends {
            tx.rollback().await.ok();
            return Ok(ResendUpdate::LimitReached);
        }

        let query = r"
            UPDATE login_challenges
            SET otp_hash = $2,
                expires_at = $3,
                last_sent_at = $4,
                send_count = send_count + 1
            WHERE id = $1
            RETURNING send_count
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(otp_hash)
            .bind(expires_at)
            .bind(now)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .context("failed to apply resend")?;
        let send_count: i32 = row.get("send_count");

        tx.commit().await.context("failed to commit resend")?;

        Ok(ResendUpdate::Updated { send_count })
    }
}

#[cfg(test)]
mod tests {
    use super::ResendUpdate;

    #[test]
    fn resend_update_debug_names() {
        assert_eq!(
            format!("{:?}", ResendUpdate::Updated { send_count: 2 }),
            "Updated { send_count: 2 }"
        );
        assert_eq!(format!("{:?}", ResendUpdate::LimitReached), "LimitReached");
        assert_eq!(format!("{:?}", ResendUpdate::Gone), "Gone");
    }
}
