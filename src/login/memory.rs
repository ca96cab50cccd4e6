//! In-memory [`LoginStore`] used by tests and local development.
//!
//! A single mutex stands in for the database's row-level atomicity, so the
//! conditional updates keep the same single-winner semantics as Postgres.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::models::{Account, LoginChallenge};
use super::repo::{LoginStore, ResendUpdate};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    challenges: HashMap<Uuid, LoginChallenge>,
}

#[derive(Default)]
pub struct MemoryLoginStore {
    inner: Mutex<Inner>,
}

impl MemoryLoginStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_account(&self, account: Account) {
        self.inner.lock().await.accounts.insert(account.id, account);
    }

    pub async fn account(&self, id: Uuid) -> Option<Account> {
        self.inner.lock().await.accounts.get(&id).cloned()
    }

    pub async fn challenge(&self, id: Uuid) -> Option<LoginChallenge> {
        self.inner.lock().await.challenges.get(&id).cloned()
    }

    pub async fn challenge_count(&self) -> usize {
        self.inner.lock().await.challenges.len()
    }

    /// Force a challenge's expiry, used to simulate the passage of time.
    pub async fn expire_challenge(&self, id: Uuid, expires_at: DateTime<Utc>) {
        if let Some(challenge) = self.inner.lock().await.challenges.get_mut(&id) {
            challenge.expires_at = expires_at;
        }
    }

    /// Rewind a lock window, used to simulate lock expiry.
    pub async fn set_locked_until(&self, account_id: Uuid, locked_until: Option<DateTime<Utc>>) {
        if let Some(account) = self.inner.lock().await.accounts.get_mut(&account_id) {
            account.account_locked_until = locked_until;
        }
    }
}

#[async_trait]
impl LoginStore for MemoryLoginStore {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.inner.lock().await.accounts.get(&id).cloned())
    }

    async fn save_lockout_state(
        &self,
        account_id: Uuid,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| anyhow!("unknown account {account_id}"))?;
        account.failed_login_attempts = failed_attempts;
        account.account_locked_until = locked_until;
        Ok(())
    }

    async fn insert_challenge(&self, challenge: &LoginChallenge) -> Result<()> {
        self.inner
            .lock()
            .await
            .challenges
            .insert(challenge.id, challenge.clone());
        Ok(())
    }

    async fn delete_challenge(&self, id: Uuid) -> Result<()> {
        self.inner.lock().await.challenges.remove(&id);
        Ok(())
    }

    async fn find_active_challenge(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<LoginChallenge>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .challenges
            .get(&id)
            .filter(|challenge| !challenge.is_used && !challenge.is_expired(now))
            .cloned())
    }

    async fn record_failed_attempt(&self, id: Uuid) -> Result<i32> {
        let mut inner = self.inner.lock().await;
        let challenge = inner
            .challenges
            .get_mut(&id)
            .ok_or_else(|| anyhow!("unknown challenge {id}"))?;
        challenge.attempts += 1;
        Ok(challenge.attempts)
    }

    async fn mark_used(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let challenge = inner
            .challenges
            .get_mut(&id)
            .ok_or_else(|| anyhow!("unknown challenge {id}"))?;
        challenge.is_used = true;
        Ok(())
    }

    async fn mark_used_if_active(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.challenges.get_mut(&id) {
            Some(challenge) if !challenge.is_used && !challenge.is_expired(now) => {
                challenge.is_used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_resend(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
        max_resends: i32,
    ) -> Result<ResendUpdate> {
        let mut inner = self.inner.lock().await;
        let Some(challenge) = inner.challenges.get_mut(&id) else {
            return Ok(ResendUpdate::Gone);
        };
        if challenge.is_used || challenge.is_expired(now) {
            return Ok(ResendUpdate::Gone);
        }
        if challenge.send_count - 1 >= max_resends {
            return Ok(ResendUpdate::LimitReached);
        }
        challenge.otp_hash = otp_hash.to_string();
        challenge.expires_at = expires_at;
        challenge.last_sent_at = now;
        challenge.send_count += 1;
        Ok(ResendUpdate::Updated {
            send_count: challenge.send_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn challenge(now: DateTime<Utc>) -> LoginChallenge {
        LoginChallenge::new(
            Uuid::new_v4(),
            "hash".to_string(),
            now,
            Duration::seconds(300),
        )
    }

    #[tokio::test]
    async fn conditional_consume_has_single_winner() -> Result<()> {
        let store = MemoryLoginStore::new();
        let now = Utc::now();
        let challenge = challenge(now);
        store.insert_challenge(&challenge).await?;

        assert!(store.mark_used_if_active(challenge.id, now).await?);
        assert!(!store.mark_used_if_active(challenge.id, now).await?);
        Ok(())
    }

    #[tokio::test]
    async fn expired_challenge_is_not_active() -> Result<()> {
        let store = MemoryLoginStore::new();
        let now = Utc::now();
        let challenge = challenge(now);
        store.insert_challenge(&challenge).await?;

        let later = now + Duration::seconds(301);
        assert!(store.find_active_challenge(challenge.id, later).await?.is_none());
        assert!(!store.mark_used_if_active(challenge.id, later).await?);
        Ok(())
    }

    #[tokio::test]
    async fn resend_budget_enforced_at_the_lock() -> Result<()> {
        let store = MemoryLoginStore::new();
        let now = Utc::now();
        let mut subject = challenge(now);
        subject.send_count = 3;
        store.insert_challenge(&subject).await?;

        let expires = now + Duration::seconds(300);
        // One resend left out of a budget of 3.
        assert_eq!(
            store.apply_resend(subject.id, now, "h2", expires, 3).await?,
            ResendUpdate::Updated { send_count: 4 }
        );
        assert_eq!(
            store.apply_resend(subject.id, now, "h3", expires, 3).await?,
            ResendUpdate::LimitReached
        );
        Ok(())
    }
}
