//! The login state machine.
//!
//! `begin_login` drives password verification, lockout bookkeeping and
//! challenge creation; `verify_otp` consumes a challenge and issues tokens;
//! `resend_otp` replaces the code under an exclusive lock. Time and client
//! address are explicit parameters so every transition is testable without
//! ambient state.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent, AuditResource, AuditSink};
use crate::email::{EmailMessage, EmailSender, TEMPLATE_ACCOUNT_LOCKED, TEMPLATE_MFA_CODE};
use crate::token::{TokenIssuer, TokenPair};

use super::config::LoginConfig;
use super::crypto;
use super::error::LoginError;
use super::lockout::{FailureOutcome, LockoutPolicy};
use super::models::{Account, LoginChallenge};
use super::repo::{LoginStore, ResendUpdate};

/// Returned by `begin_login`; never carries the OTP itself.
#[derive(Clone, Debug)]
pub struct ChallengeTicket {
    pub challenge_id: Uuid,
    pub expires_in: i64,
}

/// Successful OTP verification: credential bundle plus the account for the
/// minimal profile in the response.
#[derive(Debug)]
pub struct VerifiedLogin {
    pub tokens: TokenPair,
    pub account: Account,
}

#[derive(Clone, Debug)]
pub struct ResendTicket {
    pub expires_in: i64,
}

pub struct LoginService {
    store: Arc<dyn LoginStore>,
    mailer: Arc<dyn EmailSender>,
    tokens: Arc<dyn TokenIssuer>,
    audit: Arc<dyn AuditSink>,
    config: LoginConfig,
    lockout: LockoutPolicy,
}

impl LoginService {
    #[must_use]
    pub fn new(
        store: Arc<dyn LoginStore>,
        mailer: Arc<dyn EmailSender>,
        tokens: Arc<dyn TokenIssuer>,
        audit: Arc<dyn AuditSink>,
        config: LoginConfig,
    ) -> Self {
        let lockout = LockoutPolicy::new(config.max_login_attempts(), config.lock_duration());
        Self {
            store,
            mailer,
            tokens,
            audit,
            config,
            lockout,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LoginConfig {
        &self.config
    }

    /// Password step. On success the account's lockout fields reset and a
    /// fresh challenge is created and delivered.
    pub async fn begin_login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<ChallengeTicket, LoginError> {
        let email = normalize_email(email);

        let Some(account) = self.store.find_account_by_email(&email).await? else {
            // Unknown emails get the same response as a bad password.
            debug!("login attempt for unknown email");
            return Err(LoginError::InvalidCredentials);
        };

        // Lock check comes before any password comparison; no attempt is
        // recorded against a locked account.
        if self.lockout.is_locked(&account, now) {
            info!(account_id = %account.id, "login rejected: account locked");
            return Err(LoginError::AccountLocked);
        }

        if !crypto::verify_password(password, &account.password_hash) {
            self.register_password_failure(&account, now).await?;
            return Err(LoginError::InvalidCredentials);
        }

        // Checked only after a correct password, so the response difference
        // cannot be used for enumeration.
        if !account.email_verified || !account.is_active {
            return Err(LoginError::EmailNotVerified);
        }

        self.store.save_lockout_state(account.id, 0, None).await?;

        let otp = crypto::generate_otp();
        let otp_hash = crypto::hash_otp(&otp)?;
        let challenge =
            LoginChallenge::new(account.id, otp_hash, now, self.config.otp_ttl());
        self.store.insert_challenge(&challenge).await?;

        // Challenge creation and delivery are one unit of work: a failed
        // send removes the challenge so the client can retry cleanly.
        if let Err(err) = self.send_otp_email(&account, &otp).await {
            warn!(account_id = %account.id, "login OTP delivery failed: {err:#}");
            self.store.delete_challenge(challenge.id).await?;
            self.record_audit(AuditEvent {
                actor_id: Some(account.id),
                actor_name: account.full_name.clone(),
                actor_email: account.email.clone(),
                action: AuditAction::Login,
                resource: AuditResource::User,
                resource_id: Some(account.id.to_string()),
                details: "Login OTP delivery failed".to_string(),
                ip_address: None,
            })
            .await;
            return Err(LoginError::DeliveryFailed);
        }

        info!(account_id = %account.id, challenge_id = %challenge.id, "login challenge issued");

        Ok(ChallengeTicket {
            challenge_id: challenge.id,
            expires_in: self.config.otp_ttl_seconds(),
        })
    }

    /// OTP step. A matching code consumes the challenge (single-use, also on
    /// success) and issues the credential bundle.
    pub async fn verify_otp(
        &self,
        challenge_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
        client_ip: Option<&str>,
    ) -> Result<VerifiedLogin, LoginError> {
        let Some(challenge) = self.store.find_active_challenge(challenge_id, now).await? else {
            // Wrong id, already-used and expired are indistinguishable.
            return Err(LoginError::InvalidOrExpired);
        };

        if challenge.attempts >= self.config.otp_max_attempts() {
            self.store.mark_used(challenge.id).await?;
            info!(challenge_id = %challenge.id, "challenge invalidated: attempt budget exhausted");
            return Err(LoginError::TooManyAttempts);
        }

        if !crypto::verify_otp(code, &challenge.otp_hash) {
            let attempts = self.store.record_failed_attempt(challenge.id).await?;
            debug!(challenge_id = %challenge.id, attempts, "otp mismatch");
            return Err(LoginError::InvalidOrExpired);
        }

        // Conditional consume: of two concurrent verifies only one wins.
        if !self.store.mark_used_if_active(challenge.id, now).await? {
            return Err(LoginError::InvalidOrExpired);
        }

        let account = self
            .store
            .find_account_by_id(challenge.account_id)
            .await?
            .ok_or_else(|| {
                LoginError::Internal(anyhow!("challenge references missing account"))
            })?;

        let tokens = self.tokens.issue(&account)?;

        self.record_audit(AuditEvent {
            actor_id: Some(account.id),
            actor_name: account.full_name.clone(),
            actor_email: account.email.clone(),
            action: AuditAction::Login,
            resource: AuditResource::User,
            resource_id: Some(account.id.to_string()),
            details: "Logged in".to_string(),
            ip_address: client_ip.map(str::to_string),
        })
        .await;

        info!(account_id = %account.id, "login completed");

        Ok(VerifiedLogin { tokens, account })
    }

    /// Replace the OTP on a live challenge and deliver the new code.
    pub async fn resend_otp(
        &self,
        challenge_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ResendTicket, LoginError> {
        let Some(challenge) = self.store.find_active_challenge(challenge_id, now).await? else {
            return Err(LoginError::InvalidOrExpired);
        };
        if challenge.send_count - 1 >= self.config.otp_max_resends() {
            return Err(LoginError::MaxResendsReached);
        }

        let account = self
            .store
            .find_account_by_id(challenge.account_id)
            .await?
            .ok_or_else(|| {
                LoginError::Internal(anyhow!("challenge references missing account"))
            })?;

        let otp = crypto::generate_otp();
        let otp_hash = crypto::hash_otp(&otp)?;
        let expires_at = now + self.config.otp_ttl();

        // The store re-checks state under an exclusive lock; the conditions
        // may have changed since the read above.
        let update = self
            .store
            .apply_resend(
                challenge.id,
                now,
                &otp_hash,
                expires_at,
                self.config.otp_max_resends(),
            )
            .await?;

        match update {
            ResendUpdate::Gone => Err(LoginError::InvalidOrExpired),
            ResendUpdate::LimitReached => Err(LoginError::MaxResendsReached),
            ResendUpdate::Updated { send_count } => {
                debug!(challenge_id = %challenge.id, send_count, "otp resent");
                // The resend is already persisted at this point; a delivery
                // failure still spends it.
                if let Err(err) = self.send_otp_email(&account, &otp).await {
                    warn!(account_id = %account.id, "resend OTP delivery failed: {err:#}");
                    return Err(LoginError::DeliveryFailed);
                }
                Ok(ResendTicket {
                    expires_in: self.config.otp_ttl_seconds(),
                })
            }
        }
    }

    /// Exchange a refresh token for a new access token.
    pub fn refresh_access(&self, refresh_token: &str) -> anyhow::Result<String> {
        self.tokens.refresh(refresh_token)
    }

    async fn register_password_failure(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<(), LoginError> {
        match self.lockout.register_failure(account, now) {
            FailureOutcome::Counted { failed_attempts } => {
                self.store
                    .save_lockout_state(account.id, failed_attempts, account.account_locked_until)
                    .await?;
            }
            FailureOutcome::Locked { locked_until } => {
                self.store
                    .save_lockout_state(account.id, 0, Some(locked_until))
                    .await?;
                info!(account_id = %account.id, %locked_until, "account locked");
                // One notification per lock event; best effort.
                let message = EmailMessage {
                    to_email: account.email.clone(),
                    subject: "Account temporarily locked".to_string(),
                    template: TEMPLATE_ACCOUNT_LOCKED.to_string(),
                    payload_json: json!({
                        "name": account.full_name,
                        "reset_url": self.config.password_reset_url(),
                    })
                    .to_string(),
                };
                if let Err(err) = self.mailer.send(&message).await {
                    warn!(account_id = %account.id, "account-locked email failed: {err:#}");
                }
            }
        }
        Ok(())
    }

    async fn send_otp_email(&self, account: &Account, otp: &str) -> anyhow::Result<()> {
        let message = EmailMessage {
            to_email: account.email.clone(),
            subject: "Your TASC LMS login code".to_string(),
            template: TEMPLATE_MFA_CODE.to_string(),
            payload_json: json!({
                "name": account.full_name,
                "otp": otp,
            })
            .to_string(),
        };
        self.mailer.send(&message).await
    }

    async fn record_audit(&self, event: AuditEvent) {
        if let Err(err) = self.audit.record(&event).await {
            warn!("audit record failed: {err:#}");
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::normalize_email;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Peter@Test.COM "), "peter@test.com");
    }
}
