//! Persistent records touched by the login flow.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Core user account as seen by the login flow. Both verification flags must
/// be true before a login can proceed past the password check.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub is_active: bool,
    /// Only meaningful while `account_locked_until` is empty or in the past;
    /// resets to 0 when a lock triggers or a password check succeeds.
    pub failed_login_attempts: i32,
    pub account_locked_until: Option<DateTime<Utc>>,
}

/// One in-flight OTP verification, bound to an account and time-limited.
/// Once `is_used` is set the record is terminal.
#[derive(Clone, Debug)]
pub struct LoginChallenge {
    pub id: Uuid,
    pub account_id: Uuid,
    pub otp_hash: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: i32,
    pub send_count: i32,
    pub last_sent_at: DateTime<Utc>,
    pub is_used: bool,
}

impl LoginChallenge {
    /// Fresh challenge for a just-authenticated account. `send_count` starts
    /// at 1 because creation includes the first OTP send.
    #[must_use]
    pub fn new(account_id: Uuid, otp_hash: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            otp_hash,
            expires_at: now + ttl,
            attempts: 0,
            send_count: 1,
            last_sent_at: now,
            is_used: false,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_challenge_starts_fresh() {
        let now = Utc::now();
        let challenge = LoginChallenge::new(
            Uuid::new_v4(),
            "hash".to_string(),
            now,
            Duration::seconds(300),
        );
        assert_eq!(challenge.attempts, 0);
        assert_eq!(challenge.send_count, 1);
        assert_eq!(challenge.last_sent_at, now);
        assert_eq!(challenge.expires_at, now + Duration::seconds(300));
        assert!(!challenge.is_used);
        assert!(!challenge.is_expired(now));
    }

    #[test]
    fn challenge_expiry_is_strict() {
        let now = Utc::now();
        let challenge = LoginChallenge::new(
            Uuid::new_v4(),
            "hash".to_string(),
            now,
            Duration::seconds(300),
        );
        assert!(challenge.is_expired(now + Duration::seconds(300)));
        assert!(!challenge.is_expired(now + Duration::seconds(299)));
    }
}
