//! Account lockout policy.
//!
//! Pure computation over the lockout fields of [`Account`]; persistence is the
//! caller's job. Evaluated before any password comparison so locked accounts
//! never reach the hasher.

use chrono::{DateTime, Duration, Utc};

use super::models::Account;

/// Result of registering one failed password attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Below the threshold: persist the incremented counter.
    Counted { failed_attempts: i32 },
    /// Threshold reached: persist counter 0 and the lock timestamp, and send
    /// the account-locked notification exactly once.
    Locked { locked_until: DateTime<Utc> },
}

#[derive(Clone, Debug)]
pub struct LockoutPolicy {
    max_attempts: i32,
    lock_duration: Duration,
}

impl LockoutPolicy {
    #[must_use]
    pub fn new(max_attempts: i32, lock_duration: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lock_duration,
        }
    }

    /// True iff the account carries a lock timestamp strictly in the future.
    #[must_use]
    pub fn is_locked(&self, account: &Account, now: DateTime<Utc>) -> bool {
        account
            .account_locked_until
            .is_some_and(|until| until > now)
    }

    /// Compute the transition for one more failed attempt.
    #[must_use]
    pub fn register_failure(&self, account: &Account, now: DateTime<Utc>) -> FailureOutcome {
        let next = account.failed_login_attempts.saturating_add(1);
        if next >= self.max_attempts {
            FailureOutcome::Locked {
                locked_until: now + self.lock_duration,
            }
        } else {
            FailureOutcome::Counted {
                failed_attempts: next,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn account(failed_attempts: i32, locked_until: Option<DateTime<Utc>>) -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "lock@example.com".to_string(),
            username: "lock".to_string(),
            full_name: "Lock Example".to_string(),
            password_hash: "hash".to_string(),
            email_verified: true,
            is_active: true,
            failed_login_attempts: failed_attempts,
            account_locked_until: locked_until,
        }
    }

    #[test]
    fn unlocked_without_timestamp() {
        let policy = LockoutPolicy::new(5, Duration::minutes(15));
        assert!(!policy.is_locked(&account(3, None), Utc::now()));
    }

    #[test]
    fn locked_while_timestamp_in_future() {
        let policy = LockoutPolicy::new(5, Duration::minutes(15));
        let now = Utc::now();
        assert!(policy.is_locked(&account(0, Some(now + Duration::minutes(1))), now));
        assert!(!policy.is_locked(&account(0, Some(now - Duration::seconds(1))), now));
        // Boundary: a lock expiring exactly now is no longer a lock.
        assert!(!policy.is_locked(&account(0, Some(now)), now));
    }

    #[test]
    fn failures_count_up_to_threshold() {
        let policy = LockoutPolicy::new(5, Duration::minutes(15));
        let now = Utc::now();
        assert_eq!(
            policy.register_failure(&account(0, None), now),
            FailureOutcome::Counted { failed_attempts: 1 }
        );
        assert_eq!(
            policy.register_failure(&account(3, None), now),
            FailureOutcome::Counted { failed_attempts: 4 }
        );
    }

    #[test]
    fn threshold_triggers_lock_window() {
        let policy = LockoutPolicy::new(5, Duration::minutes(15));
        let now = Utc::now();
        assert_eq!(
            policy.register_failure(&account(4, None), now),
            FailureOutcome::Locked {
                locked_until: now + Duration::minutes(15)
            }
        );
    }
}
