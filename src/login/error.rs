//! Failure taxonomy for the login flow.
//!
//! Business failures carry stable machine-checkable codes and uniform detail
//! strings; anything internal collapses into `Internal` and is reported as a
//! generic server error without leaking context to the client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoginError {
    /// Uniform for bad password and unknown email, to prevent enumeration.
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("Account locked due to too many failed login attempts. Try again later.")]
    AccountLocked,
    #[error("Email not verified. Please verify your email before logging in.")]
    EmailNotVerified,
    /// Upstream notification failure; the client may retry.
    #[error("Could not deliver the login code. Please try again shortly.")]
    DeliveryFailed,
    /// Uniform for wrong id, wrong code, already-used and expired challenges.
    #[error("Invalid or expired code.")]
    InvalidOrExpired,
    #[error("Too many incorrect attempts. Please log in again.")]
    TooManyAttempts,
    #[error("Maximum resends reached. Please log in again.")]
    MaxResendsReached,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LoginError {
    /// Stable response code for clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            Self::DeliveryFailed => "DELIVERY_FAILED",
            Self::InvalidOrExpired => "INVALID_OR_EXPIRED",
            Self::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            Self::MaxResendsReached => "MAX_RESENDS_REACHED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn codes_are_stable() {
        assert_eq!(LoginError::InvalidCredentials.code(), "INVALID_CREDENTIALS");
        assert_eq!(LoginError::AccountLocked.code(), "ACCOUNT_LOCKED");
        assert_eq!(LoginError::EmailNotVerified.code(), "EMAIL_NOT_VERIFIED");
        assert_eq!(LoginError::DeliveryFailed.code(), "DELIVERY_FAILED");
        assert_eq!(LoginError::InvalidOrExpired.code(), "INVALID_OR_EXPIRED");
        assert_eq!(LoginError::TooManyAttempts.code(), "TOO_MANY_ATTEMPTS");
        assert_eq!(LoginError::MaxResendsReached.code(), "MAX_RESENDS_REACHED");
    }

    #[test]
    fn internal_wraps_anyhow() {
        let err = LoginError::from(anyhow!("pool exhausted"));
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn detail_messages_never_mention_internals() {
        for err in [
            LoginError::InvalidCredentials,
            LoginError::AccountLocked,
            LoginError::InvalidOrExpired,
        ] {
            let detail = err.to_string();
            assert!(!detail.contains("sql"));
            assert!(!detail.contains("database"));
        }
    }
}
