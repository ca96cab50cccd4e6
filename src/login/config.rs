//! Login configuration: recognized options and their defaults.

use chrono::Duration;

const DEFAULT_MAX_LOGIN_ATTEMPTS: i32 = 5;
const DEFAULT_ACCOUNT_LOCK_MINUTES: i64 = 15;
const DEFAULT_OTP_TTL_SECONDS: i64 = 300;
const DEFAULT_OTP_MAX_ATTEMPTS: i32 = 5;
const DEFAULT_OTP_MAX_RESENDS: i32 = 3;
const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:5173";

/// Tunables for the login flow. Password failures are tracked per account,
/// OTP attempts and resends per challenge.
#[derive(Clone, Debug)]
pub struct LoginConfig {
    max_login_attempts: i32,
    account_lock_minutes: i64,
    otp_ttl_seconds: i64,
    otp_max_attempts: i32,
    otp_max_resends: i32,
    frontend_base_url: String,
}

impl LoginConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            account_lock_minutes: DEFAULT_ACCOUNT_LOCK_MINUTES,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            otp_max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
            otp_max_resends: DEFAULT_OTP_MAX_RESENDS,
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_max_login_attempts(mut self, attempts: i32) -> Self {
        self.max_login_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_account_lock_minutes(mut self, minutes: i64) -> Self {
        self.account_lock_minutes = minutes.max(1);
        self
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_otp_max_attempts(mut self, attempts: i32) -> Self {
        self.otp_max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_otp_max_resends(mut self, resends: i32) -> Self {
        self.otp_max_resends = resends.max(0);
        self
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, url: String) -> Self {
        self.frontend_base_url = url;
        self
    }

    #[must_use]
    pub fn max_login_attempts(&self) -> i32 {
        self.max_login_attempts
    }

    #[must_use]
    pub fn lock_duration(&self) -> Duration {
        Duration::minutes(self.account_lock_minutes)
    }

    #[must_use]
    pub fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    #[must_use]
    pub fn otp_ttl(&self) -> Duration {
        Duration::seconds(self.otp_ttl_seconds)
    }

    #[must_use]
    pub fn otp_max_attempts(&self) -> i32 {
        self.otp_max_attempts
    }

    #[must_use]
    pub fn otp_max_resends(&self) -> i32 {
        self.otp_max_resends
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    /// Frontend password-reset page, linked from the account-locked email.
    #[must_use]
    pub fn password_reset_url(&self) -> String {
        format!("{}/passwordreset", self.frontend_base_url.trim_end_matches('/'))
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self::new()
    }
}
