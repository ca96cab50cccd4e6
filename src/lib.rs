//! # TASC LMS API
//!
//! Backend for the TASC learning management system. This crate currently
//! covers the authentication surface:
//!
//! - **Password + email OTP login.** A correct password never logs a user in
//!   directly; it issues a short-lived challenge and emails a 6-digit code.
//!   Only plain hashes are stored, both for passwords and for codes.
//! - **Account lockout.** Repeated password failures lock the account for a
//!   fixed window and notify the owner by email.
//! - **Sessions.** Verified logins receive a JWT access/refresh pair.
//! - **Audit trail.** Completed logins and delivery failures are recorded
//!   with the client address when a proxy provides one.
//!
//! Responses are deliberately uniform: unknown emails and wrong passwords
//! are indistinguishable, as are missing, used and expired challenges.

pub mod api;
pub mod audit;
pub mod cli;
pub mod email;
pub mod login;
pub mod token;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
