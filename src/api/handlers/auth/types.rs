//! Request/response types for the login endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::login::models::Account;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub mfa_required: bool,
    pub method: String,
    pub challenge_id: Uuid,
    pub expires_in: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub challenge_id: String,
    pub otp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpResponse {
    pub refresh: String,
    pub access: String,
    pub user: UserProfile,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendOtpRequest {
    pub challenge_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendOtpResponse {
    pub detail: String,
    pub expires_in: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    pub access: String,
}

/// Minimal account profile returned after a completed login.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: String,
    pub email_verified: bool,
    pub is_active: bool,
}

impl From<&Account> for UserProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.full_name.clone(),
            email: account.email.clone(),
            username: account.username.clone(),
            email_verified: account.email_verified,
            is_active: account.is_active,
        }
    }
}

/// Uniform failure body: stable code plus human-readable detail.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub code: String,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_request_round_trips() -> Result<()> {
        let request = LoginRequest {
            email: "peter@test.com".to_string(),
            password: "peter".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "peter@test.com");
        let decoded: LoginRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.password, "peter");
        Ok(())
    }

    #[test]
    fn user_profile_from_account() {
        let account = Account {
            id: uuid::Uuid::new_v4(),
            email: "peter@test.com".to_string(),
            username: "peter".to_string(),
            full_name: "Peter Kakuru".to_string(),
            password_hash: "hash".to_string(),
            email_verified: true,
            is_active: true,
            failed_login_attempts: 0,
            account_locked_until: None,
        };
        let profile = UserProfile::from(&account);
        assert_eq!(profile.name, "Peter Kakuru");
        assert_eq!(profile.email, "peter@test.com");
        assert!(profile.email_verified);
    }

    #[test]
    fn error_response_serializes_code_and_detail() -> Result<()> {
        let body = ErrorResponse {
            code: "ACCOUNT_LOCKED".to_string(),
            detail: "Account locked.".to_string(),
        };
        let value = serde_json::to_value(&body)?;
        assert_eq!(
            value.get("code").and_then(serde_json::Value::as_str),
            Some("ACCOUNT_LOCKED")
        );
        Ok(())
    }
}
