//! Login endpoints: password step, OTP verification, resend and refresh.

pub mod types;
mod utils;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::login::{LoginError, LoginService};

use types::{
    ErrorResponse, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    ResendOtpRequest, ResendOtpResponse, UserProfile, VerifyOtpRequest, VerifyOtpResponse,
};
use utils::{extract_client_ip, valid_email};

/// Only second factor currently offered.
const MFA_METHOD_EMAIL_OTP: &str = "email_otp";

/// Shared state for the auth handlers.
pub struct AuthState {
    service: Arc<LoginService>,
}

impl AuthState {
    #[must_use]
    pub fn new(service: Arc<LoginService>) -> Self {
        Self { service }
    }

    #[must_use]
    pub fn service(&self) -> &LoginService {
        &self.service
    }
}

#[utoipa::path(
    post,
    path = "/auth/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Password accepted, OTP challenge issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account locked or email not verified", body = ErrorResponse),
        (status = 503, description = "OTP delivery failed", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return bad_request("Missing payload");
    };

    let email = request.email.trim().to_lowercase();
    if !valid_email(&email) {
        return bad_request("Invalid email");
    }
    if request.password.is_empty() {
        return bad_request("Missing password");
    }

    match state
        .service()
        .begin_login(&email, &request.password, Utc::now())
        .await
    {
        Ok(ticket) => (
            StatusCode::OK,
            Json(LoginResponse {
                mfa_required: true,
                method: MFA_METHOD_EMAIL_OTP.to_string(),
                challenge_id: ticket.challenge_id,
                expires_in: ticket.expires_in,
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login/verify-otp/",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP accepted, tokens issued", body = VerifyOtpResponse),
        (status = 400, description = "Invalid or expired challenge/code", body = ErrorResponse),
        (status = 403, description = "Too many attempts", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn verify_otp(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return bad_request("Missing payload");
    };

    // A malformed id cannot match any challenge; answer uniformly.
    let Ok(challenge_id) = Uuid::parse_str(request.challenge_id.trim()) else {
        return error_response(&LoginError::InvalidOrExpired);
    };

    let client_ip = extract_client_ip(&headers);
    match state
        .service()
        .verify_otp(
            challenge_id,
            request.otp.trim(),
            Utc::now(),
            client_ip.as_deref(),
        )
        .await
    {
        Ok(login) => (
            StatusCode::OK,
            Json(VerifyOtpResponse {
                refresh: login.tokens.refresh,
                access: login.tokens.access,
                user: UserProfile::from(&login.account),
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login/resend-otp/",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "New OTP sent", body = ResendOtpResponse),
        (status = 400, description = "Invalid or expired challenge", body = ErrorResponse),
        (status = 429, description = "Resend limit reached", body = ErrorResponse),
        (status = 503, description = "OTP delivery failed", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn resend_otp(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<ResendOtpRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return bad_request("Missing payload");
    };

    let Ok(challenge_id) = Uuid::parse_str(request.challenge_id.trim()) else {
        return error_response(&LoginError::InvalidOrExpired);
    };

    match state.service().resend_otp(challenge_id, Utc::now()).await {
        Ok(ticket) => (
            StatusCode::OK,
            Json(ResendOtpResponse {
                detail: "A new code has been sent to your email.".to_string(),
                expires_in: ticket.expires_in,
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/auth/refresh/",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return bad_request("Missing payload");
    };

    match state.service().refresh_access(request.refresh.trim()) {
        Ok(access) => (StatusCode::OK, Json(RefreshResponse { access })).into_response(),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                code: "INVALID_TOKEN".to_string(),
                detail: "Token is invalid or expired.".to_string(),
            }),
        )
            .into_response(),
    }
}

fn bad_request(detail: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            code: "INVALID_REQUEST".to_string(),
            detail: detail.to_string(),
        }),
    )
        .into_response()
}

/// Map the failure taxonomy to stable response codes. Internal errors are
/// logged server-side and surfaced as a generic 500.
fn error_response(err: &LoginError) -> Response {
    let status = match err {
        LoginError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        LoginError::AccountLocked
        | LoginError::EmailNotVerified
        | LoginError::TooManyAttempts => StatusCode::FORBIDDEN,
        LoginError::DeliveryFailed => StatusCode::SERVICE_UNAVAILABLE,
        LoginError::InvalidOrExpired => StatusCode::BAD_REQUEST,
        LoginError::MaxResendsReached => StatusCode::TOO_MANY_REQUESTS,
        LoginError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let detail = if let LoginError::Internal(inner) = err {
        error!("login internal error: {inner:#}");
        "Internal server error.".to_string()
    } else {
        err.to_string()
    };

    (
        status,
        Json(ErrorResponse {
            code: err.code().to_string(),
            detail,
        }),
    )
        .into_response()
}
