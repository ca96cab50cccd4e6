use super::handlers::auth;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::verify_otp,
        auth::resend_otp,
        auth::refresh,
    ),
    components(schemas(
        auth::types::LoginRequest,
        auth::types::LoginResponse,
        auth::types::VerifyOtpRequest,
        auth::types::VerifyOtpResponse,
        auth::types::ResendOtpRequest,
        auth::types::ResendOtpResponse,
        auth::types::RefreshRequest,
        auth::types::RefreshResponse,
        auth::types::UserProfile,
        auth::types::ErrorResponse,
    )),
    tags(
        (name = "auth", description = "Login, OTP verification and session refresh")
    ),
    info(
        title = "tasc-lms",
        description = "TASC LMS API"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_auth_paths() {
        let spec = ApiDoc::openapi();
        assert!(spec.paths.paths.contains_key("/auth/login/"));
        assert!(spec.paths.paths.contains_key("/auth/login/verify-otp/"));
        assert!(spec.paths.paths.contains_key("/auth/login/resend-otp/"));
        assert!(spec.paths.paths.contains_key("/auth/refresh/"));
    }

    #[test]
    fn openapi_tags_present() {
        let spec = ApiDoc::openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
    }
}
