//! HTTP surface: router, middleware stack and server startup.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use url::Url;

pub(crate) mod handlers;
mod openapi;

pub use handlers::auth::AuthState;
pub use openapi::ApiDoc;

use crate::audit::PgAuditSink;
use crate::email::{EmailSender, LogEmailSender, SendGridSender};
use crate::login::repo::PgLoginStore;
use crate::login::{LoginConfig, LoginService};
use crate::token::JwtIssuer;

/// Everything the server needs besides port and DSN.
pub struct ApiSettings {
    pub jwt_secret: SecretString,
    pub sendgrid_api_key: Option<SecretString>,
    pub from_email: String,
    pub login: LoginConfig,
}

/// Build the application router around shared auth state.
#[must_use]
pub fn router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/openapi.json", get(openapi_json))
        .route("/auth/login/", post(handlers::auth::login))
        .route("/auth/login/verify-otp/", post(handlers::auth::verify_otp))
        .route("/auth/login/resend-otp/", post(handlers::auth::resend_otp))
        .route("/auth/refresh/", post(handlers::auth::refresh))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, settings: ApiSettings) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let mailer: Arc<dyn EmailSender> = match settings.sendgrid_api_key {
        Some(api_key) => Arc::new(SendGridSender::new(api_key, settings.from_email)?),
        None => {
            warn!("no SendGrid API key configured; emails will be logged only");
            Arc::new(LogEmailSender)
        }
    };

    let service = Arc::new(LoginService::new(
        Arc::new(PgLoginStore::new(pool.clone())),
        mailer,
        Arc::new(JwtIssuer::new(&settings.jwt_secret)),
        Arc::new(PgAuditSink::new(pool)),
        settings.login,
    ));

    let frontend_origin = frontend_origin(service.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let state = Arc::new(AuthState::new(service));
    let app = router(state).layer(cors);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(ApiDoc::openapi())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::frontend_origin;

    #[test]
    fn frontend_origin_strips_path() {
        let origin = frontend_origin("http://localhost:5173/app/").expect("valid origin");
        assert_eq!(origin, "http://localhost:5173");
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
    }
}
