use crate::api::{self, ApiSettings};
use crate::cli::actions::Action;
use crate::login::LoginConfig;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub sendgrid_api_key: Option<SecretString>,
    pub from_email: String,
    pub frontend_base_url: String,
    pub max_login_attempts: i32,
    pub account_lock_minutes: i64,
    pub otp_ttl_seconds: i64,
    pub otp_max_attempts: i32,
    pub otp_max_resends: i32,
}

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server(args) = action;

    let login = LoginConfig::new()
        .with_max_login_attempts(args.max_login_attempts)
        .with_account_lock_minutes(args.account_lock_minutes)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_otp_max_attempts(args.otp_max_attempts)
        .with_otp_max_resends(args.otp_max_resends)
        .with_frontend_base_url(args.frontend_base_url);

    let settings = ApiSettings {
        jwt_secret: args.jwt_secret,
        sendgrid_api_key: args.sendgrid_api_key,
        from_email: args.from_email,
        login,
    };

    api::new(args.port, args.dsn, settings).await?;

    Ok(())
}
