//! Notification gateway: how login emails leave the system.
//!
//! The login flow only depends on the [`EmailSender`] contract and calls it
//! at most once per operation; it never retries on its own. The SendGrid
//! sender talks to the v3 mail-send API over HTTPS with a bounded timeout.
//! `LogEmailSender` is the local-dev fallback that logs instead of sending.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Login OTP email.
pub const TEMPLATE_MFA_CODE: &str = "mfa_code";
/// Account locked after repeated failures.
pub const TEMPLATE_ACCOUNT_LOCKED: &str = "account_locked";

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub template: String,
    pub payload_json: String,
}

/// Email delivery abstraction used by the login flow.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error so the caller can surface a
    /// retryable failure.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

pub struct SendGridSender {
    api_key: SecretString,
    from_email: String,
    client: reqwest::Client,
}

impl SendGridSender {
    pub fn new(api_key: SecretString, from_email: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(SEND_TIMEOUT)
            .build()
            .context("failed to build sendgrid http client")?;
        Ok(Self {
            api_key,
            from_email,
            client,
        })
    }
}

#[async_trait]
impl EmailSender for SendGridSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload: Value = serde_json::from_str(&message.payload_json)
            .context("invalid email payload json")?;
        let body = render_body(&message.template, &payload);

        let request = json!({
            "personalizations": [{ "to": [{ "email": message.to_email }] }],
            "from": { "email": self.from_email },
            "subject": message.subject,
            "content": [{ "type": "text/plain", "value": body }],
        });

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .context("sendgrid request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("sendgrid returned {}", response.status()));
        }

        Ok(())
    }
}

/// Plain-text bodies for the login templates. Unknown templates fall back to
/// the raw payload so nothing silently disappears.
fn render_body(template: &str, payload: &Value) -> String {
    let field = |key: &str| payload.get(key).and_then(Value::as_str).unwrap_or("");
    match template {
        TEMPLATE_MFA_CODE => format!(
            "Your TASC LMS login code is {}. It expires in a few minutes. \
             If you did not try to log in, you can ignore this email.",
            field("otp")
        ),
        TEMPLATE_ACCOUNT_LOCKED => format!(
            "Your account was temporarily locked after too many failed login \
             attempts. You can reset your password here: {}",
            field("reset_url")
        ),
        _ => payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_sender_always_succeeds() -> Result<()> {
        let sender = LogEmailSender;
        sender
            .send(&EmailMessage {
                to_email: "peter@test.com".to_string(),
                subject: "Your TASC LMS login code".to_string(),
                template: TEMPLATE_MFA_CODE.to_string(),
                payload_json: json!({"otp": "004821"}).to_string(),
            })
            .await
    }

    #[test]
    fn mfa_body_contains_code() {
        let body = render_body(TEMPLATE_MFA_CODE, &json!({"otp": "004821"}));
        assert!(body.contains("004821"));
    }

    #[test]
    fn locked_body_contains_reset_url() {
        let body = render_body(
            TEMPLATE_ACCOUNT_LOCKED,
            &json!({"reset_url": "http://localhost:5173/passwordreset"}),
        );
        assert!(body.contains("http://localhost:5173/passwordreset"));
    }

    #[test]
    fn unknown_template_falls_back_to_payload() {
        let body = render_body("mystery", &json!({"k": "v"}));
        assert!(body.contains("\"k\""));
    }
}
