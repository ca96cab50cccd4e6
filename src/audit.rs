//! Audit trail sink.
//!
//! Recording is fire-and-forget from the login flow's perspective: a failed
//! insert is logged and swallowed, never surfaced to the client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Logout,
    Created,
    Updated,
    Deleted,
}

impl AuditAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditResource {
    User,
    Course,
    Organization,
    Payment,
}

impl AuditResource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Course => "course",
            Self::Organization => "organization",
            Self::Payment => "payment",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditEvent {
    pub actor_id: Option<Uuid>,
    pub actor_name: String,
    pub actor_email: String,
    pub action: AuditAction,
    pub resource: AuditResource,
    pub resource_id: Option<String>,
    pub details: String,
    pub ip_address: Option<String>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<()>;
}

/// Sink for tests and setups without an audit table.
#[derive(Clone, Debug)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _event: &AuditEvent) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        let query = r"
            INSERT INTO audit_log
                (actor_id, actor_name, actor_email, action, resource,
                 resource_id, details, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(event.actor_id)
            .bind(&event.actor_name)
            .bind(&event.actor_email)
            .bind(event.action.as_str())
            .bind(event.resource.as_str())
            .bind(&event.resource_id)
            .bind(&event.details)
            .bind(&event.ip_address)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert audit log entry")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_match_schema() {
        assert_eq!(AuditAction::Login.as_str(), "login");
        assert_eq!(AuditAction::Deleted.as_str(), "deleted");
    }

    #[test]
    fn resource_names_match_schema() {
        assert_eq!(AuditResource::User.as_str(), "user");
        assert_eq!(AuditResource::Payment.as_str(), "payment");
    }

    #[tokio::test]
    async fn null_sink_accepts_everything() -> Result<()> {
        NullAuditSink
            .record(&AuditEvent {
                actor_id: None,
                actor_name: String::new(),
                actor_email: String::new(),
                action: AuditAction::Login,
                resource: AuditResource::User,
                resource_id: None,
                details: "Logged in".to_string(),
                ip_address: None,
            })
            .await
    }
}
