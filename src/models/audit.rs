use chrono::{Days, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

/// Audit rows are kept for a year and a day.
pub const AUDIT_RETENTION_DAYS: u64 = 366;

/// Who performed a mutating operation, and from where.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub performed_by: Option<String>,
    pub ip_address:   Option<String>,
    pub user_agent:   Option<String>,
}

impl AuditContext {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            performed_by: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Context for work done by the background maintenance task.
    pub fn system() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action:       String,
    pub entity_type:  String,
    pub entity_id:    String,
    pub performed_by: Option<String>,
    pub performed_at: NaiveDateTime,
    pub details:      Value,
    pub ip_address:   Option<String>,
    pub user_agent:   Option<String>,
    pub retain_until: NaiveDateTime,
}

impl AuditEvent {
    pub fn new(
        ctx: &AuditContext,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        details: Value,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            action:       action.to_owned(),
            entity_type:  entity_type.to_owned(),
            entity_id:    entity_id.to_owned(),
            performed_by: ctx.performed_by.clone(),
            performed_at: now,
            details,
            ip_address:   ctx.ip_address.clone(),
            user_agent:   ctx.user_agent.clone(),
            retain_until: now + Days::new(AUDIT_RETENTION_DAYS),
        }
    }
}
