use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{to_json, MySqlStore};
use crate::{
    models::AuditEvent,
    store::{AuditSink, StoreResult},
};

#[async_trait]
impl AuditSink for MySqlStore {
    async fn record(&self, event: &AuditEvent) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO audit_logs
                (action, entity_type, entity_id, performed_by, performed_at, details,
                 ip_address, user_agent, retain_until)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.action)
        .bind(&event.entity_type)
        .bind(&event.entity_id)
        .bind(&event.performed_by)
        .bind(event.performed_at)
        .bind(to_json(&event.details)?)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(event.retain_until)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: NaiveDateTime) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM audit_logs WHERE retain_until < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
