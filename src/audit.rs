//! Fire-and-forget audit trail.
//!
//! A failed write is logged and dropped; it never fails the operation that
//! produced it.

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::{
    models::{AuditContext, AuditEvent},
    store::Stores,
};

pub async fn emit(
    stores: &Stores,
    ctx: &AuditContext,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    details: Value,
    now: NaiveDateTime,
) {
    let event = AuditEvent::new(ctx, action, entity_type, entity_id, details, now);
    if let Err(err) = stores.audit.record(&event).await {
        tracing::warn!(
            error = %err,
            action,
            entity_type,
            entity_id,
            "Failed to record audit event"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::store::{memory::MemoryAuditSink, AuditSink, StoreError, StoreResult};

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn record(&self, _event: &AuditEvent) -> StoreResult<()> {
            Err(StoreError::Backend(anyhow::anyhow!("disk full")))
        }

        async fn purge_expired(&self, _now: NaiveDateTime) -> StoreResult<u64> {
            Ok(0)
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn records_event_with_retention_stamp() {
        let sink = MemoryAuditSink::default();
        let stores = Stores::in_memory().with_audit(Arc::new(sink.clone()));
        let ctx = AuditContext::user("admin-1");

        emit(&stores, &ctx, "session_created", "Session", "s-1", json!({"venue": "Pool"}), now()).await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].performed_by.as_deref(), Some("admin-1"));
        assert_eq!(
            events[0].retain_until.date(),
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
        );
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let stores = Stores::in_memory().with_audit(Arc::new(BrokenSink));
        emit(&stores, &AuditContext::system(), "noop", "Test", "1", json!({}), now()).await;
    }

    #[tokio::test]
    async fn purge_drops_only_expired_events() {
        let sink = MemoryAuditSink::default();
        let ctx = AuditContext::system();
        sink.record(&AuditEvent::new(&ctx, "old", "Test", "1", json!({}), now()))
            .await
            .unwrap();

        let purged = sink
            .purge_expired(now() + chrono::Days::new(400))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(sink.events().is_empty());
    }
}
