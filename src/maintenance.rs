use std::time::Duration;

use chrono::NaiveDateTime;

use crate::{services, state::AppState, store::Stores};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub audit_rows_purged: u64,
    pub covers_completed:  u64,
}

pub fn spawn_maintenance(state: AppState) {
    if !state.config.maintenance_enabled {
        tracing::info!("Maintenance job disabled");
        return;
    }

    let minutes = state.config.maintenance_interval_minutes.max(1);
    tracing::info!(minutes, "Maintenance job started");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(minutes.saturating_mul(60)));
        // interval fires immediately; skip it so the first run waits a full period.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(err) = run_maintenance(&state.stores, services::now()).await {
                tracing::error!(error = %err, "Maintenance run failed");
            }
        }
    });
}

/// Purges expired audit rows, then completes confirmed covers whose session
/// has started.
pub async fn run_maintenance(stores: &Stores, now: NaiveDateTime) -> anyhow::Result<MaintenanceReport> {
    let audit_rows_purged = stores.audit.purge_expired(now).await?;
    let covers_completed = services::cover::complete_past_confirmed(stores, now).await?;

    if audit_rows_purged > 0 || covers_completed > 0 {
        tracing::info!(audit_rows_purged, covers_completed, "Maintenance run finished");
    }

    Ok(MaintenanceReport {
        audit_rows_purged,
        covers_completed,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};
    use serde_json::json;

    use super::*;
    use crate::{audit, models::AuditContext};

    #[tokio::test]
    async fn purges_audit_rows_past_retention() {
        let stores = Stores::in_memory();
        let then = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        audit::emit(&stores, &AuditContext::system(), "user_login", "User", "u-1", json!({}), then).await;

        let early = run_maintenance(&stores, then + Days::new(30)).await.unwrap();
        assert_eq!(early, MaintenanceReport::default());

        let late = run_maintenance(&stores, then + Days::new(400)).await.unwrap();
        assert_eq!(late.audit_rows_purged, 1);
        assert_eq!(late.covers_completed, 0);
    }
}
