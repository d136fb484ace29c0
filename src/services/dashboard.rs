use serde::Serialize;

use super::{attach_sessions, CoverView};
use crate::{
    errors::CoreResult,
    models::{CoverStatus, DocumentStatus, RoleKind, User, UserStatus},
    store::{CoverFilter, DocumentFilter, Stores, UserFilter},
};

const RECENT_LIMIT: usize = 5;

#[derive(Debug, Default, Serialize)]
pub struct DashboardCounts {
    pub pending_instructors:  usize,
    pub approved_instructors: usize,
    pub open_cover_requests:  u64,
    pub pending_documents:    usize,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub stats:                       DashboardCounts,
    pub recent_pending_instructors:  Vec<User>,
    pub recent_cover_requests:       Vec<CoverView>,
}

fn instructors_with(status: UserStatus) -> UserFilter {
    UserFilter {
        role:   Some(RoleKind::Instructor),
        status: Some(status),
    }
}

pub async fn admin_dashboard(stores: &Stores) -> CoreResult<Dashboard> {
    let mut pending = stores.users.list(&instructors_with(UserStatus::Pending)).await?;
    let approved = stores.users.list(&instructors_with(UserStatus::Approved)).await?;
    let open_cover_requests = stores.covers.count(&CoverFilter::with_status(CoverStatus::Open)).await?;
    let pending_documents = stores
        .documents
        .list(&DocumentFilter {
            status: Some(DocumentStatus::Pending),
            ..DocumentFilter::default()
        })
        .await?
        .len();

    let recent_open = stores
        .covers
        .list(&CoverFilter {
            newest_first: true,
            limit: Some(RECENT_LIMIT as u32),
            ..CoverFilter::with_status(CoverStatus::Open)
        })
        .await?;

    let stats = DashboardCounts {
        pending_instructors: pending.len(),
        approved_instructors: approved.len(),
        open_cover_requests,
        pending_documents,
    };
    pending.truncate(RECENT_LIMIT);

    Ok(Dashboard {
        stats,
        recent_pending_instructors: pending,
        recent_cover_requests: attach_sessions(stores, recent_open).await?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        models::AuditContext,
        services::instructors::{self, Registration},
    };

    #[tokio::test]
    async fn counts_pending_instructors() {
        let stores = Stores::in_memory();
        let now = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        for n in 0..7 {
            instructors::register(
                &stores,
                Registration {
                    email:             format!("user{n}@example.com"),
                    password:          "long-enough-pw".into(),
                    first_name:        "Test".into(),
                    last_name:         format!("User{n}"),
                    phone:             None,
                    emergency_contact: None,
                },
                &AuditContext::default(),
                now,
            )
            .await
            .unwrap();
        }

        let dashboard = admin_dashboard(&stores).await.unwrap();
        assert_eq!(dashboard.stats.pending_instructors, 7);
        assert_eq!(dashboard.stats.approved_instructors, 0);
        assert_eq!(dashboard.recent_pending_instructors.len(), RECENT_LIMIT);
        assert_eq!(dashboard.stats.open_cover_requests, 0);
        assert!(dashboard.recent_cover_requests.is_empty());
    }
}
