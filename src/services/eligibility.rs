//! Open cover an instructor could pick up.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::CoverView;
use crate::{
    errors::CoreResult,
    models::{user::is_eligible, CoverStatus, Urgency, User},
    store::{CoverFilter, Stores},
};

#[derive(Debug, Serialize)]
pub struct OpenOpportunities {
    pub open_requests:     Vec<CoverView>,
    /// Requests this instructor accepted that still await confirmation.
    pub accepted_requests: Vec<CoverView>,
    pub urgent_count:      usize,
}

/// Open requests `instructor` could take, most urgent first.
pub async fn list_open_opportunities(
    stores: &Stores,
    instructor: &User,
    now: NaiveDateTime,
) -> CoreResult<OpenOpportunities> {
    let open = stores
        .covers
        .list(&CoverFilter {
            starts_from: Some(now),
            ..CoverFilter::with_status(CoverStatus::Open)
        })
        .await?;
    let open = open
        .into_iter()
        .filter(|r| r.requested_for.as_deref() != Some(instructor.id.as_str()))
        .collect();

    let mut open_requests: Vec<CoverView> = super::attach_sessions(stores, open)
        .await?
        .into_iter()
        .filter(|view| {
            is_eligible(instructor.qualifications(), &view.session.required_qualifications)
        })
        .collect();
    open_requests.sort_by_key(|view| (view.request.urgency.rank(), view.request.session_date_time));

    let accepted = stores
        .covers
        .list(&CoverFilter {
            accepted_by: Some(instructor.id.clone()),
            ..CoverFilter::with_status(CoverStatus::Accepted)
        })
        .await?;
    let accepted_requests = super::attach_sessions(stores, accepted).await?;

    let urgent_count = open_requests
        .iter()
        .filter(|view| view.request.urgency == Urgency::Urgent)
        .count();

    Ok(OpenOpportunities {
        open_requests,
        accepted_requests,
        urgent_count,
    })
}
