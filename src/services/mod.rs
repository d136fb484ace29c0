//! Application operations. Each function takes the store bundle, an explicit
//! `now`, and (for mutations) the caller's [`AuditContext`].
//!
//! [`AuditContext`]: crate::models::AuditContext

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
    errors::CoreResult,
    models::{CoverRequest, Session},
    store::Stores,
};

pub mod cover;
pub mod dashboard;
pub mod documents;
pub mod eligibility;
pub mod instructors;
pub mod stats;
pub mod timetable;
pub mod week;

/// Wall-clock time in the centre's local zone. Handlers pass this as `now`.
pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// A cover request together with the session it covers.
#[derive(Debug, Clone, Serialize)]
pub struct CoverView {
    #[serde(flatten)]
    pub request: CoverRequest,
    pub session: Session,
}

/// Joins each request to its session, keeping input order. Requests whose
/// session has vanished are dropped.
pub(crate) async fn attach_sessions(
    stores: &Stores,
    requests: Vec<CoverRequest>,
) -> CoreResult<Vec<CoverView>> {
    let mut ids: Vec<String> = requests.iter().map(|r| r.session_id.clone()).collect();
    ids.sort();
    ids.dedup();

    let sessions: HashMap<String, Session> = stores
        .sessions
        .find_many(&ids)
        .await?
        .into_iter()
        .map(|s| (s.id.clone(), s))
        .collect();

    Ok(requests
        .into_iter()
        .filter_map(|request| {
            let session = sessions.get(&request.session_id).cloned();
            if session.is_none() {
                tracing::warn!(cover_request = %request.id, session = %request.session_id, "Cover request references a missing session");
            }
            session.map(|session| CoverView { request, session })
        })
        .collect())
}
