//! Cover-request lifecycle: raising, accepting, confirming, declining,
//! cancelling and completing.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::CoverView;
use crate::{
    audit,
    errors::{CoreError, CoreResult},
    models::{
        AuditContext, CoverRequest, CoverStatus, PaymentStatus, Session, Urgency, User,
    },
    store::{CoverFilter, StoreError, Stores},
};

/// Confirmed requests shown on the admin overview.
const RECENT_CONFIRMED_LIMIT: u32 = 20;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCoverRequest {
    pub session_id:   String,
    pub cover_date:   NaiveDate,
    pub urgency:      Option<Urgency>,
    #[validate(length(max = 500))]
    pub reason:       Option<String>,
    #[validate(range(min = 0.0, message = "Payment rate cannot be negative"))]
    pub payment_rate: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InstructorCoverRequest {
    pub session_id: String,
    pub cover_date: NaiveDate,
    #[validate(length(max = 500))]
    pub reason:     Option<String>,
}

async fn load_session(stores: &Stores, session_id: &str) -> CoreResult<Session> {
    stores
        .sessions
        .find(session_id)
        .await?
        .ok_or(CoreError::SessionNotFound)
}

async fn load_request(stores: &Stores, id: &str) -> CoreResult<CoverRequest> {
    stores
        .covers
        .find(id)
        .await?
        .ok_or(CoreError::CoverRequestNotFound)
}

async fn insert_unique(stores: &Stores, request: &CoverRequest) -> CoreResult<()> {
    stores
        .covers
        .insert_unique(request)
        .await
        .map_err(|err| match err {
            StoreError::Conflict => CoreError::DuplicateRequest,
            other => other.into(),
        })
}

/// Writes a transition made on `request`, which was `from` when loaded.
/// A concurrent writer that moved the row first surfaces as `stale`.
async fn persist(
    stores: &Stores,
    request: &CoverRequest,
    from: CoverStatus,
    stale: CoreError,
) -> CoreResult<()> {
    stores
        .covers
        .transition(request, from)
        .await
        .map_err(|err| match err {
            StoreError::Conflict => stale,
            StoreError::NotFound => CoreError::CoverRequestNotFound,
            other => other.into(),
        })
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty())
}

/// Admin raises cover for a session on a given date.
pub async fn create(
    stores: &Stores,
    input: NewCoverRequest,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<CoverRequest> {
    input.validate()?;

    let session = load_session(stores, &input.session_id).await?;
    if input.cover_date < now.date() {
        return Err(CoreError::PastDate);
    }

    let request = CoverRequest {
        id:                Uuid::new_v4().to_string(),
        session_id:        session.id.clone(),
        cover_date:        input.cover_date,
        session_date_time: session.starts_at(input.cover_date),
        reason:            non_blank(input.reason),
        urgency:           input.urgency.unwrap_or_default(),
        status:            CoverStatus::Open,
        requested_by:      ctx.performed_by.clone().unwrap_or_default(),
        requested_for:     session.permanent_instructor_id.clone(),
        requested_at:      now,
        accepted_by:       None,
        accepted_at:       None,
        confirmed_by:      None,
        confirmed_at:      None,
        payment_rate:      input.payment_rate,
        payment_status:    PaymentStatus::Pending,
    };
    insert_unique(stores, &request).await?;

    audit::emit(
        stores,
        ctx,
        "cover_request_created",
        "CoverRequest",
        &request.id,
        json!({
            "session_name": session.class_name,
            "cover_date": request.cover_date,
        }),
        now,
    )
    .await;
    stores.notifier.notify_eligible_instructors(&request, &session).await;

    tracing::info!(cover_request = %request.id, session = %session.id, date = %request.cover_date, "Cover request created");
    Ok(request)
}

/// A permanent instructor asks for cover on one of their own sessions.
pub async fn request_by_instructor(
    stores: &Stores,
    instructor: &User,
    input: InstructorCoverRequest,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<CoverRequest> {
    input.validate()?;

    let session = load_session(stores, &input.session_id).await?;
    if session.permanent_instructor_id.as_deref() != Some(instructor.id.as_str()) {
        return Err(CoreError::NotYourSession);
    }

    let session_date_time = session.starts_at(input.cover_date);
    if session_date_time < now {
        return Err(CoreError::TooLate);
    }

    let request = CoverRequest {
        id:                Uuid::new_v4().to_string(),
        session_id:        session.id.clone(),
        cover_date:        input.cover_date,
        session_date_time,
        reason:            non_blank(input.reason),
        urgency:           Urgency::from_lead_time(now, session_date_time),
        status:            CoverStatus::Open,
        requested_by:      instructor.id.clone(),
        requested_for:     Some(instructor.id.clone()),
        requested_at:      now,
        accepted_by:       None,
        accepted_at:       None,
        confirmed_by:      None,
        confirmed_at:      None,
        payment_rate:      None,
        payment_status:    PaymentStatus::Pending,
    };
    insert_unique(stores, &request).await?;

    audit::emit(
        stores,
        ctx,
        "instructor_cover_request",
        "CoverRequest",
        &request.id,
        json!({
            "session_name": session.class_name,
            "cover_date": request.cover_date,
            "urgency": request.urgency,
        }),
        now,
    )
    .await;
    stores.notifier.notify_eligible_instructors(&request, &session).await;

    Ok(request)
}

pub async fn accept(
    stores: &Stores,
    request_id: &str,
    instructor: &User,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<CoverRequest> {
    let mut request = load_request(stores, request_id).await?;
    let session = load_session(stores, &request.session_id).await?;

    request.accept(
        &instructor.id,
        instructor.qualifications(),
        &session.required_qualifications,
        now,
    )?;
    persist(stores, &request, CoverStatus::Open, CoreError::NotOpen).await?;

    audit::emit(
        stores,
        ctx,
        "cover_request_accepted",
        "CoverRequest",
        &request.id,
        json!({ "session_name": session.class_name }),
        now,
    )
    .await;

    tracing::info!(cover_request = %request.id, instructor = %instructor.id, "Cover request accepted");
    Ok(request)
}

pub async fn confirm(
    stores: &Stores,
    request_id: &str,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<CoverRequest> {
    let mut request = load_request(stores, request_id).await?;
    request.confirm(ctx.performed_by.as_deref().unwrap_or_default(), now)?;
    persist(stores, &request, CoverStatus::Accepted, CoreError::NotAccepted).await?;

    audit::emit(
        stores,
        ctx,
        "cover_request_confirmed",
        "CoverRequest",
        &request.id,
        json!({ "accepted_by": request.accepted_by }),
        now,
    )
    .await;

    Ok(request)
}

/// Rejects the accepting instructor and re-opens the request to others.
pub async fn decline(
    stores: &Stores,
    request_id: &str,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<CoverRequest> {
    let mut request = load_request(stores, request_id).await?;
    let declined = request.decline()?;
    persist(stores, &request, CoverStatus::Accepted, CoreError::NotAccepted).await?;

    audit::emit(
        stores,
        ctx,
        "cover_acceptance_declined",
        "CoverRequest",
        &request.id,
        json!({ "declined_instructor": declined }),
        now,
    )
    .await;

    match stores.sessions.find(&request.session_id).await {
        Ok(Some(session)) => {
            stores.notifier.notify_eligible_instructors(&request, &session).await
        }
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(error = %err, cover_request = %request.id, "Skipping re-open notification")
        }
    }

    Ok(request)
}

pub async fn cancel(
    stores: &Stores,
    request_id: &str,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<CoverRequest> {
    let mut request = load_request(stores, request_id).await?;
    let from = request.status;
    request.cancel()?;
    match persist(stores, &request, from, CoreError::AlreadyClosed).await {
        Ok(()) => {}
        // Lost a race with accept or decline; retry once against the fresh row.
        Err(CoreError::AlreadyClosed) => {
            request = load_request(stores, request_id).await?;
            let from = request.status;
            request.cancel()?;
            persist(stores, &request, from, CoreError::AlreadyClosed).await?;
        }
        Err(err) => return Err(err),
    }

    audit::emit(
        stores,
        ctx,
        "cover_request_cancelled",
        "CoverRequest",
        &request.id,
        json!({}),
        now,
    )
    .await;

    Ok(request)
}

/// Moves confirmed covers whose session has started to `completed`.
/// Returns how many were completed.
pub async fn complete_past_confirmed(stores: &Stores, now: NaiveDateTime) -> CoreResult<u64> {
    let due = stores
        .covers
        .list(&CoverFilter {
            starts_before: Some(now),
            ..CoverFilter::with_status(CoverStatus::Confirmed)
        })
        .await?;

    let ctx = AuditContext::system();
    let mut completed = 0;
    for mut request in due {
        request.complete(now)?;
        match stores.covers.transition(&request, CoverStatus::Confirmed).await {
            Ok(()) => {}
            Err(StoreError::Conflict | StoreError::NotFound) => continue,
            Err(err) => return Err(err.into()),
        }
        audit::emit(
            stores,
            &ctx,
            "cover_request_completed",
            "CoverRequest",
            &request.id,
            json!({ "accepted_by": request.accepted_by }),
            now,
        )
        .await;
        completed += 1;
    }
    Ok(completed)
}

#[derive(Debug, Default, Serialize)]
pub struct CoverCounts {
    pub open:      u64,
    pub accepted:  u64,
    pub confirmed: u64,
    /// Requests still holding their slot.
    pub total:     u64,
}

#[derive(Debug, Serialize)]
pub struct CoverOverview {
    pub stats:              CoverCounts,
    pub open_requests:      Vec<CoverView>,
    pub accepted_requests:  Vec<CoverView>,
    pub confirmed_requests: Vec<CoverView>,
}

async fn list_views(stores: &Stores, filter: CoverFilter) -> CoreResult<Vec<CoverView>> {
    let requests = stores.covers.list(&filter).await?;
    super::attach_sessions(stores, requests).await
}

/// Admin view of every live cover request.
pub async fn overview(stores: &Stores) -> CoreResult<CoverOverview> {
    let open = stores.covers.count(&CoverFilter::with_status(CoverStatus::Open)).await?;
    let accepted = stores.covers.count(&CoverFilter::with_status(CoverStatus::Accepted)).await?;
    let confirmed = stores.covers.count(&CoverFilter::with_status(CoverStatus::Confirmed)).await?;

    Ok(CoverOverview {
        stats: CoverCounts {
            open,
            accepted,
            confirmed,
            total: open + accepted + confirmed,
        },
        open_requests: list_views(stores, CoverFilter::with_status(CoverStatus::Open)).await?,
        accepted_requests: list_views(stores, CoverFilter::with_status(CoverStatus::Accepted)).await?,
        confirmed_requests: list_views(
            stores,
            CoverFilter {
                limit: Some(RECENT_CONFIRMED_LIMIT),
                ..CoverFilter::with_status(CoverStatus::Confirmed)
            },
        )
        .await?,
    })
}
