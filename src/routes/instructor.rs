//! `/instructor` routes, for approved instructors only.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    errors::AppResult,
    middleware::auth_guard::AuthUser,
    models::{CoverRequest, Document},
    services::{
        self,
        cover::{self, InstructorCoverRequest},
        documents::{self, DocumentUpload, InstructorDocuments},
        eligibility::{self, OpenOpportunities},
        stats::{self, EarningsReport},
        week::{self, WeekView},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/instructor/timetable",          get(my_timetable))
        .route("/instructor/cover/request",      post(request_cover))
        .route("/instructor/open-cover",         get(open_cover))
        .route("/instructor/cover/{id}/accept",  post(accept_cover))
        .route("/instructor/stats",              get(my_stats))
        .route("/instructor/documents",          get(my_documents).post(upload_document))
}

#[derive(Deserialize)]
struct WeekQuery {
    #[serde(default)]
    week_offset: i32,
}

async fn my_timetable(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Query(query): Query<WeekQuery>,
) -> AppResult<Json<WeekView>> {
    let view = week::week_view(&state.stores, &me.user, services::now(), query.week_offset).await?;
    Ok(Json(view))
}

async fn request_cover(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Json(body): Json<InstructorCoverRequest>,
) -> AppResult<(StatusCode, Json<CoverRequest>)> {
    let request = cover::request_by_instructor(
        &state.stores,
        &me.user,
        body,
        &me.audit_context(),
        services::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn open_cover(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
) -> AppResult<Json<OpenOpportunities>> {
    let open = eligibility::list_open_opportunities(&state.stores, &me.user, services::now()).await?;
    Ok(Json(open))
}

async fn accept_cover(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<CoverRequest>> {
    let request = cover::accept(&state.stores, &id, &me.user, &me.audit_context(), services::now()).await?;
    Ok(Json(request))
}

async fn my_stats(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
) -> AppResult<Json<EarningsReport>> {
    let report = stats::instructor_stats(
        &state.stores,
        &me.user,
        state.config.default_hourly_rate,
        services::now(),
    )
    .await?;
    Ok(Json(report))
}

async fn my_documents(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
) -> AppResult<Json<InstructorDocuments>> {
    let docs = documents::list_for_instructor(&state.stores, &me.user.id, services::now()).await?;
    Ok(Json(docs))
}

async fn upload_document(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Json(body): Json<DocumentUpload>,
) -> AppResult<(StatusCode, Json<Document>)> {
    let document =
        documents::upload(&state.stores, &me.user, body, &me.audit_context(), services::now()).await?;
    Ok((StatusCode::CREATED, Json(document)))
}
