//! `/admin` routes: instructor approval, timetables, cover and document review.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::{
    errors::AppResult,
    middleware::auth_guard::AuthUser,
    models::{CoverRequest, Document, Session, TimetableTemplate, User},
    services::{
        self,
        cover::{self, CoverOverview, NewCoverRequest},
        dashboard::{self, Dashboard},
        documents::{self, DocumentReview},
        instructors::{self, InstructorDirectory, QualificationsUpdate},
        timetable::{self, NewSession, NewTemplate, TemplateDetail},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/dashboard",                          get(get_dashboard))
        .route("/admin/instructors",                        get(list_instructors))
        .route("/admin/instructors/{id}",                   delete(delete_instructor))
        .route("/admin/instructors/{id}/approve",           post(approve_instructor))
        .route("/admin/instructors/{id}/reject",            post(reject_instructor))
        .route("/admin/instructors/{id}/suspend",           post(suspend_instructor))
        .route("/admin/instructors/{id}/qualifications",    put(update_qualifications))
        .route("/admin/timetables",                         get(list_timetables).post(create_timetable))
        .route("/admin/timetables/{id}",                    get(get_timetable))
        .route("/admin/timetables/{id}/sessions",           post(add_session))
        .route("/admin/timetables/{id}/activate",           post(activate_timetable))
        .route("/admin/cover",                              get(cover_overview).post(create_cover))
        .route("/admin/cover/{id}/confirm",                 post(confirm_cover))
        .route("/admin/cover/{id}/decline",                 post(decline_cover))
        .route("/admin/cover/{id}/cancel",                  post(cancel_cover))
        .route("/admin/documents",                          get(pending_documents))
        .route("/admin/documents/{id}/review",              post(review_document))
}

// ── Dashboard ────────────────────────────────────────────────

async fn get_dashboard(State(state): State<AppState>) -> AppResult<Json<Dashboard>> {
    Ok(Json(dashboard::admin_dashboard(&state.stores).await?))
}

// ── Instructors ──────────────────────────────────────────────

async fn list_instructors(State(state): State<AppState>) -> AppResult<Json<InstructorDirectory>> {
    Ok(Json(instructors::list_instructors(&state.stores).await?))
}

async fn approve_instructor(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    let user = instructors::approve(&state.stores, &id, &admin.audit_context(), services::now()).await?;
    Ok(Json(user))
}

async fn reject_instructor(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    let user = instructors::reject(&state.stores, &id, &admin.audit_context(), services::now()).await?;
    Ok(Json(user))
}

async fn suspend_instructor(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    let user = instructors::suspend(&state.stores, &id, &admin.audit_context(), services::now()).await?;
    Ok(Json(user))
}

async fn update_qualifications(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<QualificationsUpdate>,
) -> AppResult<Json<User>> {
    let user = instructors::update_qualifications(
        &state.stores,
        &id,
        body,
        &admin.audit_context(),
        services::now(),
    )
    .await?;
    Ok(Json(user))
}

async fn delete_instructor(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    instructors::delete(&state.stores, &id, &admin.audit_context(), services::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Timetables ───────────────────────────────────────────────

async fn list_timetables(State(state): State<AppState>) -> AppResult<Json<Vec<TimetableTemplate>>> {
    Ok(Json(timetable::list_templates(&state.stores).await?))
}

async fn create_timetable(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(body): Json<NewTemplate>,
) -> AppResult<(StatusCode, Json<TimetableTemplate>)> {
    let template =
        timetable::create_template(&state.stores, body, &admin.audit_context(), services::now()).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn get_timetable(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<TemplateDetail>> {
    Ok(Json(timetable::template_detail(&state.stores, &id).await?))
}

async fn add_session(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<NewSession>,
) -> AppResult<(StatusCode, Json<Session>)> {
    let session =
        timetable::add_session(&state.stores, &id, body, &admin.audit_context(), services::now()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn activate_timetable(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<TimetableTemplate>> {
    let template =
        timetable::activate_template(&state.stores, &id, &admin.audit_context(), services::now()).await?;
    Ok(Json(template))
}

// ── Cover ────────────────────────────────────────────────────

async fn cover_overview(State(state): State<AppState>) -> AppResult<Json<CoverOverview>> {
    Ok(Json(cover::overview(&state.stores).await?))
}

async fn create_cover(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(body): Json<NewCoverRequest>,
) -> AppResult<(StatusCode, Json<CoverRequest>)> {
    let request = cover::create(&state.stores, body, &admin.audit_context(), services::now()).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn confirm_cover(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<CoverRequest>> {
    Ok(Json(cover::confirm(&state.stores, &id, &admin.audit_context(), services::now()).await?))
}

async fn decline_cover(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<CoverRequest>> {
    Ok(Json(cover::decline(&state.stores, &id, &admin.audit_context(), services::now()).await?))
}

async fn cancel_cover(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<CoverRequest>> {
    Ok(Json(cover::cancel(&state.stores, &id, &admin.audit_context(), services::now()).await?))
}

// ── Documents ────────────────────────────────────────────────

async fn pending_documents(State(state): State<AppState>) -> AppResult<Json<Vec<Document>>> {
    Ok(Json(documents::list_pending(&state.stores).await?))
}

async fn review_document(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<DocumentReview>,
) -> AppResult<Json<Document>> {
    let document =
        documents::review(&state.stores, &id, body, &admin.audit_context(), services::now()).await?;
    Ok(Json(document))
}
