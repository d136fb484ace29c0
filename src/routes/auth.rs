use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_cookies::{
    cookie::{time::Duration as CookieDuration, SameSite},
    Cookie, Cookies,
};

use crate::{
    auth::SESSION_COOKIE,
    errors::{AppError, AppResult},
    middleware::auth_guard::request_context,
    models::User,
    services::{self, instructors::{self, Registration}},
    state::AppState,
};

// ── Request types ─────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginRequest {
    email:    String,
    password: String,
}

// ── Router ────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login",    post(login))
        .route("/auth/logout",   post(logout))
        .route("/auth/me",       get(me))
}

// ── Handlers ──────────────────────────────────────────────────

/// POST /auth/register: create a pending instructor account.
async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Registration>,
) -> AppResult<(StatusCode, Json<User>)> {
    let ctx = request_context(&headers);
    let user = instructors::register(&state.stores, body, &ctx, services::now()).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login: verify credentials and set the session cookie.
async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<User>> {
    let ctx = request_context(&headers);
    let outcome = instructors::login(
        &state.stores,
        &body.email,
        &body.password,
        state.config.session_days,
        &ctx,
        services::now(),
    )
    .await?;

    set_session_cookie(&cookies, &outcome.token, state.config.session_days);
    Ok(Json(outcome.user))
}

/// POST /auth/logout: delete the current session.
async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> AppResult<impl IntoResponse> {
    if let Some(token) = cookies.get(SESSION_COOKIE).map(|c| c.value().to_owned()) {
        instructors::logout(&state.stores, &token).await?;
    }
    clear_session_cookie(&cookies);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me: return the currently logged-in user.
async fn me(
    State(state): State<AppState>,
    cookies: Cookies,
) -> AppResult<Json<User>> {
    let token = cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or(AppError::Unauthorized)?;

    let user = instructors::user_for_token(&state.stores, &token, services::now())
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(user))
}

// ── Internal helpers ──────────────────────────────────────────

fn set_session_cookie(cookies: &Cookies, token: &str, days: i64) {
    let cookie = Cookie::build((SESSION_COOKIE, token.to_owned()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(CookieDuration::days(days))
        .build();
    cookies.add(cookie);
}

fn clear_session_cookie(cookies: &Cookies) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .path("/")
        .max_age(CookieDuration::ZERO)
        .build();
    cookies.add(cookie);
}
