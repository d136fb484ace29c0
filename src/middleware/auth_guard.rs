//! Authentication guard middleware.
//!
//! Reads the `session` cookie, resolves it through the user store, and
//! injects an `AuthUser` extension into the request for downstream handlers.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    auth::SESSION_COOKIE,
    errors::AppError,
    models::{AuditContext, User},
    services::{self, instructors},
    state::AppState,
};

/// Authenticated user extracted from a valid session. Injected into request
/// extensions by `require_auth`; downstream handlers use `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user:       User,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuthUser {
    pub fn audit_context(&self) -> AuditContext {
        AuditContext {
            performed_by: Some(self.user.id.clone()),
            ip_address:   self.ip_address.clone(),
            user_agent:   self.user_agent.clone(),
        }
    }
}

/// Caller details for requests that may not be authenticated yet.
pub fn request_context(headers: &HeaderMap) -> AuditContext {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    AuditContext {
        performed_by: None,
        ip_address,
        user_agent,
    }
}

/// Middleware: require any valid session cookie.
/// On success, inserts `AuthUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or(AppError::Unauthorized)?;

    let user = instructors::user_for_token(&state.stores, &token, services::now())
        .await?
        .ok_or(AppError::Unauthorized)?;

    let ctx = request_context(req.headers());
    req.extensions_mut().insert(AuthUser {
        user,
        ip_address: ctx.ip_address,
        user_agent: ctx.user_agent,
    });

    Ok(next.run(req).await)
}
