//! Role-based authorization guards. Both run after `require_auth`.

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::Response,
};

use crate::{errors::AppError, middleware::auth_guard::AuthUser, services::instructors};

/// Middleware: require the `admin` role.
pub async fn require_admin(
    Extension(user): Extension<AuthUser>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !user.user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(next.run(req).await)
}

/// Middleware: require an instructor an admin has approved.
pub async fn require_approved_instructor(
    Extension(user): Extension<AuthUser>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if user.user.is_admin() {
        return Err(AppError::Forbidden);
    }
    instructors::ensure_approved(&user.user)?;
    Ok(next.run(req).await)
}
