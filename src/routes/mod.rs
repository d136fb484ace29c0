use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::{
    middleware::{
        auth_guard::require_auth,
        role_guard::{require_admin, require_approved_instructor},
    },
    state::AppState,
};

mod admin;
mod auth;
mod instructor;

/// The `/api/v1` router.
///
/// `/auth/*` is public. The admin and instructor areas each get their role
/// guard, and both sit behind [`require_auth`], which runs first and injects
/// the `AuthUser` the guards read.
pub fn all_routes(state: AppState) -> Router<AppState> {
    let admin = admin::router().route_layer(from_fn(require_admin));
    let instructor = instructor::router().route_layer(from_fn(require_approved_instructor));

    Router::new()
        .merge(auth::router())
        .merge(
            admin
                .merge(instructor)
                .route_layer(from_fn_with_state(state, require_auth)),
        )
}
