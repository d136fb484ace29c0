//! Staff scheduling and cover-request backend for a leisure centre.
//!
//! Admins publish a weekly timetable, instructors raise and take cover for
//! sessions, and admins confirm the swaps. Services in [`services`] hold the
//! operations; [`routes`] exposes them over HTTP under `/api/v1`.

use axum::Router;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod maintenance;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use state::AppState;

/// The full application router with its layers, ready to serve.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::all_routes(state.clone()))
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
