//! Shared application state, injected into every handler via `axum::extract::State`.

use crate::{config::Config, store::Stores};

/// Application-wide state passed via axum `State<AppState>`.
///
/// `Stores` is a bundle of `Arc`s, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub config: Config,
}

impl AppState {
    pub fn new(stores: Stores, config: Config) -> Self {
        Self { stores, config }
    }
}
