//! HTTP surface of the course engine: an axum router over `AppServices`.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use axum::Router;
use tower_http::trace::TraceLayer;

use services::AppServices;

#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
}

impl AppState {
    #[must_use]
    pub fn new(services: AppServices) -> Self {
        Self { services }
    }
}

/// Build the full router with request tracing.
pub fn router(state: AppState) -> Router {
    routes::api()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
