//! # Route Assembly
//!
//! Builds the application router with tracing middleware.

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod rentals;

/// Assemble the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(rentals::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
