//! # Application State
//!
//! Shared state for the Axum application: the transition engine, which
//! carries the store, change feed, and notice pipeline.

use std::sync::Arc;

use lendloop_engine::Engine;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// The transition engine.
    pub engine: Arc<Engine>,
}

impl AppState {
    /// Create application state around an engine.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}
