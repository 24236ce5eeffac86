//! # Serve and Activate Handlers
//!
//! `serve` runs the HTTP surface with the scheduled activator alongside;
//! `activate` runs a single sweep and exits (for external schedulers).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use lendloop_api::AppState;
use lendloop_core::Timestamp;
use lendloop_engine::{
    Activator, Engine, NoticePipeline, PgStore, RentalStore, RetryPolicy,
};

use crate::config::Config;
use crate::notices::LogDispatcher;

/// Connect, migrate, and assemble the engine.
async fn build_engine(config: &Config) -> Result<Arc<Engine>> {
    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;
    let store: Arc<dyn RentalStore> = Arc::new(store);
    let pipeline = Arc::new(NoticePipeline::new(
        Arc::new(LogDispatcher),
        RetryPolicy::default(),
    ));
    Ok(Arc::new(Engine::new(store, pipeline)))
}

/// Run the HTTP surface and the activator loop until shutdown.
pub async fn serve(config: Config) -> Result<()> {
    let engine = build_engine(&config).await?;

    let activator = Activator::new(
        engine.clone(),
        Duration::from_secs(config.activation_interval_secs),
    );
    tokio::spawn(activator.run());

    let app = lendloop_api::router(AppState::new(engine));
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(bind = %config.bind, "serving rental lifecycle engine");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Run one activation sweep and report it.
pub async fn activate(config: Config) -> Result<()> {
    let engine = build_engine(&config).await?;
    let activator = Activator::new(
        engine,
        Duration::from_secs(config.activation_interval_secs),
    );
    let sweep = activator.run_once(Timestamp::now()).await?;
    tracing::info!(
        promoted = sweep.promoted,
        already_applied = sweep.already_applied,
        failed = sweep.failed,
        "activation sweep complete"
    );
    Ok(())
}
