//! # lendloop-api — HTTP Surface for the Transition Engine
//!
//! A thin Axum layer over [`lendloop_engine::Engine`]. The engine is
//! consumed, not a UI itself; these routes are the boundary contract with
//! the surrounding collaborators:
//!
//! - `POST /v1/rentals` — create a record in `PENDING` (the upstream
//!   request flow's entry point).
//! - `GET  /v1/rentals/{id}` — the authoritative record.
//! - `GET  /v1/rentals/{id}/ledger` — settlement ledger entries.
//! - `POST /v1/rentals/{id}/attempt` — the single command surface; no
//!   other mutation path to `status` exists.
//! - `POST /v1/rentals/{id}/inspections` — the inspection collaborator's
//!   independent write path.
//!
//! ## Crate Policy
//!
//! - No business logic in route handlers — everything delegates to the
//!   engine and the store.
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod error;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use routes::router;
pub use state::AppState;
