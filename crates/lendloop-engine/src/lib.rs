//! # lendloop-engine — The Rental Lifecycle Transition Engine
//!
//! The one place where correctness under concurrency, partial failure,
//! and multi-actor authorization all matter at once. Everything around it
//! (browse, messaging, dashboards) only reads the record or calls
//! [`Engine::attempt`].
//!
//! ## Components
//!
//! - **`processor`** — the guarded command processor: authenticate the
//!   actor, evaluate the guard against live data, commit through the
//!   store's compare-and-swap, then run side effects.
//! - **`store`** — the persistence contract plus the store-side invariant
//!   enforcer that re-validates every status write against the legal
//!   transition table, whoever the caller is.
//! - **`memory`** / **`postgres`** — the two store implementations. The
//!   Postgres store additionally installs a trigger generated from the
//!   same Rust table.
//! - **`activator`** — the periodic job promoting time-gated records as
//!   the system actor, idempotent via the same compare-and-swap.
//! - **`feed`** — per-record change feed; observers invalidate and
//!   re-fetch, never apply deltas.
//! - **`notice`** — best-effort outbound notices with bounded retry and
//!   dead-lettering, decoupled from command success.
//!
//! ## Concurrency Model
//!
//! Any number of actors call [`Engine::attempt`] concurrently with no
//! shared in-process state. Transitions on one record are totally ordered
//! by the store's compare-and-swap; transitions on different records are
//! independent. A command either fully applies or fully fails — readers
//! never see a partial transition.

pub mod activator;
pub mod error;
pub mod feed;
pub mod memory;
pub mod notice;
pub mod postgres;
pub mod processor;
pub mod store;

pub use activator::{ActivationSweep, Activator};
pub use error::{EngineError, StoreError};
pub use feed::{TransitionEvent, TransitionFeed};
pub use memory::MemoryStore;
pub use notice::{
    DeliveryError, DispatchResult, Notice, NoticeDispatcher, NoticePipeline, RecordingDispatcher,
    RetryPolicy,
};
pub use postgres::PgStore;
pub use processor::{Engine, TransitionOutcome};
pub use store::{enforce_legal, ClaimOp, RentalStore, TransitionCommit};
