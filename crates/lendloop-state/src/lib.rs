//! # lendloop-state — The Rental Lifecycle State Model
//!
//! Defines WHAT a legal rental lifecycle looks like; the `lendloop-engine`
//! crate decides WHO may advance it and persists the result.
//!
//! ## Modules
//!
//! - **`status`**: the `RentalStatus` enumeration and the single static
//!   legal-transition table. Every layer that validates a transition —
//!   processor, in-memory store, generated database trigger — derives its
//!   answer from this one table, so they cannot silently diverge.
//!
//! - **`command`**: the closed set of named commands, each with a fixed
//!   allowed-actor set and a resolution to exactly one table edge.
//!
//! - **`record`**: the `RentalRecord` aggregate root with its rental
//!   window, principals, and set-once milestone timestamps.
//!
//! - **`inspection`**: signed handoff inspections (pickup / return),
//!   immutable once signed.
//!
//! - **`claim`**: damage claims filed during post-return review, at most
//!   one open per record.
//!
//! - **`ledger`**: append-only settlement ledger entries (hold, release,
//!   capture).
//!
//! ## Design
//!
//! States are a runtime enum with a validated transition table rather than
//! typestate types: the status is loaded from storage, so it is not known
//! at compile time, and every mutation flows through a compare-and-swap in
//! the store. The table is the ground truth for "is this transition
//! legal"; business preconditions (signatures, dates, claims) layer on top
//! of it in the command guards.

pub mod claim;
pub mod command;
pub mod inspection;
pub mod ledger;
pub mod record;
pub mod status;

pub use claim::{ClaimError, ClaimResolution, DamageClaim};
pub use command::{Actor, ActorRole, Command, CommandPayload, DamageReport};
pub use inspection::{HandoffDirection, HandoffInspection};
pub use ledger::{LedgerEntry, LedgerEntryKind};
pub use record::RentalRecord;
pub use status::{is_legal, successors, RentalStatus, LEGAL_TRANSITIONS};
