//! # Engine Error Taxonomy
//!
//! The failure modes of a transition attempt and of the storage layer
//! beneath it. Every variant carries enough context for the caller to act:
//! guard failures name the unmet precondition, conflicts tell the caller
//! to re-read, and authorization failures name the rejected actor.
//!
//! Command failures never partially apply state: an attempt that returns
//! an error has written nothing.

use thiserror::Error;

use lendloop_state::{Command, HandoffDirection, RentalStatus};

/// Errors from the storage layer.
///
/// The store is the last line of defense: [`StoreError::IllegalTransition`]
/// fires for ANY write whose `(old, new)` pair is absent from the legal
/// transition table, no matter which caller attempted it.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record with the given identifier.
    #[error("rental {rental_id} not found")]
    NotFound {
        /// The record identifier.
        rental_id: String,
    },

    /// A record with the given identifier already exists.
    #[error("rental {rental_id} already exists")]
    AlreadyExists {
        /// The record identifier.
        rental_id: String,
    },

    /// The compare-and-swap precondition did not hold: the stored status
    /// is no longer what the caller observed.
    #[error("rental {rental_id} is {actual}, not {expected}: another actor transitioned it")]
    Conflict {
        /// The record identifier.
        rental_id: String,
        /// The status the caller expected.
        expected: RentalStatus,
        /// The status actually stored.
        actual: RentalStatus,
    },

    /// The attempted `(old, new)` pair is absent from the transition table.
    #[error("illegal rental status transition: {from} -> {to}")]
    IllegalTransition {
        /// The record identifier.
        rental_id: String,
        /// The stored status.
        from: RentalStatus,
        /// The attempted target status.
        to: RentalStatus,
    },

    /// The inspection for this direction is signed and immutable.
    #[error("rental {rental_id} already has a signed {direction} inspection")]
    InspectionSealed {
        /// The record identifier.
        rental_id: String,
        /// The handoff direction.
        direction: HandoffDirection,
    },

    /// A claim operation violated the at-most-one-open-claim invariant.
    #[error("claim violation on rental {rental_id}: {reason}")]
    ClaimViolation {
        /// The record identifier.
        rental_id: String,
        /// Which invariant was violated.
        reason: String,
    },

    /// A stored value could not be decoded into its domain type.
    #[error("corrupt stored value: {reason}")]
    Decode {
        /// What failed to decode.
        reason: String,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors from a transition attempt.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No record with the given identifier.
    #[error("rental {rental_id} not found")]
    NotFound {
        /// The record identifier.
        rental_id: String,
    },

    /// The actor may not issue this command. Never retried automatically.
    #[error("{actor} may not issue {command}: {reason}")]
    Unauthorized {
        /// The rejected command.
        command: Command,
        /// The rejected actor.
        actor: String,
        /// Why the actor was rejected.
        reason: String,
    },

    /// A precondition of the command is unmet. The caller must resolve
    /// the precondition (sign an inspection, wait for the window) and
    /// retry.
    #[error("{command} precondition unmet: {precondition}")]
    GuardFailed {
        /// The attempted command.
        command: Command,
        /// The unmet precondition.
        precondition: String,
    },

    /// The record transitioned under the caller's feet. Re-read and decide
    /// whether the command is still applicable.
    #[error("conflict on rental {rental_id}: {detail}")]
    Conflict {
        /// The record identifier.
        rental_id: String,
        /// What the store observed.
        detail: String,
    },

    /// The storage layer failed for a reason the caller cannot resolve.
    #[error(transparent)]
    Store(#[from] StoreError),
}
