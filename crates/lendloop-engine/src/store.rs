//! # The Storage Contract and the Persistent Invariant Enforcer
//!
//! Defines [`RentalStore`], the only interface through which rental state
//! is persisted, and [`enforce_legal`], the store-side re-validation of
//! the transition table that every implementation runs inside
//! [`RentalStore::commit_transition`].
//!
//! ## Compare-and-Swap Discipline
//!
//! `commit_transition` is the single mutation path for `status`. It is a
//! conditional write: the swap only applies if the stored status still
//! equals the status the caller observed. Losing the race returns
//! [`StoreError::Conflict`] and applies nothing — no ledger entry, no
//! claim mutation, no milestone.
//!
//! ## The Enforcer
//!
//! The processor validates commands against business preconditions, but
//! the store does not trust it: every write's `(old, new)` pair is
//! re-checked against the same `LEGAL_TRANSITIONS` table, so a bug or
//! bypass upstream (migrations, admin tooling, future code paths) cannot
//! corrupt the field. The processor's checks are a superset; the table is
//! the single ground truth for "is this transition legal".

use async_trait::async_trait;

use lendloop_core::{RentalId, Timestamp};
use lendloop_state::status::is_legal;
use lendloop_state::{
    ClaimResolution, DamageClaim, HandoffDirection, HandoffInspection, LedgerEntry, RentalRecord,
    RentalStatus,
};

use crate::error::StoreError;

/// The store-side invariant enforcer.
///
/// Rejects any `(from, to)` pair absent from the legal transition table.
/// The identity pair is legal (a no-op write).
pub fn enforce_legal(
    rental_id: &RentalId,
    from: RentalStatus,
    to: RentalStatus,
) -> Result<(), StoreError> {
    if is_legal(from, to) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition {
            rental_id: rental_id.to_string(),
            from,
            to,
        })
    }
}

/// The dependent-row mutation carried by a claim-bearing transition.
#[derive(Debug, Clone)]
pub enum ClaimOp {
    /// File a new open claim (`report_damage`). Fails if one is open.
    File(DamageClaim),
    /// Resolve the open claim (`resolve_dispute`). Fails if none is open.
    Resolve(ClaimResolution),
}

/// Everything a successful transition writes, atomically with the swap.
///
/// Ledger entries and the claim operation commit in the same transaction
/// as the status compare-and-swap: either the whole commit applies or
/// none of it does.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    /// The target status.
    pub to: RentalStatus,
    /// Settlement ledger entries to append.
    pub ledger: Vec<LedgerEntry>,
    /// Claim row mutation, if the command carries one.
    pub claim: Option<ClaimOp>,
}

impl TransitionCommit {
    /// A commit that only swaps the status.
    pub fn status_only(to: RentalStatus) -> Self {
        Self {
            to,
            ledger: Vec::new(),
            claim: None,
        }
    }
}

/// The persistence contract of the engine.
///
/// Implementations must make `commit_transition` atomic: the enforcer
/// check, the compare-and-swap, the set-once milestone writes, and the
/// dependent-row mutations all apply together or not at all.
#[async_trait]
pub trait RentalStore: Send + Sync {
    /// Insert a newly created record (upstream request flow).
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if the id is taken.
    async fn insert_record(&self, record: RentalRecord) -> Result<(), StoreError>;

    /// Fetch the authoritative record.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no such record exists.
    async fn fetch_record(&self, id: &RentalId) -> Result<RentalRecord, StoreError>;

    /// Records in `AWAITING_START_DATE` whose `start_date <= now`.
    async fn due_for_activation(&self, now: Timestamp) -> Result<Vec<RentalId>, StoreError>;

    /// Atomically apply a transition, gated on the previously observed
    /// status.
    ///
    /// Semantics, in order:
    ///
    /// 1. `expected != stored` → [`StoreError::Conflict`], nothing applies.
    /// 2. `(stored, commit.to)` absent from the table →
    ///    [`StoreError::IllegalTransition`] (the enforcer), nothing applies.
    /// 3. Identity pair → no-op: the record is returned unchanged and
    ///    `status_updated_at` does not advance.
    /// 4. Otherwise the status swaps, `status_updated_at` strictly
    ///    increases, the milestone for the target status is set if unset
    ///    (and only then), ledger entries append, and the claim operation
    ///    applies — all in one transaction.
    async fn commit_transition(
        &self,
        id: &RentalId,
        expected: RentalStatus,
        commit: TransitionCommit,
    ) -> Result<RentalRecord, StoreError>;

    /// Write an inspection row (the inspection collaborator's path).
    ///
    /// # Errors
    ///
    /// [`StoreError::InspectionSealed`] if a signed inspection already
    /// exists for this direction.
    async fn record_inspection(&self, inspection: HandoffInspection) -> Result<(), StoreError>;

    /// The inspection for one direction, if any.
    async fn inspection(
        &self,
        id: &RentalId,
        direction: HandoffDirection,
    ) -> Result<Option<HandoffInspection>, StoreError>;

    /// The open claim, if any.
    async fn open_claim(&self, id: &RentalId) -> Result<Option<DamageClaim>, StoreError>;

    /// All claims ever filed against the record.
    async fn claims(&self, id: &RentalId) -> Result<Vec<DamageClaim>, StoreError>;

    /// The settlement ledger, in append order.
    async fn ledger(&self, id: &RentalId) -> Result<Vec<LedgerEntry>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendloop_state::LEGAL_TRANSITIONS;

    #[test]
    fn test_enforcer_accepts_table_edges() {
        let id = RentalId::new();
        for (from, to) in LEGAL_TRANSITIONS {
            assert!(enforce_legal(&id, *from, *to).is_ok());
        }
    }

    #[test]
    fn test_enforcer_accepts_identity() {
        let id = RentalId::new();
        assert!(enforce_legal(&id, RentalStatus::Active, RentalStatus::Active).is_ok());
    }

    #[test]
    fn test_enforcer_rejects_absent_pairs() {
        let id = RentalId::new();
        let err = enforce_legal(&id, RentalStatus::Pending, RentalStatus::Active).unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }
}
