//! # In-Memory Store
//!
//! A [`RentalStore`] backed by a single `tokio::sync::RwLock`. The whole
//! commit — enforcer check, compare-and-swap, milestones, ledger, claim —
//! runs under one write-lock acquisition, which gives it the same
//! atomicity the Postgres store gets from a transaction.
//!
//! Used by the test suites and by single-process deployments that do not
//! need durable storage.

use std::collections::HashMap;

use tokio::sync::RwLock;

use async_trait::async_trait;

use lendloop_core::{RentalId, Timestamp};
use lendloop_state::{
    DamageClaim, HandoffDirection, HandoffInspection, LedgerEntry, RentalRecord, RentalStatus,
};

use crate::error::StoreError;
use crate::store::{enforce_legal, ClaimOp, RentalStore, TransitionCommit};

#[derive(Debug)]
struct RentalRow {
    record: RentalRecord,
    inspections: Vec<HandoffInspection>,
    claims: Vec<DamageClaim>,
    ledger: Vec<LedgerEntry>,
}

/// An in-memory rental store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<RentalId, RentalRow>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RentalStore for MemoryStore {
    async fn insert_record(&self, record: RentalRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists {
                rental_id: record.id.to_string(),
            });
        }
        rows.insert(
            record.id.clone(),
            RentalRow {
                record,
                inspections: Vec::new(),
                claims: Vec::new(),
                ledger: Vec::new(),
            },
        );
        Ok(())
    }

    async fn fetch_record(&self, id: &RentalId) -> Result<RentalRecord, StoreError> {
        let rows = self.rows.read().await;
        rows.get(id)
            .map(|row| row.record.clone())
            .ok_or_else(|| StoreError::NotFound {
                rental_id: id.to_string(),
            })
    }

    async fn due_for_activation(&self, now: Timestamp) -> Result<Vec<RentalId>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|row| {
                row.record.status == RentalStatus::AwaitingStartDate
                    && row.record.start_date <= now
            })
            .map(|row| row.record.id.clone())
            .collect())
    }

    async fn commit_transition(
        &self,
        id: &RentalId,
        expected: RentalStatus,
        commit: TransitionCommit,
    ) -> Result<RentalRecord, StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(id).ok_or_else(|| StoreError::NotFound {
            rental_id: id.to_string(),
        })?;

        let current = row.record.status;
        if current != expected {
            return Err(StoreError::Conflict {
                rental_id: id.to_string(),
                expected,
                actual: current,
            });
        }

        // The enforcer: last line of defense, independent of the caller.
        enforce_legal(id, current, commit.to)?;

        if commit.to == current {
            // Identity write: legal, applies nothing.
            return Ok(row.record.clone());
        }

        // Validate the claim operation before touching anything, so a
        // rejected commit leaves no partial state behind.
        match &commit.claim {
            Some(ClaimOp::File(_)) => {
                if row.claims.iter().any(|c| c.is_open()) {
                    return Err(StoreError::ClaimViolation {
                        rental_id: id.to_string(),
                        reason: "a claim is already open".to_string(),
                    });
                }
            }
            Some(ClaimOp::Resolve(_)) => {
                if !row.claims.iter().any(|c| c.is_open()) {
                    return Err(StoreError::ClaimViolation {
                        rental_id: id.to_string(),
                        reason: "no open claim to resolve".to_string(),
                    });
                }
            }
            None => {}
        }

        let now = Timestamp::now().strictly_after(row.record.status_updated_at);
        row.record.status = commit.to;
        row.record.status_updated_at = now;
        match commit.to {
            RentalStatus::Active => {
                row.record.activated_at.get_or_insert(now);
            }
            RentalStatus::Completed => {
                row.record.completed_at.get_or_insert(now);
            }
            RentalStatus::Disputed => {
                row.record.disputed_at.get_or_insert(now);
            }
            _ => {}
        }

        match commit.claim {
            Some(ClaimOp::File(claim)) => row.claims.push(claim),
            Some(ClaimOp::Resolve(outcome)) => {
                // Presence checked above; resolve() cannot fail on an
                // open claim.
                if let Some(open) = row.claims.iter_mut().find(|c| c.is_open()) {
                    open.resolve(outcome, now)
                        .map_err(|e| StoreError::ClaimViolation {
                            rental_id: id.to_string(),
                            reason: e.to_string(),
                        })?;
                }
            }
            None => {}
        }

        row.ledger.extend(commit.ledger);
        Ok(row.record.clone())
    }

    async fn record_inspection(&self, inspection: HandoffInspection) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&inspection.rental)
            .ok_or_else(|| StoreError::NotFound {
                rental_id: inspection.rental.to_string(),
            })?;

        if let Some(existing) = row
            .inspections
            .iter_mut()
            .find(|i| i.direction == inspection.direction)
        {
            if existing.signed {
                return Err(StoreError::InspectionSealed {
                    rental_id: inspection.rental.to_string(),
                    direction: inspection.direction,
                });
            }
            *existing = inspection;
        } else {
            row.inspections.push(inspection);
        }
        Ok(())
    }

    async fn inspection(
        &self,
        id: &RentalId,
        direction: HandoffDirection,
    ) -> Result<Option<HandoffInspection>, StoreError> {
        let rows = self.rows.read().await;
        let row = rows.get(id).ok_or_else(|| StoreError::NotFound {
            rental_id: id.to_string(),
        })?;
        Ok(row
            .inspections
            .iter()
            .find(|i| i.direction == direction)
            .cloned())
    }

    async fn open_claim(&self, id: &RentalId) -> Result<Option<DamageClaim>, StoreError> {
        let rows = self.rows.read().await;
        let row = rows.get(id).ok_or_else(|| StoreError::NotFound {
            rental_id: id.to_string(),
        })?;
        Ok(row.claims.iter().find(|c| c.is_open()).cloned())
    }

    async fn claims(&self, id: &RentalId) -> Result<Vec<DamageClaim>, StoreError> {
        let rows = self.rows.read().await;
        let row = rows.get(id).ok_or_else(|| StoreError::NotFound {
            rental_id: id.to_string(),
        })?;
        Ok(row.claims.clone())
    }

    async fn ledger(&self, id: &RentalId) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = self.rows.read().await;
        let row = rows.get(id).ok_or_else(|| StoreError::NotFound {
            rental_id: id.to_string(),
        })?;
        Ok(row.ledger.clone())
    }
}
