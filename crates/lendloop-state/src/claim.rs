//! # Damage Claims
//!
//! A claim the provider files against the hold during post-return review.
//! At most one open claim exists per rental at a time; the claim resolves
//! when the record leaves the disputed status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lendloop_core::{ClaimId, Money, PartyId, RentalId, Timestamp};

/// The outcome of a resolved claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimResolution {
    /// The claim was upheld; the claimed amount is captured from the hold.
    Accepted,
    /// The claim was rejected; the full hold is released.
    Rejected,
}

impl ClaimResolution {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for ClaimResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from claim operations.
#[derive(Error, Debug)]
pub enum ClaimError {
    /// The claim has already been resolved; resolution is final.
    #[error("claim {claim_id} is already resolved as {resolution}")]
    AlreadyResolved {
        /// The claim identifier.
        claim_id: String,
        /// The recorded resolution.
        resolution: String,
    },
}

/// A damage claim row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageClaim {
    /// Unique claim identifier.
    pub id: ClaimId,
    /// The rental this claim is filed against.
    pub rental: RentalId,
    /// The party that filed the claim.
    pub filed_by: PartyId,
    /// Free-text description of the damage.
    pub description: String,
    /// The amount claimed against the hold.
    pub amount: Money,
    /// References to supporting evidence.
    pub evidence: Vec<String>,
    /// The resolution outcome, once decided.
    pub resolution: Option<ClaimResolution>,
    /// When the claim was filed.
    pub filed_at: Timestamp,
    /// When the claim was resolved.
    pub resolved_at: Option<Timestamp>,
}

impl DamageClaim {
    /// File a new open claim.
    pub fn file(
        rental: RentalId,
        filed_by: PartyId,
        description: String,
        amount: Money,
        evidence: Vec<String>,
        filed_at: Timestamp,
    ) -> Self {
        Self {
            id: ClaimId::new(),
            rental,
            filed_by,
            description,
            amount,
            evidence,
            resolution: None,
            filed_at,
            resolved_at: None,
        }
    }

    /// Whether the claim is still open.
    pub fn is_open(&self) -> bool {
        self.resolution.is_none()
    }

    /// Record the resolution outcome. Resolution is final.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::AlreadyResolved`] if an outcome was already
    /// recorded.
    pub fn resolve(&mut self, outcome: ClaimResolution, at: Timestamp) -> Result<(), ClaimError> {
        if let Some(existing) = self.resolution {
            return Err(ClaimError::AlreadyResolved {
                claim_id: self.id.to_string(),
                resolution: existing.to_string(),
            });
        }
        self.resolution = Some(outcome);
        self.resolved_at = Some(at);
        Ok(())
    }
}
