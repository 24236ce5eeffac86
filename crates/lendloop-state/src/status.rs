//! # Rental Status and the Legal Transition Table
//!
//! The lifecycle of a rental record, from payment through return and
//! settlement.
//!
//! ## States
//!
//! ```text
//! PENDING ──▶ PAID ──▶ AWAITING_PICKUP_INSPECTION ──▶ AWAITING_START_DATE
//!    │  │       │                  │                          │
//!    │  │       └──────────────────┴──────────┬───────────────┤
//!    │  ▼                                     ▼               ▼
//!    │ DECLINED                           CANCELLED        ACTIVE
//!    │                                                        │
//!    └───────▶ CANCELLED                                      ▼
//!                                          AWAITING_RETURN_INSPECTION
//!                                                             │
//!                                                             ▼
//!                        COMPLETED ◀── DISPUTED ◀── PENDING_REVIEW
//!                            ▲                            │
//!                            └────────────────────────────┘
//! ```
//!
//! Terminal states: `COMPLETED`, `CANCELLED`, `DECLINED`.
//!
//! ## Single Source of Truth
//!
//! [`LEGAL_TRANSITIONS`] is the only enumeration of legal edges in the
//! workspace. The transition processor, the in-memory store, and the
//! generated database trigger all consult it (directly or via generated
//! SQL), so application-level and store-level enforcement cannot diverge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The lifecycle status of a rental record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalStatus {
    /// Request accepted, payment not yet captured.
    Pending,
    /// Payment captured and held.
    Paid,
    /// Waiting for the requester to sign the outbound inspection.
    AwaitingPickupInspection,
    /// Handoff documented; waiting for the rental window to open.
    AwaitingStartDate,
    /// Rental window open, item with the requester.
    Active,
    /// Return initiated; waiting for the inbound inspection.
    AwaitingReturnInspection,
    /// Item back with the provider, under post-return review.
    PendingReview,
    /// Settled without open claims (terminal).
    Completed,
    /// Cancelled before activation (terminal).
    Cancelled,
    /// Declined by the provider before payment (terminal).
    Declined,
    /// A damage claim is open.
    Disputed,
}

impl RentalStatus {
    /// The canonical string name (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::AwaitingPickupInspection => "AWAITING_PICKUP_INSPECTION",
            Self::AwaitingStartDate => "AWAITING_START_DATE",
            Self::Active => "ACTIVE",
            Self::AwaitingReturnInspection => "AWAITING_RETURN_INSPECTION",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Declined => "DECLINED",
            Self::Disputed => "DISPUTED",
        }
    }

    /// Whether this status is terminal (no outgoing edges).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Declined)
    }

    /// All statuses, in happy-path order followed by branches.
    pub const ALL: [RentalStatus; 11] = [
        Self::Pending,
        Self::Paid,
        Self::AwaitingPickupInspection,
        Self::AwaitingStartDate,
        Self::Active,
        Self::AwaitingReturnInspection,
        Self::PendingReview,
        Self::Completed,
        Self::Cancelled,
        Self::Declined,
        Self::Disputed,
    ];
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a status name.
#[derive(Error, Debug)]
#[error("unknown rental status: \"{0}\"")]
pub struct ParseStatusError(String);

impl std::str::FromStr for RentalStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RentalStatus::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

// ─── The Legal Transition Table ──────────────────────────────────────

/// Every legal `(from, to)` edge in the rental lifecycle.
///
/// The `pending → awaiting_pickup_inspection` shortcut seen in legacy data
/// is deliberately absent: `PAID` is a mandatory transitional state.
pub const LEGAL_TRANSITIONS: &[(RentalStatus, RentalStatus)] = &[
    // Happy path.
    (RentalStatus::Pending, RentalStatus::Paid),
    (RentalStatus::Paid, RentalStatus::AwaitingPickupInspection),
    (
        RentalStatus::AwaitingPickupInspection,
        RentalStatus::AwaitingStartDate,
    ),
    (RentalStatus::AwaitingStartDate, RentalStatus::Active),
    (RentalStatus::Active, RentalStatus::AwaitingReturnInspection),
    (
        RentalStatus::AwaitingReturnInspection,
        RentalStatus::PendingReview,
    ),
    (RentalStatus::PendingReview, RentalStatus::Completed),
    // Cancellation branches.
    (RentalStatus::Pending, RentalStatus::Cancelled),
    (RentalStatus::Paid, RentalStatus::Cancelled),
    (
        RentalStatus::AwaitingPickupInspection,
        RentalStatus::Cancelled,
    ),
    (RentalStatus::AwaitingStartDate, RentalStatus::Cancelled),
    // Decline branch.
    (RentalStatus::Pending, RentalStatus::Declined),
    // Dispute branch.
    (RentalStatus::PendingReview, RentalStatus::Disputed),
    (RentalStatus::Disputed, RentalStatus::Completed),
];

/// Whether `(from, to)` is a legal transition.
///
/// The identity pair is always legal (a no-op write); any other pair must
/// appear in [`LEGAL_TRANSITIONS`].
pub fn is_legal(from: RentalStatus, to: RentalStatus) -> bool {
    from == to || LEGAL_TRANSITIONS.contains(&(from, to))
}

/// The legal successor statuses of `from`, excluding the identity pair.
pub fn successors(from: RentalStatus) -> impl Iterator<Item = RentalStatus> {
    LEGAL_TRANSITIONS
        .iter()
        .filter(move |(f, _)| *f == from)
        .map(|(_, t)| *t)
}
