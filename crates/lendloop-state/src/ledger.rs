//! # Settlement Ledger Entries
//!
//! Append-only records of fund movements tied to a rental: the hold taken
//! at payment, releases back to a party, and captures (penalties, upheld
//! claims). Entries are created by transition side effects in the same
//! transaction as the status swap, never mutated, only appended.

use serde::{Deserialize, Serialize};

use lendloop_core::{LedgerEntryId, Money, RentalId, Timestamp};

/// The kind of fund movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryKind {
    /// Funds held against the rental at payment capture.
    Hold,
    /// Held funds released to a party.
    Release,
    /// Held funds captured (penalty, upheld claim).
    Capture,
}

impl LedgerEntryKind {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hold => "HOLD",
            Self::Release => "RELEASE",
            Self::Capture => "CAPTURE",
        }
    }
}

impl std::fmt::Display for LedgerEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A settlement ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry identifier.
    pub id: LedgerEntryId,
    /// The rental this movement settles.
    pub rental: RentalId,
    /// The kind of movement.
    pub kind: LedgerEntryKind,
    /// The amount moved.
    pub amount: Money,
    /// What the movement settles (e.g., "payment hold",
    /// "late-cancellation penalty", "damage claim capture").
    pub memo: String,
    /// When the entry was recorded.
    pub recorded_at: Timestamp,
}

impl LedgerEntry {
    /// Record a new entry.
    pub fn new(
        rental: RentalId,
        kind: LedgerEntryKind,
        amount: Money,
        memo: impl Into<String>,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            rental,
            kind,
            amount,
            memo: memo.into(),
            recorded_at,
        }
    }
}
