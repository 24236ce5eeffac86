//! # Handoff Inspections
//!
//! The signed record of an item's condition at an exchange: outbound when
//! the requester picks the item up, inbound when it comes back. A rental
//! has at most one inspection per direction, and an inspection becomes
//! immutable once signed — the store rejects re-writes of a signed row.
//!
//! The engine never writes inspections; the inspection collaborator does.
//! The engine only reads the signed flag and the signing party as guard
//! inputs for `complete_pickup_inspection` / `complete_return_inspection`.

use serde::{Deserialize, Serialize};

use lendloop_core::{PartyId, RentalId, Timestamp};

/// The direction of a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoffDirection {
    /// Outbound: provider hands the item to the requester.
    Pickup,
    /// Inbound: requester hands the item back.
    Return,
}

impl HandoffDirection {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "PICKUP",
            Self::Return => "RETURN",
        }
    }
}

impl std::fmt::Display for HandoffDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handoff inspection row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffInspection {
    /// The rental this inspection belongs to.
    pub rental: RentalId,
    /// Outbound or inbound.
    pub direction: HandoffDirection,
    /// The party whose signature seals the inspection.
    pub signing_party: PartyId,
    /// Whether the signature has been applied.
    pub signed: bool,
    /// References to condition evidence (photo keys, document ids).
    pub evidence: Vec<String>,
    /// Free-text condition notes.
    pub notes: Option<String>,
    /// When the inspection was recorded.
    pub recorded_at: Timestamp,
}

impl HandoffInspection {
    /// Begin an unsigned inspection for one direction of a handoff.
    pub fn draft(rental: RentalId, direction: HandoffDirection, signing_party: PartyId) -> Self {
        Self {
            rental,
            direction,
            signing_party,
            signed: false,
            evidence: Vec::new(),
            notes: None,
            recorded_at: Timestamp::now(),
        }
    }

    /// Whether this inspection is signed by `party`.
    pub fn is_signed_by(&self, party: &PartyId) -> bool {
        self.signed && self.signing_party == *party
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_is_unsigned() {
        let inspection =
            HandoffInspection::draft(RentalId::new(), HandoffDirection::Pickup, PartyId::new());
        assert!(!inspection.signed);
        assert!(inspection.evidence.is_empty());
    }

    #[test]
    fn test_is_signed_by_requires_signature_and_identity() {
        let party = PartyId::new();
        let mut inspection =
            HandoffInspection::draft(RentalId::new(), HandoffDirection::Return, party.clone());
        assert!(!inspection.is_signed_by(&party));

        inspection.signed = true;
        assert!(inspection.is_signed_by(&party));
        assert!(!inspection.is_signed_by(&PartyId::new()));
    }

    #[test]
    fn test_direction_names() {
        assert_eq!(HandoffDirection::Pickup.as_str(), "PICKUP");
        assert_eq!(HandoffDirection::Return.as_str(), "RETURN");
        assert_eq!(
            serde_json::to_string(&HandoffDirection::Pickup).unwrap(),
            "\"PICKUP\""
        );
    }
}
