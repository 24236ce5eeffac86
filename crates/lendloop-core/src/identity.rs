//! # Domain Identity Newtypes
//!
//! Newtype wrappers for all domain identifiers in the Lendloop engine.
//! These prevent accidental identifier confusion — you cannot pass a
//! `PartyId` where a `RentalId` is expected, so a requester id can never
//! be used to look up a rental record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a rental record (the aggregate root).
    RentalId,
    "rental"
);

define_id!(
    /// Unique identifier for a party (requester, provider, or resolver).
    PartyId,
    "party"
);

define_id!(
    /// Unique identifier for the item being rented.
    ItemId,
    "item"
);

define_id!(
    /// Unique identifier for a damage claim.
    ClaimId,
    "claim"
);

define_id!(
    /// Unique identifier for a settlement ledger entry.
    LedgerEntryId,
    "entry"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct() {
        let a = RentalId::new();
        let b = RentalId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_uses_prefix() {
        let id = RentalId::new();
        assert!(id.to_string().starts_with("rental:"));
        let id = PartyId::new();
        assert!(id.to_string().starts_with("party:"));
        let id = LedgerEntryId::new();
        assert!(id.to_string().starts_with("entry:"));
    }

    #[test]
    fn test_from_uuid_roundtrip() {
        let raw = Uuid::new_v4();
        let id = ItemId::from_uuid(raw);
        assert_eq!(id.as_uuid(), &raw);
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = ClaimId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ClaimId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
