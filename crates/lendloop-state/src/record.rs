//! # The Rental Record Aggregate
//!
//! The aggregate root of the engine. Created upstream in `PENDING`;
//! thereafter the status field is owned exclusively by the transition
//! processor and mutated only through the store's compare-and-swap path.
//!
//! Milestone timestamps (`activated_at`, `completed_at`, `disputed_at`)
//! are set exactly once, on first entry to the corresponding status, and
//! never cleared. The store writes them in the same transaction as the
//! status swap.

use serde::{Deserialize, Serialize};

use lendloop_core::{ItemId, Money, PartyId, RentalId, Timestamp};

use crate::command::{Actor, ActorRole};
use crate::status::RentalStatus;

/// A rental record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalRecord {
    /// Unique record identifier.
    pub id: RentalId,
    /// Current lifecycle status.
    pub status: RentalStatus,
    /// When `status` last changed. Strictly increases on every
    /// non-identity transition.
    pub status_updated_at: Timestamp,
    /// Start of the rental window.
    pub start_date: Timestamp,
    /// End of the rental window.
    pub end_date: Timestamp,
    /// Set on first entry to `ACTIVE`.
    pub activated_at: Option<Timestamp>,
    /// Set on first entry to `COMPLETED`.
    pub completed_at: Option<Timestamp>,
    /// Set on first entry to `DISPUTED`.
    pub disputed_at: Option<Timestamp>,
    /// The party taking the item.
    pub requester: PartyId,
    /// The party that owns the item.
    pub provider: PartyId,
    /// The item being rented.
    pub item: ItemId,
    /// The amount held at payment and settled at completion.
    pub price: Money,
    /// When the record was created.
    pub created_at: Timestamp,
}

impl RentalRecord {
    /// Create a new record in `PENDING`.
    ///
    /// Record creation belongs to the upstream request flow; the engine
    /// only ever advances records that already exist.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        requester: PartyId,
        provider: PartyId,
        item: ItemId,
        price: Money,
        start_date: Timestamp,
        end_date: Timestamp,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: RentalId::new(),
            status: RentalStatus::Pending,
            status_updated_at: now,
            start_date,
            end_date,
            activated_at: None,
            completed_at: None,
            disputed_at: None,
            requester,
            provider,
            item,
            price,
            created_at: now,
        }
    }

    /// Whether the rental window has opened at `now`.
    pub fn window_open(&self, now: Timestamp) -> bool {
        self.start_date <= now
    }

    /// Whether `actor` is the principal its claimed role names on this
    /// record. The system actor is always a principal of the engine.
    pub fn is_principal(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Requester(id) => *id == self.requester,
            Actor::Provider(id) => *id == self.provider,
            // Resolvers are appointed per deployment, not per record.
            Actor::Resolver(_) => true,
            Actor::System => true,
        }
    }

    /// The milestone field written on first entry to `status`, if any.
    pub fn milestone(&self, status: RentalStatus) -> Option<Option<Timestamp>> {
        match status {
            RentalStatus::Active => Some(self.activated_at),
            RentalStatus::Completed => Some(self.completed_at),
            RentalStatus::Disputed => Some(self.disputed_at),
            _ => None,
        }
    }

    /// The role `party` plays on this record, if any.
    pub fn role_of(&self, party: &PartyId) -> Option<ActorRole> {
        if *party == self.requester {
            Some(ActorRole::Requester)
        } else if *party == self.provider {
            Some(ActorRole::Provider)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_record() -> RentalRecord {
        let now = Timestamp::now();
        RentalRecord::new(
            PartyId::new(),
            PartyId::new(),
            ItemId::new(),
            Money::from_minor_units(25000, "USD"),
            now.offset(Duration::days(1)),
            now.offset(Duration::days(4)),
        )
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = make_record();
        assert_eq!(record.status, RentalStatus::Pending);
        assert!(record.activated_at.is_none());
        assert!(record.completed_at.is_none());
        assert!(record.disputed_at.is_none());
    }

    #[test]
    fn test_window_open() {
        let record = make_record();
        assert!(!record.window_open(Timestamp::now()));
        assert!(record.window_open(record.start_date));
        assert!(record.window_open(record.start_date.offset(Duration::hours(1))));
    }

    #[test]
    fn test_is_principal_matches_ids() {
        let record = make_record();
        assert!(record.is_principal(&Actor::Requester(record.requester.clone())));
        assert!(record.is_principal(&Actor::Provider(record.provider.clone())));
        assert!(!record.is_principal(&Actor::Requester(PartyId::new())));
        assert!(!record.is_principal(&Actor::Provider(record.requester.clone())));
        assert!(record.is_principal(&Actor::System));
    }

    #[test]
    fn test_role_of() {
        let record = make_record();
        assert_eq!(record.role_of(&record.requester), Some(ActorRole::Requester));
        assert_eq!(record.role_of(&record.provider), Some(ActorRole::Provider));
        assert_eq!(record.role_of(&PartyId::new()), None);
    }

    #[test]
    fn test_milestone_fields() {
        let record = make_record();
        assert_eq!(record.milestone(RentalStatus::Active), Some(None));
        assert_eq!(record.milestone(RentalStatus::Completed), Some(None));
        assert_eq!(record.milestone(RentalStatus::Disputed), Some(None));
        assert_eq!(record.milestone(RentalStatus::Paid), None);
    }

    #[test]
    fn test_serde_roundtrip() {
        let record = make_record();
        let json = serde_json::to_string(&record).unwrap();
        let parsed: RentalRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
