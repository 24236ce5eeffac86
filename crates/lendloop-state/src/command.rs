//! # The Closed Command Set
//!
//! Every mutation of a rental record's status is expressed as one of the
//! named commands defined here. Each command carries a fixed allowed-actor
//! set and resolves to exactly one edge of the legal transition table
//! given the record's live status.
//!
//! The command set is closed: collaborators (request handlers, the
//! scheduled activator) can only name commands from this enum, and there
//! is no other mutation path to `status`.

use serde::{Deserialize, Serialize};

use lendloop_core::{Money, PartyId};

use crate::claim::ClaimResolution;
use crate::status::RentalStatus;

// ─── Actors ──────────────────────────────────────────────────────────

/// The role a calling principal plays for a given rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    /// The party taking the item.
    Requester,
    /// The party that owns the item.
    Provider,
    /// The dispute resolver.
    Resolver,
    /// The automated scheduler and other engine-internal callers.
    System,
}

impl ActorRole {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requester => "REQUESTER",
            Self::Provider => "PROVIDER",
            Self::Resolver => "RESOLVER",
            Self::System => "SYSTEM",
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity invoking a command.
///
/// Human principals carry their `PartyId`; authorization checks both the
/// role and that the id matches the record's principal for that role. The
/// system actor has no party identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "party", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    /// A requester principal.
    Requester(PartyId),
    /// A provider principal.
    Provider(PartyId),
    /// A dispute resolver principal.
    Resolver(PartyId),
    /// The system scheduler identity.
    System,
}

impl Actor {
    /// The role this actor claims.
    pub fn role(&self) -> ActorRole {
        match self {
            Self::Requester(_) => ActorRole::Requester,
            Self::Provider(_) => ActorRole::Provider,
            Self::Resolver(_) => ActorRole::Resolver,
            Self::System => ActorRole::System,
        }
    }

    /// The party identity, if this is a human principal.
    pub fn party_id(&self) -> Option<&PartyId> {
        match self {
            Self::Requester(id) | Self::Provider(id) | Self::Resolver(id) => Some(id),
            Self::System => None,
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.party_id() {
            Some(id) => write!(f, "{}({id})", self.role()),
            None => write!(f, "{}", self.role()),
        }
    }
}

// ─── Commands ────────────────────────────────────────────────────────

/// The closed set of lifecycle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Record the upstream payment capture (`pending → paid`).
    CompletePayment,
    /// Provider declines the request before payment (`pending → declined`).
    DeclineRequest,
    /// Requester cancels; the edge is chosen by the live status.
    Cancel,
    /// Automatic promotion after payment
    /// (`paid → awaiting_pickup_inspection`). System-only; issued by the
    /// processor itself once `CompletePayment` commits.
    AdvanceToPickupInspection,
    /// Requester signed the outbound inspection
    /// (`awaiting_pickup_inspection → awaiting_start_date`).
    CompletePickupInspection,
    /// The rental window opened (`awaiting_start_date → active`).
    StartRental,
    /// Requester hands the item back (`active → awaiting_return_inspection`).
    InitiateReturn,
    /// Requester signed the inbound inspection
    /// (`awaiting_return_inspection → pending_review`).
    CompleteReturnInspection,
    /// Provider confirms a clean return (`pending_review → completed`).
    ConfirmCompletion,
    /// Provider files a damage claim (`pending_review → disputed`).
    ReportDamage,
    /// Resolver closes the open claim (`disputed → completed`).
    ResolveDispute,
}

impl Command {
    /// The canonical wire name of this command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompletePayment => "complete_payment",
            Self::DeclineRequest => "decline_request",
            Self::Cancel => "cancel",
            Self::AdvanceToPickupInspection => "advance_to_pickup_inspection",
            Self::CompletePickupInspection => "complete_pickup_inspection",
            Self::StartRental => "start_rental",
            Self::InitiateReturn => "initiate_return",
            Self::CompleteReturnInspection => "complete_return_inspection",
            Self::ConfirmCompletion => "confirm_completion",
            Self::ReportDamage => "report_damage",
            Self::ResolveDispute => "resolve_dispute",
        }
    }

    /// The roles permitted to issue this command.
    pub fn allowed_roles(&self) -> &'static [ActorRole] {
        match self {
            Self::CompletePayment => &[ActorRole::Requester, ActorRole::System],
            Self::DeclineRequest => &[ActorRole::Provider],
            Self::Cancel => &[ActorRole::Requester],
            Self::AdvanceToPickupInspection => &[ActorRole::System],
            Self::CompletePickupInspection => &[ActorRole::Requester],
            Self::StartRental => &[ActorRole::System],
            Self::InitiateReturn => &[ActorRole::Requester],
            Self::CompleteReturnInspection => &[ActorRole::Requester],
            Self::ConfirmCompletion => &[ActorRole::Provider],
            Self::ReportDamage => &[ActorRole::Provider],
            Self::ResolveDispute => &[ActorRole::Resolver],
        }
    }

    /// The statuses this command may be issued from.
    pub fn origin_states(&self) -> &'static [RentalStatus] {
        match self {
            Self::CompletePayment | Self::DeclineRequest => &[RentalStatus::Pending],
            Self::Cancel => &[
                RentalStatus::Pending,
                RentalStatus::Paid,
                RentalStatus::AwaitingPickupInspection,
                RentalStatus::AwaitingStartDate,
            ],
            Self::AdvanceToPickupInspection => &[RentalStatus::Paid],
            Self::CompletePickupInspection => &[RentalStatus::AwaitingPickupInspection],
            Self::StartRental => &[RentalStatus::AwaitingStartDate],
            Self::InitiateReturn => &[RentalStatus::Active],
            Self::CompleteReturnInspection => &[RentalStatus::AwaitingReturnInspection],
            Self::ConfirmCompletion | Self::ReportDamage => &[RentalStatus::PendingReview],
            Self::ResolveDispute => &[RentalStatus::Disputed],
        }
    }

    /// The status this command transitions to.
    pub fn target(&self) -> RentalStatus {
        match self {
            Self::CompletePayment => RentalStatus::Paid,
            Self::DeclineRequest => RentalStatus::Declined,
            Self::Cancel => RentalStatus::Cancelled,
            Self::AdvanceToPickupInspection => RentalStatus::AwaitingPickupInspection,
            Self::CompletePickupInspection => RentalStatus::AwaitingStartDate,
            Self::StartRental => RentalStatus::Active,
            Self::InitiateReturn => RentalStatus::AwaitingReturnInspection,
            Self::CompleteReturnInspection => RentalStatus::PendingReview,
            Self::ConfirmCompletion | Self::ResolveDispute => RentalStatus::Completed,
            Self::ReportDamage => RentalStatus::Disputed,
        }
    }

    /// Resolve the table edge this command drives from `current`.
    ///
    /// Returns `None` when no edge leaves `current` for this command — the
    /// record has moved on (or never was where the caller thought), and
    /// the attempt must fail as an unmet precondition.
    pub fn edge(&self, current: RentalStatus) -> Option<(RentalStatus, RentalStatus)> {
        self.origin_states()
            .contains(&current)
            .then(|| (current, self.target()))
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Payloads ────────────────────────────────────────────────────────

/// A damage claim submitted with [`Command::ReportDamage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageReport {
    /// Free-text description of the damage.
    pub description: String,
    /// The amount claimed against the hold.
    pub amount: Money,
    /// References to supporting evidence (photo keys, document ids).
    pub evidence: Vec<String>,
}

/// Command-specific data accompanying an attempt.
///
/// Commands ignore fields they do not consume; guards reject attempts
/// whose required field is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    /// Upstream payment capture reference (`complete_payment`).
    pub payment_reference: Option<String>,
    /// The claim being filed (`report_damage`).
    pub damage: Option<DamageReport>,
    /// The resolution outcome (`resolve_dispute`).
    pub resolution: Option<ClaimResolution>,
    /// Free-text note recorded with the transition.
    pub note: Option<String>,
}

impl CommandPayload {
    /// An empty payload for commands that carry no data.
    pub fn empty() -> Self {
        Self::default()
    }
}
