//! # The Transition Processor
//!
//! The single authorized entry point for advancing a rental record.
//! [`Engine::attempt`] authenticates the caller against the command's
//! allowed-actor set, evaluates the command's guard against live data,
//! applies the transition through the store's compare-and-swap, and only
//! then runs side effects: ledger entries and claim rows commit with the
//! swap, the change feed publishes, and notices go out best-effort.
//!
//! Correctness under concurrency rests entirely on the store's
//! compare-and-swap — the processor holds no lock and keeps no shared
//! in-process state. If two attempts race on the same record, exactly one
//! wins; the loser observes a conflict and must re-read.
//!
//! A failed attempt writes nothing. A successful attempt either delivered
//! its notices or left them queued for background retry — the transition
//! itself is never rolled back for a notice.

use std::sync::Arc;

use lendloop_core::{Money, RentalId, Timestamp};
use lendloop_state::{
    Actor, ActorRole, ClaimResolution, Command, CommandPayload, DamageClaim, HandoffDirection,
    LedgerEntry, LedgerEntryKind, RentalRecord, RentalStatus,
};

use crate::error::{EngineError, StoreError};
use crate::feed::{TransitionEvent, TransitionFeed};
use crate::notice::{DispatchResult, Notice, NoticePipeline};
use crate::store::{ClaimOp, RentalStore, TransitionCommit};

/// Late cancellations forfeit this share of the hold.
const LATE_CANCEL_PENALTY_PERCENT: i64 = 10;

/// The result of a successful attempt.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The record that transitioned.
    pub record_id: RentalId,
    /// The status the record was in when the command was evaluated.
    pub old_status: RentalStatus,
    /// The status the record is in now.
    pub new_status: RentalStatus,
    /// Notices whose first delivery failed and were queued for retry.
    /// Informational: the transition itself has committed.
    pub deferred_notices: usize,
}

/// The transition engine.
pub struct Engine {
    store: Arc<dyn RentalStore>,
    feed: Arc<TransitionFeed>,
    notices: Arc<NoticePipeline>,
}

impl Engine {
    /// Assemble an engine over a store and a notice pipeline.
    pub fn new(store: Arc<dyn RentalStore>, notices: Arc<NoticePipeline>) -> Self {
        Self {
            store,
            feed: Arc::new(TransitionFeed::new()),
            notices,
        }
    }

    /// The storage layer, for collaborators that read records, ledgers,
    /// and inspections directly. They must never write `status`; the
    /// store's enforcer backs that rule up.
    pub fn store(&self) -> &Arc<dyn RentalStore> {
        &self.store
    }

    /// The per-record change feed.
    pub fn feed(&self) -> &Arc<TransitionFeed> {
        &self.feed
    }

    /// The notice pipeline (dead-letter drain lives here).
    pub fn notices(&self) -> &Arc<NoticePipeline> {
        &self.notices
    }

    /// Attempt a lifecycle command against a record.
    ///
    /// On success the returned outcome names the committed edge. After a
    /// successful `complete_payment` the processor immediately issues the
    /// automatic `advance_to_pickup_inspection` as the system actor
    /// through the same guarded path; its failure is logged, not
    /// propagated, and leaves the record in `PAID` for a later retry.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] — no such record.
    /// - [`EngineError::Unauthorized`] — actor not allowed for the
    ///   command; never retried automatically.
    /// - [`EngineError::GuardFailed`] — a precondition is unmet; the
    ///   caller must resolve it and retry.
    /// - [`EngineError::Conflict`] — lost the compare-and-swap race;
    ///   re-read and decide whether the command still applies.
    pub async fn attempt(
        &self,
        id: &RentalId,
        command: Command,
        actor: &Actor,
        payload: CommandPayload,
    ) -> Result<TransitionOutcome, EngineError> {
        let outcome = self.execute(id, command, actor, &payload).await?;

        if command == Command::CompletePayment {
            match self
                .execute(
                    id,
                    Command::AdvanceToPickupInspection,
                    &Actor::System,
                    &CommandPayload::empty(),
                )
                .await
            {
                Ok(advanced) => {
                    tracing::info!(
                        rental = %id,
                        new_status = %advanced.new_status,
                        "automatic promotion after payment"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        rental = %id,
                        error = %err,
                        "automatic promotion after payment failed, record stays PAID"
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// Run one guarded transition.
    async fn execute(
        &self,
        id: &RentalId,
        command: Command,
        actor: &Actor,
        payload: &CommandPayload,
    ) -> Result<TransitionOutcome, EngineError> {
        let record = match self.store.fetch_record(id).await {
            Ok(record) => record,
            Err(StoreError::NotFound { rental_id }) => {
                return Err(EngineError::NotFound { rental_id });
            }
            Err(other) => return Err(EngineError::Store(other)),
        };

        authorize(&record, command, actor)?;

        let (from, to) = command.edge(record.status).ok_or_else(|| {
            metrics::counter!("lendloop_guard_failures_total").increment(1);
            EngineError::GuardFailed {
                command,
                precondition: format!(
                    "record is {}, {} may only be issued from {}",
                    record.status,
                    command,
                    origin_list(command)
                ),
            }
        })?;

        let now = Timestamp::now();
        let open_claim = self.store.open_claim(id).await?;
        self.check_guard(&record, command, payload, from, &open_claim, now)
            .await?;

        let (ledger, claim) =
            settlement_effects(&record, command, from, payload, open_claim.as_ref(), now)?;
        let commit = TransitionCommit { to, ledger, claim };

        let updated = match self.store.commit_transition(id, from, commit).await {
            Ok(updated) => updated,
            Err(StoreError::Conflict {
                rental_id,
                expected,
                actual,
            }) => {
                metrics::counter!("lendloop_transition_conflicts_total").increment(1);
                return Err(EngineError::Conflict {
                    rental_id,
                    detail: format!("expected {expected}, found {actual}"),
                });
            }
            Err(StoreError::NotFound { rental_id }) => {
                return Err(EngineError::NotFound { rental_id });
            }
            Err(other) => return Err(EngineError::Store(other)),
        };

        metrics::counter!("lendloop_transitions_total", "command" => command.as_str())
            .increment(1);
        tracing::info!(
            rental = %id,
            command = %command,
            actor = %actor,
            old_status = %from,
            new_status = %updated.status,
            "transition committed"
        );

        self.feed.publish(TransitionEvent {
            record_id: id.clone(),
            old_status: from,
            new_status: updated.status,
            at: updated.status_updated_at,
        });

        let mut deferred = 0;
        for recipient in [updated.requester.clone(), updated.provider.clone()] {
            let result = self
                .notices
                .send(Notice {
                    rental: id.clone(),
                    recipient,
                    old_status: from,
                    new_status: updated.status,
                    command,
                })
                .await;
            if result == DispatchResult::Deferred {
                deferred += 1;
            }
        }

        Ok(TransitionOutcome {
            record_id: id.clone(),
            old_status: from,
            new_status: updated.status,
            deferred_notices: deferred,
        })
    }

    /// Evaluate the command's guard against live data.
    async fn check_guard(
        &self,
        record: &RentalRecord,
        command: Command,
        payload: &CommandPayload,
        from: RentalStatus,
        open_claim: &Option<DamageClaim>,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        let unmet = |precondition: String| {
            metrics::counter!("lendloop_guard_failures_total").increment(1);
            Err(EngineError::GuardFailed {
                command,
                precondition,
            })
        };

        match command {
            Command::CompletePayment => {
                if payload.payment_reference.is_none() {
                    return unmet("no upstream payment capture reference".to_string());
                }
            }
            Command::CompletePickupInspection => {
                if !self.signed_inspection(record, HandoffDirection::Pickup).await? {
                    return unmet(format!(
                        "no signed {} inspection by the requester",
                        HandoffDirection::Pickup
                    ));
                }
            }
            Command::CompleteReturnInspection => {
                if !self.signed_inspection(record, HandoffDirection::Return).await? {
                    return unmet(format!(
                        "no signed {} inspection by the requester",
                        HandoffDirection::Return
                    ));
                }
            }
            Command::StartRental => {
                if !record.window_open(now) {
                    return unmet(format!(
                        "start date {} not reached at {}",
                        record.start_date, now
                    ));
                }
            }
            Command::Cancel => {
                if from == RentalStatus::AwaitingPickupInspection && record.window_open(now) {
                    return unmet("cancellation window closed: rental window has opened".to_string());
                }
            }
            Command::ConfirmCompletion => {
                if open_claim.is_some() {
                    return unmet("an open damage claim blocks completion".to_string());
                }
            }
            Command::ReportDamage => {
                let Some(damage) = &payload.damage else {
                    return unmet("no damage description and amount in payload".to_string());
                };
                if damage.amount.currency != record.price.currency {
                    return unmet(format!(
                        "claim currency {} differs from hold currency {}",
                        damage.amount.currency, record.price.currency
                    ));
                }
                if open_claim.is_some() {
                    return unmet("a damage claim is already open".to_string());
                }
            }
            Command::ResolveDispute => {
                if payload.resolution.is_none() {
                    return unmet("no resolution outcome in payload".to_string());
                }
                if open_claim.is_none() {
                    return unmet("no open claim to resolve".to_string());
                }
            }
            Command::DeclineRequest
            | Command::AdvanceToPickupInspection
            | Command::InitiateReturn => {}
        }
        Ok(())
    }

    /// Whether the record has an inspection for `direction`, signed by
    /// its requester.
    async fn signed_inspection(
        &self,
        record: &RentalRecord,
        direction: HandoffDirection,
    ) -> Result<bool, EngineError> {
        let inspection = self.store.inspection(&record.id, direction).await?;
        Ok(inspection
            .map(|i| i.is_signed_by(&record.requester))
            .unwrap_or(false))
    }
}

/// Check the actor against the command's allowed-actor set and the
/// record's principals.
fn authorize(record: &RentalRecord, command: Command, actor: &Actor) -> Result<(), EngineError> {
    let roles = command.allowed_roles();
    if !roles.contains(&actor.role()) {
        return Err(EngineError::Unauthorized {
            command,
            actor: actor.to_string(),
            reason: format!("{} requires {}", command, role_list(roles)),
        });
    }
    if !record.is_principal(actor) {
        return Err(EngineError::Unauthorized {
            command,
            actor: actor.to_string(),
            reason: format!("party is not the {} of this rental", actor.role()),
        });
    }
    Ok(())
}

/// The ledger entries and claim operation a command commits with its swap.
fn settlement_effects(
    record: &RentalRecord,
    command: Command,
    from: RentalStatus,
    payload: &CommandPayload,
    open_claim: Option<&DamageClaim>,
    now: Timestamp,
) -> Result<(Vec<LedgerEntry>, Option<ClaimOp>), EngineError> {
    let mut ledger = Vec::new();
    let mut claim = None;
    let currency = record.price.currency.clone();

    match command {
        Command::CompletePayment => {
            let reference = payload.payment_reference.as_deref().unwrap_or("unreferenced");
            ledger.push(LedgerEntry::new(
                record.id.clone(),
                LedgerEntryKind::Hold,
                record.price.clone(),
                format!("payment hold ({reference})"),
                now,
            ));
        }
        Command::Cancel => match from {
            RentalStatus::Pending => {}
            RentalStatus::Paid | RentalStatus::AwaitingPickupInspection => {
                ledger.push(LedgerEntry::new(
                    record.id.clone(),
                    LedgerEntryKind::Release,
                    record.price.clone(),
                    "cancellation refund",
                    now,
                ));
            }
            RentalStatus::AwaitingStartDate => {
                let held = price_units(record, command)?;
                let penalty = (held * LATE_CANCEL_PENALTY_PERCENT / 100).max(1).min(held);
                ledger.push(LedgerEntry::new(
                    record.id.clone(),
                    LedgerEntryKind::Capture,
                    Money::from_minor_units(penalty, currency.clone()),
                    "late-cancellation penalty",
                    now,
                ));
                if held - penalty > 0 {
                    ledger.push(LedgerEntry::new(
                        record.id.clone(),
                        LedgerEntryKind::Release,
                        Money::from_minor_units(held - penalty, currency.clone()),
                        "cancellation refund less penalty",
                        now,
                    ));
                }
            }
            _ => {}
        },
        Command::ConfirmCompletion => {
            ledger.push(LedgerEntry::new(
                record.id.clone(),
                LedgerEntryKind::Release,
                record.price.clone(),
                "provider payout",
                now,
            ));
        }
        Command::ReportDamage => {
            // Guard has already required the payload.
            if let Some(damage) = &payload.damage {
                claim = Some(ClaimOp::File(DamageClaim::file(
                    record.id.clone(),
                    record.provider.clone(),
                    damage.description.clone(),
                    damage.amount.clone(),
                    damage.evidence.clone(),
                    now,
                )));
            }
        }
        Command::ResolveDispute => {
            let outcome = payload.resolution.unwrap_or(ClaimResolution::Rejected);
            let held = price_units(record, command)?;
            match (outcome, open_claim) {
                (ClaimResolution::Accepted, Some(open)) => {
                    let claimed =
                        open.amount
                            .minor_units()
                            .map_err(|_| EngineError::GuardFailed {
                                command,
                                precondition: format!(
                                    "claim amount \"{}\" is not a whole number of minor units",
                                    open.amount.amount
                                ),
                            })?;
                    let captured = claimed.clamp(0, held);
                    ledger.push(LedgerEntry::new(
                        record.id.clone(),
                        LedgerEntryKind::Capture,
                        Money::from_minor_units(captured, currency.clone()),
                        "damage claim deduction",
                        now,
                    ));
                    if held - captured > 0 {
                        ledger.push(LedgerEntry::new(
                            record.id.clone(),
                            LedgerEntryKind::Release,
                            Money::from_minor_units(held - captured, currency.clone()),
                            "payout less claim deduction",
                            now,
                        ));
                    }
                }
                _ => {
                    ledger.push(LedgerEntry::new(
                        record.id.clone(),
                        LedgerEntryKind::Release,
                        record.price.clone(),
                        "provider payout, claim rejected",
                        now,
                    ));
                }
            }
            claim = Some(ClaimOp::Resolve(outcome));
        }
        Command::DeclineRequest
        | Command::AdvanceToPickupInspection
        | Command::CompletePickupInspection
        | Command::StartRental
        | Command::InitiateReturn
        | Command::CompleteReturnInspection => {}
    }

    Ok((ledger, claim))
}

fn price_units(record: &RentalRecord, command: Command) -> Result<i64, EngineError> {
    record
        .price
        .minor_units()
        .map_err(|_| EngineError::GuardFailed {
            command,
            precondition: format!(
                "hold amount \"{}\" is not a whole number of minor units",
                record.price.amount
            ),
        })
}

fn origin_list(command: Command) -> String {
    command
        .origin_states()
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn role_list(roles: &[ActorRole]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(" | ")
}
