//! End-to-end tests for the rental lifecycle transition engine.
//!
//! Walks complete rentals through the engine against the in-memory store:
//! the happy path from payment to activation, the dispute path with claim
//! settlement, cancellation with a late scheduler run, guard and
//! authorization rejections, and observer synchronization.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use lendloop_core::{ItemId, Money, PartyId, Timestamp};
use lendloop_engine::{
    Activator, Engine, EngineError, MemoryStore, NoticePipeline, RecordingDispatcher, RentalStore,
    RetryPolicy,
};
use lendloop_state::{
    Actor, ClaimResolution, Command, CommandPayload, DamageReport, HandoffDirection,
    HandoffInspection, LedgerEntryKind, RentalRecord, RentalStatus,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    engine: Arc<Engine>,
    store: Arc<MemoryStore>,
    dispatcher: Arc<RecordingDispatcher>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let pipeline = Arc::new(NoticePipeline::new(
        dispatcher.clone(),
        RetryPolicy::default(),
    ));
    let engine = Arc::new(Engine::new(store.clone(), pipeline));
    Harness {
        engine,
        store,
        dispatcher,
    }
}

async fn seed_rental(store: &MemoryStore, start_offset_hours: i64) -> RentalRecord {
    let now = Timestamp::now();
    let record = RentalRecord::new(
        PartyId::new(),
        PartyId::new(),
        ItemId::new(),
        Money::from_minor_units(25000, "USD"),
        now.offset(ChronoDuration::hours(start_offset_hours)),
        now.offset(ChronoDuration::days(3)),
    );
    store.insert_record(record.clone()).await.unwrap();
    record
}

fn requester(record: &RentalRecord) -> Actor {
    Actor::Requester(record.requester.clone())
}

fn provider(record: &RentalRecord) -> Actor {
    Actor::Provider(record.provider.clone())
}

fn payment_payload() -> CommandPayload {
    CommandPayload {
        payment_reference: Some("cap_7f3a".to_string()),
        ..CommandPayload::empty()
    }
}

fn damage_payload(amount_minor: i64) -> CommandPayload {
    CommandPayload {
        damage: Some(DamageReport {
            description: "Dented housing on return".to_string(),
            amount: Money::from_minor_units(amount_minor, "USD"),
            evidence: vec!["photo-104".to_string()],
        }),
        ..CommandPayload::empty()
    }
}

fn resolution_payload(outcome: ClaimResolution) -> CommandPayload {
    CommandPayload {
        resolution: Some(outcome),
        ..CommandPayload::empty()
    }
}

async fn sign_inspection(store: &MemoryStore, record: &RentalRecord, direction: HandoffDirection) {
    let mut inspection =
        HandoffInspection::draft(record.id.clone(), direction, record.requester.clone());
    inspection.signed = true;
    inspection.evidence = vec!["condition-photos".to_string()];
    store.record_inspection(inspection).await.unwrap();
}

/// Drive a fresh PENDING record to AWAITING_START_DATE.
async fn drive_to_awaiting_start(h: &Harness, record: &RentalRecord) {
    h.engine
        .attempt(
            &record.id,
            Command::CompletePayment,
            &requester(record),
            payment_payload(),
        )
        .await
        .unwrap();
    sign_inspection(&h.store, record, HandoffDirection::Pickup).await;
    h.engine
        .attempt(
            &record.id,
            Command::CompletePickupInspection,
            &requester(record),
            CommandPayload::empty(),
        )
        .await
        .unwrap();
}

/// Drive a fresh PENDING record all the way to PENDING_REVIEW.
async fn drive_to_pending_review(h: &Harness, record: &RentalRecord) {
    drive_to_awaiting_start(h, record).await;
    h.engine
        .attempt(
            &record.id,
            Command::StartRental,
            &Actor::System,
            CommandPayload::empty(),
        )
        .await
        .unwrap();
    h.engine
        .attempt(
            &record.id,
            Command::InitiateReturn,
            &requester(record),
            CommandPayload::empty(),
        )
        .await
        .unwrap();
    sign_inspection(&h.store, record, HandoffDirection::Return).await;
    h.engine
        .attempt(
            &record.id,
            Command::CompleteReturnInspection,
            &requester(record),
            CommandPayload::empty(),
        )
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Scenario A: payment through scheduled activation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payment_through_scheduled_activation() {
    let h = harness();
    // Start date already passed so the scheduler can promote immediately.
    let record = seed_rental(&h.store, -1).await;

    let outcome = h
        .engine
        .attempt(
            &record.id,
            Command::CompletePayment,
            &requester(&record),
            payment_payload(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.old_status, RentalStatus::Pending);
    assert_eq!(outcome.new_status, RentalStatus::Paid);

    // The automatic promotion has already run.
    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert_eq!(stored.status, RentalStatus::AwaitingPickupInspection);

    sign_inspection(&h.store, &record, HandoffDirection::Pickup).await;
    let outcome = h
        .engine
        .attempt(
            &record.id,
            Command::CompletePickupInspection,
            &requester(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.new_status, RentalStatus::AwaitingStartDate);

    // The scheduler promotes once the start date has passed.
    let activator = Activator::new(h.engine.clone(), Duration::from_secs(3600));
    let sweep = activator.run_once(Timestamp::now()).await.unwrap();
    assert_eq!(sweep.promoted, 1);

    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert_eq!(stored.status, RentalStatus::Active);
    assert!(stored.activated_at.is_some());

    // The payment hold is on the ledger.
    let ledger = h.store.ledger(&record.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].kind, LedgerEntryKind::Hold);
    assert_eq!(ledger[0].amount, record.price);
}

// ---------------------------------------------------------------------------
// Scenario B: damage claim through dispute resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn damage_claim_through_dispute_resolution() {
    let h = harness();
    let record = seed_rental(&h.store, -1).await;
    drive_to_pending_review(&h, &record).await;

    let outcome = h
        .engine
        .attempt(
            &record.id,
            Command::ReportDamage,
            &provider(&record),
            damage_payload(4500),
        )
        .await
        .unwrap();
    assert_eq!(outcome.new_status, RentalStatus::Disputed);

    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert!(stored.disputed_at.is_some());
    let claim = h.store.open_claim(&record.id).await.unwrap().unwrap();
    assert_eq!(claim.amount.amount, "4500");

    let resolver = Actor::Resolver(PartyId::new());
    let outcome = h
        .engine
        .attempt(
            &record.id,
            Command::ResolveDispute,
            &resolver,
            resolution_payload(ClaimResolution::Accepted),
        )
        .await
        .unwrap();
    assert_eq!(outcome.new_status, RentalStatus::Completed);

    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert!(stored.completed_at.is_some());
    assert!(h.store.open_claim(&record.id).await.unwrap().is_none());

    // Ledger: the hold, the claim deduction, and the remainder.
    let ledger = h.store.ledger(&record.id).await.unwrap();
    let kinds: Vec<_> = ledger.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LedgerEntryKind::Hold,
            LedgerEntryKind::Capture,
            LedgerEntryKind::Release
        ]
    );
    assert_eq!(ledger[1].amount.amount, "4500");
    assert_eq!(ledger[2].amount.amount, "20500");
}

#[tokio::test]
async fn rejected_claim_releases_full_hold() {
    let h = harness();
    let record = seed_rental(&h.store, -1).await;
    drive_to_pending_review(&h, &record).await;

    h.engine
        .attempt(
            &record.id,
            Command::ReportDamage,
            &provider(&record),
            damage_payload(4500),
        )
        .await
        .unwrap();
    h.engine
        .attempt(
            &record.id,
            Command::ResolveDispute,
            &Actor::Resolver(PartyId::new()),
            resolution_payload(ClaimResolution::Rejected),
        )
        .await
        .unwrap();

    let claims = h.store.claims(&record.id).await.unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].resolution, Some(ClaimResolution::Rejected));

    let ledger = h.store.ledger(&record.id).await.unwrap();
    let releases: Vec<_> = ledger
        .iter()
        .filter(|e| e.kind == LedgerEntryKind::Release)
        .collect();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].amount, record.price);
}

// ---------------------------------------------------------------------------
// Scenario C: cancellation beats a late scheduler run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancellation_beats_late_scheduler_run() {
    let h = harness();
    let record = seed_rental(&h.store, 24).await;
    drive_to_awaiting_start(&h, &record).await;

    let outcome = h
        .engine
        .attempt(
            &record.id,
            Command::Cancel,
            &requester(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.new_status, RentalStatus::Cancelled);

    // A late scheduler run must not resurrect the rental.
    let err = h
        .engine
        .attempt(
            &record.id,
            Command::StartRental,
            &Actor::System,
            CommandPayload::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::GuardFailed { .. } | EngineError::Conflict { .. }
    ));

    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert_eq!(stored.status, RentalStatus::Cancelled);

    // Late cancellation: penalty captured, remainder refunded.
    let ledger = h.store.ledger(&record.id).await.unwrap();
    let kinds: Vec<_> = ledger.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LedgerEntryKind::Hold,
            LedgerEntryKind::Capture,
            LedgerEntryKind::Release
        ]
    );
    assert_eq!(ledger[1].amount.amount, "2500");
    assert_eq!(ledger[1].memo, "late-cancellation penalty");
}

// ---------------------------------------------------------------------------
// Guards and authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pickup_inspection_guard_requires_signature() {
    let h = harness();
    let record = seed_rental(&h.store, 24).await;
    h.engine
        .attempt(
            &record.id,
            Command::CompletePayment,
            &requester(&record),
            payment_payload(),
        )
        .await
        .unwrap();

    // No inspection at all.
    let err = h
        .engine
        .attempt(
            &record.id,
            Command::CompletePickupInspection,
            &requester(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::GuardFailed { .. }));

    // An unsigned draft is not enough either.
    let draft = HandoffInspection::draft(
        record.id.clone(),
        HandoffDirection::Pickup,
        record.requester.clone(),
    );
    h.store.record_inspection(draft).await.unwrap();
    let err = h
        .engine
        .attempt(
            &record.id,
            Command::CompletePickupInspection,
            &requester(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::GuardFailed { .. }));

    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert_eq!(stored.status, RentalStatus::AwaitingPickupInspection);
}

#[tokio::test]
async fn confirm_completion_rejects_the_requester() {
    let h = harness();
    let record = seed_rental(&h.store, -1).await;
    drive_to_pending_review(&h, &record).await;

    let err = h
        .engine
        .attempt(
            &record.id,
            Command::ConfirmCompletion,
            &requester(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized { .. }));

    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert_eq!(stored.status, RentalStatus::PendingReview);
}

#[tokio::test]
async fn confirm_completion_blocked_by_open_claim() {
    let h = harness();
    let record = seed_rental(&h.store, -1).await;
    drive_to_pending_review(&h, &record).await;

    h.engine
        .attempt(
            &record.id,
            Command::ReportDamage,
            &provider(&record),
            damage_payload(1000),
        )
        .await
        .unwrap();

    // The record is DISPUTED now; completion is out of reach for the
    // provider until the resolver closes the claim.
    let err = h
        .engine
        .attempt(
            &record.id,
            Command::ConfirmCompletion,
            &provider(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::GuardFailed { .. }));
}

#[tokio::test]
async fn payment_requires_capture_reference() {
    let h = harness();
    let record = seed_rental(&h.store, 24).await;

    let err = h
        .engine
        .attempt(
            &record.id,
            Command::CompletePayment,
            &requester(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::GuardFailed { .. }));
    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert_eq!(stored.status, RentalStatus::Pending);
}

#[tokio::test]
async fn unknown_record_is_not_found() {
    let h = harness();
    let err = h
        .engine
        .attempt(
            &lendloop_core::RentalId::new(),
            Command::CompletePayment,
            &Actor::System,
            payment_payload(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn decline_is_provider_only() {
    let h = harness();
    let record = seed_rental(&h.store, 24).await;

    let err = h
        .engine
        .attempt(
            &record.id,
            Command::DeclineRequest,
            &requester(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized { .. }));

    let outcome = h
        .engine
        .attempt(
            &record.id,
            Command::DeclineRequest,
            &provider(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.new_status, RentalStatus::Declined);
}

#[tokio::test]
async fn pickup_cancel_window_closes_at_start_date() {
    let h = harness();
    // Start date already passed: the pickup-stage cancellation window is
    // closed.
    let record = seed_rental(&h.store, -1).await;
    h.engine
        .attempt(
            &record.id,
            Command::CompletePayment,
            &requester(&record),
            payment_payload(),
        )
        .await
        .unwrap();

    let err = h
        .engine
        .attempt(
            &record.id,
            Command::Cancel,
            &requester(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::GuardFailed { .. }));
    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert_eq!(stored.status, RentalStatus::AwaitingPickupInspection);
}

// ---------------------------------------------------------------------------
// Monotonic clock and milestones
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_updated_at_strictly_increases() {
    let h = harness();
    let record = seed_rental(&h.store, -1).await;

    let mut last = record.status_updated_at;
    drive_to_pending_review(&h, &record).await;
    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert!(stored.status_updated_at > last);
    last = stored.status_updated_at;

    h.engine
        .attempt(
            &record.id,
            Command::ConfirmCompletion,
            &provider(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap();
    let stored = h.store.fetch_record(&record.id).await.unwrap();
    assert!(stored.status_updated_at > last);
}

#[tokio::test]
async fn milestones_are_set_exactly_once() {
    let h = harness();
    let record = seed_rental(&h.store, -1).await;
    drive_to_pending_review(&h, &record).await;

    let after_active = h.store.fetch_record(&record.id).await.unwrap();
    let activated_at = after_active.activated_at.unwrap();

    h.engine
        .attempt(
            &record.id,
            Command::ConfirmCompletion,
            &provider(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap();

    let finished = h.store.fetch_record(&record.id).await.unwrap();
    // Later transitions never touch an already-set milestone.
    assert_eq!(finished.activated_at, Some(activated_at));
    assert!(finished.completed_at.is_some());
    assert!(finished.disputed_at.is_none());
}

// ---------------------------------------------------------------------------
// Observer synchronization and notices
// ---------------------------------------------------------------------------

#[tokio::test]
async fn observers_receive_each_committed_transition() {
    let h = harness();
    let record = seed_rental(&h.store, 24).await;
    let mut rx = h.engine.feed().subscribe(&record.id);

    h.engine
        .attempt(
            &record.id,
            Command::CompletePayment,
            &requester(&record),
            payment_payload(),
        )
        .await
        .unwrap();

    // Both the commanded transition and the automatic promotion publish.
    let first = rx.recv().await.unwrap();
    assert_eq!(first.old_status, RentalStatus::Pending);
    assert_eq!(first.new_status, RentalStatus::Paid);

    let second = rx.recv().await.unwrap();
    assert_eq!(second.old_status, RentalStatus::Paid);
    assert_eq!(second.new_status, RentalStatus::AwaitingPickupInspection);
    assert!(second.at >= first.at);
}

#[tokio::test]
async fn both_principals_are_notified_per_transition() {
    let h = harness();
    let record = seed_rental(&h.store, 24).await;

    h.engine
        .attempt(
            &record.id,
            Command::DeclineRequest,
            &provider(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap();

    let delivered = h.dispatcher.delivered();
    assert_eq!(delivered.len(), 2);
    let recipients: Vec<_> = delivered.iter().map(|n| n.recipient.clone()).collect();
    assert!(recipients.contains(&record.requester));
    assert!(recipients.contains(&record.provider));
}

#[tokio::test]
async fn failed_attempt_sends_nothing() {
    let h = harness();
    let record = seed_rental(&h.store, 24).await;

    let _ = h
        .engine
        .attempt(
            &record.id,
            Command::CompletePayment,
            &requester(&record),
            CommandPayload::empty(),
        )
        .await
        .unwrap_err();

    assert!(h.dispatcher.delivered().is_empty());
    assert!(h.store.ledger(&record.id).await.unwrap().is_empty());
}
