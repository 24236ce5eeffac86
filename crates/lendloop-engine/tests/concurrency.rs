//! Concurrency and idempotence tests.
//!
//! Exercises the compare-and-swap discipline: racing attempts on one
//! record produce exactly one winner, re-running the activator duplicates
//! nothing, and no interleaving leaves an illegal status behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use lendloop_core::{ItemId, Money, PartyId, Timestamp};
use lendloop_engine::{
    Activator, Engine, EngineError, MemoryStore, NoticePipeline, RecordingDispatcher, RentalStore,
    RetryPolicy, StoreError, TransitionCommit,
};
use lendloop_state::status::is_legal;
use lendloop_state::{
    Actor, Command, CommandPayload, DamageReport, HandoffDirection, HandoffInspection,
    RentalRecord, RentalStatus,
};

fn harness() -> (Arc<Engine>, Arc<MemoryStore>, Arc<RecordingDispatcher>) {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let pipeline = Arc::new(NoticePipeline::new(
        dispatcher.clone(),
        RetryPolicy::default(),
    ));
    let engine = Arc::new(Engine::new(store.clone(), pipeline));
    (engine, store, dispatcher)
}

async fn seed_with_status(store: &MemoryStore, status: RentalStatus) -> RentalRecord {
    let now = Timestamp::now();
    let mut record = RentalRecord::new(
        PartyId::new(),
        PartyId::new(),
        ItemId::new(),
        Money::from_minor_units(25000, "USD"),
        now.offset(ChronoDuration::hours(-1)),
        now.offset(ChronoDuration::days(3)),
    );
    record.status = status;
    store.insert_record(record.clone()).await.unwrap();
    record
}

// ---------------------------------------------------------------------------
// The CAS race
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_level_race_has_exactly_one_winner() {
    let (_, store, _) = harness();
    let record = seed_with_status(&store, RentalStatus::PendingReview).await;

    // Two writers read PENDING_REVIEW, then both try to swap.
    let first = store
        .commit_transition(
            &record.id,
            RentalStatus::PendingReview,
            TransitionCommit::status_only(RentalStatus::Completed),
        )
        .await;
    let second = store
        .commit_transition(
            &record.id,
            RentalStatus::PendingReview,
            TransitionCommit::status_only(RentalStatus::Disputed),
        )
        .await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(StoreError::Conflict { .. })));
    assert_eq!(
        store.fetch_record(&record.id).await.unwrap().status,
        RentalStatus::Completed
    );
}

#[tokio::test]
async fn racing_attempts_produce_one_winner_and_a_legal_status() {
    // Run the race repeatedly; whichever interleaving happens, exactly
    // one attempt wins and the stored status is a legal successor.
    for _ in 0..16 {
        let (engine, store, _) = harness();
        let record = seed_with_status(&store, RentalStatus::PendingReview).await;

        let confirm = {
            let engine = engine.clone();
            let id = record.id.clone();
            let actor = Actor::Provider(record.provider.clone());
            tokio::spawn(async move {
                engine
                    .attempt(&id, Command::ConfirmCompletion, &actor, CommandPayload::empty())
                    .await
            })
        };
        let dispute = {
            let engine = engine.clone();
            let id = record.id.clone();
            let actor = Actor::Provider(record.provider.clone());
            let payload = CommandPayload {
                damage: Some(DamageReport {
                    description: "bent frame".to_string(),
                    amount: Money::from_minor_units(9000, "USD"),
                    evidence: vec![],
                }),
                ..CommandPayload::empty()
            };
            tokio::spawn(async move {
                engine
                    .attempt(&id, Command::ReportDamage, &actor, payload)
                    .await
            })
        };

        let confirm = confirm.await.unwrap();
        let dispute = dispute.await.unwrap();

        let winners = [confirm.is_ok(), dispute.is_ok()]
            .iter()
            .filter(|ok| **ok)
            .count();
        assert_eq!(winners, 1, "exactly one racer must win");

        for loser in [&confirm, &dispute] {
            if let Err(err) = loser {
                assert!(
                    matches!(
                        err,
                        EngineError::Conflict { .. } | EngineError::GuardFailed { .. }
                    ),
                    "loser saw {err}"
                );
            }
        }

        let stored = store.fetch_record(&record.id).await.unwrap();
        assert!(is_legal(RentalStatus::PendingReview, stored.status));
        assert!(matches!(
            stored.status,
            RentalStatus::Completed | RentalStatus::Disputed
        ));
    }
}

#[tokio::test]
async fn transitions_on_different_records_are_independent() {
    let (engine, store, _) = harness();
    let a = seed_with_status(&store, RentalStatus::AwaitingStartDate).await;
    let b = seed_with_status(&store, RentalStatus::AwaitingStartDate).await;

    let (ra, rb) = tokio::join!(
        engine.attempt(&a.id, Command::StartRental, &Actor::System, CommandPayload::empty()),
        engine.attempt(&b.id, Command::StartRental, &Actor::System, CommandPayload::empty()),
    );
    assert!(ra.is_ok());
    assert!(rb.is_ok());
}

// ---------------------------------------------------------------------------
// Activator idempotence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_start_rental_adds_no_ledger_entry_or_notice() {
    let (engine, store, dispatcher) = harness();
    let record = seed_with_status(&store, RentalStatus::AwaitingStartDate).await;

    engine
        .attempt(
            &record.id,
            Command::StartRental,
            &Actor::System,
            CommandPayload::empty(),
        )
        .await
        .unwrap();
    let notices_after_first = dispatcher.delivered().len();
    let ledger_after_first = store.ledger(&record.id).await.unwrap().len();

    // A late duplicate (e.g. an overlapping scheduler run).
    let err = engine
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

    assert_eq!(dispatcher.delivered().len(), notices_after_first);
    assert_eq!(
        store.ledger(&record.id).await.unwrap().len(),
        ledger_after_first
    );
    assert_eq!(
        store.fetch_record(&record.id).await.unwrap().status,
        RentalStatus::Active
    );
}

#[tokio::test]
async fn overlapping_sweeps_promote_each_record_once() {
    let (engine, store, dispatcher) = harness();
    for _ in 0..4 {
        seed_with_status(&store, RentalStatus::AwaitingStartDate).await;
    }

    let activator_a = Activator::new(engine.clone(), Duration::from_secs(3600));
    let activator_b = Activator::new(engine.clone(), Duration::from_secs(3600));
    let now = Timestamp::now();
    let (a, b) = tokio::join!(activator_a.run_once(now), activator_b.run_once(now));
    let (a, b) = (a.unwrap(), b.unwrap());

    // Each record is promoted exactly once; any overlap lands in
    // already_applied rather than failed.
    assert_eq!(a.failed + b.failed, 0);
    assert_eq!(a.promoted + b.promoted, 4);
    // Two notices per committed transition, none duplicated.
    assert_eq!(dispatcher.delivered().len(), 8);
}

// ---------------------------------------------------------------------------
// No partial state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn losing_commit_applies_no_side_effects() {
    let (_, store, _) = harness();
    let record = seed_with_status(&store, RentalStatus::AwaitingStartDate).await;

    store
        .commit_transition(
            &record.id,
            RentalStatus::AwaitingStartDate,
            TransitionCommit::status_only(RentalStatus::Active),
        )
        .await
        .unwrap();

    // A stale cancel loses the CAS; its refund entries must not appear.
    let mut commit = TransitionCommit::status_only(RentalStatus::Cancelled);
    commit.ledger.push(lendloop_state::LedgerEntry::new(
        record.id.clone(),
        lendloop_state::LedgerEntryKind::Release,
        record.price.clone(),
        "cancellation refund",
        Timestamp::now(),
    ));
    let result = store
        .commit_transition(&record.id, RentalStatus::AwaitingStartDate, commit)
        .await;
    assert!(matches!(result, Err(StoreError::Conflict { .. })));
    assert!(store.ledger(&record.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn inspection_writes_do_not_advance_status() {
    // The inspection collaborator writes its rows independently; only
    // the processor moves the record.
    let (_, store, _) = harness();
    let record = seed_with_status(&store, RentalStatus::AwaitingPickupInspection).await;

    let mut inspection = HandoffInspection::draft(
        record.id.clone(),
        HandoffDirection::Pickup,
        record.requester.clone(),
    );
    inspection.signed = true;
    store.record_inspection(inspection).await.unwrap();

    let stored = store.fetch_record(&record.id).await.unwrap();
    assert_eq!(stored.status, RentalStatus::AwaitingPickupInspection);
    assert_eq!(stored.status_updated_at, record.status_updated_at);
}
