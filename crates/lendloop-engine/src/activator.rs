//! # The Scheduled Activator
//!
//! Promotes time-gated records without human action: every sweep finds
//! records in `AWAITING_START_DATE` whose start date has passed and
//! issues `start_rental` as the system actor through the same guarded
//! `attempt` path every other caller uses.
//!
//! The sweep is idempotent by construction. A record someone else already
//! promoted fails the guard or the compare-and-swap against the *current*
//! status, and the activator counts that as success-already-applied — no
//! duplicate ledger entry, no duplicate notice, no error surfaced.

use std::sync::Arc;
use std::time::Duration;

use lendloop_core::Timestamp;
use lendloop_state::{Actor, Command, CommandPayload};

use crate::error::EngineError;
use crate::processor::Engine;
use crate::store::RentalStore;

/// The outcome of one activation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationSweep {
    /// Records promoted to `ACTIVE` by this sweep.
    pub promoted: usize,
    /// Records another actor promoted first (guard or CAS mismatch).
    pub already_applied: usize,
    /// Records that failed for any other reason.
    pub failed: usize,
}

/// The periodic promotion job.
pub struct Activator {
    engine: Arc<Engine>,
    interval: Duration,
}

impl Activator {
    /// Create an activator sweeping every `interval`.
    pub fn new(engine: Arc<Engine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Run one sweep against the records due at `now`.
    pub async fn run_once(&self, now: Timestamp) -> Result<ActivationSweep, EngineError> {
        let due = self.engine.store().due_for_activation(now).await?;
        let mut sweep = ActivationSweep::default();

        for id in due {
            match self
                .engine
                .attempt(&id, Command::StartRental, &Actor::System, CommandPayload::empty())
                .await
            {
                Ok(_) => sweep.promoted += 1,
                Err(EngineError::GuardFailed { .. }) | Err(EngineError::Conflict { .. }) => {
                    // Someone beat this sweep to it.
                    tracing::debug!(rental = %id, "activation already applied");
                    sweep.already_applied += 1;
                }
                Err(err) => {
                    tracing::warn!(rental = %id, error = %err, "activation failed");
                    sweep.failed += 1;
                }
            }
        }

        if sweep != ActivationSweep::default() {
            tracing::info!(
                promoted = sweep.promoted,
                already_applied = sweep.already_applied,
                failed = sweep.failed,
                "activation sweep finished"
            );
        }
        Ok(sweep)
    }

    /// Sweep forever on the configured interval.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.run_once(Timestamp::now()).await {
                tracing::error!(error = %err, "activation sweep errored");
            }
        }
    }
}
