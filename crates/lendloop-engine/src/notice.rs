//! # Outbound Notices — Best-Effort Dispatch
//!
//! After a transition commits, both principals are told about it. Notice
//! delivery is the one side effect decoupled from the command's fate: a
//! delivery failure never rolls the transition back and never surfaces as
//! a command failure. Failed notices are retried out of band with bounded
//! attempts and then dead-lettered for the operational alerting channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use lendloop_core::{PartyId, RentalId};
use lendloop_state::{Command, RentalStatus};

/// A transition notice addressed to one principal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    /// The rental that transitioned.
    pub rental: RentalId,
    /// Who the notice is for.
    pub recipient: PartyId,
    /// The status before the transition.
    pub old_status: RentalStatus,
    /// The status after the transition.
    pub new_status: RentalStatus,
    /// The command that drove the transition.
    pub command: Command,
}

/// Delivery failure reported by a dispatcher.
#[derive(Error, Debug)]
#[error("notice delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// The notification collaborator's contract.
///
/// Delivery failure is the collaborator's own concern; the engine only
/// retries and eventually dead-letters.
#[async_trait]
pub trait NoticeDispatcher: Send + Sync {
    /// Deliver one notice.
    async fn dispatch(&self, notice: Notice) -> Result<(), DeliveryError>;
}

/// Retry policy for failed deliveries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total delivery attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// What became of a dispatched notice, from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    /// Delivered on the first attempt.
    Delivered,
    /// First attempt failed; retries continue in the background.
    Deferred,
}

/// Best-effort notice pipeline: one inline attempt, background retries,
/// dead-lettering after the policy is exhausted.
pub struct NoticePipeline {
    dispatcher: Arc<dyn NoticeDispatcher>,
    policy: RetryPolicy,
    dead_letters: Arc<Mutex<Vec<Notice>>>,
}

impl NoticePipeline {
    /// Create a pipeline around a dispatcher.
    pub fn new(dispatcher: Arc<dyn NoticeDispatcher>, policy: RetryPolicy) -> Self {
        Self {
            dispatcher,
            policy,
            dead_letters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Dispatch a notice with one inline attempt.
    ///
    /// On failure the remaining attempts run on a background task; the
    /// caller observes [`DispatchResult::Deferred`] and nothing else.
    pub async fn send(&self, notice: Notice) -> DispatchResult {
        match self.dispatcher.dispatch(notice.clone()).await {
            Ok(()) => DispatchResult::Delivered,
            Err(err) => {
                tracing::warn!(
                    rental = %notice.rental,
                    recipient = %notice.recipient,
                    error = %err,
                    "notice delivery failed, retrying in background"
                );
                let dispatcher = Arc::clone(&self.dispatcher);
                let dead_letters = Arc::clone(&self.dead_letters);
                let policy = self.policy;
                tokio::spawn(async move {
                    retry(dispatcher, policy, dead_letters, notice).await;
                });
                DispatchResult::Deferred
            }
        }
    }

    /// Drain the dead-letter queue (operational alerting channel).
    pub fn drain_dead_letters(&self) -> Vec<Notice> {
        let mut dead = self.dead_letters.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *dead)
    }
}

/// Run the remaining attempts, dead-lettering on exhaustion.
async fn retry(
    dispatcher: Arc<dyn NoticeDispatcher>,
    policy: RetryPolicy,
    dead_letters: Arc<Mutex<Vec<Notice>>>,
    notice: Notice,
) {
    for _ in 1..policy.max_attempts {
        tokio::time::sleep(policy.backoff).await;
        if dispatcher.dispatch(notice.clone()).await.is_ok() {
            return;
        }
    }
    tracing::error!(
        rental = %notice.rental,
        recipient = %notice.recipient,
        attempts = policy.max_attempts,
        "notice delivery exhausted retries, dead-lettering"
    );
    metrics::counter!("lendloop_notices_dead_lettered_total").increment(1);
    dead_letters
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(notice);
}

// ─── Test Dispatchers ────────────────────────────────────────────────

/// A dispatcher that records every delivered notice. Test double, also
/// handy as a no-op dispatcher for single-process deployments.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    delivered: Mutex<Vec<Notice>>,
}

impl RecordingDispatcher {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notice delivered so far.
    pub fn delivered(&self) -> Vec<Notice> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl NoticeDispatcher for RecordingDispatcher {
    async fn dispatch(&self, notice: Notice) -> Result<(), DeliveryError> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice);
        Ok(())
    }
}

/// A dispatcher that fails a fixed number of times before succeeding.
#[derive(Debug)]
pub struct FlakyDispatcher {
    failures_remaining: Mutex<u32>,
    inner: RecordingDispatcher,
}

impl FlakyDispatcher {
    /// Fail the first `failures` deliveries, then behave like a recorder.
    pub fn failing(failures: u32) -> Self {
        Self {
            failures_remaining: Mutex::new(failures),
            inner: RecordingDispatcher::new(),
        }
    }

    /// Every notice eventually delivered.
    pub fn delivered(&self) -> Vec<Notice> {
        self.inner.delivered()
    }
}

#[async_trait]
impl NoticeDispatcher for FlakyDispatcher {
    async fn dispatch(&self, notice: Notice) -> Result<(), DeliveryError> {
        {
            let mut remaining = self
                .failures_remaining
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DeliveryError("simulated outage".to_string()));
            }
        }
        self.inner.dispatch(notice).await
    }
}
