//! # Observer Synchronization — The Transition Feed
//!
//! Any process displaying a rental record must learn, within a bounded
//! delay, that a transition occurred, and must re-fetch rather than keep
//! trusting a stale cached copy.
//!
//! The feed is a map of per-record `tokio::sync::broadcast` channels.
//! The processor publishes one event per successful transition, after the
//! compare-and-swap commits. Subscribers treat the event as an
//! invalidation signal: they re-read the authoritative record and never
//! apply the delta themselves, so a guard-evaluated truth can never
//! diverge between observers.
//!
//! Each observer owns its own receiver; there is no shared mutable view.
//! Channels are torn down lazily once nobody observes the record.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

use lendloop_core::{RentalId, Timestamp};
use lendloop_state::RentalStatus;

/// Buffered events per record before slow observers start lagging.
const FEED_CAPACITY: usize = 64;

/// A transition notification. The serialized form is the change-feed
/// wire contract for external subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEvent {
    /// The record that transitioned.
    pub record_id: RentalId,
    /// The status before the swap.
    pub old_status: RentalStatus,
    /// The status after the swap.
    pub new_status: RentalStatus,
    /// When the swap committed.
    pub at: Timestamp,
}

/// Per-record change feed.
#[derive(Debug, Default)]
pub struct TransitionFeed {
    channels: Mutex<HashMap<RentalId, broadcast::Sender<TransitionEvent>>>,
}

impl TransitionFeed {
    /// Create an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one record's transitions.
    ///
    /// The subscription lives as long as the returned receiver; dropping
    /// it tears the observation down.
    pub fn subscribe(&self, id: &RentalId) -> broadcast::Receiver<TransitionEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(id.clone())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .subscribe()
    }

    /// Publish a committed transition to the record's observers.
    ///
    /// Returns how many observers were notified. A record nobody watches
    /// has its channel dropped instead.
    pub fn publish(&self, event: TransitionEvent) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = channels.get(&event.record_id) else {
            return 0;
        };
        match sender.send(event.clone()) {
            Ok(observers) => observers,
            Err(_) => {
                // All receivers dropped; tear the channel down.
                channels.remove(&event.record_id);
                0
            }
        }
    }

    /// Whether anyone currently observes the record.
    pub fn observed(&self, id: &RentalId) -> bool {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .get(id)
            .map(|sender| sender.receiver_count() > 0)
            .unwrap_or(false)
    }

    /// Drop channels with no remaining observers.
    pub fn prune(&self) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Number of records with a live channel.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
