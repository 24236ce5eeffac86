//! # Log-Only Notice Dispatcher
//!
//! The notification collaborator is out of scope for the engine; this
//! dispatcher surfaces every notice through tracing so deployments
//! without a delivery channel still have an audit trail.

use async_trait::async_trait;

use lendloop_engine::{DeliveryError, Notice, NoticeDispatcher};

/// Dispatches notices to the log.
#[derive(Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NoticeDispatcher for LogDispatcher {
    async fn dispatch(&self, notice: Notice) -> Result<(), DeliveryError> {
        tracing::info!(
            rental = %notice.rental,
            recipient = %notice.recipient,
            old_status = %notice.old_status,
            new_status = %notice.new_status,
            command = %notice.command,
            "transition notice"
        );
        Ok(())
    }
}
