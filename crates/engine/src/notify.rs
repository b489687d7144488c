//! Notification sink.

use async_trait::async_trait;
use studytrack_core::{Notification, UserId};
use tracing::info;
use crate::Result;

/// Accepts queued notification records. Delivery is the sink's business.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Hand over one notification.
    async fn enqueue(&self, user_id: &UserId, notification: &Notification) -> Result<()>;
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn enqueue(&self, user_id: &UserId, notification: &Notification) -> Result<()> {
        info!(user = %user_id, id = %notification.id, "{}", notification.message);
        Ok(())
    }
}
