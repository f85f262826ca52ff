use crate::domain::ports::{MessageSenderBox, OutboxStoreBox};
use crate::error::Result;
use chrono::Utc;
use tracing::{info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    /// False when the run was skipped because no sender is configured.
    pub sender_configured: bool,
}

/// Drains one batch of pending outbox rows through the message sender.
///
/// Every row gets exactly one attempt per run and is marked `sent` or
/// `failed`; failed rows are never picked up again unless something resets
/// them to `pending`. Runs must not overlap.
pub struct OutboxDispatcher {
    store: OutboxStoreBox,
    sender: MessageSenderBox,
    batch_size: usize,
}

impl OutboxDispatcher {
    pub fn new(store: OutboxStoreBox, sender: MessageSenderBox, batch_size: usize) -> Self {
        Self {
            store,
            sender,
            batch_size,
        }
    }

    pub async fn run_once(&self) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();
        if !self.sender.is_configured() {
            info!("message sender not configured, outbox left untouched");
            return Ok(report);
        }
        report.sender_configured = true;

        let pending = self.store.pending(self.batch_size).await?;
        for mut message in pending {
            report.processed += 1;
            match self
                .sender
                .send_text(&message.to_phone, message.message_text())
                .await
            {
                Ok(()) => {
                    message.mark_sent(Utc::now());
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(outbox_id = %message.id, error = %e, "outbox delivery failed");
                    message.mark_failed(e.to_string());
                    report.failed += 1;
                }
            }
            self.store.update(message).await?;
        }

        info!(
            processed = report.processed,
            sent = report.sent,
            failed = report.failed,
            "outbox batch dispatched"
        );
        Ok(report)
    }
}
