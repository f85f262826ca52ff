use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Sent,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Purchase,
    WeeklyReport,
}

/// A queued outbound WhatsApp message.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub guardian_id: Uuid,
    pub student_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub to_phone: String,
    /// Always carries a `message` string; the rest is kind-specific.
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn pending(
        guardian_id: Uuid,
        student_id: Option<Uuid>,
        kind: NotificationKind,
        to_phone: impl Into<String>,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            guardian_id,
            student_id,
            kind,
            to_phone: to_phone.into(),
            payload,
            status: OutboxStatus::Pending,
            attempt_count: 0,
            last_error: None,
            sent_at: None,
            created_at,
        }
    }

    pub fn message_text(&self) -> &str {
        self.payload
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
    }

    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        self.status = OutboxStatus::Sent;
        self.sent_at = Some(at);
        self.attempt_count += 1;
        self.last_error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = OutboxStatus::Failed;
        self.attempt_count += 1;
        self.last_error = Some(error.into());
    }
}
