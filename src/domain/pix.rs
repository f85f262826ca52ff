use super::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PixChargeStatus {
    Created,
    Pending,
    Paid,
    Failed,
    Expired,
    Refunded,
}

impl PixChargeStatus {
    /// Parses a provider status, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" => Some(Self::Created),
            "pending" | "waiting" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" | "declined" => Some(Self::Failed),
            "expired" => Some(Self::Expired),
            "refunded" | "canceled" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// A requested wallet top-up paid through Pix.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PixCharge {
    pub id: Uuid,
    pub guardian_id: Uuid,
    pub student_id: Option<Uuid>,
    pub txid: String,
    pub status: PixChargeStatus,
    pub amount: Money,
    pub br_code: String,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
